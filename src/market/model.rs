//! Marketplace listing models

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::types::chrono::{DateTime, Utc};
use sqlx::types::Json;
use std::str::FromStr;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::error::ApiError;
use crate::models::{PageRequest, UserSummary};

/// Selling unit
#[derive(Debug, Serialize, Deserialize, sqlx::Type, Clone, Copy, PartialEq, Eq, Default)]
#[sqlx(type_name = "listing_unit", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Unit {
    #[default]
    Kg,
    Quintal,
    Ton,
    Bag,
    Piece,
}

/// Produce category
#[derive(Debug, Serialize, Deserialize, sqlx::Type, Clone, Copy, PartialEq, Eq, Hash)]
#[sqlx(type_name = "listing_category", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Cereals,
    Pulses,
    Vegetables,
    Fruits,
    Spices,
    Others,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Cereals => "cereals",
            Category::Pulses => "pulses",
            Category::Vegetables => "vegetables",
            Category::Fruits => "fruits",
            Category::Spices => "spices",
            Category::Others => "others",
        }
    }
}

impl FromStr for Category {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "cereals" => Ok(Category::Cereals),
            "pulses" => Ok(Category::Pulses),
            "vegetables" => Ok(Category::Vegetables),
            "fruits" => Ok(Category::Fruits),
            "spices" => Ok(Category::Spices),
            "others" => Ok(Category::Others),
            other => Err(ApiError::validation(format!("Unknown category: {}", other))),
        }
    }
}

/// Quality grade
#[derive(Debug, Serialize, Deserialize, sqlx::Type, Clone, Copy, PartialEq, Eq, Default)]
#[sqlx(type_name = "quality_grade", rename_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum QualityGrade {
    Premium,
    GradeA,
    GradeB,
    #[default]
    Standard,
}

impl FromStr for QualityGrade {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "premium" => Ok(QualityGrade::Premium),
            "grade-a" => Ok(QualityGrade::GradeA),
            "grade-b" => Ok(QualityGrade::GradeB),
            "standard" => Ok(QualityGrade::Standard),
            other => Err(ApiError::validation(format!(
                "Unknown quality grade: {}",
                other
            ))),
        }
    }
}

/// Listing lifecycle status
#[derive(Debug, Serialize, Deserialize, sqlx::Type, Clone, Copy, PartialEq, Eq, Default)]
#[sqlx(type_name = "listing_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ListingStatus {
    #[default]
    Active,
    Sold,
    Inactive,
}

/// Where the produce is
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct Location {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pincode: Option<String>,
}

impl Location {
    fn normalized(self) -> Self {
        Self {
            city: non_blank(self.city),
            state: non_blank(self.state),
            pincode: non_blank(self.pincode),
        }
    }

    /// Case-insensitive substring match over city and state
    pub fn matches(&self, needle_lower: &str) -> bool {
        [&self.city, &self.state]
            .into_iter()
            .flatten()
            .any(|value| value.to_lowercase().contains(needle_lower))
    }
}

/// Image reference attached to a listing
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ListingImage {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_id: Option<String>,
}

/// Market item (listing) model
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone)]
#[serde(rename_all = "camelCase")]
pub struct MarketItem {
    pub id: Uuid,
    pub seller_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub price: f64,
    pub unit: Unit,
    pub quantity: f64,
    pub category: Category,
    pub quality_grade: QualityGrade,
    pub organic: bool,
    pub harvest_date: Option<NaiveDate>,
    pub status: ListingStatus,
    pub location: Json<Location>,
    pub tags: Vec<String>,
    pub images: Json<Vec<ListingImage>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MarketItem {
    /// Inventory value at list price
    pub fn inventory_value(&self) -> f64 {
        self.price * self.quantity
    }
}

// ============================================================================
// Loosely-typed inputs
//
// Multipart forms post nested fields as serialized strings; JSON clients post them
// structured. Both shapes are accepted and normalized before anything is stored.
// ============================================================================

/// Location as an object or a JSON object string
#[derive(Debug, Deserialize, Clone)]
#[serde(untagged)]
pub enum LocationInput {
    Structured(Location),
    Serialized(String),
}

impl LocationInput {
    pub fn normalize(self) -> Result<Location, ApiError> {
        let location = match self {
            LocationInput::Structured(location) => location,
            LocationInput::Serialized(raw) if raw.trim().is_empty() => Location::default(),
            LocationInput::Serialized(raw) => serde_json::from_str::<Location>(raw.trim())
                .map_err(|_| ApiError::validation("Location must be an object with city/state/pincode"))?,
        };
        Ok(location.normalized())
    }
}

/// Tags as an array, a JSON array string or a comma separated string
#[derive(Debug, Deserialize, Clone)]
#[serde(untagged)]
pub enum TagsInput {
    List(Vec<String>),
    Serialized(String),
}

impl TagsInput {
    pub fn normalize(self) -> Result<Vec<String>, ApiError> {
        let raw_tags = match self {
            TagsInput::List(tags) => tags,
            TagsInput::Serialized(raw) if raw.trim_start().starts_with('[') => {
                serde_json::from_str::<Vec<String>>(raw.trim())
                    .map_err(|_| ApiError::validation("Tags must be a list of strings"))?
            }
            TagsInput::Serialized(raw) => raw.split(',').map(str::to_string).collect(),
        };

        let mut tags: Vec<String> = Vec::with_capacity(raw_tags.len());
        for tag in raw_tags {
            let tag = tag.trim().to_string();
            if !tag.is_empty() && !tags.contains(&tag) {
                tags.push(tag);
            }
        }
        Ok(tags)
    }
}

/// A single image given as a bare URL or as an object
#[derive(Debug, Deserialize, Clone)]
#[serde(untagged)]
pub enum ImageInput {
    Url(String),
    Object(ListingImage),
}

/// Images as a list, a JSON string of a list, or a single URL string
#[derive(Debug, Deserialize, Clone)]
#[serde(untagged)]
pub enum ImagesInput {
    List(Vec<ImageInput>),
    Serialized(String),
}

impl ImagesInput {
    pub fn normalize(self) -> Result<Vec<ListingImage>, ApiError> {
        let inputs = match self {
            ImagesInput::List(items) => items,
            ImagesInput::Serialized(raw) => {
                let trimmed = raw.trim();
                if trimmed.is_empty() {
                    Vec::new()
                } else if trimmed.starts_with('[') {
                    serde_json::from_str::<Vec<ImageInput>>(trimmed)
                        .map_err(|_| ApiError::validation("Images must be a list of URLs or image objects"))?
                } else if trimmed.starts_with('{') {
                    vec![serde_json::from_str::<ImageInput>(trimmed)
                        .map_err(|_| ApiError::validation("Invalid image object"))?]
                } else {
                    vec![ImageInput::Url(trimmed.to_string())]
                }
            }
        };

        Ok(inputs
            .into_iter()
            .map(|input| match input {
                ImageInput::Url(url) => ListingImage {
                    url: url.trim().to_string(),
                    public_id: None,
                },
                ImageInput::Object(image) => ListingImage {
                    url: image.url.trim().to_string(),
                    public_id: non_blank(image.public_id),
                },
            })
            .filter(|image| !image.url.is_empty())
            .collect())
    }
}

// ============================================================================
// Request DTOs
// ============================================================================

/// Request DTO for creating a listing
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateListingRequest {
    #[serde(default)]
    #[validate(
        custom = "validate_not_blank",
        length(max = 200, message = "Title must be at most 200 characters")
    )]
    pub title: String,
    #[validate(length(max = 1000, message = "Description must be at most 1000 characters"))]
    pub description: Option<String>,
    #[validate(
        required(message = "Price is required"),
        range(min = 0.0, message = "Price must be non-negative")
    )]
    pub price: Option<f64>,
    pub unit: Option<Unit>,
    #[validate(
        required(message = "Quantity is required"),
        range(min = 0.0, message = "Quantity must be non-negative")
    )]
    pub quantity: Option<f64>,
    #[validate(required(message = "Category is required"))]
    pub category: Option<Category>,
    pub quality_grade: Option<QualityGrade>,
    pub organic: Option<bool>,
    pub harvest_date: Option<NaiveDate>,
    pub location: Option<LocationInput>,
    pub tags: Option<TagsInput>,
    pub images: Option<ImagesInput>,
}

/// Request DTO for a partial listing update
#[derive(Debug, Deserialize, Validate, Default)]
#[serde(rename_all = "camelCase")]
pub struct UpdateListingRequest {
    #[validate(
        custom = "validate_not_blank",
        length(max = 200, message = "Title must be at most 200 characters")
    )]
    pub title: Option<String>,
    #[validate(length(max = 1000, message = "Description must be at most 1000 characters"))]
    pub description: Option<String>,
    #[validate(range(min = 0.0, message = "Price must be non-negative"))]
    pub price: Option<f64>,
    pub unit: Option<Unit>,
    #[validate(range(min = 0.0, message = "Quantity must be non-negative"))]
    pub quantity: Option<f64>,
    pub category: Option<Category>,
    pub quality_grade: Option<QualityGrade>,
    pub organic: Option<bool>,
    pub harvest_date: Option<NaiveDate>,
    pub status: Option<ListingStatus>,
    pub location: Option<LocationInput>,
    pub tags: Option<TagsInput>,
    pub images: Option<ImagesInput>,
}

impl UpdateListingRequest {
    /// Normalize loosely-typed fields into a patch; absent fields stay untouched
    pub fn into_patch(self) -> Result<ListingPatch, ApiError> {
        Ok(ListingPatch {
            title: self.title.map(|t| t.trim().to_string()),
            description: self.description.map(|d| non_blank(Some(d))),
            price: self.price,
            unit: self.unit,
            quantity: self.quantity,
            category: self.category,
            quality_grade: self.quality_grade,
            organic: self.organic,
            harvest_date: self.harvest_date,
            status: self.status,
            location: self.location.map(|l| l.normalize()).transpose()?,
            tags: self.tags.map(|t| t.normalize()).transpose()?,
            images: self.images.map(|i| i.normalize()).transpose()?,
        })
    }
}

/// Field-level listing change; only `Some` fields are written
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListingPatch {
    pub title: Option<String>,
    /// `Some(None)` clears the description
    pub description: Option<Option<String>>,
    pub price: Option<f64>,
    pub unit: Option<Unit>,
    pub quantity: Option<f64>,
    pub category: Option<Category>,
    pub quality_grade: Option<QualityGrade>,
    pub organic: Option<bool>,
    pub harvest_date: Option<NaiveDate>,
    pub status: Option<ListingStatus>,
    pub location: Option<Location>,
    pub tags: Option<Vec<String>>,
    pub images: Option<Vec<ListingImage>>,
}

impl ListingPatch {
    /// Apply onto the current stored row
    pub fn apply_to(&self, item: &mut MarketItem) {
        if let Some(title) = &self.title {
            item.title = title.clone();
        }
        if let Some(description) = &self.description {
            item.description = description.clone();
        }
        if let Some(price) = self.price {
            item.price = price;
        }
        if let Some(unit) = self.unit {
            item.unit = unit;
        }
        if let Some(quantity) = self.quantity {
            item.quantity = quantity;
        }
        if let Some(category) = self.category {
            item.category = category;
        }
        if let Some(grade) = self.quality_grade {
            item.quality_grade = grade;
        }
        if let Some(organic) = self.organic {
            item.organic = organic;
        }
        if let Some(harvest_date) = self.harvest_date {
            item.harvest_date = Some(harvest_date);
        }
        if let Some(status) = self.status {
            item.status = status;
        }
        if let Some(location) = &self.location {
            item.location = Json(location.clone());
        }
        if let Some(tags) = &self.tags {
            item.tags = tags.clone();
        }
        if let Some(images) = &self.images {
            item.images = Json(images.clone());
        }
        item.updated_at = Utc::now();
    }
}

/// Raw query parameters for GET /api/market
#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ListingQuery {
    pub page: Option<String>,
    pub limit: Option<String>,
    pub category: Option<String>,
    pub min_price: Option<String>,
    pub max_price: Option<String>,
    pub location: Option<String>,
    pub organic: Option<String>,
    pub quality_grade: Option<String>,
    pub search: Option<String>,
}

/// Validated search filter over listings
#[derive(Debug, Clone, PartialEq)]
pub struct ListingFilter {
    pub status: ListingStatus,
    pub category: Option<Category>,
    pub quality_grade: Option<QualityGrade>,
    pub organic: Option<bool>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    /// Substring over title and description
    pub search: Option<String>,
    /// Substring over city and state
    pub location: Option<String>,
}

impl Default for ListingFilter {
    fn default() -> Self {
        Self {
            status: ListingStatus::Active,
            category: None,
            quality_grade: None,
            organic: None,
            min_price: None,
            max_price: None,
            search: None,
            location: None,
        }
    }
}

impl ListingFilter {
    /// In-process evaluation of the filter; the SQL backend mirrors these rules
    pub fn matches(&self, item: &MarketItem) -> bool {
        if item.status != self.status {
            return false;
        }
        if self.category.is_some_and(|c| c != item.category) {
            return false;
        }
        if self.quality_grade.is_some_and(|g| g != item.quality_grade) {
            return false;
        }
        if self.organic.is_some_and(|o| o != item.organic) {
            return false;
        }
        if self.min_price.is_some_and(|min| item.price < min) {
            return false;
        }
        if self.max_price.is_some_and(|max| item.price > max) {
            return false;
        }
        if let Some(search) = &self.search {
            let needle = search.to_lowercase();
            let in_title = item.title.to_lowercase().contains(&needle);
            let in_description = item
                .description
                .as_deref()
                .is_some_and(|d| d.to_lowercase().contains(&needle));
            if !in_title && !in_description {
                return false;
            }
        }
        if let Some(location) = &self.location {
            if !item.location.matches(&location.to_lowercase()) {
                return false;
            }
        }
        true
    }
}

impl ListingQuery {
    /// Parse raw query strings into a filter and page request
    pub fn into_filter(self) -> Result<(ListingFilter, PageRequest), ApiError> {
        let page = PageRequest::from_query(self.page.as_deref(), self.limit.as_deref())
            .map_err(ApiError::Validation)?;

        let category = present(self.category)
            .map(|c| c.parse::<Category>())
            .transpose()?;
        let quality_grade = present(self.quality_grade)
            .map(|g| g.parse::<QualityGrade>())
            .transpose()?;
        let organic = present(self.organic)
            .map(|o| match o.to_lowercase().as_str() {
                "true" | "1" | "yes" => Ok(true),
                "false" | "0" | "no" => Ok(false),
                other => Err(ApiError::validation(format!(
                    "organic must be true or false, got {}",
                    other
                ))),
            })
            .transpose()?;
        let min_price = parse_price("minPrice", self.min_price)?;
        let max_price = parse_price("maxPrice", self.max_price)?;

        if let (Some(min), Some(max)) = (min_price, max_price) {
            if min > max {
                return Err(ApiError::validation("minPrice cannot exceed maxPrice"));
            }
        }

        let filter = ListingFilter {
            status: ListingStatus::Active,
            category,
            quality_grade,
            organic,
            min_price,
            max_price,
            search: present(self.search),
            location: present(self.location),
        };

        Ok((filter, page))
    }
}

/// Listing with the seller resolved for display
#[derive(Debug, Serialize)]
pub struct ListingView {
    #[serde(flatten)]
    pub item: MarketItem,
    pub seller: Option<UserSummary>,
}

fn parse_price(name: &str, raw: Option<String>) -> Result<Option<f64>, ApiError> {
    match present(raw) {
        Some(value) => {
            let price = value
                .parse::<f64>()
                .ok()
                .filter(|p| p.is_finite() && *p >= 0.0)
                .ok_or_else(|| {
                    ApiError::validation(format!("{} must be a non-negative number", name))
                })?;
            Ok(Some(price))
        }
        None => Ok(None),
    }
}

fn present(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn non_blank(value: Option<String>) -> Option<String> {
    present(value)
}

fn validate_not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut error = ValidationError::new("blank");
        error.message = Some("Title is required".into());
        return Err(error);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(title: &str, price: f64) -> MarketItem {
        MarketItem {
            id: Uuid::new_v4(),
            seller_id: Uuid::new_v4(),
            title: title.to_string(),
            description: Some("Fresh from the farm".to_string()),
            price,
            unit: Unit::Kg,
            quantity: 100.0,
            category: Category::Vegetables,
            quality_grade: QualityGrade::Standard,
            organic: true,
            harvest_date: None,
            status: ListingStatus::Active,
            location: Json(Location {
                city: Some("Nashik".to_string()),
                state: Some("Maharashtra".to_string()),
                pincode: None,
            }),
            tags: vec![],
            images: Json(vec![]),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_tags_accept_all_shapes() {
        let from_list = TagsInput::List(vec![" fresh ".into(), "".into(), "fresh".into()]);
        assert_eq!(from_list.normalize().unwrap(), vec!["fresh"]);

        let from_json = TagsInput::Serialized(r#"["organic","local"]"#.into());
        assert_eq!(from_json.normalize().unwrap(), vec!["organic", "local"]);

        let from_csv = TagsInput::Serialized("organic, local ,".into());
        assert_eq!(from_csv.normalize().unwrap(), vec!["organic", "local"]);
    }

    #[test]
    fn test_location_accepts_serialized_object() {
        let input = LocationInput::Serialized(r#"{"city":"Pune","state":" ","pincode":"411001"}"#.into());
        let location = input.normalize().unwrap();
        assert_eq!(location.city.as_deref(), Some("Pune"));
        assert_eq!(location.state, None);
        assert_eq!(location.pincode.as_deref(), Some("411001"));

        assert!(LocationInput::Serialized("not json".into()).normalize().is_err());
    }

    #[test]
    fn test_images_accept_urls_and_objects() {
        let input: ImagesInput = serde_json::from_value(serde_json::json!([
            "/uploads/a.jpg",
            {"url": "/uploads/b.jpg", "publicId": "b"}
        ]))
        .unwrap();
        let images = input.normalize().unwrap();
        assert_eq!(images.len(), 2);
        assert_eq!(images[1].public_id.as_deref(), Some("b"));

        let single = ImagesInput::Serialized("/uploads/c.jpg".into()).normalize().unwrap();
        assert_eq!(single[0].url, "/uploads/c.jpg");
    }

    #[test]
    fn test_price_range_is_inclusive() {
        let filter = ListingFilter {
            min_price: Some(50.0),
            max_price: Some(100.0),
            ..ListingFilter::default()
        };
        assert!(!filter.matches(&item("Tomatoes", 45.0)));
        assert!(filter.matches(&item("Onions", 80.0)));
        assert!(filter.matches(&item("Garlic", 50.0)));
        assert!(filter.matches(&item("Ginger", 100.0)));
    }

    #[test]
    fn test_search_and_location_combine() {
        let filter = ListingFilter {
            search: Some("TOMATO".to_string()),
            location: Some("nashik".to_string()),
            ..ListingFilter::default()
        };
        assert!(filter.matches(&item("Organic Tomatoes", 45.0)));
        assert!(!filter.matches(&item("Onions", 45.0)));

        let elsewhere = ListingFilter {
            location: Some("Punjab".to_string()),
            ..filter
        };
        assert!(!elsewhere.matches(&item("Organic Tomatoes", 45.0)));
    }

    #[test]
    fn test_query_parsing() {
        let query = ListingQuery {
            category: Some("Vegetables".into()),
            organic: Some("true".into()),
            min_price: Some("10".into()),
            quality_grade: Some("grade-a".into()),
            ..ListingQuery::default()
        };
        let (filter, page) = query.into_filter().unwrap();
        assert_eq!(filter.category, Some(Category::Vegetables));
        assert_eq!(filter.organic, Some(true));
        assert_eq!(filter.min_price, Some(10.0));
        assert_eq!(filter.quality_grade, Some(QualityGrade::GradeA));
        assert_eq!(page, PageRequest::default());

        let bad = ListingQuery {
            min_price: Some("100".into()),
            max_price: Some("50".into()),
            ..ListingQuery::default()
        };
        assert!(bad.into_filter().is_err());
    }

    #[test]
    fn test_quality_grade_wire_format() {
        let json = serde_json::to_string(&QualityGrade::GradeB).unwrap();
        assert_eq!(json, "\"grade-b\"");
    }
}
