//! Dashboard statistics through the router

mod common;

use axum::http::StatusCode;
use serde_json::{json, Value};
use uuid::Uuid;

use common::{tomatoes, TestApp, JPEG_BYTES};
use krishi_mitra_server::diagnosis::{DiagnosisStatus, RecommendationSet, Severity};
use krishi_mitra_server::repository::NewDiagnosis;

async fn record_diagnosis(app: &TestApp, user_id: &str, crop: &str, severity: Severity) {
    app.repositories
        .diagnoses
        .insert(NewDiagnosis {
            user_id: Uuid::parse_str(user_id).unwrap(),
            image_url: "/uploads/leaf.jpg".to_string(),
            crop_type: crop.to_string(),
            prediction: None,
            recommendations: RecommendationSet::default(),
            severity,
            status: DiagnosisStatus::Processed,
            location: None,
            notes: None,
        })
        .await
        .unwrap();
}

fn crop<'a>(cards: &'a Value, name: &str) -> &'a Value {
    cards
        .as_array()
        .unwrap()
        .iter()
        .find(|c| c["crop"] == name)
        .unwrap_or_else(|| panic!("no card for {}", name))
}

#[tokio::test]
async fn test_crop_health_scores_weighted_findings() {
    let app = TestApp::new();
    let (token, id) = app.register("Ravi", "ravi@example.com", "farmer").await;

    record_diagnosis(&app, &id, "tomato", Severity::Critical).await;
    record_diagnosis(&app, &id, "tomato", Severity::Critical).await;
    record_diagnosis(&app, &id, "tomato", Severity::High).await;
    record_diagnosis(&app, &id, "wheat", Severity::Medium).await;
    record_diagnosis(&app, &id, "rice", Severity::High).await;
    record_diagnosis(&app, &id, "rice", Severity::High).await;

    let (status, body) = app.get("/api/dashboard/crop-health", Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    let cards = &body["data"];
    assert_eq!(cards.as_array().unwrap().len(), 3);

    let tomato = crop(cards, "tomato");
    assert_eq!(tomato["health"], "Critical");
    assert_eq!(tomato["progress"], 0);
    assert_eq!(tomato["issues"], 3);

    let wheat = crop(cards, "wheat");
    assert_eq!(wheat["health"], "Good");
    assert_eq!(wheat["progress"], 100);
    assert_eq!(wheat["issues"], 0);

    let rice = crop(cards, "rice");
    assert_eq!(rice["health"], "Warning");
    assert_eq!(rice["progress"], 40);
    assert_eq!(rice["issues"], 2);
}

#[tokio::test]
async fn test_crop_health_is_empty_without_diagnoses() {
    let app = TestApp::new();
    let (token, _) = app.register("Ravi", "ravi@example.com", "farmer").await;

    let (status, body) = app.get("/api/dashboard/crop-health", Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"], json!([]));
}

#[tokio::test]
async fn test_farmer_and_buyer_stats_follow_orders() {
    let app = TestApp::new();
    let (farmer, _) = app.register("Ravi", "ravi@example.com", "farmer").await;
    let (buyer, _) = app.register("Asha", "asha@example.com", "buyer").await;
    let listing = app.create_listing(&farmer, tomatoes()).await;
    app.create_listing(
        &farmer,
        json!({ "title": "Green Chillies", "price": 60, "quantity": 5, "category": "vegetables" }),
    )
    .await;
    let (status, _) = app.upload_diagnosis(&farmer, JPEG_BYTES, &[]).await;
    assert_eq!(status, StatusCode::CREATED);

    let (_, order) = app
        .post(
            "/api/orders",
            Some(&buyer),
            json!({ "items": [{ "listingId": listing, "quantity": 10 }] }),
        )
        .await;
    let order_id = order["data"]["id"].as_str().unwrap().to_string();

    let (_, buyer_stats) = app.get("/api/dashboard/buyer/stats", Some(&buyer)).await;
    assert_eq!(buyer_stats["data"]["activeOrders"], 1);
    assert_eq!(buyer_stats["data"]["totalSpent"], 0.0);
    assert_eq!(buyer_stats["data"]["favoriteFarmers"], 1);
    assert_eq!(buyer_stats["data"]["pendingDeliveries"], 0);

    app.put(
        &format!("/api/orders/{}/payment", order_id),
        Some(&farmer),
        json!({ "paymentStatus": "paid" }),
    )
    .await;
    app.put(
        &format!("/api/orders/{}/status", order_id),
        Some(&farmer),
        json!({ "status": "confirmed" }),
    )
    .await;

    let (status, farmer_stats) = app.get("/api/dashboard/farmer/stats", Some(&farmer)).await;
    assert_eq!(status, StatusCode::OK);
    let stats = &farmer_stats["data"];
    assert_eq!(stats["activeListings"], 2);
    assert_eq!(stats["diagnosesThisMonth"], 1);
    assert_eq!(stats["totalRevenue"], 450);
    assert_eq!(stats["pendingAlerts"], 1);

    let (_, buyer_stats) = app.get("/api/dashboard/buyer/stats", Some(&buyer)).await;
    assert_eq!(buyer_stats["data"]["totalSpent"], 450.0);
    assert_eq!(buyer_stats["data"]["pendingDeliveries"], 1);
}

#[tokio::test]
async fn test_stats_are_role_gated() {
    let app = TestApp::new();
    let (farmer, _) = app.register("Ravi", "ravi@example.com", "farmer").await;
    let (buyer, _) = app.register("Asha", "asha@example.com", "buyer").await;

    let (status, _) = app.get("/api/dashboard/farmer/stats", Some(&buyer)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = app.get("/api/dashboard/buyer/stats", Some(&farmer)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = app.get("/api/dashboard/activity", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_recommended_farmers_ranked_by_active_listings() {
    let app = TestApp::new();
    let (ravi, ravi_id) = app.register("Ravi", "ravi@example.com", "farmer").await;
    let (mohan, _) = app.register("Mohan", "mohan@example.com", "farmer").await;
    let (buyer, _) = app.register("Asha", "asha@example.com", "buyer").await;

    app.create_listing(&mohan, tomatoes()).await;
    app.create_listing(&ravi, tomatoes()).await;
    app.create_listing(
        &ravi,
        json!({ "title": "Basmati Rice", "price": 80, "quantity": 1000, "category": "cereals" }),
    )
    .await;

    let (status, body) = app
        .get("/api/dashboard/recommended-farmers", Some(&buyer))
        .await;
    assert_eq!(status, StatusCode::OK);
    let farmers = body["data"].as_array().unwrap();
    assert_eq!(farmers.len(), 2);

    let top = &farmers[0];
    assert_eq!(top["id"], ravi_id.as_str());
    assert_eq!(top["name"], "Ravi");
    assert_eq!(top["itemCount"], 2);
    assert_eq!(top["totalQuantity"], 1100.0);
    assert_eq!(top["deliveryTime"], "3-4 days");
    assert_eq!(top["rating"], 4.5);

    assert_eq!(farmers[1]["name"], "Mohan");
    assert_eq!(farmers[1]["deliveryTime"], "1-2 days");
}

#[tokio::test]
async fn test_activity_by_role() {
    let app = TestApp::new();
    let (farmer, _) = app.register("Ravi", "ravi@example.com", "farmer").await;
    let (buyer, _) = app.register("Asha", "asha@example.com", "buyer").await;
    let listing = app.create_listing(&farmer, tomatoes()).await;
    app.upload_diagnosis(&farmer, JPEG_BYTES, &[("cropType", "potato")])
        .await;

    let (status, body) = app.get("/api/dashboard/activity", Some(&farmer)).await;
    assert_eq!(status, StatusCode::OK);
    let items = body["data"].as_array().unwrap();
    assert_eq!(items.len(), 2);
    assert!(items.iter().any(|i| i["type"] == "diagnosis"
        && i["message"] == "potato - Early Blight"));
    assert!(items
        .iter()
        .any(|i| i["type"] == "sale" && i["message"] == "Listed: Organic Tomatoes"));
    assert!(items.iter().all(|i| i["time"] == "0m ago"));

    app.get(&format!("/api/market/{}", listing), Some(&buyer)).await;
    let (_, body) = app.get("/api/dashboard/activity", Some(&buyer)).await;
    let items = body["data"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["type"], "view");
    assert_eq!(items[0]["message"], "Viewed: Organic Tomatoes from Ravi");
}

#[tokio::test]
async fn test_viewed_activity_follows_view_order() {
    let app = TestApp::new();
    let (farmer, _) = app.register("Ravi", "ravi@example.com", "farmer").await;
    let (buyer, _) = app.register("Asha", "asha@example.com", "buyer").await;
    let tomatoes_id = app.create_listing(&farmer, tomatoes()).await;
    let mut onions = tomatoes();
    onions["title"] = json!("Red Onions");
    let onions_id = app.create_listing(&farmer, onions).await;

    // Onions are the newer listing but the tomatoes are viewed last
    app.get(&format!("/api/market/{}", onions_id), Some(&buyer)).await;
    app.get(&format!("/api/market/{}", tomatoes_id), Some(&buyer)).await;

    let (status, body) = app.get("/api/dashboard/activity", Some(&buyer)).await;
    assert_eq!(status, StatusCode::OK);
    let messages: Vec<&str> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|i| i["message"].as_str().unwrap())
        .collect();
    assert_eq!(
        messages,
        vec![
            "Viewed: Organic Tomatoes from Ravi",
            "Viewed: Red Onions from Ravi"
        ]
    );
}
