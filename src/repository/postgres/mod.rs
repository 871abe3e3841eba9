//! PostgreSQL repository backend

mod diagnoses;
mod listings;
mod orders;
mod users;

pub use diagnoses::PgDiagnosisRepository;
pub use listings::PgListingRepository;
pub use orders::PgOrderRepository;
pub use users::PgUserRepository;

/// ILIKE pattern matching `needle` anywhere, with wildcards in the needle escaped
pub(crate) fn contains_pattern(needle: &str) -> String {
    let escaped = needle
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}
