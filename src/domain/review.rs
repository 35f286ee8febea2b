use serde::Serialize;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
pub struct CompanyReview {
    pub id: Uuid,
    pub company_id: Uuid,
    pub reviewer_id: Uuid,
    pub reviewer_name: String,
    pub rating: i32,
    pub review_text: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}
