use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateProfile {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub gender: String,
    pub date_of_birth: Option<Date>,
    pub headline: String,
    pub about: String,
    pub linkedin: String,
    pub github: String,
    pub twitter: String,
    pub website: String,
    #[serde(skip_serializing, default)]
    pub profile_picture_key: Option<String>,
    #[serde(skip_serializing, default)]
    pub resume_key: Option<String>,
    /// Presigned URLs, resolved at response time.
    pub picture_url: Option<String>,
    pub resume_url: Option<String>,
    pub is_verified: bool,
    pub skills: Vec<CandidateSkill>,
    pub education: Vec<Education>,
    pub certifications: Vec<Certification>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// A skill the candidate claims, joined to the global catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateSkill {
    pub skill_id: Uuid,
    pub name: String,
    pub category: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Education {
    #[serde(skip_deserializing)]
    pub id: Uuid,
    pub level: String,
    pub field_of_study: String,
    pub institution: String,
    pub start_date: Option<Date>,
    pub end_date: Option<Date>,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Certification {
    #[serde(skip_deserializing)]
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub issuing_organization: String,
    pub issue_date: Option<Date>,
    pub expiry_date: Option<Date>,
    #[serde(default)]
    pub credential_url: String,
    #[serde(default)]
    pub credential_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmployerProfile {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub email: String,
    pub company_name: String,
    pub company_size: String,
    pub industry: String,
    pub description: String,
    pub website_url: String,
    pub linkedin_url: String,
    #[serde(skip_serializing, default)]
    pub logo_key: Option<String>,
    pub logo_url: Option<String>,
    pub city: String,
    pub state: String,
    pub country: String,
    pub is_verified: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}
