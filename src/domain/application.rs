use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationStatus {
    Pending,
    Reviewed,
    Shortlisted,
    Interview,
    Rejected,
    Accepted,
    Withdrawn,
}

impl ApplicationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApplicationStatus::Pending => "pending",
            ApplicationStatus::Reviewed => "reviewed",
            ApplicationStatus::Shortlisted => "shortlisted",
            ApplicationStatus::Interview => "interview",
            ApplicationStatus::Rejected => "rejected",
            ApplicationStatus::Accepted => "accepted",
            ApplicationStatus::Withdrawn => "withdrawn",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(ApplicationStatus::Pending),
            "reviewed" => Some(ApplicationStatus::Reviewed),
            "shortlisted" => Some(ApplicationStatus::Shortlisted),
            "interview" => Some(ApplicationStatus::Interview),
            "rejected" => Some(ApplicationStatus::Rejected),
            "accepted" => Some(ApplicationStatus::Accepted),
            "withdrawn" => Some(ApplicationStatus::Withdrawn),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ApplicationStatus::Rejected
                | ApplicationStatus::Accepted
                | ApplicationStatus::Withdrawn
        )
    }

    /// Legal employer-driven transitions. Withdrawal is candidate-driven and
    /// handled separately.
    pub fn can_transition_to(&self, next: ApplicationStatus) -> bool {
        use ApplicationStatus::*;
        match self {
            Pending => matches!(next, Reviewed | Shortlisted | Rejected),
            Reviewed | Shortlisted => matches!(next, Interview | Accepted | Rejected),
            Interview => matches!(next, Accepted | Rejected),
            Rejected | Accepted | Withdrawn => false,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Application {
    pub id: Uuid,
    pub job_id: Uuid,
    pub candidate_id: Uuid,
    pub cover_letter: String,
    #[serde(skip_serializing)]
    pub resume_key: Option<String>,
    pub has_resume: bool,
    pub expected_salary: Option<i64>,
    pub available_from: Option<Date>,
    pub status: ApplicationStatus,
    pub is_withdrawn: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub applied_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub reviewed_at: Option<OffsetDateTime>,
}

/// Candidate-side listing row: the application with the job it targets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateApplication {
    pub id: Uuid,
    pub job_id: Uuid,
    pub job_title: String,
    pub company_name: String,
    pub status: ApplicationStatus,
    #[serde(with = "time::serde::rfc3339")]
    pub applied_at: OffsetDateTime,
}

/// Employer-side listing row: the application with its candidate summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmployerApplication {
    pub id: Uuid,
    pub job_id: Uuid,
    pub job_title: String,
    pub candidate_name: String,
    pub candidate_headline: String,
    pub status: ApplicationStatus,
    pub expected_salary: Option<i64>,
    #[serde(with = "time::serde::rfc3339")]
    pub applied_at: OffsetDateTime,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusHistoryEntry {
    pub id: Uuid,
    pub old_status: String,
    pub new_status: String,
    pub changed_by: Option<Uuid>,
    pub notes: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}
