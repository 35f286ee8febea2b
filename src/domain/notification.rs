use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    Application,
    ApplicationStatus,
    JobAlert,
    Interview,
    System,
}

impl NotificationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationType::Application => "application",
            NotificationType::ApplicationStatus => "application_status",
            NotificationType::JobAlert => "job_alert",
            NotificationType::Interview => "interview",
            NotificationType::System => "system",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "application" => Some(NotificationType::Application),
            "application_status" => Some(NotificationType::ApplicationStatus),
            "job_alert" => Some(NotificationType::JobAlert),
            "interview" => Some(NotificationType::Interview),
            "system" => Some(NotificationType::System),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    pub notification_type: NotificationType,
    pub title: String,
    pub content: String,
    #[serde(with = "time::serde::rfc3339::option")]
    pub read_at: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}
