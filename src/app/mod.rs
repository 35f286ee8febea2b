pub mod applications;
pub mod auth;
pub mod catalog;
pub mod jobs;
pub mod matching;
pub mod notifications;
pub mod profiles;
pub mod reviews;
pub mod uploads;
