pub mod application;
pub mod job;
pub mod notification;
pub mod profile;
pub mod review;
pub mod user;
