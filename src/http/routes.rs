use axum::{routing::delete, routing::get, routing::patch, routing::post, Router};

use crate::http::handlers;
use crate::AppState;

pub fn health() -> Router<AppState> {
    Router::new().route("/health", get(handlers::health))
}

pub fn auth() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(handlers::register))
        .route("/auth/login", post(handlers::login))
        .route("/auth/refresh", post(handlers::refresh_token))
        .route("/auth/revoke", post(handlers::revoke_token))
        .route("/auth/me", get(handlers::get_current_user))
}

pub fn profiles() -> Router<AppState> {
    Router::new()
        .route("/profiles/me", get(handlers::get_my_profile))
        .route("/profiles/me", patch(handlers::update_my_profile))
        .route("/companies/:id", get(handlers::get_company))
}

pub fn catalog() -> Router<AppState> {
    Router::new()
        .route("/skills", get(handlers::list_skills))
        .route("/skills", post(handlers::create_skill))
        .route("/categories", get(handlers::list_categories))
        .route("/categories", post(handlers::create_category))
}

pub fn jobs() -> Router<AppState> {
    Router::new()
        .route("/jobs", get(handlers::list_jobs))
        .route("/jobs", post(handlers::create_job))
        .route("/jobs/:id", get(handlers::get_job))
        .route("/jobs/:id", patch(handlers::update_job))
        .route("/jobs/:id", delete(handlers::delete_job))
        .route("/jobs/:id/apply", post(handlers::apply_to_job))
        .route("/jobs/:id/save", post(handlers::save_job))
        .route("/jobs/:id/save", delete(handlers::unsave_job))
        .route("/jobs/saved", get(handlers::list_saved_jobs))
}

pub fn applications() -> Router<AppState> {
    Router::new()
        .route("/applications", get(handlers::list_applications))
        .route("/applications/:id", get(handlers::get_application))
        .route("/applications/:id/withdraw", post(handlers::withdraw_application))
        .route("/applications/:id/status", patch(handlers::update_application_status))
        .route("/applications/:id/resume-url", get(handlers::get_application_resume_url))
}

pub fn notifications() -> Router<AppState> {
    Router::new()
        .route("/notifications", get(handlers::list_notifications))
        .route(
            "/notifications/:id/mark-read",
            post(handlers::mark_notification_read),
        )
        .route(
            "/notifications/read-all",
            post(handlers::mark_all_notifications_read),
        )
}

pub fn reviews() -> Router<AppState> {
    Router::new()
        .route("/companies/:id/reviews", get(handlers::list_company_reviews))
        .route("/companies/:id/reviews", post(handlers::create_company_review))
        .route("/reviews/received", get(handlers::list_received_reviews))
}

pub fn uploads() -> Router<AppState> {
    Router::new().route("/uploads", post(handlers::create_upload))
}
