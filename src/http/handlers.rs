use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::format_description::well_known::Rfc3339;
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use crate::app::applications::{
    ApplicationService, ApplyOutcome, NewApplication, StatusChangeOutcome, WithdrawOutcome,
};
use crate::app::auth::AuthService;
use crate::app::catalog::CatalogService;
use crate::app::jobs::{JobPostingUpdate, JobService, JobSkillInput, NewJobPosting, SavedJob};
use crate::app::matching::MatchingService;
use crate::app::notifications::{NotificationFeed, NotificationService};
use crate::app::profiles::{
    CandidateProfileUpdate, EmployerProfileUpdate, ProfileService,
};
use crate::app::reviews::{ReviewOutcome, ReviewService};
use crate::app::uploads::{UploadKind, UploadOutcome, UploadService};
use crate::domain::application::{Application, ApplicationStatus, StatusHistoryEntry};
use crate::domain::job::{
    Category, EmploymentType, ExperienceLevel, JobPosting, JobStatus, LocationType, Skill,
};
use crate::domain::profile::{Certification, Education};
use crate::domain::review::CompanyReview;
use crate::domain::user::{Role, User};
use crate::http::{AppError, AuthUser};
use crate::AppState;

#[derive(Serialize)]
pub(crate) struct HealthResponse {
    status: &'static str,
}

#[derive(Deserialize)]
pub struct PaginationQuery {
    pub limit: Option<i64>,
    pub cursor: Option<String>,
}

#[derive(Serialize)]
pub struct ListResponse<T> {
    pub items: Vec<T>,
    pub next_cursor: Option<String>,
}

fn parse_cursor(cursor: Option<String>) -> Result<Option<(OffsetDateTime, Uuid)>, AppError> {
    let Some(cursor) = cursor else {
        return Ok(None);
    };

    let mut parts = cursor.splitn(2, '/');
    let timestamp = parts
        .next()
        .ok_or_else(|| AppError::bad_request("invalid cursor"))?;
    let id = parts
        .next()
        .ok_or_else(|| AppError::bad_request("invalid cursor"))?;

    let timestamp = OffsetDateTime::parse(timestamp, &Rfc3339)
        .map_err(|_| AppError::bad_request("invalid cursor"))?;
    let id = Uuid::parse_str(id).map_err(|_| AppError::bad_request("invalid cursor"))?;

    Ok(Some((timestamp, id)))
}

fn encode_cursor(cursor: Option<(OffsetDateTime, Uuid)>) -> Option<String> {
    let (timestamp, id) = cursor?;
    let timestamp = timestamp.format(&Rfc3339).ok()?;
    Some(format!("{}/{}", timestamp, id))
}

fn auth_service(state: &AppState) -> AuthService {
    AuthService::new(
        state.db.clone(),
        state.cache.clone(),
        state.paseto_access_key,
        state.paseto_refresh_key,
        state.access_ttl_minutes,
        state.refresh_ttl_days,
    )
}

fn profile_service(state: &AppState) -> ProfileService {
    ProfileService::new(
        state.db.clone(),
        state.cache.clone(),
        state.storage.clone(),
        state.resume_url_ttl_seconds,
    )
}

fn notification_service(state: &AppState) -> NotificationService {
    NotificationService::new(state.db.clone(), state.cache.clone())
}

fn application_service(state: &AppState) -> ApplicationService {
    ApplicationService::new(
        state.db.clone(),
        state.cache.clone(),
        state.storage.clone(),
        notification_service(state),
        state.mailer.clone(),
        state.resume_url_ttl_seconds,
    )
}

fn matching_service(state: &AppState) -> MatchingService {
    MatchingService::new(
        state.db.clone(),
        notification_service(state),
        state.mailer.clone(),
    )
}

fn internal(context: &'static str) -> impl FnOnce(anyhow::Error) -> AppError {
    move |err| {
        tracing::error!(error = ?err, context, "request failed");
        AppError::internal(context)
    }
}

pub(crate) async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let db = state.db.ping().await.is_ok();
    let redis = state.cache.ping().await.is_ok();
    let status = if db && redis { "ok" } else { "degraded" };

    Json(HealthResponse { status })
}

// ---------------------------------------------------------------------------
// Auth

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub confirm_password: String,
    pub first_name: String,
    pub last_name: String,
    pub role: String,
}

#[derive(Serialize)]
pub struct AuthTokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(with = "time::serde::rfc3339")]
    pub access_expires_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub refresh_expires_at: OffsetDateTime,
}

#[derive(Serialize)]
pub struct RegisterResponse {
    pub user: User,
    pub tokens: AuthTokenResponse,
}

const MIN_PASSWORD_LEN: usize = 8;
const MAX_PASSWORD_LEN: usize = 128;

pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<RegisterResponse>), AppError> {
    let email = payload.email.trim().to_lowercase();
    if email.is_empty() || !email.contains('@') {
        return Err(AppError::bad_request("a valid email is required"));
    }
    if payload.password.len() < MIN_PASSWORD_LEN {
        return Err(AppError::bad_request(
            "password must be at least 8 characters",
        ));
    }
    if payload.password.len() > MAX_PASSWORD_LEN {
        return Err(AppError::bad_request(
            "password must be at most 128 characters",
        ));
    }
    if payload.confirm_password != payload.password {
        return Err(AppError::bad_request("passwords do not match"));
    }
    if payload.first_name.trim().is_empty() || payload.last_name.trim().is_empty() {
        return Err(AppError::bad_request("first and last name are required"));
    }
    let role = Role::parse(&payload.role)
        .ok_or_else(|| AppError::bad_request("role must be employer or candidate"))?;
    // Admin accounts are provisioned out of band.
    if role == Role::Admin {
        return Err(AppError::bad_request("role must be employer or candidate"));
    }

    let service = auth_service(&state);
    let user = service
        .register(
            email,
            payload.password,
            payload.first_name.trim().to_string(),
            payload.last_name.trim().to_string(),
            role,
        )
        .await
        .map_err(|err| {
            if let Some(db_err) = err.downcast_ref::<sqlx::Error>() {
                if let sqlx::Error::Database(db) = db_err {
                    if db.code().as_deref() == Some("23505") {
                        return AppError::conflict("email already registered");
                    }
                }
            }
            tracing::error!(error = ?err, "failed to register");
            AppError::internal("failed to register")
        })?;

    let tokens = service
        .issue_token_pair(user.id, user.role)
        .await
        .map_err(internal("failed to issue tokens"))?;

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            user,
            tokens: AuthTokenResponse {
                access_token: tokens.access_token,
                refresh_token: tokens.refresh_token,
                access_expires_at: tokens.access_expires_at,
                refresh_expires_at: tokens.refresh_expires_at,
            },
        }),
    ))
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct LoginResponse {
    pub user: User,
    pub tokens: AuthTokenResponse,
}

pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    if payload.email.trim().is_empty() || payload.password.trim().is_empty() {
        return Err(AppError::bad_request("email and password are required"));
    }
    if payload.password.len() > MAX_PASSWORD_LEN {
        return Err(AppError::bad_request(
            "password must be at most 128 characters",
        ));
    }

    let service = auth_service(&state);
    let result = service
        .login(&payload.email.trim().to_lowercase(), &payload.password)
        .await
        .map_err(internal("failed to login"))?;

    match result {
        Some((user, tokens)) => Ok(Json(LoginResponse {
            user,
            tokens: AuthTokenResponse {
                access_token: tokens.access_token,
                refresh_token: tokens.refresh_token,
                access_expires_at: tokens.access_expires_at,
                refresh_expires_at: tokens.refresh_expires_at,
            },
        })),
        None => Err(AppError::unauthorized("invalid credentials")),
    }
}

#[derive(Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

pub async fn refresh_token(
    State(state): State<AppState>,
    Json(payload): Json<RefreshRequest>,
) -> Result<Json<AuthTokenResponse>, AppError> {
    if payload.refresh_token.trim().is_empty() {
        return Err(AppError::bad_request("refresh_token is required"));
    }

    let service = auth_service(&state);
    let tokens = service
        .refresh(&payload.refresh_token)
        .await
        .map_err(internal("failed to refresh token"))?;

    match tokens {
        Some(tokens) => Ok(Json(AuthTokenResponse {
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
            access_expires_at: tokens.access_expires_at,
            refresh_expires_at: tokens.refresh_expires_at,
        })),
        None => Err(AppError::unauthorized("invalid refresh token")),
    }
}

#[derive(Deserialize)]
pub struct RevokeRequest {
    pub refresh_token: String,
}

pub async fn revoke_token(
    State(state): State<AppState>,
    Json(payload): Json<RevokeRequest>,
) -> Result<StatusCode, AppError> {
    if payload.refresh_token.trim().is_empty() {
        return Err(AppError::bad_request("refresh_token is required"));
    }

    let service = auth_service(&state);
    service
        .revoke_refresh_token(&payload.refresh_token)
        .await
        .map_err(internal("failed to revoke token"))?;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn get_current_user(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<User>, AppError> {
    let service = auth_service(&state);
    let user = service
        .get_current_user(auth.user_id)
        .await
        .map_err(internal("failed to load user"))?;

    match user {
        Some(user) => Ok(Json(user)),
        None => Err(AppError::not_found("user not found")),
    }
}

// ---------------------------------------------------------------------------
// Profiles

pub async fn get_my_profile(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<Value>, AppError> {
    let service = profile_service(&state);
    match auth.role {
        Role::Candidate => {
            let profile = service
                .get_candidate_profile(auth.user_id)
                .await
                .map_err(internal("failed to load profile"))?
                .ok_or_else(|| AppError::not_found("profile not found"))?;
            Ok(Json(serde_json::to_value(profile).map_err(|err| {
                tracing::error!(error = ?err, "failed to serialize profile");
                AppError::internal("failed to load profile")
            })?))
        }
        Role::Employer => {
            let profile = service
                .get_employer_profile(auth.user_id)
                .await
                .map_err(internal("failed to load profile"))?
                .ok_or_else(|| AppError::not_found("profile not found"))?;
            Ok(Json(serde_json::to_value(profile).map_err(|err| {
                tracing::error!(error = ?err, "failed to serialize profile");
                AppError::internal("failed to load profile")
            })?))
        }
        Role::Admin => Err(AppError::not_found("admins have no profile")),
    }
}

#[derive(Deserialize, Default)]
pub struct CandidateProfilePayload {
    pub phone: Option<String>,
    pub gender: Option<String>,
    pub date_of_birth: Option<Date>,
    pub headline: Option<String>,
    pub about: Option<String>,
    pub linkedin: Option<String>,
    pub github: Option<String>,
    pub twitter: Option<String>,
    pub website: Option<String>,
    pub profile_picture_key: Option<String>,
    pub resume_key: Option<String>,
    pub skill_ids: Option<Vec<Uuid>>,
    pub education: Option<Vec<Education>>,
    pub certifications: Option<Vec<Certification>>,
}

#[derive(Deserialize, Default)]
pub struct EmployerProfilePayload {
    pub company_name: Option<String>,
    pub company_size: Option<String>,
    pub industry: Option<String>,
    pub description: Option<String>,
    pub website_url: Option<String>,
    pub linkedin_url: Option<String>,
    pub logo_key: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
}

pub async fn update_my_profile(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(payload): Json<Value>,
) -> Result<Json<Value>, AppError> {
    let service = profile_service(&state);
    match auth.role {
        Role::Candidate => {
            let payload: CandidateProfilePayload = serde_json::from_value(payload)
                .map_err(|err| AppError::bad_request(format!("invalid payload: {}", err)))?;
            let update = CandidateProfileUpdate {
                phone: payload.phone,
                gender: payload.gender,
                date_of_birth: payload.date_of_birth,
                headline: payload.headline,
                about: payload.about,
                linkedin: payload.linkedin,
                github: payload.github,
                twitter: payload.twitter,
                website: payload.website,
                profile_picture_key: payload.profile_picture_key,
                resume_key: payload.resume_key,
                skill_ids: payload.skill_ids,
                education: payload.education,
                certifications: payload.certifications,
            };
            let profile = service
                .update_candidate_profile(auth.user_id, update)
                .await
                .map_err(internal("failed to update profile"))?
                .ok_or_else(|| AppError::not_found("profile not found"))?;
            Ok(Json(serde_json::to_value(profile).map_err(|err| {
                tracing::error!(error = ?err, "failed to serialize profile");
                AppError::internal("failed to update profile")
            })?))
        }
        Role::Employer => {
            let payload: EmployerProfilePayload = serde_json::from_value(payload)
                .map_err(|err| AppError::bad_request(format!("invalid payload: {}", err)))?;
            let update = EmployerProfileUpdate {
                company_name: payload.company_name,
                company_size: payload.company_size,
                industry: payload.industry,
                description: payload.description,
                website_url: payload.website_url,
                linkedin_url: payload.linkedin_url,
                logo_key: payload.logo_key,
                city: payload.city,
                state: payload.state,
                country: payload.country,
            };
            let profile = service
                .update_employer_profile(auth.user_id, update)
                .await
                .map_err(internal("failed to update profile"))?
                .ok_or_else(|| AppError::not_found("profile not found"))?;
            Ok(Json(serde_json::to_value(profile).map_err(|err| {
                tracing::error!(error = ?err, "failed to serialize profile");
                AppError::internal("failed to update profile")
            })?))
        }
        Role::Admin => Err(AppError::not_found("admins have no profile")),
    }
}

#[derive(Serialize)]
pub struct CompanyPage {
    #[serde(flatten)]
    pub profile: crate::domain::profile::EmployerProfile,
    pub average_rating: Option<f64>,
}

pub async fn get_company(
    State(state): State<AppState>,
    Path(company_id): Path<Uuid>,
) -> Result<Json<CompanyPage>, AppError> {
    let service = profile_service(&state);
    let profile = service
        .get_employer_profile_by_id(company_id)
        .await
        .map_err(internal("failed to load company"))?
        .ok_or_else(|| AppError::not_found("company not found"))?;
    let average_rating = ReviewService::new(state.db.clone())
        .average_rating(company_id)
        .await
        .map_err(internal("failed to load company rating"))?;
    Ok(Json(CompanyPage {
        profile,
        average_rating,
    }))
}

// ---------------------------------------------------------------------------
// Catalog

pub async fn list_skills(
    State(state): State<AppState>,
) -> Result<Json<Vec<Skill>>, AppError> {
    let service = CatalogService::new(state.db.clone());
    let skills = service
        .list_skills()
        .await
        .map_err(internal("failed to list skills"))?;
    Ok(Json(skills))
}

#[derive(Deserialize)]
pub struct CreateSkillRequest {
    pub name: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub description: String,
}

pub async fn create_skill(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(payload): Json<CreateSkillRequest>,
) -> Result<(StatusCode, Json<Skill>), AppError> {
    auth.require_role(Role::Admin)?;
    if payload.name.trim().is_empty() {
        return Err(AppError::bad_request("name is required"));
    }

    let service = CatalogService::new(state.db.clone());
    let skill = service
        .create_skill(
            payload.name.trim().to_string(),
            payload.category,
            payload.description,
        )
        .await
        .map_err(|err| {
            if is_unique_violation(&err) {
                AppError::conflict("skill already exists")
            } else {
                tracing::error!(error = ?err, "failed to create skill");
                AppError::internal("failed to create skill")
            }
        })?;
    Ok((StatusCode::CREATED, Json(skill)))
}

pub async fn list_categories(
    State(state): State<AppState>,
) -> Result<Json<Vec<Category>>, AppError> {
    let service = CatalogService::new(state.db.clone());
    let categories = service
        .list_categories()
        .await
        .map_err(internal("failed to list categories"))?;
    Ok(Json(categories))
}

#[derive(Deserialize)]
pub struct CreateCategoryRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub parent_id: Option<Uuid>,
}

pub async fn create_category(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(payload): Json<CreateCategoryRequest>,
) -> Result<(StatusCode, Json<Category>), AppError> {
    auth.require_role(Role::Admin)?;
    if payload.name.trim().is_empty() {
        return Err(AppError::bad_request("name is required"));
    }

    let service = CatalogService::new(state.db.clone());
    let category = service
        .create_category(
            payload.name.trim().to_string(),
            payload.description,
            payload.parent_id,
        )
        .await
        .map_err(|err| {
            if is_unique_violation(&err) {
                AppError::conflict("category already exists")
            } else {
                tracing::error!(error = ?err, "failed to create category");
                AppError::internal("failed to create category")
            }
        })?;
    Ok((StatusCode::CREATED, Json(category)))
}

// ---------------------------------------------------------------------------
// Jobs

#[derive(Deserialize)]
pub struct CreateJobRequest {
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub responsibilities: Option<Value>,
    #[serde(default)]
    pub requirements: Option<Value>,
    #[serde(default)]
    pub nice_to_have: Option<Value>,
    #[serde(default)]
    pub benefits: Option<Value>,
    pub employment_type: EmploymentType,
    pub location_type: LocationType,
    pub experience_level: ExperienceLevel,
    pub salary_min: Option<i64>,
    pub salary_max: Option<i64>,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default)]
    pub is_salary_disclosed: bool,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub country: String,
    pub application_deadline: Option<Date>,
    #[serde(default = "default_job_status")]
    pub status: JobStatus,
    #[serde(default)]
    pub skills: Vec<JobSkillInput>,
    #[serde(default)]
    pub category_ids: Vec<Uuid>,
}

fn default_currency() -> String {
    "USD".to_string()
}

fn default_job_status() -> JobStatus {
    JobStatus::Draft
}

fn validate_job_fields(
    title: &str,
    description: &str,
    salary_min: Option<i64>,
    salary_max: Option<i64>,
    deadline: Option<Date>,
) -> Result<(), AppError> {
    if title.trim().is_empty() {
        return Err(AppError::bad_request("title is required"));
    }
    if description.trim().is_empty() {
        return Err(AppError::bad_request("description is required"));
    }
    if let (Some(min), Some(max)) = (salary_min, salary_max) {
        if max < min {
            return Err(AppError::bad_request(
                "salary_max must be at least salary_min",
            ));
        }
    }
    if let Some(min) = salary_min {
        if min < 0 {
            return Err(AppError::bad_request("salary_min must not be negative"));
        }
    }
    if let Some(deadline) = deadline {
        if deadline < OffsetDateTime::now_utc().date() {
            return Err(AppError::bad_request(
                "application_deadline must not be in the past",
            ));
        }
    }
    Ok(())
}

pub async fn create_job(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(payload): Json<CreateJobRequest>,
) -> Result<(StatusCode, Json<JobPosting>), AppError> {
    auth.require_role(Role::Employer)?;
    validate_job_fields(
        &payload.title,
        &payload.description,
        payload.salary_min,
        payload.salary_max,
        payload.application_deadline,
    )?;

    let service = JobService::new(state.db.clone());
    let employer_id = service
        .employer_profile_id(auth.user_id)
        .await
        .map_err(internal("failed to create job"))?
        .ok_or_else(|| AppError::forbidden("employer profile required"))?;

    let input = NewJobPosting {
        title: payload.title.trim().to_string(),
        description: payload.description,
        responsibilities: payload.responsibilities.unwrap_or(Value::Array(vec![])),
        requirements: payload.requirements.unwrap_or(Value::Array(vec![])),
        nice_to_have: payload.nice_to_have.unwrap_or(Value::Array(vec![])),
        benefits: payload.benefits.unwrap_or(Value::Array(vec![])),
        employment_type: payload.employment_type,
        location_type: payload.location_type,
        experience_level: payload.experience_level,
        salary_min: payload.salary_min,
        salary_max: payload.salary_max,
        currency: payload.currency,
        is_salary_disclosed: payload.is_salary_disclosed,
        location: payload.location,
        city: payload.city,
        state: payload.state,
        country: payload.country,
        application_deadline: payload.application_deadline,
        status: payload.status,
        skills: payload.skills,
        category_ids: payload.category_ids,
    };

    let job = service
        .create_job(employer_id, input)
        .await
        .map_err(internal("failed to create job"))?;

    // Matching runs once, when a job is first published. It never fails the
    // request that created the job.
    if job.status == JobStatus::Active {
        let matching = matching_service(&state);
        if let Err(err) = matching.notify_matching_candidates(&job).await {
            tracing::error!(error = ?err, job_id = %job.id, "candidate matching pass failed");
        }
    }

    Ok((StatusCode::CREATED, Json(job)))
}

pub async fn get_job(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> Result<Json<JobPosting>, AppError> {
    let service = JobService::new(state.db.clone());
    let job = service
        .get_job(job_id)
        .await
        .map_err(internal("failed to load job"))?
        .ok_or_else(|| AppError::not_found("job not found"))?;
    Ok(Json(job))
}

pub async fn list_jobs(
    State(state): State<AppState>,
    Query(query): Query<PaginationQuery>,
) -> Result<Json<ListResponse<JobPosting>>, AppError> {
    let limit = query.limit.unwrap_or(20).clamp(1, 100);
    let cursor = parse_cursor(query.cursor)?;

    let service = JobService::new(state.db.clone());
    let (jobs, next_cursor) = service
        .list_active_jobs(cursor, limit)
        .await
        .map_err(internal("failed to list jobs"))?;

    Ok(Json(ListResponse {
        items: jobs,
        next_cursor: encode_cursor(next_cursor),
    }))
}

#[derive(Deserialize)]
pub struct UpdateJobRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub responsibilities: Option<Value>,
    pub requirements: Option<Value>,
    pub nice_to_have: Option<Value>,
    pub benefits: Option<Value>,
    pub employment_type: Option<EmploymentType>,
    pub location_type: Option<LocationType>,
    pub experience_level: Option<ExperienceLevel>,
    pub salary_min: Option<i64>,
    pub salary_max: Option<i64>,
    pub currency: Option<String>,
    pub is_salary_disclosed: Option<bool>,
    pub location: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
    pub application_deadline: Option<Date>,
    pub status: Option<JobStatus>,
    pub skills: Option<Vec<JobSkillInput>>,
    pub category_ids: Option<Vec<Uuid>>,
}

async fn require_job_owner(
    service: &JobService,
    auth: &AuthUser,
    job_id: Uuid,
) -> Result<(), AppError> {
    let owner = service
        .job_owner(job_id)
        .await
        .map_err(internal("failed to load job"))?
        .ok_or_else(|| AppError::not_found("job not found"))?;

    if auth.role == Role::Admin {
        return Ok(());
    }
    let employer_id = service
        .employer_profile_id(auth.user_id)
        .await
        .map_err(internal("failed to load job"))?;
    if employer_id != Some(owner) {
        return Err(AppError::forbidden("not your job posting"));
    }
    Ok(())
}

pub async fn update_job(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(job_id): Path<Uuid>,
    Json(payload): Json<UpdateJobRequest>,
) -> Result<Json<JobPosting>, AppError> {
    auth.require_role(Role::Employer)?;

    let service = JobService::new(state.db.clone());
    require_job_owner(&service, &auth, job_id).await?;

    // Invariants hold on the merged posting, not just the patched fields.
    let current = service
        .get_job(job_id)
        .await
        .map_err(internal("failed to load job"))?
        .ok_or_else(|| AppError::not_found("job not found"))?;
    let salary_min = payload.salary_min.or(current.salary_min);
    let salary_max = payload.salary_max.or(current.salary_max);
    if let (Some(min), Some(max)) = (salary_min, salary_max) {
        if max < min {
            return Err(AppError::bad_request(
                "salary_max must be at least salary_min",
            ));
        }
    }
    if let Some(min) = payload.salary_min {
        if min < 0 {
            return Err(AppError::bad_request("salary_min must not be negative"));
        }
    }
    if let Some(deadline) = payload.application_deadline {
        if deadline < OffsetDateTime::now_utc().date() {
            return Err(AppError::bad_request(
                "application_deadline must not be in the past",
            ));
        }
    }

    let update = JobPostingUpdate {
        title: payload.title,
        description: payload.description,
        responsibilities: payload.responsibilities,
        requirements: payload.requirements,
        nice_to_have: payload.nice_to_have,
        benefits: payload.benefits,
        employment_type: payload.employment_type,
        location_type: payload.location_type,
        experience_level: payload.experience_level,
        salary_min: payload.salary_min,
        salary_max: payload.salary_max,
        currency: payload.currency,
        is_salary_disclosed: payload.is_salary_disclosed,
        location: payload.location,
        city: payload.city,
        state: payload.state,
        country: payload.country,
        application_deadline: payload.application_deadline,
        status: payload.status,
        skills: payload.skills,
        category_ids: payload.category_ids,
    };

    let job = service
        .update_job(job_id, update)
        .await
        .map_err(internal("failed to update job"))?
        .ok_or_else(|| AppError::not_found("job not found"))?;
    Ok(Json(job))
}

pub async fn delete_job(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(job_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    auth.require_role(Role::Employer)?;

    let service = JobService::new(state.db.clone());
    require_job_owner(&service, &auth, job_id).await?;

    service
        .delete_job(job_id)
        .await
        .map_err(internal("failed to delete job"))?;
    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// Applications

#[derive(Deserialize)]
pub struct ApplyRequest {
    #[serde(default)]
    pub cover_letter: String,
    pub resume_key: Option<String>,
    pub expected_salary: Option<i64>,
    pub available_from: Option<Date>,
}

pub async fn apply_to_job(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(job_id): Path<Uuid>,
    Json(payload): Json<ApplyRequest>,
) -> Result<(StatusCode, Json<Application>), AppError> {
    if auth.role != Role::Candidate {
        return Err(AppError::forbidden("only candidates can apply"));
    }
    if let Some(salary) = payload.expected_salary {
        if salary < 0 {
            return Err(AppError::bad_request("expected_salary must not be negative"));
        }
    }

    let jobs = JobService::new(state.db.clone());
    let candidate_id = jobs
        .candidate_profile_id(auth.user_id)
        .await
        .map_err(internal("failed to apply"))?
        .ok_or_else(|| AppError::forbidden("candidate profile required"))?;

    let service = application_service(&state);
    let outcome = service
        .apply(
            candidate_id,
            auth.user_id,
            job_id,
            NewApplication {
                cover_letter: payload.cover_letter,
                resume_key: payload.resume_key,
                expected_salary: payload.expected_salary,
                available_from: payload.available_from,
            },
        )
        .await
        .map_err(internal("failed to apply"))?;

    match outcome {
        ApplyOutcome::Created(application) => Ok((StatusCode::CREATED, Json(application))),
        ApplyOutcome::JobNotFound => Err(AppError::not_found("job not found")),
        ApplyOutcome::JobNotOpen => Err(AppError::bad_request("job is not open for applications")),
        ApplyOutcome::Duplicate => Err(AppError::conflict("already applied to this job")),
    }
}

#[derive(Deserialize)]
pub struct ApplicationListQuery {
    pub job_id: Option<Uuid>,
}

pub async fn list_applications(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<ApplicationListQuery>,
) -> Result<Json<Value>, AppError> {
    let jobs = JobService::new(state.db.clone());
    let service = application_service(&state);

    match auth.role {
        Role::Candidate => {
            let candidate_id = jobs
                .candidate_profile_id(auth.user_id)
                .await
                .map_err(internal("failed to list applications"))?
                .ok_or_else(|| AppError::forbidden("candidate profile required"))?;
            let applications = service
                .list_for_candidate(candidate_id, auth.user_id)
                .await
                .map_err(internal("failed to list applications"))?;
            Ok(Json(serde_json::json!({ "items": applications })))
        }
        Role::Employer => {
            let employer_id = jobs
                .employer_profile_id(auth.user_id)
                .await
                .map_err(internal("failed to list applications"))?
                .ok_or_else(|| AppError::forbidden("employer profile required"))?;
            let applications = service
                .list_for_employer(employer_id, auth.user_id, query.job_id)
                .await
                .map_err(internal("failed to list applications"))?;
            Ok(Json(serde_json::json!({ "items": applications })))
        }
        Role::Admin => Err(AppError::forbidden("listing requires a profile role")),
    }
}

#[derive(Serialize)]
pub struct ApplicationDetailResponse {
    #[serde(flatten)]
    pub application: Application,
    pub job_title: String,
    pub company_name: String,
    pub candidate_name: String,
    pub status_history: Vec<StatusHistoryEntry>,
}

async fn load_owned_detail(
    state: &AppState,
    auth: &AuthUser,
    application_id: Uuid,
) -> Result<crate::app::applications::ApplicationDetail, AppError> {
    let service = application_service(state);
    let detail = service
        .get_detail(application_id)
        .await
        .map_err(internal("failed to load application"))?
        .ok_or_else(|| AppError::not_found("application not found"))?;

    let allowed = auth.role == Role::Admin
        || detail.candidate_user_id == auth.user_id
        || detail.employer_user_id == auth.user_id;
    if !allowed {
        return Err(AppError::forbidden("not your application"));
    }
    Ok(detail)
}

pub async fn get_application(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(application_id): Path<Uuid>,
) -> Result<Json<ApplicationDetailResponse>, AppError> {
    let detail = load_owned_detail(&state, &auth, application_id).await?;
    Ok(Json(ApplicationDetailResponse {
        application: detail.application,
        job_title: detail.job_title,
        company_name: detail.company_name,
        candidate_name: detail.candidate_name,
        status_history: detail.status_history,
    }))
}

pub async fn withdraw_application(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(application_id): Path<Uuid>,
) -> Result<Json<Application>, AppError> {
    if auth.role != Role::Candidate {
        return Err(AppError::forbidden("only candidates can withdraw"));
    }

    let jobs = JobService::new(state.db.clone());
    let candidate_id = jobs
        .candidate_profile_id(auth.user_id)
        .await
        .map_err(internal("failed to withdraw"))?
        .ok_or_else(|| AppError::forbidden("candidate profile required"))?;

    let service = application_service(&state);
    let outcome = service
        .withdraw(application_id, candidate_id, auth.user_id)
        .await
        .map_err(internal("failed to withdraw"))?;

    match outcome {
        WithdrawOutcome::Withdrawn(application) => Ok(Json(application)),
        WithdrawOutcome::NotFound => Err(AppError::not_found("application not found")),
        WithdrawOutcome::AlreadyTerminal => {
            Err(AppError::conflict("application is already settled"))
        }
    }
}

#[derive(Deserialize)]
pub struct UpdateStatusRequest {
    pub status: ApplicationStatus,
    #[serde(default)]
    pub notes: String,
}

pub async fn update_application_status(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(application_id): Path<Uuid>,
    Json(payload): Json<UpdateStatusRequest>,
) -> Result<Json<Application>, AppError> {
    auth.require_role(Role::Employer)?;
    if payload.status == ApplicationStatus::Withdrawn {
        return Err(AppError::bad_request("withdrawal is candidate-driven"));
    }

    let detail = load_owned_detail(&state, &auth, application_id).await?;
    if auth.role != Role::Admin && detail.employer_user_id != auth.user_id {
        return Err(AppError::forbidden("not your application"));
    }

    let service = application_service(&state);
    let outcome = service
        .update_status(application_id, auth.user_id, payload.status, &payload.notes)
        .await
        .map_err(internal("failed to update status"))?;

    match outcome {
        StatusChangeOutcome::Updated(application) => Ok(Json(application)),
        StatusChangeOutcome::NotFound => Err(AppError::not_found("application not found")),
        StatusChangeOutcome::InvalidTransition { from, to } => Err(AppError::bad_request(format!(
            "cannot move an application from {} to {}",
            from.as_str(),
            to.as_str()
        ))),
    }
}

#[derive(Serialize)]
pub struct ResumeUrlResponse {
    pub url: String,
}

pub async fn get_application_resume_url(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(application_id): Path<Uuid>,
) -> Result<Json<ResumeUrlResponse>, AppError> {
    auth.require_role(Role::Employer)?;

    let detail = load_owned_detail(&state, &auth, application_id).await?;
    if auth.role != Role::Admin && detail.employer_user_id != auth.user_id {
        return Err(AppError::forbidden("not your application"));
    }

    let resume_key = detail
        .application
        .resume_key
        .ok_or_else(|| AppError::not_found("no resume attached"))?;

    let service = application_service(&state);
    let url = service
        .resume_download_url(&resume_key)
        .await
        .map_err(internal("failed to presign resume URL"))?;
    Ok(Json(ResumeUrlResponse { url }))
}

// ---------------------------------------------------------------------------
// Saved jobs

#[derive(Deserialize, Default)]
pub struct SaveJobRequest {
    #[serde(default)]
    pub notes: String,
}

pub async fn save_job(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(job_id): Path<Uuid>,
    payload: Option<Json<SaveJobRequest>>,
) -> Result<StatusCode, AppError> {
    if auth.role != Role::Candidate {
        return Err(AppError::forbidden("only candidates can save jobs"));
    }

    let service = JobService::new(state.db.clone());
    let candidate_id = service
        .candidate_profile_id(auth.user_id)
        .await
        .map_err(internal("failed to save job"))?
        .ok_or_else(|| AppError::forbidden("candidate profile required"))?;

    if service
        .get_job(job_id)
        .await
        .map_err(internal("failed to save job"))?
        .is_none()
    {
        return Err(AppError::not_found("job not found"));
    }

    let notes = payload.map(|Json(p)| p.notes).unwrap_or_default();
    service
        .save_job(candidate_id, job_id, notes)
        .await
        .map_err(internal("failed to save job"))?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn unsave_job(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(job_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    if auth.role != Role::Candidate {
        return Err(AppError::forbidden("only candidates can save jobs"));
    }

    let service = JobService::new(state.db.clone());
    let candidate_id = service
        .candidate_profile_id(auth.user_id)
        .await
        .map_err(internal("failed to unsave job"))?
        .ok_or_else(|| AppError::forbidden("candidate profile required"))?;

    service
        .unsave_job(candidate_id, job_id)
        .await
        .map_err(internal("failed to unsave job"))?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_saved_jobs(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<Vec<SavedJob>>, AppError> {
    if auth.role != Role::Candidate {
        return Err(AppError::forbidden("only candidates can save jobs"));
    }

    let service = JobService::new(state.db.clone());
    let candidate_id = service
        .candidate_profile_id(auth.user_id)
        .await
        .map_err(internal("failed to list saved jobs"))?
        .ok_or_else(|| AppError::forbidden("candidate profile required"))?;

    let saved = service
        .list_saved_jobs(candidate_id)
        .await
        .map_err(internal("failed to list saved jobs"))?;
    Ok(Json(saved))
}

// ---------------------------------------------------------------------------
// Notifications

pub async fn list_notifications(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<NotificationFeed>, AppError> {
    let service = notification_service(&state);
    let feed = service
        .list_for_user(auth.user_id)
        .await
        .map_err(internal("failed to list notifications"))?;
    Ok(Json(feed))
}

pub async fn mark_notification_read(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(notification_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    let service = notification_service(&state);
    let found = service
        .mark_read(auth.user_id, notification_id)
        .await
        .map_err(internal("failed to mark notification read"))?;
    if found {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::not_found("notification not found"))
    }
}

pub async fn mark_all_notifications_read(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<StatusCode, AppError> {
    let service = notification_service(&state);
    service
        .mark_all_read(auth.user_id)
        .await
        .map_err(internal("failed to mark notifications read"))?;
    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// Reviews

#[derive(Deserialize)]
pub struct CreateReviewRequest {
    pub rating: i32,
    #[serde(default)]
    pub review_text: String,
}

pub async fn create_company_review(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(company_id): Path<Uuid>,
    Json(payload): Json<CreateReviewRequest>,
) -> Result<(StatusCode, Json<CompanyReview>), AppError> {
    if !(1..=5).contains(&payload.rating) {
        return Err(AppError::bad_request("rating must be between 1 and 5"));
    }

    let service = ReviewService::new(state.db.clone());
    let outcome = service
        .create_review(company_id, auth.user_id, payload.rating, payload.review_text)
        .await
        .map_err(internal("failed to create review"))?;

    match outcome {
        ReviewOutcome::Created(review) => Ok((StatusCode::CREATED, Json(review))),
        ReviewOutcome::CompanyNotFound => Err(AppError::not_found("company not found")),
        ReviewOutcome::OwnCompany => {
            Err(AppError::forbidden("cannot review your own company"))
        }
        ReviewOutcome::Duplicate => Err(AppError::conflict("already reviewed this company")),
    }
}

pub async fn list_company_reviews(
    State(state): State<AppState>,
    Path(company_id): Path<Uuid>,
) -> Result<Json<Vec<CompanyReview>>, AppError> {
    let service = ReviewService::new(state.db.clone());
    let reviews = service
        .list_for_company(company_id)
        .await
        .map_err(internal("failed to list reviews"))?;
    Ok(Json(reviews))
}

pub async fn list_received_reviews(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<Vec<CompanyReview>>, AppError> {
    auth.require_role(Role::Employer)?;

    let jobs = JobService::new(state.db.clone());
    let employer_id = jobs
        .employer_profile_id(auth.user_id)
        .await
        .map_err(internal("failed to list reviews"))?
        .ok_or_else(|| AppError::forbidden("employer profile required"))?;

    let service = ReviewService::new(state.db.clone());
    let reviews = service
        .list_received(employer_id)
        .await
        .map_err(internal("failed to list reviews"))?;
    Ok(Json(reviews))
}

// ---------------------------------------------------------------------------
// Uploads

#[derive(Deserialize)]
pub struct CreateUploadRequest {
    pub kind: String,
    pub content_type: String,
    pub content_length: i64,
}

pub async fn create_upload(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(payload): Json<CreateUploadRequest>,
) -> Result<(StatusCode, Json<crate::app::uploads::PresignedUpload>), AppError> {
    let kind = UploadKind::parse(&payload.kind)
        .ok_or_else(|| AppError::bad_request("unknown upload kind"))?;
    match kind {
        UploadKind::Resume | UploadKind::ProfilePicture => {
            if auth.role != Role::Candidate {
                return Err(AppError::forbidden("candidate uploads only"));
            }
        }
        UploadKind::CompanyLogo => {
            auth.require_role(Role::Employer)?;
        }
    }

    let service = UploadService::new(state.storage.clone(), state.upload_url_ttl_seconds);
    let outcome = service
        .presign(auth.user_id, kind, &payload.content_type, payload.content_length)
        .await
        .map_err(internal("failed to presign upload"))?;

    match outcome {
        UploadOutcome::Ready(upload) => Ok((StatusCode::CREATED, Json(upload))),
        UploadOutcome::UnsupportedType => {
            Err(AppError::bad_request("unsupported content type"))
        }
        UploadOutcome::TooLarge { max_bytes } => Err(AppError::bad_request(format!(
            "file exceeds the {} byte limit",
            max_bytes
        ))),
    }
}

fn is_unique_violation(err: &anyhow::Error) -> bool {
    matches!(
        err.downcast_ref::<sqlx::Error>(),
        Some(sqlx::Error::Database(db)) if db.code().as_deref() == Some("23505")
    )
}
