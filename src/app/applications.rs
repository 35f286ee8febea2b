use anyhow::Result;
use sqlx::Row;
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use crate::app::notifications::NotificationService;
use crate::domain::application::{
    Application, ApplicationStatus, CandidateApplication, EmployerApplication, StatusHistoryEntry,
};
use crate::domain::notification::NotificationType;
use crate::infra::cache::{self, RedisCache};
use crate::infra::db::Db;
use crate::infra::mailer::Mailer;
use crate::infra::storage::ObjectStorage;

const APPLICATIONS_CACHE_TTL_SECONDS: u64 = 300;

#[derive(Debug)]
pub struct NewApplication {
    pub cover_letter: String,
    pub resume_key: Option<String>,
    pub expected_salary: Option<i64>,
    pub available_from: Option<Date>,
}

#[derive(Debug)]
pub enum ApplyOutcome {
    Created(Application),
    JobNotFound,
    JobNotOpen,
    Duplicate,
}

#[derive(Debug)]
pub enum WithdrawOutcome {
    Withdrawn(Application),
    NotFound,
    AlreadyTerminal,
}

#[derive(Debug)]
pub enum StatusChangeOutcome {
    Updated(Application),
    NotFound,
    InvalidTransition {
        from: ApplicationStatus,
        to: ApplicationStatus,
    },
}

/// Full application view with the parties on both sides, used for detail
/// responses and ownership checks.
#[derive(Debug)]
pub struct ApplicationDetail {
    pub application: Application,
    pub job_title: String,
    pub company_name: String,
    pub candidate_name: String,
    pub candidate_user_id: Uuid,
    pub employer_id: Uuid,
    pub employer_user_id: Uuid,
    pub status_history: Vec<StatusHistoryEntry>,
}

#[derive(Clone)]
pub struct ApplicationService {
    db: Db,
    cache: RedisCache,
    storage: ObjectStorage,
    notifications: NotificationService,
    mailer: Mailer,
    resume_url_ttl_seconds: u64,
}

impl ApplicationService {
    pub fn new(
        db: Db,
        cache: RedisCache,
        storage: ObjectStorage,
        notifications: NotificationService,
        mailer: Mailer,
        resume_url_ttl_seconds: u64,
    ) -> Self {
        Self {
            db,
            cache,
            storage,
            notifications,
            mailer,
            resume_url_ttl_seconds,
        }
    }

    pub async fn apply(
        &self,
        candidate_id: Uuid,
        candidate_user_id: Uuid,
        job_id: Uuid,
        input: NewApplication,
    ) -> Result<ApplyOutcome> {
        let job = sqlx::query(
            "SELECT j.title, j.status, e.user_id AS employer_user_id, e.company_name \
             FROM job_postings j \
             JOIN employer_profiles e ON e.id = j.employer_id \
             WHERE j.id = $1",
        )
        .bind(job_id)
        .fetch_optional(self.db.pool())
        .await?;

        let Some(job) = job else {
            return Ok(ApplyOutcome::JobNotFound);
        };
        let status: String = job.get("status");
        if status != "active" {
            return Ok(ApplyOutcome::JobNotOpen);
        }
        let job_title: String = job.get("title");
        let company_name: String = job.get("company_name");
        let employer_user_id: Uuid = job.get("employer_user_id");

        let mut tx = self.db.pool().begin().await?;

        let inserted = sqlx::query(
            "INSERT INTO applications \
             (job_id, candidate_id, cover_letter, resume_key, expected_salary, available_from) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING id, job_id, candidate_id, cover_letter, resume_key, expected_salary, \
                       available_from, status, is_withdrawn, applied_at, reviewed_at",
        )
        .bind(job_id)
        .bind(candidate_id)
        .bind(&input.cover_letter)
        .bind(&input.resume_key)
        .bind(input.expected_salary)
        .bind(input.available_from)
        .fetch_one(&mut *tx)
        .await;

        let row = match inserted {
            Ok(row) => row,
            Err(err) if is_unique_violation(&err) => {
                tx.rollback().await?;
                return Ok(ApplyOutcome::Duplicate);
            }
            Err(err) => return Err(err.into()),
        };

        sqlx::query(
            "UPDATE job_postings SET applications_count = applications_count + 1 WHERE id = $1",
        )
        .bind(job_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        let application = application_from_row(&row)?;

        let candidate_name: String = sqlx::query(
            "SELECT u.first_name || ' ' || u.last_name AS name FROM users u WHERE u.id = $1",
        )
        .bind(candidate_user_id)
        .fetch_one(self.db.pool())
        .await?
        .get("name");

        self.notifications
            .create(
                employer_user_id,
                NotificationType::Application,
                &format!("New application for {}", job_title),
                &format!("{} applied for {}.", candidate_name, job_title),
            )
            .await?;
        self.notifications
            .create(
                candidate_user_id,
                NotificationType::Application,
                &format!("Application submitted: {}", job_title),
                &format!(
                    "Your application for {} at {} was submitted.",
                    job_title, company_name
                ),
            )
            .await?;

        self.cache
            .invalidate(&cache::applications_key(candidate_user_id))
            .await;
        self.cache
            .invalidate(&cache::applications_key(employer_user_id))
            .await;

        Ok(ApplyOutcome::Created(application))
    }

    /// Candidate-side listing, cached per user.
    pub async fn list_for_candidate(
        &self,
        candidate_id: Uuid,
        candidate_user_id: Uuid,
    ) -> Result<Vec<CandidateApplication>> {
        let key = cache::applications_key(candidate_user_id);
        if let Some(cached) = self.cache.get_json::<Vec<CandidateApplication>>(&key).await {
            return Ok(cached);
        }

        let rows = sqlx::query(
            "SELECT a.id, a.job_id, a.status, a.applied_at, j.title, e.company_name \
             FROM applications a \
             JOIN job_postings j ON j.id = a.job_id \
             JOIN employer_profiles e ON e.id = j.employer_id \
             WHERE a.candidate_id = $1 \
             ORDER BY a.applied_at DESC, a.id DESC",
        )
        .bind(candidate_id)
        .fetch_all(self.db.pool())
        .await?;

        let mut applications = Vec::with_capacity(rows.len());
        for row in rows {
            let status: String = row.get("status");
            let status = ApplicationStatus::parse(&status)
                .ok_or_else(|| anyhow::anyhow!("unknown application status: {}", status))?;
            applications.push(CandidateApplication {
                id: row.get("id"),
                job_id: row.get("job_id"),
                job_title: row.get("title"),
                company_name: row.get("company_name"),
                status,
                applied_at: row.get("applied_at"),
            });
        }

        self.cache
            .put_json(&key, &applications, APPLICATIONS_CACHE_TTL_SECONDS)
            .await;
        Ok(applications)
    }

    /// Employer-side listing across all of the employer's jobs, optionally
    /// narrowed to one job. Only the unfiltered view is cached.
    pub async fn list_for_employer(
        &self,
        employer_id: Uuid,
        employer_user_id: Uuid,
        job_id: Option<Uuid>,
    ) -> Result<Vec<EmployerApplication>> {
        let key = cache::applications_key(employer_user_id);
        if job_id.is_none() {
            if let Some(cached) = self.cache.get_json::<Vec<EmployerApplication>>(&key).await {
                return Ok(cached);
            }
        }

        let rows = sqlx::query(
            "SELECT a.id, a.job_id, a.status, a.expected_salary, a.applied_at, j.title, \
                    u.first_name || ' ' || u.last_name AS candidate_name, cp.headline \
             FROM applications a \
             JOIN job_postings j ON j.id = a.job_id \
             JOIN candidate_profiles cp ON cp.id = a.candidate_id \
             JOIN users u ON u.id = cp.user_id \
             WHERE j.employer_id = $1 AND ($2::uuid IS NULL OR a.job_id = $2) \
             ORDER BY a.applied_at DESC, a.id DESC",
        )
        .bind(employer_id)
        .bind(job_id)
        .fetch_all(self.db.pool())
        .await?;

        let mut applications = Vec::with_capacity(rows.len());
        for row in rows {
            let status: String = row.get("status");
            let status = ApplicationStatus::parse(&status)
                .ok_or_else(|| anyhow::anyhow!("unknown application status: {}", status))?;
            applications.push(EmployerApplication {
                id: row.get("id"),
                job_id: row.get("job_id"),
                job_title: row.get("title"),
                candidate_name: row.get("candidate_name"),
                candidate_headline: row.get("headline"),
                status,
                expected_salary: row.get("expected_salary"),
                applied_at: row.get("applied_at"),
            });
        }

        if job_id.is_none() {
            self.cache
                .put_json(&key, &applications, APPLICATIONS_CACHE_TTL_SECONDS)
                .await;
        }
        Ok(applications)
    }

    pub async fn get_detail(&self, application_id: Uuid) -> Result<Option<ApplicationDetail>> {
        let row = sqlx::query(
            "SELECT a.id, a.job_id, a.candidate_id, a.cover_letter, a.resume_key, \
                    a.expected_salary, a.available_from, a.status, a.is_withdrawn, \
                    a.applied_at, a.reviewed_at, \
                    j.title, j.employer_id, \
                    e.company_name, e.user_id AS employer_user_id, \
                    cu.id AS candidate_user_id, \
                    cu.first_name || ' ' || cu.last_name AS candidate_name \
             FROM applications a \
             JOIN job_postings j ON j.id = a.job_id \
             JOIN employer_profiles e ON e.id = j.employer_id \
             JOIN candidate_profiles cp ON cp.id = a.candidate_id \
             JOIN users cu ON cu.id = cp.user_id \
             WHERE a.id = $1",
        )
        .bind(application_id)
        .fetch_optional(self.db.pool())
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let application = application_from_row(&row)?;
        let history = self.load_status_history(application_id).await?;

        Ok(Some(ApplicationDetail {
            application,
            job_title: row.get("title"),
            company_name: row.get("company_name"),
            candidate_name: row.get("candidate_name"),
            candidate_user_id: row.get("candidate_user_id"),
            employer_id: row.get("employer_id"),
            employer_user_id: row.get("employer_user_id"),
            status_history: history,
        }))
    }

    pub async fn withdraw(
        &self,
        application_id: Uuid,
        candidate_id: Uuid,
        candidate_user_id: Uuid,
    ) -> Result<WithdrawOutcome> {
        let row = sqlx::query(
            "SELECT a.status, e.user_id AS employer_user_id \
             FROM applications a \
             JOIN job_postings j ON j.id = a.job_id \
             JOIN employer_profiles e ON e.id = j.employer_id \
             WHERE a.id = $1 AND a.candidate_id = $2",
        )
        .bind(application_id)
        .bind(candidate_id)
        .fetch_optional(self.db.pool())
        .await?;

        let Some(row) = row else {
            return Ok(WithdrawOutcome::NotFound);
        };
        let employer_user_id: Uuid = row.get("employer_user_id");
        let status: String = row.get("status");
        let status = ApplicationStatus::parse(&status)
            .ok_or_else(|| anyhow::anyhow!("unknown application status: {}", status))?;
        if status.is_terminal() {
            return Ok(WithdrawOutcome::AlreadyTerminal);
        }

        let mut tx = self.db.pool().begin().await?;

        let row = sqlx::query(
            "UPDATE applications SET status = 'withdrawn', is_withdrawn = TRUE \
             WHERE id = $1 \
             RETURNING id, job_id, candidate_id, cover_letter, resume_key, expected_salary, \
                       available_from, status, is_withdrawn, applied_at, reviewed_at",
        )
        .bind(application_id)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            "INSERT INTO application_status_history \
             (application_id, old_status, new_status, changed_by, notes) \
             VALUES ($1, $2, 'withdrawn', $3, 'Withdrawn by candidate')",
        )
        .bind(application_id)
        .bind(status.as_str())
        .bind(candidate_user_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        self.cache
            .invalidate(&cache::applications_key(candidate_user_id))
            .await;
        self.cache
            .invalidate(&cache::applications_key(employer_user_id))
            .await;

        Ok(WithdrawOutcome::Withdrawn(application_from_row(&row)?))
    }

    pub async fn update_status(
        &self,
        application_id: Uuid,
        changed_by: Uuid,
        next: ApplicationStatus,
        notes: &str,
    ) -> Result<StatusChangeOutcome> {
        let Some(detail) = self.get_detail(application_id).await? else {
            return Ok(StatusChangeOutcome::NotFound);
        };
        let current = detail.application.status;
        if !current.can_transition_to(next) {
            return Ok(StatusChangeOutcome::InvalidTransition {
                from: current,
                to: next,
            });
        }

        let mut tx = self.db.pool().begin().await?;

        let row = sqlx::query(
            "UPDATE applications \
             SET status = $2, reviewed_at = COALESCE(reviewed_at, now()) \
             WHERE id = $1 \
             RETURNING id, job_id, candidate_id, cover_letter, resume_key, expected_salary, \
                       available_from, status, is_withdrawn, applied_at, reviewed_at",
        )
        .bind(application_id)
        .bind(next.as_str())
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            "INSERT INTO application_status_history \
             (application_id, old_status, new_status, changed_by, notes) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(application_id)
        .bind(current.as_str())
        .bind(next.as_str())
        .bind(changed_by)
        .bind(notes)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        let notification_type = if next == ApplicationStatus::Interview {
            NotificationType::Interview
        } else {
            NotificationType::ApplicationStatus
        };
        self.notifications
            .create(
                detail.candidate_user_id,
                notification_type,
                &format!("Application update: {}", detail.job_title),
                &format!(
                    "Your application for {} at {} is now {}.",
                    detail.job_title,
                    detail.company_name,
                    next.as_str()
                ),
            )
            .await?;

        let candidate_email: String =
            sqlx::query("SELECT email FROM users WHERE id = $1")
                .bind(detail.candidate_user_id)
                .fetch_one(self.db.pool())
                .await?
                .get("email");
        let body = format!(
            "Hi {},\n\nYour application for {} at {} moved to: {}.\n\n\
             Log in for details.",
            detail.candidate_name,
            detail.job_title,
            detail.company_name,
            next.as_str()
        );
        if let Err(err) = self
            .mailer
            .send(
                &candidate_email,
                &format!("Application update: {}", detail.job_title),
                &body,
            )
            .await
        {
            tracing::warn!(error = ?err, application_id = %application_id, "status email failed");
        }

        self.cache
            .invalidate(&cache::applications_key(detail.candidate_user_id))
            .await;
        self.cache
            .invalidate(&cache::applications_key(detail.employer_user_id))
            .await;

        Ok(StatusChangeOutcome::Updated(application_from_row(&row)?))
    }

    /// Short-lived download link for the application's resume, for the
    /// employer reviewing it. None when no resume was attached.
    pub async fn resume_download_url(&self, resume_key: &str) -> Result<String> {
        self.storage
            .presign_download(resume_key, self.resume_url_ttl_seconds)
            .await
    }

    async fn load_status_history(&self, application_id: Uuid) -> Result<Vec<StatusHistoryEntry>> {
        let rows = sqlx::query(
            "SELECT id, old_status, new_status, changed_by, notes, created_at \
             FROM application_status_history \
             WHERE application_id = $1 \
             ORDER BY created_at ASC, id ASC",
        )
        .bind(application_id)
        .fetch_all(self.db.pool())
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| StatusHistoryEntry {
                id: row.get("id"),
                old_status: row.get("old_status"),
                new_status: row.get("new_status"),
                changed_by: row.get("changed_by"),
                notes: row.get("notes"),
                created_at: row.get("created_at"),
            })
            .collect())
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(
        err,
        sqlx::Error::Database(db) if db.code().as_deref() == Some("23505")
    )
}

fn application_from_row(row: &sqlx::postgres::PgRow) -> Result<Application> {
    let status: String = row.get("status");
    let status = ApplicationStatus::parse(&status)
        .ok_or_else(|| anyhow::anyhow!("unknown application status: {}", status))?;
    let resume_key: Option<String> = row.get("resume_key");
    Ok(Application {
        id: row.get("id"),
        job_id: row.get("job_id"),
        candidate_id: row.get("candidate_id"),
        cover_letter: row.get("cover_letter"),
        has_resume: resume_key.is_some(),
        resume_key,
        expected_salary: row.get("expected_salary"),
        available_from: row.get("available_from"),
        status,
        is_withdrawn: row.get("is_withdrawn"),
        applied_at: row.get("applied_at"),
        reviewed_at: row.get("reviewed_at"),
    })
}
