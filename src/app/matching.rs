use anyhow::Result;
use sqlx::Row;
use uuid::Uuid;

use crate::app::notifications::NotificationService;
use crate::domain::job::JobPosting;
use crate::domain::notification::NotificationType;
use crate::infra::db::Db;
use crate::infra::mailer::Mailer;

/// Skill-based candidate matching, run when a job posting first goes active.
/// A candidate matches when they hold at least one of the job's required
/// skills. Each (candidate, job) pair is recorded at most once, so re-running
/// the pass never duplicates alerts.
#[derive(Clone)]
pub struct MatchingService {
    db: Db,
    notifications: NotificationService,
    mailer: Mailer,
}

#[derive(Debug)]
struct MatchedCandidate {
    candidate_id: Uuid,
    user_id: Uuid,
    email: String,
    first_name: String,
    matching_skills: Vec<String>,
}

impl MatchingService {
    pub fn new(db: Db, notifications: NotificationService, mailer: Mailer) -> Self {
        Self {
            db,
            notifications,
            mailer,
        }
    }

    /// Notifies every matching candidate about the job. Failures here must
    /// never surface to the job-creation caller; run under a log-and-continue
    /// wrapper.
    pub async fn notify_matching_candidates(&self, job: &JobPosting) -> Result<usize> {
        let required_skills: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM job_skills WHERE job_id = $1 AND is_required",
        )
        .bind(job.id)
        .fetch_one(self.db.pool())
        .await?;
        if required_skills == 0 {
            tracing::debug!(job_id = %job.id, "job has no required skills, skipping matching");
            return Ok(0);
        }

        let candidates = self.find_matching_candidates(job.id).await?;
        let mut notified = 0;

        for candidate in candidates {
            let inserted = sqlx::query(
                "INSERT INTO job_notifications (candidate_id, job_id) \
                 VALUES ($1, $2) ON CONFLICT (candidate_id, job_id) DO NOTHING",
            )
            .bind(candidate.candidate_id)
            .bind(job.id)
            .execute(self.db.pool())
            .await?
            .rows_affected()
                > 0;

            if !inserted {
                continue;
            }

            let skills = candidate.matching_skills.join(", ");
            let title = format!("New job match: {}", job.title);
            let content = format!(
                "{} at {} matches your skills ({}).",
                job.title, job.company_name, skills
            );
            self.notifications
                .create(candidate.user_id, NotificationType::JobAlert, &title, &content)
                .await?;

            let body = format!(
                "Hi {},\n\nA new opening may interest you: {} at {}.\n\
                 It calls for skills you have listed: {}.\n\n\
                 Log in to view the posting and apply.",
                candidate.first_name, job.title, job.company_name, skills
            );
            if let Err(err) = self.mailer.send(&candidate.email, &title, &body).await {
                tracing::warn!(
                    error = ?err,
                    candidate_id = %candidate.candidate_id,
                    job_id = %job.id,
                    "job match email failed"
                );
            }

            notified += 1;
        }

        Ok(notified)
    }

    async fn find_matching_candidates(&self, job_id: Uuid) -> Result<Vec<MatchedCandidate>> {
        let rows = sqlx::query(
            "SELECT cp.id AS candidate_id, u.id AS user_id, u.email, u.first_name, \
                    array_agg(s.name ORDER BY s.name) AS matching_skills \
             FROM candidate_skills cs \
             JOIN candidate_profiles cp ON cp.id = cs.candidate_id \
             JOIN users u ON u.id = cp.user_id AND u.is_active \
             JOIN job_skills js ON js.skill_id = cs.skill_id \
                 AND js.job_id = $1 AND js.is_required \
             JOIN skills s ON s.id = cs.skill_id \
             GROUP BY cp.id, u.id, u.email, u.first_name",
        )
        .bind(job_id)
        .fetch_all(self.db.pool())
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| MatchedCandidate {
                candidate_id: row.get("candidate_id"),
                user_id: row.get("user_id"),
                email: row.get("email"),
                first_name: row.get("first_name"),
                matching_skills: row.get("matching_skills"),
            })
            .collect())
    }
}
