use anyhow::Result;
use serde::Deserialize;
use serde_json::Value;
use sqlx::Row;
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use crate::domain::job::{
    Category, EmploymentType, ExperienceLevel, JobPosting, JobSkill, JobStatus, LocationType,
};
use crate::infra::db::Db;

#[derive(Debug, Clone, Deserialize)]
pub struct JobSkillInput {
    pub skill_id: Uuid,
    #[serde(default = "default_required")]
    pub is_required: bool,
    pub minimum_years: Option<i32>,
}

fn default_required() -> bool {
    true
}

#[derive(Debug)]
pub struct NewJobPosting {
    pub title: String,
    pub description: String,
    pub responsibilities: Value,
    pub requirements: Value,
    pub nice_to_have: Value,
    pub benefits: Value,
    pub employment_type: EmploymentType,
    pub location_type: LocationType,
    pub experience_level: ExperienceLevel,
    pub salary_min: Option<i64>,
    pub salary_max: Option<i64>,
    pub currency: String,
    pub is_salary_disclosed: bool,
    pub location: String,
    pub city: String,
    pub state: String,
    pub country: String,
    pub application_deadline: Option<Date>,
    pub status: JobStatus,
    pub skills: Vec<JobSkillInput>,
    pub category_ids: Vec<Uuid>,
}

/// Partial update; nested skills/categories replace when present.
#[derive(Debug, Default)]
pub struct JobPostingUpdate {
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

#[derive(Clone)]
pub struct JobService {
    db: Db,
}

impl JobService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    /// Employer profile id for a user, if they have one.
    pub async fn employer_profile_id(&self, user_id: Uuid) -> Result<Option<Uuid>> {
        let row = sqlx::query("SELECT id FROM employer_profiles WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(self.db.pool())
            .await?;
        Ok(row.map(|row| row.get("id")))
    }

    pub async fn candidate_profile_id(&self, user_id: Uuid) -> Result<Option<Uuid>> {
        let row = sqlx::query("SELECT id FROM candidate_profiles WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(self.db.pool())
            .await?;
        Ok(row.map(|row| row.get("id")))
    }

    pub async fn create_job(&self, employer_id: Uuid, input: NewJobPosting) -> Result<JobPosting> {
        let mut tx = self.db.pool().begin().await?;

        let posted_at = if input.status == JobStatus::Active {
            Some(OffsetDateTime::now_utc())
        } else {
            None
        };

        let row = sqlx::query(
            "INSERT INTO job_postings \
             (employer_id, title, description, responsibilities, requirements, nice_to_have, \
              benefits, employment_type, location_type, experience_level, salary_min, salary_max, \
              currency, is_salary_disclosed, location, city, state, country, \
              application_deadline, status, posted_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, \
                     $18, $19, $20, $21) \
             RETURNING id",
        )
        .bind(employer_id)
        .bind(&input.title)
        .bind(&input.description)
        .bind(&input.responsibilities)
        .bind(&input.requirements)
        .bind(&input.nice_to_have)
        .bind(&input.benefits)
        .bind(input.employment_type.as_str())
        .bind(input.location_type.as_str())
        .bind(input.experience_level.as_str())
        .bind(input.salary_min)
        .bind(input.salary_max)
        .bind(&input.currency)
        .bind(input.is_salary_disclosed)
        .bind(&input.location)
        .bind(&input.city)
        .bind(&input.state)
        .bind(&input.country)
        .bind(input.application_deadline)
        .bind(input.status.as_str())
        .bind(posted_at)
        .fetch_one(&mut *tx)
        .await?;

        let job_id: Uuid = row.get("id");

        for skill in &input.skills {
            sqlx::query(
                "INSERT INTO job_skills (job_id, skill_id, is_required, minimum_years) \
                 VALUES ($1, $2, $3, $4) ON CONFLICT (job_id, skill_id) DO NOTHING",
            )
            .bind(job_id)
            .bind(skill.skill_id)
            .bind(skill.is_required)
            .bind(skill.minimum_years)
            .execute(&mut *tx)
            .await?;
        }

        for category_id in &input.category_ids {
            sqlx::query(
                "INSERT INTO job_categories (job_id, category_id) \
                 VALUES ($1, $2) ON CONFLICT DO NOTHING",
            )
            .bind(job_id)
            .bind(category_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        let job = self
            .get_job(job_id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("job vanished after insert"))?;
        Ok(job)
    }

    pub async fn get_job(&self, job_id: Uuid) -> Result<Option<JobPosting>> {
        let row = sqlx::query(
            "SELECT j.id, j.employer_id, j.title, j.description, j.responsibilities, \
                    j.requirements, j.nice_to_have, j.benefits, j.employment_type, \
                    j.location_type, j.experience_level, j.salary_min, j.salary_max, j.currency, \
                    j.is_salary_disclosed, j.location, j.city, j.state, j.country, \
                    j.application_deadline, j.status, j.applications_count, j.posted_at, \
                    j.created_at, e.company_name \
             FROM job_postings j \
             JOIN employer_profiles e ON e.id = j.employer_id \
             WHERE j.id = $1",
        )
        .bind(job_id)
        .fetch_optional(self.db.pool())
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let mut job = job_from_row(&row)?;
        job.skills = self.load_job_skills(job_id).await?;
        job.categories = self.load_job_categories(job_id).await?;
        Ok(Some(job))
    }

    /// Public listing: active jobs only, newest first.
    pub async fn list_active_jobs(
        &self,
        cursor: Option<(OffsetDateTime, Uuid)>,
        limit: i64,
    ) -> Result<(Vec<JobPosting>, Option<(OffsetDateTime, Uuid)>)> {
        let limit_plus = limit + 1;
        let rows = match cursor {
            Some((created_at, job_id)) => {
                sqlx::query(
                    "SELECT j.id, j.employer_id, j.title, j.description, j.responsibilities, \
                            j.requirements, j.nice_to_have, j.benefits, j.employment_type, \
                            j.location_type, j.experience_level, j.salary_min, j.salary_max, \
                            j.currency, j.is_salary_disclosed, j.location, j.city, j.state, \
                            j.country, j.application_deadline, j.status, j.applications_count, \
                            j.posted_at, j.created_at, e.company_name \
                     FROM job_postings j \
                     JOIN employer_profiles e ON e.id = j.employer_id \
                     WHERE j.status = 'active' \
                       AND (j.created_at < $1 OR (j.created_at = $1 AND j.id < $2)) \
                     ORDER BY j.created_at DESC, j.id DESC \
                     LIMIT $3",
                )
                .bind(created_at)
                .bind(job_id)
                .bind(limit_plus)
                .fetch_all(self.db.pool())
                .await?
            }
            None => {
                sqlx::query(
                    "SELECT j.id, j.employer_id, j.title, j.description, j.responsibilities, \
                            j.requirements, j.nice_to_have, j.benefits, j.employment_type, \
                            j.location_type, j.experience_level, j.salary_min, j.salary_max, \
                            j.currency, j.is_salary_disclosed, j.location, j.city, j.state, \
                            j.country, j.application_deadline, j.status, j.applications_count, \
                            j.posted_at, j.created_at, e.company_name \
                     FROM job_postings j \
                     JOIN employer_profiles e ON e.id = j.employer_id \
                     WHERE j.status = 'active' \
                     ORDER BY j.created_at DESC, j.id DESC \
                     LIMIT $1",
                )
                .bind(limit_plus)
                .fetch_all(self.db.pool())
                .await?
            }
        };

        let mut jobs = Vec::with_capacity(rows.len());
        for row in rows {
            let mut job = job_from_row(&row)?;
            job.skills = self.load_job_skills(job.id).await?;
            job.categories = self.load_job_categories(job.id).await?;
            jobs.push(job);
        }

        let next_cursor = if jobs.len() > limit as usize {
            jobs.pop().map(|extra| (extra.created_at, extra.id))
        } else {
            None
        };

        Ok((jobs, next_cursor))
    }

    pub async fn update_job(&self, job_id: Uuid, update: JobPostingUpdate) -> Result<Option<JobPosting>> {
        let mut tx = self.db.pool().begin().await?;

        let row = sqlx::query(
            "UPDATE job_postings \
             SET title = COALESCE($2, title), \
                 description = COALESCE($3, description), \
                 responsibilities = COALESCE($4, responsibilities), \
                 requirements = COALESCE($5, requirements), \
                 nice_to_have = COALESCE($6, nice_to_have), \
                 benefits = COALESCE($7, benefits), \
                 employment_type = COALESCE($8, employment_type), \
                 location_type = COALESCE($9, location_type), \
                 experience_level = COALESCE($10, experience_level), \
                 salary_min = COALESCE($11, salary_min), \
                 salary_max = COALESCE($12, salary_max), \
                 currency = COALESCE($13, currency), \
                 is_salary_disclosed = COALESCE($14, is_salary_disclosed), \
                 location = COALESCE($15, location), \
                 city = COALESCE($16, city), \
                 state = COALESCE($17, state), \
                 country = COALESCE($18, country), \
                 application_deadline = COALESCE($19, application_deadline), \
                 status = COALESCE($20, status), \
                 posted_at = CASE \
                     WHEN COALESCE($20, status) = 'active' AND posted_at IS NULL THEN now() \
                     ELSE posted_at \
                 END, \
                 updated_at = now() \
             WHERE id = $1 \
             RETURNING id",
        )
        .bind(job_id)
        .bind(update.title)
        .bind(update.description)
        .bind(update.responsibilities)
        .bind(update.requirements)
        .bind(update.nice_to_have)
        .bind(update.benefits)
        .bind(update.employment_type.map(|v| v.as_str()))
        .bind(update.location_type.map(|v| v.as_str()))
        .bind(update.experience_level.map(|v| v.as_str()))
        .bind(update.salary_min)
        .bind(update.salary_max)
        .bind(update.currency)
        .bind(update.is_salary_disclosed)
        .bind(update.location)
        .bind(update.city)
        .bind(update.state)
        .bind(update.country)
        .bind(update.application_deadline)
        .bind(update.status.map(|v| v.as_str()))
        .fetch_optional(&mut *tx)
        .await?;

        if row.is_none() {
            tx.rollback().await?;
            return Ok(None);
        }

        if let Some(skills) = update.skills {
            sqlx::query("DELETE FROM job_skills WHERE job_id = $1")
                .bind(job_id)
                .execute(&mut *tx)
                .await?;
            for skill in skills {
                sqlx::query(
                    "INSERT INTO job_skills (job_id, skill_id, is_required, minimum_years) \
                     VALUES ($1, $2, $3, $4) ON CONFLICT (job_id, skill_id) DO NOTHING",
                )
                .bind(job_id)
                .bind(skill.skill_id)
                .bind(skill.is_required)
                .bind(skill.minimum_years)
                .execute(&mut *tx)
                .await?;
            }
        }

        if let Some(category_ids) = update.category_ids {
            sqlx::query("DELETE FROM job_categories WHERE job_id = $1")
                .bind(job_id)
                .execute(&mut *tx)
                .await?;
            for category_id in category_ids {
                sqlx::query(
                    "INSERT INTO job_categories (job_id, category_id) \
                     VALUES ($1, $2) ON CONFLICT DO NOTHING",
                )
                .bind(job_id)
                .bind(category_id)
                .execute(&mut *tx)
                .await?;
            }
        }

        tx.commit().await?;
        self.get_job(job_id).await
    }

    pub async fn delete_job(&self, job_id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM job_postings WHERE id = $1")
            .bind(job_id)
            .execute(self.db.pool())
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Employer profile id owning the given job, if it exists.
    pub async fn job_owner(&self, job_id: Uuid) -> Result<Option<Uuid>> {
        let row = sqlx::query("SELECT employer_id FROM job_postings WHERE id = $1")
            .bind(job_id)
            .fetch_optional(self.db.pool())
            .await?;
        Ok(row.map(|row| row.get("employer_id")))
    }

    pub async fn save_job(&self, candidate_id: Uuid, job_id: Uuid, notes: String) -> Result<bool> {
        let result = sqlx::query(
            "INSERT INTO saved_jobs (candidate_id, job_id, notes) \
             VALUES ($1, $2, $3) ON CONFLICT (candidate_id, job_id) DO NOTHING",
        )
        .bind(candidate_id)
        .bind(job_id)
        .bind(notes)
        .execute(self.db.pool())
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn unsave_job(&self, candidate_id: Uuid, job_id: Uuid) -> Result<bool> {
        let result = sqlx::query(
            "DELETE FROM saved_jobs WHERE candidate_id = $1 AND job_id = $2",
        )
        .bind(candidate_id)
        .bind(job_id)
        .execute(self.db.pool())
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn list_saved_jobs(&self, candidate_id: Uuid) -> Result<Vec<SavedJob>> {
        let rows = sqlx::query(
            "SELECT sj.id, sj.job_id, sj.notes, sj.created_at, j.title, e.company_name \
             FROM saved_jobs sj \
             JOIN job_postings j ON j.id = sj.job_id \
             JOIN employer_profiles e ON e.id = j.employer_id \
             WHERE sj.candidate_id = $1 \
             ORDER BY sj.created_at DESC",
        )
        .bind(candidate_id)
        .fetch_all(self.db.pool())
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| SavedJob {
                id: row.get("id"),
                job_id: row.get("job_id"),
                job_title: row.get("title"),
                company_name: row.get("company_name"),
                notes: row.get("notes"),
                created_at: row.get("created_at"),
            })
            .collect())
    }

    async fn load_job_skills(&self, job_id: Uuid) -> Result<Vec<JobSkill>> {
        let rows = sqlx::query(
            "SELECT js.skill_id, js.is_required, js.minimum_years, s.name \
             FROM job_skills js \
             JOIN skills s ON s.id = js.skill_id \
             WHERE js.job_id = $1 \
             ORDER BY s.name",
        )
        .bind(job_id)
        .fetch_all(self.db.pool())
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| JobSkill {
                skill_id: row.get("skill_id"),
                name: row.get("name"),
                is_required: row.get("is_required"),
                minimum_years: row.get("minimum_years"),
            })
            .collect())
    }

    async fn load_job_categories(&self, job_id: Uuid) -> Result<Vec<Category>> {
        let rows = sqlx::query(
            "SELECT c.id, c.name, c.slug, c.description, c.parent_id \
             FROM job_categories jc \
             JOIN categories c ON c.id = jc.category_id \
             WHERE jc.job_id = $1 \
             ORDER BY c.name",
        )
        .bind(job_id)
        .fetch_all(self.db.pool())
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| Category {
                id: row.get("id"),
                name: row.get("name"),
                slug: row.get("slug"),
                description: row.get("description"),
                parent_id: row.get("parent_id"),
            })
            .collect())
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct SavedJob {
    pub id: Uuid,
    pub job_id: Uuid,
    pub job_title: String,
    pub company_name: String,
    pub notes: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

fn job_from_row(row: &sqlx::postgres::PgRow) -> Result<JobPosting> {
    let status: String = row.get("status");
    let status = JobStatus::parse(&status)
        .ok_or_else(|| anyhow::anyhow!("unknown job status: {}", status))?;
    let employment_type: String = row.get("employment_type");
    let employment_type = EmploymentType::parse(&employment_type)
        .ok_or_else(|| anyhow::anyhow!("unknown employment type: {}", employment_type))?;
    let location_type: String = row.get("location_type");
    let location_type = LocationType::parse(&location_type)
        .ok_or_else(|| anyhow::anyhow!("unknown location type: {}", location_type))?;
    let experience_level: String = row.get("experience_level");
    let experience_level = ExperienceLevel::parse(&experience_level)
        .ok_or_else(|| anyhow::anyhow!("unknown experience level: {}", experience_level))?;

    Ok(JobPosting {
        id: row.get("id"),
        employer_id: row.get("employer_id"),
        company_name: row.get("company_name"),
        title: row.get("title"),
        description: row.get("description"),
        responsibilities: row.get("responsibilities"),
        requirements: row.get("requirements"),
        nice_to_have: row.get("nice_to_have"),
        benefits: row.get("benefits"),
        employment_type,
        location_type,
        experience_level,
        salary_min: row.get("salary_min"),
        salary_max: row.get("salary_max"),
        currency: row.get("currency"),
        is_salary_disclosed: row.get("is_salary_disclosed"),
        location: row.get("location"),
        city: row.get("city"),
        state: row.get("state"),
        country: row.get("country"),
        application_deadline: row.get("application_deadline"),
        status,
        applications_count: row.get("applications_count"),
        skills: Vec::new(),
        categories: Vec::new(),
        posted_at: row.get("posted_at"),
        created_at: row.get("created_at"),
    })
}
