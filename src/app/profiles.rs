use anyhow::Result;
use sqlx::Row;
use time::Date;
use uuid::Uuid;

use crate::domain::profile::{
    CandidateProfile, CandidateSkill, Certification, Education, EmployerProfile,
};
use crate::infra::cache::{self, RedisCache};
use crate::infra::db::Db;
use crate::infra::storage::ObjectStorage;

const PROFILE_CACHE_TTL_SECONDS: u64 = 3600;

/// Nested collections REPLACE the stored rows when present; `None` leaves
/// them untouched.
#[derive(Debug, Default)]
pub struct CandidateProfileUpdate {
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

#[derive(Debug, Default)]
pub struct EmployerProfileUpdate {
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

#[derive(Clone)]
pub struct ProfileService {
    db: Db,
    cache: RedisCache,
    storage: ObjectStorage,
    resume_url_ttl_seconds: u64,
}

impl ProfileService {
    pub fn new(
        db: Db,
        cache: RedisCache,
        storage: ObjectStorage,
        resume_url_ttl_seconds: u64,
    ) -> Self {
        Self {
            db,
            cache,
            storage,
            resume_url_ttl_seconds,
        }
    }

    pub async fn get_candidate_profile(&self, user_id: Uuid) -> Result<Option<CandidateProfile>> {
        let cache_key = cache::profile_key(user_id);
        if let Some(profile) = self.cache.get_json::<CandidateProfile>(&cache_key).await {
            return Ok(Some(profile));
        }

        let profile = self.load_candidate_profile(user_id).await?;
        if let Some(profile) = &profile {
            self.cache
                .put_json(&cache_key, profile, PROFILE_CACHE_TTL_SECONDS)
                .await;
        }
        Ok(profile)
    }

    async fn load_candidate_profile(&self, user_id: Uuid) -> Result<Option<CandidateProfile>> {
        let row = sqlx::query(
            "SELECT p.id, p.user_id, p.phone, p.gender, p.date_of_birth, p.headline, p.about, \
                    p.linkedin, p.github, p.twitter, p.website, \
                    p.profile_picture_key, p.resume_key, p.is_verified, p.created_at, \
                    u.email, u.first_name, u.last_name \
             FROM candidate_profiles p \
             JOIN users u ON u.id = p.user_id \
             WHERE p.user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(self.db.pool())
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let profile_id: Uuid = row.get("id");
        let first_name: String = row.get("first_name");
        let last_name: String = row.get("last_name");
        let profile_picture_key: Option<String> = row.get("profile_picture_key");
        let resume_key: Option<String> = row.get("resume_key");

        let skills = self.load_candidate_skills(profile_id).await?;
        let education = self.load_education(profile_id).await?;
        let certifications = self.load_certifications(profile_id).await?;

        let picture_url = self.resolve_url(profile_picture_key.as_deref()).await;
        let resume_url = self.resolve_url(resume_key.as_deref()).await;

        Ok(Some(CandidateProfile {
            id: profile_id,
            user_id: row.get("user_id"),
            name: format!("{} {}", first_name, last_name).trim().to_string(),
            email: row.get("email"),
            phone: row.get("phone"),
            gender: row.get("gender"),
            date_of_birth: row.get("date_of_birth"),
            headline: row.get("headline"),
            about: row.get("about"),
            linkedin: row.get("linkedin"),
            github: row.get("github"),
            twitter: row.get("twitter"),
            website: row.get("website"),
            profile_picture_key,
            resume_key,
            picture_url,
            resume_url,
            is_verified: row.get("is_verified"),
            skills,
            education,
            certifications,
            created_at: row.get("created_at"),
        }))
    }

    async fn load_candidate_skills(&self, profile_id: Uuid) -> Result<Vec<CandidateSkill>> {
        let rows = sqlx::query(
            "SELECT s.id AS skill_id, s.name, s.category \
             FROM candidate_skills cs \
             JOIN skills s ON s.id = cs.skill_id \
             WHERE cs.candidate_id = $1 \
             ORDER BY s.name",
        )
        .bind(profile_id)
        .fetch_all(self.db.pool())
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| CandidateSkill {
                skill_id: row.get("skill_id"),
                name: row.get("name"),
                category: row.get("category"),
            })
            .collect())
    }

    async fn load_education(&self, profile_id: Uuid) -> Result<Vec<Education>> {
        let rows = sqlx::query(
            "SELECT id, level, field_of_study, institution, start_date, end_date, description \
             FROM education WHERE candidate_id = $1 ORDER BY start_date DESC NULLS LAST",
        )
        .bind(profile_id)
        .fetch_all(self.db.pool())
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| Education {
                id: row.get("id"),
                level: row.get("level"),
                field_of_study: row.get("field_of_study"),
                institution: row.get("institution"),
                start_date: row.get("start_date"),
                end_date: row.get("end_date"),
                description: row.get("description"),
            })
            .collect())
    }

    async fn load_certifications(&self, profile_id: Uuid) -> Result<Vec<Certification>> {
        let rows = sqlx::query(
            "SELECT id, name, issuing_organization, issue_date, expiry_date, \
                    credential_url, credential_id \
             FROM certifications WHERE candidate_id = $1 ORDER BY issue_date DESC NULLS LAST",
        )
        .bind(profile_id)
        .fetch_all(self.db.pool())
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| Certification {
                id: row.get("id"),
                name: row.get("name"),
                issuing_organization: row.get("issuing_organization"),
                issue_date: row.get("issue_date"),
                expiry_date: row.get("expiry_date"),
                credential_url: row.get("credential_url"),
                credential_id: row.get("credential_id"),
            })
            .collect())
    }

    /// Partial update; simple fields COALESCE, nested collections are
    /// replaced wholesale inside one transaction.
    pub async fn update_candidate_profile(
        &self,
        user_id: Uuid,
        update: CandidateProfileUpdate,
    ) -> Result<Option<CandidateProfile>> {
        let mut tx = self.db.pool().begin().await?;

        let row = sqlx::query(
            "UPDATE candidate_profiles \
             SET phone = COALESCE($2, phone), \
                 gender = COALESCE($3, gender), \
                 date_of_birth = COALESCE($4, date_of_birth), \
                 headline = COALESCE($5, headline), \
                 about = COALESCE($6, about), \
                 linkedin = COALESCE($7, linkedin), \
                 github = COALESCE($8, github), \
                 twitter = COALESCE($9, twitter), \
                 website = COALESCE($10, website), \
                 profile_picture_key = COALESCE($11, profile_picture_key), \
                 resume_key = COALESCE($12, resume_key), \
                 updated_at = now() \
             WHERE user_id = $1 \
             RETURNING id",
        )
        .bind(user_id)
        .bind(update.phone)
        .bind(update.gender)
        .bind(update.date_of_birth)
        .bind(update.headline)
        .bind(update.about)
        .bind(update.linkedin)
        .bind(update.github)
        .bind(update.twitter)
        .bind(update.website)
        .bind(update.profile_picture_key)
        .bind(update.resume_key)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            tx.rollback().await?;
            return Ok(None);
        };
        let profile_id: Uuid = row.get("id");

        if let Some(skill_ids) = update.skill_ids {
            sqlx::query("DELETE FROM candidate_skills WHERE candidate_id = $1")
                .bind(profile_id)
                .execute(&mut *tx)
                .await?;
            for skill_id in skill_ids {
                sqlx::query(
                    "INSERT INTO candidate_skills (candidate_id, skill_id) \
                     VALUES ($1, $2) ON CONFLICT DO NOTHING",
                )
                .bind(profile_id)
                .bind(skill_id)
                .execute(&mut *tx)
                .await?;
            }
        }

        if let Some(education) = update.education {
            sqlx::query("DELETE FROM education WHERE candidate_id = $1")
                .bind(profile_id)
                .execute(&mut *tx)
                .await?;
            for entry in education {
                sqlx::query(
                    "INSERT INTO education \
                     (candidate_id, level, field_of_study, institution, start_date, end_date, description) \
                     VALUES ($1, $2, $3, $4, $5, $6, $7)",
                )
                .bind(profile_id)
                .bind(entry.level)
                .bind(entry.field_of_study)
                .bind(entry.institution)
                .bind(entry.start_date)
                .bind(entry.end_date)
                .bind(entry.description)
                .execute(&mut *tx)
                .await?;
            }
        }

        if let Some(certifications) = update.certifications {
            sqlx::query("DELETE FROM certifications WHERE candidate_id = $1")
                .bind(profile_id)
                .execute(&mut *tx)
                .await?;
            for entry in certifications {
                sqlx::query(
                    "INSERT INTO certifications \
                     (candidate_id, name, issuing_organization, issue_date, expiry_date, \
                      credential_url, credential_id) \
                     VALUES ($1, $2, $3, $4, $5, $6, $7)",
                )
                .bind(profile_id)
                .bind(entry.name)
                .bind(entry.issuing_organization)
                .bind(entry.issue_date)
                .bind(entry.expiry_date)
                .bind(entry.credential_url)
                .bind(entry.credential_id)
                .execute(&mut *tx)
                .await?;
            }
        }

        tx.commit().await?;

        self.cache.invalidate(&cache::profile_key(user_id)).await;
        self.load_candidate_profile(user_id).await
    }

    /// Public company page lookup by the employer profile id.
    pub async fn get_employer_profile_by_id(
        &self,
        profile_id: Uuid,
    ) -> Result<Option<EmployerProfile>> {
        let row = sqlx::query("SELECT user_id FROM employer_profiles WHERE id = $1")
            .bind(profile_id)
            .fetch_optional(self.db.pool())
            .await?;
        match row {
            Some(row) => self.get_employer_profile(row.get("user_id")).await,
            None => Ok(None),
        }
    }

    pub async fn get_employer_profile(&self, user_id: Uuid) -> Result<Option<EmployerProfile>> {
        let cache_key = cache::profile_key(user_id);
        if let Some(profile) = self.cache.get_json::<EmployerProfile>(&cache_key).await {
            return Ok(Some(profile));
        }

        let profile = self.load_employer_profile(user_id).await?;
        if let Some(profile) = &profile {
            self.cache
                .put_json(&cache_key, profile, PROFILE_CACHE_TTL_SECONDS)
                .await;
        }
        Ok(profile)
    }

    async fn load_employer_profile(&self, user_id: Uuid) -> Result<Option<EmployerProfile>> {
        let row = sqlx::query(
            "SELECT p.id, p.user_id, p.company_name, p.company_size, p.industry, p.description, \
                    p.website_url, p.linkedin_url, p.logo_key, p.city, p.state, p.country, \
                    p.is_verified, p.created_at, \
                    u.email, u.first_name, u.last_name \
             FROM employer_profiles p \
             JOIN users u ON u.id = p.user_id \
             WHERE p.user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(self.db.pool())
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let first_name: String = row.get("first_name");
        let last_name: String = row.get("last_name");
        let logo_key: Option<String> = row.get("logo_key");
        let logo_url = self.resolve_url(logo_key.as_deref()).await;

        Ok(Some(EmployerProfile {
            id: row.get("id"),
            user_id: row.get("user_id"),
            name: format!("{} {}", first_name, last_name).trim().to_string(),
            email: row.get("email"),
            company_name: row.get("company_name"),
            company_size: row.get("company_size"),
            industry: row.get("industry"),
            description: row.get("description"),
            website_url: row.get("website_url"),
            linkedin_url: row.get("linkedin_url"),
            logo_key,
            logo_url,
            city: row.get("city"),
            state: row.get("state"),
            country: row.get("country"),
            is_verified: row.get("is_verified"),
            created_at: row.get("created_at"),
        }))
    }

    pub async fn update_employer_profile(
        &self,
        user_id: Uuid,
        update: EmployerProfileUpdate,
    ) -> Result<Option<EmployerProfile>> {
        let result = sqlx::query(
            "UPDATE employer_profiles \
             SET company_name = COALESCE($2, company_name), \
                 company_size = COALESCE($3, company_size), \
                 industry = COALESCE($4, industry), \
                 description = COALESCE($5, description), \
                 website_url = COALESCE($6, website_url), \
                 linkedin_url = COALESCE($7, linkedin_url), \
                 logo_key = COALESCE($8, logo_key), \
                 city = COALESCE($9, city), \
                 state = COALESCE($10, state), \
                 country = COALESCE($11, country), \
                 updated_at = now() \
             WHERE user_id = $1",
        )
        .bind(user_id)
        .bind(update.company_name)
        .bind(update.company_size)
        .bind(update.industry)
        .bind(update.description)
        .bind(update.website_url)
        .bind(update.linkedin_url)
        .bind(update.logo_key)
        .bind(update.city)
        .bind(update.state)
        .bind(update.country)
        .execute(self.db.pool())
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }

        self.cache.invalidate(&cache::profile_key(user_id)).await;
        self.load_employer_profile(user_id).await
    }

    async fn resolve_url(&self, key: Option<&str>) -> Option<String> {
        let key = key?;
        match self
            .storage
            .presign_download(key, self.resume_url_ttl_seconds)
            .await
        {
            Ok(url) => Some(url),
            Err(err) => {
                tracing::warn!(error = ?err, key, "failed to presign object URL");
                None
            }
        }
    }
}
