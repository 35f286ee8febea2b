use anyhow::Result;
use sqlx::Row;
use uuid::Uuid;

use crate::domain::review::CompanyReview;
use crate::infra::db::Db;

#[derive(Debug)]
pub enum ReviewOutcome {
    Created(CompanyReview),
    CompanyNotFound,
    OwnCompany,
    Duplicate,
}

/// Reviews are written by users about employer companies. One review per
/// (company, reviewer) pair; employers cannot review their own company.
#[derive(Clone)]
pub struct ReviewService {
    db: Db,
}

impl ReviewService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    pub async fn create_review(
        &self,
        company_id: Uuid,
        reviewer_id: Uuid,
        rating: i32,
        review_text: String,
    ) -> Result<ReviewOutcome> {
        let company = sqlx::query("SELECT user_id FROM employer_profiles WHERE id = $1")
            .bind(company_id)
            .fetch_optional(self.db.pool())
            .await?;

        let Some(company) = company else {
            return Ok(ReviewOutcome::CompanyNotFound);
        };
        let owner_id: Uuid = company.get("user_id");
        if owner_id == reviewer_id {
            return Ok(ReviewOutcome::OwnCompany);
        }

        let inserted = sqlx::query(
            "INSERT INTO company_reviews (company_id, reviewer_id, rating, review_text) \
             VALUES ($1, $2, $3, $4) \
             RETURNING id, created_at",
        )
        .bind(company_id)
        .bind(reviewer_id)
        .bind(rating)
        .bind(&review_text)
        .fetch_one(self.db.pool())
        .await;

        let row = match inserted {
            Ok(row) => row,
            Err(sqlx::Error::Database(db)) if db.code().as_deref() == Some("23505") => {
                return Ok(ReviewOutcome::Duplicate);
            }
            Err(err) => return Err(err.into()),
        };

        let reviewer_name: String = sqlx::query(
            "SELECT first_name || ' ' || last_name AS name FROM users WHERE id = $1",
        )
        .bind(reviewer_id)
        .fetch_one(self.db.pool())
        .await?
        .get("name");

        Ok(ReviewOutcome::Created(CompanyReview {
            id: row.get("id"),
            company_id,
            reviewer_id,
            reviewer_name,
            rating,
            review_text,
            created_at: row.get("created_at"),
        }))
    }

    pub async fn list_for_company(&self, company_id: Uuid) -> Result<Vec<CompanyReview>> {
        let rows = sqlx::query(
            "SELECT r.id, r.company_id, r.reviewer_id, r.rating, r.review_text, r.created_at, \
                    u.first_name || ' ' || u.last_name AS reviewer_name \
             FROM company_reviews r \
             JOIN users u ON u.id = r.reviewer_id \
             WHERE r.company_id = $1 \
             ORDER BY r.created_at DESC, r.id DESC",
        )
        .bind(company_id)
        .fetch_all(self.db.pool())
        .await?;

        Ok(rows.into_iter().map(|row| review_from_row(&row)).collect())
    }

    /// Reviews about the employer's own company, for their dashboard.
    pub async fn list_received(&self, employer_id: Uuid) -> Result<Vec<CompanyReview>> {
        self.list_for_company(employer_id).await
    }

    pub async fn average_rating(&self, company_id: Uuid) -> Result<Option<f64>> {
        let row = sqlx::query(
            "SELECT AVG(rating)::float8 AS average FROM company_reviews WHERE company_id = $1",
        )
        .bind(company_id)
        .fetch_one(self.db.pool())
        .await?;
        Ok(row.get("average"))
    }
}

fn review_from_row(row: &sqlx::postgres::PgRow) -> CompanyReview {
    CompanyReview {
        id: row.get("id"),
        company_id: row.get("company_id"),
        reviewer_id: row.get("reviewer_id"),
        reviewer_name: row.get("reviewer_name"),
        rating: row.get("rating"),
        review_text: row.get("review_text"),
        created_at: row.get("created_at"),
    }
}
