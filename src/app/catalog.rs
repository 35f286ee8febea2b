use anyhow::Result;
use sqlx::Row;
use uuid::Uuid;

use crate::domain::job::{Category, Skill};
use crate::infra::db::Db;

/// Global skill/category taxonomy. Skills are a flat catalog; categories
/// form an optional single-parent tree.
#[derive(Clone)]
pub struct CatalogService {
    db: Db,
}

impl CatalogService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    pub async fn list_skills(&self) -> Result<Vec<Skill>> {
        let rows = sqlx::query(
            "SELECT id, name, category, description FROM skills ORDER BY name",
        )
        .fetch_all(self.db.pool())
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| Skill {
                id: row.get("id"),
                name: row.get("name"),
                category: row.get("category"),
                description: row.get("description"),
            })
            .collect())
    }

    pub async fn create_skill(
        &self,
        name: String,
        category: String,
        description: String,
    ) -> Result<Skill> {
        let row = sqlx::query(
            "INSERT INTO skills (name, category, description) \
             VALUES ($1, $2, $3) \
             RETURNING id, name, category, description",
        )
        .bind(name)
        .bind(category)
        .bind(description)
        .fetch_one(self.db.pool())
        .await?;

        Ok(Skill {
            id: row.get("id"),
            name: row.get("name"),
            category: row.get("category"),
            description: row.get("description"),
        })
    }

    pub async fn list_categories(&self) -> Result<Vec<Category>> {
        let rows = sqlx::query(
            "SELECT id, name, slug, description, parent_id FROM categories ORDER BY name",
        )
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

    pub async fn create_category(
        &self,
        name: String,
        description: String,
        parent_id: Option<Uuid>,
    ) -> Result<Category> {
        let slug = slugify(&name);
        let row = sqlx::query(
            "INSERT INTO categories (name, slug, description, parent_id) \
             VALUES ($1, $2, $3, $4) \
             RETURNING id, name, slug, description, parent_id",
        )
        .bind(name)
        .bind(slug)
        .bind(description)
        .bind(parent_id)
        .fetch_one(self.db.pool())
        .await?;

        Ok(Category {
            id: row.get("id"),
            name: row.get("name"),
            slug: row.get("slug"),
            description: row.get("description"),
            parent_id: row.get("parent_id"),
        })
    }
}

fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut last_dash = true;
    for ch in name.chars() {
        if ch.is_ascii_alphanumeric() {
            slug.push(ch.to_ascii_lowercase());
            last_dash = false;
        } else if !last_dash {
            slug.push('-');
            last_dash = true;
        }
    }
    slug.trim_end_matches('-').to_string()
}

#[cfg(test)]
mod tests {
    use super::slugify;

    #[test]
    fn slugify_collapses_separators() {
        assert_eq!(slugify("Software Engineering"), "software-engineering");
        assert_eq!(slugify("  C++ / Systems  "), "c-systems");
        assert_eq!(slugify("Data"), "data");
    }
}
