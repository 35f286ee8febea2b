use anyhow::Result;
use serde::{Deserialize, Serialize};
use sqlx::Row;
use uuid::Uuid;

use crate::domain::notification::{Notification, NotificationType};
use crate::infra::cache::{self, RedisCache};
use crate::infra::db::Db;

const NOTIFICATIONS_CACHE_TTL_SECONDS: u64 = 300;
const NOTIFICATIONS_PAGE_SIZE: i64 = 50;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationFeed {
    pub notifications: Vec<Notification>,
    pub unread_count: i64,
}

#[derive(Clone)]
pub struct NotificationService {
    db: Db,
    cache: RedisCache,
}

impl NotificationService {
    pub fn new(db: Db, cache: RedisCache) -> Self {
        Self { db, cache }
    }

    pub async fn list_for_user(&self, user_id: Uuid) -> Result<NotificationFeed> {
        let key = cache::notifications_key(user_id);
        if let Some(feed) = self.cache.get_json::<NotificationFeed>(&key).await {
            return Ok(feed);
        }

        let rows = sqlx::query(
            "SELECT id, user_id, notification_type, title, content, read_at, created_at \
             FROM notifications \
             WHERE user_id = $1 \
             ORDER BY created_at DESC, id DESC \
             LIMIT $2",
        )
        .bind(user_id)
        .bind(NOTIFICATIONS_PAGE_SIZE)
        .fetch_all(self.db.pool())
        .await?;

        let mut notifications = Vec::with_capacity(rows.len());
        for row in rows {
            notifications.push(notification_from_row(&row)?);
        }

        let unread: i64 = sqlx::query(
            "SELECT COUNT(*) AS unread FROM notifications \
             WHERE user_id = $1 AND read_at IS NULL",
        )
        .bind(user_id)
        .fetch_one(self.db.pool())
        .await?
        .get("unread");

        let feed = NotificationFeed {
            notifications,
            unread_count: unread,
        };
        self.cache
            .put_json(&key, &feed, NOTIFICATIONS_CACHE_TTL_SECONDS)
            .await;
        Ok(feed)
    }

    /// Marks one notification read. Returns false when it does not belong to
    /// the user or does not exist.
    pub async fn mark_read(&self, user_id: Uuid, notification_id: Uuid) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE notifications SET read_at = now() \
             WHERE id = $1 AND user_id = $2 AND read_at IS NULL",
        )
        .bind(notification_id)
        .bind(user_id)
        .execute(self.db.pool())
        .await?;

        if result.rows_affected() > 0 {
            self.cache
                .invalidate(&cache::notifications_key(user_id))
                .await;
            return Ok(true);
        }

        // Already-read notifications are still a success for the caller.
        let exists = sqlx::query("SELECT 1 FROM notifications WHERE id = $1 AND user_id = $2")
            .bind(notification_id)
            .bind(user_id)
            .fetch_optional(self.db.pool())
            .await?;
        Ok(exists.is_some())
    }

    pub async fn mark_all_read(&self, user_id: Uuid) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE notifications SET read_at = now() \
             WHERE user_id = $1 AND read_at IS NULL",
        )
        .bind(user_id)
        .execute(self.db.pool())
        .await?;

        self.cache
            .invalidate(&cache::notifications_key(user_id))
            .await;
        Ok(result.rows_affected())
    }

    pub async fn create(
        &self,
        user_id: Uuid,
        notification_type: NotificationType,
        title: &str,
        content: &str,
    ) -> Result<Notification> {
        let row = sqlx::query(
            "INSERT INTO notifications (user_id, notification_type, title, content) \
             VALUES ($1, $2, $3, $4) \
             RETURNING id, user_id, notification_type, title, content, read_at, created_at",
        )
        .bind(user_id)
        .bind(notification_type.as_str())
        .bind(title)
        .bind(content)
        .fetch_one(self.db.pool())
        .await?;

        self.cache
            .invalidate(&cache::notifications_key(user_id))
            .await;
        notification_from_row(&row)
    }
}

fn notification_from_row(row: &sqlx::postgres::PgRow) -> Result<Notification> {
    let notification_type: String = row.get("notification_type");
    let notification_type = NotificationType::parse(&notification_type)
        .ok_or_else(|| anyhow::anyhow!("unknown notification type: {}", notification_type))?;
    Ok(Notification {
        id: row.get("id"),
        user_id: row.get("user_id"),
        notification_type,
        title: row.get("title"),
        content: row.get("content"),
        read_at: row.get("read_at"),
        created_at: row.get("created_at"),
    })
}
