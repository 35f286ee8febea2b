use anyhow::Result;
use redis::{AsyncCommands, Client};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Read-through cache for derived per-user views (profile, notification
/// list, application list). All operations degrade silently to a miss when
/// Redis is unavailable; the database stays authoritative.
#[derive(Clone)]
pub struct RedisCache {
    client: Client,
}

impl RedisCache {
    pub async fn connect(redis_url: &str) -> Result<Self> {
        let client = Client::open(redis_url)?;
        let mut conn = client.get_multiplexed_async_connection().await?;
        redis::cmd("PING").query_async::<_, String>(&mut conn).await?;
        Ok(Self { client })
    }

    pub async fn ping(&self) -> Result<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        redis::cmd("PING").query_async::<_, String>(&mut conn).await?;
        Ok(())
    }

    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .ok()?;
        let payload: Option<String> = conn.get(key).await.ok()?;
        payload.and_then(|p| serde_json::from_str(&p).ok())
    }

    pub async fn put_json<T: Serialize>(&self, key: &str, value: &T, ttl_seconds: u64) {
        let Ok(payload) = serde_json::to_string(value) else {
            return;
        };
        if let Ok(mut conn) = self.client.get_multiplexed_async_connection().await {
            if let Err(err) = conn.set_ex::<_, _, ()>(key, payload, ttl_seconds).await {
                tracing::warn!(error = ?err, key, "failed to write cache entry");
            }
        }
    }

    pub async fn invalidate(&self, key: &str) {
        if let Ok(mut conn) = self.client.get_multiplexed_async_connection().await {
            let _ = conn.del::<_, ()>(key).await;
        }
    }
}

pub fn profile_key(user_id: uuid::Uuid) -> String {
    format!("profile:{}", user_id)
}

pub fn notifications_key(user_id: uuid::Uuid) -> String {
    format!("notifications:{}", user_id)
}

pub fn applications_key(user_id: uuid::Uuid) -> String {
    format!("applications:{}", user_id)
}

pub fn user_key(user_id: uuid::Uuid) -> String {
    format!("user:{}", user_id)
}
