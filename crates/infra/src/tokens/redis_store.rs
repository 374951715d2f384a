//! Redis-backed token store for multi-instance deployments.
//!
//! Expiry is delegated to Redis key TTLs. Uses the blocking client on the
//! blocking pool, one short-lived connection per call.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::{RefreshRecord, TokenStore};
use crate::store::StoreError;

const DEFAULT_PREFIX: &str = "campus:tokens";

#[derive(Debug, Clone)]
pub struct RedisTokenStore {
    client: Arc<redis::Client>,
    prefix: String,
}

impl RedisTokenStore {
    pub fn new(redis_url: impl AsRef<str>, prefix: Option<String>) -> Result<Self, StoreError> {
        let client = redis::Client::open(redis_url.as_ref())
            .map_err(|e| StoreError::Unavailable(format!("redis connection: {e}")))?;
        Ok(Self {
            client: Arc::new(client),
            prefix: prefix.unwrap_or_else(|| DEFAULT_PREFIX.to_string()),
        })
    }

    fn refresh_key(&self, token: &str) -> String {
        format!("{}:refresh:{token}", self.prefix)
    }

    fn revoked_key(&self, jti: &str) -> String {
        format!("{}:revoked:{jti}", self.prefix)
    }

    async fn run<T, F>(&self, op: &'static str, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&mut redis::Connection) -> redis::RedisResult<T> + Send + 'static,
    {
        let client = self.client.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = client
                .get_connection()
                .map_err(|e| StoreError::Unavailable(format!("redis connection: {e}")))?;
            f(&mut conn).map_err(|e| StoreError::Unavailable(format!("redis {op}: {e}")))
        })
        .await
        .map_err(|e| StoreError::Unavailable(format!("redis {op} task: {e}")))?
    }
}

/// Seconds until `until`, at least one so the key is still written with a TTL.
fn ttl_seconds(until: DateTime<Utc>) -> u64 {
    (until - Utc::now()).num_seconds().max(1) as u64
}

#[async_trait]
impl TokenStore for RedisTokenStore {
    async fn store_refresh(&self, token: &str, record: RefreshRecord) -> Result<(), StoreError> {
        let payload = serde_json::to_string(&record)
            .map_err(|e| StoreError::Unavailable(format!("serialize refresh record: {e}")))?;
        let key = self.refresh_key(token);
        let ttl = ttl_seconds(record.expires_at);
        self.run("SET", move |conn| {
            redis::cmd("SET")
                .arg(&key)
                .arg(payload)
                .arg("EX")
                .arg(ttl)
                .query::<()>(conn)
        })
        .await
    }

    async fn take_refresh(&self, token: &str) -> Result<Option<RefreshRecord>, StoreError> {
        let key = self.refresh_key(token);
        let raw: Option<String> = self
            .run("GETDEL", move |conn| redis::cmd("GETDEL").arg(&key).query(conn))
            .await?;

        match raw {
            Some(raw) => match serde_json::from_str::<RefreshRecord>(&raw) {
                Ok(record) => Ok(Some(record)),
                Err(e) => {
                    tracing::warn!(error = %e, "discarding undecodable refresh record");
                    Ok(None)
                }
            },
            None => Ok(None),
        }
    }

    async fn revoke(&self, jti: &str, until: DateTime<Utc>) -> Result<(), StoreError> {
        if until <= Utc::now() {
            return Ok(());
        }
        let key = self.revoked_key(jti);
        let ttl = ttl_seconds(until);
        self.run("SET", move |conn| {
            redis::cmd("SET")
                .arg(&key)
                .arg(1)
                .arg("EX")
                .arg(ttl)
                .query::<()>(conn)
        })
        .await
    }

    async fn is_revoked(&self, jti: &str) -> Result<bool, StoreError> {
        let key = self.revoked_key(jti);
        self.run("EXISTS", move |conn| redis::cmd("EXISTS").arg(&key).query::<bool>(conn))
            .await
    }
}
