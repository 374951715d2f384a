use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::{RefreshRecord, TokenStore};
use crate::store::StoreError;

const SWEEP_TICK: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
enum Entry {
    Refresh(RefreshRecord),
    Revoked { until: DateTime<Utc> },
}

impl Entry {
    fn expires_at(&self) -> DateTime<Utc> {
        match self {
            Entry::Refresh(record) => record.expires_at,
            Entry::Revoked { until } => *until,
        }
    }
}

/// Single-process token store: one mutex-guarded map plus a periodic sweep.
///
/// Expired entries are also ignored on read, so the sweep only bounds memory.
#[derive(Debug, Default)]
pub struct InMemoryTokenStore {
    entries: Mutex<HashMap<String, Entry>>,
}

fn refresh_key(token: &str) -> String {
    format!("refresh:{token}")
}

fn revoked_key(jti: &str) -> String {
    format!("revoked:{jti}")
}

fn poisoned() -> StoreError {
    StoreError::Unavailable("token store lock poisoned".to_string())
}

impl InMemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a shared store and start its background sweep.
    ///
    /// The sweep holds only a weak reference and stops once the store is
    /// dropped. Must be called inside a tokio runtime.
    pub fn shared() -> Arc<Self> {
        let store = Arc::new(Self::new());
        Self::spawn_sweeper(Arc::downgrade(&store), SWEEP_TICK);
        store
    }

    fn spawn_sweeper(store: Weak<Self>, every: Duration) {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            loop {
                ticker.tick().await;
                let Some(store) = store.upgrade() else {
                    break;
                };
                let removed = store.sweep_expired(Utc::now());
                if removed > 0 {
                    tracing::debug!(removed, "swept expired token records");
                }
            }
        });
    }

    /// Drop everything expired as of `now`; returns how many entries went.
    pub fn sweep_expired(&self, now: DateTime<Utc>) -> usize {
        let Ok(mut entries) = self.entries.lock() else {
            return 0;
        };
        let before = entries.len();
        entries.retain(|_, entry| entry.expires_at() > now);
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl TokenStore for InMemoryTokenStore {
    async fn store_refresh(&self, token: &str, record: RefreshRecord) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().map_err(|_| poisoned())?;
        entries.insert(refresh_key(token), Entry::Refresh(record));
        Ok(())
    }

    async fn take_refresh(&self, token: &str) -> Result<Option<RefreshRecord>, StoreError> {
        let mut entries = self.entries.lock().map_err(|_| poisoned())?;
        match entries.remove(&refresh_key(token)) {
            Some(Entry::Refresh(record)) if record.expires_at > Utc::now() => Ok(Some(record)),
            _ => Ok(None),
        }
    }

    async fn revoke(&self, jti: &str, until: DateTime<Utc>) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().map_err(|_| poisoned())?;
        entries.insert(revoked_key(jti), Entry::Revoked { until });
        Ok(())
    }

    async fn is_revoked(&self, jti: &str) -> Result<bool, StoreError> {
        let entries = self.entries.lock().map_err(|_| poisoned())?;
        Ok(matches!(
            entries.get(&revoked_key(jti)),
            Some(Entry::Revoked { until }) if *until > Utc::now()
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use campus_auth::{ResolvedIdentity, Role};
    use chrono::Duration as ChronoDuration;

    fn record(expires_in: ChronoDuration) -> RefreshRecord {
        let now = Utc::now();
        RefreshRecord {
            identity: ResolvedIdentity::new("ext-1", Role::Student).unwrap(),
            issued_at: now,
            expires_at: now + expires_in,
            upstream_refresh_token: None,
        }
    }

    #[tokio::test]
    async fn refresh_tokens_are_single_use() {
        let store = InMemoryTokenStore::new();
        store.store_refresh("r1", record(ChronoDuration::hours(1))).await.unwrap();

        assert!(store.take_refresh("r1").await.unwrap().is_some());
        assert!(store.take_refresh("r1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn expired_refresh_is_not_returned() {
        let store = InMemoryTokenStore::new();
        store.store_refresh("old", record(ChronoDuration::seconds(-1))).await.unwrap();
        assert!(store.take_refresh("old").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn revocation_lapses_with_the_token() {
        let store = InMemoryTokenStore::new();
        let now = Utc::now();
        store.revoke("live", now + ChronoDuration::minutes(5)).await.unwrap();
        store.revoke("dead", now - ChronoDuration::minutes(5)).await.unwrap();

        assert!(store.is_revoked("live").await.unwrap());
        assert!(!store.is_revoked("dead").await.unwrap());
        assert!(!store.is_revoked("never").await.unwrap());
    }

    #[tokio::test]
    async fn sweep_removes_only_expired_entries() {
        let store = InMemoryTokenStore::new();
        let now = Utc::now();
        store.revoke("a", now + ChronoDuration::minutes(5)).await.unwrap();
        store.revoke("b", now - ChronoDuration::seconds(1)).await.unwrap();
        store.store_refresh("c", record(ChronoDuration::seconds(-1))).await.unwrap();

        assert_eq!(store.sweep_expired(now), 2);
        assert_eq!(store.len(), 1);
    }
}
