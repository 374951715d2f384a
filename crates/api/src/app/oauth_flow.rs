//! Pending authorization-code logins, keyed by the `state` parameter.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

const PENDING_TTL_MINUTES: i64 = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingLogin {
    pub nonce: String,
    pub created_at: DateTime<Utc>,
}

/// One-shot `state -> nonce` map. Expired entries are pruned on every insert.
#[derive(Debug)]
pub struct PendingLogins {
    entries: Mutex<HashMap<String, PendingLogin>>,
    ttl: Duration,
}

impl Default for PendingLogins {
    fn default() -> Self {
        Self::new()
    }
}

impl PendingLogins {
    pub fn new() -> Self {
        Self::with_ttl(Duration::minutes(PENDING_TTL_MINUTES))
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    /// Start a login; returns `(state, nonce)`.
    pub fn begin(&self) -> (String, String) {
        let state = Uuid::new_v4().simple().to_string();
        let nonce = Uuid::new_v4().simple().to_string();
        let now = Utc::now();

        if let Ok(mut entries) = self.entries.lock() {
            entries.retain(|_, p| now - p.created_at < self.ttl);
            entries.insert(
                state.clone(),
                PendingLogin {
                    nonce: nonce.clone(),
                    created_at: now,
                },
            );
        }
        (state, nonce)
    }

    /// Consume `state`. Unknown, reused or expired states yield `None`.
    pub fn complete(&self, state: &str) -> Option<PendingLogin> {
        let pending = self.entries.lock().ok()?.remove(state)?;
        (Utc::now() - pending.created_at < self.ttl).then_some(pending)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
