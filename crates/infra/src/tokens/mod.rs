//! Local token lifecycle: refresh-token records and access-token revocation.
//!
//! The key space is small and TTL'd. Refresh records live until used or
//! expired; revocation markers live as long as the token they revoke would
//! still verify, leeway included.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use campus_auth::ResolvedIdentity;

use crate::store::StoreError;

pub mod memory;
#[cfg(feature = "redis")]
pub mod redis_store;
pub mod service;

pub use memory::InMemoryTokenStore;
#[cfg(feature = "redis")]
pub use redis_store::RedisTokenStore;
pub use service::{TokenPair, TokenService};

/// What a refresh token stands for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshRecord {
    pub identity: ResolvedIdentity,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    /// Authorization-server refresh token behind an OAuth2 login, renewed on
    /// every local refresh and revoked upstream on logout.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upstream_refresh_token: Option<String>,
}

#[async_trait]
pub trait TokenStore: Send + Sync {
    async fn store_refresh(&self, token: &str, record: RefreshRecord) -> Result<(), StoreError>;

    /// Remove and return the record; a second call for the same token gets `None`.
    async fn take_refresh(&self, token: &str) -> Result<Option<RefreshRecord>, StoreError>;

    /// Mark an access token id revoked until `until`.
    async fn revoke(&self, jti: &str, until: DateTime<Utc>) -> Result<(), StoreError>;

    async fn is_revoked(&self, jti: &str) -> Result<bool, StoreError>;
}
