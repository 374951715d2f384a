//! Persistence seams used by the identity pipeline.
//!
//! The pipeline reads and writes four kinds of records: users and profiles
//! (owned here, append-mostly), tenants and student enrollments (owned by other
//! subsystems, read-only here). Every lookup distinguishes "not found"
//! (`Ok(None)`) from a failing store (`Err`).

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use campus_auth::{AuthError, Role, reason};
use campus_core::{StudentId, UserId};

pub mod in_memory;
pub mod postgres;

pub use in_memory::{InMemoryProfileStore, InMemoryStudentStore, InMemoryTenantStore, InMemoryUserStore};
pub use postgres::PostgresStore;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// A uniqueness constraint rejected the write.
    #[error("unique constraint violated: {0}")]
    Conflict(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        tracing::error!(error = %err, "identity store failure");
        AuthError::Upstream(reason::STORE_UNAVAILABLE)
    }
}

/// Locally persisted account mirroring an external identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub external_identity_id: String,
    pub display_name: String,
    pub email: String,
    pub role: Role,
    pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub external_identity_id: String,
    pub display_name: String,
    pub email: String,
    pub role: Role,
    pub is_active: bool,
}

/// Per-user profile, created once at first provisioning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub user_id: UserId,
    pub tenant_id: i64,
    pub first_name: String,
    pub last_name: String,
    pub preferences: BTreeMap<String, serde_json::Value>,
    pub social_links: BTreeMap<String, serde_json::Value>,
}

/// A college as seen by the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tenant {
    pub id: i64,
    pub external_ref: Option<String>,
    pub name: String,
}

/// A student enrollment, keyed by the owning identity's external id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentRecord {
    pub id: StudentId,
    pub external_identity_id: String,
    pub roll_number: Option<String>,
    pub is_active: bool,
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn get_by_external_id(&self, external_id: &str) -> Result<Option<User>, StoreError>;

    /// Insert a new user. Fails with [`StoreError::Conflict`] if the external
    /// identity id already exists.
    async fn create(&self, user: NewUser) -> Result<User, StoreError>;

    async fn update(&self, user: &User) -> Result<(), StoreError>;
}

#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn get_by_user_id(&self, user_id: UserId) -> Result<Option<Profile>, StoreError>;

    /// Insert a profile. Fails with [`StoreError::Conflict`] if the user
    /// already has one.
    async fn create(&self, profile: Profile) -> Result<(), StoreError>;
}

#[async_trait]
pub trait TenantStore: Send + Sync {
    async fn get_by_external_ref(&self, external_ref: &str) -> Result<Option<Tenant>, StoreError>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Tenant>, StoreError>;
}

#[async_trait]
pub trait StudentStore: Send + Sync {
    async fn get_by_external_id(
        &self,
        external_id: &str,
    ) -> Result<Option<StudentRecord>, StoreError>;
}
