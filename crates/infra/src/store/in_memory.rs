//! In-memory stores for tests/dev.
//!
//! They enforce the same uniqueness constraints as the Postgres schema so the
//! provisioning race handling behaves identically against either backend.

use std::collections::HashMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;

use campus_core::UserId;

use super::{
    NewUser, Profile, ProfileStore, StoreError, StudentRecord, StudentStore, Tenant, TenantStore,
    User, UserStore,
};

fn poisoned() -> StoreError {
    StoreError::Unavailable("lock poisoned".to_string())
}

/// Users keyed by external identity id.
#[derive(Debug)]
pub struct InMemoryUserStore {
    inner: RwLock<HashMap<String, User>>,
    next_id: AtomicI64,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
            next_id: AtomicI64::new(1),
        }
    }

    pub fn all(&self) -> Vec<User> {
        match self.inner.read() {
            Ok(map) => map.values().cloned().collect(),
            Err(_) => vec![],
        }
    }
}

impl Default for InMemoryUserStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn get_by_external_id(&self, external_id: &str) -> Result<Option<User>, StoreError> {
        let map = self.inner.read().map_err(|_| poisoned())?;
        Ok(map.get(external_id).cloned())
    }

    async fn create(&self, user: NewUser) -> Result<User, StoreError> {
        let mut map = self.inner.write().map_err(|_| poisoned())?;
        if map.contains_key(&user.external_identity_id) {
            return Err(StoreError::Conflict(format!(
                "users.external_identity_id = {}",
                user.external_identity_id
            )));
        }

        let raw = self.next_id.fetch_add(1, Ordering::SeqCst);
        let id = UserId::new(raw).map_err(|e| StoreError::Unavailable(e.to_string()))?;
        let stored = User {
            id,
            external_identity_id: user.external_identity_id,
            display_name: user.display_name,
            email: user.email,
            role: user.role,
            is_active: user.is_active,
        };
        map.insert(stored.external_identity_id.clone(), stored.clone());
        Ok(stored)
    }

    async fn update(&self, user: &User) -> Result<(), StoreError> {
        let mut map = self.inner.write().map_err(|_| poisoned())?;
        match map.get_mut(&user.external_identity_id) {
            Some(existing) if existing.id == user.id => {
                *existing = user.clone();
                Ok(())
            }
            _ => Err(StoreError::Unavailable(format!("user {} vanished", user.id))),
        }
    }
}

/// Profiles keyed by user id.
#[derive(Debug, Default)]
pub struct InMemoryProfileStore {
    inner: RwLock<HashMap<UserId, Profile>>,
}

impl InMemoryProfileStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn all(&self) -> Vec<Profile> {
        match self.inner.read() {
            Ok(map) => map.values().cloned().collect(),
            Err(_) => vec![],
        }
    }
}

#[async_trait]
impl ProfileStore for InMemoryProfileStore {
    async fn get_by_user_id(&self, user_id: UserId) -> Result<Option<Profile>, StoreError> {
        let map = self.inner.read().map_err(|_| poisoned())?;
        Ok(map.get(&user_id).cloned())
    }

    async fn create(&self, profile: Profile) -> Result<(), StoreError> {
        let mut map = self.inner.write().map_err(|_| poisoned())?;
        if map.contains_key(&profile.user_id) {
            return Err(StoreError::Conflict(format!(
                "profiles.user_id = {}",
                profile.user_id
            )));
        }
        map.insert(profile.user_id, profile);
        Ok(())
    }
}

/// Read-only tenant directory, seeded by callers.
#[derive(Debug, Default)]
pub struct InMemoryTenantStore {
    inner: RwLock<Vec<Tenant>>,
}

impl InMemoryTenantStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tenants(tenants: impl IntoIterator<Item = Tenant>) -> Self {
        Self {
            inner: RwLock::new(tenants.into_iter().collect()),
        }
    }

    pub fn insert(&self, tenant: Tenant) {
        if let Ok(mut tenants) = self.inner.write() {
            tenants.retain(|t| t.id != tenant.id);
            tenants.push(tenant);
        }
    }
}

#[async_trait]
impl TenantStore for InMemoryTenantStore {
    async fn get_by_external_ref(&self, external_ref: &str) -> Result<Option<Tenant>, StoreError> {
        let tenants = self.inner.read().map_err(|_| poisoned())?;
        Ok(tenants
            .iter()
            .find(|t| t.external_ref.as_deref() == Some(external_ref))
            .cloned())
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Tenant>, StoreError> {
        let tenants = self.inner.read().map_err(|_| poisoned())?;
        Ok(tenants.iter().find(|t| t.id == id).cloned())
    }
}

/// Read-only student enrollments, seeded by callers.
#[derive(Debug, Default)]
pub struct InMemoryStudentStore {
    inner: RwLock<HashMap<String, StudentRecord>>,
}

impl InMemoryStudentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, record: StudentRecord) {
        if let Ok(mut map) = self.inner.write() {
            map.insert(record.external_identity_id.clone(), record);
        }
    }
}

#[async_trait]
impl StudentStore for InMemoryStudentStore {
    async fn get_by_external_id(
        &self,
        external_id: &str,
    ) -> Result<Option<StudentRecord>, StoreError> {
        let map = self.inner.read().map_err(|_| poisoned())?;
        Ok(map.get(external_id).cloned())
    }
}
