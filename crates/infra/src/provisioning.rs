//! Lazy provisioning of local users and profiles for resolved identities.
//!
//! Idempotent and race-safe without in-process locks: concurrent first-sight
//! requests for the same external id all race to insert, the store's unique
//! constraint picks one winner, and the losers re-fetch the winner's row.

use std::sync::Arc;

use thiserror::Error;

use campus_auth::{AuthError, AuthResult, ResolvedIdentity, reason};
use campus_core::UserId;

use crate::store::{NewUser, Profile, ProfileStore, StoreError, TenantStore, User, UserStore};

/// What to do when a known user was deactivated locally but authenticates
/// again upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReactivationPolicy {
    /// Flip the account back to active.
    #[default]
    Silent,
    /// Refuse the request with `account_inactive`.
    Reject,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ReactivationPolicyError {
    #[error("unknown reactivation policy '{0}', expected silent|reject")]
    Unknown(String),
}

impl std::str::FromStr for ReactivationPolicy {
    type Err = ReactivationPolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "silent" => Ok(Self::Silent),
            "reject" => Ok(Self::Reject),
            other => Err(ReactivationPolicyError::Unknown(other.to_string())),
        }
    }
}

#[derive(Clone, Default)]
pub struct IdentityProvisioner {
    users: Option<Arc<dyn UserStore>>,
    profiles: Option<Arc<dyn ProfileStore>>,
    tenants: Option<Arc<dyn TenantStore>>,
    reactivation: ReactivationPolicy,
}

impl IdentityProvisioner {
    /// A provisioner with no stores: every call is a no-op returning `None`.
    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn new(
        users: Arc<dyn UserStore>,
        profiles: Arc<dyn ProfileStore>,
        tenants: Arc<dyn TenantStore>,
    ) -> Self {
        Self {
            users: Some(users),
            profiles: Some(profiles),
            tenants: Some(tenants),
            reactivation: ReactivationPolicy::default(),
        }
    }

    pub fn with_reactivation(mut self, policy: ReactivationPolicy) -> Self {
        self.reactivation = policy;
        self
    }

    /// Make sure a local user (and profile) exists for `resolved`.
    ///
    /// Returns the local user id, or `None` when provisioning is disabled.
    pub async fn ensure_local_identity(
        &self,
        resolved: &ResolvedIdentity,
    ) -> AuthResult<Option<UserId>> {
        if let Some(id) = resolved.local_user_id {
            return Ok(Some(id));
        }
        let Some(users) = &self.users else {
            return Ok(None);
        };

        let user = match users.get_by_external_id(&resolved.external_id).await? {
            Some(existing) => self.sync_existing(users.as_ref(), existing, resolved).await?,
            None => self.create_user(users.as_ref(), resolved).await?,
        };

        self.ensure_local_profile(user.id, resolved).await?;
        Ok(Some(user.id))
    }

    async fn sync_existing(
        &self,
        users: &dyn UserStore,
        existing: User,
        resolved: &ResolvedIdentity,
    ) -> AuthResult<User> {
        if !existing.is_active && self.reactivation == ReactivationPolicy::Reject {
            tracing::warn!(user_id = %existing.id, "inactive local account authenticated upstream");
            return Err(AuthError::Forbidden(reason::ACCOUNT_INACTIVE));
        }

        let mut updated = existing.clone();
        // Sparse upstream payloads must not blank out what we already know.
        let carries_name =
            !resolved.given_name.trim().is_empty() || !resolved.family_name.trim().is_empty();
        if carries_name || existing.display_name.is_empty() {
            updated.display_name = resolved.display_name();
        }
        if !resolved.email.trim().is_empty() {
            updated.email = resolved.email.trim().to_string();
        }
        updated.role = resolved.role;
        updated.is_active = true;

        if updated != existing {
            users.update(&updated).await?;
            tracing::info!(user_id = %updated.id, "synchronised local user from upstream identity");
        }
        Ok(updated)
    }

    async fn create_user(&self, users: &dyn UserStore, resolved: &ResolvedIdentity) -> AuthResult<User> {
        let new_user = NewUser {
            external_identity_id: resolved.external_id.clone(),
            display_name: resolved.display_name(),
            email: resolved.email.trim().to_string(),
            role: resolved.role,
            is_active: true,
        };

        match users.create(new_user).await {
            Ok(user) => {
                tracing::info!(user_id = %user.id, role = %user.role, "provisioned local user");
                Ok(user)
            }
            Err(StoreError::Conflict(_)) => {
                tracing::debug!(subject = %resolved.external_id, "lost provisioning race, re-fetching");
                users
                    .get_by_external_id(&resolved.external_id)
                    .await?
                    .ok_or_else(|| {
                        tracing::error!(subject = %resolved.external_id, "conflicting user vanished");
                        AuthError::Upstream(reason::STORE_UNAVAILABLE)
                    })
            }
            Err(other) => Err(other.into()),
        }
    }

    /// Create the user's profile on first sight. Never touches an existing one.
    ///
    /// An identity without a tenant reference gets no profile yet; the next
    /// sight that carries one creates it. Whether the request needs a tenant
    /// is the tenant guard's call, not provisioning's.
    pub async fn ensure_local_profile(
        &self,
        user_id: UserId,
        resolved: &ResolvedIdentity,
    ) -> AuthResult<()> {
        let Some(profiles) = &self.profiles else {
            return Ok(());
        };
        if resolved.external_tenant_ref.trim().is_empty() {
            tracing::debug!(%user_id, "no tenant reference, profile deferred");
            return Ok(());
        }
        if profiles.get_by_user_id(user_id).await?.is_some() {
            return Ok(());
        }

        let tenant_id = self.resolve_tenant_ref(&resolved.external_tenant_ref).await?;
        let profile = Profile {
            user_id,
            tenant_id,
            first_name: resolved.given_name.trim().to_string(),
            last_name: resolved.family_name.trim().to_string(),
            preferences: Default::default(),
            social_links: Default::default(),
        };

        match profiles.create(profile).await {
            Ok(()) => {
                tracing::info!(%user_id, tenant_id, "provisioned profile");
                Ok(())
            }
            Err(StoreError::Conflict(_)) => Ok(()),
            Err(other) => Err(other.into()),
        }
    }

    /// Map an external tenant reference to an internal id: directory lookup
    /// first, then the reference itself as a numeric id.
    pub async fn resolve_tenant_ref(&self, external_ref: &str) -> AuthResult<i64> {
        let external_ref = external_ref.trim();
        let failed = || {
            tracing::warn!(tenant_ref = %external_ref, "cannot resolve tenant reference");
            AuthError::Upstream(reason::TENANT_RESOLUTION_FAILED)
        };
        if external_ref.is_empty() {
            return Err(failed());
        }

        if let Some(tenants) = &self.tenants {
            if let Some(tenant) = tenants.get_by_external_ref(external_ref).await? {
                return Ok(tenant.id);
            }
        }
        external_ref.parse::<i64>().map_err(|_| failed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{InMemoryProfileStore, InMemoryTenantStore, InMemoryUserStore, Tenant};
    use async_trait::async_trait;
    use campus_auth::Role;

    struct Fixture {
        users: Arc<InMemoryUserStore>,
        profiles: Arc<InMemoryProfileStore>,
        provisioner: IdentityProvisioner,
    }

    fn fixture() -> Fixture {
        let users = Arc::new(InMemoryUserStore::new());
        let profiles = Arc::new(InMemoryProfileStore::new());
        let tenants = Arc::new(InMemoryTenantStore::with_tenants([Tenant {
            id: 42,
            external_ref: Some("org_abc".to_string()),
            name: "North".to_string(),
        }]));
        let provisioner = IdentityProvisioner::new(users.clone(), profiles.clone(), tenants);
        Fixture {
            users,
            profiles,
            provisioner,
        }
    }

    fn alice() -> ResolvedIdentity {
        ResolvedIdentity::new("ext-alice", Role::Faculty)
            .unwrap()
            .with_email("alice@college.edu")
            .with_names("Alice", "Smith")
            .with_tenant_ref("7")
    }

    #[tokio::test]
    async fn first_sight_creates_user_and_profile_once() {
        let f = fixture();
        let first = f.provisioner.ensure_local_identity(&alice()).await.unwrap();
        let second = f.provisioner.ensure_local_identity(&alice()).await.unwrap();

        assert!(first.is_some());
        assert_eq!(first, second);

        let users = f.users.all();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].display_name, "Alice Smith");
        assert!(users[0].is_active);

        let profiles = f.profiles.all();
        assert_eq!(profiles.len(), 1);
        assert_eq!(profiles[0].tenant_id, 7);
        assert!(profiles[0].preferences.is_empty());
    }

    #[tokio::test]
    async fn local_token_fast_path_skips_the_store() {
        let f = fixture();
        let id = UserId::new(99).unwrap();
        let identity = alice().with_local_user_id(Some(id));
        assert_eq!(f.provisioner.ensure_local_identity(&identity).await, Ok(Some(id)));
        assert!(f.users.all().is_empty());
    }

    #[tokio::test]
    async fn disabled_provisioner_returns_none() {
        assert_eq!(
            IdentityProvisioner::disabled().ensure_local_identity(&alice()).await,
            Ok(None)
        );
    }

    #[tokio::test]
    async fn later_resolution_updates_changed_fields() {
        let f = fixture();
        f.provisioner.ensure_local_identity(&alice()).await.unwrap();

        let promoted = ResolvedIdentity::new("ext-alice", Role::Admin)
            .unwrap()
            .with_email("alice@new.edu")
            .with_tenant_ref("7");
        f.provisioner.ensure_local_identity(&promoted).await.unwrap();

        let user = &f.users.all()[0];
        assert_eq!(user.role, Role::Admin);
        assert_eq!(user.email, "alice@new.edu");
        // No names upstream this time; the stored name survives.
        assert_eq!(user.display_name, "Alice Smith");
    }

    #[tokio::test]
    async fn inactive_user_follows_reactivation_policy() {
        let f = fixture();
        f.provisioner.ensure_local_identity(&alice()).await.unwrap();
        let mut stored = f.users.all().remove(0);
        stored.is_active = false;
        f.users.update(&stored).await.unwrap();

        let strict = f.provisioner.clone().with_reactivation(ReactivationPolicy::Reject);
        assert_eq!(
            strict.ensure_local_identity(&alice()).await,
            Err(AuthError::Forbidden(reason::ACCOUNT_INACTIVE))
        );

        f.provisioner.ensure_local_identity(&alice()).await.unwrap();
        assert!(f.users.all()[0].is_active);
    }

    #[test]
    fn reactivation_policy_parses_case_insensitively() {
        assert_eq!(" Reject ".parse::<ReactivationPolicy>(), Ok(ReactivationPolicy::Reject));
        assert_eq!(
            "maybe".parse::<ReactivationPolicy>(),
            Err(ReactivationPolicyError::Unknown("maybe".to_string()))
        );
    }

    #[tokio::test]
    async fn tenant_reference_resolution_order() {
        let f = fixture();
        assert_eq!(f.provisioner.resolve_tenant_ref("org_abc").await, Ok(42));
        assert_eq!(f.provisioner.resolve_tenant_ref(" 9 ").await, Ok(9));
        assert_eq!(
            f.provisioner.resolve_tenant_ref("org_unknown").await,
            Err(AuthError::Upstream(reason::TENANT_RESOLUTION_FAILED))
        );
        assert_eq!(
            f.provisioner.resolve_tenant_ref("").await,
            Err(AuthError::Upstream(reason::TENANT_RESOLUTION_FAILED))
        );
    }

    #[tokio::test]
    async fn missing_tenant_reference_defers_the_profile() {
        let f = fixture();
        let untenanted = alice().with_tenant_ref("  ");
        let id = f.provisioner.ensure_local_identity(&untenanted).await.unwrap();
        assert!(id.is_some());
        assert_eq!(f.users.all().len(), 1);
        assert!(f.profiles.all().is_empty());

        // A later sight with a tenant reference completes provisioning.
        assert_eq!(f.provisioner.ensure_local_identity(&alice()).await.unwrap(), id);
        let profiles = f.profiles.all();
        assert_eq!(profiles.len(), 1);
        assert_eq!(profiles[0].tenant_id, 7);
    }

    #[tokio::test]
    async fn unresolvable_tenant_still_keeps_the_user() {
        let f = fixture();
        let identity = alice().with_tenant_ref("org_nowhere");
        assert_eq!(
            f.provisioner.ensure_local_identity(&identity).await,
            Err(AuthError::Upstream(reason::TENANT_RESOLUTION_FAILED))
        );
        assert_eq!(f.users.all().len(), 1);
        assert!(f.profiles.all().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_first_sight_creates_exactly_one_user() {
        let f = fixture();
        let provisioner = Arc::new(f.provisioner);

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let p = provisioner.clone();
                tokio::spawn(async move { p.ensure_local_identity(&alice()).await })
            })
            .collect();

        let mut ids = Vec::new();
        for h in handles {
            ids.push(h.await.unwrap().unwrap());
        }
        ids.dedup();
        assert_eq!(ids.len(), 1);
        assert_eq!(f.users.all().len(), 1);
        assert_eq!(f.profiles.all().len(), 1);
    }

    /// A user store whose first lookup misses even though a concurrent writer
    /// already inserted the row, forcing the conflict path.
    struct RacingUserStore {
        inner: InMemoryUserStore,
        missed: std::sync::atomic::AtomicBool,
    }

    #[async_trait]
    impl UserStore for RacingUserStore {
        async fn get_by_external_id(&self, external_id: &str) -> Result<Option<User>, StoreError> {
            if !self.missed.swap(true, std::sync::atomic::Ordering::SeqCst) {
                return Ok(None);
            }
            self.inner.get_by_external_id(external_id).await
        }

        async fn create(&self, user: NewUser) -> Result<User, StoreError> {
            self.inner.create(user).await
        }

        async fn update(&self, user: &User) -> Result<(), StoreError> {
            self.inner.update(user).await
        }
    }

    #[tokio::test]
    async fn losing_the_insert_race_refetches_the_winner() {
        let inner = InMemoryUserStore::new();
        let winner = inner
            .create(NewUser {
                external_identity_id: "ext-alice".to_string(),
                display_name: "Alice Smith".to_string(),
                email: "alice@college.edu".to_string(),
                role: Role::Faculty,
                is_active: true,
            })
            .await
            .unwrap();

        let users = Arc::new(RacingUserStore {
            inner,
            missed: Default::default(),
        });
        let provisioner = IdentityProvisioner::new(
            users,
            Arc::new(InMemoryProfileStore::new()),
            Arc::new(InMemoryTenantStore::new()),
        );
        assert_eq!(
            provisioner.ensure_local_identity(&alice()).await,
            Ok(Some(winner.id))
        );
    }

    struct DownStore;

    #[async_trait]
    impl UserStore for DownStore {
        async fn get_by_external_id(&self, _: &str) -> Result<Option<User>, StoreError> {
            Err(StoreError::Unavailable("connection refused".into()))
        }
        async fn create(&self, _: NewUser) -> Result<User, StoreError> {
            Err(StoreError::Unavailable("connection refused".into()))
        }
        async fn update(&self, _: &User) -> Result<(), StoreError> {
            Err(StoreError::Unavailable("connection refused".into()))
        }
    }

    #[tokio::test]
    async fn store_failure_is_upstream_not_a_new_user() {
        let provisioner = IdentityProvisioner::new(
            Arc::new(DownStore),
            Arc::new(InMemoryProfileStore::new()),
            Arc::new(InMemoryTenantStore::new()),
        );
        assert_eq!(
            provisioner.ensure_local_identity(&alice()).await,
            Err(AuthError::Upstream(reason::STORE_UNAVAILABLE))
        );
    }
}
