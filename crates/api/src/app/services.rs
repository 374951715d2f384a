//! Infrastructure wiring: stores, identity sources and pipeline collaborators.

use std::sync::Arc;

use chrono::Duration;
use thiserror::Error;

use campus_auth::LocalJwt;
use campus_infra::identity::{OAuth2Config, OAuth2Error};
use campus_infra::store::{
    InMemoryProfileStore, InMemoryStudentStore, InMemoryTenantStore, InMemoryUserStore,
    PostgresStore, ProfileStore, StoreError, StudentStore, TenantStore, UserStore,
};
use campus_infra::{
    HttpRelationshipAuthority, IdentityProvisioner, InMemoryRelationshipAuthority,
    InMemoryTokenStore, LocalJwtSource, OAuth2Client, RelationshipAuthority, SessionClient,
    StudentProfileLoader, TenantGuard, TokenService, TokenStore,
};

use crate::app::oauth_flow::PendingLogins;
use crate::config::{Config, ConfigError, TenantMode};

#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("store setup failed: {0}")]
    Store(#[from] StoreError),

    #[error("oauth2 setup failed: {0}")]
    OAuth2(#[from] OAuth2Error),

    #[error("invalid collaborator url: {0}")]
    Url(#[from] url::ParseError),
}

/// Every collaborator the route groups need, shared across requests.
#[derive(Clone)]
pub struct AppServices {
    pub tokens: TokenService,
    pub local_source: Arc<LocalJwtSource>,
    pub oauth2: Option<Arc<OAuth2Client>>,
    pub session: Option<Arc<SessionClient>>,
    pub provisioner: IdentityProvisioner,
    pub tenant_guard: TenantGuard,
    pub student_loader: StudentProfileLoader,
    pub relations: Arc<dyn RelationshipAuthority>,
    pub pending_logins: Arc<PendingLogins>,
}

/// Stores backing the pipeline; in-memory or Postgres.
#[derive(Clone)]
pub struct Stores {
    pub users: Arc<dyn UserStore>,
    pub profiles: Arc<dyn ProfileStore>,
    pub tenants: Arc<dyn TenantStore>,
    pub students: Arc<dyn StudentStore>,
}

impl Stores {
    pub fn in_memory() -> Self {
        Self {
            users: Arc::new(InMemoryUserStore::new()),
            profiles: Arc::new(InMemoryProfileStore::new()),
            tenants: Arc::new(InMemoryTenantStore::new()),
            students: Arc::new(InMemoryStudentStore::new()),
        }
    }

    pub fn postgres(store: PostgresStore) -> Self {
        let store = Arc::new(store);
        Self {
            users: store.clone(),
            profiles: store.clone(),
            tenants: store.clone(),
            students: store,
        }
    }
}

/// Assembles [`AppServices`] piece by piece; tests use it with mock collaborators.
pub struct ServicesBuilder {
    jwt: Arc<LocalJwt>,
    refresh_ttl: Duration,
    stores: Stores,
    token_store: Arc<dyn TokenStore>,
    relations: Arc<dyn RelationshipAuthority>,
    oauth2: Option<OAuth2Client>,
    session: Option<SessionClient>,
    tenant_mode: TenantMode,
    reactivation: campus_infra::ReactivationPolicy,
}

impl ServicesBuilder {
    pub fn new(jwt: LocalJwt, stores: Stores, token_store: Arc<dyn TokenStore>) -> Self {
        Self {
            jwt: Arc::new(jwt),
            refresh_ttl: Duration::days(7),
            stores,
            token_store,
            relations: Arc::new(InMemoryRelationshipAuthority::new()),
            oauth2: None,
            session: None,
            tenant_mode: TenantMode::default(),
            reactivation: Default::default(),
        }
    }

    pub fn refresh_ttl(mut self, ttl: Duration) -> Self {
        self.refresh_ttl = ttl;
        self
    }

    pub fn relations(mut self, relations: Arc<dyn RelationshipAuthority>) -> Self {
        self.relations = relations;
        self
    }

    pub fn oauth2(mut self, client: OAuth2Client) -> Self {
        self.oauth2 = Some(client);
        self
    }

    pub fn session(mut self, client: SessionClient) -> Self {
        self.session = Some(client);
        self
    }

    pub fn tenant_mode(mut self, mode: TenantMode) -> Self {
        self.tenant_mode = mode;
        self
    }

    pub fn reactivation(mut self, policy: campus_infra::ReactivationPolicy) -> Self {
        self.reactivation = policy;
        self
    }

    pub fn build(self) -> AppServices {
        let Stores {
            users,
            profiles,
            tenants,
            students,
        } = self.stores;

        let tenant_guard = match self.tenant_mode {
            TenantMode::Trusting => TenantGuard::Trusting,
            TenantMode::Strict => TenantGuard::Strict(tenants.clone()),
        };

        AppServices {
            tokens: TokenService::new(self.jwt.clone(), self.token_store.clone(), self.refresh_ttl),
            local_source: Arc::new(
                LocalJwtSource::new(self.jwt).with_revocations(self.token_store),
            ),
            oauth2: self.oauth2.map(Arc::new),
            session: self.session.map(Arc::new),
            provisioner: IdentityProvisioner::new(users, profiles, tenants)
                .with_reactivation(self.reactivation),
            tenant_guard,
            student_loader: StudentProfileLoader::new(students),
            relations: self.relations,
            pending_logins: Arc::new(PendingLogins::new()),
        }
    }
}

pub async fn build_services(config: &Config) -> Result<AppServices, StartupError> {
    let jwt = LocalJwt::new(
        config.jwt_secret.as_bytes(),
        config.jwt_issuer.clone(),
        Duration::minutes(config.access_ttl_minutes),
    );

    let stores = if config.use_persistent_stores {
        let url = config.database_url.as_deref().ok_or(ConfigError::Missing {
            key: "DATABASE_URL",
            reason: "USE_PERSISTENT_STORES=true",
        })?;
        let store = PostgresStore::connect(url).await?;
        store.apply_schema().await?;
        tracing::info!("using postgres identity stores");
        Stores::postgres(store)
    } else {
        tracing::info!("using in-memory identity stores");
        Stores::in_memory()
    };

    let mut builder = ServicesBuilder::new(jwt, stores, token_store(config)?)
        .refresh_ttl(Duration::hours(config.refresh_ttl_hours))
        .tenant_mode(config.tenant_mode)
        .reactivation(config.reactivation_policy);

    match (&config.relations_read_url, &config.relations_write_url) {
        (Some(read), write) => {
            let write = write.as_ref().unwrap_or(read);
            builder = builder.relations(Arc::new(HttpRelationshipAuthority::new(read, write)?));
        }
        (None, _) => {
            tracing::warn!("RELATIONS_READ_URL not set; using in-memory relationship authority");
        }
    }

    if let Some(oauth2) = &config.oauth2 {
        builder = builder.oauth2(OAuth2Client::new(OAuth2Config::from_base_urls(
            oauth2.public_url.as_str(),
            oauth2.admin_url.as_str(),
            oauth2.client_id.clone(),
            oauth2.client_secret.clone(),
            oauth2.redirect_uri.clone(),
        )?));
    }

    if let Some(whoami) = &config.session_whoami_url {
        builder = builder.session(SessionClient::new(whoami.clone()));
    }

    Ok(builder.build())
}

#[cfg(feature = "redis")]
fn token_store(config: &Config) -> Result<Arc<dyn TokenStore>, StartupError> {
    let store: Arc<dyn TokenStore> = match &config.redis_url {
        Some(url) => {
            tracing::info!("using redis token store");
            Arc::new(campus_infra::tokens::RedisTokenStore::new(url, None)?)
        }
        None => InMemoryTokenStore::shared(),
    };
    Ok(store)
}

#[cfg(not(feature = "redis"))]
fn token_store(config: &Config) -> Result<Arc<dyn TokenStore>, StartupError> {
    if config.redis_url.is_some() {
        tracing::warn!("REDIS_URL set but redis feature not enabled, falling back to in-memory");
    }
    let store: Arc<dyn TokenStore> = InMemoryTokenStore::shared();
    Ok(store)
}
