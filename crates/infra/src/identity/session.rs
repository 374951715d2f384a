//! Legacy opaque-session introspection against the identity provider's whoami
//! endpoint.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use url::Url;

use campus_auth::{
    AuthError, AuthResult, CredentialScheme, ResolvedIdentity, SESSION_TOKEN_HEADER, reason,
};

use super::{IdentityAttributes, IdentitySource, classify_remote_status, transport_failure};

const SOURCE: &str = "session";

#[derive(Debug, Deserialize)]
struct WhoAmI {
    #[serde(default)]
    active: bool,
    #[serde(default)]
    identity: Option<SessionIdentity>,
}

#[derive(Debug, Deserialize)]
struct SessionIdentity {
    #[serde(default)]
    id: String,
    #[serde(default)]
    traits: Option<Value>,
}

#[derive(Debug, Clone)]
pub struct SessionClient {
    http: reqwest::Client,
    whoami_url: Url,
}

impl SessionClient {
    pub fn new(whoami_url: Url) -> Self {
        Self::with_http(reqwest::Client::new(), whoami_url)
    }

    pub fn with_http(http: reqwest::Client, whoami_url: Url) -> Self {
        Self { http, whoami_url }
    }
}

#[async_trait]
impl IdentitySource for SessionClient {
    fn name(&self) -> &'static str {
        SOURCE
    }

    fn scheme(&self) -> CredentialScheme {
        CredentialScheme::Header(SESSION_TOKEN_HEADER)
    }

    async fn resolve(&self, credential: &str) -> AuthResult<ResolvedIdentity> {
        let response = self
            .http
            .get(self.whoami_url.clone())
            .header(SESSION_TOKEN_HEADER, credential)
            .send()
            .await
            .map_err(|e| transport_failure(SOURCE, &e, reason::IDENTITY_PROVIDER_UNAVAILABLE))?;

        let status = response.status();
        if !status.is_success() {
            return Err(classify_remote_status(
                SOURCE,
                status,
                reason::IDENTITY_PROVIDER_UNAVAILABLE,
            ));
        }

        let whoami: WhoAmI = response.json().await.map_err(|e| {
            tracing::error!(source = SOURCE, error = %e, "undecodable whoami payload");
            AuthError::Upstream(reason::IDENTITY_PROVIDER_UNAVAILABLE)
        })?;

        if !whoami.active {
            tracing::info!(source = SOURCE, "inactive session presented");
            return Err(AuthError::Unauthenticated(reason::INACTIVE_SESSION));
        }

        let identity = whoami
            .identity
            .ok_or(AuthError::Unauthenticated(reason::MISSING_SUBJECT))?;
        IdentityAttributes::from_value(identity.traits.as_ref()).into_identity(&identity.id)
    }
}
