//! OAuth2/OIDC client for the external authorization server.
//!
//! Covers the authorization-code flow (authorization URL, code exchange,
//! refresh, revoke) and the resource-server side (introspection, userinfo).
//! As an [`IdentitySource`] it introspects every presented bearer token.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;
use url::Url;

use campus_auth::{AuthError, AuthResult, CredentialScheme, ResolvedIdentity, reason};

use super::{IdentityAttributes, IdentitySource, classify_remote_status};

const SOURCE: &str = "oauth2";

#[derive(Debug, Error)]
pub enum OAuth2Error {
    #[error("invalid endpoint url: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("authorization server replied {0}")]
    Status(StatusCode),

    #[error("undecodable response: {0}")]
    Decode(String),
}

impl From<OAuth2Error> for AuthError {
    fn from(err: OAuth2Error) -> Self {
        match err {
            OAuth2Error::Status(status) => {
                classify_remote_status(SOURCE, status, reason::AUTHORIZATION_SERVER_UNAVAILABLE)
            }
            other => {
                tracing::error!(source = SOURCE, error = %other, "authorization server call failed");
                AuthError::Upstream(reason::AUTHORIZATION_SERVER_UNAVAILABLE)
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct OAuth2Config {
    pub authorize_url: Url,
    pub token_url: Url,
    pub revoke_url: Url,
    pub introspect_url: Url,
    pub userinfo_url: Url,
    pub client_id: String,
    pub client_secret: Option<String>,
    pub redirect_uri: String,
    pub scopes: Vec<String>,
}

impl OAuth2Config {
    /// Derive the endpoint set from the server's public and admin base URLs,
    /// using the conventional paths (`/oauth2/auth`, `/oauth2/token`, ...).
    pub fn from_base_urls(
        public_base: &str,
        admin_base: &str,
        client_id: impl Into<String>,
        client_secret: Option<String>,
        redirect_uri: impl Into<String>,
    ) -> Result<Self, OAuth2Error> {
        let public = Url::parse(public_base)?;
        let admin = Url::parse(admin_base)?;
        Ok(Self {
            authorize_url: public.join("oauth2/auth")?,
            token_url: public.join("oauth2/token")?,
            revoke_url: public.join("oauth2/revoke")?,
            userinfo_url: public.join("userinfo")?,
            introspect_url: admin.join("admin/oauth2/introspect")?,
            client_id: client_id.into(),
            client_secret,
            redirect_uri: redirect_uri.into(),
            scopes: vec!["openid".to_string(), "offline".to_string()],
        })
    }
}

/// Token endpoint response.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: String,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub id_token: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
}

/// Introspection result, typed.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Introspection {
    pub active: bool,
    #[serde(default, rename = "sub")]
    pub subject: String,
    #[serde(default, rename = "exp")]
    pub expires_at: Option<i64>,
    #[serde(default)]
    pub token_use: Option<String>,
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default, rename = "ext")]
    pub attributes: Option<Value>,
}

impl Introspection {
    /// Turn an introspection result into a principal, failing closed.
    pub fn into_identity(self) -> AuthResult<ResolvedIdentity> {
        if !self.active {
            return Err(AuthError::Unauthenticated(reason::INACTIVE_TOKEN));
        }
        if let Some(token_use) = self.token_use.as_deref() {
            if !token_use.is_empty() && token_use != "access_token" {
                return Err(AuthError::Unauthenticated(reason::WRONG_TOKEN_USE));
            }
        }
        IdentityAttributes::from_value(self.attributes.as_ref()).into_identity(&self.subject)
    }
}

#[derive(Debug, Clone)]
pub struct OAuth2Client {
    http: reqwest::Client,
    config: OAuth2Config,
}

impl OAuth2Client {
    pub fn new(config: OAuth2Config) -> Self {
        Self::with_http(reqwest::Client::new(), config)
    }

    pub fn with_http(http: reqwest::Client, config: OAuth2Config) -> Self {
        Self { http, config }
    }

    pub fn config(&self) -> &OAuth2Config {
        &self.config
    }

    /// URL the browser is sent to for the authorization-code flow.
    pub fn authorization_url(&self, state: &str, nonce: &str) -> Url {
        let mut url = self.config.authorize_url.clone();
        url.query_pairs_mut()
            .append_pair("response_type", "code")
            .append_pair("client_id", &self.config.client_id)
            .append_pair("redirect_uri", &self.config.redirect_uri)
            .append_pair("scope", &self.config.scopes.join(" "))
            .append_pair("state", state)
            .append_pair("nonce", nonce);
        url
    }

    pub async fn exchange_code(&self, code: &str) -> Result<TokenResponse, OAuth2Error> {
        self.token_request(&[
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.config.redirect_uri.as_str()),
        ])
        .await
    }

    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenResponse, OAuth2Error> {
        self.token_request(&[
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
        ])
        .await
    }

    pub async fn revoke(&self, token: &str) -> Result<(), OAuth2Error> {
        let response = self
            .authenticated(self.http.post(self.config.revoke_url.clone()))
            .form(&[("token", token)])
            .send()
            .await?;
        ensure_success(response.status())
    }

    pub async fn introspect(&self, token: &str) -> Result<Introspection, OAuth2Error> {
        let response = self
            .authenticated(self.http.post(self.config.introspect_url.clone()))
            .form(&[("token", token)])
            .send()
            .await?;
        ensure_success(response.status())?;
        response
            .json::<Introspection>()
            .await
            .map_err(|e| OAuth2Error::Decode(e.to_string()))
    }

    /// OIDC userinfo for an access token.
    pub async fn userinfo(&self, access_token: &str) -> Result<Map<String, Value>, OAuth2Error> {
        let response = self
            .http
            .get(self.config.userinfo_url.clone())
            .bearer_auth(access_token)
            .send()
            .await?;
        ensure_success(response.status())?;
        response
            .json::<Map<String, Value>>()
            .await
            .map_err(|e| OAuth2Error::Decode(e.to_string()))
    }

    /// Fill contact details introspection left empty from userinfo.
    ///
    /// A failing userinfo call leaves the identity as it was; it was already
    /// authenticated by introspection.
    pub async fn complete_from_userinfo(&self, identity: &mut ResolvedIdentity, access_token: &str) {
        let needs_email = identity.email.trim().is_empty();
        let needs_names =
            identity.given_name.trim().is_empty() && identity.family_name.trim().is_empty();
        if !needs_email && !needs_names {
            return;
        }

        let claims = match self.userinfo(access_token).await {
            Ok(claims) => claims,
            Err(e) => {
                tracing::warn!(source = SOURCE, error = %e, "userinfo unavailable, keeping introspected identity");
                return;
            }
        };
        if needs_email {
            if let Some(email) = text_claim(&claims, "email") {
                identity.email = email.to_string();
            }
        }
        if needs_names {
            if let Some(given) = text_claim(&claims, "given_name") {
                identity.given_name = given.to_string();
            }
            if let Some(family) = text_claim(&claims, "family_name") {
                identity.family_name = family.to_string();
            }
        }
    }

    async fn token_request(&self, params: &[(&str, &str)]) -> Result<TokenResponse, OAuth2Error> {
        let mut form: Vec<(&str, &str)> = params.to_vec();
        if self.config.client_secret.is_none() {
            form.push(("client_id", self.config.client_id.as_str()));
        }
        let response = self
            .authenticated(self.http.post(self.config.token_url.clone()))
            .form(&form)
            .send()
            .await?;
        ensure_success(response.status())?;
        response
            .json::<TokenResponse>()
            .await
            .map_err(|e| OAuth2Error::Decode(e.to_string()))
    }

    fn authenticated(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.config.client_secret {
            Some(secret) => request.basic_auth(&self.config.client_id, Some(secret)),
            None => request,
        }
    }
}

fn text_claim<'a>(claims: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    claims
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

fn ensure_success(status: StatusCode) -> Result<(), OAuth2Error> {
    if status.is_success() {
        Ok(())
    } else {
        Err(OAuth2Error::Status(status))
    }
}

#[async_trait]
impl IdentitySource for OAuth2Client {
    fn name(&self) -> &'static str {
        SOURCE
    }

    fn scheme(&self) -> CredentialScheme {
        CredentialScheme::Bearer
    }

    async fn resolve(&self, credential: &str) -> AuthResult<ResolvedIdentity> {
        let introspection = self.introspect(credential).await?;
        introspection.into_identity().inspect_err(|e| {
            tracing::info!(source = SOURCE, reason = e.reason(), "introspected token refused");
        })
    }
}
