use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use uuid::Uuid;

use campus_auth::{AuthError, AuthResult, LocalClaims, LocalJwt, ResolvedIdentity, reason};

use super::{RefreshRecord, TokenStore};

/// Access + refresh token pair handed to clients after login or refresh.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: &'static str,
    pub expires_at: DateTime<Utc>,
}

/// Issues, rotates and revokes locally signed tokens.
#[derive(Clone)]
pub struct TokenService {
    jwt: Arc<LocalJwt>,
    store: Arc<dyn TokenStore>,
    refresh_ttl: Duration,
}

impl TokenService {
    pub fn new(jwt: Arc<LocalJwt>, store: Arc<dyn TokenStore>, refresh_ttl: Duration) -> Self {
        Self {
            jwt,
            store,
            refresh_ttl,
        }
    }

    pub fn jwt(&self) -> &LocalJwt {
        &self.jwt
    }

    pub async fn issue_pair(&self, identity: &ResolvedIdentity) -> AuthResult<TokenPair> {
        self.issue_linked_pair(identity, None).await
    }

    /// Issue a pair whose refresh record also remembers the authorization
    /// server's refresh token.
    pub async fn issue_linked_pair(
        &self,
        identity: &ResolvedIdentity,
        upstream_refresh_token: Option<String>,
    ) -> AuthResult<TokenPair> {
        let access = self.jwt.generate(identity)?;
        let refresh_token = Uuid::new_v4().simple().to_string();
        let now = Utc::now();

        self.store
            .store_refresh(
                &refresh_token,
                RefreshRecord {
                    identity: identity.clone(),
                    issued_at: now,
                    expires_at: now + self.refresh_ttl,
                    upstream_refresh_token,
                },
            )
            .await?;

        tracing::info!(subject = %identity.external_id, jti = %access.jti, "issued token pair");
        Ok(TokenPair {
            access_token: access.token,
            refresh_token,
            token_type: "Bearer",
            expires_at: access.expires_at,
        })
    }

    /// Consume a refresh token. It is gone whether or not a new pair follows.
    pub async fn redeem(&self, refresh_token: &str) -> AuthResult<RefreshRecord> {
        self.store
            .take_refresh(refresh_token.trim())
            .await?
            .ok_or(AuthError::Unauthenticated(reason::INVALID_REFRESH_TOKEN))
    }

    /// Revoke the presented access token for as long as it could still verify
    /// (`exp` plus the verifier's leeway) and drop the refresh token if one was
    /// supplied. Returns the dropped refresh record, if there was one.
    pub async fn logout(
        &self,
        access: &LocalClaims,
        refresh_token: Option<&str>,
    ) -> AuthResult<Option<RefreshRecord>> {
        let until = access.expires_at() + self.jwt.leeway();
        self.store.revoke(&access.jti, until).await?;
        let dropped = match refresh_token.map(str::trim).filter(|t| !t.is_empty()) {
            Some(token) => self.store.take_refresh(token).await?,
            None => None,
        };
        tracing::info!(subject = %access.sub, jti = %access.jti, "logged out");
        Ok(dropped)
    }
}
