use chrono::{DateTime, Duration, TimeZone, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use campus_core::UserId;

use crate::error::{AuthError, reason};
use crate::identity::ResolvedIdentity;
use crate::roles::Role;

/// Claims carried by tokens this gateway issues itself.
///
/// Once the signature checks out these are trusted as-is; `local_user_id` lets
/// the provisioner skip its store lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalClaims {
    /// External identity id of the principal.
    pub sub: String,
    pub iss: String,
    pub iat: i64,
    pub exp: i64,
    /// Token id, used for revocation.
    pub jti: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_user_id: Option<i64>,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub tenant_ref: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub roll_number: Option<String>,
}

impl LocalClaims {
    pub fn issued_at(&self) -> DateTime<Utc> {
        Utc.timestamp_opt(self.iat, 0).single().unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        Utc.timestamp_opt(self.exp, 0).single().unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    pub fn into_identity(self) -> Result<ResolvedIdentity, AuthError> {
        // Zero (or garbage) means "not provisioned yet".
        let local_user_id = self.local_user_id.and_then(|raw| UserId::new(raw).ok());
        Ok(ResolvedIdentity::new(self.sub, Role::parse_or_default(&self.role))?
            .with_email(self.email)
            .with_names(self.first_name, self.last_name)
            .with_tenant_ref(self.tenant_ref)
            .with_roll_number(self.roll_number)
            .with_local_user_id(local_user_id))
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenValidationError {
    #[error("token has expired")]
    Expired,

    #[error("token not yet valid (issued_at is in the future)")]
    NotYetValid,

    #[error("invalid token time window (expires_at <= issued_at)")]
    InvalidTimeWindow,
}

/// Deterministically validate the time window of decoded claims.
///
/// Signature and issuer are checked by [`LocalJwt::verify`]; this only looks at
/// `iat`/`exp` against `now`, with `leeway` tolerated for clock skew.
pub fn validate_claims(
    claims: &LocalClaims,
    now: DateTime<Utc>,
    leeway: Duration,
) -> Result<(), TokenValidationError> {
    let issued_at = claims.issued_at();
    let expires_at = claims.expires_at();
    if expires_at <= issued_at {
        return Err(TokenValidationError::InvalidTimeWindow);
    }
    if now + leeway < issued_at {
        return Err(TokenValidationError::NotYetValid);
    }
    if now >= expires_at + leeway {
        return Err(TokenValidationError::Expired);
    }
    Ok(())
}

impl From<TokenValidationError> for AuthError {
    fn from(err: TokenValidationError) -> Self {
        match err {
            TokenValidationError::Expired => AuthError::Unauthenticated(reason::TOKEN_EXPIRED),
            TokenValidationError::NotYetValid | TokenValidationError::InvalidTimeWindow => {
                AuthError::Unauthenticated(reason::INVALID_TOKEN)
            }
        }
    }
}

/// A freshly signed access token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedToken {
    pub token: String,
    pub jti: String,
    pub expires_at: DateTime<Utc>,
}

/// HS256 signer/verifier for locally issued tokens.
#[derive(Clone)]
pub struct LocalJwt {
    encoding: EncodingKey,
    decoding: DecodingKey,
    issuer: String,
    ttl: Duration,
    leeway: Duration,
}

impl core::fmt::Debug for LocalJwt {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("LocalJwt")
            .field("issuer", &self.issuer)
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl LocalJwt {
    pub fn new(secret: &[u8], issuer: impl Into<String>, ttl: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            issuer: issuer.into(),
            ttl,
            leeway: Duration::seconds(30),
        }
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Clock skew tolerated past `exp`; a token verifies until `exp + leeway`.
    pub fn leeway(&self) -> Duration {
        self.leeway
    }

    pub fn with_leeway(mut self, leeway: Duration) -> Self {
        self.leeway = leeway;
        self
    }

    /// Sign a token for an already resolved identity.
    pub fn generate(&self, identity: &ResolvedIdentity) -> Result<IssuedToken, AuthError> {
        self.generate_at(identity, Utc::now())
    }

    pub fn generate_at(
        &self,
        identity: &ResolvedIdentity,
        now: DateTime<Utc>,
    ) -> Result<IssuedToken, AuthError> {
        let expires_at = now + self.ttl;
        let jti = Uuid::new_v4().to_string();
        let claims = LocalClaims {
            sub: identity.external_id.clone(),
            iss: self.issuer.clone(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
            jti: jti.clone(),
            local_user_id: identity.local_user_id.map(i64::from),
            email: identity.email.clone(),
            role: identity.role.as_str().to_string(),
            tenant_ref: identity.external_tenant_ref.clone(),
            first_name: identity.given_name.clone(),
            last_name: identity.family_name.clone(),
            roll_number: identity.roll_number.clone(),
        };

        let token = jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| {
                tracing::error!(error = %e, "failed to sign local token");
                AuthError::Upstream(reason::TOKEN_SIGNING_FAILED)
            })?;

        Ok(IssuedToken {
            token,
            jti,
            expires_at,
        })
    }

    /// Verify signature, issuer and time window of a locally issued token.
    pub fn verify(&self, token: &str) -> Result<LocalClaims, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[self.issuer.as_str()]);
        validation.leeway = self.leeway.num_seconds().max(0) as u64;

        let data = jsonwebtoken::decode::<LocalClaims>(token, &self.decoding, &validation)?;
        validate_claims(&data.claims, Utc::now(), self.leeway)?;
        Ok(data.claims)
    }
}
