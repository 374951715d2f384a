//! Identity sources: one trait, three credential forms.
//!
//! Every adapter fails closed. A credential either resolves to a
//! [`ResolvedIdentity`] with a non-empty external id or the request is rejected;
//! there is no anonymous fallthrough.

use async_trait::async_trait;
use reqwest::StatusCode;

use campus_auth::{AuthError, AuthResult, CredentialScheme, ResolvedIdentity, reason};

pub mod attributes;
pub mod local_jwt;
pub mod oauth2;
pub mod session;

pub use attributes::IdentityAttributes;
pub use local_jwt::LocalJwtSource;
pub use oauth2::{Introspection, OAuth2Client, OAuth2Config, OAuth2Error, TokenResponse};
pub use session::SessionClient;

#[async_trait]
pub trait IdentitySource: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Where this source expects its credential on the request.
    fn scheme(&self) -> CredentialScheme;

    async fn resolve(&self, credential: &str) -> AuthResult<ResolvedIdentity>;
}

/// Map a non-success status from a remote identity authority.
///
/// 401/403 (and any other 4xx) mean the remote looked at the credential and said
/// no; everything else means we could not get an answer.
pub(crate) fn classify_remote_status(
    source: &'static str,
    status: StatusCode,
    upstream_reason: &'static str,
) -> AuthError {
    if status.is_client_error() {
        tracing::info!(source, status = status.as_u16(), "credential rejected by remote");
        AuthError::Unauthenticated(reason::CREDENTIAL_REJECTED)
    } else {
        tracing::error!(source, status = status.as_u16(), "remote identity authority failed");
        AuthError::Upstream(upstream_reason)
    }
}

pub(crate) fn transport_failure(
    source: &'static str,
    err: &reqwest::Error,
    upstream_reason: &'static str,
) -> AuthError {
    tracing::error!(source, error = %err, "remote identity authority unreachable");
    AuthError::Upstream(upstream_reason)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_rejections_and_failures_are_distinct() {
        assert_eq!(
            classify_remote_status("t", StatusCode::UNAUTHORIZED, reason::IDENTITY_PROVIDER_UNAVAILABLE),
            AuthError::Unauthenticated(reason::CREDENTIAL_REJECTED)
        );
        assert_eq!(
            classify_remote_status("t", StatusCode::FORBIDDEN, reason::IDENTITY_PROVIDER_UNAVAILABLE),
            AuthError::Unauthenticated(reason::CREDENTIAL_REJECTED)
        );
        assert_eq!(
            classify_remote_status("t", StatusCode::BAD_GATEWAY, reason::IDENTITY_PROVIDER_UNAVAILABLE),
            AuthError::Upstream(reason::IDENTITY_PROVIDER_UNAVAILABLE)
        );
    }
}
