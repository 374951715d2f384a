//! Credential extraction from raw header values.

use crate::error::{AuthError, reason};

/// Header carrying the legacy opaque session token.
pub const SESSION_TOKEN_HEADER: &str = "X-Session-Token";

/// Where an identity source expects its credential.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum CredentialScheme {
    /// `Authorization: Bearer <token>`.
    Bearer,
    /// The raw header value is the credential.
    Header(&'static str),
}

/// Extract the token from an `Authorization` header value.
///
/// The scheme keyword is matched case-insensitively and whitespace around the
/// token is ignored, but the keyword must be present and followed by a
/// non-empty token.
pub fn parse_bearer(value: &str) -> Result<&str, AuthError> {
    let value = value.trim_start();
    let (scheme, rest) = value
        .split_once(char::is_whitespace)
        .ok_or(AuthError::Unauthenticated(reason::MALFORMED_CREDENTIAL))?;

    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(AuthError::Unauthenticated(reason::MALFORMED_CREDENTIAL));
    }

    let token = rest.trim();
    if token.is_empty() {
        return Err(AuthError::Unauthenticated(reason::MISSING_CREDENTIAL));
    }
    Ok(token)
}

/// Extract a credential carried verbatim in a dedicated header.
pub fn parse_raw(value: &str) -> Result<&str, AuthError> {
    let token = value.trim();
    if token.is_empty() {
        return Err(AuthError::Unauthenticated(reason::MISSING_CREDENTIAL));
    }
    Ok(token)
}
