//! Authentication/authorization failure taxonomy.
//!
//! Every adapter, guard and stage of the pipeline fails with an [`AuthError`].
//! The four variants are the only categories the HTTP layer ever sees; each
//! carries a short machine-readable reason that is safe to return to clients.

use thiserror::Error;

pub type AuthResult<T> = Result<T, AuthError>;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum AuthError {
    /// Bad or missing path/header values supplied by the caller.
    #[error("malformed input: {0}")]
    MalformedInput(&'static str),

    /// No credential, an invalid/expired credential, an unresolvable identity,
    /// or a missing prerequisite stage.
    #[error("unauthenticated: {0}")]
    Unauthenticated(&'static str),

    /// Valid identity that is not allowed to proceed.
    #[error("forbidden: {0}")]
    Forbidden(&'static str),

    /// A remote dependency or store failed; the outcome is unknown.
    #[error("upstream failure: {0}")]
    Upstream(&'static str),
}

impl AuthError {
    pub fn reason(&self) -> &'static str {
        match self {
            AuthError::MalformedInput(r)
            | AuthError::Unauthenticated(r)
            | AuthError::Forbidden(r)
            | AuthError::Upstream(r) => r,
        }
    }

    pub fn category(&self) -> &'static str {
        match self {
            AuthError::MalformedInput(_) => "malformed_input",
            AuthError::Unauthenticated(_) => "unauthenticated",
            AuthError::Forbidden(_) => "forbidden",
            AuthError::Upstream(_) => "upstream",
        }
    }
}

/// Reason codes used by the pipeline.
pub mod reason {
    pub const MISSING_CREDENTIAL: &str = "missing_credential";
    pub const MALFORMED_CREDENTIAL: &str = "malformed_credential";
    pub const INVALID_TOKEN: &str = "invalid_token";
    pub const TOKEN_EXPIRED: &str = "token_expired";
    pub const TOKEN_REVOKED: &str = "token_revoked";
    pub const INACTIVE_TOKEN: &str = "inactive_token";
    pub const WRONG_TOKEN_USE: &str = "wrong_token_use";
    pub const INACTIVE_SESSION: &str = "inactive_session";
    pub const MISSING_SUBJECT: &str = "missing_subject";
    pub const CREDENTIAL_REJECTED: &str = "credential_rejected";
    pub const IDENTITY_MISSING: &str = "identity_missing";
    pub const STUDENT_CONTEXT_MISSING: &str = "student_context_missing";
    pub const INVALID_REFRESH_TOKEN: &str = "invalid_refresh_token";

    pub const MISSING_TENANT: &str = "missing_tenant_reference";
    pub const MISSING_STUDENT_ID: &str = "missing_student_id";
    pub const INVALID_STUDENT_ID: &str = "invalid_student_id";
    pub const MISSING_PARAMETER: &str = "missing_parameter";
    pub const INVALID_STATE: &str = "invalid_state";
    pub const UNKNOWN_ROLE: &str = "unknown_role";

    pub const ROLE_NOT_ALLOWED: &str = "role_not_allowed";
    pub const PERMISSION_DENIED: &str = "permission_denied";
    pub const OWNERSHIP_MISMATCH: &str = "ownership_mismatch";
    pub const TENANT_UNVERIFIABLE: &str = "tenant_unverifiable";
    pub const STUDENT_NOT_REGISTERED: &str = "student_not_registered";
    pub const STUDENT_INACTIVE: &str = "student_inactive";
    pub const ACCOUNT_INACTIVE: &str = "account_inactive";

    pub const IDENTITY_PROVIDER_UNAVAILABLE: &str = "identity_provider_unavailable";
    pub const AUTHORIZATION_SERVER_UNAVAILABLE: &str = "authorization_server_unavailable";
    pub const RELATIONSHIP_AUTHORITY_UNAVAILABLE: &str = "relationship_authority_unavailable";
    pub const STORE_UNAVAILABLE: &str = "store_unavailable";
    pub const TENANT_RESOLUTION_FAILED: &str = "tenant_resolution_failed";
    pub const TOKEN_SIGNING_FAILED: &str = "token_signing_failed";
}

impl From<jsonwebtoken::errors::Error> for AuthError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;
        match err.kind() {
            ErrorKind::ExpiredSignature => Self::Unauthenticated(reason::TOKEN_EXPIRED),
            _ => Self::Unauthenticated(reason::INVALID_TOKEN),
        }
    }
}
