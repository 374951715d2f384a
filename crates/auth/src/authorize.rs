//! Pure authorization decisions.
//!
//! - No IO
//! - No panics
//! - No business logic (pure policy check)

use crate::error::{AuthError, reason};
use crate::identity::ResolvedIdentity;
use crate::roles::Role;

/// Coarse role gate: succeed if the principal holds any of `allowed`.
///
/// A missing identity is 401; a present identity with no matching role is 403.
/// Tenant context plays no part here.
pub fn require_any_role(
    identity: Option<&ResolvedIdentity>,
    allowed: &[Role],
) -> Result<(), AuthError> {
    let identity = identity.ok_or(AuthError::Unauthenticated(reason::IDENTITY_MISSING))?;

    if allowed.iter().any(|role| identity.has_role(*role)) {
        Ok(())
    } else {
        tracing::debug!(
            subject = %identity.external_id,
            role = %identity.role,
            "role gate denied"
        );
        Err(AuthError::Forbidden(reason::ROLE_NOT_ALLOWED))
    }
}

/// Fold a remote permission check into a pass/fail.
///
/// "We don't know" (an error) stays an error; only a definitive `false` is 403.
pub fn permission_verdict(outcome: Result<bool, AuthError>) -> Result<(), AuthError> {
    match outcome {
        Ok(true) => Ok(()),
        Ok(false) => Err(AuthError::Forbidden(reason::PERMISSION_DENIED)),
        Err(e) => Err(e),
    }
}
