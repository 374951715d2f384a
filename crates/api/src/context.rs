//! Typed per-request context accumulated by the pipeline stages.
//!
//! Each stage reads what earlier stages published and adds its own slot. The
//! context lives in the request extensions; handlers pull it out with the
//! [`RequestContext`] extractor.

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use serde::Serialize;

use campus_auth::{AuthError, ResolvedIdentity, reason};
use campus_core::{StudentId, TenantId};

use crate::app::errors::ApiError;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RequestContext {
    identity: Option<ResolvedIdentity>,
    tenant_id: Option<TenantId>,
    student_id: Option<StudentId>,
    /// Student a path addresses, once the ownership stage has validated it.
    addressed_student: Option<StudentId>,
}

impl RequestContext {
    pub fn identity(&self) -> Option<&ResolvedIdentity> {
        self.identity.as_ref()
    }

    pub fn tenant_id(&self) -> Option<&TenantId> {
        self.tenant_id.as_ref()
    }

    pub fn student_id(&self) -> Option<StudentId> {
        self.student_id
    }

    pub fn addressed_student(&self) -> Option<StudentId> {
        self.addressed_student
    }

    /// The identity, or the error a stage reports when its prerequisite is
    /// missing from the chain.
    pub fn require_identity(&self) -> Result<&ResolvedIdentity, AuthError> {
        self.identity
            .as_ref()
            .ok_or(AuthError::Unauthenticated(reason::IDENTITY_MISSING))
    }

    pub(crate) fn set_identity(&mut self, identity: ResolvedIdentity) {
        self.identity = Some(identity);
    }

    pub(crate) fn set_tenant_id(&mut self, tenant_id: TenantId) {
        self.tenant_id = Some(tenant_id);
    }

    pub(crate) fn set_student_id(&mut self, student_id: StudentId) {
        self.student_id = Some(student_id);
    }

    pub(crate) fn set_addressed_student(&mut self, student_id: StudentId) {
        self.addressed_student = Some(student_id);
    }
}

/// Handlers always get a context; slots no stage filled are `None`.
#[async_trait]
impl<S> FromRequestParts<S> for RequestContext
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts
            .extensions
            .get::<RequestContext>()
            .cloned()
            .unwrap_or_default())
    }
}

/// Extractor for handlers that cannot run without an authenticated principal.
#[derive(Debug, Clone)]
pub struct CurrentIdentity(pub ResolvedIdentity);

#[async_trait]
impl<S> FromRequestParts<S> for CurrentIdentity
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<RequestContext>()
            .and_then(|ctx| ctx.identity().cloned())
            .map(CurrentIdentity)
            .ok_or(ApiError(AuthError::Unauthenticated(reason::IDENTITY_MISSING)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use campus_auth::Role;

    #[test]
    fn empty_context_never_panics() {
        let ctx = RequestContext::default();
        assert!(ctx.identity().is_none());
        assert!(ctx.tenant_id().is_none());
        assert!(ctx.student_id().is_none());
        assert_eq!(
            ctx.require_identity(),
            Err(AuthError::Unauthenticated(reason::IDENTITY_MISSING))
        );
    }

    #[test]
    fn slots_are_independent() {
        let mut ctx = RequestContext::default();
        ctx.set_identity(ResolvedIdentity::new("ext-1", Role::Student).unwrap());
        ctx.set_student_id(StudentId::new(3).unwrap());
        assert!(ctx.tenant_id().is_none());
        assert!(ctx.addressed_student().is_none());
        assert_eq!(ctx.student_id().map(|s| s.get()), Some(3));
    }
}
