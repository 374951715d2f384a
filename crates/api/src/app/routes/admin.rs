//! Role and permission administration over the relationship authority.
//!
//! Role memberships and permission facts are relation tuples; granting and
//! revoking are idempotent. Only a super admin may hand out or take away the
//! super admin role.

use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    routing::put,
    Json, Router,
};

use campus_auth::{AuthError, Role, reason};

use crate::app::dto::{PermissionGrant, RoleMembership};
use crate::app::errors::ApiError;
use crate::app::services::AppServices;
use crate::context::CurrentIdentity;

pub fn router() -> Router {
    Router::new()
        .route(
            "/roles/:role/members/:subject",
            put(grant_role).delete(revoke_role).get(check_membership),
        )
        .route("/permissions", put(grant_permission).delete(revoke_permission))
}

fn parse_role(raw: &str) -> Result<Role, AuthError> {
    raw.parse::<Role>()
        .map_err(|_| AuthError::MalformedInput(reason::UNKNOWN_ROLE))
}

/// Privilege escalation guard for the role being changed.
fn may_administer(actor: Role, target: Role) -> Result<(), AuthError> {
    match (actor, target) {
        (Role::SuperAdmin, _) => Ok(()),
        (Role::Admin, Role::SuperAdmin) => Err(AuthError::Forbidden(reason::ROLE_NOT_ALLOWED)),
        (Role::Admin, _) => Ok(()),
        _ => Err(AuthError::Forbidden(reason::ROLE_NOT_ALLOWED)),
    }
}

/// PUT /admin/roles/:role/members/:subject
pub async fn grant_role(
    Extension(services): Extension<Arc<AppServices>>,
    CurrentIdentity(actor): CurrentIdentity,
    Path((role, subject)): Path<(String, String)>,
) -> Result<StatusCode, ApiError> {
    let role = parse_role(&role)?;
    may_administer(actor.role, role)?;

    services.relations.grant_role(&subject, role).await?;
    tracing::info!(actor = %actor.external_id, %subject, %role, "role granted");
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /admin/roles/:role/members/:subject
pub async fn revoke_role(
    Extension(services): Extension<Arc<AppServices>>,
    CurrentIdentity(actor): CurrentIdentity,
    Path((role, subject)): Path<(String, String)>,
) -> Result<StatusCode, ApiError> {
    let role = parse_role(&role)?;
    may_administer(actor.role, role)?;

    services.relations.revoke_role(&subject, role).await?;
    tracing::info!(actor = %actor.external_id, %subject, %role, "role revoked");
    Ok(StatusCode::NO_CONTENT)
}

/// GET /admin/roles/:role/members/:subject
pub async fn check_membership(
    Extension(services): Extension<Arc<AppServices>>,
    Path((role, subject)): Path<(String, String)>,
) -> Result<Json<RoleMembership>, ApiError> {
    let role = parse_role(&role)?;
    let member = services.relations.check_role_membership(&subject, role).await?;
    Ok(Json(RoleMembership {
        role,
        subject,
        member,
    }))
}

fn validate_grant(grant: &PermissionGrant) -> Result<(), AuthError> {
    let blank = [&grant.subject, &grant.action, &grant.resource]
        .iter()
        .any(|field| field.trim().is_empty());
    if blank {
        return Err(AuthError::MalformedInput(reason::MISSING_PARAMETER));
    }
    Ok(())
}

/// PUT /admin/permissions
pub async fn grant_permission(
    Extension(services): Extension<Arc<AppServices>>,
    CurrentIdentity(actor): CurrentIdentity,
    Json(grant): Json<PermissionGrant>,
) -> Result<StatusCode, ApiError> {
    validate_grant(&grant)?;
    services
        .relations
        .grant_permission(grant.subject.trim(), grant.action.trim(), grant.resource.trim())
        .await?;
    tracing::info!(
        actor = %actor.external_id,
        subject = %grant.subject,
        action = %grant.action,
        resource = %grant.resource,
        "permission granted"
    );
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /admin/permissions
pub async fn revoke_permission(
    Extension(services): Extension<Arc<AppServices>>,
    CurrentIdentity(actor): CurrentIdentity,
    Json(grant): Json<PermissionGrant>,
) -> Result<StatusCode, ApiError> {
    validate_grant(&grant)?;
    services
        .relations
        .revoke_permission(grant.subject.trim(), grant.action.trim(), grant.resource.trim())
        .await?;
    tracing::info!(
        actor = %actor.external_id,
        subject = %grant.subject,
        action = %grant.action,
        resource = %grant.resource,
        "permission revoked"
    );
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admins_cannot_touch_super_admin() {
        assert!(may_administer(Role::SuperAdmin, Role::SuperAdmin).is_ok());
        assert!(may_administer(Role::Admin, Role::Faculty).is_ok());
        assert_eq!(
            may_administer(Role::Admin, Role::SuperAdmin),
            Err(AuthError::Forbidden(reason::ROLE_NOT_ALLOWED))
        );
        assert!(may_administer(Role::Faculty, Role::Student).is_err());
    }

    #[test]
    fn role_path_segment_must_be_known() {
        assert_eq!(parse_role("FACULTY"), Ok(Role::Faculty));
        assert_eq!(parse_role("dean"), Err(AuthError::MalformedInput(reason::UNKNOWN_ROLE)));
    }

    #[test]
    fn permission_grants_need_every_field() {
        let grant = |subject: &str, action: &str, resource: &str| PermissionGrant {
            subject: subject.to_string(),
            action: action.to_string(),
            resource: resource.to_string(),
        };
        assert!(validate_grant(&grant("fac-1", "view", "course:1")).is_ok());
        assert_eq!(
            validate_grant(&grant("fac-1", " ", "course:1")),
            Err(AuthError::MalformedInput(reason::MISSING_PARAMETER))
        );
    }
}
