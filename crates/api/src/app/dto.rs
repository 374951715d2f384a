use serde::{Deserialize, Serialize};

use campus_auth::{ResolvedIdentity, Role};

use crate::context::RequestContext;

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct LogoutRequest {
    #[serde(default)]
    pub refresh_token: Option<String>,
}

/// Body of `PUT`/`DELETE /admin/permissions`.
#[derive(Debug, Deserialize)]
pub struct PermissionGrant {
    pub subject: String,
    pub action: String,
    pub resource: String,
}

/// Query string the authorization server redirects back with.
#[derive(Debug, Default, Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Serialize)]
pub struct IdentityDto {
    pub external_id: String,
    pub local_user_id: Option<i64>,
    pub email: String,
    pub given_name: String,
    pub family_name: String,
    pub role: Role,
    pub tenant_ref: String,
}

impl From<&ResolvedIdentity> for IdentityDto {
    fn from(identity: &ResolvedIdentity) -> Self {
        Self {
            external_id: identity.external_id.clone(),
            local_user_id: identity.local_user_id.map(i64::from),
            email: identity.email.clone(),
            given_name: identity.given_name.clone(),
            family_name: identity.family_name.clone(),
            role: identity.role,
            tenant_ref: identity.external_tenant_ref.clone(),
        }
    }
}

/// `GET /me` body.
#[derive(Debug, Serialize)]
pub struct WhoAmI {
    pub identity: Option<IdentityDto>,
    pub tenant_id: Option<String>,
    pub student_id: Option<i64>,
}

impl From<&RequestContext> for WhoAmI {
    fn from(ctx: &RequestContext) -> Self {
        Self {
            identity: ctx.identity().map(IdentityDto::from),
            tenant_id: ctx.tenant_id().map(|t| t.to_string()),
            student_id: ctx.student_id().map(i64::from),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RoleMembership {
    pub role: Role,
    pub subject: String,
    pub member: bool,
}
