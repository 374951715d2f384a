//! Identity pipeline stages as axum middleware.
//!
//! Stages run in a fixed order per route group:
//! authenticate (+ provisioning) → tenant → student loader → roles →
//! permission → ownership → handler. Each stage is optional except
//! authentication, and a stage that finds its prerequisite missing fails with
//! 401 rather than assuming anything.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Path, Request, State};
use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;
use axum::middleware::{Next, from_fn_with_state};
use axum::response::Response;
use axum::Router;

use campus_auth::credential::parse_raw;
use campus_auth::{
    AuthError, CredentialScheme, ResolvedIdentity, Role, check_ownership, parse_bearer,
    permission_verdict, reason, require_any_role,
};
use campus_infra::{
    IdentityProvisioner, IdentitySource, RelationshipAuthority, StudentProfileLoader, TenantGuard,
};

use crate::app::errors::ApiError;
use crate::context::RequestContext;

type PathParams = Option<Path<HashMap<String, String>>>;

/// Pull the credential for `scheme` out of the request headers.
pub fn extract_credential(headers: &HeaderMap, scheme: CredentialScheme) -> Result<String, AuthError> {
    let header = match scheme {
        CredentialScheme::Bearer => AUTHORIZATION.as_str(),
        CredentialScheme::Header(name) => name,
    };
    let raw = headers
        .get(header)
        .ok_or(AuthError::Unauthenticated(reason::MISSING_CREDENTIAL))?
        .to_str()
        .map_err(|_| AuthError::Unauthenticated(reason::MALFORMED_CREDENTIAL))?;

    let token = match scheme {
        CredentialScheme::Bearer => parse_bearer(raw)?,
        CredentialScheme::Header(_) => parse_raw(raw)?,
    };
    Ok(token.to_string())
}

fn context(req: &Request) -> RequestContext {
    req.extensions()
        .get::<RequestContext>()
        .cloned()
        .unwrap_or_default()
}

fn update_context(req: &mut Request, f: impl FnOnce(&mut RequestContext)) {
    let mut ctx = req
        .extensions_mut()
        .remove::<RequestContext>()
        .unwrap_or_default();
    f(&mut ctx);
    req.extensions_mut().insert(ctx);
}

fn identity_of(req: &Request) -> Result<ResolvedIdentity, AuthError> {
    context(req).require_identity().cloned()
}

#[derive(Clone)]
pub struct Authenticate {
    pub source: Arc<dyn IdentitySource>,
    pub provisioner: IdentityProvisioner,
}

pub async fn authenticate(
    State(stage): State<Authenticate>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let source = stage.source.name();
    let credential = extract_credential(req.headers(), stage.source.scheme())?;

    let mut identity = stage.source.resolve(&credential).await.inspect_err(|e| {
        tracing::info!(source, reason = e.reason(), "authentication failed");
    })?;

    // Side effects of provisioning persist even if a later stage rejects.
    if let Some(local_id) = stage.provisioner.ensure_local_identity(&identity).await? {
        identity.local_user_id = Some(local_id);
    }
    tracing::debug!(source, subject = %identity.external_id, role = %identity.role, "authenticated");

    update_context(&mut req, |ctx| ctx.set_identity(identity));
    Ok(next.run(req).await)
}

pub async fn require_tenant(
    State(guard): State<TenantGuard>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let identity = identity_of(&req)?;
    let tenant_id = guard.require_tenant(&identity).await?;
    update_context(&mut req, |ctx| ctx.set_tenant_id(tenant_id));
    Ok(next.run(req).await)
}

pub async fn load_student(
    State(loader): State<StudentProfileLoader>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let identity = identity_of(&req)?;
    if let Some(student_id) = loader.load_if_student(&identity).await? {
        update_context(&mut req, |ctx| ctx.set_student_id(student_id));
    }
    Ok(next.run(req).await)
}

pub async fn require_roles(
    State(allowed): State<Arc<[Role]>>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    require_any_role(context(&req).identity(), &allowed)?;
    Ok(next.run(req).await)
}

/// Remote permission requirement: `action` on a resource rendered from the
/// route's path parameters, e.g. `course:{course_id}`.
#[derive(Clone)]
pub struct RequirePermission {
    pub relations: Arc<dyn RelationshipAuthority>,
    pub action: &'static str,
    pub resource: &'static str,
}

/// Substitute `{name}` placeholders with path parameter values.
pub fn render_resource(
    template: &str,
    params: &HashMap<String, String>,
) -> Result<String, AuthError> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        let end = rest[start..]
            .find('}')
            .map(|i| start + i)
            .ok_or(AuthError::MalformedInput(reason::MISSING_PARAMETER))?;
        let value = params
            .get(&rest[start + 1..end])
            .filter(|v| !v.trim().is_empty())
            .ok_or(AuthError::MalformedInput(reason::MISSING_PARAMETER))?;
        out.push_str(&rest[..start]);
        out.push_str(value.trim());
        rest = &rest[end + 1..];
    }
    out.push_str(rest);
    Ok(out)
}

pub async fn require_permission(
    State(stage): State<RequirePermission>,
    params: PathParams,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let identity = identity_of(&req)?;
    let params = params.map(|Path(p)| p).unwrap_or_default();
    let resource = render_resource(stage.resource, &params)?;

    let verdict = stage
        .relations
        .check_permission(&identity, stage.action, &resource)
        .await;
    permission_verdict(verdict).inspect_err(|e| {
        tracing::info!(
            subject = %identity.external_id,
            action = stage.action,
            %resource,
            reason = e.reason(),
            "permission check failed"
        );
    })?;
    Ok(next.run(req).await)
}

/// Publishes the validated student id so handlers never re-parse the path.
pub async fn require_owner(
    State(param): State<&'static str>,
    params: PathParams,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let ctx = context(&req);
    let identity = ctx.require_identity()?;
    let value = params.as_ref().and_then(|Path(p)| p.get(param)).map(String::as_str);

    let addressed = check_ownership(identity.role, ctx.student_id(), value)?;
    update_context(&mut req, |ctx| ctx.set_addressed_student(addressed));
    Ok(next.run(req).await)
}

/// Declarative per-route-group stage chain.
#[derive(Clone)]
pub struct Pipeline {
    authenticate: Authenticate,
    tenant: Option<TenantGuard>,
    student: Option<StudentProfileLoader>,
    roles: Option<Arc<[Role]>>,
    permission: Option<RequirePermission>,
    owner_param: Option<&'static str>,
}

impl Pipeline {
    pub fn new(source: Arc<dyn IdentitySource>, provisioner: IdentityProvisioner) -> Self {
        Self {
            authenticate: Authenticate { source, provisioner },
            tenant: None,
            student: None,
            roles: None,
            permission: None,
            owner_param: None,
        }
    }

    pub fn tenant(mut self, guard: TenantGuard) -> Self {
        self.tenant = Some(guard);
        self
    }

    pub fn student(mut self, loader: StudentProfileLoader) -> Self {
        self.student = Some(loader);
        self
    }

    pub fn roles(mut self, allowed: &[Role]) -> Self {
        self.roles = Some(allowed.into());
        self
    }

    pub fn permission(
        mut self,
        relations: Arc<dyn RelationshipAuthority>,
        action: &'static str,
        resource: &'static str,
    ) -> Self {
        self.permission = Some(RequirePermission {
            relations,
            action,
            resource,
        });
        self
    }

    /// Guard the path parameter `param` as a student id owned by the caller.
    pub fn owner(mut self, param: &'static str) -> Self {
        self.owner_param = Some(param);
        self
    }

    /// Wrap every route already on `router`. Later layers run first, so the
    /// stages are layered innermost-first.
    pub fn apply<S>(self, router: Router<S>) -> Router<S>
    where
        S: Clone + Send + Sync + 'static,
    {
        let mut router = router;
        if let Some(param) = self.owner_param {
            router = router.route_layer(from_fn_with_state(param, require_owner));
        }
        if let Some(permission) = self.permission {
            router = router.route_layer(from_fn_with_state(permission, require_permission));
        }
        if let Some(roles) = self.roles {
            router = router.route_layer(from_fn_with_state(roles, require_roles));
        }
        if let Some(loader) = self.student {
            router = router.route_layer(from_fn_with_state(loader, load_student));
        }
        if let Some(guard) = self.tenant {
            router = router.route_layer(from_fn_with_state(guard, require_tenant));
        }
        router.route_layer(from_fn_with_state(self.authenticate, authenticate))
    }
}
