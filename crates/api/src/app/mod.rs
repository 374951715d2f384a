//! HTTP application wiring (Axum router + service wiring).
//!
//! - `services.rs`: stores, identity sources and the other pipeline collaborators
//! - `routes/`: route groups and handlers
//! - `dto.rs`: request/response DTOs
//! - `errors.rs`: the single error → response mapping
//! - `oauth_flow.rs`: pending authorization-code logins

use std::sync::Arc;

use axum::{routing::get, Extension, Router};
use tower::ServiceBuilder;

use campus_infra::IdentitySource;

pub mod dto;
pub mod errors;
pub mod oauth_flow;
pub mod routes;
pub mod services;

/// Build the full HTTP router (public entrypoint used by `main.rs` and the
/// black-box tests).
///
/// Route groups pick their identity source by prefix:
/// `/api` local JWT, `/oauth` OAuth2 introspection, `/legacy` session token.
/// The last two exist only when their remote is configured.
pub fn build_app(services: Arc<AppServices>) -> Router {
    let local: Arc<dyn IdentitySource> = services.local_source.clone();
    let mut router = Router::new()
        .route("/health", get(routes::system::health))
        .nest("/api", routes::campus_router(&services, local))
        .nest("/admin", routes::admin_router(&services))
        .nest("/auth", routes::auth::router(services.oauth2.is_some()));

    if let Some(oauth2) = &services.oauth2 {
        let source: Arc<dyn IdentitySource> = oauth2.clone();
        router = router.nest("/oauth", routes::campus_router(&services, source));
    }
    if let Some(session) = &services.session {
        let source: Arc<dyn IdentitySource> = session.clone();
        router = router.nest("/legacy", routes::campus_router(&services, source));
    }

    router.layer(ServiceBuilder::new().layer(Extension(services)))
}

pub use services::{build_services, AppServices};
