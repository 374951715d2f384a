use std::sync::Arc;

use axum::{routing::get, Router};

use campus_auth::Role;
use campus_infra::IdentitySource;

use crate::app::services::AppServices;
use crate::middleware::Pipeline;

pub mod admin;
pub mod auth;
pub mod campus;
pub mod system;

/// Campus endpoints behind one identity source.
///
/// The same endpoint set is mounted once per credential form; only the
/// authentication stage differs between the groups.
pub fn campus_router(services: &AppServices, source: Arc<dyn IdentitySource>) -> Router {
    let base = || {
        Pipeline::new(source.clone(), services.provisioner.clone())
            .tenant(services.tenant_guard.clone())
    };

    let me = base()
        .student(services.student_loader.clone())
        .apply(Router::new().route("/me", get(system::me)));

    let requests = base()
        .student(services.student_loader.clone())
        .roles(&[Role::Student, Role::Faculty, Role::Admin])
        .owner("student_id")
        .apply(Router::new().route(
            "/students/:student_id/requests",
            get(campus::student_requests),
        ));

    let grades = base()
        .permission(services.relations.clone(), "view", "course:{course_id}")
        .apply(Router::new().route("/courses/:course_id/grades", get(campus::course_grades)));

    let reports = base()
        .roles(&[Role::Faculty, Role::Admin, Role::SuperAdmin])
        .apply(Router::new().route("/reports", get(campus::reports)));

    me.merge(requests).merge(grades).merge(reports)
}

/// Role administration: local tokens only, no tenant scoping.
pub fn admin_router(services: &AppServices) -> Router {
    Pipeline::new(services.local_source.clone(), services.provisioner.clone())
        .roles(&[Role::Admin, Role::SuperAdmin])
        .apply(admin::router())
}
