//! Campus endpoints guarded by the identity pipeline.
//!
//! The business handlers live elsewhere; these return what the pipeline
//! established so every stage can be exercised end to end.

use axum::{extract::Path, Json};
use serde_json::{json, Value};

use campus_auth::{AuthError, reason};

use crate::app::errors::ApiError;
use crate::context::RequestContext;

/// GET /students/:student_id/requests (ownership guarded)
///
/// The id comes from the ownership stage, which already parsed and checked it.
pub async fn student_requests(ctx: RequestContext) -> Result<Json<Value>, ApiError> {
    let identity = ctx.require_identity()?;
    let student_id = ctx
        .addressed_student()
        .ok_or(AuthError::MalformedInput(reason::MISSING_STUDENT_ID))?;
    Ok(Json(json!({
        "student_id": student_id,
        "requested_by": identity.external_id,
        "tenant_id": ctx.tenant_id().map(ToString::to_string),
        "requests": [],
    })))
}

/// GET /courses/:course_id/grades (relationship guarded)
pub async fn course_grades(
    ctx: RequestContext,
    Path(course_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let identity = ctx.require_identity()?;
    Ok(Json(json!({
        "course_id": course_id,
        "viewer": identity.external_id,
        "grades": [],
    })))
}

/// GET /reports (role guarded)
pub async fn reports(ctx: RequestContext) -> Result<Json<Value>, ApiError> {
    let identity = ctx.require_identity()?;
    Ok(Json(json!({
        "role": identity.role,
        "tenant_id": ctx.tenant_id().map(ToString::to_string),
        "reports": [],
    })))
}
