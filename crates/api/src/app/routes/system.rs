use axum::{http::StatusCode, Json};

use crate::app::dto::WhoAmI;
use crate::context::RequestContext;

pub async fn health() -> StatusCode {
    StatusCode::OK
}

/// Echo whatever the pipeline stages published for this request.
pub async fn me(ctx: RequestContext) -> Json<WhoAmI> {
    Json(WhoAmI::from(&ctx))
}
