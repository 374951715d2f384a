//! The single place where pipeline failures become HTTP responses.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use campus_auth::AuthError;

/// Response wrapper for [`AuthError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApiError(pub AuthError);

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        ApiError(err)
    }
}

pub fn status_for(err: &AuthError) -> StatusCode {
    match err {
        AuthError::MalformedInput(_) => StatusCode::BAD_REQUEST,
        AuthError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
        AuthError::Forbidden(_) => StatusCode::FORBIDDEN,
        AuthError::Upstream(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        json_error(status_for(&self.0), self.0.category(), self.0.reason())
    }
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    reason: &'static str,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "reason": reason,
        })),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use campus_auth::reason;

    #[test]
    fn each_category_has_its_own_status() {
        assert_eq!(status_for(&AuthError::MalformedInput(reason::INVALID_STUDENT_ID)), StatusCode::BAD_REQUEST);
        assert_eq!(status_for(&AuthError::Unauthenticated(reason::INVALID_TOKEN)), StatusCode::UNAUTHORIZED);
        assert_eq!(status_for(&AuthError::Forbidden(reason::ROLE_NOT_ALLOWED)), StatusCode::FORBIDDEN);
        assert_eq!(
            status_for(&AuthError::Upstream(reason::STORE_UNAVAILABLE)),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
