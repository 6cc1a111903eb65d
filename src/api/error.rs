//! HTTP mapping for service errors
//!
//! Every error body is `{"detail": "..."}`.

use crate::errors::ServiceError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

impl ServiceError {
    /// Status code reported to HTTP callers
    pub fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::Unauthorized => StatusCode::UNAUTHORIZED,
            ServiceError::NotFound { .. } => StatusCode::NOT_FOUND,
            ServiceError::BadRequest(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let detail = match &self {
            ServiceError::ModelLoadFailed(_) => "Model reload failed".to_string(),
            other => other.to_string(),
        };
        let mut response = (self.status_code(), Json(json!({ "detail": detail }))).into_response();

        if matches!(self, ServiceError::Unauthorized) {
            response.headers_mut().insert(
                axum::http::header::WWW_AUTHENTICATE,
                axum::http::HeaderValue::from_static("Bearer"),
            );
        }

        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(ServiceError::Unauthorized.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            ServiceError::NotFound { patient_id: 1 }.status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ServiceError::ServiceUnavailable.status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ServiceError::ModelLoadFailed("x".to_string()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ServiceError::InternalError("x".to_string()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ServiceError::BadRequest("x".to_string()).status_code(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_unauthorized_sets_challenge() {
        let response = ServiceError::Unauthorized.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(response.headers()["www-authenticate"], "Bearer");
    }
}
