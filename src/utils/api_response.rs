use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use utoipa::ToSchema;

/// Envelope returned by every endpoint.
#[derive(Serialize, Deserialize, Debug, ToSchema)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub status_code: u16,
    pub message: String,
    pub timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub errors: Option<serde_json::Value>,
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> axum::response::Response {
        let status =
            StatusCode::from_u16(self.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self)).into_response()
    }
}

impl<T: Serialize> ApiResponse<T> {
    /// Create a success response
    pub fn success(status: StatusCode, message: impl Into<String>, data: T) -> Self {
        ApiResponse {
            success: true,
            status_code: status.as_u16(),
            message: message.into(),
            timestamp: Utc::now().to_rfc3339(),
            data: Some(data),
            errors: None,
        }
    }

    /// Create an error response
    pub fn error(
        status: StatusCode,
        message: impl Into<String>,
        errors: Option<serde_json::Value>,
    ) -> Self {
        ApiResponse {
            success: false,
            status_code: status.as_u16(),
            message: message.into(),
            timestamp: Utc::now().to_rfc3339(),
            data: None,
            errors,
        }
    }

    /// A request that went through but could not change anything.
    ///
    /// Answers `200 OK` with `success: false`; the client shows `message` as a
    /// flash and re-renders `data`, which holds the record as it stands.
    pub fn flash(message: impl Into<String>, data: T) -> Self {
        ApiResponse {
            success: false,
            status_code: StatusCode::OK.as_u16(),
            message: message.into(),
            timestamp: Utc::now().to_rfc3339(),
            data: Some(data),
            errors: None,
        }
    }
}

impl ApiResponse<()> {
    pub fn forbidden(message: impl Into<String>) -> Self {
        ApiResponse::error(StatusCode::FORBIDDEN, message, None)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ApiResponse::error(StatusCode::NOT_FOUND, message, None)
    }

    /// Wraps a database or I/O failure as a 500.
    pub fn internal(message: impl Into<String>, err: impl std::fmt::Display) -> Self {
        let message = message.into();
        tracing::error!("{}: {}", message, err);
        ApiResponse::error(
            StatusCode::INTERNAL_SERVER_ERROR,
            message,
            Some(json!({ "error": err.to_string() })),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flash_keeps_ok_status_but_reports_failure() {
        let res = ApiResponse::flash("Request is not pending", 7);
        assert!(!res.success);
        assert_eq!(res.status_code, 200);
        assert_eq!(res.data, Some(7));

        let response = res.into_response();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[test]
    fn error_response_uses_its_status_code() {
        let response = ApiResponse::<()>::forbidden("nope").into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let response = ApiResponse::<()>::not_found("missing").into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
