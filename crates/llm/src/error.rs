use axum::response::{IntoResponse, Response};
use serde::Serialize;

/// The eight error kinds this gateway can surface, each mapped to a fixed
/// HTTP status and an Anthropic-shaped `error.type` string.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("{0}")]
    InvalidRequest(String),
    #[error("{0}")]
    Authentication(String),
    #[error("{0}")]
    Permission(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    RateLimit(String),
    #[error("{0}")]
    ApiError(String),
    #[error("{0}")]
    Overloaded(String),
    #[error("{0}")]
    Timeout(String),
}

impl LlmError {
    pub fn kind(&self) -> &'static str {
        match self {
            LlmError::InvalidRequest(_) => "invalid_request",
            LlmError::Authentication(_) => "authentication",
            LlmError::Permission(_) => "permission",
            LlmError::NotFound(_) => "not_found",
            LlmError::RateLimit(_) => "rate_limit",
            LlmError::ApiError(_) => "api_error",
            LlmError::Overloaded(_) => "overloaded",
            LlmError::Timeout(_) => "timeout",
        }
    }

    pub fn status_code(&self) -> http::StatusCode {
        match self {
            LlmError::InvalidRequest(_) => http::StatusCode::BAD_REQUEST,
            LlmError::Authentication(_) => http::StatusCode::UNAUTHORIZED,
            LlmError::Permission(_) => http::StatusCode::FORBIDDEN,
            LlmError::NotFound(_) => http::StatusCode::NOT_FOUND,
            LlmError::RateLimit(_) => http::StatusCode::TOO_MANY_REQUESTS,
            LlmError::ApiError(_) => http::StatusCode::BAD_GATEWAY,
            LlmError::Overloaded(_) => http::StatusCode::from_u16(529).expect("529 is a valid status code"),
            LlmError::Timeout(_) => http::StatusCode::GATEWAY_TIMEOUT,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            LlmError::InvalidRequest(m)
            | LlmError::Authentication(m)
            | LlmError::Permission(m)
            | LlmError::NotFound(m)
            | LlmError::RateLimit(m)
            | LlmError::ApiError(m)
            | LlmError::Overloaded(m)
            | LlmError::Timeout(m) => m,
        }
    }

    pub fn to_body(&self) -> AnthropicErrorResponse {
        AnthropicErrorResponse {
            response_type: "error",
            error: AnthropicErrorBody {
                error_type: self.kind(),
                message: self.message().to_string(),
            },
        }
    }

    /// Maps a downstream HTTP status, as seen from a non-passthrough adapter,
    /// to the taxonomy above.
    pub fn from_downstream_status(status: http::StatusCode, body_excerpt: impl Into<String>) -> Self {
        let message = body_excerpt.into();
        match status {
            http::StatusCode::UNAUTHORIZED => LlmError::Authentication(message),
            http::StatusCode::FORBIDDEN => LlmError::Permission(message),
            http::StatusCode::NOT_FOUND => LlmError::NotFound(message),
            http::StatusCode::TOO_MANY_REQUESTS => LlmError::RateLimit(message),
            status if status.as_u16() == 529 => LlmError::Overloaded(message),
            status if status.is_server_error() => LlmError::ApiError(message),
            status if status.is_client_error() => LlmError::InvalidRequest(message),
            _ => LlmError::ApiError(message),
        }
    }
}

impl IntoResponse for LlmError {
    fn into_response(self) -> Response {
        (self.status_code(), axum::Json(self.to_body())).into_response()
    }
}

/// Anthropic-shaped error envelope: `{"type":"error","error":{"type":...,"message":...}}`.
#[derive(Debug, Clone, Serialize)]
pub struct AnthropicErrorResponse {
    #[serde(rename = "type")]
    pub response_type: &'static str,
    pub error: AnthropicErrorBody,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnthropicErrorBody {
    #[serde(rename = "type")]
    pub error_type: &'static str,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_match_the_taxonomy() {
        assert_eq!(
            LlmError::InvalidRequest("x".into()).status_code(),
            http::StatusCode::BAD_REQUEST
        );
        assert_eq!(LlmError::Overloaded("x".into()).status_code().as_u16(), 529);
        assert_eq!(
            LlmError::Timeout("x".into()).status_code(),
            http::StatusCode::GATEWAY_TIMEOUT
        );
    }

    #[test]
    fn downstream_status_mapping() {
        assert_eq!(
            LlmError::from_downstream_status(http::StatusCode::TOO_MANY_REQUESTS, "").kind(),
            "rate_limit"
        );
        assert_eq!(
            LlmError::from_downstream_status(http::StatusCode::INTERNAL_SERVER_ERROR, "").kind(),
            "api_error"
        );
    }
}
