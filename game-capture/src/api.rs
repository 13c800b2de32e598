use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use crate::session::InvalidParameterReason;

pub const OK_MESSAGE: &str = "Ok";

#[derive(Debug, PartialEq, Eq, Deserialize, Serialize, ToSchema)]
pub struct CaptureResponse {
    pub message: String,
}

impl CaptureResponse {
    pub fn ok() -> Self {
        Self {
            message: OK_MESSAGE.to_string(),
        }
    }
}

#[derive(Debug, PartialEq, Eq, Deserialize, Serialize, ToSchema)]
pub struct SessionResponse {
    pub message: String,
    pub token: String,
    pub expire: u32,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CaptureError {
    #[error("failed to decode request: {0}")]
    RequestDecodingError(String),
    #[error("failed to parse request: {0}")]
    RequestParsingError(String),
    #[error("request body too large")]
    PayloadTooLarge,

    #[error("Invalid parameter")]
    InvalidParameter(InvalidParameterReason),
    #[error("Invalid token")]
    InvalidToken,
    #[error("failed to issue session token")]
    TokenSigningError,

    #[error("transient error, please retry")]
    RetryableSinkError,
    #[error("event could not be stored")]
    NonRetryableSinkError,
    #[error("event could not be stored")]
    TransactionsUnsupported,
}

impl CaptureError {
    pub fn status(&self) -> StatusCode {
        match self {
            CaptureError::RequestDecodingError(_) | CaptureError::InvalidParameter(_) => {
                StatusCode::BAD_REQUEST
            }
            CaptureError::RequestParsingError(_) => StatusCode::UNPROCESSABLE_ENTITY,
            CaptureError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,

            CaptureError::InvalidToken => StatusCode::UNAUTHORIZED,

            CaptureError::RetryableSinkError => StatusCode::SERVICE_UNAVAILABLE,

            CaptureError::TokenSigningError
            | CaptureError::NonRetryableSinkError
            | CaptureError::TransactionsUnsupported => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for CaptureError {
    fn into_response(self) -> Response {
        let body = CaptureResponse {
            message: self.to_string(),
        };

        (self.status(), Json(body)).into_response()
    }
}

impl From<JsonRejection> for CaptureError {
    fn from(rejection: JsonRejection) -> Self {
        match rejection {
            JsonRejection::JsonDataError(err) => {
                CaptureError::RequestParsingError(err.body_text())
            }
            JsonRejection::BytesRejection(err) if err.status() == StatusCode::PAYLOAD_TOO_LARGE => {
                CaptureError::PayloadTooLarge
            }
            other => CaptureError::RequestDecodingError(other.body_text()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    async fn render(err: CaptureError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let body = response.into_body().collect().await.unwrap().to_bytes();

        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn invalid_parameter_is_generic() {
        let (status, body) = render(CaptureError::InvalidParameter(
            InvalidParameterReason::RandomValueWrongLength,
        ))
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, serde_json::json!({"message": "Invalid parameter"}));
    }

    #[tokio::test]
    async fn invalid_token_is_unauthorized() {
        let (status, body) = render(CaptureError::InvalidToken).await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body, serde_json::json!({"message": "Invalid token"}));
    }

    #[tokio::test]
    async fn sink_failures_hide_details() {
        let (status, body) = render(CaptureError::NonRetryableSinkError).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, serde_json::json!({"message": "event could not be stored"}));

        let (status, _) = render(CaptureError::RetryableSinkError).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }
}
