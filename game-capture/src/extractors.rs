//! Request extractors shared by the endpoints.

use axum::async_trait;
use axum::extract::{FromRequest, FromRequestParts};
use axum::http::request::Parts;
use metrics::counter;

use crate::api::CaptureError;
use crate::identity::PlayerId;
use crate::router;

pub const SESSION_TOKEN_HEADER: &str = "x-session-token";

/// `axum::Json`, but rejections are rendered as `{"message": ...}` like every other error.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(CaptureError))]
pub struct CaptureJson<T>(pub T);

/// Player resolved from the `X-Session-Token` header. A missing header and an
/// unusable token are rejected the same way.
#[derive(Debug, Clone, Copy)]
pub struct VerifiedSession(pub PlayerId);

#[async_trait]
impl FromRequestParts<router::State> for VerifiedSession {
    type Rejection = CaptureError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &router::State,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(SESSION_TOKEN_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                counter!("capture_token_rejected_total", "cause" => "missing").increment(1);
                CaptureError::InvalidToken
            })?;

        let player = state.sessions.verify(token).map_err(|_| {
            counter!("capture_token_rejected_total", "cause" => "invalid").increment(1);
            CaptureError::InvalidToken
        })?;

        Ok(VerifiedSession(player))
    }
}
