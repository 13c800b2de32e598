use axum::Json;
use utoipa::OpenApi;

use crate::api::{CaptureResponse, SessionResponse};
use crate::endpoint;
use crate::event::{EventRecord, EventType};
use crate::session::AuthRequest;

/// API description, only served outside production.
#[derive(OpenApi)]
#[openapi(
    info(title = "Another Analytics"),
    paths(endpoint::auth, endpoint::send),
    components(schemas(AuthRequest, SessionResponse, CaptureResponse, EventRecord, EventType))
)]
pub struct ApiDoc;

pub async fn openapi() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
