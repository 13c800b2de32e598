use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use metrics::counter;
use tracing::{debug, instrument, Span};

use crate::{
    api::{CaptureError, CaptureResponse, SessionResponse},
    event::EventRecord,
    extractors::{CaptureJson, VerifiedSession},
    ingest::ingest,
    router,
    session::AuthRequest,
};

pub async fn index() -> &'static str {
    "game-capture"
}

/// Issue a session token for a Steam ID and client random value.
#[utoipa::path(
    post,
    path = "/auth",
    request_body = AuthRequest,
    responses(
        (status = 201, description = "Session issued", body = SessionResponse),
        (status = 400, description = "Invalid parameter or undecodable body", body = CaptureResponse),
        (status = 413, description = "Request body too large", body = CaptureResponse),
        (status = 422, description = "Body does not match the request schema", body = CaptureResponse),
        (status = 500, description = "Token could not be signed", body = CaptureResponse),
    )
)]
#[instrument(skip_all, fields(os, os_version))]
pub async fn auth(
    State(state): State<router::State>,
    CaptureJson(request): CaptureJson<AuthRequest>,
) -> Result<(StatusCode, Json<SessionResponse>), CaptureError> {
    // Not used for anything yet, but worth seeing in traces
    Span::current().record("os", request.os.as_str());
    Span::current().record("os_version", request.os_version.as_str());

    let session = state.sessions.issue(&request)?;

    Ok((StatusCode::CREATED, Json(session)))
}

/// Store a batch of events for the player holding the session token.
#[utoipa::path(
    post,
    path = "/send",
    request_body = [EventRecord],
    params(
        ("x-session-token" = String, Header, description = "Token returned by /auth"),
    ),
    responses(
        (status = 200, description = "Batch stored", body = CaptureResponse),
        (status = 400, description = "Undecodable body", body = CaptureResponse),
        (status = 401, description = "Missing, invalid or expired session token", body = CaptureResponse),
        (status = 413, description = "Request body too large", body = CaptureResponse),
        (status = 422, description = "Body does not match the event schema", body = CaptureResponse),
        (status = 500, description = "Events could not be stored", body = CaptureResponse),
        (status = 503, description = "Transient storage failure, the batch can be retried", body = CaptureResponse),
    )
)]
#[instrument(skip_all, fields(batch_size, player_id))]
pub async fn send(
    State(state): State<router::State>,
    VerifiedSession(player): VerifiedSession,
    CaptureJson(records): CaptureJson<Vec<EventRecord>>,
) -> Result<Json<CaptureResponse>, CaptureError> {
    Span::current().record("batch_size", records.len());
    Span::current().record("player_id", tracing::field::display(&player));

    counter!("capture_events_received_total").increment(records.len() as u64);

    let outcome = ingest(state.sink.clone(), records, &player).await?;
    debug!(
        written = outcome.written,
        failed = outcome.failed,
        "processed batch"
    );

    Ok(Json(CaptureResponse::ok()))
}
