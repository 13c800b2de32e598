use std::future::ready;
use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::metrics_middleware::track_metrics;
use crate::prometheus::setup_metrics_recorder;
use crate::session::SessionService;
use crate::sinks::Sink;
use crate::time::TimeSource;
use crate::token::TokenSigner;
use crate::{endpoint, openapi};

#[derive(Clone)]
pub struct State {
    pub sink: Arc<dyn Sink + Send + Sync>,
    pub sessions: Arc<SessionService>,
}

pub fn router<TZ: TimeSource + Send + Sync + 'static>(
    timesource: TZ,
    sink: Arc<dyn Sink + Send + Sync>,
    signer: TokenSigner,
    max_body_bytes: usize,
    metrics: bool,
    production: bool,
) -> Router {
    let state = State {
        sink,
        sessions: Arc::new(SessionService::new(signer, Arc::new(timesource))),
    };

    let router = Router::new()
        .route("/", get(endpoint::index))
        .route("/_readiness", get(endpoint::index))
        .route("/_liveness", get(endpoint::index))
        .route("/auth", post(endpoint::auth))
        .route("/send", post(endpoint::send))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(axum::middleware::from_fn(track_metrics))
        .with_state(state);

    // Introspection is only for development
    let router = if production {
        router
    } else {
        router.route("/openapi.json", get(openapi::openapi))
    };

    // Don't install metrics unless asked to
    // Installing a global recorder when the crate is used as a library (during tests etc)
    // does not work well.
    if metrics {
        let recorder_handle = setup_metrics_recorder();
        router.route("/metrics", get(move || ready(recorder_handle.render())))
    } else {
        router
    }
}
