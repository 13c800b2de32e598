#![allow(dead_code)]

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Once};

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use base64::engine::general_purpose;
use base64::Engine;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use game_capture::router::router;
use game_capture::sinks::Sink;
use game_capture::time::TimeSource;
use game_capture::token::TokenSigner;

pub const STEAM_ID: &str = "76561190000000000";
pub const PLAYER_ID: &str = "1132822c-d42e-5d68-b60c-c631664e027e";
pub const SECRET: &[u8] = b"Incremental Game";
pub const EXPIRY: u32 = 3600;
pub const NOW: i64 = 1_700_000_000;

static TRACING_INIT: Once = Once::new();
pub fn setup_tracing() {
    TRACING_INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_writer(tracing_subscriber::fmt::TestWriter::new())
            .init()
    });
}

/// Clock the tests can move forward.
#[derive(Clone)]
pub struct FixedTime {
    now: Arc<AtomicI64>,
}

impl FixedTime {
    pub fn new(now: i64) -> Self {
        Self {
            now: Arc::new(AtomicI64::new(now)),
        }
    }

    pub fn advance(&self, seconds: i64) {
        self.now.fetch_add(seconds, Ordering::SeqCst);
    }
}

impl TimeSource for FixedTime {
    fn current_time(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

pub struct TestApp {
    pub app: Router,
    pub clock: FixedTime,
}

impl TestApp {
    pub fn new(sink: impl Sink + Send + Sync + 'static) -> Self {
        Self::with_options(sink, EXPIRY, false)
    }

    pub fn with_options(sink: impl Sink + Send + Sync + 'static, expiry: u32, production: bool) -> Self {
        setup_tracing();
        let clock = FixedTime::new(NOW);
        let app = router(
            clock.clone(),
            Arc::new(sink),
            TokenSigner::new(SECRET, expiry),
            2 * 1024 * 1024,
            false,
            production,
        );

        Self { app, clock }
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, Vec<u8>) {
        let response = self
            .app
            .clone()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();

        let status = response.status();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        (status, body.to_vec())
    }

    pub async fn post(&self, uri: &str, token: Option<&str>, body: String) -> (StatusCode, Value) {
        let mut request = Request::builder()
            .method("POST")
            .uri(uri)
            .header("Content-Type", "application/json");
        if let Some(token) = token {
            request = request.header("X-Session-Token", token);
        }

        let response = self
            .app
            .clone()
            .oneshot(request.body(Body::from(body)).unwrap())
            .await
            .unwrap();

        let status = response.status();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let body = if body.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body).unwrap_or_else(|_| {
                Value::String(String::from_utf8_lossy(&body).into_owned())
            })
        };
        (status, body)
    }

    pub async fn auth(&self, steam_id: &str, random_value: &str) -> (StatusCode, Value) {
        let body = json!({
            "steam_id": steam_id,
            "random_value": random_value,
            "os": "Windows",
            "os_version": "10.0.19045",
        });
        self.post("/auth", None, body.to_string()).await
    }

    /// Token for the reference player.
    pub async fn token(&self) -> String {
        let (status, body) = self.auth(STEAM_ID, &zero_random_value()).await;
        assert_eq!(status, StatusCode::CREATED, "auth failed: {body}");

        body["token"]
            .as_str()
            .expect("token missing from auth response")
            .to_string()
    }

    pub async fn send(&self, token: Option<&str>, records: &Value) -> (StatusCode, Value) {
        self.post("/send", token, records.to_string()).await
    }
}

pub fn zero_random_value() -> String {
    general_purpose::STANDARD.encode([0u8; 32])
}

pub fn record(event: &str, timestamp: i64) -> Value {
    json!({
        "event": event,
        "playtime": 0,
        "timestamp": timestamp,
        "game_version": 1,
        "scene": "menu",
        "save": {},
    })
}
