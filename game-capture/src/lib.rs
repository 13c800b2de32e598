pub mod api;
pub mod config;
pub mod endpoint;
pub mod event;
pub mod extractors;
pub mod identity;
pub mod ingest;
pub mod metrics_middleware;
pub mod openapi;
pub mod prometheus;
pub mod router;
pub mod server;
pub mod session;
pub mod sinks;
pub mod time;
pub mod token;
