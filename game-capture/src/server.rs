use std::future::Future;
use std::sync::Arc;

use tokio::net::TcpListener;

use crate::config::{Config, SinkKind};
use crate::router;
use crate::sinks::file::FileSink;
use crate::sinks::postgres::PostgresSink;
use crate::sinks::print::PrintSink;
use crate::sinks::Sink;
use crate::token::TokenSigner;

async fn create_sink(config: &Config) -> anyhow::Result<Arc<dyn Sink + Send + Sync>> {
    match config.sink {
        SinkKind::Postgres => {
            let sink = PostgresSink::new(
                config.main.dburl.expose(),
                &config.main.dbname,
                config.max_db_connections,
            )
            .await?;
            Ok(Arc::new(sink))
        }
        SinkKind::File => Ok(Arc::new(FileSink::new(&config.file_sink_dir).await?)),
        SinkKind::Print => {
            // Only for local debugging, nothing is kept
            tracing::warn!("print sink enabled, events will not be stored");
            Ok(Arc::new(PrintSink {}))
        }
    }
}

pub async fn serve<F>(config: Config, listener: TcpListener, shutdown: F)
where
    F: Future<Output = ()> + Send + 'static,
{
    let sink = create_sink(&config)
        .await
        .expect("failed to create sink");

    let signer = TokenSigner::new(config.main.secretkey.expose().as_bytes(), config.main.expiry);

    let app = router::router(
        crate::time::SystemTime {},
        sink.clone(),
        signer,
        config.max_body_bytes,
        config.export_prometheus,
        config.main.production,
    );

    match listener.local_addr() {
        Ok(addr) => tracing::info!("listening on {:?}", addr),
        Err(e) => tracing::warn!("listening on an unknown address: {}", e),
    }
    tracing::info!(
        "config: sink == {:?} ; production == {:?} ; expiry == {}s",
        config.sink,
        config.main.production,
        config.main.expiry
    );

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
    {
        tracing::error!("server stopped with an error: {}", e);
    }

    sink.close().await;
    tracing::info!("HTTP server graceful shutdown completed");
}
