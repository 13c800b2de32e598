use anyhow::bail;
use async_trait::async_trait;
use metrics::counter;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::types::Json;
use sqlx::{Postgres, Transaction};
use tokio::sync::OnceCell;
use tracing::{error, info, instrument};

use crate::api::CaptureError;
use crate::event::StampedEventRecord;
use crate::sinks::{Sink, SinkBatch};

/// Atomic sink storing each record as a JSONB document in a Postgres table
/// (the "collection"), one transaction per batch.
pub struct PostgresSink {
    pool: PgPool,
    collection: String,
    insert_query: String,
    bootstrap: OnceCell<()>,
}

impl PostgresSink {
    pub async fn new(url: &str, collection: &str, max_connections: u32) -> anyhow::Result<Self> {
        info!("connecting to postgres, collection {}", collection);
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await?;
        info!("connected to postgres");

        Self::from_pool(pool, collection)
    }

    pub fn from_pool(pool: PgPool, collection: &str) -> anyhow::Result<Self> {
        validate_collection_name(collection)?;

        Ok(Self {
            pool,
            collection: collection.to_owned(),
            insert_query: format!(
                r#"INSERT INTO "{collection}" (player_id, event, timestamp, document) VALUES ($1, $2, $3, $4)"#
            ),
            bootstrap: OnceCell::new(),
        })
    }

    /// Create the collection and its time index on first use. Safe to run
    /// against a database where they already exist.
    async fn ensure_collection(&self) -> Result<(), CaptureError> {
        self.bootstrap
            .get_or_try_init(|| async {
                let create_table = format!(
                    r#"
CREATE TABLE IF NOT EXISTS "{0}" (
    id BIGSERIAL PRIMARY KEY,
    player_id TEXT NOT NULL,
    event TEXT NOT NULL,
    timestamp BIGINT NOT NULL,
    document JSONB NOT NULL,
    inserted_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
)
                    "#,
                    self.collection
                );
                let create_index = format!(
                    r#"CREATE INDEX IF NOT EXISTS "{0}_timestamp_idx" ON "{0}" (timestamp)"#,
                    self.collection
                );

                sqlx::query(&create_table).execute(&self.pool).await?;
                sqlx::query(&create_index).execute(&self.pool).await?;
                info!("collection {} is ready", self.collection);

                Ok::<(), sqlx::Error>(())
            })
            .await
            .map(|_| ())
            .map_err(|e| {
                error!("failed to create collection {}: {}", self.collection, e);
                CaptureError::RetryableSinkError
            })
    }
}

fn validate_collection_name(collection: &str) -> anyhow::Result<()> {
    // Postgres truncates identifiers above 63 bytes, and the index name needs room.
    if collection.is_empty() || collection.len() > 48 {
        bail!("collection name must be between 1 and 48 characters: {collection:?}");
    }
    if collection.starts_with(|c: char| c.is_ascii_digit())
        || !collection
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        bail!("collection name must be a plain identifier: {collection:?}");
    }
    Ok(())
}

fn insert_error(e: sqlx::Error) -> CaptureError {
    error!("failed to insert event into postgres: {}", e);
    CaptureError::RetryableSinkError
}

#[async_trait]
impl Sink for PostgresSink {
    fn supports_transactions(&self) -> bool {
        true
    }

    #[instrument(skip_all)]
    async fn begin_batch(&self) -> Result<Box<dyn SinkBatch + Send>, CaptureError> {
        self.ensure_collection().await?;

        let tx = self.pool.begin().await.map_err(|e| {
            error!("failed to start transaction: {}", e);
            CaptureError::RetryableSinkError
        })?;

        Ok(Box::new(PostgresBatch {
            tx,
            insert_query: self.insert_query.clone(),
        }))
    }

    #[instrument(skip_all)]
    async fn write(&self, record: &StampedEventRecord) -> Result<(), CaptureError> {
        self.ensure_collection().await?;

        sqlx::query(&self.insert_query)
            .bind(&record.player_id)
            .bind(record.record.event.as_str())
            .bind(record.record.timestamp)
            .bind(Json(record))
            .execute(&self.pool)
            .await
            .map_err(insert_error)?;

        counter!("capture_postgres_events_stored_total").increment(1);
        Ok(())
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

/// Rolls back on drop if neither committed nor aborted, which covers
/// clients disconnecting in the middle of a batch.
struct PostgresBatch {
    tx: Transaction<'static, Postgres>,
    insert_query: String,
}

#[async_trait]
impl SinkBatch for PostgresBatch {
    async fn write(&mut self, record: &StampedEventRecord) -> Result<(), CaptureError> {
        sqlx::query(&self.insert_query)
            .bind(&record.player_id)
            .bind(record.record.event.as_str())
            .bind(record.record.timestamp)
            .bind(Json(record))
            .execute(&mut *self.tx)
            .await
            .map_err(insert_error)?;

        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), CaptureError> {
        self.tx.commit().await.map_err(|e| {
            error!("failed to commit batch: {}", e);
            CaptureError::RetryableSinkError
        })
    }

    async fn abort(self: Box<Self>) -> Result<(), CaptureError> {
        self.tx.rollback().await.map_err(|e| {
            error!("failed to roll back batch: {}", e);
            CaptureError::RetryableSinkError
        })
    }
}
