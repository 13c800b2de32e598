use std::path::{Path, PathBuf};

use async_trait::async_trait;
use metrics::counter;
use tracing::{error, info, instrument};
use uuid::Uuid;

use crate::api::CaptureError;
use crate::event::StampedEventRecord;
use crate::sinks::Sink;

/// Best-effort sink writing one JSON file per record, grouped by player:
/// `<root>/<player_id>/<timestamp>-<uuidv7>.json`.
pub struct FileSink {
    root: PathBuf,
}

impl FileSink {
    pub async fn new(root: impl Into<PathBuf>) -> anyhow::Result<FileSink> {
        let root = root.into();
        tokio::fs::create_dir_all(&root).await?;
        info!("writing events to {}", root.display());

        Ok(FileSink { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, record: &StampedEventRecord) -> Result<PathBuf, CaptureError> {
        // player_id ends up in the path, only accept what PlayerId produces
        let player = Uuid::parse_str(&record.player_id).map_err(|_| {
            error!("refusing to store record for player {:?}", record.player_id);
            CaptureError::NonRetryableSinkError
        })?;

        Ok(self
            .root
            .join(player.hyphenated().to_string())
            .join(format!("{}-{}.json", record.record.timestamp, Uuid::now_v7())))
    }
}

#[async_trait]
impl Sink for FileSink {
    fn supports_transactions(&self) -> bool {
        false
    }

    #[instrument(skip_all)]
    async fn write(&self, record: &StampedEventRecord) -> Result<(), CaptureError> {
        let path = self.path_for(record)?;
        let payload = serde_json::to_vec(record).map_err(|e| {
            error!("failed to serialize event: {}", e);
            CaptureError::NonRetryableSinkError
        })?;

        if let Some(dir) = path.parent() {
            tokio::fs::create_dir_all(dir).await.map_err(|e| {
                error!("failed to create {}: {}", dir.display(), e);
                CaptureError::RetryableSinkError
            })?;
        }

        // Write aside then rename, readers never see half a record
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &payload).await.map_err(|e| {
            error!("failed to write {}: {}", tmp.display(), e);
            CaptureError::RetryableSinkError
        })?;
        tokio::fs::rename(&tmp, &path).await.map_err(|e| {
            error!("failed to move {} into place: {}", path.display(), e);
            CaptureError::RetryableSinkError
        })?;

        counter!("capture_file_events_stored_total").increment(1);
        Ok(())
    }
}
