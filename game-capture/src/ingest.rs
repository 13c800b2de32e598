use std::sync::Arc;

use metrics::{counter, histogram};
use tracing::{error, instrument, warn};

use crate::api::CaptureError;
use crate::event::{EventRecord, StampedEventRecord};
use crate::identity::PlayerId;
use crate::prometheus::report_dropped_events;
use crate::sinks::Sink;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    pub written: usize,
    pub failed: usize,
}

/// Stamp every record with the player it was sent for and store the batch.
///
/// Transactional sinks get the whole batch or nothing, and any failure fails the
/// call. Other sinks get one independent write per record: failures are logged and
/// counted but the call still succeeds.
#[instrument(skip_all, fields(batch_size = records.len(), player_id = %player))]
pub async fn ingest(
    sink: Arc<dyn Sink + Send + Sync>,
    records: Vec<EventRecord>,
    player: &PlayerId,
) -> Result<BatchOutcome, CaptureError> {
    if records.is_empty() {
        return Ok(BatchOutcome::default());
    }

    let records: Vec<StampedEventRecord> = records
        .into_iter()
        .map(|record| StampedEventRecord::stamp(record, player))
        .collect();

    histogram!("capture_event_batch_size").record(records.len() as f64);

    let outcome = if sink.supports_transactions() {
        ingest_atomic(sink.as_ref(), &records).await?
    } else {
        ingest_best_effort(sink.as_ref(), &records).await
    };

    counter!("capture_events_ingested_total").increment(outcome.written as u64);
    Ok(outcome)
}

async fn ingest_atomic(
    sink: &(dyn Sink + Send + Sync),
    records: &[StampedEventRecord],
) -> Result<BatchOutcome, CaptureError> {
    let mut batch = sink.begin_batch().await.map_err(|err| {
        report_dropped_events("batch_not_started", records.len() as u64);
        err
    })?;

    for record in records {
        if let Err(err) = batch.write(record).await {
            error!("aborting batch after failed write: {}", err);
            counter!("capture_batch_aborted_total").increment(1);
            report_dropped_events("batch_aborted", records.len() as u64);

            if let Err(abort_err) = batch.abort().await {
                warn!("failed to abort batch: {}", abort_err);
            }
            return Err(err);
        }
    }

    batch.commit().await.map_err(|err| {
        counter!("capture_batch_aborted_total").increment(1);
        report_dropped_events("batch_commit_failed", records.len() as u64);
        err
    })?;

    Ok(BatchOutcome {
        written: records.len(),
        failed: 0,
    })
}

async fn ingest_best_effort(
    sink: &(dyn Sink + Send + Sync),
    records: &[StampedEventRecord],
) -> BatchOutcome {
    let mut outcome = BatchOutcome::default();

    for record in records {
        match sink.write(record).await {
            Ok(()) => outcome.written += 1,
            Err(err) => {
                error!(
                    timestamp = record.record.timestamp,
                    "failed to store event, skipping it: {}", err
                );
                report_dropped_events("sink_write_failed", 1);
                outcome.failed += 1;
            }
        }
    }

    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventType;
    use crate::identity::RANDOM_VALUE_LEN;
    use crate::sinks::memory::MemorySink;
    use serde_json::Map;
    use std::time::Duration;

    fn player() -> PlayerId {
        PlayerId::derive(76561190000000000, &[0u8; RANDOM_VALUE_LEN])
    }

    fn records(count: i64) -> Vec<EventRecord> {
        (0..count)
            .map(|i| EventRecord {
                event: EventType::Update,
                playtime: i * 10,
                timestamp: 1700000000 + i,
                game_version: 1,
                scene: "level1".to_string(),
                save: Map::new(),
            })
            .collect()
    }

    #[tokio::test]
    async fn empty_batches_are_noops() {
        for sink in [MemorySink::transactional(), MemorySink::best_effort()] {
            let outcome = ingest(Arc::new(sink.clone()), vec![], &player())
                .await
                .unwrap();

            assert_eq!(outcome, BatchOutcome::default());
            assert!(sink.is_empty());
        }
    }

    #[tokio::test]
    async fn stamps_records_in_order() {
        let sink = MemorySink::transactional();

        let outcome = ingest(Arc::new(sink.clone()), records(3), &player())
            .await
            .unwrap();

        assert_eq!(outcome.written, 3);
        let stored = sink.records();
        assert_eq!(
            stored.iter().map(|r| r.record.timestamp).collect::<Vec<_>>(),
            vec![1700000000, 1700000001, 1700000002]
        );
        assert!(stored
            .iter()
            .all(|r| r.player_id == "1132822c-d42e-5d68-b60c-c631664e027e"));
    }

    #[tokio::test]
    async fn atomic_batches_roll_back_on_failure() {
        let sink = MemorySink::transactional().failing_at(3);

        let result = ingest(Arc::new(sink.clone()), records(3), &player()).await;

        assert_eq!(result, Err(CaptureError::RetryableSinkError));
        assert!(sink.is_empty());
    }

    #[tokio::test]
    async fn dropped_atomic_batches_store_nothing() {
        let sink = MemorySink::transactional().stalling_at(3);

        // The client goes away while the third write hangs
        let result = tokio::time::timeout(
            Duration::from_millis(50),
            ingest(Arc::new(sink.clone()), records(5), &player()),
        )
        .await;

        assert!(result.is_err());
        assert!(sink.is_empty());

        // Nothing half-written lingers for the next batch either
        let outcome = ingest(Arc::new(sink.clone()), records(2), &player())
            .await
            .unwrap();
        assert_eq!(outcome.written, 2);
        assert_eq!(sink.len(), 2);
    }

    #[tokio::test]
    async fn best_effort_batches_keep_going() {
        let sink = MemorySink::best_effort().failing_at(3);

        let outcome = ingest(Arc::new(sink.clone()), records(3), &player())
            .await
            .unwrap();

        assert_eq!(
            outcome,
            BatchOutcome {
                written: 2,
                failed: 1
            }
        );
        assert_eq!(sink.len(), 2);
    }

    #[tokio::test]
    async fn best_effort_failure_in_the_middle() {
        let sink = MemorySink::best_effort().failing_at(2);

        let outcome = ingest(Arc::new(sink.clone()), records(3), &player())
            .await
            .unwrap();

        assert_eq!(outcome.failed, 1);
        assert_eq!(
            sink.records()
                .iter()
                .map(|r| r.record.timestamp)
                .collect::<Vec<_>>(),
            vec![1700000000, 1700000002]
        );
    }
}
