use async_trait::async_trait;

use metrics::counter;
use tracing::info;

use crate::api::CaptureError;
use crate::event::StampedEventRecord;
use crate::sinks::Sink;

/// Logs records instead of storing them, for local debugging.
pub struct PrintSink {}

#[async_trait]
impl Sink for PrintSink {
    fn supports_transactions(&self) -> bool {
        false
    }

    async fn write(&self, record: &StampedEventRecord) -> Result<(), CaptureError> {
        info!("event: {record:?}");
        counter!("capture_print_sink_events_total").increment(1);

        Ok(())
    }
}
