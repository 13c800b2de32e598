use async_trait::async_trait;

use crate::api::CaptureError;
use crate::event::StampedEventRecord;

pub mod file;
pub mod memory;
pub mod postgres;
pub mod print;

/// Storage backend for stamped records.
///
/// Sinks that support transactions get each batch written through a [`SinkBatch`]
/// and committed all at once. Other sinks only get independent [`Sink::write`] calls.
#[async_trait]
pub trait Sink {
    fn supports_transactions(&self) -> bool;

    async fn begin_batch(&self) -> Result<Box<dyn SinkBatch + Send>, CaptureError> {
        Err(CaptureError::TransactionsUnsupported)
    }

    async fn write(&self, record: &StampedEventRecord) -> Result<(), CaptureError>;

    /// Release connections on shutdown.
    async fn close(&self) {}
}

/// An open transaction. Dropping it without calling `commit` must discard every write.
#[async_trait]
pub trait SinkBatch {
    async fn write(&mut self, record: &StampedEventRecord) -> Result<(), CaptureError>;
    async fn commit(self: Box<Self>) -> Result<(), CaptureError>;
    async fn abort(self: Box<Self>) -> Result<(), CaptureError>;
}
