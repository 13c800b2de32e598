use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::api::CaptureError;
use crate::event::StampedEventRecord;
use crate::sinks::{Sink, SinkBatch};

#[derive(Default)]
struct MemoryState {
    records: Vec<StampedEventRecord>,
    attempts: usize,
}

/// In-process sink used by tests and local experiments. Can behave either as an
/// atomic or a best-effort sink, and can be told to fail or hang on its N-th write attempt.
#[derive(Clone, Default)]
pub struct MemorySink {
    transactional: bool,
    fail_at: Option<usize>,
    stall_at: Option<usize>,
    state: Arc<Mutex<MemoryState>>,
}

impl MemorySink {
    pub fn transactional() -> Self {
        Self {
            transactional: true,
            ..Default::default()
        }
    }

    pub fn best_effort() -> Self {
        Self::default()
    }

    /// Fail the `attempt`-th write (1-based, counted over the sink's lifetime).
    pub fn failing_at(mut self, attempt: usize) -> Self {
        self.fail_at = Some(attempt);
        self
    }

    /// Never complete the `attempt`-th write (1-based), like a stuck connection.
    pub fn stalling_at(mut self, attempt: usize) -> Self {
        self.stall_at = Some(attempt);
        self
    }

    pub fn records(&self) -> Vec<StampedEventRecord> {
        self.state.lock().unwrap().records.clone()
    }

    pub fn len(&self) -> usize {
        self.state.lock().unwrap().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    async fn attempt(&self) -> Result<(), CaptureError> {
        let attempt = {
            let mut state = self.state.lock().unwrap();
            state.attempts += 1;
            state.attempts
        };

        if self.fail_at == Some(attempt) {
            return Err(CaptureError::RetryableSinkError);
        }
        if self.stall_at == Some(attempt) {
            std::future::pending::<()>().await;
        }
        Ok(())
    }
}

#[async_trait]
impl Sink for MemorySink {
    fn supports_transactions(&self) -> bool {
        self.transactional
    }

    async fn begin_batch(&self) -> Result<Box<dyn SinkBatch + Send>, CaptureError> {
        if !self.transactional {
            return Err(CaptureError::TransactionsUnsupported);
        }

        Ok(Box::new(MemoryBatch {
            sink: self.clone(),
            pending: Vec::new(),
        }))
    }

    async fn write(&self, record: &StampedEventRecord) -> Result<(), CaptureError> {
        self.attempt().await?;
        self.state.lock().unwrap().records.push(record.clone());
        Ok(())
    }
}

struct MemoryBatch {
    sink: MemorySink,
    pending: Vec<StampedEventRecord>,
}

#[async_trait]
impl SinkBatch for MemoryBatch {
    async fn write(&mut self, record: &StampedEventRecord) -> Result<(), CaptureError> {
        self.sink.attempt().await?;
        self.pending.push(record.clone());
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), CaptureError> {
        let MemoryBatch { sink, pending } = *self;
        sink.state.lock().unwrap().records.extend(pending);
        Ok(())
    }

    async fn abort(self: Box<Self>) -> Result<(), CaptureError> {
        Ok(())
    }
}
