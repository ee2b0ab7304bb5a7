//! In-memory audit sink for assertions.

use std::sync::{Arc, Mutex, PoisonError};

use pairlink_core::{MessageRecord, RecordSink, audit::RecordStatus};

/// Collects records so a test can inspect them after a simulation.
///
/// Clones share one buffer; hand one clone to the driver and keep another.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    records: Arc<Mutex<Vec<MessageRecord>>>,
}

impl MemorySink {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of everything recorded so far.
    pub fn records(&self) -> Vec<MessageRecord> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Statuses in recording order.
    pub fn statuses(&self) -> Vec<RecordStatus> {
        self.records().iter().map(|record| record.status).collect()
    }

    /// Plaintexts of delivered regular messages, in order.
    pub fn delivered(&self) -> Vec<String> {
        self.records()
            .into_iter()
            .filter(|record| record.status == RecordStatus::Delivered)
            .filter_map(|record| record.plaintext)
            .collect()
    }
}

impl RecordSink for MemorySink {
    fn record(&self, record: &MessageRecord) {
        self.records.lock().unwrap_or_else(PoisonError::into_inner).push(record.clone());
    }
}
