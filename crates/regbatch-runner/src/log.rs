//! Observable, append-only job log
//!
//! The orchestrator is the only writer. Readers take snapshots or subscribe
//! to a `watch` receiver that wakes on every append and every terminal
//! transition.

use tokio::sync::watch;

use regbatch_core::{BatchStats, Classification, JobRecord};

pub struct JobLog {
    tx: watch::Sender<Vec<JobRecord>>,
}

impl Default for JobLog {
    fn default() -> Self {
        Self::new()
    }
}

impl JobLog {
    #[must_use]
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(Vec::new());
        Self { tx }
    }

    /// Point-in-time copy of all records.
    #[must_use]
    pub fn snapshot(&self) -> Vec<JobRecord> {
        self.tx.borrow().clone()
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Vec<JobRecord>> {
        self.tx.subscribe()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tx.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn stats(&self, total: u32) -> BatchStats {
        BatchStats::from_records(&self.tx.borrow(), total)
    }

    pub(crate) fn clear(&self) {
        self.tx.send_modify(Vec::clear);
    }

    pub(crate) fn push(&self, record: JobRecord) {
        self.tx.send_modify(|records| records.push(record));
    }

    /// Apply a terminal outcome to the record with `id`. Returns `false` if no
    /// pending record with that id exists.
    pub(crate) fn finish(&self, id: &str, outcome: Classification) -> bool {
        self.tx.send_if_modified(|records| {
            records
                .iter_mut()
                .rev()
                .find(|r| r.id == id)
                .is_some_and(|r| r.finish(outcome))
        })
    }
}
