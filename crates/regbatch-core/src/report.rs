//! Run report: the JSON shape written by the CLI and its schema

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::record::{BatchState, BatchStats, JobRecord};

/// Final state of a batch: how it ended, the counters, and the full log.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct BatchReport {
    pub state: BatchState,
    pub stats: BatchStats,
    pub records: Vec<JobRecord>,
}

impl BatchReport {
    #[must_use]
    pub fn new(state: BatchState, records: Vec<JobRecord>, total: u32) -> Self {
        Self {
            state,
            stats: BatchStats::from_records(&records, total),
            records,
        }
    }
}

/// Generate JSON Schema for the report format.
#[must_use]
pub fn generate_schema() -> String {
    let schema = schemars::schema_for!(BatchReport);
    serde_json::to_string_pretty(&schema).unwrap_or_default()
}
