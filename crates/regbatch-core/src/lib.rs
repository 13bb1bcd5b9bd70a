//! regbatch-core: Core types, payloads and classification for registration batches
//!
//! Everything in this crate is synchronous and free of I/O apart from config
//! loading: credential generation, payload building, response classification,
//! job records and CSV export. The async batch loop lives in `regbatch-runner`.

pub mod classify;
pub mod config;
pub mod credential;
pub mod export;
pub mod payload;
pub mod plan;
pub mod proxy;
pub mod record;
pub mod report;

pub use classify::{Classification, classify_mock, classify_response};
pub use config::{ConfigError, ContentType, FieldMapping, RunConfig};
pub use credential::{Credential, generate_credential};
pub use export::to_csv;
pub use payload::{EncodedBody, Payload, build_payload};
pub use plan::RunPlan;
pub use proxy::dispatch_url;
pub use record::{BatchState, BatchStats, JobRecord, JobStatus};
pub use report::BatchReport;
