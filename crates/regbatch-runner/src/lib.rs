//! regbatch-runner: async batch execution for registration runs

pub mod log;
pub mod orchestrator;
pub mod transport;

pub use log::JobLog;
pub use orchestrator::{Orchestrator, RunnerError, StopHandle};
pub use transport::{HttpTransport, PreparedRequest, RawResponse, Transport, TransportError};
