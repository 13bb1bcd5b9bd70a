//! Job records, batch state and derived statistics

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::classify::Classification;
use crate::credential::Credential;

/// Lifecycle of a single job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Success,
    Failed,
}

impl JobStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Success => "success",
            Self::Failed => "failed",
        }
    }

    #[must_use]
    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One attempted registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct JobRecord {
    /// Opaque identifier, stable for the record's lifetime
    pub id: String,
    pub email: String,
    pub password: String,
    /// Creation time (millisecond precision)
    pub created_at: DateTime<Utc>,
    pub status: JobStatus,
    /// Set once the record leaves `pending`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl JobRecord {
    /// New `pending` record for a freshly generated credential.
    #[must_use]
    pub fn pending(id: impl Into<String>, credential: Credential, created_at: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            email: credential.email,
            password: credential.password,
            created_at,
            status: JobStatus::Pending,
            message: None,
        }
    }

    /// Move to a terminal state. Returns `false` (and changes nothing) when
    /// the record is already terminal.
    pub fn finish(&mut self, outcome: Classification) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        self.status = if outcome.success {
            JobStatus::Success
        } else {
            JobStatus::Failed
        };
        self.message = Some(outcome.message);
        true
    }
}

/// Batch-level state machine: `idle → running → (stopped | completed)`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum BatchState {
    #[default]
    Idle,
    Running,
    Stopped,
    Completed,
}

impl std::fmt::Display for BatchState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Running => write!(f, "running"),
            Self::Stopped => write!(f, "stopped"),
            Self::Completed => write!(f, "completed"),
        }
    }
}

/// Counters derived from a log snapshot.
///
/// `total` is the configured job count, not the log length.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct BatchStats {
    pub total: u32,
    pub success: u32,
    pub failed: u32,
    pub pending: u32,
}

impl BatchStats {
    #[must_use]
    pub fn from_records(records: &[JobRecord], total: u32) -> Self {
        let mut stats = Self {
            total,
            ..Self::default()
        };
        for record in records {
            match record.status {
                JobStatus::Pending => stats.pending += 1,
                JobStatus::Success => stats.success += 1,
                JobStatus::Failed => stats.failed += 1,
            }
        }
        stats
    }

    /// Records that reached a terminal state.
    #[must_use]
    pub const fn finished(&self) -> u32 {
        self.success + self.failed
    }
}

#[cfg(test)]
pub(crate) fn sample_record(status: JobStatus, message: Option<&str>) -> JobRecord {
    use chrono::TimeZone;

    JobRecord {
        id: "00000000deadbeef".into(),
        email: "qwertyui42@gmail.com".into(),
        password: "Xy7!abcDEF12".into(),
        created_at: Utc
            .with_ymd_and_hms(2026, 2, 5, 19, 30, 0)
            .single()
            .unwrap_or_default(),
        status,
        message: message.map(str::to_string),
    }
}
