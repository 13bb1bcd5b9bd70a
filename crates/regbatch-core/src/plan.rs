//! Dry run plan types and config validation
//!
//! Describes what a batch *would* do without sending any requests.
//! Used for pre-flight checks before a real run.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::config::{ContentType, RunConfig};
use crate::proxy::dispatch_url;

// ── Plan types ──

/// Complete dry run plan: request shape, timing estimate and config checks.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RunPlan {
    /// Jobs that would be attempted
    pub jobs: u32,
    /// Whether outcomes are synthesized
    pub mock_mode: bool,
    /// URL requests would be sent to (absent in mock mode)
    pub dispatch_url: Option<String>,
    /// Payload encoding
    pub encoding: String,
    /// Payload keys in emission order
    pub payload_keys: Vec<String>,
    /// Lower bound on wall time in milliseconds
    pub min_duration_ms: u64,
    /// Upper bound on wall time in milliseconds (mock mode only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_duration_ms: Option<u64>,
    /// Config validation results
    pub validations: Vec<Validation>,
}

/// A validation check result.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Validation {
    pub check: String,
    pub status: ValidationStatus,
    pub message: String,
}

/// Status of a validation check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ValidationStatus {
    Ok,
    Warning,
    Error,
}

impl std::fmt::Display for ValidationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ok => write!(f, "OK"),
            Self::Warning => write!(f, "WARNING"),
            Self::Error => write!(f, "ERROR"),
        }
    }
}

impl Validation {
    fn new(check: &str, status: ValidationStatus, message: impl Into<String>) -> Self {
        Self {
            check: check.into(),
            status,
            message: message.into(),
        }
    }
}

const MOCK_LATENCY_MIN_MS: u64 = 100;
const MOCK_LATENCY_MAX_MS: u64 = 600;

/// Build a dry run plan for the given config.
#[must_use]
pub fn build_plan(config: &RunConfig) -> RunPlan {
    let jobs = config.count;
    let gaps = u64::from(jobs.saturating_sub(1)).saturating_mul(config.delay_ms);
    let (min_duration_ms, max_duration_ms) = if config.use_mock_mode {
        (
            gaps.saturating_add(u64::from(jobs) * MOCK_LATENCY_MIN_MS),
            Some(gaps.saturating_add(u64::from(jobs) * MOCK_LATENCY_MAX_MS)),
        )
    } else {
        (gaps, None)
    };

    RunPlan {
        jobs,
        mock_mode: config.use_mock_mode,
        dispatch_url: (!config.use_mock_mode).then(|| dispatch_url(config)),
        encoding: config.content_type.mime().to_string(),
        payload_keys: config
            .field_mapping
            .emitted_keys(config.has_invite_code())
            .into_iter()
            .map(str::to_string)
            .collect(),
        min_duration_ms,
        max_duration_ms,
        validations: validate_config(config),
    }
}

// ── Config validation ──

/// Run all pre-flight checks. Hard errors mirror [`RunConfig::validate`];
/// warnings flag settings that are legal but probably unintended.
#[must_use]
pub fn validate_config(config: &RunConfig) -> Vec<Validation> {
    let mut checks = Vec::new();

    match config.validate() {
        Ok(()) => checks.push(Validation::new("config", ValidationStatus::Ok, "config: valid")),
        Err(e) => checks.push(Validation::new("config", ValidationStatus::Error, e.to_string())),
    }

    if config.use_mock_mode {
        checks.push(Validation::new(
            "mock_mode",
            ValidationStatus::Warning,
            "mock mode: no requests will be sent, target_url is ignored",
        ));
    } else {
        let local = is_local(&config.target_url);
        if config.use_proxy && local {
            checks.push(Validation::new(
                "proxy",
                ValidationStatus::Warning,
                format!(
                    "proxy: enabled but target_url {} is local; the proxy cannot reach it",
                    config.target_url
                ),
            ));
        }
        if config.target_url.starts_with("http://") && !local {
            checks.push(Validation::new(
                "target_url",
                ValidationStatus::Warning,
                format!("target_url: {} is plain http", config.target_url),
            ));
        }
    }

    if config.delay_ms == 0 && config.count > 1 {
        checks.push(Validation::new(
            "delay",
            ValidationStatus::Warning,
            "delay: 0ms between jobs, requests will be sent back to back",
        ));
    }

    if config.content_type == ContentType::Form && config.field_mapping.email.contains(' ') {
        checks.push(Validation::new(
            "field_mapping",
            ValidationStatus::Warning,
            format!(
                "field_mapping: email key '{}' contains a space",
                config.field_mapping.email
            ),
        ));
    }

    checks
}

fn is_local(target_url: &str) -> bool {
    url::Url::parse(target_url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .is_some_and(|host| matches!(host.as_str(), "localhost" | "127.0.0.1" | "[::1]" | "0.0.0.0"))
}

// ── Display helpers ──

impl RunPlan {
    /// Format as human-readable terminal output.
    #[must_use]
    pub fn to_terminal(&self) -> String {
        let mut lines = Vec::new();

        let mode = if self.mock_mode { "mock" } else { "network" };
        lines.push(format!("Dry run: {} jobs ({mode})\n", self.jobs));

        if let Some(url) = &self.dispatch_url {
            lines.push(format!("  POST {url}"));
        }
        lines.push(format!("  Encoding: {}", self.encoding));
        lines.push(format!("  Payload keys: {}", self.payload_keys.join(", ")));
        match self.max_duration_ms {
            Some(max) => lines.push(format!(
                "  Estimated duration: {:.1}s - {:.1}s",
                self.min_duration_ms as f64 / 1000.0,
                max as f64 / 1000.0
            )),
            None => lines.push(format!(
                "  Estimated duration: at least {:.1}s",
                self.min_duration_ms as f64 / 1000.0
            )),
        }
        lines.push(String::new());

        lines.push("Config validation:".into());
        for v in &self.validations {
            lines.push(format!("  [{}] {}", v.status, v.message));
        }

        lines.join("\n")
    }

    /// Returns true if any validation has Error status.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.validations
            .iter()
            .any(|v| v.status == ValidationStatus::Error)
    }

    /// Returns true if any validation has Warning status.
    #[must_use]
    pub fn has_warnings(&self) -> bool {
        self.validations
            .iter()
            .any(|v| v.status == ValidationStatus::Warning)
    }
}
