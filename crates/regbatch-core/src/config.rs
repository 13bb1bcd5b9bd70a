//! Run configuration for a registration batch

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Upper bound on jobs per batch.
pub const MAX_COUNT: u32 = 10_000;

/// Rewriting proxy used when `use_proxy` is set.
pub const DEFAULT_PROXY_BASE: &str = "https://corsproxy.io/?";

/// Immutable input for one batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Registration endpoint (absolute http/https URL)
    pub target_url: String,

    /// Number of jobs to attempt
    pub count: u32,

    /// Invite code; empty means the field is left out of the payload
    pub invite_code: String,

    /// Pause between the end of one job and the start of the next
    pub delay_ms: u64,

    /// Synthesize outcomes instead of sending requests
    pub use_mock_mode: bool,

    /// Route requests through the rewriting proxy
    pub use_proxy: bool,

    /// Payload serialization
    pub content_type: ContentType,

    /// Payload field names expected by the remote endpoint
    pub field_mapping: FieldMapping,

    /// Prefix the percent-encoded target URL is appended to
    pub proxy_base: String,

    /// Domain of generated email addresses
    pub email_domain: String,

    /// Per-request timeout in seconds
    pub timeout_secs: u64,

    /// Directory for the CSV export and run summary (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub export_dir: Option<PathBuf>,
}

/// Payload encoding.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    /// `application/json`
    #[default]
    Json,
    /// `application/x-www-form-urlencoded`
    #[serde(alias = "form-data", alias = "form-encoded")]
    Form,
}

impl ContentType {
    /// MIME type sent in the `Content-Type` header.
    #[must_use]
    pub const fn mime(self) -> &'static str {
        match self {
            Self::Json => "application/json",
            Self::Form => "application/x-www-form-urlencoded",
        }
    }
}

impl std::fmt::Display for ContentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Json => f.write_str("json"),
            Self::Form => f.write_str("form"),
        }
    }
}

/// Translation from internal payload fields to the endpoint's keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FieldMapping {
    pub email: String,
    pub password: String,
    pub confirm_password: String,
    pub invite_code: String,
}

impl Default for FieldMapping {
    fn default() -> Self {
        Self {
            email: "email".to_string(),
            password: "password".to_string(),
            confirm_password: "password_confirmation".to_string(),
            invite_code: "invite_code".to_string(),
        }
    }
}

impl FieldMapping {
    /// Keys that end up in the payload, in emission order.
    #[must_use]
    pub fn emitted_keys(&self, with_invite: bool) -> Vec<&str> {
        let mut keys = vec![
            self.email.as_str(),
            self.password.as_str(),
            self.confirm_password.as_str(),
        ];
        if with_invite {
            keys.push(self.invite_code.as_str());
        }
        keys
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            target_url: "http://localhost:8080/api/register".to_string(),
            count: 50,
            invite_code: String::new(),
            delay_ms: 2000,
            use_mock_mode: false,
            use_proxy: false,
            content_type: ContentType::Json,
            field_mapping: FieldMapping::default(),
            proxy_base: DEFAULT_PROXY_BASE.to_string(),
            email_domain: "gmail.com".to_string(),
            timeout_secs: 30,
            export_dir: None,
        }
    }
}

impl RunConfig {
    /// Load config from file
    ///
    /// # Errors
    ///
    /// Returns error if file cannot be read or parsed
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(path.to_path_buf(), e.to_string()))?;

        if path.extension().is_some_and(|ext| ext == "json") {
            serde_json::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))
        } else {
            toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))
        }
    }

    /// Load from default location (.regbatch.toml)
    pub fn load_default() -> Result<Self, ConfigError> {
        let candidates = [".regbatch.toml", ".regbatch.json", "regbatch.toml"];

        for name in candidates {
            let path = Path::new(name);
            if path.exists() {
                return Self::load(path);
            }
        }

        Ok(Self::default())
    }

    /// Whether the invite code goes into the payload.
    #[must_use]
    pub fn has_invite_code(&self) -> bool {
        !self.invite_code.is_empty()
    }

    /// Check everything that must hold before the first job runs.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] describing the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.count == 0 {
            return Err(ConfigError::Invalid("count must be at least 1".into()));
        }
        if self.count > MAX_COUNT {
            return Err(ConfigError::Invalid(format!(
                "count {} exceeds the maximum of {MAX_COUNT}",
                self.count
            )));
        }
        if !self.use_mock_mode {
            check_target_url(&self.target_url)?;
        }
        if self.email_domain.trim().is_empty() {
            return Err(ConfigError::Invalid("email_domain is empty".into()));
        }

        let keys = self.field_mapping.emitted_keys(self.has_invite_code());
        let mut seen = HashSet::new();
        for key in keys {
            if key.is_empty() {
                return Err(ConfigError::Invalid("field mapping has an empty key".into()));
            }
            if !seen.insert(key) {
                return Err(ConfigError::Invalid(format!(
                    "field mapping uses '{key}' more than once"
                )));
            }
        }
        Ok(())
    }

    /// Create example config file
    pub fn example() -> &'static str {
        r#"# regbatch configuration

# Registration endpoint
target_url = "http://localhost:8080/api/register"

# Number of accounts to attempt (1..=10000)
count = 50

# Optional invite code (left out of the payload when empty)
invite_code = ""

# Pause between jobs in milliseconds
delay_ms = 2000

# Synthesize outcomes instead of sending requests
use_mock_mode = false

# Route requests through a rewriting proxy
use_proxy = false
# proxy_base = "https://corsproxy.io/?"

# Payload encoding: "json" or "form"
content_type = "json"

# Domain of generated email addresses
email_domain = "gmail.com"

# Per-request timeout in seconds
timeout_secs = 30

# Write accounts_export_<timestamp>.csv and summary.json here after the run
# export_dir = "exports"

# Payload field names expected by the endpoint
[field_mapping]
email = "email"
password = "password"
confirmPassword = "password_confirmation"
inviteCode = "invite_code"
"#
    }
}

fn check_target_url(raw: &str) -> Result<(), ConfigError> {
    let parsed = url::Url::parse(raw)
        .map_err(|e| ConfigError::Invalid(format!("target_url '{raw}' is not a valid URL: {e}")))?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        other => Err(ConfigError::Invalid(format!(
            "target_url must use http or https, got '{other}'"
        ))),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Cannot read {0}: {1}")]
    Io(PathBuf, String),
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("Invalid config: {0}")]
    Invalid(String),
}
