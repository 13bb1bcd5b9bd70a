//! Response classification
//!
//! Turns a raw `(status, body)` pair, or a mock draw, into a success flag and
//! an operator-readable message. Never fails: unexpected shapes fall back to
//! a best-effort message.
//!
//! Failure message precedence for non-2xx responses:
//!
//! 1. JSON body: `message`, then `error`, then serialized `errors`, then a
//!    50-character raw snippet.
//! 2. Non-JSON body: a block-page message if it mentions a bot-mitigation
//!    service or captcha, otherwise `Error <status>: unexpected response`.

use std::time::Duration;

use rand::Rng;
use serde_json::Value;

pub const SUCCESS_MESSAGE: &str = "Registered successfully";
pub const SERVER_FAILURE_MESSAGE: &str = "Server response indicates failure";
pub const MOCK_FAILURE_MESSAGE: &str = "Random error (simulated)";
pub const BLOCKED_MESSAGE: &str = "Blocked by protection service (Cloudflare)";

/// Probability that a mock job fails.
pub const MOCK_FAILURE_RATE: f64 = 0.05;

/// Case-sensitive markers of a block or challenge page.
const BLOCK_MARKERS: &[&str] = &["Cloudflare", "captcha"];

const SNIPPET_CHARS: usize = 50;

/// Outcome of one job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub success: bool,
    pub message: String,
}

impl Classification {
    fn ok() -> Self {
        Self {
            success: true,
            message: SUCCESS_MESSAGE.to_string(),
        }
    }

    fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

/// Classify an HTTP response from its status code and body text.
#[must_use]
pub fn classify_response(status: u16, body: &str) -> Classification {
    if (200..300).contains(&status) {
        classify_success_status(body)
    } else {
        classify_error_status(status, body)
    }
}

/// 2xx: success unless the JSON body explicitly says otherwise.
fn classify_success_status(body: &str) -> Classification {
    let Some(data) = parse_object_like(body) else {
        return Classification::ok();
    };

    let explicit_error = data.get("status").and_then(Value::as_str) == Some("error")
        || data.get("success").and_then(Value::as_bool) == Some(false);

    if explicit_error {
        let message =
            field_text(&data, "message").unwrap_or_else(|| SERVER_FAILURE_MESSAGE.to_string());
        Classification::failed(message)
    } else {
        Classification::ok()
    }
}

fn classify_error_status(status: u16, body: &str) -> Classification {
    match parse_object_like(body) {
        Some(data) => {
            let message = field_text(&data, "message")
                .or_else(|| field_text(&data, "error"))
                .or_else(|| {
                    data.get("errors")
                        .filter(|v| is_truthy(v))
                        .map(Value::to_string)
                })
                .unwrap_or_else(|| snippet(body));
            Classification::failed(message)
        }
        None if looks_blocked(body) => Classification::failed(BLOCKED_MESSAGE),
        None => Classification::failed(format!("Error {status}: unexpected response")),
    }
}

/// Parse JSON, treating `null` like unparsable input (it has no fields to probe).
fn parse_object_like(body: &str) -> Option<Value> {
    serde_json::from_str::<Value>(body)
        .ok()
        .filter(|v| !v.is_null())
}

/// Field rendered as text when present and non-empty.
fn field_text(data: &Value, key: &str) -> Option<String> {
    let value = data.get(key).filter(|v| is_truthy(v))?;
    Some(match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    })
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn snippet(body: &str) -> String {
    let head: String = body.chars().take(SNIPPET_CHARS).collect();
    format!("{head}...")
}

/// Whether a non-JSON body looks like a bot-mitigation or captcha page.
#[must_use]
pub fn looks_blocked(body: &str) -> bool {
    BLOCK_MARKERS.iter().any(|marker| body.contains(marker))
}

// ── Mock mode ──

/// Mock decision from a uniform draw in `[0, 1)`.
#[must_use]
pub fn classify_mock(draw: f64) -> Classification {
    if draw > MOCK_FAILURE_RATE {
        Classification::ok()
    } else {
        Classification::failed(MOCK_FAILURE_MESSAGE)
    }
}

/// Simulated network latency, uniform in `[100ms, 600ms)`.
pub fn mock_latency(rng: &mut impl Rng) -> Duration {
    Duration::from_millis(rng.gen_range(100..600))
}

/// Draw a mock outcome.
pub fn mock_outcome(rng: &mut impl Rng) -> Classification {
    classify_mock(rng.r#gen::<f64>())
}
