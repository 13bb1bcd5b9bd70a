//! CSV export of the job log

use chrono::{DateTime, Utc};

use crate::record::JobRecord;

pub const CSV_HEADER: &str = "Timestamp,Email,Password,Status,Message";

/// Render records as CSV, one row per record in log order.
///
/// Only the message column is quoted; embedded double quotes are doubled.
#[must_use]
pub fn to_csv(records: &[JobRecord]) -> String {
    let mut lines = Vec::with_capacity(records.len() + 1);
    lines.push(CSV_HEADER.to_string());

    for record in records {
        lines.push(format!(
            "{},{},{},{},\"{}\"",
            format_time(&record.created_at),
            record.email,
            record.password,
            record.status,
            record.message.as_deref().unwrap_or("").replace('"', "\"\""),
        ));
    }

    lines.join("\n")
}

/// `"19:30:00.042"`
#[must_use]
pub fn format_time(ts: &DateTime<Utc>) -> String {
    ts.format("%H:%M:%S%.3f").to_string()
}

/// `accounts_export_20260205T193000Z.csv`
#[must_use]
pub fn export_filename(now: DateTime<Utc>) -> String {
    format!("accounts_export_{}.csv", now.format("%Y%m%dT%H%M%SZ"))
}
