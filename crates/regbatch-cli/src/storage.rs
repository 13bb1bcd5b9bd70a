//! Export files written after a run
//!
//! Layout inside the export directory:
//! `accounts_export_<timestamp>.csv`, `summary_<timestamp>.json` and
//! `config_<timestamp>.toml` (snapshot of the config used).

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use regbatch_core::export::{export_filename, to_csv};
use regbatch_core::{BatchReport, RunConfig};

/// Files produced by [`save_export`].
pub struct ExportPaths {
    pub csv: PathBuf,
    pub summary: PathBuf,
}

/// Write the CSV export, a JSON summary and a config snapshot into `dir`.
pub fn save_export(
    dir: &Path,
    config: &RunConfig,
    report: &BatchReport,
    duration_secs: f64,
) -> Result<ExportPaths, std::io::Error> {
    save_export_at(dir, config, report, duration_secs, Utc::now())
}

fn save_export_at(
    dir: &Path,
    config: &RunConfig,
    report: &BatchReport,
    duration_secs: f64,
    now: DateTime<Utc>,
) -> Result<ExportPaths, std::io::Error> {
    std::fs::create_dir_all(dir)?;

    let csv = dir.join(export_filename(now));
    std::fs::write(&csv, to_csv(&report.records))?;

    let stamp = now.format("%Y%m%dT%H%M%SZ");

    let config_toml =
        toml::to_string_pretty(config).map_err(|e| std::io::Error::other(e.to_string()))?;
    std::fs::write(dir.join(format!("config_{stamp}.toml")), config_toml)?;

    let summary_value = serde_json::json!({
        "state": report.state,
        "stats": report.stats,
        "meta": {
            "timestamp": now.to_rfc3339(),
            "duration_secs": duration_secs,
            "target_url": config.target_url,
            "mock_mode": config.use_mock_mode,
            "proxy": config.use_proxy,
            "content_type": config.content_type,
            "csv": csv.file_name().map(|n| n.to_string_lossy().into_owned()),
        },
    });
    let summary = dir.join(format!("summary_{stamp}.json"));
    std::fs::write(
        &summary,
        serde_json::to_string_pretty(&summary_value).unwrap_or_default(),
    )?;

    Ok(ExportPaths { csv, summary })
}
