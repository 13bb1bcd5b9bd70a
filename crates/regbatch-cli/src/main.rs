//! regbatch CLI - sequential batch registration runner

mod storage;

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};

use regbatch_core::{BatchReport, BatchState, ContentType, JobStatus, RunConfig, plan};
use regbatch_runner::Orchestrator;

#[derive(Parser)]
#[command(name = "regbatch")]
#[command(about = "Sequential batch registration runner with mock mode and CSV export")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, global = true, default_value = "terminal")]
    output: OutputFormat,

    /// Verbose output (debug logging)
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a registration batch
    Run {
        /// Config file (default: .regbatch.toml)
        #[arg(short, long)]
        config: Option<String>,

        /// Override the registration endpoint
        #[arg(long)]
        target_url: Option<String>,

        /// Override the number of jobs
        #[arg(short = 'n', long)]
        count: Option<u32>,

        /// Override the delay between jobs (milliseconds)
        #[arg(long)]
        delay_ms: Option<u64>,

        /// Override the invite code
        #[arg(long)]
        invite_code: Option<String>,

        /// Synthesize outcomes instead of sending requests
        #[arg(long)]
        mock: bool,

        /// Route requests through the rewriting proxy
        #[arg(long)]
        proxy: bool,

        /// Override the payload encoding
        #[arg(long)]
        content_type: Option<ContentTypeArg>,

        /// Show the execution plan without sending requests
        #[arg(long)]
        dry_run: bool,

        /// Write the CSV export and summary into this directory
        #[arg(long)]
        export_dir: Option<String>,
    },

    /// Initialize config file
    Init,

    /// Export JSON Schema for the run report
    Schema,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ContentTypeArg {
    Json,
    Form,
}

impl From<ContentTypeArg> for ContentType {
    fn from(arg: ContentTypeArg) -> Self {
        match arg {
            ContentTypeArg::Json => ContentType::Json,
            ContentTypeArg::Form => ContentType::Form,
        }
    }
}

#[derive(Clone, Copy, ValueEnum, PartialEq, Eq)]
enum OutputFormat {
    Terminal,
    Json,
    Silent,
}

/// CLI overrides applied on top of the loaded config.
struct Overrides {
    target_url: Option<String>,
    count: Option<u32>,
    delay_ms: Option<u64>,
    invite_code: Option<String>,
    mock: bool,
    proxy: bool,
    content_type: Option<ContentTypeArg>,
    export_dir: Option<String>,
}

impl Overrides {
    fn apply(self, cfg: &mut RunConfig) {
        if let Some(url) = self.target_url {
            cfg.target_url = url;
        }
        if let Some(count) = self.count {
            cfg.count = count;
        }
        if let Some(delay) = self.delay_ms {
            cfg.delay_ms = delay;
        }
        if let Some(code) = self.invite_code {
            cfg.invite_code = code;
        }
        if self.mock {
            cfg.use_mock_mode = true;
        }
        if self.proxy {
            cfg.use_proxy = true;
        }
        if let Some(ct) = self.content_type {
            cfg.content_type = ct.into();
        }
        if let Some(dir) = self.export_dir {
            cfg.export_dir = Some(PathBuf::from(dir));
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::from(3)
        }
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        tracing_subscriber::EnvFilter::new("debug")
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> Result<u8> {
    match cli.command {
        Commands::Run {
            config,
            target_url,
            count,
            delay_ms,
            invite_code,
            mock,
            proxy,
            content_type,
            dry_run,
            export_dir,
        } => {
            let mut cfg = if let Some(path) = config {
                RunConfig::load(Path::new(&path))?
            } else {
                RunConfig::load_default()?
            };
            Overrides {
                target_url,
                count,
                delay_ms,
                invite_code,
                mock,
                proxy,
                content_type,
                export_dir,
            }
            .apply(&mut cfg);

            // Dry run: show plan and exit
            if dry_run {
                let plan = plan::build_plan(&cfg);
                match cli.output {
                    OutputFormat::Terminal => println!("{}", plan.to_terminal()),
                    OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&plan)?),
                    OutputFormat::Silent => {}
                }
                if plan.has_errors() {
                    return Ok(1);
                }
                if plan.has_warnings() && cli.output != OutputFormat::Silent {
                    eprintln!("Plan has warnings; review them before a real run.");
                }
                return Ok(0);
            }

            if cli.output != OutputFormat::Silent {
                eprintln!("Config:");
                if cfg.use_mock_mode {
                    eprintln!("  mode:     mock");
                } else {
                    eprintln!("  target:   {}", cfg.target_url);
                    eprintln!("  proxy:    {}", if cfg.use_proxy { "on" } else { "off" });
                    eprintln!("  encoding: {}", cfg.content_type);
                }
                eprintln!("  jobs:     {}", cfg.count);
                eprintln!("  delay:    {}ms", cfg.delay_ms);
                eprintln!();
            }

            let orch = Orchestrator::http(&cfg)?;
            let stop = orch.stop_handle();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::warn!("interrupt received, stopping batch");
                    stop.stop();
                }
            });

            let started = Instant::now();
            let report = orch.start(&cfg).await?;
            let duration_secs = started.elapsed().as_secs_f64();

            match cli.output {
                OutputFormat::Terminal => print_terminal(&report, duration_secs),
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
                OutputFormat::Silent => {}
            }

            if let Some(dir) = &cfg.export_dir {
                match storage::save_export(dir, &cfg, &report, duration_secs) {
                    Ok(paths) => {
                        if cli.output != OutputFormat::Silent {
                            eprintln!("Export saved: {}", paths.csv.display());
                            eprintln!("Summary saved: {}", paths.summary.display());
                        }
                    }
                    Err(e) => eprintln!("Warning: failed to write export: {e}"),
                }
            }

            Ok(exit_code(&report))
        }

        Commands::Init => {
            let config_path = ".regbatch.toml";
            if Path::new(config_path).exists() {
                eprintln!("{config_path} already exists");
                return Ok(1);
            }

            std::fs::write(config_path, RunConfig::example())?;
            println!("Created {config_path}");
            println!("\nEdit the file to configure:");
            println!("  - target_url: registration endpoint");
            println!("  - count, delay_ms: batch size and pacing");
            println!("  - field_mapping: payload keys the endpoint expects");
            Ok(0)
        }

        Commands::Schema => {
            println!("{}", regbatch_core::report::generate_schema());
            Ok(0)
        }
    }
}

fn print_terminal(report: &BatchReport, duration_secs: f64) {
    let s = &report.stats;
    let label = match report.state {
        BatchState::Stopped => "STOPPED",
        _ if s.failed > 0 => "DONE (with failures)",
        _ => "DONE",
    };
    println!("\n{label}: {} of {} jobs finished in {duration_secs:.1}s", s.finished(), s.total);
    println!(
        "  Success: {}, Failed: {}, Pending: {}",
        s.success, s.failed, s.pending
    );

    let failures: Vec<_> = report
        .records
        .iter()
        .filter(|r| r.status == JobStatus::Failed)
        .collect();
    if !failures.is_empty() {
        println!("\nFailures ({}):", failures.len());
        for r in failures.iter().take(20) {
            println!("  {} -> {}", r.email, r.message.as_deref().unwrap_or(""));
        }
        if failures.len() > 20 {
            println!("  ... {} more", failures.len() - 20);
        }
    }
}

/// 0 = all succeeded, 1 = some failed, 2 = stopped early.
fn exit_code(report: &BatchReport) -> u8 {
    if report.state == BatchState::Stopped {
        2
    } else if report.stats.failed > 0 {
        1
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(state: BatchState, statuses: &[JobStatus]) -> BatchReport {
        let records = statuses
            .iter()
            .enumerate()
            .map(|(i, &status)| regbatch_core::JobRecord {
                id: format!("{i:016x}"),
                email: format!("user{i}@gmail.com"),
                password: "pw".into(),
                created_at: chrono::Utc::now(),
                status,
                message: None,
            })
            .collect();
        BatchReport::new(state, records, u32::try_from(statuses.len()).unwrap_or(0))
    }

    #[test]
    fn exit_codes() {
        assert_eq!(
            exit_code(&report(BatchState::Completed, &[JobStatus::Success])),
            0
        );
        assert_eq!(
            exit_code(&report(
                BatchState::Completed,
                &[JobStatus::Success, JobStatus::Failed]
            )),
            1
        );
        assert_eq!(
            exit_code(&report(BatchState::Stopped, &[JobStatus::Pending])),
            2
        );
    }

    #[test]
    fn overrides_replace_file_values() {
        let mut cfg = RunConfig::default();
        Overrides {
            target_url: Some("https://api.example.com/signup".into()),
            count: Some(3),
            delay_ms: Some(0),
            invite_code: Some("CODE".into()),
            mock: true,
            proxy: false,
            content_type: Some(ContentTypeArg::Form),
            export_dir: Some("out".into()),
        }
        .apply(&mut cfg);

        assert_eq!(cfg.target_url, "https://api.example.com/signup");
        assert_eq!(cfg.count, 3);
        assert_eq!(cfg.delay_ms, 0);
        assert_eq!(cfg.invite_code, "CODE");
        assert!(cfg.use_mock_mode);
        assert!(!cfg.use_proxy);
        assert_eq!(cfg.content_type, ContentType::Form);
        assert_eq!(cfg.export_dir, Some(PathBuf::from("out")));
    }

    #[test]
    fn cli_parses_run_flags() {
        let cli = Cli::try_parse_from([
            "regbatch",
            "--output",
            "json",
            "run",
            "-n",
            "5",
            "--mock",
            "--content-type",
            "form",
        ])
        .unwrap();
        assert!(cli.output == OutputFormat::Json);
        match cli.command {
            Commands::Run {
                count,
                mock,
                content_type,
                ..
            } => {
                assert_eq!(count, Some(5));
                assert!(mock);
                assert!(matches!(content_type, Some(ContentTypeArg::Form)));
            }
            _ => panic!("expected run"),
        }
    }
}
