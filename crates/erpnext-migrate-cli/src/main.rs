//! erpnext-migrate CLI - idempotent spreadsheet to ERPNext migration.

use chrono::Utc;
use clap::{Parser, Subcommand};
use erpnext_migrate::config::{AuthMethod, MigrationConfig};
use erpnext_migrate::error::EXIT_RECORD_FAILURES;
use erpnext_migrate::mapping::{self, RecordMapper, BUILTIN_MAPPERS};
use erpnext_migrate::reset::DEFAULT_RESET_ORDER;
use erpnext_migrate::source::{JsonFileSource, RecordSource};
use erpnext_migrate::{
    validate_records, Config, EngineConfig, HttpClient, MigrateError, MigrationEngine,
    MigrationReport, ResetPlan, WriteMode,
};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{info, Level};
use tracing_subscriber::fmt::format::FmtSpan;

#[derive(Parser)]
#[command(name = "erpnext-migrate")]
#[command(about = "Idempotent migration of spreadsheet records into ERPNext")]
#[command(version)]
struct Cli {
    /// Path to YAML file overriding migration settings
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Output JSON result to stdout
    #[arg(long)]
    output_json: bool,

    /// Log format: text or json
    #[arg(long, default_value = "text")]
    log_format: String,

    /// Log verbosity: debug, info, warn, error
    #[arg(long, default_value = "info")]
    verbosity: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Migrate records into ERPNext
    Run {
        /// Record kind: customer, item or sales_order
        #[arg(long)]
        doctype: String,

        /// Exported records (JSON array or JSON lines)
        #[arg(long)]
        input: PathBuf,

        /// What to do with records that already exist
        #[arg(long, value_parser = ["skip", "upsert"])]
        mode: Option<String>,

        /// Records per batch before pausing
        #[arg(long)]
        batch_size: Option<usize>,
    },

    /// Check records offline without contacting ERPNext
    Validate {
        /// Record kind: customer, item or sales_order
        #[arg(long)]
        doctype: String,

        /// Exported records (JSON array or JSON lines)
        #[arg(long)]
        input: PathBuf,
    },

    /// Cancel and delete every document of the given doctypes
    Reset {
        /// Doctypes to clear, dependents first (default: transactions, then Customer and Item)
        #[arg(long = "doctype", num_args = 1..)]
        doctypes: Vec<String>,

        /// List what would be removed without removing it
        #[arg(long)]
        dry_run: bool,

        /// Confirm deletion
        #[arg(long, short)]
        yes: bool,
    },

    /// Load and validate configuration without connecting
    CheckConfig,
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(EXIT_RECORD_FAILURES),
        Err(e) => {
            eprintln!("{}", e.format_detailed());
            ExitCode::from(e.exit_code())
        }
    }
}

/// Returns whether every record (or document) succeeded.
async fn run() -> Result<bool, MigrateError> {
    let cli = Cli::parse();

    setup_logging(&cli.verbosity, &cli.log_format)
        .map_err(|e| MigrateError::Config(e.to_string()))?;

    match cli.command {
        Commands::Run {
            ref doctype,
            ref input,
            ref mode,
            batch_size,
        } => {
            let mut config = load_config(cli.config.as_deref())?;
            if let Some(mode) = mode {
                config.migration.write_mode = parse_mode(mode)?;
            }
            if let Some(size) = batch_size {
                config.migration.batch_size = size;
            }
            config.validate()?;

            let mapper = resolve_mapper(doctype)?;
            let source = JsonFileSource::new(input);
            let records = source.read_records()?;

            let client = HttpClient::connect(&config).await?;
            let started_at = Utc::now();
            let engine = MigrationEngine::new(&client, mapper.as_ref(), EngineConfig::from(&config.migration));
            let result = engine.run(&records).await;

            let report = MigrationReport::from_result(mapper.doctype(), source.describe(), started_at, result)
                .with_spreadsheet_id(config.source.spreadsheet_id.clone());
            let path = report.write_to(&config.migration.report_dir())?;

            if cli.output_json {
                println!("{}", report.to_json()?);
            } else {
                println!("\n{}", report.summary(config.migration.summary_errors));
                println!("\n  Report: {}", path.display());
            }
            Ok(report.is_success())
        }

        Commands::Validate {
            ref doctype,
            ref input,
        } => {
            let migration = match &cli.config {
                Some(path) => MigrationConfig::load(path)?,
                None => MigrationConfig::default(),
            };
            let mapper = resolve_mapper(doctype)?;
            let records = JsonFileSource::new(input).read_records()?;
            let errors = validate_records(mapper.as_ref(), &records);

            if cli.output_json {
                println!("{}", serde_json::to_string_pretty(&errors)?);
            } else {
                println!(
                    "{} of {} {} records valid",
                    records.len() - errors.len(),
                    records.len(),
                    mapper.doctype()
                );
                for err in errors.iter().take(migration.summary_errors) {
                    println!("  - {}: {}", err.key, err.error);
                }
                if errors.len() > migration.summary_errors {
                    println!("  ... and {} more", errors.len() - migration.summary_errors);
                }
            }
            Ok(errors.is_empty())
        }

        Commands::Reset {
            ref doctypes,
            dry_run,
            yes,
        } => {
            if !dry_run && !yes {
                return Err(MigrateError::config(
                    "reset deletes documents; pass --yes to confirm or --dry-run to preview",
                ));
            }
            let config = load_config(cli.config.as_deref())?;
            let doctypes = if doctypes.is_empty() {
                DEFAULT_RESET_ORDER.iter().map(|d| d.to_string()).collect()
            } else {
                doctypes.clone()
            };

            let client = HttpClient::connect(&config).await?;
            let results = ResetPlan::new(doctypes).dry_run(dry_run).execute(&client).await;

            if cli.output_json {
                println!("{}", serde_json::to_string_pretty(&results)?);
            } else {
                let prefix = if dry_run { "[dry-run] " } else { "" };
                println!("\n{}Reset results:", prefix);
                for r in &results {
                    println!(
                        "  {}: {} found, {} cancelled, {} deleted, {} errors",
                        r.doctype,
                        r.total,
                        r.cancelled,
                        r.deleted,
                        r.errors.len()
                    );
                    for err in r.errors.iter().take(config.migration.summary_errors) {
                        println!("    - {}: {}", err.key, err.error);
                    }
                }
            }
            Ok(results.iter().all(|r| r.errors.is_empty()))
        }

        Commands::CheckConfig => {
            let config = load_config(cli.config.as_deref())?;
            let auth = match config.erpnext.auth_method() {
                Some(AuthMethod::Token { .. }) => "api token",
                Some(AuthMethod::Password { .. }) => "password",
                None => "none",
            };

            if cli.output_json {
                println!("{}", serde_json::to_string_pretty(&config.migration)?);
            } else {
                println!("Configuration OK");
                println!("  ERPNext: {} ({} as {})", config.erpnext.url, auth, config.erpnext.username);
                println!("  Spreadsheet: {}", config.source.spreadsheet_id);
                println!(
                    "  Batches: {} records, {}s pause",
                    config.migration.batch_size, config.migration.batch_pause_secs
                );
                println!(
                    "  Retries: {} attempts, {}s backoff base, timeout {}s",
                    config.migration.max_attempts,
                    config.migration.backoff_base_secs,
                    config.migration.request_timeout_secs
                );
                println!("  Mode: {:?}", config.migration.write_mode);
                println!("  Reports: {}", config.migration.report_dir().display());
            }
            Ok(true)
        }
    }
}

/// Environment configuration, with the optional YAML overrides applied.
fn load_config(overrides: Option<&Path>) -> Result<Config, MigrateError> {
    let config = Config::from_env()?;
    let config = match overrides {
        Some(path) => {
            let config = config.with_overrides_from(path)?;
            info!("Loaded overrides from {:?}", path);
            config
        }
        None => config,
    };
    Ok(config)
}

fn resolve_mapper(doctype: &str) -> Result<Box<dyn RecordMapper>, MigrateError> {
    mapping::builtin(doctype).ok_or_else(|| {
        MigrateError::Config(format!(
            "unknown doctype '{}' (expected one of: {})",
            doctype,
            BUILTIN_MAPPERS.join(", ")
        ))
    })
}

fn parse_mode(mode: &str) -> Result<WriteMode, MigrateError> {
    match mode {
        "skip" => Ok(WriteMode::SkipExisting),
        "upsert" => Ok(WriteMode::Upsert),
        other => Err(MigrateError::Config(format!("unknown mode '{}'", other))),
    }
}

fn setup_logging(verbosity: &str, format: &str) -> Result<(), String> {
    let level = match verbosity.to_lowercase().as_str() {
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    // Logs go to stderr so --output-json keeps stdout parseable.
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_span_events(FmtSpan::CLOSE)
        .with_target(false)
        .with_writer(std::io::stderr);

    match format {
        "json" => subscriber.json().init(),
        "text" => subscriber.init(),
        other => return Err(format!("unknown log format '{}' (expected text or json)", other)),
    }

    Ok(())
}
