//! sqlite-pg-migrate CLI - one-shot SQLite to PostgreSQL migration.

use clap::{Parser, Subcommand};
use sqlite_pg_migrate::{Config, MigrateError, Orchestrator};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{info, Level};

#[derive(Parser)]
#[command(name = "sqlite-pg-migrate")]
#[command(about = "Bulk migration of a SQLite database into PostgreSQL")]
#[command(version)]
struct Cli {
    /// Path to YAML configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    /// Read connection settings from a .env file instead of the YAML config
    #[arg(long)]
    env_file: Option<PathBuf>,

    /// Output JSON result to stdout
    #[arg(long)]
    output_json: bool,

    /// Log format: text or json
    #[arg(long, default_value = "text")]
    log_format: String,

    /// Log verbosity: debug, info, warn, error
    #[arg(long, default_value = "info")]
    verbosity: String,

    /// Print progress updates as JSON lines to stderr
    #[arg(long)]
    progress: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Migrate every table from SQLite into PostgreSQL
    Run {
        /// Override rows per page
        #[arg(long)]
        page_size: Option<usize>,
    },

    /// Test database connections
    HealthCheck,

    /// Check source integrity and list tables with row counts
    Check,
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e.format_detailed());
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run() -> Result<(), MigrateError> {
    let cli = Cli::parse();

    setup_logging(&cli.verbosity, &cli.log_format);

    let mut config = match cli.env_file {
        Some(ref path) => {
            let config = Config::from_env_file(path)?;
            info!("Loaded configuration from env file {:?}", path);
            config
        }
        None => {
            let config = Config::load(&cli.config)?;
            info!("Loaded configuration from {:?}", cli.config);
            config
        }
    };

    match cli.command {
        Commands::Run { page_size } => {
            if let Some(size) = page_size {
                config.migration.page_size = size;
                config.validate()?;
            }

            let orchestrator = Orchestrator::connect(&config)
                .await?
                .with_progress(cli.progress);
            let result = orchestrator.run().await?;

            if cli.output_json {
                println!("{}", result.to_json()?);
            } else {
                println!("\nMigration completed!");
                println!("  Run ID: {}", result.run_id);
                println!("  Duration: {:.2}s", result.duration_seconds);
                println!("  Tables: {}", result.tables_total);
                if !result.tables_excluded.is_empty() {
                    println!("  Excluded: {}", result.tables_excluded.join(", "));
                }
                println!("  Rows committed: {}", result.rows_committed);
                println!("  Rows failed: {}", result.rows_failed);
                println!("  Throughput: {} rows/sec", result.rows_per_second);
                for report in result.tables.iter().filter(|r| r.rows_failed() > 0) {
                    println!("  {}: {} failed rows", report.table, report.rows_failed());
                }
            }
        }

        Commands::HealthCheck => {
            let result = Orchestrator::health_check(&config).await;

            if cli.output_json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                println!("Health Check Results:");
                println!(
                    "  Source (SQLite): {} ({}ms)",
                    if result.source_connected { "OK" } else { "FAILED" },
                    result.source_latency_ms
                );
                if let Some(ref err) = result.source_error {
                    println!("    Error: {}", err);
                }
                println!(
                    "  Target (PostgreSQL): {} ({}ms)",
                    if result.target_connected { "OK" } else { "FAILED" },
                    result.target_latency_ms
                );
                if let Some(ref err) = result.target_error {
                    println!("    Error: {}", err);
                }
                println!(
                    "\n  Overall: {}",
                    if result.healthy { "HEALTHY" } else { "UNHEALTHY" }
                );
            }

            if !result.healthy {
                return Err(MigrateError::Config("Health check failed".to_string()));
            }
        }

        Commands::Check => {
            let summary = Orchestrator::check_source(&config).await?;

            if cli.output_json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                println!("Source: {} (SQLite {})", summary.path, summary.sqlite_version);
                println!("Integrity: OK");
                for table in &summary.tables {
                    println!(
                        "  {:<40} {:>12}{}",
                        table.name,
                        table.rows,
                        if table.excluded { "  (excluded)" } else { "" }
                    );
                }
            }
        }
    }

    Ok(())
}

fn setup_logging(verbosity: &str, format: &str) {
    let level = match verbosity.to_lowercase().as_str() {
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false);

    if format == "json" {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}
