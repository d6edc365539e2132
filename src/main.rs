use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use pg2lake::{ErrorCode, RuntimeConfig};
use std::path::PathBuf;
use std::process::ExitCode;

/// Export PostgreSQL tables to time-partitioned files in object storage
#[derive(Parser)]
#[command(name = "pg2lake")]
#[command(version)]
#[command(about = "Export PostgreSQL tables to time-partitioned files in object storage", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to configuration file
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute one export run
    Run(RunArgs),
    /// Load and validate configuration without connecting anywhere
    Validate,
}

#[derive(clap::Args)]
struct RunArgs {
    /// Source table, optionally schema-qualified (overrides config file)
    #[arg(short, long, value_name = "TABLE", conflicts_with = "query")]
    table: Option<String>,

    /// Source SQL query (overrides config file)
    #[arg(short, long, value_name = "SQL")]
    query: Option<String>,

    /// Output prefix URI: s3://, s3a://, file://, memory:// or a local path
    #[arg(short, long, value_name = "URI")]
    output: Option<String>,

    /// Log level: trace, debug, info, warn, error
    #[arg(short = 'v', long, value_name = "LEVEL")]
    log_level: Option<String>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let outcome = match &cli.command {
        Commands::Run(args) => run(cli.config.as_deref(), args),
        Commands::Validate => validate(cli.config.as_deref()),
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let (code, message) = failure_message(&e);
            eprintln!("{}", message);
            ExitCode::from(exit_status(code))
        }
    }
}

fn validate(config_path: Option<&std::path::Path>) -> Result<()> {
    let config = load_config(config_path)?;
    config.validate()?;
    println!("Configuration is valid");
    println!("  source: {}", describe_source(&config));
    println!("  output: {}", config.export.output_prefix);
    Ok(())
}

fn run(config_path: Option<&std::path::Path>, args: &RunArgs) -> Result<()> {
    let mut config = load_config(config_path)?;
    apply_cli_overrides(&mut config, args);
    config.validate()?;

    pg2lake::init_tracing(&config.logging);

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to build tokio runtime")?
        .block_on(async {
            let provider = pg2lake::secret_provider(&config.credentials).await;
            let report = pg2lake::run_export(&config, provider).await?;
            println!(
                "Exported {} records ({} skipped) into {} partitions under {}",
                report.write.records_written,
                report.skipped_null_timestamps,
                report.write.partitions.len(),
                config.export.output_prefix
            );
            Ok::<(), anyhow::Error>(())
        })
}

fn load_config(config_path: Option<&std::path::Path>) -> Result<RuntimeConfig> {
    match config_path {
        Some(path) => RuntimeConfig::load_layers(Some(path))
            .with_context(|| format!("Failed to load config from {}", path.display())),
        None => RuntimeConfig::load_layers(None).context("Failed to load configuration"),
    }
}

/// CLI flags take precedence over file and environment layers.
fn apply_cli_overrides(config: &mut RuntimeConfig, args: &RunArgs) {
    if let Some(table) = &args.table {
        config.export.source_table = Some(table.clone());
        config.export.query = None;
    }
    if let Some(query) = &args.query {
        config.export.query = Some(query.clone());
        config.export.source_table = None;
    }
    if let Some(output) = &args.output {
        config.export.output_prefix = output.clone();
    }
    if let Some(level) = &args.log_level {
        config.logging.level = level.clone();
    }
}

fn describe_source(config: &RuntimeConfig) -> String {
    match (&config.export.source_table, &config.export.query) {
        (Some(table), _) => format!("table {}", table),
        (None, Some(_)) => "custom query".to_string(),
        (None, None) => "-".to_string(),
    }
}

/// Export errors already lead with their code; anything else is a
/// configuration failure.
fn failure_message(e: &anyhow::Error) -> (ErrorCode, String) {
    match e.downcast_ref::<pg2lake::ExportError>() {
        Some(export) => (export.code(), format!("{:#}", e)),
        None => (
            ErrorCode::E008InvalidConfig,
            format!("[{}] {:#}", ErrorCode::E008InvalidConfig, e),
        ),
    }
}

/// E001 exits with 1, E008 with 8.
fn exit_status(code: ErrorCode) -> u8 {
    code.as_str()[1..].parse().unwrap_or(1)
}
