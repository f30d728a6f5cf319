use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use tracing::{info, warn};

use job_processor::{
    config::Config,
    database::{
        Database,
        repositories::{ExecutionLogSeaOrmRepository, ScheduledJobSeaOrmRepository},
    },
    job_scheduling::Processor,
    observability::{LogFormat, init_tracing},
    services::HttpContentGenerator,
};

#[derive(Parser)]
#[command(name = "job-processor")]
#[command(version)]
#[command(about = "Runs scheduled content-generation jobs with bounded concurrency")]
#[command(long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "config.toml", env = "CONFIG_FILE")]
    config: String,

    /// Log level
    #[arg(short = 'v', long, default_value = "info")]
    log_level: String,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    /// Database URL (overrides config file)
    #[arg(short = 'd', long, value_name = "URL")]
    database_url: Option<String>,

    /// Content generator base URL (overrides config file)
    #[arg(short = 'g', long, value_name = "URL")]
    generator_url: Option<String>,

    /// Maximum jobs executing at once (overrides config file)
    #[arg(short = 'j', long, value_name = "N")]
    max_concurrent_jobs: Option<usize>,

    /// Run a single tick, wait for its jobs and exit
    #[arg(long)]
    once: bool,

    /// Write the default configuration to --config and exit
    #[arg(long)]
    write_default_config: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_tracing(&cli.log_level, cli.log_format)?;

    if cli.write_default_config {
        return Config::write_default(&cli.config);
    }

    info!("Starting job processor v{}", env!("CARGO_PKG_VERSION"));

    let mut config = Config::load_from_file(&cli.config)?;
    if let Some(database_url) = cli.database_url {
        config.database.url = database_url;
    }
    if let Some(generator_url) = cli.generator_url {
        config.generator.base_url = generator_url;
    }
    if let Some(max_concurrent_jobs) = cli.max_concurrent_jobs {
        config.processor.max_concurrent_jobs = max_concurrent_jobs;
    }
    config.validate()?;

    let database = Database::new(&config.database).await?;
    database.migrate().await?;
    info!("Database connection established and migrations applied");

    let job_store = Arc::new(ScheduledJobSeaOrmRepository::new(
        database.connection(),
        config.retention.execution_logs,
    ));
    let log_store = Arc::new(ExecutionLogSeaOrmRepository::new(database.connection()));
    let generator = Arc::new(HttpContentGenerator::new(&config.generator)?);
    info!("Content generator endpoint: {}", generator.url());

    let processor = Processor::new(config.processor.clone(), job_store, log_store, generator)?;

    if cli.once {
        let report = processor.scheduler().tick().await;
        info!("Single tick finished: {:?}", report);
        processor.stop().await;
        return Ok(());
    }

    processor.start();
    wait_for_shutdown_signal().await?;

    let report = processor.stop().await;
    if !report.graceful {
        warn!(
            "Exited with {} jobs still running; their log entries will be reconciled by a later sweep",
            report.remaining_jobs.len()
        );
    }
    Ok(())
}

async fn wait_for_shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;

        tokio::select! {
            _ = sigterm.recv() => info!("Received SIGTERM, shutting down gracefully"),
            _ = sigint.recv() => info!("Received SIGINT (Ctrl+C), shutting down gracefully"),
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        info!("Received Ctrl+C, shutting down gracefully");
    }

    Ok(())
}
