//! rowcast - S3 CSV to Kafka producer

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::{info, Level};

use rowcast_common::logging::{init_logging, LogConfig};
use rowcast_producer::broker::KafkaBroker;
use rowcast_producer::storage::S3Store;
use rowcast_producer::{PollLoop, ProducerConfig};

#[derive(Parser, Debug)]
#[command(name = "rowcast")]
#[command(author, version, about = "Publish rows of S3 CSV files to Kafka as Avro messages")]
struct Cli {
    /// Load environment from this file instead of ./.env
    #[arg(long, env = "ROWCAST_ENV_FILE")]
    env_file: Option<PathBuf>,

    /// Run a single poll cycle and exit
    #[arg(long)]
    once: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = ProducerConfig::load(cli.env_file.as_deref()).context("Failed to load configuration")?;

    let log_level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let log_config = LogConfig::default()
        .with_level(log_level)
        .with_file_prefix("rowcast")
        .with_filter("aws_smithy_runtime=warn,aws_config=warn,hyper=warn")
        .merge_env()?;
    let _guard = init_logging(&log_config)?;

    info!(
        bucket = %config.storage.bucket,
        prefix = %config.source.prefix,
        topic = %config.kafka.topic,
        chunk_size = config.pipeline.chunk_size,
        "Starting rowcast producer"
    );

    let store = S3Store::new(config.storage.clone());
    let broker = KafkaBroker::new(&config.kafka).context("Failed to create Kafka producer")?;
    let mut poll = PollLoop::from_config(&config, Box::new(store), Box::new(broker))
        .context("Failed to initialize pipeline")?;

    if cli.once {
        let report = poll.run_cycle().await;
        info!(
            files = report.processed(),
            delivered = report.delivered,
            dropped = report.dropped,
            "Single cycle complete"
        );
        return Ok(());
    }

    tokio::select! {
        _ = poll.run() => {},
        result = tokio::signal::ctrl_c() => {
            result.context("Failed to listen for shutdown signal")?;
            info!("Shutdown signal received, stopping");
        },
    }

    Ok(())
}
