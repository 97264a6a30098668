//! SoS Upload - granule transfer and CNM notification tool

use anyhow::{Context, Result};
use clap::Parser;
use sos_common::logging::{init_logging, LogConfig, LogLevel};
use sos_upload::attrs::HeaderScanReader;
use sos_upload::config::PipelineConfig;
use sos_upload::credentials::fetch_archive_credentials;
use sos_upload::event::UploadEvent;
use sos_upload::pipeline::Pipeline;
use sos_upload::publisher::SnsNotifier;
use sos_upload::storage::S3Store;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "sos-upload")]
#[command(author, version, about = "Upload SoS granules to PO.DAAC and publish CNM notifications")]
struct Cli {
    /// Path to the invocation event JSON
    #[arg(short, long)]
    event: PathBuf,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let start = Instant::now();

    let log_level = if cli.verbose {
        LogLevel::Debug
    } else {
        LogLevel::Info
    };

    // Environment variables take precedence over the verbose flag
    let log_config =
        LogConfig::from_env(LogConfig::new(log_level)).unwrap_or_else(|_| LogConfig::new(log_level));

    if let Err(err) = init_logging(&log_config) {
        eprintln!("Failed to initialize logging: {err}");
        std::process::exit(1);
    }

    if let Err(err) = run(&cli).await {
        error!(error = %err, "Pipeline invocation failed");
        std::process::exit(1);
    }

    info!("Execution time: {:?}", start.elapsed());
}

async fn run(cli: &Cli) -> Result<()> {
    let raw = std::fs::read_to_string(&cli.event)
        .with_context(|| format!("Failed to read event file {}", cli.event.display()))?;
    let event = UploadEvent::from_json(&raw)?;

    let config = PipelineConfig::from_env()?;
    info!(
        collection = %config.collection,
        publish_only = event.publish_only,
        files = event.file_list.len(),
        "Starting SoS upload invocation"
    );

    let shared = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(aws_config::Region::new(config.region.clone()))
        .load()
        .await;
    let ssm = aws_sdk_ssm::Client::new(&shared);
    let sns = aws_sdk_sns::Client::new(&shared);

    let credentials = fetch_archive_credentials(
        &ssm,
        &config.archive_key_parameter,
        &config.archive_secret_parameter,
    )
    .await?;

    let source = S3Store::from_environment(&config.region).await;
    let archive = S3Store::with_credentials(
        &config.region,
        &credentials.access_key,
        &credentials.secret_key,
    );
    let notifier = SnsNotifier::new(sns, ssm, config.topic_parameter.as_str());

    let pipeline = Pipeline::new(
        config,
        Arc::new(source),
        Arc::new(archive),
        Arc::new(notifier),
        Arc::new(HeaderScanReader),
    );

    let report = pipeline.run(&event).await?;

    for name in &report.uploaded {
        info!(file = %name, "Uploaded SoS file");
    }
    for identifier in &report.published {
        info!(identifier = %identifier, "Published granule notification");
    }
    info!(
        staged = report.staged,
        uploaded = report.uploaded.len(),
        published = report.published.len(),
        skipped = report.skipped_incomplete.len(),
        "Invocation complete"
    );

    Ok(())
}
