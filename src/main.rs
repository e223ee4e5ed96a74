//! Fuel Price Inference - Main Entry Point
//!
//! Reads fuel price CSV files, runs the selected pre-trained regressor over
//! each one and writes one JSON report per file to stdout.

use anyhow::{bail, Result};
use clap::Parser;
use fuel_price_inference::{
    config::AppConfig,
    dataset_reader::DatasetReader,
    metrics::PipelineMetrics,
    models::InferenceEngine,
    report_writer::ReportWriter,
    types::ModelId,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tracing::{error, info, info_span, warn};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

#[derive(Parser, Debug)]
#[command(name = "fuel-price-inference", version, about = "Predict fuel sale prices from collection CSV files")]
struct Args {
    /// Model to run: knn_model, lr_model or dt_model
    #[arg(short, long)]
    model: String,

    /// Configuration file (defaults to config/config.toml when present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Write each report on a single line
    #[arg(long)]
    compact: bool,

    /// CSV files to score
    #[arg(required = true)]
    files: Vec<PathBuf>,
}

fn init_logging(config: &AppConfig) -> Result<()> {
    let filter = EnvFilter::from_default_env()
        .add_directive(format!("fuel_price_inference={}", config.logging.level).parse()?);

    // Logs go to stderr so stdout only carries reports.
    if config.logging.format == "json" {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => AppConfig::load_from_path(path)?,
        None => AppConfig::load()?,
    };
    init_logging(&config)?;

    info!("Starting Fuel Price Inference");
    info!(
        model = %args.model,
        files = args.files.len(),
        workers = config.pipeline.workers,
        "Configuration loaded successfully"
    );

    if let Err(e) = args.model.parse::<ModelId>() {
        warn!(error = %e, "Unknown model, every file will be rejected");
    }

    ort::init().with_name("fuel-price-inference").commit()?;

    let reader = Arc::new(DatasetReader::from_config(&config.csv)?);
    let engine = Arc::new(InferenceEngine::new(&config));
    let metrics = Arc::new(PipelineMetrics::new());
    let writer = ReportWriter::new(std::io::stdout(), !args.compact);

    // Semaphore to limit concurrent requests
    let semaphore = Arc::new(Semaphore::new(config.pipeline.workers.max(1)));

    let tasks = args.files.into_iter().map(|path| {
        let engine = engine.clone();
        let reader = reader.clone();
        let metrics = metrics.clone();
        let semaphore = semaphore.clone();
        let model_id = args.model.clone();

        tokio::spawn(async move {
            let _permit = semaphore.acquire_owned().await?;
            let request_id = Uuid::new_v4().to_string();
            let source = path.display().to_string();

            let payload = tokio::task::spawn_blocking({
                let request_id = request_id.clone();
                let source = source.clone();
                move || {
                    let span = info_span!("request", request_id = %request_id, source = %source);
                    let _enter = span.enter();

                    let start_time = Instant::now();
                    let payload = engine.run_path(&reader, &path, &model_id);
                    metrics.record_request(start_time.elapsed(), &payload);
                    payload
                }
            })
            .await?;

            Ok::<_, anyhow::Error>((source, request_id, payload))
        })
    });

    let outcomes = futures::future::join_all(tasks).await;

    let mut failed = 0usize;
    let total = outcomes.len();
    for outcome in outcomes {
        match outcome {
            Ok(Ok((source, request_id, payload))) => {
                if !payload.is_success() {
                    failed += 1;
                }
                writer.publish(&source, &request_id, &payload)?;
            }
            Ok(Err(e)) => {
                failed += 1;
                error!(error = %e, "Request aborted");
            }
            Err(e) => {
                failed += 1;
                error!(error = %e, "Request task panicked");
            }
        }
    }

    info!("Pipeline shutting down...");
    metrics.print_summary();

    if failed > 0 {
        bail!("{} of {} requests failed", failed, total);
    }

    Ok(())
}
