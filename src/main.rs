//! ==============================================================================
//! main.rs - forecaster command line entry point
//! ==============================================================================
//!
//! subcommands:
//!     align    raw sensor csv -> aligned training csv (features + target)
//!     train    raw sensor csv -> forecast_model.json + anomaly_model.json
//!     predict  one request json on stdin -> one response json on stdout
//!     serve    http api over the same inference service
//!
//! architecture:
//!
//!     sensor log.csv
//!          │
//!          ▼
//!     ┌──────────┐   ┌────────────┐   ┌─────────────┐   ┌──────────┐
//!     │ dataset  │──▶│   align    │──▶│  training   │──▶│  store   │
//!     │ (parse)  │   │ (t + 5min) │   │ (fit, eval) │   │  (json)  │
//!     └──────────┘   └────────────┘   └─────────────┘   └────┬─────┘
//!                                                            │ load once
//!                                                            ▼
//!                              stdin / POST /predict ──▶ ┌───────────┐
//!                                                        │ inference │
//!                                                        └───────────┘
//!
//! logs go to stderr so `predict` output can be piped.
//!
//! ==============================================================================

use std::io::Read;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use greenhouse_forecaster::config::{ForecasterConfig, LoggingConfig};
use greenhouse_forecaster::{dataset, server, store, training, InferenceService, TimeAligner};

#[derive(Parser)]
#[command(name = "forecaster", version, about = "Greenhouse temperature forecast + anomaly detection")]
struct Cli {
    /// path to forecaster.toml (default: config/forecaster.toml, ../config/forecaster.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Write the aligned training dataset
    Align {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        output: PathBuf,
    },
    /// Align, fit and persist both models
    Train {
        #[arg(long)]
        input: PathBuf,
    },
    /// Read one inference request from stdin, print the response
    Predict,
    /// Serve the inference api over http
    Serve {
        /// overrides server.bind
        #[arg(long)]
        bind: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // step 1: load configuration
    let config = match &cli.config {
        Some(path) => ForecasterConfig::load(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => ForecasterConfig::load_or_default(),
    };

    // step 2: logging
    init_tracing(&config.logging);
    config.log_summary();

    match cli.command {
        Command::Align { input, output } => align(&config, input, output),
        Command::Train { input } => {
            // cpu-bound; keep it off the async workers
            tokio::task::spawn_blocking(move || train(&config, input))
                .await
                .context("training task panicked")?
        }
        Command::Predict => predict(&config),
        Command::Serve { bind } => serve(&config, bind).await,
    }
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&logging.level));
    let registry = tracing_subscriber::registry().with(filter);

    if logging.json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

fn align(config: &ForecasterConfig, input: PathBuf, output: PathBuf) -> Result<()> {
    let loaded = dataset::load_readings(&input)?;
    let aligner = TimeAligner::try_new(config.alignment.horizon_minutes)?;
    let (rows, report) = aligner.align_loaded(&loaded);

    dataset::write_aligned(&output, &rows, aligner.horizon_minutes())?;
    tracing::info!(
        output = %output.display(),
        rows = report.aligned,
        "aligned dataset written"
    );
    Ok(())
}

fn train(config: &ForecasterConfig, input: PathBuf) -> Result<()> {
    let loaded = dataset::load_readings(&input)?;
    let aligner = TimeAligner::try_new(config.alignment.horizon_minutes)?;
    let (rows, report) = aligner.align_loaded(&loaded);

    let trained = training::train(&rows, report, aligner.horizon_minutes(), &config.training)?;
    let summary = trained.report.clone();
    let (forecast_path, anomaly_path) = store::save(&config.models, trained)?;

    tracing::info!(
        train_rows = summary.train_rows,
        test_rows = summary.test_rows,
        mae = ?summary.mae,
        rmse = ?summary.rmse,
        training_outliers = summary.training_outliers,
        forecast = %forecast_path.display(),
        anomaly = %anomaly_path.display(),
        "training complete"
    );
    Ok(())
}

fn predict(config: &ForecasterConfig) -> Result<()> {
    let service = InferenceService::from_store(&config.models).context("loading models")?;

    let mut body = String::new();
    std::io::stdin()
        .read_to_string(&mut body)
        .context("reading request from stdin")?;

    match service.infer_json(&body) {
        Ok(response) => {
            println!("{}", serde_json::to_string(&response)?);
            Ok(())
        }
        Err(e) => {
            println!("{}", serde_json::json!({ "error": e.to_string() }));
            Err(e.into())
        }
    }
}

async fn serve(config: &ForecasterConfig, bind: Option<String>) -> Result<()> {
    println!("===========================================================");
    println!("  Greenhouse Forecaster - Inference API");
    println!("===========================================================");

    // missing or incompatible artifacts: refuse to start
    let service = match InferenceService::from_store(&config.models) {
        Ok(s) => {
            println!("[STARTUP] ✓ Models loaded from {}", config.models.dir.display());
            s
        }
        Err(e) => {
            eprintln!("[ERROR] Fatal: failed to load models: {}", e);
            return Err(e.into());
        }
    };

    let bind = bind.unwrap_or_else(|| config.server.bind.clone());
    println!("[STARTUP] ✓ Listening on http://{}", bind);
    server::run_server(&bind, service).await
}
