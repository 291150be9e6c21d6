//! COVID-19 X-Ray Detection Server
//!
//! HTTP API for operator sessions: upload a chest X-ray, analyze it and
//! download PDF reports.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};

use covid_xray::backend::{backend_name, default_device, DefaultBackend};
use covid_xray::inference::BurnClassifier;
use covid_xray::report::DEFAULT_ATTRIBUTION;
use covid_xray::server::{serve, ServerConfig};
use covid_xray::utils::logging::{init_logging, LogConfig, LogLevel};

/// COVID-19 X-Ray Detection Server
#[derive(Parser, Debug)]
#[command(name = "covid_xray_server")]
#[command(version)]
#[command(about = "HTTP API for chest X-ray classification and PDF reports")]
struct Cli {
    /// Port to listen on
    #[arg(short, long, default_value = "8080", env = "COVID_XRAY_PORT")]
    port: u16,

    /// Host to bind to
    #[arg(long, default_value = "0.0.0.0", env = "COVID_XRAY_HOST")]
    host: String,

    /// Trained model path (with or without .mpk)
    #[arg(short, long, default_value = "output/models/covid_model", env = "COVID_XRAY_MODEL")]
    model: PathBuf,

    /// Directory for generated reports
    #[arg(long, default_value = "reports", env = "COVID_XRAY_REPORTS_DIR")]
    reports_dir: PathBuf,

    /// Attribution line printed on reports
    #[arg(long, default_value = DEFAULT_ATTRIBUTION, env = "COVID_XRAY_ATTRIBUTION")]
    attribution: String,

    /// Largest accepted upload in megabytes
    #[arg(long, default_value = "20", env = "COVID_XRAY_MAX_UPLOAD_MB")]
    max_upload_mb: usize,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "COVID_XRAY_LOG_LEVEL")]
    log_level: String,

    /// Enable debug logging with targets and thread ids
    #[arg(short, long, default_value = "false")]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_config = if cli.verbose {
        LogConfig::verbose()
    } else {
        LogConfig::server().with_level(LogLevel::parse(&cli.log_level))
    };
    init_logging(&log_config).map_err(anyhow::Error::msg)?;

    let config = ServerConfig {
        host: cli.host,
        port: cli.port,
        model_path: cli.model,
        reports_dir: cli.reports_dir,
        attribution: cli.attribution,
        max_upload_bytes: cli.max_upload_mb * 1024 * 1024,
    };

    info!("COVID-19 X-Ray Detection Server v{}", covid_xray::VERSION);
    info!("Configuration:");
    info!("  Backend:     {}", backend_name());
    info!("  Model:       {:?}", config.model_path);
    info!("  Reports dir: {:?}", config.reports_dir);

    let classifier =
        match BurnClassifier::<DefaultBackend>::load(&config.model_path, &default_device()) {
            Ok(classifier) => classifier,
            Err(e) if e.is_fatal() => {
                error!("{}", e);
                error!("Train a model first with: covid_xray train --data-dir <dataset>");
                return Err(e.into());
            }
            Err(e) => return Err(e.into()),
        };

    serve(config, Arc::new(classifier)).await?;
    Ok(())
}
