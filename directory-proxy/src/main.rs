use clap::{Args, Parser};
use metrics_exporter_statsd::StatsdBuilder;
use save_proxy::config::Secrets;
use std::path::PathBuf;
use std::process::{self, ExitCode};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

mod config;

use config::{Config, LoggingConfig, MetricsConfig};

const METRICS_PREFIX: &str = "directory_proxy";

#[derive(Parser)]
#[command(version, about = "Authenticated save endpoint for the directory JSON file")]
enum CliCommand {
    /// Serve the save endpoint and the health probe
    Run(CommandArgs),
    /// Load and validate the config file, then exit
    CheckConfig(CommandArgs),
}

#[derive(Args)]
struct CommandArgs {
    /// YAML config file; built-in defaults are used when omitted
    #[arg(long)]
    config_file_path: Option<PathBuf>,
}

fn load_config(args: &CommandArgs) -> Config {
    let Some(path) = &args.config_file_path else {
        return Config::default();
    };

    match Config::from_file(path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load config from {}: {e}", path.display());
            process::exit(1);
        }
    }
}

fn init_sentry(logging: &LoggingConfig) -> sentry::ClientInitGuard {
    sentry::init((
        logging.sentry_dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    ))
}

fn init_logging(logging: Option<&LoggingConfig>) -> Option<sentry::ClientInitGuard> {
    let sentry_guard = logging.map(init_sentry);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_guard.as_ref().map(|_| sentry::integrations::tracing::layer()))
        .init();

    sentry_guard
}

fn init_metrics(metrics_config: &MetricsConfig) {
    let recorder = StatsdBuilder::from(
        metrics_config.statsd_host.clone(),
        metrics_config.statsd_port,
    )
    .build(Some(METRICS_PREFIX));

    match recorder {
        Ok(recorder) => {
            if let Err(e) = metrics::set_global_recorder(recorder) {
                tracing::error!("could not install metrics recorder: {e}");
            }
        }
        Err(e) => tracing::error!("could not build statsd recorder: {e}"),
    }
}

#[derive(thiserror::Error, Debug)]
enum ServeError {
    #[error("could not start runtime: {0}")]
    Runtime(#[from] std::io::Error),
    #[error("save proxy exited: {0}")]
    Proxy(#[from] save_proxy::SaveProxyError),
}

fn serve(config: Config, secrets: Secrets) -> Result<(), ServeError> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(save_proxy::run(config.proxy, secrets))?;
    Ok(())
}

fn main() -> ExitCode {
    let cli = CliCommand::parse();

    match cli {
        CliCommand::CheckConfig(args) => {
            load_config(&args);
            println!("Config is valid");
            ExitCode::SUCCESS
        }
        CliCommand::Run(args) => {
            let config = load_config(&args);
            let sentry_guard = init_logging(config.common.logging.as_ref());
            if let Some(metrics_config) = &config.common.metrics {
                init_metrics(metrics_config);
            }

            let secrets = Secrets::from_env();
            tracing::info!(?secrets, "loaded secrets");

            let result = serve(config, secrets);
            if let Err(e) = &result {
                tracing::error!("{e}");
            }
            // Flushes queued Sentry events, including the error above.
            drop(sentry_guard);

            match result {
                Ok(()) => ExitCode::SUCCESS,
                Err(_) => ExitCode::FAILURE,
            }
        }
    }
}
