use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use icbg_config::{Config, ConfigLoader, DEFAULT_CONFIG_PATH};
use icbg_core::{DispatchEngine, EngineBuilder};
use icbg_service::api;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "icbg")]
#[command(about = "Gift dispatch service", long_about = None)]
struct Cli {
	#[command(subcommand)]
	command: Option<Commands>,

	#[arg(short, long, value_name = "FILE", env = "CONFIG_FILE", default_value = DEFAULT_CONFIG_PATH)]
	config: PathBuf,

	/// Log level, defaults to `[service].log_level`
	#[arg(long)]
	log_level: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
	/// Start the HTTP service
	Start,
	/// Validate the configuration file
	Validate,
}

#[tokio::main]
async fn main() -> Result<()> {
	let cli = Cli::parse();

	let config = load_config(&cli).await?;
	setup_tracing(effective_log_level(
		cli.log_level.as_deref(),
		&config.service.log_level,
	))?;

	match cli.command {
		Some(Commands::Start) | None => start_service(cli, config).await,
		Some(Commands::Validate) => validate_config(cli, config).await,
	}
}

/// The command-line flag wins over the configured level.
fn effective_log_level<'a>(flag: Option<&'a str>, configured: &'a str) -> &'a str {
	flag.filter(|level| !level.is_empty()).unwrap_or(configured)
}

async fn load_config(cli: &Cli) -> Result<Config> {
	ConfigLoader::new()
		.with_file(&cli.config)
		.load()
		.await
		.context("Failed to load configuration")
}

async fn build_engine(config: Config) -> Result<DispatchEngine> {
	EngineBuilder::new(config)
		.build()
		.await
		.context("Failed to build dispatch engine")
}

async fn start_service(cli: Cli, config: Config) -> Result<()> {
	info!(config = %cli.config.display(), "Starting icbg service");

	let host = config.service.http_host.clone();
	let port = config.service.http_port;
	let engine = Arc::new(build_engine(config).await?);

	let http_handle = tokio::spawn(async move {
		if let Err(e) = api::start_http_server(engine, host, port).await {
			error!(error = %e, "HTTP server stopped");
		}
	});

	setup_shutdown_signal().await;
	info!("Shutdown signal received, stopping service");

	http_handle.abort();
	info!("icbg service stopped");
	Ok(())
}

async fn validate_config(cli: Cli, config: Config) -> Result<()> {
	info!(config = %cli.config.display(), "Validating configuration");

	let storage = config.storage.backend.clone();
	let agent = config.agent.implementation.clone();
	let engine = build_engine(config).await?;

	info!(
		name = %engine.config().service.name,
		storage = %storage,
		agent = %agent,
		products = engine.catalog().len(),
		"Configuration is valid"
	);
	Ok(())
}

fn setup_tracing(log_level: &str) -> Result<()> {
	let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
		.or_else(|_| tracing_subscriber::EnvFilter::try_new(log_level))
		.context("Invalid log level")?;

	tracing_subscriber::registry()
		.with(env_filter)
		.with(tracing_subscriber::fmt::layer())
		.init();

	Ok(())
}

async fn setup_shutdown_signal() {
	let ctrl_c = async {
		if let Err(e) = signal::ctrl_c().await {
			error!(error = %e, "Failed to listen for Ctrl+C");
			std::future::pending::<()>().await;
		}
	};

	#[cfg(unix)]
	let terminate = async {
		match signal::unix::signal(signal::unix::SignalKind::terminate()) {
			Ok(mut stream) => {
				stream.recv().await;
			}
			Err(e) => {
				error!(error = %e, "Failed to install SIGTERM handler");
				std::future::pending::<()>().await;
			}
		}
	};

	#[cfg(not(unix))]
	let terminate = std::future::pending::<()>();

	tokio::select! {
		_ = ctrl_c => {},
		_ = terminate => {},
	}
}
