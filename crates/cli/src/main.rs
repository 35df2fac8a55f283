use crate::{
    conn::{ConnectionKind, ConnectionPinger, MySqlConnectionPinger, PostgresConnectionPinger},
    env::EnvManager,
    error::CliError,
    shutdown::ShutdownCoordinator,
};
use clap::Parser;
use commands::Commands;
use engine_core::config::ProjectConfig;
use engine_processing::ProcessingExecutorFactory;
use engine_runtime::Controller;
use model::execution::variables::Variable;
use model::log::PipelineLog;
use std::{process, str::FromStr};
use tokio_util::sync::CancellationToken;
use tracing::{Level, info};

mod commands;
mod conn;
mod env;
mod error;
mod output;
mod shutdown;

#[derive(Parser)]
#[command(name = "stratum-engine", version = "0.0.1", about = "ETL pipeline execution engine")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt().with_max_level(Level::INFO).init();

    let exit_code = match run_cli().await {
        Ok(()) => 0,
        Err(e) => {
            tracing::error!("Application error: {}", e);
            1
        }
    };

    process::exit(exit_code);
}

async fn run_cli() -> Result<(), CliError> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run { config, run_id, log_dir, output, env_file } => {
            run_pipeline(&config, run_id, log_dir, output, env_file).await
        }
        Commands::Status { pipeline_id, log_dir } => show_status(&pipeline_id, &log_dir).await,
        Commands::TestConn { format, conn_str } => test_conn(&format, conn_str).await,
    }
}

async fn run_pipeline(
    config_path: &str,
    run_id: Option<String>,
    log_dir: String,
    output: Option<String>,
    env_file: Option<String>,
) -> Result<(), CliError> {
    let mut config = ProjectConfig::load(config_path)?;
    if let Some(path) = env_file {
        let mut env = EnvManager::empty();
        env.load_from_file(&path)?;
        for (name, value) in env.all() {
            config.variables.push(Variable { name: name.clone(), value: value.clone(), kind: None });
        }
    }
    let run_id = run_id.unwrap_or_else(|| config.project_id.clone());
    let project_id = config.project_id.clone();

    let controller = Controller::new(log_dir);
    let shutdown = ShutdownCoordinator::new(CancellationToken::new());
    shutdown.register_handlers();
    let stop_project_id = project_id.clone();
    let stop_controller = controller.clone();
    let stop_signal = shutdown.cancel_token();
    tokio::spawn(async move {
        stop_signal.cancelled().await;
        info!(project_id = %stop_project_id, "shutdown requested, stopping active pipeline");
        stop_controller
            .stop(&stop_project_id, "shutdown signal received")
            .await
            .ok();
    });

    let log = controller.run(run_id, config, &ProcessingExecutorFactory).await?;

    match output {
        Some(path) => output::write_report(&log, path).await?,
        None => output::print_summary_table(&log),
    }

    Ok(())
}

async fn show_status(pipeline_id: &str, log_dir: &str) -> Result<(), CliError> {
    let path = std::path::Path::new(log_dir).join(format!("pipeline_{pipeline_id}.json"));
    let text = tokio::fs::read_to_string(&path)
        .await
        .map_err(|_| CliError::NoSuchPipeline(pipeline_id.to_string()))?;
    let log: PipelineLog = serde_json::from_str(&text).map_err(CliError::JsonSerialize)?;
    output::print_report(&log).await
}

async fn test_conn(format: &str, conn_str: String) -> Result<(), CliError> {
    let kind = ConnectionKind::from_str(format).map_err(|_| CliError::InvalidConnectionFormat(format.to_string()))?;
    match kind {
        ConnectionKind::MySql => MySqlConnectionPinger { conn_str }.ping().await,
        ConnectionKind::Postgres => PostgresConnectionPinger { conn_str }.ping().await,
    }
}
