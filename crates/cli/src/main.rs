use crate::{
    commands::Commands,
    error::CliError,
    output::JobStatusView,
    shutdown::{ExitCode, ShutdownCoordinator},
};
use clap::Parser;
use engine_core::state::{JobExecutionStore, sled_store::SledJobStore};
use std::{
    path::{Path, PathBuf},
    sync::Arc,
};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod commands;
mod error;
mod job;
mod output;
mod shutdown;

#[derive(Parser, Debug)]
#[command(name = "ferry", version = "0.1.0", about = "Chunked, resumable record transfer")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();

    let shutdown = ShutdownCoordinator::new(CancellationToken::new());
    shutdown.register_handlers();

    let code = match execute(cli.command, &shutdown).await {
        Ok(()) => ExitCode::Success,
        Err(err) if err.is_shutdown() || shutdown.is_shutdown_requested() => {
            info!("Stopped on request: {err}");
            ExitCode::ShutdownRequested
        }
        Err(err) => {
            error!("{err}");
            ExitCode::GeneralError
        }
    };

    std::process::exit(code.as_i32());
}

async fn execute(command: Commands, shutdown: &ShutdownCoordinator) -> Result<(), CliError> {
    match command {
        Commands::RunJob(args) => {
            let store = open_state_store(args.state_dir.as_deref())?;
            let report = job::run_job(&args, store, shutdown.cancel_token()).await?;
            output::print_report(&report);
        }
        Commands::Status {
            job_id,
            json,
            state_dir,
        } => {
            let store = open_state_store(state_dir.as_deref())?;
            let view = JobStatusView {
                checkpoint: store.load(&job_id).await?,
                runs: store.runs(&job_id).await?,
                job_id,
            };
            output::print_status(&view, json)?;
        }
        Commands::Reset { job_id, state_dir } => {
            let store = open_state_store(state_dir.as_deref())?;
            store.clear(&job_id).await?;
            info!(job_id = %job_id, "Cleared checkpoint and run history");
        }
    }

    Ok(())
}

fn default_state_dir() -> Result<PathBuf, CliError> {
    let home = dirs::home_dir()
        .ok_or_else(|| CliError::Unexpected("Could not determine home directory".into()))?;
    Ok(home.join(".ferry/state"))
}

fn open_state_store(state_dir: Option<&Path>) -> Result<Arc<dyn JobExecutionStore>, CliError> {
    let path = match state_dir {
        Some(dir) => dir.to_path_buf(),
        None => default_state_dir()?,
    };
    let store = SledJobStore::open(&path).map_err(|err| {
        CliError::Unexpected(format!(
            "Failed to open state store at {}: {err}",
            path.display()
        ))
    })?;
    Ok(Arc::new(store))
}
