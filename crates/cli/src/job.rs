use crate::{commands::RunJobArgs, error::CliError};
use connectors::{
    file::csv::{settings::CsvSettings, source::CsvRecordSource},
    sink::{TableMapping, open_writer},
};
use engine_config::settings::{
    JobSettings, WritePolicy, validated::ValidatedSettings, validator::SettingsValidator,
};
use engine_core::state::JobExecutionStore;
use engine_processing::{
    listener::SinkVerificationListener,
    orchestrator::{ChunkOrchestrator, JobReport, OrchestratorConfig},
    state_manager::StateManager,
    transform::pipeline::TransformPipeline,
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Fields of the people file when neither flags nor config name any.
const DEFAULT_FIELDS: [&str; 2] = ["firstName", "lastName"];

/// Rows read back by the verification listener after a completed run.
const VERIFY_SAMPLE: usize = 100;

/// Job settings from `--config` (if any) with command-line flags applied on top.
pub fn build_settings(args: &RunJobArgs) -> Result<JobSettings, CliError> {
    let mut settings = match &args.config {
        Some(path) => {
            let settings = JobSettings::from_json_file(path)?;
            if settings.job_id != args.job_id {
                warn!(
                    config_job_id = %settings.job_id,
                    job_id = %args.job_id,
                    "--job-id overrides the job_id in the config file"
                );
            }
            settings
        }
        None => JobSettings::new(&args.job_id, &DEFAULT_FIELDS),
    };

    settings.job_id = args.job_id.clone();
    if let Some(chunk_size) = args.chunk_size {
        settings.chunk_size = chunk_size;
    }
    if let Some(table) = &args.table {
        settings.table = table.clone();
    }
    if let Some(fields) = &args.fields {
        settings.field_names = fields.clone();
    }
    if let Some(delimiter) = args.delimiter {
        settings.delimiter = delimiter;
    }
    if args.header {
        settings.has_header = true;
    }
    if let Some(policy) = args.on_transform_error {
        settings.on_transform_error = policy.into();
    }
    if let Some(policy) = args.on_read_error {
        settings.on_read_error = policy.into();
    }
    if let Some(limit) = args.skip_limit {
        settings.skip_limit = Some(limit);
    }
    if let Some(retries) = args.write_retries {
        settings.on_write_error = match retries {
            0 => WritePolicy::Abort,
            n => WritePolicy::Retry(n),
        };
    }

    Ok(settings)
}

fn table_mapping(settings: &ValidatedSettings) -> TableMapping {
    TableMapping::new(
        &settings.table,
        settings.field_names.clone(),
        settings.columns.clone(),
    )
    .with_create_table(settings.create_table)
}

/// Records a FAILED run for a job whose input or sink could not be opened,
/// so the attempt appears in its history.
async fn record_open_failure(job_id: &str, store: Arc<dyn JobExecutionStore>, message: String) {
    let state = StateManager::new(job_id, store);
    match state.begin_run().await {
        Ok(_) => {
            state.finish_failed(message).await;
        }
        Err(err) => warn!(job_id, error = %err, "Failed to record run failure"),
    }
}

/// Validates settings, opens input and sink, and runs the job to completion
/// or failure.
pub async fn run_job(
    args: &RunJobArgs,
    store: Arc<dyn JobExecutionStore>,
    cancel: CancellationToken,
) -> Result<JobReport, CliError> {
    let settings = SettingsValidator::validate(&build_settings(args)?)?;

    let csv = CsvSettings::new(settings.field_names.clone())
        .with_delimiter(settings.delimiter)
        .with_header(settings.has_header);
    let source = match CsvRecordSource::open(&args.input, csv) {
        Ok(source) => source,
        Err(err) => {
            let message = format!("SourceReadError: {err}");
            record_open_failure(&settings.job_id, store, message).await;
            return Err(err.into());
        }
    };
    let writer = match open_writer(&args.sink, table_mapping(&settings)).await {
        Ok(writer) => writer,
        Err(err) => {
            let message = format!("WriteError: {err}");
            record_open_failure(&settings.job_id, store, message).await;
            return Err(err.into());
        }
    };

    info!(
        job_id = %settings.job_id,
        input = %args.input.display(),
        sink = %writer.describe(),
        chunk_size = settings.chunk_size,
        "Starting job"
    );

    let mut orchestrator = ChunkOrchestrator::new(
        OrchestratorConfig::from(&settings),
        Box::new(source),
        Arc::new(TransformPipeline::from_rules(&settings.transform)),
        writer.clone(),
        store,
    )
    .with_listener(Arc::new(SinkVerificationListener::new(writer, VERIFY_SAMPLE)))
    .with_cancellation(cancel);

    Ok(orchestrator.run().await?)
}
