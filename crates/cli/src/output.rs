use crate::error::CliError;
use engine_core::state::models::{Checkpoint, JobRun};
use engine_processing::orchestrator::JobReport;
use serde::Serialize;

/// What `status` shows for one job.
#[derive(Debug, Serialize)]
pub struct JobStatusView {
    pub job_id: String,
    pub checkpoint: Option<Checkpoint>,
    pub runs: Vec<JobRun>,
}

pub fn print_report(report: &JobReport) {
    println!("Job '{}' run {}: {}", report.job_id, report.run_number, report.status);
    println!("-----------------------------");
    println!("{:<22} {}", "Chunks committed", report.chunks_committed);
    println!("{:<22} {}", "Chunks already applied", report.chunks_already_applied);
    println!("{:<22} {}", "Records read", report.records_read);
    println!("{:<22} {}", "Records written", report.records_written);
    println!("{:<22} {}", "Records skipped", report.records_skipped);
    println!("{:<22} {}", "Records filtered", report.records_filtered);
    println!("{:<22} {}", "Write retries", report.retry_count);
    println!("{:<22} {}", "Last chunk", report.last_chunk_sequence);
    println!("{:<22} {}", "Cursor", report.cursor);
}

pub fn print_status(view: &JobStatusView, as_json: bool) -> Result<(), CliError> {
    if as_json {
        println!("{}", serde_json::to_string_pretty(view)?);
        return Ok(());
    }

    println!("Status for job '{}':", view.job_id);
    println!("-----------------------------");
    match &view.checkpoint {
        Some(cp) => {
            println!("{:<16} {}", "Last chunk", cp.last_committed_chunk_sequence);
            println!("{:<16} {}", "Cursor", cp.source_cursor);
            println!("{:<16} {}", "Rows written", cp.rows_written);
            println!("{:<16} {}", "Updated", cp.updated_at.to_rfc3339());
        }
        None => println!("{:<16} none", "Checkpoint"),
    }

    if view.runs.is_empty() {
        println!("No runs recorded");
        return Ok(());
    }

    println!();
    println!("{:<6} {:<10} {:<26} {:<26} Message", "Run", "Status", "Started", "Finished");
    for run in &view.runs {
        let finished = run
            .finished_at
            .map(|ts| ts.to_rfc3339())
            .unwrap_or_else(|| "n/a".to_string());
        println!(
            "{:<6} {:<10} {:<26} {:<26} {}",
            run.run_number,
            run.status,
            run.started_at.to_rfc3339(),
            finished,
            run.exit_message.as_deref().unwrap_or("")
        );
    }
    Ok(())
}
