use connectors::sink::SinkError;
use engine_core::retry::RetryDisposition;
use tokio_postgres::{Error as PgError, error::SqlState};

/// Decides whether a failed chunk write is worth another attempt.
///
/// Ledger conflicts, schema problems and constraint violations fail the same
/// way every time; everything else is treated as transient.
pub fn classify_sink_error(err: &SinkError) -> RetryDisposition {
    if err.is_permanent() {
        return RetryDisposition::Stop;
    }
    match err {
        SinkError::Postgres(pg_err) => classify_pg_error(pg_err),
        _ => RetryDisposition::Retry,
    }
}

fn classify_pg_error(err: &PgError) -> RetryDisposition {
    if err.is_closed() {
        return RetryDisposition::Retry;
    }

    match err.code() {
        Some(code) if is_permanent_pg_code(code) => RetryDisposition::Stop,
        _ => RetryDisposition::Retry,
    }
}

fn is_permanent_pg_code(code: &SqlState) -> bool {
    // Class 22: data exception, 23: integrity constraint violation,
    // 42: syntax error or access rule violation.
    let class = &code.code()[..2];
    matches!(class, "22" | "23" | "42")
}
