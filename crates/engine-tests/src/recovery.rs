#[cfg(test)]
mod tests {
    use crate::utils::{
        CrashingStore, Fault, FaultyWriter, checked_sqlite_writer, generated_people, ledger_count,
        orchestrator, settings, sqlite_rows, sqlite_writer, validated, write_csv,
        write_generated_csv,
    };
    use connectors::sink::SinkError;
    use engine_config::settings::{JobSettings, WritePolicy};
    use engine_core::{
        error::StoreError,
        state::{
            JobExecutionStore, memory::MemoryJobStore, models::JobStatus,
            sled_store::SledJobStore,
        },
    };
    use engine_processing::error::JobErrorKind;
    use model::pagination::cursor::Cursor;
    use std::{path::Path, sync::Arc};
    use tempfile::tempdir;
    use tokio_util::sync::CancellationToken;
    use tracing_test::traced_test;

    /// Rows an uninterrupted run over `csv` produces.
    async fn reference_rows(dir: &Path, csv: &Path, chunk_size: usize) -> Vec<(String, String)> {
        let db = dir.join("reference.db");
        let settings = validated(&settings("reference", chunk_size));
        orchestrator(
            &settings,
            csv,
            sqlite_writer(&db, &settings),
            Arc::new(MemoryJobStore::new()),
        )
        .run()
        .await
        .unwrap();
        sqlite_rows(&db)
    }

    // Scenario: the third chunk fails to write; the process "restarts" with a reopened store.
    // Expected Outcome: the resumed run ends with the same rows as an uninterrupted run.
    #[traced_test]
    #[tokio::test]
    async fn resume_after_failure_matches_uninterrupted_run() {
        let dir = tempdir().unwrap();
        let csv = write_generated_csv(dir.path(), "people.csv", 25);
        let db = dir.path().join("sink.db");
        let state = dir.path().join("state");
        let settings = validated(&settings("resume", 10));

        {
            let store = Arc::new(SledJobStore::open(&state).unwrap());
            let writer = Arc::new(FaultyWriter::new(
                sqlite_writer(&db, &settings),
                Fault::FailChunk(3),
            ));
            let failure = orchestrator(&settings, &csv, writer, store.clone())
                .run()
                .await
                .unwrap_err();

            assert!(matches!(
                failure.kind,
                JobErrorKind::Write {
                    error: SinkError::Unavailable(_),
                    attempts: 1
                }
            ));
            assert_eq!(failure.chunk_sequence, 3);
            assert_eq!(failure.cursor, Cursor::new(20));
            assert_eq!(sqlite_rows(&db).len(), 20);
        }

        let store = Arc::new(SledJobStore::open(&state).unwrap());
        let cp = store.load("resume").await.unwrap().unwrap();
        assert_eq!(cp.last_committed_chunk_sequence, 2);
        assert_eq!(cp.source_cursor, Cursor::new(20));

        let report = orchestrator(&settings, &csv, sqlite_writer(&db, &settings), store.clone())
            .run()
            .await
            .unwrap();

        assert_eq!(report.run_number, 2);
        assert_eq!(report.chunks_committed, 1);
        assert_eq!(report.records_read, 5);
        assert_eq!(report.rows_written, 25);
        assert_eq!(sqlite_rows(&db), reference_rows(dir.path(), &csv, 10).await);

        let runs = store.runs("resume").await.unwrap();
        assert_eq!(runs[0].status, JobStatus::Failed);
        assert!(runs[0].exit_message.as_deref().unwrap().starts_with("WriteError"));
        assert_eq!(runs[1].status, JobStatus::Completed);
        assert!(logs_contain("Resuming from checkpoint"));
    }

    // Scenario: chunk 2 commits but its checkpoint is never saved.
    // Expected Outcome: the next run replays only chunk 2, which the sink recognises, and no row is duplicated.
    #[tokio::test]
    async fn crash_between_commit_and_checkpoint_replays_one_chunk() {
        let dir = tempdir().unwrap();
        let csv = write_generated_csv(dir.path(), "people.csv", 25);
        let db = dir.path().join("sink.db");
        let store: Arc<dyn JobExecutionStore> = Arc::new(MemoryJobStore::new());
        let settings = validated(&settings("crash", 10));

        let failure = orchestrator(
            &settings,
            &csv,
            sqlite_writer(&db, &settings),
            Arc::new(CrashingStore::new(store.clone(), 2)),
        )
        .run()
        .await
        .unwrap_err();

        assert!(matches!(
            failure.kind,
            JobErrorKind::Store(StoreError::Unavailable(_))
        ));
        assert_eq!(failure.kind.name(), "StoreUnavailable");
        assert_eq!(sqlite_rows(&db).len(), 20);
        let cp = store.load("crash").await.unwrap().unwrap();
        assert_eq!(cp.last_committed_chunk_sequence, 1);

        let report = orchestrator(&settings, &csv, sqlite_writer(&db, &settings), store.clone())
            .run()
            .await
            .unwrap();

        assert_eq!(report.chunks_already_applied, 1);
        assert_eq!(report.chunks_committed, 1);
        assert_eq!(report.records_written, 5);
        assert_eq!(report.rows_written, 25);
        assert_eq!(ledger_count(&db), 3);
        assert_eq!(sqlite_rows(&db), reference_rows(dir.path(), &csv, 10).await);
    }

    // Scenario: the second row of chunk 2 violates a CHECK constraint.
    // Expected Outcome: none of chunk 2 is stored and the constraint error is not retried.
    #[tokio::test]
    async fn failed_chunk_leaves_no_partial_rows() {
        let dir = tempdir().unwrap();
        let csv = write_csv(
            dir.path(),
            "people.csv",
            &[("ann", "lee"), ("bo", "kim"), ("cy", "roe"), ("Xena", "war")],
        );
        let db = dir.path().join("sink.db");
        let settings = validated(&JobSettings {
            on_write_error: WritePolicy::Retry(3),
            retry_backoff_ms: 0,
            ..settings("checked", 2)
        });
        let store = Arc::new(MemoryJobStore::new());

        let failure = orchestrator(&settings, &csv, checked_sqlite_writer(&db, &settings), store.clone())
            .run()
            .await
            .unwrap_err();

        assert!(matches!(
            failure.kind,
            JobErrorKind::Write {
                error: SinkError::Constraint(_),
                attempts: 1
            }
        ));
        assert_eq!(
            sqlite_rows(&db),
            vec![
                ("ANN".to_string(), "LEE".to_string()),
                ("BO".to_string(), "KIM".to_string())
            ]
        );
        assert_eq!(ledger_count(&db), 1);
        let cp = store.load("checked").await.unwrap().unwrap();
        assert_eq!(cp.source_cursor, Cursor::new(2));
    }

    // Scenario: the sink fails twice transiently and the job allows two retries.
    // Expected Outcome: the run completes and the retries are counted.
    #[tokio::test]
    async fn transient_write_failures_are_retried() {
        let dir = tempdir().unwrap();
        let csv = write_generated_csv(dir.path(), "people.csv", 5);
        let db = dir.path().join("sink.db");
        let settings = validated(&JobSettings {
            on_write_error: WritePolicy::Retry(2),
            retry_backoff_ms: 0,
            ..settings("flaky", 10)
        });
        let writer = Arc::new(FaultyWriter::new(
            sqlite_writer(&db, &settings),
            Fault::Transient(2),
        ));

        let report = orchestrator(&settings, &csv, writer.clone(), Arc::new(MemoryJobStore::new()))
            .run()
            .await
            .unwrap();

        assert_eq!(report.retry_count, 2);
        assert_eq!(writer.attempts(), 3);
        assert_eq!(sqlite_rows(&db).len(), 5);
    }

    // Scenario: more transient failures than allowed retries.
    // Expected Outcome: WriteError after 1 + retries attempts, nothing written.
    #[tokio::test]
    async fn write_fails_once_retries_are_exhausted() {
        let dir = tempdir().unwrap();
        let csv = write_generated_csv(dir.path(), "people.csv", 5);
        let db = dir.path().join("sink.db");
        let settings = validated(&JobSettings {
            on_write_error: WritePolicy::Retry(1),
            retry_backoff_ms: 0,
            ..settings("flaky", 10)
        });
        let writer = Arc::new(FaultyWriter::new(
            sqlite_writer(&db, &settings),
            Fault::Transient(5),
        ));

        let failure = orchestrator(&settings, &csv, writer.clone(), Arc::new(MemoryJobStore::new()))
            .run()
            .await
            .unwrap_err();

        assert!(matches!(failure.kind, JobErrorKind::Write { attempts: 2, .. }));
        assert_eq!(writer.attempts(), 2);
        assert!(sqlite_rows(&db).is_empty());
    }

    // Scenario: the job is cancelled after its first chunk, then run again.
    // Expected Outcome: the first run is FAILED "cancelled" with a consistent checkpoint; the second finishes the file.
    #[tokio::test]
    async fn cancelled_run_resumes_cleanly() {
        let dir = tempdir().unwrap();
        let csv = write_generated_csv(dir.path(), "people.csv", 25);
        let db = dir.path().join("sink.db");
        let store = Arc::new(MemoryJobStore::new());
        let settings = validated(&settings("cancel", 10));
        let cancel = CancellationToken::new();

        let writer = Arc::new(
            FaultyWriter::new(sqlite_writer(&db, &settings), Fault::CancelAfter(1))
                .with_cancellation(cancel.clone()),
        );
        let failure = orchestrator(&settings, &csv, writer, store.clone())
            .with_cancellation(cancel)
            .run()
            .await
            .unwrap_err();

        assert!(failure.is_cancelled());
        assert_eq!(failure.cursor, Cursor::new(10));
        assert_eq!(sqlite_rows(&db).len(), 10);

        let runs = store.runs("cancel").await.unwrap();
        assert_eq!(runs[0].status, JobStatus::Failed);
        assert_eq!(runs[0].exit_message.as_deref(), Some("cancelled"));

        let report = orchestrator(&settings, &csv, sqlite_writer(&db, &settings), store.clone())
            .run()
            .await
            .unwrap();
        assert_eq!(report.chunks_committed, 2);
        assert_eq!(sqlite_rows(&db).len(), 25);
    }

    // Scenario: the store is cleared after a completed run and the job runs again.
    // Expected Outcome: every chunk is recognised by the sink, so no row is written twice.
    #[tokio::test]
    async fn rerun_after_reset_does_not_duplicate_rows() {
        let dir = tempdir().unwrap();
        let csv = write_generated_csv(dir.path(), "people.csv", 12);
        let db = dir.path().join("sink.db");
        let store = Arc::new(SledJobStore::open(dir.path().join("state")).unwrap());
        let settings = validated(&settings("reset", 5));

        orchestrator(&settings, &csv, sqlite_writer(&db, &settings), store.clone())
            .run()
            .await
            .unwrap();

        store.clear("reset").await.unwrap();
        assert!(store.load("reset").await.unwrap().is_none());
        assert!(store.runs("reset").await.unwrap().is_empty());

        let report = orchestrator(&settings, &csv, sqlite_writer(&db, &settings), store.clone())
            .run()
            .await
            .unwrap();

        assert_eq!(report.run_number, 1);
        assert_eq!(report.chunks_committed, 0);
        assert_eq!(report.chunks_already_applied, 3);
        assert_eq!(report.rows_written, 12);
        assert_eq!(sqlite_rows(&db).len(), generated_people(12).len());
    }

    // Scenario: a run is left RUNNING by a crashed process.
    // Expected Outcome: the next run closes it as FAILED and gets the next run number.
    #[tokio::test]
    async fn abandoned_run_is_closed_on_next_start() {
        let dir = tempdir().unwrap();
        let csv = write_generated_csv(dir.path(), "people.csv", 3);
        let db = dir.path().join("sink.db");
        let store = Arc::new(SledJobStore::open(dir.path().join("state")).unwrap());
        let settings = validated(&settings("abandoned", 10));

        store.start_run("abandoned").await.unwrap();

        let report = orchestrator(&settings, &csv, sqlite_writer(&db, &settings), store.clone())
            .run()
            .await
            .unwrap();

        assert_eq!(report.run_number, 2);
        let runs = store.runs("abandoned").await.unwrap();
        assert_eq!(runs[0].status, JobStatus::Failed);
        assert!(runs[0].exit_message.as_deref().unwrap().starts_with("abandoned"));
        assert_eq!(runs[1].status, JobStatus::Completed);
    }
}
