#[cfg(test)]
mod tests {
    use crate::utils::{
        PEOPLE, RejectFirstName, generated_people, ledger_count, orchestrator, orchestrator_with,
        settings, sqlite_rows, sqlite_writer, upper, validated, write_csv, write_generated_csv,
    };
    use connectors::sink::ChunkWriter;
    use engine_config::settings::{ErrorPolicy, JobSettings};
    use engine_core::state::{
        JobExecutionStore, memory::MemoryJobStore, models::JobStatus, sled_store::SledJobStore,
    };
    use engine_processing::{
        error::JobErrorKind,
        listener::SinkVerificationListener,
        orchestrator::Phase,
    };
    use model::pagination::cursor::Cursor;
    use std::{fs, sync::Arc};
    use tempfile::tempdir;
    use tracing_test::traced_test;

    // Scenario: three people, chunk size 2.
    // Expected Outcome: two chunks, three uppercase rows, checkpoint at chunk 2 / row 3.
    #[traced_test]
    #[tokio::test]
    async fn three_people_in_two_chunks() {
        let dir = tempdir().unwrap();
        let csv = write_csv(dir.path(), "people.csv", &PEOPLE);
        let db = dir.path().join("sink.db");
        let settings = validated(&settings("people-import", 2));
        let store = Arc::new(SledJobStore::open(dir.path().join("state")).unwrap());

        let mut job = orchestrator(&settings, &csv, sqlite_writer(&db, &settings), store.clone());
        let report = job.run().await.unwrap();

        assert_eq!(job.phase(), Phase::Completed);
        assert_eq!(report.status, JobStatus::Completed);
        assert_eq!(report.chunks_committed, 2);
        assert_eq!(report.records_read, 3);
        assert_eq!(report.records_written, 3);
        assert_eq!(sqlite_rows(&db), upper(&PEOPLE));
        assert_eq!(ledger_count(&db), 2);

        let cp = store.load("people-import").await.unwrap().unwrap();
        assert_eq!(cp.last_committed_chunk_sequence, 2);
        assert_eq!(cp.source_cursor, Cursor::new(3));
        assert_eq!(cp.rows_written, 3);

        let runs = store.runs("people-import").await.unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].status, JobStatus::Completed);

        assert!(logs_contain("Converting (firstName=ann, lastName=lee) into (firstName=ANN, lastName=LEE)"));
    }

    // Scenario: N records with chunk size C and no skips.
    // Expected Outcome: exactly ceil(N / C) chunks are committed.
    #[tokio::test]
    async fn commits_ceil_of_records_over_chunk_size() {
        for (n, c) in [(25, 10), (20, 10), (1, 10), (7, 1), (0, 3)] {
            let dir = tempdir().unwrap();
            let csv = write_generated_csv(dir.path(), "people.csv", n);
            let db = dir.path().join("sink.db");
            let settings = validated(&settings("generated", c));

            let report = orchestrator(
                &settings,
                &csv,
                sqlite_writer(&db, &settings),
                Arc::new(MemoryJobStore::new()),
            )
            .run()
            .await
            .unwrap();

            let expected = n.div_ceil(c) as u64;
            assert_eq!(report.chunks_committed, expected, "n={n} c={c}");
            assert_eq!(ledger_count(&db), expected as i64, "n={n} c={c}");
            assert_eq!(sqlite_rows(&db).len(), n, "n={n} c={c}");
        }
    }

    // Scenario: the transform rejects the second of three records, policy abort.
    // Expected Outcome: zero rows, run FAILED, no checkpoint.
    #[tokio::test]
    async fn transform_failure_aborts_without_writing() {
        let dir = tempdir().unwrap();
        let csv = write_csv(dir.path(), "people.csv", &PEOPLE);
        let db = dir.path().join("sink.db");
        let settings = validated(&settings("people-import", 10));
        let store = Arc::new(MemoryJobStore::new());

        let mut job = orchestrator_with(
            &settings,
            &csv,
            Arc::new(RejectFirstName::new("bo", &settings)),
            sqlite_writer(&db, &settings),
            store.clone(),
        );
        let failure = job.run().await.unwrap_err();

        assert!(matches!(failure.kind, JobErrorKind::Transform(_)));
        assert_eq!(failure.chunk_sequence, 1);
        assert_eq!(failure.cursor, Cursor::START);
        assert!(failure.to_string().starts_with("TransformError in job 'people-import' at chunk 1"));

        assert!(sqlite_rows(&db).is_empty());
        assert!(store.load("people-import").await.unwrap().is_none());
        let runs = store.runs("people-import").await.unwrap();
        assert_eq!(runs[0].status, JobStatus::Failed);
    }

    // Scenario: same rejection with chunk size 1.
    // Expected Outcome: the first chunk stays committed and the checkpoint points after it.
    #[tokio::test]
    async fn transform_failure_keeps_earlier_chunks() {
        let dir = tempdir().unwrap();
        let csv = write_csv(dir.path(), "people.csv", &PEOPLE);
        let db = dir.path().join("sink.db");
        let settings = validated(&settings("people-import", 1));
        let store = Arc::new(MemoryJobStore::new());

        let failure = orchestrator_with(
            &settings,
            &csv,
            Arc::new(RejectFirstName::new("bo", &settings)),
            sqlite_writer(&db, &settings),
            store.clone(),
        )
        .run()
        .await
        .unwrap_err();

        assert_eq!(failure.chunk_sequence, 2);
        assert_eq!(failure.cursor, Cursor::new(1));
        assert_eq!(sqlite_rows(&db), upper(&PEOPLE[..1]));

        let cp = store.load("people-import").await.unwrap().unwrap();
        assert_eq!(cp.last_committed_chunk_sequence, 1);
        assert_eq!(cp.source_cursor, Cursor::new(1));
    }

    // Scenario: transform errors are skipped.
    // Expected Outcome: every other record lands exactly once; the skip is counted.
    #[tokio::test]
    async fn skipped_records_are_left_out_once() {
        let dir = tempdir().unwrap();
        let csv = write_csv(dir.path(), "people.csv", &PEOPLE);
        let db = dir.path().join("sink.db");
        let settings = validated(&JobSettings {
            on_transform_error: ErrorPolicy::Skip,
            ..settings("people-import", 2)
        });

        let report = orchestrator_with(
            &settings,
            &csv,
            Arc::new(RejectFirstName::new("bo", &settings)),
            sqlite_writer(&db, &settings),
            Arc::new(MemoryJobStore::new()),
        )
        .run()
        .await
        .unwrap();

        assert_eq!(report.records_skipped, 1);
        assert_eq!(report.records_written, 2);
        assert_eq!(report.chunks_committed, 1);
        assert_eq!(report.cursor, Cursor::new(3));
        assert_eq!(
            sqlite_rows(&db),
            vec![
                ("ANN".to_string(), "LEE".to_string()),
                ("CY".to_string(), "ROE".to_string())
            ]
        );
    }

    // Scenario: a row with a missing column and `on_read_error = skip`, with a skip limit of 0.
    // Expected Outcome: the run fails with SkipLimitExceeded before anything is written.
    #[tokio::test]
    async fn malformed_rows_respect_skip_limit() {
        let dir = tempdir().unwrap();
        let csv = dir.path().join("people.csv");
        fs::write(&csv, "ann,lee\nbo\ncy,roe\n").unwrap();
        let db = dir.path().join("sink.db");

        let lenient = validated(&JobSettings {
            on_read_error: ErrorPolicy::Skip,
            ..settings("lenient", 10)
        });
        let report = orchestrator(
            &lenient,
            &csv,
            sqlite_writer(&db, &lenient),
            Arc::new(MemoryJobStore::new()),
        )
        .run()
        .await
        .unwrap();
        assert_eq!(report.records_skipped, 1);
        assert_eq!(sqlite_rows(&db).len(), 2);

        let strict_db = dir.path().join("strict.db");
        let strict = validated(&JobSettings {
            on_read_error: ErrorPolicy::Skip,
            skip_limit: Some(0),
            ..settings("strict", 10)
        });
        let failure = orchestrator(
            &strict,
            &csv,
            sqlite_writer(&strict_db, &strict),
            Arc::new(MemoryJobStore::new()),
        )
        .run()
        .await
        .unwrap_err();
        assert!(matches!(
            failure.kind,
            JobErrorKind::SkipLimitExceeded { limit: 0, skipped: 1 }
        ));
        assert!(sqlite_rows(&strict_db).is_empty());
    }

    // Scenario: line 2 is not valid UTF-8 and read errors are skipped.
    // Expected Outcome: the other two rows are written, one skip is counted.
    #[traced_test]
    #[tokio::test]
    async fn undecodable_row_is_skipped() {
        let dir = tempdir().unwrap();
        let csv = dir.path().join("people.csv");
        fs::write(&csv, b"ann,lee\nb\xffo,kim\ncy,roe\n").unwrap();
        let db = dir.path().join("sink.db");

        let lenient = validated(&JobSettings {
            on_read_error: ErrorPolicy::Skip,
            ..settings("undecodable", 10)
        });
        let report = orchestrator(
            &lenient,
            &csv,
            sqlite_writer(&db, &lenient),
            Arc::new(MemoryJobStore::new()),
        )
        .run()
        .await
        .unwrap();

        assert_eq!(report.status, JobStatus::Completed);
        assert_eq!(report.records_skipped, 1);
        assert_eq!(report.cursor, Cursor::new(3));
        assert_eq!(
            sqlite_rows(&db),
            upper(&[("ann", "lee"), ("cy", "roe")])
        );
        assert!(logs_contain("Invalid UTF-8 in record at line 2"));
    }

    // Scenario: a malformed row with the default policy.
    // Expected Outcome: SourceReadError, nothing written.
    #[tokio::test]
    async fn malformed_row_aborts_by_default() {
        let dir = tempdir().unwrap();
        let csv = dir.path().join("people.csv");
        fs::write(&csv, "ann,lee\nbo\n").unwrap();
        let db = dir.path().join("sink.db");
        let settings = validated(&settings("people-import", 10));

        let failure = orchestrator(
            &settings,
            &csv,
            sqlite_writer(&db, &settings),
            Arc::new(MemoryJobStore::new()),
        )
        .run()
        .await
        .unwrap_err();

        assert_eq!(failure.kind.name(), "SourceReadError");
        assert!(sqlite_rows(&db).is_empty());
    }

    // Scenario: JSON settings with a header row, `;` delimiter, trim and a filter rule.
    // Expected Outcome: the header is not loaded, blank last names are filtered, the rest uppercased.
    #[tokio::test]
    async fn json_settings_with_rules() {
        let dir = tempdir().unwrap();
        let csv = dir.path().join("people.csv");
        fs::write(
            &csv,
            "first;last\n ann ; lee \nbo;\ncy;roe\n",
        )
        .unwrap();
        let db = dir.path().join("sink.db");

        let raw = JobSettings::from_json_str(
            r#"{
                "job_id": "semicolons",
                "chunk_size": 5,
                "field_names": ["firstName", "lastName"],
                "delimiter": ";",
                "has_header": true,
                "transform": [
                    { "rule": "trim" },
                    { "rule": "skip_if_empty", "field": "lastName" },
                    { "rule": "uppercase" }
                ]
            }"#,
        )
        .unwrap();
        let settings = validated(&raw);

        let report = orchestrator(
            &settings,
            &csv,
            sqlite_writer(&db, &settings),
            Arc::new(MemoryJobStore::new()),
        )
        .run()
        .await
        .unwrap();

        assert_eq!(report.records_read, 3);
        assert_eq!(report.records_filtered, 1);
        assert_eq!(report.cursor, Cursor::new(3));
        assert_eq!(
            sqlite_rows(&db),
            vec![
                ("ANN".to_string(), "LEE".to_string()),
                ("CY".to_string(), "ROE".to_string())
            ]
        );
    }

    // Scenario: the verification listener is attached to a completed run.
    // Expected Outcome: every sink row is logged back.
    #[traced_test]
    #[tokio::test]
    async fn verification_listener_reports_rows() {
        let dir = tempdir().unwrap();
        let csv = write_csv(dir.path(), "people.csv", &PEOPLE);
        let db = dir.path().join("sink.db");
        let settings = validated(&settings("people-import", 2));
        let writer = sqlite_writer(&db, &settings);

        orchestrator(&settings, &csv, writer.clone(), Arc::new(MemoryJobStore::new()))
            .with_listener(Arc::new(SinkVerificationListener::new(writer.clone(), 10)))
            .run()
            .await
            .unwrap();

        assert_eq!(writer.count_rows().await.unwrap(), 3);
        assert!(logs_contain("!!! JOB FINISHED! Time to verify the results"));
        assert!(logs_contain("Found <first_name=ANN, last_name=LEE> in the database."));
        assert!(logs_contain("Found <first_name=CY, last_name=ROE> in the database."));
    }

    // Scenario: two jobs with different ids share one store and one sink table.
    // Expected Outcome: checkpoints and run numbers stay separate.
    #[tokio::test]
    async fn distinct_jobs_are_independent() {
        let dir = tempdir().unwrap();
        let csv_a = write_csv(dir.path(), "a.csv", &PEOPLE);
        let csv_b = write_generated_csv(dir.path(), "b.csv", 4);
        let db = dir.path().join("sink.db");
        let store = Arc::new(SledJobStore::open(dir.path().join("state")).unwrap());

        let a = validated(&settings("job-a", 2));
        let b = validated(&settings("job-b", 2));
        orchestrator(&a, &csv_a, sqlite_writer(&db, &a), store.clone())
            .run()
            .await
            .unwrap();
        orchestrator(&b, &csv_b, sqlite_writer(&db, &b), store.clone())
            .run()
            .await
            .unwrap();

        let cp_a = store.load("job-a").await.unwrap().unwrap();
        let cp_b = store.load("job-b").await.unwrap().unwrap();
        assert_eq!(cp_a.source_cursor, Cursor::new(3));
        assert_eq!(cp_b.source_cursor, Cursor::new(4));
        assert_eq!(store.runs("job-b").await.unwrap().len(), 1);
        assert_eq!(sqlite_rows(&db).len(), 3 + generated_people(4).len());
        assert_eq!(ledger_count(&db), 4);
    }
}
