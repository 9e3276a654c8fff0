#[cfg(test)]
mod tests {
    use crate::{
        PATIENTS_SQL, VISITS_SQL, clinic_source, job_toml,
        utils::{CollectingUploader, merge_upserts, read_batch_files},
    };
    use connectors::{memory::MemorySource, source::RowSource};
    use engine_config::job::JobConfig;
    use engine_core::error::StageError;
    use engine_runtime::{error::RunError, execution::PipelineRunner};
    use serde_json::json;
    use std::{collections::BTreeSet, io::Write, sync::Arc};
    use tempfile::{NamedTempFile, tempdir};
    use tokio_util::sync::CancellationToken;
    use tracing_test::traced_test;

    const VISITS_SOURCE: &str = r#"
        [[data_sources]]
        sql = "SELECT PatientId, VisitDate, Reason FROM visits"
        path = "visits"
        property_type = "nested"
    "#;

    fn runner(toml: &str, source: MemorySource) -> PipelineRunner {
        let config = JobConfig::from_toml_str(toml).expect("valid job");
        let source: Arc<dyn RowSource> = Arc::new(source);
        PipelineRunner::new(config, source)
    }

    fn ids(range: std::ops::RangeInclusive<i64>) -> BTreeSet<String> {
        range.map(|id| id.to_string()).collect()
    }

    // Scenario: a single top-level source written to an output directory.
    // Expected Outcome:
    // - Every entity lands in exactly one batch file.
    // - No batch holds more documents than entities_per_batch.
    // - Batch numbers are distinct and files match the summary.
    #[traced_test]
    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn writes_every_entity_to_batch_files() {
        let dir = tempdir().unwrap();
        let toml = job_toml(
            3,
            &format!("\n[output]\ndirectory = {:?}\n", dir.path().display().to_string()),
        );

        let summary = runner(&toml, clinic_source()).run().await.unwrap();

        let files = read_batch_files(dir.path());
        assert_eq!(files.len() as u64, summary.batches);
        assert!(files.len() >= 4, "ten entities need at least four batches of three");
        for (number, entries) in &files {
            assert!(*number >= 1);
            assert!(!entries.is_empty() && entries.len() <= 3, "batch {number} has {} documents", entries.len());
            assert!(entries.iter().all(|e| e.doc_as_upsert));
        }

        let seen: Vec<String> = files.values().flatten().map(|e| e.id.clone()).collect();
        assert_eq!(seen.len(), 10, "each entity is written once");
        assert_eq!(seen.into_iter().collect::<BTreeSet<_>>(), ids(1..=10));

        assert_eq!(summary.slices, 3);
        assert_eq!(summary.import_items, 3);
        assert_eq!(summary.documents, 10);
        assert_eq!(summary.metrics.rows_extracted, 10);
        assert_eq!(summary.metrics.documents_built, 10);
        assert_eq!(summary.stages.len(), 5);
        assert_eq!(summary.stages[0].stage, "extract");
        assert_eq!(summary.stages[0].items_in, 3);
    }

    // Scenario: a top-level source plus a nested source sharing the join key.
    // Expected Outcome: merged upserts give every patient its name and
    // patients with visits a nested array holding each visit row.
    #[traced_test]
    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn merges_nested_source_into_entities() {
        let collect = CollectingUploader::new();
        let summary = runner(&job_toml(4, VISITS_SOURCE), clinic_source())
            .with_uploader(collect.clone())
            .run()
            .await
            .unwrap();

        // 10 patients plus 5 patients with visits.
        assert_eq!(summary.documents, 15);
        assert_eq!(summary.metrics.rows_extracted, 20);
        assert_eq!(summary.import_items, 6);

        for payload in collect.payloads() {
            assert!(payload.document_count <= 4);
            assert!(payload.query_id == "q1" || payload.query_id == "q2");
        }

        let entries = collect.entries();
        let merged = merge_upserts(&entries);
        assert_eq!(merged.keys().cloned().collect::<BTreeSet<_>>(), ids(1..=10));

        let patient = &merged["4"];
        assert_eq!(patient["PatientId"], json!("4"));
        assert_eq!(patient["Name"], json!("patient-4"));
        assert_eq!(
            patient["visits"],
            json!([
                { "VisitDate": "2024-01-05", "Reason": "checkup" },
                { "VisitDate": "2024-03-17", "Reason": "follow-up" },
            ])
        );
        assert!(merged["3"].get("visits").is_none());
    }

    // Scenario: a zip code column geocoded into a calculated geo_point field.
    // Expected Outcome: known zips resolve after normalization, null and
    // unknown zips leave the field out.
    #[traced_test]
    #[tokio::test]
    async fn geocodes_zip_codes() {
        let mut table = NamedTempFile::new().unwrap();
        table
            .write_all(b"zip,lat,lon\n02139,42.36,-71.10\n02141,42.37,-71.08\n90210,34.09,-118.41\n")
            .unwrap();

        let extra = format!(
            r#"
            [[data_sources.fields]]
            source = "Zip"
            destination = "location"
            destination_type = "geo_point"
            transform = "zip5_to_geocode"

            [transforms]
            geocode_file = {:?}
            "#,
            table.path().display().to_string()
        );

        let collect = CollectingUploader::new();
        runner(&job_toml(5, &extra), clinic_source())
            .with_uploader(collect.clone())
            .run()
            .await
            .unwrap();

        let merged = merge_upserts(&collect.entries());
        let cambridge = json!({ "lat": 42.36, "lon": -71.10 });
        assert_eq!(merged["1"]["location"], cambridge);
        assert_eq!(merged["7"]["location"], cambridge, "short zips are zero padded");
        assert_eq!(merged["8"]["location"], json!({ "lat": 34.09, "lon": -118.41 }));
        assert_eq!(merged["1"]["Zip"], json!("02139"));
        assert!(merged["4"].get("location").is_none());
        assert!(merged["6"].get("location").is_none());
    }

    // Scenario: every range read of the nested source fails.
    // Expected Outcome: the run fails with the extract error itself, naming
    // the database message and statement, not a cancellation.
    #[traced_test]
    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn extract_failure_stops_the_run() {
        let source = clinic_source().with_failure(VISITS_SQL, "connection reset by peer");

        let err = runner(&job_toml(2, VISITS_SOURCE), source)
            .run()
            .await
            .unwrap_err();

        assert!(!err.is_cancelled());
        match &err {
            RunError::Stage(StageError::Handle { stage, task_key, .. }) => {
                assert_eq!(stage, "extract");
                assert_eq!(task_key, "q2");
            }
            other => panic!("expected an extract failure, got {other:?}"),
        }
        let message = err.to_string();
        assert!(message.contains("connection reset by peer"), "{message}");
        assert!(message.contains("FROM visits"), "{message}");
    }

    // Scenario: a data source whose query the source does not know.
    // Expected Outcome: the run stops during the schema probe, before any stage starts.
    #[traced_test]
    #[tokio::test]
    async fn probe_failure_stops_before_extraction() {
        let source = MemorySource::new().with_table(PATIENTS_SQL, crate::patients_table());
        let source = Arc::new(source);
        let config = JobConfig::from_toml_str(&job_toml(2, VISITS_SOURCE)).unwrap();

        let err = PipelineRunner::new(config, source.clone()).run().await.unwrap_err();

        assert!(matches!(err, RunError::Probe(_)), "{err:?}");
        assert_eq!(source.fetch_count(), 0);
    }

    // Scenario: the shutdown token is cancelled before the run starts.
    // Expected Outcome: the run reports a cancellation and uploads nothing.
    #[traced_test]
    #[tokio::test]
    async fn shutdown_cancels_the_run() {
        let shutdown = CancellationToken::new();
        shutdown.cancel();
        let collect = CollectingUploader::new();

        let err = runner(&job_toml(2, ""), clinic_source())
            .with_uploader(collect.clone())
            .with_shutdown(shutdown)
            .run()
            .await
            .unwrap_err();

        assert!(err.is_cancelled(), "{err:?}");
        assert!(collect.payloads().is_empty());
    }
}
