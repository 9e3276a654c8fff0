use crate::{
    error::RunError,
    execution::{monitor, summary::RunSummary},
    planning::{import_items, plan_ranges},
};
use connectors::source::{RowSource, create_source};
use engine_config::job::JobConfig;
use engine_core::{
    context::PipelineContext,
    error::{QueueError, StageError},
    queue::{BoundedWorkQueue, MeteredQueue},
    stage::{StageReport, StageWorkerPool},
};
use engine_processing::{
    batch::{BatchAssembler, DocumentBatcher, assembler, batcher},
    document::{EntityDocumentBuilder, StoreJsonValueWriter, builder},
    extract::{self, RangePartitionedExtractor},
    item::{SqlImportItem, UploadReceipt},
    schema::SchemaProbe,
    transform::{TransformRegistry, ZipGeocodeTable},
    upload::{self, BatchUploader, BulkHttpUploader, FileBatchWriter, Uploader},
};
use std::{
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Runs a job against the source its configuration names.
pub async fn run(config: JobConfig, shutdown: CancellationToken) -> Result<RunSummary, RunError> {
    let timeout = (config.source.command_timeout_secs > 0)
        .then(|| Duration::from_secs(config.source.command_timeout_secs));
    let source = create_source(config.source.driver, &config.source.url, timeout);

    PipelineRunner::new(config, source)
        .with_shutdown(shutdown)
        .run()
        .await
}

/// Wires the stages of one job together and drives them to completion:
/// extract, assemble, batch, save, upload.
pub struct PipelineRunner {
    config: JobConfig,
    source: Arc<dyn RowSource>,
    uploaders: Vec<Arc<dyn Uploader>>,
    shutdown: CancellationToken,
}

type StageHandle = JoinHandle<Result<StageReport, StageError>>;

impl PipelineRunner {
    pub fn new(config: JobConfig, source: Arc<dyn RowSource>) -> Self {
        PipelineRunner {
            config,
            source,
            uploaders: Vec::new(),
            shutdown: CancellationToken::new(),
        }
    }

    /// Adds a destination on top of the configured ones.
    pub fn with_uploader(mut self, uploader: Arc<dyn Uploader>) -> Self {
        self.uploaders.push(uploader);
        self
    }

    /// Cancelling `shutdown` aborts the run.
    pub fn with_shutdown(mut self, shutdown: CancellationToken) -> Self {
        self.shutdown = shutdown;
        self
    }

    pub async fn run(self) -> Result<RunSummary, RunError> {
        let started = Instant::now();
        let job = &self.config.job;
        let run_id = make_run_id(&job.name);
        info!(run_id = %run_id, job = %job.name, source = %self.source.describe(), "Starting run");

        let slices = plan_ranges(&self.config.ranges)?;

        let probe = SchemaProbe::new(self.source.clone(), &job.top_level_key_column);
        let mappings = probe.probe_all(&self.config.data_sources).await?;
        for mapping in &mappings {
            debug!(
                sequence_number = mapping.sequence_number,
                path = %mapping.property_path,
                columns = mapping.columns.len(),
                calculated = mapping.calculated_columns().count(),
                "Resolved data source columns"
            );
        }

        let items = import_items(&slices, &self.config.data_sources, &mappings, job.seed);
        info!(slices = slices.len(), items = items.len(), "Planned key ranges");

        let transforms = self.transforms().await?;

        let workers = &self.config.workers;
        let ctx = PipelineContext::new(run_id.clone(), job.queue_capacity)
            .with_parent_token(&self.shutdown)
            .with_workers([
                (extract::STAGE_NAME, workers.extract),
                (builder::STAGE_NAME, workers.assemble),
                (batcher::STAGE_NAME, workers.batch),
                (assembler::STAGE_NAME, workers.save),
                (upload::STAGE_NAME, workers.upload),
            ]);
        let uploaders = self.uploaders(&ctx).await?;

        let imports = ctx.create_queue("sql-import");
        let groups = ctx.create_queue("entity-groups");
        let documents = ctx.create_queue("documents");
        let batches = ctx.create_queue("document-batches");
        let payloads = ctx.create_queue("payloads");
        let receipts = ctx.create_queue::<UploadReceipt>("receipts");

        let metrics = ctx.metrics();
        let stages: Vec<StageHandle> = vec![
            StageWorkerPool::new(
                RangePartitionedExtractor::new(
                    self.source.clone(),
                    &job.top_level_key_column,
                    transforms,
                    Arc::new(StoreJsonValueWriter),
                    metrics.clone(),
                ),
                imports.clone(),
                groups.clone(),
                &ctx,
            )
            .spawn(),
            StageWorkerPool::new(
                EntityDocumentBuilder::new(&job.top_level_key_column, metrics.clone()),
                groups,
                documents.clone(),
                &ctx,
            )
            .spawn(),
            StageWorkerPool::new(
                DocumentBatcher::new(job.entities_per_batch),
                documents,
                batches.clone(),
                &ctx,
            )
            .spawn(),
            StageWorkerPool::new(
                BatchAssembler::new(ctx.batch_counter()),
                batches,
                payloads.clone(),
                &ctx,
            )
            .spawn(),
            StageWorkerPool::new(
                BatchUploader::new(uploaders, metrics.clone()),
                payloads,
                receipts.clone(),
                &ctx,
            )
            .spawn(),
        ];

        let monitor = (job.monitor_interval_secs > 0)
            .then(|| monitor::spawn(ctx.clone(), Duration::from_secs(job.monitor_interval_secs)));

        let item_count = items.len();
        let seeder = tokio::spawn(seed(imports, items));
        let (batch_count, document_count, byte_count) = drain(&receipts).await;

        let outcome = settle(&ctx, seeder, stages).await;
        if let Some(monitor) = monitor {
            monitor.abort();
        }
        let reports = outcome?;

        let summary = RunSummary {
            run_id,
            job: job.name.clone(),
            slices: slices.len(),
            import_items: item_count,
            batches: batch_count,
            documents: document_count,
            bytes: byte_count,
            duration_ms: started.elapsed().as_millis() as u64,
            stages: reports,
            metrics: metrics.snapshot(),
        };
        summary.log();
        Ok(summary)
    }

    async fn transforms(&self) -> Result<TransformRegistry, RunError> {
        let Some(path) = self.config.transforms.geocode_file.clone() else {
            return Ok(TransformRegistry::new());
        };
        let table = tokio::task::spawn_blocking(move || ZipGeocodeTable::load(&path)).await??;
        Ok(TransformRegistry::with_geocoding(Arc::new(table)))
    }

    async fn uploaders(&self, ctx: &PipelineContext) -> Result<Vec<Arc<dyn Uploader>>, RunError> {
        let mut uploaders = self.uploaders.clone();

        if let Some(directory) = &self.config.output.directory {
            uploaders.push(Arc::new(FileBatchWriter::create(directory).await?));
            info!(directory = %directory.display(), "Writing batches to files");
        }
        if let Some(settings) = &self.config.upload {
            let http = BulkHttpUploader::new(settings, ctx.cancel_token(), ctx.metrics())?;
            info!(endpoint = %http.endpoint(), "Uploading batches");
            uploaders.push(Arc::new(http));
        }
        if uploaders.is_empty() {
            warn!("No output directory or upload endpoint configured, batches will be discarded");
        }
        Ok(uploaders)
    }
}

/// Queues every import item, then closes the queue.
async fn seed(queue: Arc<BoundedWorkQueue<SqlImportItem>>, items: Vec<SqlImportItem>) -> Result<(), QueueError> {
    for item in items {
        queue.add(item).await?;
    }
    queue.mark_complete();
    Ok(())
}

/// Consumes upload receipts until the last stage completes or the run is aborted.
async fn drain(receipts: &BoundedWorkQueue<UploadReceipt>) -> (u64, u64, u64) {
    let (mut batches, mut documents, mut bytes) = (0, 0, 0);
    while let Ok(receipt) = receipts.take().await {
        batches += 1;
        documents += receipt.document_count as u64;
        bytes += receipt.bytes as u64;
    }
    (batches, documents, bytes)
}

/// Waits for the seeder and every stage, then reports the run's outcome.
/// The first failure in pipeline order that is not a cancellation wins.
async fn settle(
    ctx: &PipelineContext,
    seeder: JoinHandle<Result<(), QueueError>>,
    stages: Vec<StageHandle>,
) -> Result<Vec<StageReport>, RunError> {
    let mut failure: Option<RunError> = None;

    match seeder.await {
        Ok(Ok(())) => {}
        Ok(Err(QueueError::Cancelled(_))) => {}
        Ok(Err(err)) => failure = Some(RunError::Seed(err)),
        Err(err) => failure = Some(RunError::TaskJoin(err)),
    }

    let expected = stages.len();
    let mut reports = Vec::with_capacity(expected);
    for handle in stages {
        match handle.await {
            Ok(Ok(report)) => reports.push(report),
            Ok(Err(err)) if err.is_cancellation() => {}
            Ok(Err(err)) => {
                if failure.is_none() {
                    failure = Some(RunError::Stage(err));
                }
            }
            Err(err) => {
                if failure.is_none() {
                    failure = Some(RunError::TaskJoin(err));
                }
            }
        }
    }

    if let Some(err) = failure {
        ctx.abort("run failed");
        return Err(err);
    }
    if reports.len() < expected {
        return Err(RunError::Cancelled);
    }
    Ok(reports)
}

/// `run-` followed by 16 hex digits of a hash over the job name and start time.
fn make_run_id(job: &str) -> String {
    let mut h = blake3::Hasher::new();
    h.update(job.as_bytes());
    h.update(b":");
    h.update(chrono::Utc::now().to_rfc3339().as_bytes());
    format!("run-{}", &h.finalize().to_hex()[..16])
}
