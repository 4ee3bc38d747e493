//! The pipeline controller: batch intake, per-file tasks, and the user-facing
//! registry operations.
//!
//! ## Execution model
//!
//! Every accepted upload becomes one tracked entry and one spawned Tokio
//! task. A task runs extraction, then classification, and reports each stage
//! to the shared [`Registry`] as a single [`StageUpdate`]. The registry mutex
//! is only taken to apply an update or to read a snapshot; it is never held
//! across an `.await`, so pipelines never wait on each other.
//!
//! ```text
//! submit_batch ──▶ registry.insert_batch (one lock)
//!       │
//!       ├── spawn ─▶ Reading ─▶ extract ─▶ Extracted ─▶ classify ─▶ Completed
//!       ├── spawn ─▶ Reading ─▶ extract ─▶ Failed          (any stage) ─▶ Failed
//!       └── …
//! ```
//!
//! Tasks are detached: nothing the caller drops can abort them. Removing an
//! entry does not cancel its task either. The task runs to the end and its
//! remaining updates are dropped by the registry. [`PipelineController::settle`]
//! waits on a count of running tasks, so cancelling a `settle()` call leaves
//! every pipeline running.
//!
//! Any error or panic inside a task ends as that entry's ERROR state; nothing
//! escapes to other entries or to the caller.

use crate::config::BioCraftConfig;
use crate::error::{BioCraftError, PipelineError};
use crate::output::{BatchReceipt, BatchSummary, ExportedDocument, FileReport};
use crate::pipeline::classify::{LlmClassifier, ProfileClassifier};
use crate::pipeline::export::{export_file_name, ProfileExporter};
use crate::pipeline::extract::{DocxExtractor, TextExtractor};
use crate::pipeline::input::{partition_batch, UploadedFile};
use crate::profile::{FieldKey, StructuredProfile};
use crate::progress::PipelineObserver;
use crate::registry::{ApplyOutcome, FileId, ProcessingStatus, Registry, StageUpdate};
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;
use tracing::{debug, error, info, warn, Instrument};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Owns the registry and drives every file through its pipeline.
///
/// Intake methods spawn Tokio tasks and must be called from within a Tokio
/// runtime.
pub struct PipelineController {
    ctx: PipelineContext,
    /// Number of pipeline tasks that have not finished yet.
    in_flight: Arc<watch::Sender<usize>>,
}

/// What a pipeline task needs; cloned into every task.
#[derive(Clone)]
struct PipelineContext {
    registry: Arc<Mutex<Registry>>,
    extractor: Arc<dyn TextExtractor>,
    classifier: Arc<dyn ProfileClassifier>,
    observer: Arc<dyn PipelineObserver>,
}

impl PipelineController {
    /// Controller with the `.docx` extractor and the LLM classifier.
    pub fn new(config: BioCraftConfig) -> Self {
        let observer = Arc::clone(&config.observer);
        Self::with_adapters(
            Arc::new(DocxExtractor),
            Arc::new(LlmClassifier::new(config)),
            observer,
        )
    }

    /// Controller with caller-supplied adapters.
    pub fn with_adapters(
        extractor: Arc<dyn TextExtractor>,
        classifier: Arc<dyn ProfileClassifier>,
        observer: Arc<dyn PipelineObserver>,
    ) -> Self {
        Self {
            ctx: PipelineContext {
                registry: Arc::new(Mutex::new(Registry::new())),
                extractor,
                classifier,
                observer,
            },
            in_flight: Arc::new(watch::Sender::new(0)),
        }
    }

    // ── Intake ───────────────────────────────────────────────────────────

    /// Accept a batch of uploads.
    ///
    /// Uploads with the wrong MIME type are rejected with a notice and never
    /// tracked. The accepted ones are inserted together, in order, as IDLE
    /// entries, and each gets its own pipeline task. Returns without waiting
    /// for any pipeline.
    pub fn submit_batch(&self, files: Vec<UploadedFile>) -> BatchReceipt {
        let (accepted, rejected) = partition_batch(files);
        let sources: Vec<(String, Arc<[u8]>)> = accepted
            .iter()
            .map(|f| (f.name.clone(), Arc::clone(&f.bytes)))
            .collect();

        let ids = lock(&self.ctx.registry).insert_batch(accepted);
        info!(
            "Accepted {} file(s), rejected {} file(s)",
            ids.len(),
            rejected.len()
        );

        self.ctx.observer.on_batch_submitted(ids.len(), rejected.len());
        for rejection in &rejected {
            self.ctx
                .observer
                .on_file_rejected(&rejection.file_name, &rejection.reason);
        }

        for (id, (name, bytes)) in ids.iter().copied().zip(sources) {
            let span = tracing::info_span!("pipeline", file_id = %id, file_name = %name);
            let ctx = self.ctx.clone();
            let guard = InFlight::enter(&self.in_flight);
            tokio::spawn(
                async move {
                    let _guard = guard;
                    run_pipeline(ctx, id, bytes).await;
                }
                .instrument(span),
            );
        }

        BatchReceipt {
            accepted: ids,
            rejected,
        }
    }

    /// Accept a single upload and start its pipeline.
    pub fn start_pipeline(&self, file: UploadedFile) -> Result<FileId, BioCraftError> {
        if !file.is_accepted() {
            return Err(BioCraftError::UnsupportedFileType {
                name: file.name,
                mime: file.mime,
            });
        }
        let receipt = self.submit_batch(vec![file]);
        receipt
            .accepted
            .first()
            .copied()
            .ok_or_else(|| BioCraftError::Internal("accepted upload was not tracked".into()))
    }

    /// Wait until no pipeline is running.
    ///
    /// Dropping the returned future (a timeout, a `select!`) only stops the
    /// wait; the pipelines keep running and a later call waits for them.
    pub async fn settle(&self) {
        let mut running = self.in_flight.subscribe();
        // The sender lives in `self`, so the channel cannot close here.
        let _ = running.wait_for(|n| *n == 0).await;
    }

    /// Number of pipeline tasks still running.
    pub fn in_flight(&self) -> usize {
        *self.in_flight.borrow()
    }

    // ── Registry views ───────────────────────────────────────────────────

    /// All entries, in insertion order.
    pub fn snapshot(&self) -> Vec<FileReport> {
        lock(&self.ctx.registry).iter().map(FileReport::from).collect()
    }

    pub fn get(&self, id: FileId) -> Option<FileReport> {
        lock(&self.ctx.registry).get(id).map(FileReport::from)
    }

    pub fn summary(&self) -> BatchSummary {
        let registry = lock(&self.ctx.registry);
        let mut summary = BatchSummary::default();
        for entry in registry.iter() {
            summary.record(entry.status());
        }
        summary
    }

    /// A copy of the completed profile of `id`.
    pub fn profile(&self, id: FileId) -> Result<StructuredProfile, BioCraftError> {
        lock(&self.ctx.registry).profile(id).cloned()
    }

    // ── Selection ────────────────────────────────────────────────────────

    /// Select any id; it does not have to exist.
    pub fn select(&self, id: FileId) {
        lock(&self.ctx.registry).select(id);
    }

    pub fn clear_selection(&self) {
        lock(&self.ctx.registry).clear_selection();
    }

    /// The selected id, if it still names a tracked entry.
    pub fn selected_id(&self) -> Option<FileId> {
        lock(&self.ctx.registry).selected_id()
    }

    pub fn selected(&self) -> Option<FileReport> {
        lock(&self.ctx.registry).selected().map(FileReport::from)
    }

    /// Stop tracking an entry. Its pipeline, if still running, becomes inert.
    pub fn remove(&self, id: FileId) -> bool {
        let removed = lock(&self.ctx.registry).remove(id);
        match removed {
            Some(entry) => {
                info!("Removed '{}' ({})", entry.file_name(), entry.status());
                true
            }
            None => false,
        }
    }

    // ── Editing ──────────────────────────────────────────────────────────

    /// Replace one field of a completed profile with editor input.
    pub fn update_field(&self, id: FileId, key: FieldKey, input: &str) -> Result<(), BioCraftError> {
        lock(&self.ctx.registry).update_field(id, key, input)
    }

    /// Attach a PNG or JPEG portrait to a completed profile.
    pub fn set_profile_image(&self, id: FileId, bytes: &[u8]) -> Result<(), BioCraftError> {
        lock(&self.ctx.registry).set_profile_image(id, bytes)
    }

    pub fn clear_profile_image(&self, id: FileId) -> Result<(), BioCraftError> {
        lock(&self.ctx.registry).clear_profile_image(id)
    }

    // ── Export ───────────────────────────────────────────────────────────

    /// Serialise the current profile of `id`.
    ///
    /// The registry is not changed, whether the export succeeds or not.
    pub fn export(
        &self,
        id: FileId,
        exporter: &dyn ProfileExporter,
    ) -> Result<ExportedDocument, BioCraftError> {
        let profile = self.profile(id)?;
        let bytes = exporter.export(&profile).map_err(|e| {
            warn!("Export of {} failed: {}", id, e);
            e
        })?;
        Ok(ExportedDocument {
            file_name: export_file_name(&profile, exporter.extension()),
            bytes,
        })
    }
}

impl std::fmt::Debug for PipelineController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineController")
            .field("entries", &lock(&self.ctx.registry).len())
            .finish()
    }
}

// ── Pipeline task ────────────────────────────────────────────────────────

/// Counts one running task; the count drops when the task ends, however it
/// ends.
struct InFlight(Arc<watch::Sender<usize>>);

impl InFlight {
    fn enter(counter: &Arc<watch::Sender<usize>>) -> Self {
        counter.send_modify(|n| *n += 1);
        Self(Arc::clone(counter))
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.send_modify(|n| *n = n.saturating_sub(1));
    }
}

async fn run_pipeline(ctx: PipelineContext, id: FileId, bytes: Arc<[u8]>) {
    if ctx.apply(id, StageUpdate::Reading) == ApplyOutcome::Removed {
        debug!("File removed before its pipeline started");
        return;
    }

    let terminal = match AssertUnwindSafe(run_stages(&ctx, id, bytes))
        .catch_unwind()
        .await
    {
        Ok(Ok(profile)) => StageUpdate::Completed(profile),
        Ok(Err(e)) => StageUpdate::Failed(e.to_string()),
        Err(payload) => {
            let e = PipelineError::Internal(panic_message(payload.as_ref()));
            error!("{}", e);
            StageUpdate::Failed(e.to_string())
        }
    };
    ctx.apply(id, terminal);
}

async fn run_stages(
    ctx: &PipelineContext,
    id: FileId,
    bytes: Arc<[u8]>,
) -> Result<StructuredProfile, PipelineError> {
    let raw_text = ctx.extractor.extract(bytes).await?;
    debug!("Extracted {} chars", raw_text.chars().count());
    ctx.apply(
        id,
        StageUpdate::Extracted {
            raw_text: raw_text.clone(),
        },
    );

    let mut profile = ctx.classifier.classify(&raw_text).await?;
    if !profile.has_name() {
        return Err(PipelineError::MissingName);
    }
    profile.name = profile.name.trim().to_string();
    profile.normalize_topics();
    Ok(profile)
}

impl PipelineContext {
    /// Apply one update under the registry lock, then notify the observer.
    fn apply(&self, id: FileId, update: StageUpdate) -> ApplyOutcome {
        let detail = match &update {
            StageUpdate::Completed(profile) => profile.name.clone(),
            StageUpdate::Failed(message) => message.clone(),
            _ => String::new(),
        };

        let outcome = lock(&self.registry).apply(id, update);

        if let ApplyOutcome::Applied { status, auto_selected } = outcome {
            self.observer.on_status_change(id, status);
            match status {
                ProcessingStatus::Completed => {
                    info!(auto_selected, "Completed profile for '{}'", detail);
                    self.observer.on_file_completed(id, &detail);
                }
                ProcessingStatus::Error => {
                    warn!("Pipeline failed: {}", detail);
                    self.observer.on_file_failed(id, &detail);
                }
                _ => {}
            }
        }
        outcome
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "adapter panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::input::DOCX_MIME;
    use crate::progress::NoopObserver;
    use async_trait::async_trait;

    struct EchoExtractor;

    #[async_trait]
    impl TextExtractor for EchoExtractor {
        async fn extract(&self, bytes: Arc<[u8]>) -> Result<String, PipelineError> {
            String::from_utf8(bytes.to_vec()).map_err(|e| PipelineError::ExtractionFailed {
                detail: e.to_string(),
            })
        }
    }

    struct NameClassifier;

    #[async_trait]
    impl ProfileClassifier for NameClassifier {
        async fn classify(&self, raw_text: &str) -> Result<StructuredProfile, PipelineError> {
            if raw_text == "panic" {
                panic!("classifier exploded");
            }
            Ok(StructuredProfile {
                name: format!("  {raw_text} "),
                topics: vec!["清史讲座".into()],
                ..Default::default()
            })
        }
    }

    fn controller() -> PipelineController {
        PipelineController::with_adapters(
            Arc::new(EchoExtractor),
            Arc::new(NameClassifier),
            Arc::new(NoopObserver),
        )
    }

    fn docx(name: &str, body: &str) -> UploadedFile {
        UploadedFile::new(name, DOCX_MIME, body.as_bytes().to_vec())
    }

    #[tokio::test]
    async fn completed_profile_is_normalized() {
        let c = controller();
        let id = c.start_pipeline(docx("a.docx", "张三")).unwrap();
        c.settle().await;

        let report = c.get(id).unwrap();
        assert_eq!(report.status, ProcessingStatus::Completed);
        let profile = report.result.unwrap();
        assert_eq!(profile.name, "张三");
        assert_eq!(profile.topics, vec!["《清史讲座》"]);
        assert_eq!(report.raw_text_chars, 2);
    }

    #[tokio::test]
    async fn panic_becomes_error_state() {
        let c = controller();
        let bad = c.start_pipeline(docx("a.docx", "panic")).unwrap();
        let good = c.start_pipeline(docx("b.docx", "李四")).unwrap();
        c.settle().await;

        let bad = c.get(bad).unwrap();
        assert_eq!(bad.status, ProcessingStatus::Error);
        assert!(bad.error_message.unwrap().contains("classifier exploded"));
        assert_eq!(c.get(good).unwrap().status, ProcessingStatus::Completed);
    }

    #[tokio::test]
    async fn in_flight_counts_until_each_task_ends() {
        let c = controller();
        c.start_pipeline(docx("a.docx", "panic")).unwrap();
        c.start_pipeline(docx("b.docx", "李四")).unwrap();
        assert_eq!(c.in_flight(), 2);
        c.settle().await;
        assert_eq!(c.in_flight(), 0);
    }

    #[tokio::test]
    async fn blank_name_is_missing_name() {
        let c = controller();
        let id = c.start_pipeline(docx("a.docx", "   ")).unwrap();
        c.settle().await;
        let report = c.get(id).unwrap();
        assert_eq!(
            report.error_message.as_deref(),
            Some(PipelineError::MissingName.to_string().as_str())
        );
    }

    #[tokio::test]
    async fn start_pipeline_rejects_wrong_type() {
        let c = controller();
        let err = c
            .start_pipeline(UploadedFile::from_name("a.pdf", b"%PDF".to_vec()))
            .unwrap_err();
        assert!(matches!(err, BioCraftError::UnsupportedFileType { .. }));
        assert!(c.snapshot().is_empty());
    }

    #[tokio::test]
    async fn settle_with_nothing_running_returns() {
        let c = controller();
        c.settle().await;
        assert_eq!(c.summary(), BatchSummary::default());
    }

    #[test]
    fn panic_message_reads_both_payload_kinds() {
        let s: Box<dyn Any + Send> = Box::new("static");
        assert_eq!(panic_message(s.as_ref()), "static");
        let s: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(s.as_ref()), "owned");
        let s: Box<dyn Any + Send> = Box::new(7_u8);
        assert_eq!(panic_message(s.as_ref()), "adapter panicked");
    }
}
