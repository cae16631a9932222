//! Batch enrichment pipeline
//!
//! Reads the stub stream line by line, groups accepted stubs into batches,
//! sends one combined query per batch to the knowledge source, reconciles
//! each subject's rows and commits each batch to the store as one write.
//!
//! Up to `workers` batches may be waiting on the knowledge source at once.
//! Commits always happen in batch order, so a failure leaves exactly the
//! batches before it in the store and the reported line is exact.

use super::cancel::CancellationToken;
use super::progress::Progress;
use super::reconcile::{ReconcileConfig, ReconcileError, Reconciler, ValueWarning};
use super::source::{BatchQuery, KnowledgeSource, SourceError};
use super::stub::Stub;
use super::triple::TripleRow;
use crate::catalog::{Product, Registry};
use crate::storage::{ProductStore, StorageError};
use serde::Deserialize;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Warnings kept in `RunReport::warning_sample`; the rest are only counted and logged
pub const WARNING_SAMPLE: usize = 100;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Reconcile(#[from] ReconcileError),

    #[error("Knowledge source error: {0}")]
    Source(#[from] SourceError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("worker task failed: {0}")]
    Worker(String),

    #[error("run cancelled")]
    Cancelled,
}

/// A failed run and how far it got
#[derive(Debug, Error)]
#[error("enrichment aborted after line {last_committed_line} ({persisted} products persisted): {error}")]
pub struct RunAborted {
    #[source]
    pub error: PipelineError,
    /// Last stub line covered by a committed batch; 0 when nothing committed
    pub last_committed_line: u64,
    pub persisted: u64,
}

/// Summary of a completed run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunReport {
    pub lines_read: u64,
    pub stubs_accepted: u64,
    pub malformed_lines: u64,
    pub dropped_without_categories: u64,
    pub batches: u64,
    pub products_persisted: u64,
    pub dropped_without_label: u64,
    pub warnings: u64,
    /// The first `WARNING_SAMPLE` warnings of the run
    pub warning_sample: Vec<ValueWarning>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub batch_size: usize,
    /// Batches allowed to wait on the knowledge source at once
    pub workers: usize,
    /// Expected stream length, used only for progress percentages
    pub estimated_total_lines: Option<u64>,
    pub progress_every: u64,
    #[serde(flatten)]
    pub reconcile: ReconcileConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            batch_size: 10,
            workers: 1,
            estimated_total_lines: None,
            progress_every: 500,
            reconcile: ReconcileConfig::default(),
        }
    }
}

struct BatchOutcome {
    products: Vec<Product>,
    warnings: Vec<ValueWarning>,
    dropped_without_label: u64,
    last_line: u64,
}

type BatchHandle = JoinHandle<Result<BatchOutcome, PipelineError>>;

pub struct EnrichmentPipeline {
    store: Arc<dyn ProductStore>,
    source: Arc<dyn KnowledgeSource>,
    registry: Arc<Registry>,
    config: Arc<PipelineConfig>,
    resource_base: String,
    cancel: CancellationToken,
}

impl EnrichmentPipeline {
    pub fn new(store: Arc<dyn ProductStore>, source: Arc<dyn KnowledgeSource>, registry: Arc<Registry>) -> Self {
        Self {
            store,
            source,
            registry,
            config: Arc::new(PipelineConfig::default()),
            resource_base: "http://dbpedia.org/resource/".to_string(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_config(mut self, config: PipelineConfig) -> Self {
        self.config = Arc::new(PipelineConfig {
            batch_size: config.batch_size.max(1),
            workers: config.workers.max(1),
            ..config
        });
        self
    }

    /// IRI base that subjects are expanded against in the batch query
    pub fn with_resource_base(mut self, base: impl Into<String>) -> Self {
        self.resource_base = base.into();
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub async fn run<R>(&self, stubs: R) -> Result<RunReport, RunAborted>
    where
        R: AsyncBufRead + Unpin,
    {
        self.run_with_progress(stubs, Arc::new(Progress::new())).await
    }

    /// Run the pipeline, publishing counters to `progress` as it goes.
    ///
    /// The product collection is cleared before the first line is read.
    pub async fn run_with_progress<R>(&self, stubs: R, progress: Arc<Progress>) -> Result<RunReport, RunAborted>
    where
        R: AsyncBufRead + Unpin,
    {
        let started = Instant::now();
        let mut report = RunReport::default();
        let mut in_flight: VecDeque<BatchHandle> = VecDeque::new();

        info!(
            batch_size = self.config.batch_size,
            workers = self.config.workers,
            "starting enrichment run"
        );

        let store = Arc::clone(&self.store);
        let cleared = tokio::task::spawn_blocking(move || store.delete_all_products())
            .await
            .map_err(|e| PipelineError::Worker(e.to_string()))
            .and_then(|r| r.map_err(PipelineError::from));
        match cleared {
            Ok(removed) => info!(removed, "cleared product collection"),
            Err(e) => return Err(self.abort(e, &progress, &mut in_flight)),
        }

        let mut lines = stubs.lines();
        let mut batch: Vec<Stub> = Vec::with_capacity(self.config.batch_size);
        let mut line_no = 0u64;

        loop {
            if self.cancel.is_cancelled() {
                return Err(self.abort(PipelineError::Cancelled, &progress, &mut in_flight));
            }
            let line = match lines.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => break,
                Err(e) => return Err(self.abort(e.into(), &progress, &mut in_flight)),
            };
            line_no += 1;
            report.lines_read = line_no;
            progress.record_line(line_no);
            self.log_progress(&progress, line_no);

            match Stub::parse(&line) {
                Err(e) => {
                    warn!(line = line_no, error = %e, "skipping malformed stub");
                    report.malformed_lines += 1;
                    continue;
                }
                Ok(stub) if !stub.has_categories() => {
                    debug!(line = line_no, subject = %stub.subject, "dropping stub without categories");
                    report.dropped_without_categories += 1;
                    continue;
                }
                Ok(stub) => {
                    report.stubs_accepted += 1;
                    batch.push(stub);
                }
            }

            if batch.len() == self.config.batch_size {
                let full = std::mem::replace(&mut batch, Vec::with_capacity(self.config.batch_size));
                in_flight.push_back(self.spawn_batch(full, line_no));
                while in_flight.len() >= self.config.workers {
                    if let Err(e) = self.commit_next(&mut in_flight, &mut report, &progress).await {
                        return Err(self.abort(e, &progress, &mut in_flight));
                    }
                }
            }
        }

        if !batch.is_empty() {
            in_flight.push_back(self.spawn_batch(batch, line_no));
        }
        while !in_flight.is_empty() {
            if let Err(e) = self.commit_next(&mut in_flight, &mut report, &progress).await {
                return Err(self.abort(e, &progress, &mut in_flight));
            }
        }

        info!(
            lines = report.lines_read,
            persisted = report.products_persisted,
            batches = report.batches,
            warnings = report.warnings,
            ms = started.elapsed().as_millis() as u64,
            "enrichment run complete"
        );
        Ok(report)
    }

    /// Query, fan out and reconcile one batch on a worker task
    fn spawn_batch(&self, stubs: Vec<Stub>, last_line: u64) -> BatchHandle {
        let source = Arc::clone(&self.source);
        let registry = Arc::clone(&self.registry);
        let config = Arc::clone(&self.config);
        let subjects: Vec<&str> = stubs.iter().map(|s| s.subject.as_str()).collect();
        let query = BatchQuery::new(self.resource_base.as_str())
            .with_resource_prefix(config.reconcile.resource_prefix.as_str())
            .build(&subjects);

        tokio::spawn(async move {
            let started = Instant::now();
            let rows = source.select(&query).await?;

            let mut by_subject: HashMap<String, Vec<TripleRow>> = HashMap::new();
            for row in rows {
                by_subject.entry(row.subject.clone()).or_default().push(row);
            }

            let reconciler = Reconciler::new(&registry, &config.reconcile);
            let mut outcome = BatchOutcome {
                products: Vec::with_capacity(stubs.len()),
                warnings: Vec::new(),
                dropped_without_label: 0,
                last_line,
            };
            for stub in stubs {
                let rows = by_subject.get(&stub.subject).map(Vec::as_slice).unwrap_or(&[]);
                match reconciler.reconcile(&stub.subject, rows)? {
                    Some(mut reconciled) => {
                        outcome.warnings.append(&mut reconciled.warnings);
                        outcome.products.push(stub.into_product(reconciled, &config.reconcile));
                    }
                    None => {
                        debug!(subject = %stub.subject, "dropping entity without label");
                        outcome.dropped_without_label += 1;
                    }
                }
            }

            debug!(
                last_line,
                products = outcome.products.len(),
                ms = started.elapsed().as_millis() as u64,
                "batch reconciled"
            );
            Ok(outcome)
        })
    }

    /// Wait for the oldest batch and write it to the store
    async fn commit_next(
        &self,
        in_flight: &mut VecDeque<BatchHandle>,
        report: &mut RunReport,
        progress: &Progress,
    ) -> Result<(), PipelineError> {
        let Some(handle) = in_flight.pop_front() else {
            return Ok(());
        };
        let outcome = handle.await.map_err(|e| PipelineError::Worker(e.to_string()))??;

        for warning in &outcome.warnings {
            warn!(
                subject = %warning.subject,
                attribute = %warning.attribute,
                raw = %warning.raw,
                "{}",
                warning
            );
        }

        let count = outcome.products.len() as u64;
        if count > 0 {
            let store = Arc::clone(&self.store);
            let products = outcome.products;
            tokio::task::spawn_blocking(move || store.insert_products(&products))
                .await
                .map_err(|e| PipelineError::Worker(e.to_string()))??;
        }

        progress.record_commit(outcome.last_line, count);
        report.batches += 1;
        report.products_persisted += count;
        report.dropped_without_label += outcome.dropped_without_label;
        report.warnings += outcome.warnings.len() as u64;
        let room = WARNING_SAMPLE.saturating_sub(report.warning_sample.len());
        report.warning_sample.extend(outcome.warnings.into_iter().take(room));
        Ok(())
    }

    fn abort(&self, error: PipelineError, progress: &Progress, in_flight: &mut VecDeque<BatchHandle>) -> RunAborted {
        for handle in in_flight.drain(..) {
            handle.abort();
        }
        let aborted = RunAborted {
            error,
            last_committed_line: progress.committed_line(),
            persisted: progress.persisted(),
        };
        error!(
            last_committed_line = aborted.last_committed_line,
            persisted = aborted.persisted,
            error = %aborted.error,
            "enrichment run aborted"
        );
        aborted
    }

    fn log_progress(&self, progress: &Progress, line_no: u64) {
        let every = self.config.progress_every;
        if every == 0 || line_no % every != 0 {
            return;
        }
        let snap = progress.snapshot();
        match self.config.estimated_total_lines.and_then(|total| snap.percent(total)) {
            Some(percent) => info!(
                line = line_no,
                persisted = snap.persisted,
                "{:.2}% of estimated stream read",
                percent
            ),
            None => info!(line = line_no, persisted = snap.persisted, "enrichment progress"),
        }
    }
}
