//! External enrichment ingestion
//!
//! ```text
//! stub stream ──► batches ──► KnowledgeSource::select (one per batch)
//!                                  │
//!                     rows fanned out by subject
//!                                  ▼
//!                     Reconciler ──► Product ──► ProductStore (ordered commit)
//! ```

mod cancel;
mod pipeline;
mod progress;
mod reconcile;
mod source;
mod sparql;
mod stub;
mod triple;

pub use cancel::CancellationToken;
pub use pipeline::{EnrichmentPipeline, PipelineConfig, PipelineError, RunAborted, RunReport, WARNING_SAMPLE};
pub use progress::{Progress, ProgressSnapshot};
pub use reconcile::{ReconcileConfig, ReconcileError, Reconciled, Reconciler, ValueWarning, WarningKind};
pub use source::{BatchQuery, KnowledgeSource, SourceError};
pub use sparql::{parse_results, SparqlConfig, SparqlEndpoint, DEFAULT_PREFIXES};
pub use stub::{lower_first, Stub, StubInfo};
pub use triple::{local_name, strip_langtag, TripleRow};
