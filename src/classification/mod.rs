//! Classification pipeline.
//!
//! A run moves through four stages, each awaited before the next starts:
//!
//! 1. **Extract** compiles every stated definition into EL++ axioms;
//! 2. **Load** hands the axioms to the [`Classifier`](crate::reasoner::Classifier);
//! 3. **Classify** computes the taxonomy;
//! 4. **Process** rebuilds each concept's inferred definition, keeps it only
//!    when it changed, and commits every change in one transaction.
//!
//! Extract and Process fan out per concept on the pipeline's thread pool.

pub mod alerts;
pub mod extract;
pub mod orchestrator;
pub mod process;
pub mod progress;
pub mod results;

pub use alerts::{Alert, AlertSink};
pub use extract::{AxiomExtractor, AxiomWorkingSet};
pub use orchestrator::ClassificationPipeline;
pub use process::{InferredWriter, WriteOutcome};
pub use progress::{ProgressSink, Stage, TracingProgress};
pub use results::ClassifierResults;

use tokio_util::sync::CancellationToken;

use crate::config::ClassifierSettings;
use crate::logic::LogicError;
use crate::reasoner::ClassifierError;
use crate::store::{Nid, SemanticStore, StampCoordinate, StoreError};
use progress::StageProgress;

/// Errors that abort a classification run.
#[derive(Debug, thiserror::Error)]
pub enum ClassificationError {
    /// A stated definition violates the tree shape required for extraction.
    #[error("malformed definition of concept `{concept}`: {source}")]
    Structural {
        concept: Nid,
        #[source]
        source: LogicError,
    },
    /// A stated definition uses a construct outside the EL++ profile.
    #[error("concept `{concept}` uses unsupported {construct} at vertex {index}")]
    Unsupported {
        concept: Nid,
        index: usize,
        construct: String,
    },
    /// An inferred definition could not be assembled.
    #[error("cannot build inferred definition of concept `{concept}`: {source}")]
    Inference {
        concept: Nid,
        #[source]
        source: LogicError,
    },
    #[error(transparent)]
    Classifier(#[from] ClassifierError),
    #[error(transparent)]
    Store(#[from] StoreError),
    /// The run was cancelled; nothing was committed.
    #[error("classification cancelled during the {stage} stage")]
    Cancelled { stage: Stage },
    /// The data-parallel thread pool could not be created.
    #[error("cannot start classification workers: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
    /// A stage's worker task failed.
    #[error("{stage} stage aborted: {message}")]
    Aborted { stage: Stage, message: String },
}

/// Shared, read-only state of one data-parallel stage.
pub(crate) struct RunContext<'a> {
    pub(crate) store: &'a dyn SemanticStore,
    pub(crate) settings: &'a ClassifierSettings,
    pub(crate) coordinate: StampCoordinate,
    pub(crate) alerts: &'a AlertSink,
    pub(crate) progress: &'a StageProgress,
    pub(crate) cancellation: &'a CancellationToken,
}
