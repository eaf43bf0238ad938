use std::sync::Arc;

use async_trait::async_trait;

use super::structural::StructuralClassifier;
use super::taxonomy::Taxonomy;
use super::terms::Axiom;
use crate::config::{ClassifierBackend, ClassifierSettings};

/// Errors raised by classifier backends.
#[derive(Debug, thiserror::Error)]
pub enum ClassifierError {
    /// The backend refused an axiom it cannot represent.
    #[error("classifier rejected axiom `{axiom}`: {reason}")]
    Rejected { axiom: String, reason: String },
    /// Classification itself failed.
    #[error("classification failed: {0}")]
    Failed(String),
    /// The blocking task running the backend panicked or was cancelled.
    #[error("classifier task aborted: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Description-logic classifier consumed as a black box.
#[async_trait]
pub trait Classifier {
    /// Backend name used in logs and results.
    fn name(&self) -> &str;

    /// Loads the axioms of one run into a fresh ontology.
    async fn load(&self, axioms: Vec<Axiom>) -> Result<Box<LoadedOntologyHandle>, ClassifierError>;
}

/// Ontology loaded into a classifier, ready to be classified once.
#[async_trait]
pub trait LoadedOntology {
    /// Number of axioms accepted by the backend.
    fn axiom_count(&self) -> usize;

    /// Computes the taxonomy of the loaded axioms.
    async fn classify(&self) -> Result<Taxonomy, ClassifierError>;
}

/// Type alias simplifying classifier trait object usage inside the pipeline.
pub type ClassifierHandle = dyn Classifier + Send + Sync + 'static;
/// Type alias simplifying loaded ontology trait object usage.
pub type LoadedOntologyHandle = dyn LoadedOntology + Send + Sync + 'static;

/// Builds the classifier selected by configuration.
#[must_use]
pub fn from_settings(settings: &ClassifierSettings) -> Arc<ClassifierHandle> {
    match settings.backend {
        ClassifierBackend::Structural => Arc::new(StructuralClassifier::new()),
    }
}
