//! Classification of description-logic concept definitions.
//!
//! Stated definitions are read from a [`store::SemanticStore`], compiled into
//! EL++ axioms, classified by a pluggable [`reasoner::Classifier`], and the
//! resulting taxonomy is written back as inferred definitions. The
//! [`classification::ClassificationPipeline`] drives a run end to end.

pub mod classification;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod errors;
pub mod logger;
pub mod logic;
pub mod reasoner;
pub mod store;

pub use errors::Error;

/// Application results options list
pub type Result<T, E = Error> = std::result::Result<T, E>;
