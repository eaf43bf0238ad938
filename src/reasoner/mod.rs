//! Boundary to the description-logic classifier.
//!
//! Extraction produces [`Axiom`]s over reasoner-facing terms obtained from a
//! per-run [`TermFactory`]. A [`Classifier`] loads them and yields a
//! [`Taxonomy`] queryable by the same string labels.

pub mod classifier;
pub mod factory;
pub mod structural;
pub mod taxonomy;
pub mod terms;

pub use classifier::{
    from_settings, Classifier, ClassifierError, ClassifierHandle, LoadedOntology,
    LoadedOntologyHandle,
};
pub use factory::TermFactory;
pub use structural::StructuralClassifier;
pub use taxonomy::{Taxonomy, TaxonomyNode};
pub use terms::{
    label_of, Axiom, ConceptTerm, NamedConcept, NamedFeature, NamedRole, BOTTOM_LABEL, TOP_LABEL,
};
