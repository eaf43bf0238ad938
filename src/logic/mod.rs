//! Logical definitions of concepts.
//!
//! A definition is stored as a generic [`DiTree`] of vertices tagged with a
//! [`Meaning`]. [`LogicalExpression`] binds a typed [`LogicalAxiom`] to every
//! vertex, [`ExpressionBuilder`] assembles new definitions, and [`correlate`]
//! compares two definitions for change detection.

pub mod axiom;
pub mod builder;
pub mod correlate;
pub mod expression;
pub mod graph;
pub mod meaning;

pub use axiom::{
    Atom, ConceptAxiom, Connective, ConnectiveKind, DefinitionRoot, DisjointWithAxiom,
    FeatureAxiom, Literal, LiteralValue, LogicalAxiom, LogicalSet, PropertyPatternImplication,
    RoleAxiom, SetKind, TypedAtom,
};
pub use builder::ExpressionBuilder;
pub use correlate::{correlate, Correlation};
pub use expression::LogicalExpression;
pub use graph::{DiTree, EntityVertex, VertexId};
pub use meaning::{ConcreteDomainOperator, Meaning, PropertyKey, PropertyValue, RoleOperator};

use thiserror::Error;

use crate::store::Nid;

/// Errors raised while adapting, building or navigating definition trees.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum LogicError {
    /// A vertex meaning is not part of the vocabulary.
    #[error("unknown vertex meaning `{meaning}`")]
    UnknownMeaning { meaning: Nid },
    /// A typed view was requested for a vertex of another meaning.
    #[error("vertex {index} is {actual}, expected {expected}")]
    KindMismatch {
        index: usize,
        expected: Meaning,
        actual: Meaning,
    },
    /// A property required by the vertex meaning is absent or mistyped.
    #[error("vertex {index} is missing property {key:?}")]
    MissingProperty { index: usize, key: PropertyKey },
    /// A vertex does not have the single child its meaning requires.
    #[error("{meaning} vertex {index} has {count} children, expected exactly one")]
    ChildCount {
        index: usize,
        meaning: Meaning,
        count: usize,
    },
    /// A necessary or sufficient set whose single child is not an `AND`.
    #[error("{set} vertex {index} must contain an AND, found {actual}")]
    ExpectedConjunction {
        index: usize,
        set: Meaning,
        actual: Meaning,
    },
    /// A child vertex has a kind its parent cannot hold.
    #[error("vertex {index} is not a valid child of vertex {parent}")]
    UnexpectedChild { index: usize, parent: usize },
    /// The generic tree violates the tree invariants.
    #[error("malformed tree: {0}")]
    MalformedTree(String),
    /// A builder mutator was called after `build`.
    #[error("expression builder has already been built")]
    AlreadyBuilt,
    /// An atom was wired under a second parent.
    #[error("vertex {index} is already attached to a parent")]
    AlreadyAttached { index: usize },
    /// An atom handle does not belong to this builder.
    #[error("vertex {index} does not belong to this builder")]
    ForeignAxiom { index: usize },
    /// An atom was created but never wired into the tree.
    #[error("vertex {index} was never attached to the definition")]
    Detached { index: usize },
}
