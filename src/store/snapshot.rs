//! JSON terminology snapshots.
//!
//! A snapshot lists concepts with their stated (and optionally previously
//! inferred) definitions written as nested sets and atoms:
//!
//! ```json
//! {
//!   "concepts": [
//!     { "nid": 10, "stated": [ { "necessary": [ { "and": [ { "concept": 1 } ] } ] } ] },
//!     { "nid": 11, "stated": [ { "sufficient": [ { "and": [
//!         { "concept": 10 },
//!         { "role": { "type": 5, "operator": "existential", "restriction": { "concept": 3 } } }
//!     ] } ] } ] }
//!   ]
//! }
//! ```
//!
//! Definitions are assembled through [`ExpressionBuilder`] and written to a
//! [`SemanticStore`] in a single transaction.

use std::fs;
use std::path::Path;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::entities::{CommitCoordinate, SemanticRecord, SemanticVersion, Stamp, State};
use super::repositories::{SemanticStore, Transaction};
use super::value_objects::Nid;
use super::StoreError;
use crate::config::{PatternSettings, StampSettings};
use crate::logic::{
    Atom, ConcreteDomainOperator, DiTree, ExpressionBuilder, LogicError, LogicalExpression,
    RoleOperator,
};

/// Atom description inside a snapshot definition.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AtomSpec {
    And(Vec<AtomSpec>),
    Or(Vec<AtomSpec>),
    Concept(Nid),
    DisjointWith(Nid),
    Role {
        #[serde(rename = "type")]
        role_type: Nid,
        operator: RoleOperator,
        restriction: Box<AtomSpec>,
    },
    Feature {
        #[serde(rename = "type")]
        feature_type: Nid,
        operator: ConcreteDomainOperator,
        literal: Box<AtomSpec>,
    },
    Boolean(bool),
    Float(f64),
    Integer(i64),
    Instant(DateTime<Utc>),
    String(String),
    PropertyPatternImplication {
        pattern: Vec<Nid>,
        implication: Nid,
    },
}

/// Top-level logical set of a snapshot definition.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SetSpec {
    Necessary(Vec<AtomSpec>),
    Sufficient(Vec<AtomSpec>),
    Property(Vec<AtomSpec>),
}

/// A concept and its definitions.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConceptSpec {
    pub nid: Nid,
    #[serde(default)]
    pub stated: Vec<SetSpec>,
    /// Previously committed inferred definition, if any.
    #[serde(default)]
    pub inferred: Option<Vec<SetSpec>>,
}

/// Parsed terminology snapshot document.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TerminologySnapshot {
    #[serde(default)]
    pub concepts: Vec<ConceptSpec>,
}

impl TerminologySnapshot {
    /// Reads and parses a snapshot file.
    ///
    /// # Errors
    ///
    /// Returns an error when the file cannot be read or is not a snapshot.
    pub fn from_file(path: &Path) -> Result<Self, StoreError> {
        let content = fs::read_to_string(path).map_err(|source| StoreError::SnapshotIo {
            path: path.to_path_buf(),
            source,
        })?;
        content.parse()
    }

    /// Builds the definition tree of one list of sets.
    ///
    /// # Errors
    ///
    /// Returns the builder error raised by an inconsistent definition.
    pub fn build_definition(sets: &[SetSpec]) -> Result<LogicalExpression, LogicError> {
        let mut builder = ExpressionBuilder::new();
        for set in sets {
            match set {
                SetSpec::Necessary(atoms) => {
                    let elements = build_atoms(&mut builder, atoms)?;
                    builder.necessary_set(elements)?;
                }
                SetSpec::Sufficient(atoms) => {
                    let elements = build_atoms(&mut builder, atoms)?;
                    builder.sufficient_set(elements)?;
                }
                SetSpec::Property(atoms) => {
                    let elements = build_atoms(&mut builder, atoms)?;
                    builder.property_set(elements)?;
                }
            }
        }
        builder.build()
    }

    /// Writes every definition to `store` as new semantics under one commit.
    ///
    /// # Errors
    ///
    /// Returns an error when a definition cannot be built or the store rejects
    /// the transaction. Nothing is written in that case.
    pub fn load_into(
        &self,
        store: &dyn SemanticStore,
        patterns: &PatternSettings,
        stamp: &StampSettings,
    ) -> Result<CommitCoordinate, StoreError> {
        let transaction = Transaction::new("terminology snapshot", stamp.path);
        let new_stamp =
            || Stamp::uncommitted(State::Active, stamp.author, stamp.module, stamp.path);
        let mut stated = 0_usize;
        let mut inferred = 0_usize;

        for concept in &self.concepts {
            if !concept.stated.is_empty() {
                let tree = definition_tree(concept.nid, &concept.stated)?;
                transaction.add_component(SemanticRecord::new(
                    store.new_nid()?,
                    patterns.stated,
                    concept.nid,
                    SemanticVersion::new(new_stamp(), tree),
                ));
                stated += 1;
            }
            if let Some(sets) = &concept.inferred {
                let tree = definition_tree(concept.nid, sets)?;
                transaction.add_component(SemanticRecord::new(
                    store.new_nid()?,
                    patterns.inferred,
                    concept.nid,
                    SemanticVersion::new(new_stamp(), tree),
                ));
                inferred += 1;
            }
        }

        let coordinate = store.commit(transaction)?;
        info!(
            concepts = self.concepts.len(),
            stated,
            inferred,
            transaction = %coordinate.transaction,
            "terminology_snapshot_loaded"
        );
        Ok(coordinate)
    }
}

impl FromStr for TerminologySnapshot {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        serde_json::from_str(s).map_err(StoreError::SnapshotFormat)
    }
}

fn definition_tree(concept: Nid, sets: &[SetSpec]) -> Result<DiTree, StoreError> {
    TerminologySnapshot::build_definition(sets)
        .map(LogicalExpression::into_tree)
        .map_err(|source| StoreError::Definition { concept, source })
}

fn build_atoms(builder: &mut ExpressionBuilder, atoms: &[AtomSpec]) -> Result<Vec<Atom>, LogicError> {
    atoms.iter().map(|atom| build_atom(builder, atom)).collect()
}

fn build_atom(builder: &mut ExpressionBuilder, atom: &AtomSpec) -> Result<Atom, LogicError> {
    match atom {
        AtomSpec::And(elements) => {
            let elements = build_atoms(builder, elements)?;
            builder.and(elements)
        }
        AtomSpec::Or(elements) => {
            let elements = build_atoms(builder, elements)?;
            builder.or(elements)
        }
        AtomSpec::Concept(nid) => builder.concept(*nid),
        AtomSpec::DisjointWith(nid) => builder.disjoint_with(*nid),
        AtomSpec::Role {
            role_type,
            operator,
            restriction,
        } => {
            let restriction = build_atom(builder, restriction)?;
            builder.role(*role_type, *operator, restriction)
        }
        AtomSpec::Feature {
            feature_type,
            operator,
            literal,
        } => {
            let literal = build_atom(builder, literal)?;
            builder.feature(*feature_type, *operator, literal)
        }
        AtomSpec::Boolean(value) => builder.boolean_literal(*value),
        AtomSpec::Float(value) => builder.float_literal(*value),
        AtomSpec::Integer(value) => builder.integer_literal(*value),
        AtomSpec::Instant(value) => builder.instant_literal(*value),
        AtomSpec::String(value) => builder.string_literal(value.clone()),
        AtomSpec::PropertyPatternImplication {
            pattern,
            implication,
        } => builder.property_pattern_implication(pattern.clone(), *implication),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::{Meaning, SetKind};
    use crate::store::{InMemorySemanticStore, StampCoordinate};

    const DOCUMENT: &str = r#"{
        "concepts": [
            { "nid": 10, "stated": [ { "necessary": [ { "and": [ { "concept": 1 } ] } ] } ] },
            { "nid": 11, "stated": [ { "sufficient": [ { "and": [
                { "concept": 10 },
                { "role": { "type": 5, "operator": "existential", "restriction": { "concept": 3 } } }
            ] } ] } ],
              "inferred": [ { "necessary": [ { "and": [ { "concept": 10 } ] } ] } ] },
            { "nid": 12, "stated": [ { "necessary": [ { "and": [
                { "feature": { "type": 6, "operator": "greater_than", "literal": { "integer": 3 } } }
            ] } ] } ] }
        ]
    }"#;

    #[test]
    fn parses_nested_definitions() {
        let snapshot: TerminologySnapshot = DOCUMENT.parse().expect("snapshot");
        assert_eq!(snapshot.concepts.len(), 3);
        let expression =
            TerminologySnapshot::build_definition(&snapshot.concepts[1].stated).expect("build");
        assert_eq!(expression.logical_sets(SetKind::Sufficient).len(), 1);
        assert!(expression.contains(Meaning::Role));
        assert!(expression.validate().is_empty());
    }

    #[test]
    fn loads_stated_and_inferred_semantics_in_one_commit() {
        let snapshot: TerminologySnapshot = DOCUMENT.parse().expect("snapshot");
        let store = InMemorySemanticStore::new();
        let patterns = PatternSettings::default();
        let stamp = StampSettings::default();
        let coordinate = snapshot
            .load_into(&store, &patterns, &stamp)
            .expect("load");

        assert_eq!(store.semantics_of_pattern(patterns.stated).expect("stated").len(), 3);
        let inferred = store
            .semantics_for_component(Nid::new(11), patterns.inferred)
            .expect("inferred");
        assert_eq!(inferred.len(), 1);
        let version = store
            .latest_version(inferred[0], &StampCoordinate::latest(stamp.path))
            .expect("lookup")
            .expect("visible");
        assert_eq!(version.stamp().time(), Some(coordinate.time));
    }

    #[test]
    fn rejects_unknown_atoms() {
        let err = r#"{ "concepts": [ { "nid": 1, "stated": [ { "necessary": [ { "bogus": 1 } ] } ] } ] }"#
            .parse::<TerminologySnapshot>()
            .expect_err("unknown atom");
        assert!(matches!(err, StoreError::SnapshotFormat(_)));
    }
}
