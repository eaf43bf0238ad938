//! Write-back of classifier output as inferred definitions.

use std::collections::BTreeSet;

use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, error};

use super::alerts::{Alert, AlertSink};
use super::progress::Stage;
use super::{ClassificationError, RunContext};
use crate::config::ClassifierSettings;
use crate::logic::{correlate, ExpressionBuilder, LogicError, LogicalAxiom, LogicalExpression, SetKind};
use crate::reasoner::{label_of, Taxonomy, BOTTOM_LABEL, TOP_LABEL};
use crate::store::{
    Nid, SemanticRecord, SemanticStore, SemanticVersion, Stamp, StampCoordinate, State,
    Transaction,
};

/// Result of writing one concept's inferred definition.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteOutcome {
    /// First inferred semantic created for the concept.
    Created,
    /// A new version was appended to the existing inferred semantic.
    Changed,
    /// The candidate matches the committed inferred definition.
    Unchanged,
    /// No parents and no sufficient sets: nothing to write.
    NoWrite,
    /// More than one inferred semantic exists; the concept was skipped.
    IntegrityError,
}

impl WriteOutcome {
    #[must_use]
    pub fn is_change(self) -> bool {
        matches!(self, Self::Created | Self::Changed)
    }
}

/// Builds candidate inferred definitions and stages them in a transaction.
pub struct InferredWriter<'a> {
    store: &'a dyn SemanticStore,
    taxonomy: &'a Taxonomy,
    settings: &'a ClassifierSettings,
    coordinate: StampCoordinate,
    transaction: &'a Transaction,
    alerts: &'a AlertSink,
}

impl<'a> InferredWriter<'a> {
    #[must_use]
    pub fn new(
        store: &'a dyn SemanticStore,
        taxonomy: &'a Taxonomy,
        settings: &'a ClassifierSettings,
        transaction: &'a Transaction,
        alerts: &'a AlertSink,
    ) -> Self {
        Self {
            store,
            taxonomy,
            settings,
            coordinate: StampCoordinate::latest(settings.stamp.path),
            transaction,
            alerts,
        }
    }

    /// Parent concepts of `concept`: every member of each direct parent's
    /// equivalence class, sentinels and `concept` itself excluded. An
    /// equivalent concept listed as a direct parent stays a parent.
    #[must_use]
    pub fn parents(&self, concept: Nid) -> BTreeSet<Nid> {
        let mut parents = BTreeSet::new();
        let own = label_of(concept);
        let Some(node) = self.taxonomy.node(&own) else {
            debug!(concept = %concept, "concept_missing_from_taxonomy");
            return parents;
        };
        for parent in node.parents() {
            let members = self
                .taxonomy
                .node(parent)
                .map(|parent_node| parent_node.equivalents().iter().collect::<Vec<_>>())
                .unwrap_or_else(|| vec![parent]);
            for label in members {
                if label == TOP_LABEL || label == BOTTOM_LABEL || *label == own {
                    continue;
                }
                match label.parse::<Nid>() {
                    Ok(nid) => {
                        parents.insert(nid);
                    }
                    Err(_) => self.alerts.raise(Alert::UnparsableLabel {
                        concept,
                        label: label.clone(),
                    }),
                }
            }
        }
        parents
    }

    /// Candidate inferred definition of `concept`, or `None` when it would be
    /// empty.
    ///
    /// # Errors
    ///
    /// Fails when the stated definition cannot be read or adapted.
    pub fn candidate(
        &self,
        concept: Nid,
        stated_semantic: Option<Nid>,
    ) -> Result<Option<LogicalExpression>, ClassificationError> {
        let inference = |source: LogicError| ClassificationError::Inference { concept, source };
        let mut builder = ExpressionBuilder::new();
        let mut sufficient_sets = 0_usize;

        if let Some(semantic) = stated_semantic {
            if let Some(version) = self.store.latest_version(semantic, &self.coordinate)? {
                let stated = LogicalExpression::new(version.tree().clone())
                    .map_err(|source| ClassificationError::Structural { concept, source })?;
                for set in stated.logical_sets(SetKind::Sufficient) {
                    builder
                        .add_cloned(&stated, &LogicalAxiom::LogicalSet(set.clone()))
                        .map_err(inference)?;
                    sufficient_sets += 1;
                }
            }
        }

        let parents = self.parents(concept);
        if !parents.is_empty() {
            let concepts = parents
                .into_iter()
                .map(|parent| builder.concept(parent))
                .collect::<Result<Vec<_>, _>>()
                .map_err(inference)?;
            let and = builder.and(concepts).map_err(inference)?;
            builder.necessary_set([and]).map_err(inference)?;
        } else if sufficient_sets == 0 {
            return Ok(None);
        }
        builder.build().map(Some).map_err(inference)
    }

    fn stamp(&self) -> Stamp {
        let stamp = &self.settings.stamp;
        Stamp::uncommitted(State::Active, stamp.author, stamp.module, stamp.path)
    }

    /// Compares the candidate against the committed inferred definition and
    /// stages a new semantic or version when it differs.
    ///
    /// # Errors
    ///
    /// Fails on store errors and on definitions that cannot be built.
    pub fn write(
        &self,
        concept: Nid,
        stated_semantic: Option<Nid>,
    ) -> Result<WriteOutcome, ClassificationError> {
        let Some(candidate) = self.candidate(concept, stated_semantic)? else {
            return Ok(WriteOutcome::NoWrite);
        };
        let inferred_pattern = self.settings.patterns.inferred;
        let existing = self
            .store
            .semantics_for_component(concept, inferred_pattern)?;

        match existing.as_slice() {
            [] => {
                let record = SemanticRecord::new(
                    self.store.new_nid()?,
                    inferred_pattern,
                    concept,
                    SemanticVersion::new(self.stamp(), candidate.into_tree()),
                );
                self.transaction.add_component(record);
                Ok(WriteOutcome::Created)
            }
            [semantic] => {
                let Some(mut record) = self.store.record(*semantic)? else {
                    return Ok(WriteOutcome::NoWrite);
                };
                let tree = match record.latest(&self.coordinate) {
                    Some(previous) => {
                        let previous = LogicalExpression::new(previous.tree().clone())
                            .map_err(|source| ClassificationError::Structural { concept, source })?;
                        let correlation = correlate(&previous, &candidate)
                            .map_err(|source| ClassificationError::Inference { concept, source })?;
                        if !correlation.changed {
                            return Ok(WriteOutcome::Unchanged);
                        }
                        correlation.merged.into_tree()
                    }
                    None => candidate.into_tree(),
                };
                record.add_version(SemanticVersion::new(self.stamp(), tree));
                self.transaction.add_component(record);
                Ok(WriteOutcome::Changed)
            }
            semantics => {
                error!(
                    concept = %concept,
                    semantics = ?semantics,
                    "inferred_semantic_integrity_error"
                );
                self.alerts.raise(Alert::MultipleInferredSemantics {
                    concept,
                    semantics: semantics.to_vec(),
                });
                Ok(WriteOutcome::IntegrityError)
            }
        }
    }
}

/// Process stage: writes every classified concept into `transaction`.
///
/// Returns the outcome of each concept that ran, ascending by concept.
pub(crate) fn process_all(
    context: &RunContext<'_>,
    taxonomy: &Taxonomy,
    transaction: &Transaction,
    concepts: &[(Nid, Option<Nid>)],
) -> Result<Vec<(Nid, WriteOutcome)>, ClassificationError> {
    let writer = InferredWriter::new(
        context.store,
        taxonomy,
        context.settings,
        transaction,
        context.alerts,
    );
    let outcomes: Vec<Option<(Nid, WriteOutcome)>> = concepts
        .par_iter()
        .map(|&(concept, stated_semantic)| {
            if context.cancellation.is_cancelled() {
                return Ok(None);
            }
            let outcome = writer.write(concept, stated_semantic);
            context.progress.tick();
            outcome.map(|outcome| Some((concept, outcome)))
        })
        .collect::<Result<_, ClassificationError>>()?;

    if context.cancellation.is_cancelled() {
        return Err(ClassificationError::Cancelled {
            stage: Stage::Process,
        });
    }
    let mut outcomes: Vec<(Nid, WriteOutcome)> = outcomes.into_iter().flatten().collect();
    outcomes.sort_by_key(|(concept, _)| *concept);
    Ok(outcomes)
}
