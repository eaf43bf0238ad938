//! Compilation of stated definitions into classifier axioms.

use std::collections::BTreeSet;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use rayon::prelude::*;
use tracing::debug;

use super::alerts::Alert;
use super::progress::Stage;
use super::{ClassificationError, RunContext};
use crate::logic::{
    Atom, Connective, LogicError, LogicalExpression, LogicalSet, RoleOperator, SetKind, TypedAtom,
};
use crate::reasoner::{Axiom, ConceptTerm, TermFactory};
use crate::store::Nid;

/// Axioms extracted from one stated semantic.
#[derive(Clone, Debug)]
struct Extraction {
    semantic: Nid,
    axioms: Vec<Axiom>,
}

/// Per-run aggregate shared by every extraction thread.
///
/// Holds the deduplicating term caches, the axioms of each concept and the
/// stated semantics that claimed each concept.
#[derive(Debug, Default)]
pub struct AxiomWorkingSet {
    factory: TermFactory,
    extractions: DashMap<Nid, Extraction>,
    claimants: DashMap<Nid, BTreeSet<Nid>>,
}

impl AxiomWorkingSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn factory(&self) -> &TermFactory {
        &self.factory
    }

    /// Records the axioms of `semantic` for `concept`.
    ///
    /// When several stated semantics reference the same concept, the one with
    /// the lowest identifier wins; the swap is a single atomic entry update.
    /// Returns whether `semantic` currently holds the concept.
    pub fn claim(&self, concept: Nid, semantic: Nid, axioms: Vec<Axiom>) -> bool {
        self.claimants.entry(concept).or_default().insert(semantic);
        match self.extractions.entry(concept) {
            Entry::Vacant(slot) => {
                slot.insert(Extraction { semantic, axioms });
                true
            }
            Entry::Occupied(mut held) => {
                if semantic < held.get().semantic {
                    held.insert(Extraction { semantic, axioms });
                    true
                } else {
                    false
                }
            }
        }
    }

    /// Concepts submitted to the classifier, ascending.
    #[must_use]
    pub fn concepts(&self) -> Vec<Nid> {
        let mut concepts: Vec<Nid> = self.extractions.iter().map(|entry| *entry.key()).collect();
        concepts.sort_unstable();
        concepts
    }

    /// Stated semantic whose axioms represent `concept`.
    #[must_use]
    pub fn stated_semantic(&self, concept: Nid) -> Option<Nid> {
        self.extractions.get(&concept).map(|entry| entry.semantic)
    }

    #[must_use]
    pub fn axioms_of(&self, concept: Nid) -> Option<Vec<Axiom>> {
        self.extractions.get(&concept).map(|entry| entry.axioms.clone())
    }

    /// Every axiom of the run, grouped by ascending concept.
    #[must_use]
    pub fn axioms(&self) -> Vec<Axiom> {
        self.concepts()
            .into_iter()
            .filter_map(|concept| self.axioms_of(concept))
            .flatten()
            .collect()
    }

    #[must_use]
    pub fn axiom_count(&self) -> usize {
        self.extractions.iter().map(|entry| entry.axioms.len()).sum()
    }

    /// Duplicate-definition alerts, one per concept claimed more than once.
    #[must_use]
    pub fn duplicate_alerts(&self) -> Vec<Alert> {
        let mut alerts: Vec<Alert> = self
            .claimants
            .iter()
            .filter(|entry| entry.value().len() > 1)
            .filter_map(|entry| {
                let mut semantics = entry.value().iter().copied();
                let kept = semantics.next()?;
                Some(Alert::DuplicateStatedDefinition {
                    concept: *entry.key(),
                    kept,
                    discarded: semantics.collect(),
                })
            })
            .collect();
        alerts.sort();
        alerts
    }
}

/// Compiles one stated definition into EL++ axioms.
pub struct AxiomExtractor<'a> {
    factory: &'a TermFactory,
}

impl<'a> AxiomExtractor<'a> {
    #[must_use]
    pub fn new(factory: &'a TermFactory) -> Self {
        Self { factory }
    }

    /// Axioms of `concept` defined by `expression`.
    ///
    /// # Errors
    ///
    /// Fails on a set without a single `AND` child, a role without a single
    /// restriction, or any construct outside the EL++ profile.
    pub fn extract(
        &self,
        concept: Nid,
        expression: &LogicalExpression,
    ) -> Result<Vec<Axiom>, ClassificationError> {
        let structural = |source: LogicError| ClassificationError::Structural { concept, source };
        let mut axioms = Vec::new();
        for set in expression.root().sets(expression).map_err(structural)? {
            match set.kind() {
                SetKind::Necessary => {
                    let definition = self.set_conjunction(concept, expression, set)?;
                    axioms.push(Axiom::ConceptInclusion {
                        sub: self.named(concept),
                        sup: definition,
                    });
                }
                SetKind::Sufficient => {
                    let definition = self.set_conjunction(concept, expression, set)?;
                    axioms.push(Axiom::ConceptInclusion {
                        sub: self.named(concept),
                        sup: definition.clone(),
                    });
                    axioms.push(Axiom::ConceptInclusion {
                        sub: definition,
                        sup: self.named(concept),
                    });
                }
                SetKind::Property => self.property_set(concept, expression, set, &mut axioms)?,
            }
        }
        Ok(axioms)
    }

    fn named(&self, concept: Nid) -> ConceptTerm {
        ConceptTerm::Named(self.factory.concept(concept))
    }

    fn set_conjunction(
        &self,
        concept: Nid,
        expression: &LogicalExpression,
        set: &LogicalSet,
    ) -> Result<ConceptTerm, ClassificationError> {
        let and = set
            .conjunction(expression)
            .map_err(|source| ClassificationError::Structural { concept, source })?;
        self.conjunction(concept, expression, and)
    }

    fn conjunction(
        &self,
        concept: Nid,
        expression: &LogicalExpression,
        and: &Connective,
    ) -> Result<ConceptTerm, ClassificationError> {
        let operands = and
            .elements(expression)
            .map_err(|source| ClassificationError::Structural { concept, source })?
            .into_iter()
            .map(|element| self.concept_term(concept, expression, element))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ConceptTerm::Conjunction(operands))
    }

    fn concept_term(
        &self,
        concept: Nid,
        expression: &LogicalExpression,
        atom: &Atom,
    ) -> Result<ConceptTerm, ClassificationError> {
        match atom {
            Atom::Connective(connective) if atom.as_and().is_some() => {
                self.conjunction(concept, expression, connective)
            }
            Atom::Concept(reference) => Ok(self.named(reference.concept())),
            Atom::TypedAtom(TypedAtom::Role(role)) => {
                if role.operator() != Some(RoleOperator::Existential) {
                    return Err(ClassificationError::Unsupported {
                        concept,
                        index: role.index(),
                        construct: format!("ROLE operator {}", role.operator_nid()),
                    });
                }
                let restriction = role
                    .restriction(expression)
                    .map_err(|source| ClassificationError::Structural { concept, source })?;
                Ok(ConceptTerm::Existential {
                    role: self.factory.role(role.role_type()),
                    filler: Box::new(self.concept_term(concept, expression, restriction)?),
                })
            }
            other => Err(ClassificationError::Unsupported {
                concept,
                index: other.index(),
                construct: other.meaning().to_string(),
            }),
        }
    }

    fn property_set(
        &self,
        concept: Nid,
        expression: &LogicalExpression,
        set: &LogicalSet,
        axioms: &mut Vec<Axiom>,
    ) -> Result<(), ClassificationError> {
        let structural = |source: LogicError| ClassificationError::Structural { concept, source };
        let and = set.conjunction(expression).map_err(structural)?;
        for element in and.elements(expression).map_err(structural)? {
            match element {
                Atom::Concept(parent) => axioms.push(Axiom::RoleInclusion {
                    sub: self.factory.role(concept),
                    sup: self.factory.role(parent.concept()),
                }),
                Atom::PropertyPatternImplication(implication) => {
                    debug!(
                        concept = %concept,
                        implication = %implication.implication(),
                        "property_pattern_implication_skipped"
                    );
                }
                other => {
                    return Err(ClassificationError::Unsupported {
                        concept,
                        index: other.index(),
                        construct: other.meaning().to_string(),
                    })
                }
            }
        }
        Ok(())
    }
}

/// Extract stage: compiles every stated definition into `working_set`.
///
/// Units that have not started when the run is cancelled are skipped; the
/// stage then reports [`ClassificationError::Cancelled`].
pub(crate) fn extract_all(
    context: &RunContext<'_>,
    working_set: &AxiomWorkingSet,
    semantics: &[Nid],
) -> Result<(), ClassificationError> {
    let extractor = AxiomExtractor::new(working_set.factory());
    semantics.par_iter().try_for_each(|&semantic| {
        if context.cancellation.is_cancelled() {
            return Ok(());
        }
        let outcome = extract_semantic(context, &extractor, working_set, semantic);
        context.progress.tick();
        outcome
    })?;

    if context.cancellation.is_cancelled() {
        return Err(ClassificationError::Cancelled {
            stage: Stage::Extract,
        });
    }
    for alert in working_set.duplicate_alerts() {
        context.alerts.raise(alert);
    }
    Ok(())
}

fn extract_semantic(
    context: &RunContext<'_>,
    extractor: &AxiomExtractor<'_>,
    working_set: &AxiomWorkingSet,
    semantic: Nid,
) -> Result<(), ClassificationError> {
    let Some(record) = context.store.record(semantic)? else {
        return Ok(());
    };
    if record.pattern() != context.settings.patterns.stated {
        return Ok(());
    }
    let Some(version) = record.latest(&context.coordinate) else {
        return Ok(());
    };
    let concept = record.referenced_component();
    let expression = LogicalExpression::new(version.tree().clone())
        .map_err(|source| ClassificationError::Structural { concept, source })?;
    let axioms = extractor.extract(concept, &expression)?;
    if !working_set.claim(concept, semantic, axioms) {
        debug!(concept = %concept, semantic = %semantic, "stated_definition_superseded");
    }
    Ok(())
}
