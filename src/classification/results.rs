use std::collections::BTreeSet;

use serde::Serialize;

use super::alerts::Alert;
use super::process::WriteOutcome;
use crate::reasoner::{Taxonomy, BOTTOM_LABEL, TOP_LABEL};
use crate::store::{CommitCoordinate, Nid};

/// Outcome of one classification run, handed to the caller for display.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ClassifierResults {
    /// Classifier backend that produced the taxonomy.
    pub classifier: String,
    /// Concepts submitted to the classifier.
    pub classified: BTreeSet<Nid>,
    /// Concepts whose inferred definition was created or changed.
    pub changed: BTreeSet<Nid>,
    /// Concepts the classifier proved equivalent, one set per class.
    pub equivalence_sets: Vec<BTreeSet<Nid>>,
    pub alerts: Vec<Alert>,
    /// Concepts skipped because several inferred semantics reference them.
    pub integrity_errors: usize,
    pub axiom_count: usize,
    pub commit: CommitCoordinate,
}

impl ClassifierResults {
    pub(crate) fn tally(outcomes: &[(Nid, WriteOutcome)]) -> (BTreeSet<Nid>, usize) {
        let changed = outcomes
            .iter()
            .filter(|(_, outcome)| outcome.is_change())
            .map(|(concept, _)| *concept)
            .collect();
        let integrity_errors = outcomes
            .iter()
            .filter(|(_, outcome)| *outcome == WriteOutcome::IntegrityError)
            .count();
        (changed, integrity_errors)
    }

    /// Equivalence classes of the taxonomy as native identifiers. Sentinels
    /// and unparsable labels are left out; classes reduced below two members
    /// are dropped.
    #[must_use]
    pub fn equivalence_sets(taxonomy: &Taxonomy) -> Vec<BTreeSet<Nid>> {
        let mut sets: Vec<BTreeSet<Nid>> = taxonomy
            .equivalence_classes()
            .map(|members| {
                members
                    .iter()
                    .filter(|label| *label != TOP_LABEL && *label != BOTTOM_LABEL)
                    .filter_map(|label| label.parse::<Nid>().ok())
                    .collect::<BTreeSet<Nid>>()
            })
            .filter(|members| members.len() > 1)
            .collect();
        sets.sort();
        sets
    }
}
