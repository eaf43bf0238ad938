use std::fmt::{self, Display, Formatter};
use std::sync::{Mutex, PoisonError};

use serde::Serialize;
use tracing::warn;

use crate::store::Nid;

/// Non-fatal anomaly raised during a run.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Alert {
    /// More than one stated definition exists for a concept; only `kept`
    /// contributed axioms.
    DuplicateStatedDefinition {
        concept: Nid,
        kept: Nid,
        discarded: Vec<Nid>,
    },
    /// A label in a parent equivalence class is neither a sentinel nor a
    /// native identifier.
    UnparsableLabel { concept: Nid, label: String },
    /// More than one inferred semantic references the concept.
    MultipleInferredSemantics { concept: Nid, semantics: Vec<Nid> },
}

impl Alert {
    #[must_use]
    pub fn concept(&self) -> Nid {
        match self {
            Self::DuplicateStatedDefinition { concept, .. }
            | Self::UnparsableLabel { concept, .. }
            | Self::MultipleInferredSemantics { concept, .. } => *concept,
        }
    }
}

impl Display for Alert {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateStatedDefinition {
                concept,
                kept,
                discarded,
            } => write!(
                f,
                "concept {concept} has {} stated definitions; kept {kept}",
                discarded.len() + 1
            ),
            Self::UnparsableLabel { concept, label } => {
                write!(f, "concept {concept} has unparsable parent label `{label}`")
            }
            Self::MultipleInferredSemantics { concept, semantics } => write!(
                f,
                "concept {concept} has {} inferred semantics",
                semantics.len()
            ),
        }
    }
}

/// Process-wide alert channel of one run.
#[derive(Debug, Default)]
pub struct AlertSink {
    alerts: Mutex<Vec<Alert>>,
}

impl AlertSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raise(&self, alert: Alert) {
        warn!(concept = %alert.concept(), alert = %alert, "classification_alert");
        self.alerts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(alert);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.alerts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Alerts in a stable order, independent of thread scheduling.
    #[must_use]
    pub fn sorted(&self) -> Vec<Alert> {
        let mut alerts = self
            .alerts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        alerts.sort();
        alerts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alerts_are_sorted_regardless_of_arrival() {
        let sink = AlertSink::new();
        sink.raise(Alert::UnparsableLabel {
            concept: Nid::new(9),
            label: "x".to_string(),
        });
        sink.raise(Alert::UnparsableLabel {
            concept: Nid::new(3),
            label: "y".to_string(),
        });
        assert_eq!(sink.len(), 2);
        let alerts = sink.sorted();
        assert_eq!(alerts[0].concept(), Nid::new(3));
        insta::assert_snapshot!(alerts[1].to_string(), @"concept 9 has unparsable parent label `x`");
    }
}
