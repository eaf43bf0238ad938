use std::fmt::{self, Display, Formatter};
use std::sync::Arc;

use crate::store::Nid;

/// Reserved label of the universal (top) concept.
pub const TOP_LABEL: &str = "owl:Thing";
/// Reserved label of the empty (bottom) concept.
pub const BOTTOM_LABEL: &str = "owl:Nothing";

/// Deterministic reasoner label of a native identifier.
#[must_use]
pub fn label_of(nid: Nid) -> String {
    nid.to_string()
}

/// Reasoner-facing named concept.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct NamedConcept {
    nid: Nid,
    label: String,
}

impl NamedConcept {
    #[must_use]
    pub fn new(nid: Nid) -> Self {
        Self {
            nid,
            label: label_of(nid),
        }
    }

    #[must_use]
    pub fn nid(&self) -> Nid {
        self.nid
    }

    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }
}

/// Reasoner-facing named role.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct NamedRole {
    nid: Nid,
    label: String,
}

impl NamedRole {
    #[must_use]
    pub fn new(nid: Nid) -> Self {
        Self {
            nid,
            label: label_of(nid),
        }
    }

    #[must_use]
    pub fn nid(&self) -> Nid {
        self.nid
    }

    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }
}

/// Reasoner-facing named feature (concrete-domain role).
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct NamedFeature {
    nid: Nid,
    label: String,
}

impl NamedFeature {
    #[must_use]
    pub fn new(nid: Nid) -> Self {
        Self {
            nid,
            label: label_of(nid),
        }
    }

    #[must_use]
    pub fn nid(&self) -> Nid {
        self.nid
    }

    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }
}

/// EL++ concept expression.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ConceptTerm {
    Named(Arc<NamedConcept>),
    /// Synthetic concept standing for the conjunction of its operands.
    Conjunction(Vec<ConceptTerm>),
    /// `∃ role . filler`
    Existential {
        role: Arc<NamedRole>,
        filler: Box<ConceptTerm>,
    },
}

impl ConceptTerm {
    #[must_use]
    pub fn is_conjunction(&self) -> bool {
        matches!(self, Self::Conjunction(_))
    }
}

/// Axioms submitted to the classifier.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Axiom {
    /// `sub ⊑ sup`
    ConceptInclusion { sub: ConceptTerm, sup: ConceptTerm },
    /// `sub ⊑ sup` over roles
    RoleInclusion {
        sub: Arc<NamedRole>,
        sup: Arc<NamedRole>,
    },
}

impl Display for ConceptTerm {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Named(concept) => write!(f, "c{}", concept.label()),
            Self::Conjunction(operands) => {
                f.write_str("(")?;
                for (position, operand) in operands.iter().enumerate() {
                    if position > 0 {
                        f.write_str(" ⊓ ")?;
                    }
                    write!(f, "{operand}")?;
                }
                f.write_str(")")
            }
            Self::Existential { role, filler } => write!(f, "∃r{}.{filler}", role.label()),
        }
    }
}

impl Display for Axiom {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConceptInclusion { sub, sup } => write!(f, "{sub} ⊑ {sup}"),
            Self::RoleInclusion { sub, sup } => write!(f, "r{} ⊑ r{}", sub.label(), sup.label()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_nested_terms() {
        let axiom = Axiom::ConceptInclusion {
            sub: ConceptTerm::Named(Arc::new(NamedConcept::new(Nid::new(12)))),
            sup: ConceptTerm::Conjunction(vec![
                ConceptTerm::Named(Arc::new(NamedConcept::new(Nid::new(7)))),
                ConceptTerm::Existential {
                    role: Arc::new(NamedRole::new(Nid::new(5))),
                    filler: Box::new(ConceptTerm::Named(Arc::new(NamedConcept::new(
                        Nid::new(9),
                    )))),
                },
            ]),
        };
        insta::assert_snapshot!(axiom.to_string(), @"c12 ⊑ (c7 ⊓ ∃r5.c9)");
    }

    #[test]
    fn labels_are_parseable_native_identifiers() {
        let concept = NamedConcept::new(Nid::new(-42));
        assert_eq!(concept.label().parse::<Nid>(), Ok(Nid::new(-42)));
        assert!(TOP_LABEL.parse::<Nid>().is_err());
        assert!(BOTTOM_LABEL.parse::<Nid>().is_err());
    }
}
