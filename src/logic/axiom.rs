//! Typed views over definition-tree vertices.
//!
//! Every present vertex of a [`LogicalExpression`] is bound to exactly one
//! [`LogicalAxiom`]. The variants form a closed hierarchy:
//!
//! - [`Atom`]: connectives, concept references, disjointness, typed atoms
//!   (roles and features), literals and property pattern implications;
//! - [`LogicalSet`]: necessary, sufficient and property sets;
//! - [`DefinitionRoot`]: the root of a definition.
//!
//! Views only hold the vertex index plus the properties committed on the
//! vertex. Anything that depends on the successor relation is recomputed on
//! demand from the owning expression.

use chrono::{DateTime, Utc};

use super::expression::LogicalExpression;
use super::graph::EntityVertex;
use super::meaning::{ConcreteDomainOperator, Meaning, PropertyKey, PropertyValue, RoleOperator};
use super::LogicError;
use crate::store::Nid;

/// Typed view bound to one vertex.
#[derive(Clone, Debug, PartialEq)]
pub enum LogicalAxiom {
    Atom(Atom),
    LogicalSet(LogicalSet),
    DefinitionRoot(DefinitionRoot),
}

impl LogicalAxiom {
    /// Instantiates the variant matching the vertex meaning.
    pub fn adapt(vertex: &EntityVertex) -> Result<Self, LogicError> {
        let axiom = match vertex.meaning()? {
            Meaning::And | Meaning::Or => Self::Atom(Atom::Connective(Connective::new(vertex)?)),
            Meaning::Concept => Self::Atom(Atom::Concept(ConceptAxiom::new(vertex)?)),
            Meaning::DisjointWith => {
                Self::Atom(Atom::DisjointWith(DisjointWithAxiom::new(vertex)?))
            }
            Meaning::Role => Self::Atom(Atom::TypedAtom(TypedAtom::Role(RoleAxiom::new(vertex)?))),
            Meaning::Feature => Self::Atom(Atom::TypedAtom(TypedAtom::Feature(
                FeatureAxiom::new(vertex)?,
            ))),
            Meaning::BooleanLiteral
            | Meaning::FloatLiteral
            | Meaning::InstantLiteral
            | Meaning::IntegerLiteral
            | Meaning::StringLiteral => Self::Atom(Atom::Literal(Literal::new(vertex)?)),
            Meaning::PropertyPatternImplication => Self::Atom(Atom::PropertyPatternImplication(
                PropertyPatternImplication::new(vertex)?,
            )),
            Meaning::NecessarySet | Meaning::SufficientSet | Meaning::PropertySet => {
                Self::LogicalSet(LogicalSet::new(vertex)?)
            }
            Meaning::DefinitionRoot => Self::DefinitionRoot(DefinitionRoot::new(vertex)?),
        };
        Ok(axiom)
    }

    #[must_use]
    pub fn index(&self) -> usize {
        match self {
            Self::Atom(atom) => atom.index(),
            Self::LogicalSet(set) => set.index(),
            Self::DefinitionRoot(root) => root.index(),
        }
    }

    #[must_use]
    pub fn meaning(&self) -> Meaning {
        match self {
            Self::Atom(atom) => atom.meaning(),
            Self::LogicalSet(set) => set.meaning(),
            Self::DefinitionRoot(_) => Meaning::DefinitionRoot,
        }
    }

    #[must_use]
    pub fn as_atom(&self) -> Option<&Atom> {
        match self {
            Self::Atom(atom) => Some(atom),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_logical_set(&self) -> Option<&LogicalSet> {
        match self {
            Self::LogicalSet(set) => Some(set),
            _ => None,
        }
    }
}

fn expect_meaning(vertex: &EntityVertex, allowed: &[Meaning]) -> Result<Meaning, LogicError> {
    let meaning = vertex.meaning()?;
    if allowed.contains(&meaning) {
        Ok(meaning)
    } else {
        Err(LogicError::KindMismatch {
            index: vertex.index(),
            expected: allowed[0],
            actual: meaning,
        })
    }
}

/// Elements that may appear below a logical set.
#[derive(Clone, Debug, PartialEq)]
pub enum Atom {
    Connective(Connective),
    Concept(ConceptAxiom),
    DisjointWith(DisjointWithAxiom),
    TypedAtom(TypedAtom),
    Literal(Literal),
    PropertyPatternImplication(PropertyPatternImplication),
}

impl Atom {
    #[must_use]
    pub fn index(&self) -> usize {
        match self {
            Self::Connective(axiom) => axiom.index,
            Self::Concept(axiom) => axiom.index,
            Self::DisjointWith(axiom) => axiom.index,
            Self::TypedAtom(TypedAtom::Role(axiom)) => axiom.index,
            Self::TypedAtom(TypedAtom::Feature(axiom)) => axiom.index,
            Self::Literal(axiom) => axiom.index,
            Self::PropertyPatternImplication(axiom) => axiom.index,
        }
    }

    #[must_use]
    pub fn meaning(&self) -> Meaning {
        match self {
            Self::Connective(axiom) => axiom.meaning(),
            Self::Concept(_) => Meaning::Concept,
            Self::DisjointWith(_) => Meaning::DisjointWith,
            Self::TypedAtom(TypedAtom::Role(_)) => Meaning::Role,
            Self::TypedAtom(TypedAtom::Feature(_)) => Meaning::Feature,
            Self::Literal(axiom) => axiom.meaning(),
            Self::PropertyPatternImplication(_) => Meaning::PropertyPatternImplication,
        }
    }

    /// Returns the connective if this atom is an `AND`.
    #[must_use]
    pub fn as_and(&self) -> Option<&Connective> {
        match self {
            Self::Connective(connective) if connective.kind == ConnectiveKind::And => {
                Some(connective)
            }
            _ => None,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ConnectiveKind {
    And,
    Or,
}

/// `AND` / `OR` over child atoms.
#[derive(Clone, Debug, PartialEq)]
pub struct Connective {
    index: usize,
    kind: ConnectiveKind,
}

impl Connective {
    pub fn new(vertex: &EntityVertex) -> Result<Self, LogicError> {
        let kind = match expect_meaning(vertex, &[Meaning::And, Meaning::Or])? {
            Meaning::Or => ConnectiveKind::Or,
            _ => ConnectiveKind::And,
        };
        Ok(Self {
            index: vertex.index(),
            kind,
        })
    }

    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }

    #[must_use]
    pub fn kind(&self) -> ConnectiveKind {
        self.kind
    }

    #[must_use]
    pub fn meaning(&self) -> Meaning {
        match self.kind {
            ConnectiveKind::And => Meaning::And,
            ConnectiveKind::Or => Meaning::Or,
        }
    }

    /// Child atoms in successor order.
    pub fn elements<'a>(&self, expression: &'a LogicalExpression) -> Result<Vec<&'a Atom>, LogicError> {
        expression.child_atoms(self.index)
    }
}

/// Reference to a concept.
#[derive(Clone, Debug, PartialEq)]
pub struct ConceptAxiom {
    index: usize,
    concept: Nid,
}

impl ConceptAxiom {
    pub fn new(vertex: &EntityVertex) -> Result<Self, LogicError> {
        expect_meaning(vertex, &[Meaning::Concept])?;
        Ok(Self {
            index: vertex.index(),
            concept: vertex.nid_property(PropertyKey::ConceptReference)?,
        })
    }

    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }

    #[must_use]
    pub fn concept(&self) -> Nid {
        self.concept
    }
}

/// Declares disjointness with a concept.
#[derive(Clone, Debug, PartialEq)]
pub struct DisjointWithAxiom {
    index: usize,
    disjoint_with: Nid,
}

impl DisjointWithAxiom {
    pub fn new(vertex: &EntityVertex) -> Result<Self, LogicError> {
        expect_meaning(vertex, &[Meaning::DisjointWith])?;
        Ok(Self {
            index: vertex.index(),
            disjoint_with: vertex.nid_property(PropertyKey::ConceptReference)?,
        })
    }

    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }

    #[must_use]
    pub fn disjoint_with(&self) -> Nid {
        self.disjoint_with
    }
}

/// Atoms typed by a role or feature, each owning exactly one child.
#[derive(Clone, Debug, PartialEq)]
pub enum TypedAtom {
    Role(RoleAxiom),
    Feature(FeatureAxiom),
}

/// Role restriction: `operator role_type . restriction`.
#[derive(Clone, Debug, PartialEq)]
pub struct RoleAxiom {
    index: usize,
    role_type: Nid,
    operator: Nid,
}

impl RoleAxiom {
    pub fn new(vertex: &EntityVertex) -> Result<Self, LogicError> {
        expect_meaning(vertex, &[Meaning::Role])?;
        Ok(Self {
            index: vertex.index(),
            role_type: vertex.nid_property(PropertyKey::RoleType)?,
            operator: vertex.nid_property(PropertyKey::RoleOperator)?,
        })
    }

    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }

    #[must_use]
    pub fn role_type(&self) -> Nid {
        self.role_type
    }

    /// Raw operator identifier.
    #[must_use]
    pub fn operator_nid(&self) -> Nid {
        self.operator
    }

    /// Operator resolved against the known quantifiers.
    #[must_use]
    pub fn operator(&self) -> Option<RoleOperator> {
        RoleOperator::from_nid(self.operator)
    }

    /// The unique child restriction.
    pub fn restriction<'a>(&self, expression: &'a LogicalExpression) -> Result<&'a Atom, LogicError> {
        expression.single_child_atom(self.index, Meaning::Role)
    }
}

/// Feature restriction over a concrete-domain literal.
#[derive(Clone, Debug, PartialEq)]
pub struct FeatureAxiom {
    index: usize,
    feature_type: Nid,
    operator: Nid,
}

impl FeatureAxiom {
    pub fn new(vertex: &EntityVertex) -> Result<Self, LogicError> {
        expect_meaning(vertex, &[Meaning::Feature])?;
        Ok(Self {
            index: vertex.index(),
            feature_type: vertex.nid_property(PropertyKey::FeatureType)?,
            operator: vertex.nid_property(PropertyKey::ConcreteDomainOperator)?,
        })
    }

    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }

    #[must_use]
    pub fn feature_type(&self) -> Nid {
        self.feature_type
    }

    #[must_use]
    pub fn operator_nid(&self) -> Nid {
        self.operator
    }

    #[must_use]
    pub fn operator(&self) -> Option<ConcreteDomainOperator> {
        ConcreteDomainOperator::from_nid(self.operator)
    }

    /// The unique child literal.
    pub fn literal<'a>(&self, expression: &'a LogicalExpression) -> Result<&'a Atom, LogicError> {
        expression.single_child_atom(self.index, Meaning::Feature)
    }
}

/// Literal payloads.
#[derive(Clone, Debug, PartialEq)]
pub enum LiteralValue {
    Boolean(bool),
    Float(f64),
    Instant(DateTime<Utc>),
    Integer(i64),
    String(String),
}

impl LiteralValue {
    #[must_use]
    pub fn meaning(&self) -> Meaning {
        match self {
            Self::Boolean(_) => Meaning::BooleanLiteral,
            Self::Float(_) => Meaning::FloatLiteral,
            Self::Instant(_) => Meaning::InstantLiteral,
            Self::Integer(_) => Meaning::IntegerLiteral,
            Self::String(_) => Meaning::StringLiteral,
        }
    }

    pub(crate) fn to_property(&self) -> PropertyValue {
        match self {
            Self::Boolean(value) => PropertyValue::Boolean(*value),
            Self::Float(value) => PropertyValue::Float(*value),
            Self::Instant(value) => PropertyValue::Instant(*value),
            Self::Integer(value) => PropertyValue::Integer(*value),
            Self::String(value) => PropertyValue::String(value.clone()),
        }
    }
}

/// Literal atom.
#[derive(Clone, Debug, PartialEq)]
pub struct Literal {
    index: usize,
    value: LiteralValue,
}

impl Literal {
    pub fn new(vertex: &EntityVertex) -> Result<Self, LogicError> {
        let meaning = expect_meaning(
            vertex,
            &[
                Meaning::BooleanLiteral,
                Meaning::FloatLiteral,
                Meaning::InstantLiteral,
                Meaning::IntegerLiteral,
                Meaning::StringLiteral,
            ],
        )?;
        let missing = || LogicError::MissingProperty {
            index: vertex.index(),
            key: PropertyKey::LiteralValue,
        };
        let value = match (meaning, vertex.property(PropertyKey::LiteralValue)) {
            (Meaning::BooleanLiteral, Some(PropertyValue::Boolean(value))) => {
                LiteralValue::Boolean(*value)
            }
            (Meaning::FloatLiteral, Some(PropertyValue::Float(value))) => {
                LiteralValue::Float(*value)
            }
            (Meaning::InstantLiteral, Some(PropertyValue::Instant(value))) => {
                LiteralValue::Instant(*value)
            }
            (Meaning::IntegerLiteral, Some(PropertyValue::Integer(value))) => {
                LiteralValue::Integer(*value)
            }
            (Meaning::StringLiteral, Some(PropertyValue::String(value))) => {
                LiteralValue::String(value.clone())
            }
            _ => return Err(missing()),
        };
        Ok(Self {
            index: vertex.index(),
            value,
        })
    }

    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }

    #[must_use]
    pub fn value(&self) -> &LiteralValue {
        &self.value
    }

    #[must_use]
    pub fn meaning(&self) -> Meaning {
        self.value.meaning()
    }
}

/// A chain of roles (the pattern) that implies another role.
#[derive(Clone, Debug, PartialEq)]
pub struct PropertyPatternImplication {
    index: usize,
    pattern: Vec<Nid>,
    implication: Nid,
}

impl PropertyPatternImplication {
    pub fn new(vertex: &EntityVertex) -> Result<Self, LogicError> {
        expect_meaning(vertex, &[Meaning::PropertyPatternImplication])?;
        let pattern = match vertex.property(PropertyKey::PropertyPattern) {
            Some(PropertyValue::Nids(pattern)) => pattern.clone(),
            _ => {
                return Err(LogicError::MissingProperty {
                    index: vertex.index(),
                    key: PropertyKey::PropertyPattern,
                })
            }
        };
        Ok(Self {
            index: vertex.index(),
            pattern,
            implication: vertex.nid_property(PropertyKey::PropertyImplication)?,
        })
    }

    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }

    #[must_use]
    pub fn pattern(&self) -> &[Nid] {
        &self.pattern
    }

    #[must_use]
    pub fn implication(&self) -> Nid {
        self.implication
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum SetKind {
    Necessary,
    Sufficient,
    Property,
}

/// Top-level set hanging off the definition root.
#[derive(Clone, Debug, PartialEq)]
pub struct LogicalSet {
    index: usize,
    kind: SetKind,
}

impl LogicalSet {
    pub fn new(vertex: &EntityVertex) -> Result<Self, LogicError> {
        let kind = match expect_meaning(
            vertex,
            &[Meaning::NecessarySet, Meaning::SufficientSet, Meaning::PropertySet],
        )? {
            Meaning::SufficientSet => SetKind::Sufficient,
            Meaning::PropertySet => SetKind::Property,
            _ => SetKind::Necessary,
        };
        Ok(Self {
            index: vertex.index(),
            kind,
        })
    }

    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }

    #[must_use]
    pub fn kind(&self) -> SetKind {
        self.kind
    }

    #[must_use]
    pub fn meaning(&self) -> Meaning {
        match self.kind {
            SetKind::Necessary => Meaning::NecessarySet,
            SetKind::Sufficient => Meaning::SufficientSet,
            SetKind::Property => Meaning::PropertySet,
        }
    }

    /// Child atoms in successor order.
    pub fn elements<'a>(&self, expression: &'a LogicalExpression) -> Result<Vec<&'a Atom>, LogicError> {
        expression.child_atoms(self.index)
    }

    /// The single `AND` child required of every well-formed set.
    pub fn conjunction<'a>(
        &self,
        expression: &'a LogicalExpression,
    ) -> Result<&'a Connective, LogicError> {
        let child = expression.single_child_atom(self.index, self.meaning())?;
        child.as_and().ok_or(LogicError::ExpectedConjunction {
            index: self.index,
            set: self.meaning(),
            actual: child.meaning(),
        })
    }
}

/// Root of a definition; its children are logical sets.
#[derive(Clone, Debug, PartialEq)]
pub struct DefinitionRoot {
    index: usize,
}

impl DefinitionRoot {
    pub fn new(vertex: &EntityVertex) -> Result<Self, LogicError> {
        expect_meaning(vertex, &[Meaning::DefinitionRoot])?;
        Ok(Self {
            index: vertex.index(),
        })
    }

    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }

    /// Top-level sets in successor order.
    pub fn sets<'a>(&self, expression: &'a LogicalExpression) -> Result<Vec<&'a LogicalSet>, LogicError> {
        expression
            .successors(self.index)
            .iter()
            .map(|&child| {
                expression
                    .axiom(child)
                    .and_then(LogicalAxiom::as_logical_set)
                    .ok_or(LogicError::UnexpectedChild {
                        index: child,
                        parent: self.index,
                    })
            })
            .collect()
    }
}
