use std::fmt::{self, Display, Formatter};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::LogicError;
use crate::store::Nid;

/// Fixed vocabulary of vertex meanings.
///
/// Vertices in the generic tree carry their meaning as a native identifier so
/// the store does not need to know about this enum; [`Meaning::try_from`]
/// performs the exhaustive dispatch used when adapting a tree.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Meaning {
    And,
    Or,
    Concept,
    Role,
    Feature,
    BooleanLiteral,
    FloatLiteral,
    InstantLiteral,
    IntegerLiteral,
    StringLiteral,
    NecessarySet,
    SufficientSet,
    PropertySet,
    DefinitionRoot,
    DisjointWith,
    PropertyPatternImplication,
}

impl Meaning {
    pub const ALL: [Self; 16] = [
        Self::And,
        Self::Or,
        Self::Concept,
        Self::Role,
        Self::Feature,
        Self::BooleanLiteral,
        Self::FloatLiteral,
        Self::InstantLiteral,
        Self::IntegerLiteral,
        Self::StringLiteral,
        Self::NecessarySet,
        Self::SufficientSet,
        Self::PropertySet,
        Self::DefinitionRoot,
        Self::DisjointWith,
        Self::PropertyPatternImplication,
    ];

    /// Native identifier of the concept that denotes this meaning in the store.
    #[must_use]
    pub const fn nid(self) -> Nid {
        Nid::new(match self {
            Self::And => -2_000_001,
            Self::Or => -2_000_002,
            Self::Concept => -2_000_003,
            Self::Role => -2_000_004,
            Self::Feature => -2_000_005,
            Self::BooleanLiteral => -2_000_006,
            Self::FloatLiteral => -2_000_007,
            Self::InstantLiteral => -2_000_008,
            Self::IntegerLiteral => -2_000_009,
            Self::StringLiteral => -2_000_010,
            Self::NecessarySet => -2_000_011,
            Self::SufficientSet => -2_000_012,
            Self::PropertySet => -2_000_013,
            Self::DefinitionRoot => -2_000_014,
            Self::DisjointWith => -2_000_015,
            Self::PropertyPatternImplication => -2_000_016,
        })
    }

    /// Whether vertices of this meaning denote a literal value.
    #[must_use]
    pub const fn is_literal(self) -> bool {
        matches!(
            self,
            Self::BooleanLiteral
                | Self::FloatLiteral
                | Self::InstantLiteral
                | Self::IntegerLiteral
                | Self::StringLiteral
        )
    }

    /// Whether vertices of this meaning are top-level logical sets.
    #[must_use]
    pub const fn is_logical_set(self) -> bool {
        matches!(
            self,
            Self::NecessarySet | Self::SufficientSet | Self::PropertySet
        )
    }
}

impl TryFrom<Nid> for Meaning {
    type Error = LogicError;

    fn try_from(nid: Nid) -> Result<Self, Self::Error> {
        Self::ALL
            .into_iter()
            .find(|meaning| meaning.nid() == nid)
            .ok_or(LogicError::UnknownMeaning { meaning: nid })
    }
}

impl Display for Meaning {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::And => "AND",
            Self::Or => "OR",
            Self::Concept => "CONCEPT",
            Self::Role => "ROLE",
            Self::Feature => "FEATURE",
            Self::BooleanLiteral => "BOOLEAN_LITERAL",
            Self::FloatLiteral => "FLOAT_LITERAL",
            Self::InstantLiteral => "INSTANT_LITERAL",
            Self::IntegerLiteral => "INTEGER_LITERAL",
            Self::StringLiteral => "STRING_LITERAL",
            Self::NecessarySet => "NECESSARY_SET",
            Self::SufficientSet => "SUFFICIENT_SET",
            Self::PropertySet => "PROPERTY_SET",
            Self::DefinitionRoot => "DEFINITION_ROOT",
            Self::DisjointWith => "DISJOINT_WITH",
            Self::PropertyPatternImplication => "PROPERTY_PATTERN_IMPLICATION",
        };
        f.write_str(text)
    }
}

/// Keys of the property map committed on a vertex at construction time.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyKey {
    ConceptReference,
    RoleType,
    RoleOperator,
    FeatureType,
    ConcreteDomainOperator,
    LiteralValue,
    PropertyPattern,
    PropertyImplication,
}

/// Values stored in a vertex property map.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyValue {
    Nid(Nid),
    Nids(Vec<Nid>),
    Boolean(bool),
    Float(f64),
    Integer(i64),
    Instant(DateTime<Utc>),
    String(String),
}

/// Quantifier carried by a role vertex.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoleOperator {
    Existential,
    Universal,
}

impl RoleOperator {
    #[must_use]
    pub const fn nid(self) -> Nid {
        Nid::new(match self {
            Self::Existential => -2_000_101,
            Self::Universal => -2_000_102,
        })
    }

    #[must_use]
    pub fn from_nid(nid: Nid) -> Option<Self> {
        [Self::Existential, Self::Universal]
            .into_iter()
            .find(|operator| operator.nid() == nid)
    }
}

/// Comparison carried by a feature vertex over its literal.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConcreteDomainOperator {
    Equal,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
}

impl ConcreteDomainOperator {
    const ALL: [Self; 5] = [
        Self::Equal,
        Self::LessThan,
        Self::LessThanOrEqual,
        Self::GreaterThan,
        Self::GreaterThanOrEqual,
    ];

    #[must_use]
    pub const fn nid(self) -> Nid {
        Nid::new(match self {
            Self::Equal => -2_000_201,
            Self::LessThan => -2_000_202,
            Self::LessThanOrEqual => -2_000_203,
            Self::GreaterThan => -2_000_204,
            Self::GreaterThanOrEqual => -2_000_205,
        })
    }

    #[must_use]
    pub fn from_nid(nid: Nid) -> Option<Self> {
        Self::ALL.into_iter().find(|operator| operator.nid() == nid)
    }
}
