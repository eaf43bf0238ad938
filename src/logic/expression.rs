use std::fmt::{self, Display, Formatter};

use super::axiom::{Atom, DefinitionRoot, LogicalAxiom, LogicalSet, SetKind, TypedAtom};
use super::graph::{DiTree, EntityVertex};
use super::meaning::{Meaning, PropertyKey, PropertyValue};
use super::LogicError;

/// Immutable definition tree plus its adaptor table.
///
/// The adaptor table runs parallel to the vertex array: slot `i` holds the
/// typed view of vertex `i`. It is built once on construction and never
/// mutated afterwards.
#[derive(Clone, Debug, PartialEq)]
pub struct LogicalExpression {
    tree: DiTree,
    adaptors: Vec<Option<LogicalAxiom>>,
    root: DefinitionRoot,
}

impl LogicalExpression {
    /// Adapts every vertex of the tree. Fails on the first vertex whose meaning
    /// is unknown or whose committed properties do not fit its variant.
    pub fn new(tree: DiTree) -> Result<Self, LogicError> {
        let mut adaptors = Vec::with_capacity(tree.len());
        for index in 0..tree.len() {
            adaptors.push(tree.vertex(index).map(LogicalAxiom::adapt).transpose()?);
        }
        let root = match adaptors.get(tree.root()) {
            Some(Some(LogicalAxiom::DefinitionRoot(root))) => root.clone(),
            Some(Some(other)) => {
                return Err(LogicError::KindMismatch {
                    index: tree.root(),
                    expected: Meaning::DefinitionRoot,
                    actual: other.meaning(),
                })
            }
            _ => {
                return Err(LogicError::MalformedTree(
                    "root vertex is missing".to_string(),
                ))
            }
        };
        Ok(Self {
            tree,
            adaptors,
            root,
        })
    }

    #[must_use]
    pub fn tree(&self) -> &DiTree {
        &self.tree
    }

    #[must_use]
    pub fn into_tree(self) -> DiTree {
        self.tree
    }

    #[must_use]
    pub fn root(&self) -> &DefinitionRoot {
        &self.root
    }

    #[must_use]
    pub fn axiom(&self, index: usize) -> Option<&LogicalAxiom> {
        self.adaptors.get(index).and_then(Option::as_ref)
    }

    #[must_use]
    pub fn vertex(&self, index: usize) -> Option<&EntityVertex> {
        self.tree.vertex(index)
    }

    #[must_use]
    pub fn successors(&self, index: usize) -> &[usize] {
        self.tree.successors(index)
    }

    /// All typed views in index order.
    pub fn axioms(&self) -> impl Iterator<Item = &LogicalAxiom> {
        self.adaptors.iter().flatten()
    }

    /// Whether at least one vertex has the given meaning.
    #[must_use]
    pub fn contains(&self, meaning: Meaning) -> bool {
        self.axioms().any(|axiom| axiom.meaning() == meaning)
    }

    /// Every view with the given meaning, in index order.
    #[must_use]
    pub fn axioms_of(&self, meaning: Meaning) -> Vec<&LogicalAxiom> {
        self.axioms()
            .filter(|axiom| axiom.meaning() == meaning)
            .collect()
    }

    /// Every logical set of the given kind, in index order.
    #[must_use]
    pub fn logical_sets(&self, kind: SetKind) -> Vec<&LogicalSet> {
        self.axioms()
            .filter_map(LogicalAxiom::as_logical_set)
            .filter(|set| set.kind() == kind)
            .collect()
    }

    pub(crate) fn child_atoms(&self, index: usize) -> Result<Vec<&Atom>, LogicError> {
        self.successors(index)
            .iter()
            .map(|&child| {
                self.axiom(child)
                    .and_then(LogicalAxiom::as_atom)
                    .ok_or(LogicError::UnexpectedChild {
                        index: child,
                        parent: index,
                    })
            })
            .collect()
    }

    pub(crate) fn single_child_atom(
        &self,
        index: usize,
        meaning: Meaning,
    ) -> Result<&Atom, LogicError> {
        let children = self.child_atoms(index)?;
        match children.as_slice() {
            [only] => Ok(only),
            _ => Err(LogicError::ChildCount {
                index,
                meaning,
                count: children.len(),
            }),
        }
    }

    /// Collects every structural violation: roles and features must own
    /// exactly one child, necessary and sufficient sets exactly one `AND`.
    #[must_use]
    pub fn validate(&self) -> Vec<LogicError> {
        let mut violations = Vec::new();
        if let Err(err) = self.root.sets(self) {
            violations.push(err);
        }
        for axiom in self.axioms() {
            let outcome = match axiom {
                LogicalAxiom::Atom(Atom::TypedAtom(TypedAtom::Role(role))) => {
                    role.restriction(self).map(|_| ())
                }
                LogicalAxiom::Atom(Atom::TypedAtom(TypedAtom::Feature(feature))) => {
                    feature.literal(self).map(|_| ())
                }
                LogicalAxiom::LogicalSet(set) if set.kind() != SetKind::Property => {
                    set.conjunction(self).map(|_| ())
                }
                _ => Ok(()),
            };
            if let Err(err) = outcome {
                violations.push(err);
            }
        }
        violations
    }

    /// Compares two expressions by meaning, committed properties and child
    /// structure, ignoring vertex indices, vertex identities and child order.
    #[must_use]
    pub fn structurally_equals(&self, other: &Self) -> bool {
        subtree_equal(self, self.tree.root(), other, other.tree.root())
    }

    fn render(&self, index: usize, f: &mut Formatter<'_>) -> fmt::Result {
        let Some(vertex) = self.vertex(index) else {
            return f.write_str("?");
        };
        match vertex.meaning() {
            Ok(meaning) => write!(f, "{meaning}")?,
            Err(_) => write!(f, "<{}>", vertex.meaning_nid())?,
        }
        let properties: Vec<String> = vertex
            .properties()
            .iter()
            .map(|(key, value)| render_property(*key, value))
            .collect();
        if !properties.is_empty() {
            write!(f, "[{}]", properties.join(", "))?;
        }
        let children = self.successors(index);
        if !children.is_empty() {
            f.write_str("(")?;
            for (position, &child) in children.iter().enumerate() {
                if position > 0 {
                    f.write_str(", ")?;
                }
                self.render(child, f)?;
            }
            f.write_str(")")?;
        }
        Ok(())
    }
}

impl TryFrom<DiTree> for LogicalExpression {
    type Error = LogicError;

    fn try_from(tree: DiTree) -> Result<Self, Self::Error> {
        Self::new(tree)
    }
}

impl Display for LogicalExpression {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        self.render(self.tree.root(), f)
    }
}

fn render_property(key: PropertyKey, value: &PropertyValue) -> String {
    let value = match value {
        PropertyValue::Nid(nid) => nid.to_string(),
        PropertyValue::Nids(nids) => {
            let nids: Vec<String> = nids.iter().map(ToString::to_string).collect();
            format!("[{}]", nids.join(" "))
        }
        PropertyValue::Boolean(value) => value.to_string(),
        PropertyValue::Float(value) => value.to_string(),
        PropertyValue::Integer(value) => value.to_string(),
        PropertyValue::Instant(value) => value.to_rfc3339(),
        PropertyValue::String(value) => format!("{value:?}"),
    };
    match key {
        PropertyKey::ConceptReference | PropertyKey::LiteralValue => value,
        PropertyKey::RoleType | PropertyKey::FeatureType => format!("type={value}"),
        PropertyKey::RoleOperator | PropertyKey::ConcreteDomainOperator => format!("op={value}"),
        PropertyKey::PropertyPattern => format!("pattern={value}"),
        PropertyKey::PropertyImplication => format!("implies={value}"),
    }
}

/// Same meaning and same committed properties.
pub(crate) fn vertex_equivalent(
    left: &LogicalExpression,
    left_index: usize,
    right: &LogicalExpression,
    right_index: usize,
) -> bool {
    match (left.vertex(left_index), right.vertex(right_index)) {
        (Some(a), Some(b)) => {
            a.meaning_nid() == b.meaning_nid() && a.properties() == b.properties()
        }
        _ => false,
    }
}

/// Subtree equality with children compared as multisets.
pub(crate) fn subtree_equal(
    left: &LogicalExpression,
    left_index: usize,
    right: &LogicalExpression,
    right_index: usize,
) -> bool {
    if !vertex_equivalent(left, left_index, right, right_index) {
        return false;
    }
    let left_children = left.successors(left_index);
    let mut unmatched = right.successors(right_index).to_vec();
    if left_children.len() != unmatched.len() {
        return false;
    }
    for &child in left_children {
        match unmatched
            .iter()
            .position(|&candidate| subtree_equal(left, child, right, candidate))
        {
            Some(position) => {
                unmatched.swap_remove(position);
            }
            None => return false,
        }
    }
    true
}
