use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use super::axiom::{Atom, LiteralValue, LogicalAxiom, LogicalSet};
use super::expression::LogicalExpression;
use super::graph::{MutableDiTree, VertexId};
use super::meaning::{ConcreteDomainOperator, Meaning, PropertyKey, PropertyValue, RoleOperator};
use super::LogicError;
use crate::store::Nid;

/// Single-writer constructor for a new [`LogicalExpression`].
///
/// The builder starts with a `DEFINITION_ROOT` vertex. Atoms are created
/// detached and wired under their parent when the parent is created; logical
/// sets are wired under the root. [`ExpressionBuilder::build`] freezes the
/// tree, after which every mutator returns [`LogicError::AlreadyBuilt`].
#[derive(Debug)]
pub struct ExpressionBuilder {
    tree: MutableDiTree,
    attached: Vec<bool>,
    root: usize,
    built: bool,
}

impl Default for ExpressionBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ExpressionBuilder {
    /// Starts an empty definition holding only its root.
    #[must_use]
    pub fn new() -> Self {
        let mut tree = MutableDiTree::default();
        let root = tree.add_vertex(VertexId::random(), Meaning::DefinitionRoot, BTreeMap::new());
        tree.set_root(root);
        Self {
            tree,
            attached: vec![true],
            root,
            built: false,
        }
    }

    fn ensure_open(&self) -> Result<(), LogicError> {
        if self.built {
            Err(LogicError::AlreadyBuilt)
        } else {
            Ok(())
        }
    }

    fn add_vertex(
        &mut self,
        vertex_id: VertexId,
        meaning: Meaning,
        properties: BTreeMap<PropertyKey, PropertyValue>,
    ) -> usize {
        let index = self.tree.add_vertex(vertex_id, meaning, properties);
        self.attached.push(false);
        index
    }

    fn attach(&mut self, parent: usize, child: usize) -> Result<(), LogicError> {
        match self.attached.get_mut(child) {
            Some(attached) if !*attached => {
                *attached = true;
                self.tree.add_edge(parent, child);
                Ok(())
            }
            Some(_) => Err(LogicError::AlreadyAttached { index: child }),
            None => Err(LogicError::ForeignAxiom { index: child }),
        }
    }

    fn adapt(&self, index: usize) -> Result<LogicalAxiom, LogicError> {
        let vertex = self
            .tree
            .vertex(index)
            .ok_or(LogicError::ForeignAxiom { index })?;
        LogicalAxiom::adapt(vertex)
    }

    fn atom(&self, index: usize) -> Result<Atom, LogicError> {
        match self.adapt(index)? {
            LogicalAxiom::Atom(atom) => Ok(atom),
            other => Err(LogicError::KindMismatch {
                index,
                expected: Meaning::Concept,
                actual: other.meaning(),
            }),
        }
    }

    fn node(
        &mut self,
        meaning: Meaning,
        properties: BTreeMap<PropertyKey, PropertyValue>,
        children: impl IntoIterator<Item = Atom>,
    ) -> Result<usize, LogicError> {
        self.ensure_open()?;
        let children: Vec<usize> = children.into_iter().map(|atom| atom.index()).collect();
        if let Some(&bad) = children
            .iter()
            .find(|&&child| self.attached.get(child).map_or(true, |attached| *attached))
        {
            return Err(if bad < self.attached.len() {
                LogicError::AlreadyAttached { index: bad }
            } else {
                LogicError::ForeignAxiom { index: bad }
            });
        }
        let index = self.add_vertex(VertexId::random(), meaning, properties);
        for child in children {
            self.attach(index, child)?;
        }
        Ok(index)
    }

    fn set(
        &mut self,
        meaning: Meaning,
        elements: impl IntoIterator<Item = Atom>,
    ) -> Result<LogicalSet, LogicError> {
        let index = self.node(meaning, BTreeMap::new(), elements)?;
        self.attach(self.root, index)?;
        match self.adapt(index)? {
            LogicalAxiom::LogicalSet(set) => Ok(set),
            other => Err(LogicError::KindMismatch {
                index,
                expected: meaning,
                actual: other.meaning(),
            }),
        }
    }

    /// Adds a necessary set under the root.
    pub fn necessary_set(
        &mut self,
        elements: impl IntoIterator<Item = Atom>,
    ) -> Result<LogicalSet, LogicError> {
        self.set(Meaning::NecessarySet, elements)
    }

    /// Adds a sufficient set under the root.
    pub fn sufficient_set(
        &mut self,
        elements: impl IntoIterator<Item = Atom>,
    ) -> Result<LogicalSet, LogicError> {
        self.set(Meaning::SufficientSet, elements)
    }

    /// Adds a property set under the root.
    pub fn property_set(
        &mut self,
        elements: impl IntoIterator<Item = Atom>,
    ) -> Result<LogicalSet, LogicError> {
        self.set(Meaning::PropertySet, elements)
    }

    /// Conjunction of `elements`.
    pub fn and(&mut self, elements: impl IntoIterator<Item = Atom>) -> Result<Atom, LogicError> {
        let index = self.node(Meaning::And, BTreeMap::new(), elements)?;
        self.atom(index)
    }

    /// Disjunction of `elements`.
    pub fn or(&mut self, elements: impl IntoIterator<Item = Atom>) -> Result<Atom, LogicError> {
        let index = self.node(Meaning::Or, BTreeMap::new(), elements)?;
        self.atom(index)
    }

    /// Reference to `concept`.
    pub fn concept(&mut self, concept: Nid) -> Result<Atom, LogicError> {
        let properties =
            BTreeMap::from([(PropertyKey::ConceptReference, PropertyValue::Nid(concept))]);
        let index = self.node(Meaning::Concept, properties, [])?;
        self.atom(index)
    }

    /// Disjointness with `concept`.
    pub fn disjoint_with(&mut self, concept: Nid) -> Result<Atom, LogicError> {
        let properties =
            BTreeMap::from([(PropertyKey::ConceptReference, PropertyValue::Nid(concept))]);
        let index = self.node(Meaning::DisjointWith, properties, [])?;
        self.atom(index)
    }

    /// Role of `role_type` restricted to `restriction`.
    pub fn role(
        &mut self,
        role_type: Nid,
        operator: RoleOperator,
        restriction: Atom,
    ) -> Result<Atom, LogicError> {
        let properties = BTreeMap::from([
            (PropertyKey::RoleType, PropertyValue::Nid(role_type)),
            (PropertyKey::RoleOperator, PropertyValue::Nid(operator.nid())),
        ]);
        let index = self.node(Meaning::Role, properties, [restriction])?;
        self.atom(index)
    }

    /// Feature of `feature_type` compared to `literal` with `operator`.
    pub fn feature(
        &mut self,
        feature_type: Nid,
        operator: ConcreteDomainOperator,
        literal: Atom,
    ) -> Result<Atom, LogicError> {
        let properties = BTreeMap::from([
            (PropertyKey::FeatureType, PropertyValue::Nid(feature_type)),
            (
                PropertyKey::ConcreteDomainOperator,
                PropertyValue::Nid(operator.nid()),
            ),
        ]);
        let index = self.node(Meaning::Feature, properties, [literal])?;
        self.atom(index)
    }

    /// Literal leaf holding `value`.
    pub fn literal(&mut self, value: LiteralValue) -> Result<Atom, LogicError> {
        let properties = BTreeMap::from([(PropertyKey::LiteralValue, value.to_property())]);
        let index = self.node(value.meaning(), properties, [])?;
        self.atom(index)
    }

    /// Boolean literal.
    pub fn boolean_literal(&mut self, value: bool) -> Result<Atom, LogicError> {
        self.literal(LiteralValue::Boolean(value))
    }

    /// Float literal.
    pub fn float_literal(&mut self, value: f64) -> Result<Atom, LogicError> {
        self.literal(LiteralValue::Float(value))
    }

    /// Integer literal.
    pub fn integer_literal(&mut self, value: i64) -> Result<Atom, LogicError> {
        self.literal(LiteralValue::Integer(value))
    }

    /// Instant literal.
    pub fn instant_literal(&mut self, value: DateTime<Utc>) -> Result<Atom, LogicError> {
        self.literal(LiteralValue::Instant(value))
    }

    /// String literal.
    pub fn string_literal(&mut self, value: impl Into<String>) -> Result<Atom, LogicError> {
        self.literal(LiteralValue::String(value.into()))
    }

    /// Role chain `pattern` implying `implication`.
    pub fn property_pattern_implication(
        &mut self,
        pattern: Vec<Nid>,
        implication: Nid,
    ) -> Result<Atom, LogicError> {
        let properties = BTreeMap::from([
            (PropertyKey::PropertyPattern, PropertyValue::Nids(pattern)),
            (
                PropertyKey::PropertyImplication,
                PropertyValue::Nid(implication),
            ),
        ]);
        let index = self.node(Meaning::PropertyPatternImplication, properties, [])?;
        self.atom(index)
    }

    /// Deep-copies the subtree under `axiom` from `source` into this builder.
    ///
    /// Copied vertices keep their identity and committed properties. Logical
    /// sets are wired under this builder's root; cloning a definition root
    /// copies each of its sets. Atoms are returned detached.
    pub fn add_cloned(
        &mut self,
        source: &LogicalExpression,
        axiom: &LogicalAxiom,
    ) -> Result<LogicalAxiom, LogicError> {
        self.ensure_open()?;
        match axiom {
            LogicalAxiom::DefinitionRoot(root) => {
                for set in root.sets(source)? {
                    let index = self.clone_subtree(source, set.index())?;
                    self.attach(self.root, index)?;
                }
                self.adapt(self.root)
            }
            LogicalAxiom::LogicalSet(set) => {
                let index = self.clone_subtree(source, set.index())?;
                self.attach(self.root, index)?;
                self.adapt(index)
            }
            LogicalAxiom::Atom(atom) => {
                let index = self.clone_subtree(source, atom.index())?;
                self.adapt(index)
            }
        }
    }

    fn clone_subtree(
        &mut self,
        source: &LogicalExpression,
        index: usize,
    ) -> Result<usize, LogicError> {
        let vertex = source
            .vertex(index)
            .ok_or(LogicError::ForeignAxiom { index })?;
        let copy = self.add_vertex(
            vertex.vertex_id(),
            vertex.meaning()?,
            vertex.properties().clone(),
        );
        for &child in source.successors(index) {
            let child_copy = self.clone_subtree(source, child)?;
            self.attach(copy, child_copy)?;
        }
        Ok(copy)
    }

    /// Freezes the tree into an immutable, adapted expression.
    pub fn build(&mut self) -> Result<LogicalExpression, LogicError> {
        self.ensure_open()?;
        self.built = true;
        if let Some(detached) = self.attached.iter().position(|attached| !attached) {
            return Err(LogicError::Detached { index: detached });
        }
        let tree = std::mem::take(&mut self.tree).freeze()?;
        LogicalExpression::new(tree)
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::logic::axiom::{SetKind, TypedAtom};

    #[test]
    fn builds_necessary_definition() {
        let mut builder = ExpressionBuilder::new();
        let parent = builder.concept(Nid::new(7)).expect("concept");
        let and = builder.and([parent]).expect("and");
        let set = builder.necessary_set([and]).expect("set");
        let expression = builder.build().expect("build");

        assert_eq!(set.kind(), SetKind::Necessary);
        let sets = expression.root().sets(&expression).expect("sets");
        assert_eq!(sets.len(), 1);
        let conjunction = sets[0].conjunction(&expression).expect("and child");
        let elements = conjunction.elements(&expression).expect("elements");
        assert!(matches!(elements[0], Atom::Concept(c) if c.concept() == Nid::new(7)));
    }

    #[test]
    fn mutators_fail_after_build() {
        let mut builder = ExpressionBuilder::new();
        builder.build().expect("empty definition");
        assert_eq!(builder.concept(Nid::new(1)), Err(LogicError::AlreadyBuilt));
        assert!(matches!(builder.build(), Err(LogicError::AlreadyBuilt)));
    }

    #[test]
    fn atoms_cannot_be_wired_twice() {
        let mut builder = ExpressionBuilder::new();
        let concept = builder.concept(Nid::new(1)).expect("concept");
        builder.and([concept.clone()]).expect("first parent");
        let err = builder.and([concept]).expect_err("second parent");
        assert!(matches!(err, LogicError::AlreadyAttached { .. }));
    }

    #[test]
    fn detached_atoms_fail_the_build() {
        let mut builder = ExpressionBuilder::new();
        builder.concept(Nid::new(1)).expect("concept");
        assert!(matches!(builder.build(), Err(LogicError::Detached { index: 1 })));
    }

    #[test]
    fn feature_owns_its_literal() {
        let mut builder = ExpressionBuilder::new();
        let literal = builder.integer_literal(12).expect("literal");
        let feature = builder
            .feature(Nid::new(40), ConcreteDomainOperator::GreaterThan, literal)
            .expect("feature");
        let and = builder.and([feature]).expect("and");
        builder.necessary_set([and]).expect("set");
        let expression = builder.build().expect("build");

        let features = expression.axioms_of(Meaning::Feature);
        let LogicalAxiom::Atom(Atom::TypedAtom(TypedAtom::Feature(feature))) = features[0] else {
            panic!("expected feature");
        };
        assert_eq!(feature.operator(), Some(ConcreteDomainOperator::GreaterThan));
        let literal = feature.literal(&expression).expect("literal");
        assert!(matches!(
            literal,
            Atom::Literal(l) if *l.value() == LiteralValue::Integer(12)
        ));
    }

    #[test]
    fn clones_every_variant_kind() {
        let mut builder = ExpressionBuilder::new();
        let filler = builder.concept(Nid::new(3)).expect("concept");
        let role = builder
            .role(Nid::new(4), RoleOperator::Existential, filler)
            .expect("role");
        let instant = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).single().expect("instant");
        let literals = [
            builder.boolean_literal(true).expect("bool"),
            builder.float_literal(1.5).expect("float"),
            builder.instant_literal(instant).expect("instant"),
            builder.string_literal("mg").expect("string"),
        ];
        let mut features = Vec::new();
        for (offset, literal) in literals.into_iter().enumerate() {
            features.push(
                builder
                    .feature(Nid::new(50 + offset as i32), ConcreteDomainOperator::Equal, literal)
                    .expect("feature"),
            );
        }
        let disjoint = builder.disjoint_with(Nid::new(5)).expect("disjoint");
        let left = builder.concept(Nid::new(6)).expect("concept");
        let right = builder.concept(Nid::new(8)).expect("concept");
        let or = builder.or([left, right]).expect("or");
        let mut elements = vec![role, disjoint, or];
        elements.extend(features);
        let and = builder.and(elements).expect("and");
        builder.sufficient_set([and]).expect("sufficient");
        let ppi = builder
            .property_pattern_implication(vec![Nid::new(4), Nid::new(9)], Nid::new(4))
            .expect("ppi");
        let property_and = builder.and([ppi]).expect("and");
        builder.property_set([property_and]).expect("property set");
        let source = builder.build().expect("build");

        let mut copy = ExpressionBuilder::new();
        let root = LogicalAxiom::DefinitionRoot(source.root().clone());
        copy.add_cloned(&source, &root).expect("clone");
        let cloned = copy.build().expect("build copy");

        assert!(cloned.structurally_equals(&source));
        assert_eq!(cloned.axioms().count(), source.axioms().count());
    }
}
