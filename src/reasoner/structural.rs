//! Built-in told-subsumption classifier.
//!
//! Handles the four axiom shapes produced by extraction:
//!
//! - `A ⊑ C` adds the named conjuncts and existentials of `C` to `A`;
//! - `C ⊑ D` with a complex `C` defines `D`: every concept satisfying all of
//!   `C` (named conjuncts and existentials, role hierarchy aware) is
//!   subsumed by `D`;
//! - role inclusions close reflexively and transitively;
//! - mutual subsumption yields an equivalence class.
//!
//! Inclusions between two complex terms contribute only the named conjuncts
//! of their right-hand side. Unsatisfiability is not detected, so no concept
//! is placed under the bottom node except as a leaf.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use super::classifier::{Classifier, ClassifierError, LoadedOntology, LoadedOntologyHandle};
use super::taxonomy::Taxonomy;
use super::terms::{label_of, Axiom, ConceptTerm, BOTTOM_LABEL, TOP_LABEL};
use crate::store::Nid;

/// Flattened concept term: named conjuncts plus existential restrictions.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
struct Profile {
    named: BTreeSet<Nid>,
    existentials: Vec<(Nid, Profile)>,
}

impl Profile {
    fn of(term: &ConceptTerm) -> Self {
        let mut profile = Self::default();
        profile.absorb(term);
        profile
    }

    fn absorb(&mut self, term: &ConceptTerm) {
        match term {
            ConceptTerm::Named(concept) => {
                self.named.insert(concept.nid());
            }
            ConceptTerm::Conjunction(operands) => {
                for operand in operands {
                    self.absorb(operand);
                }
            }
            ConceptTerm::Existential { role, filler } => {
                self.existentials.push((role.nid(), Self::of(filler)));
            }
        }
    }

    fn merge(&mut self, other: Self) {
        self.named.extend(other.named);
        self.existentials.extend(other.existentials);
    }

    fn collect_concepts(&self, into: &mut BTreeSet<Nid>) {
        into.extend(self.named.iter().copied());
        for (_, filler) in &self.existentials {
            filler.collect_concepts(into);
        }
    }
}

#[derive(Debug, Default)]
struct OntologyIndex {
    concepts: BTreeSet<Nid>,
    told: BTreeMap<Nid, Profile>,
    definitions: Vec<(Nid, Profile)>,
    role_supers: HashMap<Nid, BTreeSet<Nid>>,
    axiom_count: usize,
}

impl OntologyIndex {
    fn build(axioms: &[Axiom]) -> Self {
        let mut index = Self {
            axiom_count: axioms.len(),
            ..Self::default()
        };
        let mut told_roles: HashMap<Nid, BTreeSet<Nid>> = HashMap::new();

        for axiom in axioms {
            match axiom {
                Axiom::ConceptInclusion { sub, sup } => {
                    let (sub, sup) = (Profile::of(sub), Profile::of(sup));
                    sub.collect_concepts(&mut index.concepts);
                    sup.collect_concepts(&mut index.concepts);
                    let told_subject = match sub.named.iter().next() {
                        Some(&named) if sub.named.len() == 1 && sub.existentials.is_empty() => {
                            Some(named)
                        }
                        _ => None,
                    };
                    if let Some(named) = told_subject {
                        index.told.entry(named).or_default().merge(sup);
                    } else {
                        if !sup.existentials.is_empty() {
                            debug!(axiom = %axiom, "structural_classifier_gci_existentials_ignored");
                        }
                        for defined in sup.named {
                            index.definitions.push((defined, sub.clone()));
                        }
                    }
                }
                Axiom::RoleInclusion { sub, sup } => {
                    told_roles.entry(sub.nid()).or_default().insert(sup.nid());
                    told_roles.entry(sup.nid()).or_default();
                }
            }
        }

        for &role in told_roles.keys() {
            let mut closure = BTreeSet::from([role]);
            let mut pending = vec![role];
            while let Some(current) = pending.pop() {
                for &sup in told_roles.get(&current).into_iter().flatten() {
                    if closure.insert(sup) {
                        pending.push(sup);
                    }
                }
            }
            index.role_supers.insert(role, closure);
        }
        index
    }

    fn role_subsumed(&self, sub: Nid, sup: Nid) -> bool {
        sub == sup
            || self
                .role_supers
                .get(&sub)
                .is_some_and(|supers| supers.contains(&sup))
    }

    /// Named closure of a set of concepts under the current subsumptions.
    fn closure(&self, named: &BTreeSet<Nid>, supers: &BTreeMap<Nid, BTreeSet<Nid>>) -> BTreeSet<Nid> {
        let mut closure = named.clone();
        for concept in named {
            if let Some(known) = supers.get(concept) {
                closure.extend(known.iter().copied());
            }
        }
        closure
    }

    /// Whether `sub ⊑ sup` follows from the current subsumptions.
    fn entails(
        &self,
        sub: &Profile,
        sup: &Profile,
        supers: &BTreeMap<Nid, BTreeSet<Nid>>,
    ) -> bool {
        let closure = self.closure(&sub.named, supers);
        if !sup.named.is_subset(&closure) {
            return false;
        }
        sup.existentials.iter().all(|(role, filler)| {
            let own = sub.existentials.iter();
            let inherited = closure
                .iter()
                .filter_map(|concept| self.told.get(concept))
                .flat_map(|profile| profile.existentials.iter());
            own.chain(inherited).any(|(candidate_role, candidate_filler)| {
                self.role_subsumed(*candidate_role, *role)
                    && self.entails(candidate_filler, filler, supers)
            })
        })
    }

    fn saturate(&self) -> BTreeMap<Nid, BTreeSet<Nid>> {
        let mut supers: BTreeMap<Nid, BTreeSet<Nid>> = self
            .concepts
            .iter()
            .map(|&concept| {
                let mut known = BTreeSet::from([concept]);
                if let Some(told) = self.told.get(&concept) {
                    known.extend(told.named.iter().copied());
                }
                (concept, known)
            })
            .collect();

        loop {
            let mut changed = false;

            for &concept in &self.concepts {
                let known = supers.get(&concept).cloned().unwrap_or_default();
                let closed = self.closure(&known, &supers);
                if closed.len() > known.len() {
                    supers.insert(concept, closed);
                    changed = true;
                }
            }

            for (defined, definition) in &self.definitions {
                for &concept in &self.concepts {
                    let already = supers
                        .get(&concept)
                        .is_some_and(|known| known.contains(defined));
                    if already {
                        continue;
                    }
                    let candidate_profile = Profile {
                        named: BTreeSet::from([concept]),
                        existentials: Vec::new(),
                    };
                    if self.entails(&candidate_profile, definition, &supers) {
                        supers.entry(concept).or_default().insert(*defined);
                        changed = true;
                    }
                }
            }

            if !changed {
                return supers;
            }
        }
    }

    fn taxonomy(&self) -> Taxonomy {
        let supers = self.saturate();
        let subsumes = |sub: Nid, sup: Nid| supers.get(&sub).is_some_and(|s| s.contains(&sup));

        let mut class_of: BTreeMap<Nid, usize> = BTreeMap::new();
        let mut classes: Vec<BTreeSet<Nid>> = Vec::new();
        for &concept in &self.concepts {
            if class_of.contains_key(&concept) {
                continue;
            }
            let members: BTreeSet<Nid> = supers
                .get(&concept)
                .into_iter()
                .flatten()
                .copied()
                .filter(|&other| subsumes(other, concept))
                .chain([concept])
                .collect();
            for &member in &members {
                class_of.insert(member, classes.len());
            }
            classes.push(members);
        }

        let representative = |class: usize| classes[class].iter().next().copied();
        let mut taxonomy = Taxonomy::new();
        let mut is_parent = vec![false; classes.len()];
        let mut parents_of: Vec<BTreeSet<usize>> = Vec::with_capacity(classes.len());

        for (position, members) in classes.iter().enumerate() {
            let strict: BTreeSet<usize> = members
                .iter()
                .filter_map(|member| supers.get(member))
                .flatten()
                .filter_map(|sup| class_of.get(sup).copied())
                .filter(|&class| class != position)
                .collect();
            let direct: BTreeSet<usize> = strict
                .iter()
                .copied()
                .filter(|&candidate| {
                    !strict.iter().any(|&other| {
                        other != candidate
                            && match (representative(other), representative(candidate)) {
                                (Some(lower), Some(upper)) => subsumes(lower, upper),
                                _ => false,
                            }
                    })
                })
                .collect();
            for &parent in &direct {
                is_parent[parent] = true;
            }
            parents_of.push(direct);
        }

        for (position, members) in classes.iter().enumerate() {
            let parents: Vec<String> = if parents_of[position].is_empty() {
                vec![TOP_LABEL.to_string()]
            } else {
                parents_of[position]
                    .iter()
                    .filter_map(|&parent| representative(parent))
                    .map(label_of)
                    .collect()
            };
            taxonomy.insert(members.iter().copied().map(label_of), parents);
        }

        let leaves: Vec<String> = classes
            .iter()
            .enumerate()
            .filter(|(position, _)| !is_parent[*position])
            .filter_map(|(position, _)| representative(position))
            .map(label_of)
            .collect();
        let bottom_parents = if leaves.is_empty() {
            vec![TOP_LABEL.to_string()]
        } else {
            leaves
        };
        taxonomy.insert([TOP_LABEL], Vec::<String>::new());
        taxonomy.insert([BOTTOM_LABEL], bottom_parents);
        taxonomy
    }
}

/// [`Classifier`] backed by [`OntologyIndex`] saturation.
#[derive(Clone, Debug, Default)]
pub struct StructuralClassifier;

impl StructuralClassifier {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Classifier for StructuralClassifier {
    fn name(&self) -> &str {
        "structural"
    }

    async fn load(&self, axioms: Vec<Axiom>) -> Result<Box<LoadedOntologyHandle>, ClassifierError> {
        let index = tokio::task::spawn_blocking(move || OntologyIndex::build(&axioms)).await?;
        debug!(
            axioms = index.axiom_count,
            concepts = index.concepts.len(),
            definitions = index.definitions.len(),
            "structural_classifier_loaded"
        );
        Ok(Box::new(StructuralOntology {
            index: Arc::new(index),
        }))
    }
}

struct StructuralOntology {
    index: Arc<OntologyIndex>,
}

#[async_trait]
impl LoadedOntology for StructuralOntology {
    fn axiom_count(&self) -> usize {
        self.index.axiom_count
    }

    async fn classify(&self) -> Result<Taxonomy, ClassifierError> {
        let index = Arc::clone(&self.index);
        Ok(tokio::task::spawn_blocking(move || index.taxonomy()).await?)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;
    use crate::reasoner::TermFactory;

    struct Terms(TermFactory);

    impl Terms {
        fn c(&self, nid: i32) -> ConceptTerm {
            ConceptTerm::Named(self.0.concept(Nid::new(nid)))
        }

        fn some(&self, role: i32, filler: ConceptTerm) -> ConceptTerm {
            ConceptTerm::Existential {
                role: self.0.role(Nid::new(role)),
                filler: Box::new(filler),
            }
        }

        fn sub(&self, sub: ConceptTerm, sup: ConceptTerm) -> Axiom {
            Axiom::ConceptInclusion { sub, sup }
        }

        fn role_sub(&self, sub: i32, sup: i32) -> Axiom {
            Axiom::RoleInclusion {
                sub: self.0.role(Nid::new(sub)),
                sup: self.0.role(Nid::new(sup)),
            }
        }
    }

    async fn classify(axioms: Vec<Axiom>) -> Taxonomy {
        let loaded = StructuralClassifier::new()
            .load(axioms)
            .await
            .expect("load");
        loaded.classify().await.expect("classify")
    }

    fn parents(taxonomy: &Taxonomy, nid: i32) -> BTreeSet<String> {
        taxonomy
            .node(&nid.to_string())
            .expect("node")
            .parents()
            .clone()
    }

    fn labels(values: &[&str]) -> BTreeSet<String> {
        values.iter().map(ToString::to_string).collect()
    }

    #[tokio::test]
    async fn told_hierarchy_is_reduced_to_direct_parents() {
        let t = Terms(TermFactory::new());
        let taxonomy = classify(vec![
            t.sub(t.c(3), ConceptTerm::Conjunction(vec![t.c(2), t.c(1)])),
            t.sub(t.c(2), ConceptTerm::Conjunction(vec![t.c(1)])),
        ])
        .await;
        assert_eq!(parents(&taxonomy, 3), labels(&["2"]));
        assert_eq!(parents(&taxonomy, 2), labels(&["1"]));
        assert_eq!(parents(&taxonomy, 1), labels(&[TOP_LABEL]));
        let bottom = taxonomy.node(BOTTOM_LABEL).expect("bottom");
        assert_eq!(bottom.parents(), &labels(&["3"]));
    }

    #[tokio::test]
    async fn defined_concepts_are_recognised() {
        let t = Terms(TermFactory::new());
        // 10 ≡ 1 ⊓ ∃5.2 ; 11 ⊑ 1 ⊓ ∃6.3 ; 3 ⊑ 2 ; 6 ⊑ 5
        let definition = ConceptTerm::Conjunction(vec![t.c(1), t.some(5, t.c(2))]);
        let taxonomy = classify(vec![
            t.sub(t.c(10), definition.clone()),
            t.sub(definition, t.c(10)),
            t.sub(t.c(11), ConceptTerm::Conjunction(vec![t.c(1), t.some(6, t.c(3))])),
            t.sub(t.c(3), t.c(2)),
            t.role_sub(6, 5),
        ])
        .await;
        assert_eq!(parents(&taxonomy, 11), labels(&["10"]));
        assert_eq!(parents(&taxonomy, 10), labels(&["1"]));
    }

    #[tokio::test]
    async fn unrelated_role_does_not_satisfy_definition() {
        let t = Terms(TermFactory::new());
        let definition = ConceptTerm::Conjunction(vec![t.c(1), t.some(5, t.c(2))]);
        let taxonomy = classify(vec![
            t.sub(t.c(10), definition.clone()),
            t.sub(definition, t.c(10)),
            t.sub(t.c(11), ConceptTerm::Conjunction(vec![t.c(1), t.some(7, t.c(2))])),
        ])
        .await;
        assert_eq!(parents(&taxonomy, 11), labels(&["1"]));
    }

    #[tokio::test]
    async fn mutual_subsumption_collapses_into_one_node() {
        let t = Terms(TermFactory::new());
        let taxonomy = classify(vec![
            t.sub(t.c(20), ConceptTerm::Conjunction(vec![t.c(21), t.c(1)])),
            t.sub(t.c(21), ConceptTerm::Conjunction(vec![t.c(20)])),
            t.sub(t.c(22), ConceptTerm::Conjunction(vec![t.c(21)])),
        ])
        .await;
        let node = taxonomy.node("20").expect("node");
        assert_eq!(node.equivalents(), &labels(&["20", "21"]));
        assert_eq!(taxonomy.node("21"), Some(node));
        assert_eq!(parents(&taxonomy, 22), labels(&["20"]));
        assert_eq!(taxonomy.equivalence_classes().count(), 1);
    }
}
