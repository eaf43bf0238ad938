use std::collections::{BTreeSet, HashMap};

/// Node of a classified ontology: an equivalence class and the
/// representative labels of its direct parents.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TaxonomyNode {
    equivalents: BTreeSet<String>,
    parents: BTreeSet<String>,
}

impl TaxonomyNode {
    /// Labels proven equivalent, including the node's own label.
    #[must_use]
    pub fn equivalents(&self) -> &BTreeSet<String> {
        &self.equivalents
    }

    /// One label per direct parent node.
    #[must_use]
    pub fn parents(&self) -> &BTreeSet<String> {
        &self.parents
    }
}

/// Classified ontology queryable by reasoner label.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Taxonomy {
    nodes: Vec<TaxonomyNode>,
    by_label: HashMap<String, usize>,
}

impl Taxonomy {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a node. Labels already present are moved to the new node.
    pub fn insert<E, P>(&mut self, equivalents: E, parents: P)
    where
        E: IntoIterator,
        E::Item: Into<String>,
        P: IntoIterator,
        P::Item: Into<String>,
    {
        let node = TaxonomyNode {
            equivalents: equivalents.into_iter().map(Into::into).collect(),
            parents: parents.into_iter().map(Into::into).collect(),
        };
        let position = self.nodes.len();
        for label in &node.equivalents {
            if let Some(previous) = self.by_label.insert(label.clone(), position) {
                if let Some(stale) = self.nodes.get_mut(previous) {
                    stale.equivalents.remove(label);
                }
            }
        }
        self.nodes.push(node);
    }

    #[must_use]
    pub fn node(&self, label: &str) -> Option<&TaxonomyNode> {
        self.by_label
            .get(label)
            .and_then(|&position| self.nodes.get(position))
    }

    /// Equivalence classes holding more than one label.
    pub fn equivalence_classes(&self) -> impl Iterator<Item = &BTreeSet<String>> {
        self.nodes
            .iter()
            .map(TaxonomyNode::equivalents)
            .filter(|members| members.len() > 1)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nodes_are_reachable_from_every_member_label() {
        let mut taxonomy = Taxonomy::new();
        taxonomy.insert(["1", "2"], ["owl:Thing"]);
        let by_first = taxonomy.node("1").expect("node");
        let by_second = taxonomy.node("2").expect("node");
        assert_eq!(by_first, by_second);
        assert_eq!(by_first.parents().len(), 1);
        assert_eq!(taxonomy.equivalence_classes().count(), 1);
        assert!(taxonomy.node("3").is_none());
    }

    #[test]
    fn reinserted_label_leaves_its_previous_class() {
        let mut taxonomy = Taxonomy::new();
        taxonomy.insert(["1", "2"], ["owl:Thing"]);
        taxonomy.insert(["2"], ["1"]);
        assert_eq!(
            taxonomy.node("1").expect("node").equivalents(),
            &BTreeSet::from(["1".to_string()])
        );
        assert_eq!(taxonomy.node("2").expect("node").parents().len(), 1);
        assert_eq!(taxonomy.equivalence_classes().count(), 0);
    }
}
