use std::collections::BTreeMap;
use std::fmt::{self, Display, Formatter};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::meaning::{Meaning, PropertyKey, PropertyValue};
use super::LogicError;
use crate::store::Nid;

/// Stable identity of a vertex, preserved across versions of a definition so
/// that correlation can match vertices by identity.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VertexId(Uuid);

impl VertexId {
    /// Generates a fresh random identity.
    #[must_use]
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }

    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Display for VertexId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.0, f)
    }
}

/// Generic vertex of a definition tree.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EntityVertex {
    vertex_id: VertexId,
    index: usize,
    meaning: Nid,
    #[serde(default)]
    properties: BTreeMap<PropertyKey, PropertyValue>,
}

impl EntityVertex {
    #[must_use]
    pub fn new(
        vertex_id: VertexId,
        index: usize,
        meaning: Nid,
        properties: BTreeMap<PropertyKey, PropertyValue>,
    ) -> Self {
        Self {
            vertex_id,
            index,
            meaning,
            properties,
        }
    }

    #[must_use]
    pub fn vertex_id(&self) -> VertexId {
        self.vertex_id
    }

    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }

    /// Raw meaning identifier as stored.
    #[must_use]
    pub fn meaning_nid(&self) -> Nid {
        self.meaning
    }

    /// Meaning resolved against the fixed vocabulary.
    pub fn meaning(&self) -> Result<Meaning, LogicError> {
        Meaning::try_from(self.meaning)
    }

    #[must_use]
    pub fn property(&self, key: PropertyKey) -> Option<&PropertyValue> {
        self.properties.get(&key)
    }

    #[must_use]
    pub fn properties(&self) -> &BTreeMap<PropertyKey, PropertyValue> {
        &self.properties
    }

    /// Reads a required native identifier property.
    pub fn nid_property(&self, key: PropertyKey) -> Result<Nid, LogicError> {
        match self.property(key) {
            Some(PropertyValue::Nid(nid)) => Ok(*nid),
            _ => Err(LogicError::MissingProperty {
                index: self.index,
                key,
            }),
        }
    }
}

/// Serialized shape of a [`DiTree`], validated on the way in.
#[derive(Deserialize)]
struct RawDiTree {
    vertices: Vec<Option<EntityVertex>>,
    successors: Vec<Vec<usize>>,
    root: usize,
}

impl TryFrom<RawDiTree> for DiTree {
    type Error = LogicError;

    fn try_from(raw: RawDiTree) -> Result<Self, Self::Error> {
        Self::from_parts(raw.vertices, raw.successors, raw.root)
    }
}

/// Immutable, index-addressed directed tree of generic vertices.
///
/// Every present vertex is reachable from the root, each vertex has at most
/// one predecessor, and vertex `i` is stored at position `i`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawDiTree")]
pub struct DiTree {
    vertices: Vec<Option<EntityVertex>>,
    successors: Vec<Vec<usize>>,
    #[serde(skip_serializing)]
    predecessors: Vec<Option<usize>>,
    root: usize,
}

impl DiTree {
    /// Assembles a tree from raw parts, enforcing the tree invariants.
    pub fn from_parts(
        vertices: Vec<Option<EntityVertex>>,
        mut successors: Vec<Vec<usize>>,
        root: usize,
    ) -> Result<Self, LogicError> {
        let len = vertices.len();
        if successors.len() > len {
            return Err(LogicError::MalformedTree(format!(
                "{} successor lists for {len} vertices",
                successors.len()
            )));
        }
        successors.resize(len, Vec::new());

        for (position, vertex) in vertices.iter().enumerate() {
            if let Some(vertex) = vertex {
                if vertex.index() != position {
                    return Err(LogicError::MalformedTree(format!(
                        "vertex stored at {position} reports index {}",
                        vertex.index()
                    )));
                }
            }
        }
        if vertices.get(root).map_or(true, Option::is_none) {
            return Err(LogicError::MalformedTree(format!(
                "root {root} is not a vertex"
            )));
        }

        let mut predecessors = vec![None; len];
        for (parent, children) in successors.iter().enumerate() {
            for &child in children {
                if vertices.get(child).map_or(true, Option::is_none)
                    || vertices[parent].is_none()
                {
                    return Err(LogicError::MalformedTree(format!(
                        "edge {parent} -> {child} references a missing vertex"
                    )));
                }
                if child == root {
                    return Err(LogicError::MalformedTree(format!(
                        "root {root} has a predecessor"
                    )));
                }
                if predecessors[child].replace(parent).is_some() {
                    return Err(LogicError::MalformedTree(format!(
                        "vertex {child} has more than one predecessor"
                    )));
                }
            }
        }

        let mut reached = vec![false; len];
        let mut stack = vec![root];
        while let Some(index) = stack.pop() {
            if std::mem::replace(&mut reached[index], true) {
                return Err(LogicError::MalformedTree(format!(
                    "cycle through vertex {index}"
                )));
            }
            stack.extend(successors[index].iter().copied());
        }
        if let Some(unreached) =
            (0..len).find(|&index| vertices[index].is_some() && !reached[index])
        {
            return Err(LogicError::MalformedTree(format!(
                "vertex {unreached} is not reachable from the root"
            )));
        }

        Ok(Self {
            vertices,
            successors,
            predecessors,
            root,
        })
    }

    #[must_use]
    pub fn root(&self) -> usize {
        self.root
    }

    /// Number of vertex slots, including empty ones.
    #[must_use]
    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    #[must_use]
    pub fn vertex(&self, index: usize) -> Option<&EntityVertex> {
        self.vertices.get(index).and_then(Option::as_ref)
    }

    /// Present vertices in index order.
    pub fn vertices(&self) -> impl Iterator<Item = &EntityVertex> {
        self.vertices.iter().flatten()
    }

    #[must_use]
    pub fn successors(&self, index: usize) -> &[usize] {
        self.successors.get(index).map_or(&[], Vec::as_slice)
    }

    #[must_use]
    pub fn predecessor(&self, index: usize) -> Option<usize> {
        self.predecessors.get(index).copied().flatten()
    }

    /// Returns a copy of the tree with the supplied vertex identities
    /// substituted; `None` entries keep the current identity.
    #[must_use]
    pub fn with_vertex_ids(&self, ids: &[Option<VertexId>]) -> Self {
        let mut tree = self.clone();
        for (slot, id) in tree.vertices.iter_mut().zip(ids) {
            if let (Some(vertex), Some(id)) = (slot.as_mut(), id) {
                vertex.vertex_id = *id;
            }
        }
        tree
    }
}

/// Growable tree used while a definition is being assembled.
#[derive(Debug, Default)]
pub(crate) struct MutableDiTree {
    vertices: Vec<EntityVertex>,
    successors: Vec<Vec<usize>>,
    root: Option<usize>,
}

impl MutableDiTree {
    pub(crate) fn add_vertex(
        &mut self,
        vertex_id: VertexId,
        meaning: Meaning,
        properties: BTreeMap<PropertyKey, PropertyValue>,
    ) -> usize {
        let index = self.vertices.len();
        self.vertices.push(EntityVertex::new(
            vertex_id,
            index,
            meaning.nid(),
            properties,
        ));
        self.successors.push(Vec::new());
        index
    }

    pub(crate) fn add_edge(&mut self, parent: usize, child: usize) {
        if let Some(children) = self.successors.get_mut(parent) {
            children.push(child);
        }
    }

    pub(crate) fn set_root(&mut self, root: usize) {
        self.root = Some(root);
    }

    pub(crate) fn vertex(&self, index: usize) -> Option<&EntityVertex> {
        self.vertices.get(index)
    }

    pub(crate) fn freeze(self) -> Result<DiTree, LogicError> {
        let root = self
            .root
            .ok_or_else(|| LogicError::MalformedTree("tree has no root".to_string()))?;
        DiTree::from_parts(
            self.vertices.into_iter().map(Some).collect(),
            self.successors,
            root,
        )
    }
}
