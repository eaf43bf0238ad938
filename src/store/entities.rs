use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::value_objects::Nid;
use crate::logic::DiTree;

/// Lifecycle state carried by a stamp.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum State {
    Active,
    Inactive,
}

/// Versioning metadata attached to every semantic version.
///
/// A stamp without a time belongs to an uncommitted transaction and is not
/// visible to any [`StampCoordinate`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stamp {
    state: State,
    time: Option<DateTime<Utc>>,
    author: Nid,
    module: Nid,
    path: Nid,
}

impl Stamp {
    /// Creates a stamp awaiting its commit time.
    #[must_use]
    pub fn uncommitted(state: State, author: Nid, module: Nid, path: Nid) -> Self {
        Self {
            state,
            time: None,
            author,
            module,
            path,
        }
    }

    #[must_use]
    pub fn committed_at(mut self, time: DateTime<Utc>) -> Self {
        self.time = Some(time);
        self
    }

    #[must_use]
    pub fn state(&self) -> State {
        self.state
    }

    #[must_use]
    pub fn time(&self) -> Option<DateTime<Utc>> {
        self.time
    }

    #[must_use]
    pub fn author(&self) -> Nid {
        self.author
    }

    #[must_use]
    pub fn module(&self) -> Nid {
        self.module
    }

    #[must_use]
    pub fn path(&self) -> Nid {
        self.path
    }

    #[must_use]
    pub fn is_committed(&self) -> bool {
        self.time.is_some()
    }
}

/// View filter used by "latest version" lookups.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StampCoordinate {
    time: Option<DateTime<Utc>>,
    path: Nid,
    allowed_states: BTreeSet<State>,
}

impl StampCoordinate {
    /// Latest committed active versions on a path.
    #[must_use]
    pub fn latest(path: Nid) -> Self {
        Self {
            time: None,
            path,
            allowed_states: BTreeSet::from([State::Active]),
        }
    }

    /// Versions committed on a path at or before `time`.
    #[must_use]
    pub fn at(time: DateTime<Utc>, path: Nid) -> Self {
        Self {
            time: Some(time),
            ..Self::latest(path)
        }
    }

    #[must_use]
    pub fn with_states(mut self, states: impl IntoIterator<Item = State>) -> Self {
        self.allowed_states = states.into_iter().collect();
        self
    }

    #[must_use]
    pub fn path(&self) -> Nid {
        self.path
    }

    #[must_use]
    pub fn time(&self) -> Option<DateTime<Utc>> {
        self.time
    }

    /// Whether a version carrying `stamp` is visible through this coordinate.
    #[must_use]
    pub fn admits(&self, stamp: &Stamp) -> bool {
        let Some(committed) = stamp.time() else {
            return false;
        };
        stamp.path() == self.path
            && self.allowed_states.contains(&stamp.state())
            && self.time.map_or(true, |limit| committed <= limit)
    }
}

/// One version of a semantic: a stamp plus its definition tree.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SemanticVersion {
    stamp: Stamp,
    tree: DiTree,
}

impl SemanticVersion {
    #[must_use]
    pub fn new(stamp: Stamp, tree: DiTree) -> Self {
        Self { stamp, tree }
    }

    #[must_use]
    pub fn stamp(&self) -> &Stamp {
        &self.stamp
    }

    #[must_use]
    pub fn tree(&self) -> &DiTree {
        &self.tree
    }

    pub(crate) fn commit(&mut self, time: DateTime<Utc>) {
        if !self.stamp.is_committed() {
            self.stamp.time = Some(time);
        }
    }
}

/// Versioned semantic of a pattern attached to a referenced component.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SemanticRecord {
    nid: Nid,
    pattern: Nid,
    referenced_component: Nid,
    versions: Vec<SemanticVersion>,
}

impl SemanticRecord {
    /// Creates a record holding its first version.
    #[must_use]
    pub fn new(
        nid: Nid,
        pattern: Nid,
        referenced_component: Nid,
        version: SemanticVersion,
    ) -> Self {
        Self {
            nid,
            pattern,
            referenced_component,
            versions: vec![version],
        }
    }

    #[must_use]
    pub fn nid(&self) -> Nid {
        self.nid
    }

    #[must_use]
    pub fn pattern(&self) -> Nid {
        self.pattern
    }

    #[must_use]
    pub fn referenced_component(&self) -> Nid {
        self.referenced_component
    }

    #[must_use]
    pub fn versions(&self) -> &[SemanticVersion] {
        &self.versions
    }

    pub fn add_version(&mut self, version: SemanticVersion) {
        self.versions.push(version);
    }

    /// Most recent version visible through `coordinate`. Equal commit times
    /// resolve to the version appended last.
    #[must_use]
    pub fn latest(&self, coordinate: &StampCoordinate) -> Option<&SemanticVersion> {
        self.versions
            .iter()
            .filter(|version| coordinate.admits(version.stamp()))
            .max_by_key(|version| version.stamp().time())
    }

    #[must_use]
    pub fn has_uncommitted(&self) -> bool {
        self.versions.iter().any(|v| !v.stamp().is_committed())
    }

    pub(crate) fn commit(&mut self, time: DateTime<Utc>) {
        for version in &mut self.versions {
            version.commit(time);
        }
    }
}

/// Result of a successful transaction commit.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitCoordinate {
    pub time: DateTime<Utc>,
    pub transaction: Uuid,
    pub path: Nid,
}

impl CommitCoordinate {
    /// View coordinate that sees everything committed up to this commit.
    #[must_use]
    pub fn view(&self) -> StampCoordinate {
        StampCoordinate::at(self.time, self.path)
    }
}
