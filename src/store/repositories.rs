use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use uuid::Uuid;

use super::entities::{CommitCoordinate, SemanticRecord, SemanticVersion, StampCoordinate};
use super::value_objects::Nid;
use super::StoreError;

/// Accumulator of new or updated semantic records awaiting one atomic commit.
///
/// Adding components is safe from any number of threads; the commit itself is
/// performed once by handing the transaction to [`SemanticStore::commit`].
#[derive(Debug)]
pub struct Transaction {
    id: Uuid,
    name: String,
    path: Nid,
    components: DashMap<Nid, SemanticRecord>,
}

impl Transaction {
    #[must_use]
    pub fn new(name: impl Into<String>, path: Nid) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            path,
            components: DashMap::new(),
        }
    }

    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn path(&self) -> Nid {
        self.path
    }

    /// Registers a record carrying uncommitted versions.
    ///
    /// A second record for the same semantic contributes its uncommitted
    /// versions to the one already registered.
    pub fn add_component(&self, record: SemanticRecord) {
        match self.components.entry(record.nid()) {
            Entry::Occupied(mut existing) => {
                let pending: Vec<SemanticVersion> = record
                    .versions()
                    .iter()
                    .filter(|version| !version.stamp().is_committed())
                    .cloned()
                    .collect();
                for version in pending {
                    existing.get_mut().add_version(version);
                }
            }
            Entry::Vacant(slot) => {
                slot.insert(record);
            }
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.components.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    #[must_use]
    pub fn contains(&self, semantic: Nid) -> bool {
        self.components.contains_key(&semantic)
    }

    /// Consumes the transaction, returning its records ordered by semantic.
    #[must_use]
    pub fn into_components(self) -> Vec<SemanticRecord> {
        let mut records: Vec<SemanticRecord> =
            self.components.into_iter().map(|(_, record)| record).collect();
        records.sort_by_key(SemanticRecord::nid);
        records
    }
}

/// Contract of the backing entity/versioning store.
///
/// Lookups are synchronous because they are issued from data-parallel worker
/// threads; implementors must be shareable across those threads.
pub trait SemanticStore: Send + Sync {
    /// Semantics of `pattern`, in ascending order.
    fn semantics_of_pattern(&self, pattern: Nid) -> Result<Vec<Nid>, StoreError>;

    /// Semantics of `pattern` whose referenced component is `component`,
    /// in ascending order.
    fn semantics_for_component(&self, component: Nid, pattern: Nid)
        -> Result<Vec<Nid>, StoreError>;

    /// Full record of a semantic, or `Ok(None)` when it does not exist.
    fn record(&self, semantic: Nid) -> Result<Option<SemanticRecord>, StoreError>;

    /// Latest version of a semantic visible through `coordinate`.
    fn latest_version(
        &self,
        semantic: Nid,
        coordinate: &StampCoordinate,
    ) -> Result<Option<SemanticVersion>, StoreError> {
        Ok(self
            .record(semantic)?
            .and_then(|record| record.latest(coordinate).cloned()))
    }

    /// Allocates a fresh native identifier for a new semantic.
    fn new_nid(&self) -> Result<Nid, StoreError>;

    /// Makes every uncommitted version of the transaction visible at one
    /// commit time. Either all records are written or none are.
    fn commit(&self, transaction: Transaction) -> Result<CommitCoordinate, StoreError>;
}
