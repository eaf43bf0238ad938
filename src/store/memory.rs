use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use super::entities::{CommitCoordinate, SemanticRecord};
use super::repositories::{SemanticStore, Transaction};
use super::value_objects::Nid;
use super::StoreError;

#[derive(Debug, Default)]
struct StoreState {
    semantics: BTreeMap<Nid, SemanticRecord>,
    last_commit: Option<DateTime<Utc>>,
}

/// Process-local [`SemanticStore`] keeping every record in memory.
#[derive(Debug)]
pub struct InMemorySemanticStore {
    state: Mutex<StoreState>,
    next_nid: AtomicI32,
}

impl Default for InMemorySemanticStore {
    fn default() -> Self {
        Self {
            state: Mutex::new(StoreState::default()),
            next_nid: AtomicI32::new(1),
        }
    }
}

impl InMemorySemanticStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn guard(&self) -> Result<MutexGuard<'_, StoreState>, StoreError> {
        self.state.lock().map_err(|_| StoreError::Poisoned)
    }

    /// Number of stored semantics.
    pub fn len(&self) -> Result<usize, StoreError> {
        Ok(self.guard()?.semantics.len())
    }

    pub fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.guard()?.semantics.is_empty())
    }
}

impl SemanticStore for InMemorySemanticStore {
    fn semantics_of_pattern(&self, pattern: Nid) -> Result<Vec<Nid>, StoreError> {
        Ok(self
            .guard()?
            .semantics
            .values()
            .filter(|record| record.pattern() == pattern)
            .map(SemanticRecord::nid)
            .collect())
    }

    fn semantics_for_component(
        &self,
        component: Nid,
        pattern: Nid,
    ) -> Result<Vec<Nid>, StoreError> {
        Ok(self
            .guard()?
            .semantics
            .values()
            .filter(|record| {
                record.pattern() == pattern && record.referenced_component() == component
            })
            .map(SemanticRecord::nid)
            .collect())
    }

    fn record(&self, semantic: Nid) -> Result<Option<SemanticRecord>, StoreError> {
        Ok(self.guard()?.semantics.get(&semantic).cloned())
    }

    fn new_nid(&self) -> Result<Nid, StoreError> {
        let guard = self.guard()?;
        loop {
            let candidate = self.next_nid.fetch_add(1, Ordering::Relaxed);
            if candidate == i32::MAX {
                return Err(StoreError::NidsExhausted);
            }
            let nid = Nid::new(candidate);
            if !guard.semantics.contains_key(&nid) {
                return Ok(nid);
            }
        }
    }

    fn commit(&self, transaction: Transaction) -> Result<CommitCoordinate, StoreError> {
        let id = transaction.id();
        let path = transaction.path();
        let name = transaction.name().to_string();
        let records = transaction.into_components();

        let mut guard = self.guard()?;
        for record in &records {
            if let Some(existing) = guard.semantics.get(&record.nid()) {
                if existing.pattern() != record.pattern()
                    || existing.referenced_component() != record.referenced_component()
                {
                    return Err(StoreError::RecordMismatch {
                        semantic: record.nid(),
                    });
                }
            }
        }

        // Commit times are strictly increasing so every commit has its own view.
        let now = Utc::now();
        let time = match guard.last_commit {
            Some(last) if now <= last => last + Duration::microseconds(1),
            _ => now,
        };
        guard.last_commit = Some(time);

        let written = records.len();
        for mut record in records {
            record.commit(time);
            match guard.semantics.get_mut(&record.nid()) {
                Some(existing) => {
                    for version in record.versions() {
                        if !existing.versions().contains(version) {
                            existing.add_version(version.clone());
                        }
                    }
                }
                None => {
                    guard.semantics.insert(record.nid(), record);
                }
            }
        }
        debug!(transaction = %id, name = %name, records = written, time = %time, "store_commit");

        Ok(CommitCoordinate {
            time,
            transaction: id,
            path,
        })
    }
}
