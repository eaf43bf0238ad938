use std::sync::Arc;

use dashmap::DashMap;

use super::terms::{NamedConcept, NamedFeature, NamedRole};
use crate::store::Nid;

/// Per-run deduplicating caches of reasoner-facing wrappers.
///
/// Lookups are atomic get-or-insert: concurrent first use of the same native
/// identifier from several threads converges on a single shared wrapper.
#[derive(Debug, Default)]
pub struct TermFactory {
    concepts: DashMap<Nid, Arc<NamedConcept>>,
    roles: DashMap<Nid, Arc<NamedRole>>,
    features: DashMap<Nid, Arc<NamedFeature>>,
}

impl TermFactory {
    /// Creates empty caches.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Shared wrapper for concept `nid`, created on first use.
    pub fn concept(&self, nid: Nid) -> Arc<NamedConcept> {
        let entry = self
            .concepts
            .entry(nid)
            .or_insert_with(|| Arc::new(NamedConcept::new(nid)));
        Arc::clone(entry.value())
    }

    /// Shared wrapper for role `nid`, created on first use.
    pub fn role(&self, nid: Nid) -> Arc<NamedRole> {
        let entry = self
            .roles
            .entry(nid)
            .or_insert_with(|| Arc::new(NamedRole::new(nid)));
        Arc::clone(entry.value())
    }

    /// Shared wrapper for feature `nid`, created on first use.
    pub fn feature(&self, nid: Nid) -> Arc<NamedFeature> {
        let entry = self
            .features
            .entry(nid)
            .or_insert_with(|| Arc::new(NamedFeature::new(nid)));
        Arc::clone(entry.value())
    }

    /// Number of distinct concepts seen.
    #[must_use]
    pub fn concept_count(&self) -> usize {
        self.concepts.len()
    }

    /// Number of distinct roles seen.
    #[must_use]
    pub fn role_count(&self) -> usize {
        self.roles.len()
    }

    /// Number of distinct features seen.
    #[must_use]
    pub fn feature_count(&self) -> usize {
        self.features.len()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Barrier;
    use std::thread;

    use super::*;

    #[test]
    fn concurrent_first_use_shares_one_wrapper() {
        const THREADS: usize = 16;
        let factory = TermFactory::new();
        let barrier = Barrier::new(THREADS);

        let wrappers: Vec<Arc<NamedConcept>> = thread::scope(|scope| {
            let handles: Vec<_> = (0..THREADS)
                .map(|_| {
                    scope.spawn(|| {
                        barrier.wait();
                        factory.concept(Nid::new(77))
                    })
                })
                .collect();
            handles
                .into_iter()
                .map(|handle| handle.join().expect("thread"))
                .collect()
        });

        assert_eq!(factory.concept_count(), 1);
        assert!(wrappers.iter().all(|w| Arc::ptr_eq(w, &wrappers[0])));
    }

    #[test]
    fn namespaces_are_independent() {
        let factory = TermFactory::new();
        let concept = factory.concept(Nid::new(5));
        let role = factory.role(Nid::new(5));
        let feature = factory.feature(Nid::new(5));
        assert_eq!(concept.label(), role.label());
        assert_eq!(feature.nid(), Nid::new(5));
        assert!(Arc::ptr_eq(&factory.feature(Nid::new(5)), &feature));
        assert_eq!(
            (factory.concept_count(), factory.role_count(), factory.feature_count()),
            (1, 1, 1)
        );
    }
}
