//! Memoized "is this relationship template unique" answers.
//!
//! Reads hit the `DashMap` without taking a global lock. Two threads missing
//! the same key at once may both query the store; both write the same value,
//! so that race is left alone.
//!
//! Every slot carries a generation bumped by [`UniquenessCache::invalidate`]
//! and [`UniquenessCache::clear`]. A lookup records its answer only if the
//! generation it started under is still current, so a store read that began
//! before an invalidation never repopulates the cache with the old flag.

use crate::store::TemplateStore;
use dashmap::DashMap;
use ontosync_model::Result;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Debug, Default)]
struct Slot {
    generation: u64,
    answer: Option<bool>,
}

pub struct UniquenessCache {
    store: Arc<dyn TemplateStore>,
    answers: DashMap<String, Slot>,
    epoch: AtomicU64,
    queries: AtomicUsize,
}

impl UniquenessCache {
    pub fn new(store: Arc<dyn TemplateStore>) -> Self {
        Self {
            store,
            answers: DashMap::new(),
            epoch: AtomicU64::new(0),
            queries: AtomicUsize::new(0),
        }
    }

    /// Unknown codes are not unique. Store failures are not cached.
    pub fn is_unique(&self, code: &str) -> Result<bool> {
        if let Some(answer) = self.answers.get(code).and_then(|slot| slot.answer) {
            return Ok(answer);
        }
        let generation = self.begin_lookup(code);

        self.queries.fetch_add(1, Ordering::Relaxed);
        let unique = self.store.relationship_unique_flag(code)?.unwrap_or(false);
        if self.record(code, generation, unique) {
            tracing::debug!(template = %code, unique, "cached relationship unicity");
        } else {
            tracing::debug!(template = %code, unique, "invalidated during lookup, answer not cached");
        }
        Ok(unique)
    }

    pub fn invalidate(&self, code: &str) {
        if let Some(mut slot) = self.answers.get_mut(code) {
            slot.generation = self.next_generation();
            slot.answer = None;
        }
    }

    pub fn clear(&self) {
        for mut slot in self.answers.iter_mut() {
            slot.generation = self.next_generation();
            slot.answer = None;
        }
    }

    /// Store queries issued so far.
    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::Relaxed)
    }

    /// Number of cached answers.
    pub fn len(&self) -> usize {
        self.answers
            .iter()
            .filter(|slot| slot.answer.is_some())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn next_generation(&self) -> u64 {
        self.epoch.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Generation a store read for `code` starts under.
    fn begin_lookup(&self, code: &str) -> u64 {
        self.answers.entry(code.to_string()).or_default().generation
    }

    /// Store `answer` unless `code` was invalidated since `generation`.
    fn record(&self, code: &str, generation: u64, answer: bool) -> bool {
        match self.answers.get_mut(code) {
            Some(mut slot) if slot.generation == generation => {
                slot.answer = Some(answer);
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{store_error, MemoryTemplateStore};
    use ontosync_model::{RelationshipTemplate, SchemaError};
    use std::thread;

    fn cache_with(crt: RelationshipTemplate) -> (UniquenessCache, Arc<MemoryTemplateStore>) {
        let store = Arc::new(MemoryTemplateStore::new());
        store.insert_relationship(crt).unwrap();
        (UniquenessCache::new(store.clone()), store)
    }

    #[test]
    fn test_answer_is_memoized_until_invalidated() {
        let (cache, store) =
            cache_with(RelationshipTemplate::new("owns", "owns", "Person", "Car").unique(true));

        assert!(cache.is_unique("owns").unwrap());
        assert!(cache.is_unique("owns").unwrap());
        assert_eq!(cache.query_count(), 1);

        store
            .update_relationship(RelationshipTemplate::new("owns", "owns", "Person", "Car"))
            .unwrap();
        assert!(cache.is_unique("owns").unwrap(), "stale until invalidated");

        cache.invalidate("owns");
        assert!(!cache.is_unique("owns").unwrap());
        assert_eq!(cache.query_count(), 2);
    }

    #[test]
    fn test_unknown_code_is_not_unique() {
        let (cache, _store) = cache_with(RelationshipTemplate::new("owns", "owns", "A", "B"));
        assert!(!cache.is_unique("missing").unwrap());
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_store_failure_propagates_and_is_not_cached() {
        let (cache, store) =
            cache_with(RelationshipTemplate::new("owns", "owns", "A", "B").unique(true));
        store.fail_next(store_error("connection refused"));

        let err = cache.is_unique("owns").unwrap_err();
        assert!(matches!(err, SchemaError::Execution { .. }));
        assert!(cache.is_empty());
        assert!(cache.is_unique("owns").unwrap());
    }

    #[test]
    fn test_concurrent_first_access_converges() {
        let (cache, _store) =
            cache_with(RelationshipTemplate::new("owns", "owns", "A", "B").unique(true));
        let cache = Arc::new(cache);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                thread::spawn(move || cache.is_unique("owns").unwrap())
            })
            .collect();
        for handle in handles {
            assert!(handle.join().unwrap());
        }

        assert!(cache.query_count() >= 1);
        assert!(cache.query_count() <= 8);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_lookup_overtaken_by_invalidation_is_not_cached() {
        let (cache, store) =
            cache_with(RelationshipTemplate::new("owns", "owns", "A", "B").unique(true));

        // A read of the old flag is in flight while the template changes.
        let generation = cache.begin_lookup("owns");
        store
            .update_relationship(RelationshipTemplate::new("owns", "owns", "A", "B"))
            .unwrap();
        cache.invalidate("owns");
        assert!(!cache.record("owns", generation, true));
        assert!(cache.is_empty());

        assert!(!cache.is_unique("owns").unwrap());
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_clear_discards_in_flight_answers() {
        let (cache, _store) =
            cache_with(RelationshipTemplate::new("owns", "owns", "A", "B").unique(true));
        let generation = cache.begin_lookup("owns");
        cache.clear();
        assert!(!cache.record("owns", generation, true));
        assert!(cache.is_unique("owns").unwrap());
        assert_eq!(cache.query_count(), 1);
    }
}
