//! Cache primitives
//!
//! [`TypedCache`] is the map every concrete cacher wraps: content hash →
//! bucket of (key, shared wrapper) pairs. Buckets keep hash collisions
//! apart; full-key equality decides a hit. [`ResourceCacher`] is the
//! type-erased capability the registry stores, so cleanup can run without
//! knowing the concrete resource type.

use crate::foundation::hash::ContentKey;
use crate::resources::{ResourceError, ResourceTag};
use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Hit/miss counters for one cacher
#[derive(Debug, Clone, Copy, Default)]
pub struct CacheStats {
    /// Lookups that returned an existing wrapper
    pub hits: u64,
    /// Lookups that created a new entry
    pub misses: u64,
    /// Entries currently resident
    pub entries: usize,
}

/// Content-addressed map from creation parameters to shared wrappers
pub struct TypedCache<K: ContentKey, R> {
    entries: Mutex<HashMap<u64, Vec<(K, Arc<R>)>>>,
    counters: Mutex<(u64, u64)>,
}

impl<K: ContentKey, R> Default for TypedCache<K, R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: ContentKey, R> TypedCache<K, R> {
    /// Create an empty cache
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            counters: Mutex::new((0, 0)),
        }
    }

    /// Return the cached wrapper for `key`, creating it on a miss
    ///
    /// The entry map lock is held across `create`, so two concurrent calls
    /// with equal keys perform exactly one underlying creation. A failed
    /// creation leaves no entry behind.
    pub fn get_or_create<F>(&self, key: &K, create: F) -> Result<Arc<R>, ResourceError>
    where
        F: FnOnce(&K) -> Result<R, ResourceError>,
    {
        let hash = key.content_hash();
        let mut entries = self.entries.lock().expect("cache lock poisoned");

        if let Some(bucket) = entries.get(&hash) {
            if let Some((_, resource)) = bucket.iter().find(|(existing, _)| existing == key) {
                let resource = Arc::clone(resource);
                drop(entries);
                self.counters.lock().expect("cache counters poisoned").0 += 1;
                return Ok(resource);
            }
        }

        let resource = Arc::new(create(key)?);
        entries
            .entry(hash)
            .or_default()
            .push((key.clone(), Arc::clone(&resource)));
        drop(entries);
        self.counters.lock().expect("cache counters poisoned").1 += 1;
        Ok(resource)
    }

    /// Remove every entry, returning the wrappers for destruction
    pub fn drain(&self) -> Vec<Arc<R>> {
        let mut entries = self.entries.lock().expect("cache lock poisoned");
        entries
            .drain()
            .flat_map(|(_, bucket)| bucket.into_iter().map(|(_, resource)| resource))
            .collect()
    }

    /// Drop every entry without returning the wrappers
    ///
    /// Only valid when the underlying objects were already destroyed
    /// externally.
    pub fn clear(&self) {
        self.entries.lock().expect("cache lock poisoned").clear();
    }

    /// Remove entries selected by the predicate, returning their wrappers
    pub fn evict_where<F>(&self, mut predicate: F) -> Vec<Arc<R>>
    where
        F: FnMut(&K) -> bool,
    {
        let mut entries = self.entries.lock().expect("cache lock poisoned");
        let mut evicted = Vec::new();
        entries.retain(|_, bucket| {
            bucket.retain(|(key, resource)| {
                if predicate(key) {
                    evicted.push(Arc::clone(resource));
                    false
                } else {
                    true
                }
            });
            !bucket.is_empty()
        });
        evicted
    }

    /// Number of resident entries
    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .expect("cache lock poisoned")
            .values()
            .map(Vec::len)
            .sum()
    }

    /// Whether the cache is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Hit/miss counters plus the resident entry count
    pub fn stats(&self) -> CacheStats {
        let (hits, misses) = *self.counters.lock().expect("cache counters poisoned");
        CacheStats { hits, misses, entries: self.len() }
    }
}

/// Type-erased cleanup capability of one cacher
///
/// The registry stores these without knowing the resource type. `cleanup`
/// destroys the native handles and drains the map; `clear` drains only.
pub trait ResourceCacher: Send + Sync {
    /// Resource kind this cacher holds
    fn tag(&self) -> ResourceTag;

    /// Human-readable cacher name for logging
    fn name(&self) -> &str;

    /// Destroy every entry's native handles and drain the map
    fn cleanup(&self);

    /// Drain the map without destroying native handles
    fn clear(&self);

    /// Hit/miss/entry statistics
    fn stats(&self) -> CacheStats;

    /// Downcast support for typed retrieval
    fn as_any_arc(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

impl std::fmt::Debug for dyn ResourceCacher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceCacher").field("tag", &self.tag()).field("name", &self.name()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Hash, PartialEq, Eq, Clone)]
    struct Key(u32);

    #[test]
    fn equal_keys_share_one_wrapper() {
        let cache: TypedCache<Key, String> = TypedCache::new();
        let creations = AtomicUsize::new(0);

        let first = cache
            .get_or_create(&Key(5), |_| {
                creations.fetch_add(1, Ordering::SeqCst);
                Ok("five".to_string())
            })
            .unwrap();
        let second = cache
            .get_or_create(&Key(5), |_| {
                creations.fetch_add(1, Ordering::SeqCst);
                Ok("five again".to_string())
            })
            .unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(creations.load(Ordering::SeqCst), 1);

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.entries, 1);
    }

    #[test]
    fn failed_creation_leaves_no_entry() {
        let cache: TypedCache<Key, String> = TypedCache::new();
        let result = cache.get_or_create(&Key(1), |_| {
            Err(ResourceError::CreationFailed {
                kind: ResourceTag::Sampler,
                cause: "out of memory".to_string(),
            })
        });
        assert!(result.is_err());
        assert!(cache.is_empty());

        // The next call retries the creation.
        let ok = cache.get_or_create(&Key(1), |_| Ok("recovered".to_string()));
        assert!(ok.is_ok());
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn hash_collisions_keep_distinct_wrappers() {
        // Two keys forced into the same bucket by a constant hash.
        #[derive(PartialEq, Eq, Clone)]
        struct Colliding(u32);
        impl std::hash::Hash for Colliding {
            fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
                state.write_u8(0);
            }
        }

        let cache: TypedCache<Colliding, u32> = TypedCache::new();
        let a = cache.get_or_create(&Colliding(1), |k| Ok(k.0 * 10)).unwrap();
        let b = cache.get_or_create(&Colliding(2), |k| Ok(k.0 * 10)).unwrap();

        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!((*a, *b), (10, 20));
        assert_eq!(cache.len(), 2);

        // Each key still hits its own wrapper.
        let a_again = cache.get_or_create(&Colliding(1), |_| unreachable!()).unwrap();
        assert!(Arc::ptr_eq(&a, &a_again));
    }

    #[test]
    fn empty_key_is_a_single_shared_entry() {
        #[derive(Hash, PartialEq, Eq, Clone)]
        struct Empty;

        let cache: TypedCache<Empty, u8> = TypedCache::new();
        let a = cache.get_or_create(&Empty, |_| Ok(1)).unwrap();
        let b = cache.get_or_create(&Empty, |_| Ok(2)).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn evict_where_removes_matching_entries() {
        let cache: TypedCache<Key, u32> = TypedCache::new();
        for i in 0..4 {
            cache.get_or_create(&Key(i), |k| Ok(k.0)).unwrap();
        }
        let evicted = cache.evict_where(|k| k.0 % 2 == 0);
        assert_eq!(evicted.len(), 2);
        assert_eq!(cache.len(), 2);
    }
}
