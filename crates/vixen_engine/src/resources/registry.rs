//! Cache registry
//!
//! Partitions cachers into per-device and device-independent sets. The
//! registry stores only the type-erased [`ResourceCacher`] capability;
//! typed access goes through [`CacheRegistry::get`]. Registration order is
//! preserved per slot and is the cleanup order, so leaf caches registered
//! first are destroyed first.

use crate::gpu::DeviceId;
use crate::resources::cacher::{CacheStats, ResourceCacher};
use crate::resources::{ResourceError, ResourceTag};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

struct RegistryInner {
    global: Vec<Arc<dyn ResourceCacher>>,
    devices: HashMap<DeviceId, Vec<Arc<dyn ResourceCacher>>>,
}

/// Aggregated statistics over every registered cacher
#[derive(Debug, Clone, Copy, Default)]
pub struct RegistryStats {
    /// Number of registered cachers (global + all devices)
    pub cachers: usize,
    /// Total cache hits
    pub hits: u64,
    /// Total cache misses
    pub misses: u64,
    /// Total resident entries
    pub entries: usize,
}

/// Registry of typed resource cachers
///
/// A write lock guards structural changes (register, device teardown) so
/// no new entries can be created mid-cleanup; lookups take a read lock.
pub struct CacheRegistry {
    inner: RwLock<RegistryInner>,
}

impl Default for CacheRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl CacheRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(RegistryInner { global: Vec::new(), devices: HashMap::new() }),
        }
    }

    /// Register a cacher in the device slot, or globally when `device` is `None`
    ///
    /// Duplicate registration of a tag within one slot is rejected.
    pub fn register_cacher(
        &self,
        device: Option<DeviceId>,
        cacher: Arc<dyn ResourceCacher>,
    ) -> Result<(), ResourceError> {
        let tag = cacher.tag();
        let mut inner = self.inner.write().expect("registry lock poisoned");
        let slot = match device {
            Some(id) => inner.devices.entry(id).or_default(),
            None => &mut inner.global,
        };
        if slot.iter().any(|existing| existing.tag() == tag) {
            return Err(ResourceError::AlreadyRegistered { tag, device });
        }
        log::debug!(
            "registered {} cacher '{}'{}",
            tag,
            cacher.name(),
            device.map_or_else(String::new, |d| format!(" for {d}"))
        );
        slot.push(cacher);
        Ok(())
    }

    /// Fetch the type-erased cacher for a kind
    ///
    /// `device` selects the per-device slot; `None` selects the global
    /// slot. Asking globally for a kind only registered per-device is a
    /// [`ResourceError::DeviceRequired`] misuse.
    pub fn get_cacher(
        &self,
        tag: ResourceTag,
        device: Option<DeviceId>,
    ) -> Result<Arc<dyn ResourceCacher>, ResourceError> {
        let inner = self.inner.read().expect("registry lock poisoned");
        match device {
            Some(id) => inner
                .devices
                .get(&id)
                .and_then(|slot| slot.iter().find(|c| c.tag() == tag))
                .cloned()
                .ok_or(ResourceError::NotRegistered { tag, device }),
            None => inner
                .global
                .iter()
                .find(|c| c.tag() == tag)
                .cloned()
                .ok_or_else(|| {
                    let device_dependent = inner
                        .devices
                        .values()
                        .any(|slot| slot.iter().any(|c| c.tag() == tag));
                    if device_dependent {
                        ResourceError::DeviceRequired { tag }
                    } else {
                        ResourceError::NotRegistered { tag, device: None }
                    }
                }),
        }
    }

    /// Fetch a cacher downcast to its concrete type
    pub fn get<C: ResourceCacher + 'static>(
        &self,
        tag: ResourceTag,
        device: Option<DeviceId>,
    ) -> Result<Arc<C>, ResourceError> {
        let cacher = self.get_cacher(tag, device)?;
        cacher
            .as_any_arc()
            .downcast::<C>()
            .map_err(|_| ResourceError::NotRegistered { tag, device })
    }

    /// Clean up and remove every cacher registered for `device`
    ///
    /// Cleanup runs in registration order under the registry write lock,
    /// so no new entries can appear during teardown. The device slot is
    /// removed entirely; re-registering the same tags afterwards succeeds.
    /// Returns the number of cachers cleaned.
    pub fn clear_device_caches(&self, device: DeviceId) -> usize {
        let mut inner = self.inner.write().expect("registry lock poisoned");
        let Some(slot) = inner.devices.remove(&device) else {
            return 0;
        };
        log::info!("clearing {} cachers for {device}", slot.len());
        for cacher in &slot {
            cacher.cleanup();
        }
        slot.len()
    }

    /// Clean up and remove every device-independent cacher
    ///
    /// Returns the number of cachers cleaned.
    pub fn cleanup_global_caches(&self) -> usize {
        let mut inner = self.inner.write().expect("registry lock poisoned");
        let slot = std::mem::take(&mut inner.global);
        for cacher in &slot {
            cacher.cleanup();
        }
        slot.len()
    }

    /// Devices that currently have registered cachers
    pub fn devices(&self) -> Vec<DeviceId> {
        let inner = self.inner.read().expect("registry lock poisoned");
        inner.devices.keys().copied().collect()
    }

    /// Aggregate statistics over every registered cacher
    pub fn stats(&self) -> RegistryStats {
        let inner = self.inner.read().expect("registry lock poisoned");
        let mut total = RegistryStats::default();
        let all = inner.global.iter().chain(inner.devices.values().flatten());
        for cacher in all {
            let CacheStats { hits, misses, entries } = cacher.stats();
            total.cachers += 1;
            total.hits += hits;
            total.misses += misses;
            total.entries += entries;
        }
        total
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::any::Any;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct StubCacher {
        tag: ResourceTag,
        cleaned: AtomicBool,
    }

    impl StubCacher {
        fn new(tag: ResourceTag) -> Arc<Self> {
            Arc::new(Self { tag, cleaned: AtomicBool::new(false) })
        }
    }

    impl ResourceCacher for StubCacher {
        fn tag(&self) -> ResourceTag {
            self.tag
        }

        fn name(&self) -> &str {
            "stub"
        }

        fn cleanup(&self) {
            self.cleaned.store(true, Ordering::SeqCst);
        }

        fn clear(&self) {}

        fn stats(&self) -> CacheStats {
            CacheStats::default()
        }

        fn as_any_arc(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
            self
        }
    }

    const DEVICE: DeviceId = DeviceId(1);

    #[test]
    fn duplicate_registration_is_rejected() {
        let registry = CacheRegistry::new();
        registry
            .register_cacher(Some(DEVICE), StubCacher::new(ResourceTag::Sampler))
            .unwrap();
        let err = registry
            .register_cacher(Some(DEVICE), StubCacher::new(ResourceTag::Sampler))
            .unwrap_err();
        assert!(matches!(err, ResourceError::AlreadyRegistered { .. }));

        // The same tag in another slot is fine.
        registry
            .register_cacher(Some(DeviceId(2)), StubCacher::new(ResourceTag::Sampler))
            .unwrap();
    }

    #[test]
    fn global_lookup_of_device_kind_requires_device() {
        let registry = CacheRegistry::new();
        registry
            .register_cacher(Some(DEVICE), StubCacher::new(ResourceTag::GraphicsPipeline))
            .unwrap();

        let err = registry.get_cacher(ResourceTag::GraphicsPipeline, None).unwrap_err();
        assert!(matches!(err, ResourceError::DeviceRequired { .. }));

        let err = registry.get_cacher(ResourceTag::Sampler, None).unwrap_err();
        assert!(matches!(err, ResourceError::NotRegistered { .. }));
    }

    #[test]
    fn device_clear_cleans_in_registration_order_and_frees_the_slot() {
        let registry = CacheRegistry::new();
        let first = StubCacher::new(ResourceTag::ShaderModule);
        let second = StubCacher::new(ResourceTag::GraphicsPipeline);
        registry.register_cacher(Some(DEVICE), Arc::clone(&first) as _).unwrap();
        registry.register_cacher(Some(DEVICE), Arc::clone(&second) as _).unwrap();

        assert_eq!(registry.clear_device_caches(DEVICE), 2);
        assert!(first.cleaned.load(Ordering::SeqCst));
        assert!(second.cleaned.load(Ordering::SeqCst));

        // The slot is gone; the same tags can be registered again.
        registry
            .register_cacher(Some(DEVICE), StubCacher::new(ResourceTag::ShaderModule))
            .unwrap();

        // Clearing an unknown device is a no-op.
        assert_eq!(registry.clear_device_caches(DeviceId(99)), 0);
    }

    #[test]
    fn typed_get_downcasts() {
        let registry = CacheRegistry::new();
        registry
            .register_cacher(None, StubCacher::new(ResourceTag::ShaderBytecode))
            .unwrap();
        let cacher: Arc<StubCacher> =
            registry.get(ResourceTag::ShaderBytecode, None).unwrap();
        assert_eq!(cacher.tag(), ResourceTag::ShaderBytecode);
    }
}
