//! Content hashing for cache keys
//!
//! The resource cache addresses entries by a 64-bit FNV-1a hash of their
//! creation parameters. FNV-1a is implemented as a [`std::hash::Hasher`] so
//! key types derive [`Hash`] normally and stay consistent with their [`Eq`]
//! implementation, which the cache falls back to on hash collisions.

use std::hash::{Hash, Hasher};

const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// 64-bit FNV-1a hasher
#[derive(Debug, Clone, Copy)]
pub struct Fnv64(u64);

impl Fnv64 {
    /// Create a hasher seeded with the FNV offset basis
    pub const fn new() -> Self {
        Self(FNV_OFFSET_BASIS)
    }
}

impl Default for Fnv64 {
    fn default() -> Self {
        Self::new()
    }
}

impl Hasher for Fnv64 {
    fn finish(&self) -> u64 {
        self.0
    }

    fn write(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            self.0 ^= u64::from(byte);
            self.0 = self.0.wrapping_mul(FNV_PRIME);
        }
    }
}

/// Hash a value with FNV-1a into a 64-bit content address
pub fn content_hash<T: Hash + ?Sized>(value: &T) -> u64 {
    let mut hasher = Fnv64::new();
    value.hash(&mut hasher);
    hasher.finish()
}

/// Key type for content-addressed caches
///
/// Every field that influences the identity of the created object must take
/// part in both `Hash` and `Eq`; the cache compares full keys on hash
/// collisions.
pub trait ContentKey: Hash + Eq + Clone + Send {
    /// 64-bit FNV-1a content address of this key
    fn content_hash(&self) -> u64 {
        content_hash(self)
    }
}

impl<T: Hash + Eq + Clone + Send> ContentKey for T {}
