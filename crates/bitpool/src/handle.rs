//! Generational slot handles
//!
//! A [`Handle`] names one lease of one slot: the slot index, the generation
//! the slot had when the handle was issued, and the identity of the pool that
//! issued it. Handles are plain values; a handle kept after its slot was
//! returned simply stops matching the slot's generation.

use core::fmt;
use core::hash::{Hash, Hasher};
use core::marker::PhantomData;
use core::sync::atomic::{AtomicU32, Ordering};

static NEXT_POOL_ID: AtomicU32 = AtomicU32::new(1);

/// Identity of a pool instance, unique for the lifetime of the process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PoolId(u32);

impl PoolId {
    pub(crate) fn next() -> Self {
        Self(NEXT_POOL_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw numeric value
    #[inline]
    pub fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for PoolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pool#{}", self.0)
    }
}

/// Handle to a slot of a pool of `T`
///
/// Obtained from `get_object` (a lease) or `get_object_at` (a positional
/// view). Two handles compare equal when they name the same slot, generation
/// and pool.
pub struct Handle<T> {
    index: usize,
    generation: u32,
    pool: PoolId,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Handle<T> {
    pub(crate) fn new(pool: PoolId, index: usize, generation: u32) -> Self {
        Self {
            index,
            generation,
            pool,
            _marker: PhantomData,
        }
    }

    /// Zero-based slot index
    #[inline]
    pub fn index(&self) -> usize {
        self.index
    }

    /// Generation of the slot when this handle was issued
    #[inline]
    pub fn generation(&self) -> u32 {
        self.generation
    }

    /// Pool that issued this handle
    #[inline]
    pub fn pool_id(&self) -> PoolId {
        self.pool
    }

    /// Whether this handle names the same slot as `other`, ignoring
    /// generations
    #[inline]
    pub fn same_slot(&self, other: &Self) -> bool {
        self.pool == other.pool && self.index == other.index
    }
}

impl<T> Clone for Handle<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Handle<T> {}

impl<T> PartialEq for Handle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index && self.generation == other.generation && self.pool == other.pool
    }
}

impl<T> Eq for Handle<T> {}

impl<T> Hash for Handle<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.index.hash(state);
        self.generation.hash(state);
        self.pool.hash(state);
    }
}

impl<T> fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handle")
            .field("index", &self.index)
            .field("generation", &self.generation)
            .field("pool", &self.pool)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    struct NotClone;

    #[test]
    fn test_pool_ids_are_unique() {
        let a = PoolId::next();
        let b = PoolId::next();
        assert_ne!(a, b);
        assert!(b.get() > a.get());
    }

    #[test]
    fn test_handle_is_copy_without_t_bounds() {
        let pool = PoolId::next();
        let handle = Handle::<NotClone>::new(pool, 3, 1);
        let copy = handle;

        assert_eq!(handle, copy);
        assert_eq!(copy.index(), 3);
        assert_eq!(copy.generation(), 1);
        assert_eq!(copy.pool_id(), pool);
    }

    #[test]
    fn test_same_slot_ignores_generation() {
        let pool = PoolId::next();
        let old = Handle::<u8>::new(pool, 0, 1);
        let new = Handle::<u8>::new(pool, 0, 2);

        assert_ne!(old, new);
        assert!(old.same_slot(&new));
        assert!(!old.same_slot(&Handle::new(PoolId::next(), 0, 1)));
    }

    #[test]
    fn test_handles_hash_by_identity() {
        let pool = PoolId::next();
        let set: HashSet<Handle<u8>> = [
            Handle::new(pool, 0, 1),
            Handle::new(pool, 0, 1),
            Handle::new(pool, 1, 1),
        ]
        .into_iter()
        .collect();

        assert_eq!(set.len(), 2);
    }
}
