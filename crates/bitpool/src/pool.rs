//! Single-threaded fixed-capacity object pool
//!
//! # Layout
//!
//! ```text
//! slots:    [T0][T1][T2][T3] ... [Tn-1]     one contiguous block, zero-filled
//! headers:  [h0][h1][h2][h3] ... [hn-1]     next_free index + generation
//! bits:     0 1 0 1 ...                     1 = in use
//!
//! free_head → 2 → 0 → ... → NIL             LIFO free-list through headers
//! ```
//!
//! Allocation pops the free-list head and return pushes onto it, both O(1)
//! with no scanning. A fresh pool hands out slots in ascending index order;
//! afterwards the most recently returned slot is handed out first.

use core::fmt;
use core::mem::MaybeUninit;

#[cfg(feature = "logging")]
use tracing::{debug, trace};

use crate::bitmap::{IterOnes, SlotBitmap};
use crate::config::PoolConfig;
use crate::error::{PoolError, PoolResult};
use crate::handle::{Handle, PoolId};
use crate::stats::{Counters, PoolStats};
use crate::utils::{poison_slot, try_boxed_slice};

/// Free-list terminator
const NIL: usize = usize::MAX;

#[derive(Debug, Clone, Copy)]
struct SlotHeader {
    /// Next free slot, meaningful only while this slot is free
    next_free: usize,
    /// Bumped every time the slot is leased
    generation: u32,
}

/// Fixed-capacity pool of `T` slots
///
/// Slots are raw `MaybeUninit<T>` storage, zero-filled once at construction.
/// The pool never constructs or drops a `T`: whatever a caller writes into a
/// slot stays there until overwritten, and values left in slots when the pool
/// is dropped are not dropped. Types owning resources must be cleaned up by
/// the caller before the slot is returned.
///
/// # Example
/// ```
/// use bitpool::{Pool, PoolError};
///
/// let mut pool = Pool::<u32>::new(2)?;
///
/// let a = pool.get_object()?;
/// pool.write(a, 7)?;
/// let b = pool.get_object()?;
/// assert!(matches!(pool.get_object(), Err(PoolError::PoolExhausted { .. })));
///
/// pool.return_object(a)?;
/// let c = pool.get_object()?;
/// assert!(c.same_slot(&a));
/// # let _ = b;
/// # Ok::<(), PoolError>(())
/// ```
pub struct Pool<T> {
    slots: Box<[MaybeUninit<T>]>,
    headers: Box<[SlotHeader]>,
    in_use_bits: SlotBitmap,
    free_head: usize,
    in_use: usize,
    id: PoolId,
    config: PoolConfig,
    counters: Counters,
}

impl<T> Pool<T> {
    /// Creates a pool of exactly `capacity` slots with default configuration
    ///
    /// # Errors
    /// Returns [`PoolError::AllocationFailed`] if the storage cannot be
    /// reserved; no partially built pool is ever returned.
    pub fn new(capacity: usize) -> PoolResult<Self> {
        Self::with_config(capacity, PoolConfig::default())
    }

    /// Creates a pool with custom configuration
    pub fn with_config(capacity: usize, config: PoolConfig) -> PoolResult<Self> {
        let alloc_failed = || PoolError::allocation_failed::<T>(capacity);

        let slots = try_boxed_slice(capacity, |_| MaybeUninit::zeroed()).ok_or_else(alloc_failed)?;
        let headers = try_boxed_slice(capacity, |index| SlotHeader {
            next_free: ascending_successor(index, capacity),
            generation: 0,
        })
        .ok_or_else(alloc_failed)?;
        let in_use_bits = SlotBitmap::try_new(capacity).map_err(|_| alloc_failed())?;

        let id = PoolId::next();

        #[cfg(feature = "logging")]
        debug!(
            pool = %id,
            capacity,
            element_size = size_of::<T>(),
            "pool created"
        );

        Ok(Self {
            slots,
            headers,
            in_use_bits,
            free_head: if capacity == 0 { NIL } else { 0 },
            in_use: 0,
            id,
            config,
            counters: Counters::default(),
        })
    }

    /// Leases a free slot
    ///
    /// Contents are whatever was last written to the slot, or zeroes on its
    /// first lease.
    ///
    /// # Errors
    /// [`PoolError::PoolExhausted`] when every slot is in use; the pool is
    /// left unchanged.
    pub fn get_object(&mut self) -> PoolResult<Handle<T>> {
        let index = self.free_head;
        if index == NIL {
            if self.config.track_stats {
                self.counters.record_failure();
            }
            return Err(PoolError::pool_exhausted(self.max_objects()));
        }

        let header = &mut self.headers[index];
        self.free_head = header.next_free;
        header.next_free = NIL;
        header.generation = header.generation.wrapping_add(1);
        let generation = header.generation;

        let was_in_use = self.in_use_bits.set(index);
        debug_assert!(!was_in_use, "free-list yielded in-use slot {index}");
        self.in_use += 1;

        if self.config.track_stats {
            self.counters.record_alloc(self.in_use);
        }

        #[cfg(feature = "logging")]
        trace!(pool = %self.id, index, generation, "slot leased");

        Ok(Handle::new(self.id, index, generation))
    }

    /// Leases a free slot, or `None` when the pool is exhausted
    pub fn try_get_object(&mut self) -> Option<Handle<T>> {
        self.get_object().ok()
    }

    /// Returns a leased slot to the pool
    ///
    /// The slot becomes the next one handed out by [`get_object`].
    ///
    /// # Errors
    /// - [`PoolError::InvalidHandle`] if the handle comes from another pool,
    ///   is out of range, or carries a generation this slot never had
    /// - [`PoolError::DoubleReturn`] if this lease was already returned
    ///
    /// [`get_object`]: Self::get_object
    pub fn return_object(&mut self, handle: Handle<T>) -> PoolResult<()> {
        let index = self.check_owner(&handle)?;

        let current = self.headers[index].generation;
        if handle.generation() != current {
            // Plain comparison: a handle older than a full 2^32 wrap of this
            // slot reads as never issued.
            return Err(if handle.generation() < current {
                PoolError::double_return(index)
            } else {
                PoolError::invalid_handle(index, self.max_objects(), "generation was never issued")
            });
        }
        if !self.in_use_bits.clear(index) {
            return Err(PoolError::double_return(index));
        }

        if let Some(pattern) = self.config.poison_on_return {
            poison_slot(&mut self.slots[index], pattern);
        }

        self.headers[index].next_free = self.free_head;
        self.free_head = index;
        self.in_use -= 1;

        if self.config.track_stats {
            self.counters.record_return();
        }

        #[cfg(feature = "logging")]
        trace!(pool = %self.id, index, generation = current, "slot returned");

        Ok(())
    }

    /// Handle to the slot at `index` regardless of its state
    ///
    /// This is a positional accessor for iteration and debugging; it does
    /// not lease the slot. Returns `None` when `index >= max_objects()`.
    pub fn get_object_at(&self, index: usize) -> Option<Handle<T>> {
        self.headers
            .get(index)
            .map(|header| Handle::new(self.id, index, header.generation))
    }

    /// Number of slots currently in use
    #[inline]
    pub fn objects_in_use(&self) -> usize {
        self.in_use
    }

    /// Capacity fixed at construction
    #[inline]
    pub fn max_objects(&self) -> usize {
        self.slots.len()
    }

    /// Number of slots currently free
    #[inline]
    pub fn free_objects(&self) -> usize {
        self.max_objects() - self.in_use
    }

    /// Checks if no slot is free
    #[inline]
    pub fn is_full(&self) -> bool {
        self.free_head == NIL
    }

    /// Checks if no slot is in use
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.in_use == 0
    }

    /// State of the slot at `index`, `None` when out of range
    pub fn is_in_use(&self, index: usize) -> Option<bool> {
        (index < self.max_objects()).then(|| self.in_use_bits.get(index))
    }

    /// Indices of in-use slots in ascending order
    pub fn in_use_indices(&self) -> IterOnes<'_> {
        self.in_use_bits.iter_ones()
    }

    /// Whether `handle` currently addresses a slot of this pool
    pub fn contains(&self, handle: &Handle<T>) -> bool {
        self.check_handle(handle).is_ok()
    }

    /// Identity of this pool
    #[inline]
    pub fn id(&self) -> PoolId {
        self.id
    }

    /// Active configuration
    #[inline]
    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Statistics snapshot, `None` unless `track_stats` is enabled
    pub fn stats(&self) -> Option<PoolStats> {
        self.config
            .track_stats
            .then(|| self.counters.snapshot(self.max_objects(), self.in_use))
    }

    /// Shared access to a slot's storage
    pub fn get(&self, handle: Handle<T>) -> PoolResult<&MaybeUninit<T>> {
        let index = self.check_handle(&handle)?;
        Ok(&self.slots[index])
    }

    /// Exclusive access to a slot's storage
    pub fn get_mut(&mut self, handle: Handle<T>) -> PoolResult<&mut MaybeUninit<T>> {
        let index = self.check_handle(&handle)?;
        Ok(&mut self.slots[index])
    }

    /// Stores `value` in the slot and returns a reference to it
    ///
    /// The previous contents are overwritten without being dropped.
    pub fn write(&mut self, handle: Handle<T>, value: T) -> PoolResult<&mut T> {
        Ok(self.get_mut(handle)?.write(value))
    }

    /// Marks every slot free and invalidates all outstanding leases
    ///
    /// The free-list is rebuilt in ascending order, so the pool hands out
    /// slots exactly like a freshly constructed one. Statistics are cleared.
    pub fn reset(&mut self) {
        for index in self.in_use_bits.iter_ones() {
            let header = &mut self.headers[index];
            header.generation = header.generation.wrapping_add(1);
        }

        let capacity = self.max_objects();
        for (index, header) in self.headers.iter_mut().enumerate() {
            header.next_free = ascending_successor(index, capacity);
        }
        self.free_head = if capacity == 0 { NIL } else { 0 };
        self.in_use_bits.clear_all();
        self.in_use = 0;
        self.counters.reset();

        #[cfg(feature = "logging")]
        debug!(pool = %self.id, capacity, "pool reset");
    }

    /// Walks the free-list and cross-checks it against the bitmap and the
    /// in-use counter
    ///
    /// O(capacity); intended for tests and debugging.
    pub fn verify_integrity(&self) -> PoolResult<()> {
        let capacity = self.max_objects();
        let marked = self.in_use_bits.count_ones();
        if marked != self.in_use {
            return Err(PoolError::corrupted(format!(
                "{marked} slots marked in use but counter says {}",
                self.in_use
            )));
        }

        let expected_free = capacity - self.in_use;
        let mut walked = 0;
        let mut cursor = self.free_head;
        while cursor != NIL {
            if cursor >= capacity {
                return Err(PoolError::corrupted(format!(
                    "free-list link {cursor} out of range"
                )));
            }
            if self.in_use_bits.get(cursor) {
                return Err(PoolError::corrupted(format!(
                    "slot {cursor} is on the free-list but marked in use"
                )));
            }
            walked += 1;
            if walked > expected_free {
                return Err(PoolError::corrupted("free-list contains a cycle"));
            }
            cursor = self.headers[cursor].next_free;
        }

        if walked == expected_free {
            Ok(())
        } else {
            Err(PoolError::corrupted(format!(
                "free-list holds {walked} slots, expected {expected_free}"
            )))
        }
    }

    fn check_owner(&self, handle: &Handle<T>) -> PoolResult<usize> {
        let index = handle.index();
        if handle.pool_id() != self.id {
            return Err(PoolError::invalid_handle(
                index,
                self.max_objects(),
                "handle belongs to another pool",
            ));
        }
        if index >= self.max_objects() {
            return Err(PoolError::invalid_handle(
                index,
                self.max_objects(),
                "index out of range",
            ));
        }
        Ok(index)
    }

    fn check_handle(&self, handle: &Handle<T>) -> PoolResult<usize> {
        let index = self.check_owner(handle)?;
        if handle.generation() == self.headers[index].generation {
            Ok(index)
        } else {
            Err(PoolError::invalid_handle(
                index,
                self.max_objects(),
                "stale generation",
            ))
        }
    }
}

#[inline]
fn ascending_successor(index: usize, capacity: usize) -> usize {
    if index + 1 < capacity { index + 1 } else { NIL }
}

impl<T> fmt::Debug for Pool<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pool")
            .field("id", &self.id)
            .field("capacity", &self.max_objects())
            .field("in_use", &self.in_use)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
