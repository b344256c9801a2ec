//! Lock-free pool built on a tagged Treiber stack
//!
//! # Design
//!
//! ```text
//! head:   AtomicU64  = [ tag: u32 | index: u32 ]     tag bumps on every CAS
//! next:   [AtomicU32; capacity]                      free-list links
//! state:  [AtomicU32; capacity] = generation << 1 | in_use
//! slots:  [SyncUnsafeCell<MaybeUninit<T>>; capacity]
//! ```
//!
//! Leasing pops the head with one CAS; returning validates and frees the slot
//! with one CAS on its state word, then pushes it back. Folding the
//! generation and the in-use bit into one word makes a concurrent double
//! return succeed exactly once. The head tag guards the pop against ABA; it
//! would have to wrap 2^32 times during a single pop to be fooled.
//!
//! Generations use 31 bits here and wrap after 2^31 leases of one slot.

#![allow(unsafe_code)]

use core::fmt;
use core::mem::MaybeUninit;
use core::ptr::NonNull;
use core::sync::atomic::{AtomicU32, AtomicU64, AtomicUsize, Ordering};

#[cfg(feature = "logging")]
use tracing::{debug, trace};

use crate::config::PoolConfig;
use crate::error::{PoolError, PoolResult};
use crate::handle::{Handle, PoolId};
use crate::stats::{AtomicCounters, PoolStats};
use crate::sync_cell::SyncUnsafeCell;
use crate::utils::{Backoff, poison_slot, try_boxed_slice};

/// Free-list terminator
const NIL: u32 = u32::MAX;

/// Largest supported capacity; index `u32::MAX` is reserved for [`NIL`]
pub const MAX_CAPACITY: usize = (u32::MAX - 1) as usize;

const IN_USE: u32 = 1;

#[inline]
const fn pack(tag: u32, index: u32) -> u64 {
    ((tag as u64) << 32) | index as u64
}

#[inline]
const fn unpack(head: u64) -> (u32, u32) {
    ((head >> 32) as u32, head as u32)
}

#[inline]
const fn generation_of(state: u32) -> u32 {
    state >> 1
}

/// Fixed-capacity pool shareable across threads without locks
///
/// Semantics match [`Pool`](crate::Pool): ascending first lease, LIFO reuse,
/// [`PoolError::DoubleReturn`] for a second return of the same lease. Slot
/// storage is reached through [`slot_ptr`](Self::slot_ptr).
///
/// # Example
/// ```
/// use bitpool::LockFreePool;
///
/// let pool = LockFreePool::<u64>::new(4)?;
/// let handle = pool.get_object()?;
///
/// let slot = pool.slot_ptr(handle)?;
/// // SAFETY: `handle` is a live lease held only by this thread.
/// unsafe { (*slot.as_ptr()).write(99) };
///
/// pool.return_object(handle)?;
/// assert!(pool.return_object(handle).is_err());
/// # Ok::<(), bitpool::PoolError>(())
/// ```
pub struct LockFreePool<T> {
    slots: Box<[SyncUnsafeCell<MaybeUninit<T>>]>,
    next: Box<[AtomicU32]>,
    state: Box<[AtomicU32]>,
    head: AtomicU64,
    in_use: AtomicUsize,
    id: PoolId,
    config: PoolConfig,
    counters: AtomicCounters,
}

impl<T> LockFreePool<T> {
    /// Creates a pool of `capacity` slots with default configuration
    ///
    /// # Errors
    /// - [`PoolError::CapacityTooLarge`] above [`MAX_CAPACITY`]
    /// - [`PoolError::AllocationFailed`] if storage cannot be reserved
    pub fn new(capacity: usize) -> PoolResult<Self> {
        Self::with_config(capacity, PoolConfig::default())
    }

    /// Creates a pool with custom configuration
    pub fn with_config(capacity: usize, config: PoolConfig) -> PoolResult<Self> {
        if capacity > MAX_CAPACITY {
            return Err(PoolError::capacity_too_large(capacity, MAX_CAPACITY));
        }
        let alloc_failed = || PoolError::allocation_failed::<T>(capacity);

        let slots = try_boxed_slice(capacity, |_| SyncUnsafeCell::new(MaybeUninit::zeroed()))
            .ok_or_else(alloc_failed)?;
        let next = try_boxed_slice(capacity, |index| {
            AtomicU32::new(ascending_successor(index, capacity))
        })
        .ok_or_else(alloc_failed)?;
        let state = try_boxed_slice(capacity, |_| AtomicU32::new(0)).ok_or_else(alloc_failed)?;

        let id = PoolId::next();

        #[cfg(feature = "logging")]
        debug!(
            pool = %id,
            capacity,
            element_size = size_of::<T>(),
            "lock-free pool created"
        );

        Ok(Self {
            slots,
            next,
            state,
            head: AtomicU64::new(pack(0, initial_head(capacity))),
            in_use: AtomicUsize::new(0),
            id,
            config,
            counters: AtomicCounters::default(),
        })
    }

    /// Leases a free slot
    ///
    /// # Errors
    /// [`PoolError::PoolExhausted`] when the free-list is empty at the moment
    /// of the call.
    pub fn get_object(&self) -> PoolResult<Handle<T>> {
        let index = self.pop().ok_or_else(|| {
            if self.config.track_stats {
                self.counters.record_failure();
            }
            PoolError::pool_exhausted(self.max_objects())
        })?;

        // The popper owns the slot until it is pushed back, and the state word
        // has its in-use bit clear, so no return can race this update.
        let previous = self.state[index as usize].fetch_add(2 | IN_USE, Ordering::AcqRel);
        debug_assert_eq!(previous & IN_USE, 0, "free-list yielded in-use slot {index}");
        let generation = generation_of(previous.wrapping_add(2 | IN_USE));

        let in_use = self.in_use.fetch_add(1, Ordering::Relaxed) + 1;
        if self.config.track_stats {
            self.counters.record_alloc(in_use);
        }

        #[cfg(feature = "logging")]
        trace!(pool = %self.id, index, generation, "slot leased");

        Ok(Handle::new(self.id, index as usize, generation))
    }

    /// Leases a free slot, or `None` when the pool is exhausted
    pub fn try_get_object(&self) -> Option<Handle<T>> {
        self.get_object().ok()
    }

    /// Returns a leased slot
    ///
    /// When several threads return the same lease concurrently, exactly one
    /// succeeds and the others get [`PoolError::DoubleReturn`].
    pub fn return_object(&self, handle: Handle<T>) -> PoolResult<()> {
        let index = self.check_owner(&handle)?;
        let generation = handle.generation();
        if generation > u32::MAX >> 1 {
            return Err(PoolError::invalid_handle(
                index,
                self.max_objects(),
                "generation was never issued",
            ));
        }

        let leased = (generation << 1) | IN_USE;
        if let Err(actual) = self.state[index].compare_exchange(
            leased,
            generation << 1,
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            // Plain comparison: a handle older than a full 2^31 wrap of this
            // slot reads as never issued.
            return Err(if generation <= generation_of(actual) {
                PoolError::double_return(index)
            } else {
                PoolError::invalid_handle(index, self.max_objects(), "generation was never issued")
            });
        }

        if let Some(pattern) = self.config.poison_on_return {
            // SAFETY: the CAS above cleared the in-use bit, so no lease can
            // reach this slot and it is not yet on the free-list.
            poison_slot(unsafe { &mut *self.slots[index].get() }, pattern);
        }

        // Decrement before the slot is reachable again, or a concurrent
        // lease of it could push the counter past capacity.
        self.in_use.fetch_sub(1, Ordering::Relaxed);
        // `index < capacity <= MAX_CAPACITY` fits in u32
        self.push(index as u32);

        if self.config.track_stats {
            self.counters.record_return();
        }

        #[cfg(feature = "logging")]
        trace!(pool = %self.id, index, generation, "slot returned");

        Ok(())
    }

    /// Positional handle to the slot at `index`; does not lease it
    pub fn get_object_at(&self, index: usize) -> Option<Handle<T>> {
        self.state.get(index).map(|state| {
            Handle::new(self.id, index, generation_of(state.load(Ordering::Acquire)))
        })
    }

    /// Slots in use; may be stale by the time it is read
    #[inline]
    pub fn objects_in_use(&self) -> usize {
        self.in_use.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn max_objects(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    pub fn free_objects(&self) -> usize {
        self.max_objects().saturating_sub(self.objects_in_use())
    }

    /// Whether the free-list was empty at the moment of the call
    pub fn is_full(&self) -> bool {
        unpack(self.head.load(Ordering::Acquire)).1 == NIL
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.objects_in_use() == 0
    }

    /// Indices of slots whose in-use bit is set, in ascending order
    pub fn in_use_indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.state
            .iter()
            .enumerate()
            .filter(|(_, state)| state.load(Ordering::Acquire) & IN_USE != 0)
            .map(|(index, _)| index)
    }

    /// State of the slot at `index`, `None` when out of range
    pub fn is_in_use(&self, index: usize) -> Option<bool> {
        self.state
            .get(index)
            .map(|state| state.load(Ordering::Acquire) & IN_USE != 0)
    }

    /// Whether `handle` is a live lease of this pool
    pub fn contains(&self, handle: &Handle<T>) -> bool {
        self.check_lease(handle).is_ok()
    }

    #[inline]
    pub fn id(&self) -> PoolId {
        self.id
    }

    #[inline]
    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Statistics snapshot, `None` unless `track_stats` is enabled
    pub fn stats(&self) -> Option<PoolStats> {
        self.config
            .track_stats
            .then(|| self.counters.snapshot(self.max_objects(), self.objects_in_use()))
    }

    /// Pointer to the storage of a live lease
    ///
    /// The pointer stays valid for the lifetime of the pool. Reading or
    /// writing through it is `unsafe`: the caller must hold the lease and must
    /// not share it with another thread that accesses the same slot.
    pub fn slot_ptr(&self, handle: Handle<T>) -> PoolResult<NonNull<MaybeUninit<T>>> {
        let index = self.check_lease(&handle)?;
        let ptr = self.slots[index].get();
        // SAFETY: `UnsafeCell::get` on an element of a live boxed slice is
        // never null.
        Ok(unsafe { NonNull::new_unchecked(ptr) })
    }

    /// Frees every slot and invalidates all outstanding leases
    ///
    /// Requires exclusive access, so no operation can be in flight.
    pub fn reset(&mut self) {
        let capacity = self.max_objects();
        for (index, (state, next)) in self.state.iter_mut().zip(self.next.iter_mut()).enumerate() {
            let word = state.get_mut();
            if *word & IN_USE != 0 {
                *word = generation_of(*word).wrapping_add(1) << 1;
            }
            *next.get_mut() = ascending_successor(index, capacity);
        }

        let (tag, _) = unpack(*self.head.get_mut());
        *self.head.get_mut() = pack(tag.wrapping_add(1), initial_head(capacity));
        *self.in_use.get_mut() = 0;
        self.counters.reset();

        #[cfg(feature = "logging")]
        debug!(pool = %self.id, capacity, "lock-free pool reset");
    }

    /// Cross-checks free-list, state words and the in-use counter
    ///
    /// Only meaningful while no other thread operates on the pool.
    pub fn verify_integrity(&self) -> PoolResult<()> {
        let capacity = self.max_objects();
        let in_use = self.objects_in_use();
        let marked = self
            .state
            .iter()
            .filter(|state| state.load(Ordering::Acquire) & IN_USE != 0)
            .count();
        if marked != in_use {
            return Err(PoolError::corrupted(format!(
                "{marked} slots marked in use but counter says {in_use}"
            )));
        }

        let expected_free = capacity - in_use;
        let mut walked = 0;
        let (_, mut cursor) = unpack(self.head.load(Ordering::Acquire));
        while cursor != NIL {
            let index = cursor as usize;
            let Some(state) = self.state.get(index) else {
                return Err(PoolError::corrupted(format!(
                    "free-list link {cursor} out of range"
                )));
            };
            if state.load(Ordering::Acquire) & IN_USE != 0 {
                return Err(PoolError::corrupted(format!(
                    "slot {index} is on the free-list but marked in use"
                )));
            }
            walked += 1;
            if walked > expected_free {
                return Err(PoolError::corrupted("free-list contains a cycle"));
            }
            cursor = self.next[index].load(Ordering::Acquire);
        }

        if walked == expected_free {
            Ok(())
        } else {
            Err(PoolError::corrupted(format!(
                "free-list holds {walked} slots, expected {expected_free}"
            )))
        }
    }

    fn pop(&self) -> Option<u32> {
        let mut backoff = Backoff::new();
        let mut head = self.head.load(Ordering::Acquire);
        loop {
            let (tag, index) = unpack(head);
            if index == NIL {
                return None;
            }
            // May read a link of a slot another thread just popped; the tag
            // makes the CAS below fail in that case.
            let next = self.next[index as usize].load(Ordering::Relaxed);
            match self.head.compare_exchange_weak(
                head,
                pack(tag.wrapping_add(1), next),
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return Some(index),
                Err(actual) => {
                    head = actual;
                    if self.config.use_backoff {
                        backoff.spin();
                    }
                }
            }
        }
    }

    fn push(&self, index: u32) {
        let mut backoff = Backoff::new();
        let mut head = self.head.load(Ordering::Relaxed);
        loop {
            let (tag, top) = unpack(head);
            self.next[index as usize].store(top, Ordering::Relaxed);
            match self.head.compare_exchange_weak(
                head,
                pack(tag.wrapping_add(1), index),
                Ordering::Release,
                Ordering::Relaxed,
            ) {
                Ok(_) => return,
                Err(actual) => {
                    head = actual;
                    if self.config.use_backoff {
                        backoff.spin();
                    }
                }
            }
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

    fn check_lease(&self, handle: &Handle<T>) -> PoolResult<usize> {
        let index = self.check_owner(handle)?;
        let state = self.state[index].load(Ordering::Acquire);
        if state & IN_USE == 0 {
            Err(PoolError::invalid_handle(index, self.max_objects(), "slot is free"))
        } else if generation_of(state) != handle.generation() {
            Err(PoolError::invalid_handle(
                index,
                self.max_objects(),
                "stale generation",
            ))
        } else {
            Ok(index)
        }
    }
}

#[inline]
fn ascending_successor(index: usize, capacity: usize) -> u32 {
    // `capacity <= MAX_CAPACITY` so every index fits in u32
    if index + 1 < capacity { (index + 1) as u32 } else { NIL }
}

#[inline]
fn initial_head(capacity: usize) -> u32 {
    if capacity == 0 { NIL } else { 0 }
}

impl<T> fmt::Debug for LockFreePool<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockFreePool")
            .field("id", &self.id)
            .field("capacity", &self.max_objects())
            .field("in_use", &self.objects_in_use())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Barrier};
    use std::thread;

    use super::*;

    #[test]
    fn test_head_packing() {
        let head = pack(7, 42);
        assert_eq!(unpack(head), (7, 42));
        assert_eq!(unpack(pack(u32::MAX, NIL)), (u32::MAX, NIL));
    }

    #[test]
    fn test_ascending_then_lifo() {
        let pool = LockFreePool::<u32>::new(3).unwrap();
        let handles: Vec<_> = (0..3).map(|_| pool.get_object().unwrap()).collect();
        assert_eq!(
            handles.iter().map(Handle::index).collect::<Vec<_>>(),
            vec![0, 1, 2]
        );
        assert!(matches!(
            pool.get_object(),
            Err(PoolError::PoolExhausted { capacity: 3 })
        ));
        assert!(pool.is_full());

        pool.return_object(handles[0]).unwrap();
        pool.return_object(handles[2]).unwrap();
        assert_eq!(pool.in_use_indices().collect::<Vec<_>>(), vec![1]);
        assert_eq!(pool.get_object().unwrap().index(), 2);
        assert_eq!(pool.get_object().unwrap().index(), 0);
        pool.verify_integrity().unwrap();
    }

    #[test]
    fn test_double_return_and_stale_handles() {
        let pool = LockFreePool::<u32>::new(1).unwrap();
        let first = pool.get_object().unwrap();
        pool.return_object(first).unwrap();
        assert_eq!(
            pool.return_object(first),
            Err(PoolError::DoubleReturn { index: 0 })
        );

        let second = pool.get_object().unwrap();
        assert_eq!(second.generation(), first.generation() + 1);
        assert_eq!(
            pool.return_object(first),
            Err(PoolError::DoubleReturn { index: 0 })
        );
        assert!(pool.slot_ptr(first).is_err());
        assert!(pool.slot_ptr(second).is_ok());
    }

    #[test]
    fn test_invalid_handles() {
        let pool = LockFreePool::<u32>::new(2).unwrap();
        let other = LockFreePool::<u32>::new(2).unwrap();
        let foreign = other.get_object().unwrap();

        assert!(matches!(
            pool.return_object(foreign),
            Err(PoolError::InvalidHandle { .. })
        ));
        assert!(matches!(
            pool.return_object(Handle::new(pool.id(), 5, 1)),
            Err(PoolError::InvalidHandle { index: 5, .. })
        ));
        assert!(matches!(
            pool.return_object(Handle::new(pool.id(), 0, 3)),
            Err(PoolError::InvalidHandle { index: 0, .. })
        ));
        assert!(matches!(
            pool.return_object(Handle::new(pool.id(), 0, u32::MAX)),
            Err(PoolError::InvalidHandle { index: 0, .. })
        ));
    }

    #[test]
    fn test_capacity_limits() {
        let empty = LockFreePool::<u8>::new(0).unwrap();
        assert!(empty.try_get_object().is_none());
        assert!(empty.get_object_at(0).is_none());

        #[cfg(target_pointer_width = "64")]
        assert!(matches!(
            LockFreePool::<u8>::new(MAX_CAPACITY + 1),
            Err(PoolError::CapacityTooLarge { .. })
        ));
    }

    #[test]
    fn test_generation_wraps() {
        let pool = LockFreePool::<u8>::new(1).unwrap();
        pool.state[0].store((u32::MAX >> 1) << 1, Ordering::Relaxed);

        let handle = pool.get_object().unwrap();
        assert_eq!(handle.generation(), 0);
        pool.return_object(handle).unwrap();

        let before_wrap = Handle::new(pool.id(), 0, u32::MAX >> 1);
        assert!(matches!(
            pool.return_object(before_wrap),
            Err(PoolError::InvalidHandle { index: 0, .. })
        ));
        pool.verify_integrity().unwrap();
    }

    #[test]
    fn test_slot_contents_survive_reuse() {
        let pool = LockFreePool::<u64>::new(1).unwrap();
        let handle = pool.get_object().unwrap();
        unsafe {
            let slot = pool.slot_ptr(handle).unwrap();
            assert_eq!((*slot.as_ptr()).assume_init(), 0);
            (*slot.as_ptr()).write(1234);
        }
        pool.return_object(handle).unwrap();

        let again = pool.get_object().unwrap();
        let value = unsafe { (*pool.slot_ptr(again).unwrap().as_ptr()).assume_init() };
        assert_eq!(value, 1234);
    }

    #[test]
    fn test_reset() {
        let mut pool = LockFreePool::<u8>::with_config(4, PoolConfig::debug()).unwrap();
        let a = pool.get_object().unwrap();
        let _b = pool.get_object().unwrap();

        pool.reset();

        assert_eq!(pool.objects_in_use(), 0);
        assert!(!pool.contains(&a));
        assert!(matches!(
            pool.return_object(a),
            Err(PoolError::DoubleReturn { index: 0 })
        ));
        assert_eq!(pool.get_object().unwrap().index(), 0);
        assert_eq!(pool.stats().unwrap().total_allocs, 1);
        pool.verify_integrity().unwrap();
    }

    #[test]
    fn test_concurrent_double_return_succeeds_once() {
        const THREADS: usize = 8;

        for _ in 0..50 {
            let pool = Arc::new(LockFreePool::<u64>::new(2).unwrap());
            let handle = pool.get_object().unwrap();
            let barrier = Arc::new(Barrier::new(THREADS));

            let workers: Vec<_> = (0..THREADS)
                .map(|_| {
                    let pool = Arc::clone(&pool);
                    let barrier = Arc::clone(&barrier);
                    thread::spawn(move || {
                        barrier.wait();
                        pool.return_object(handle)
                    })
                })
                .collect();

            let results: Vec<_> = workers.into_iter().map(|w| w.join().unwrap()).collect();
            assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
            assert!(results
                .iter()
                .filter_map(|r| r.as_ref().err())
                .all(|e| matches!(e, PoolError::DoubleReturn { index: 0 })));
            assert_eq!(pool.objects_in_use(), 0);
            pool.verify_integrity().unwrap();
        }
    }
}
