//! Lock-guarded pool shareable across threads
//!
//! Every operation takes one `parking_lot` mutex around a [`Pool`], so the
//! single-threaded semantics carry over unchanged: ascending first lease,
//! LIFO reuse, exact double-return detection.

use core::fmt;
use core::mem::MaybeUninit;

use parking_lot::Mutex;

use crate::config::PoolConfig;
use crate::error::PoolResult;
use crate::handle::{Handle, PoolId};
use crate::pool::Pool;
use crate::stats::PoolStats;

/// Thread-safe pool that serializes all operations through one lock
///
/// `capacity` and the pool id never change, so they are read without the
/// lock.
///
/// # Example
/// ```
/// use std::sync::Arc;
/// use std::thread;
///
/// use bitpool::ThreadSafePool;
///
/// let pool = Arc::new(ThreadSafePool::<u64>::new(8)?);
/// let workers: Vec<_> = (0..4)
///     .map(|n| {
///         let pool = Arc::clone(&pool);
///         thread::spawn(move || {
///             let handle = pool.get_object().unwrap();
///             pool.write(handle, n).unwrap();
///             pool.return_object(handle).unwrap();
///         })
///     })
///     .collect();
/// for worker in workers {
///     worker.join().unwrap();
/// }
/// assert_eq!(pool.objects_in_use(), 0);
/// # Ok::<(), bitpool::PoolError>(())
/// ```
pub struct ThreadSafePool<T> {
    inner: Mutex<Pool<T>>,
    capacity: usize,
    id: PoolId,
}

impl<T> ThreadSafePool<T> {
    /// Creates a pool of `capacity` slots with default configuration
    pub fn new(capacity: usize) -> PoolResult<Self> {
        Self::with_config(capacity, PoolConfig::default())
    }

    /// Creates a pool with custom configuration
    pub fn with_config(capacity: usize, config: PoolConfig) -> PoolResult<Self> {
        Ok(Self::from_pool(Pool::with_config(capacity, config)?))
    }

    /// Wraps an existing pool; outstanding handles stay valid
    pub fn from_pool(pool: Pool<T>) -> Self {
        Self {
            capacity: pool.max_objects(),
            id: pool.id(),
            inner: Mutex::new(pool),
        }
    }

    /// See [`Pool::get_object`]
    pub fn get_object(&self) -> PoolResult<Handle<T>> {
        self.inner.lock().get_object()
    }

    /// See [`Pool::try_get_object`]
    pub fn try_get_object(&self) -> Option<Handle<T>> {
        self.inner.lock().try_get_object()
    }

    /// See [`Pool::return_object`]
    pub fn return_object(&self, handle: Handle<T>) -> PoolResult<()> {
        self.inner.lock().return_object(handle)
    }

    /// See [`Pool::get_object_at`]
    pub fn get_object_at(&self, index: usize) -> Option<Handle<T>> {
        self.inner.lock().get_object_at(index)
    }

    /// Slots in use at the moment of the call
    pub fn objects_in_use(&self) -> usize {
        self.inner.lock().objects_in_use()
    }

    #[inline]
    pub fn max_objects(&self) -> usize {
        self.capacity
    }

    pub fn free_objects(&self) -> usize {
        self.inner.lock().free_objects()
    }

    pub fn is_full(&self) -> bool {
        self.inner.lock().is_full()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    pub fn is_in_use(&self, index: usize) -> Option<bool> {
        self.inner.lock().is_in_use(index)
    }

    pub fn config(&self) -> PoolConfig {
        *self.inner.lock().config()
    }

    #[inline]
    pub fn id(&self) -> PoolId {
        self.id
    }

    pub fn contains(&self, handle: &Handle<T>) -> bool {
        self.inner.lock().contains(handle)
    }

    pub fn stats(&self) -> Option<PoolStats> {
        self.inner.lock().stats()
    }

    /// Runs `f` on the slot's storage while holding the lock
    ///
    /// `f` must not call back into this pool.
    pub fn with_slot<R>(
        &self,
        handle: Handle<T>,
        f: impl FnOnce(&mut MaybeUninit<T>) -> R,
    ) -> PoolResult<R> {
        let mut pool = self.inner.lock();
        Ok(f(pool.get_mut(handle)?))
    }

    /// Stores `value` in the slot without dropping the previous contents
    pub fn write(&self, handle: Handle<T>, value: T) -> PoolResult<()> {
        self.inner.lock().write(handle, value).map(|_| ())
    }

    /// See [`Pool::reset`]
    pub fn reset(&self) {
        self.inner.lock().reset();
    }

    /// See [`Pool::verify_integrity`]
    pub fn verify_integrity(&self) -> PoolResult<()> {
        self.inner.lock().verify_integrity()
    }

    /// Indices of in-use slots, collected under the lock
    pub fn in_use_snapshot(&self) -> Vec<usize> {
        self.inner.lock().in_use_indices().collect()
    }

    /// Unwraps the inner pool
    pub fn into_inner(self) -> Pool<T> {
        self.inner.into_inner()
    }
}

impl<T> From<Pool<T>> for ThreadSafePool<T> {
    fn from(pool: Pool<T>) -> Self {
        Self::from_pool(pool)
    }
}

impl<T> fmt::Debug for ThreadSafePool<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThreadSafePool")
            .field("id", &self.id)
            .field("capacity", &self.capacity)
            .finish_non_exhaustive()
    }
}
