//! `UnsafeCell` that may be shared across threads
//!
//! Slot storage of [`LockFreePool`](crate::LockFreePool) is wrapped in this
//! cell. Exclusive access to a slot is established by the pool's lease
//! protocol rather than by the type system.

#![allow(unsafe_code)]

use core::cell::UnsafeCell;

/// `UnsafeCell<T>` that is `Sync` when `T: Send`
///
/// Layout is identical to `UnsafeCell<T>`.
#[repr(transparent)]
pub(crate) struct SyncUnsafeCell<T: ?Sized>(UnsafeCell<T>);

// SAFETY: every access goes through a raw pointer obtained from `get`, and
// the lock-free pool only hands that pointer to the current lease holder.
unsafe impl<T: ?Sized + Send> Sync for SyncUnsafeCell<T> {}

// SAFETY: moving the cell moves the `T`, which is `Send`.
unsafe impl<T: ?Sized + Send> Send for SyncUnsafeCell<T> {}

impl<T> SyncUnsafeCell<T> {
    #[inline]
    pub(crate) const fn new(value: T) -> Self {
        Self(UnsafeCell::new(value))
    }
}

impl<T: ?Sized> SyncUnsafeCell<T> {
    /// Raw pointer to the contents
    ///
    /// Dereferencing it is only sound while the caller holds the slot's lease.
    #[inline]
    pub(crate) fn get(&self) -> *mut T {
        self.0.get()
    }
}
