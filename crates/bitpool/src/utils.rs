//! Low-level helpers shared by the pool implementations

#![allow(unsafe_code)]

use core::mem::MaybeUninit;

/// Allocates a boxed slice of `len` elements without aborting on OOM.
///
/// Returns `None` when the reservation fails, including when
/// `len * size_of::<E>()` would exceed `isize::MAX`.
pub(crate) fn try_boxed_slice<E>(len: usize, init: impl FnMut(usize) -> E) -> Option<Box<[E]>> {
    let mut items = Vec::new();
    items.try_reserve_exact(len).ok()?;
    items.extend((0..len).map(init));
    Some(items.into_boxed_slice())
}

/// Overwrites every byte of `slot` with `pattern`
#[inline]
pub(crate) fn poison_slot<T>(slot: &mut MaybeUninit<T>, pattern: u8) {
    // SAFETY: the pointer covers exactly one `T` we hold exclusively, and
    // `MaybeUninit<T>` admits any byte pattern.
    unsafe {
        slot.as_mut_ptr().cast::<u8>().write_bytes(pattern, size_of::<T>());
    }
}

/// Backoff utility for spin loops
#[derive(Debug, Clone)]
pub struct Backoff {
    current: u32,
    max: u32,
}

impl Backoff {
    /// Create new backoff with default parameters
    #[inline]
    pub fn new() -> Self {
        Self { current: 1, max: 64 }
    }

    /// Perform backoff
    #[inline]
    pub fn spin(&mut self) {
        for _ in 0..self.current {
            core::hint::spin_loop();
        }
        if self.current < self.max {
            self.current *= 2;
        }
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_try_boxed_slice() {
        let slice = try_boxed_slice(4, |i| i * 10).unwrap();
        assert_eq!(&*slice, &[0, 10, 20, 30]);
    }

    #[test]
    fn test_try_boxed_slice_overflow() {
        assert!(try_boxed_slice::<u64>(usize::MAX, |_| 0).is_none());
    }

    #[test]
    fn test_poison_slot() {
        let mut slot = MaybeUninit::<u32>::zeroed();
        poison_slot(&mut slot, 0xAB);
        assert_eq!(unsafe { slot.assume_init() }, 0xABAB_ABAB);
    }

    #[test]
    fn test_backoff_saturates() {
        let mut backoff = Backoff::new();
        for _ in 0..10 {
            backoff.spin();
        }
        assert_eq!(backoff.current, backoff.max);
    }
}
