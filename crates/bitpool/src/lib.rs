//! # bitpool
//!
//! Fixed-capacity object pools with O(1) lease and return.
//!
//! A pool reserves storage for exactly `capacity` values of `T` up front and
//! hands out slots by [`Handle`]. Nothing is allocated after construction,
//! so there is no fragmentation and no allocator traffic on the hot path.
//!
//! - [`Pool`]: single owner, `&mut self` operations
//! - [`ThreadSafePool`]: one `parking_lot` mutex around a [`Pool`]
//! - [`LockFreePool`]: CAS-based free-list, no locks
//!
//! ## Quick Start
//!
//! ```rust
//! use bitpool::prelude::*;
//!
//! let mut pool = Pool::<i32>::new(3)?;
//!
//! let h0 = pool.get_object()?;
//! let h1 = pool.get_object()?;
//! let _h2 = pool.get_object()?;
//! assert_eq!(pool.objects_in_use(), 3);
//! assert!(matches!(pool.get_object(), Err(PoolError::PoolExhausted { .. })));
//!
//! pool.return_object(h1)?;
//! let reused = pool.get_object()?;
//! assert_eq!(reused.index(), h1.index());
//! assert!(matches!(pool.return_object(h1), Err(PoolError::DoubleReturn { .. })));
//! # let _ = h0;
//! # Ok::<(), PoolError>(())
//! ```
//!
//! ## Slot contents
//!
//! Slots are `MaybeUninit<T>` storage, zero-filled when the pool is built.
//! The pool never constructs or drops a `T`; a slot keeps whatever was last
//! written to it across return and re-lease unless
//! [`PoolConfig::poison_on_return`] is set.
//!
//! ## Features
//!
//! - `logging` (default): `tracing` events for construction, reset, lease and
//!   return. Failures are returned as [`PoolError`] and never logged.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(rust_2018_idioms)]

pub mod bitmap;
pub mod config;
pub mod error;
pub mod handle;
pub mod lockfree;
pub mod pool;
pub mod stats;
pub mod thread_safe;
pub mod utils;

mod sync_cell;

pub use crate::config::PoolConfig;
pub use crate::error::{PoolError, PoolResult};
pub use crate::handle::{Handle, PoolId};
pub use crate::lockfree::LockFreePool;
pub use crate::pool::Pool;
pub use crate::stats::PoolStats;
pub use crate::thread_safe::ThreadSafePool;

pub mod prelude {
    //! Convenient re-exports of commonly used types.

    pub use crate::config::PoolConfig;
    pub use crate::error::{PoolError, PoolResult};
    pub use crate::handle::{Handle, PoolId};
    pub use crate::lockfree::LockFreePool;
    pub use crate::pool::Pool;
    pub use crate::stats::PoolStats;
    pub use crate::thread_safe::ThreadSafePool;
}
