//! Error types for bitpool
//!
//! Every pool operation reports failure as a [`PoolError`] value; nothing in
//! this crate panics on caller mistakes or logs a failure on the caller's
//! behalf.

use thiserror::Error;

// ============================================================================
// Main Error Type
// ============================================================================

/// Pool operation errors
#[must_use = "errors should be handled"]
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PoolError {
    // --- Allocation Errors ---
    /// `get_object` was called while every slot was in use.
    #[error("Pool exhausted: all {capacity} slots are in use")]
    PoolExhausted { capacity: usize },

    /// Backing storage for the pool could not be reserved.
    #[error("Pool allocation failed: {capacity} slots of {element_size} bytes")]
    AllocationFailed { capacity: usize, element_size: usize },

    /// Requested capacity does not fit the pool's index representation.
    #[error("Pool capacity {capacity} exceeds maximum of {max}")]
    CapacityTooLarge { capacity: usize, max: usize },

    // --- Handle Errors ---
    /// Handle is out of range, foreign to this pool, or was never issued.
    #[error("Invalid handle for slot {index} (capacity: {capacity}): {reason}")]
    InvalidHandle {
        index: usize,
        capacity: usize,
        reason: &'static str,
    },

    /// The slot addressed by the handle was already returned.
    #[error("Slot {index} was already returned to the pool")]
    DoubleReturn { index: usize },

    // --- Integrity Errors ---
    /// Internal bookkeeping disagrees with itself.
    #[error("Pool corrupted: {details}")]
    Corrupted { details: String },
}

impl PoolError {
    /// Check if the caller may reasonably retry the operation later
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::PoolExhausted { .. })
    }

    /// Get error code for categorization
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::PoolExhausted { .. } => "BITPOOL:EXHAUSTED",
            Self::AllocationFailed { .. } => "BITPOOL:ALLOC:FAILED",
            Self::CapacityTooLarge { .. } => "BITPOOL:ALLOC:CAPACITY",
            Self::InvalidHandle { .. } => "BITPOOL:HANDLE:INVALID",
            Self::DoubleReturn { .. } => "BITPOOL:HANDLE:DOUBLE_RETURN",
            Self::Corrupted { .. } => "BITPOOL:CORRUPTED",
        }
    }

    /// Whether the error points at a handle misuse in client code
    #[must_use]
    pub fn is_handle_error(&self) -> bool {
        matches!(self, Self::InvalidHandle { .. } | Self::DoubleReturn { .. })
    }

    // ============================================================================
    // Convenience Constructors
    // ============================================================================

    /// Create pool exhausted error
    #[must_use]
    pub fn pool_exhausted(capacity: usize) -> Self {
        Self::PoolExhausted { capacity }
    }

    /// Create allocation failed error for `capacity` elements of type `T`
    #[must_use]
    pub fn allocation_failed<T>(capacity: usize) -> Self {
        Self::AllocationFailed {
            capacity,
            element_size: size_of::<T>(),
        }
    }

    /// Create capacity too large error
    #[must_use]
    pub fn capacity_too_large(capacity: usize, max: usize) -> Self {
        Self::CapacityTooLarge { capacity, max }
    }

    /// Create invalid handle error
    #[must_use]
    pub fn invalid_handle(index: usize, capacity: usize, reason: &'static str) -> Self {
        Self::InvalidHandle {
            index,
            capacity,
            reason,
        }
    }

    /// Create double return error
    #[must_use]
    pub fn double_return(index: usize) -> Self {
        Self::DoubleReturn { index }
    }

    /// Create corruption error
    pub fn corrupted(details: impl Into<String>) -> Self {
        Self::Corrupted {
            details: details.into(),
        }
    }
}

// ============================================================================
// Result Types
// ============================================================================

/// Result type for pool operations
pub type PoolResult<T> = core::result::Result<T, PoolError>;

// ============================================================================
// Tests
// ============================================================================
