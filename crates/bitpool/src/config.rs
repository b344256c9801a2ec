//! Pool configuration

/// Configuration shared by every pool flavour
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolConfig {
    /// Enable statistics tracking
    pub track_stats: bool,

    /// Byte written over a slot when it is returned (for debugging).
    ///
    /// `None` leaves slot contents as the caller last wrote them.
    pub poison_on_return: Option<u8>,

    /// Use exponential backoff between failed CAS attempts in the lock-free
    /// pool
    pub use_backoff: bool,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            track_stats: cfg!(debug_assertions),
            poison_on_return: None,
            use_backoff: true,
        }
    }
}

impl PoolConfig {
    /// Production configuration - optimized for performance
    #[must_use]
    pub fn production() -> Self {
        Self {
            track_stats: false,
            poison_on_return: None,
            use_backoff: true,
        }
    }

    /// Debug configuration - optimized for debugging
    #[must_use]
    pub fn debug() -> Self {
        Self {
            track_stats: true,
            poison_on_return: Some(0xDD),
            use_backoff: false,
        }
    }

    /// Performance configuration - minimal overhead
    #[must_use]
    pub fn performance() -> Self {
        Self {
            track_stats: false,
            poison_on_return: None,
            use_backoff: false,
        }
    }

    /// Enable or disable statistics tracking
    pub fn with_stats(mut self, track_stats: bool) -> Self {
        self.track_stats = track_stats;
        self
    }

    /// Set the byte written over returned slots
    pub fn with_poison(mut self, pattern: Option<u8>) -> Self {
        self.poison_on_return = pattern;
        self
    }

    /// Enable or disable CAS backoff
    pub fn with_backoff(mut self, use_backoff: bool) -> Self {
        self.use_backoff = use_backoff;
        self
    }
}
