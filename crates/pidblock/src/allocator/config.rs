use crate::{DEFAULT_BLOCK_SIZE, Lease, OwnerId, ProducerId};

/// Invalid [`AllocatorConfig`].
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("block size must be at least 1, got {block_size}")]
    InvalidBlockSize { block_size: i64 },

    #[error("max producer id {max_producer_id} leaves no room for a block of {block_size}")]
    CeilingTooLow {
        block_size: i64,
        max_producer_id: ProducerId,
    },
}

/// Static parameters of a producer ID allocator.
///
/// # Example
/// ```
/// use pidblock::AllocatorConfig;
///
/// let config = AllocatorConfig::new(3).with_block_size(500);
/// assert_eq!(config.block_size, 500);
/// assert_eq!(config.max_producer_id, i64::MAX);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllocatorConfig {
    /// Coordinator identity written into every lease this allocator claims.
    pub owner_id: OwnerId,
    /// Number of producer IDs claimed per lease.
    pub block_size: i64,
    /// Exclusive ceiling of the ID space: no lease may reach it, so every
    /// issued ID and the cursor one past a lease's end stay representable.
    pub max_producer_id: ProducerId,
}

impl AllocatorConfig {
    pub const fn new(owner_id: OwnerId) -> Self {
        Self {
            owner_id,
            block_size: DEFAULT_BLOCK_SIZE,
            max_producer_id: ProducerId::MAX,
        }
    }

    #[must_use]
    pub const fn with_block_size(mut self, block_size: i64) -> Self {
        self.block_size = block_size;
        self
    }

    #[must_use]
    pub const fn with_max_producer_id(mut self, max_producer_id: ProducerId) -> Self {
        self.max_producer_id = max_producer_id;
        self
    }

    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the block size is not positive or the
    /// first lease would already reach `max_producer_id`.
    pub const fn validate(&self) -> Result<(), ConfigError> {
        if self.block_size < 1 {
            return Err(ConfigError::InvalidBlockSize {
                block_size: self.block_size,
            });
        }
        if self.max_producer_id <= self.block_size {
            return Err(ConfigError::CeilingTooLow {
                block_size: self.block_size,
                max_producer_id: self.max_producer_id,
            });
        }
        Ok(())
    }

    /// The lease to claim after `prior`, or `None` if it would reach
    /// `max_producer_id`.
    ///
    /// Assumes a validated config.
    pub const fn next_lease(&self, prior: Option<&Lease>) -> Option<Lease> {
        match prior {
            None => Some(Lease::first(self.owner_id, self.block_size)),
            Some(prior) if prior.end() >= self.max_producer_id - self.block_size => None,
            Some(prior) => Some(Lease::following(prior, self.owner_id, self.block_size)),
        }
    }
}
