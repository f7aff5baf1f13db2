use crate::{DecodeError, ProducerId};

/// A result type whose error defaults to [`Error`] over an infallible store.
pub type Result<T, E = Error> = core::result::Result<T, E>;

/// All errors the allocator can surface.
///
/// `E` is the error type of the [`MetadataStore`](crate::MetadataStore) in
/// use. Version conflicts never show up here: they are retried inside lease
/// acquisition and only cost latency.
///
/// Use [`Error::is_fatal`] to tell a stop signal from a failure worth
/// retrying.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum Error<E = core::convert::Infallible> {
    /// A request to the metadata store failed.
    ///
    /// The allocator state is untouched; the next call starts acquisition
    /// over from a fresh read.
    #[error("metadata store request failed: {0}")]
    Store(#[source] E),

    /// The stored lease record could not be decoded.
    ///
    /// The record is trusted state, so it is never repaired or skipped. A
    /// numeric overflow in the record also disables the allocator for good.
    #[error("stored lease record is invalid: {0}")]
    Decode(#[from] DecodeError),

    /// The next lease would run past the highest producer ID that may be
    /// issued. Raised before any write; the allocator is permanently failed
    /// from here on.
    #[error(
        "producer id space exhausted: last block ends at {block_end}, no room for another block below {max_producer_id}"
    )]
    Exhausted {
        block_end: ProducerId,
        max_producer_id: ProducerId,
    },

    /// A previous acquisition hit a permanent condition; this allocator will
    /// never issue another producer ID.
    #[error("producer id allocator is permanently failed")]
    PermanentlyFailed,

    /// The allocator lock was poisoned by a thread that panicked while
    /// holding it.
    ///
    /// Only produced with the default `std` mutex: when the `parking-lot`
    /// feature is enabled, mutexes do not poison.
    #[error("producer id allocator lock poisoned")]
    LockPoisoned,
}

impl<E> Error<E> {
    /// Returns `true` if the caller must stop asking this allocator for IDs.
    ///
    /// Only store failures are transient.
    pub const fn is_fatal(&self) -> bool {
        !matches!(self, Self::Store(_))
    }
}

#[cfg(not(feature = "parking-lot"))]
use crate::allocator::{MutexGuard, PoisonError};
#[cfg(not(feature = "parking-lot"))]
impl<T, E> From<PoisonError<MutexGuard<'_, T>>> for Error<E> {
    fn from(_: PoisonError<MutexGuard<'_, T>>) -> Self {
        Self::LockPoisoned
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryStoreError;

    #[test]
    fn only_store_errors_are_retryable() {
        let store: Error<MemoryStoreError> = Error::Store(MemoryStoreError::Unavailable {
            reason: "down".to_owned(),
        });
        assert!(!store.is_fatal());
        assert!(Error::<MemoryStoreError>::PermanentlyFailed.is_fatal());
        assert!(
            Error::<MemoryStoreError>::Exhausted {
                block_end: 0,
                max_producer_id: 0
            }
            .is_fatal()
        );
        assert!(Error::<MemoryStoreError>::from(DecodeError::InvalidRange { start: 1, end: 0 }).is_fatal());
    }

    #[test]
    fn store_error_is_the_source() {
        use core::error::Error as _;
        let err: Error<MemoryStoreError> = Error::Store(MemoryStoreError::Unavailable {
            reason: "down".to_owned(),
        });
        assert_eq!(
            err.source().map(ToString::to_string),
            Some("metadata store unavailable: down".to_owned())
        );
    }
}
