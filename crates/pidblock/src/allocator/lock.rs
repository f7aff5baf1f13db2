#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::{
    AllocatorConfig, AllocatorPhase, Backoff, ConfigError, Error, Lease, MetadataStore, NoBackoff,
    ProducerId, ProducerIdGenerator, WriteOutcome,
    allocator::{Mutex, MutexGuard},
    decode, encode,
};

#[derive(Debug, Default)]
struct AllocatorState {
    held: Option<Lease>,
    next_id: ProducerId,
    last_assigned: Option<ProducerId>,
    failed: bool,
}

impl AllocatorState {
    fn needs_lease(&self) -> bool {
        self.held.is_none_or(|lease| self.next_id > lease.end())
    }
}

/// A lock-based producer ID allocator backed by a shared versioned lease
/// record.
///
/// The allocator claims blocks of [`AllocatorConfig::block_size`] IDs from the
/// [`MetadataStore`] with version-guarded writes and hands them out one by
/// one. A single mutex covers both dispensing and acquisition, so:
///
/// - IDs from one allocator are dense and strictly increasing, across lease
///   boundaries too;
/// - at most one acquisition is in flight per allocator;
/// - callers arriving during an acquisition wait for it instead of racing.
///
/// Allocators in different processes never communicate. Whoever loses a
/// conditional write re-reads the record and claims the block after the
/// winner's, so no two allocators ever hold overlapping leases.
///
/// Unused IDs of the held lease are forfeited when the allocator is dropped.
///
/// ## Recommended When
/// - One allocator per process, shared by reference or [`Arc`] among threads
/// - The store is a consensus-backed service with conditional writes
///
/// # Example
/// ```
/// use pidblock::{AllocatorConfig, LockProducerIdAllocator, MemoryStore};
///
/// let allocator =
///     LockProducerIdAllocator::new(AllocatorConfig::new(1), MemoryStore::new()).unwrap();
///
/// assert_eq!(allocator.try_generate_producer_id().unwrap(), 0);
/// assert_eq!(allocator.try_generate_producer_id().unwrap(), 1);
/// assert_eq!(allocator.shutdown().unwrap(), Some(1));
/// ```
///
/// [`Arc`]: std::sync::Arc
pub struct LockProducerIdAllocator<S, B = NoBackoff>
where
    S: MetadataStore,
    B: Backoff,
{
    #[cfg(feature = "cache-padded")]
    state: crossbeam_utils::CachePadded<Mutex<AllocatorState>>,
    #[cfg(not(feature = "cache-padded"))]
    state: Mutex<AllocatorState>,
    store: S,
    backoff: B,
    config: AllocatorConfig,
}

impl<S> LockProducerIdAllocator<S>
where
    S: MetadataStore,
{
    /// Creates an allocator that retries conflicting writes immediately.
    ///
    /// No store interaction happens until the first ID is requested.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if `config` does not validate.
    pub fn new(config: AllocatorConfig, store: S) -> Result<Self, ConfigError> {
        Self::with_backoff(config, store, NoBackoff)
    }
}

impl<S, B> LockProducerIdAllocator<S, B>
where
    S: MetadataStore,
    B: Backoff,
{
    /// Creates an allocator that pauses through `backoff` after every
    /// conflicting write.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if `config` does not validate.
    pub fn with_backoff(config: AllocatorConfig, store: S, backoff: B) -> Result<Self, ConfigError> {
        config.validate()?;
        let state = Mutex::new(AllocatorState::default());
        Ok(Self {
            #[cfg(feature = "cache-padded")]
            state: crossbeam_utils::CachePadded::new(state),
            #[cfg(not(feature = "cache-padded"))]
            state,
            store,
            backoff,
            config,
        })
    }

    pub const fn config(&self) -> &AllocatorConfig {
        &self.config
    }

    pub const fn store(&self) -> &S {
        &self.store
    }

    /// Returns the next producer ID, acquiring a new lease first if the held
    /// one is used up.
    ///
    /// # Errors
    ///
    /// - [`Error::Store`] if a store request failed; calling again retries.
    /// - [`Error::Decode`] if the stored record is invalid.
    /// - [`Error::Exhausted`] if no further lease fits below
    ///   [`AllocatorConfig::max_producer_id`]; [`Error::PermanentlyFailed`] on
    ///   every call after that.
    /// - [`Error::LockPoisoned`] if another thread panicked inside the
    ///   allocator (std mutex only).
    #[cfg_attr(feature = "tracing", instrument(level = "trace", skip(self)))]
    pub fn try_generate_producer_id(&self) -> Result<ProducerId, Error<S::Err>> {
        let mut state = self.lock()?;
        if state.failed {
            return Err(Error::PermanentlyFailed);
        }

        if state.needs_lease() {
            let lease = self.acquire_lease(&mut state)?;
            state.held = Some(lease);
            state.next_id = lease.start();
        }

        let id = state.next_id;
        state.next_id += 1;
        state.last_assigned = Some(id);
        Ok(id)
    }

    /// Reports the last producer ID handed out, if any.
    ///
    /// Nothing is written back to the store: the rest of the held lease is
    /// simply abandoned.
    ///
    /// # Errors
    ///
    /// - [`Error::LockPoisoned`] if another thread panicked inside the
    ///   allocator (std mutex only).
    pub fn shutdown(&self) -> Result<Option<ProducerId>, Error<S::Err>> {
        let last_assigned = self.lock()?.last_assigned;
        #[cfg(feature = "tracing")]
        tracing::info!(
            owner_id = self.config.owner_id,
            last_assigned = ?last_assigned,
            "producer id allocator shut down"
        );
        Ok(last_assigned)
    }

    /// # Errors
    ///
    /// - [`Error::LockPoisoned`] if another thread panicked inside the
    ///   allocator (std mutex only).
    pub fn phase(&self) -> Result<AllocatorPhase, Error<S::Err>> {
        let state = self.lock()?;
        let phase = match state.held {
            _ if state.failed => AllocatorPhase::PermanentlyFailed,
            None => AllocatorPhase::Uninitialized,
            Some(lease) if state.next_id > lease.end() => AllocatorPhase::Exhausted { lease },
            Some(lease) => AllocatorPhase::Holding {
                lease,
                next_id: state.next_id,
            },
        };
        Ok(phase)
    }

    fn lock(&self) -> Result<MutexGuard<'_, AllocatorState>, Error<S::Err>> {
        #[cfg(feature = "parking-lot")]
        {
            Ok(self.state.lock())
        }
        #[cfg(not(feature = "parking-lot"))]
        {
            Ok(self.state.lock()?)
        }
    }

    /// Claims the lease following the one currently in the store.
    ///
    /// Loops until a conditional write succeeds; only store failures and
    /// permanent conditions end the loop early.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "debug", skip(self, state), fields(owner_id = self.config.owner_id))
    )]
    fn acquire_lease(&self, state: &mut AllocatorState) -> Result<Lease, Error<S::Err>> {
        let mut attempt: u32 = 0;
        loop {
            let current = self.store.read_current().map_err(|e| self.store_failure(e))?;

            let prior = match current.data.as_deref().map(decode).transpose() {
                Ok(prior) => prior,
                Err(e) => {
                    if e.is_overflow() {
                        #[cfg(feature = "tracing")]
                        tracing::error!(error = %e, "stored lease overflows the producer id space");
                        state.failed = true;
                    }
                    return Err(e.into());
                }
            };

            let Some(candidate) = self.config.next_lease(prior.as_ref()) else {
                #[cfg(feature = "tracing")]
                tracing::error!(
                    prior = ?prior,
                    max_producer_id = self.config.max_producer_id,
                    "producer id space exhausted"
                );
                state.failed = true;
                return Err(Error::Exhausted {
                    block_end: prior.map_or(-1, |p| p.end()),
                    max_producer_id: self.config.max_producer_id,
                });
            };

            let encoded = encode(&candidate);
            let already_written = |stored: &[u8]| decode(stored).is_ok_and(|lease| lease == candidate);
            let outcome = self
                .store
                .conditional_write(&encoded, current.version, Some(&already_written))
                .map_err(|e| self.store_failure(e))?;

            match outcome {
                WriteOutcome::Committed { version: _version } => {
                    #[cfg(feature = "tracing")]
                    tracing::info!(
                        lease = %candidate,
                        version = %_version,
                        conflicts = attempt,
                        "acquired producer id block"
                    );
                    return Ok(candidate);
                }
                WriteOutcome::Conflict => {
                    attempt = attempt.saturating_add(1);
                    #[cfg(feature = "tracing")]
                    tracing::debug!(
                        expected = %current.version,
                        attempt,
                        "lease record changed concurrently, retrying"
                    );
                    self.backoff.pause(attempt);
                }
            }
        }
    }

    fn store_failure(&self, err: S::Err) -> Error<S::Err> {
        #[cfg(feature = "tracing")]
        tracing::warn!(
            owner_id = self.config.owner_id,
            error = %err,
            "metadata store request failed during lease acquisition"
        );
        Error::Store(err)
    }
}

impl<S, B> ProducerIdGenerator for LockProducerIdAllocator<S, B>
where
    S: MetadataStore,
    B: Backoff,
{
    type Err = Error<S::Err>;

    fn generate_producer_id(&self) -> Result<ProducerId, Self::Err> {
        self.try_generate_producer_id()
    }

    fn shutdown(&self) -> Result<Option<ProducerId>, Self::Err> {
        self.shutdown()
    }
}
