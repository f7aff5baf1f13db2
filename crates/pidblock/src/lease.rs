use core::fmt;

/// A producer ID. Always non-negative.
pub type ProducerId = i64;

/// Identifier of the coordinator process that owns a lease.
pub type OwnerId = i32;

/// Number of producer IDs in every lease an allocator creates.
pub const DEFAULT_BLOCK_SIZE: i64 = 1000;

/// A contiguous, inclusive range of producer IDs owned by one coordinator.
///
/// Leases are published to the metadata store one after the other, each
/// starting right after the end of its predecessor:
///
/// ```
/// use pidblock::Lease;
///
/// let first = Lease::first(7, 1000);
/// assert_eq!((first.start(), first.end()), (0, 999));
///
/// let next = Lease::following(&first, 3, 1000);
/// assert_eq!((next.start(), next.end()), (1000, 1999));
/// assert_eq!(next.owner_id(), 3);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Lease {
    owner_id: OwnerId,
    start: ProducerId,
    end: ProducerId,
}

impl Lease {
    /// Creates a lease from explicit bounds.
    ///
    /// The caller is responsible for `0 <= start <= end`; the codec and the
    /// allocator only ever construct leases that satisfy it.
    pub const fn from_components(owner_id: OwnerId, start: ProducerId, end: ProducerId) -> Self {
        Self {
            owner_id,
            start,
            end,
        }
    }

    /// The first lease ever written to an empty store: `[0, block_size - 1]`.
    pub const fn first(owner_id: OwnerId, block_size: i64) -> Self {
        Self::from_components(owner_id, 0, block_size - 1)
    }

    /// The lease directly following `prior`: `[prior.end + 1, prior.end +
    /// block_size]`.
    ///
    /// Does not guard against overflow; see
    /// [`AllocatorConfig::max_producer_id`](crate::AllocatorConfig) for the
    /// check the allocator performs first.
    pub const fn following(prior: &Self, owner_id: OwnerId, block_size: i64) -> Self {
        Self::from_components(owner_id, prior.end + 1, prior.end + block_size)
    }

    pub const fn owner_id(&self) -> OwnerId {
        self.owner_id
    }

    /// First producer ID of the lease (inclusive).
    pub const fn start(&self) -> ProducerId {
        self.start
    }

    /// Last producer ID of the lease (inclusive).
    pub const fn end(&self) -> ProducerId {
        self.end
    }

    /// Number of producer IDs covered by the lease.
    pub const fn size(&self) -> i64 {
        self.end - self.start + 1
    }

    pub const fn contains(&self, id: ProducerId) -> bool {
        self.start <= id && id <= self.end
    }

    /// Returns `true` if the two leases share at least one producer ID.
    pub const fn overlaps(&self, other: &Self) -> bool {
        self.start <= other.end && other.start <= self.end
    }
}

impl fmt::Display for Lease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}, {}] (owner {})",
            self.start, self.end, self.owner_id
        )
    }
}
