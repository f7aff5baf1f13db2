use crate::{Lease, ProducerId};

/// Observable lifecycle state of a
/// [`LockProducerIdAllocator`](crate::LockProducerIdAllocator).
///
/// ```text
/// Uninitialized ─▶ Holding ─▶ Exhausted ─▶ Holding ─▶ …
///        │                        │
///        └────────────────────────┴──▶ PermanentlyFailed
/// ```
///
/// Acquisition itself runs inside the allocator's critical section, so an
/// "acquiring" state is never observed from the outside.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocatorPhase {
    /// No lease has been acquired yet.
    Uninitialized,
    /// The lease still has unissued producer IDs.
    Holding {
        lease: Lease,
        /// The ID the next call returns.
        next_id: ProducerId,
    },
    /// Every ID of the lease has been issued; the next call acquires a new
    /// one.
    Exhausted { lease: Lease },
    /// The ID space is used up or the stored record overflowed. Terminal.
    PermanentlyFailed,
}

impl AllocatorPhase {
    pub const fn is_failed(&self) -> bool {
        matches!(self, Self::PermanentlyFailed)
    }
}
