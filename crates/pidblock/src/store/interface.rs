use core::fmt;
use std::sync::Arc;

/// Opaque version token of the lease record.
///
/// Every successful write produces a new, strictly greater version. A record
/// that has never been written reports [`Version::INITIAL`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Version(u64);

impl Version {
    pub const INITIAL: Self = Self(0);

    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn get(self) -> u64 {
        self.0
    }

    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// The lease record as read from the store, together with its version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Versioned {
    /// Encoded lease, or `None` if no lease has ever been written.
    pub data: Option<Vec<u8>>,
    pub version: Version,
}

/// Result of a version-guarded write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The bytes are now the current record, stored under `version`.
    Committed { version: Version },
    /// Another writer got there first; the expected version is stale.
    Conflict,
}

/// Checks whether the bytes currently stored already match the intended
/// write.
pub type Validator<'a> = &'a (dyn Fn(&[u8]) -> bool + 'a);

/// Versioned read and conditional write of the single shared lease record.
///
/// Implementations must make both operations atomic: a partially applied
/// write is never visible to [`MetadataStore::read_current`].
pub trait MetadataStore {
    /// Transport or session failure of a single request.
    type Err: core::error::Error + 'static;

    /// Returns the current record and its version.
    fn read_current(&self) -> Result<Versioned, Self::Err>;

    /// Writes `data` only if the record is still at `expected`.
    ///
    /// On a version mismatch the store may run `validator` against the bytes
    /// it currently holds. If the validator accepts them, the intended
    /// content is already persisted (typically by an earlier attempt of the
    /// same request whose acknowledgement was lost) and the call reports
    /// [`WriteOutcome::Committed`] with the current version.
    fn conditional_write(
        &self,
        data: &[u8],
        expected: Version,
        validator: Option<Validator<'_>>,
    ) -> Result<WriteOutcome, Self::Err>;
}

impl<S: MetadataStore + ?Sized> MetadataStore for &S {
    type Err = S::Err;

    fn read_current(&self) -> Result<Versioned, Self::Err> {
        (**self).read_current()
    }

    fn conditional_write(
        &self,
        data: &[u8],
        expected: Version,
        validator: Option<Validator<'_>>,
    ) -> Result<WriteOutcome, Self::Err> {
        (**self).conditional_write(data, expected, validator)
    }
}

impl<S: MetadataStore + ?Sized> MetadataStore for Arc<S> {
    type Err = S::Err;

    fn read_current(&self) -> Result<Versioned, Self::Err> {
        (**self).read_current()
    }

    fn conditional_write(
        &self,
        data: &[u8],
        expected: Version,
        validator: Option<Validator<'_>>,
    ) -> Result<WriteOutcome, Self::Err> {
        (**self).conditional_write(data, expected, validator)
    }
}
