use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::{DecodeError, Lease, MetadataStore, Validator, Version, Versioned, WriteOutcome, decode};

/// Failure injected into a [`MemoryStore`] request.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum MemoryStoreError {
    #[error("metadata store unavailable: {reason}")]
    Unavailable { reason: String },
}

type Interleave = Box<dyn FnOnce(&MemoryStore) + Send>;

#[derive(Default)]
struct Record {
    data: Option<Vec<u8>>,
    version: Version,
    history: Vec<Vec<u8>>,
    reads: usize,
    write_attempts: usize,
}

impl Record {
    fn apply(
        &mut self,
        data: &[u8],
        expected: Version,
        validator: Option<Validator<'_>>,
    ) -> WriteOutcome {
        self.write_attempts += 1;
        if self.version == expected {
            return self.commit(data);
        }
        let confirmed = match (validator, self.data.as_deref()) {
            (Some(validator), Some(stored)) => validator(stored),
            _ => false,
        };
        if confirmed {
            WriteOutcome::Committed {
                version: self.version,
            }
        } else {
            WriteOutcome::Conflict
        }
    }

    fn commit(&mut self, data: &[u8]) -> WriteOutcome {
        self.version = self.version.next();
        self.data = Some(data.to_vec());
        self.history.push(data.to_vec());
        WriteOutcome::Committed {
            version: self.version,
        }
    }
}

#[derive(Default)]
struct Faults {
    interleave: VecDeque<Interleave>,
    replay_next_write: bool,
    failing_reads: usize,
    failing_writes: usize,
}

/// An in-memory [`MetadataStore`] holding one versioned record.
///
/// Besides the plain store contract it can stage the races a real
/// coordination service produces, which makes it the store of choice for
/// tests and simulations:
///
/// - [`MemoryStore::interleave_before_next_write`] runs a competing writer
///   right before the next conditional write is applied.
/// - [`MemoryStore::replay_next_write`] applies the next conditional write and
///   then submits it a second time with the same expected version, as a
///   client does when the first acknowledgement is lost.
/// - [`MemoryStore::fail_next_reads`] and [`MemoryStore::fail_next_writes`]
///   inject transport failures.
///
/// Every committed payload is kept, so [`MemoryStore::leases`] can check the
/// full allocation history afterwards.
#[derive(Default)]
pub struct MemoryStore {
    record: Mutex<Record>,
    faults: Mutex<Faults>,
}

impl MemoryStore {
    /// Creates an empty store, as seen by the very first coordinator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store already holding `lease` at version 1.
    pub fn with_lease(lease: &Lease) -> Self {
        let store = Self::new();
        store.put(&crate::encode(lease));
        store
    }

    /// Unconditionally overwrites the record, bumping its version.
    pub fn put(&self, data: &[u8]) -> Version {
        let mut record = self.record();
        record.commit(data);
        record.version
    }

    /// Runs `f` right before the next conditional write is applied.
    ///
    /// Hooks queue up; each one fires for exactly one write.
    pub fn interleave_before_next_write(&self, f: impl FnOnce(&Self) + Send + 'static) {
        self.faults().interleave.push_back(Box::new(f));
    }

    /// Makes the next conditional write be delivered twice.
    pub fn replay_next_write(&self) {
        self.faults().replay_next_write = true;
    }

    /// Fails the next `count` reads with [`MemoryStoreError::Unavailable`].
    pub fn fail_next_reads(&self, count: usize) {
        self.faults().failing_reads = count;
    }

    /// Fails the next `count` conditional writes with
    /// [`MemoryStoreError::Unavailable`], without applying them.
    pub fn fail_next_writes(&self, count: usize) {
        self.faults().failing_writes = count;
    }

    pub fn current(&self) -> Versioned {
        let record = self.record();
        Versioned {
            data: record.data.clone(),
            version: record.version,
        }
    }

    pub fn version(&self) -> Version {
        self.record().version
    }

    /// Every payload committed so far, oldest first.
    pub fn history(&self) -> Vec<Vec<u8>> {
        self.record().history.clone()
    }

    /// Decodes [`MemoryStore::history`].
    ///
    /// # Errors
    ///
    /// Returns the first [`DecodeError`] hit while decoding the history.
    pub fn leases(&self) -> Result<Vec<Lease>, DecodeError> {
        self.record()
            .history
            .iter()
            .map(|bytes| decode(bytes))
            .collect()
    }

    /// Number of successful reads served.
    pub fn reads(&self) -> usize {
        self.record().reads
    }

    /// Number of conditional writes that reached the record, replays
    /// included.
    pub fn write_attempts(&self) -> usize {
        self.record().write_attempts
    }

    fn record(&self) -> MutexGuard<'_, Record> {
        self.record.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn faults(&self) -> MutexGuard<'_, Faults> {
        self.faults.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn take_failure(counter: &mut usize, op: &str) -> Result<(), MemoryStoreError> {
        if *counter == 0 {
            return Ok(());
        }
        *counter -= 1;
        Err(MemoryStoreError::Unavailable {
            reason: format!("injected {op} failure"),
        })
    }
}

impl MetadataStore for MemoryStore {
    type Err = MemoryStoreError;

    fn read_current(&self) -> Result<Versioned, Self::Err> {
        Self::take_failure(&mut self.faults().failing_reads, "read")?;
        let mut record = self.record();
        record.reads += 1;
        Ok(Versioned {
            data: record.data.clone(),
            version: record.version,
        })
    }

    fn conditional_write(
        &self,
        data: &[u8],
        expected: Version,
        validator: Option<Validator<'_>>,
    ) -> Result<WriteOutcome, Self::Err> {
        // The hook may write to the store itself, so neither lock is held
        // while it runs.
        let hook = self.faults().interleave.pop_front();
        if let Some(hook) = hook {
            hook(self);
        }

        let replay = {
            let mut faults = self.faults();
            Self::take_failure(&mut faults.failing_writes, "write")?;
            core::mem::take(&mut faults.replay_next_write)
        };

        let mut record = self.record();
        let outcome = record.apply(data, expected, validator);
        if replay && matches!(outcome, WriteOutcome::Committed { .. }) {
            return Ok(record.apply(data, expected, validator));
        }
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encode;

    #[test]
    fn empty_store_reads_absent() {
        let store = MemoryStore::new();
        let current = store.read_current().unwrap();
        assert_eq!(current.data, None);
        assert_eq!(current.version, Version::INITIAL);
    }

    #[test]
    fn conditional_write_checks_version() {
        let store = MemoryStore::new();
        let first = encode(&Lease::first(1, 10));
        let outcome = store
            .conditional_write(&first, Version::INITIAL, None)
            .unwrap();
        assert_eq!(
            outcome,
            WriteOutcome::Committed {
                version: Version::new(1)
            }
        );

        let stale = store
            .conditional_write(&first, Version::INITIAL, None)
            .unwrap();
        assert_eq!(stale, WriteOutcome::Conflict);
        assert_eq!(store.history().len(), 1);
    }

    #[test]
    fn validator_confirms_existing_content() {
        let store = MemoryStore::new();
        let data = encode(&Lease::first(1, 10));
        store.put(&data);

        let same = |stored: &[u8]| stored == data.as_slice();
        let outcome = store
            .conditional_write(&data, Version::INITIAL, Some(&same))
            .unwrap();
        assert_eq!(
            outcome,
            WriteOutcome::Committed {
                version: Version::new(1)
            }
        );

        let other = encode(&Lease::first(2, 10));
        let other_same = |stored: &[u8]| stored == other.as_slice();
        let outcome = store
            .conditional_write(&other, Version::INITIAL, Some(&other_same))
            .unwrap();
        assert_eq!(outcome, WriteOutcome::Conflict);
        assert_eq!(store.version(), Version::new(1));
        assert_eq!(store.current().data.as_deref(), Some(data.as_slice()));
    }

    #[test]
    fn replayed_write_conflicts_without_validator() {
        let store = MemoryStore::new();
        store.replay_next_write();
        let data = encode(&Lease::first(1, 10));
        let outcome = store
            .conditional_write(&data, Version::INITIAL, None)
            .unwrap();
        assert_eq!(outcome, WriteOutcome::Conflict);
        assert_eq!(store.version(), Version::new(1));
        assert_eq!(store.write_attempts(), 2);
    }

    #[test]
    fn interleaved_writer_runs_before_write() {
        let store = MemoryStore::new();
        store.interleave_before_next_write(|store| {
            store.put(&encode(&Lease::first(9, 10)));
        });
        let data = encode(&Lease::first(1, 10));
        let outcome = store
            .conditional_write(&data, Version::INITIAL, None)
            .unwrap();
        assert_eq!(outcome, WriteOutcome::Conflict);
        assert_eq!(store.leases().unwrap(), vec![Lease::first(9, 10)]);
    }

    #[test]
    fn injected_failures_are_counted_down() {
        let store = MemoryStore::new();
        store.fail_next_reads(1);
        assert!(store.read_current().is_err());
        assert!(store.read_current().is_ok());

        store.fail_next_writes(1);
        let data = encode(&Lease::first(1, 10));
        assert!(
            store
                .conditional_write(&data, Version::INITIAL, None)
                .is_err()
        );
        assert_eq!(store.write_attempts(), 0);
        assert!(
            store
                .conditional_write(&data, Version::INITIAL, None)
                .is_ok()
        );
    }
}
