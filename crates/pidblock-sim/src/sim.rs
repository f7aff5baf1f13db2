use std::collections::HashSet;
use std::sync::Arc;
use std::thread::scope;
use std::time::{Duration, Instant};

use anyhow::{Context, bail, ensure};
use pidblock::{
    Backoff, ExponentialBackoff, Lease, LockProducerIdAllocator, MemoryStore, NoBackoff,
    ProducerId,
};

use crate::config::SimConfig;

/// Owner id of the lease planted by `SEED_BLOCK_END`.
const SEED_OWNER: i32 = -1;

#[derive(Debug)]
pub struct WorkerReport {
    pub owner_id: i32,
    pub ids: Vec<ProducerId>,
    /// Why the allocator gave up before issuing all requested IDs.
    pub stopped: Option<String>,
}

#[derive(Debug)]
pub struct Report {
    pub workers: Vec<WorkerReport>,
    /// Every lease written to the store, oldest first.
    pub leases: Vec<Lease>,
    /// Conditional writes that lost their race.
    pub conflicts: usize,
    pub elapsed: Duration,
}

impl Report {
    pub fn total_ids(&self) -> usize {
        self.workers.iter().map(|w| w.ids.len()).sum()
    }

    /// Checks that the run upheld global uniqueness.
    ///
    /// - each allocator's IDs are strictly increasing and inside its own
    ///   leases;
    /// - no producer ID was issued twice;
    /// - the written leases tile the ID space without gaps or overlaps.
    pub fn verify(&self) -> anyhow::Result<()> {
        let mut seen = HashSet::with_capacity(self.total_ids());
        for worker in &self.workers {
            ensure!(
                worker.ids.windows(2).all(|w| w[0] < w[1]),
                "allocator {} issued ids out of order",
                worker.owner_id
            );
            for &id in &worker.ids {
                ensure!(seen.insert(id), "producer id {id} was issued twice");
                ensure!(
                    self.leases
                        .iter()
                        .any(|l| l.owner_id() == worker.owner_id && l.contains(id)),
                    "producer id {id} lies outside every lease of allocator {}",
                    worker.owner_id
                );
            }
        }

        for pair in self.leases.windows(2) {
            if pair[1].start() != pair[0].end() + 1 {
                bail!("lease {} does not follow lease {}", pair[1], pair[0]);
            }
        }
        Ok(())
    }
}

/// Runs every allocator to completion against one shared store.
pub fn run(config: &SimConfig) -> anyhow::Result<Report> {
    match config.backoff {
        None => run_with(config, NoBackoff),
        Some((initial, max)) => run_with(config, ExponentialBackoff::new(initial, max)),
    }
}

fn run_with<B>(config: &SimConfig, backoff: B) -> anyhow::Result<Report>
where
    B: Backoff + Clone + Send,
{
    let store = Arc::new(match config.seed_block_end {
        Some(end) => {
            let start = (end - config.block_size + 1).max(0);
            MemoryStore::with_lease(&Lease::from_components(SEED_OWNER, start, end))
        }
        None => MemoryStore::new(),
    });

    let started = Instant::now();
    let workers = scope(|s| {
        let handles: Vec<_> = (0..config.allocators)
            .map(|owner| {
                let store = Arc::clone(&store);
                let backoff = backoff.clone();
                s.spawn(move || run_worker(config, owner, store, backoff))
            })
            .collect();
        handles
            .into_iter()
            .map(|h| {
                h.join()
                    .map_err(|_| anyhow::anyhow!("allocator thread panicked"))?
            })
            .collect::<anyhow::Result<Vec<_>>>()
    })?;
    let elapsed = started.elapsed();

    let leases = store.leases().context("store holds an undecodable lease")?;
    let successful_writes = store.history().len() - usize::from(config.seed_block_end.is_some());
    let conflicts = store.write_attempts().saturating_sub(successful_writes);

    Ok(Report {
        workers,
        leases,
        conflicts,
        elapsed,
    })
}

fn run_worker<B: Backoff>(
    config: &SimConfig,
    owner: usize,
    store: Arc<MemoryStore>,
    backoff: B,
) -> anyhow::Result<WorkerReport> {
    let owner_id = i32::try_from(owner)?;
    let allocator =
        LockProducerIdAllocator::with_backoff(config.allocator_config(owner_id), store, backoff)?;

    let mut ids = Vec::with_capacity(config.ids_per_allocator);
    let mut stopped = None;
    while ids.len() < config.ids_per_allocator {
        match allocator.try_generate_producer_id() {
            Ok(id) => ids.push(id),
            Err(e) if e.is_fatal() => {
                stopped = Some(e.to_string());
                break;
            }
            Err(e) => {
                tracing::warn!(owner_id, error = %e, "retrying after store failure");
            }
        }
    }

    let last = allocator.shutdown()?;
    tracing::debug!(owner_id, issued = ids.len(), last = ?last, "allocator finished");
    Ok(WorkerReport {
        owner_id,
        ids,
        stopped,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(allocators: usize, ids: usize, block_size: i64) -> SimConfig {
        SimConfig {
            allocators,
            ids_per_allocator: ids,
            block_size,
            max_producer_id: i64::MAX,
            seed_block_end: None,
            backoff: None,
        }
    }

    #[test]
    fn racing_allocators_pass_verification() {
        let report = run(&config(6, 2_000, 37)).unwrap();
        report.verify().unwrap();
        assert_eq!(report.total_ids(), 12_000);
        assert_eq!(report.leases.first().map(Lease::start), Some(0));
        assert!(report.workers.iter().all(|w| w.stopped.is_none()));
    }

    #[test]
    fn exhaustion_stops_every_allocator() {
        let config = SimConfig {
            max_producer_id: 10_000,
            seed_block_end: Some(7_999),
            ..config(3, 5_000, 500)
        };
        let report = run(&config).unwrap();
        report.verify().unwrap();
        // Room for exactly four more blocks: 8000..=9999.
        assert_eq!(report.total_ids(), 2_000);
        assert!(report.workers.iter().all(|w| w.stopped.is_some()));
        assert_eq!(report.leases.last().map(Lease::end), Some(9_999));
    }

    #[test]
    fn verify_catches_duplicates() {
        let lease = Lease::from_components(0, 0, 9);
        let report = Report {
            workers: vec![
                WorkerReport {
                    owner_id: 0,
                    ids: vec![0, 1],
                    stopped: None,
                },
                WorkerReport {
                    owner_id: 0,
                    ids: vec![1, 2],
                    stopped: None,
                },
            ],
            leases: vec![lease],
            conflicts: 0,
            elapsed: Duration::ZERO,
        };
        assert!(report.verify().is_err());
    }
}
