use anyhow::bail;
use clap::Parser;
use core::time::Duration;
use pidblock::{AllocatorConfig, DEFAULT_BLOCK_SIZE, ProducerId};

/// Runtime configuration for the `pidblock-sim` binary.
///
/// Every allocator runs on its own thread, standing in for one coordinator
/// process. All of them share a single in-memory metadata store, so every
/// lease acquisition is a real race on the same versioned record.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "pidblock-sim",
    version,
    about = "Race producer ID allocators against one shared lease record"
)]
pub struct CliArgs {
    /// Number of allocators (simulated coordinators) racing for leases.
    ///
    /// Defaults to the number of logical CPUs.
    ///
    /// Environment variable: `ALLOCATORS`
    #[arg(long, env = "ALLOCATORS")]
    pub allocators: Option<usize>,

    /// Number of producer IDs each allocator requests.
    ///
    /// Environment variable: `IDS_PER_ALLOCATOR`
    #[arg(long, env = "IDS_PER_ALLOCATOR", default_value_t = 100_000)]
    pub ids_per_allocator: usize,

    /// Number of producer IDs claimed per lease.
    ///
    /// Smaller blocks mean more acquisitions and therefore more conflicts.
    ///
    /// Environment variable: `BLOCK_SIZE`
    #[arg(long, env = "BLOCK_SIZE", default_value_t = DEFAULT_BLOCK_SIZE)]
    pub block_size: i64,

    /// Exclusive ceiling of the producer ID space.
    ///
    /// Environment variable: `MAX_PRODUCER_ID`
    #[arg(long, env = "MAX_PRODUCER_ID", default_value_t = ProducerId::MAX)]
    pub max_producer_id: ProducerId,

    /// Pretend an earlier coordinator already claimed a block ending here.
    ///
    /// Useful together with `MAX_PRODUCER_ID` to watch allocators run out of
    /// ID space.
    ///
    /// Environment variable: `SEED_BLOCK_END`
    #[arg(long, env = "SEED_BLOCK_END")]
    pub seed_block_end: Option<ProducerId>,

    /// Initial backoff after a lost conditional write, in milliseconds.
    ///
    /// `0` retries immediately.
    ///
    /// Environment variable: `BACKOFF_INITIAL_MS`
    #[arg(long, env = "BACKOFF_INITIAL_MS", default_value_t = 0)]
    pub backoff_initial_ms: u64,

    /// Upper bound of the backoff, in milliseconds.
    ///
    /// Environment variable: `BACKOFF_MAX_MS`
    #[arg(long, env = "BACKOFF_MAX_MS", default_value_t = 100)]
    pub backoff_max_ms: u64,
}

#[derive(Debug, Clone)]
pub struct SimConfig {
    pub allocators: usize,
    pub ids_per_allocator: usize,
    pub block_size: i64,
    pub max_producer_id: ProducerId,
    pub seed_block_end: Option<ProducerId>,
    /// `None` retries immediately.
    pub backoff: Option<(Duration, Duration)>,
}

impl SimConfig {
    pub fn allocator_config(&self, owner_id: i32) -> AllocatorConfig {
        AllocatorConfig::new(owner_id)
            .with_block_size(self.block_size)
            .with_max_producer_id(self.max_producer_id)
    }
}

impl TryFrom<CliArgs> for SimConfig {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        let allocators = args.allocators.unwrap_or_else(num_cpus::get);
        if allocators == 0 {
            bail!("ALLOCATORS must be greater than 0");
        }
        if i32::try_from(allocators).is_err() {
            bail!("ALLOCATORS ({allocators}) exceeds the owner id range");
        }

        AllocatorConfig::new(0)
            .with_block_size(args.block_size)
            .with_max_producer_id(args.max_producer_id)
            .validate()?;

        if let Some(end) = args.seed_block_end {
            if end < 0 || end >= args.max_producer_id {
                bail!(
                    "SEED_BLOCK_END ({end}) must lie in [0, MAX_PRODUCER_ID = {})",
                    args.max_producer_id
                );
            }
        }

        let backoff = if args.backoff_initial_ms == 0 {
            None
        } else {
            if args.backoff_max_ms < args.backoff_initial_ms {
                bail!(
                    "BACKOFF_MAX_MS ({}) must not be below BACKOFF_INITIAL_MS ({})",
                    args.backoff_max_ms,
                    args.backoff_initial_ms
                );
            }
            Some((
                Duration::from_millis(args.backoff_initial_ms),
                Duration::from_millis(args.backoff_max_ms),
            ))
        };

        Ok(Self {
            allocators,
            ids_per_allocator: args.ids_per_allocator,
            block_size: args.block_size,
            max_producer_id: args.max_producer_id,
            seed_block_end: args.seed_block_end,
            backoff,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> anyhow::Result<SimConfig> {
        let args = CliArgs::try_parse_from(["pidblock-sim"].iter().chain(args))?;
        SimConfig::try_from(args)
    }

    #[test]
    fn defaults_are_valid() {
        let config = parse(&["--allocators", "4"]).unwrap();
        assert_eq!(config.allocators, 4);
        assert_eq!(config.block_size, DEFAULT_BLOCK_SIZE);
        assert_eq!(config.max_producer_id, i64::MAX);
        assert!(config.backoff.is_none());
    }

    #[test]
    fn rejects_zero_allocators() {
        assert!(parse(&["--allocators", "0"]).is_err());
    }

    #[test]
    fn rejects_invalid_block_size() {
        assert!(parse(&["--allocators", "1", "--block-size", "0"]).is_err());
    }

    #[test]
    fn rejects_seed_past_ceiling() {
        assert!(
            parse(&[
                "--allocators",
                "1",
                "--max-producer-id",
                "5000",
                "--seed-block-end",
                "5000"
            ])
            .is_err()
        );
    }

    #[test]
    fn backoff_bounds_are_checked() {
        assert!(
            parse(&[
                "--allocators",
                "1",
                "--backoff-initial-ms",
                "50",
                "--backoff-max-ms",
                "10"
            ])
            .is_err()
        );
        let config = parse(&["--allocators", "1", "--backoff-initial-ms", "5"]).unwrap();
        assert_eq!(
            config.backoff,
            Some((Duration::from_millis(5), Duration::from_millis(100)))
        );
    }
}
