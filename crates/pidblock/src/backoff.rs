use core::time::Duration;

use rand::Rng;

/// Decides how long to wait before re-reading the lease record after a lost
/// conditional write.
///
/// Acquisition retries conflicts without limit, so a backoff only shapes
/// latency: it can never make acquisition give up. Tests plug in their own
/// implementation to count conflicts without real delays.
///
/// # Example
///
/// ```
/// use core::sync::atomic::{AtomicU32, Ordering};
/// use pidblock::Backoff;
///
/// #[derive(Default)]
/// struct CountingBackoff(AtomicU32);
///
/// impl Backoff for CountingBackoff {
///     fn pause(&self, _attempt: u32) {
///         self.0.fetch_add(1, Ordering::Relaxed);
///     }
/// }
///
/// let backoff = CountingBackoff::default();
/// backoff.pause(1);
/// assert_eq!(backoff.0.load(Ordering::Relaxed), 1);
/// ```
pub trait Backoff {
    /// Called after the `attempt`-th conflict (starting at 1) of a single
    /// acquisition.
    fn pause(&self, attempt: u32);
}

impl<B: Backoff + ?Sized> Backoff for &B {
    fn pause(&self, attempt: u32) {
        (**self).pause(attempt);
    }
}

/// Retries immediately.
///
/// Conflicts are bounded by the number of coordinators racing for the same
/// record and a retry is one read plus one write, so this is the default.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoBackoff;

impl Backoff for NoBackoff {
    fn pause(&self, _attempt: u32) {
        core::hint::spin_loop();
    }
}

/// Sleeps for an exponentially growing, jittered delay.
///
/// The base delay doubles with every attempt starting from `initial` and is
/// capped at `max`; up to half of it is added again as random jitter so that
/// coordinators which lost the same race do not retry in lockstep.
#[derive(Debug, Clone, Copy)]
pub struct ExponentialBackoff {
    initial: Duration,
    max: Duration,
}

impl ExponentialBackoff {
    pub const fn new(initial: Duration, max: Duration) -> Self {
        Self { initial, max }
    }

    /// The delay before jitter for a given attempt.
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let factor = 1u32
            .checked_shl(attempt.saturating_sub(1))
            .unwrap_or(u32::MAX);
        self.initial.saturating_mul(factor).min(self.max)
    }

    /// The jittered delay for a given attempt, within `[base, 1.5 * base]`.
    pub fn delay(&self, attempt: u32) -> Duration {
        let base = self.base_delay(attempt);
        let half = u64::try_from(base.as_micros() / 2).unwrap_or(u64::MAX);
        let jitter = Duration::from_micros(rand::rng().random_range(0..=half));
        base.saturating_add(jitter)
    }
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self::new(Duration::from_millis(10), Duration::from_secs(1))
    }
}

impl Backoff for ExponentialBackoff {
    fn pause(&self, attempt: u32) {
        std::thread::sleep(self.delay(attempt));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_delay_doubles_until_capped() {
        let backoff = ExponentialBackoff::new(Duration::from_millis(10), Duration::from_millis(70));
        assert_eq!(backoff.base_delay(1), Duration::from_millis(10));
        assert_eq!(backoff.base_delay(2), Duration::from_millis(20));
        assert_eq!(backoff.base_delay(3), Duration::from_millis(40));
        assert_eq!(backoff.base_delay(4), Duration::from_millis(70));
        assert_eq!(backoff.base_delay(u32::MAX), Duration::from_millis(70));
    }

    #[test]
    fn jittered_delay_stays_within_half_of_base() {
        let backoff = ExponentialBackoff::new(Duration::from_millis(2), Duration::from_millis(8));
        for attempt in 1..=5 {
            let base = backoff.base_delay(attempt);
            for _ in 0..200 {
                let delay = backoff.delay(attempt);
                assert!(delay >= base, "{delay:?} below {base:?}");
                assert!(delay <= base + base / 2, "{delay:?} above 1.5 * {base:?}");
            }
        }
    }

    #[test]
    fn pause_sleeps_at_least_the_base_delay() {
        let backoff = ExponentialBackoff::new(Duration::from_millis(2), Duration::from_millis(4));
        for attempt in 1..=3 {
            let started = std::time::Instant::now();
            backoff.pause(attempt);
            assert!(started.elapsed() >= backoff.base_delay(attempt));
        }
    }

    #[test]
    fn zero_initial_delay_never_sleeps() {
        let backoff = ExponentialBackoff::new(Duration::ZERO, Duration::from_secs(1));
        assert_eq!(backoff.base_delay(10), Duration::ZERO);
        backoff.pause(10);
    }
}
