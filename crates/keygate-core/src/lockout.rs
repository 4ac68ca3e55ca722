//! Per-client brute-force lockout over a sliding window of failures.
//!
//! Each client key owns a list of failure timestamps. Entries older than the
//! block window are pruned whenever the key is read or written, which alone
//! keeps every decision correct. [`LockoutTracker::sweep`] only bounds memory
//! for keys that are never touched again, and may run on any schedule or not
//! at all.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;

use crate::clock::Clock;
use crate::config::LockoutConfig;

/// Outcome of a lockout check. Computed fresh each time, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockoutDecision {
    pub is_locked: bool,
    pub remaining_secs: u64,
}

impl LockoutDecision {
    pub const OPEN: Self = Self {
        is_locked: false,
        remaining_secs: 0,
    };

    fn locked(remaining_secs: u64) -> Self {
        Self {
            is_locked: true,
            remaining_secs,
        }
    }
}

/// Shared failure windows keyed by client.
///
/// Read-modify-write on one key happens under that key's shard lock, so
/// concurrent failures for the same client are never lost.
pub struct LockoutTracker {
    windows: DashMap<String, Vec<u64>>,
    max_attempts: usize,
    block_window: u64,
    cleanup_interval: u64,
    last_sweep: AtomicU64,
    clock: Arc<dyn Clock>,
}

fn prune(window: &mut Vec<u64>, now: u64, block_window: u64) {
    window.retain(|&at| now.saturating_sub(at) < block_window);
}

impl LockoutTracker {
    pub fn new(config: &LockoutConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            windows: DashMap::new(),
            max_attempts: config.max_attempts,
            block_window: config.block_window_secs,
            cleanup_interval: config.cleanup_interval_secs,
            last_sweep: AtomicU64::new(clock.now_secs()),
            clock,
        }
    }

    pub fn max_attempts(&self) -> usize {
        self.max_attempts
    }

    /// Whether `key` is locked out right now, and for how long.
    ///
    /// The remaining time counts from the newest retained failure, so a
    /// locked client that keeps hammering stays locked for a full window
    /// after its last recorded failure.
    pub fn is_blocked(&self, key: &str) -> LockoutDecision {
        let now = self.clock.now_secs();
        self.maybe_sweep(now);

        let decision = {
            let Some(mut window) = self.windows.get_mut(key) else {
                return LockoutDecision::OPEN;
            };
            prune(&mut window, now, self.block_window);

            match window.last() {
                Some(&newest) if window.len() >= self.max_attempts => {
                    let elapsed = now.saturating_sub(newest);
                    LockoutDecision::locked(self.block_window.saturating_sub(elapsed))
                }
                _ => LockoutDecision::OPEN,
            }
        };

        // The shard guard is released above; removing under it would deadlock.
        self.windows.remove_if(key, |_, window| window.is_empty());
        decision
    }

    /// Records a failed attempt for `key` and returns the number of failures
    /// now inside the window.
    pub fn record_failure(&self, key: &str) -> usize {
        let now = self.clock.now_secs();
        let count = {
            let mut window = self.windows.entry(key.to_owned()).or_default();
            prune(&mut window, now, self.block_window);
            window.push(now);
            window.len()
        };

        if count >= self.max_attempts {
            tracing::warn!(client_key = key, failures = count, "lockout threshold reached");
        } else {
            tracing::debug!(client_key = key, failures = count, "failed attempt recorded");
        }
        count
    }

    /// Forgets every failure for `key`. No-op when nothing is tracked.
    pub fn clear_attempts(&self, key: &str) {
        if self.windows.remove(key).is_some() {
            tracing::debug!(client_key = key, "failed attempts cleared");
        }
    }

    /// Number of failures for `key` still inside the window.
    pub fn failure_count(&self, key: &str) -> usize {
        let now = self.clock.now_secs();
        self.windows.get(key).map_or(0, |window| {
            window
                .iter()
                .filter(|&&at| now.saturating_sub(at) < self.block_window)
                .count()
        })
    }

    /// Number of client keys currently holding a window.
    pub fn tracked_keys(&self) -> usize {
        self.windows.len()
    }

    /// Prunes every window and drops the ones left empty. Returns how many
    /// keys were dropped.
    pub fn sweep(&self) -> usize {
        let now = self.clock.now_secs();
        self.last_sweep.store(now, Ordering::Relaxed);
        self.sweep_at(now)
    }

    fn sweep_at(&self, now: u64) -> usize {
        let block_window = self.block_window;
        let mut dropped = 0;
        self.windows.retain(|_, window| {
            prune(window, now, block_window);
            let keep = !window.is_empty();
            if !keep {
                dropped += 1;
            }
            keep
        });
        if dropped > 0 {
            tracing::debug!(dropped, remaining = self.windows.len(), "lockout sweep");
        }
        dropped
    }

    fn maybe_sweep(&self, now: u64) {
        let last = self.last_sweep.load(Ordering::Relaxed);
        if now.saturating_sub(last) <= self.cleanup_interval {
            return;
        }
        // Only the caller that wins the swap sweeps.
        if self
            .last_sweep
            .compare_exchange(last, now, Ordering::AcqRel, Ordering::Relaxed)
            .is_ok()
        {
            self.sweep_at(now);
        }
    }

    /// Runs [`sweep`](Self::sweep) every `every` on the current tokio runtime.
    pub fn spawn_sweeper(self: Arc<Self>, every: Duration) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            loop {
                interval.tick().await;
                self.sweep();
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    const T0: u64 = 1_000_000;

    fn tracker_with(max_attempts: usize, cleanup_interval_secs: u64) -> (LockoutTracker, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(T0));
        let config = LockoutConfig {
            max_attempts,
            block_window_secs: 1800,
            cleanup_interval_secs,
        };
        (LockoutTracker::new(&config, clock.clone()), clock)
    }

    fn tracker() -> (LockoutTracker, Arc<ManualClock>) {
        tracker_with(3, 300)
    }

    #[test]
    fn unknown_key_is_open() {
        let (tracker, _) = tracker();
        assert_eq!(tracker.is_blocked("1.2.3.4"), LockoutDecision::OPEN);
        assert_eq!(tracker.tracked_keys(), 0);
    }

    #[test]
    fn below_threshold_is_open() {
        let (tracker, _) = tracker();
        tracker.record_failure("1.2.3.4");
        tracker.record_failure("1.2.3.4");
        assert!(!tracker.is_blocked("1.2.3.4").is_locked);
    }

    #[test]
    fn lockout_scenario_counts_from_newest_failure() {
        let (tracker, clock) = tracker();
        let key = "1.2.3.4";

        tracker.record_failure(key);
        clock.advance(4);
        tracker.record_failure(key);
        clock.advance(4);
        assert_eq!(tracker.record_failure(key), 3);
        clock.advance(2);

        let decision = tracker.is_blocked(key);
        assert!(decision.is_locked);
        assert_eq!(decision.remaining_secs, 1798);

        // A fourth failure five seconds after the third restarts the count.
        clock.set(T0 + 13);
        assert_eq!(tracker.record_failure(key), 4);
        let decision = tracker.is_blocked(key);
        assert!(decision.is_locked);
        assert_eq!(decision.remaining_secs, 1800);

        // The oldest failure has aged out; three remain.
        clock.set(T0 + 1800);
        assert_eq!(tracker.is_blocked(key), LockoutDecision::locked(13));

        clock.set(T0 + 13 + 1800);
        assert_eq!(tracker.is_blocked(key), LockoutDecision::OPEN);
        assert_eq!(tracker.tracked_keys(), 0);
    }

    #[test]
    fn lockout_expires_after_window() {
        let (tracker, clock) = tracker();
        for _ in 0..3 {
            tracker.record_failure("k");
        }
        assert!(tracker.is_blocked("k").is_locked);

        clock.advance(1800);
        assert_eq!(tracker.is_blocked("k"), LockoutDecision::OPEN);
    }

    #[test]
    fn window_slides_instead_of_bucketing() {
        let (tracker, clock) = tracker();
        tracker.record_failure("k");
        clock.advance(1000);
        tracker.record_failure("k");
        clock.advance(900);
        tracker.record_failure("k");

        // The first failure is 1900s old and no longer counts.
        assert_eq!(tracker.failure_count("k"), 2);
        assert!(!tracker.is_blocked("k").is_locked);
    }

    #[test]
    fn clear_unlocks_regardless_of_count() {
        let (tracker, _) = tracker();
        for _ in 0..10 {
            tracker.record_failure("k");
        }
        assert!(tracker.is_blocked("k").is_locked);

        tracker.clear_attempts("k");
        assert_eq!(tracker.is_blocked("k"), LockoutDecision::OPEN);
        assert_eq!(tracker.failure_count("k"), 0);

        tracker.clear_attempts("k");
        tracker.clear_attempts("never-seen");
    }

    #[test]
    fn keys_are_independent() {
        let (tracker, _) = tracker();
        for _ in 0..3 {
            tracker.record_failure("a");
        }
        assert!(tracker.is_blocked("a").is_locked);
        assert!(!tracker.is_blocked("b").is_locked);
    }

    #[test]
    fn sweep_drops_only_expired_windows() {
        let (tracker, clock) = tracker();
        tracker.record_failure("old");
        clock.advance(1000);
        tracker.record_failure("mixed");
        clock.advance(900);
        tracker.record_failure("mixed");
        tracker.record_failure("fresh");

        assert_eq!(tracker.sweep(), 1);
        assert_eq!(tracker.tracked_keys(), 2);
        assert_eq!(tracker.failure_count("mixed"), 2);
    }

    #[test]
    fn check_sweeps_when_interval_elapsed() {
        let (tracker, clock) = tracker();
        tracker.record_failure("a");
        tracker.record_failure("b");
        clock.advance(2000);

        tracker.is_blocked("unrelated");
        assert_eq!(tracker.tracked_keys(), 0);
    }

    #[test]
    fn decisions_do_not_depend_on_sweeping() {
        let (lazy, lazy_clock) = tracker_with(3, u64::MAX);
        let (eager, eager_clock) = tracker_with(3, 0);

        for step in [0, 5, 5, 1795, 3, 1800] {
            lazy_clock.advance(step);
            eager_clock.advance(step);
            lazy.record_failure("k");
            eager.record_failure("k");
            assert_eq!(lazy.is_blocked("k"), eager.is_blocked("k"));
        }
    }

    #[test]
    fn concurrent_failures_are_not_lost() {
        let (tracker, _) = tracker_with(usize::MAX, 300);
        let threads = 16;
        let per_thread = 25;

        std::thread::scope(|s| {
            for _ in 0..threads {
                s.spawn(|| {
                    for _ in 0..per_thread {
                        tracker.record_failure("shared");
                    }
                });
            }
        });

        assert_eq!(tracker.failure_count("shared"), threads * per_thread);
    }

    #[test]
    fn sweep_concurrent_with_failures_keeps_live_entries() {
        let (tracker, _) = tracker_with(usize::MAX, 300);

        std::thread::scope(|s| {
            s.spawn(|| {
                for _ in 0..200 {
                    tracker.record_failure("busy");
                }
            });
            s.spawn(|| {
                for _ in 0..50 {
                    tracker.sweep();
                }
            });
        });

        assert_eq!(tracker.failure_count("busy"), 200);
    }

    #[tokio::test]
    async fn background_sweeper_reclaims_expired_keys() {
        let (tracker, clock) = tracker_with(3, u64::MAX);
        let tracker = Arc::new(tracker);
        tracker.record_failure("gone");
        clock.advance(1800);

        let handle = tracker.clone().spawn_sweeper(Duration::from_millis(5));
        tokio::time::sleep(Duration::from_millis(50)).await;
        handle.abort();

        assert_eq!(tracker.tracked_keys(), 0);
    }
}
