//! The cluster's shared notion of "current height", recomputed on a tick
//! from every worker's last reported block. A block only becomes consensus
//! once a supermajority of reporting workers agree it (or something newer)
//! is the tip; a lone straggler can never drag consensus backwards.

use std::sync::atomic::{AtomicI64, Ordering};

use chrono::Utc;
use gateway_common::model::{ConsensusBlock, WorkerInfo};

const SUPERMAJORITY_PCT: i64 = 60;
const MAX_LAG: i64 = 3;

/// Computes the next consensus seqno from a set of worker last-blocks, given
/// the current seqno the cluster already agreed on. Returns `None` when no
/// candidate clears the supermajority bar, in which case the caller should
/// leave the previous consensus value untouched.
///
/// Workers reporting `-1` (not yet synced) are excluded from the tally
/// entirely. Among the rest, `best` is the highest reported block; `strat[k]`
/// counts how many workers are within `k` blocks of `best`. The smallest `k`
/// whose cumulative share reaches 60% of reporting workers determines the
/// candidate, capped by `MAX_LAG`.
pub fn compute_candidate(last_blocks: &[i64]) -> Option<i64> {
    let known: Vec<i64> = last_blocks.iter().copied().filter(|&v| v != -1 && v != 0).collect();
    let total_suitable = known.len() as i64;
    if total_suitable == 0 {
        return None;
    }
    let best = known.iter().copied().max().unwrap_or(0);

    let mut cumulative = 0i64;
    for k in 0..=MAX_LAG {
        let count = known.iter().filter(|&&v| v == best - k).count() as i64;
        cumulative += count;
        if cumulative * 100 >= total_suitable * SUPERMAJORITY_PCT {
            return Some(best - k);
        }
    }
    None
}

/// Owns the cluster's current consensus block and recomputes it on each
/// tick, shared between the dispatcher (reads) and the background ticker
/// task (writes).
pub struct ConsensusTracker {
    seqno: AtomicI64,
}

impl ConsensusTracker {
    pub fn new() -> Self {
        ConsensusTracker { seqno: AtomicI64::new(ConsensusBlock::genesis().seqno) }
    }

    pub fn current(&self) -> i64 {
        self.seqno.load(Ordering::SeqCst)
    }

    /// Recomputes consensus from the given worker snapshots and, if a higher
    /// candidate clears the supermajority bar, publishes it. Consensus never
    /// moves backwards. Returns the current (possibly unchanged) value.
    pub fn recompute(&self, workers: &[WorkerInfo]) -> i64 {
        let last_blocks: Vec<i64> = workers.iter().map(|w| w.last_block).collect();
        if let Some(candidate) = compute_candidate(&last_blocks) {
            let current = self.seqno.load(Ordering::SeqCst);
            if candidate > current {
                self.seqno.store(candidate, Ordering::SeqCst);
            }
        }
        self.seqno.load(Ordering::SeqCst)
    }

    pub fn snapshot(&self) -> ConsensusBlock {
        ConsensusBlock {
            seqno: self.current(),
            timestamp_unix_ms: Utc::now().timestamp_millis(),
        }
    }
}

impl Default for ConsensusTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// Whether a worker reporting `last_block` should be considered caught up
/// with `consensus_seqno` and therefore eligible to serve traffic.
pub fn is_working(last_block: i64, consensus_seqno: i64) -> bool {
    last_block >= consensus_seqno
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn five_worker_scenario_settles_on_minority_lag() {
        // Matches the canonical boundary case: 2/4 known workers report the
        // tip, which alone is only 50%; pulling in the next block down
        // crosses the 60% supermajority bar at 75%.
        let candidate = compute_candidate(&[100, 100, 99, 98, 0]);
        assert_eq!(candidate, Some(99));
    }

    #[test]
    fn all_unknown_yields_no_candidate() {
        assert_eq!(compute_candidate(&[-1, -1, -1, -1, -1]), None);
    }

    #[test]
    fn single_known_worker_is_its_own_consensus() {
        assert_eq!(compute_candidate(&[-1, -1, 12345, -1]), Some(12345));
    }

    #[test]
    fn tracker_never_moves_backwards() {
        let tracker = ConsensusTracker::new();
        tracker.seqno.store(500, Ordering::SeqCst);
        let workers = vec![
            WorkerInfo { last_block: 10, ..WorkerInfo::new_unknown(0) },
            WorkerInfo { last_block: 10, ..WorkerInfo::new_unknown(1) },
        ];
        assert_eq!(tracker.recompute(&workers), 500);
    }

    #[test]
    fn tracker_advances_once_threshold_is_met() {
        let tracker = ConsensusTracker::new();
        let workers = vec![
            WorkerInfo { last_block: 42, ..WorkerInfo::new_unknown(0) },
            WorkerInfo { last_block: 42, ..WorkerInfo::new_unknown(1) },
        ];
        assert_eq!(tracker.recompute(&workers), 42);
    }

    #[test]
    fn working_flag_requires_caught_up() {
        assert!(is_working(100, 99));
        assert!(is_working(100, 100));
        assert!(!is_working(98, 99));
        assert!(!is_working(-1, 0));
    }
}
