use std::fmt;
use std::sync::{Mutex, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Sub-microsecond slots per microsecond of wall-clock time.
const SLOTS_PER_MICRO: u64 = 1000;

/// Position of an event in the ledger's total order.
///
/// The value is `wall_clock_us * 1000 + offset`, so it reads as a timestamp
/// while leaving room for a random sub-microsecond offset. Ordering is plain
/// integer ordering.
#[derive(
    Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Sequence(pub u64);

impl Sequence {
    /// Sentinel below every assigned sequence; the "from the beginning" cursor.
    pub const GENESIS: Sequence = Sequence(0);

    /// Wall-clock microseconds this sequence was derived from.
    pub fn micros(&self) -> u64 {
        self.0 / SLOTS_PER_MICRO
    }
}

impl fmt::Debug for Sequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Sequence({})", self.0)
    }
}

impl fmt::Display for Sequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for Sequence {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

/// Sequence generator combining wall-clock time with a monotonic floor.
///
/// Each tick proposes `now_us * 1000 + jitter` with `jitter` drawn from
/// `[0, 1000)`, then clamps it to be strictly greater than the last value
/// handed out. Consecutive ticks are therefore strictly increasing even when
/// the wall clock stalls or steps backwards.
///
/// The clock alone does not make sequences unique across processes; stores
/// call it inside their exclusive write section and seed the floor with the
/// highest sequence already on disk via [`SequenceClock::observe`].
pub struct SequenceClock {
    last: Mutex<u64>,
}

impl SequenceClock {
    pub fn new() -> Self {
        Self {
            last: Mutex::new(0),
        }
    }

    /// Generate the next sequence, strictly greater than any previous one.
    pub fn tick(&self) -> Sequence {
        let jitter = rand::thread_rng().gen_range(0..SLOTS_PER_MICRO);
        let candidate = Self::wall_clock_us()
            .saturating_mul(SLOTS_PER_MICRO)
            .saturating_add(jitter);

        let mut last = self.last.lock().unwrap_or_else(PoisonError::into_inner);
        let next = candidate.max(last.saturating_add(1));
        *last = next;
        Sequence(next)
    }

    /// Generate `count` strictly increasing sequences for one batch.
    pub fn tick_batch(&self, count: usize) -> Vec<Sequence> {
        (0..count).map(|_| self.tick()).collect()
    }

    /// Raise the floor so later ticks are strictly greater than `seen`.
    pub fn observe(&self, seen: Sequence) {
        let mut last = self.last.lock().unwrap_or_else(PoisonError::into_inner);
        if seen.0 > *last {
            *last = seen.0;
        }
    }

    /// Last sequence handed out or observed.
    pub fn last(&self) -> Sequence {
        Sequence(*self.last.lock().unwrap_or_else(PoisonError::into_inner))
    }

    fn wall_clock_us() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_micros() as u64
    }
}

impl Default for SequenceClock {
    fn default() -> Self {
        Self::new()
    }
}
