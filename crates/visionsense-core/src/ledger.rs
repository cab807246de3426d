//! Bounded, most-recent-first record of completed predictions.
//!
//! Backed by a fixed arena of slots with a write cursor. One lock covers
//! eviction and insertion together; readers take the shared side and copy
//! out a snapshot.

use std::sync::{PoisonError, RwLock};

use tracing::trace;

use crate::prediction::LedgerEntry;

pub struct Ledger {
    ring: RwLock<Ring>,
}

struct Ring {
    slots: Vec<Option<LedgerEntry>>,
    /// Slot the next entry is written to.
    cursor: usize,
    len: usize,
}

impl Ring {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: (0..capacity).map(|_| None).collect(),
            cursor: 0,
            len: 0,
        }
    }

    fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Write at the cursor, returning whatever was evicted.
    fn push(&mut self, entry: LedgerEntry) -> Option<LedgerEntry> {
        let evicted = self.slots[self.cursor].replace(entry);
        self.cursor = (self.cursor + 1) % self.capacity();
        if self.len < self.capacity() {
            self.len += 1;
        }
        evicted
    }

    fn newest_first(&self, limit: usize) -> Vec<LedgerEntry> {
        let cap = self.capacity();
        (0..limit.min(self.len))
            .filter_map(|i| self.slots[(self.cursor + cap - 1 - i) % cap].clone())
            .collect()
    }
}

impl Ledger {
    /// A ledger holding at most `capacity` entries (at least one).
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            ring: RwLock::new(Ring::with_capacity(capacity.max(1))),
        }
    }

    /// Insert at the front, evicting the oldest entry when full.
    pub fn record(&self, entry: LedgerEntry) {
        let mut ring = self.ring.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(old) = ring.push(entry) {
            trace!(timestamp = %old.timestamp, "evicted oldest ledger entry");
        }
    }

    /// Up to `limit` entries, newest first.
    pub fn recent(&self, limit: usize) -> Vec<LedgerEntry> {
        self.ring
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .newest_first(limit)
    }

    pub fn len(&self) -> usize {
        self.ring.read().unwrap_or_else(PoisonError::into_inner).len
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.ring
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .capacity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prediction::{Prediction, PredictionResult};

    fn entry(n: usize) -> LedgerEntry {
        let result = PredictionResult::new(vec![Prediction {
            label: format!("label_{n}"),
            confidence: 0.5,
        }])
        .unwrap();
        LedgerEntry::new(Some(format!("img_{n}.png")), &result)
    }

    fn names(entries: &[LedgerEntry]) -> Vec<String> {
        entries
            .iter()
            .map(|e| e.filename.clone().unwrap_or_default())
            .collect()
    }

    #[test]
    fn empty_ledger_returns_nothing() {
        let ledger = Ledger::with_capacity(3);
        assert!(ledger.is_empty());
        assert!(ledger.recent(10).is_empty());
    }

    #[test]
    fn newest_first_before_full() {
        let ledger = Ledger::with_capacity(5);
        for n in 0..3 {
            ledger.record(entry(n));
        }
        assert_eq!(ledger.len(), 3);
        assert_eq!(
            names(&ledger.recent(5)),
            vec!["img_2.png", "img_1.png", "img_0.png"]
        );
    }

    #[test]
    fn oldest_evicted_past_capacity() {
        let ledger = Ledger::with_capacity(3);
        for n in 0..4 {
            ledger.record(entry(n));
        }
        assert_eq!(ledger.len(), 3);
        assert_eq!(
            names(&ledger.recent(3)),
            vec!["img_3.png", "img_2.png", "img_1.png"]
        );
    }

    #[test]
    fn eviction_wraps_many_times() {
        let ledger = Ledger::with_capacity(4);
        for n in 0..23 {
            ledger.record(entry(n));
        }
        assert_eq!(
            names(&ledger.recent(4)),
            vec!["img_22.png", "img_21.png", "img_20.png", "img_19.png"]
        );
    }

    #[test]
    fn limit_is_clamped() {
        let ledger = Ledger::with_capacity(5);
        for n in 0..2 {
            ledger.record(entry(n));
        }
        assert!(ledger.recent(0).is_empty());
        assert_eq!(ledger.recent(1).len(), 1);
        assert_eq!(ledger.recent(100).len(), 2);
    }

    #[test]
    fn zero_capacity_becomes_one() {
        let ledger = Ledger::with_capacity(0);
        assert_eq!(ledger.capacity(), 1);
        ledger.record(entry(0));
        ledger.record(entry(1));
        assert_eq!(names(&ledger.recent(5)), vec!["img_1.png"]);
    }

    #[test]
    fn concurrent_records_keep_capacity() {
        let ledger = Ledger::with_capacity(16);
        std::thread::scope(|s| {
            for t in 0..8 {
                let ledger = &ledger;
                s.spawn(move || {
                    for n in 0..50 {
                        ledger.record(entry(t * 1000 + n));
                        let _ = ledger.recent(4);
                    }
                });
            }
        });
        assert_eq!(ledger.len(), 16);
        let recent = ledger.recent(16);
        assert_eq!(recent.len(), 16);
        let mut seen = names(&recent);
        seen.sort();
        seen.dedup();
        assert_eq!(seen.len(), 16, "no slot may be duplicated");
    }
}
