use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counters collected during a blocking run
#[derive(Default)]
pub struct BlockingStats {
    pub records_processed: AtomicU64,
    pub keys_generated: AtomicU64,
    pub blocks_built: AtomicU64,
    pub oversized_blocks_skipped: AtomicU64,
    pub pairs_emitted: AtomicU64,
    pub duplicate_pairs_suppressed: AtomicU64,
    pub missing_ids: AtomicU64,
}

/// Plain copy of [`BlockingStats`] for reporting
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub records_processed: u64,
    pub keys_generated: u64,
    pub blocks_built: u64,
    pub oversized_blocks_skipped: u64,
    pub pairs_emitted: u64,
    pub duplicate_pairs_suppressed: u64,
    pub missing_ids: u64,
}

impl BlockingStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc_records(&self) {
        self.records_processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_keys(&self, count: u64) {
        self.keys_generated.fetch_add(count, Ordering::Relaxed);
    }

    pub fn add_blocks(&self, count: u64) {
        self.blocks_built.fetch_add(count, Ordering::Relaxed);
    }

    pub fn inc_oversized(&self) {
        self.oversized_blocks_skipped
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_pairs(&self) {
        self.pairs_emitted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_pairs(&self, count: u64) {
        self.pairs_emitted.fetch_add(count, Ordering::Relaxed);
    }

    pub fn add_duplicates(&self, count: u64) {
        self.duplicate_pairs_suppressed
            .fetch_add(count, Ordering::Relaxed);
    }

    pub fn inc_missing_ids(&self) {
        self.missing_ids.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_missing_ids(&self, count: u64) {
        self.missing_ids.fetch_add(count, Ordering::Relaxed);
    }

    pub fn records(&self) -> u64 {
        self.records_processed.load(Ordering::Relaxed)
    }

    pub fn keys(&self) -> u64 {
        self.keys_generated.load(Ordering::Relaxed)
    }

    pub fn blocks(&self) -> u64 {
        self.blocks_built.load(Ordering::Relaxed)
    }

    pub fn oversized(&self) -> u64 {
        self.oversized_blocks_skipped.load(Ordering::Relaxed)
    }

    pub fn pairs(&self) -> u64 {
        self.pairs_emitted.load(Ordering::Relaxed)
    }

    pub fn duplicates(&self) -> u64 {
        self.duplicate_pairs_suppressed.load(Ordering::Relaxed)
    }

    pub fn missing(&self) -> u64 {
        self.missing_ids.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            records_processed: self.records(),
            keys_generated: self.keys(),
            blocks_built: self.blocks(),
            oversized_blocks_skipped: self.oversized(),
            pairs_emitted: self.pairs(),
            duplicate_pairs_suppressed: self.duplicates(),
            missing_ids: self.missing(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rayon::prelude::*;

    #[test]
    fn default_values_are_zero() {
        let stats = BlockingStats::new();
        assert_eq!(stats.snapshot(), StatsSnapshot::default());
    }

    #[test]
    fn snapshot_captures_state() {
        let stats = BlockingStats::new();
        stats.inc_records();
        stats.inc_records();
        stats.add_keys(12);
        stats.add_blocks(4);
        stats.inc_oversized();
        stats.inc_pairs();
        stats.add_duplicates(3);
        stats.inc_missing_ids();

        let snap = stats.snapshot();
        assert_eq!(snap.records_processed, 2);
        assert_eq!(snap.keys_generated, 12);
        assert_eq!(snap.blocks_built, 4);
        assert_eq!(snap.oversized_blocks_skipped, 1);
        assert_eq!(snap.pairs_emitted, 1);
        assert_eq!(snap.duplicate_pairs_suppressed, 3);
        assert_eq!(snap.missing_ids, 1);
    }

    #[test]
    fn add_keys_accumulates() {
        let stats = BlockingStats::new();
        stats.add_keys(5);
        stats.add_keys(3);
        assert_eq!(stats.keys(), 8);
    }

    #[test]
    fn concurrent_increments() {
        let stats = BlockingStats::new();
        (0..1000).into_par_iter().for_each(|_| {
            stats.inc_records();
            stats.add_keys(2);
        });
        assert_eq!(stats.records(), 1000);
        assert_eq!(stats.keys(), 2000);
    }
}
