//! Candidate-pair extraction over blocks.
//!
//! Every block with at least two members contributes all of its unordered
//! pairs. A pair of ids is emitted the first time it is seen, no matter how
//! many blocks the two records share, so output order follows first-seen
//! block order.

use crate::blocks::{create_blocks_with, par_create_blocks, Block, BlockMap};
use crate::config::{DEFAULT_ID_FIELD, LARGE_BLOCK_WARN_THRESHOLD, MISSING_ID};
use crate::models::{BlockingKeyConfig, CandidatePair, Record};
use crate::stats::BlockingStats;
use rayon::prelude::*;
use rustc_hash::{FxHashMap, FxHashSet};
use std::borrow::Cow;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct PairOptions {
    pub id_field: String,
    /// Blocks with more members than this are skipped entirely. `None`
    /// keeps every block and with it full recall.
    pub max_block_size: Option<usize>,
}

impl Default for PairOptions {
    fn default() -> Self {
        Self {
            id_field: DEFAULT_ID_FIELD.to_string(),
            max_block_size: None,
        }
    }
}

impl PairOptions {
    pub fn with_id_field(mut self, id_field: impl Into<String>) -> Self {
        self.id_field = id_field.into();
        self
    }

    pub fn with_max_block_size(mut self, max: usize) -> Self {
        self.max_block_size = Some(max);
        self
    }
}

/// Canonical `low:high` key of an unordered id pair.
pub fn pair_key(a: &str, b: &str) -> String {
    let (low, high) = if a <= b { (a, b) } else { (b, a) };
    let mut key = String::with_capacity(low.len() + high.len() + 1);
    key.push_str(low);
    key.push(':');
    key.push_str(high);
    key
}

/// Maps every row to a dense number per distinct id, so pair dedup works on
/// integer tuples instead of formatted strings. Equal ids get equal numbers.
fn intern_ids(records: &[Record], id_field: &str, stats: &BlockingStats) -> Vec<usize> {
    let mut interned: FxHashMap<Cow<'_, str>, usize> = FxHashMap::default();
    records
        .iter()
        .enumerate()
        .map(|(row, record)| {
            let id = record.text(id_field).unwrap_or_else(|| {
                stats.inc_missing_ids();
                debug!(row, id_field, "Record has no id, using '{}'", MISSING_ID);
                Cow::Borrowed(MISSING_ID)
            });
            let next = interned.len();
            *interned.entry(id).or_insert(next)
        })
        .collect()
}

fn canonical(ids: &[usize], a: usize, b: usize) -> (usize, usize) {
    let (x, y) = (ids[a], ids[b]);
    if x <= y {
        (x, y)
    } else {
        (y, x)
    }
}

/// Whether a block takes part in pair extraction. Logs under-selective
/// blocks and applies the optional size cap.
pub(crate) fn admit_block(block: &Block<'_>, max_block_size: Option<usize>, stats: &BlockingStats) -> bool {
    let size = block.len();
    if size < 2 {
        return false;
    }
    if size > LARGE_BLOCK_WARN_THRESHOLD {
        warn!(
            block = block.key(),
            size,
            pairs = block.pair_count(),
            "Under-selective blocking key"
        );
    }
    match max_block_size {
        Some(cap) if size > cap => {
            warn!(block = block.key(), size, cap, "Skipping block above size cap");
            stats.inc_oversized();
            false
        }
        _ => true,
    }
}

/// Streams every candidate pair of `blocks` into `visit` without collecting.
pub fn for_each_pair_in_blocks<'a, F>(
    blocks: &BlockMap<'a>,
    options: &PairOptions,
    stats: &BlockingStats,
    mut visit: F,
) where
    F: FnMut(&'a Record, &'a Record),
{
    let records = blocks.records();
    let ids = intern_ids(records, &options.id_field, stats);
    let mut seen: FxHashSet<(usize, usize)> = FxHashSet::default();

    for block in blocks {
        if !admit_block(block, options.max_block_size, stats) {
            continue;
        }
        let rows = block.rows();
        let mut duplicates = 0u64;
        for (i, &a) in rows.iter().enumerate() {
            for &b in &rows[i + 1..] {
                if seen.insert(canonical(&ids, a, b)) {
                    stats.inc_pairs();
                    visit(&records[a], &records[b]);
                } else {
                    duplicates += 1;
                }
            }
        }
        stats.add_duplicates(duplicates);
    }

    info!(
        pairs = seen.len(),
        duplicates = stats.duplicates(),
        "Candidate pairs extracted"
    );
}

pub fn pairs_from_blocks<'a>(
    blocks: &BlockMap<'a>,
    options: &PairOptions,
    stats: &BlockingStats,
) -> Vec<CandidatePair<'a>> {
    let mut pairs = Vec::new();
    for_each_pair_in_blocks(blocks, options, stats, |left, right| {
        pairs.push(CandidatePair { left, right });
    });
    pairs
}

/// Builds blocks and streams candidate pairs into `visit`.
pub fn for_each_candidate_pair<'a, F>(
    records: &'a [Record],
    configs: &[BlockingKeyConfig],
    options: &PairOptions,
    stats: &BlockingStats,
    visit: F,
) where
    F: FnMut(&'a Record, &'a Record),
{
    let blocks = create_blocks_with(records, configs, stats);
    for_each_pair_in_blocks(&blocks, options, stats, visit);
}

pub fn candidate_pairs_with<'a>(
    records: &'a [Record],
    configs: &[BlockingKeyConfig],
    options: &PairOptions,
    stats: &BlockingStats,
) -> Vec<CandidatePair<'a>> {
    let blocks = create_blocks_with(records, configs, stats);
    pairs_from_blocks(&blocks, options, stats)
}

pub fn candidate_pairs<'a>(
    records: &'a [Record],
    configs: &[BlockingKeyConfig],
    id_field: &str,
) -> Vec<CandidatePair<'a>> {
    let options = PairOptions::default().with_id_field(id_field);
    candidate_pairs_with(records, configs, &options, &BlockingStats::new())
}

/// Candidate pairs keyed by `id_field`, defaulting to `"id"`.
pub fn get_candidate_pairs<'a>(
    records: &'a [Record],
    configs: &[BlockingKeyConfig],
    id_field: Option<&str>,
) -> Vec<CandidatePair<'a>> {
    candidate_pairs(records, configs, id_field.unwrap_or(DEFAULT_ID_FIELD))
}

/// Parallel variant of [`candidate_pairs_with`] with identical output.
///
/// Blocks are expanded into pairs on the rayon pool; a single ordered pass
/// then keeps the first occurrence of each id pair.
pub fn par_candidate_pairs<'a>(
    records: &'a [Record],
    configs: &[BlockingKeyConfig],
    options: &PairOptions,
    stats: &BlockingStats,
) -> Vec<CandidatePair<'a>> {
    let blocks = par_create_blocks(records, configs, stats);
    let ids = intern_ids(records, &options.id_field, stats);

    let expanded: Vec<Vec<(usize, usize, (usize, usize))>> = blocks
        .blocks()
        .par_iter()
        .map(|block| {
            if !admit_block(block, options.max_block_size, stats) {
                return Vec::new();
            }
            let rows = block.rows();
            let mut out = Vec::with_capacity(block.pair_count() as usize);
            for (i, &a) in rows.iter().enumerate() {
                for &b in &rows[i + 1..] {
                    out.push((a, b, canonical(&ids, a, b)));
                }
            }
            out
        })
        .collect();

    let mut seen: FxHashSet<(usize, usize)> = FxHashSet::default();
    let mut pairs = Vec::new();
    let mut duplicates = 0u64;
    for (a, b, key) in expanded.into_iter().flatten() {
        if seen.insert(key) {
            pairs.push(CandidatePair {
                left: &records[a],
                right: &records[b],
            });
        } else {
            duplicates += 1;
        }
    }
    stats.add_pairs(pairs.len() as u64);
    stats.add_duplicates(duplicates);

    info!(pairs = pairs.len(), duplicates, "Candidate pairs extracted in parallel");
    pairs
}
