//! Sharded candidate-pair extraction.
//!
//! A block's members depend only on its key, so blocks can be partitioned by
//! a stable hash of the key and expanded independently (on threads, or on
//! separate machines via CSV shard files). Pairs that appear in several
//! shards are removed by a final first-seen merge over canonical id pairs.

use crate::blocks::{Block, BlockMap};
use crate::config::MISSING_ID;
use crate::pairs::{admit_block, pair_key, PairOptions};
use crate::stats::BlockingStats;
use anyhow::{bail, Context, Result};
use csv::{Reader, Writer};
use rayon::prelude::*;
use rustc_hash::{FxHashSet, FxHasher};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::File;
use std::hash::Hasher;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// An unordered id pair with the lexicographically smaller id first.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CanonicalPair {
    pub low: String,
    pub high: String,
}

impl CanonicalPair {
    pub fn new(a: &str, b: &str) -> Self {
        let (low, high) = if a <= b { (a, b) } else { (b, a) };
        Self {
            low: low.to_string(),
            high: high.to_string(),
        }
    }

    pub fn key(&self) -> String {
        pair_key(&self.low, &self.high)
    }
}

impl fmt::Display for CanonicalPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.low, self.high)
    }
}

/// Stable shard index for a composite block key.
pub fn shard_for_block(block_key: &str, shard_count: usize) -> usize {
    let shard_count = shard_count.max(1);
    let mut hasher = FxHasher::default();
    hasher.write(block_key.as_bytes());
    (hasher.finish() % shard_count as u64) as usize
}

/// Partitions blocks by key hash, keeping first-seen order inside a shard.
pub fn shard_blocks<'m, 'a>(blocks: &'m BlockMap<'a>, shard_count: usize) -> Vec<Vec<&'m Block<'a>>> {
    let shard_count = shard_count.max(1);
    let mut shards: Vec<Vec<&'m Block<'a>>> = vec![Vec::new(); shard_count];
    for block in blocks {
        shards[shard_for_block(block.key(), shard_count)].push(block);
    }
    shards
}

/// Counts records without an id once each, as the sequential extractor does.
/// Shards see a record once per block, so they cannot count it themselves.
pub fn count_missing_ids(blocks: &BlockMap<'_>, id_field: &str, stats: &BlockingStats) -> u64 {
    let missing = blocks
        .records()
        .iter()
        .filter(|record| record.text(id_field).is_none())
        .count() as u64;
    stats.add_missing_ids(missing);
    if missing > 0 {
        debug!(missing, id_field, "Records without id, using '{}'", MISSING_ID);
    }
    missing
}

/// Canonical pairs of one shard, deduplicated within the shard.
///
/// Pairs dropped here count as duplicates; cross-shard duplicates are counted
/// by the merge.
pub fn extract_shard(
    blocks: &[&Block<'_>],
    options: &PairOptions,
    stats: &BlockingStats,
) -> Vec<CanonicalPair> {
    let mut seen: FxHashSet<CanonicalPair> = FxHashSet::default();
    let mut pairs = Vec::new();
    let mut duplicates = 0u64;

    for block in blocks {
        if !admit_block(block, options.max_block_size, stats) {
            continue;
        }
        let ids: Vec<_> = block
            .members()
            .map(|record| record.id_text(&options.id_field))
            .collect();
        for (i, a) in ids.iter().enumerate() {
            for b in &ids[i + 1..] {
                let pair = CanonicalPair::new(a, b);
                if seen.contains(&pair) {
                    duplicates += 1;
                } else {
                    seen.insert(pair.clone());
                    pairs.push(pair);
                }
            }
        }
    }
    stats.add_duplicates(duplicates);
    pairs
}

/// Concatenates shard outputs, keeping only the first occurrence of a pair.
pub fn merge_shards<I>(shards: I, stats: &BlockingStats) -> Vec<CanonicalPair>
where
    I: IntoIterator<Item = Vec<CanonicalPair>>,
{
    let mut seen: FxHashSet<CanonicalPair> = FxHashSet::default();
    let mut merged = Vec::new();
    let mut duplicates = 0u64;

    for shard in shards {
        for pair in shard {
            if seen.contains(&pair) {
                duplicates += 1;
                continue;
            }
            seen.insert(pair.clone());
            merged.push(pair);
        }
    }

    stats.add_pairs(merged.len() as u64);
    stats.add_duplicates(duplicates);
    merged
}

/// Expands every shard on the rayon pool and merges the results.
pub fn par_sharded_pairs(
    blocks: &BlockMap<'_>,
    options: &PairOptions,
    shard_count: usize,
    stats: &BlockingStats,
) -> Vec<CanonicalPair> {
    count_missing_ids(blocks, &options.id_field, stats);
    let shards = shard_blocks(blocks, shard_count);
    let expanded: Vec<Vec<CanonicalPair>> = shards
        .par_iter()
        .map(|shard| extract_shard(shard, options, stats))
        .collect();

    for (i, shard) in expanded.iter().enumerate() {
        debug!(shard = i, pairs = shard.len(), "Shard expanded");
    }

    let merged = merge_shards(expanded, stats);
    info!(
        shards = shard_count,
        pairs = merged.len(),
        "Sharded candidate pairs merged"
    );
    merged
}

pub fn shard_path(output_dir: &Path, shard: usize) -> PathBuf {
    output_dir.join(format!("pairs_{:03}.csv", shard))
}

/// Writes one `pairs_NNN.csv` per shard into `output_dir`.
pub fn write_shard_csvs(output_dir: &Path, shards: &[Vec<CanonicalPair>]) -> Result<()> {
    for (i, shard) in shards.iter().enumerate() {
        let path = shard_path(output_dir, i);
        let file = File::create(&path)
            .with_context(|| format!("Failed to create shard file: {}", path.display()))?;
        let mut writer = Writer::from_writer(BufWriter::with_capacity(128 * 1024, file));
        writer.write_record(["left_id", "right_id"])?;
        for pair in shard {
            writer.write_record([&pair.low, &pair.high])?;
        }
        writer.flush()?;
    }
    Ok(())
}

/// Detect shard count by counting pairs_*.csv files
fn detect_shard_count(output_dir: &Path) -> Result<usize> {
    let mut count = 0;
    while shard_path(output_dir, count).exists() {
        count += 1;
    }
    if count == 0 {
        bail!("No sharded pair files found (expected pairs_000.csv, etc.)");
    }
    Ok(count)
}

/// Merges `pairs_NNN.csv` shards into `pairs.csv`, dropping pairs already
/// written by an earlier shard. Returns the number of unique pairs.
pub fn merge_csv_shards(output_dir: &Path) -> Result<usize> {
    let shard_count = detect_shard_count(output_dir)?;
    info!(shards = shard_count, dir = %output_dir.display(), "Merging pair shards");

    let output_path = output_dir.join("pairs.csv");
    let mut writer = Writer::from_writer(BufWriter::with_capacity(
        256 * 1024,
        File::create(&output_path)
            .with_context(|| format!("Failed to create {}", output_path.display()))?,
    ));
    writer.write_record(["left_id", "right_id"])?;

    let mut seen: FxHashSet<CanonicalPair> = FxHashSet::default();
    for shard in 0..shard_count {
        let path = shard_path(output_dir, shard);
        let file = File::open(&path)
            .with_context(|| format!("Failed to open shard: {}", path.display()))?;
        let mut reader = Reader::from_reader(BufReader::new(file));

        for result in reader.records() {
            let record = result?;
            let left = record.get(0).context("Missing left id")?;
            let right = record.get(1).context("Missing right id")?;
            let pair = CanonicalPair::new(left, right);
            if !seen.contains(&pair) {
                writer.write_record([&pair.low, &pair.high])?;
                seen.insert(pair);
            }
        }
    }

    writer.flush()?;
    info!(unique = seen.len(), "Pair shards merged");
    Ok(seen.len())
}
