//! Blockwise: blocking-key generation and candidate-pair extraction for
//! entity resolution
//!
//! Comparing every record with every other record is quadratic. Blocking
//! reduces that cost by deriving short keys from record fields and comparing
//! only records that share a key:
//!
//! 1. **Key generation** -- Each configured field is normalized and turned into
//!    one or more keys (exact, prefix, suffix, Soundex, Cologne Phonetic,
//!    Metaphone, n-grams or a composite of several)
//! 2. **Blocking** -- Records are grouped under composite `method:field:key`
//!    identifiers, in first-seen order
//! 3. **Pair extraction** -- Every block contributes all of its unordered
//!    pairs; a pair of ids is emitted once however many blocks it shares
//!
//! # Architecture
//!
//! - **Pure core** -- Key generation, blocking and pair extraction never fail;
//!   missing fields and odd values simply produce no keys
//! - **Borrowed blocks** -- Blocks hold row indices into the caller's records
//! - **Deterministic parallelism** -- rayon variants produce the same output
//!   as the sequential functions
//! - **Sharding** -- Blocks partition by key hash so pair extraction can run
//!   per shard and merge with a global dedup pass
//! - **Atomic operations** -- Lock-free counters for run statistics
//!
//! # Key Modules
//!
//! - [`normalize`] -- Accent folding and punctuation stripping
//! - [`phonetic`] -- Soundex, Cologne Phonetic and Metaphone encoders
//! - [`keys`] -- Key generators and per-record key generation
//! - [`registry`] -- Standard blocking configurations per entity type
//! - [`blocks`] -- Block construction
//! - [`pairs`] -- Candidate-pair extraction with dedup
//! - [`shard`] -- Sharded extraction and CSV shard merging
//! - [`reader`] -- JSON / JSON Lines record input, optionally bzip2-compressed
//! - [`models`] -- Records, methods, configs and keys
//! - [`stats`] -- Thread-safe atomic counters for blocking metrics
//! - [`config`] -- Constants
//!
//! # Example Usage
//!
//! ```bash
//! # Candidate pairs for people, skipping blocks above 500 members
//! blockwise pairs -i people.jsonl --entity person --max-block-size 500 -o pairs.csv
//!
//! # Shard pair extraction and merge the shards afterwards
//! blockwise pairs -i people.jsonl.bz2 --entity person --shards 8 -o out/
//! blockwise merge-pairs -o out/
//! ```

pub mod blocks;
pub mod config;
pub mod keys;
pub mod models;
pub mod normalize;
pub mod pairs;
pub mod phonetic;
pub mod reader;
pub mod registry;
pub mod shard;
pub mod stats;

pub use blocks::{create_blocks, Block, BlockMap};
pub use keys::generate_blocking_keys;
pub use models::{
    BlockingKey, BlockingKeyConfig, BlockingMethod, CandidatePair, KeyOptions, Record, Value,
};
pub use normalize::normalize;
pub use pairs::{get_candidate_pairs, PairOptions};
pub use phonetic::cologne_phonetic as generate_cologne_phonetic;
pub use registry::{standard_configs, EntityType, STANDARD_BLOCKING_CONFIGS};
pub use stats::BlockingStats;
