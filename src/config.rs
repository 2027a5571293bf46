/// Record field used to identify records in candidate pairs
pub const DEFAULT_ID_FIELD: &str = "id";

/// Stand-in id for records that lack the id field
pub const MISSING_ID: &str = "undefined";

/// Default key length for prefix blocking
pub const DEFAULT_PREFIX_LENGTH: usize = 3;

/// Default key length for suffix blocking
pub const DEFAULT_SUFFIX_LENGTH: usize = 3;

/// Default gram size for n-gram blocking
pub const DEFAULT_NGRAM_SIZE: usize = 3;

/// Prefix length used inside composite keys
pub const COMPOSITE_PREFIX_LENGTH: usize = 3;

/// Padding for short prefix/suffix keys
pub const PAD_CHAR: char = '_';

/// Soundex codes are always this long (letter + 3 digits)
pub const SOUNDEX_LENGTH: usize = 4;

/// Metaphone codes are truncated to this many characters
pub const METAPHONE_MAX_LENGTH: usize = 6;

/// Blocks above this size are logged as under-selective
pub const LARGE_BLOCK_WARN_THRESHOLD: usize = 1000;

/// Progress update interval (tick every N records)
pub const PROGRESS_INTERVAL: u64 = 1000;

/// Number of shards for sharded pair extraction
pub const DEFAULT_SHARD_COUNT: usize = 8;
