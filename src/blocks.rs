use crate::keys::generate_blocking_keys;
use crate::models::{BlockingKeyConfig, Record};
use crate::stats::BlockingStats;
use rayon::prelude::*;
use rustc_hash::FxHashMap;
use tracing::debug;

/// Records sharing one composite `method:field:key`.
///
/// Members are stored as row indices into the input slice, in input order.
#[derive(Debug, Clone)]
pub struct Block<'a> {
    key: String,
    rows: Vec<usize>,
    records: &'a [Record],
}

impl<'a> Block<'a> {
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn rows(&self) -> &[usize] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get(&self, position: usize) -> Option<&'a Record> {
        self.rows.get(position).map(|&row| &self.records[row])
    }

    pub fn members(&self) -> impl Iterator<Item = &'a Record> + '_ {
        let records = self.records;
        self.rows.iter().map(move |&row| &records[row])
    }

    /// Number of unordered pairs this block contributes before dedup.
    pub fn pair_count(&self) -> u64 {
        let n = self.rows.len() as u64;
        n * n.saturating_sub(1) / 2
    }
}

/// Composite key to block, iterated in first-seen order.
#[derive(Debug)]
pub struct BlockMap<'a> {
    records: &'a [Record],
    blocks: Vec<Block<'a>>,
    by_key: FxHashMap<String, usize>,
}

impl<'a> BlockMap<'a> {
    fn new(records: &'a [Record]) -> Self {
        Self {
            records,
            blocks: Vec::new(),
            by_key: FxHashMap::default(),
        }
    }

    fn push(&mut self, block_key: String, row: usize) {
        match self.by_key.get(&block_key) {
            Some(&i) => {
                let rows = &mut self.blocks[i].rows;
                // rows arrive in order, so a repeat of the same record is always last
                if rows.last() != Some(&row) {
                    rows.push(row);
                }
            }
            None => {
                self.by_key.insert(block_key.clone(), self.blocks.len());
                self.blocks.push(Block {
                    key: block_key,
                    rows: vec![row],
                    records: self.records,
                });
            }
        }
    }

    pub fn get(&self, block_key: &str) -> Option<&Block<'a>> {
        self.by_key.get(block_key).map(|&i| &self.blocks[i])
    }

    /// Members of the block at `block_key`, empty when there is none.
    pub fn members(&self, block_key: &str) -> Vec<&'a Record> {
        self.get(block_key)
            .map(|b| b.members().collect())
            .unwrap_or_default()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Block<'a>> {
        self.blocks.iter()
    }

    pub fn blocks(&self) -> &[Block<'a>] {
        &self.blocks
    }

    pub fn records(&self) -> &'a [Record] {
        self.records
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn largest_block_size(&self) -> usize {
        self.blocks.iter().map(Block::len).max().unwrap_or(0)
    }

    /// Upper bound on pair comparisons, before cross-block dedup.
    pub fn total_pair_count(&self) -> u64 {
        self.blocks.iter().map(Block::pair_count).sum()
    }

    pub fn blocks_larger_than(&self, size: usize) -> impl Iterator<Item = &Block<'a>> + '_ {
        self.blocks.iter().filter(move |b| b.len() > size)
    }
}

impl<'m, 'a> IntoIterator for &'m BlockMap<'a> {
    type Item = &'m Block<'a>;
    type IntoIter = std::slice::Iter<'m, Block<'a>>;

    fn into_iter(self) -> Self::IntoIter {
        self.blocks.iter()
    }
}

pub fn create_blocks<'a>(records: &'a [Record], configs: &[BlockingKeyConfig]) -> BlockMap<'a> {
    create_blocks_with(records, configs, &BlockingStats::new())
}

/// Builds blocks for `records`, counting into `stats`.
pub fn create_blocks_with<'a>(
    records: &'a [Record],
    configs: &[BlockingKeyConfig],
    stats: &BlockingStats,
) -> BlockMap<'a> {
    let mut map = BlockMap::new(records);

    for (row, record) in records.iter().enumerate() {
        let keys = generate_blocking_keys(record, configs);
        stats.inc_records();
        stats.add_keys(keys.len() as u64);
        for key in keys {
            map.push(key.block_key(), row);
        }
    }

    stats.add_blocks(map.len() as u64);
    debug!(
        records = records.len(),
        blocks = map.len(),
        largest = map.largest_block_size(),
        "Blocks built"
    );
    map
}

/// Same result as [`create_blocks_with`]; key generation runs on the rayon
/// pool and blocks are assembled in input order afterwards.
pub fn par_create_blocks<'a>(
    records: &'a [Record],
    configs: &[BlockingKeyConfig],
    stats: &BlockingStats,
) -> BlockMap<'a> {
    let keyed: Vec<Vec<String>> = records
        .par_iter()
        .map(|record| {
            let keys = generate_blocking_keys(record, configs);
            stats.inc_records();
            stats.add_keys(keys.len() as u64);
            keys.iter().map(|k| k.block_key()).collect()
        })
        .collect();

    let mut map = BlockMap::new(records);
    for (row, keys) in keyed.into_iter().enumerate() {
        for key in keys {
            map.push(key, row);
        }
    }

    stats.add_blocks(map.len() as u64);
    debug!(
        records = records.len(),
        blocks = map.len(),
        largest = map.largest_block_size(),
        "Blocks built in parallel"
    );
    map
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::BlockingMethod;

    fn person(id: &str, last_name: &str) -> Record {
        Record::new().with("id", id).with("lastName", last_name)
    }

    fn ids<'a>(members: impl Iterator<Item = &'a Record>) -> Vec<String> {
        members.map(|r| r.id_text("id").into_owned()).collect()
    }

    #[test]
    fn groups_records_by_composite_key() {
        let records = vec![person("1", "Meyer"), person("2", "Meier"), person("3", "Schmidt")];
        let configs = vec![BlockingKeyConfig::new(["lastName"], BlockingMethod::ColognePhonetic)];
        let blocks = create_blocks(&records, &configs);

        assert_eq!(blocks.len(), 2);
        assert_eq!(ids(blocks.members("cologne_phonetic:lastName:67").into_iter()), vec!["1", "2"]);
        assert_eq!(ids(blocks.members("cologne_phonetic:lastName:862").into_iter()), vec!["3"]);
        assert!(blocks.members("cologne_phonetic:lastName:999").is_empty());
    }

    #[test]
    fn block_order_is_first_seen_and_members_are_stable() {
        let records = vec![
            person("a", "Zimmer"),
            person("b", "Adler"),
            person("c", "Zimmermann"),
            person("d", "Adler"),
        ];
        let configs = vec![BlockingKeyConfig::new(["lastName"], BlockingMethod::Prefix)];
        let blocks = create_blocks(&records, &configs);

        let keys: Vec<&str> = blocks.iter().map(Block::key).collect();
        assert_eq!(keys, vec!["prefix:lastName:Zim", "prefix:lastName:Adl"]);
        assert_eq!(ids(blocks.blocks()[0].members()), vec!["a", "c"]);
        assert_eq!(ids(blocks.blocks()[1].members()), vec!["b", "d"]);
    }

    #[test]
    fn record_lands_in_many_blocks() {
        let records = vec![person("1", "Berlin")];
        let configs = vec![
            BlockingKeyConfig::new(["lastName"], BlockingMethod::Ngram),
            BlockingKeyConfig::new(["lastName"], BlockingMethod::Soundex),
        ];
        let blocks = create_blocks(&records, &configs);
        assert_eq!(blocks.len(), 5);
        assert!(blocks.get("ngram:lastName:Ber").is_some());
        assert!(blocks.get("soundex:lastName:B645").is_some());
    }

    #[test]
    fn duplicate_configs_do_not_duplicate_members() {
        let records = vec![person("1", "Meyer"), person("2", "Meier")];
        let config = BlockingKeyConfig::new(["lastName"], BlockingMethod::ColognePhonetic);
        let blocks = create_blocks(&records, &[config.clone(), config]);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks.blocks()[0].rows(), &[0, 1]);
    }

    #[test]
    fn missing_fields_are_absent_from_blocks() {
        let records = vec![
            person("1", "Meyer"),
            Record::new().with("id", "2"),
            person("3", ""),
        ];
        let configs = vec![BlockingKeyConfig::new(["lastName"], BlockingMethod::ColognePhonetic)];
        let blocks = create_blocks(&records, &configs);
        assert_eq!(blocks.len(), 1);
        assert_eq!(ids(blocks.blocks()[0].members()), vec!["1"]);
    }

    #[test]
    fn parallel_build_matches_sequential() {
        let names = ["Meyer", "Meier", "Mayer", "Schmidt", "Schmitt", "Müller", "Mueller"];
        let records: Vec<Record> = (0..200)
            .map(|i| person(&i.to_string(), names[i % names.len()]))
            .collect();
        let configs = vec![
            BlockingKeyConfig::new(["lastName"], BlockingMethod::ColognePhonetic),
            BlockingKeyConfig::new(["lastName"], BlockingMethod::Composite),
        ];

        let seq = create_blocks(&records, &configs);
        let stats = BlockingStats::new();
        let par = par_create_blocks(&records, &configs, &stats);

        assert_eq!(seq.len(), par.len());
        for (a, b) in seq.iter().zip(par.iter()) {
            assert_eq!(a.key(), b.key());
            assert_eq!(a.rows(), b.rows());
        }
        assert_eq!(stats.records(), 200);
        assert_eq!(stats.blocks(), par.len() as u64);
    }

    #[test]
    fn pair_counts() {
        let records: Vec<Record> = (0..5).map(|i| person(&i.to_string(), "Meyer")).collect();
        let configs = vec![BlockingKeyConfig::new(["lastName"], BlockingMethod::Exact)];
        let blocks = create_blocks(&records, &configs);
        assert_eq!(blocks.largest_block_size(), 5);
        assert_eq!(blocks.total_pair_count(), 10);
        assert_eq!(blocks.blocks_larger_than(4).count(), 1);
        assert_eq!(blocks.blocks_larger_than(5).count(), 0);
    }
}
