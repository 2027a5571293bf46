use anyhow::{bail, Context, Result};
use blockwise::blocks::{create_blocks_with, par_create_blocks, BlockMap};
use blockwise::config::{DEFAULT_ID_FIELD, DEFAULT_SHARD_COUNT};
use blockwise::keys::generate_blocking_keys;
use blockwise::models::{BlockingKeyConfig, Record};
use blockwise::pairs::{for_each_pair_in_blocks, PairOptions};
use blockwise::reader::{load_configs, read_records};
use blockwise::registry::{standard_configs, EntityType};
use blockwise::shard::{
    count_missing_ids, extract_shard, merge_csv_shards, shard_blocks, write_shard_csvs,
};
use blockwise::stats::BlockingStats;
use clap::{Args, Parser, Subcommand};
use csv::Writer;
use rayon::prelude::*;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::process::ExitCode;
use std::time::Instant;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[derive(Parser)]
#[command(name = "blockwise")]
#[command(about = "Generate blocking keys and candidate pairs for entity resolution")]
struct Cli {
    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the blocking keys of every record as JSON lines
    Keys(KeysArgs),
    /// List blocks and their sizes as CSV
    Blocks(BlocksArgs),
    /// Extract deduplicated candidate pairs as CSV
    Pairs(PairsArgs),
    /// Print the standard blocking configs of an entity type
    Configs(ConfigsArgs),
    /// Merge sharded pair files (pairs_000.csv, ...) into pairs.csv
    MergePairs(MergePairsArgs),
}

#[derive(Args)]
struct SourceArgs {
    /// Records as JSON Lines (.jsonl) or a JSON array (.json), optionally .bz2
    #[arg(short, long)]
    input: String,

    /// Use the standard configs of this entity type
    #[arg(long, conflicts_with = "configs")]
    entity: Option<EntityType>,

    /// JSON file with a list of blocking configs
    #[arg(long)]
    configs: Option<String>,
}

impl SourceArgs {
    fn blocking_configs(&self) -> Result<Vec<BlockingKeyConfig>> {
        match (&self.entity, &self.configs) {
            (Some(entity), _) => Ok(standard_configs(*entity).to_vec()),
            (None, Some(path)) => load_configs(path),
            (None, None) => bail!("Either --entity or --configs is required"),
        }
    }

    fn records(&self) -> Result<Vec<Record>> {
        read_records(&self.input)
    }
}

#[derive(Args)]
struct KeysArgs {
    #[command(flatten)]
    source: SourceArgs,

    /// Record field holding the record id
    #[arg(long, default_value = DEFAULT_ID_FIELD)]
    id_field: String,
}

#[derive(Args)]
struct BlocksArgs {
    #[command(flatten)]
    source: SourceArgs,

    /// Only list blocks with at least this many members
    #[arg(long, default_value_t = 1)]
    min_size: usize,

    /// Build blocks on all cores
    #[arg(long)]
    parallel: bool,
}

#[derive(Args)]
struct PairsArgs {
    #[command(flatten)]
    source: SourceArgs,

    /// Record field holding the record id
    #[arg(long, default_value = DEFAULT_ID_FIELD)]
    id_field: String,

    /// Skip blocks with more members than this
    #[arg(long)]
    max_block_size: Option<usize>,

    /// Build blocks on all cores
    #[arg(long)]
    parallel: bool,

    /// Split pair extraction into N shards written to the --output directory
    #[arg(long, value_name = "N")]
    shards: Option<Option<usize>>,

    /// Output file (directory with --shards); stdout when omitted
    #[arg(short, long)]
    output: Option<String>,
}

#[derive(Args)]
struct ConfigsArgs {
    /// Entity type (person, company, address, product)
    #[arg(long)]
    entity: EntityType,
}

#[derive(Args)]
struct MergePairsArgs {
    /// Directory containing pairs_NNN.csv shards
    #[arg(short, long)]
    output: String,
}

fn open_output(path: Option<&str>) -> Result<Box<dyn Write>> {
    Ok(match path {
        Some(path) => Box::new(BufWriter::with_capacity(
            128 * 1024,
            File::create(path).with_context(|| format!("Failed to create output file: {}", path))?,
        )),
        None => Box::new(BufWriter::new(io::stdout().lock())),
    })
}

fn build_blocks<'a>(
    records: &'a [Record],
    configs: &[BlockingKeyConfig],
    parallel: bool,
    stats: &BlockingStats,
) -> BlockMap<'a> {
    if parallel {
        par_create_blocks(records, configs, stats)
    } else {
        create_blocks_with(records, configs, stats)
    }
}

fn run_keys(args: KeysArgs) -> Result<()> {
    let configs = args.source.blocking_configs()?;
    let records = args.source.records()?;
    let mut out = open_output(None)?;

    for record in &records {
        let keys = generate_blocking_keys(record, &configs);
        let line = serde_json::json!({
            "id": record.id_text(&args.id_field),
            "keys": keys,
        });
        serde_json::to_writer(&mut out, &line)?;
        out.write_all(b"\n")?;
    }
    out.flush()?;
    Ok(())
}

fn run_blocks(args: BlocksArgs) -> Result<()> {
    let configs = args.source.blocking_configs()?;
    let records = args.source.records()?;
    let stats = BlockingStats::new();

    let start = Instant::now();
    let blocks = build_blocks(&records, &configs, args.parallel, &stats);
    let duration = start.elapsed();

    let mut writer = Writer::from_writer(open_output(None)?);
    writer.write_record(["block_key", "size"])?;
    for block in blocks.iter().filter(|b| b.len() >= args.min_size) {
        writer.write_record([block.key(), itoa::Buffer::new().format(block.len())])?;
    }
    writer.flush()?;

    eprintln!();
    eprintln!("=== Summary ===");
    eprintln!("Blocking time:      {:.2}s", duration.as_secs_f64());
    eprintln!("Records processed:  {}", stats.records());
    eprintln!("Keys generated:     {}", stats.keys());
    eprintln!("Blocks built:       {}", blocks.len());
    eprintln!("Largest block:      {}", blocks.largest_block_size());
    eprintln!("Pair comparisons:   {}", blocks.total_pair_count());
    Ok(())
}

fn write_sharded_pairs(
    blocks: &BlockMap<'_>,
    options: &PairOptions,
    shard_count: usize,
    output_dir: &str,
    stats: &BlockingStats,
) -> Result<usize> {
    let dir = Path::new(output_dir);
    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create output directory: {}", output_dir))?;

    count_missing_ids(blocks, &options.id_field, stats);
    let shards: Vec<_> = shard_blocks(blocks, shard_count)
        .par_iter()
        .map(|shard| extract_shard(shard, options, stats))
        .collect();
    write_shard_csvs(dir, &shards)?;
    info!(shards = shards.len(), dir = output_dir, "Pair shards written");

    let unique = merge_csv_shards(dir)?;
    let total: usize = shards.iter().map(Vec::len).sum();
    stats.add_pairs(unique as u64);
    stats.add_duplicates((total - unique) as u64);
    Ok(unique)
}

fn run_pairs(args: PairsArgs) -> Result<()> {
    let configs = args.source.blocking_configs()?;
    let records = args.source.records()?;
    let stats = BlockingStats::new();
    let options = PairOptions {
        id_field: args.id_field,
        max_block_size: args.max_block_size,
    };

    let start_blocking = Instant::now();
    let blocks = build_blocks(&records, &configs, args.parallel, &stats);
    let blocking_duration = start_blocking.elapsed();

    let start_pairs = Instant::now();
    match args.shards {
        Some(shard_count) => {
            let Some(dir) = args.output.as_deref() else {
                bail!("--shards needs an --output directory");
            };
            let shard_count = shard_count.unwrap_or(DEFAULT_SHARD_COUNT).max(1);
            write_sharded_pairs(&blocks, &options, shard_count, dir, &stats)?;
        }
        None => {
            let mut writer = Writer::from_writer(open_output(args.output.as_deref())?);
            writer.write_record(["left_id", "right_id"])?;
            let mut result = Ok(());
            for_each_pair_in_blocks(&blocks, &options, &stats, |left, right| {
                if result.is_ok() {
                    result = writer.write_record([
                        left.id_text(&options.id_field).as_ref(),
                        right.id_text(&options.id_field).as_ref(),
                    ]);
                }
            });
            result?;
            writer.flush()?;
        }
    }
    let pairs_duration = start_pairs.elapsed();

    let naive = (records.len() as u64) * (records.len() as u64).saturating_sub(1) / 2;
    let reduction = if naive == 0 {
        0.0
    } else {
        100.0 * (1.0 - stats.pairs() as f64 / naive as f64)
    };

    eprintln!();
    eprintln!("=== Summary ===");
    eprintln!("Blocking time:      {:.2}s", blocking_duration.as_secs_f64());
    eprintln!("Pairing time:       {:.2}s", pairs_duration.as_secs_f64());
    eprintln!();
    eprintln!("Records processed:  {}", stats.records());
    eprintln!("Keys generated:     {}", stats.keys());
    eprintln!("Blocks built:       {}", stats.blocks());
    eprintln!("Blocks skipped:     {}", stats.oversized());
    eprintln!("Candidate pairs:    {}", stats.pairs());
    eprintln!("Duplicates removed: {}", stats.duplicates());
    eprintln!("Missing ids:        {}", stats.missing());
    eprintln!("Reduction ratio:    {:.2}%", reduction);
    Ok(())
}

fn run_configs(args: ConfigsArgs) -> Result<()> {
    let configs = standard_configs(args.entity);
    println!("{}", serde_json::to_string_pretty(configs)?);
    Ok(())
}

fn run_merge_pairs(args: MergePairsArgs) -> Result<()> {
    let unique = merge_csv_shards(Path::new(&args.output))?;
    eprintln!("Unique pairs:       {}", unique);
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(io::stderr)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }

    let result = match cli.command {
        Commands::Keys(args) => run_keys(args),
        Commands::Blocks(args) => run_blocks(args),
        Commands::Pairs(args) => run_pairs(args),
        Commands::Configs(args) => run_configs(args),
        Commands::MergePairs(args) => run_merge_pairs(args),
    };

    match result {
        Ok(()) => {
            info!("Completed successfully");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Error: {:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
