use crate::config::PROGRESS_INTERVAL;
use crate::models::{BlockingKeyConfig, Record};
use anyhow::{bail, Context, Result};
use bzip2::read::BzDecoder;
use indicatif::ProgressBar;
use std::fs::File;
use std::io::{BufRead, BufReader, Lines, Read};
use std::path::Path;
use tracing::info;

/// Input layout, decided from the file name (a trailing `.bz2` is ignored).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputFormat {
    /// One JSON object per line
    JsonLines,
    /// A single JSON array of objects
    JsonArray,
}

impl InputFormat {
    pub fn detect(path: &Path) -> Self {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_ascii_lowercase())
            .unwrap_or_default();
        let name = name.strip_suffix(".bz2").unwrap_or(&name);
        if name.ends_with(".json") {
            InputFormat::JsonArray
        } else {
            InputFormat::JsonLines
        }
    }
}

fn is_bz2(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("bz2"))
}

fn open_input(path: &Path) -> Result<Box<dyn BufRead>> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open input file: {}", path.display()))?;
    let reader: Box<dyn Read> = if is_bz2(path) {
        Box::new(BzDecoder::new(file))
    } else {
        Box::new(file)
    };
    Ok(Box::new(BufReader::with_capacity(256 * 1024, reader)))
}

/// Streams records from a JSON Lines file, optionally bzip2-compressed.
/// Blank lines are skipped.
pub struct RecordReader {
    lines: Lines<Box<dyn BufRead>>,
    line_no: usize,
}

impl RecordReader {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let lines = open_input(path.as_ref())?.lines();
        Ok(Self { lines, line_no: 0 })
    }
}

impl Iterator for RecordReader {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let line = match self.lines.next()? {
                Ok(line) => line,
                Err(e) => {
                    return Some(Err(anyhow::Error::new(e)
                        .context(format!("Failed to read line {}", self.line_no + 1))));
                }
            };
            self.line_no += 1;
            if line.trim().is_empty() {
                continue;
            }
            let line_no = self.line_no;
            return Some(
                serde_json::from_str(&line)
                    .with_context(|| format!("Invalid record on line {}", line_no)),
            );
        }
    }
}

/// Loads every record of `path` into memory.
pub fn read_records(path: impl AsRef<Path>) -> Result<Vec<Record>> {
    let path = path.as_ref();
    let pb = ProgressBar::new_spinner();

    let records = match InputFormat::detect(path) {
        InputFormat::JsonArray => serde_json::from_reader(open_input(path)?)
            .with_context(|| format!("Invalid JSON array in {}", path.display()))?,
        InputFormat::JsonLines => {
            let mut records = Vec::new();
            for record in RecordReader::open(path)? {
                records.push(record.with_context(|| format!("While reading {}", path.display()))?);
                if records.len() as u64 % PROGRESS_INTERVAL == 0 {
                    pb.tick();
                }
            }
            records
        }
    };

    pb.finish_and_clear();
    info!(records = records.len(), path = %path.display(), "Records loaded");
    Ok(records)
}

/// Loads a JSON array of blocking configs.
pub fn load_configs(path: impl AsRef<Path>) -> Result<Vec<BlockingKeyConfig>> {
    let path = path.as_ref();
    let configs: Vec<BlockingKeyConfig> = serde_json::from_reader(open_input(path)?)
        .with_context(|| format!("Invalid blocking config file: {}", path.display()))?;

    if configs.is_empty() {
        bail!("Blocking config file {} has no entries", path.display());
    }
    if let Some(i) = configs.iter().position(|c| c.fields.is_empty()) {
        bail!("Blocking config #{} in {} lists no fields", i, path.display());
    }
    Ok(configs)
}
