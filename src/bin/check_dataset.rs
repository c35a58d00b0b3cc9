//! Check a reference table's structure before a full run.
//!
//! Usage: check-dataset <unclaimedmusicalworkrightshares.tsv> [--rows N]

use anyhow::{Context, Result};
use clap::Parser;
use isrc_crossref::index::MIN_COLUMNS;
use isrc_crossref::inspect::sample_dataset;
use std::fs::File;
use std::io::BufReader;
use std::num::NonZeroUsize;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "check-dataset")]
#[command(about = "Sample the first rows of a reference table and report its structure")]
struct Args {
    reference: PathBuf,

    /// Rows to sample
    #[arg(long, default_value = "10")]
    rows: NonZeroUsize,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let file = File::open(&args.reference)
        .with_context(|| format!("Dataset file {:?} not found or unreadable", args.reference))?;
    let sample = sample_dataset(BufReader::new(file), args.rows)
        .with_context(|| format!("Failed to read {:?}", args.reference))?;

    println!("Sampled {} rows from {:?}", sample.rows, args.reference);
    if sample.undecodable > 0 {
        println!("  WARN: {} rows are not valid UTF-8", sample.undecodable);
    }
    for (columns, count) in &sample.column_counts {
        println!("  {} columns: {} rows", columns, count);
    }

    if !sample.has_expected_structure() {
        eprintln!(
            "FAIL: no sampled row has the {} columns needed to reach the ISRC column",
            MIN_COLUMNS
        );
        std::process::exit(1);
    }

    println!(
        "OK: {}/{} rows have {}+ columns",
        sample.with_key_column, sample.rows, MIN_COLUMNS
    );
    println!("  Sample values from column 3 (ISRCs): {:?}", sample.sample_keys);
    println!(
        "  {}/{} normalize to an ISRC key, {} fit the full ISO 3901 layout",
        sample.normalized_keys, sample.with_key_column, sample.iso3901_keys
    );
    if sample.normalized_keys == 0 {
        println!("  WARN: column 3 values don't look like ISRCs");
    }

    Ok(())
}
