//! Analysis output: JSON report and console summary.

use anyhow::{Context, Result};
use serde::Serialize;
use std::path::Path;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::models::{CatalogEntry, MatchResult, RunStatistics};
use crate::progress::{format_count, format_duration};

/// Machine-readable result of one run.
///
/// Carries the full `catalog`, so a report can be passed back in as a
/// `--catalog` source.
#[derive(Debug, Serialize)]
pub struct AnalysisReport<'a> {
    /// Unix seconds
    pub generated_at: u64,
    pub reference_table: String,
    pub catalog_source: String,
    pub match_rate: f64,
    pub stats: &'a RunStatistics,
    pub catalog: &'a [CatalogEntry],
    pub matches: &'a [MatchResult<'a>],
}

impl<'a> AnalysisReport<'a> {
    pub fn new(
        reference_table: &Path,
        catalog_source: impl ToString,
        stats: &'a RunStatistics,
        catalog: &'a [CatalogEntry],
        matches: &'a [MatchResult<'a>],
    ) -> Self {
        let generated_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        Self {
            generated_at,
            reference_table: reference_table.display().to_string(),
            catalog_source: catalog_source.to_string(),
            match_rate: stats.matching.match_rate(),
            stats,
            catalog,
            matches,
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Write the report as pretty JSON.
    pub fn write_to_file(&self, path: &Path) -> Result<()> {
        let json = self.to_json()?;
        std::fs::write(path, json).with_context(|| format!("Failed to write report {:?}", path))?;
        Ok(())
    }
}

/// Human-readable summary lines, in print order.
pub fn summary_lines(stats: &RunStatistics, elapsed: Duration) -> Vec<String> {
    let index = &stats.index;
    let matching = &stats.matching;
    vec![
        format!("  Reference rows processed: {}", format_count(index.rows_processed)),
        format!("  Unique ISRCs indexed: {}", format_count(index.unique_keys)),
        format!("  Duplicate ISRCs discarded: {}", format_count(index.duplicate_keys)),
        format!(
            "  Rejected rows: {} malformed, {} invalid ISRC, {} undecodable",
            format_count(index.malformed_rows),
            format_count(index.invalid_keys),
            format_count(index.undecodable_rows)
        ),
        format!(
            "  Index size (est.): {:.2} MB",
            index.index_bytes_estimate as f64 / 1_048_576.0
        ),
        format!("  Catalog entries: {}", format_count(matching.entries_examined)),
        format!(
            "  Entries with ISRC: {} ({} missing, {} invalid)",
            format_count(matching.entries_with_identifier),
            format_count(matching.entries_without_identifier),
            format_count(matching.entries_invalid_identifier)
        ),
        format!("  Matches in reference table: {}", format_count(matching.matches)),
        format!("  Match rate: {:.2}%", matching.match_rate()),
        format!("  Elapsed: {}", format_duration(elapsed)),
    ]
}

pub fn print_summary(stats: &RunStatistics, elapsed: Duration) {
    println!("\n{:=<60}", "");
    println!("Analysis complete!");
    for line in summary_lines(stats, elapsed) {
        println!("{}", line);
    }
    println!("{:=<60}", "");
}

/// Print up to `limit` matches, one per line.
pub fn print_matches(matches: &[MatchResult<'_>], limit: usize) {
    if matches.is_empty() {
        println!("\nNo matches found in reference table.");
        return;
    }
    println!("\nMatches ({}):", matches.len());
    println!("{:-<80}", "");
    for m in matches.iter().take(limit) {
        println!(
            "[{}] {} ({}) -> row {} / {} [{}]",
            m.isrc_normalized,
            m.entry.track_name,
            m.entry.album_name.as_deref().unwrap_or("Unknown"),
            m.reference.row_id,
            m.reference.internal_track_id,
            m.reference.classification_code
        );
    }
    if matches.len() > limit {
        println!("... and {} more", matches.len() - limit);
    }
}
