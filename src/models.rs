//! Core data models for ISRC cross-referencing.
//!
//! This module contains the record types flowing through the pipeline
//! (reference rows, catalog entries, matches) and the run statistics.

use rustc_hash::FxHashSet;
use serde::{Deserialize, Deserializer, Serialize};
use std::mem::size_of;
use std::sync::Arc;

use crate::normalize::Isrc;

// ============================================================================
// String Interning
// ============================================================================

/// String interner for low-cardinality columns.
///
/// The classification code column repeats a handful of values across tens of
/// millions of rows; interning keeps one allocation per distinct value.
#[derive(Default)]
pub struct StringInterner {
    strings: FxHashSet<Arc<str>>,
    bytes: usize,
}

impl StringInterner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern a string, returning the shared handle for its value.
    pub fn intern(&mut self, s: &str) -> Arc<str> {
        if let Some(existing) = self.strings.get(s) {
            return Arc::clone(existing);
        }
        let arc: Arc<str> = Arc::from(s);
        self.bytes += arc.len();
        self.strings.insert(Arc::clone(&arc));
        arc
    }

    /// Bytes held by interned values (string data only).
    pub fn heap_bytes(&self) -> usize {
        self.bytes
    }
}

// ============================================================================
// Reference Table Models
// ============================================================================

/// One retained row of the reference table.
///
/// Everything except the key is opaque pass-through data. `isrc` keeps the
/// value exactly as it appeared in the source; the normalized form is the
/// index key.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ReferenceRecord {
    pub row_id: String,
    pub internal_track_id: String,
    pub classification_code: Arc<str>,
    pub isrc: String,
    pub description: Option<String>,
    pub extra_fields: Vec<String>,
}

impl ReferenceRecord {
    /// Heap bytes owned by this record. The interned classification code is
    /// shared and accounted for by the interner.
    pub fn heap_bytes(&self) -> usize {
        self.row_id.capacity()
            + self.internal_track_id.capacity()
            + self.isrc.capacity()
            + self.description.as_ref().map_or(0, String::capacity)
            + self.extra_fields.capacity() * size_of::<String>()
            + self.extra_fields.iter().map(String::capacity).sum::<usize>()
    }
}

// ============================================================================
// Catalog Models
// ============================================================================

/// Album grouping of a catalog track, as reported by the catalog service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlbumType {
    Album,
    Single,
    Compilation,
    #[default]
    #[serde(other)]
    Unknown,
}

impl From<Option<&str>> for AlbumType {
    fn from(s: Option<&str>) -> Self {
        match s {
            Some("album") => AlbumType::Album,
            Some("single") => AlbumType::Single,
            Some("compilation") => AlbumType::Compilation,
            _ => AlbumType::Unknown,
        }
    }
}

/// Treat an explicit JSON `null` like a missing key.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// One track of the query catalog.
///
/// Only `isrc` is interpreted; the rest is carried into the match output.
/// Pass-through fields accept `null` so one sparse entry never rejects the
/// whole catalog.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    #[serde(default, deserialize_with = "null_as_default")]
    pub track_id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub track_name: String,
    pub album_name: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub album_type: AlbumType,
    pub release_date: Option<String>,
    pub track_number: Option<u32>,
    pub duration_ms: Option<i64>,
    pub isrc: Option<String>,
    pub explicit: Option<bool>,
    pub popularity: Option<i32>,
}

impl CatalogEntry {
    /// Entry with just a title and identifier; everything else unknown.
    pub fn new(track_name: impl Into<String>, isrc: Option<&str>) -> Self {
        Self {
            track_id: String::new(),
            track_name: track_name.into(),
            album_name: None,
            album_type: AlbumType::Unknown,
            release_date: None,
            track_number: None,
            duration_ms: None,
            isrc: isrc.map(str::to_string),
            explicit: None,
            popularity: None,
        }
    }

    /// Raw identifier, or `None` when absent or blank.
    pub fn raw_isrc(&self) -> Option<&str> {
        self.isrc.as_deref().filter(|s| !s.trim().is_empty())
    }
}

/// A catalog entry paired with the reference record sharing its ISRC.
///
/// Serializes flat: the catalog entry's fields, the normalized key, and the
/// reference row under `reference`.
#[derive(Clone, Debug, Serialize)]
pub struct MatchResult<'a> {
    #[serde(flatten)]
    pub entry: &'a CatalogEntry,
    pub isrc_normalized: Isrc,
    pub reference: &'a ReferenceRecord,
}

// ============================================================================
// Statistics
// ============================================================================

/// Counters for one reference-table ingestion.
///
/// Every processed row lands in exactly one of: `undecodable_rows`,
/// `malformed_rows`, `invalid_keys`, `unique_keys`, `duplicate_keys`.
#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexStats {
    pub rows_processed: u64,
    /// Rows whose key normalized successfully (unique + duplicate)
    pub valid_keys: u64,
    pub unique_keys: u64,
    pub duplicate_keys: u64,
    /// Fewer than 4 columns
    pub malformed_rows: u64,
    /// Key column present but not an ISRC
    pub invalid_keys: u64,
    /// Line is not valid UTF-8
    pub undecodable_rows: u64,

    // Memory accounting
    pub chunks_read: u64,
    pub largest_chunk_bytes: u64,
    pub index_bytes_estimate: u64,
}

impl IndexStats {
    /// Rows rejected for any reason other than being a duplicate.
    pub fn rejected_rows(&self) -> u64 {
        self.malformed_rows + self.invalid_keys + self.undecodable_rows
    }

    /// Log stats to stderr in JSON format
    pub fn log_phase(&self, phase: &str) {
        if let Ok(json) = serde_json::to_string_pretty(self) {
            eprintln!("[STATS:{}]\n{}", phase, json);
        }
    }
}

/// Counters for one catalog pass over the index.
#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchStats {
    pub entries_examined: u64,
    /// Identifier present and normalizes to an ISRC
    pub entries_with_identifier: u64,
    pub entries_without_identifier: u64,
    pub entries_invalid_identifier: u64,
    pub matches: u64,
}

impl MatchStats {
    /// Entries that carried an identifier but produced no match. Includes
    /// identifiers that failed normalization.
    pub fn unmatched(&self) -> u64 {
        self.entries_examined
            .saturating_sub(self.matches)
            .saturating_sub(self.entries_without_identifier)
    }

    /// Calculate match rate as a percentage of all examined entries
    pub fn match_rate(&self) -> f64 {
        if self.entries_examined == 0 {
            0.0
        } else {
            100.0 * self.matches as f64 / self.entries_examined as f64
        }
    }
}

/// Statistics for a full build + match run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunStatistics {
    pub index: IndexStats,
    pub matching: MatchStats,
}

impl RunStatistics {
    pub fn new(index: IndexStats, matching: MatchStats) -> Self {
        Self { index, matching }
    }

    /// Log stats to stderr in JSON format
    pub fn log_phase(&self, phase: &str) {
        if let Ok(json) = serde_json::to_string_pretty(self) {
            eprintln!("[STATS:{}]\n{}", phase, json);
        }
    }
}
