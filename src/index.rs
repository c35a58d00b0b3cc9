//! Reference index construction.
//!
//! ## Source format
//!
//! The reference table is header-less, tab-separated UTF-8. Columns are
//! positional:
//!
//! | Column | Field |
//! |--------|-------|
//! | 0 | `row_id` |
//! | 1 | `internal_track_id` |
//! | 2 | `classification_code` |
//! | 3 | `isrc` (matching key) |
//! | 4 | `description` (optional) |
//! | 5.. | extra fields, variable arity |
//!
//! There is no quoting or escaping. A literal tab inside a free-text field
//! reads as a column boundary: text after it shifts into `extra_fields`, and a
//! tab before column 3 moves the key. This is a limitation of the format and
//! is reported, not repaired.
//!
//! ## Pipeline
//!
//! ```text
//! reader thread ──(bounded channel of RawChunk)──> parse chunk (rayon, ordered)
//!                                                    │
//!                                                    v
//!                                            IndexBuilder (single writer)
//! ```
//!
//! At most `prefetch_chunks + 2` raw chunks are alive at a time. Rows are
//! inserted strictly in read order, so the first occurrence of a key is
//! retained no matter how chunks were sized or parsed.

use crossbeam_channel::bounded;
use indicatif::ProgressBar;
use rayon::prelude::*;
use rustc_hash::FxHashMap;
use std::collections::hash_map::Entry;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::mem::size_of;
use std::num::NonZeroUsize;
use std::path::Path;
use std::thread;

use crate::error::IndexError;
use crate::models::{IndexStats, ReferenceRecord, StringInterner};
use crate::normalize::Isrc;
use crate::progress::{format_count, RowLogger};

/// Default rows per chunk.
pub const DEFAULT_CHUNK_SIZE: NonZeroUsize = match NonZeroUsize::new(100_000) {
    Some(n) => n,
    None => panic!("default chunk size must be non-zero"),
};

/// Rows required to reach the key column.
pub const MIN_COLUMNS: usize = 4;

/// Interval for `[INDEX]` log lines (matches the old "every million rows" output).
const LOG_INTERVAL_ROWS: u64 = 1_000_000;

/// Read buffer for the reference file.
const READ_BUFFER_BYTES: usize = 1 << 20;

/// Upper bound on pre-allocated line slots per chunk.
const MAX_PREALLOC_LINES: usize = 1 << 16;

// ============================================================================
// Options
// ============================================================================

/// Index build configuration.
///
/// Only `chunk_size` bounds memory; `parallel_parse` and `prefetch_chunks`
/// affect throughput and never change the resulting index or counters.
#[derive(Debug, Clone)]
pub struct BuildOptions {
    pub chunk_size: NonZeroUsize,
    pub parallel_parse: bool,
    pub prefetch_chunks: usize,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            parallel_parse: true,
            prefetch_chunks: 2,
        }
    }
}

// ============================================================================
// Chunked Reading
// ============================================================================

/// A batch of raw lines stored in one contiguous buffer.
///
/// Line terminators (`\n`, `\r\n`) are stripped; blank lines are dropped.
#[derive(Debug, Default)]
pub struct RawChunk {
    data: Vec<u8>,
    ends: Vec<usize>,
    source_bytes: u64,
}

impl RawChunk {
    /// Number of rows in the chunk.
    pub fn len(&self) -> usize {
        self.ends.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ends.is_empty()
    }

    /// Bytes consumed from the source for this chunk, terminators and blank lines included.
    pub fn source_bytes(&self) -> u64 {
        self.source_bytes
    }

    /// Bytes held by the chunk buffer.
    pub fn buffer_bytes(&self) -> u64 {
        (self.data.capacity() + self.ends.capacity() * size_of::<usize>()) as u64
    }

    pub fn line(&self, i: usize) -> &[u8] {
        let start = if i == 0 { 0 } else { self.ends[i - 1] };
        &self.data[start..self.ends[i]]
    }

    pub fn lines(&self) -> impl Iterator<Item = &[u8]> + '_ {
        (0..self.len()).map(move |i| self.line(i))
    }
}

/// Splits a byte source into [`RawChunk`]s of at most `chunk_size` rows.
pub struct ChunkReader<R> {
    source: R,
    chunk_size: usize,
    done: bool,
}

impl<R: BufRead> ChunkReader<R> {
    pub fn new(source: R, chunk_size: NonZeroUsize) -> Self {
        Self {
            source,
            chunk_size: chunk_size.get(),
            done: false,
        }
    }

    /// Read the next chunk, or `None` at end of input.
    pub fn next_chunk(&mut self) -> io::Result<Option<RawChunk>> {
        if self.done {
            return Ok(None);
        }

        let mut chunk = RawChunk {
            data: Vec::new(),
            ends: Vec::with_capacity(self.chunk_size.min(MAX_PREALLOC_LINES)),
            source_bytes: 0,
        };

        while chunk.ends.len() < self.chunk_size {
            let start = chunk.data.len();
            let n = self.source.read_until(b'\n', &mut chunk.data)?;
            if n == 0 {
                self.done = true;
                break;
            }
            chunk.source_bytes += n as u64;

            let mut end = chunk.data.len();
            if chunk.data[end - 1] == b'\n' {
                end -= 1;
            }
            if end > start && chunk.data[end - 1] == b'\r' {
                end -= 1;
            }
            chunk.data.truncate(end);

            if end > start {
                chunk.ends.push(end);
            }
        }

        if chunk.is_empty() {
            Ok(None)
        } else {
            Ok(Some(chunk))
        }
    }
}

impl<R: BufRead> Iterator for ChunkReader<R> {
    type Item = io::Result<RawChunk>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.next_chunk() {
            Ok(chunk) => chunk.map(Ok),
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

// ============================================================================
// Row Parsing
// ============================================================================

/// Borrowed view of one row's columns.
///
/// The four leading fields are guaranteed present once split succeeds; the
/// tail is kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowFields<'a> {
    pub row_id: &'a str,
    pub internal_track_id: &'a str,
    pub classification_code: &'a str,
    pub isrc: &'a str,
    pub description: Option<&'a str>,
    pub extra_fields: Vec<&'a str>,
}

impl<'a> RowFields<'a> {
    /// Split a decoded line on tabs. `None` if it has fewer than [`MIN_COLUMNS`] columns.
    pub fn split(line: &'a str) -> Option<Self> {
        let mut columns = line.split('\t');
        let row_id = columns.next()?;
        let internal_track_id = columns.next()?;
        let classification_code = columns.next()?;
        let isrc = columns.next()?;
        let description = columns.next().filter(|d| !d.is_empty());
        let extra_fields = columns.collect();

        Some(Self {
            row_id,
            internal_track_id,
            classification_code,
            isrc,
            description,
            extra_fields,
        })
    }

    fn into_record(self, interner: &mut StringInterner) -> ReferenceRecord {
        ReferenceRecord {
            row_id: self.row_id.to_string(),
            internal_track_id: self.internal_track_id.to_string(),
            classification_code: interner.intern(self.classification_code),
            isrc: self.isrc.to_string(),
            description: self.description.map(str::to_string),
            extra_fields: self.extra_fields.into_iter().map(str::to_string).collect(),
        }
    }
}

/// Outcome of parsing one raw line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedRow<'a> {
    Keyed { key: Isrc, fields: RowFields<'a> },
    Malformed,
    InvalidKey,
    Undecodable,
}

/// Decode, split and normalize one line. Pure, so safe to run on any thread.
pub fn parse_row(line: &[u8]) -> ParsedRow<'_> {
    let Ok(text) = std::str::from_utf8(line) else {
        return ParsedRow::Undecodable;
    };
    let Some(fields) = RowFields::split(text) else {
        return ParsedRow::Malformed;
    };
    match Isrc::parse(fields.isrc) {
        Some(key) => ParsedRow::Keyed { key, fields },
        None => ParsedRow::InvalidKey,
    }
}

// ============================================================================
// Index
// ============================================================================

/// Frozen ISRC -> reference record lookup. Built once by [`IndexBuilder`];
/// there is no way to mutate it afterwards.
#[derive(Debug, Default, PartialEq)]
pub struct ReferenceIndex {
    entries: FxHashMap<Isrc, ReferenceRecord>,
}

impl ReferenceIndex {
    pub fn get(&self, key: &Isrc) -> Option<&ReferenceRecord> {
        self.entries.get(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Isrc, &ReferenceRecord)> {
        self.entries.iter()
    }
}

/// Single writer for the index.
///
/// Feed chunks in read order with [`ingest_chunk`](Self::ingest_chunk), then
/// call [`finish`](Self::finish). A caller that stops early can still read
/// [`stats`](Self::stats), but never gets an index out of a partial build.
pub struct IndexBuilder {
    entries: FxHashMap<Isrc, ReferenceRecord>,
    interner: StringInterner,
    stats: IndexStats,
    record_bytes: usize,
    parallel_parse: bool,
}

impl IndexBuilder {
    pub fn new(parallel_parse: bool) -> Self {
        Self {
            entries: FxHashMap::default(),
            interner: StringInterner::new(),
            stats: IndexStats::default(),
            record_bytes: 0,
            parallel_parse,
        }
    }

    /// Counters so far.
    pub fn stats(&self) -> &IndexStats {
        &self.stats
    }

    /// Parse a chunk (in parallel if enabled) and insert its rows in order.
    pub fn ingest_chunk(&mut self, chunk: &RawChunk) {
        let rows: Vec<ParsedRow<'_>> = if self.parallel_parse {
            (0..chunk.len())
                .into_par_iter()
                .map(|i| parse_row(chunk.line(i)))
                .collect()
        } else {
            chunk.lines().map(parse_row).collect()
        };

        self.stats.chunks_read += 1;
        self.stats.largest_chunk_bytes = self.stats.largest_chunk_bytes.max(chunk.buffer_bytes());

        for row in rows {
            self.insert(row);
        }
    }

    fn insert(&mut self, row: ParsedRow<'_>) {
        self.stats.rows_processed += 1;
        match row {
            ParsedRow::Undecodable => self.stats.undecodable_rows += 1,
            ParsedRow::Malformed => self.stats.malformed_rows += 1,
            ParsedRow::InvalidKey => self.stats.invalid_keys += 1,
            ParsedRow::Keyed { key, fields } => {
                self.stats.valid_keys += 1;
                // First occurrence wins. A plain insert would overwrite.
                match self.entries.entry(key) {
                    Entry::Occupied(_) => self.stats.duplicate_keys += 1,
                    Entry::Vacant(slot) => {
                        let record = fields.into_record(&mut self.interner);
                        self.record_bytes += record.heap_bytes();
                        slot.insert(record);
                        self.stats.unique_keys += 1;
                    }
                }
            }
        }
    }

    /// Freeze the index.
    ///
    /// Fails only if rows were read and none of them decoded as UTF-8.
    pub fn finish(mut self) -> Result<(ReferenceIndex, IndexStats), IndexError> {
        let stats = &mut self.stats;
        if stats.rows_processed > 0 && stats.undecodable_rows == stats.rows_processed {
            return Err(IndexError::Undecodable {
                rows: stats.rows_processed,
            });
        }

        // Table slots (plus one control byte each) + owned strings + interned values
        let slot_bytes = self.entries.capacity() * (size_of::<(Isrc, ReferenceRecord)>() + 1);
        stats.index_bytes_estimate =
            (slot_bytes + self.record_bytes + self.interner.heap_bytes()) as u64;

        Ok((
            ReferenceIndex {
                entries: self.entries,
            },
            self.stats,
        ))
    }
}

// ============================================================================
// Build Pipeline
// ============================================================================

/// Build the index from a byte source.
///
/// A reader thread fills chunks and hands them over a bounded channel; this
/// thread parses and inserts them. `pb` is advanced by source bytes consumed.
pub fn build_index<R>(
    source: R,
    options: &BuildOptions,
    pb: &ProgressBar,
) -> Result<(ReferenceIndex, IndexStats), IndexError>
where
    R: BufRead + Send,
{
    let chunk_size = options.chunk_size;
    let (tx, rx) = bounded::<io::Result<RawChunk>>(options.prefetch_chunks);
    let mut builder = IndexBuilder::new(options.parallel_parse);
    let mut logger = RowLogger::new("INDEX", LOG_INTERVAL_ROWS);

    thread::scope(|scope| {
        scope.spawn(move || {
            for chunk in ChunkReader::new(source, chunk_size) {
                // Receiver gone means the consumer bailed out
                if tx.send(chunk).is_err() {
                    break;
                }
            }
        });

        for chunk in rx {
            let chunk = chunk?;
            builder.ingest_chunk(&chunk);
            pb.inc(chunk.source_bytes());

            let stats = builder.stats();
            logger.observe(stats.rows_processed, || {
                format!(
                    "{} unique ISRCs, {} duplicates, {} rejected",
                    format_count(stats.unique_keys),
                    format_count(stats.duplicate_keys),
                    format_count(stats.rejected_rows())
                )
            });
        }
        Ok::<(), IndexError>(())
    })?;

    builder.finish()
}

/// Open `path` and build the index from it.
pub fn build_index_from_path(
    path: &Path,
    options: &BuildOptions,
    pb: &ProgressBar,
) -> Result<(ReferenceIndex, IndexStats), IndexError> {
    let file = File::open(path).map_err(|source| IndexError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    build_index(BufReader::with_capacity(READ_BUFFER_BYTES, file), options, pb)
}

// ============================================================================
// TESTS
// ============================================================================
