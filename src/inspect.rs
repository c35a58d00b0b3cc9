//! Quick structural check of a reference table from its first rows.
//!
//! Answers "is this the file we think it is" before committing to a
//! multi-minute index build: column counts, whether column 3 holds ISRCs,
//! and how many of those fit the full ISO 3901 layout.

use std::collections::BTreeMap;
use std::io::{self, BufRead};
use std::num::NonZeroUsize;

use crate::index::{ChunkReader, RowFields};
use crate::normalize::Isrc;

/// Raw key values kept for display.
const MAX_SAMPLES: usize = 3;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DatasetSample {
    pub rows: usize,
    pub undecodable: usize,
    /// Column count -> rows with that many columns
    pub column_counts: BTreeMap<usize, usize>,
    /// Rows with at least the key column
    pub with_key_column: usize,
    pub normalized_keys: usize,
    pub iso3901_keys: usize,
    pub sample_keys: Vec<String>,
}

impl DatasetSample {
    pub fn has_expected_structure(&self) -> bool {
        self.with_key_column > 0
    }
}

/// Read up to `rows` non-blank rows and tally them.
pub fn sample_dataset<R: BufRead>(source: R, rows: NonZeroUsize) -> io::Result<DatasetSample> {
    let mut sample = DatasetSample::default();
    let Some(chunk) = ChunkReader::new(source, rows).next_chunk()? else {
        return Ok(sample);
    };

    for line in chunk.lines() {
        sample.rows += 1;
        let Ok(text) = std::str::from_utf8(line) else {
            sample.undecodable += 1;
            continue;
        };
        *sample.column_counts.entry(text.split('\t').count()).or_default() += 1;

        let Some(fields) = RowFields::split(text) else {
            continue;
        };
        sample.with_key_column += 1;
        if sample.sample_keys.len() < MAX_SAMPLES {
            sample.sample_keys.push(fields.isrc.to_string());
        }
        if let Some(isrc) = Isrc::parse(fields.isrc) {
            sample.normalized_keys += 1;
            if isrc.is_iso3901() {
                sample.iso3901_keys += 1;
            }
        }
    }

    Ok(sample)
}
