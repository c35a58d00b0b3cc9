//! Fatal errors of the index engine.
//!
//! Only failures that make the reference table unusable as a whole end up
//! here. Bad rows are never errors; they are counted in
//! [`IndexStats`](crate::models::IndexStats) and skipped.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
#[non_exhaustive]
pub enum IndexError {
    /// The reference table could not be opened.
    #[error("cannot open reference table {}: {source}", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Reading failed partway through the table.
    #[error("failed to read reference table: {0}")]
    Read(#[from] io::Error),

    /// Rows were read but not a single one was valid UTF-8.
    #[error("reference table is not UTF-8: none of {rows} rows could be decoded")]
    Undecodable { rows: u64 },
}
