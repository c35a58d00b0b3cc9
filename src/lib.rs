//! ISRC cross-reference library - shared modules for all binaries.

pub mod catalog;
pub mod error;
pub mod index;
pub mod inspect;
pub mod matcher;
pub mod models;
pub mod normalize;
pub mod progress;
pub mod report;
pub mod safety;

pub use error::IndexError;
pub use index::{build_index, build_index_from_path, BuildOptions, ReferenceIndex};
pub use matcher::{match_catalog, MatchOutcome};
pub use models::{CatalogEntry, IndexStats, MatchResult, MatchStats, ReferenceRecord, RunStatistics};
pub use normalize::Isrc;
