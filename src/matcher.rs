//! Cross-reference a catalog against the frozen reference index.
//!
//! The matcher only reads the index. Identifiers go through the same
//! [`Isrc::parse`] the builder used for the keys; a miss is not an error.

use crate::index::ReferenceIndex;
use crate::models::{CatalogEntry, MatchResult, MatchStats};
use crate::normalize::Isrc;

/// Matches in catalog order, plus the counters for the pass.
#[derive(Debug, Clone)]
pub struct MatchOutcome<'a> {
    pub matches: Vec<MatchResult<'a>>,
    pub stats: MatchStats,
}

/// Probe the index once per catalog entry, preserving input order.
pub fn match_catalog<'a, I>(index: &'a ReferenceIndex, catalog: I) -> MatchOutcome<'a>
where
    I: IntoIterator<Item = &'a CatalogEntry>,
{
    let mut stats = MatchStats::default();
    let mut matches = Vec::new();

    for entry in catalog {
        stats.entries_examined += 1;

        let Some(raw) = entry.raw_isrc() else {
            stats.entries_without_identifier += 1;
            continue;
        };
        let Some(isrc) = Isrc::parse(raw) else {
            stats.entries_invalid_identifier += 1;
            continue;
        };
        stats.entries_with_identifier += 1;

        if let Some(reference) = index.get(&isrc) {
            stats.matches += 1;
            matches.push(MatchResult {
                entry,
                isrc_normalized: isrc,
                reference,
            });
        }
    }

    MatchOutcome { matches, stats }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::{build_index, BuildOptions};
    use crate::models::{IndexStats, RunStatistics};
    use indicatif::ProgressBar;
    use std::io::Cursor;

    fn build(tsv: &str) -> (ReferenceIndex, IndexStats) {
        build_index(
            Cursor::new(tsv.as_bytes().to_vec()),
            &BuildOptions::default(),
            &ProgressBar::hidden(),
        )
        .unwrap()
    }

    #[test]
    fn test_lowercase_identifier_matches() {
        let (index, _) = build("9\tR9\tPD\tUSA2P2314675\tR\n");
        let catalog = vec![CatalogEntry::new("Numb", Some("usa2p2314675"))];

        let outcome = match_catalog(&index, &catalog);
        assert_eq!(outcome.matches.len(), 1);
        let m = &outcome.matches[0];
        assert_eq!(m.entry.track_name, "Numb");
        assert_eq!(m.reference.row_id, "9");
        assert_eq!(m.reference.description.as_deref(), Some("R"));
        assert_eq!(m.isrc_normalized.as_str(), "USA2P2314675");
    }

    #[test]
    fn test_absent_key_is_not_a_match() {
        let (index, _) = build("1\tR1\tPD\tUSA2P2314675\n");
        let catalog = vec![CatalogEntry::new("Other", Some("GBAYE0601498"))];

        let outcome = match_catalog(&index, &catalog);
        assert!(outcome.matches.is_empty());
        assert_eq!(outcome.stats.entries_with_identifier, 1);
        assert_eq!(outcome.stats.matches, 0);
        assert_eq!(outcome.stats.entries_without_identifier, 0);
        assert_eq!(outcome.stats.entries_invalid_identifier, 0);
        assert_eq!(outcome.stats.unmatched(), 1);
    }

    #[test]
    fn test_missing_and_invalid_identifiers_counted() {
        let (index, _) = build("1\tR1\tPD\tUSA2P2314675\n");
        let catalog = vec![
            CatalogEntry::new("No ISRC", None),
            CatalogEntry::new("Blank", Some("   ")),
            CatalogEntry::new("Garbage", Some("N/A-123")),
        ];

        let stats = match_catalog(&index, &catalog).stats;
        assert_eq!(stats.entries_examined, 3);
        assert_eq!(stats.entries_without_identifier, 2);
        assert_eq!(stats.entries_invalid_identifier, 1);
        assert_eq!(stats.entries_with_identifier, 0);
        assert_eq!(stats.matches, 0);
    }

    #[test]
    fn test_matches_keep_catalog_order() {
        let (index, _) = build("1\tA\tPD\tUSA2P2314675\n2\tB\tPD\tDEBE72200740\n");
        let catalog = vec![
            CatalogEntry::new("second row", Some("DEBE72200740")),
            CatalogEntry::new("first row", Some("USA2P2314675")),
            CatalogEntry::new("second row again", Some("debe72200740")),
        ];

        let names: Vec<&str> = match_catalog(&index, &catalog)
            .matches
            .iter()
            .map(|m| m.entry.track_name.as_str())
            .collect();
        assert_eq!(names, vec!["second row", "first row", "second row again"]);
    }

    const E2E_TABLE: &str = "\
1\tT1\tPD\tUSA2P2314675\tfirst
2\tT2\tMW\tDEBE72200740\tsecond
3\tT3\tPD\tusa2p2314675\tduplicate of first
4\tT4\tPD
";

    fn e2e_catalog() -> Vec<CatalogEntry> {
        vec![
            CatalogEntry::new("Match A", Some("USA2P2314675")),
            CatalogEntry::new("Match B", Some("de be72200740")),
            CatalogEntry::new("No identifier", None),
            CatalogEntry::new("Not in table", Some("GBAYE0601498")),
        ]
    }

    #[test]
    fn test_end_to_end_scenario() {
        let (index, index_stats) = build(E2E_TABLE);
        let catalog = e2e_catalog();
        let outcome = match_catalog(&index, &catalog);
        let stats = RunStatistics::new(index_stats, outcome.stats.clone());

        assert_eq!(stats.index.unique_keys, 2);
        assert_eq!(stats.index.duplicate_keys, 1);
        assert_eq!(stats.index.malformed_rows, 1);
        assert_eq!(stats.matching.matches, 2);
        assert_eq!(stats.matching.entries_without_identifier, 1);
        assert_eq!(stats.matching.unmatched(), 1);

        // The duplicate row never replaced the first one
        assert_eq!(outcome.matches[0].reference.description.as_deref(), Some("first"));
        assert_eq!(outcome.matches[1].reference.row_id, "2");
    }

    #[test]
    fn test_pipeline_is_deterministic() {
        let run = || {
            let (index, index_stats) = build(E2E_TABLE);
            let catalog = e2e_catalog();
            let outcome = match_catalog(&index, &catalog);
            let json = serde_json::to_string(&outcome.matches).unwrap();
            (json, RunStatistics::new(index_stats, outcome.stats))
        };
        let (first_json, first_stats) = run();
        let (second_json, second_stats) = run();
        assert_eq!(first_json, second_json);
        assert_eq!(first_stats, second_stats);
    }

    #[test]
    fn test_match_serializes_flat() {
        let (index, _) = build("1\tT1\tPD\tUSA2P2314675\tWork\tx\n");
        let catalog = vec![CatalogEntry::new("Numb", Some(" usa2p2314675"))];
        let outcome = match_catalog(&index, &catalog);

        let value = serde_json::to_value(&outcome.matches[0]).unwrap();
        assert_eq!(value["track_name"], "Numb");
        assert_eq!(value["isrc"], " usa2p2314675");
        assert_eq!(value["isrc_normalized"], "USA2P2314675");
        assert_eq!(value["reference"]["internal_track_id"], "T1");
        assert_eq!(value["reference"]["classification_code"], "PD");
        assert_eq!(value["reference"]["extra_fields"][0], "x");
    }
}
