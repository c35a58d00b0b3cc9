//! Catalog sources.
//!
//! The engine only needs a list of [`CatalogEntry`]. These loaders turn the
//! two formats we get catalogs in into that list:
//!
//! - a JSON document, either a bare array of tracks or an object with a
//!   `catalog` array (the layout of earlier `results.json` exports);
//! - a Spotify metadata dump in SQLite, filtered to one artist.

use anyhow::{Context, Result};
use rusqlite::{Connection, OpenFlags};
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::models::{AlbumType, CatalogEntry};

/// Placeholder older exports write when a track has no ISRC.
pub const MISSING_ISRC: &str = "N/A";

/// Where the catalog comes from.
#[derive(Debug, Clone)]
pub enum CatalogSource {
    Json(PathBuf),
    SpotifyDump { db: PathBuf, artist: String },
}

impl CatalogSource {
    pub fn load(&self) -> Result<Vec<CatalogEntry>> {
        match self {
            CatalogSource::Json(path) => load_json_catalog(path),
            CatalogSource::SpotifyDump { db, artist } => open_spotify_catalog(db, artist),
        }
    }

    /// File backing this source.
    pub fn path(&self) -> &Path {
        match self {
            CatalogSource::Json(path) => path,
            CatalogSource::SpotifyDump { db, .. } => db,
        }
    }
}

impl fmt::Display for CatalogSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CatalogSource::Json(path) => write!(f, "{}", path.display()),
            CatalogSource::SpotifyDump { db, artist } => {
                write!(f, "{} (artist: {})", db.display(), artist)
            }
        }
    }
}

// ============================================================================
// JSON
// ============================================================================

#[derive(Deserialize)]
#[serde(untagged)]
enum CatalogDocument {
    Entries(Vec<CatalogEntry>),
    Wrapped { catalog: Vec<CatalogEntry> },
}

/// Parse a JSON catalog document.
pub fn parse_json_catalog(json: &str) -> Result<Vec<CatalogEntry>> {
    let document: CatalogDocument =
        serde_json::from_str(json).context("Catalog JSON is neither a track array nor an object with a `catalog` array")?;
    let mut entries = match document {
        CatalogDocument::Entries(entries) => entries,
        CatalogDocument::Wrapped { catalog } => catalog,
    };
    for entry in &mut entries {
        if entry
            .isrc
            .as_deref()
            .is_some_and(|isrc| isrc.trim().eq_ignore_ascii_case(MISSING_ISRC))
        {
            entry.isrc = None;
        }
    }
    Ok(entries)
}

pub fn load_json_catalog(path: &Path) -> Result<Vec<CatalogEntry>> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read catalog {:?}", path))?;
    parse_json_catalog(&json).with_context(|| format!("Failed to parse catalog {:?}", path))
}

// ============================================================================
// Spotify SQLite dump
// ============================================================================

/// Open a Spotify dump read-only and load one artist's tracks.
pub fn open_spotify_catalog(db: &Path, artist: &str) -> Result<Vec<CatalogEntry>> {
    let conn = Connection::open_with_flags(db, OpenFlags::SQLITE_OPEN_READ_ONLY)
        .with_context(|| format!("Failed to open Spotify database {:?}", db))?;
    load_spotify_catalog(&conn, artist)
}

/// All tracks credited to `artist`, in dump order.
///
/// The name comparison uses SQLite `LOWER`, which only folds ASCII: "jay-z"
/// finds "JAY-Z", but "björk" does not find "BJÖRK". Pass non-ASCII names
/// with the dump's exact casing.
pub fn load_spotify_catalog(conn: &Connection, artist: &str) -> Result<Vec<CatalogEntry>> {
    let mut stmt = conn.prepare(
        "SELECT t.id, t.name, al.name, al.album_type, t.duration_ms, t.popularity, t.external_id_isrc
         FROM tracks t
         LEFT JOIN albums al ON al.rowid = t.album_rowid
         WHERE t.rowid IN (
             SELECT ta.track_rowid
             FROM track_artists ta
             JOIN artists a ON a.rowid = ta.artist_rowid
             WHERE LOWER(a.name) = LOWER(?1)
         )
         ORDER BY t.rowid",
    )?;

    let mut rows = stmt.query([artist])?;
    let mut entries = Vec::new();

    while let Some(row) = rows.next()? {
        let album_type: Option<String> = row.get(3)?;
        entries.push(CatalogEntry {
            track_id: row.get(0)?,
            track_name: row.get(1)?,
            album_name: row.get(2)?,
            album_type: AlbumType::from(album_type.as_deref()),
            release_date: None,
            track_number: None,
            duration_ms: row.get(4)?,
            isrc: row.get(6)?,
            explicit: None,
            popularity: row.get(5)?,
        });
    }

    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bare_array() {
        let json = r#"[
            {"track_id": "a", "track_name": "One", "isrc": "USA2P2314675"},
            {"track_id": "b", "track_name": "Two"}
        ]"#;
        let entries = parse_json_catalog(json).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].isrc.as_deref(), Some("USA2P2314675"));
        assert_eq!(entries[1].isrc, None);
    }

    #[test]
    fn test_parse_wrapped_document_ignores_other_fields() {
        let json = r#"{
            "artist": {"name": "Linkin Park", "followers": 1},
            "catalog": [
                {"track_id": "a", "track_name": "Numb", "album_name": "Meteora",
                 "album_type": "album", "release_date": "2003-03-25",
                 "track_number": 13, "duration_ms": 185586, "isrc": "USWB10300474",
                 "explicit": false, "popularity": 80}
            ],
            "matches": [],
            "stats": {"total_tracks": 1}
        }"#;
        let entries = parse_json_catalog(json).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].album_type, AlbumType::Album);
        assert_eq!(entries[0].release_date.as_deref(), Some("2003-03-25"));
        assert_eq!(entries[0].popularity, Some(80));
    }

    #[test]
    fn test_missing_isrc_placeholder_is_absent() {
        let json = r#"[
            {"track_name": "One", "isrc": "N/A"},
            {"track_name": "Two", "isrc": " n/a "}
        ]"#;
        let entries = parse_json_catalog(json).unwrap();
        assert!(entries.iter().all(|e| e.isrc.is_none()));
    }

    #[test]
    fn test_null_pass_through_fields_keep_entry() {
        let json = r#"[
            {"track_name": "One", "album_type": null, "isrc": "USA2P2314675"},
            {"track_name": null, "isrc": "DEBE72200740"},
            {"track_name": "Three", "isrc": null}
        ]"#;
        let entries = parse_json_catalog(json).unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].album_type, AlbumType::Unknown);
        assert_eq!(entries[0].isrc.as_deref(), Some("USA2P2314675"));
        assert_eq!(entries[1].track_name, "");
        assert_eq!(entries[1].isrc.as_deref(), Some("DEBE72200740"));
        assert_eq!(entries[2].isrc, None);
    }

    #[test]
    fn test_parse_rejects_unknown_shape() {
        assert!(parse_json_catalog(r#"{"tracks": []}"#).is_err());
        assert!(parse_json_catalog("not json").is_err());
    }

    #[test]
    fn test_load_json_catalog_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.json");
        std::fs::write(&path, r#"[{"track_name": "One", "isrc": "USA2P2314675"}]"#).unwrap();
        let entries = CatalogSource::Json(path.clone()).load().unwrap();
        assert_eq!(entries.len(), 1);

        let err = load_json_catalog(&dir.path().join("missing.json")).unwrap_err();
        assert!(err.to_string().contains("Failed to read catalog"));
    }

    fn spotify_fixture() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE artists (name TEXT NOT NULL);
             CREATE TABLE albums (name TEXT, album_type TEXT);
             CREATE TABLE tracks (
                 id TEXT NOT NULL,
                 name TEXT NOT NULL,
                 duration_ms INTEGER,
                 popularity INTEGER,
                 external_id_isrc TEXT,
                 album_rowid INTEGER
             );
             CREATE TABLE track_artists (track_rowid INTEGER, artist_rowid INTEGER);

             INSERT INTO artists (name) VALUES ('Linkin Park'), ('Jay-Z');
             INSERT INTO albums (name, album_type) VALUES ('Meteora', 'album'), ('Collision Course', 'compilation');
             INSERT INTO tracks VALUES ('t1', 'Numb', 185586, 80, 'USWB10300474', 1);
             INSERT INTO tracks VALUES ('t2', 'Numb / Encore', 205000, 70, NULL, 2);
             INSERT INTO tracks VALUES ('t3', 'Izzo', 240000, 60, 'USDJ20100123', NULL);
             INSERT INTO track_artists VALUES (1, 1), (2, 1), (2, 2), (3, 2);",
        )
        .unwrap();
        conn
    }

    #[test]
    fn test_load_spotify_catalog_filters_artist() {
        let conn = spotify_fixture();
        let entries = load_spotify_catalog(&conn, "linkin park").unwrap();
        let ids: Vec<&str> = entries.iter().map(|e| e.track_id.as_str()).collect();
        assert_eq!(ids, vec!["t1", "t2"]);

        assert_eq!(entries[0].album_name.as_deref(), Some("Meteora"));
        assert_eq!(entries[0].album_type, AlbumType::Album);
        assert_eq!(entries[0].isrc.as_deref(), Some("USWB10300474"));
        assert_eq!(entries[1].album_type, AlbumType::Compilation);
        assert_eq!(entries[1].isrc, None);
    }

    #[test]
    fn test_load_spotify_catalog_track_without_album() {
        let conn = spotify_fixture();
        let entries = load_spotify_catalog(&conn, "JAY-Z").unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].album_name, None);
        assert_eq!(entries[1].album_type, AlbumType::Unknown);
    }

    #[test]
    fn test_artist_match_folds_ascii_only() {
        let conn = spotify_fixture();
        conn.execute_batch(
            "INSERT INTO artists (name) VALUES ('BJÖRK');
             INSERT INTO tracks VALUES ('t4', 'Army of Me', 234000, 55, 'GBAAN9500012', NULL);
             INSERT INTO track_artists VALUES (4, 3);",
        )
        .unwrap();
        assert_eq!(load_spotify_catalog(&conn, "BJÖRK").unwrap().len(), 1);
        assert_eq!(load_spotify_catalog(&conn, "bjÖrk").unwrap().len(), 1);
        assert!(load_spotify_catalog(&conn, "björk").unwrap().is_empty());
    }

    #[test]
    fn test_unknown_artist_is_empty() {
        let conn = spotify_fixture();
        assert!(load_spotify_catalog(&conn, "Radiohead").unwrap().is_empty());
    }
}
