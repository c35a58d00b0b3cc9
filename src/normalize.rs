//! ISRC normalization shared by the index builder and the matcher.
//!
//! CRITICAL: both sides of the cross-reference go through [`Isrc::parse`].
//! A second normalization path anywhere in the crate silently breaks every
//! match. `Isrc` has no other constructor.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Serialize, Serializer};
use std::fmt;

/// Length of a normalized ISRC (2 letters + 10 alphanumerics).
pub const ISRC_LEN: usize = 12;

/// Full ISO 3901 shape: country (2 letters), registrant (3 alphanumerics),
/// year + designation (7 digits). Diagnostic only; keys are accepted on the
/// looser [`Isrc`] format.
pub static ISO3901_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Z]{2}[A-Z0-9]{3}\d{7}$").unwrap());

/// Canonical ISRC key: uppercase, whitespace-free, fixed width.
///
/// Stored inline as 12 ASCII bytes.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Isrc([u8; ISRC_LEN]);

impl Isrc {
    /// Normalize a raw identifier: drop all whitespace, uppercase, then check
    /// the format. Returns `None` for anything that does not reduce to
    /// 2 ASCII letters followed by 10 ASCII alphanumerics.
    ///
    /// ```
    /// use isrc_crossref::normalize::Isrc;
    ///
    /// let isrc = Isrc::parse(" de be72200740 ").unwrap();
    /// assert_eq!(isrc.as_str(), "DEBE72200740");
    /// assert!(Isrc::parse("12345").is_none());
    /// ```
    pub fn parse(raw: &str) -> Option<Isrc> {
        let mut code = [0u8; ISRC_LEN];
        let mut len = 0;

        for c in raw.chars().filter(|c| !c.is_whitespace()) {
            if len == ISRC_LEN || !c.is_ascii_alphanumeric() {
                return None;
            }
            code[len] = c.to_ascii_uppercase() as u8;
            len += 1;
        }

        if len != ISRC_LEN || !code[..2].iter().all(u8::is_ascii_alphabetic) {
            return None;
        }
        Some(Isrc(code))
    }

    pub fn as_str(&self) -> &str {
        // Only ASCII alphanumerics are ever stored.
        std::str::from_utf8(&self.0).unwrap_or_default()
    }

    /// Whether the key also fits the stricter ISO 3901 layout
    /// (3-character registrant + 7-digit year/designation).
    pub fn is_iso3901(&self) -> bool {
        ISO3901_PATTERN.is_match(self.as_str())
    }
}

impl fmt::Display for Isrc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Debug for Isrc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Isrc({})", self.as_str())
    }
}

impl Serialize for Isrc {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

// ============================================================================
// TESTS
// ============================================================================
