//! Safety checks for the report output path.
//!
//! The reference table takes hours to re-download; a mistyped `--output`
//! must never overwrite it or the catalog source.

use anyhow::{bail, Result};
use std::path::Path;

/// Validates that a report path is safe to write.
///
/// Checks:
/// - Output must have a `.json` extension
/// - Output cannot be any of the source paths, including through a
///   different spelling of the same existing file
pub fn validate_output_path(output: &Path, source_paths: &[&Path]) -> Result<()> {
    let is_json = output
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("json"));
    if !is_json {
        bail!(
            "Safety check failed: output file '{}' must have a .json extension",
            output.display()
        );
    }

    for source in source_paths {
        let same_file = output == *source
            || matches!(
                (output.canonicalize(), source.canonicalize()),
                (Ok(a), Ok(b)) if a == b
            );
        if same_file {
            bail!(
                "Safety check failed: output '{}' cannot be the same as source '{}'",
                output.display(),
                source.display()
            );
        }
    }

    Ok(())
}
