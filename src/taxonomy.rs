//src/taxonomy.rs

use crate::error::{EvalError, Result};

/// Separator between rank labels, e.g. `k__Bacteria;p__Firmicutes`.
pub const RANK_DELIMITER: char = ';';

/// Number of ranks in a taxonomy string.
pub fn rank_count(taxonomy: &str) -> usize {
    taxonomy.split(RANK_DELIMITER).count()
}

/// Remove every whitespace character, so `k__Bacteria; p__Firmicutes` and
/// `k__Bacteria;p__Firmicutes` name the same taxon.
pub fn strip_whitespace(taxonomy: &str) -> String {
    taxonomy.chars().filter(|c| !c.is_whitespace()).collect()
}

/// Keep the first `depth` ranks of `taxonomy`, re-joined with `;`.
///
/// Labels are kept verbatim, so two strings only compare equal when every
/// retained label is byte-identical.
pub fn truncate_taxonomy(taxonomy: &str, depth: usize) -> Result<String> {
    if depth == 0 {
        return Err(EvalError::InvalidLevel(depth.to_string()));
    }

    // Byte offset of the delimiter closing rank `depth`, if any
    match taxonomy.match_indices(RANK_DELIMITER).nth(depth - 1) {
        Some((end, _)) => Ok(taxonomy[..end].to_string()),
        None if rank_count(taxonomy) == depth => Ok(taxonomy.to_string()),
        None => Err(EvalError::TaxonomyTooShallow {
            taxonomy: taxonomy.to_string(),
            depth,
        }),
    }
}

/// Parse a level label such as `6` or `L6` into a depth.
pub fn parse_level(label: &str) -> Result<usize> {
    let trimmed = label.trim();
    let digits = trimmed
        .strip_prefix('L')
        .or_else(|| trimmed.strip_prefix('l'))
        .unwrap_or(trimmed);
    match digits.parse::<usize>() {
        Ok(depth) if depth > 0 => Ok(depth),
        _ => Err(EvalError::InvalidLevel(label.to_string())),
    }
}
