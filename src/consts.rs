//! Project-wide constants.

use std::num::NonZeroUsize;

/// Scheme the SQL iterator registers itself under.
pub const SQL_SCHEME: &str = "sql";

/// Iterator URI used by the front-end commands when none is given.
pub const DEFAULT_ITERATOR_URI: &str = "sql://sqlite3";

/// The one query every connection runs. No pagination.
pub const DOCUMENTS_QUERY: &str = "SELECT id, body FROM geojson";

/// Path marker for records whose body came from memory rather than a file.
pub const STDIN: &str = "STDIN";

/// Default number of rows processed simultaneously: one per logical CPU.
pub fn default_processes() -> usize {
    std::thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(1)
}

/// Format a number with comma separators (e.g. 1,234,567).
pub fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + s.len() / 3);
    for (i, c) in s.chars().enumerate() {
        if i > 0 && (s.len() - i).is_multiple_of(3) {
            result.push(',');
        }
        result.push(c);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_uri_uses_sql_scheme() {
        assert!(DEFAULT_ITERATOR_URI.starts_with(SQL_SCHEME));
    }

    #[test]
    fn default_processes_is_positive() {
        assert!(default_processes() >= 1);
    }

    #[test]
    fn query_targets_geojson_table() {
        assert!(DOCUMENTS_QUERY.ends_with("FROM geojson"));
    }

    #[test]
    fn format_number_small() {
        assert_eq!(format_number(0), "0");
        assert_eq!(format_number(37), "37");
        assert_eq!(format_number(999), "999");
    }

    #[test]
    fn format_number_thousands() {
        assert_eq!(format_number(1_000), "1,000");
        assert_eq!(format_number(12_345), "12,345");
        assert_eq!(format_number(1_234_567), "1,234,567");
    }
}
