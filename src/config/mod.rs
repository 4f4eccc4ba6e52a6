//! Iterator configuration parsed from a URI.
//!
//! ```text
//! sql://{engine}?include=...&exclude=...&include_mode=...&exclude_mode=...&processes=N
//! ```
//!
//! `include` and `exclude` may repeat. Modes are `ALL` (default) or `ANY`.
//! `processes` defaults to the number of logical CPUs.

use url::Url;

use crate::consts::default_processes;
use crate::error::{Error, Result};
use crate::filters::QueryFilters;
use crate::filters::query::QueryMode;

/// Everything an iterator needs, validated up front.
#[derive(Debug, Clone)]
pub struct IteratorConfig {
    pub scheme: String,
    /// Name of the database driver, taken from the URI host.
    pub engine: String,
    /// Maximum number of rows processed simultaneously.
    pub processes: usize,
    pub filters: Option<QueryFilters>,
}

impl IteratorConfig {
    pub fn from_uri(uri: &str) -> Result<Self> {
        let parsed =
            Url::parse(uri).map_err(|e| Error::config(uri, format!("failed to parse URI, {e}")))?;

        let engine = parsed.host_str().unwrap_or_default().to_string();
        if engine.is_empty() {
            return Err(Error::config(uri, "missing database engine"));
        }

        let mut include = Vec::new();
        let mut exclude = Vec::new();
        let mut include_mode = None;
        let mut exclude_mode = None;
        let mut processes = None;

        for (key, value) in parsed.query_pairs() {
            match key.as_ref() {
                "include" => include.push(value.into_owned()),
                "exclude" => exclude.push(value.into_owned()),
                "include_mode" => {
                    include_mode.get_or_insert(value.into_owned());
                }
                "exclude_mode" => {
                    exclude_mode.get_or_insert(value.into_owned());
                }
                "processes" => {
                    processes.get_or_insert(value.into_owned());
                }
                other => tracing::debug!(uri, parameter = other, "Ignoring unknown parameter"),
            }
        }

        let processes = match processes.as_deref() {
            None | Some("") => default_processes(),
            Some(raw) => parse_processes(raw).map_err(|reason| {
                Error::config(uri, format!("failed to parse 'processes' parameter, {reason}"))
            })?,
        };

        let include_mode = parse_mode(uri, "include_mode", include_mode.as_deref())?;
        let exclude_mode = parse_mode(uri, "exclude_mode", exclude_mode.as_deref())?;

        let filters = QueryFilters::from_rules(&include, include_mode, &exclude, exclude_mode)
            .map_err(|e| Error::config(uri, format!("failed to create query filters, {e:#}")))?;

        Ok(Self {
            scheme: parsed.scheme().to_string(),
            engine,
            processes,
            filters,
        })
    }
}

fn parse_processes(raw: &str) -> std::result::Result<usize, String> {
    match raw.parse::<usize>() {
        Ok(0) => Err("must be at least 1".to_string()),
        Ok(n) => Ok(n),
        Err(e) => Err(e.to_string()),
    }
}

fn parse_mode(uri: &str, name: &str, raw: Option<&str>) -> Result<QueryMode> {
    match raw {
        None | Some("") => Ok(QueryMode::default()),
        Some(raw) => raw
            .parse()
            .map_err(|e| Error::config(uri, format!("invalid '{name}' parameter, {e}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_comes_from_host() {
        let config = IteratorConfig::from_uri("sql://sqlite3").unwrap();
        assert_eq!(config.scheme, "sql");
        assert_eq!(config.engine, "sqlite3");
        assert!(config.filters.is_none());
    }

    #[test]
    fn processes_defaults_to_cpu_count() {
        let config = IteratorConfig::from_uri("sql://sqlite3").unwrap();
        assert_eq!(config.processes, default_processes());

        let config = IteratorConfig::from_uri("sql://sqlite3?processes=").unwrap();
        assert_eq!(config.processes, default_processes());
    }

    #[test]
    fn processes_is_parsed() {
        let config = IteratorConfig::from_uri("sql://sqlite3?processes=10").unwrap();
        assert_eq!(config.processes, 10);
    }

    #[test]
    fn first_processes_wins() {
        let config = IteratorConfig::from_uri("sql://sqlite3?processes=2&processes=8").unwrap();
        assert_eq!(config.processes, 2);
    }

    #[test]
    fn invalid_processes_is_a_config_error() {
        for uri in [
            "sql://sqlite3?processes=ten",
            "sql://sqlite3?processes=-1",
            "sql://sqlite3?processes=0",
        ] {
            let err = IteratorConfig::from_uri(uri).unwrap_err();
            assert!(matches!(err, Error::Config { .. }), "{uri}");
            assert!(err.to_string().contains("processes"));
        }
    }

    #[test]
    fn malformed_uri_is_a_config_error() {
        assert!(matches!(
            IteratorConfig::from_uri("not a uri").unwrap_err(),
            Error::Config { .. }
        ));
        assert!(matches!(
            IteratorConfig::from_uri("sql://").unwrap_err(),
            Error::Config { .. }
        ));
    }

    #[test]
    fn include_and_exclude_rules_build_filters() {
        let config = IteratorConfig::from_uri(
            "sql://sqlite3?include=properties.sfomuseum:uri=2019&include=properties.wof:placetype=custom&include_mode=ANY&exclude=properties.mz:is_current=0",
        )
        .unwrap();

        let filters = config.filters.unwrap();
        let include = filters.include().unwrap();
        assert_eq!(include.len(), 2);
        assert_eq!(include.mode(), QueryMode::Any);
        assert_eq!(filters.exclude().unwrap().mode(), QueryMode::All);
    }

    #[test]
    fn invalid_rule_is_a_config_error() {
        let err = IteratorConfig::from_uri("sql://sqlite3?include=properties.uri").unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
        assert!(err.to_string().contains("query filters"));
    }

    #[test]
    fn invalid_mode_is_a_config_error() {
        let err = IteratorConfig::from_uri(
            "sql://sqlite3?include=properties.sfomuseum:uri=2019&include_mode=SOME",
        )
        .unwrap_err();
        assert!(err.to_string().contains("include_mode"));
    }

    #[test]
    fn unknown_parameters_are_ignored() {
        let config = IteratorConfig::from_uri("sql://sqlite3?retries=3").unwrap();
        assert_eq!(config.engine, "sqlite3");
    }
}
