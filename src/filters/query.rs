//! Rules of the form `{path}={regex}` evaluated against JSON documents.

use std::fmt;
use std::str::FromStr;

use anyhow::{Context, Result, bail};
use regex::Regex;
use serde_json::Value;

/// How the rules of a [`QuerySet`] combine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum QueryMode {
    /// Every rule must match.
    #[default]
    All,
    /// At least one rule must match.
    Any,
}

impl FromStr for QueryMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "ALL" => Ok(QueryMode::All),
            "ANY" => Ok(QueryMode::Any),
            other => bail!("unknown query mode '{other}', expected ALL or ANY"),
        }
    }
}

impl fmt::Display for QueryMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryMode::All => f.write_str("ALL"),
            QueryMode::Any => f.write_str("ANY"),
        }
    }
}

/// A single rule: a dotted path into the document and a pattern its value must match.
#[derive(Debug, Clone)]
pub struct Query {
    path: Vec<String>,
    pattern: Regex,
}

impl Query {
    pub fn path(&self) -> String {
        self.path
            .iter()
            .map(|key| key.replace('.', "\\."))
            .collect::<Vec<_>>()
            .join(".")
    }

    pub fn matches(&self, doc: &Value) -> bool {
        lookup(doc, &self.path).is_some_and(|value| value_matches(value, &self.pattern))
    }
}

impl FromStr for Query {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let Some((path, pattern)) = s.split_once('=') else {
            bail!("invalid query '{s}', expected {{path}}={{regex}}");
        };

        let path = split_path(path);
        if path.is_empty() || path.iter().any(String::is_empty) {
            bail!("invalid query '{s}', path is empty");
        }

        let pattern =
            Regex::new(pattern).with_context(|| format!("invalid pattern in query '{s}'"))?;

        Ok(Self { path, pattern })
    }
}

/// A group of rules combined by a [`QueryMode`].
#[derive(Debug, Clone)]
pub struct QuerySet {
    queries: Vec<Query>,
    mode: QueryMode,
}

impl QuerySet {
    pub fn new(queries: Vec<Query>, mode: QueryMode) -> Self {
        Self { queries, mode }
    }

    /// Parse every rule string. Fails on the first invalid rule.
    pub fn parse<S: AsRef<str>>(rules: &[S], mode: QueryMode) -> Result<Self> {
        let queries = rules
            .iter()
            .map(|rule| rule.as_ref().parse())
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::new(queries, mode))
    }

    pub fn len(&self) -> usize {
        self.queries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queries.is_empty()
    }

    pub fn mode(&self) -> QueryMode {
        self.mode
    }

    pub fn matches(&self, doc: &Value) -> bool {
        if self.queries.is_empty() {
            return false;
        }
        match self.mode {
            QueryMode::All => self.queries.iter().all(|q| q.matches(doc)),
            QueryMode::Any => self.queries.iter().any(|q| q.matches(doc)),
        }
    }
}

/// Split on unescaped dots; `\.` stays a literal dot inside a key.
fn split_path(path: &str) -> Vec<String> {
    let mut keys = Vec::new();
    let mut current = String::new();
    let mut chars = path.chars();

    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some(next) => current.push(next),
                None => current.push('\\'),
            },
            '.' => keys.push(std::mem::take(&mut current)),
            c => current.push(c),
        }
    }
    keys.push(current);
    keys
}

fn lookup<'a>(doc: &'a Value, path: &[String]) -> Option<&'a Value> {
    path.iter().try_fold(doc, |current, key| match current {
        Value::Object(map) => map.get(key),
        Value::Array(items) => key.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

fn value_matches(value: &Value, pattern: &Regex) -> bool {
    match value {
        Value::Null => false,
        Value::String(s) => pattern.is_match(s),
        Value::Array(items) => items.iter().any(|item| value_matches(item, pattern)),
        other => pattern.is_match(&other.to_string()),
    }
}
