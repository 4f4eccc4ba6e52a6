pub mod query;

use std::io::Seek;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::Value;

use crate::record::RecordBody;
use query::{QueryMode, QuerySet};

/// Decides whether a document body is included.
///
/// Implementations may read the body freely; the caller rewinds it before
/// handing it on.
#[async_trait]
pub trait Filter: Send + Sync {
    async fn accept(&self, body: &mut RecordBody) -> Result<bool>;
}

/// Include/exclude rule sets built once from the iterator URI.
#[derive(Debug, Clone)]
pub struct QueryFilters {
    include: Option<QuerySet>,
    exclude: Option<QuerySet>,
}

impl QueryFilters {
    /// Build filters from raw rule strings. Returns `None` when there are no rules.
    pub fn from_rules<S: AsRef<str>>(
        include: &[S],
        include_mode: QueryMode,
        exclude: &[S],
        exclude_mode: QueryMode,
    ) -> Result<Option<Self>> {
        if include.is_empty() && exclude.is_empty() {
            return Ok(None);
        }

        let include = (!include.is_empty())
            .then(|| QuerySet::parse(include, include_mode))
            .transpose()
            .context("invalid include rule")?;
        let exclude = (!exclude.is_empty())
            .then(|| QuerySet::parse(exclude, exclude_mode))
            .transpose()
            .context("invalid exclude rule")?;

        Ok(Some(Self { include, exclude }))
    }

    pub fn include(&self) -> Option<&QuerySet> {
        self.include.as_ref()
    }

    pub fn exclude(&self) -> Option<&QuerySet> {
        self.exclude.as_ref()
    }

    pub fn accepts(&self, doc: &Value) -> bool {
        if let Some(include) = &self.include
            && !include.matches(doc)
        {
            return false;
        }
        if let Some(exclude) = &self.exclude
            && exclude.matches(doc)
        {
            return false;
        }
        true
    }
}

#[async_trait]
impl Filter for QueryFilters {
    async fn accept(&self, body: &mut RecordBody) -> Result<bool> {
        body.rewind()?;
        let doc: Value =
            serde_json::from_reader(&mut *body).context("failed to parse document body as JSON")?;
        body.rewind()?;
        Ok(self.accepts(&doc))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    fn feature(uri: &str) -> RecordBody {
        RecordBody::from(format!(
            r#"{{"type":"Feature","properties":{{"sfomuseum:uri":"{uri}","wof:placetype":"custom"}}}}"#
        ))
    }

    fn filters(include: &[&str], exclude: &[&str]) -> QueryFilters {
        QueryFilters::from_rules(include, QueryMode::All, exclude, QueryMode::All)
            .unwrap()
            .unwrap()
    }

    #[test]
    fn no_rules_means_no_filters() {
        let none: &[&str] = &[];
        let built = QueryFilters::from_rules(none, QueryMode::All, none, QueryMode::Any).unwrap();
        assert!(built.is_none());
    }

    #[test]
    fn bad_rule_fails_construction() {
        let err = QueryFilters::from_rules(&["properties"], QueryMode::All, &[], QueryMode::All)
            .unwrap_err();
        assert!(format!("{err:#}").contains("invalid include rule"));
    }

    #[tokio::test]
    async fn include_keeps_matching_documents() {
        let f = filters(&["properties.sfomuseum:uri=2019"], &[]);
        assert!(f.accept(&mut feature("2019")).await.unwrap());
        assert!(!f.accept(&mut feature("1983")).await.unwrap());
    }

    #[tokio::test]
    async fn exclude_drops_matching_documents() {
        let f = filters(&[], &["properties.sfomuseum:uri=2019"]);
        assert!(!f.accept(&mut feature("2019")).await.unwrap());
        assert!(f.accept(&mut feature("1983")).await.unwrap());
    }

    #[tokio::test]
    async fn include_and_exclude_combine() {
        let f = filters(&["properties.wof:placetype=custom"], &["properties.sfomuseum:uri=^198"]);
        assert!(f.accept(&mut feature("2019")).await.unwrap());
        assert!(!f.accept(&mut feature("1983")).await.unwrap());
    }

    #[tokio::test]
    async fn body_is_rewound_after_accept() {
        let f = filters(&["properties.sfomuseum:uri=2019"], &[]);
        let mut body = feature("2019");
        f.accept(&mut body).await.unwrap();

        let mut text = String::new();
        body.read_to_string(&mut text).unwrap();
        assert!(text.starts_with(r#"{"type":"Feature""#));
    }

    #[tokio::test]
    async fn invalid_json_is_an_error() {
        let f = filters(&["properties.sfomuseum:uri=2019"], &[]);
        let mut body = RecordBody::new("not json");
        assert!(f.accept(&mut body).await.is_err());
    }
}
