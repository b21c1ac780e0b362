use std::collections::BTreeMap;

use serde::Serialize;

/// Query parameters the page classifier interprets itself. Everything else is
/// handed to templates as a custom parameter.
pub const RESERVED_PARAMETERS: [&str; 6] = ["entry", "anchor", "date", "cat", "page", "tags"];

/// Multi-valued request parameters keyed by name.
///
/// Values keep the order in which they appeared in the query string. Names
/// are ordered, which keeps iteration (and therefore cache keys) canonical.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct QueryParams {
    values: BTreeMap<String, Vec<String>>,
}

impl QueryParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a raw (still encoded) query string.
    pub fn parse(query: &str) -> Self {
        let mut params = Self::new();
        for (name, value) in url::form_urlencoded::parse(query.as_bytes()) {
            params.append(name.into_owned(), value.into_owned());
        }
        params
    }

    pub fn append(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.values
            .entry(name.into())
            .or_default()
            .push(value.into());
    }

    /// First value for `name`, the way a servlet container answers
    /// `getParameter`.
    pub fn first(&self, name: &str) -> Option<&str> {
        self.values
            .get(name)
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    pub fn all(&self, name: &str) -> &[String] {
        self.values.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<Vec<String>> {
        self.values.remove(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.values
            .iter()
            .map(|(name, values)| (name.as_str(), values.as_slice()))
    }

    /// Copy of these parameters without the reserved classifier names.
    pub fn without_reserved(&self) -> Self {
        let mut custom = self.clone();
        for name in RESERVED_PARAMETERS {
            custom.remove(name);
        }
        custom
    }
}

impl<K, V> FromIterator<(K, V)> for QueryParams
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = Self::new();
        for (name, value) in iter {
            params.append(name, value);
        }
        params
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_keeps_repeated_values_in_order() {
        let params = QueryParams::parse("x=1&y=2&x=3&flag");
        assert_eq!(params.all("x"), ["1", "3"]);
        assert_eq!(params.first("x"), Some("1"));
        assert_eq!(params.first("flag"), Some(""));
        assert_eq!(params.first("missing"), None);
        assert!(params.all("missing").is_empty());
    }

    #[test]
    fn parse_decodes_names_and_values() {
        let params = QueryParams::parse("cat=Web%20Dev&tags=a+b");
        assert_eq!(params.first("cat"), Some("Web Dev"));
        assert_eq!(params.first("tags"), Some("a b"));
    }

    #[test]
    fn without_reserved_strips_only_classifier_names() {
        let params: QueryParams = [
            ("entry", "x"),
            ("anchor", "x"),
            ("date", "x"),
            ("cat", "x"),
            ("page", "x"),
            ("tags", "x"),
            ("sort", "asc"),
            ("sort", "desc"),
        ]
        .into_iter()
        .collect();

        let custom = params.without_reserved();
        assert_eq!(custom.len(), 1);
        assert_eq!(custom.all("sort"), ["asc", "desc"]);
        assert_eq!(params.len(), 7);
    }
}
