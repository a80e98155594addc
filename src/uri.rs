//! Resource identifiers: `scheme://host/path?query`.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use serde_json::Value;
use url::{form_urlencoded, Url};

use crate::error::ResourceError;
use crate::types::Query;

/// Parsed resource identifier.
///
/// Immutable; [`Uri::with_query`] returns a new value. Equality is structural
/// over scheme, host, path and query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Uri {
    scheme: String,
    host: String,
    path: String,
    query: Query,
}

impl Uri {
    /// Build a URI from explicit parts.
    ///
    /// # Errors
    ///
    /// Returns `ResourceError::UriSyntax` for an empty or malformed scheme or
    /// an empty host.
    pub fn new(
        scheme: impl Into<String>,
        host: impl Into<String>,
        path: impl Into<String>,
    ) -> Result<Self, ResourceError> {
        let scheme = scheme.into().to_ascii_lowercase();
        let host = host.into().to_ascii_lowercase();
        let path = path.into();
        let display = format!("{}://{}{}", scheme, host, path);

        if !is_valid_scheme(&scheme) {
            return Err(syntax_error(&display, "malformed scheme"));
        }
        if host.is_empty() {
            return Err(syntax_error(&display, "missing host"));
        }

        Ok(Self {
            scheme,
            host,
            path: normalize_path(&path),
            query: Query::new(),
        })
    }

    /// Parse a URI string.
    ///
    /// Query values are kept as strings. The host is lowercased for every
    /// scheme, and an explicit port stays part of it (`127.0.0.1:8080`).
    ///
    /// # Errors
    ///
    /// Returns `ResourceError::UriSyntax` if the string is not a URI or has no host.
    pub fn parse(input: &str) -> Result<Self, ResourceError> {
        let url = Url::parse(input).map_err(|e| syntax_error(input, &e.to_string()))?;
        let host = match url.host_str() {
            Some(host) if !host.is_empty() => match url.port() {
                Some(port) => format!("{}:{}", host.to_ascii_lowercase(), port),
                None => host.to_ascii_lowercase(),
            },
            _ => return Err(syntax_error(input, "missing host")),
        };
        let query = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), Value::String(v.into_owned())))
            .collect();

        Ok(Self {
            scheme: url.scheme().to_string(),
            host,
            path: normalize_path(url.path()),
            query,
        })
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn query(&self) -> &Query {
        &self.query
    }

    /// Return a copy with `query` merged over the existing entries.
    ///
    /// Keys already present are overridden; new keys are appended.
    pub fn with_query(&self, query: Query) -> Self {
        let mut uri = self.clone();
        uri.query.extend(query);
        uri
    }

    /// `scheme://host/path` without the query part.
    pub fn base(&self) -> String {
        format!("{}://{}{}", self.scheme, self.host, self.path)
    }
}

impl FromStr for Uri {
    type Err = ResourceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uri::parse(s)
    }
}

impl fmt::Display for Uri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.base())?;
        if !self.query.is_empty() {
            let mut serializer = form_urlencoded::Serializer::new(String::new());
            for (key, value) in &self.query {
                serializer.append_pair(key, &query_value_text(value));
            }
            write!(f, "?{}", serializer.finish())?;
        }
        Ok(())
    }
}

/// Text form of a query value; strings are written without quotes.
pub(crate) fn query_value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn is_valid_scheme(scheme: &str) -> bool {
    let mut chars = scheme.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

fn normalize_path(path: &str) -> String {
    if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{}", path)
    }
}

fn syntax_error(uri: &str, message: &str) -> ResourceError {
    ResourceError::UriSyntax {
        uri: uri.to_string(),
        message: message.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::query_from;
    use serde_json::json;

    #[test]
    fn parse_custom_scheme() {
        let uri = Uri::parse("page://self/index").unwrap();
        assert_eq!(uri.scheme(), "page");
        assert_eq!(uri.host(), "self");
        assert_eq!(uri.path(), "/index");
        assert!(uri.query().is_empty());
    }

    #[test]
    fn parse_query() {
        let uri = Uri::parse("app://self/news?date=today&id=1").unwrap();
        assert_eq!(uri.path(), "/news");
        assert_eq!(uri.query()["date"], "today");
        assert_eq!(uri.query()["id"], "1");
    }

    #[test]
    fn parse_host_only() {
        let uri = Uri::parse("https://www.example.com").unwrap();
        assert_eq!(uri.host(), "www.example.com");
        assert_eq!(uri.path(), "/");
    }

    #[test]
    fn parse_keeps_port() {
        let uri = Uri::parse("http://127.0.0.1:8080/weather?city=tokyo").unwrap();
        assert_eq!(uri.host(), "127.0.0.1:8080");
        assert_eq!(uri.to_string(), "http://127.0.0.1:8080/weather?city=tokyo");
    }

    #[test]
    fn host_is_case_insensitive() {
        let uri = Uri::parse("app://SELF/Person?Age=5").unwrap();
        assert_eq!(uri.host(), "self");
        assert_eq!(uri.path(), "/Person");
        assert_eq!(uri.query()["Age"], "5");
        assert_eq!(Uri::new("app", "Self", "/person").unwrap().host(), "self");
    }

    #[test]
    fn parse_rejects_missing_host() {
        let result = Uri::parse("page:index");
        assert!(matches!(result, Err(ResourceError::UriSyntax { .. })));
    }

    #[test]
    fn parse_rejects_garbage() {
        let result = Uri::parse("not a uri");
        assert!(matches!(result, Err(ResourceError::UriSyntax { .. })));
    }

    #[test]
    fn new_from_parts() {
        let uri = Uri::new("APP", "self", "user").unwrap();
        assert_eq!(uri.to_string(), "app://self/user");
        assert_eq!(uri, Uri::parse("app://self/user").unwrap());
    }

    #[test]
    fn new_rejects_bad_parts() {
        assert!(matches!(
            Uri::new("1app", "self", "/user"),
            Err(ResourceError::UriSyntax { .. })
        ));
        assert!(matches!(
            Uri::new("app", "", "/user"),
            Err(ResourceError::UriSyntax { .. })
        ));
    }

    #[test]
    fn with_query_returns_new_value() {
        let uri = Uri::parse("app://self/user?id=1").unwrap();
        let merged = uri.with_query(query_from([("id", json!(2)), ("verbose", json!(true))]));

        assert_eq!(uri.query()["id"], "1");
        assert_eq!(merged.query()["id"], 2);
        assert_eq!(merged.query()["verbose"], true);
        assert_ne!(uri, merged);
    }

    #[test]
    fn display_round_trips_query() {
        let uri = Uri::parse("app://self/news?date=today").unwrap();
        assert_eq!(uri.to_string(), "app://self/news?date=today");
        assert_eq!(Uri::parse(&uri.to_string()).unwrap(), uri);
    }
}
