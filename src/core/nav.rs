//! Navigation helpers shared by every report: breadcrumb entries and
//! query-string parsing

use serde::Serialize;
use url::form_urlencoded;

/// One breadcrumb entry; an empty url marks the current page
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Crumb {
    pub name: String,
    pub url: String,
}

impl Crumb {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
        }
    }
}

/// Split `path?query` into the path and its decoded pairs
pub fn split_url(url: &str) -> (&str, Vec<(String, String)>) {
    match url.split_once('?') {
        Some((path, query)) => (path, parse_query(query)),
        None => (url, Vec::new()),
    }
}

pub fn parse_query(query: &str) -> Vec<(String, String)> {
    form_urlencoded::parse(query.trim_start_matches('?').as_bytes())
        .into_owned()
        .collect()
}

/// Last value of `key`, trimmed, if present and non-empty
pub fn param<'a>(pairs: &'a [(String, String)], key: &str) -> Option<&'a str> {
    pairs
        .iter()
        .rev()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.trim())
        .filter(|v| !v.is_empty())
}

/// Integer parameter; malformed values are `None`
pub fn param_i64(pairs: &[(String, String)], key: &str) -> Option<i64> {
    param(pairs, key).and_then(|v| v.parse().ok())
}

pub fn param_i32(pairs: &[(String, String)], key: &str) -> Option<i32> {
    param(pairs, key).and_then(|v| v.parse().ok())
}

/// Boolean flag: `true`, `1`, `yes` and `on` (any case) are true
pub fn param_bool(pairs: &[(String, String)], key: &str) -> bool {
    param(pairs, key)
        .map(|v| matches!(v.to_ascii_lowercase().as_str(), "true" | "1" | "yes" | "on"))
        .unwrap_or(false)
}

/// Encode pairs as a query string
pub fn encode<'a>(pairs: impl IntoIterator<Item = (&'a str, String)>) -> String {
    let mut serializer = form_urlencoded::Serializer::new(String::new());
    for (key, value) in pairs {
        serializer.append_pair(key, &value);
    }
    serializer.finish()
}

/// `path` followed by `?query` when the query is not empty
pub fn with_query(path: &str, query: &str) -> String {
    if query.is_empty() {
        path.to_string()
    } else {
        format!("{}?{}", path, query)
    }
}
