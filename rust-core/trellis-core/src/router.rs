//! # Router
//!
//! The route table: an ordered, immutable list of [`RouteEntry`] rows that is
//! scanned top to bottom per request. The first entry whose verb and path
//! both match wins; there is no scoring between candidates.
//!
//! Order is priority. Applications register specific routes before
//! catch-alls sharing their prefix, or opt into
//! [`RouteTable::sort_by_specificity`].

use crate::error::Error;
use crate::matcher::{match_route, split_path, MatchPolicy, RouteMatchContext};
use crate::route::RouteEntry;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// HTTP methods supported by the router
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Method {
    /// HTTP GET
    Get,
    /// HTTP POST
    Post,
    /// HTTP PUT
    Put,
    /// HTTP DELETE
    Delete,
    /// HTTP PATCH
    Patch,
    /// HTTP HEAD
    Head,
    /// HTTP OPTIONS
    Options,
}

impl Method {
    /// Every supported method
    pub const ALL: [Self; 7] = [
        Self::Get,
        Self::Post,
        Self::Put,
        Self::Delete,
        Self::Patch,
        Self::Head,
        Self::Options,
    ];

    /// Uppercase wire name
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
            Self::Patch => "PATCH",
            Self::Head => "HEAD",
            Self::Options => "OPTIONS",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|m| m.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| Error::UnsupportedMethod {
                method: s.to_string(),
            })
    }
}

impl TryFrom<String> for Method {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Method> for String {
    fn from(method: Method) -> Self {
        method.as_str().to_string()
    }
}

impl TryFrom<&hyper::Method> for Method {
    type Error = Error;

    fn try_from(method: &hyper::Method) -> Result<Self, Self::Error> {
        method.as_str().parse()
    }
}

/// Matched route with its per-request context
#[derive(Debug)]
pub struct RouteMatch<'a> {
    /// The winning entry
    pub entry: &'a RouteEntry,
    /// Reserved values and captures
    pub context: RouteMatchContext,
}

/// Ordered route table
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RouteTable {
    entries: Vec<RouteEntry>,
}

impl RouteTable {
    /// Create a table from entries in priority order
    #[must_use]
    pub fn new(entries: Vec<RouteEntry>) -> Self {
        Self { entries }
    }

    /// Entries in priority order
    #[must_use]
    pub fn entries(&self) -> &[RouteEntry] {
        &self.entries
    }

    /// Consume the table
    #[must_use]
    pub fn into_entries(self) -> Vec<RouteEntry> {
        self.entries
    }

    /// Number of entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the table is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate entries in priority order
    pub fn iter(&self) -> std::slice::Iter<'_, RouteEntry> {
        self.entries.iter()
    }

    /// Stable reorder: literal segments before placeholders before catch-alls
    ///
    /// Entries of equal specificity keep their declaration order.
    pub fn sort_by_specificity(&mut self) {
        self.entries
            .sort_by(|a, b| b.template().specificity().cmp(&a.template().specificity()));
    }

    /// Find the first entry accepting the verb and path
    ///
    /// The verb filter runs before the segment matcher.
    #[must_use]
    pub fn find(&self, method: Method, path: &str, policy: MatchPolicy) -> Option<RouteMatch<'_>> {
        let segments = split_path(path);
        self.entries
            .iter()
            .filter(|entry| entry.method.accepts(method))
            .find_map(|entry| {
                let result = match_route(entry, &segments, policy);
                result.is_match.then(|| RouteMatch {
                    entry,
                    context: result.into_context(entry),
                })
            })
    }

    /// Verbs that would accept the path, for diagnostics
    #[must_use]
    pub fn methods_for(&self, path: &str, policy: MatchPolicy) -> Vec<Method> {
        Method::ALL
            .into_iter()
            .filter(|m| self.find(*m, path, policy).is_some())
            .collect()
    }
}

impl<'a> IntoIterator for &'a RouteTable {
    type Item = &'a RouteEntry;
    type IntoIter = std::slice::Iter<'a, RouteEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::route::RouteMethod;
    use crate::template::RouteTemplate;
    use crate::types::ParamValue;

    fn entry(method: RouteMethod, route: &str, action: &str) -> RouteEntry {
        let template = RouteTemplate::parse(route).unwrap().normalized();
        RouteEntry::new(template, method, "UserController", action, "users")
    }

    fn table() -> RouteTable {
        RouteTable::new(vec![
            entry(RouteMethod::Get, "/", "home"),
            entry(RouteMethod::Get, "/users", "list"),
            entry(RouteMethod::Post, "/users", "create"),
            entry(RouteMethod::Get, "/users/{id:int}", "show"),
            entry(RouteMethod::All, "/ping", "ping"),
        ])
    }

    #[test]
    fn test_basic_routing() {
        let t = table();
        assert_eq!(t.find(Method::Get, "/", MatchPolicy::Strict).unwrap().entry.action, "home");
        assert_eq!(t.find(Method::Get, "/users", MatchPolicy::Strict).unwrap().entry.action, "list");
        assert_eq!(t.find(Method::Post, "/users", MatchPolicy::Strict).unwrap().entry.action, "create");
    }

    #[test]
    fn test_path_parameters() {
        let t = table();
        let m = t.find(Method::Get, "/users/123", MatchPolicy::Strict).unwrap();
        assert_eq!(m.entry.action, "show");
        assert_eq!(m.context.get("id"), Some(&ParamValue::String("123".into())));
    }

    #[test]
    fn test_all_verb_accepts_anything() {
        let t = table();
        assert!(t.find(Method::Delete, "/ping", MatchPolicy::Strict).is_some());
    }

    #[test]
    fn test_method_not_matching() {
        let t = table();
        assert!(t.find(Method::Delete, "/users", MatchPolicy::Strict).is_none());
        assert_eq!(t.methods_for("/users", MatchPolicy::Strict), vec![Method::Get, Method::Post]);
    }

    #[test]
    fn test_route_not_found() {
        assert!(RouteTable::default().find(Method::Get, "/nonexistent", MatchPolicy::Strict).is_none());
    }

    #[test]
    fn test_first_declared_wins() {
        let t = RouteTable::new(vec![
            entry(RouteMethod::Get, "/docs/{...path}", "catch_all"),
            entry(RouteMethod::Get, "/docs/index", "index"),
        ]);
        let m = t.find(Method::Get, "/docs/index", MatchPolicy::Strict).unwrap();
        assert_eq!(m.entry.action, "catch_all");
    }

    #[test]
    fn test_specificity_sort_is_opt_in_and_stable() {
        let mut t = RouteTable::new(vec![
            entry(RouteMethod::Get, "/docs/{...path}", "catch_all"),
            entry(RouteMethod::Get, "/docs/{slug}", "slug"),
            entry(RouteMethod::Get, "/docs/index", "index"),
            entry(RouteMethod::Post, "/docs/index", "index_post"),
        ]);
        t.sort_by_specificity();
        let actions: Vec<_> = t.iter().map(|e| e.action.as_str()).collect();
        assert_eq!(actions, vec!["index", "index_post", "slug", "catch_all"]);
    }

    #[test]
    fn test_method_parsing() {
        assert_eq!("get".parse::<Method>().unwrap(), Method::Get);
        assert_eq!("DELETE".parse::<Method>().unwrap(), Method::Delete);
        assert!("BREW".parse::<Method>().is_err());
        let m: Method = serde_json::from_str(r#""patch""#).unwrap();
        assert_eq!(m, Method::Patch);
        assert_eq!(serde_json::to_string(&Method::Put).unwrap(), r#""PUT""#);
    }
}
