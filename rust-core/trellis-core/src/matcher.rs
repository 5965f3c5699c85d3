//! # URI Matcher
//!
//! Segment-by-segment matching of a tokenized request path against one
//! compiled route template.
//!
//! ## Rules
//!
//! - Literals compare against the lowercased request segment and
//!   short-circuit on mismatch.
//! - Placeholders capture the percent-decoded segment, or their default when
//!   the request stops early.
//! - A final catch-all captures every remaining segment as a list, possibly
//!   empty, and ends the loop.
//! - Requests shorter than the template's required prefix are rejected before
//!   the loop.
//! - Requests longer than a template without catch-all are rejected under
//!   [`MatchPolicy::Strict`]; [`MatchPolicy::Prefix`] keeps the legacy
//!   behavior of ignoring the extra segments.

use crate::request::percent_decode;
use crate::route::RouteEntry;
use crate::template::{RouteTemplate, Segment};
use crate::types::ParamValue;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// How extra request segments are treated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchPolicy {
    /// Extra segments reject the match (default)
    #[default]
    Strict,
    /// Extra segments are ignored once the template is satisfied
    Prefix,
}

/// Per-request values resolved while matching
///
/// Seeded with the entry's reserved values (`controller`, `action`,
/// `module`, `area`) and filled with captures. Owned by exactly one request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RouteMatchContext {
    values: BTreeMap<String, ParamValue>,
}

impl RouteMatchContext {
    /// Create an empty context
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a context seeded from a route entry
    #[must_use]
    pub fn for_entry(entry: &RouteEntry) -> Self {
        let mut context = Self::new();
        context.insert("controller", entry.controller.as_str());
        context.insert("action", entry.action.as_str());
        context.insert("module", entry.module.as_str());
        if let Some(area) = &entry.area {
            context.insert("area", area.as_str());
        }
        context
    }

    /// Store a value, replacing any previous one
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<ParamValue>) {
        self.values.insert(name.into(), value.into());
    }

    /// Look up a value
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.values.get(name)
    }

    /// Look up a single-segment capture as text
    #[must_use]
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.values.get(name).and_then(ParamValue::as_str)
    }

    /// Iterate over every value in name order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of stored values
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Check if the context is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn extend(&mut self, captures: BTreeMap<String, ParamValue>) {
        self.values.extend(captures);
    }
}

/// Outcome of matching one entry
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MatchResult {
    /// Whether the entry accepts the path
    pub is_match: bool,
    /// Captured placeholder values (empty when not matched)
    pub captures: BTreeMap<String, ParamValue>,
}

impl MatchResult {
    fn rejected() -> Self {
        Self::default()
    }

    /// Turn the captures into a context seeded from the entry
    #[must_use]
    pub fn into_context(self, entry: &RouteEntry) -> RouteMatchContext {
        let mut context = RouteMatchContext::for_entry(entry);
        context.extend(self.captures);
        context
    }
}

/// Tokenize a request path
///
/// Leading and trailing slashes are trimmed; the empty path yields `[""]`,
/// which only the root route accepts.
#[must_use]
pub fn split_path(path: &str) -> Vec<&str> {
    path.trim_matches('/').split('/').collect()
}

/// Match one entry against a tokenized request path
#[must_use]
pub fn match_route(entry: &RouteEntry, segments: &[&str], policy: MatchPolicy) -> MatchResult {
    match match_template(entry.template(), segments, policy) {
        Some(captures) => MatchResult {
            is_match: true,
            captures,
        },
        None => MatchResult::rejected(),
    }
}

/// Match a template against a tokenized request path, returning captures
#[must_use]
pub fn match_template(
    template: &RouteTemplate,
    segments: &[&str],
    policy: MatchPolicy,
) -> Option<BTreeMap<String, ParamValue>> {
    let request: &[&str] = if segments == [""] { &[] } else { segments };
    let pattern = template.segments();

    if pattern.is_empty() {
        return request.is_empty().then(BTreeMap::new);
    }
    if request.len() < template.required_len() {
        return None;
    }

    let mut captures = BTreeMap::new();
    for (index, segment) in pattern.iter().enumerate() {
        match segment {
            Segment::Literal(literal) => {
                let actual = request.get(index)?;
                if actual.to_lowercase() != *literal {
                    return None;
                }
            }
            Segment::Placeholder { name, default, .. } => {
                let value = match (request.get(index), default) {
                    (Some(actual), _) => percent_decode(actual),
                    (None, Some(default)) => default.clone(),
                    (None, None) => return None,
                };
                captures.insert(name.clone(), ParamValue::String(value));
            }
            Segment::CatchAll { name } => {
                let rest = request
                    .get(index..)
                    .unwrap_or_default()
                    .iter()
                    .map(|s| ParamValue::String(percent_decode(s)))
                    .collect();
                captures.insert(name.clone(), ParamValue::List(rest));
                return Some(captures);
            }
            Segment::Token(_) => return None,
        }
    }

    if request.len() > pattern.len() && policy == MatchPolicy::Strict {
        return None;
    }
    Some(captures)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::route::RouteMethod;

    fn entry(route: &str) -> RouteEntry {
        let template = RouteTemplate::parse(route).unwrap().normalized();
        RouteEntry::new(template, RouteMethod::Get, "FileController", "show", "files")
    }

    fn matches(route: &str, path: &str) -> Option<BTreeMap<String, ParamValue>> {
        match_template(entry(route).template(), &split_path(path), MatchPolicy::Strict)
    }

    #[test]
    fn test_split_path() {
        assert_eq!(split_path("/a/b/"), vec!["a", "b"]);
        assert_eq!(split_path(""), vec![""]);
        assert_eq!(split_path("/"), vec![""]);
    }

    #[test]
    fn test_literal_match_is_case_insensitive_on_request() {
        assert!(matches("/store/Products", "/STORE/products").is_some());
        assert!(matches("/store/products", "/store/product").is_none());
    }

    #[test]
    fn test_literal_length_must_match() {
        assert!(matches("/a/b", "/a").is_none());
        assert!(matches("/a/b", "/a/b/c").is_none());
        assert!(matches("/a/b", "/a/b/").is_some());
    }

    #[test]
    fn test_prefix_policy_ignores_extra_segments() {
        let e = entry("/a/b");
        let result = match_route(&e, &split_path("/a/b/c"), MatchPolicy::Prefix);
        assert!(result.is_match);
    }

    #[test]
    fn test_root_route() {
        assert!(matches("/", "/").is_some());
        assert!(matches("/", "").is_some());
        assert!(matches("/", "/a").is_none());
        let e = entry("/");
        assert!(!match_route(&e, &split_path("/a"), MatchPolicy::Prefix).is_match);
    }

    #[test]
    fn test_placeholder_capture_keeps_case_and_decodes() {
        let captures = matches("/users/{name}", "/users/Jane%20Doe").unwrap();
        assert_eq!(captures.get("name"), Some(&"Jane Doe".into()));
    }

    #[test]
    fn test_placeholder_default_fills_missing_segment() {
        let captures = matches("/posts/{page:int=1}", "/posts").unwrap();
        assert_eq!(captures.get("page"), Some(&"1".into()));
        let captures = matches("/posts/{page:int=1}", "/posts/7").unwrap();
        assert_eq!(captures.get("page"), Some(&"7".into()));
        assert!(matches("/posts/{page:int}", "/posts").is_none());
    }

    #[test]
    fn test_catch_all_collects_remaining_segments() {
        let captures = matches("/files/{...path}", "/files/docs/2024/report.pdf").unwrap();
        assert_eq!(
            captures.get("path"),
            Some(&ParamValue::List(vec![
                "docs".into(),
                "2024".into(),
                "report.pdf".into()
            ]))
        );
    }

    #[test]
    fn test_catch_all_may_be_empty() {
        let captures = matches("/files/{...path}", "/files").unwrap();
        assert_eq!(captures.get("path"), Some(&ParamValue::List(Vec::new())));
        assert!(matches("/files/{...path}", "/other").is_none());
    }

    #[test]
    fn test_context_is_seeded_from_entry() {
        let e = entry("/files/{id}");
        let result = match_route(&e, &split_path("/files/9"), MatchPolicy::Strict);
        let context = result.into_context(&e);
        assert_eq!(context.get_str("controller"), Some("FileController"));
        assert_eq!(context.get_str("action"), Some("show"));
        assert_eq!(context.get_str("id"), Some("9"));
        assert!(context.get("area").is_none());
    }
}
