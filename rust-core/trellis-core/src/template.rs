//! # Route Templates
//!
//! Templates are parsed once into a sequence of typed segments instead of
//! being searched and replaced as strings on every request.
//!
//! ## Syntax
//!
//! | Segment | Meaning |
//! |---------|---------|
//! | `products` | literal |
//! | `[controller]` | reserved token (`action`, `area`, `controller`, `handler`, `page`) |
//! | `{id}` / `{id:int}` / `{page:int=1}` | placeholder, optionally typed, optionally defaulted |
//! | `{...rest}` / `...rest` | catch-all, final segment only |
//!
//! A template starting with `/` is absolute: joined onto a controller base
//! route it replaces the base instead of appending to it.

use crate::error::ConfigurationError;
use crate::types::ParamType;
use std::collections::HashSet;
use std::fmt;

/// Rank of the position just past a template's last segment: below any
/// required segment, above a defaulted placeholder or a catch-all
pub const END_RANK: u8 = 2;

/// Names that are substituted from controller metadata at build time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReservedToken {
    /// `[action]` - the action name
    Action,
    /// `[area]` - the declared area, or empty
    Area,
    /// `[controller]` - controller name without the `Controller` suffix
    Controller,
    /// `[handler]` - declared handler name, or the action name
    Handler,
    /// `[page]` - declared page name, or empty
    Page,
}

impl ReservedToken {
    /// Parse a token name, case-insensitively
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "action" => Some(Self::Action),
            "area" => Some(Self::Area),
            "controller" => Some(Self::Controller),
            "handler" => Some(Self::Handler),
            "page" => Some(Self::Page),
            _ => None,
        }
    }

    /// Lowercase token name
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Action => "action",
            Self::Area => "area",
            Self::Controller => "controller",
            Self::Handler => "handler",
            Self::Page => "page",
        }
    }
}

/// One path segment of a template
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Fixed text
    Literal(String),
    /// Reserved token awaiting substitution
    Token(ReservedToken),
    /// Named capture of exactly one segment
    Placeholder {
        /// Capture name
        name: String,
        /// Declared type
        ty: ParamType,
        /// Raw default used when the request omits the segment
        default: Option<String>,
    },
    /// Capture of every remaining segment as a list
    CatchAll {
        /// Capture name
        name: String,
    },
}

impl Segment {
    /// Whether a request must supply this segment
    #[must_use]
    pub fn is_required(&self) -> bool {
        match self {
            Self::Literal(_) | Self::Token(_) => true,
            Self::Placeholder { default, .. } => default.is_none(),
            Self::CatchAll { .. } => false,
        }
    }

    /// Rank used for specificity ordering: literals first, catch-alls last
    ///
    /// Optional segments rank below [`END_RANK`], so a template that ends
    /// where another continues with an optional capture is the more specific.
    #[must_use]
    pub fn rank(&self) -> u8 {
        match self {
            Self::Literal(_) | Self::Token(_) => 4,
            Self::Placeholder { default: None, .. } => 3,
            Self::Placeholder { .. } => 1,
            Self::CatchAll { .. } => 0,
        }
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(text) => f.write_str(text),
            Self::Token(token) => write!(f, "[{}]", token.name()),
            Self::Placeholder { name, ty, default } => {
                write!(f, "{{{name}")?;
                if *ty != ParamType::String || default.is_some() {
                    write!(f, ":{ty}")?;
                }
                if let Some(default) = default {
                    write!(f, "={default}")?;
                }
                f.write_str("}")
            }
            Self::CatchAll { name } => write!(f, "{{...{name}}}"),
        }
    }
}

/// Values substituted for reserved tokens
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenValues {
    /// `[action]`
    pub action: String,
    /// `[area]`
    pub area: String,
    /// `[controller]`
    pub controller: String,
    /// `[handler]`
    pub handler: String,
    /// `[page]`
    pub page: String,
}

impl TokenValues {
    /// Value for a token
    #[must_use]
    pub fn get(&self, token: ReservedToken) -> &str {
        match token {
            ReservedToken::Action => &self.action,
            ReservedToken::Area => &self.area,
            ReservedToken::Controller => &self.controller,
            ReservedToken::Handler => &self.handler,
            ReservedToken::Page => &self.page,
        }
    }
}

/// Parsed route template
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteTemplate {
    absolute: bool,
    segments: Vec<Segment>,
}

impl RouteTemplate {
    /// Parse a template
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationError::MalformedTemplate` for unknown tokens,
    /// unbalanced braces, duplicate capture names, or a catch-all that is not
    /// the final segment.
    pub fn parse(template: &str) -> Result<Self, ConfigurationError> {
        let trimmed = template.trim();
        let malformed = |reason: String| ConfigurationError::MalformedTemplate {
            template: template.to_string(),
            reason,
        };

        let mut segments = Vec::new();
        for raw in trimmed.split('/') {
            let raw = raw.trim();
            if raw.is_empty() {
                continue;
            }
            segments.push(parse_segment(raw).map_err(malformed)?);
        }

        let parsed = Self {
            absolute: trimmed.starts_with('/'),
            segments,
        };
        parsed.validate().map_err(malformed)?;
        Ok(parsed)
    }

    fn validate(&self) -> Result<(), String> {
        let mut names = HashSet::new();
        let last = self.segments.len().saturating_sub(1);
        for (index, segment) in self.segments.iter().enumerate() {
            let name = match segment {
                Segment::Placeholder { name, .. } => name,
                Segment::CatchAll { name } => {
                    if index != last {
                        return Err(format!(
                            "catch-all `{name}` must be the final segment"
                        ));
                    }
                    name
                }
                _ => continue,
            };
            if !names.insert(name.as_str()) {
                return Err(format!("capture `{name}` is declared twice"));
            }
        }
        Ok(())
    }

    /// Root template (`/`)
    #[must_use]
    pub fn root() -> Self {
        Self {
            absolute: true,
            segments: Vec::new(),
        }
    }

    /// Whether the template was declared with a leading `/`
    #[must_use]
    pub fn is_absolute(&self) -> bool {
        self.absolute
    }

    /// Parsed segments
    #[must_use]
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Number of segments as counted in a route entry (the root counts as one)
    #[must_use]
    pub fn segment_count(&self) -> usize {
        self.segments.len().max(1)
    }

    /// Number of leading segments a request must supply
    #[must_use]
    pub fn required_len(&self) -> usize {
        self.segments
            .iter()
            .rposition(Segment::is_required)
            .map_or(0, |last| last + 1)
    }

    /// Whether the final segment is a catch-all
    #[must_use]
    pub fn has_catch_all(&self) -> bool {
        matches!(self.segments.last(), Some(Segment::CatchAll { .. }))
    }

    /// Whether any reserved token remains unsubstituted
    #[must_use]
    pub fn has_tokens(&self) -> bool {
        self.segments.iter().any(|s| matches!(s, Segment::Token(_)))
    }

    /// Append a relative template; an absolute one replaces `self`
    #[must_use]
    pub fn join(&self, other: &Self) -> Self {
        if other.absolute {
            return other.clone();
        }
        let mut segments = self.segments.clone();
        segments.extend(other.segments.iter().cloned());
        Self {
            absolute: self.absolute,
            segments,
        }
    }

    /// Replace reserved tokens with literal text
    ///
    /// Empty values drop the segment; values containing `/` expand into
    /// several literal segments.
    #[must_use]
    pub fn substitute(&self, values: &TokenValues) -> Self {
        let mut segments = Vec::with_capacity(self.segments.len());
        for segment in &self.segments {
            match segment {
                Segment::Token(token) => segments.extend(
                    values
                        .get(*token)
                        .split('/')
                        .map(str::trim)
                        .filter(|part| !part.is_empty())
                        .map(|part| Segment::Literal(part.to_string())),
                ),
                other => segments.push(other.clone()),
            }
        }
        Self {
            absolute: self.absolute,
            segments,
        }
    }

    /// Lowercase literals and drop empty ones; captures keep their names
    #[must_use]
    pub fn normalized(&self) -> Self {
        let segments = self
            .segments
            .iter()
            .filter_map(|segment| match segment {
                Segment::Literal(text) => {
                    let text = text.trim().to_lowercase();
                    (!text.is_empty()).then_some(Segment::Literal(text))
                }
                other => Some(other.clone()),
            })
            .collect();
        Self {
            absolute: true,
            segments,
        }
    }

    /// Names and types of every capture, in order
    pub fn captures(&self) -> impl Iterator<Item = (&str, ParamType, Option<&str>)> {
        self.segments.iter().filter_map(|segment| match segment {
            Segment::Placeholder { name, ty, default } => {
                Some((name.as_str(), *ty, default.as_deref()))
            }
            Segment::CatchAll { name } => Some((name.as_str(), ParamType::Array, None)),
            _ => None,
        })
    }

    /// Per-position ranks closed by [`END_RANK`]; compared
    /// lexicographically, higher is more specific
    #[must_use]
    pub fn specificity(&self) -> Vec<u8> {
        self.segments
            .iter()
            .map(Segment::rank)
            .chain(std::iter::once(END_RANK))
            .collect()
    }

    /// Render with a leading slash; the root renders as `/`
    #[must_use]
    pub fn render(&self) -> String {
        let body: Vec<String> = self.segments.iter().map(ToString::to_string).collect();
        format!("/{}", body.join("/"))
    }
}

impl fmt::Display for RouteTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

fn parse_segment(raw: &str) -> Result<Segment, String> {
    if let Some(inner) = raw.strip_prefix('[') {
        let name = inner
            .strip_suffix(']')
            .ok_or_else(|| format!("unterminated token `{raw}`"))?;
        return ReservedToken::from_name(name)
            .map(Segment::Token)
            .ok_or_else(|| format!("unknown reserved token `[{name}]`"));
    }

    if let Some(name) = raw.strip_prefix("...") {
        return catch_all(name);
    }

    if let Some(inner) = raw.strip_prefix('{') {
        let inner = inner
            .strip_suffix('}')
            .ok_or_else(|| format!("unterminated placeholder `{raw}`"))?;
        if let Some(name) = inner.strip_prefix("...") {
            return catch_all(name);
        }
        return placeholder(inner);
    }

    if raw.contains(['[', ']', '{', '}']) {
        return Err(format!(
            "segment `{raw}` mixes literal text with a token or placeholder"
        ));
    }
    Ok(Segment::Literal(raw.to_string()))
}

fn placeholder(inner: &str) -> Result<Segment, String> {
    let (spec, default) = match inner.split_once('=') {
        Some((spec, default)) => (spec, Some(default.trim().to_string())),
        None => (inner, None),
    };
    let (name, ty) = match spec.split_once(':') {
        Some((name, ty)) => (name.trim(), ParamType::from_specifier(ty.trim())),
        None => (spec.trim(), ParamType::String),
    };
    check_name(name)?;
    Ok(Segment::Placeholder {
        name: name.to_string(),
        ty,
        default,
    })
}

fn catch_all(name: &str) -> Result<Segment, String> {
    let name = name.trim();
    check_name(name)?;
    Ok(Segment::CatchAll {
        name: name.to_string(),
    })
}

fn check_name(name: &str) -> Result<(), String> {
    if name.is_empty() {
        return Err("capture name is empty".to_string());
    }
    if !name.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '-') {
        return Err(format!("capture name `{name}` has invalid characters"));
    }
    Ok(())
}
