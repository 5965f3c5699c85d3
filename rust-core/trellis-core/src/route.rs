//! # Route Entries
//!
//! One fully resolved row of the route table: compiled path, verb, owning
//! controller and module, action, parameter bindings and auth guards.
//! Entries are created once at boot (or restored from cache) and never
//! mutated afterwards.

use crate::error::ConfigurationError;
use crate::router::Method;
use crate::template::RouteTemplate;
use crate::types::ParamSpec;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Verb an entry answers to: one method, or every method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RouteMethod {
    /// Matches any verb
    All,
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

impl RouteMethod {
    /// Whether a request with this verb may use the entry
    #[must_use]
    pub fn accepts(&self, method: Method) -> bool {
        *self == Self::All || *self == Self::from(method)
    }

    /// Lowercase name, as stored in the table
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Get => "get",
            Self::Post => "post",
            Self::Put => "put",
            Self::Delete => "delete",
            Self::Patch => "patch",
            Self::Head => "head",
            Self::Options => "options",
        }
    }
}

impl From<Method> for RouteMethod {
    fn from(method: Method) -> Self {
        match method {
            Method::Get => Self::Get,
            Method::Post => Self::Post,
            Method::Put => Self::Put,
            Method::Delete => Self::Delete,
            Method::Patch => Self::Patch,
            Method::Head => Self::Head,
            Method::Options => Self::Options,
        }
    }
}

impl From<Option<Method>> for RouteMethod {
    fn from(method: Option<Method>) -> Self {
        method.map_or(Self::All, Self::from)
    }
}

impl fmt::Display for RouteMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Route table row
///
/// The compiled template is not serialized; it is rebuilt from `route` with
/// [`RouteEntry::compile`] when the entry is restored from cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteEntry {
    /// Number of template segments (the root counts as one)
    pub segment_count: usize,
    /// Compiled route, e.g. `/store-api/products/{id:int}`
    pub route: String,
    /// Owning controller
    pub controller: String,
    /// Verb, lowercase or `all`
    pub method: RouteMethod,
    /// Action name
    pub action: String,
    /// Ordered parameter bindings
    pub params: Vec<ParamSpec>,
    /// Guards to pass before dispatch, class-level first
    pub auth: Option<Vec<String>>,
    /// Owning module
    pub module: String,
    /// Area the action was declared under
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub area: Option<String>,
    #[serde(skip)]
    template: RouteTemplate,
}

impl RouteEntry {
    /// Create an entry from an already normalized template
    #[must_use]
    pub fn new(
        template: RouteTemplate,
        method: RouteMethod,
        controller: impl Into<String>,
        action: impl Into<String>,
        module: impl Into<String>,
    ) -> Self {
        Self {
            segment_count: template.segment_count(),
            route: template.render(),
            controller: controller.into(),
            method,
            action: action.into(),
            params: Vec::new(),
            auth: None,
            module: module.into(),
            area: None,
            template,
        }
    }

    /// Set parameter bindings
    #[must_use]
    pub fn with_params(mut self, params: Vec<ParamSpec>) -> Self {
        self.params = params;
        self
    }

    /// Set auth guards; an empty list means no guards
    #[must_use]
    pub fn with_auth(mut self, auth: Vec<String>) -> Self {
        self.auth = (!auth.is_empty()).then_some(auth);
        self
    }

    /// Set the area
    #[must_use]
    pub fn with_area(mut self, area: Option<String>) -> Self {
        self.area = area.filter(|a| !a.is_empty());
        self
    }

    /// Compiled template
    #[must_use]
    pub fn template(&self) -> &RouteTemplate {
        &self.template
    }

    /// Re-parse `route` into the compiled template
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationError::MalformedTemplate` if `route` does not
    /// parse, still holds reserved tokens, or disagrees with `segment_count`.
    pub fn compile(&mut self) -> Result<(), ConfigurationError> {
        let template = RouteTemplate::parse(&self.route)?;
        let malformed = |reason: &str| ConfigurationError::MalformedTemplate {
            template: self.route.clone(),
            reason: reason.to_string(),
        };
        if template.has_tokens() {
            return Err(malformed("compiled route still contains reserved tokens"));
        }
        if template.segment_count() != self.segment_count {
            return Err(malformed("segment count does not match the route"));
        }
        self.template = template;
        Ok(())
    }

    /// Parameter binding by name
    #[must_use]
    pub fn param(&self, name: &str) -> Option<&ParamSpec> {
        self.params.iter().find(|p| p.name == name)
    }

    /// Guards to evaluate, possibly empty
    #[must_use]
    pub fn guards(&self) -> &[String] {
        self.auth.as_deref().unwrap_or_default()
    }

    /// `Controller::action`, used in logs and errors
    #[must_use]
    pub fn target(&self) -> String {
        format!("{}::{}", self.controller, self.action)
    }
}
