//! # Controller Descriptors
//!
//! Explicit registration of controllers and their actions. A descriptor is
//! what an application states about a controller: base routes, area, guards,
//! and per action the verb bindings, templates and parameter bindings.
//!
//! Descriptors are built in code or deserialized from a route manifest, and
//! [`ControllerDescriptor::extract`] turns one into parsed
//! [`ControllerMetadata`] for the route table builder.
//!
//! ```ignore
//! let products = ControllerDescriptor::new("ProductController")
//!     .route("[area]/products/")
//!     .area("store-api")
//!     .action(ActionDescriptor::new("productList").get(""))
//!     .action(
//!         ActionDescriptor::new("getProduct")
//!             .get("{id:int}")
//!             .param(ParamSpec::route("id", ParamType::Int)),
//!     );
//! ```

use crate::error::ConfigurationError;
use crate::route::RouteMethod;
use crate::router::Method;
use crate::template::RouteTemplate;
use crate::types::ParamSpec;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Base types whose subclasses are controllers without an explicit marker
pub const DEFAULT_CONTROLLER_BASES: [&str; 2] = ["Controller", "AbstractController"];

/// One verb binding of an action, e.g. `GET {id:int}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerbBinding {
    /// Verb; `None` leaves it to name inference
    #[serde(default)]
    pub verb: Option<Method>,
    /// Template relative to the base route, or absolute with a leading `/`
    #[serde(default)]
    pub template: Option<String>,
}

/// Declared action
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActionDescriptor {
    /// Action name
    pub name: String,
    /// Verb bindings; empty means the verb is inferred from the name
    #[serde(default)]
    pub verbs: Vec<VerbBinding>,
    /// Parameter bindings in call order
    #[serde(default)]
    pub params: Vec<ParamSpec>,
    /// Guards appended to the controller's guards
    #[serde(default)]
    pub auth: Vec<String>,
    /// Area overriding the controller's
    #[serde(default)]
    pub area: Option<String>,
    /// `[handler]` value overriding the controller's
    #[serde(default)]
    pub handler: Option<String>,
    /// `[page]` value overriding the controller's
    #[serde(default)]
    pub page: Option<String>,
}

impl ActionDescriptor {
    /// Create an action without bindings
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Bind a verb and template
    #[must_use]
    pub fn verb(mut self, verb: Method, template: impl Into<String>) -> Self {
        self.verbs.push(VerbBinding {
            verb: Some(verb),
            template: Some(template.into()),
        });
        self
    }

    /// Bind `GET`
    #[must_use]
    pub fn get(self, template: impl Into<String>) -> Self {
        self.verb(Method::Get, template)
    }

    /// Bind `POST`
    #[must_use]
    pub fn post(self, template: impl Into<String>) -> Self {
        self.verb(Method::Post, template)
    }

    /// Bind `PUT`
    #[must_use]
    pub fn put(self, template: impl Into<String>) -> Self {
        self.verb(Method::Put, template)
    }

    /// Bind `DELETE`
    #[must_use]
    pub fn delete(self, template: impl Into<String>) -> Self {
        self.verb(Method::Delete, template)
    }

    /// Bind `PATCH`
    #[must_use]
    pub fn patch(self, template: impl Into<String>) -> Self {
        self.verb(Method::Patch, template)
    }

    /// Bind a template without a verb
    #[must_use]
    pub fn route(mut self, template: impl Into<String>) -> Self {
        self.verbs.push(VerbBinding {
            verb: None,
            template: Some(template.into()),
        });
        self
    }

    /// Add a parameter binding
    #[must_use]
    pub fn param(mut self, param: ParamSpec) -> Self {
        self.params.push(param);
        self
    }

    /// Require a guard
    #[must_use]
    pub fn auth(mut self, guard: impl Into<String>) -> Self {
        self.auth.push(guard.into());
        self
    }

    /// Set the area
    #[must_use]
    pub fn area(mut self, area: impl Into<String>) -> Self {
        self.area = Some(area.into());
        self
    }

    /// Set the `[handler]` value
    #[must_use]
    pub fn handler(mut self, handler: impl Into<String>) -> Self {
        self.handler = Some(handler.into());
        self
    }

    /// Set the `[page]` value
    #[must_use]
    pub fn page(mut self, page: impl Into<String>) -> Self {
        self.page = Some(page.into());
        self
    }
}

/// Declared type of a module
///
/// Only declarations carrying the controller marker, or extending a known
/// controller base, produce routes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ControllerDescriptor {
    /// Type name, e.g. `ProductController`
    pub name: String,
    /// Explicit controller marker
    #[serde(default)]
    pub controller: bool,
    /// Base type name
    #[serde(default)]
    pub extends: Option<String>,
    /// Base routes; each one is combined with every action template
    #[serde(default)]
    pub routes: Vec<String>,
    /// Default area for the actions
    #[serde(default)]
    pub area: Option<String>,
    /// Default `[handler]` value
    #[serde(default)]
    pub handler: Option<String>,
    /// Default `[page]` value
    #[serde(default)]
    pub page: Option<String>,
    /// Guards required by every action
    #[serde(default)]
    pub auth: Vec<String>,
    /// Actions in declaration order
    #[serde(default)]
    pub actions: Vec<ActionDescriptor>,
}

impl ControllerDescriptor {
    /// Create a descriptor carrying the controller marker
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            controller: true,
            ..Self::default()
        }
    }

    /// Create a descriptor for a plain type (no marker)
    pub fn plain(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Set the base type
    #[must_use]
    pub fn extends(mut self, base: impl Into<String>) -> Self {
        self.extends = Some(base.into());
        self
    }

    /// Add a base route
    #[must_use]
    pub fn route(mut self, template: impl Into<String>) -> Self {
        self.routes.push(template.into());
        self
    }

    /// Set the default area
    #[must_use]
    pub fn area(mut self, area: impl Into<String>) -> Self {
        self.area = Some(area.into());
        self
    }

    /// Set the default `[handler]` value
    #[must_use]
    pub fn handler(mut self, handler: impl Into<String>) -> Self {
        self.handler = Some(handler.into());
        self
    }

    /// Set the default `[page]` value
    #[must_use]
    pub fn page(mut self, page: impl Into<String>) -> Self {
        self.page = Some(page.into());
        self
    }

    /// Require a guard on every action
    #[must_use]
    pub fn auth(mut self, guard: impl Into<String>) -> Self {
        self.auth.push(guard.into());
        self
    }

    /// Add an action
    #[must_use]
    pub fn action(mut self, action: ActionDescriptor) -> Self {
        self.actions.push(action);
        self
    }

    /// Whether this declaration is a controller given the known base types
    #[must_use]
    pub fn is_controller<S: AsRef<str>>(&self, bases: &[S]) -> bool {
        self.controller
            || self
                .extends
                .as_deref()
                .is_some_and(|base| bases.iter().any(|b| b.as_ref() == base))
    }

    /// Parse every template and resolve verbs
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationError::DuplicateAction` when an action name
    /// repeats and `ConfigurationError::MalformedTemplate` for templates that
    /// do not parse.
    pub fn extract(&self) -> Result<ControllerMetadata, ConfigurationError> {
        let mut base_routes = self
            .routes
            .iter()
            .map(|route| RouteTemplate::parse(route))
            .collect::<Result<Vec<_>, _>>()?;
        if base_routes.is_empty() {
            base_routes.push(RouteTemplate::default());
        }

        let mut names = HashSet::new();
        let mut actions = Vec::with_capacity(self.actions.len());
        for action in &self.actions {
            if !names.insert(action.name.as_str()) {
                return Err(ConfigurationError::DuplicateAction {
                    controller: self.name.clone(),
                    action: action.name.clone(),
                });
            }
            actions.push(ActionMetadata::extract(action)?);
        }

        Ok(ControllerMetadata {
            name: self.name.clone(),
            base_routes,
            area: self.area.clone(),
            handler: self.handler.clone(),
            page: self.page.clone(),
            auth: self.auth.clone(),
            actions,
        })
    }
}

/// Parsed controller
#[derive(Debug, Clone, PartialEq)]
pub struct ControllerMetadata {
    /// Type name
    pub name: String,
    /// Parsed base routes; a single empty template when none were declared
    pub base_routes: Vec<RouteTemplate>,
    /// Default area
    pub area: Option<String>,
    /// Default `[handler]` value
    pub handler: Option<String>,
    /// Default `[page]` value
    pub page: Option<String>,
    /// Class-level guards
    pub auth: Vec<String>,
    /// Parsed actions
    pub actions: Vec<ActionMetadata>,
}

/// Parsed action
#[derive(Debug, Clone, PartialEq)]
pub struct ActionMetadata {
    /// Action name
    pub name: String,
    /// Verb and parsed template per binding
    pub routes: Vec<(RouteMethod, RouteTemplate)>,
    /// Declared parameter bindings
    pub params: Vec<ParamSpec>,
    /// Method-level guards
    pub auth: Vec<String>,
    /// Declared area
    pub area: Option<String>,
    /// Declared `[handler]` value
    pub handler: Option<String>,
    /// Declared `[page]` value
    pub page: Option<String>,
}

impl ActionMetadata {
    fn extract(action: &ActionDescriptor) -> Result<Self, ConfigurationError> {
        let inferred = RouteMethod::from(infer_verb(&action.name));
        let routes = if action.verbs.is_empty() {
            vec![(inferred, RouteTemplate::default())]
        } else {
            action
                .verbs
                .iter()
                .map(|binding| {
                    let template = RouteTemplate::parse(binding.template.as_deref().unwrap_or(""))?;
                    let method = binding.verb.map_or(inferred, RouteMethod::from);
                    Ok((method, template))
                })
                .collect::<Result<Vec<_>, ConfigurationError>>()?
        };

        Ok(Self {
            name: action.name.clone(),
            routes,
            params: action.params.clone(),
            auth: action.auth.clone(),
            area: action.area.clone(),
            handler: action.handler.clone(),
            page: action.page.clone(),
        })
    }
}

/// Verb implied by an action name
///
/// Only names that are exactly a verb, optionally prefixed with `http`,
/// qualify (`get`, `httpGet`, `HttpDelete`). `getProduct` infers nothing.
#[must_use]
pub fn infer_verb(name: &str) -> Option<Method> {
    let lower = name.to_ascii_lowercase();
    let candidate = lower.strip_prefix("http").unwrap_or(&lower);
    if candidate.is_empty() {
        return None;
    }
    candidate.parse().ok()
}
