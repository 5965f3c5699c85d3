//! # Route Table Builder
//!
//! Compiles module declarations into the flat, ordered route table.
//!
//! ## Algorithm
//!
//! 1. Resolve modules import-first ([`ModuleGraph`]).
//! 2. Keep declarations that are controllers; a controller name may be
//!    registered once across all modules.
//! 3. For every action, every base route and every verb binding: join the
//!    templates (absolute action templates replace the base), substitute the
//!    reserved tokens and normalize.
//! 4. Emit one entry per combination, with class guards followed by action
//!    guards and a synthesized binding for every undeclared capture.
//!
//! Declaration order is priority. [`RouteOrder::Specificity`] opts into a
//! stable sort that puts literal segments before captures.

use crate::config::RoutingConfig;
use crate::descriptor::{ActionMetadata, ControllerMetadata, DEFAULT_CONTROLLER_BASES};
use crate::error::ConfigurationError;
use crate::module::{ModuleDeclaration, ModuleGraph};
use crate::route::{RouteEntry, RouteMethod};
use crate::router::RouteTable;
use crate::template::{RouteTemplate, TokenValues};
use crate::types::{convert_param, ParamSpec, ParamType, ParamValue};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::{debug, info};

/// Final ordering of the route table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RouteOrder {
    /// Declaration order (default)
    #[default]
    Declaration,
    /// Stable sort by per-segment specificity
    Specificity,
}

/// Route table compiler
#[derive(Debug, Clone)]
pub struct RouteTableBuilder {
    controller_bases: Vec<String>,
    order: RouteOrder,
}

impl Default for RouteTableBuilder {
    fn default() -> Self {
        Self {
            controller_bases: DEFAULT_CONTROLLER_BASES.iter().map(ToString::to_string).collect(),
            order: RouteOrder::Declaration,
        }
    }
}

impl RouteTableBuilder {
    /// Builder recognizing the default controller bases, in declaration order
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder configured from the routing section
    #[must_use]
    pub fn from_config(config: &RoutingConfig) -> Self {
        let mut builder = Self::new().with_order(config.order);
        for base in &config.controller_bases {
            builder = builder.with_controller_base(base.clone());
        }
        builder
    }

    /// Recognize another base type as a controller base
    #[must_use]
    pub fn with_controller_base(mut self, base: impl Into<String>) -> Self {
        let base = base.into();
        if !self.controller_bases.contains(&base) {
            self.controller_bases.push(base);
        }
        self
    }

    /// Set the final ordering
    #[must_use]
    pub fn with_order(mut self, order: RouteOrder) -> Self {
        self.order = order;
        self
    }

    /// Known controller base types
    #[must_use]
    pub fn controller_bases(&self) -> &[String] {
        &self.controller_bases
    }

    /// Compile the modules into a route table
    ///
    /// # Errors
    ///
    /// Any `ConfigurationError`: module graph problems, duplicate
    /// controllers or actions, malformed templates, or two actions compiling
    /// to the same verb and route.
    pub fn build(&self, modules: &[ModuleDeclaration]) -> Result<RouteTable, ConfigurationError> {
        let mut state = BuildState::default();

        for module in ModuleGraph::resolve(modules)? {
            for declaration in &module.declarations {
                if !declaration.is_controller(&self.controller_bases) {
                    debug!(module = %module.name, name = %declaration.name, "Skipping non-controller");
                    continue;
                }
                if let Some(first) = state
                    .owners
                    .insert(declaration.name.clone(), module.name.clone())
                {
                    return Err(ConfigurationError::DuplicateController {
                        name: declaration.name.clone(),
                        first,
                        second: module.name.clone(),
                    });
                }

                let metadata = declaration.extract()?;
                for action in &metadata.actions {
                    state.emit_action(&metadata, action, &module.name)?;
                }
            }
        }

        let mut table = RouteTable::new(state.entries);
        if self.order == RouteOrder::Specificity {
            table.sort_by_specificity();
        }
        info!(
            routes = table.len(),
            controllers = state.owners.len(),
            order = ?self.order,
            "Route table built"
        );
        Ok(table)
    }
}

#[derive(Default)]
struct BuildState {
    /// Controller name -> module that registered it
    owners: HashMap<String, String>,
    /// (verb, route) -> `Controller::action` that claimed it
    claimed: HashMap<(RouteMethod, String), String>,
    entries: Vec<RouteEntry>,
}

impl BuildState {
    fn emit_action(
        &mut self,
        controller: &ControllerMetadata,
        action: &ActionMetadata,
        module: &str,
    ) -> Result<(), ConfigurationError> {
        let area = action.area.clone().or_else(|| controller.area.clone());
        let values = TokenValues {
            action: action.name.clone(),
            area: area.clone().unwrap_or_default(),
            controller: controller_token(&controller.name),
            handler: action
                .handler
                .clone()
                .or_else(|| controller.handler.clone())
                .unwrap_or_else(|| action.name.clone()),
            page: action
                .page
                .clone()
                .or_else(|| controller.page.clone())
                .unwrap_or_default(),
        };
        let auth: Vec<String> = controller.auth.iter().chain(&action.auth).cloned().collect();
        let target = format!("{}::{}", controller.name, action.name);

        let mut emitted = HashSet::new();
        for base in &controller.base_routes {
            for (method, template) in &action.routes {
                let template = compile(base, template, &values)?;
                let route = template.render();
                // An absolute template repeated across bases is one route.
                if !emitted.insert((*method, route.clone())) {
                    continue;
                }
                if let Some(first) = self.claimed.get(&(*method, route.clone())) {
                    return Err(ConfigurationError::DuplicateRoute {
                        method: method.to_string(),
                        route,
                        first: first.clone(),
                        second: target,
                    });
                }
                self.claimed.insert((*method, route.clone()), target.clone());

                let params = synthesize_params(&action.params, &template)?;
                debug!(method = %method, route = %route, handler = %target, "Route compiled");
                self.entries.push(
                    RouteEntry::new(template, *method, &controller.name, &action.name, module)
                        .with_params(params)
                        .with_auth(auth.clone())
                        .with_area(area.clone()),
                );
            }
        }
        Ok(())
    }
}

/// `ProductController` -> `product`
fn controller_token(name: &str) -> String {
    let lower = name.to_lowercase();
    lower
        .strip_suffix("controller")
        .map_or_else(|| lower.clone(), ToString::to_string)
}

/// Join, substitute and normalize, then re-validate the result
///
/// Re-parsing the rendered route catches captures that only collide or
/// misplace a catch-all once base and action templates are combined, and
/// guarantees the cached form compiles back to the same template.
fn compile(
    base: &RouteTemplate,
    template: &RouteTemplate,
    values: &TokenValues,
) -> Result<RouteTemplate, ConfigurationError> {
    let normalized = base.join(template).substitute(values).normalized();
    RouteTemplate::parse(&normalized.render())
}

/// Declared bindings plus a route binding for every undeclared capture
fn synthesize_params(
    declared: &[ParamSpec],
    template: &RouteTemplate,
) -> Result<Vec<ParamSpec>, ConfigurationError> {
    let mut params = declared.to_vec();
    for (name, ty, default) in template.captures() {
        if declared.iter().any(|p| p.name == name) {
            continue;
        }
        let mut spec = ParamSpec::route(name, ty);
        if let Some(raw) = default {
            spec = spec.optional().with_default(typed_default(template, name, raw, ty)?);
        }
        params.push(spec);
    }
    Ok(params)
}

fn typed_default(
    template: &RouteTemplate,
    name: &str,
    raw: &str,
    ty: ParamType,
) -> Result<ParamValue, ConfigurationError> {
    convert_param(raw, ty).ok_or_else(|| ConfigurationError::MalformedTemplate {
        template: template.render(),
        reason: format!("default `{raw}` of `{name}` is not a valid {ty}"),
    })
}
