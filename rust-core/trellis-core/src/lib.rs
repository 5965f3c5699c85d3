//! # Trellis Core
//!
//! Core runtime library for the Trellis framework.
//! Compiles declarative controller descriptors into a frozen route table,
//! matches requests against it, binds typed arguments and dispatches to
//! async action handlers.
//!
//! ## Architecture
//!
//! Boot is a one-shot pipeline (modules, descriptors, templates, table) whose
//! output is immutable and shared by every request. Per-request state lives
//! in a fresh match context and never leaks between requests.
//!
//! ## Modules
//!
//! - `module` - Module declarations and import-graph ordering
//! - `descriptor` - Controller/action declarations and metadata extraction
//! - `template` - Route template parsing, joining and token substitution
//! - `builder` - Route table construction with conflict detection
//! - `route` - Compiled route entries
//! - `router` - Route table and verb-filtered first-match lookup
//! - `matcher` - Segment matching and per-request match context
//! - `binder` - Typed argument binding from route, query, header, body and services
//! - `dispatcher` - Guards, middleware, binding and action invocation
//! - `cache` - Production route table cache
//! - `app` - Application assembly and boot
//! - `server` - HTTP server built on Hyper
//! - `request` / `response` - HTTP wrappers
//! - `middleware` - Request/response middleware system
//! - `guard` - Named auth guards
//! - `services` - Shared service registry
//! - `config` / `logging` - TOML configuration and tracing setup
//! - `json` - JSON parsing with simd-json
//! - `types` / `validation` - Parameter types and structured validation errors
//! - `error` - Error types and handling

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod app;
pub mod binder;
pub mod builder;
pub mod cache;
pub mod config;
pub mod controller;
pub mod descriptor;
pub mod dispatcher;
pub mod error;
pub mod guard;
pub mod json;
pub mod logging;
pub mod matcher;
pub mod middleware;
pub mod module;
pub mod request;
pub mod response;
pub mod route;
pub mod router;
pub mod server;
pub mod services;
pub mod template;
pub mod types;
pub mod validation;

pub use app::Application;
pub use binder::{bind, Argument, Arguments};
pub use builder::{RouteOrder, RouteTableBuilder};
pub use cache::RouteCache;
pub use config::{AppConfig, Environment, LogFormat, LoggingConfig, RoutingConfig};
pub use controller::{action, ActionContext, ActionHandler, HandlerError, HandlerRegistry, HandlerResult};
pub use descriptor::{ActionDescriptor, ControllerDescriptor};
pub use dispatcher::Dispatcher;
pub use error::{ConfigurationError, Error, Result};
pub use guard::{Guard, GuardRegistry, GuardRejection, HeaderGuard, JwtGuard};
pub use json::{parse_json, to_json};
pub use logging::init_tracing;
pub use matcher::{MatchPolicy, RouteMatchContext};
pub use middleware::{
    CorsMiddleware, LoggingMiddleware, Middleware, MiddlewareChain, MiddlewareResult,
    RateLimitMiddleware,
};
pub use module::{ModuleDeclaration, ModuleGraph, ModuleManifest};
pub use request::Request;
pub use response::Response;
pub use route::{RouteEntry, RouteMethod};
pub use router::{Method, RouteMatch, RouteTable};
pub use server::{Server, ServerConfig};
pub use services::Services;
pub use template::RouteTemplate;
pub use types::{BindingSource, ParamSpec, ParamType, ParamValue};
pub use validation::{FieldError, ValidationCode, ValidationErrors, ValidationResult};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert_eq!(VERSION, "0.1.1");
    }
}
