//! # Controller Actions
//!
//! Action handlers are async closures registered per `(controller, action)`
//! pair, the same pair a route entry names. Each invocation receives an
//! [`ActionContext`] it owns outright.

use crate::binder::Arguments;
use crate::matcher::RouteMatchContext;
use crate::request::Request;
use crate::response::Response;
use crate::router::RouteTable;
use std::collections::{BTreeSet, HashMap};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Error an action may return; rendered as a 500
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Outcome of an action
pub type HandlerResult = std::result::Result<Response, HandlerError>;

/// Boxed action future
pub type ActionFuture = Pin<Box<dyn Future<Output = HandlerResult> + Send>>;

/// Type-erased action handler
pub type ActionHandler = Arc<dyn Fn(ActionContext) -> ActionFuture + Send + Sync>;

/// Everything an action receives
#[derive(Debug)]
pub struct ActionContext {
    /// The request, with claims attached by guards
    pub request: Request,
    /// Bound arguments in declaration order
    pub arguments: Arguments,
    /// Reserved values and raw captures
    pub route: RouteMatchContext,
    /// Cancelled when the client goes away
    pub cancellation: CancellationToken,
}

/// Wrap an async closure as an [`ActionHandler`]
///
/// ```ignore
/// let show = action(|ctx| async move {
///     let id = ctx.arguments.get_int("id").unwrap_or_default();
///     Ok(Response::json_value(&serde_json::json!({ "id": id })))
/// });
/// ```
pub fn action<F, Fut>(f: F) -> ActionHandler
where
    F: Fn(ActionContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    Arc::new(move |ctx| Box::pin(f(ctx)))
}

/// Handlers keyed by `(controller, action)`
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: HashMap<(String, String), ActionHandler>,
}

impl HandlerRegistry {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or replace a handler
    pub fn register(
        &mut self,
        controller: impl Into<String>,
        action: impl Into<String>,
        handler: ActionHandler,
    ) {
        self.handlers.insert((controller.into(), action.into()), handler);
    }

    /// Handler for a pair
    #[must_use]
    pub fn get(&self, controller: &str, action: &str) -> Option<ActionHandler> {
        self.handlers
            .get(&(controller.to_string(), action.to_string()))
            .cloned()
    }

    /// Whether a pair has a handler
    #[must_use]
    pub fn contains(&self, controller: &str, action: &str) -> bool {
        self.handlers
            .contains_key(&(controller.to_string(), action.to_string()))
    }

    /// Number of handlers
    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Check if the registry is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// `Controller::action` targets of the table that have no handler, sorted
    #[must_use]
    pub fn missing(&self, table: &RouteTable) -> Vec<String> {
        table
            .iter()
            .filter(|entry| !self.contains(&entry.controller, &entry.action))
            .map(crate::route::RouteEntry::target)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut keys: Vec<String> = self
            .handlers
            .keys()
            .map(|(c, a)| format!("{c}::{a}"))
            .collect();
        keys.sort();
        f.debug_struct("HandlerRegistry").field("actions", &keys).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::route::{RouteEntry, RouteMethod};
    use crate::template::RouteTemplate;

    fn context() -> ActionContext {
        ActionContext {
            request: Request::get("/"),
            arguments: Arguments::new(),
            route: RouteMatchContext::new(),
            cancellation: CancellationToken::new(),
        }
    }

    #[test]
    fn test_register_and_invoke() {
        let mut registry = HandlerRegistry::new();
        registry.register(
            "HomeController",
            "index",
            action(|ctx| async move { Ok(Response::text(ctx.request.path)) }),
        );
        assert!(registry.contains("HomeController", "index"));
        assert_eq!(registry.len(), 1);

        let handler = registry.get("HomeController", "index").unwrap();
        let response = tokio_test::block_on(handler(context())).unwrap();
        assert_eq!(response.body, "/");
    }

    #[test]
    fn test_handler_errors() {
        let handler = action(|_ctx| async move {
            Err::<Response, HandlerError>("database offline".into())
        });
        let err = tokio_test::block_on(handler(context())).unwrap_err();
        assert_eq!(err.to_string(), "database offline");
    }

    #[test]
    fn test_missing_handlers() {
        let entry = |action: &str, route: &str| {
            RouteEntry::new(
                RouteTemplate::parse(route).unwrap(),
                RouteMethod::Get,
                "UserController",
                action,
                "users",
            )
        };
        let table = RouteTable::new(vec![
            entry("list", "/users"),
            entry("show", "/users/{id}"),
            entry("show", "/people/{id}"),
        ]);
        let mut registry = HandlerRegistry::new();
        registry.register("UserController", "list", action(|_| async { Ok(Response::empty(204)) }));
        assert_eq!(registry.missing(&table), vec!["UserController::show".to_string()]);
    }
}
