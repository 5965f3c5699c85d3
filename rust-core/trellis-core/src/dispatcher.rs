//! # Dispatch Orchestrator
//!
//! Runs one request through the frozen route table:
//!
//! ```text
//! match (verb filter, then segments) ─┬─ none ──────────────────────────> 404
//!                                     └─ entry ─> guards ─> middleware ─> bind ─> action
//!                                                  401/403   short-circuit   400     500 on Err/panic
//! ```
//!
//! [`Dispatcher::dispatch`] never fails: every error becomes a structured
//! response, and `after_response` middleware sees all of them. Actions run on
//! their own task so a panic is contained, and dropping the dispatch future
//! (client disconnect) cancels the action's token and aborts the task.

use crate::binder::bind;
use crate::controller::{ActionContext, ActionHandler, HandlerRegistry};
use crate::error::{Error, Result};
use crate::guard::GuardRegistry;
use crate::matcher::MatchPolicy;
use crate::middleware::{MiddlewareChain, MiddlewareResult};
use crate::request::Request;
use crate::response::Response;
use crate::route::RouteEntry;
use crate::router::{Method, RouteMatch, RouteTable};
use crate::services::Services;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::task::AbortHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

/// Request dispatcher over an immutable route table
#[derive(Debug, Clone)]
pub struct Dispatcher {
    table: Arc<RouteTable>,
    handlers: Arc<HandlerRegistry>,
    services: Services,
    guards: Arc<GuardRegistry>,
    middleware: Arc<MiddlewareChain>,
    policy: MatchPolicy,
}

impl Dispatcher {
    /// Dispatcher with no handlers, services, guards or middleware
    #[must_use]
    pub fn new(table: RouteTable) -> Self {
        Self {
            table: Arc::new(table),
            handlers: Arc::new(HandlerRegistry::new()),
            services: Services::new(),
            guards: Arc::new(GuardRegistry::new()),
            middleware: Arc::new(MiddlewareChain::new()),
            policy: MatchPolicy::Strict,
        }
    }

    /// Set the action handlers
    #[must_use]
    pub fn with_handlers(mut self, handlers: HandlerRegistry) -> Self {
        self.handlers = Arc::new(handlers);
        self
    }

    /// Set the service registry
    #[must_use]
    pub fn with_services(mut self, services: Services) -> Self {
        self.services = services;
        self
    }

    /// Set the guards
    #[must_use]
    pub fn with_guards(mut self, guards: GuardRegistry) -> Self {
        self.guards = Arc::new(guards);
        self
    }

    /// Set the middleware chain
    #[must_use]
    pub fn with_middleware(mut self, middleware: MiddlewareChain) -> Self {
        self.middleware = Arc::new(middleware);
        self
    }

    /// Set the match policy
    #[must_use]
    pub fn with_policy(mut self, policy: MatchPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// The route table
    #[must_use]
    pub fn table(&self) -> &RouteTable {
        &self.table
    }

    /// The match policy
    #[must_use]
    pub fn policy(&self) -> MatchPolicy {
        self.policy
    }

    /// The service registry
    #[must_use]
    pub fn services(&self) -> &Services {
        &self.services
    }

    /// First entry accepting the verb and path
    #[must_use]
    pub fn resolve(&self, method: Method, path: &str) -> Option<RouteMatch<'_>> {
        self.table.find(method, path, self.policy)
    }

    /// Produce the response for a request
    pub async fn dispatch(&self, mut req: Request) -> Response {
        let started = Instant::now();
        let request_id = match req.header("x-request-id") {
            Some(id) => id.to_string(),
            None => {
                let id = generate_request_id();
                req.set_header("x-request-id", &id);
                id
            }
        };

        let mut response = match self.execute(&mut req).await {
            Ok(response) => response,
            Err(e) => {
                if e.status() >= 500 {
                    error!(request_id = %request_id, code = e.code(), error = %e, "Request failed");
                } else {
                    debug!(request_id = %request_id, code = e.code(), error = %e, "Request rejected");
                }
                Response::from_error(&e)
            }
        };

        response.set_header("x-request-id", &request_id);
        self.middleware.run_after(&req, &mut response);
        debug!(
            method = %req.method,
            path = %req.path,
            status = response.status,
            elapsed_us = started.elapsed().as_micros(),
            "Request dispatched"
        );
        response
    }

    async fn execute(&self, req: &mut Request) -> Result<Response> {
        let Some(RouteMatch { entry, context }) = self.table.find(req.method, &req.path, self.policy)
        else {
            return Err(Error::RouteNotFound {
                method: req.method.to_string(),
                path: req.path.clone(),
                allowed: self
                    .table
                    .methods_for(&req.path, self.policy)
                    .iter()
                    .map(|m| m.as_str().to_string())
                    .collect(),
            });
        };
        debug!(
            method = %req.method,
            path = %req.path,
            route = %entry.route,
            handler = %entry.target(),
            "Route matched"
        );

        self.guards.check(entry.guards(), req)?;

        if let MiddlewareResult::Respond(response) = self.middleware.run_before(req) {
            return Ok(response);
        }

        let arguments = bind(&entry.params, &context, req, &self.services)?;

        let handler = self
            .handlers
            .get(&entry.controller, &entry.action)
            .ok_or_else(|| dispatch_error(entry, "no handler registered"))?;

        let ctx = ActionContext {
            request: req.clone(),
            arguments,
            route: context,
            cancellation: CancellationToken::new(),
        };
        invoke(handler, ctx, entry).await
    }
}

/// Run the action on its own task
async fn invoke(handler: ActionHandler, ctx: ActionContext, entry: &RouteEntry) -> Result<Response> {
    let token = ctx.cancellation.clone();
    let mut task = tokio::spawn(async move { handler(ctx).await });
    let mut guard = AbortOnDrop {
        abort: task.abort_handle(),
        token,
        armed: true,
    };
    let outcome = (&mut task).await;
    guard.armed = false;

    match outcome {
        Ok(Ok(response)) => Ok(response),
        Ok(Err(e)) => {
            error!(handler = %entry.target(), error = %e, "Action failed");
            Err(dispatch_error(entry, &e.to_string()))
        }
        Err(join) if join.is_panic() => {
            error!(handler = %entry.target(), "Action panicked");
            Err(dispatch_error(entry, "action panicked"))
        }
        Err(_) => {
            warn!(handler = %entry.target(), "Action cancelled");
            Err(dispatch_error(entry, "action cancelled"))
        }
    }
}

/// Cancels and aborts the action when the dispatch future is dropped early
struct AbortOnDrop {
    abort: AbortHandle,
    token: CancellationToken,
    armed: bool,
}

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        if self.armed {
            self.token.cancel();
            self.abort.abort();
        }
    }
}

fn dispatch_error(entry: &RouteEntry, message: &str) -> Error {
    Error::Dispatch {
        controller: entry.controller.clone(),
        action: entry.action.clone(),
        message: message.to_string(),
    }
}

static REQUEST_COUNTER: AtomicUsize = AtomicUsize::new(1);

fn generate_request_id() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    let counter = REQUEST_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("{:x}-{:x}", now.as_nanos(), counter)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::{action, HandlerError};
    use crate::guard::HeaderGuard;
    use crate::middleware::CorsMiddleware;
    use crate::route::RouteMethod;
    use crate::template::RouteTemplate;
    use crate::types::{ParamSpec, ParamType};
    use std::collections::HashMap;
    use std::sync::atomic::AtomicBool;
    use std::time::Duration;

    fn entry(method: RouteMethod, route: &str, action: &str) -> RouteEntry {
        RouteEntry::new(
            RouteTemplate::parse(route).unwrap(),
            method,
            "ProductController",
            action,
            "store",
        )
    }

    fn dispatcher() -> Dispatcher {
        let table = RouteTable::new(vec![
            entry(RouteMethod::Get, "/products/{id:int}", "show")
                .with_params(vec![ParamSpec::route("id", ParamType::Int)]),
            entry(RouteMethod::Get, "/boom", "boom"),
            entry(RouteMethod::Get, "/fail", "fail"),
            entry(RouteMethod::Get, "/orphan", "orphan"),
            entry(RouteMethod::Get, "/admin", "admin").with_auth(vec!["key".to_string()]),
        ]);

        let mut handlers = HandlerRegistry::new();
        handlers.register(
            "ProductController",
            "show",
            action(|ctx| async move {
                let id = ctx.arguments.get_int("id").unwrap_or_default();
                Ok(Response::json_value(&serde_json::json!({ "id": id })))
            }),
        );
        handlers.register(
            "ProductController",
            "boom",
            action(|_| async move {
                if true {
                    panic!("handler bug");
                }
                Ok(Response::empty(200))
            }),
        );
        handlers.register(
            "ProductController",
            "fail",
            action(|_| async move { Err::<Response, HandlerError>("db down".into()) }),
        );
        handlers.register(
            "ProductController",
            "admin",
            action(|_| async move { Ok(Response::text("welcome")) }),
        );

        let mut guards = GuardRegistry::new();
        guards.add("key", HeaderGuard::new("x-api-key").with_value("k1"));
        let mut middleware = MiddlewareChain::new();
        middleware.add(CorsMiddleware::new());

        Dispatcher::new(table)
            .with_handlers(handlers)
            .with_guards(guards)
            .with_middleware(middleware)
    }

    fn request(method: Method, path: &str) -> Request {
        Request::new(method, path, HashMap::new(), None)
    }

    #[tokio::test]
    async fn test_dispatch_binds_and_invokes() {
        let res = dispatcher().dispatch(request(Method::Get, "/products/42")).await;
        assert_eq!(res.status, 200);
        assert_eq!(res.body_json().unwrap()["id"], 42);
        assert!(res.header("x-request-id").is_some());
        assert_eq!(res.header("access-control-allow-origin"), Some("*"));
    }

    #[tokio::test]
    async fn test_not_found_and_verb_mismatch() {
        let d = dispatcher();
        let res = d.dispatch(request(Method::Delete, "/products/42")).await;
        assert_eq!(res.status, 404);
        let body = res.body_json().unwrap();
        assert_eq!(body["error"]["method"], "DELETE");
        assert_eq!(body["error"]["allowed"], serde_json::json!(["GET"]));
        assert_eq!(res.header("access-control-allow-origin"), Some("*"));

        let res = d.dispatch(request(Method::Get, "/nowhere")).await;
        assert!(res.body_json().unwrap()["error"].get("allowed").is_none());
    }

    #[tokio::test]
    async fn test_binding_failure_is_400() {
        let res = dispatcher().dispatch(request(Method::Get, "/products/abc")).await;
        assert_eq!(res.status, 400);
        assert_eq!(res.body_json().unwrap()["error"]["fields"][0]["field"], "id");
    }

    #[tokio::test]
    async fn test_failures_are_500() {
        let d = dispatcher();
        for path in ["/boom", "/fail", "/orphan"] {
            let res = d.dispatch(request(Method::Get, path)).await;
            assert_eq!(res.status, 500, "{path}");
            assert_eq!(res.body_json().unwrap()["error"]["code"], "DISPATCH_ERROR");
        }
    }

    #[tokio::test]
    async fn test_guards_run_before_action() {
        let d = dispatcher();
        assert_eq!(d.dispatch(request(Method::Get, "/admin")).await.status, 401);
        let denied = request(Method::Get, "/admin").with_header("x-api-key", "nope");
        assert_eq!(d.dispatch(denied).await.status, 403);
        let allowed = request(Method::Get, "/admin").with_header("x-api-key", "k1");
        assert_eq!(d.dispatch(allowed).await.body, "welcome");
    }

    #[tokio::test]
    async fn test_request_id_is_echoed() {
        let req = request(Method::Get, "/products/1").with_header("x-request-id", "abc-123");
        let res = dispatcher().dispatch(req).await;
        assert_eq!(res.header("x-request-id"), Some("abc-123"));
    }

    #[tokio::test]
    async fn test_dropped_dispatch_aborts_action() {
        let completed = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&completed);

        let mut handlers = HandlerRegistry::new();
        handlers.register(
            "ProductController",
            "slow",
            action(move |_| {
                let flag = Arc::clone(&flag);
                async move {
                    tokio::time::sleep(Duration::from_millis(200)).await;
                    flag.store(true, Ordering::SeqCst);
                    Ok(Response::empty(204))
                }
            }),
        );
        let d = Dispatcher::new(RouteTable::new(vec![entry(RouteMethod::Get, "/slow", "slow")]))
            .with_handlers(handlers);

        let result =
            tokio::time::timeout(Duration::from_millis(50), d.dispatch(request(Method::Get, "/slow")))
                .await;
        assert!(result.is_err());
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(!completed.load(Ordering::SeqCst));
    }

    #[test]
    fn test_request_ids_are_unique() {
        assert_ne!(generate_request_id(), generate_request_id());
    }
}
