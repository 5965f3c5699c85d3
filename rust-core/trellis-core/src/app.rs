//! # Application Boot
//!
//! Collects modules, handlers, services, guards and middleware, then boots a
//! [`Dispatcher`]:
//!
//! 1. Restore the route table from the cache (production only), or build it
//!    from the module graph and write it back.
//! 2. Check every guard the table names is registered.
//! 3. Freeze everything behind the dispatcher.
//!
//! ```ignore
//! let app = Application::new(AppConfig::load("trellis.toml")?)
//!     .module(ModuleDeclaration::new("store").declare(products()))
//!     .handle("ProductController", "getProduct", action(get_product))
//!     .guard("jwt", JwtGuard::new(&secret));
//! app.serve().await?;
//! ```

use crate::builder::RouteTableBuilder;
use crate::cache::RouteCache;
use crate::config::AppConfig;
use crate::controller::{ActionHandler, HandlerRegistry};
use crate::dispatcher::Dispatcher;
use crate::error::Result;
use crate::guard::{Guard, GuardRegistry};
use crate::middleware::{Middleware, MiddlewareChain};
use crate::module::ModuleDeclaration;
use crate::router::RouteTable;
use crate::server::Server;
use crate::services::Services;
use tracing::{info, warn};

/// Application under construction
#[derive(Debug, Default)]
pub struct Application {
    config: AppConfig,
    modules: Vec<ModuleDeclaration>,
    handlers: HandlerRegistry,
    services: Services,
    guards: GuardRegistry,
    middleware: MiddlewareChain,
}

impl Application {
    /// Empty application with the given configuration
    #[must_use]
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Add a module; order matters only among modules without imports
    #[must_use]
    pub fn module(mut self, module: ModuleDeclaration) -> Self {
        self.modules.push(module);
        self
    }

    /// Register the handler for `Controller::action`
    #[must_use]
    pub fn handle(
        mut self,
        controller: impl Into<String>,
        action: impl Into<String>,
        handler: ActionHandler,
    ) -> Self {
        self.handlers.register(controller, action, handler);
        self
    }

    /// Register a service under its short type name
    #[must_use]
    pub fn service<T: Send + Sync + 'static>(self, service: T) -> Self {
        self.services.register(service);
        self
    }

    /// Register a service under an explicit name
    #[must_use]
    pub fn service_named<T: Send + Sync + 'static>(
        self,
        name: impl Into<String>,
        service: T,
    ) -> Self {
        self.services.register_named(name, service);
        self
    }

    /// Register a guard routes can name
    #[must_use]
    pub fn guard<G: Guard + 'static>(mut self, name: impl Into<String>, guard: G) -> Self {
        self.guards.add(name, guard);
        self
    }

    /// Append a middleware
    #[must_use]
    pub fn middleware<M: Middleware + 'static>(mut self, middleware: M) -> Self {
        self.middleware.add(middleware);
        self
    }

    /// Active configuration
    #[must_use]
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Declared modules
    #[must_use]
    pub fn modules(&self) -> &[ModuleDeclaration] {
        &self.modules
    }

    /// Compile the route table from the modules, ignoring the cache
    ///
    /// # Errors
    ///
    /// Returns `Error::Configuration` for any invalid declaration.
    pub fn build_routes(&self) -> Result<RouteTable> {
        Ok(RouteTableBuilder::from_config(&self.config.routing).build(&self.modules)?)
    }

    /// Cached table if usable, otherwise a fresh build that is then cached
    ///
    /// A failed cache write is logged and does not stop the boot.
    ///
    /// # Errors
    ///
    /// Returns `Error::Configuration` when the table has to be built and the
    /// declarations are invalid.
    pub fn load_routes(&self) -> Result<RouteTable> {
        let cache = RouteCache::from_config(&self.config);
        if let Some(table) = cache.get_cached() {
            return Ok(table);
        }

        let table = self.build_routes()?;
        if let Err(e) = cache.cache(&table) {
            warn!(code = e.code(), error = %e, "Failed to write route cache");
        }
        Ok(table)
    }

    /// Freeze the application into a dispatcher
    ///
    /// # Errors
    ///
    /// Returns `Error::Configuration` for invalid declarations or a route
    /// naming an unregistered guard.
    pub fn boot(self) -> Result<Dispatcher> {
        let table = self.load_routes()?;
        self.guards.validate(&table)?;

        for target in self.handlers.missing(&table) {
            warn!(handler = %target, "Route has no registered handler");
        }

        info!(
            environment = self.config.environment.as_str(),
            routes = table.len(),
            handlers = self.handlers.len(),
            services = self.services.len(),
            guards = self.guards.len(),
            middleware = ?self.middleware.names(),
            "Application booted"
        );

        Ok(Dispatcher::new(table)
            .with_handlers(self.handlers)
            .with_services(self.services)
            .with_guards(self.guards)
            .with_middleware(self.middleware)
            .with_policy(self.config.routing.match_policy))
    }

    /// Boot and serve until Ctrl-C
    ///
    /// # Errors
    ///
    /// Returns boot errors and `Error::BindError`.
    pub async fn serve(self) -> Result<()> {
        let server_config = self.config.server.clone();
        let dispatcher = self.boot()?;
        Server::new(dispatcher, server_config).serve().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Environment;
    use crate::controller::action;
    use crate::descriptor::{ActionDescriptor, ControllerDescriptor};
    use crate::error::{ConfigurationError, Error};
    use crate::guard::HeaderGuard;
    use crate::request::Request;
    use crate::response::Response;
    use crate::router::Method;
    use crate::types::{ParamSpec, ParamType};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    static COUNTER: AtomicUsize = AtomicUsize::new(0);

    fn store() -> ModuleDeclaration {
        ModuleDeclaration::new("store").declare(
            ControllerDescriptor::new("ProductController")
                .route("/store-api/products")
                .action(ActionDescriptor::new("productList").get(""))
                .action(
                    ActionDescriptor::new("getProduct")
                        .get("{id:int}")
                        .param(ParamSpec::route("id", ParamType::Int)),
                )
                .action(ActionDescriptor::new("deleteProduct").delete("{id:int}").auth("key")),
        )
    }

    struct Catalog {
        name: &'static str,
    }

    #[tokio::test]
    async fn test_boot_and_dispatch() {
        let dispatcher = Application::default()
            .module(store())
            .service(Catalog { name: "main" })
            .guard("key", HeaderGuard::new("x-api-key"))
            .handle(
                "ProductController",
                "getProduct",
                action(|ctx| async move {
                    let id = ctx.arguments.get_int("id").unwrap_or_default();
                    Ok(Response::json_value(&serde_json::json!({ "id": id })))
                }),
            )
            .boot()
            .unwrap();

        assert_eq!(dispatcher.table().len(), 3);
        assert!(dispatcher.services().get_typed::<Catalog>().is_some_and(|c| c.name == "main"));

        let res = dispatcher.dispatch(Request::get("/store-api/products/7")).await;
        assert_eq!(res.body_json().unwrap()["id"], 7);

        let delete = Request::new(Method::Delete, "/store-api/products/7", HashMap::new(), None);
        assert_eq!(dispatcher.dispatch(delete).await.status, 401);
    }

    #[test]
    fn test_unknown_guard_fails_boot() {
        let err = Application::default().module(store()).boot().unwrap_err();
        assert!(matches!(
            err,
            Error::Configuration(ConfigurationError::UnknownGuard { .. })
        ));
    }

    #[test]
    fn test_invalid_declarations_fail_boot() {
        let broken = ModuleDeclaration::new("broken").declare(
            ControllerDescriptor::new("BrokenController")
                .action(ActionDescriptor::new("show").get("{id:int")),
        );
        assert!(Application::default().module(broken).build_routes().is_err());
    }

    #[test]
    fn test_production_boot_writes_and_reuses_cache() {
        let n = COUNTER.fetch_add(1, Ordering::Relaxed);
        let path = std::env::temp_dir()
            .join(format!("trellis-app-{}-{n}", std::process::id()))
            .join("routes.json");

        let mut config = AppConfig::default();
        config.environment = Environment::Production;
        config.routing.cache_path = path.clone();

        let app = Application::new(config.clone()).module(store());
        let built = app.load_routes().unwrap();
        assert!(path.exists());

        // no modules: only a cache hit can produce routes
        let restored = Application::new(config).load_routes().unwrap();
        assert_eq!(restored, built);

        RouteCache::new(&path).clear().unwrap();
    }

    #[test]
    fn test_development_never_caches() {
        let mut config = AppConfig::default();
        config.routing.cache_path = std::env::temp_dir().join("trellis-app-dev-never.json");
        let app = Application::new(config).module(store());
        app.load_routes().unwrap();
        assert!(!app.config().routing.cache_path.exists());
    }
}
