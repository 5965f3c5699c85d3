//! # Service Registry
//!
//! Thread-safe container for application services that actions receive
//! through `services`-sourced parameters.
//!
//! Services are shared (`Arc`) rather than cloned per request. They are
//! keyed by name; [`Services::register`] derives the key from the short type
//! name so `register(Mailer::new())` is found by a parameter named `Mailer`.

use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

type ServiceMap = HashMap<String, Arc<dyn Any + Send + Sync>>;

/// Thread-safe service container
#[derive(Clone, Default)]
pub struct Services {
    data: Arc<RwLock<ServiceMap>>,
}

impl Services {
    /// Create a new empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a service under its short type name
    ///
    /// Overwrites any existing service with the same key.
    pub fn register<T: Send + Sync + 'static>(&self, service: T) {
        self.register_named(short_type_name::<T>(), service);
    }

    /// Register a service under an explicit name
    pub fn register_named<T: Send + Sync + 'static>(&self, name: impl Into<String>, service: T) {
        self.register_arc(name, Arc::new(service));
    }

    /// Register an already shared service
    pub fn register_arc(&self, name: impl Into<String>, service: Arc<dyn Any + Send + Sync>) {
        let mut data = self.data.write().unwrap_or_else(PoisonError::into_inner);
        data.insert(name.into(), service);
    }

    /// Get a typed service by name
    ///
    /// Returns `None` if the name is unknown or the type doesn't match.
    #[must_use]
    pub fn get<T: Send + Sync + 'static>(&self, name: &str) -> Option<Arc<T>> {
        self.get_any(name).and_then(|service| service.downcast::<T>().ok())
    }

    /// Get a typed service registered with [`Services::register`]
    #[must_use]
    pub fn get_typed<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.get(short_type_name::<T>())
    }

    /// Get a service without knowing its type
    #[must_use]
    pub fn get_any(&self, name: &str) -> Option<Arc<dyn Any + Send + Sync>> {
        let data = self.data.read().unwrap_or_else(PoisonError::into_inner);
        data.get(name).cloned()
    }

    /// Check if a name is registered
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        let data = self.data.read().unwrap_or_else(PoisonError::into_inner);
        data.contains_key(name)
    }

    /// Remove a service by name
    pub fn remove(&self, name: &str) -> bool {
        let mut data = self.data.write().unwrap_or_else(PoisonError::into_inner);
        data.remove(name).is_some()
    }

    /// Number of registered services
    #[must_use]
    pub fn len(&self) -> usize {
        let data = self.data.read().unwrap_or_else(PoisonError::into_inner);
        data.len()
    }

    /// Check if the registry is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Registered names, sorted
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let data = self.data.read().unwrap_or_else(PoisonError::into_inner);
        let mut names: Vec<String> = data.keys().cloned().collect();
        names.sort();
        names
    }
}

impl std::fmt::Debug for Services {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Services")
            .field("names", &self.names())
            .finish()
    }
}

/// `my_app::mail::Mailer<T>` -> `Mailer`
fn short_type_name<T: ?Sized>() -> &'static str {
    let full = std::any::type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Mailer {
        from: String,
    }

    #[test]
    fn test_register_by_type_name() {
        let services = Services::new();
        services.register(Mailer {
            from: "shop@example.com".to_string(),
        });

        assert!(services.contains("Mailer"));
        let mailer = services.get::<Mailer>("Mailer").unwrap();
        assert_eq!(mailer.from, "shop@example.com");
        assert!(services.get_typed::<Mailer>().is_some());
    }

    #[test]
    fn test_type_mismatch() {
        let services = Services::new();
        services.register_named("count", 42_i32);
        assert!(services.get::<String>("count").is_none());
        assert_eq!(services.get::<i32>("count").as_deref(), Some(&42));
    }

    #[test]
    fn test_missing_name() {
        let services = Services::new();
        assert!(services.get_any("missing").is_none());
        assert!(services.is_empty());
    }

    #[test]
    fn test_overwrite_and_remove() {
        let services = Services::new();
        services.register_named("value", 1_i32);
        services.register_named("value", 2_i32);
        assert_eq!(services.get::<i32>("value").as_deref(), Some(&2));
        assert_eq!(services.len(), 1);

        assert!(services.remove("value"));
        assert!(!services.contains("value"));
    }

    #[test]
    fn test_short_type_name() {
        assert_eq!(short_type_name::<Mailer>(), "Mailer");
        assert_eq!(short_type_name::<Vec<String>>(), "Vec");
    }

    #[test]
    fn test_shared_across_threads() {
        let services = Services::new();
        let clone = services.clone();

        std::thread::spawn(move || clone.register_named("thread", 123_i32))
            .join()
            .unwrap();
        assert_eq!(services.get::<i32>("thread").as_deref(), Some(&123));
        assert_eq!(services.names(), vec!["thread".to_string()]);
    }
}
