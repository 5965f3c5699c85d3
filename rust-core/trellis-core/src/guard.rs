//! # Auth Guards
//!
//! Route entries name the guards a request must pass before its arguments
//! are bound. Guards are registered by name at boot; a route naming an
//! unregistered guard fails the boot instead of every request.

use crate::error::{ConfigurationError, Error};
use crate::request::Request;
use crate::router::RouteTable;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;

/// Why a guard refused a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuardRejection {
    /// 401 or 403
    pub status: u16,
    /// Reason returned to the client
    pub message: String,
}

impl GuardRejection {
    /// Credentials missing or invalid
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self {
            status: 401,
            message: message.into(),
        }
    }

    /// Credentials valid but insufficient
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self {
            status: 403,
            message: message.into(),
        }
    }
}

impl From<GuardRejection> for Error {
    fn from(rejection: GuardRejection) -> Self {
        Self::Unauthorized {
            status: rejection.status,
            message: rejection.message,
        }
    }
}

/// Request check run before binding
///
/// Guards may attach data to the request, e.g. token claims.
pub trait Guard: Send + Sync {
    /// Accept or reject the request
    ///
    /// # Errors
    ///
    /// Returns the rejection to send instead of dispatching.
    fn check(&self, req: &mut Request) -> Result<(), GuardRejection>;

    /// Guard name for logging
    fn name(&self) -> &'static str {
        "Guard"
    }
}

/// Guards by registration name
#[derive(Clone, Default)]
pub struct GuardRegistry {
    guards: HashMap<String, Arc<dyn Guard>>,
}

impl GuardRegistry {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or replace a guard
    pub fn add<G: Guard + 'static>(&mut self, name: impl Into<String>, guard: G) {
        self.guards.insert(name.into(), Arc::new(guard));
    }

    /// Guard by name
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Arc<dyn Guard>> {
        self.guards.get(name)
    }

    /// Whether a name is registered
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.guards.contains_key(name)
    }

    /// Number of guards
    #[must_use]
    pub fn len(&self) -> usize {
        self.guards.len()
    }

    /// Check if the registry is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.guards.is_empty()
    }

    /// Ensure every guard named by the table is registered
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationError::UnknownGuard` for the first unknown name.
    pub fn validate(&self, table: &RouteTable) -> Result<(), ConfigurationError> {
        for entry in table {
            if let Some(guard) = entry.guards().iter().find(|g| !self.contains(g)) {
                return Err(ConfigurationError::UnknownGuard {
                    guard: guard.clone(),
                    route: entry.route.clone(),
                });
            }
        }
        Ok(())
    }

    /// Run the named guards in order, stopping at the first rejection
    ///
    /// # Errors
    ///
    /// Returns the first rejection. An unregistered name rejects with 403.
    pub fn check(&self, names: &[String], req: &mut Request) -> Result<(), GuardRejection> {
        for name in names {
            let Some(guard) = self.guards.get(name) else {
                return Err(GuardRejection::forbidden(format!("guard `{name}` is not available")));
            };
            if let Err(rejection) = guard.check(req) {
                warn!(
                    guard = %name,
                    kind = guard.name(),
                    status = rejection.status,
                    path = %req.path,
                    "Request rejected by guard"
                );
                return Err(rejection);
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for GuardRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<&String> = self.guards.keys().collect();
        names.sort();
        f.debug_struct("GuardRegistry").field("guards", &names).finish()
    }
}

/// HS256 bearer token guard
///
/// Valid tokens attach their claims to [`Request::claims`].
#[derive(Clone)]
pub struct JwtGuard {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtGuard {
    /// Guard validating tokens signed with a shared secret
    #[must_use]
    pub fn new(secret: &str) -> Self {
        Self {
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::new(Algorithm::HS256),
        }
    }

    /// Require an `aud` claim
    #[must_use]
    pub fn with_audience(mut self, audience: &str) -> Self {
        self.validation.set_audience(&[audience]);
        self
    }
}

impl Guard for JwtGuard {
    fn check(&self, req: &mut Request) -> Result<(), GuardRejection> {
        let token = req
            .header("authorization")
            .and_then(|h| h.strip_prefix("Bearer "))
            .map(str::trim)
            .ok_or_else(|| GuardRejection::unauthorized("Missing or invalid Authorization header"))?;

        match decode::<serde_json::Value>(token, &self.decoding_key, &self.validation) {
            Ok(data) => {
                req.claims = Some(data.claims);
                Ok(())
            }
            Err(e) => {
                warn!("JWT validation failed: {}", e);
                Err(GuardRejection::unauthorized("Invalid or expired token"))
            }
        }
    }

    fn name(&self) -> &'static str {
        "JwtGuard"
    }
}

/// Requires a header, optionally with an exact value
#[derive(Debug, Clone)]
pub struct HeaderGuard {
    header: String,
    expected: Option<String>,
}

impl HeaderGuard {
    /// Require the header to be present
    pub fn new(header: impl Into<String>) -> Self {
        Self {
            header: header.into(),
            expected: None,
        }
    }

    /// Require an exact value
    #[must_use]
    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.expected = Some(value.into());
        self
    }
}

impl Guard for HeaderGuard {
    fn check(&self, req: &mut Request) -> Result<(), GuardRejection> {
        match (req.header(&self.header), &self.expected) {
            (None, _) => Err(GuardRejection::unauthorized(format!(
                "Missing {} header",
                self.header
            ))),
            (Some(actual), Some(expected)) if actual != expected => Err(
                GuardRejection::forbidden(format!("{} header does not grant access", self.header)),
            ),
            _ => Ok(()),
        }
    }

    fn name(&self) -> &'static str {
        "HeaderGuard"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::route::{RouteEntry, RouteMethod};
    use crate::template::RouteTemplate;
    use jsonwebtoken::{encode, get_current_timestamp, EncodingKey, Header};
    use serde_json::json;

    const SECRET: &str = "test-secret";

    fn token(secret: &str, exp: u64) -> String {
        encode(
            &Header::default(),
            &json!({ "sub": "user-1", "exp": exp }),
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    #[test]
    fn test_jwt_accepts_valid_token() {
        let guard = JwtGuard::new(SECRET);
        let mut req = Request::get("/me").with_header(
            "Authorization",
            &format!("Bearer {}", token(SECRET, get_current_timestamp() + 600)),
        );
        guard.check(&mut req).unwrap();
        assert_eq!(req.claims.unwrap()["sub"], "user-1");
    }

    #[test]
    fn test_jwt_rejects() {
        let guard = JwtGuard::new(SECRET);

        let mut missing = Request::get("/me");
        assert_eq!(guard.check(&mut missing).unwrap_err().status, 401);

        let mut forged = Request::get("/me").with_header(
            "Authorization",
            &format!("Bearer {}", token("other", get_current_timestamp() + 600)),
        );
        assert_eq!(guard.check(&mut forged).unwrap_err().status, 401);

        let mut expired = Request::get("/me").with_header(
            "Authorization",
            &format!("Bearer {}", token(SECRET, 1_000)),
        );
        assert!(guard.check(&mut expired).is_err());
        assert!(expired.claims.is_none());
    }

    #[test]
    fn test_header_guard() {
        let guard = HeaderGuard::new("x-api-key").with_value("k1");
        assert_eq!(guard.check(&mut Request::get("/")).unwrap_err().status, 401);
        let mut wrong = Request::get("/").with_header("X-Api-Key", "k2");
        assert_eq!(guard.check(&mut wrong).unwrap_err().status, 403);
        let mut right = Request::get("/").with_header("X-Api-Key", "k1");
        assert!(guard.check(&mut right).is_ok());
    }

    #[test]
    fn test_registry_runs_in_order() {
        let mut registry = GuardRegistry::new();
        registry.add("tenant", HeaderGuard::new("x-tenant"));
        registry.add("key", HeaderGuard::new("x-api-key").with_value("k1"));

        let names = vec!["tenant".to_string(), "key".to_string()];
        let mut req = Request::get("/").with_header("x-api-key", "k1");
        assert_eq!(registry.check(&names, &mut req).unwrap_err().status, 401);

        let mut req = req.with_header("x-tenant", "acme");
        assert!(registry.check(&names, &mut req).is_ok());
    }

    #[test]
    fn test_validate_unknown_guard() {
        let entry = RouteEntry::new(
            RouteTemplate::parse("/admin").unwrap(),
            RouteMethod::Get,
            "AdminController",
            "index",
            "admin",
        )
        .with_auth(vec!["jwt".to_string()]);
        let table = RouteTable::new(vec![entry]);

        let mut registry = GuardRegistry::new();
        assert!(matches!(
            registry.validate(&table),
            Err(ConfigurationError::UnknownGuard { .. })
        ));
        registry.add("jwt", JwtGuard::new(SECRET));
        assert!(registry.validate(&table).is_ok());
    }

    #[test]
    fn test_rejection_into_error() {
        let err: Error = GuardRejection::forbidden("no").into();
        assert_eq!(err.status(), 403);
        assert_eq!(err.code(), "FORBIDDEN");
    }
}
