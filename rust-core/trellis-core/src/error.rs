//! # Error Handling
//!
//! Centralized error types for Trellis core.
//! Uses `thiserror` for ergonomic error definitions.
//!
//! Errors fall in two classes:
//!
//! - **Boot-time** ([`ConfigurationError`]): raised while compiling the route
//!   table and aborting startup.
//! - **Request-time** (everything carrying a status): converted into a
//!   structured response by the dispatcher and never allowed to escape it.

use crate::validation::ValidationErrors;
use thiserror::Error;

/// Result type alias for Trellis operations
pub type Result<T> = std::result::Result<T, Error>;

/// Fatal configuration problems detected while building the route table
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    /// The same controller name appears in more than one declaration
    #[error("controller `{name}` is registered twice (modules `{first}` and `{second}`)")]
    DuplicateController {
        /// Controller name
        name: String,
        /// Module of the first registration
        first: String,
        /// Module of the conflicting registration
        second: String,
    },

    /// A controller declares the same action name twice
    #[error("controller `{controller}` declares action `{action}` more than once")]
    DuplicateAction {
        /// Controller name
        controller: String,
        /// Action name
        action: String,
    },

    /// Two actions compile to the same verb and route
    #[error("route `{method} {route}` is declared by both `{first}` and `{second}`")]
    DuplicateRoute {
        /// Lowercase verb or `all`
        method: String,
        /// Compiled route
        route: String,
        /// `Controller::action` of the first declaration
        first: String,
        /// `Controller::action` of the conflicting declaration
        second: String,
    },

    /// A route template could not be parsed
    #[error("malformed route template `{template}`: {reason}")]
    MalformedTemplate {
        /// The template as declared
        template: String,
        /// What is wrong with it
        reason: String,
    },

    /// Two modules share a name
    #[error("module `{name}` is declared more than once")]
    DuplicateModule {
        /// Module name
        name: String,
    },

    /// A module lists the same import twice
    #[error("module `{module}` imports `{import}` more than once")]
    DuplicateImport {
        /// Importing module
        module: String,
        /// Repeated import
        import: String,
    },

    /// A module imports a module nobody declared
    #[error("module `{module}` imports unknown module `{import}`")]
    UnknownImport {
        /// Importing module
        module: String,
        /// Missing import
        import: String,
    },

    /// Module imports form a cycle
    #[error("module import cycle: {}", cycle.join(" -> "))]
    ImportCycle {
        /// Modules on the cycle, first module repeated at the end
        cycle: Vec<String>,
    },

    /// A route requires a guard that was never registered
    #[error("route `{route}` requires unknown guard `{guard}`")]
    UnknownGuard {
        /// Guard name
        guard: String,
        /// Compiled route naming it
        route: String,
    },

    /// Configuration values that cannot work together
    #[error("invalid configuration: {reason}")]
    Invalid {
        /// Description of the problem
        reason: String,
    },
}

/// Core error types for the Trellis runtime
#[derive(Error, Debug)]
pub enum Error {
    /// Boot-time configuration failure
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    /// No route matched the request path and verb
    #[error("No route found for {method} {path}")]
    RouteNotFound {
        /// Request verb
        method: String,
        /// The path that wasn't matched
        path: String,
        /// Verbs that do have a route for this path
        allowed: Vec<String>,
    },

    /// Arguments could not be bound from the request
    #[error("Invalid request parameters: {0}")]
    Binding(ValidationErrors),

    /// An auth guard rejected the request
    #[error("{message}")]
    Unauthorized {
        /// 401 or 403
        status: u16,
        /// Reason given by the guard
        message: String,
    },

    /// A service parameter could not be resolved from the registry
    #[error("Service `{name}` is not registered")]
    ServiceUnavailable {
        /// Service key
        name: String,
    },

    /// The controller action failed, panicked or is missing
    #[error("Dispatch to {controller}::{action} failed: {message}")]
    Dispatch {
        /// Controller name
        controller: String,
        /// Action name
        action: String,
        /// Failure description
        message: String,
    },

    /// The persisted route table is unreadable
    #[error("Route cache {path} is corrupt: {reason}")]
    CacheCorruption {
        /// Cache file path
        path: String,
        /// Why it was rejected
        reason: String,
    },

    /// The request verb is not one the router knows
    #[error("Unsupported HTTP method: {method}")]
    UnsupportedMethod {
        /// Raw verb
        method: String,
    },

    /// Server failed to bind to the specified address
    #[error("Failed to bind server to {address}: {source}")]
    BindError {
        /// The address we tried to bind to
        address: String,
        /// The underlying IO error
        #[source]
        source: std::io::Error,
    },

    /// Request payload too large
    #[error("Payload too large: limit={limit} bytes, received={actual} bytes")]
    PayloadTooLarge {
        /// Max allowed size
        limit: usize,
        /// Actual size
        actual: usize,
    },

    /// JSON payload could not be parsed
    #[error("Malformed JSON: {reason}")]
    MalformedJson {
        /// Parser message
        reason: String,
    },

    /// Request body stream failed before it was fully received
    #[error("Failed to read request body: {reason}")]
    BodyRead {
        /// Transport error message
        reason: String,
    },

    /// Configuration file could not be parsed
    #[error("Config parse error: {0}")]
    Config(#[from] toml::de::Error),

    /// HTTP protocol error
    #[error("HTTP error: {0}")]
    Http(#[from] hyper::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// HTTP status code this error maps to
    #[must_use]
    pub fn status(&self) -> u16 {
        match self {
            Self::RouteNotFound { .. } => 404,
            Self::Binding(_) | Self::MalformedJson { .. } | Self::BodyRead { .. } => 400,
            Self::Unauthorized { status, .. } => *status,
            Self::UnsupportedMethod { .. } => 405,
            Self::PayloadTooLarge { .. } => 413,
            _ => 500,
        }
    }

    /// Short machine-checkable error category
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Configuration(_) | Self::Config(_) => "CONFIGURATION_ERROR",
            Self::RouteNotFound { .. } => "ROUTE_NOT_FOUND",
            Self::Binding(_) => "BINDING_ERROR",
            Self::Unauthorized { status: 403, .. } => "FORBIDDEN",
            Self::Unauthorized { .. } => "UNAUTHORIZED",
            Self::ServiceUnavailable { .. } => "SERVICE_UNAVAILABLE",
            Self::Dispatch { .. } => "DISPATCH_ERROR",
            Self::CacheCorruption { .. } => "CACHE_CORRUPTION",
            Self::UnsupportedMethod { .. } => "METHOD_NOT_SUPPORTED",
            Self::PayloadTooLarge { .. } => "PAYLOAD_TOO_LARGE",
            Self::MalformedJson { .. } => "MALFORMED_JSON",
            Self::BodyRead { .. } => "BODY_READ_ERROR",
            Self::BindError { .. } | Self::Http(_) | Self::Json(_) | Self::Io(_) => {
                "INTERNAL_ERROR"
            }
        }
    }

    /// Whether the error is the client's fault
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::FieldError;

    #[test]
    fn test_route_not_found_error() {
        let err = Error::RouteNotFound {
            method: "GET".to_string(),
            path: "/unknown".to_string(),
            allowed: Vec::new(),
        };
        assert!(err.to_string().contains("/unknown"));
        assert_eq!(err.status(), 404);
        assert_eq!(err.code(), "ROUTE_NOT_FOUND");
        assert!(err.is_client_error());
    }

    #[test]
    fn test_bind_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::AddrInUse, "address in use");
        let err = Error::BindError {
            address: "0.0.0.0:8000".to_string(),
            source: io_err,
        };
        assert!(err.to_string().contains("0.0.0.0:8000"));
        assert_eq!(err.status(), 500);
    }

    #[test]
    fn test_binding_error_is_bad_request() {
        let mut errors = ValidationErrors::new();
        errors.add(FieldError::required("id"));
        let err = Error::Binding(errors);
        assert_eq!(err.status(), 400);
        assert_eq!(err.code(), "BINDING_ERROR");
        assert!(err.to_string().contains("id"));
    }

    #[test]
    fn test_body_read_error_is_bad_request() {
        let err = Error::BodyRead {
            reason: "invalid chunk size line".to_string(),
        };
        assert_eq!(err.status(), 400);
        assert_eq!(err.code(), "BODY_READ_ERROR");
        assert!(err.is_client_error());
        assert!(err.to_string().contains("chunk size"));
    }

    #[test]
    fn test_forbidden_code() {
        let err = Error::Unauthorized {
            status: 403,
            message: "nope".to_string(),
        };
        assert_eq!(err.code(), "FORBIDDEN");
        assert_eq!(err.status(), 403);
    }

    #[test]
    fn test_import_cycle_message() {
        let err = ConfigurationError::ImportCycle {
            cycle: vec!["a".into(), "b".into(), "a".into()],
        };
        assert_eq!(err.to_string(), "module import cycle: a -> b -> a");
    }
}
