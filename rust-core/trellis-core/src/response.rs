//! # HTTP Response
//!
//! Response value produced by actions, guards and middleware, and the
//! structured error body every failure is rendered into.

use crate::error::Error;
use http_body_util::Full;
use hyper::body::Bytes;
use hyper::header::{HeaderName, HeaderValue, CONTENT_TYPE};
use hyper::StatusCode;
use serde::Serialize;
use serde_json::json;
use std::collections::HashMap;

/// HTTP Response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// HTTP status code
    pub status: u16,
    /// Response body
    pub body: String,
    /// Content type
    pub content_type: String,
    /// Response headers (lowercase names)
    pub headers: HashMap<String, String>,
}

impl Default for Response {
    fn default() -> Self {
        Self {
            status: 200,
            body: String::new(),
            content_type: "application/json".to_string(),
            headers: HashMap::new(),
        }
    }
}

impl Response {
    /// Create a JSON response from an already encoded body
    #[must_use]
    pub fn json(body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            ..Self::default()
        }
    }

    /// Create a JSON response by serializing a value
    ///
    /// A value that cannot be serialized yields a 500 error body.
    #[must_use]
    pub fn json_value<T: Serialize>(value: &T) -> Self {
        match serde_json::to_string(value) {
            Ok(body) => Self::json(body),
            Err(e) => Self::from_error(&Error::Json(e)),
        }
    }

    /// Create a text response
    #[must_use]
    pub fn text(body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            content_type: "text/plain; charset=utf-8".to_string(),
            ..Self::default()
        }
    }

    /// Empty response with a status
    #[must_use]
    pub fn empty(status: u16) -> Self {
        Self::default().with_status(status)
    }

    /// Render an error as `{"error": {...}}` with the matching status
    ///
    /// Binding failures list every offending field; 404s echo the verb and
    /// path that were not matched.
    #[must_use]
    pub fn from_error(error: &Error) -> Self {
        let status = error.status();
        let message = if status >= 500 && !matches!(error, Error::ServiceUnavailable { .. }) {
            "Internal Server Error".to_string()
        } else {
            error.to_string()
        };

        let mut detail = json!({
            "code": error.code(),
            "status": status,
            "message": message,
        });
        match error {
            Error::RouteNotFound {
                method,
                path,
                allowed,
            } => {
                detail["method"] = json!(method);
                detail["path"] = json!(path);
                if !allowed.is_empty() {
                    detail["allowed"] = json!(allowed);
                }
            }
            Error::Binding(errors) => {
                detail["fields"] = json!(errors.errors);
            }
            _ => {}
        }

        Self::json(json!({ "error": detail }).to_string()).with_status(status)
    }

    /// Set status code
    #[must_use]
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    /// Set a header, builder style
    #[must_use]
    pub fn with_header(mut self, key: &str, value: &str) -> Self {
        self.set_header(key, value);
        self
    }

    /// Set or override a header
    pub fn set_header(&mut self, key: &str, value: &str) {
        if key.eq_ignore_ascii_case("content-type") {
            self.content_type = value.to_string();
        } else {
            self.headers.insert(key.to_ascii_lowercase(), value.to_string());
        }
    }

    /// Get a header by name (case-insensitive)
    #[must_use]
    pub fn header(&self, key: &str) -> Option<&str> {
        if key.eq_ignore_ascii_case("content-type") {
            return Some(&self.content_type);
        }
        self.headers.get(&key.to_ascii_lowercase()).map(String::as_str)
    }

    /// Parse the body as JSON
    ///
    /// # Errors
    ///
    /// Returns the parser error if the body is not JSON
    pub fn body_json(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::from_str(&self.body)
    }

    /// Convert to a hyper response; headers that are not valid HTTP are skipped
    #[must_use]
    pub fn into_hyper(self) -> hyper::Response<Full<Bytes>> {
        let mut response = hyper::Response::new(Full::new(Bytes::from(self.body)));
        *response.status_mut() =
            StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        let headers = response.headers_mut();
        if let Ok(value) = HeaderValue::from_str(&self.content_type) {
            headers.insert(CONTENT_TYPE, value);
        }
        for (k, v) in &self.headers {
            if let (Ok(name), Ok(value)) = (
                HeaderName::from_bytes(k.as_bytes()),
                HeaderValue::from_str(v),
            ) {
                headers.insert(name, value);
            }
        }
        response
    }
}
