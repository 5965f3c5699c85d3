//! # HTTP Request
//!
//! Request wrapper exposing exactly what routing and binding consume:
//! method, path, query map, case-insensitive headers and body bytes.
//! Hyper types stay behind this boundary.

use crate::error::{Error, Result};
use crate::router::Method;
use http_body_util::BodyExt;
use hyper::body::Bytes;
use hyper::header::{HeaderMap, HeaderName, HeaderValue};
use std::collections::HashMap;

/// HTTP Request
///
/// - Query string is parsed once on construction
/// - Body is collected up front (async, size limited)
/// - Claims are attached by auth guards
#[derive(Debug, Clone)]
pub struct Request {
    /// HTTP method
    pub method: Method,
    /// Request path (without query string)
    pub path: String,
    /// Raw query string (e.g., "page=1&limit=10")
    query_string: Option<String>,
    /// Parsed query parameters
    query_params: HashMap<String, String>,
    /// Request headers
    headers: HeaderMap,
    /// Request body (collected)
    body: Option<Bytes>,
    /// Claims of a validated bearer token
    pub claims: Option<serde_json::Value>,
}

impl Request {
    /// Create a request manually (for testing/internal use)
    ///
    /// `target` may carry a query string (`/users?page=2`).
    pub fn new(
        method: Method,
        target: impl Into<String>,
        headers_map: HashMap<String, String>,
        body: Option<Bytes>,
    ) -> Self {
        let target = target.into();
        let (path, query_string) = match target.split_once('?') {
            Some((p, q)) => (p.to_string(), Some(q.to_string())),
            None => (target, None),
        };

        let query_params = parse_urlencoded(query_string.as_deref());

        let mut headers = HeaderMap::new();
        for (k, v) in headers_map {
            if let (Ok(n), Ok(v)) = (
                HeaderName::from_bytes(k.as_bytes()),
                HeaderValue::from_str(&v),
            ) {
                headers.insert(n, v);
            }
        }

        Self {
            method,
            path,
            query_string,
            query_params,
            headers,
            body,
            claims: None,
        }
    }

    /// Shorthand for a bodyless request without headers
    pub fn get(target: impl Into<String>) -> Self {
        Self::new(Method::Get, target, HashMap::new(), None)
    }

    /// Set a header, builder style
    #[must_use]
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.set_header(name, value);
        self
    }

    /// Set the body, builder style
    #[must_use]
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Create from hyper request with body size limit
    ///
    /// # Errors
    ///
    /// Returns `Error::UnsupportedMethod` for verbs the router does not know,
    /// `Error::PayloadTooLarge` when the body exceeds `max_body_size` and
    /// `Error::BodyRead` when the body stream fails part way.
    pub async fn from_hyper_with_limit<B>(
        req: hyper::Request<B>,
        max_body_size: usize,
    ) -> Result<Self>
    where
        B: hyper::body::Body,
        B::Error: std::fmt::Display,
    {
        let method = Method::try_from(req.method())?;

        let uri = req.uri();
        let path = uri.path().to_string();
        let query_string = uri.query().map(String::from);
        let query_params = parse_urlencoded(query_string.as_deref());

        let headers = req.headers().clone();
        let declared = headers
            .get(hyper::header::CONTENT_LENGTH)
            .and_then(|len| len.to_str().ok())
            .and_then(|len| len.parse::<usize>().ok());
        if let Some(content_len) = declared {
            if content_len > max_body_size {
                return Err(Error::PayloadTooLarge {
                    limit: max_body_size,
                    actual: content_len,
                });
            }
        }

        let body = match BodyExt::collect(req.into_body()).await {
            Ok(collected) => {
                let bytes = collected.to_bytes();
                if bytes.len() > max_body_size {
                    return Err(Error::PayloadTooLarge {
                        limit: max_body_size,
                        actual: bytes.len(),
                    });
                }
                (!bytes.is_empty()).then_some(bytes)
            }
            Err(e) => {
                return Err(Error::BodyRead {
                    reason: e.to_string(),
                })
            }
        };

        Ok(Self {
            method,
            path,
            query_string,
            query_params,
            headers,
            body,
            claims: None,
        })
    }

    /// Get a header value by name (case-insensitive)
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Set or override a header
    pub fn set_header(&mut self, name: &str, value: &str) {
        if let (Ok(n), Ok(v)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            self.headers.insert(n, v);
        }
    }

    /// Get all headers as a HashMap
    #[must_use]
    pub fn headers_map(&self) -> HashMap<String, String> {
        self.headers
            .iter()
            .filter_map(|(k, v)| {
                v.to_str()
                    .ok()
                    .map(|val| (k.as_str().to_string(), val.to_string()))
            })
            .collect()
    }

    /// Get query parameters as a HashMap
    #[must_use]
    pub fn query_map(&self) -> &HashMap<String, String> {
        &self.query_params
    }

    /// Get a single query parameter
    #[must_use]
    pub fn query(&self, key: &str) -> Option<&str> {
        self.query_params.get(key).map(String::as_str)
    }

    /// Get raw query string
    #[must_use]
    pub fn query_string(&self) -> Option<&str> {
        self.query_string.as_deref()
    }

    /// Get the request body as bytes
    #[must_use]
    pub fn body_bytes(&self) -> Option<&[u8]> {
        self.body.as_deref()
    }

    /// Get the request body as string (UTF-8)
    #[must_use]
    pub fn body_str(&self) -> Option<&str> {
        self.body_bytes().and_then(|b| std::str::from_utf8(b).ok())
    }

    /// Whether the body is declared as `application/x-www-form-urlencoded`
    #[must_use]
    pub fn is_form(&self) -> bool {
        self.header("content-type")
            .is_some_and(|ct| ct.starts_with("application/x-www-form-urlencoded"))
    }

    /// Parse the body as form fields
    #[must_use]
    pub fn form_map(&self) -> HashMap<String, String> {
        parse_urlencoded(self.body_str())
    }
}

/// Parse `a=1&b=2` into a map
///
/// Handles URL decoding and duplicate keys (last value wins).
pub(crate) fn parse_urlencoded(query: Option<&str>) -> HashMap<String, String> {
    query
        .map(|q| {
            q.split('&')
                .filter(|pair| !pair.is_empty())
                .map(|pair| {
                    let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
                    (url_decode(key), url_decode(value))
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Query-string decoding: `+` is a space, then percent escapes
fn url_decode(s: &str) -> String {
    percent_decode(&s.replace('+', " "))
}

/// Decode `%XX` escapes; malformed escapes are kept verbatim
pub(crate) fn percent_decode(s: &str) -> String {
    if !s.contains('%') {
        return s.to_string();
    }
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let hex = std::str::from_utf8(&bytes[i + 1..=i + 2]).ok();
            if let Some(byte) = hex.and_then(|h| u8::from_str_radix(h, 16).ok()) {
                out.push(byte);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::Full;
    use std::pin::Pin;
    use std::task::{Context, Poll};

    /// Body whose stream fails on the first frame
    struct BrokenBody;

    impl hyper::body::Body for BrokenBody {
        type Data = Bytes;
        type Error = std::io::Error;

        fn poll_frame(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
        ) -> Poll<Option<std::result::Result<hyper::body::Frame<Bytes>, Self::Error>>> {
            Poll::Ready(Some(Err(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "connection reset mid-body",
            ))))
        }
    }

    #[tokio::test]
    async fn test_from_hyper_collects_body() {
        let req = hyper::Request::post("/items?draft=1")
            .header("content-type", "application/json")
            .body(Full::new(Bytes::from_static(b"{\"a\":1}")))
            .unwrap();
        let req = Request::from_hyper_with_limit(req, 1024).await.unwrap();
        assert_eq!(req.method, Method::Post);
        assert_eq!(req.query("draft"), Some("1"));
        assert_eq!(req.body_str(), Some("{\"a\":1}"));
    }

    #[tokio::test]
    async fn test_from_hyper_rejects_oversized_body() {
        let req = hyper::Request::post("/items")
            .body(Full::new(Bytes::from(vec![b'x'; 64])))
            .unwrap();
        let err = Request::from_hyper_with_limit(req, 16).await.unwrap_err();
        assert!(matches!(err, Error::PayloadTooLarge { limit: 16, actual: 64 }));
    }

    #[tokio::test]
    async fn test_failed_body_read_is_an_error() {
        let req = hyper::Request::post("/items").body(BrokenBody).unwrap();
        let err = Request::from_hyper_with_limit(req, 1024).await.unwrap_err();
        assert!(matches!(err, Error::BodyRead { .. }));
        assert_eq!(err.status(), 400);
        assert!(err.to_string().contains("connection reset"));
    }

    #[test]
    fn test_parse_query_string_simple() {
        let result = parse_urlencoded(Some("page=1&limit=10"));
        assert_eq!(result.get("page"), Some(&"1".to_string()));
        assert_eq!(result.get("limit"), Some(&"10".to_string()));
    }

    #[test]
    fn test_parse_query_string_empty() {
        assert!(parse_urlencoded(None).is_empty());
        assert!(parse_urlencoded(Some("")).is_empty());
    }

    #[test]
    fn test_parse_query_string_url_encoded() {
        let result = parse_urlencoded(Some("name=John+Doe&city=New%20York&flag"));
        assert_eq!(result.get("name"), Some(&"John Doe".to_string()));
        assert_eq!(result.get("city"), Some(&"New York".to_string()));
        assert_eq!(result.get("flag"), Some(&String::new()));
    }

    #[test]
    fn test_percent_decode() {
        assert_eq!(percent_decode("hello%20world"), "hello world");
        assert_eq!(percent_decode("100%25"), "100%");
        assert_eq!(percent_decode("caf%C3%A9"), "café");
        assert_eq!(percent_decode("50%"), "50%");
        assert_eq!(percent_decode("%zz"), "%zz");
        assert_eq!(percent_decode("a+b"), "a+b");
    }

    #[test]
    fn test_new_splits_query() {
        let req = Request::get("/products?page=2&sort=name");
        assert_eq!(req.path, "/products");
        assert_eq!(req.query("page"), Some("2"));
        assert_eq!(req.query_string(), Some("page=2&sort=name"));
    }

    #[test]
    fn test_headers_are_case_insensitive() {
        let req = Request::get("/").with_header("X-Tenant", "acme");
        assert_eq!(req.header("x-tenant"), Some("acme"));
        assert_eq!(req.headers_map().get("x-tenant"), Some(&"acme".to_string()));
    }

    #[test]
    fn test_form_body() {
        let req = Request::new(Method::Post, "/login", HashMap::new(), None)
            .with_header("Content-Type", "application/x-www-form-urlencoded")
            .with_body("user=ann&remember=on");
        assert!(req.is_form());
        assert_eq!(req.form_map().get("remember"), Some(&"on".to_string()));
    }
}
