//! HTTP request types.

use std::collections::HashMap;

/// HTTP method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    /// GET
    Get,
    /// POST
    Post,
}

impl Method {
    /// Wire form of the method.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// HTTP headers collection.
#[derive(Debug, Default, Clone)]
pub struct Headers {
    inner: HashMap<String, Vec<u8>>,
}

impl Headers {
    /// Create empty headers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a header value by name (case-insensitive).
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&[u8]> {
        self.inner
            .get(&name.to_ascii_lowercase())
            .map(Vec::as_slice)
    }

    /// Get a header value as UTF-8 text.
    ///
    /// Returns `None` if the header is absent or not valid UTF-8.
    #[must_use]
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(|v| std::str::from_utf8(v).ok())
    }

    /// Insert a header.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Vec<u8>>) {
        self.inner
            .insert(name.into().to_ascii_lowercase(), value.into());
    }
}

/// Request body.
#[derive(Debug, Clone, Default)]
pub enum Body {
    /// Empty body.
    #[default]
    Empty,
    /// Fully buffered body.
    Bytes(Vec<u8>),
}

impl Body {
    /// Borrow the body bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Empty => &[],
            Self::Bytes(b) => b,
        }
    }

    /// Check if body is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.as_bytes().is_empty()
    }
}

/// HTTP request.
#[derive(Debug, Clone)]
pub struct Request {
    method: Method,
    path: String,
    headers: Headers,
    body: Body,
}

impl Request {
    /// Create a new request.
    #[must_use]
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            headers: Headers::new(),
            body: Body::Empty,
        }
    }

    /// Add a header.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Set a buffered body.
    #[must_use]
    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = Body::Bytes(body.into());
        self
    }

    /// Get the HTTP method.
    #[must_use]
    pub fn method(&self) -> Method {
        self.method
    }

    /// Get the request path.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Get the headers.
    #[must_use]
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Get mutable headers.
    pub fn headers_mut(&mut self) -> &mut Headers {
        &mut self.headers
    }

    /// Get the body.
    #[must_use]
    pub fn body(&self) -> &Body {
        &self.body
    }

    /// The Content-Type header, or `""` when absent.
    #[must_use]
    pub fn content_type(&self) -> &str {
        self.headers.get_str("content-type").unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn headers_are_case_insensitive() {
        let request = Request::new(Method::Post, "/api/upload")
            .with_header("Content-Type", "multipart/form-data; boundary=x");
        assert_eq!(
            request.headers().get_str("content-type"),
            Some("multipart/form-data; boundary=x")
        );
        assert_eq!(request.content_type(), "multipart/form-data; boundary=x");
    }

    #[test]
    fn missing_content_type_is_empty() {
        let request = Request::new(Method::Post, "/api/upload");
        assert_eq!(request.content_type(), "");
    }

    #[test]
    fn body_defaults_to_empty() {
        let request = Request::new(Method::Post, "/api/upload");
        assert!(request.body().is_empty());

        let request = request.with_body(b"abc".to_vec());
        assert_eq!(request.body().as_bytes(), b"abc");
        assert_eq!(request.path(), "/api/upload");
    }

    #[test]
    fn method_wire_form() {
        assert_eq!(Method::Get.to_string(), "GET");
        assert_eq!(Method::Post.as_str(), "POST");
    }
}
