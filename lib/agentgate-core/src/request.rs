//! Request descriptors.
//!
//! A [`Request`] describes one call to an agent: method, path relative to the
//! peer's base path, query, headers and an optional [`Body`]. It is built fresh
//! for every call and consumed by it.
//!
//! # Example
//!
//! ```
//! use agentgate_core::Request;
//!
//! let request = Request::get("/v1/namespaces/default/pods")
//!     .query("labelSelector", "app=web")
//!     .header("Accept", "application/json")
//!     .build();
//!
//! assert_eq!(request.path(), "/v1/namespaces/default/pods");
//! assert_eq!(request.query().get("labelSelector"), Some("app=web"));
//! ```

use bytes::Bytes;
use http::Method;

use crate::{Body, Params};

/// Description of a single call to an agent.
#[derive(Debug)]
pub struct Request {
    method: Method,
    path: String,
    query: Params,
    headers: Params,
    body: Option<Body>,
}

impl Request {
    /// Creates a new [`RequestBuilder`].
    #[must_use]
    pub fn builder(method: Method, path: impl Into<String>) -> RequestBuilder {
        RequestBuilder::new(method, path)
    }

    /// `GET` request builder.
    #[must_use]
    pub fn get(path: impl Into<String>) -> RequestBuilder {
        RequestBuilder::new(Method::GET, path)
    }

    /// `POST` request builder.
    #[must_use]
    pub fn post(path: impl Into<String>) -> RequestBuilder {
        RequestBuilder::new(Method::POST, path)
    }

    /// `PUT` request builder.
    #[must_use]
    pub fn put(path: impl Into<String>) -> RequestBuilder {
        RequestBuilder::new(Method::PUT, path)
    }

    /// `PATCH` request builder.
    #[must_use]
    pub fn patch(path: impl Into<String>) -> RequestBuilder {
        RequestBuilder::new(Method::PATCH, path)
    }

    /// `DELETE` request builder.
    #[must_use]
    pub fn delete(path: impl Into<String>) -> RequestBuilder {
        RequestBuilder::new(Method::DELETE, path)
    }

    /// HTTP method.
    #[must_use]
    pub const fn method(&self) -> &Method {
        &self.method
    }

    /// Path relative to the peer's base path; may embed a query.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Query parameters appended to the resolved URL.
    #[must_use]
    pub const fn query(&self) -> &Params {
        &self.query
    }

    /// Request headers, forwarded verbatim.
    #[must_use]
    pub const fn headers(&self) -> &Params {
        &self.headers
    }

    /// Mutable access to headers.
    #[must_use]
    pub const fn headers_mut(&mut self) -> &mut Params {
        &mut self.headers
    }

    /// Request body.
    #[must_use]
    pub const fn body(&self) -> Option<&Body> {
        self.body.as_ref()
    }

    /// Consume into (method, path, query, headers, body).
    #[must_use]
    pub fn into_parts(self) -> (Method, String, Params, Params, Option<Body>) {
        (self.method, self.path, self.query, self.headers, self.body)
    }
}

/// Builder for constructing [`Request`] instances.
#[derive(Debug)]
pub struct RequestBuilder {
    method: Method,
    path: String,
    query: Params,
    headers: Params,
    body: Option<Body>,
}

impl RequestBuilder {
    /// Creates a new builder.
    #[must_use]
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Params::new(),
            headers: Params::new(),
            body: None,
        }
    }

    /// Appends a header value; repeated names keep every value.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.append(name, value);
        self
    }

    /// Appends multiple headers.
    #[must_use]
    pub fn headers(mut self, headers: Params) -> Self {
        self.headers.merge(headers);
        self
    }

    /// Appends a query parameter.
    #[must_use]
    pub fn query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.append(name, value);
        self
    }

    /// Appends multiple query parameters.
    #[must_use]
    pub fn query_params(mut self, query: Params) -> Self {
        self.query.merge(query);
        self
    }

    /// Appends query parameters serialized from a struct.
    ///
    /// # Errors
    ///
    /// Returns an error if the value cannot be encoded as a query string.
    pub fn query_from<T: serde::Serialize>(self, value: &T) -> crate::Result<Self> {
        let params = Params::from_serialize(value)?;
        Ok(self.query_params(params))
    }

    /// Sets the request body.
    #[must_use]
    pub fn body(mut self, body: impl Into<Body>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Sets a raw bytes body.
    #[must_use]
    pub fn bytes(self, bytes: impl Into<Bytes>) -> Self {
        self.body(Body::raw(bytes))
    }

    /// Sets a structured (JSON) body.
    ///
    /// The `Content-Type` header is filled in at send time unless one is set.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn json<T: serde::Serialize + ?Sized>(self, value: &T) -> crate::Result<Self> {
        Ok(self.body(Body::structured(value)?))
    }

    /// Builds the [`Request`].
    #[must_use]
    pub fn build(self) -> Request {
        Request {
            method: self.method,
            path: self.path,
            query: self.query,
            headers: self.headers,
            body: self.body,
        }
    }
}
