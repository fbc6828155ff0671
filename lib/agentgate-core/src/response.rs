//! Unclassified responses and upgrade handshake metadata.
//!
//! [`RawResponse`] is what the transport hands back before any success/error
//! policy is applied: status, full header set and a body of type `B` (a live
//! network body in the runtime crate, [`Bytes`] once buffered).

use bytes::Bytes;
use http::HeaderMap;

/// Response with status, headers and an unread or buffered body.
#[derive(Debug, Clone)]
pub struct RawResponse<B = Bytes> {
    status: u16,
    headers: HeaderMap,
    body: B,
}

impl<B> RawResponse<B> {
    /// Creates a new response.
    #[must_use]
    pub const fn new(status: u16, headers: HeaderMap, body: B) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }

    /// HTTP status code.
    #[must_use]
    pub const fn status(&self) -> u16 {
        self.status
    }

    /// Response headers.
    #[must_use]
    pub const fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// First value of a header, if it is valid text.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Response body.
    #[must_use]
    pub const fn body(&self) -> &B {
        &self.body
    }

    /// Consume into body.
    #[must_use]
    pub fn into_body(self) -> B {
        self.body
    }

    /// Consume into (status, headers, body).
    #[must_use]
    pub fn into_parts(self) -> (u16, HeaderMap, B) {
        (self.status, self.headers, self.body)
    }

    /// Status is 2xx.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }

    /// Status is 4xx.
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        self.status >= 400 && self.status < 500
    }

    /// Status is 5xx.
    #[must_use]
    pub const fn is_server_error(&self) -> bool {
        self.status >= 500 && self.status < 600
    }

    /// Status is 400 or above: the call is a remote error.
    #[must_use]
    pub const fn is_error(&self) -> bool {
        self.status >= 400
    }

    /// Transform the body with a function.
    pub fn map_body<F, B2>(self, f: F) -> RawResponse<B2>
    where
        F: FnOnce(B) -> B2,
    {
        RawResponse {
            status: self.status,
            headers: self.headers,
            body: f(self.body),
        }
    }
}

impl RawResponse<Bytes> {
    /// Deserialize the response body as JSON.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Decode`] if deserialization fails.
    pub fn json<T: serde::de::DeserializeOwned>(&self) -> crate::Result<T> {
        crate::from_json(&self.body)
    }

    /// The response body as (lossy) text.
    #[must_use]
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// HTTP side of an upgrade handshake.
///
/// Returned with every successful stream, and attached to the error of a
/// refused one so the caller can tell e.g. `401` from `404`.
#[derive(Debug, Clone)]
pub struct Handshake {
    status: u16,
    headers: HeaderMap,
    body: Option<Bytes>,
}

impl Handshake {
    /// Creates handshake metadata.
    #[must_use]
    pub const fn new(status: u16, headers: HeaderMap, body: Option<Bytes>) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }

    /// Status of the handshake response (`101` on success).
    #[must_use]
    pub const fn status(&self) -> u16 {
        self.status
    }

    /// Handshake response headers.
    #[must_use]
    pub const fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// First value of a header, if it is valid text.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Body the agent sent with a refused upgrade.
    #[must_use]
    pub const fn body(&self) -> Option<&Bytes> {
        self.body.as_ref()
    }

    /// Returns `true` if the protocol was switched.
    #[must_use]
    pub const fn is_upgraded(&self) -> bool {
        self.status == 101
    }
}
