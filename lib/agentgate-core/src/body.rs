//! Request bodies and their encoding.
//!
//! A [`Body`] is one of three things, chosen when it is built:
//!
//! - raw bytes, sent unchanged;
//! - a byte stream, forwarded chunk by chunk without buffering;
//! - a structured value, serialized to JSON when the request is sent.
//!
//! [`Body::encode`] turns a body into the [`Payload`] the transport writes.

use std::fmt;
use std::pin::Pin;

use bytes::Bytes;
use futures_core::Stream;

use crate::Result;

/// A stream of body chunks. Consumed exactly once.
pub type ByteStream = Pin<Box<dyn Stream<Item = std::io::Result<Bytes>> + Send>>;

/// Content types understood by the codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentType {
    /// JSON content type (`application/json`), the structured encoding.
    Json,
}

impl ContentType {
    /// Get the MIME type string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Json => "application/json",
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Request body, tagged by how it must be encoded.
pub enum Body {
    /// Bytes passed through unchanged.
    Raw(Bytes),
    /// Chunks forwarded as they are produced.
    Stream(ByteStream),
    /// A value serialized to JSON at send time.
    Structured(serde_json::Value),
}

impl Body {
    /// Raw bytes body.
    #[must_use]
    pub fn raw(bytes: impl Into<Bytes>) -> Self {
        Self::Raw(bytes.into())
    }

    /// Streaming body.
    ///
    /// Use this for uploads that should not be held in memory, e.g. a file
    /// read through `tokio_util::io::ReaderStream`.
    #[must_use]
    pub fn stream<S>(stream: S) -> Self
    where
        S: Stream<Item = std::io::Result<Bytes>> + Send + 'static,
    {
        Self::Stream(Box::pin(stream))
    }

    /// Structured body from any `Serialize` value.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::JsonSerialization`] if the value cannot be
    /// represented as JSON (e.g. a map with non-string keys). Nothing has been
    /// sent at that point.
    pub fn structured<T: serde::Serialize + ?Sized>(value: &T) -> Result<Self> {
        Ok(Self::Structured(serde_json::to_value(value)?))
    }

    /// Returns `true` for a streaming body.
    #[must_use]
    pub const fn is_stream(&self) -> bool {
        matches!(self, Self::Stream(_))
    }

    /// Resolve the body into the bytes or stream to put on the wire.
    #[must_use]
    pub fn encode(self) -> Payload {
        match self {
            Self::Raw(bytes) => Payload::Full(bytes),
            Self::Stream(stream) => Payload::Stream(stream),
            // A `Value` always has a JSON rendering.
            Self::Structured(value) => Payload::Full(Bytes::from(value.to_string())),
        }
    }
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Raw(bytes) => f.debug_tuple("Raw").field(&bytes.len()).finish(),
            Self::Stream(_) => f.write_str("Stream(..)"),
            Self::Structured(value) => f.debug_tuple("Structured").field(value).finish(),
        }
    }
}

impl From<Bytes> for Body {
    fn from(bytes: Bytes) -> Self {
        Self::Raw(bytes)
    }
}

impl From<Vec<u8>> for Body {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Raw(Bytes::from(bytes))
    }
}

impl From<&'static [u8]> for Body {
    fn from(bytes: &'static [u8]) -> Self {
        Self::Raw(Bytes::from_static(bytes))
    }
}

impl From<serde_json::Value> for Body {
    fn from(value: serde_json::Value) -> Self {
        Self::Structured(value)
    }
}

/// Encoded body, ready for the transport.
pub enum Payload {
    /// No body.
    Empty,
    /// Fixed-length body.
    Full(Bytes),
    /// Body of unknown length, streamed.
    Stream(ByteStream),
}

impl Payload {
    /// Length in bytes, if known up front.
    #[must_use]
    pub fn len(&self) -> Option<usize> {
        match self {
            Self::Empty => Some(0),
            Self::Full(bytes) => Some(bytes.len()),
            Self::Stream(_) => None,
        }
    }

    /// Returns `true` if the payload is known to be empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == Some(0)
    }
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => f.write_str("Empty"),
            Self::Full(bytes) => f.debug_tuple("Full").field(&bytes.len()).finish(),
            Self::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

/// Serialize a value to JSON bytes.
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
///
/// # Example
///
/// ```
/// use agentgate_core::to_json;
/// use serde::Serialize;
///
/// #[derive(Serialize)]
/// struct Scale { replicas: u32 }
///
/// let bytes = to_json(&Scale { replicas: 3 }).expect("serialize");
/// assert_eq!(bytes.as_ref(), br#"{"replicas":3}"#);
/// ```
pub fn to_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<Bytes> {
    serde_json::to_vec(value)
        .map(Bytes::from)
        .map_err(Into::into)
}

/// Serialize a value to a query string.
///
/// Uses `serde_html_form` which supports `Vec<T>` for repeated query parameters
/// (e.g., `?label=a&label=b`).
///
/// # Errors
///
/// Returns an error if query serialization fails.
pub fn to_query_string<T: serde::Serialize + ?Sized>(value: &T) -> Result<String> {
    serde_html_form::to_string(value).map_err(Into::into)
}

/// Deserialize JSON bytes to a value with path-aware error messages.
///
/// Uses `serde_path_to_error` so a mismatch reports where it happened
/// (e.g., "items[2].status.phase").
///
/// # Errors
///
/// Returns [`crate::Error::Decode`] if the bytes are not valid JSON or do not
/// fit `T`. Partial results are never returned.
pub fn from_json<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    let mut deserializer = serde_json::Deserializer::from_slice(bytes);
    let value = serde_path_to_error::deserialize(&mut deserializer)
        .map_err(|e| crate::Error::decode(e.path().to_string(), e.inner().to_string()))?;
    deserializer
        .end()
        .map_err(|e| crate::Error::decode("", e.to_string()))?;
    Ok(value)
}

#[cfg(test)]
mod tests {
    use assert2::{check, let_assert};
    use futures_util::{StreamExt, stream};

    use super::*;
    use crate::Error;

    #[test]
    fn content_type_as_str() {
        check!(ContentType::Json.as_str() == "application/json");
        check!(ContentType::Json.to_string() == "application/json");
    }

    #[test]
    fn raw_passes_through() {
        let body = Body::raw(&b"\x00\x01binary"[..]);
        let_assert!(Payload::Full(bytes) = body.encode());
        check!(bytes.as_ref() == b"\x00\x01binary");
    }

    #[test]
    fn structured_serializes_to_json() {
        #[derive(serde::Serialize)]
        struct Scale {
            name: String,
            replicas: u32,
        }

        let body = Body::structured(&Scale {
            name: "web".to_string(),
            replicas: 3,
        })
        .expect("serializable");
        let payload = body.encode();
        check!(payload.len() == Some(27));
        let_assert!(Payload::Full(bytes) = payload);
        check!(bytes.as_ref() == br#"{"name":"web","replicas":3}"#);
    }

    #[test]
    fn structured_rejects_unserializable() {
        use std::collections::HashMap;

        let mut map = HashMap::new();
        map.insert((1, 2), "tuple keys are not JSON");
        let_assert!(Err(Error::JsonSerialization(_)) = Body::structured(&map));
    }

    #[tokio::test]
    async fn stream_passes_through() {
        let chunks = stream::iter(vec![
            Ok(Bytes::from_static(b"hello ")),
            Ok(Bytes::from_static(b"agent")),
        ]);
        let body = Body::stream(chunks);
        check!(body.is_stream());

        let_assert!(Payload::Stream(mut stream) = body.encode());
        let mut collected = Vec::new();
        while let Some(chunk) = stream.next().await {
            collected.extend_from_slice(&chunk.expect("chunk"));
        }
        check!(collected == b"hello agent");
    }

    #[test]
    fn payload_lengths() {
        check!(Payload::Empty.is_empty());
        check!(Payload::Full(Bytes::from_static(b"abc")).len() == Some(3));
        check!(Payload::Stream(Box::pin(stream::empty::<std::io::Result<Bytes>>())).len().is_none());
    }

    #[test]
    fn from_json_deserialize() {
        #[derive(Debug, PartialEq, serde::Deserialize)]
        struct Token {
            token: String,
        }

        let token: Token = from_json(br#"{"token":"abc"}"#).expect("deserialize");
        check!(
            token
                == Token {
                    token: "abc".to_string()
                }
        );
    }

    #[test]
    fn from_json_reports_path() {
        #[derive(Debug, serde::Deserialize)]
        struct Status {
            #[allow(dead_code)]
            phase: String,
        }

        #[derive(Debug, serde::Deserialize)]
        struct Pod {
            #[allow(dead_code)]
            status: Status,
        }

        let result: Result<Pod> = from_json(br#"{"status":{"phase":7}}"#);
        let_assert!(Err(Error::Decode { path, .. }) = result);
        check!(path == "status.phase");
    }

    #[test]
    fn from_json_rejects_empty_and_trailing() {
        let result: Result<serde_json::Value> = from_json(b"");
        check!(result.is_err());

        let result: Result<serde_json::Value> = from_json(br#"{"a":1} garbage"#);
        check!(result.is_err());
    }
}
