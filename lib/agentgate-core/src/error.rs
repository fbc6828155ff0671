//! Error types for agentgate.
//!
//! Every failure is reported as one [`Error`], classified by [`Error::kind`]:
//!
//! | Kind | Raised when |
//! |------|-------------|
//! | [`ErrorKind::Construction`] | peer, headers or body are invalid; no network I/O happened |
//! | [`ErrorKind::Transport`] | connecting, sending or reading failed, or the caller cancelled |
//! | [`ErrorKind::Remote`] | the agent answered with a status `>= 400` |
//! | [`ErrorKind::Decode`] | the agent answered `< 400` but the body did not fit the destination |

use bytes::Bytes;
use derive_more::{Display, Error, From};

use crate::Handshake;

/// Coarse classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum ErrorKind {
    /// Detected before any network I/O.
    #[display("construction")]
    Construction,
    /// Connection-level failure or caller cancellation.
    #[display("transport")]
    Transport,
    /// The remote answered with an error status.
    #[display("remote")]
    Remote,
    /// The success body did not decode into the destination.
    #[display("decode")]
    Decode,
}

/// Cause of a transport failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum TransportKind {
    /// TCP connect failed (refused, unreachable, DNS).
    #[display("connect")]
    Connect,
    /// The configured response timeout elapsed.
    #[display("timeout")]
    Timeout,
    /// TLS negotiation failed.
    #[display("tls")]
    Tls,
    /// I/O failure after the connection was established.
    #[display("io")]
    Io,
    /// The caller's cancellation token fired.
    #[display("cancelled")]
    Cancelled,
    /// The caller's deadline passed.
    #[display("deadline exceeded")]
    DeadlineExceeded,
    /// The upgrade handshake was refused or malformed.
    #[display("handshake")]
    Handshake,
}

/// Main error type for agentgate operations.
#[derive(Debug, Display, Error, From)]
pub enum Error {
    /// The peer address could not be parsed or uses an unsupported scheme.
    #[display("invalid peer address: {_0}")]
    #[from(skip)]
    InvalidPeer(#[error(not(source))] String),

    /// Invalid request configuration (header names/values, method, URI).
    #[display("invalid request: {_0}")]
    #[from(skip)]
    InvalidRequest(#[error(not(source))] String),

    /// JSON serialization error.
    #[display("JSON serialization error: {_0}")]
    #[from]
    JsonSerialization(serde_json::Error),

    /// Query string serialization error.
    #[display("query serialization error: {_0}")]
    #[from]
    QuerySerialization(serde_html_form::ser::Error),

    /// URL parsing error.
    #[display("invalid URL: {_0}")]
    #[from]
    InvalidUrl(url::ParseError),

    /// Connection-level failure.
    #[display("transport error ({kind}): {message}")]
    #[from(skip)]
    Transport {
        /// What went wrong.
        kind: TransportKind,
        /// Diagnostic message.
        message: String,
        /// Upgrade handshake response, when the failure happened during one.
        #[error(not(source))]
        handshake: Option<Box<Handshake>>,
    },

    /// The remote answered with a status `>= 400`.
    #[display("remote error {status}: {message}")]
    #[from(skip)]
    Remote {
        /// HTTP status code.
        status: u16,
        /// Response body as (lossy) UTF-8 text.
        message: String,
        /// Raw response body, possibly empty.
        #[error(not(source))]
        body: Bytes,
    },

    /// JSON deserialization error with path context.
    #[display("decode error at '{path}': {message}")]
    #[from(skip)]
    Decode {
        /// JSON path to the error (e.g., "items[0].metadata.name").
        path: String,
        /// Error message.
        message: String,
    },
}

/// Result type alias using [`crate::Error`].
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create an invalid peer error.
    #[must_use]
    pub fn invalid_peer(message: impl Into<String>) -> Self {
        Self::InvalidPeer(message.into())
    }

    /// Create an invalid request error.
    #[must_use]
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest(message.into())
    }

    /// Create a transport error.
    #[must_use]
    pub fn transport(kind: TransportKind, message: impl Into<String>) -> Self {
        Self::Transport {
            kind,
            message: message.into(),
            handshake: None,
        }
    }

    /// Create a connection error.
    #[must_use]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::transport(TransportKind::Connect, message)
    }

    /// Create a cancellation error.
    #[must_use]
    pub fn cancelled() -> Self {
        Self::transport(TransportKind::Cancelled, "call cancelled by caller")
    }

    /// Create a deadline error.
    #[must_use]
    pub fn deadline_exceeded() -> Self {
        Self::transport(TransportKind::DeadlineExceeded, "call deadline exceeded")
    }

    /// Create a refused-upgrade error carrying the handshake response.
    #[must_use]
    pub fn handshake_rejected(handshake: Handshake) -> Self {
        Self::Transport {
            kind: TransportKind::Handshake,
            message: format!("upgrade rejected with status {}", handshake.status()),
            handshake: Some(Box::new(handshake)),
        }
    }

    /// Create a remote error from the raw response body.
    #[must_use]
    pub fn remote(status: u16, body: Bytes) -> Self {
        Self::Remote {
            status,
            message: String::from_utf8_lossy(&body).into_owned(),
            body,
        }
    }

    /// Create a decode error with path context.
    #[must_use]
    pub fn decode(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Classify this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidPeer(_)
            | Self::InvalidRequest(_)
            | Self::JsonSerialization(_)
            | Self::QuerySerialization(_)
            | Self::InvalidUrl(_) => ErrorKind::Construction,
            Self::Transport { .. } => ErrorKind::Transport,
            Self::Remote { .. } => ErrorKind::Remote,
            Self::Decode { .. } => ErrorKind::Decode,
        }
    }

    /// The transport failure cause, if this is a transport error.
    #[must_use]
    pub const fn transport_kind(&self) -> Option<TransportKind> {
        match self {
            Self::Transport { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    /// Returns `true` if the caller's context aborted the call.
    ///
    /// Both explicit cancellation and an expired caller deadline count.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(
            self.transport_kind(),
            Some(TransportKind::Cancelled | TransportKind::DeadlineExceeded)
        )
    }

    /// Returns `true` if this is a timeout error.
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(
            self.transport_kind(),
            Some(TransportKind::Timeout | TransportKind::DeadlineExceeded)
        )
    }

    /// Returns `true` if this is a connection error.
    #[must_use]
    pub const fn is_connection(&self) -> bool {
        matches!(self.transport_kind(), Some(TransportKind::Connect))
    }

    /// Returns the HTTP status code of a remote error or rejected handshake.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Remote { status, .. } => Some(*status),
            Self::Transport {
                handshake: Some(handshake),
                ..
            } => Some(handshake.status()),
            _ => None,
        }
    }

    /// Returns `true` if this is a client error (4xx).
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        self.status().is_some_and(|s| (400..500).contains(&s))
    }

    /// Returns `true` if this is a server error (5xx).
    #[must_use]
    pub fn is_server_error(&self) -> bool {
        self.status().is_some_and(|s| (500..600).contains(&s))
    }

    /// Returns `true` if this is a 404 Not Found error.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }

    /// Raw body of a remote error.
    #[must_use]
    pub const fn body(&self) -> Option<&Bytes> {
        match self {
            Self::Remote { body, .. } => Some(body),
            _ => None,
        }
    }

    /// Body of a remote error as text.
    #[must_use]
    pub fn body_text(&self) -> Option<&str> {
        match self {
            Self::Remote { message, .. } => Some(message.as_str()),
            _ => None,
        }
    }

    /// Handshake response attached to a failed upgrade.
    #[must_use]
    pub fn handshake(&self) -> Option<&Handshake> {
        match self {
            Self::Transport { handshake, .. } => handshake.as_deref(),
            _ => None,
        }
    }

    /// Try to decode the body of a remote error as JSON.
    ///
    /// Error bodies are opaque to the transport; this is an opt-in helper for
    /// callers that know their agent emits structured errors.
    pub fn decode_body<T: serde::de::DeserializeOwned>(&self) -> Option<Result<T>> {
        self.body().map(|body| crate::from_json(body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = Error::remote(404, Bytes::from("pod not found"));
        assert_eq!(err.to_string(), "remote error 404: pod not found");

        let err = Error::cancelled();
        assert_eq!(
            err.to_string(),
            "transport error (cancelled): call cancelled by caller"
        );

        let err = Error::decode("items[0].name", "invalid type: integer `1`");
        assert_eq!(
            err.to_string(),
            "decode error at 'items[0].name': invalid type: integer `1`"
        );
    }

    #[test]
    fn error_kind() {
        assert_eq!(Error::invalid_peer("x").kind(), ErrorKind::Construction);
        assert_eq!(Error::connection("refused").kind(), ErrorKind::Transport);
        assert_eq!(Error::remote(500, Bytes::new()).kind(), ErrorKind::Remote);
        assert_eq!(Error::decode("", "eof").kind(), ErrorKind::Decode);
    }

    #[test]
    fn error_cancellation_flag() {
        assert!(Error::cancelled().is_cancelled());
        assert!(Error::deadline_exceeded().is_cancelled());
        assert!(!Error::connection("refused").is_cancelled());
        assert!(!Error::transport(TransportKind::Timeout, "slow").is_cancelled());
        assert!(Error::transport(TransportKind::Timeout, "slow").is_timeout());
    }

    #[test]
    fn error_status() {
        let err = Error::remote(404, Bytes::new());
        assert_eq!(err.status(), Some(404));
        assert!(err.is_client_error());
        assert!(err.is_not_found());
        assert!(!err.is_server_error());

        let err = Error::remote(503, Bytes::new());
        assert!(err.is_server_error());

        assert_eq!(Error::cancelled().status(), None);
    }

    #[test]
    fn error_remote_keeps_raw_body() {
        let err = Error::remote(400, Bytes::new());
        assert_eq!(err.body(), Some(&Bytes::new()));
        assert_eq!(err.body_text(), Some(""));

        let err = Error::remote(400, Bytes::from_static(b"bad \xffinput"));
        assert_eq!(err.body().map(Bytes::len), Some(10));
        assert!(err.body_text().is_some_and(|t| t.starts_with("bad ")));
    }

    #[test]
    fn error_handshake_status() {
        let handshake = Handshake::new(401, http::HeaderMap::new(), None);
        let err = Error::handshake_rejected(handshake);
        assert_eq!(err.kind(), ErrorKind::Transport);
        assert_eq!(err.transport_kind(), Some(TransportKind::Handshake));
        assert_eq!(err.status(), Some(401));
        assert_eq!(err.handshake().map(Handshake::status), Some(401));
    }

    #[test]
    fn error_decode_body() {
        #[derive(Debug, PartialEq, serde::Deserialize)]
        struct AgentError {
            message: String,
        }

        let err = Error::remote(409, Bytes::from(r#"{"message":"conflict"}"#));
        let decoded = err
            .decode_body::<AgentError>()
            .expect("remote error has body")
            .expect("valid json");
        assert_eq!(
            decoded,
            AgentError {
                message: "conflict".to_string()
            }
        );

        assert!(Error::cancelled().decode_body::<AgentError>().is_none());
    }
}
