//! Upgrade handshakes and long-lived streams.
//!
//! [`StreamDialer::open_stream`] resolves the streaming URL of a peer (`ws` for
//! plain peers, `wss` for secure ones), performs the upgrade handshake with
//! the caller's headers and hands the open stream over. Message framing on
//! top of the stream is up to the caller.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use agentgate_core::{Handshake, Params, endpoint};
use bytes::Bytes;
use http::HeaderName;
use http::header::{CONNECTION, HOST, SEC_WEBSOCKET_KEY, SEC_WEBSOCKET_VERSION, UPGRADE};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::error::Error as WsError;
use tokio_tungstenite::{Connector, MaybeTlsStream, WebSocketStream, connect_async_tls_with_config};
use tracing::{debug, warn};

use crate::transport::header_map;
use crate::{CallContext, ClientConfig, Error, PeerAddress, Result, Transport, TransportKind};

/// The upgraded connection.
pub type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Headers owned by the handshake itself; caller values are not forwarded.
fn is_handshake_header(name: &HeaderName) -> bool {
    [HOST, CONNECTION, UPGRADE, SEC_WEBSOCKET_KEY, SEC_WEBSOCKET_VERSION].contains(name)
}

/// An open stream plus the HTTP side of its handshake.
///
/// The caller owns the stream and is responsible for closing it.
pub struct StreamHandle {
    stream: WsStream,
    handshake: Handshake,
}

impl StreamHandle {
    /// Handshake response (status `101` and its headers).
    #[must_use]
    pub const fn handshake(&self) -> &Handshake {
        &self.handshake
    }

    /// Mutable access to the stream.
    pub const fn stream_mut(&mut self) -> &mut WsStream {
        &mut self.stream
    }

    /// Take the stream, dropping the handshake metadata.
    #[must_use]
    pub fn into_stream(self) -> WsStream {
        self.stream
    }

    /// Take the stream and the handshake metadata.
    #[must_use]
    pub fn into_parts(self) -> (WsStream, Handshake) {
        (self.stream, self.handshake)
    }
}

impl fmt::Debug for StreamHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamHandle")
            .field("handshake", &self.handshake)
            .finish_non_exhaustive()
    }
}

/// Performs upgrade handshakes against agent peers.
#[derive(Clone)]
pub struct StreamDialer {
    tls: Arc<rustls::ClientConfig>,
    handshake_timeout: Duration,
}

impl fmt::Debug for StreamDialer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamDialer")
            .field("handshake_timeout", &self.handshake_timeout)
            .finish_non_exhaustive()
    }
}

impl StreamDialer {
    /// Create a dialer. The handshake is bounded by `config.timeout`.
    #[must_use]
    pub fn new(config: &ClientConfig, tls: Arc<rustls::ClientConfig>) -> Self {
        Self {
            tls,
            handshake_timeout: config.timeout,
        }
    }

    /// A dialer sharing the configuration and TLS setup of `transport`.
    #[must_use]
    pub fn from_transport(transport: &Transport) -> Self {
        Self::new(transport.config(), Arc::clone(transport.tls_config()))
    }

    /// Open a stream to `path` on `peer`.
    ///
    /// `headers` are sent with the handshake verbatim, except the ones the
    /// handshake itself sets (`Host`, `Connection`, `Upgrade` and the
    /// `Sec-WebSocket-Key`/`-Version` pair).
    ///
    /// # Errors
    ///
    /// A refused upgrade yields a [`TransportKind::Handshake`] error whose
    /// [`Error::handshake`] carries the response status, headers and body.
    /// Network failures, timeouts and cancellation are transport errors as
    /// for request/response calls.
    pub async fn open_stream(
        &self,
        ctx: &CallContext,
        peer: &PeerAddress,
        path: &str,
        headers: &Params,
    ) -> Result<StreamHandle> {
        let url = endpoint::resolve_stream(peer, path);
        let mut request = url
            .as_str()
            .into_client_request()
            .map_err(|err| map_ws_error(err, TransportKind::Handshake))?;

        let extra = header_map(headers)?;
        for (name, value) in &extra {
            if is_handshake_header(name) {
                debug!(header = %name, "skipping handshake-owned header");
                continue;
            }
            request.headers_mut().append(name.clone(), value.clone());
        }
        debug!(url = %url, "opening stream");

        let connector = Connector::Rustls(Arc::clone(&self.tls));
        let timeout = self.handshake_timeout;
        let dial = async move {
            tokio::time::timeout(
                timeout,
                connect_async_tls_with_config(request, None, false, Some(connector)),
            )
            .await
            .map_err(|_| {
                Error::transport(
                    TransportKind::Timeout,
                    format!("no handshake response within {}ms", timeout.as_millis()),
                )
            })?
            .map_err(|err| map_ws_error(err, TransportKind::Connect))
        };

        let (stream, response) = ctx.run(dial).await?;
        let handshake = Handshake::new(
            response.status().as_u16(),
            response.headers().clone(),
            None,
        );
        debug!(url = %url, status = handshake.status(), "stream opened");

        Ok(StreamHandle { stream, handshake })
    }
}

/// Map a dial failure. `io_kind` classifies plain I/O errors.
fn map_ws_error(err: WsError, io_kind: TransportKind) -> Error {
    match err {
        WsError::Http(response) => {
            let handshake = Handshake::new(
                response.status().as_u16(),
                response.headers().clone(),
                response.body().as_ref().map(|body| Bytes::copy_from_slice(body)),
            );
            warn!(status = handshake.status(), "upgrade rejected");
            Error::handshake_rejected(handshake)
        }
        WsError::Url(err) => Error::invalid_request(format!("invalid stream URL: {err}")),
        WsError::HttpFormat(err) => Error::invalid_request(err.to_string()),
        WsError::Tls(err) => Error::transport(TransportKind::Tls, err.to_string()),
        WsError::Io(err) if err.kind() == std::io::ErrorKind::TimedOut => {
            Error::transport(TransportKind::Timeout, err.to_string())
        }
        WsError::Io(err) => Error::transport(io_kind, err.to_string()),
        WsError::Protocol(err) => Error::transport(TransportKind::Handshake, err.to_string()),
        other => Error::transport(TransportKind::Io, other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use assert2::{check, let_assert};
    use http::{Response, StatusCode};

    use super::*;

    #[test]
    fn refused_upgrade_keeps_response() {
        let response = Response::builder()
            .status(StatusCode::UNAUTHORIZED)
            .header("www-authenticate", "Bearer")
            .body(Some(b"unauthorized".to_vec()))
            .expect("response");

        let err = map_ws_error(WsError::Http(response.into()), TransportKind::Connect);
        check!(err.transport_kind() == Some(TransportKind::Handshake));
        check!(err.status() == Some(401));
        let_assert!(Some(handshake) = err.handshake());
        check!(handshake.header("www-authenticate") == Some("Bearer"));
        check!(handshake.body().map(Bytes::as_ref) == Some(&b"unauthorized"[..]));
    }

    #[test]
    fn io_errors_are_connection_failures() {
        let err = map_ws_error(
            WsError::Io(std::io::Error::from(std::io::ErrorKind::ConnectionRefused)),
            TransportKind::Connect,
        );
        check!(err.is_connection());
        check!(!err.is_cancelled());
    }

    #[test]
    fn handshake_owned_headers() {
        check!(is_handshake_header(&SEC_WEBSOCKET_KEY));
        check!(is_handshake_header(&HeaderName::from_static("host")));
        check!(!is_handshake_header(&HeaderName::from_static("authorization")));
    }
}
