//! Request/response transport over hyper-util.
//!
//! [`Transport::send_raw`] resolves and sends a [`Request`] and hands back the
//! unclassified response. The `execute*` family layers the classification
//! policy on top:
//!
//! | Status | Result |
//! |--------|--------|
//! | `>= 400` | [`Error::Remote`] with the full (possibly empty) body; never decoded |
//! | `< 400`, [`Transport::execute_into`] | the body decoded into `T`, or [`Error::Decode`] |
//! | `< 400`, [`Transport::execute`] | `()`; the body is discarded unread |
//!
//! Every response body is owned by the call that produced it and released on
//! every exit path, including cancellation.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::time::Duration;

use agentgate_core::{Body, ContentType, Payload, endpoint};
use bytes::Bytes;
use futures_util::TryStreamExt;
use http::header::{AUTHORIZATION, CONTENT_TYPE, COOKIE, PROXY_AUTHORIZATION, USER_AGENT};
use http::{HeaderMap, HeaderName, HeaderValue};
use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::{BodyExt, Empty, Full, StreamBody};
use hyper::body::{Frame, Incoming};
use hyper_rustls::HttpsConnector;
use hyper_util::client::legacy::{Client, connect::HttpConnector};
use hyper_util::rt::TokioExecutor;
use serde::de::DeserializeOwned;
use tower::util::BoxCloneService;
use tower::{Layer, ServiceExt};
use tower_service::Service;
use tracing::debug;

use crate::config::{ClientConfig, ClientConfigBuilder};
use crate::connector::{https_connector, tls_config};
use crate::middleware::{AuthorizationLayer, LoggingLayer};
use crate::response::IncomingResponseExt;
use crate::{
    CallContext, Credential, Error, PeerAddress, PRIVATE_TOKEN_HEADER, RawResponse, Request,
    Result, TransportKind,
};

/// Body type of outgoing requests: empty, fixed-length or streamed.
pub type OutgoingBody = UnsyncBoxBody<Bytes, std::io::Error>;

/// Outgoing request as seen by middleware.
pub type HttpRequest = http::Request<OutgoingBody>;

/// Response head plus live body as seen by middleware.
pub type HttpResponse = http::Response<Incoming>;

/// Type-erased service for middleware composition.
pub type BoxedService = BoxCloneService<HttpRequest, HttpResponse, Error>;

/// Future type of [`BoxedService`] and of the bundled middleware.
pub type ServiceFuture = Pin<Box<dyn Future<Output = Result<HttpResponse>> + Send + 'static>>;

/// Thread-safe wrapper for `BoxedService`.
///
/// `BoxCloneService` is `Send` but not `Sync`; the mutex is only held long
/// enough to clone the service for one call. Each clone is driven to
/// readiness before it is called.
#[derive(Clone)]
struct SyncService {
    inner: Arc<Mutex<BoxedService>>,
}

impl SyncService {
    fn new(service: BoxedService) -> Self {
        Self {
            inner: Arc::new(Mutex::new(service)),
        }
    }

    fn call(&self, request: HttpRequest) -> ServiceFuture {
        let mut service = self
            .inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone();

        Box::pin(async move { service.oneshot(request).await })
    }
}

/// Innermost service: the pooled hyper client.
#[derive(Clone)]
struct HyperService {
    inner: Client<HttpsConnector<HttpConnector>, OutgoingBody>,
    timeout: Duration,
}

impl HyperService {
    fn new(config: &ClientConfig, tls: &rustls::ClientConfig) -> Self {
        let connector = https_connector(config, tls);

        let inner = Client::builder(TokioExecutor::new())
            .pool_idle_timeout(config.pool_idle_timeout)
            .pool_max_idle_per_host(config.pool_idle_per_host)
            .build(connector);

        Self {
            inner,
            timeout: config.timeout,
        }
    }
}

impl Service<HttpRequest> for HyperService {
    type Response = HttpResponse;
    type Error = Error;
    type Future = ServiceFuture;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: HttpRequest) -> Self::Future {
        let client = self.inner.clone();
        let timeout = self.timeout;
        Box::pin(async move {
            tokio::time::timeout(timeout, client.request(request))
                .await
                .map_err(|_| {
                    Error::transport(
                        TransportKind::Timeout,
                        format!("no response within {}ms", timeout.as_millis()),
                    )
                })?
                .map_err(|err| map_hyper_error(&err))
        })
    }
}

fn error_chain(err: &dyn std::error::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

fn map_hyper_error(err: &hyper_util::client::legacy::Error) -> Error {
    let message = error_chain(err);
    let lower = message.to_ascii_lowercase();

    let kind = if lower.contains("certificate") || lower.contains("tls") {
        TransportKind::Tls
    } else if err.is_connect() && lower.contains("timed out") {
        TransportKind::Timeout
    } else if err.is_connect() {
        TransportKind::Connect
    } else {
        TransportKind::Io
    };

    Error::transport(kind, message)
}

/// Map a failure while reading a response body.
pub(crate) fn map_body_error(err: &hyper::Error) -> Error {
    let kind = if err.is_timeout() {
        TransportKind::Timeout
    } else {
        TransportKind::Io
    };
    Error::transport(kind, error_chain(err))
}

fn outgoing_body(payload: Payload) -> OutgoingBody {
    match payload {
        Payload::Empty => Empty::<Bytes>::new().map_err(|never| match never {}).boxed_unsync(),
        Payload::Full(bytes) => Full::new(bytes).map_err(|never| match never {}).boxed_unsync(),
        Payload::Stream(stream) => StreamBody::new(stream.map_ok(Frame::data)).boxed_unsync(),
    }
}

fn is_secret_header(name: &HeaderName) -> bool {
    name == AUTHORIZATION
        || name == PROXY_AUTHORIZATION
        || name == COOKIE
        || name.as_str().eq_ignore_ascii_case(PRIVATE_TOKEN_HEADER)
}

/// Convert descriptor headers into a header map, keeping repeated values.
pub(crate) fn header_map(headers: &agentgate_core::Params) -> Result<HeaderMap> {
    let mut map = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| Error::invalid_request(format!("invalid header name '{name}'")))?;
        let mut value = HeaderValue::from_str(value)
            .map_err(|_| Error::invalid_request(format!("invalid value for header '{name}'")))?;
        if is_secret_header(&name) {
            value.set_sensitive(true);
        }
        map.append(name, value);
    }
    Ok(map)
}

/// Turn a descriptor into the outgoing HTTP request.
fn build_http_request(
    peer: &PeerAddress,
    request: Request,
    user_agent: &str,
) -> Result<HttpRequest> {
    let (method, path, query, headers, body) = request.into_parts();

    let mut url = endpoint::resolve(peer, &path);
    if !query.is_empty() {
        let mut pairs = url.query_pairs_mut();
        for (name, value) in &query {
            pairs.append_pair(name, value);
        }
    }

    let mut headers = header_map(&headers)?;
    if body.is_some() && !headers.contains_key(CONTENT_TYPE) {
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static(ContentType::Json.as_str()),
        );
    }
    if !headers.contains_key(USER_AGENT) {
        let value = HeaderValue::from_str(user_agent)
            .map_err(|_| Error::invalid_request(format!("invalid user agent '{user_agent}'")))?;
        headers.insert(USER_AGENT, value);
    }

    let payload = body.map_or(Payload::Empty, Body::encode);
    let mut http_request = http::Request::builder()
        .method(method)
        .uri(url.as_str())
        .body(outgoing_body(payload))
        .map_err(|e| Error::invalid_request(e.to_string()))?;
    *http_request.headers_mut() = headers;

    Ok(http_request)
}

/// Request/response transport with connection pooling, TLS and middleware.
///
/// A transport is not bound to a peer: every call names its [`PeerAddress`].
/// It is cheap to clone and safe to share between tasks; concurrent calls do
/// not coordinate.
///
/// # Example
///
/// ```no_run
/// use agentgate::{CallContext, PeerAddress, Request, Transport};
///
/// # async fn run() -> agentgate::Result<()> {
/// #[derive(serde::Deserialize)]
/// struct Version { version: String }
///
/// let transport = Transport::builder().with_logging().build()?;
/// let peer = PeerAddress::parse("https://agent.cluster-a:8041")?;
///
/// let version: Version = transport
///     .execute_into(&CallContext::new(), &peer, Request::get("/version").build())
///     .await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Transport {
    service: SyncService,
    config: ClientConfig,
    tls: Arc<rustls::ClientConfig>,
}

impl std::fmt::Debug for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transport")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Transport {
    /// Create a transport with default configuration and no middleware.
    ///
    /// # Errors
    ///
    /// Returns a TLS transport error if the TLS configuration cannot be built.
    pub fn new() -> Result<Self> {
        Self::builder().build()
    }

    /// Create a new transport builder.
    #[must_use]
    pub fn builder() -> TransportBuilder {
        TransportBuilder::default()
    }

    /// Transport configuration.
    #[must_use]
    pub const fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// TLS configuration, shared with stream dialers built from this transport.
    #[must_use]
    pub const fn tls_config(&self) -> &Arc<rustls::ClientConfig> {
        &self.tls
    }

    /// Send a request and return the unclassified response.
    ///
    /// The URL is the peer's base path joined with the request path; any
    /// query embedded in the path is kept and the request's query parameters
    /// are appended after it. Headers are forwarded verbatim, repeated names
    /// included. The configured `User-Agent` is added when absent, and so is
    /// `Content-Type: application/json` for requests with a body.
    ///
    /// The returned body must be read (or dropped) by the caller. Reading it
    /// with [`IncomingResponseExt::bytes`] stays bound to a context.
    ///
    /// # Errors
    ///
    /// Construction errors for invalid headers, transport errors for network
    /// failures, timeouts and cancellation. The status code is not inspected.
    pub async fn send_raw(
        &self,
        ctx: &CallContext,
        peer: &PeerAddress,
        request: Request,
    ) -> Result<RawResponse<Incoming>> {
        let http_request = build_http_request(peer, request, &self.config.user_agent)?;
        debug!(
            method = %http_request.method(),
            uri = %http_request.uri(),
            "sending request"
        );

        let response = ctx.run(self.service.call(http_request)).await?;
        let (parts, body) = response.into_parts();
        Ok(RawResponse::new(parts.status.as_u16(), parts.headers, body))
    }

    /// Send a request and classify the outcome, without decoding.
    ///
    /// # Errors
    ///
    /// [`Error::Remote`] for status `>= 400`, plus everything
    /// [`Transport::send_raw`] returns.
    pub async fn execute(
        &self,
        ctx: &CallContext,
        peer: &PeerAddress,
        request: Request,
    ) -> Result<()> {
        let response = self.send_raw(ctx, peer, request).await?;
        if response.is_error() {
            return Err(remote_error(ctx, response).await);
        }
        Ok(())
    }

    /// Send a request, classify the outcome and decode a success body as JSON.
    ///
    /// # Errors
    ///
    /// [`Error::Remote`] for status `>= 400`, [`Error::Decode`] when a success
    /// body does not fit `T`, plus everything [`Transport::send_raw`] returns.
    pub async fn execute_into<T: DeserializeOwned>(
        &self,
        ctx: &CallContext,
        peer: &PeerAddress,
        request: Request,
    ) -> Result<T> {
        let response = self.execute_bytes(ctx, peer, request).await?;
        response.json()
    }

    /// Send a request, classify the outcome and buffer a success body.
    ///
    /// # Errors
    ///
    /// [`Error::Remote`] for status `>= 400`, plus everything
    /// [`Transport::send_raw`] returns.
    pub async fn execute_bytes(
        &self,
        ctx: &CallContext,
        peer: &PeerAddress,
        request: Request,
    ) -> Result<RawResponse<Bytes>> {
        let response = self.send_raw(ctx, peer, request).await?;
        if response.is_error() {
            return Err(remote_error(ctx, response).await);
        }
        response.bytes(ctx).await
    }
}

/// Read an error response into [`Error::Remote`].
///
/// A body that cannot be read counts as empty, except when the caller's
/// context aborted the read.
async fn remote_error(ctx: &CallContext, response: RawResponse<Incoming>) -> Error {
    let status = response.status();
    match response.bytes(ctx).await {
        Ok(response) => {
            debug!(status, body_len = response.body().len(), "remote error");
            Error::remote(status, response.into_body())
        }
        Err(err) if err.is_cancelled() => err,
        Err(err) => {
            debug!(status, error = %err, "could not read error body");
            Error::remote(status, Bytes::new())
        }
    }
}

/// Builder for [`Transport`].
///
/// # Example
///
/// ```no_run
/// use std::time::Duration;
/// use agentgate::{Credential, Transport};
///
/// let transport = Transport::builder()
///     .timeout(Duration::from_secs(10))
///     .with_credential(Credential::bearer("token"))
///     .with_logging()
///     .build()
///     .expect("transport");
/// ```
#[derive(Default)]
pub struct TransportBuilder {
    config: ClientConfigBuilder,
    tls: Option<Arc<rustls::ClientConfig>>,
    layers: Vec<Arc<dyn Fn(BoxedService) -> BoxedService + Send + Sync>>,
    setup_error: Option<Error>,
}

impl std::fmt::Debug for TransportBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportBuilder")
            .field("config", &self.config)
            .field("layers_count", &self.layers.len())
            .finish_non_exhaustive()
    }
}

impl TransportBuilder {
    /// Replace the whole configuration.
    #[must_use]
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = ClientConfig::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .pool_idle_per_host(config.pool_idle_per_host)
            .pool_idle_timeout(config.pool_idle_timeout)
            .user_agent(config.user_agent);
        self
    }

    /// Set the response timeout.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config = self.config.timeout(timeout);
        self
    }

    /// Set the connection timeout.
    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config = self.config.connect_timeout(timeout);
        self
    }

    /// Set the maximum idle connections per host.
    #[must_use]
    pub fn pool_idle_per_host(mut self, count: usize) -> Self {
        self.config = self.config.pool_idle_per_host(count);
        self
    }

    /// Set the idle connection timeout.
    #[must_use]
    pub fn pool_idle_timeout(mut self, timeout: Duration) -> Self {
        self.config = self.config.pool_idle_timeout(timeout);
        self
    }

    /// Set the default `User-Agent`.
    #[must_use]
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config = self.config.user_agent(user_agent);
        self
    }

    /// Use a custom TLS configuration (e.g. a private CA for agents).
    #[must_use]
    pub fn tls_config(mut self, tls: Arc<rustls::ClientConfig>) -> Self {
        self.tls = Some(tls);
        self
    }

    /// Add a Tower layer around the transport service.
    ///
    /// Layers wrap in order: the first one added is the outermost and sees
    /// each request first.
    #[must_use]
    pub fn layer<L>(mut self, layer: L) -> Self
    where
        L: Layer<BoxedService> + Send + Sync + 'static,
        L::Service: Service<HttpRequest, Response = HttpResponse, Error = Error>
            + Clone
            + Send
            + 'static,
        <L::Service as Service<HttpRequest>>::Future: Send + 'static,
    {
        self.layers.push(Arc::new(move |service| {
            BoxCloneService::new(layer.layer(service))
        }));
        self
    }

    /// Add request/response logging.
    #[must_use]
    pub fn with_logging(self) -> Self {
        self.layer(LoggingLayer::new())
    }

    /// Add debug-level logging (includes headers; secrets stay redacted).
    #[must_use]
    pub fn with_debug_logging(self) -> Self {
        self.layer(LoggingLayer::debug())
    }

    /// Attach `credential` to every call that does not carry one.
    ///
    /// An invalid credential is reported by [`TransportBuilder::build`].
    #[must_use]
    pub fn with_credential(mut self, credential: Credential) -> Self {
        match AuthorizationLayer::new(credential) {
            Ok(layer) => self.layer(layer),
            Err(err) => {
                self.setup_error.get_or_insert(err);
                self
            }
        }
    }

    /// Build the transport with all configured middleware.
    ///
    /// # Errors
    ///
    /// Returns the first setup error: an invalid credential or a TLS
    /// configuration that cannot be built.
    pub fn build(self) -> Result<Transport> {
        if let Some(err) = self.setup_error {
            return Err(err);
        }

        let config = self.config.build();
        let tls = match self.tls {
            Some(tls) => tls,
            None => tls_config()?,
        };

        let mut service: BoxedService = BoxCloneService::new(HyperService::new(&config, &tls));
        for layer_fn in self.layers.iter().rev() {
            service = layer_fn(service);
        }

        Ok(Transport {
            service: SyncService::new(service),
            config,
            tls,
        })
    }
}

#[cfg(test)]
mod tests {
    use agentgate_core::Params;
    use assert2::{check, let_assert};

    use super::*;

    fn peer() -> PeerAddress {
        PeerAddress::parse("https://a.b/api/").expect("peer")
    }

    #[test]
    fn request_url_merges_embedded_and_descriptor_query() {
        let request = Request::get("/v1/pods?watch=true")
            .query("label", "app=web")
            .query("label", "tier=front")
            .build();
        let http_request = build_http_request(&peer(), request, "ua").expect("request");

        check!(
            http_request.uri().to_string()
                == "https://a.b/api/v1/pods?watch=true&label=app%3Dweb&label=tier%3Dfront"
        );
    }

    #[test]
    fn request_defaults_content_type_and_user_agent() {
        let request = Request::post("/v1/scale").bytes(Bytes::from_static(b"{}")).build();
        let http_request = build_http_request(&peer(), request, "agentgate/test").expect("request");

        check!(http_request.headers()[CONTENT_TYPE] == "application/json");
        check!(http_request.headers()[USER_AGENT] == "agentgate/test");
    }

    #[test]
    fn request_without_body_has_no_content_type() {
        let request = Request::get("/v1/pods").build();
        let http_request = build_http_request(&peer(), request, "ua").expect("request");

        check!(!http_request.headers().contains_key(CONTENT_TYPE));
    }

    #[test]
    fn request_keeps_caller_headers() {
        let request = Request::post("/v1/upload")
            .header("content-type", "application/octet-stream")
            .header("User-Agent", "gems/1")
            .header("X-Trace", "a")
            .header("X-Trace", "b")
            .build();
        let http_request = build_http_request(&peer(), request, "ua").expect("request");
        let headers = http_request.headers();

        check!(headers.get_all(CONTENT_TYPE).iter().count() == 1);
        check!(headers[CONTENT_TYPE] == "application/octet-stream");
        check!(headers[USER_AGENT] == "gems/1");
        check!(headers.get_all("x-trace").iter().collect::<Vec<_>>() == ["a", "b"]);
    }

    #[test]
    fn request_marks_secrets_sensitive() {
        let headers = Params::new()
            .with("Authorization", "Bearer t")
            .with("PRIVATE-TOKEN", "p")
            .with("X-Request-Id", "1");
        let map = header_map(&headers).expect("headers");

        check!(map[AUTHORIZATION].is_sensitive());
        check!(map["private-token"].is_sensitive());
        check!(!map["x-request-id"].is_sensitive());
    }

    #[test]
    fn request_rejects_invalid_header() {
        let request = Request::get("/").header("bad header", "x").build();
        let_assert!(Err(err) = build_http_request(&peer(), request, "ua"));
        check!(err.kind() == agentgate_core::ErrorKind::Construction);

        let request = Request::get("/").header("X-Ok", "line\nbreak").build();
        check!(build_http_request(&peer(), request, "ua").is_err());
    }

    #[test]
    fn transport_builder() {
        let transport = Transport::builder()
            .timeout(Duration::from_secs(60))
            .pool_idle_per_host(16)
            .build()
            .expect("transport");

        check!(transport.config().timeout == Duration::from_secs(60));
        check!(transport.config().pool_idle_per_host == 16);
        check!(format!("{transport:?}").contains("Transport"));
    }

    #[test]
    fn transport_builder_reports_invalid_credential() {
        let result = Transport::builder()
            .with_credential(Credential::bearer("bad\ntoken"))
            .build();
        let_assert!(Err(err) = result);
        check!(err.kind() == agentgate_core::ErrorKind::Construction);
    }
}
