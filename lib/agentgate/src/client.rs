//! A client bound to one agent.

use std::sync::Arc;
use std::time::Duration;

use agentgate_core::Params;
use bytes::Bytes;
use hyper::body::Incoming;
use serde::de::DeserializeOwned;
use tower::Layer;
use tower_service::Service;

use crate::{
    BoxedService, CallContext, ClientConfig, Credential, Error, HttpRequest, HttpResponse,
    PeerAddress, RawResponse, Request, Result, StreamDialer, StreamHandle, Transport,
    TransportBuilder,
};

/// Long-lived client for one agent peer.
///
/// Pairs a [`Transport`] and a [`StreamDialer`] with a [`PeerAddress`] and an
/// optional [`Credential`]. Cloning is cheap and clones share the connection
/// pool; calls from any number of tasks run independently.
///
/// # Example
///
/// ```no_run
/// use agentgate::{AgentClient, CallContext, Credential, Params, Request};
///
/// # async fn run() -> agentgate::Result<()> {
/// let client = AgentClient::builder("https://agent.cluster-a:8041/api".parse()?)
///     .with_credential(Credential::bearer("token"))
///     .with_logging()
///     .build()?;
///
/// let ctx = CallContext::new();
/// let pods: serde_json::Value = client
///     .execute_into(&ctx, Request::get("/v1/namespaces/default/pods").build())
///     .await?;
///
/// let logs = client
///     .open_stream(&ctx, "/v1/logs?follow=true", &Params::new())
///     .await?;
/// assert_eq!(logs.handshake().status(), 101);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct AgentClient {
    transport: Transport,
    dialer: StreamDialer,
    peer: Arc<PeerAddress>,
    credential: Option<Credential>,
}

impl AgentClient {
    /// Client for `peer` over an existing transport.
    ///
    /// The transport may be shared between clients for different peers.
    #[must_use]
    pub fn new(transport: Transport, peer: PeerAddress) -> Self {
        let dialer = StreamDialer::from_transport(&transport);
        Self {
            transport,
            dialer,
            peer: Arc::new(peer),
            credential: None,
        }
    }

    /// Client for the peer at `address` with a default transport.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPeer`] if the address is malformed.
    pub fn with_address(address: &str) -> Result<Self> {
        Self::builder(PeerAddress::parse(address)?).build()
    }

    /// Create a client builder for `peer`.
    #[must_use]
    pub fn builder(peer: PeerAddress) -> AgentClientBuilder {
        AgentClientBuilder {
            peer,
            transport: Transport::builder(),
            credential: None,
        }
    }

    /// The peer this client talks to.
    #[must_use]
    pub fn peer(&self) -> &PeerAddress {
        &self.peer
    }

    /// The underlying transport.
    #[must_use]
    pub const fn transport(&self) -> &Transport {
        &self.transport
    }

    /// Send a request and return the unclassified response.
    ///
    /// See [`Transport::send_raw`].
    pub async fn send_raw(
        &self,
        ctx: &CallContext,
        request: Request,
    ) -> Result<RawResponse<Incoming>> {
        self.transport.send_raw(ctx, &self.peer, request).await
    }

    /// Send a request and classify the outcome, without decoding.
    ///
    /// See [`Transport::execute`].
    pub async fn execute(&self, ctx: &CallContext, request: Request) -> Result<()> {
        self.transport.execute(ctx, &self.peer, request).await
    }

    /// Send a request and decode a success body into `T`.
    ///
    /// See [`Transport::execute_into`].
    pub async fn execute_into<T: DeserializeOwned>(
        &self,
        ctx: &CallContext,
        request: Request,
    ) -> Result<T> {
        self.transport.execute_into(ctx, &self.peer, request).await
    }

    /// Send a request and buffer a success body.
    ///
    /// See [`Transport::execute_bytes`].
    pub async fn execute_bytes(
        &self,
        ctx: &CallContext,
        request: Request,
    ) -> Result<RawResponse<Bytes>> {
        self.transport.execute_bytes(ctx, &self.peer, request).await
    }

    /// Open a stream to `path` on the peer.
    ///
    /// The client's credential is added to `headers` unless they already
    /// carry that header. See [`StreamDialer::open_stream`].
    pub async fn open_stream(
        &self,
        ctx: &CallContext,
        path: &str,
        headers: &Params,
    ) -> Result<StreamHandle> {
        match &self.credential {
            Some(credential) => {
                let mut headers = headers.clone();
                credential.apply(&mut headers)?;
                self.dialer.open_stream(ctx, &self.peer, path, &headers).await
            }
            None => self.dialer.open_stream(ctx, &self.peer, path, headers).await,
        }
    }
}

/// Builder for [`AgentClient`].
#[derive(Debug)]
pub struct AgentClientBuilder {
    peer: PeerAddress,
    transport: TransportBuilder,
    credential: Option<Credential>,
}

impl AgentClientBuilder {
    /// Replace the whole configuration.
    #[must_use]
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.transport = self.transport.config(config);
        self
    }

    /// Set the response (and handshake) timeout.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.transport = self.transport.timeout(timeout);
        self
    }

    /// Set the connection timeout.
    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.transport = self.transport.connect_timeout(timeout);
        self
    }

    /// Set the default `User-Agent`.
    #[must_use]
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.transport = self.transport.user_agent(user_agent);
        self
    }

    /// Use a custom TLS configuration for calls and streams.
    #[must_use]
    pub fn tls_config(mut self, tls: Arc<rustls::ClientConfig>) -> Self {
        self.transport = self.transport.tls_config(tls);
        self
    }

    /// Add a Tower layer around request/response calls.
    ///
    /// See [`TransportBuilder::layer`].
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
        self.transport = self.transport.layer(layer);
        self
    }

    /// Add request/response logging.
    #[must_use]
    pub fn with_logging(mut self) -> Self {
        self.transport = self.transport.with_logging();
        self
    }

    /// Add debug-level logging.
    #[must_use]
    pub fn with_debug_logging(mut self) -> Self {
        self.transport = self.transport.with_debug_logging();
        self
    }

    /// Send `credential` with every call and every stream handshake.
    #[must_use]
    pub fn with_credential(mut self, credential: Credential) -> Self {
        self.transport = self.transport.with_credential(credential.clone());
        self.credential = Some(credential);
        self
    }

    /// Build the client.
    ///
    /// # Errors
    ///
    /// Returns the transport's setup errors (see [`TransportBuilder::build`]).
    pub fn build(self) -> Result<AgentClient> {
        let transport = self.transport.build()?;
        let mut client = AgentClient::new(transport, self.peer);
        client.credential = self.credential;
        Ok(client)
    }
}
