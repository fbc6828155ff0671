//! Typed client for remote cluster agents.
//!
//! A control plane talks to many agents. For each call it resolves an
//! endpoint on the agent's [`PeerAddress`], sends a [`Request`] and either
//! classifies the response (decoding a success body, or surfacing an error
//! status as [`Error::Remote`]) or upgrades the connection into a long-lived
//! stream for log tails and exec sessions.
//!
//! - [`Transport`] - pooled HTTP(S) calls behind a Tower middleware stack
//! - [`StreamDialer`] - upgrade handshakes, returning a [`StreamHandle`]
//! - [`AgentClient`] - both, bound to one peer and an optional [`Credential`]
//! - [`CallContext`] - cancellation and deadline for every call
//!
//! # Example
//!
//! ```no_run
//! use agentgate::prelude::*;
//!
//! #[derive(Debug, Deserialize)]
//! struct Token {
//!     token: String,
//! }
//!
//! # async fn run() -> agentgate::Result<()> {
//! let client = AgentClient::with_address("http://10.0.0.7:8041")?;
//! let ctx = CallContext::new().with_timeout(std::time::Duration::from_secs(10));
//!
//! match client
//!     .execute_into::<Token>(&ctx, Request::post("/v1/token").json(&"admin")?.build())
//!     .await
//! {
//!     Ok(token) => println!("token: {}", token.token),
//!     Err(err) if err.is_cancelled() => println!("gave up"),
//!     Err(err) => println!("{:?} error: {err}", err.kind()),
//! }
//! # Ok(())
//! # }
//! ```

mod client;
mod config;
mod connector;
mod context;
mod dialer;
pub mod middleware;
pub mod prelude;
mod response;
mod transport;

pub use client::{AgentClient, AgentClientBuilder};
pub use config::{ClientConfig, ClientConfigBuilder, DEFAULT_USER_AGENT};
pub use connector::{https_connector, tls_config};
pub use context::CallContext;
pub use dialer::{StreamDialer, StreamHandle, WsStream};
pub use response::IncomingResponseExt;
pub use transport::{
    BoxedService, HttpRequest, HttpResponse, OutgoingBody, ServiceFuture, Transport,
    TransportBuilder,
};

// Re-export tower for middleware composition
pub use tower;

// Re-export the message type carried by streams
pub use tokio_tungstenite::tungstenite::Message;

// Re-export core types
pub use agentgate_core::{
    Body, ByteStream, ContentType, Credential, Envelope, Error, ErrorKind, Handshake, Method,
    PRIVATE_TOKEN_HEADER, Params, Payload, PeerAddress, RawResponse, Request, RequestBuilder,
    Result, Scheme, StatusCode, TransportKind, endpoint, from_json, header, identity, to_json,
    to_query_string,
};

// Re-export tokio-util's token so callers need not depend on it
pub use tokio_util::sync::CancellationToken;
