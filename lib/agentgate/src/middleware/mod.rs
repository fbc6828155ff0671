//! Tower middleware for the transport.
//!
//! Layers wrap the service that sends [`HttpRequest`]s and yields
//! [`HttpResponse`]s, so they see the request after the descriptor has been
//! resolved and encoded. They are added with [`TransportBuilder::layer`] and
//! wrap in order: the first layer added is the outermost.
//!
//! - [`LoggingLayer`] - logs requests and responses with `tracing`
//! - [`AuthorizationLayer`] - attaches a [`Credential`] unless the call has one
//!
//! # Example
//!
//! ```no_run
//! use agentgate::Transport;
//! use agentgate::middleware::ConcurrencyLimitLayer;
//!
//! let transport = Transport::builder()
//!     .with_logging()
//!     .layer(ConcurrencyLimitLayer::new(64))
//!     .build()
//!     .expect("transport");
//! ```
//!
//! [`HttpRequest`]: crate::HttpRequest
//! [`HttpResponse`]: crate::HttpResponse
//! [`TransportBuilder::layer`]: crate::TransportBuilder::layer
//! [`Credential`]: crate::Credential

mod authorization;
mod logging;

pub use authorization::{Authorization, AuthorizationLayer};
pub use logging::{LogLevel, Logging, LoggingLayer};

// Re-export tower types for convenience
pub use tower::limit::ConcurrencyLimitLayer;
pub use tower::{Layer, ServiceBuilder};
