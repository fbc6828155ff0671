//! Core types for agentgate, the client side of a control plane talking to
//! remote cluster agents.
//!
//! This crate holds everything that does not need an async runtime:
//! - [`PeerAddress`] and [`endpoint`] resolution
//! - [`Request`], [`RequestBuilder`], [`Body`] and [`Params`] - call descriptors
//! - [`RawResponse`] and [`Handshake`] - unclassified responses
//! - [`Error`], [`ErrorKind`] and [`Result`] - error handling
//! - [`Credential`] - outgoing credentials
//! - [`identity`] - inbound identity loading
//! - [`StatusCode`], [`Method`] and [`header`] - re-exported from the `http` crate

mod body;
mod credential;
pub mod endpoint;
mod envelope;
mod error;
pub mod identity;
mod params;
mod peer;
pub mod prelude;
mod request;
mod response;

pub use body::{Body, ByteStream, ContentType, Payload, from_json, to_json, to_query_string};
pub use credential::{Credential, PRIVATE_TOKEN_HEADER};
pub use envelope::Envelope;
pub use error::{Error, ErrorKind, Result, TransportKind};
pub use params::Params;
pub use peer::{PeerAddress, Scheme};
pub use request::{Request, RequestBuilder};
pub use response::{Handshake, RawResponse};

// Re-export http crate types for methods, status codes and headers
pub use http::{Method, StatusCode, header};
