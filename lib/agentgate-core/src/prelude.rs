//! Prelude module for convenient imports.
//!
//! ```
//! use agentgate_core::prelude::*;
//!
//! let request = Request::get("/v1/healthz").build();
//! assert_eq!(request.method(), Method::GET);
//! ```

pub use crate::{
    Body, Credential, Envelope, Error, ErrorKind, Handshake, Method, Params, PeerAddress,
    RawResponse, Request, RequestBuilder, Result, Scheme, TransportKind, from_json, to_json,
};
