//! Prelude module for convenient imports.
//!
//! ```
//! use agentgate::prelude::*;
//! ```

pub use crate::{
    AgentClient, Body, CallContext, ClientConfig, Credential, Envelope, Error, ErrorKind,
    IncomingResponseExt, Method, Params, PeerAddress, RawResponse, Request, RequestBuilder,
    Result, StatusCode, StreamHandle, Transport,
};
pub use serde::{Deserialize, Serialize};
