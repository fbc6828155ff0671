//! Identity loading for inbound requests.
//!
//! A [`LoaderChain`] asks each [`IdentityLoader`] in turn to recognise the
//! caller of an inbound request and stops at the first one that does. Token
//! validation itself is delegated to a [`TokenVerifier`].
//!
//! ```
//! use agentgate_core::identity::{Identity, LoaderChain, TokenVerifier, VerifyError};
//!
//! struct Static;
//!
//! impl TokenVerifier for Static {
//!     fn verify(&self, token: &str) -> Result<serde_json::Value, VerifyError> {
//!         match token {
//!             "good" => Ok(serde_json::json!({"id": 1, "username": "admin"})),
//!             _ => Err(VerifyError::new("unknown token")),
//!         }
//!     }
//! }
//!
//! let chain = LoaderChain::with_defaults(Static);
//! let (mut parts, ()) = http::Request::get("/v1/clusters?token=good")
//!     .body(())
//!     .expect("request")
//!     .into_parts();
//!
//! let identity = chain.authenticate(&mut parts).expect("authenticated");
//! assert_eq!(identity.map(|i| i.username), Some("admin".to_string()));
//! assert_eq!(parts.uri.query(), None);
//! ```

use std::fmt;
use std::sync::Arc;

use base64::Engine;
use derive_more::{Display, Error};
use http::{Uri, header::AUTHORIZATION, request::Parts, uri::PathAndQuery};
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::credential::PRIVATE_TOKEN_HEADER;

/// Query parameter accepted as a bearer token when no header is present.
pub const TOKEN_QUERY_PARAM: &str = "token";

/// Identity of an authenticated caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Identity {
    /// Numeric user id.
    #[serde(default)]
    pub id: u64,
    /// User name.
    pub username: String,
    /// E-mail address.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Any other claims.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Rejected token.
#[derive(Debug, Display, Error)]
#[display("token rejected: {reason}")]
pub struct VerifyError {
    #[error(not(source))]
    reason: String,
}

impl VerifyError {
    /// Create a verification error.
    #[must_use]
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// No loader recognised the caller.
#[derive(Debug, Display, Error, Clone, Copy, PartialEq, Eq)]
#[display("unauthorized")]
pub struct Unauthenticated;

/// Validates a bearer token and returns its claims payload.
pub trait TokenVerifier: Send + Sync + 'static {
    /// Verify `token`, returning the claims it carries.
    fn verify(&self, token: &str) -> Result<serde_json::Value, VerifyError>;
}

/// Recognises the caller of an inbound request.
pub trait IdentityLoader: Send + Sync + 'static {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// The caller's identity, or `None` if this loader does not recognise it.
    ///
    /// Loaders may rewrite `parts`, e.g. to strip a token from the query.
    fn load(&self, parts: &mut Parts) -> Option<Identity>;
}

/// Split `Authorization: <scheme> <token>`.
///
/// Without an `Authorization` header, a non-empty `token` query parameter is
/// taken as a bearer token and removed from the request URI. Headers that do
/// not have exactly two space-separated fields yield `None`.
pub fn parse_authorization(parts: &mut Parts) -> Option<(String, String)> {
    let Some(header) = parts.headers.get(AUTHORIZATION) else {
        let token = take_query_token(parts)?;
        return Some(("Bearer".to_string(), token));
    };

    let header = header.to_str().ok()?;
    let mut fields = header.split(' ');
    match (fields.next(), fields.next(), fields.next()) {
        (Some(scheme), Some(token), None) => Some((scheme.to_string(), token.to_string())),
        _ => None,
    }
}

fn take_query_token(parts: &mut Parts) -> Option<String> {
    let query = parts.uri.query()?;
    let token = url::form_urlencoded::parse(query.as_bytes())
        .find(|(key, _)| key == TOKEN_QUERY_PARAM)
        .map(|(_, value)| value.into_owned())
        .filter(|token| !token.is_empty())?;

    let rest = url::form_urlencoded::parse(query.as_bytes())
        .filter(|(key, _)| key != TOKEN_QUERY_PARAM);
    let kept: String = url::form_urlencoded::Serializer::new(String::new())
        .extend_pairs(rest)
        .finish();
    let path = parts.uri.path();
    let path_and_query = if kept.is_empty() {
        path.to_string()
    } else {
        format!("{path}?{kept}")
    };

    let mut uri_parts = parts.uri.clone().into_parts();
    match PathAndQuery::try_from(path_and_query) {
        Ok(path_and_query) => {
            uri_parts.path_and_query = Some(path_and_query);
            if let Ok(uri) = Uri::from_parts(uri_parts) {
                parts.uri = uri;
            }
        }
        Err(err) => debug!(error = %err, "could not strip token from query"),
    }

    Some(token)
}

/// Loads identities from bearer tokens.
#[derive(Clone)]
pub struct BearerTokenLoader {
    verifier: Arc<dyn TokenVerifier>,
}

impl BearerTokenLoader {
    /// Create a loader backed by `verifier`.
    pub fn new(verifier: impl TokenVerifier) -> Self {
        Self {
            verifier: Arc::new(verifier),
        }
    }
}

impl fmt::Debug for BearerTokenLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BearerTokenLoader").finish_non_exhaustive()
    }
}

impl IdentityLoader for BearerTokenLoader {
    fn name(&self) -> &'static str {
        "bearer"
    }

    fn load(&self, parts: &mut Parts) -> Option<Identity> {
        let (scheme, token) = parse_authorization(parts)?;
        if !scheme.eq_ignore_ascii_case("bearer") {
            return None;
        }

        let claims = match self.verifier.verify(&token) {
            Ok(claims) => claims,
            Err(err) => {
                error!(error = %err, "parse bearer token");
                return None;
            }
        };

        match serde_json::from_value::<Identity>(claims) {
            Ok(identity) => Some(identity),
            Err(err) => {
                error!(error = %err, "failed to load identity from token claims");
                None
            }
        }
    }
}

/// Reads `PRIVATE-TOKEN`. Private tokens are not resolvable yet, so this
/// loader never yields an identity.
#[derive(Debug, Clone, Copy, Default)]
pub struct PrivateTokenLoader;

impl IdentityLoader for PrivateTokenLoader {
    fn name(&self) -> &'static str {
        "private-token"
    }

    fn load(&self, parts: &mut Parts) -> Option<Identity> {
        let present = parts
            .headers
            .get(PRIVATE_TOKEN_HEADER)
            .is_some_and(|v| !v.is_empty());
        debug!(present, "private token lookup is not supported");
        None
    }
}

/// Reads `Authorization: Basic`. Password checks are not wired in, so this
/// loader never yields an identity.
#[derive(Debug, Clone, Copy, Default)]
pub struct BasicAuthLoader;

impl IdentityLoader for BasicAuthLoader {
    fn name(&self) -> &'static str {
        "basic"
    }

    fn load(&self, parts: &mut Parts) -> Option<Identity> {
        let (scheme, token) = parse_authorization(parts)?;
        if !scheme.eq_ignore_ascii_case("basic") {
            return None;
        }

        let decoded = match base64::engine::general_purpose::STANDARD.decode(token) {
            Ok(decoded) => decoded,
            Err(err) => {
                error!(error = %err, "parse basic credentials");
                return None;
            }
        };
        let well_formed = decoded.contains(&b':');
        debug!(well_formed, "basic credential lookup is not supported");
        None
    }
}

/// Ordered list of identity loaders; the first identity found wins.
#[derive(Default)]
pub struct LoaderChain {
    loaders: Vec<Box<dyn IdentityLoader>>,
}

impl LoaderChain {
    /// Empty chain: every request is let through without an identity.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Bearer tokens first, then private tokens.
    #[must_use]
    pub fn with_defaults(verifier: impl TokenVerifier) -> Self {
        Self::new()
            .with(BearerTokenLoader::new(verifier))
            .with(PrivateTokenLoader)
    }

    /// Append a loader at the end of the chain.
    #[must_use]
    pub fn with(mut self, loader: impl IdentityLoader) -> Self {
        self.loaders.push(Box::new(loader));
        self
    }

    /// Number of loaders.
    #[must_use]
    pub fn len(&self) -> usize {
        self.loaders.len()
    }

    /// Returns `true` if the chain has no loaders.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.loaders.is_empty()
    }

    /// Try each loader in order; stop at the first identity.
    pub fn load(&self, parts: &mut Parts) -> Option<Identity> {
        self.loaders.iter().find_map(|loader| {
            let identity = loader.load(parts);
            if identity.is_some() {
                debug!(loader = loader.name(), "identity loaded");
            }
            identity
        })
    }

    /// Authenticate an inbound request.
    ///
    /// An empty chain authenticates nobody and rejects nobody (`Ok(None)`).
    ///
    /// # Errors
    ///
    /// Returns [`Unauthenticated`] when the chain has loaders and none of them
    /// recognised the caller.
    pub fn authenticate(&self, parts: &mut Parts) -> Result<Option<Identity>, Unauthenticated> {
        if self.is_empty() {
            return Ok(None);
        }
        self.load(parts).map(Some).ok_or(Unauthenticated)
    }
}

impl fmt::Debug for LoaderChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<_> = self.loaders.iter().map(|l| l.name()).collect();
        f.debug_struct("LoaderChain").field("loaders", &names).finish()
    }
}
