//! Credentials attached to outgoing calls.

use std::fmt;

use base64::Engine;
use http::{HeaderMap, HeaderName, HeaderValue, header::AUTHORIZATION};

use crate::{Error, Params, Result};

/// Header carrying a private access token.
pub const PRIVATE_TOKEN_HEADER: &str = "PRIVATE-TOKEN";

/// A credential rendered into one request header.
///
/// The transport treats the resulting header as opaque: a credential never
/// overrides a header of the same name the caller already set.
#[derive(Clone, PartialEq, Eq)]
pub enum Credential {
    /// `Authorization: Bearer <token>`.
    Bearer(String),
    /// `Authorization: Basic <base64(username:password)>`.
    Basic {
        /// User name.
        username: String,
        /// Password.
        password: String,
    },
    /// `PRIVATE-TOKEN: <token>`.
    PrivateToken(String),
}

impl Credential {
    /// Bearer token credential.
    #[must_use]
    pub fn bearer(token: impl Into<String>) -> Self {
        Self::Bearer(token.into())
    }

    /// Basic credential.
    #[must_use]
    pub fn basic(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self::Basic {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Private token credential.
    #[must_use]
    pub fn private_token(token: impl Into<String>) -> Self {
        Self::PrivateToken(token.into())
    }

    /// Name of the header this credential is sent in.
    #[must_use]
    pub fn header_name(&self) -> HeaderName {
        match self {
            Self::Bearer(_) | Self::Basic { .. } => AUTHORIZATION,
            Self::PrivateToken(_) => HeaderName::from_static("private-token"),
        }
    }

    /// Header value, marked sensitive so it is redacted from `Debug` output.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidRequest`] if the token holds characters that
    /// cannot appear in a header.
    pub fn header_value(&self) -> Result<HeaderValue> {
        let rendered = match self {
            Self::Bearer(token) => format!("Bearer {token}"),
            Self::Basic { username, password } => {
                let encoded =
                    base64::engine::general_purpose::STANDARD.encode(format!("{username}:{password}"));
                format!("Basic {encoded}")
            }
            Self::PrivateToken(token) => token.clone(),
        };
        let mut value = HeaderValue::from_str(&rendered)
            .map_err(|_| Error::invalid_request("credential is not a valid header value"))?;
        value.set_sensitive(true);
        Ok(value)
    }

    /// Add the credential to descriptor headers unless the caller set one.
    ///
    /// Returns `true` if the header was added.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidRequest`] for tokens that are not valid header values.
    pub fn apply(&self, headers: &mut Params) -> Result<bool> {
        let name = self.header_name();
        if headers.contains_key_ignore_case(name.as_str()) {
            return Ok(false);
        }
        let value = self.header_value()?;
        let value = value
            .to_str()
            .map_err(|_| Error::invalid_request("credential is not a valid header value"))?;
        headers.append(name.as_str(), value);
        Ok(true)
    }

    /// Add the credential to a header map unless the caller set one.
    ///
    /// Returns `true` if the header was added.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidRequest`] for tokens that are not valid header values.
    pub fn apply_to(&self, headers: &mut HeaderMap) -> Result<bool> {
        let name = self.header_name();
        if headers.contains_key(&name) {
            return Ok(false);
        }
        headers.insert(name, self.header_value()?);
        Ok(true)
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bearer(_) => f.write_str("Bearer(<redacted>)"),
            Self::Basic { username, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .finish_non_exhaustive(),
            Self::PrivateToken(_) => f.write_str("PrivateToken(<redacted>)"),
        }
    }
}
