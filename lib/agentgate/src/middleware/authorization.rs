//! Credential attachment middleware.
//!
//! Adds the header rendered from a [`Credential`] to every outgoing request
//! that does not already carry one. Headers set by the caller win.

use std::future;
use std::task::{Context, Poll};

use tower::{Layer, Service};

use crate::{Credential, Error, HttpRequest, HttpResponse, Result, ServiceFuture};

/// Layer that attaches a credential to requests.
///
/// # Example
///
/// ```no_run
/// use agentgate::{Credential, Transport};
/// use agentgate::middleware::AuthorizationLayer;
///
/// let layer = AuthorizationLayer::new(Credential::private_token("glpat-xxxx"))
///     .expect("valid token");
/// let transport = Transport::builder().layer(layer).build().expect("transport");
/// ```
#[derive(Debug, Clone)]
pub struct AuthorizationLayer {
    credential: Credential,
}

impl AuthorizationLayer {
    /// Create a layer for `credential`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidRequest`] if the credential is not a valid
    /// header value.
    pub fn new(credential: Credential) -> Result<Self> {
        credential.header_value()?;
        Ok(Self { credential })
    }
}

impl<S> Layer<S> for AuthorizationLayer {
    type Service = Authorization<S>;

    fn layer(&self, inner: S) -> Self::Service {
        Authorization {
            inner,
            credential: self.credential.clone(),
        }
    }
}

/// Service that attaches a credential to requests.
#[derive(Debug, Clone)]
pub struct Authorization<S> {
    inner: S,
    credential: Credential,
}

impl<S> Service<HttpRequest> for Authorization<S>
where
    S: Service<HttpRequest, Response = HttpResponse, Error = Error> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = HttpResponse;
    type Error = Error;
    type Future = ServiceFuture;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<()>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut request: HttpRequest) -> Self::Future {
        if let Err(err) = self.credential.apply_to(request.headers_mut()) {
            return Box::pin(future::ready(Err(err)));
        }

        // The ready service is the one polled above; keep the fresh clone.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        Box::pin(async move { inner.call(request).await })
    }
}
