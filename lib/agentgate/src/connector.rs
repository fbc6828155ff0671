//! TLS setup and the HTTPS connector.

use std::sync::Arc;

use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use hyper_util::client::legacy::connect::HttpConnector;

use crate::{ClientConfig, Error, Result, TransportKind};

/// Build the rustls configuration shared by HTTP calls and stream upgrades.
///
/// Trusts the Mozilla root certificates. No ALPN protocols are set here:
/// the HTTPS connector adds its own, and upgrades must stay on HTTP/1.1.
pub fn tls_config() -> Result<Arc<rustls::ClientConfig>> {
    let root_store: rustls::RootCertStore =
        webpki_roots::TLS_SERVER_ROOTS.iter().cloned().collect();

    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let tls_config = rustls::ClientConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .map_err(|e| Error::transport(TransportKind::Tls, e.to_string()))?
        .with_root_certificates(root_store)
        .with_no_client_auth();

    Ok(Arc::new(tls_config))
}

/// Create an HTTPS connector over `tls`.
///
/// Supports HTTP/1.1 and HTTP/2 and plain `http` peers. The TCP connect is
/// bounded by [`ClientConfig::connect_timeout`].
#[must_use]
pub fn https_connector(
    config: &ClientConfig,
    tls: &rustls::ClientConfig,
) -> HttpsConnector<HttpConnector> {
    let mut http = HttpConnector::new();
    http.enforce_http(false);
    http.set_connect_timeout(Some(config.connect_timeout));

    HttpsConnectorBuilder::new()
        .with_tls_config(tls.clone())
        .https_or_http()
        .enable_http1()
        .enable_http2()
        .wrap_connector(http)
}
