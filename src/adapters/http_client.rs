use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body as AxumBody;
use eyre::Result;
use hyper::{Request, Response, Version, header};
use hyper_rustls::HttpsConnector;
use hyper_util::{
    client::legacy::{Client, connect::HttpConnector},
    rt::TokioExecutor,
};
use rustls_native_certs::load_native_certs;
use tokio::time::timeout;
use tracing::Instrument;

use crate::ports::http_client::{HttpClient, HttpClientError, HttpClientResult};

/// Forwarding client built on Hyper with Rustls.
///
/// * Connects to `http` and `https` targets, trusting the platform roots
/// * Forces request version to HTTP/1.1 while allowing ALPN to negotiate h2
/// * Bounds every exchange by a response timeout
/// * Streams bodies both ways without buffering
///
/// Failed exchanges are never retried.
pub struct HttpClientAdapter {
    client: Client<HttpsConnector<HttpConnector>, AxumBody>,
    forward_timeout: Duration,
}

impl HttpClientAdapter {
    /// Create a client whose exchanges give up after `forward_timeout`.
    pub fn new(forward_timeout: Duration) -> Result<Self> {
        // Install default crypto provider for rustls if not already set
        let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();

        let mut http_connector = HttpConnector::new();
        http_connector.enforce_http(false); // Allow HTTPS URLs
        http_connector.set_connect_timeout(Some(forward_timeout));

        let mut root_cert_store = rustls::RootCertStore::empty();
        let native_certs = load_native_certs();

        if !native_certs.certs.is_empty() {
            for cert in native_certs.certs {
                if root_cert_store.add(cert).is_err() {
                    tracing::warn!("Failed to add native certificate to rustls RootCertStore");
                }
            }
            tracing::debug!("Loaded {} native root certificates.", root_cert_store.len());
        }

        if !native_certs.errors.is_empty() {
            tracing::warn!(
                "Some native certificates failed to load: {:?}",
                native_certs.errors
            );
        }

        let tls_config = rustls::ClientConfig::builder()
            .with_root_certificates(root_cert_store)
            .with_no_client_auth();

        let https_connector = hyper_rustls::HttpsConnectorBuilder::new()
            .with_tls_config(tls_config)
            .https_or_http()
            .enable_http1()
            .wrap_connector(http_connector);

        let client = Client::builder(TokioExecutor::new()).build::<_, AxumBody>(https_connector);

        tracing::debug!(?forward_timeout, "Created forwarding HTTP client");
        Ok(Self {
            client,
            forward_timeout,
        })
    }

    pub fn forward_timeout(&self) -> Duration {
        self.forward_timeout
    }
}

#[async_trait]
impl HttpClient for HttpClientAdapter {
    async fn send_request(&self, req: Request<AxumBody>) -> HttpClientResult<Response<AxumBody>> {
        let Some(authority) = req.uri().authority().cloned() else {
            tracing::error!("Outgoing URI has no host: {}", req.uri());
            return Err(HttpClientError::InvalidRequest(
                "Outgoing URI has no host".to_string(),
            ));
        };

        let backend_identifier = format!(
            "{}://{}",
            req.uri().scheme_str().unwrap_or("http"),
            authority
        );
        let span = tracing::info_span!(
            "backend_request",
            backend.url = %backend_identifier,
            http.method = %req.method(),
            http.path = %req.uri().path(),
            http.status_code = tracing::field::Empty,
        );

        let (mut parts, body) = req.into_parts();
        parts.version = Version::HTTP_11;
        let method = parts.method.clone();
        let uri = parts.uri.clone();
        let outgoing_request = Request::from_parts(parts, body);

        let exchange = async {
            tracing::debug!("Sending request: {} {}", method, uri);

            match timeout(self.forward_timeout, self.client.request(outgoing_request)).await {
                Ok(Ok(response)) => {
                    tracing::Span::current().record("http.status_code", response.status().as_u16());

                    let (mut parts, incoming) = response.into_parts();
                    // Hyper re-frames the streamed body on the way out.
                    parts.headers.remove(header::TRANSFER_ENCODING);

                    Ok(Response::from_parts(parts, AxumBody::new(incoming)))
                }
                Ok(Err(e)) => {
                    tracing::Span::current().record("http.status_code", 599u16);
                    Err(HttpClientError::ConnectionError(format!(
                        "Request to {method} {uri} failed: {e}"
                    )))
                }
                Err(_) => {
                    tracing::Span::current().record("http.status_code", 599u16);
                    Err(HttpClientError::Timeout(self.forward_timeout))
                }
            }
        };

        exchange.instrument(span).await
    }
}
