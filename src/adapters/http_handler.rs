use std::{net::SocketAddr, sync::Arc};

use axum::{
    Router,
    body::Body as AxumBody,
    extract::{ConnectInfo, State},
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode, header},
    response::IntoResponse,
};
use hyper::{Request, Response};
use tracing::Instrument;

use crate::{core::RouteTable, ports::http_client::HttpClient, tracing_setup};

const NOT_FOUND_BODY: &str = "Not Found\n";
const BAD_GATEWAY_BODY: &str = "Bad Gateway\n";

/// Headers that describe one hop and must not be forwarded.
static HOP_BY_HOP_HEADERS: [HeaderName; 9] = [
    header::CONNECTION,
    HeaderName::from_static("keep-alive"),
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    HeaderName::from_static("proxy-connection"),
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

/// Routes each request by its `Host` to the backend currently installed for
/// that host.
pub struct ReverseProxyDispatcher {
    routes: Arc<RouteTable>,
    http_client: Arc<dyn HttpClient>,
}

impl ReverseProxyDispatcher {
    pub fn new(routes: Arc<RouteTable>, http_client: Arc<dyn HttpClient>) -> Self {
        Self {
            routes,
            http_client,
        }
    }

    pub fn routes(&self) -> &Arc<RouteTable> {
        &self.routes
    }

    /// Handle one inbound request.
    ///
    /// Never fails: a missing route becomes `404` and a backend failure
    /// becomes `502`.
    pub async fn dispatch(&self, req: Request<AxumBody>) -> Response<AxumBody> {
        let request_id = uuid::Uuid::new_v4().to_string();
        let host = request_host(&req).to_string();
        let span = tracing_setup::create_request_span(
            req.method().as_str(),
            req.uri().path(),
            &host,
            &request_id,
        );

        self.route(host, req).instrument(span).await
    }

    async fn route(&self, host: String, mut req: Request<AxumBody>) -> Response<AxumBody> {
        let Some(route) = self.routes.lookup(&host) else {
            tracing::warn!(host = %host, matched = false, "No route for host");
            tracing::Span::current().record("http.status_code", StatusCode::NOT_FOUND.as_u16());
            return plain_text(StatusCode::NOT_FOUND, NOT_FOUND_BODY);
        };

        tracing::info!(
            host = %host,
            matched = true,
            target = %route.target(),
            "Proxying request"
        );

        let forwarder = route.forwarder();
        let uri = match forwarder.rewrite_uri(req.uri()) {
            Ok(uri) => uri,
            Err(e) => {
                tracing::error!(host = %host, error = %e, "Failed to build backend URI");
                return plain_text(StatusCode::BAD_GATEWAY, BAD_GATEWAY_BODY);
            }
        };
        *req.uri_mut() = uri;

        let client_ip = req
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip());

        let headers = req.headers_mut();
        strip_hop_by_hop(headers);
        headers.insert(header::HOST, forwarder.host_header().clone());
        if let Some(ip) = client_ip {
            append_forwarded_for(headers, &ip.to_string());
        }

        match self.http_client.send_request(req).await {
            Ok(mut response) => {
                tracing::Span::current().record("http.status_code", response.status().as_u16());
                strip_hop_by_hop(response.headers_mut());
                response
            }
            Err(e) => {
                tracing::error!(
                    host = %host,
                    target = %route.target(),
                    error = %e,
                    "Backend request failed"
                );
                tracing::Span::current()
                    .record("http.status_code", StatusCode::BAD_GATEWAY.as_u16());
                plain_text(StatusCode::BAD_GATEWAY, BAD_GATEWAY_BODY)
            }
        }
    }
}

/// Build the proxy router: every method and path goes to the dispatcher.
pub fn router(dispatcher: Arc<ReverseProxyDispatcher>) -> Router {
    Router::new().fallback(proxy_handler).with_state(dispatcher)
}

async fn proxy_handler(
    State(dispatcher): State<Arc<ReverseProxyDispatcher>>,
    req: Request<AxumBody>,
) -> Response<AxumBody> {
    dispatcher.dispatch(req).await
}

/// Host used for routing: the `Host` header, else the request-URI authority.
fn request_host(req: &Request<AxumBody>) -> &str {
    req.headers()
        .get(header::HOST)
        .and_then(|value| value.to_str().ok())
        .or_else(|| req.uri().authority().map(|authority| authority.as_str()))
        .unwrap_or_default()
}

fn plain_text(status: StatusCode, body: &'static str) -> Response<AxumBody> {
    (
        status,
        [
            (
                header::CONTENT_TYPE,
                HeaderValue::from_static("text/plain; charset=utf-8"),
            ),
            (
                header::X_CONTENT_TYPE_OPTIONS,
                HeaderValue::from_static("nosniff"),
            ),
        ],
        body,
    )
        .into_response()
}

/// Remove hop-by-hop headers, including any named in `Connection`.
fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let listed: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect();

    for name in listed.iter().chain(HOP_BY_HOP_HEADERS.iter()) {
        headers.remove(name);
    }
}

fn append_forwarded_for(headers: &mut HeaderMap, client_ip: &str) {
    let prior: Vec<&str> = headers
        .get_all("x-forwarded-for")
        .iter()
        .filter_map(|value| value.to_str().ok())
        .collect();

    let value = if prior.is_empty() {
        client_ip.to_string()
    } else {
        format!("{}, {client_ip}", prior.join(", "))
    };

    match HeaderValue::from_str(&value) {
        Ok(value) => {
            headers.insert("x-forwarded-for", value);
        }
        Err(e) => tracing::debug!(error = %e, "Skipping unrepresentable X-Forwarded-For"),
    }
}
