//! Reverse proxy server.

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use axum::body::Body;
use axum::extract::{Request, State};
use axum::response::Response;
use axum::Router;
use aws_credential_types::provider::SharedCredentialsProvider;
use http::header::{HeaderMap, HeaderName, HeaderValue};
use http::StatusCode;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use url::Url;

use xrelay_backend::sign_request;

/// Headers that must not travel through a proxy hop. `Connection` is
/// stripped *before* signing so the signature never covers a header the
/// transport would drop.
const HOP_BY_HOP_HEADERS: &[&str] = &[
    "connection",
    "proxy-connection",
    "keep-alive",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Proxy server configuration.
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    /// Local TCP bind address.
    pub tcp_address: String,

    /// Upstream service endpoint requests are rewritten to.
    pub endpoint: Url,

    /// Signing region.
    pub region: String,

    /// Idle upstream connections are dropped after this long.
    pub idle_conn_timeout: Duration,

    /// Idle upstream connections retained per host.
    pub max_idle_conns_per_host: usize,

    /// Skip TLS certificate verification towards the upstream.
    pub no_verify_ssl: bool,

    /// Outbound HTTP proxy for upstream calls.
    pub proxy_address: Option<String>,
}

/// Proxy server errors.
#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    /// The bind address did not resolve or could not be bound.
    #[error("failed to bind proxy server on {address}: {source}")]
    Bind {
        /// Bind address.
        address: String,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// Building the upstream HTTP client failed.
    #[error("failed to build upstream client: {0}")]
    Client(#[from] reqwest::Error),

    /// The server loop failed.
    #[error("proxy server error: {0}")]
    Serve(#[source] std::io::Error),
}

struct ProxyState {
    config: ProxyConfig,
    credentials: SharedCredentialsProvider,
    http: reqwest::Client,
}

/// Signing reverse proxy, bound and ready to serve.
pub struct ProxyServer {
    listener: TcpListener,
    state: Arc<ProxyState>,
}

impl ProxyServer {
    /// Bind the listener and build the upstream client.
    pub async fn bind(
        config: ProxyConfig,
        credentials: SharedCredentialsProvider,
    ) -> Result<Self, ProxyError> {
        let mut builder = reqwest::Client::builder()
            .pool_idle_timeout(config.idle_conn_timeout)
            .pool_max_idle_per_host(config.max_idle_conns_per_host)
            .danger_accept_invalid_certs(config.no_verify_ssl);
        if let Some(proxy) = config.proxy_address.as_deref() {
            builder = builder.proxy(reqwest::Proxy::all(proxy)?);
        }
        let http = builder.build()?;

        let listener = TcpListener::bind(&config.tcp_address)
            .await
            .map_err(|e| ProxyError::Bind {
                address: config.tcp_address.clone(),
                source: e,
            })?;

        tracing::info!(
            address = %config.tcp_address,
            endpoint = %config.endpoint,
            "proxy server using service endpoint"
        );

        Ok(Self {
            listener,
            state: Arc::new(ProxyState {
                config,
                credentials,
                http,
            }),
        })
    }

    /// The address the listener actually bound (useful with port 0).
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.listener.local_addr()
    }

    /// Serve until cancelled.
    pub async fn serve(self, cancel: CancellationToken) -> Result<(), ProxyError> {
        let app = Router::new()
            .fallback(forward)
            .with_state(Arc::clone(&self.state));

        axum::serve(self.listener, app)
            .with_graceful_shutdown(cancel.cancelled_owned())
            .await
            .map_err(ProxyError::Serve)
    }
}

/// Handle one client request end to end.
async fn forward(State(state): State<Arc<ProxyState>>, request: Request) -> Response {
    let (parts, body) = request.into_parts();
    tracing::debug!(method = %parts.method, uri = %parts.uri, "received request on proxy server");

    // Buffer the whole body; the signature needs its hash.
    let body = match axum::body::to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::error!(error = %e, "unable to consume request body");
            return status_response(StatusCode::BAD_GATEWAY, "failed to read request body");
        }
    };

    // Re-address to the service endpoint, keeping path and query.
    let mut target = state.config.endpoint.clone();
    target.set_path(parts.uri.path());
    target.set_query(parts.uri.query());

    let mut headers = parts.headers.clone();
    strip_hop_by_hop(&mut headers);
    headers.remove(http::header::HOST);

    // Sign; on failure forward unsigned and let the upstream reject it.
    let host_header = host_header_value(&target);
    let body_hash = xrelay_backend::payload_hash(&body);
    match sign_request(
        parts.method.as_str(),
        target.as_str(),
        &[("host".to_string(), host_header)],
        &body_hash,
        &state.config.region,
        &state.credentials,
        SystemTime::now(),
    )
    .await
    {
        Ok(signed) => {
            for (name, value) in signed {
                let Ok(name) = HeaderName::try_from(name.as_str()) else {
                    continue;
                };
                let Ok(value) = HeaderValue::try_from(value.as_str()) else {
                    continue;
                };
                headers.insert(name, value);
            }
        }
        Err(e) => {
            tracing::error!(error = %e, "unable to sign request, forwarding unsigned");
        }
    }

    let upstream = state
        .http
        .request(parts.method.clone(), target)
        .headers(headers)
        .body(body.to_vec())
        .send()
        .await;

    match upstream {
        Ok(response) => relay_response(response).await,
        Err(e) => {
            tracing::error!(error = %e, "upstream request failed");
            status_response(StatusCode::BAD_GATEWAY, "upstream request failed")
        }
    }
}

/// Convert the upstream reply into a client response, minus hop-by-hop
/// headers.
async fn relay_response(response: reqwest::Response) -> Response {
    let status = response.status();
    let mut headers = response.headers().clone();
    strip_hop_by_hop(&mut headers);

    let body = match response.bytes().await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::error!(error = %e, "unable to read upstream response body");
            return status_response(StatusCode::BAD_GATEWAY, "failed to read upstream response");
        }
    };

    let mut reply = Response::builder().status(status);
    if let Some(reply_headers) = reply.headers_mut() {
        *reply_headers = headers;
    }
    reply
        .body(Body::from(body))
        .unwrap_or_else(|_| status_response(StatusCode::BAD_GATEWAY, "failed to build response"))
}

fn strip_hop_by_hop(headers: &mut HeaderMap) {
    for name in HOP_BY_HOP_HEADERS {
        headers.remove(*name);
    }
}

fn host_header_value(url: &Url) -> String {
    let host = url.host_str().unwrap_or_default();
    match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    }
}

fn status_response(status: StatusCode, message: &str) -> Response {
    Response::builder()
        .status(status)
        .body(Body::from(message.to_string()))
        .unwrap_or_default()
}

#[cfg(test)]
#[path = "server_test.rs"]
mod server_test;
