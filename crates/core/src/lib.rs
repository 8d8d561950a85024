//! Core library for the CanvAI backend, a static asset edge server and Claude API gateway.

#[cfg(feature = "rustls-tls")]
#[cfg(feature = "native-tls")]
compile_error!("You can only enable one TLS backend");

pub extern crate url;

mod http_client;
mod middleware;
mod mime_util;
mod routes;

use anyhow::Result;
use axum::{
    Router,
    http::StatusCode,
    middleware as axum_middleware,
    routing::{get, post},
};
use core::{net::SocketAddr, time::Duration};
use http_client::{BuildHttpClientArgs, HttpClient, build_http_client};
use routes::{GENERATE_ENDPOINT, HEALTH_ENDPOINT, INDEX_ENDPOINT};
use std::{fmt, path::PathBuf, sync::Arc};
use tokio::{net::TcpListener, signal};
use tower_http::{
    catch_panic::CatchPanicLayer,
    normalize_path::NormalizePathLayer,
    timeout::TimeoutLayer,
    trace::{self, TraceLayer},
};
use tracing::{Level, info};
use url::Url;

/// Base URL of the Claude API used when no override is configured.
pub const DEFAULT_UPSTREAM_URL: &str = "https://api.anthropic.com";

/// The CanvAI backend server.
///
/// Constructed from a [`Settings`] value and either started standalone via
/// [`Server::start`] or handed to a platform host as a plain router via
/// [`Server::into_router`].
#[derive(Debug)]
pub struct Server {
    router_inner: Router,
}

/// Settings to run the server with.
#[derive(Debug, Clone)]
pub struct Settings {
    /// How long to allow an incoming request to be processed before it is
    /// abandoned and an error is sent to the client.
    pub request_timeout: Duration,

    /// See [`AssetSettings`].
    pub asset_settings: AssetSettings,

    /// See [`GatewaySettings`].
    pub gateway_settings: GatewaySettings,
}

/// Configuration options used by the static asset routes.
#[derive(Debug, Clone)]
pub struct AssetSettings {
    /// Directory that all servable assets are resolved relative to.
    pub root: PathBuf,
}

/// Configuration options used by the generation gateway route.
#[derive(Clone)]
pub struct GatewaySettings {
    /// API key used for upstream calls when the client does not supply one
    /// of its own. Requests carrying their own key take precedence.
    pub api_key: Option<String>,

    /// Base URL of the upstream Claude API.
    pub upstream_url: Url,

    /// How long to wait for the upstream to answer before the call is
    /// abandoned and considered failed.
    pub request_timeout: Duration,
}

// The key must never end up in logs via a stray {:?}.
impl fmt::Debug for GatewaySettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GatewaySettings")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("upstream_url", &self.upstream_url)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(60),
            asset_settings: AssetSettings::default(),
            gateway_settings: GatewaySettings::default(),
        }
    }
}

impl Default for AssetSettings {
    fn default() -> Self {
        Self {
            root: PathBuf::from("assets"),
        }
    }
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            api_key: None,
            upstream_url: Url::parse(DEFAULT_UPSTREAM_URL)
                .expect("default upstream URL should be valid"),
            request_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug)]
struct AppState {
    client: HttpClient,
    settings: Settings,
}

impl Server {
    /// Create a new server with the provided settings.
    pub fn new(settings: Settings) -> Result<Self> {
        let router = Router::new()
            .route(INDEX_ENDPOINT, get(routes::index_handler))
            .route(HEALTH_ENDPOINT, get(routes::health_handler))
            .route(GENERATE_ENDPOINT, post(routes::generate_handler))
            .fallback(routes::asset_handler)
            .layer(
                TraceLayer::new_for_http()
                    .make_span_with(trace::DefaultMakeSpan::new().level(Level::INFO))
                    .on_response(trace::DefaultOnResponse::new().level(Level::INFO)),
            )
            .layer(TimeoutLayer::with_status_code(
                StatusCode::REQUEST_TIMEOUT,
                settings.request_timeout,
            ))
            .layer(NormalizePathLayer::trim_trailing_slash())
            .layer(CatchPanicLayer::new())
            .layer(middleware::cors_layer())
            .layer(axum_middleware::from_fn(middleware::header_middleware))
            .with_state(Arc::new(AppState {
                client: build_http_client(BuildHttpClientArgs {
                    request_timeout: settings.gateway_settings.request_timeout,
                })?,
                settings,
            }));

        Ok(Self {
            router_inner: router,
        })
    }

    /// Consume the server and return its router so a platform host can mount
    /// the request handler itself without a listening socket being opened.
    pub fn into_router(self) -> Router {
        self.router_inner
    }

    /// Start the server and expose it locally on the provided [`SocketAddr`].
    pub async fn start(self, address: &SocketAddr) -> Result<()> {
        let tcp_listener = TcpListener::bind(&address).await?;
        info!("Listening on http://{}", tcp_listener.local_addr()?);
        axum::serve(tcp_listener, self.router_inner)
            .with_graceful_shutdown(Self::shutdown_signal())
            .await?;
        Ok(())
    }

    // https://github.com/tokio-rs/axum/blob/15917c6dbcb4a48707a20e9cfd021992a279a662/examples/graceful-shutdown/src/main.rs#L55
    async fn shutdown_signal() {
        let ctrl_c = async {
            signal::ctrl_c()
                .await
                .expect("failed to install Ctrl+C handler");
        };

        #[cfg(unix)]
        let terminate = async {
            signal::unix::signal(signal::unix::SignalKind::terminate())
                .expect("failed to install signal handler")
                .recv()
                .await;
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {},
            _ = terminate => {},
        }
    }
}
