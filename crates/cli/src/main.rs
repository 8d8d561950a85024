use anyhow::Result;
use canvai::{AssetSettings, DEFAULT_UPSTREAM_URL, GatewaySettings, Server, Settings, url::Url};
use clap::Parser;
use dotenvy::dotenv;
use std::{net::SocketAddr, path::PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about)]
struct Arguments {
    /// Internet socket address that the server should be ran on.
    #[arg(
        long = "address",
        env = "CANVAI_ADDRESS",
        default_value = "127.0.0.1:3001"
    )]
    address: SocketAddr,

    /// Maximum waiting time before incoming requests are aborted.
    #[arg(
        long = "request-timeout",
        env = "CANVAI_REQUEST_TIMEOUT",
        default_value = "60s"
    )]
    request_timeout: humantime::Duration,

    /// API key used for upstream calls whenever the client does not supply
    /// its own with the request.
    #[arg(long = "api-key", env = "CLAUDE_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Base URL of the Claude API that generation requests are forwarded to.
    #[arg(
        long = "upstream-url",
        env = "CANVAI_UPSTREAM_URL",
        default_value = DEFAULT_UPSTREAM_URL
    )]
    upstream_url: Url,

    /// Maximum waiting time before requests to the upstream are aborted.
    #[arg(
        long = "upstream-request-timeout",
        env = "CANVAI_UPSTREAM_REQUEST_TIMEOUT",
        default_value = "30s"
    )]
    upstream_request_timeout: humantime::Duration,

    /// Directory containing the static assets served by this server.
    #[arg(long = "asset-root", env = "CANVAI_ASSET_ROOT", default_value = "assets")]
    asset_root: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or(EnvFilter::new("info")))
        .init();
    let args = Arguments::parse();

    Server::new(Settings {
        request_timeout: *args.request_timeout,
        asset_settings: AssetSettings {
            root: args.asset_root,
        },
        gateway_settings: GatewaySettings {
            api_key: args.api_key,
            upstream_url: args.upstream_url,
            request_timeout: *args.upstream_request_timeout,
        },
    })?
    .start(&args.address)
    .await
}
