use anyhow::Result;
use reqwest::redirect::Policy;
use std::time::Duration;

pub type HttpClient = reqwest::Client;

pub struct BuildHttpClientArgs {
    pub request_timeout: Duration,
}

/// Create a new [`HttpClient`] with the given arguments.
pub fn build_http_client(args: BuildHttpClientArgs) -> Result<HttpClient> {
    Ok(reqwest::ClientBuilder::default()
        // The messages API never redirects; a redirect would mean the key is
        // about to be sent somewhere it should not go.
        .redirect(Policy::none())
        .user_agent(concat!(
            env!("CARGO_PKG_NAME"),
            "/",
            env!("CARGO_PKG_VERSION")
        ))
        .connect_timeout(Duration::from_secs(5))
        .timeout(args.request_timeout)
        .build()?)
}
