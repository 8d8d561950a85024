use crate::{AppState, routes::ErrorResponse};
use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

pub const GENERATE_ENDPOINT: &str = "/api/generate-art";

/// Header the upstream expects the key in. It travels nowhere else, never in
/// a query string or request body.
pub const API_KEY_HEADER: &str = "x-api-key";

const ANTHROPIC_VERSION: &str = "2023-06-01";
const MODEL: &str = "claude-3-5-haiku-20241022";
const MAX_TOKENS: u32 = 4000;

/// Sentinel left behind by unconfigured deployments. Treated the same as no
/// key at all so it never reaches the upstream.
const PLACEHOLDER_API_KEY: &str = "YOUR_CLAUDE_API_KEY_HERE";

/// Instruction used when the client sends no prompt of its own.
const DEFAULT_PROMPT: &str = "Create a unique and imaginative piece of generative art.";

/// Cap on how much of an upstream error body is relayed to the client.
const MAX_UPSTREAM_DETAIL_BYTES: usize = 512;

#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    /// What to ask the model for. Falls back to a fixed instruction when
    /// absent or blank.
    pub prompt: Option<String>,

    /// Per-request key override, taking precedence over the configured one.
    #[serde(rename = "apiKey")]
    pub api_key: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct GenerateResponse {
    pub success: bool,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<serde_json::Value>,
}

/// Everything that can go wrong between accepting a generation request and
/// relaying the upstream's answer.
#[derive(Debug)]
pub enum GatewayError {
    /// No usable key on the request or in the configuration.
    MissingCredential,
    /// The upstream answered with a non-success status, propagated verbatim.
    UpstreamStatus {
        status: StatusCode,
        detail: Option<String>,
    },
    /// The upstream did not answer within the configured deadline.
    UpstreamTimeout,
    /// The upstream could not be reached at all.
    UpstreamUnreachable,
    /// The upstream reported success but its body did not have the
    /// documented shape.
    MalformedUpstreamResponse,
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let (status, error, message) = match self {
            Self::MissingCredential => (
                StatusCode::BAD_REQUEST,
                "API key not provided or invalid".to_owned(),
                None,
            ),
            Self::UpstreamStatus { status, detail } => {
                (status, format!("Claude API error: {}", status.as_u16()), detail)
            }
            Self::UpstreamTimeout => (
                StatusCode::GATEWAY_TIMEOUT,
                "Upstream request timed out".to_owned(),
                None,
            ),
            Self::UpstreamUnreachable => (
                StatusCode::BAD_GATEWAY,
                "Failed to send request to the Claude API".to_owned(),
                None,
            ),
            Self::MalformedUpstreamResponse => (
                StatusCode::BAD_GATEWAY,
                "Claude API returned a response with an unexpected shape".to_owned(),
                None,
            ),
        };
        (status, Json(ErrorResponse { error, message })).into_response()
    }
}

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: [Message<'a>; 1],
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
    usage: Option<serde_json::Value>,
}

#[derive(Deserialize)]
struct ContentBlock {
    text: Option<String>,
}

pub async fn generate_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<GenerateRequest>,
) -> Result<Json<GenerateResponse>, GatewayError> {
    let settings = &state.settings.gateway_settings;
    let api_key = resolve_api_key(request.api_key.as_deref(), settings.api_key.as_deref())
        .ok_or(GatewayError::MissingCredential)?;
    let prompt = match request.prompt.as_deref().map(str::trim) {
        Some(prompt) if !prompt.is_empty() => prompt,
        _ => DEFAULT_PROMPT,
    };
    // Only the length; the prompt itself is user content and stays out of logs.
    debug!("Dispatching generation request ({} chars)", prompt.len());

    let endpoint = settings
        .upstream_url
        .join("/v1/messages")
        .map_err(|err| {
            warn!("Upstream URL cannot address the messages endpoint: {err}");
            GatewayError::UpstreamUnreachable
        })?;
    let upstream_response = state
        .client
        .post(endpoint)
        .header(API_KEY_HEADER, api_key)
        .header("anthropic-version", ANTHROPIC_VERSION)
        .json(&MessagesRequest {
            model: MODEL,
            max_tokens: MAX_TOKENS,
            messages: [Message {
                role: "user",
                content: prompt,
            }],
        })
        .send()
        .await
        .map_err(|err| {
            if err.is_timeout() {
                warn!("Upstream request timed out");
                GatewayError::UpstreamTimeout
            } else {
                warn!("Failed to make request to upstream server: {err}");
                GatewayError::UpstreamUnreachable
            }
        })?;

    let status = upstream_response.status();
    if !status.is_success() {
        warn!("Upstream server responded with an unsuccessful status code: {status}");
        // Best-effort read; the body may be anything, including not JSON.
        let detail = upstream_response.text().await.ok();
        return Err(GatewayError::UpstreamStatus {
            status,
            detail: detail.and_then(truncate_detail),
        });
    }

    let reply: MessagesResponse = upstream_response.json().await.map_err(|err| {
        warn!("Failed to decode upstream response body: {err}");
        GatewayError::MalformedUpstreamResponse
    })?;
    let content = reply
        .content
        .into_iter()
        .next()
        .and_then(|block| block.text)
        .ok_or_else(|| {
            warn!("Upstream response carried no text content block");
            GatewayError::MalformedUpstreamResponse
        })?;

    Ok(Json(GenerateResponse {
        success: true,
        content,
        usage: reply.usage,
    }))
}

/// Key precedence: the request's own key wins, a blank one falls through to
/// the configured key, and the unconfigured-deployment sentinel counts as no
/// key at all.
fn resolve_api_key<'a>(
    from_request: Option<&'a str>,
    configured: Option<&'a str>,
) -> Option<&'a str> {
    from_request
        .map(str::trim)
        .filter(|key| !key.is_empty())
        .or_else(|| configured.map(str::trim))
        .filter(|key| !key.is_empty() && *key != PLACEHOLDER_API_KEY)
}

fn truncate_detail(mut detail: String) -> Option<String> {
    if detail.trim().is_empty() {
        return None;
    }
    if detail.len() > MAX_UPSTREAM_DETAIL_BYTES {
        let mut end = MAX_UPSTREAM_DETAIL_BYTES;
        while !detail.is_char_boundary(end) {
            end -= 1;
        }
        detail.truncate(end);
    }
    Some(detail)
}
