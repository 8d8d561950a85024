use crate::{AppState, mime_util, routes::ErrorResponse};
use axum::{
    Json,
    body::Body,
    extract::State,
    http::{HeaderValue, Method, StatusCode, Uri, header},
    response::Response,
};
use percent_encoding::percent_decode_str;
use std::sync::Arc;
use tracing::warn;

pub const INDEX_ENDPOINT: &str = "/";

/// Directory of the asset root that is served by prefix rather than
/// file-by-file. Only plain file names below it, no nesting.
const FONTS_PREFIX: &str = "/Fonts/";

/// The fixed set of files this server will hand out. Anything not listed
/// here (and not under [`FONTS_PREFIX`]) is a 404, never a filesystem lookup.
const ASSET_ALLOWLIST: &[&str] = &[
    "/index.html",
    "/styles.css",
    "/script.js",
    "/config.js",
    "/blossompix.png",
    "/twitter button.png",
    "/Github button.png",
];

const LONG_LIVED_CACHE_CONTROL: &str = "public, max-age=86400";

type AssetResult = Result<Response, (StatusCode, Json<ErrorResponse>)>;

/// Serves the fixed entry document.
pub async fn index_handler(State(state): State<Arc<AppState>>) -> AssetResult {
    serve_file(&state, "index.html").await
}

/// Router fallback: resolves allow-listed asset paths and font files, and is
/// the 404 of last resort for everything else.
pub async fn asset_handler(
    State(state): State<Arc<AppState>>,
    method: Method,
    uri: Uri,
) -> AssetResult {
    // Browsers percent-encode the spaces in a couple of the image names.
    let Ok(path) = percent_decode_str(uri.path()).decode_utf8() else {
        return Err(not_found(uri.path()));
    };
    if method != Method::GET {
        return Err(not_found(&path));
    }

    if let Some(font_file) = path.strip_prefix(FONTS_PREFIX) {
        if font_file.is_empty() || font_file.contains(['/', '\\']) || font_file.contains("..") {
            return Err(not_found(&path));
        }
        return serve_file(&state, &format!("Fonts/{font_file}")).await;
    }

    if ASSET_ALLOWLIST.contains(&path.as_ref()) {
        return serve_file(&state, path.trim_start_matches('/')).await;
    }

    Err(not_found(&path))
}

/// Reads `relative` below the configured asset root and streams it back with
/// the Content-Type from the extension table. Re-reads on every request, no
/// caching between requests.
async fn serve_file(state: &AppState, relative: &str) -> AssetResult {
    let path = state.settings.asset_settings.root.join(relative);
    let bytes = tokio::fs::read(&path).await.map_err(|err| {
        warn!("Failed to read asset '{}': {err}", path.display());
        not_found(relative)
    })?;

    let content_type = mime_util::content_type_for_path(relative);
    let mut response = Response::new(Body::from(bytes));
    response
        .headers_mut()
        .insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
    if mime_util::is_long_lived(content_type) {
        response.headers_mut().insert(
            header::CACHE_CONTROL,
            HeaderValue::from_static(LONG_LIVED_CACHE_CONTROL),
        );
    }
    Ok(response)
}

fn not_found(path: &str) -> (StatusCode, Json<ErrorResponse>) {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorResponse {
            error: "Not found".to_owned(),
            message: Some(format!("No asset or route is registered for '{path}'.")),
        }),
    )
}
