use std::{ffi::OsStr, path::Path};

/// Content-Type for a served asset, derived from its file extension.
///
/// Unknown extensions fall back to a generic octet-stream type rather than
/// letting the client guess.
pub fn content_type_for_path(path: &str) -> &'static str {
    let extension = Path::new(path)
        .extension()
        .and_then(OsStr::to_str)
        .map(str::to_ascii_lowercase);
    match extension.as_deref() {
        Some("html" | "htm") => "text/html; charset=utf-8",
        Some("css") => "text/css",
        Some("js") => "application/javascript",
        Some("png") => "image/png",
        Some("woff") => "font/woff",
        Some("woff2") => "font/woff2",
        Some("ttf") => "font/ttf",
        Some("eot") => "application/vnd.ms-fontobject",
        _ => "application/octet-stream",
    }
}

/// Whether an asset with this Content-Type is safe to let browsers hold on
/// to for a while. Fonts and images never change without changing name.
pub fn is_long_lived(content_type: &str) -> bool {
    content_type.starts_with("font/")
        || content_type.starts_with("image/")
        || content_type == "application/vnd.ms-fontobject"
}
