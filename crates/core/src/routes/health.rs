use axum::Json;
use serde::Serialize;
use std::time::SystemTime;

pub const HEALTH_ENDPOINT: &str = "/api/health";

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub message: &'static str,
    pub timestamp: String,
}

/// Answers 200 unconditionally; external uptime checkers only look at
/// `status`.
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "OK",
        message: "CanvAI Backend Server is running",
        timestamp: humantime::format_rfc3339_seconds(SystemTime::now()).to_string(),
    })
}
