mod assets;
mod generate;
mod health;

pub use assets::*;
pub use generate::*;
pub use health::*;

/// Body shape shared by every error this server reports.
#[derive(Debug, serde::Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}
