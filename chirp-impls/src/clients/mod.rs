mod canvas;
mod cloudflare;
mod gemini;
mod livekit;

pub use canvas::*;
pub use cloudflare::*;
pub use gemini::*;
pub use livekit::*;

use chirp_core::IntegrationError;
use reqwest::{Response, StatusCode};

/// Turns an unsuccessful response into an error carrying the vendor status
async fn handle_unsuccessful_request(response: Response, status: StatusCode) -> IntegrationError {
    let body = match response.text().await {
        Ok(text) => text,
        Err(e) => e.to_string(),
    };

    IntegrationError::Status {
        status: status.as_u16(),
        body,
    }
}

fn request_error(error: reqwest::Error) -> IntegrationError {
    IntegrationError::Request(error.to_string())
}

fn parse_error(error: impl ToString) -> IntegrationError {
    IntegrationError::Parse(error.to_string())
}
