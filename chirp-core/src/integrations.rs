//! Traits for the third-party services chirp talks to.
//! Implementations live in `chirp-impls`, and the social layer only sees these traits.

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IntegrationError {
    #[error("{0} is not configured")]
    NotConfigured(&'static str),

    #[error("Failed to send request: {0}")]
    Request(String),

    /// The vendor answered with a non-success status
    #[error("Vendor responded with {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Failed to parse response: {0}")]
    Parse(String),

    #[error("Failed to create token: {0}")]
    Token(String),
}

impl IntegrationError {
    /// The vendor status to mirror back to the client, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

pub type IntegrationResult<T> = Result<T, IntegrationError>;

/// A single-turn chat completion request
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub system: String,
    pub user: String,
    pub max_tokens: u32,
}

/// Represents a hosted language model that can answer a prompt
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn complete(&self, request: ChatRequest) -> IntegrationResult<String>;
}

/// The two request body layouts speech models accept
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioShape {
    /// `{"audio": "data:audio/wav;base64,..."}`
    DataUrl,
    /// `{"audio": [82, 73, 70, 70, ...]}`
    ByteArray,
}

/// The result of a speech-to-text request
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Transcript {
    pub text: String,
    pub segments: Vec<String>,
}

impl Transcript {
    /// Returns the concatenated segment text, or the full text if there are no segments.
    pub fn joined(&self) -> String {
        if self.segments.is_empty() {
            return self.text.trim().to_string();
        }

        self.segments
            .iter()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[async_trait]
pub trait SpeechToText: Send + Sync {
    /// The model that is tried first
    fn configured_model(&self) -> &str;

    async fn transcribe(
        &self,
        model: &str,
        shape: AudioShape,
        wav: &[u8],
    ) -> IntegrationResult<Transcript>;
}

/// A generative model that answers a prompt with JSON matching a schema
#[async_trait]
pub trait Classifier: Send + Sync {
    async fn classify(&self, prompt: &str, schema: &Value) -> IntegrationResult<Value>;
}

/// A raw response from a proxied service
#[derive(Debug, Clone)]
pub struct ProxyResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

impl ProxyResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Parses the body as JSON, failing on unsuccessful responses
    pub fn json<T>(&self) -> IntegrationResult<T>
    where
        T: serde::de::DeserializeOwned,
    {
        if !self.is_success() {
            return Err(IntegrationError::Status {
                status: self.status,
                body: String::from_utf8_lossy(&self.body).into_owned(),
            });
        }

        serde_json::from_slice(&self.body).map_err(|e| IntegrationError::Parse(e.to_string()))
    }
}

/// A learning management system that can be read through its REST API
#[async_trait]
pub trait CourseCatalog: Send + Sync {
    /// Performs a GET on `path` (relative to the API base), with an optional raw query string
    async fn get(&self, path: &str, query: Option<&str>) -> IntegrationResult<ProxyResponse>;
}

/// What a room token allows its holder to do
#[derive(Debug, Clone)]
pub struct RoomGrant {
    pub room: String,
    pub identity: String,
    pub name: Option<String>,
    pub can_publish: bool,
    pub can_subscribe: bool,
}

impl RoomGrant {
    /// A grant to join, publish, and subscribe in a room
    pub fn participant(room: &str, identity: &str) -> Self {
        Self {
            room: room.to_string(),
            identity: identity.to_string(),
            name: None,
            can_publish: true,
            can_subscribe: true,
        }
    }
}

/// Issues tokens for the video SFU
pub trait RoomTokenIssuer: Send + Sync {
    fn issue(&self, grant: &RoomGrant) -> IntegrationResult<String>;

    /// The url clients should connect to with the token
    fn server_url(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transcript_joins_segments() {
        let transcript = Transcript {
            text: "ignored".to_string(),
            segments: vec![" hello".to_string(), "".to_string(), "world ".to_string()],
        };

        assert_eq!(transcript.joined(), "hello world");

        let plain = Transcript {
            text: " just text ".to_string(),
            segments: vec![],
        };

        assert_eq!(plain.joined(), "just text");
    }

    #[test]
    fn test_proxy_response_json_mirrors_status() {
        let response = ProxyResponse {
            status: 401,
            content_type: None,
            body: b"nope".to_vec(),
        };

        let error = response.json::<Value>().unwrap_err();
        assert_eq!(error.status(), Some(401));
    }
}
