use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use chirp_core::{
    AudioShape, ChatModel, ChatRequest, CloudflareConfig, IntegrationError, IntegrationResult,
    SpeechToText, Transcript,
};
use log::debug;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{handle_unsuccessful_request, parse_error, request_error};

const API_BASE: &str = "https://api.cloudflare.com/client/v4";

/// Cloudflare Workers AI, used for chat completions and speech-to-text
pub struct CloudflareAi {
    client: Client,
    config: CloudflareConfig,
    base: String,
}

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    success: bool,
    result: Option<Value>,
    #[serde(default)]
    errors: Vec<ApiMessage>,
}

#[derive(Debug, Deserialize)]
struct ApiMessage {
    message: String,
}

#[derive(Debug, Deserialize)]
struct ChatResult {
    response: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SpeechResult {
    #[serde(default)]
    text: String,
    #[serde(default)]
    segments: Vec<Segment>,
}

#[derive(Debug, Deserialize)]
struct Segment {
    #[serde(default)]
    text: String,
}

impl CloudflareAi {
    pub fn new(config: CloudflareConfig) -> Self {
        Self::with_base(config, API_BASE)
    }

    /// Uses a different API base, mostly useful for pointing at a local mock
    pub fn with_base(config: CloudflareConfig, base: &str) -> Self {
        Self {
            client: Client::new(),
            config,
            base: base.trim_end_matches('/').to_string(),
        }
    }

    fn run_url(&self, model: &str) -> String {
        format!(
            "{}/accounts/{}/ai/run/{}",
            self.base, self.config.account_id, model
        )
    }

    async fn run(&self, model: &str, body: &Value) -> IntegrationResult<Value> {
        debug!("Running {model} on Workers AI");

        let response = self
            .client
            .post(self.run_url(model))
            .bearer_auth(&self.config.api_token)
            .json(body)
            .send()
            .await
            .map_err(request_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(handle_unsuccessful_request(response, status).await);
        }

        let envelope: Envelope = response.json().await.map_err(parse_error)?;
        unwrap_envelope(envelope)
    }
}

fn unwrap_envelope(envelope: Envelope) -> IntegrationResult<Value> {
    if !envelope.success {
        let messages: Vec<_> = envelope.errors.into_iter().map(|e| e.message).collect();

        return Err(IntegrationError::Parse(format!(
            "request was not successful: {}",
            messages.join(", ")
        )));
    }

    envelope
        .result
        .ok_or_else(|| IntegrationError::Parse("response has no result".to_string()))
}

fn speech_body(shape: AudioShape, wav: &[u8]) -> Value {
    match shape {
        AudioShape::DataUrl => json!({
            "audio": format!("data:audio/wav;base64,{}", STANDARD.encode(wav))
        }),
        AudioShape::ByteArray => json!({ "audio": wav }),
    }
}

fn parse_transcript(result: Value) -> IntegrationResult<Transcript> {
    let result: SpeechResult = serde_json::from_value(result).map_err(parse_error)?;

    Ok(Transcript {
        text: result.text,
        segments: result.segments.into_iter().map(|s| s.text).collect(),
    })
}

#[async_trait]
impl ChatModel for CloudflareAi {
    async fn complete(&self, request: ChatRequest) -> IntegrationResult<String> {
        let body = json!({
            "messages": [
                { "role": "system", "content": request.system },
                { "role": "user", "content": request.user },
            ],
            "max_tokens": request.max_tokens,
        });

        let result = self.run(&self.config.chat_model, &body).await?;
        let chat: ChatResult = serde_json::from_value(result).map_err(parse_error)?;

        chat.response
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty())
            .ok_or_else(|| IntegrationError::Parse("model returned an empty response".to_string()))
    }
}

#[async_trait]
impl SpeechToText for CloudflareAi {
    fn configured_model(&self) -> &str {
        &self.config.speech_model
    }

    async fn transcribe(
        &self,
        model: &str,
        shape: AudioShape,
        wav: &[u8],
    ) -> IntegrationResult<Transcript> {
        let result = self.run(model, &speech_body(shape, wav)).await?;
        parse_transcript(result)
    }
}
