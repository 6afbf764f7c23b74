use async_trait::async_trait;
use chirp_core::{Classifier, GeminiConfig, IntegrationError, IntegrationResult};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{handle_unsuccessful_request, parse_error, request_error};

const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Google Gemini, constrained to answer with JSON
pub struct GeminiClassifier {
    client: Client,
    config: GeminiConfig,
    base: String,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: Option<String>,
}

impl GeminiClassifier {
    pub fn new(config: GeminiConfig) -> Self {
        Self::with_base(config, API_BASE)
    }

    pub fn with_base(config: GeminiConfig, base: &str) -> Self {
        Self {
            client: Client::new(),
            config,
            base: base.trim_end_matches('/').to_string(),
        }
    }

    fn generate_url(&self) -> String {
        format!("{}/models/{}:generateContent", self.base, self.config.model)
    }
}

/// Pulls the JSON answer out of the first candidate
fn extract_json(response: GenerateResponse) -> IntegrationResult<Value> {
    let text: String = response
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .ok_or_else(|| IntegrationError::Parse("response has no candidates".to_string()))?;

    // Models occasionally wrap the answer in a markdown fence despite the mime type
    let text = text.trim();
    let text = text
        .strip_prefix("```json")
        .or_else(|| text.strip_prefix("```"))
        .and_then(|t| t.strip_suffix("```"))
        .unwrap_or(text);

    serde_json::from_str(text.trim()).map_err(parse_error)
}

#[async_trait]
impl Classifier for GeminiClassifier {
    async fn classify(&self, prompt: &str, schema: &Value) -> IntegrationResult<Value> {
        let body = json!({
            "contents": [{ "role": "user", "parts": [{ "text": prompt }] }],
            "generationConfig": {
                "temperature": 0,
                "responseMimeType": "application/json",
                "responseSchema": schema,
            },
        });

        let response = self
            .client
            .post(self.generate_url())
            .header("x-goog-api-key", &self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(request_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(handle_unsuccessful_request(response, status).await);
        }

        let response: GenerateResponse = response.json().await.map_err(parse_error)?;
        extract_json(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(text: &str) -> GenerateResponse {
        serde_json::from_value(json!({
            "candidates": [{ "content": { "parts": [{ "text": text }] } }]
        }))
        .unwrap()
    }

    #[test]
    fn test_generate_url() {
        let classifier = GeminiClassifier::new(GeminiConfig {
            api_key: "key".to_string(),
            model: "gemini-1.5-flash".to_string(),
        });

        assert_eq!(
            classifier.generate_url(),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-1.5-flash:generateContent"
        );
    }

    #[test]
    fn test_extract_json() {
        let value = extract_json(response(r#"{"flagged": true}"#)).unwrap();
        assert_eq!(value, json!({ "flagged": true }));

        let fenced = extract_json(response("```json\n{\"flagged\": false}\n```")).unwrap();
        assert_eq!(fenced, json!({ "flagged": false }));
    }

    #[test]
    fn test_extract_json_without_candidates() {
        let empty: GenerateResponse = serde_json::from_value(json!({})).unwrap();
        assert!(extract_json(empty).is_err());
        assert!(extract_json(response("not json")).is_err());
    }
}
