//! Generative-language API client
//!
//! Thin wrapper over the `generateContent` endpoint. One client is built at
//! startup with the configured timeout and shared through `AppState`.

use std::time::{Duration, Instant};

use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::config::GeminiConfig;
use crate::error::{AppError, AppResult};

/// Generative-language API client
#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
    temperature: f32,
}

/// A conversation turn as the API expects it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    pub parts: Vec<Part>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Part {
    #[serde(default)]
    pub text: String,
}

impl Content {
    pub fn user(text: impl Into<String>) -> Self {
        Self::with_role("user", text)
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self::with_role("model", text)
    }

    fn with_role(role: &str, text: impl Into<String>) -> Self {
        Self {
            role: Some(role.to_string()),
            parts: vec![Part { text: text.into() }],
        }
    }

    fn system(text: impl Into<String>) -> Self {
        Self {
            role: None,
            parts: vec![Part { text: text.into() }],
        }
    }
}

/// Expected shape of the model answer
#[derive(Debug, Clone, Default)]
pub enum ResponseFormat {
    #[default]
    Text,
    Json(serde_json::Value),
}

/// A generate request before it is put on the wire
#[derive(Debug, Clone, Default)]
pub struct GenerateRequest {
    pub system_instruction: Option<String>,
    pub contents: Vec<Content>,
    pub format: ResponseFormat,
}

impl GenerateRequest {
    /// Single-turn prompt
    pub fn prompt(text: impl Into<String>) -> Self {
        Self {
            contents: vec![Content::user(text)],
            ..Default::default()
        }
    }

    pub fn json(mut self, schema: serde_json::Value) -> Self {
        self.format = ResponseFormat::Json(schema);
        self
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentBody<'a> {
    contents: &'a [Content],
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_schema: Option<serde_json::Value>,
}

/// API response for generateContent
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<Content>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

impl GeminiClient {
    /// Create a new client from configuration
    pub fn new(config: &GeminiConfig) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::Configuration(format!("HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            temperature: config.temperature,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }

    fn body<'a>(&self, request: &'a GenerateRequest) -> GenerateContentBody<'a> {
        let (response_mime_type, response_schema) = match &request.format {
            ResponseFormat::Text => (None, None),
            ResponseFormat::Json(schema) => (Some("application/json"), Some(schema.clone())),
        };

        GenerateContentBody {
            contents: &request.contents,
            system_instruction: request.system_instruction.as_deref().map(Content::system),
            generation_config: GenerationConfig {
                temperature: self.temperature,
                response_mime_type,
                response_schema,
            },
        }
    }

    /// Send a request and return the concatenated text of the first candidate
    pub async fn generate(&self, request: &GenerateRequest) -> AppResult<String> {
        if self.api_key.is_empty() {
            return Err(AppError::Configuration(
                "gemini.api_key is not set".to_string(),
            ));
        }

        let started = Instant::now();
        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&self.body(request))
            .send()
            .await
            .map_err(|e| AppError::AiService(format!("Request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::AiService(format!(
                "API returned {}: {}",
                status, body
            )));
        }

        let data: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| AppError::AiService(format!("Failed to parse response: {}", e)))?;

        let text = extract_text(data)?;

        tracing::debug!(
            model = %self.model,
            elapsed_ms = started.elapsed().as_millis() as u64,
            chars = text.len(),
            "Generated content"
        );

        Ok(text)
    }
}

/// Pull the answer text out of a response, rejecting blocked or empty answers
fn extract_text(data: GenerateContentResponse) -> AppResult<String> {
    if let Some(reason) = data.prompt_feedback.and_then(|f| f.block_reason) {
        return Err(AppError::AiService(format!("Prompt blocked: {}", reason)));
    }

    let candidate = data
        .candidates
        .into_iter()
        .next()
        .ok_or_else(|| AppError::AiService("No candidates returned".to_string()))?;

    let text: String = candidate
        .content
        .map(|c| c.parts.into_iter().map(|p| p.text).collect())
        .unwrap_or_default();

    if text.trim().is_empty() {
        return Err(AppError::AiService(format!(
            "Empty answer (finish reason: {})",
            candidate.finish_reason.as_deref().unwrap_or("unknown")
        )));
    }

    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn client() -> GeminiClient {
        GeminiClient::new(&GeminiConfig {
            api_key: "test-key".to_string(),
            model: "gemini-1.5-flash".to_string(),
            base_url: "https://example.test/v1beta/".to_string(),
            timeout_secs: 5,
            temperature: 0.4,
        })
        .unwrap()
    }

    #[test]
    fn test_endpoint() {
        assert_eq!(
            client().endpoint(),
            "https://example.test/v1beta/models/gemini-1.5-flash:generateContent"
        );
    }

    #[test]
    fn test_body_serialization() {
        let request = GenerateRequest {
            system_instruction: Some("Be brief".to_string()),
            contents: vec![Content::user("Hi"), Content::model("Hello"), Content::user("Rain?")],
            format: ResponseFormat::Json(json!({"type": "OBJECT"})),
        };
        let client = client();
        let body = serde_json::to_value(client.body(&request)).unwrap();

        assert_eq!(body["contents"][1]["role"], "model");
        assert_eq!(body["contents"][2]["parts"][0]["text"], "Rain?");
        assert_eq!(body["systemInstruction"]["parts"][0]["text"], "Be brief");
        assert!(body["systemInstruction"].get("role").is_none());
        assert_eq!(body["generationConfig"]["responseMimeType"], "application/json");
        assert_eq!(body["generationConfig"]["responseSchema"]["type"], "OBJECT");
    }

    #[test]
    fn test_text_request_omits_json_config() {
        let client = client();
        let request = GenerateRequest::prompt("Hello");
        let body = serde_json::to_value(client.body(&request)).unwrap();
        assert!(body.get("systemInstruction").is_none());
        assert!(body["generationConfig"].get("responseMimeType").is_none());
    }

    #[test]
    fn test_extract_text_concatenates_parts() {
        let data: GenerateContentResponse = serde_json::from_value(json!({
            "candidates": [{
                "content": {"role": "model", "parts": [{"text": "Crop,"}, {"text": "Suitability"}]},
                "finishReason": "STOP"
            }]
        }))
        .unwrap();
        assert_eq!(extract_text(data).unwrap(), "Crop,Suitability");
    }

    #[test]
    fn test_extract_text_rejects_blocked_and_empty() {
        let blocked: GenerateContentResponse = serde_json::from_value(json!({
            "promptFeedback": {"blockReason": "SAFETY"}
        }))
        .unwrap();
        assert!(matches!(extract_text(blocked), Err(AppError::AiService(_))));

        let empty: GenerateContentResponse = serde_json::from_value(json!({
            "candidates": [{"finishReason": "MAX_TOKENS"}]
        }))
        .unwrap();
        assert!(matches!(extract_text(empty), Err(AppError::AiService(_))));
    }

    #[tokio::test]
    async fn test_generate_without_api_key_is_configuration_error() {
        let client = GeminiClient::new(&GeminiConfig {
            api_key: String::new(),
            model: "m".to_string(),
            base_url: "http://localhost:1".to_string(),
            timeout_secs: 1,
            temperature: 0.0,
        })
        .unwrap();
        let result = client.generate(&GenerateRequest::prompt("hi")).await;
        assert!(matches!(result, Err(AppError::Configuration(_))));
    }
}
