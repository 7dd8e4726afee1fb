//! Gemini `generateContent` client serving all three provider roles.

use crate::config::ProviderConfig;
use crate::error::{EchoError, Result};
use crate::provider::prompt::{outline_prompt, segment_prompt};
use crate::provider::{
    NarrativeProvider, OutlineProvider, OutlineRequest, SegmentRequest, SpeechProvider,
    SpeechRequest,
};
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::time::Duration;

const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
const API_KEY_ENV: &str = "GEMINI_API_KEY";

/// HTTP client for the Generative Language API.
#[derive(Clone)]
pub struct GeminiClient {
    client: reqwest::Client,
    api_key: String,
    text_model: String,
    speech_model: String,
    base_url: String,
}

impl GeminiClient {
    pub fn new(api_key: impl Into<String>, text_model: &str, speech_model: &str) -> Result<Self> {
        // Per-stage deadlines are enforced by the producer; this is only a
        // transport backstop.
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .timeout(Duration::from_secs(300))
            .build()
            .map_err(|e| EchoError::Provider {
                message: format!("Failed to build HTTP client: {e}"),
            })?;
        Ok(Self {
            client,
            api_key: api_key.into(),
            text_model: text_model.to_string(),
            speech_model: speech_model.to_string(),
            base_url: API_BASE.to_string(),
        })
    }

    /// Build from config, falling back to `GEMINI_API_KEY` for the key.
    pub fn from_config(config: &ProviderConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .filter(|key| !key.is_empty())
            .or_else(|| std::env::var(API_KEY_ENV).ok().filter(|key| !key.is_empty()))
            .ok_or(EchoError::NoApiKey)?;
        Self::new(api_key, &config.text_model, &config.speech_model)
    }

    /// Point at a different endpoint (proxies, test servers).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    async fn generate(&self, model: &str, body: Value) -> Result<GenerateResponse> {
        let response = self
            .client
            .post(format!("{}/models/{}:generateContent", self.base_url, model))
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| EchoError::Provider {
                message: format!("Request to {model} failed: {e}"),
            })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            return Err(EchoError::ProviderStatus { status, message });
        }

        response.json().await.map_err(|e| EchoError::Provider {
            message: format!("Failed to parse {model} response: {e}"),
        })
    }
}

#[async_trait]
impl OutlineProvider for GeminiClient {
    async fn outline(&self, request: &OutlineRequest) -> Result<Vec<String>> {
        let body = json!({
            "contents": [{ "parts": [{ "text": outline_prompt(request) }] }],
            "generationConfig": { "responseMimeType": "application/json" },
        });
        let response = self.generate(&self.text_model, body).await?;
        parse_outline(&response.text())
    }
}

#[async_trait]
impl NarrativeProvider for GeminiClient {
    async fn narrate(&self, request: &SegmentRequest) -> Result<String> {
        let body = json!({
            "contents": [{ "parts": [{ "text": segment_prompt(request) }] }],
        });
        let response = self.generate(&self.text_model, body).await?;
        Ok(response.text())
    }
}

#[async_trait]
impl SpeechProvider for GeminiClient {
    async fn synthesize(&self, request: &SpeechRequest) -> Result<Vec<u8>> {
        let body = json!({
            "contents": [{ "parts": [{ "text": request.text }] }],
            "generationConfig": {
                "responseModalities": ["AUDIO"],
                "speechConfig": {
                    "voiceConfig": { "prebuiltVoiceConfig": { "voiceName": request.voice } }
                },
            },
        });
        let response = self.generate(&self.speech_model, body).await?;
        match response.inline_data() {
            Some(data) => STANDARD.decode(data).map_err(|e| EchoError::Provider {
                message: format!("Invalid base64 audio payload: {e}"),
            }),
            None => Ok(Vec::new()),
        }
    }
}

/// Parse the outline provider's JSON array of beats.
pub fn parse_outline(text: &str) -> Result<Vec<String>> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(EchoError::Provider {
            message: "No outline generated".to_string(),
        });
    }
    let beats: Vec<Value> = serde_json::from_str(trimmed)?;
    Ok(beats
        .into_iter()
        .map(|beat| match beat {
            Value::String(text) => text,
            other => other.to_string(),
        })
        .collect())
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    inline_data: Option<InlineData>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    #[serde(default)]
    mime_type: String,
    data: String,
}

impl GenerateResponse {
    fn parts(&self) -> impl Iterator<Item = &Part> {
        self.candidates
            .first()
            .and_then(|candidate| candidate.content.as_ref())
            .into_iter()
            .flat_map(|content| content.parts.iter())
    }

    /// Concatenated text parts of the first candidate, trimmed.
    pub fn text(&self) -> String {
        self.parts()
            .filter_map(|part| part.text.as_deref())
            .collect::<String>()
            .trim()
            .to_string()
    }

    /// Base64 audio of the first candidate's first inline part.
    pub fn inline_data(&self) -> Option<&str> {
        self.parts()
            .find_map(|part| part.inline_data.as_ref())
            .map(|inline| inline.data.as_str())
            .filter(|data| !data.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(value: Value) -> GenerateResponse {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn text_joins_parts_of_first_candidate() {
        let response = response(json!({
            "candidates": [
                { "content": { "parts": [{ "text": " The road " }, { "text": "bends. " }] } },
                { "content": { "parts": [{ "text": "ignored" }] } }
            ]
        }));
        assert_eq!(response.text(), "The road bends.");
    }

    #[test]
    fn missing_candidates_give_empty_text() {
        assert_eq!(response(json!({})).text(), "");
        assert!(response(json!({ "candidates": [{}] })).inline_data().is_none());
    }

    #[test]
    fn inline_audio_is_found() {
        let response = response(json!({
            "candidates": [{ "content": { "parts": [
                { "inlineData": { "mimeType": "audio/L16;rate=24000", "data": "AAEC" } }
            ] } }]
        }));
        assert_eq!(response.inline_data(), Some("AAEC"));
        assert_eq!(STANDARD.decode("AAEC").unwrap(), vec![0, 1, 2]);
    }

    #[test]
    fn parse_outline_reads_string_array() {
        let beats = parse_outline(r#" ["Leave the harbor", "Climb the hill"] "#).unwrap();
        assert_eq!(beats, vec!["Leave the harbor", "Climb the hill"]);
    }

    #[test]
    fn parse_outline_rejects_empty_and_malformed() {
        assert!(parse_outline("   ").is_err());
        assert!(matches!(
            parse_outline("not json"),
            Err(EchoError::Json(_))
        ));
    }

    #[test]
    fn from_config_prefers_explicit_key() {
        let config = ProviderConfig {
            api_key: Some("configured".to_string()),
            ..ProviderConfig::default()
        };
        let client = GeminiClient::from_config(&config).unwrap();
        assert_eq!(client.api_key, "configured");
        assert_eq!(client.text_model, "gemini-3-flash-preview");
    }
}
