// AI Provider Service
// Gemini REST calls: streamed (SSE) for contract analysis, plain for Q&A.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::env;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, warn};

use super::config_store::{AppConfig, ConfigStore, GeminiConfig};

const GEMINI_DEFAULT_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const HTTP_TIMEOUT_SECS: u64 = 300;

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),
    #[error("API error: {status} - {message}")]
    ApiError { status: u16, message: String },
    #[error("Missing content in response")]
    MissingContent,
    #[error("JSON parse error: {0}")]
    JsonError(String),
    #[error("API key not configured for {0}")]
    MissingApiKey(String),
    #[error("Request timed out after {0}s")]
    Timeout(u64),
}

/// Sampling settings for one request.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GenerationOptions {
    pub temperature: f64,
    pub max_output_tokens: u32,
    /// Ask for `application/json` output.
    pub json_response: bool,
}

impl GenerationOptions {
    pub fn contract_analysis(config: &GeminiConfig) -> Self {
        Self {
            temperature: config.temperature,
            max_output_tokens: config.max_output_tokens,
            json_response: true,
        }
    }

    pub fn legal_answer() -> Self {
        Self {
            temperature: 0.3,
            max_output_tokens: 2000,
            json_response: false,
        }
    }
}

/// Anything that can turn a prompt into model text.
#[async_trait]
pub trait CompletionSource: Send + Sync {
    /// Fragments in arrival order, fully drained.
    async fn stream_completion(
        &self,
        prompt: &str,
        options: &GenerationOptions,
    ) -> Result<Vec<String>, ProviderError>;

    async fn complete(&self, prompt: &str, options: &GenerationOptions) -> Result<String, ProviderError>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResult {
    pub content: String,
    pub latency_ms: i64,
}

pub struct GeminiClient {
    client: Client,
    base_url: String,
    model: String,
    api_key: String,
}

impl GeminiClient {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        let base_url = env::var("GEMINI_API_URL").unwrap_or_else(|_| GEMINI_DEFAULT_URL.to_string());
        Self::with_base_url(api_key, model, base_url)
    }

    pub fn with_base_url(
        api_key: impl Into<String>,
        model: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
            .build()
            .unwrap_or_default();

        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            api_key: api_key.into(),
        }
    }

    /// Client configured from the app config; the key comes from env or the config file.
    pub fn from_config(config: &AppConfig) -> Result<Self, ProviderError> {
        let api_key = get_api_key("gemini").ok_or_else(|| ProviderError::MissingApiKey("gemini".to_string()))?;
        let client = match config.gemini.base_url.as_deref() {
            Some(url) if env::var("GEMINI_API_URL").is_err() => {
                Self::with_base_url(api_key, config.gemini.model.clone(), url)
            }
            _ => Self::new(api_key, config.gemini.model.clone()),
        };
        Ok(client)
    }

    fn endpoint(&self, method: &str) -> String {
        format!("{}/models/{}:{}", self.base_url, self.model, method)
    }

    fn request_body(prompt: &str, options: &GenerationOptions) -> Value {
        let mut generation_config = json!({
            "temperature": options.temperature,
            "maxOutputTokens": options.max_output_tokens,
        });
        if options.json_response {
            generation_config["responseMimeType"] = json!("application/json");
        }
        json!({
            "contents": [{"role": "user", "parts": [{"text": prompt}]}],
            "generationConfig": generation_config,
        })
    }

    async fn post(&self, url: &str, body: &Value) -> Result<reqwest::Response, ProviderError> {
        let response = self
            .client
            .post(url)
            .header("x-goog-api-key", &self.api_key)
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::ApiError {
                status: status.as_u16(),
                message: body,
            });
        }
        Ok(response)
    }

    /// Single-shot generation.
    pub async fn generate(&self, prompt: &str, options: &GenerationOptions) -> Result<ChatResult, ProviderError> {
        let start = Instant::now();
        let response = self
            .post(&self.endpoint("generateContent"), &Self::request_body(prompt, options))
            .await?;

        let data: Value = response
            .json()
            .await
            .map_err(|e| ProviderError::JsonError(e.to_string()))?;

        let parts = candidate_texts(&data);
        if parts.is_empty() {
            return Err(ProviderError::MissingContent);
        }

        Ok(ChatResult {
            content: parts.concat(),
            latency_ms: start.elapsed().as_millis() as i64,
        })
    }

    /// Streamed generation over SSE. Returns every text fragment in arrival order.
    pub async fn generate_stream(
        &self,
        prompt: &str,
        options: &GenerationOptions,
    ) -> Result<Vec<String>, ProviderError> {
        let start = Instant::now();
        let url = format!("{}?alt=sse", self.endpoint("streamGenerateContent"));
        let mut response = self.post(&url, &Self::request_body(prompt, options)).await?;

        let mut decoder = SseFragmentDecoder::default();
        let mut fragments = Vec::new();
        while let Some(chunk) = response.chunk().await? {
            fragments.extend(decoder.push(&chunk));
        }
        fragments.extend(decoder.finish());

        debug!(
            model = %self.model,
            fragments = fragments.len(),
            latency_ms = start.elapsed().as_millis() as u64,
            "[PROVIDER] gemini stream drained"
        );
        Ok(fragments)
    }
}

#[async_trait]
impl CompletionSource for GeminiClient {
    async fn stream_completion(
        &self,
        prompt: &str,
        options: &GenerationOptions,
    ) -> Result<Vec<String>, ProviderError> {
        self.generate_stream(prompt, options).await
    }

    async fn complete(&self, prompt: &str, options: &GenerationOptions) -> Result<String, ProviderError> {
        self.generate(prompt, options).await.map(|r| r.content)
    }
}

/// Text parts of the first candidate of one Gemini response chunk.
/// Chunks without candidates (usage or finish metadata) yield nothing.
pub fn candidate_texts(chunk: &Value) -> Vec<String> {
    chunk["candidates"][0]["content"]["parts"]
        .as_array()
        .map(|parts| {
            parts
                .iter()
                .filter_map(|p| p["text"].as_str())
                .map(|t| t.to_string())
                .collect()
        })
        .unwrap_or_default()
}

/// Incremental decoder for `data:` lines of a Gemini SSE stream.
///
/// Bytes are buffered until a full line is available, so chunk boundaries may
/// fall anywhere, including inside a multi-byte character.
#[derive(Debug, Default)]
pub struct SseFragmentDecoder {
    buffer: Vec<u8>,
}

impl SseFragmentDecoder {
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(bytes);
        let mut fragments = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            fragments.extend(decode_sse_line(&line));
        }
        fragments
    }

    pub fn finish(&mut self) -> Vec<String> {
        let rest = std::mem::take(&mut self.buffer);
        decode_sse_line(&rest)
    }
}

fn decode_sse_line(line: &[u8]) -> Vec<String> {
    let line = String::from_utf8_lossy(line);
    let line = line.trim_end_matches(&['\r', '\n'][..]);
    let Some(payload) = line.strip_prefix("data:") else {
        return Vec::new();
    };
    let payload = payload.trim_start();
    if payload.is_empty() || payload == "[DONE]" {
        return Vec::new();
    }
    match serde_json::from_str::<Value>(payload) {
        Ok(chunk) => candidate_texts(&chunk),
        Err(e) => {
            warn!("[PROVIDER] skipping undecodable SSE event: {}", e);
            Vec::new()
        }
    }
}

/// Get API key from environment or config file
pub fn get_api_key(provider: &str) -> Option<String> {
    let env_keys: &[&str] = match provider {
        "gemini" => &["GEMINI_API_KEY", "LEGAL_ANALYZER_GEMINI_API_KEY"],
        "moleg" => &["MOLEG_API_KEY", "LEGAL_ANALYZER_MOLEG_API_KEY"],
        _ => &[],
    };

    for key in env_keys {
        if let Ok(val) = env::var(key) {
            let v = val.trim();
            if !v.is_empty() {
                return Some(v.to_string());
            }
        }
    }

    ConfigStore::open_default().and_then(|store| store.get_api_key(provider).ok().flatten())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sse_event(text: &str) -> String {
        format!(
            "data: {}\r\n\r\n",
            json!({"candidates": [{"content": {"parts": [{"text": text}], "role": "model"}}]})
        )
    }

    #[test]
    fn test_candidate_texts() {
        let chunk = json!({"candidates": [{"content": {"parts": [{"text": "{\"a\""}, {"text": ": 1}"}]}}]});
        assert_eq!(candidate_texts(&chunk), vec!["{\"a\"", ": 1}"]);
        assert!(candidate_texts(&json!({"usageMetadata": {"totalTokenCount": 12}})).is_empty());
    }

    #[test]
    fn test_sse_decoder_split_chunks() {
        let stream = format!("{}{}", sse_event("{\"title\": \"임대차"), sse_event(" 계약\"}"));
        let bytes = stream.as_bytes();

        let mut decoder = SseFragmentDecoder::default();
        let mut fragments = Vec::new();
        // 7-byte chunks split lines and Hangul code points
        for chunk in bytes.chunks(7) {
            fragments.extend(decoder.push(chunk));
        }
        fragments.extend(decoder.finish());

        assert_eq!(fragments, vec!["{\"title\": \"임대차", " 계약\"}"]);
    }

    #[test]
    fn test_sse_decoder_ignores_noise() {
        let mut decoder = SseFragmentDecoder::default();
        let out = decoder.push(b": keep-alive\n\nevent: ping\ndata: [DONE]\ndata: {broken\n");
        assert!(out.is_empty());
        assert!(decoder.finish().is_empty());
    }

    #[test]
    fn test_request_body_json_mode() {
        let body = GeminiClient::request_body("hi", &GenerationOptions::contract_analysis(&GeminiConfig::default()));
        assert_eq!(body["generationConfig"]["responseMimeType"], "application/json");
        assert_eq!(body["generationConfig"]["maxOutputTokens"], 24000);

        let body = GeminiClient::request_body("hi", &GenerationOptions::legal_answer());
        assert!(body["generationConfig"].get("responseMimeType").is_none());
    }

    #[test]
    fn test_endpoint() {
        let client = GeminiClient::with_base_url("k", "gemini-2.5-flash", "https://example.test/v1beta/");
        assert_eq!(
            client.endpoint("streamGenerateContent"),
            "https://example.test/v1beta/models/gemini-2.5-flash:streamGenerateContent"
        );
    }
}
