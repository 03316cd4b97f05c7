use anyhow::{Context, Result};
use fitchat_contracts::session::{EncodedBitmap, TaskKind};
use reqwest::blocking::Client as HttpClient;
use reqwest::header::CONTENT_TYPE;
use serde_json::{json, Value};
use tracing::{debug, warn};

use super::prompts::{analysis_prompt, chat_prompt, CHAT_SAFETY_CATEGORY, CHAT_SAFETY_THRESHOLD};
use super::{InferenceBackend, InferenceFailure, ANALYSIS_FALLBACK, CHAT_EMPTY_RESPONSE};
use crate::config::ClientConfig;

const API_KEY_HEADER: &str = "x-goog-api-key";
const CANDIDATE_TEXT_POINTER: &str = "/candidates/0/content/parts/0/text";

/// Gemini `generateContent` client. One blocking round trip per call.
pub struct GeminiClient {
    config: ClientConfig,
    http: HttpClient,
}

impl GeminiClient {
    pub fn new(config: ClientConfig) -> Result<Self> {
        let http = HttpClient::builder()
            .timeout(config.timeout)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self { config, http })
    }

    pub fn from_env() -> Result<Self> {
        Self::new(ClientConfig::from_env()?)
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn analysis_payload(&self, bitmap: &EncodedBitmap, task: TaskKind) -> Value {
        let generation = &self.config.generation;
        json!({
            "contents": [{
                "parts": [
                    { "text": analysis_prompt(task) },
                    {
                        "inline_data": {
                            "mime_type": bitmap.mime_type(),
                            "data": bitmap.base64(),
                        }
                    }
                ]
            }],
            "generation_config": {
                "temperature": generation.temperature,
                "top_p": generation.top_p,
                "top_k": generation.top_k,
                "max_output_tokens": generation.analysis_max_output_tokens,
            }
        })
    }

    pub fn chat_payload(&self, user_text: &str) -> Value {
        let generation = &self.config.generation;
        json!({
            "contents": [{
                "parts": [{ "text": chat_prompt(user_text) }]
            }],
            "generation_config": {
                "temperature": generation.temperature,
                "top_p": generation.top_p,
                "top_k": generation.top_k,
            },
            "safety_settings": [{
                "category": CHAT_SAFETY_CATEGORY,
                "threshold": CHAT_SAFETY_THRESHOLD,
            }]
        })
    }

    /// Sends `payload` and returns the first candidate's first text part, or
    /// `None` when the reply is well formed JSON without one.
    pub fn generate(&self, payload: &Value) -> Result<Option<String>, InferenceFailure> {
        let endpoint = self.config.endpoint();
        let response = self
            .http
            .post(&endpoint)
            .header(CONTENT_TYPE, "application/json")
            .header(API_KEY_HEADER, &self.config.api_key)
            .json(payload)
            .send()
            .map_err(|err| classify_transport_error(&err))?;

        let status = response.status();
        debug!(endpoint = %endpoint, status = status.as_u16(), "gemini response received");
        if !status.is_success() {
            return Err(InferenceFailure::Status(status.as_u16()));
        }

        let body = response
            .text()
            .map_err(|err| classify_transport_error(&err))?;
        let parsed: Value = serde_json::from_str(&body)
            .map_err(|err| InferenceFailure::Decode(err.to_string()))?;
        Ok(extract_candidate_text(&parsed))
    }
}

impl InferenceBackend for GeminiClient {
    fn name(&self) -> &str {
        "gemini"
    }

    fn analyze_image(&self, bitmap: &EncodedBitmap, task: TaskKind) -> String {
        let payload = self.analysis_payload(bitmap, task);
        debug!(
            task = task.as_str(),
            width = bitmap.width(),
            height = bitmap.height(),
            image_bytes = bitmap.byte_len(),
            "requesting image analysis"
        );
        match self.generate(&payload) {
            Ok(Some(text)) => text,
            Ok(None) => ANALYSIS_FALLBACK.to_string(),
            Err(failure) => {
                warn!(task = task.as_str(), kind = failure.kind(), %failure, "image analysis failed");
                failure.analysis_message()
            }
        }
    }

    fn chat(&self, user_text: &str) -> String {
        let payload = self.chat_payload(user_text);
        debug!(chars = user_text.chars().count(), "requesting chat reply");
        match self.generate(&payload) {
            Ok(Some(text)) if !text.is_empty() => text,
            Ok(_) => CHAT_EMPTY_RESPONSE.to_string(),
            Err(failure) => {
                warn!(kind = failure.kind(), %failure, "chat request failed");
                failure.chat_message().to_string()
            }
        }
    }
}

pub(crate) fn extract_candidate_text(payload: &Value) -> Option<String> {
    payload
        .pointer(CANDIDATE_TEXT_POINTER)
        .and_then(Value::as_str)
        .map(str::to_string)
}

fn classify_transport_error(err: &reqwest::Error) -> InferenceFailure {
    if err.is_timeout() {
        return InferenceFailure::Timeout;
    }
    InferenceFailure::Transport(error_chain_text(err))
}

fn error_chain_text(err: &(dyn std::error::Error + 'static)) -> String {
    let mut parts: Vec<String> = Vec::new();
    let mut current = Some(err);
    while let Some(cause) = current {
        let text = cause.to_string();
        let trimmed = text.trim();
        if !trimmed.is_empty() && parts.last().map(String::as_str) != Some(trimmed) {
            parts.push(trimmed.to_string());
        }
        current = cause.source();
    }
    parts.join(": ")
}
