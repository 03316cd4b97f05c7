use std::env;
use std::fmt;
use std::time::Duration;

use anyhow::{bail, Result};

pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1";
pub const DEFAULT_MODEL: &str = "gemini-1.5-flash";
pub const DEFAULT_TIMEOUT_SECS: f64 = 30.0;
const MIN_TIMEOUT_SECS: f64 = 1.0;
const MAX_TIMEOUT_SECS: f64 = 300.0;

/// Sampling parameters sent with every request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationDefaults {
    pub temperature: f64,
    pub top_p: f64,
    pub top_k: u32,
    /// Output cap for image analysis. Chat requests are sent without one.
    pub analysis_max_output_tokens: u32,
}

impl Default for GenerationDefaults {
    fn default() -> Self {
        Self {
            temperature: 0.4,
            top_p: 0.8,
            top_k: 40,
            analysis_max_output_tokens: 800,
        }
    }
}

#[derive(Clone)]
pub struct ClientConfig {
    pub api_base: String,
    pub model: String,
    pub api_key: String,
    pub timeout: Duration,
    pub generation: GenerationDefaults,
}

impl ClientConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            model: DEFAULT_MODEL.to_string(),
            api_key: api_key.into(),
            timeout: Duration::from_secs_f64(DEFAULT_TIMEOUT_SECS),
            generation: GenerationDefaults::default(),
        }
    }

    /// Reads `GEMINI_API_KEY` (or `GOOGLE_API_KEY`), `GEMINI_API_BASE`,
    /// `FITCHAT_MODEL` and `FITCHAT_TIMEOUT_SECS`.
    pub fn from_env() -> Result<Self> {
        let Some(api_key) = api_key_from_env() else {
            bail!("GEMINI_API_KEY or GOOGLE_API_KEY not set");
        };
        let mut config = Self::new(api_key);
        if let Some(base) = non_empty_env("GEMINI_API_BASE") {
            config = config.with_api_base(&base);
        }
        if let Some(model) = non_empty_env("FITCHAT_MODEL") {
            config.model = model;
        }
        if let Some(raw) = non_empty_env("FITCHAT_TIMEOUT_SECS") {
            config.timeout = parse_timeout_secs(&raw);
        }
        Ok(config)
    }

    pub fn with_api_base(mut self, base: &str) -> Self {
        let trimmed = base.trim().trim_end_matches('/');
        if !trimmed.is_empty() {
            self.api_base = trimmed.to_string();
        }
        self
    }

    pub fn with_model(mut self, model: &str) -> Self {
        let trimmed = model.trim();
        if !trimmed.is_empty() {
            self.model = trimmed.to_string();
        }
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn endpoint(&self) -> String {
        let trimmed = self.model.trim();
        let model_path = if trimmed.starts_with("models/") {
            trimmed.to_string()
        } else {
            format!("models/{trimmed}")
        };
        format!("{}/{}:generateContent", self.api_base, model_path)
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("api_base", &self.api_base)
            .field("model", &self.model)
            .field("api_key", &"<redacted>")
            .field("timeout", &self.timeout)
            .field("generation", &self.generation)
            .finish()
    }
}

/// Timeout in seconds from free text, clamped to 1..=300. Unparseable input
/// falls back to the 30 second default.
pub fn parse_timeout_secs(raw: &str) -> Duration {
    let secs = raw
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
        .unwrap_or(DEFAULT_TIMEOUT_SECS)
        .clamp(MIN_TIMEOUT_SECS, MAX_TIMEOUT_SECS);
    Duration::from_secs_f64(secs)
}

fn api_key_from_env() -> Option<String> {
    non_empty_env("GEMINI_API_KEY").or_else(|| non_empty_env("GOOGLE_API_KEY"))
}

fn non_empty_env(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
