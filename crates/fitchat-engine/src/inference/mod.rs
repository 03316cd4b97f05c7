//! Remote inference: the backend seam the controller talks to, the Gemini
//! implementation, and the user-facing copy every failure is turned into.

mod gemini;
mod prompts;

use std::fmt;

use fitchat_contracts::session::{EncodedBitmap, TaskKind};

pub use gemini::GeminiClient;
pub use prompts::{analysis_prompt, chat_prompt, CHAT_SAFETY_CATEGORY, CHAT_SAFETY_THRESHOLD};

pub const ANALYSIS_FALLBACK: &str = "No analysis available.";
pub const ANALYSIS_TIMEOUT: &str = "Request timed out. Please try again.";

pub const CHAT_EMPTY_RESPONSE: &str = "I couldn't generate a response. Please try again.";
pub const CHAT_SERVICE_UNAVAILABLE: &str =
    "The service is temporarily unavailable. Please wait a moment and try again.";
pub const CHAT_RATE_LIMITED: &str =
    "I'm receiving too many requests. Please wait a moment and try again.";
pub const CHAT_REPHRASE: &str =
    "I'm having trouble understanding that. Could you please rephrase your question?";
pub const CHAT_TIMEOUT: &str = "The request timed out. Please try again with a simpler question.";
pub const CHAT_NETWORK_ERROR: &str =
    "Network error occurred. Please check your connection and try again.";
pub const CHAT_UNEXPECTED_ERROR: &str =
    "I encountered an unexpected error. Please try again with a different question.";

/// A remote model that answers chat messages and describes images.
///
/// Both operations always return displayable text. Failures are reported
/// through the returned copy, never as an error value.
pub trait InferenceBackend {
    fn name(&self) -> &str;
    fn analyze_image(&self, bitmap: &EncodedBitmap, task: TaskKind) -> String;
    fn chat(&self, user_text: &str) -> String;
}

impl<T: InferenceBackend + ?Sized> InferenceBackend for Box<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn analyze_image(&self, bitmap: &EncodedBitmap, task: TaskKind) -> String {
        (**self).analyze_image(bitmap, task)
    }

    fn chat(&self, user_text: &str) -> String {
        (**self).chat(user_text)
    }
}

/// Why a request did not produce a usable reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InferenceFailure {
    Timeout,
    Transport(String),
    Status(u16),
    Decode(String),
}

impl InferenceFailure {
    pub fn kind(&self) -> &'static str {
        match self {
            InferenceFailure::Timeout => "timeout",
            InferenceFailure::Transport(_) => "transport",
            InferenceFailure::Status(_) => "status",
            InferenceFailure::Decode(_) => "decode",
        }
    }

    /// Copy shown for a failed image analysis. Unreadable bodies are treated
    /// like missing fields.
    pub fn analysis_message(&self) -> String {
        match self {
            InferenceFailure::Timeout => ANALYSIS_TIMEOUT.to_string(),
            InferenceFailure::Status(code) => {
                format!("Error analyzing image (Status: {code}). Please try again.")
            }
            InferenceFailure::Decode(_) => ANALYSIS_FALLBACK.to_string(),
            InferenceFailure::Transport(detail) => format!("Error analyzing image: {detail}"),
        }
    }

    pub fn chat_message(&self) -> &'static str {
        match self {
            InferenceFailure::Timeout => CHAT_TIMEOUT,
            InferenceFailure::Transport(_) => CHAT_NETWORK_ERROR,
            InferenceFailure::Status(503) => CHAT_SERVICE_UNAVAILABLE,
            InferenceFailure::Status(429) => CHAT_RATE_LIMITED,
            InferenceFailure::Status(_) => CHAT_REPHRASE,
            InferenceFailure::Decode(_) => CHAT_UNEXPECTED_ERROR,
        }
    }
}

impl fmt::Display for InferenceFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InferenceFailure::Timeout => write!(f, "request timed out"),
            InferenceFailure::Transport(detail) => write!(f, "transport failure: {detail}"),
            InferenceFailure::Status(code) => write!(f, "unexpected status {code}"),
            InferenceFailure::Decode(detail) => write!(f, "invalid response body: {detail}"),
        }
    }
}

impl std::error::Error for InferenceFailure {}
