pub mod config;
pub mod controller;
pub mod inference;
pub mod normalize;

pub use config::ClientConfig;
pub use controller::{
    ConversationController, ImageOutcome, ImageUpload, Notice, NoticeLevel, Presenter, TextOutcome,
};
pub use inference::{GeminiClient, InferenceBackend, InferenceFailure};
