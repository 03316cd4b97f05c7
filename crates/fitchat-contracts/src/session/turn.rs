use std::fmt;
use std::str::FromStr;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

pub const JPEG_MIME_TYPE: &str = "image/jpeg";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// Analysis mode for an uploaded image. Selects the prompt template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskKind {
    Food,
    Equipment,
}

impl TaskKind {
    pub const ALL: [TaskKind; 2] = [TaskKind::Food, TaskKind::Equipment];

    pub fn as_str(self) -> &'static str {
        match self {
            TaskKind::Food => "food",
            TaskKind::Equipment => "equipment",
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "food" => Ok(TaskKind::Food),
            "equipment" => Ok(TaskKind::Equipment),
            other => Err(format!("invalid task kind: {other}")),
        }
    }
}

/// Normalized JPEG image kept as base64 text so it can be embedded in JSON
/// request bodies and data URLs without another conversion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodedBitmap {
    base64: String,
    width: u32,
    height: u32,
}

impl EncodedBitmap {
    pub fn from_jpeg_bytes(bytes: &[u8], width: u32, height: u32) -> Self {
        Self {
            base64: BASE64.encode(bytes),
            width,
            height,
        }
    }

    pub fn base64(&self) -> &str {
        &self.base64
    }

    pub fn mime_type(&self) -> &'static str {
        JPEG_MIME_TYPE
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", JPEG_MIME_TYPE, self.base64)
    }

    pub fn decode_bytes(&self) -> anyhow::Result<Vec<u8>> {
        Ok(BASE64.decode(self.base64.as_bytes())?)
    }

    /// Approximate size of the encoded JPEG in bytes, derived from the base64 length.
    pub fn byte_len(&self) -> usize {
        let padding = self.base64.bytes().rev().take_while(|b| *b == b'=').count();
        (self.base64.len() / 4) * 3 - padding
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    role: Role,
    content: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    image: Option<EncodedBitmap>,
}

impl ChatTurn {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            image: None,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    pub fn user_with_image(content: impl Into<String>, image: EncodedBitmap) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            image: Some(image),
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn image(&self) -> Option<&EncodedBitmap> {
        self.image.as_ref()
    }

    pub fn is_user(&self) -> bool {
        self.role == Role::User
    }

    pub fn is_assistant(&self) -> bool {
        self.role == Role::Assistant
    }
}
