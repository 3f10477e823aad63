use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

pub const TEMPERATURE: f64 = 0.7;

// ============ Messages ============

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageUrl {
    pub url: String,                // data URL
}

/// One piece of a multimodal message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

impl MessageContent {
    /// Text of the message; multimodal parts contribute their text pieces
    pub fn as_text(&self) -> String {
        match self {
            MessageContent::Text(text) => text.clone(),
            MessageContent::Parts(parts) => parts
                .iter()
                .filter_map(|p| match p {
                    ContentPart::Text { text } => Some(text.as_str()),
                    ContentPart::ImageUrl { .. } => None,
                })
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }
}

/// Chat message in the OpenAI wire shape, the lingua franca between composer and providers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiMessage {
    pub role: Role,
    pub content: MessageContent,
}

impl ApiMessage {
    pub fn new(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            content: MessageContent::Text(text.into()),
        }
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self::new(Role::System, text)
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Role::User, text)
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(Role::Assistant, text)
    }

    pub fn with_parts(role: Role, parts: Vec<ContentPart>) -> Self {
        Self {
            role,
            content: MessageContent::Parts(parts),
        }
    }
}

// ============ Requests ============

#[derive(Debug, Serialize)]
pub struct ChatCompletionRequest<'a> {
    pub model: &'a str,
    pub messages: &'a [ApiMessage],
    pub temperature: f64,
}

/// Strip a trailing `/` and then a trailing `/v1`, so both
/// `https://host/v1` and `https://host` resolve to the same root
pub fn normalize_base_url(base_url: &str) -> &str {
    let trimmed = base_url.strip_suffix('/').unwrap_or(base_url);
    trimmed.strip_suffix("/v1").unwrap_or(trimmed)
}

pub fn chat_completions_url(base_url: &str) -> String {
    format!("{}/v1/chat/completions", normalize_base_url(base_url))
}

/// Model listing endpoints in the order they are tried
pub fn model_list_candidates(base_url: &str) -> Vec<String> {
    let root = normalize_base_url(base_url);
    vec![format!("{}/v1/models", root), format!("{}/models", root)]
}

// ============ Responses ============

#[derive(Debug, Default, Deserialize)]
pub struct ChatCompletionResponse {
    #[serde(default)]
    pub choices: Vec<Choice>,
    #[serde(default)]
    pub error: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub struct Choice {
    #[serde(default)]
    pub message: Option<ResponseMessage>,
}

#[derive(Debug, Deserialize)]
pub struct ResponseMessage {
    #[serde(default)]
    pub content: Option<String>,
}

impl ChatCompletionResponse {
    /// A 200 response can still carry an `error` object
    pub fn error_message(&self) -> Option<String> {
        let error = self.error.as_ref().filter(|e| !e.is_null())?;
        Some(
            error
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| error.to_string()),
        )
    }

    pub fn into_text(self) -> Result<String> {
        if let Some(message) = self.error_message() {
            return Err(Error::Http {
                provider: "OpenAI".to_string(),
                status: 200,
                body: message,
            });
        }

        self.choices
            .into_iter()
            .next()
            .and_then(|c| c.message)
            .and_then(|m| m.content)
            .ok_or_else(|| Error::Parse("Invalid API response: no choices[0].message.content".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_normalize_base_url() {
        assert_eq!(normalize_base_url("https://api.openai.com/v1"), "https://api.openai.com");
        assert_eq!(normalize_base_url("https://api.openai.com/v1/"), "https://api.openai.com");
        assert_eq!(normalize_base_url("https://api.deepseek.com"), "https://api.deepseek.com");
        assert_eq!(chat_completions_url("http://localhost:11434/"), "http://localhost:11434/v1/chat/completions");
        assert_eq!(
            model_list_candidates("https://proxy.example/v1"),
            vec!["https://proxy.example/v1/models", "https://proxy.example/models"]
        );
    }

    #[test]
    fn test_multimodal_message_wire_shape() {
        let msg = ApiMessage::with_parts(
            Role::User,
            vec![
                ContentPart::Text { text: " ".into() },
                ContentPart::ImageUrl { image_url: ImageUrl { url: "data:image/png;base64,AAAA".into() } },
            ],
        );
        let wire = serde_json::to_value(&msg).unwrap();
        assert_eq!(
            wire,
            json!({
                "role": "user",
                "content": [
                    { "type": "text", "text": " " },
                    { "type": "image_url", "image_url": { "url": "data:image/png;base64,AAAA" } }
                ]
            })
        );
        let back: ApiMessage = serde_json::from_value(wire).unwrap();
        assert_eq!(back, msg);
    }

    #[test]
    fn test_error_object_in_success_body() {
        let body: ChatCompletionResponse =
            serde_json::from_value(json!({ "error": { "message": "model not found" } })).unwrap();
        let err = body.into_text().unwrap_err();
        assert!(err.to_string().contains("model not found"));
    }

    #[test]
    fn test_missing_choices_is_parse_error() {
        let body: ChatCompletionResponse = serde_json::from_value(json!({ "choices": [] })).unwrap();
        assert!(matches!(body.into_text(), Err(Error::Parse(_))));
    }
}
