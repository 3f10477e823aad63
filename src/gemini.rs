//! Google Gemini wire format
//!
//! Messages are composed in the OpenAI shape and converted here right
//! before the request goes out.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::chat::parse_data_url;
use crate::error::{Error, Result};
use crate::openai::{ApiMessage, ContentPart, MessageContent, Role, TEMPERATURE};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InlineData {
    pub mime_type: String,
    pub data: String,               // base64 payload
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Part {
    Text { text: String },
    InlineData { inline_data: InlineData },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Content {
    pub role: String,               // "user" or "model"
    pub parts: Vec<Part>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SystemInstruction {
    pub parts: Vec<Part>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub temperature: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerateContentRequest {
    pub contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<SystemInstruction>,
    #[serde(rename = "generationConfig")]
    pub generation_config: GenerationConfig,
}

/// Convert OpenAI-shaped messages (system messages gathered into one instruction)
pub fn convert_messages(messages: &[ApiMessage]) -> GenerateContentRequest {
    let mut system_prompt = String::new();
    let mut contents = Vec::new();

    for msg in messages {
        if msg.role == Role::System {
            if !system_prompt.is_empty() {
                system_prompt.push_str("\n\n");
            }
            system_prompt.push_str(&msg.content.as_text());
            continue;
        }

        let role = if msg.role == Role::User { "user" } else { "model" };
        contents.push(Content {
            role: role.to_string(),
            parts: convert_content(&msg.content),
        });
    }

    let system_instruction = if system_prompt.is_empty() {
        None
    } else {
        Some(SystemInstruction {
            parts: vec![Part::Text { text: system_prompt }],
        })
    };

    GenerateContentRequest {
        contents,
        system_instruction,
        generation_config: GenerationConfig { temperature: TEMPERATURE },
    }
}

fn convert_content(content: &MessageContent) -> Vec<Part> {
    match content {
        MessageContent::Text(text) => vec![Part::Text { text: text.clone() }],
        MessageContent::Parts(parts) => parts
            .iter()
            .filter_map(|part| match part {
                ContentPart::Text { text } => Some(Part::Text { text: text.clone() }),
                // Images that are not base64 data URLs are dropped
                ContentPart::ImageUrl { image_url } => parse_data_url(&image_url.url).map(|(mime_type, data)| {
                    Part::InlineData {
                        inline_data: InlineData { mime_type, data },
                    }
                }),
            })
            .collect(),
    }
}

/// Scheme and host of the configured base URL; any path the user typed is ignored
pub fn origin(base_url: &str) -> String {
    match Url::parse(base_url) {
        Ok(url) => url.origin().ascii_serialization(),
        Err(_) => base_url.trim_end_matches('/').to_string(),
    }
}

pub fn generate_url(base_url: &str, model: &str, api_key: &str) -> String {
    format!("{}/v1beta/models/{}:generateContent?key={}", origin(base_url), model, api_key)
}

pub fn models_url(base_url: &str, api_key: &str) -> String {
    format!("{}/v1beta/models?key={}", origin(base_url), api_key)
}

// ============ Responses ============

#[derive(Debug, Default, Deserialize)]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
pub struct Candidate {
    #[serde(default)]
    pub content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
pub struct CandidateContent {
    #[serde(default)]
    pub parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
pub struct ResponsePart {
    #[serde(default)]
    pub text: Option<String>,
}

impl GenerateContentResponse {
    pub fn into_text(self) -> Result<String> {
        self.candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .and_then(|c| c.parts.into_iter().next())
            .and_then(|p| p.text)
            .ok_or_else(|| Error::Parse("Failed to parse Gemini response.".to_string()))
    }
}
