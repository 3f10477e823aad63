//! Talking to the configured LLM provider
//!
//! Google Gemini gets its own wire format; every other provider (OpenAI,
//! DeepSeek, local proxies) speaks the OpenAI chat-completions dialect.

use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::gemini::{self, GenerateContentResponse};
use crate::logging;
use crate::openai::{self, ApiMessage, ChatCompletionRequest, ChatCompletionResponse, TEMPERATURE};
use crate::persona::ApiConfig;
use crate::transport::{HttpRequest, HttpResponse, Transport};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    OpenAiCompatible,
    Gemini,
}

pub fn detect_dialect(config: &ApiConfig) -> Dialect {
    if config.is_google() {
        Dialect::Gemini
    } else {
        Dialect::OpenAiCompatible
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelInfo {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl ModelInfo {
    /// Listing entries are bare strings, `{id, name}` objects, or Gemini's
    /// `{name: "models/..", displayName}` objects
    fn from_listing(dialect: Dialect, item: &Value) -> Option<Self> {
        match (dialect, item) {
            (_, Value::String(id)) => Some(Self { id: id.clone(), name: None }),
            (Dialect::Gemini, Value::Object(obj)) => obj.get("name").and_then(Value::as_str).map(|name| Self {
                id: name.strip_prefix("models/").unwrap_or(name).to_string(),
                name: obj.get("displayName").and_then(Value::as_str).map(str::to_string),
            }),
            (Dialect::OpenAiCompatible, Value::Object(obj)) => obj.get("id").and_then(Value::as_str).map(|id| Self {
                id: id.to_string(),
                name: obj.get("name").and_then(Value::as_str).map(str::to_string),
            }),
            _ => None,
        }
    }
}

fn listing_array(value: Option<&Value>) -> &[Value] {
    match value {
        Some(Value::Array(items)) => items,
        _ => &[],
    }
}

/// Models out of a listing body. Non-JSON is an error; JSON without a
/// recognisable list yields no models.
pub fn parse_model_listing(dialect: Dialect, body: &str) -> Result<Vec<ModelInfo>> {
    let value: Value = serde_json::from_str(body)
        .map_err(|e| Error::Parse(format!("response is not JSON: {}", e)))?;

    let items: &[Value] = match (&value, dialect) {
        (Value::Array(items), _) => items.as_slice(),
        (Value::Object(obj), Dialect::Gemini) => listing_array(obj.get("models")),
        (Value::Object(obj), Dialect::OpenAiCompatible) => {
            listing_array(obj.get("data").filter(|data| data.is_array()).or_else(|| obj.get("list")))
        }
        _ => &[],
    };

    Ok(items.iter().filter_map(|item| ModelInfo::from_listing(dialect, item)).collect())
}

// ============ Response shapes ============

/// Successful provider body, classified by shape
#[derive(Debug)]
pub enum ProviderResponse {
    OpenAi(ChatCompletionResponse),
    Gemini(GenerateContentResponse),
    RawArray(Vec<Value>),           // bare array; never a completion
}

impl ProviderResponse {
    pub fn classify(dialect: Dialect, body: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(body)
            .map_err(|e| Error::Parse(format!("response is not JSON: {}", e)))?;

        if let Value::Array(items) = value {
            return Ok(ProviderResponse::RawArray(items));
        }

        let unexpected = |e: serde_json::Error| Error::Parse(format!("unexpected response shape: {}", e));
        match dialect {
            Dialect::Gemini => Ok(ProviderResponse::Gemini(serde_json::from_value(value).map_err(unexpected)?)),
            Dialect::OpenAiCompatible => {
                Ok(ProviderResponse::OpenAi(serde_json::from_value(value).map_err(unexpected)?))
            }
        }
    }

    pub fn into_text(self) -> Result<String> {
        match self {
            ProviderResponse::OpenAi(body) => body.into_text(),
            ProviderResponse::Gemini(body) => body.into_text(),
            ProviderResponse::RawArray(_) => Err(Error::Parse("Invalid API response: expected an object".to_string())),
        }
    }
}

// ============ Client ============

/// Provider calls for one API configuration
pub struct LlmClient {
    transport: Arc<dyn Transport>,
}

impl LlmClient {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Run a completion and return the assistant text
    pub async fn complete(&self, config: &ApiConfig, messages: &[ApiMessage]) -> Result<String> {
        if config.api_key.trim().is_empty() {
            return Err(Error::MissingApiKey);
        }

        let dialect = detect_dialect(config);
        let model = config.model();
        let request = match dialect {
            Dialect::Gemini => {
                let body = serde_json::to_value(gemini::convert_messages(messages))?;
                HttpRequest::post(gemini::generate_url(&config.base_url, model, &config.api_key), body)
            }
            Dialect::OpenAiCompatible => {
                let body = serde_json::to_value(ChatCompletionRequest {
                    model,
                    messages,
                    temperature: TEMPERATURE,
                })?;
                HttpRequest::post(openai::chat_completions_url(&config.base_url), body).bearer(&config.api_key)
            }
        };

        logging::log_provider(
            Some(&config.name),
            &format!("Calling {} ({} messages) model={}", provider_label(dialect), messages.len(), model),
        );

        let response = self.transport.execute(request).await?;
        if !response.is_success() {
            let err = http_error(dialect, &response);
            logging::log_error(Some(&config.name), &err.to_string());
            return Err(err);
        }

        ProviderResponse::classify(dialect, &response.body)?.into_text()
    }

    /// List models the provider offers
    pub async fn list_models(&self, config: &ApiConfig) -> Result<Vec<ModelInfo>> {
        if config.api_key.trim().is_empty() {
            return Err(Error::MissingApiKey);
        }

        match detect_dialect(config) {
            Dialect::Gemini => self.list_gemini_models(config).await,
            Dialect::OpenAiCompatible => self.list_openai_models(config).await,
        }
    }

    async fn list_gemini_models(&self, config: &ApiConfig) -> Result<Vec<ModelInfo>> {
        let request = HttpRequest::get(gemini::models_url(&config.base_url, &config.api_key));
        let response = self.transport.execute(request).await?;
        if !response.is_success() {
            return Err(http_error(Dialect::Gemini, &response));
        }
        parse_model_listing(Dialect::Gemini, &response.body)
    }

    /// Try each candidate endpoint; 404 and network failures move on, other
    /// statuses abort
    async fn list_openai_models(&self, config: &ApiConfig) -> Result<Vec<ModelInfo>> {
        let mut last_error = None;

        for url in openai::model_list_candidates(&config.base_url) {
            logging::log_provider(Some(&config.name), &format!("Fetching models from: {}", url));
            let request = HttpRequest::get(url.as_str()).bearer(&config.api_key);

            let response = match self.transport.execute(request).await {
                Ok(response) => response,
                Err(e) => {
                    logging::log_error(Some(&config.name), &format!("Error fetching from {}: {}", url, e));
                    last_error = Some(e);
                    continue;
                }
            };

            if response.is_success() {
                return parse_model_listing(Dialect::OpenAiCompatible, &response.body);
            }

            let err = http_error(Dialect::OpenAiCompatible, &response);
            if response.status == 404 {
                logging::log_provider(Some(&config.name), &format!("404 at: {}", url));
                last_error = Some(err);
                continue;
            }
            return Err(err);
        }

        Err(last_error.unwrap_or_else(|| {
            Error::InvalidInput("Failed to fetch models. Please check your URL and Network.".to_string())
        }))
    }
}

fn provider_label(dialect: Dialect) -> &'static str {
    match dialect {
        Dialect::Gemini => "Gemini",
        Dialect::OpenAiCompatible => "OpenAI",
    }
}

fn http_error(dialect: Dialect, response: &HttpResponse) -> Error {
    Error::Http {
        provider: provider_label(dialect).to_string(),
        status: response.status,
        body: response.body.clone(),
    }
}
