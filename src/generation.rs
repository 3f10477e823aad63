//! Reading diary JSON and briefing JSON back out of model replies

use chrono::{NaiveDate, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};

use crate::chat::ChatMessage;
use crate::context::truncate_chars;
use crate::diary::{AiBriefing, DiaryEntry, Mood};
use crate::logging;

static CODE_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)```(?:json)?\s*([\s\S]*?)\s*```").expect("valid code fence pattern"));
static HTML_BODY_TAGS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)</?(?:html|body)>").expect("valid html tag pattern"));

/// A diary as the model wrote it, before it is stored
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedDiary {
    pub title: String,
    pub content: String,            // HTML
    pub mood: Mood,
    pub tags: Vec<String>,
    pub category: String,
    pub summary: String,
    pub ai_briefing: Option<AiBriefing>,
}

impl GeneratedDiary {
    /// Entry for `date`, keeping a copy of the chat without attachments
    pub fn into_entry(self, date: NaiveDate, chat: &[ChatMessage]) -> DiaryEntry {
        let mut entry = DiaryEntry::new(date, self.title, self.content);
        entry.mood = self.mood;
        entry.tags = self.tags;
        entry.category = self.category;
        entry.summary = self.summary;
        entry.ai_briefing = self.ai_briefing;
        entry.chat_history = chat.iter().map(ChatMessage::without_attachment).collect();
        entry.created_at = Some(Utc::now());
        entry
    }
}

/// Loosely typed text: lists are joined, numbers and booleans printed,
/// anything else dropped
fn text_field(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(text) => Some(text.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Array(items) => {
            let parts: Vec<String> = items
                .iter()
                .filter_map(|item| text_field(Some(item)))
                .filter(|part| !part.trim().is_empty())
                .collect();
            Some(parts.join(", "))
        }
        _ => None,
    }
}

/// A single tag string or a list of them
fn tag_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| text_field(Some(item)))
            .filter(|tag| !tag.trim().is_empty())
            .collect(),
        other => text_field(other).into_iter().filter(|tag| !tag.trim().is_empty()).collect(),
    }
}

fn briefing_from(fields: &Map<String, Value>) -> AiBriefing {
    AiBriefing {
        events: text_field(fields.get("events")).unwrap_or_default(),
        atmosphere_or_emotion: text_field(fields.get("atmosphere_or_emotion")).unwrap_or_default(),
        unfinished_topics: text_field(fields.get("unfinished_topics"))
            .filter(|t| !t.trim().is_empty() && t != "null"),
    }
}

/// Parse the diary JSON from a reply. Never fails: a reply that is not a
/// JSON object becomes the content of a generic entry. Fields of the wrong
/// type are coerced or dropped one by one.
pub fn parse_generated_diary(response: &str) -> GeneratedDiary {
    let payload = CODE_FENCE
        .captures(response)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
        .filter(|s| !s.is_empty())
        .unwrap_or(response);

    match serde_json::from_str::<Value>(payload) {
        Ok(Value::Object(fields)) => GeneratedDiary {
            title: text_field(fields.get("title")).unwrap_or_default(),
            content: text_field(fields.get("content")).unwrap_or_default(),
            mood: text_field(fields.get("mood")).map(|m| Mood::from_label(&m)).unwrap_or_default(),
            tags: tag_list(fields.get("tags")),
            category: text_field(fields.get("category")).unwrap_or_default(),
            summary: text_field(fields.get("summary")).unwrap_or_default(),
            ai_briefing: match fields.get("ai_briefing") {
                Some(Value::Object(briefing)) => Some(briefing_from(briefing)),
                _ => None,
            },
        },
        other => {
            let reason = match other {
                Ok(_) => "not a JSON object".to_string(),
                Err(e) => e.to_string(),
            };
            logging::log_error(None, &format!(
                "Failed to parse diary JSON: {}. Response: {}", reason, truncate_chars(payload, 200)
            ));
            GeneratedDiary {
                title: "Generated Diary".to_string(),
                content: HTML_BODY_TAGS.replace_all(payload, "").trim().to_string(),
                mood: Mood::Neutral,
                tags: vec!["generated".to_string()],
                category: String::new(),
                summary: "Auto-generated diary entry.".to_string(),
                ai_briefing: None,
            }
        }
    }
}

/// Parse a briefing reply for a handwritten entry
pub fn parse_briefing(response: &str) -> Option<AiBriefing> {
    let cleaned = response.replace("```json", "").replace("```", "");
    match serde_json::from_str::<Value>(cleaned.trim()).ok()? {
        Value::Object(fields) => Some(briefing_from(&fields)),
        _ => None,
    }
}

/// Briefing used when the model could not produce one
pub fn fallback_briefing(content: &str) -> AiBriefing {
    AiBriefing {
        events: format!("{}...", truncate_chars(content, 100)),
        atmosphere_or_emotion: "Unknown".to_string(),
        unfinished_topics: None,
    }
}
