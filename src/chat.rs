use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{NaiveDate, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

use crate::diary::Mood;
use crate::error::{Error, Result};
use crate::logging;
use crate::openai::ApiMessage;
use crate::store::{self, KeyValueStore};

pub const GREETING: &str = "Hi there! How are you feeling today?";

static DATA_URL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^data:(.+);base64,(.+)$").expect("valid data url pattern"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Ai,
}

impl Sender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sender::User => "user",
            Sender::Ai => "ai",
        }
    }
}

/// File attached to a chat message; images travel inline as data URLs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    #[serde(rename = "type")]
    pub kind: String,               // "image" for pictures, anything else is opaque
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Attachment {
    pub fn image(data_url: impl Into<String>) -> Self {
        Self {
            kind: "image".to_string(),
            url: data_url.into(),
            name: None,
        }
    }

    pub fn is_image(&self) -> bool {
        self.kind == "image"
    }

    /// Read an image from disk and inline it as a base64 data URL
    pub fn from_image_file(path: &Path) -> Result<Self> {
        let mime = image_mime_type(path).ok_or_else(|| {
            Error::InvalidInput(format!("unsupported image type: {}", path.display()))
        })?;
        let bytes = std::fs::read(path)?;
        Ok(Self {
            kind: "image".to_string(),
            url: encode_data_url(mime, &bytes),
            name: path.file_name().map(|n| n.to_string_lossy().into_owned()),
        })
    }
}

fn image_mime_type(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "gif" => Some("image/gif"),
        "webp" => Some("image/webp"),
        _ => None,
    }
}

pub fn encode_data_url(mime: &str, bytes: &[u8]) -> String {
    format!("data:{};base64,{}", mime, STANDARD.encode(bytes))
}

/// Split `data:<mime>;base64,<payload>` into (mime, payload)
pub fn parse_data_url(url: &str) -> Option<(String, String)> {
    let caps = DATA_URL_RE.captures(url)?;
    Some((caps[1].to_string(), caps[2].to_string()))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: i64,                    // creation time in ms
    pub sender: Sender,
    #[serde(default)]
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment: Option<Attachment>,
}

impl ChatMessage {
    pub fn new(id: i64, sender: Sender, text: impl Into<String>) -> Self {
        Self {
            id,
            sender,
            text: text.into(),
            attachment: None,
        }
    }

    pub fn greeting(id: i64) -> Self {
        Self::new(id, Sender::Ai, GREETING)
    }

    pub fn is_user(&self) -> bool {
        self.sender == Sender::User
    }

    /// The canned opener a fresh or cleared day starts with
    pub fn is_greeting(&self) -> bool {
        self.sender == Sender::Ai && self.text == GREETING
    }

    /// Copy kept inside a saved diary; images are dropped to save space
    pub fn without_attachment(&self) -> Self {
        Self {
            attachment: None,
            ..self.clone()
        }
    }
}

/// Next message id: the current time, bumped past the last id so ids stay unique
pub fn next_message_id(messages: &[ChatMessage]) -> i64 {
    let now = Utc::now().timestamp_millis();
    match messages.last() {
        Some(last) if last.id >= now => last.id + 1,
        _ => now,
    }
}

// ============ Drafts ============

/// Manual-editor state saved per date while the user writes
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Draft {
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub mood: Mood,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub messages: Vec<ApiMessage>,  // polish assistant conversation
    #[serde(default)]
    pub is_assistant_open: bool,
    #[serde(default)]
    pub timestamp: i64,
}

impl Draft {
    pub fn is_blank(&self) -> bool {
        self.content.trim().is_empty() && self.title.trim().is_empty()
    }
}

// ============ Chat Log Service ============

/// Per-date chat logs and drafts
pub struct ChatLogService {
    store: Arc<dyn KeyValueStore>,
}

impl ChatLogService {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Messages persisted for `date`, without seeding a greeting
    pub fn stored(&self, date: NaiveDate) -> Vec<ChatMessage> {
        store::read_json(self.store.as_ref(), &store::chat_key(&date.to_string())).unwrap_or_default()
    }

    /// Log for `date` as the chat screen shows it. Today may still be held
    /// under the legacy single-log key; a fresh day starts with a greeting.
    pub fn load(&self, date: NaiveDate, today: NaiveDate) -> Vec<ChatMessage> {
        let key = store::chat_key(&date.to_string());
        if let Some(messages) = store::read_json::<Vec<ChatMessage>>(self.store.as_ref(), &key) {
            return messages;
        }

        if date == today {
            if let Some(legacy) = store::read_json::<Vec<ChatMessage>>(self.store.as_ref(), store::LEGACY_CHAT_KEY) {
                logging::log_chat(Some(&key), &format!("Migrated {} legacy messages", legacy.len()));
                return legacy;
            }
        }

        vec![ChatMessage::greeting(1)]
    }

    pub fn save(&self, date: NaiveDate, today: NaiveDate, messages: &[ChatMessage]) -> Result<()> {
        store::write_json(self.store.as_ref(), &store::chat_key(&date.to_string()), messages)?;
        if date == today {
            store::write_json(self.store.as_ref(), store::LEGACY_CHAT_KEY, messages)?;
        }
        Ok(())
    }

    /// Last `limit` messages of the calendar day before `date`
    pub fn previous_day(&self, date: NaiveDate, limit: usize) -> Vec<ChatMessage> {
        match date.pred_opt() {
            Some(prev) => self.recent(prev, limit),
            None => Vec::new(),
        }
    }

    /// Last `limit` persisted messages of `date`
    pub fn recent(&self, date: NaiveDate, limit: usize) -> Vec<ChatMessage> {
        let messages = self.stored(date);
        let start = messages.len().saturating_sub(limit);
        messages[start..].to_vec()
    }

    /// Dates that have a persisted chat log, oldest first
    pub fn dates_with_chat(&self) -> Result<Vec<NaiveDate>> {
        let keys = self.store.keys_with_prefix(store::CHAT_PREFIX)?;
        Ok(keys
            .iter()
            .filter_map(|k| k.strip_prefix(store::CHAT_PREFIX))
            .filter_map(|d| d.parse().ok())
            .collect())
    }

    pub fn load_draft(&self, date: NaiveDate) -> Option<Draft> {
        store::read_json(self.store.as_ref(), &store::draft_key(&date.to_string()))
    }

    pub fn save_draft(&self, date: NaiveDate, draft: &Draft) -> Result<()> {
        store::write_json(self.store.as_ref(), &store::draft_key(&date.to_string()), draft)
    }

    pub fn clear_draft(&self, date: NaiveDate) -> Result<()> {
        self.store.remove(&store::draft_key(&date.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    #[test]
    fn test_parse_data_url() {
        let (mime, data) = parse_data_url("data:image/webp;base64,AAAA").unwrap();
        assert_eq!(mime, "image/webp");
        assert_eq!(data, "AAAA");
        assert!(parse_data_url("https://example.com/cat.png").is_none());
    }

    #[test]
    fn test_attachment_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cat.PNG");
        std::fs::write(&path, [1u8, 2, 3]).unwrap();
        let attachment = Attachment::from_image_file(&path).unwrap();
        assert!(attachment.is_image());
        assert_eq!(attachment.url, "data:image/png;base64,AQID");
        assert_eq!(attachment.name.as_deref(), Some("cat.PNG"));

        let txt = dir.path().join("notes.txt");
        std::fs::write(&txt, "hi").unwrap();
        assert!(matches!(Attachment::from_image_file(&txt), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_load_seeds_greeting_and_migrates_legacy() {
        let kv = Arc::new(MemoryStore::new());
        let log = ChatLogService::new(kv.clone());
        let today = date("2024-05-02");

        let fresh = log.load(date("2024-05-01"), today);
        assert_eq!(fresh, vec![ChatMessage::greeting(1)]);

        let legacy = vec![ChatMessage::new(10, Sender::User, "old")];
        store::write_json(kv.as_ref(), store::LEGACY_CHAT_KEY, &legacy).unwrap();
        assert_eq!(log.load(today, today), legacy);
        // Legacy log only applies to today
        assert_eq!(log.load(date("2024-05-01"), today), vec![ChatMessage::greeting(1)]);
    }

    #[test]
    fn test_save_today_mirrors_legacy_key() {
        let kv = Arc::new(MemoryStore::new());
        let log = ChatLogService::new(kv.clone());
        let today = date("2024-05-02");
        let messages = vec![ChatMessage::new(5, Sender::User, "hello")];

        log.save(date("2024-05-01"), today, &messages).unwrap();
        assert!(kv.get(store::LEGACY_CHAT_KEY).unwrap().is_none());

        log.save(today, today, &messages).unwrap();
        assert!(kv.get(store::LEGACY_CHAT_KEY).unwrap().is_some());
        assert_eq!(log.dates_with_chat().unwrap(), vec![date("2024-05-01"), today]);
    }

    #[test]
    fn test_previous_day_takes_last_twenty() {
        let kv = Arc::new(MemoryStore::new());
        let log = ChatLogService::new(kv);
        let yesterday: Vec<ChatMessage> = (0..25)
            .map(|i| ChatMessage::new(i, Sender::User, format!("m{}", i)))
            .collect();
        log.save(date("2024-02-29"), date("2024-03-01"), &yesterday).unwrap();

        let carried = log.previous_day(date("2024-03-01"), 20);
        assert_eq!(carried.len(), 20);
        assert_eq!(carried[0].text, "m5");
        assert_eq!(carried[19].text, "m24");
        assert!(log.previous_day(date("2024-03-05"), 20).is_empty());
    }

    #[test]
    fn test_next_message_id_is_strictly_increasing() {
        let future = Utc::now().timestamp_millis() + 60_000;
        let messages = vec![ChatMessage::new(future, Sender::Ai, "x")];
        assert_eq!(next_message_id(&messages), future + 1);
        assert!(next_message_id(&[]) > 1);
    }

    #[test]
    fn test_draft_roundtrip_and_clear() {
        let kv = Arc::new(MemoryStore::new());
        let log = ChatLogService::new(kv);
        let day = date("2024-05-01");
        let draft = Draft {
            content: "<p>rainy</p>".to_string(),
            title: "Rain".to_string(),
            mood: Mood::Calm,
            tags: vec!["weather".to_string()],
            ..Draft::default()
        };
        log.save_draft(day, &draft).unwrap();
        assert_eq!(log.load_draft(day), Some(draft));
        log.clear_draft(day).unwrap();
        assert_eq!(log.load_draft(day), None);
    }
}
