use chrono::{DateTime, Datelike, NaiveDate, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::chat::ChatMessage;
use crate::error::{Error, Result};
use crate::logging;
use crate::store::{self, KeyValueStore};

/// Categories offered before the user has invented any of their own
pub const DEFAULT_CATEGORIES: [&str; 6] = ["Daily Life", "Work", "Travel", "Emotions", "Dreams", "Reading"];

const UNCATEGORIZED: &str = "Uncategorized";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Mood {
    Happy,
    Excited,
    #[default]
    Neutral,
    Sad,
    Loved,
    Calm,
    Anxious,
    Angry,
}

impl Mood {
    pub const ALL: [Mood; 8] = [
        Mood::Happy,
        Mood::Excited,
        Mood::Neutral,
        Mood::Sad,
        Mood::Loved,
        Mood::Calm,
        Mood::Anxious,
        Mood::Angry,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Mood::Happy => "happy",
            Mood::Excited => "excited",
            Mood::Neutral => "neutral",
            Mood::Sad => "sad",
            Mood::Loved => "loved",
            Mood::Calm => "calm",
            Mood::Anxious => "anxious",
            Mood::Angry => "angry",
        }
    }

    /// Case-insensitive; anything unrecognised reads as neutral
    pub fn from_label(label: &str) -> Self {
        let label = label.trim().to_lowercase();
        Mood::ALL
            .into_iter()
            .find(|m| m.as_str() == label)
            .unwrap_or_default()
    }
}

impl From<String> for Mood {
    fn from(label: String) -> Self {
        Mood::from_label(&label)
    }
}

impl From<Mood> for String {
    fn from(mood: Mood) -> Self {
        mood.as_str().to_string()
    }
}

/// Memory note for future AI calls about the day an entry covers
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AiBriefing {
    #[serde(default)]
    pub events: String,
    #[serde(default)]
    pub atmosphere_or_emotion: String,
    #[serde(default)]
    pub unfinished_topics: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommentAuthor {
    #[default]
    Ai,
    User,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub id: String,
    #[serde(default)]
    pub author: CommentAuthor,
    pub text: String,
    pub date: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiaryEntry {
    pub id: String,
    pub date: NaiveDate,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,            // HTML
    #[serde(default)]
    pub mood: Mood,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub comments: Vec<Comment>,
    #[serde(default)]
    pub chat_history: Vec<ChatMessage>,
    #[serde(rename = "ai_briefing", default, skip_serializing_if = "Option::is_none")]
    pub ai_briefing: Option<AiBriefing>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl DiaryEntry {
    pub fn new(date: NaiveDate, title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: new_diary_id(),
            date,
            title: title.into(),
            content: content.into(),
            mood: Mood::Neutral,
            tags: Vec::new(),
            category: String::new(),
            summary: String::new(),
            comments: Vec::new(),
            chat_history: Vec::new(),
            ai_briefing: None,
            created_at: None,
        }
    }

    /// Millisecond timestamp encoded at the front of generated ids
    pub fn id_timestamp(&self) -> Option<i64> {
        let digits: String = self.id.chars().take_while(|c| c.is_ascii_digit()).take(13).collect();
        digits.parse().ok()
    }
}

/// Millisecond timestamp followed by 9 random base-36 characters
pub fn new_diary_id() -> String {
    const ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    let mut rng = rand::rng();
    let suffix: String = (0..9)
        .map(|_| ALPHABET[rng.random_range(0..ALPHABET.len())] as char)
        .collect();
    format!("{}{}", Utc::now().timestamp_millis(), suffix)
}

/// Partial edit of a saved entry; `None` leaves a field unchanged
#[derive(Debug, Clone, Default)]
pub struct DiaryUpdate {
    pub title: Option<String>,
    pub content: Option<String>,
    pub mood: Option<Mood>,
    pub tags: Option<Vec<String>>,
    pub category: Option<String>,
    pub summary: Option<String>,
    pub ai_briefing: Option<AiBriefing>,
}

impl DiaryUpdate {
    fn apply(self, entry: &mut DiaryEntry) {
        if let Some(title) = self.title {
            entry.title = title;
        }
        if let Some(content) = self.content {
            entry.content = content;
        }
        if let Some(mood) = self.mood {
            entry.mood = mood;
        }
        if let Some(tags) = self.tags {
            entry.tags = tags;
        }
        if let Some(category) = self.category {
            entry.category = category;
        }
        if let Some(summary) = self.summary {
            entry.summary = summary;
        }
        if let Some(briefing) = self.ai_briefing {
            entry.ai_briefing = Some(briefing);
        }
    }
}

// ============ Diary Service ============

/// The diary collection. Changes apply in memory first; a failed write is
/// reported to the caller and the in-memory state is kept.
pub struct DiaryService {
    store: Arc<dyn KeyValueStore>,
    diaries: Vec<DiaryEntry>,
}

impl DiaryService {
    /// Entries that no longer decode are logged and skipped
    pub fn load(store: Arc<dyn KeyValueStore>) -> Self {
        let raw: Vec<Value> = store::read_json(store.as_ref(), store::DIARIES_KEY).unwrap_or_default();
        let diaries = raw
            .into_iter()
            .filter_map(|value| match serde_json::from_value::<DiaryEntry>(value) {
                Ok(entry) => Some(entry),
                Err(e) => {
                    logging::log_storage(Some(store::DIARIES_KEY), &format!("Skipping unreadable diary: {}", e));
                    None
                }
            })
            .collect();
        Self { store, diaries }
    }

    fn persist(&self) -> Result<()> {
        store::write_json(self.store.as_ref(), store::DIARIES_KEY, &self.diaries)
    }

    pub fn all(&self) -> &[DiaryEntry] {
        &self.diaries
    }

    pub fn by_id(&self, id: &str) -> Option<&DiaryEntry> {
        self.diaries.iter().find(|d| d.id == id)
    }

    /// First entry written for `date`
    pub fn by_date(&self, date: NaiveDate) -> Option<&DiaryEntry> {
        self.diaries.iter().find(|d| d.date == date)
    }

    pub fn all_by_date(&self, date: NaiveDate) -> Vec<&DiaryEntry> {
        self.diaries.iter().filter(|d| d.date == date).collect()
    }

    /// Append an entry; several entries per day are allowed
    pub fn add(&mut self, mut entry: DiaryEntry) -> Result<DiaryEntry> {
        if entry.created_at.is_none() {
            entry.created_at = Some(Utc::now());
        }
        self.diaries.push(entry.clone());
        logging::log_diary(Some(&entry.date.to_string()), &format!("Added diary {}", entry.id));
        self.persist()?;
        Ok(entry)
    }

    /// Insert or replace by id. Replacing keeps the stored id and creation time.
    pub fn save(&mut self, mut entry: DiaryEntry) -> Result<DiaryEntry> {
        let Some(pos) = self.diaries.iter().position(|d| d.id == entry.id) else {
            return self.add(entry);
        };

        entry.created_at = self.diaries[pos].created_at.or(entry.created_at);
        if self.diaries[pos] == entry {
            return Ok(entry);
        }
        self.diaries[pos] = entry.clone();
        self.persist()?;
        Ok(entry)
    }

    pub fn update(&mut self, id: &str, update: DiaryUpdate) -> Result<()> {
        let entry = self.find_mut(id)?;
        update.apply(entry);
        self.persist()
    }

    pub fn delete(&mut self, id: &str) -> Result<()> {
        let before = self.diaries.len();
        self.diaries.retain(|d| d.id != id);
        if self.diaries.len() == before {
            return Err(Error::NotFound(format!("diary {}", id)));
        }
        // The date's chat log is left in place
        logging::log_diary(None, &format!("Deleted diary {}", id));
        self.persist()
    }

    pub fn delete_chat_history(&mut self, id: &str) -> Result<()> {
        let entry = self.find_mut(id)?;
        entry.chat_history.clear();
        self.persist()
    }

    pub fn add_comment(&mut self, id: &str, author: CommentAuthor, text: impl Into<String>) -> Result<Comment> {
        let entry = self.find_mut(id)?;
        let now = Utc::now();
        let mut comment_id = now.timestamp_millis();
        while entry.comments.iter().any(|c| c.id == comment_id.to_string()) {
            comment_id += 1;
        }
        let comment = Comment {
            id: comment_id.to_string(),
            author,
            text: text.into(),
            date: now,
        };
        entry.comments.push(comment.clone());
        self.persist()?;
        Ok(comment)
    }

    pub fn delete_comment(&mut self, diary_id: &str, comment_id: &str) -> Result<()> {
        let entry = self.find_mut(diary_id)?;
        entry.comments.retain(|c| c.id != comment_id);
        self.persist()
    }

    /// Up to `limit` entries dated strictly before `date`, newest first
    pub fn recent_before(&self, date: NaiveDate, limit: usize) -> Vec<&DiaryEntry> {
        let mut earlier: Vec<&DiaryEntry> = self.diaries.iter().filter(|d| d.date < date).collect();
        earlier.sort_by(|a, b| b.date.cmp(&a.date));
        earlier.truncate(limit);
        earlier
    }

    /// Default categories followed by any the user has used, without duplicates
    pub fn categories(&self) -> Vec<String> {
        let mut categories: Vec<String> = DEFAULT_CATEGORIES.iter().map(|c| c.to_string()).collect();
        for diary in &self.diaries {
            let category = diary.category.trim();
            if !category.is_empty() && !categories.iter().any(|c| c == category) {
                categories.push(category.to_string());
            }
        }
        categories
    }

    pub fn by_category(&self) -> BTreeMap<String, Vec<&DiaryEntry>> {
        let mut grouped: BTreeMap<String, Vec<&DiaryEntry>> = BTreeMap::new();
        for diary in &self.diaries {
            let category = match diary.category.trim() {
                "" => UNCATEGORIZED.to_string(),
                c => c.to_string(),
            };
            grouped.entry(category).or_default().push(diary);
        }
        grouped
    }

    /// Entries of one calendar month, oldest first
    pub fn in_month(&self, year: i32, month: u32) -> Vec<&DiaryEntry> {
        let mut entries: Vec<&DiaryEntry> = self
            .diaries
            .iter()
            .filter(|d| d.date.year() == year && d.date.month() == month)
            .collect();
        entries.sort_by(|a, b| a.date.cmp(&b.date));
        entries
    }

    pub fn replace_all(&mut self, diaries: Vec<DiaryEntry>) -> Result<()> {
        self.diaries = diaries;
        self.persist()
    }

    fn find_mut(&mut self, id: &str) -> Result<&mut DiaryEntry> {
        self.diaries
            .iter_mut()
            .find(|d| d.id == id)
            .ok_or_else(|| Error::NotFound(format!("diary {}", id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    fn service() -> (Arc<MemoryStore>, DiaryService) {
        let kv = Arc::new(MemoryStore::new());
        let service = DiaryService::load(kv.clone());
        (kv, service)
    }

    #[test]
    fn test_mood_labels() {
        assert_eq!(Mood::from_label("Happy"), Mood::Happy);
        assert_eq!(Mood::from_label(" ANXIOUS "), Mood::Anxious);
        assert_eq!(Mood::from_label("melancholic"), Mood::Neutral);
        let json = serde_json::to_string(&Mood::Loved).unwrap();
        assert_eq!(json, "\"loved\"");
    }

    #[test]
    fn test_new_diary_id_shape() {
        let id = new_diary_id();
        assert_eq!(id.len(), 13 + 9);
        let entry = DiaryEntry { id, ..DiaryEntry::new(date("2024-05-01"), "t", "c") };
        assert!(entry.id_timestamp().unwrap() > 1_600_000_000_000);
    }

    #[test]
    fn test_add_fills_created_at_and_persists() {
        let (kv, mut diaries) = service();
        let saved = diaries.add(DiaryEntry::new(date("2024-05-01"), "Rain", "<p>wet</p>")).unwrap();
        assert!(saved.created_at.is_some());

        let reloaded = DiaryService::load(kv);
        assert_eq!(reloaded.all(), &[saved]);
    }

    #[test]
    fn test_load_skips_unreadable_entries() {
        let kv = Arc::new(MemoryStore::new());
        kv.set(
            store::DIARIES_KEY,
            r#"[{"id":"1","date":"2024-05-01","title":"Kept"},{"id":"2","date":"someday","title":"Broken"}]"#,
        )
        .unwrap();

        let mut diaries = DiaryService::load(kv.clone());
        assert_eq!(diaries.all().len(), 1);
        assert_eq!(diaries.all()[0].title, "Kept");

        diaries.add(DiaryEntry::new(date("2024-05-02"), "New", "")).unwrap();
        let titles: Vec<String> = DiaryService::load(kv).all().iter().map(|d| d.title.clone()).collect();
        assert_eq!(titles, vec!["Kept", "New"]);
    }

    #[test]
    fn test_resave_unchanged_keeps_id_and_created_at() {
        let (_kv, mut diaries) = service();
        let saved = diaries.add(DiaryEntry::new(date("2024-05-01"), "Rain", "<p>wet</p>")).unwrap();

        let mut again = saved.clone();
        again.created_at = None;
        let resaved = diaries.save(again).unwrap();
        assert_eq!(resaved.id, saved.id);
        assert_eq!(resaved.created_at, saved.created_at);
        assert_eq!(diaries.all().len(), 1);

        let mut edited = saved.clone();
        edited.title = "Storm".to_string();
        let resaved = diaries.save(edited).unwrap();
        assert_eq!(resaved.created_at, saved.created_at);
        assert_eq!(diaries.by_id(&saved.id).unwrap().title, "Storm");
    }

    #[test]
    fn test_update_delete_and_comments() {
        let (_kv, mut diaries) = service();
        let entry = diaries.add(DiaryEntry::new(date("2024-05-01"), "Rain", "wet")).unwrap();

        diaries
            .update(&entry.id, DiaryUpdate { mood: Some(Mood::Sad), tags: Some(vec!["rain".into()]), ..Default::default() })
            .unwrap();
        let updated = diaries.by_id(&entry.id).unwrap();
        assert_eq!(updated.mood, Mood::Sad);
        assert_eq!(updated.title, "Rain");

        let first = diaries.add_comment(&entry.id, CommentAuthor::Ai, "Still raining?").unwrap();
        let second = diaries.add_comment(&entry.id, CommentAuthor::User, "yes").unwrap();
        assert_ne!(first.id, second.id);
        diaries.delete_comment(&entry.id, &first.id).unwrap();
        assert_eq!(diaries.by_id(&entry.id).unwrap().comments, vec![second]);

        diaries.delete(&entry.id).unwrap();
        assert!(matches!(diaries.delete(&entry.id), Err(Error::NotFound(_))));
    }

    #[test]
    fn test_recent_before_is_strict_and_newest_first() {
        let (_kv, mut diaries) = service();
        for day in ["2024-05-01", "2024-05-03", "2024-05-02", "2024-05-04"] {
            diaries.add(DiaryEntry::new(date(day), day, "")).unwrap();
        }
        let recent: Vec<String> = diaries
            .recent_before(date("2024-05-04"), 2)
            .iter()
            .map(|d| d.date.to_string())
            .collect();
        assert_eq!(recent, vec!["2024-05-03", "2024-05-02"]);
    }

    #[test]
    fn test_categories_merge_defaults() {
        let (_kv, mut diaries) = service();
        let mut a = DiaryEntry::new(date("2024-05-01"), "a", "");
        a.category = "Work".to_string();
        let mut b = DiaryEntry::new(date("2024-06-01"), "b", "");
        b.category = "Gardening".to_string();
        diaries.add(a).unwrap();
        diaries.add(b).unwrap();
        diaries.add(DiaryEntry::new(date("2024-06-02"), "c", "")).unwrap();

        let categories = diaries.categories();
        assert_eq!(categories.len(), DEFAULT_CATEGORIES.len() + 1);
        assert_eq!(categories.last().map(String::as_str), Some("Gardening"));

        let grouped = diaries.by_category();
        assert_eq!(grouped["Uncategorized"].len(), 1);
        assert_eq!(diaries.in_month(2024, 6).len(), 2);
    }

    #[test]
    fn test_failed_write_keeps_memory_state() {
        let kv = Arc::new(MemoryStore::with_quota(64));
        let mut diaries = DiaryService::load(kv.clone());
        let big = DiaryEntry::new(date("2024-05-01"), "big", "x".repeat(200));
        assert!(matches!(diaries.add(big), Err(Error::Storage(_))));
        assert_eq!(diaries.all().len(), 1);
        assert!(kv.get(store::DIARIES_KEY).unwrap().is_none());
    }

    #[test]
    fn test_reads_original_backup_shape() {
        let raw = r#"[{"id":"1","date":"2024-05-01","title":"Start","content":"hi","mood":"melancholic",
            "comments":[{"id":"c1","author":"ai","text":"glad","date":"2024-05-01T10:00:00.000Z"}],
            "ai_briefing":{"events":"started","atmosphere_or_emotion":"calm","unfinished_topics":null}}]"#;
        let diaries: Vec<DiaryEntry> = serde_json::from_str(raw).unwrap();
        assert_eq!(diaries[0].mood, Mood::Neutral);
        assert_eq!(diaries[0].comments[0].author, CommentAuthor::Ai);
        assert_eq!(diaries[0].ai_briefing.as_ref().unwrap().unfinished_topics, None);
        assert!(diaries[0].chat_history.is_empty());
    }
}
