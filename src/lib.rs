//! ChatDiary: chat with an AI companion during the day, then turn the
//! conversation into a diary entry.
//!
//! `DiaryApp` is the one object a front end talks to. Each user action is a
//! method returning `Result`; nothing here prints or prompts.

pub mod backup;
pub mod chat;
pub mod composer;
pub mod config;
pub mod context;
pub mod diary;
pub mod error;
pub mod gemini;
pub mod generation;
pub mod logging;
pub mod openai;
pub mod persona;
pub mod polish;
pub mod profile;
pub mod prompts;
pub mod provider;
pub mod splitter;
pub mod store;
pub mod transport;

use std::sync::Arc;

use chrono::{Local, NaiveDate, Utc};

use backup::ImportSummary;
use chat::{Attachment, ChatLogService, ChatMessage, Draft, Sender};
use composer::PolishContext;
use config::AppConfig;
use context::PREVIOUS_DAY_LIMIT;
use diary::{AiBriefing, Comment, CommentAuthor, DiaryEntry, DiaryService};
use generation::GeneratedDiary;
use openai::{ApiMessage, Role};
use persona::{ApiConfig, PersonaService};
use polish::PolishUpdate;
use profile::ProfileService;
use prompts::DiaryStyle;
use provider::{LlmClient, ModelInfo};
use splitter::Pacing;
use store::{KeyValueStore, SqliteStore};
use transport::{ReqwestTransport, Transport};

pub use error::{Error, Result};

/// Local calendar date right now
pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

pub struct DiaryApp {
    diaries: DiaryService,
    personas: PersonaService,
    profile: ProfileService,
    chat_log: ChatLogService,
    client: LlmClient,
    pacing: Pacing,
    active_date: NaiveDate,
    messages: Vec<ChatMessage>,     // chat log of active_date
}

impl DiaryApp {
    pub fn new(store: Arc<dyn KeyValueStore>, transport: Arc<dyn Transport>, pacing: Pacing) -> Self {
        let chat_log = ChatLogService::new(store.clone());
        let active_date = today();
        let messages = chat_log.load(active_date, active_date);

        Self {
            diaries: DiaryService::load(store.clone()),
            personas: PersonaService::load(store.clone()),
            profile: ProfileService::load(store),
            chat_log,
            client: LlmClient::new(transport),
            pacing,
            active_date,
            messages,
        }
    }

    /// Open the on-disk store and start logging
    pub fn open(config: &AppConfig) -> Result<Self> {
        if let Err(e) = logging::init_logging(&config.log_dir) {
            eprintln!("Failed to initialize logging: {}", e);
        }
        let _ = logging::cleanup_old_logs();

        std::fs::create_dir_all(&config.data_dir)?;
        let store = SqliteStore::open(&config.db_path)?;
        logging::log_storage(None, &format!("Opened store at {}", config.db_path.display()));

        Ok(Self::new(Arc::new(store), Arc::new(ReqwestTransport::new()), config.pacing))
    }

    pub fn diaries(&self) -> &DiaryService {
        &self.diaries
    }

    pub fn diaries_mut(&mut self) -> &mut DiaryService {
        &mut self.diaries
    }

    pub fn personas(&self) -> &PersonaService {
        &self.personas
    }

    pub fn personas_mut(&mut self) -> &mut PersonaService {
        &mut self.personas
    }

    pub fn profile(&self) -> &ProfileService {
        &self.profile
    }

    pub fn profile_mut(&mut self) -> &mut ProfileService {
        &mut self.profile
    }

    pub fn chat_log(&self) -> &ChatLogService {
        &self.chat_log
    }

    // ============ Chat ============

    /// Switch the day being chatted about and load its log
    pub fn set_active_date(&mut self, date: NaiveDate) {
        self.active_date = date;
        self.messages = self.chat_log.load(date, today());
    }

    pub fn active_date(&self) -> NaiveDate {
        self.active_date
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    fn persist_chat(&self) -> Result<()> {
        self.chat_log.save(self.active_date, today(), &self.messages)
    }

    fn scope(&self) -> String {
        self.active_date.to_string()
    }

    /// Append a user message. Needs text or an attachment.
    pub fn send_message(&mut self, text: &str, attachment: Option<Attachment>) -> Result<ChatMessage> {
        if text.trim().is_empty() && attachment.is_none() {
            return Err(Error::InvalidInput("Message is empty".to_string()));
        }

        let mut message = ChatMessage::new(chat::next_message_id(&self.messages), Sender::User, text.trim());
        message.attachment = attachment;
        self.messages.push(message.clone());
        self.persist_chat()?;

        logging::log_chat(Some(&self.scope()), &format!(
            "User message {} ({} chars{})",
            message.id,
            message.text.chars().count(),
            if message.attachment.is_some() { ", with image" } else { "" }
        ));
        Ok(message)
    }

    /// Ask the model for the next reply to `history`, already split into bubbles
    pub async fn generate_chat_response(&self, history: &[ChatMessage]) -> Result<Vec<String>> {
        let persona = self.personas.current_persona();
        let config = self.personas.current_api_config();

        let previous_day = self.chat_log.previous_day(self.active_date, PREVIOUS_DAY_LIMIT);
        let ctx = context::gather_chat_context(self.active_date, self.diaries.all(), previous_day, history);
        let request = composer::compose_chat_reply(&persona, self.profile.profile(), self.active_date, &ctx);

        let raw = self.client.complete(&config, &request).await?;
        let parts = splitter::split_response(&raw);
        logging::log_chat(Some(&self.scope()), &format!("Reply split into {} parts", parts.len()));
        Ok(parts)
    }

    /// Generate a reply to the current log and append it bubble by bubble.
    /// `on_message` sees each AI message as it lands.
    pub async fn trigger_ai_response<F>(&mut self, mut on_message: F) -> Result<Vec<ChatMessage>>
    where
        F: FnMut(&ChatMessage),
    {
        let history = self.messages.clone();
        let parts = self.generate_chat_response(&history).await?;
        let several = parts.len() > 1;

        let mut appended = Vec::with_capacity(parts.len());
        for part in parts {
            if self.pacing == Pacing::Natural {
                tokio::time::sleep(splitter::typing_delay(&part)).await;
            }

            let message = ChatMessage::new(chat::next_message_id(&self.messages), Sender::Ai, part);
            self.messages.push(message.clone());
            self.persist_chat()?;
            on_message(&message);
            appended.push(message);

            if several && self.pacing == Pacing::Natural {
                tokio::time::sleep(splitter::PART_GAP).await;
            }
        }

        Ok(appended)
    }

    /// Drop the trailing run of AI messages and ask again. No-op when the
    /// log does not end with an AI message.
    pub async fn regenerate_last_response<F>(&mut self, on_message: F) -> Result<Vec<ChatMessage>>
    where
        F: FnMut(&ChatMessage),
    {
        let keep = self.messages.iter().rposition(|m| m.is_user()).map_or(0, |i| i + 1);
        if keep == self.messages.len() {
            return Ok(Vec::new());
        }

        let dropped = self.messages.len() - keep;
        self.messages.truncate(keep);
        self.persist_chat()?;
        logging::log_chat(Some(&self.scope()), &format!("Reroll: dropped {} AI messages", dropped));

        self.trigger_ai_response(on_message).await
    }

    pub fn edit_message(&mut self, id: i64, text: &str) -> Result<()> {
        let message = self
            .messages
            .iter_mut()
            .find(|m| m.id == id)
            .ok_or_else(|| Error::NotFound(format!("message {}", id)))?;
        message.text = text.to_string();
        self.persist_chat()
    }

    /// Remove every message whose id is in `ids`; returns how many went
    pub fn delete_messages(&mut self, ids: &[i64]) -> Result<usize> {
        let before = self.messages.len();
        self.messages.retain(|m| !ids.contains(&m.id));
        let removed = before - self.messages.len();
        if removed > 0 {
            self.persist_chat()?;
        }
        Ok(removed)
    }

    /// Back to a lone greeting
    pub fn clear_chat(&mut self) -> Result<()> {
        self.messages = vec![ChatMessage::greeting(Utc::now().timestamp_millis())];
        logging::log_chat(Some(&self.scope()), "Chat cleared");
        self.persist_chat()
    }

    // ============ Diary Generation ============

    /// The active date's log without the greeting it opened with
    fn day_conversation(&self) -> Vec<ChatMessage> {
        self.messages
            .iter()
            .filter(|m| !m.is_greeting())
            .cloned()
            .collect()
    }

    /// Turn the active date's chat into a diary draft. Nothing is stored.
    pub async fn generate_diary(&self, style: DiaryStyle) -> Result<GeneratedDiary> {
        let conversation = self.day_conversation();
        if !conversation.iter().any(ChatMessage::is_user) {
            return Err(Error::InvalidInput(format!("No chat messages on {}", self.active_date)));
        }

        let config = self.personas.current_api_config();
        let recent = context::generation_diaries(self.diaries.all(), self.active_date);
        let request = composer::compose_diary_generation(
            style,
            self.active_date,
            self.profile.profile(),
            &recent,
            &conversation,
        );

        logging::log_diary(Some(&self.scope()), &format!(
            "Generating diary ({}) from {} messages", style.key(), conversation.len()
        ));
        let raw = self.client.complete(&config, &request).await?;
        Ok(generation::parse_generated_diary(&raw))
    }

    /// Store a generated diary for the active date, with the chat attached
    pub fn save_generated_diary(&mut self, mut generated: GeneratedDiary) -> Result<DiaryEntry> {
        if generated.title.trim().is_empty() {
            generated.title = "Daily Reflection".to_string();
        }
        let entry = generated.into_entry(self.active_date, &self.messages);
        self.diaries.add(entry)
    }

    /// Briefing for a handwritten entry. Any failure yields the fallback.
    pub async fn generate_briefing(&self, title: &str, content: &str) -> AiBriefing {
        let config = self.personas.current_api_config();
        let request = composer::compose_briefing_request(title, content);

        match self.client.complete(&config, &request).await {
            Ok(raw) => generation::parse_briefing(&raw).unwrap_or_else(|| {
                logging::log_error(Some(&self.scope()), "Briefing reply was not valid JSON");
                generation::fallback_briefing(content)
            }),
            Err(e) => {
                logging::log_error(Some(&self.scope()), &format!("Briefing generation failed: {}", e));
                generation::fallback_briefing(content)
            }
        }
    }

    /// Save a handwritten draft for the active date and drop the stored draft
    pub async fn save_manual_diary(&mut self, draft: &Draft) -> Result<DiaryEntry> {
        if draft.is_blank() {
            return Err(Error::InvalidInput("A diary needs a title or content".to_string()));
        }

        let briefing_title = if draft.title.trim().is_empty() { "Untitled" } else { draft.title.as_str() };
        let briefing = self.generate_briefing(briefing_title, &draft.content).await;

        let title = if draft.title.trim().is_empty() { "Untitled Entry" } else { draft.title.as_str() };
        let mut entry = DiaryEntry::new(self.active_date, title, draft.content.clone());
        entry.mood = draft.mood;
        entry.tags = draft.tags.clone();
        entry.category = draft.category.clone();
        entry.ai_briefing = Some(briefing);

        let saved = self.diaries.add(entry)?;
        self.chat_log.clear_draft(self.active_date)?;
        Ok(saved)
    }

    // ============ Manual Mode Assistant ============

    /// One polish-assistant turn over `history` (draft context first)
    pub async fn polish_diary(&self, history: &[ApiMessage]) -> Result<String> {
        let persona = self.personas.current_persona();
        let config = self.personas.current_api_config();

        let briefings = context::recent_briefings(self.diaries.all(), self.active_date);
        let shared_memory = if briefings.is_empty() { prompts::NO_DIARIES_PLACEHOLDER.to_string() } else { briefings };
        let day_chat = self
            .diaries
            .by_date(self.active_date)
            .map(|d| d.chat_history.as_slice())
            .filter(|chat| !chat.is_empty());

        let ctx = PolishContext {
            persona: &persona,
            profile: self.profile.profile(),
            date: self.active_date,
            now: Local::now().naive_local(),
            shared_memory: &shared_memory,
            day_chat,
        };
        let request = composer::compose_polish(&ctx, history);
        self.client.complete(&config, &request).await
    }

    fn polish_history(draft: &Draft) -> Vec<ApiMessage> {
        let mut history = vec![composer::draft_context_message(&draft.content)];
        history.extend(draft.messages.iter().cloned());
        history
    }

    /// Send `instruction` to the assistant about the active date's draft.
    /// The exchange is kept in the draft; with `apply` the proposed edits
    /// are written into it too.
    pub async fn polish_draft(&mut self, instruction: &str, apply: bool) -> Result<PolishUpdate> {
        let mut draft = self.chat_log.load_draft(self.active_date).unwrap_or_default();
        let instruction = if instruction.trim().is_empty() { prompts::ONE_CLICK_POLISH } else { instruction };

        draft.messages.push(ApiMessage::user(instruction));
        let reply = self.polish_diary(&Self::polish_history(&draft)).await?;
        self.finish_polish(draft, &reply, apply)
    }

    /// Ask again for the last assistant reply
    pub async fn reroll_polish(&mut self, apply: bool) -> Result<PolishUpdate> {
        let mut draft = self.chat_log.load_draft(self.active_date).unwrap_or_default();
        match draft.messages.last() {
            Some(last) if last.role == Role::Assistant => {
                draft.messages.pop();
            }
            _ => return Err(Error::InvalidInput("Nothing to reroll".to_string())),
        }

        let reply = self.polish_diary(&Self::polish_history(&draft)).await?;
        self.finish_polish(draft, &reply, apply)
    }

    fn finish_polish(&mut self, mut draft: Draft, reply: &str, apply: bool) -> Result<PolishUpdate> {
        let update = PolishUpdate::parse(reply);
        draft.messages.push(ApiMessage::assistant(reply));
        if apply {
            update.apply(&mut draft);
        }
        draft.timestamp = Utc::now().timestamp_millis();
        self.chat_log.save_draft(self.active_date, &draft)?;

        logging::log_diary(Some(&self.scope()), &format!(
            "Polish reply with {} field edits{}",
            update.fields.len(),
            if apply && update.has_changes() { " (applied)" } else { "" }
        ));
        Ok(update)
    }

    // ============ Retrospective Comments ============

    /// Short comment on an old diary, written from the active date
    pub async fn generate_comment(&self, diary_id: &str) -> Result<String> {
        let diary = self
            .diaries
            .by_id(diary_id)
            .ok_or_else(|| Error::NotFound(format!("diary {}", diary_id)))?;
        let persona = self.personas.current_persona();
        let config = self.personas.current_api_config();

        let recent = context::retrospective_briefings(self.diaries.all(), diary_id);
        let diary_day_chat = self.chat_log.stored(diary.date);
        let present_chat = self.chat_log.stored(self.active_date);

        let prompt = composer::compose_comment(
            &persona,
            diary,
            self.active_date,
            &recent,
            &diary_day_chat,
            &present_chat,
        );
        logging::log_diary(Some(&diary.date.to_string()), &format!(
            "Generating comment {} days later", prompt.day_offset
        ));

        let reply = self.client.complete(&config, &prompt.messages).await?;
        Ok(reply.trim().to_string())
    }

    pub fn add_ai_comment(&mut self, diary_id: &str, text: &str) -> Result<Comment> {
        self.diaries.add_comment(diary_id, CommentAuthor::Ai, text)
    }

    // ============ Providers & Backup ============

    pub async fn fetch_models(&self, config: &ApiConfig) -> Result<Vec<ModelInfo>> {
        self.client.list_models(config).await
    }

    pub fn export_backup(&self) -> Result<String> {
        backup::export_backup(&self.diaries, &self.personas)
    }

    pub fn import_backup(&mut self, raw: &str) -> Result<ImportSummary> {
        backup::import_backup(raw, &mut self.diaries, &mut self.personas)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persona::{ApiConfigUpdate, DEFAULT_API_CONFIG_ID};
    use crate::store::MemoryStore;
    use crate::transport::fake::ScriptedTransport;

    fn app_with(transport: Arc<ScriptedTransport>) -> (DiaryApp, Arc<dyn KeyValueStore>) {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let mut app = DiaryApp::new(store.clone(), transport, Pacing::Immediate);
        app.personas_mut()
            .update_api_config(DEFAULT_API_CONFIG_ID, ApiConfigUpdate {
                api_key: Some("sk-test".into()),
                ..Default::default()
            })
            .unwrap();
        (app, store)
    }

    fn request_text(transport: &ScriptedTransport, index: usize) -> String {
        transport.recorded()[index].body.as_ref().map(|b| b.to_string()).unwrap_or_default()
    }

    #[tokio::test]
    async fn test_send_and_reply_splits_into_bubbles() {
        let transport = Arc::new(ScriptedTransport::new().completion("Oh no!\nWhat happened?"));
        let (mut app, store) = app_with(transport.clone());

        app.send_message("I missed the bus", None).unwrap();
        let mut seen = Vec::new();
        let appended = app.trigger_ai_response(|m| seen.push(m.text.clone())).await.unwrap();

        assert_eq!(appended.len(), 2);
        assert_eq!(seen, vec!["Oh no!", "What happened?"]);
        assert_eq!(app.messages().len(), 4);
        assert!(app.messages().windows(2).all(|w| w[0].id < w[1].id));

        let reloaded = ChatLogService::new(store).stored(app.active_date());
        assert_eq!(reloaded, app.messages());
    }

    #[test]
    fn test_blank_message_is_rejected() {
        let (mut app, _) = app_with(Arc::new(ScriptedTransport::new()));
        let err = app.send_message("   ", None).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
        assert_eq!(app.messages().len(), 1);
    }

    #[tokio::test]
    async fn test_missing_key_appends_nothing() {
        let transport = Arc::new(ScriptedTransport::new().completion("hi"));
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let mut app = DiaryApp::new(store, transport.clone(), Pacing::Immediate);

        app.send_message("hello", None).unwrap();
        let err = app.trigger_ai_response(|_| {}).await.unwrap_err();
        assert!(matches!(err, Error::MissingApiKey));
        assert_eq!(app.messages().len(), 2);
        assert!(transport.recorded().is_empty());
    }

    #[tokio::test]
    async fn test_regenerate_replaces_trailing_ai_run() {
        let transport = Arc::new(
            ScriptedTransport::new()
                .completion("first\nsecond")
                .completion("again"),
        );
        let (mut app, _) = app_with(transport);

        app.send_message("tell me a joke", None).unwrap();
        app.trigger_ai_response(|_| {}).await.unwrap();
        assert_eq!(app.messages().len(), 4);

        let rerolled = app.regenerate_last_response(|_| {}).await.unwrap();
        assert_eq!(rerolled.len(), 1);
        let texts: Vec<&str> = app.messages().iter().map(|m| m.text.as_str()).collect();
        assert_eq!(texts, vec![chat::GREETING, "tell me a joke", "again"]);
    }

    #[tokio::test]
    async fn test_regenerate_without_trailing_ai_is_noop() {
        let transport = Arc::new(ScriptedTransport::new());
        let (mut app, _) = app_with(transport.clone());
        app.send_message("hi", None).unwrap();

        assert!(app.regenerate_last_response(|_| {}).await.unwrap().is_empty());
        assert!(transport.recorded().is_empty());
    }

    #[test]
    fn test_edit_delete_and_clear() {
        let (mut app, _) = app_with(Arc::new(ScriptedTransport::new()));
        let first = app.send_message("one", None).unwrap();
        let second = app.send_message("two", None).unwrap();

        app.edit_message(first.id, "uno").unwrap();
        assert_eq!(app.messages()[1].text, "uno");
        assert!(matches!(app.edit_message(42, "x"), Err(Error::NotFound(_))));

        assert_eq!(app.delete_messages(&[second.id, 7]).unwrap(), 1);
        assert_eq!(app.messages().len(), 2);

        app.clear_chat().unwrap();
        assert_eq!(app.messages().len(), 1);
        assert_eq!(app.messages()[0].text, chat::GREETING);
    }

    #[tokio::test]
    async fn test_previous_day_chat_is_sent_as_context() {
        let transport = Arc::new(ScriptedTransport::new().completion("Glad it went well"));
        let (mut app, store) = app_with(transport.clone());

        let yesterday = app.active_date().pred_opt().unwrap();
        ChatLogService::new(store)
            .save(yesterday, today(), &[ChatMessage::new(5, Sender::User, "interview tomorrow")])
            .unwrap();

        app.send_message("it went fine", None).unwrap();
        app.trigger_ai_response(|_| {}).await.unwrap();

        let body = request_text(&transport, 0);
        assert!(body.contains("interview tomorrow"));
        assert!(body.contains("it went fine"));
    }

    #[tokio::test]
    async fn test_generate_diary_needs_a_user_message() {
        let (app, _) = app_with(Arc::new(ScriptedTransport::new()));
        let err = app.generate_diary(DiaryStyle::NoAiTrace).await.unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_generate_diary_for_an_earlier_date() {
        let transport = Arc::new(ScriptedTransport::new().completion(
            r#"{"title":"Catching up","content":"<p>Long week.</p>","mood":"calm","tags":[]}"#,
        ));
        let (mut app, _) = app_with(transport.clone());
        let yesterday = app.active_date().pred_opt().unwrap();
        app.set_active_date(yesterday);
        app.send_message("catching up on yesterday", None).unwrap();

        let generated = app.generate_diary(DiaryStyle::NoAiTrace).await.unwrap();
        assert_eq!(generated.title, "Catching up");
        let body = request_text(&transport, 0);
        assert!(body.contains("catching up on yesterday"));
        assert!(!body.contains(chat::GREETING));
    }

    #[tokio::test]
    async fn test_generate_and_save_diary() {
        let transport = Arc::new(ScriptedTransport::new().completion(
            r#"{"title":"","content":"<p>Walked in the park.</p>","mood":"happy","tags":["park"],"category":"Daily Life"}"#,
        ));
        let (mut app, _) = app_with(transport.clone());
        app.send_message("went to the park", None).unwrap();

        let generated = app.generate_diary(DiaryStyle::WithAiTrace).await.unwrap();
        assert_eq!(generated.tags, vec!["park"]);
        assert!(request_text(&transport, 0).contains("went to the park"));

        let entry = app.save_generated_diary(generated).unwrap();
        assert_eq!(entry.title, "Daily Reflection");
        assert_eq!(entry.date, app.active_date());
        assert_eq!(entry.chat_history.len(), 2);
        assert_eq!(app.diaries().all().len(), 1);
    }

    #[tokio::test]
    async fn test_manual_save_survives_briefing_failure() {
        let transport = Arc::new(ScriptedTransport::new().fail("offline"));
        let (mut app, _) = app_with(transport);
        let date = app.active_date();

        let draft = Draft { content: "<p>Quiet day.</p>".into(), ..Default::default() };
        app.chat_log().save_draft(date, &draft).unwrap();

        let entry = app.save_manual_diary(&draft).await.unwrap();
        assert_eq!(entry.title, "Untitled Entry");
        assert!(entry.chat_history.is_empty());
        assert_eq!(entry.ai_briefing.unwrap().atmosphere_or_emotion, "Unknown");
        assert!(app.chat_log().load_draft(date).is_none());
    }

    #[tokio::test]
    async fn test_blank_manual_draft_is_rejected() {
        let (mut app, _) = app_with(Arc::new(ScriptedTransport::new()));
        let err = app.save_manual_diary(&Draft::default()).await.unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_polish_draft_applies_and_keeps_history() {
        let transport = Arc::new(
            ScriptedTransport::new().completion("Smoother now:\n<content><p>It rained all day.</p></content>"),
        );
        let (mut app, _) = app_with(transport.clone());
        let date = app.active_date();
        app.chat_log()
            .save_draft(date, &Draft { content: "<p>rain. all day</p>".into(), ..Default::default() })
            .unwrap();

        let update = app.polish_draft("", true).await.unwrap();
        assert_eq!(update.message, "Smoother now:");

        let draft = app.chat_log().load_draft(date).unwrap();
        assert_eq!(draft.content, "<p>It rained all day.</p>");
        assert_eq!(draft.messages.len(), 2);
        assert_eq!(draft.messages[0].content.as_text(), prompts::ONE_CLICK_POLISH);

        let body = request_text(&transport, 0);
        assert!(body.contains("Here is my current diary draft"));
        assert!(body.contains("rain. all day"));
    }

    #[tokio::test]
    async fn test_reroll_polish_needs_an_assistant_reply() {
        let (mut app, _) = app_with(Arc::new(ScriptedTransport::new()));
        let err = app.reroll_polish(false).await.unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_comment_on_older_diary() {
        let transport = Arc::new(ScriptedTransport::new().completion("  Still stuck on that bug?  "));
        let (mut app, _) = app_with(transport.clone());
        let last_week = app.active_date() - chrono::Duration::days(7);
        let entry = app
            .diaries_mut()
            .add(DiaryEntry::new(last_week, "Bug hunt", "<p>Chased a bug all night.</p>"))
            .unwrap();

        let comment = app.generate_comment(&entry.id).await.unwrap();
        assert_eq!(comment, "Still stuck on that bug?");
        assert!(request_text(&transport, 0).contains("The Reality of NOW"));

        let stored = app.add_ai_comment(&entry.id, &comment).unwrap();
        assert_eq!(stored.author, CommentAuthor::Ai);
        assert_eq!(app.diaries().by_id(&entry.id).unwrap().comments.len(), 1);

        assert!(matches!(app.generate_comment("missing").await, Err(Error::NotFound(_))));
    }

    #[test]
    fn test_backup_through_facade() {
        let (mut app, _) = app_with(Arc::new(ScriptedTransport::new()));
        app.diaries_mut().add(DiaryEntry::new(today(), "Kept", "<p>x</p>")).unwrap();
        let exported = app.export_backup().unwrap();

        let (mut other, _) = app_with(Arc::new(ScriptedTransport::new()));
        let summary = other.import_backup(&exported).unwrap();
        assert_eq!(summary.diaries, Some(1));
        assert_eq!(other.diaries().all()[0].title, "Kept");
    }
}
