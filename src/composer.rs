//! Prompt composition
//!
//! Every function here is pure: records in, `Vec<ApiMessage>` out. Nothing
//! reads the store or the clock except through its arguments.

use chrono::{NaiveDate, NaiveDateTime};

use crate::chat::ChatMessage;
use crate::context::{self, ChatContext, PREVIOUS_DAY_LIMIT};
use crate::diary::DiaryEntry;
use crate::openai::{ApiMessage, ContentPart, ImageUrl, Role};
use crate::persona::Persona;
use crate::profile::{or_not_set, UserProfile};
use crate::prompts::{self, DiaryStyle};

/// "Friday, May 3, 2024"
pub fn long_date(date: NaiveDate) -> String {
    date.format("%A, %B %-d, %Y").to_string()
}

// ============ Chat reply ============

/// Context block first, then earlier history, then the rules block right
/// before the trailing run of user messages.
pub fn compose_chat_reply(persona: &Persona, profile: &UserProfile, date: NaiveDate, ctx: &ChatContext) -> Vec<ApiMessage> {
    let mut messages = vec![ApiMessage::system(chat_context_block(persona, profile, date, &ctx.briefings))];
    let rules = ApiMessage::system(chat_rules_block(persona));

    let history = &ctx.history;
    let split = history.iter().rposition(|m| !m.is_user()).map_or(0, |i| i + 1);
    let (earlier, latest_input) = history.split_at(split);

    messages.extend(earlier.iter().map(|m| {
        let role = if m.is_user() { Role::User } else { Role::Assistant };
        to_api_message(m, role)
    }));
    messages.push(rules);
    messages.extend(latest_input.iter().map(|m| to_api_message(m, Role::User)));
    messages
}

fn chat_context_block(persona: &Persona, profile: &UserProfile, date: NaiveDate, briefings: &str) -> String {
    let briefings = if briefings.is_empty() { prompts::NO_DIARIES_PLACEHOLDER } else { briefings };
    format!(
        "# AI IDENTITY\n\
         Name: {name}\n\
         Role: You are an AI companion.\n\
         \n\
         # TIME/DATE CONTEXT\n\
         Current Context Date: {long} ({date})\n\
         \n\
         # USER PROFILE\n\
         - Name: {username}\n\
         - Nickname: {nickname}\n\
         - Birthday: {birthday}\n\
         - Location: {residence}\n\
         - Family: {family}\n\
         - Relationships: {relationships}\n\
         - Occupation: {identity}\n\
         - Workplace: {work}\n\
         - Interests: {interests}\n\
         \n\
         # RECENT MEMORY BRIEFINGS (Context before {date})\n\
         {briefings}",
        name = persona.name,
        long = long_date(date),
        date = date,
        username = or_not_set(&profile.username),
        nickname = or_not_set(&profile.nickname),
        birthday = or_not_set(&profile.birthday),
        residence = or_not_set(&profile.residence),
        family = or_not_set(&profile.family_label()),
        relationships = or_not_set(&profile.relationships_label()),
        identity = or_not_set(&profile.identity),
        work = or_not_set(&profile.school_work),
        interests = or_not_set(&profile.interests_label()),
        briefings = briefings,
    )
}

fn chat_rules_block(persona: &Persona) -> String {
    let custom = if persona.custom_prompt.trim().is_empty() {
        prompts::NO_CUSTOM_SETTINGS
    } else {
        persona.custom_prompt.as_str()
    };
    format!(
        "{}\n\n# USER CUSTOM PERSONA SETTINGS\n{}\n\n{}",
        prompts::BEHAVIOR_GUIDELINES,
        custom,
        prompts::FORMATTING_RULES.replace("{persona}", &persona.name)
    )
}

/// Images go out as multimodal parts; other attachments become a text marker
fn to_api_message(msg: &ChatMessage, role: Role) -> ApiMessage {
    match &msg.attachment {
        Some(att) if att.is_image() => {
            let text = if msg.text.is_empty() { " ".to_string() } else { msg.text.clone() };
            ApiMessage::with_parts(
                role,
                vec![
                    ContentPart::Text { text },
                    ContentPart::ImageUrl { image_url: ImageUrl { url: att.url.clone() } },
                ],
            )
        }
        Some(_) => ApiMessage::new(role, format!("{}{}", msg.text, prompts::IMAGE_PLACEHOLDER)),
        None => ApiMessage::new(role, msg.text.clone()),
    }
}

// ============ Diary generation ============

pub fn compose_diary_generation(
    style: DiaryStyle,
    date: NaiveDate,
    profile: &UserProfile,
    recent_diaries: &str,
    conversation: &[ChatMessage],
) -> Vec<ApiMessage> {
    let recent = if recent_diaries.is_empty() { prompts::NO_RECENT_DIARIES } else { recent_diaries };
    let system = format!(
        "{template}\n\n\
         Current Date: {long}\n\n\
         User Profile Context:\n\
         - Name: {username}\n\
         - Nickname: {nickname}\n\
         - Birthday: {birthday}\n\
         - Location: {residence}\n\
         - Interests: {interests}\n\n\
         Recent Diaries (for context only):\n\
         {recent}\n\n\
         {language}",
        template = style.template(),
        long = long_date(date),
        username = or_not_set(&profile.username),
        nickname = or_not_set(&profile.nickname),
        birthday = or_not_set(&profile.birthday),
        residence = or_not_set(&profile.residence),
        interests = or_not_set(&profile.interests_label()),
        recent = recent,
        language = prompts::LANGUAGE_INSTRUCTION,
    );

    let user = format!(
        "Here is the conversation history:\n\n{}\n\nPlease generate the diary entry JSON now.",
        context::timestamped_transcript(conversation)
    );

    vec![ApiMessage::system(system), ApiMessage::user(user)]
}

// ============ Manual mode ============

pub fn compose_briefing_request(title: &str, content: &str) -> Vec<ApiMessage> {
    let prompt = prompts::BRIEFING_TEMPLATE
        .replace("{title}", title)
        .replace("{content}", content);
    vec![ApiMessage::system(prompts::GENERIC_ASSISTANT), ApiMessage::user(prompt)]
}

/// First message of every polish request: the draft as it stands
pub fn draft_context_message(content: &str) -> ApiMessage {
    ApiMessage::user(format!(
        "Here is my current diary draft:\n\n\"{}\"\n\n(Please use this as the context for my requests)",
        content
    ))
}

/// Inputs for the manual-mode writing assistant
pub struct PolishContext<'a> {
    pub persona: &'a Persona,
    pub profile: &'a UserProfile,
    pub date: NaiveDate,
    pub now: NaiveDateTime,
    pub shared_memory: &'a str,
    pub day_chat: Option<&'a [ChatMessage]>,    // chat kept in that date's diary
}

pub fn compose_polish(ctx: &PolishContext<'_>, history: &[ApiMessage]) -> Vec<ApiMessage> {
    let day_chat = match ctx.day_chat {
        Some(chat) => context::speaker_transcript(chat),
        None => prompts::NO_DAY_CHAT_LOGS.to_string(),
    };
    let name = if ctx.profile.username.trim().is_empty() { "User" } else { ctx.profile.username.as_str() };
    let focus = serde_json::to_string(&ctx.profile.short_term_goals).unwrap_or_else(|_| "[]".to_string());

    let system = format!(
        "You are the user's AI companion, \"{persona}\".\n\
         Your core personality and behavior are defined below:\n\
         {voice}\n\n\
         Your current specific task is to help the user write and polish their diary entry in \"Manual Mode\".\n\
         You are NOT a cold, robotic editor. You are the SAME character defined above, just helping with writing now.\n\n\
         # CURRENT CONTEXT:\n\
         - **Current System Time**: {now}\n\
         - **Target Diary Date**: {date}\n\
         - **User Profile**: Name: {name}, Focus: {focus}\n\n\
         # SHARED MEMORY (Context from previous days):\n\
         {memory}\n\n\
         # EVENTS OF THE DAY (Chat Logs from {date}):\n\
         Use this to understand what happened on the day the user is writing about.\n\
         {day_chat}\n\n\
         {rules}",
        persona = ctx.persona.name,
        voice = ctx.persona.voice(),
        now = ctx.now.format("%Y-%m-%d %H:%M:%S"),
        date = ctx.date,
        name = name,
        focus = focus,
        memory = ctx.shared_memory,
        day_chat = day_chat,
        rules = prompts::POLISH_RULES,
    );

    let mut messages = vec![ApiMessage::system(system)];
    messages.extend_from_slice(history);
    messages
}

// ============ Retrospective comment ============

#[derive(Debug, Clone)]
pub struct CommentPrompt {
    pub messages: Vec<ApiMessage>,
    pub day_offset: i64,
    pub includes_today_context: bool,
}

/// Comment from the present looking back at `diary`.
///
/// `diary_day_chat` is the chat log of the diary's date; only messages sent
/// before the diary was created are shown. `present_chat` is the log of the
/// present date and is only used when the two dates differ.
pub fn compose_comment(
    persona: &Persona,
    diary: &DiaryEntry,
    present: NaiveDate,
    recent: &str,
    diary_day_chat: &[ChatMessage],
    present_chat: &[ChatMessage],
) -> CommentPrompt {
    let day_offset = (present - diary.date).num_days();
    let chat_at_time = context::raw_transcript(&context::messages_before(diary_day_chat, diary.id_timestamp()));

    let includes_today_context = present != diary.date;
    let today_context = if includes_today_context {
        let start = present_chat.len().saturating_sub(PREVIOUS_DAY_LIMIT);
        let snippet = context::raw_transcript(&present_chat[start..]);
        let snippet = if snippet.is_empty() { prompts::NO_CHAT_TODAY.to_string() } else { snippet };
        format!(
            "[The Reality of NOW ({present})]:\n(What the user is doing RIGHT NOW, {offset} days later.)\n{snippet}",
            present = present,
            offset = day_offset,
            snippet = snippet
        )
    } else {
        String::new()
    };

    let system = format!(
        "# Role: Time Witness (A Friend from the FUTURE)\n\
         You are a friend looking back at \"Old Times\". You have a \"God's Eye View\" - you know what happened after this diary entry.\n\n\
         # Timeline Mapping\n\
         - [Past Space-Time]: {past}\n\
         - [Present Reality]: {present} (This is {offset} days after the diary)\n\n\
         # Knowledge Gap\n\
         1. **The Past User (Ignorant)**: When writing this diary, the user didn't know the future.\n\
         2. **The Present You (Omniscient)**: You have read the recent summaries and today's chat. You know if things got solved, got worse, or are still in a loop.\n\n\
         # Task: Leave a \"Cross-Time\" Comment\n\
         Use the information gap between [Past] and [Present] to leave a comment under 30 words/characters.\n\n\
         {logic}\n\n\
         {constraints}\n\n\
         # PERSONA ADAPTATION:\n\
         Name: {name}\n\
         Tone: {tone}",
        past = diary.date,
        present = present,
        offset = day_offset,
        logic = prompts::COMMENT_CORE_LOGIC,
        constraints = prompts::COMMENT_CONSTRAINTS,
        name = persona.name,
        tone = persona.reply_style.as_str(),
    );

    let custom_rules = if persona.custom_prompt.trim().is_empty() { "None" } else { persona.custom_prompt.as_str() };
    let user = format!(
        "# PAST DIARY ENTRY (The Memory):\n\
         Content: \"{content}\"\n\n\
         # THE FUTURE CONTEXT (What happened since then):\n\
         - Recent Life Summaries (The days in between):\n\
         {recent}\n\
         - User's Custom Rules: {custom}\n\
         - Chat History (At the time of diary):\n\
         {chat}\n\n\
         {today}\n\n\
         {instruction}",
        content = diary.content,
        recent = recent,
        custom = custom_rules,
        chat = chat_at_time,
        today = today_context,
        instruction = prompts::COMMENT_INSTRUCTION,
    );

    CommentPrompt {
        messages: vec![ApiMessage::system(system), ApiMessage::user(user)],
        day_offset,
        includes_today_context,
    }
}
