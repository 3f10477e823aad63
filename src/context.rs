//! Memory the AI gets to see: briefings of earlier diaries and recent chat

use chrono::{Local, NaiveDate, TimeZone};

use crate::chat::{ChatMessage, Sender};
use crate::diary::DiaryEntry;

pub const BRIEFING_LIMIT: usize = 7;
pub const PREVIOUS_DAY_LIMIT: usize = 20;
pub const GENERATION_DIARY_LIMIT: usize = 3;

/// What the chat reply prompt is built from
#[derive(Debug, Clone, PartialEq)]
pub struct ChatContext {
    pub briefings: String,
    pub history: Vec<ChatMessage>,  // previous day's tail, then the current log
}

pub fn gather_chat_context(
    date: NaiveDate,
    diaries: &[DiaryEntry],
    previous_day: Vec<ChatMessage>,
    history: &[ChatMessage],
) -> ChatContext {
    let start = previous_day.len().saturating_sub(PREVIOUS_DAY_LIMIT);
    let mut combined: Vec<ChatMessage> = previous_day.into_iter().skip(start).collect();
    combined.extend_from_slice(history);

    ChatContext {
        briefings: recent_briefings(diaries, date),
        history: combined,
    }
}

/// Diaries dated strictly before `date`, newest first
pub fn diaries_before(diaries: &[DiaryEntry], date: NaiveDate, limit: usize) -> Vec<&DiaryEntry> {
    let mut earlier: Vec<&DiaryEntry> = diaries.iter().filter(|d| d.date < date).collect();
    earlier.sort_by(|a, b| b.date.cmp(&a.date));
    earlier.truncate(limit);
    earlier
}

/// Briefing block for the chat and polish prompts; empty when there is no history
pub fn recent_briefings(diaries: &[DiaryEntry], date: NaiveDate) -> String {
    render_briefings(diaries_before(diaries, date, BRIEFING_LIMIT))
}

/// The most recent diaries overall, minus the one being commented on
pub fn retrospective_briefings(diaries: &[DiaryEntry], exclude_id: &str) -> String {
    let mut others: Vec<&DiaryEntry> = diaries.iter().filter(|d| d.id != exclude_id).collect();
    others.sort_by(|a, b| b.date.cmp(&a.date));
    others.truncate(BRIEFING_LIMIT);
    render_briefings(others)
}

fn render_briefings(entries: Vec<&DiaryEntry>) -> String {
    entries.into_iter().map(briefing_block).collect::<Vec<_>>().join("\n\n")
}

pub fn briefing_block(entry: &DiaryEntry) -> String {
    match &entry.ai_briefing {
        Some(briefing) => {
            let mut block = format!(
                "### [{}] Briefing\n- Events: {}\n- Atmosphere/Emotion: {}",
                entry.date, briefing.events, briefing.atmosphere_or_emotion
            );
            if let Some(topics) = briefing.unfinished_topics.as_deref().filter(|t| !t.trim().is_empty()) {
                block.push_str(&format!("\n- Unfinished Topics: {}", topics));
            }
            block
        }
        None => {
            let gist = if entry.summary.is_empty() {
                truncate_chars(&entry.content, 50)
            } else {
                entry.summary.clone()
            };
            format!("- [{}] {}: {}...", entry.date, entry.title, gist)
        }
    }
}

/// Up to three prior diaries for the diary generation prompt
pub fn generation_diaries(diaries: &[DiaryEntry], date: NaiveDate) -> String {
    diaries_before(diaries, date, GENERATION_DIARY_LIMIT)
        .into_iter()
        .map(|d| {
            let summary = if d.summary.is_empty() {
                format!("{}...", truncate_chars(&d.content, 100))
            } else {
                d.summary.clone()
            };
            format!("- Date: {}\n- Summary: {}", d.date, summary)
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

// ============ Transcripts ============

/// `[09:41 PM] user: text`, times from the message ids
pub fn timestamped_transcript(messages: &[ChatMessage]) -> String {
    messages
        .iter()
        .map(|m| {
            let time = Local
                .timestamp_millis_opt(m.id)
                .single()
                .map(|t| t.format("%I:%M %p").to_string())
                .unwrap_or_default();
            format!("[{}] {}: {}", time, m.sender.as_str(), m.text)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// `User: ...` / `AI: ...`
pub fn speaker_transcript(messages: &[ChatMessage]) -> String {
    messages
        .iter()
        .map(|m| {
            let speaker = match m.sender {
                Sender::User => "User",
                Sender::Ai => "AI",
            };
            format!("{}: {}", speaker, m.text)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// `user: ...` / `ai: ...`
pub fn raw_transcript(messages: &[ChatMessage]) -> String {
    messages
        .iter()
        .map(|m| format!("{}: {}", m.sender.as_str(), m.text))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Messages sent before `cutoff` (all of them without one)
pub fn messages_before(messages: &[ChatMessage], cutoff: Option<i64>) -> Vec<ChatMessage> {
    match cutoff {
        Some(cutoff) => messages.iter().filter(|m| m.id < cutoff).cloned().collect(),
        None => messages.to_vec(),
    }
}

pub fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diary::AiBriefing;

    fn day(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    fn entry(date: &str, title: &str, summary: &str) -> DiaryEntry {
        let mut e = DiaryEntry::new(day(date), title, "<p>Long walk by the river after work, then noodles.</p>");
        e.summary = summary.to_string();
        e
    }

    #[test]
    fn test_briefings_are_strictly_before_and_newest_first() {
        let mut briefed = entry("2024-05-02", "Rain", "");
        briefed.ai_briefing = Some(AiBriefing {
            events: "Got soaked".into(),
            atmosphere_or_emotion: "grumpy".into(),
            unfinished_topics: Some("buy umbrella".into()),
        });
        let diaries = vec![
            entry("2024-05-01", "Walk", "Nice walk"),
            briefed,
            entry("2024-05-03", "Today", "same day"),
        ];

        let text = recent_briefings(&diaries, day("2024-05-03"));
        assert_eq!(
            text,
            "### [2024-05-02] Briefing\n- Events: Got soaked\n- Atmosphere/Emotion: grumpy\n- Unfinished Topics: buy umbrella\n\n- [2024-05-01] Walk: Nice walk..."
        );
    }

    #[test]
    fn test_briefing_limit_and_content_fallback() {
        let diaries: Vec<DiaryEntry> = (1..=9).map(|d| entry(&format!("2024-05-0{}", d), "t", "")).collect();
        let chosen = diaries_before(&diaries, day("2024-06-01"), BRIEFING_LIMIT);
        assert_eq!(chosen.len(), 7);
        assert_eq!(chosen[0].date, day("2024-05-09"));

        let block = briefing_block(&diaries[0]);
        assert_eq!(block, "- [2024-05-01] t: <p>Long walk by the river after work, then noodles...");
    }

    #[test]
    fn test_previous_day_tail_is_prepended() {
        let previous: Vec<ChatMessage> = (0..25).map(|i| ChatMessage::new(i, Sender::User, format!("old {}", i))).collect();
        let today = vec![ChatMessage::new(100, Sender::User, "new")];
        let ctx = gather_chat_context(day("2024-05-03"), &[], previous, &today);

        assert_eq!(ctx.history.len(), 21);
        assert_eq!(ctx.history[0].text, "old 5");
        assert_eq!(ctx.history[20].text, "new");
        assert!(ctx.briefings.is_empty());
    }

    #[test]
    fn test_generation_diaries_format() {
        let diaries = vec![entry("2024-05-01", "Walk", ""), entry("2024-05-02", "Rain", "Wet day")];
        assert_eq!(
            generation_diaries(&diaries, day("2024-05-10")),
            "- Date: 2024-05-02\n- Summary: Wet day\n\n- Date: 2024-05-01\n- Summary: <p>Long walk by the river after work, then noodles.</p>..."
        );
    }

    #[test]
    fn test_retrospective_excludes_current() {
        let diaries = vec![entry("2024-05-01", "A", "a"), entry("2024-05-02", "B", "b")];
        let text = retrospective_briefings(&diaries, &diaries[1].id);
        assert_eq!(text, "- [2024-05-01] A: a...");
    }

    #[test]
    fn test_transcripts_and_cutoff() {
        let msgs = vec![ChatMessage::new(10, Sender::User, "hi"), ChatMessage::new(20, Sender::Ai, "hello")];
        assert_eq!(speaker_transcript(&msgs), "User: hi\nAI: hello");
        assert_eq!(raw_transcript(&messages_before(&msgs, Some(15))), "user: hi");
        assert_eq!(messages_before(&msgs, None).len(), 2);
    }
}
