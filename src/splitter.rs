//! Turns one model reply into several chat bubbles

use once_cell::sync::Lazy;
use regex::Regex;
use std::time::Duration;

/// Sentence end followed by whitespace
static SENTENCE_BREAK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[.!?。！？]\s+").expect("valid sentence break pattern"));

const LONG_SEGMENT_CHARS: usize = 100;

const MS_PER_CHAR: u64 = 30;
const MIN_DELAY_MS: u64 = 800;
const MAX_DELAY_MS: u64 = 2000;

/// Pause between consecutive bubbles of one reply
pub const PART_GAP: Duration = Duration::from_millis(300);

/// Split a reply into chat messages.
///
/// Lines are the primary separator. A reply that comes back as a single long
/// paragraph is split into sentences instead. Never returns an empty list.
pub fn split_response(raw: &str) -> Vec<String> {
    let lines: Vec<String> = raw
        .split('\n')
        .filter(|line| !line.trim().is_empty())
        .map(str::to_string)
        .collect();

    if lines.len() == 1 && lines[0].chars().count() > LONG_SEGMENT_CHARS {
        let sentences = split_sentences(&lines[0]);
        if sentences.len() > 1 {
            return sentences;
        }
    }

    if lines.is_empty() {
        return vec![raw.to_string()];
    }
    lines
}

fn split_sentences(text: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut start = 0;
    for m in SENTENCE_BREAK.find_iter(text) {
        // Keep the punctuation, drop the whitespace after it
        let punct_len = text[m.start()..].chars().next().map_or(1, char::len_utf8);
        out.push(text[start..m.start() + punct_len].to_string());
        start = m.end();
    }
    out.push(text[start..].to_string());
    out.retain(|s| !s.trim().is_empty());
    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Pacing {
    /// Simulated typing delays between bubbles
    #[default]
    Natural,
    /// No delays (tests, scripting)
    Immediate,
}

/// Simulated typing time: 30 ms per character, clamped to 0.8 to 2 seconds
pub fn typing_delay(text: &str) -> Duration {
    let ms = (text.chars().count() as u64 * MS_PER_CHAR).clamp(MIN_DELAY_MS, MAX_DELAY_MS);
    Duration::from_millis(ms)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_splits_on_newlines_and_drops_blanks() {
        assert_eq!(split_response("Hey!\n\nHow was work?\n  \nTell me."), vec!["Hey!", "How was work?", "Tell me."]);
    }

    #[test]
    fn test_long_single_line_splits_on_sentences() {
        let raw = "I hear you, that sounds like a really long day. Did you get a chance to rest at all? Maybe some tea would help!";
        assert!(raw.chars().count() > 100);
        assert_eq!(
            split_response(raw),
            vec![
                "I hear you, that sounds like a really long day.",
                "Did you get a chance to rest at all?",
                "Maybe some tea would help!"
            ]
        );
    }

    #[test]
    fn test_cjk_punctuation() {
        let raw = format!("{}。 {}！ 好吗？", "今天".repeat(40), "辛苦了".repeat(10));
        let parts = split_response(&raw);
        assert_eq!(parts.len(), 3);
        assert!(parts[0].ends_with('。'));
        assert_eq!(parts[2], "好吗？");
    }

    #[test]
    fn test_short_single_line_is_kept() {
        assert_eq!(split_response("Okay. Sure."), vec!["Okay. Sure."]);
    }

    #[test]
    fn test_long_line_without_breaks_is_kept() {
        let raw = "a".repeat(150);
        assert_eq!(split_response(&raw), vec![raw.clone()]);
    }

    #[test]
    fn test_blank_reply_returns_raw() {
        assert_eq!(split_response("\n  \n"), vec!["\n  \n"]);
        assert_eq!(split_response(""), vec![""]);
    }

    #[test]
    fn test_typing_delay_is_clamped() {
        assert_eq!(typing_delay("hi"), Duration::from_millis(800));
        assert_eq!(typing_delay(&"x".repeat(40)), Duration::from_millis(1200));
        assert_eq!(typing_delay(&"x".repeat(500)), Duration::from_millis(2000));
    }
}
