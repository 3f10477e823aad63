//! Manual-mode assistant replies: chat text with optional field edits
//! wrapped in `<content>`, `<title>` and `<tags>` blocks

use once_cell::sync::Lazy;
use regex::Regex;

use crate::chat::Draft;

static CONTENT_BLOCK: Lazy<Regex> = Lazy::new(|| block_pattern("content"));
static POLISHED_BLOCK: Lazy<Regex> = Lazy::new(|| block_pattern("polished"));
static TITLE_BLOCK: Lazy<Regex> = Lazy::new(|| block_pattern("title"));
static TAGS_BLOCK: Lazy<Regex> = Lazy::new(|| block_pattern("tags"));
static ANY_BLOCK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"<(content|polished|title|tags)>[\s\S]*?</(?:content|polished|title|tags)>").expect("valid block pattern")
});

fn block_pattern(tag: &str) -> Regex {
    Regex::new(&format!(r"<{tag}>([\s\S]*?)</{tag}>", tag = tag)).expect("valid block pattern")
}

/// One field edit proposed by the assistant
#[derive(Debug, Clone, PartialEq)]
pub enum PolishField {
    Content(String),
    Title(String),
    Tags(Vec<String>),
}

/// Field edits found in a reply, in content/title/tags order.
/// `<polished>` is an older name for `<content>`; `<content>` wins when both appear.
pub fn extract_fields(reply: &str) -> Vec<PolishField> {
    let mut fields = Vec::new();

    let content = capture(&CONTENT_BLOCK, reply).or_else(|| capture(&POLISHED_BLOCK, reply));
    if let Some(content) = content {
        fields.push(PolishField::Content(content));
    }
    if let Some(title) = capture(&TITLE_BLOCK, reply) {
        fields.push(PolishField::Title(title));
    }
    if let Some(tags) = capture(&TAGS_BLOCK, reply) {
        let tags = tags
            .split(',')
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();
        fields.push(PolishField::Tags(tags));
    }

    fields
}

fn capture(pattern: &Regex, text: &str) -> Option<String> {
    pattern
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
}

/// The conversational part of a reply, with every field block removed
pub fn display_text(reply: &str) -> String {
    ANY_BLOCK.replace_all(reply, "").trim().to_string()
}

/// Parsed assistant reply
#[derive(Debug, Clone, PartialEq)]
pub struct PolishUpdate {
    pub message: String,
    pub fields: Vec<PolishField>,
}

impl PolishUpdate {
    pub fn parse(reply: &str) -> Self {
        Self {
            message: display_text(reply),
            fields: extract_fields(reply),
        }
    }

    pub fn has_changes(&self) -> bool {
        !self.fields.is_empty()
    }

    /// Apply every proposed edit to the draft
    pub fn apply(&self, draft: &mut Draft) {
        for field in &self.fields {
            match field {
                PolishField::Content(content) => draft.content = content.clone(),
                PolishField::Title(title) => draft.title = title.clone(),
                PolishField::Tags(tags) => draft.tags = tags.clone(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extracts_all_fields() {
        let reply = "Here you go:\n<title>The Longest Night</title>\n<content>\n<p>It rained.</p>\n</content>\n<tags>rain, night , ,sleep</tags>";
        assert_eq!(
            extract_fields(reply),
            vec![
                PolishField::Content("<p>It rained.</p>".into()),
                PolishField::Title("The Longest Night".into()),
                PolishField::Tags(vec!["rain".into(), "night".into(), "sleep".into()]),
            ]
        );
        assert_eq!(display_text(reply), "Here you go:");
    }

    #[test]
    fn test_polished_is_a_content_synonym() {
        assert_eq!(extract_fields("<polished>old style</polished>"), vec![PolishField::Content("old style".into())]);
        assert_eq!(
            extract_fields("<polished>old</polished><content>new</content>"),
            vec![PolishField::Content("new".into())]
        );
    }

    #[test]
    fn test_plain_reply_has_no_changes() {
        let update = PolishUpdate::parse("Maybe call it \"Quiet Sunday\"?");
        assert!(!update.has_changes());
        assert_eq!(update.message, "Maybe call it \"Quiet Sunday\"?");
    }

    #[test]
    fn test_apply_to_draft() {
        let mut draft = Draft { title: "Old".into(), content: "<p>old</p>".into(), ..Default::default() };
        PolishUpdate::parse("<title>New</title>").apply(&mut draft);
        assert_eq!(draft.title, "New");
        assert_eq!(draft.content, "<p>old</p>");
    }
}
