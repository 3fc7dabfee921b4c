//! Spoken form of feed items: `"<speaker> says: <body>"`.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

const NO_TEXT: &str = "No text available.";
const UNKNOWN_USER: &str = "Unknown user";
const UNKNOWN_AUTHOR: &str = "Unknown author";

static URL: Lazy<Regex> = Lazy::new(|| Regex::new(r"https?://\S+").expect("valid URL pattern"));

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedSource {
    #[default]
    X,
    Facebook,
    Telegram,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedItem {
    pub id: String,
    pub source: FeedSource,
    #[serde(default)]
    pub author_name: Option<String>,
    #[serde(default)]
    pub author_handle: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
}

pub fn build_speech_text(item: &FeedItem) -> String {
    let speaker = match item.source {
        FeedSource::X => normalize_handle(item.author_handle.as_deref()),
        FeedSource::Facebook | FeedSource::Telegram | FeedSource::Other => resolve_speaker(item),
    };
    format!("{} says: {}", speaker, build_body(item.text.as_deref()))
}

/// `@`-prefixed handle, or "Unknown user" when missing or blank
pub fn normalize_handle(handle: Option<&str>) -> String {
    match handle.map(str::trim) {
        None | Some("") => UNKNOWN_USER.to_string(),
        Some(h) if h.starts_with('@') => h.to_string(),
        Some(h) => format!("@{}", h),
    }
}

fn resolve_speaker(item: &FeedItem) -> String {
    if let Some(name) = item.author_name.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
        return name.to_string();
    }
    if item
        .author_handle
        .as_deref()
        .is_some_and(|h| !h.trim().is_empty())
    {
        return normalize_handle(item.author_handle.as_deref());
    }
    UNKNOWN_AUTHOR.to_string()
}

fn build_body(text: Option<&str>) -> String {
    let cleaned = text.map(|t| collapse_whitespace(&strip_urls(t))).unwrap_or_default();
    if cleaned.is_empty() {
        NO_TEXT.to_string()
    } else {
        cleaned
    }
}

/// Drop everything from `http://` or `https://` to the end of its word
pub fn strip_urls(text: &str) -> String {
    URL.replace_all(text, "").trim().to_string()
}

pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(source: FeedSource, name: Option<&str>, handle: Option<&str>, text: Option<&str>) -> FeedItem {
        FeedItem {
            id: "1".into(),
            source,
            author_name: name.map(Into::into),
            author_handle: handle.map(Into::into),
            text: text.map(Into::into),
        }
    }

    #[test]
    fn x_items_use_the_handle() {
        let i = item(FeedSource::X, Some("Jane"), Some("jane"), Some("hello   world"));
        assert_eq!(build_speech_text(&i), "@jane says: hello world");
    }

    #[test]
    fn x_items_without_handle() {
        let i = item(FeedSource::X, None, Some("  "), Some("hi"));
        assert_eq!(build_speech_text(&i), "Unknown user says: hi");
    }

    #[test]
    fn other_sources_prefer_author_name() {
        let i = item(FeedSource::Telegram, Some(" Chan "), Some("@chan"), Some("news"));
        assert_eq!(build_speech_text(&i), "Chan says: news");
        let i = item(FeedSource::Facebook, None, Some("page"), Some("news"));
        assert_eq!(build_speech_text(&i), "@page says: news");
        let i = item(FeedSource::Other, None, None, Some("news"));
        assert_eq!(build_speech_text(&i), "Unknown author says: news");
    }

    #[test]
    fn urls_are_stripped_and_empty_body_replaced() {
        let i = item(FeedSource::X, None, Some("a"), Some("look https://t.co/x\n at\thttp://e.com/y this"));
        assert_eq!(build_speech_text(&i), "@a says: look at this");
        let i = item(FeedSource::X, None, Some("a"), Some("https://t.co/only"));
        assert_eq!(build_speech_text(&i), "@a says: No text available.");
        let i = item(FeedSource::X, None, Some("a"), None);
        assert_eq!(build_speech_text(&i), "@a says: No text available.");
    }

    #[test]
    fn url_inside_a_word_truncates_that_word() {
        assert_eq!(strip_urls("see:https://x.y/z now"), "see: now");
    }

    #[test]
    fn only_complete_http_urls_are_stripped() {
        assert_eq!(
            strip_urls("ftp://a.b http:/x https:// HTTPS://up.per ok"),
            "ftp://a.b http:/x https:// HTTPS://up.per ok"
        );
        assert_eq!(strip_urls("https://a.b/c,http://d.e tail"), "tail");
    }

    #[test]
    fn unknown_source_deserializes_as_other() {
        let i: FeedItem = serde_json::from_str(r#"{"id":"9","source":"mastodon"}"#).unwrap();
        assert_eq!(i.source, FeedSource::Other);
    }
}
