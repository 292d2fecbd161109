//! Japanese-text heuristic used by participant discovery

use crate::nostr::Event;
use crate::METADATA_KIND;
use regex_lite::Regex;
use serde_json::Value;
use std::sync::OnceLock;

/// Hiragana, Katakana without U+30C4 (ツ, common in kaomoji), and CJK ideographs
const JAPANESE_PATTERN: &str = r"[\x{3040}-\x{309F}\x{30A0}-\x{30C3}\x{30C5}-\x{30FF}\x{4E00}-\x{9FAF}]";

/// Profile fields inspected for Japanese text
const PROFILE_FIELDS: &[&str] = &["name", "about", "display_name", "displayName"];

fn japanese_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(JAPANESE_PATTERN).expect("static pattern is valid"))
}

/// Whether `text` contains at least one Japanese character
pub fn contains_japanese(text: &str) -> bool {
    japanese_regex().is_match(text)
}

/// Whether a profile-metadata event describes a Japanese-speaking participant.
///
/// Non-metadata events never match. When the content is not JSON the raw
/// content is tested instead.
pub fn profile_contains_japanese(event: &Event) -> bool {
    if event.kind != METADATA_KIND || event.content.is_empty() {
        return false;
    }

    match serde_json::from_str::<Value>(&event.content) {
        Ok(profile) => PROFILE_FIELDS.iter().any(|field| {
            profile
                .get(*field)
                .and_then(Value::as_str)
                .is_some_and(contains_japanese)
        }),
        Err(_) => contains_japanese(&event.content),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata(content: &str) -> Event {
        Event {
            id: "m".into(),
            pubkey: "22".repeat(32),
            created_at: 1,
            kind: METADATA_KIND,
            tags: vec![],
            content: content.into(),
            sig: String::new(),
        }
    }

    #[test]
    fn test_contains_japanese() {
        assert!(contains_japanese("こんにちは"));
        assert!(contains_japanese("カタカナ"));
        assert!(contains_japanese("hello 日本"));
        assert!(!contains_japanese("hello world"));
        assert!(!contains_japanese("안녕하세요"));
    }

    #[test]
    fn test_tsu_alone_is_not_japanese() {
        assert!(!contains_japanese("(ツ)"));
        assert!(contains_japanese("ツイート"));
    }

    #[test]
    fn test_profile_fields() {
        assert!(profile_contains_japanese(&metadata(r#"{"name":"alice","about":"東京在住"}"#)));
        assert!(profile_contains_japanese(&metadata(r#"{"displayName":"ぬこ"}"#)));
        assert!(!profile_contains_japanese(&metadata(r#"{"name":"bob","website":"日本"}"#)));
    }

    #[test]
    fn test_profile_raw_content_fallback() {
        assert!(profile_contains_japanese(&metadata("not json ですよ")));
        assert!(!profile_contains_japanese(&metadata("not json")));
    }

    #[test]
    fn test_other_kinds_never_match() {
        let mut event = metadata(r#"{"name":"東京"}"#);
        event.kind = 1;
        assert!(!profile_contains_japanese(&event));
    }
}
