use regex::Regex;
use std::sync::OnceLock;

fn sentence_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r#"[^.!?。！？]+(?:[.!?。！？]+["'”)]*|$)"#).expect("sentence pattern is valid")
    })
}

/// Split on sentence boundaries, keeping each sentence's terminal punctuation
pub fn split_sentences(text: &str) -> Vec<String> {
    sentence_pattern()
        .find_iter(text)
        .map(|m| m.as_str().trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
