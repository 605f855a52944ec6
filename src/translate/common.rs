use serde::{Deserialize, Serialize};
use std::fmt;

/// A direction a translator can handle, e.g. `en` → `ja`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LanguagePair {
    pub source: String,
    pub target: String,
}

impl LanguagePair {
    pub fn new(source: &str, target: &str) -> Self {
        Self {
            source: base_language(source),
            target: base_language(target),
        }
    }

    /// Parse the `"en-ja"` form used in configuration
    pub fn parse(pair: &str) -> Option<Self> {
        let (source, target) = pair.trim().split_once('-')?;
        if source.is_empty() || target.is_empty() {
            return None;
        }
        Some(Self::new(source, target))
    }
}

impl fmt::Display for LanguagePair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.source, self.target)
    }
}

/// Primary subtag, lowercased: `en_US` and `EN` both become `en`
pub fn base_language(code: &str) -> String {
    code.split(['-', '_'])
        .next()
        .unwrap_or(code)
        .trim()
        .to_lowercase()
}

/// Convert language code to full language name for clearer prompts
pub fn language_code_to_name(code: &str) -> String {
    match base_language(code).as_str() {
        "ja" => "Japanese".to_string(),
        "ko" => "Korean".to_string(),
        "zh" => "Chinese".to_string(),
        "fr" => "French".to_string(),
        "de" => "German".to_string(),
        "es" => "Spanish".to_string(),
        "ru" => "Russian".to_string(),
        "it" => "Italian".to_string(),
        "pt" => "Portuguese".to_string(),
        "pl" => "Polish".to_string(),
        "nl" => "Dutch".to_string(),
        "tr" => "Turkish".to_string(),
        "ar" => "Arabic".to_string(),
        "hi" => "Hindi".to_string(),
        "th" => "Thai".to_string(),
        "vi" => "Vietnamese".to_string(),
        "sv" => "Swedish".to_string(),
        "da" => "Danish".to_string(),
        "no" => "Norwegian".to_string(),
        "fi" => "Finnish".to_string(),
        "he" => "Hebrew".to_string(),
        "hu" => "Hungarian".to_string(),
        "cs" => "Czech".to_string(),
        "el" => "Greek".to_string(),
        "uk" => "Ukrainian".to_string(),
        "id" => "Indonesian".to_string(),
        "ms" => "Malay".to_string(),
        "bn" => "Bengali".to_string(),
        "ta" => "Tamil".to_string(),
        "en" => "English".to_string(),
        _ => code.to_string(),
    }
}
