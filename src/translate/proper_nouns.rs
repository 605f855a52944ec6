//! Keeps names intact across machine translation.
//!
//! Capitalized tokens that look like names are swapped for positional
//! placeholders (`__PN0__`, `__PN1__`, ...) before translation and put back
//! afterwards. The transform hands back the restoration map with the text, so
//! concurrent translations never share state.

use regex::Regex;
use std::collections::HashSet;

const COMMON_CAPITALIZED: &[&str] = &[
    "I", "A", "An", "The", "And", "But", "Or", "So", "If", "Then", "This", "That", "These", "Those", "It", "He",
    "She", "We", "They", "You", "My", "Your", "Our", "Their", "His", "Her", "Its", "In", "On", "At", "To", "Of",
    "For", "With", "From", "By", "As", "Is", "Are", "Was", "Were", "Not", "No", "Yes", "Oh", "Ok", "Okay", "Well",
    "Now", "Here", "There", "What", "When", "Where", "Why", "How", "Who", "Which", "Let", "Do", "Can", "Just",
    "Also", "However", "Because", "Today", "Tomorrow", "Yesterday", "Thanks", "Hello", "Hi",
];

/// Text with names replaced, plus what each placeholder stands for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtectedText {
    pub text: String,
    pub restorations: Vec<(String, String)>,
}

pub struct ProperNounGuard {
    token: Regex,
    placeholder: Regex,
}

impl Default for ProperNounGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl ProperNounGuard {
    pub fn new() -> Self {
        Self {
            token: Regex::new(r"\b\p{Lu}[\p{L}\p{N}'’-]*").expect("name token pattern is valid"),
            placeholder: Regex::new(r"__\s*[Pp][Nn]\s*(\d+)\s*__").expect("placeholder pattern is valid"),
        }
    }

    pub fn protect(&self, text: &str) -> ProtectedText {
        let mid_sentence: HashSet<&str> = self
            .token
            .find_iter(text)
            .filter(|m| !is_sentence_initial(text, m.start()))
            .map(|m| m.as_str())
            .collect();

        let mut restorations: Vec<(String, String)> = Vec::new();
        let mut protected = String::with_capacity(text.len());
        let mut cursor = 0;

        for m in self.token.find_iter(text) {
            let word = m.as_str();
            if COMMON_CAPITALIZED.contains(&word) || word.chars().count() < 2 {
                continue;
            }
            // A capitalized first word is only a name if it also shows up mid-sentence
            if is_sentence_initial(text, m.start()) && !mid_sentence.contains(word) {
                continue;
            }

            let placeholder = match restorations.iter().find(|(_, original)| original == word) {
                Some((placeholder, _)) => placeholder.clone(),
                None => {
                    let placeholder = format!("__PN{}__", restorations.len());
                    restorations.push((placeholder.clone(), word.to_string()));
                    placeholder
                }
            };
            protected.push_str(&text[cursor..m.start()]);
            protected.push_str(&placeholder);
            cursor = m.end();
        }
        protected.push_str(&text[cursor..]);

        ProtectedText {
            text: protected,
            restorations,
        }
    }

    /// Put names back, tolerating placeholders the translator re-spaced or re-cased
    pub fn restore(&self, translated: &str, restorations: &[(String, String)]) -> String {
        self.placeholder
            .replace_all(translated, |caps: &regex::Captures| {
                caps[1]
                    .parse::<usize>()
                    .ok()
                    .and_then(|i| restorations.get(i))
                    .map(|(_, original)| original.clone())
                    .unwrap_or_else(|| caps[0].to_string())
            })
            .into_owned()
    }
}

fn is_sentence_initial(text: &str, start: usize) -> bool {
    let before = text[..start].trim_end();
    before.is_empty() || before.ends_with(['.', '!', '?', '。', '！', '？', '\n'])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip_through_identity_translation() {
        let guard = ProperNounGuard::new();
        let texts = [
            "Yesterday Alice met Bob in Paris. Alice said hello.",
            "The NASA launch was watched by O'Brien and Jean-Luc.",
            "nothing capitalized here",
            "Tokyo is big. We love Tokyo!",
        ];
        for text in texts {
            let protected = guard.protect(text);
            assert_eq!(guard.restore(&protected.text, &protected.restorations), text);
        }
    }

    #[test]
    fn repeated_names_share_one_placeholder() {
        let guard = ProperNounGuard::new();
        let protected = guard.protect("We asked Alice, and Alice agreed.");
        assert_eq!(protected.text, "We asked __PN0__, and __PN0__ agreed.");
        assert_eq!(protected.restorations, vec![("__PN0__".to_string(), "Alice".to_string())]);
    }

    #[test]
    fn sentence_initial_words_are_left_alone_unless_seen_mid_sentence() {
        let guard = ProperNounGuard::new();
        let protected = guard.protect("Suddenly it rained. Tokyo is big. We love Tokyo!");
        assert!(protected.text.starts_with("Suddenly"));
        assert_eq!(protected.text, "Suddenly it rained. __PN0__ is big. We love __PN0__!");
    }

    #[test]
    fn restore_tolerates_mangled_placeholders() {
        let guard = ProperNounGuard::new();
        let restorations = vec![("__PN0__".to_string(), "Kenji".to_string())];
        assert_eq!(guard.restore("こんにちは、__ pn0 __さん", &restorations), "こんにちは、Kenjiさん");
        assert_eq!(guard.restore("__PN7__ stays", &restorations), "__PN7__ stays");
    }
}
