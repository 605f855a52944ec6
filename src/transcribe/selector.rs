//! Picks the most plausible transcript among a recognizer's alternatives.
//!
//! Candidates are scored on surface features only: length, word count,
//! name-like tokens, terminal punctuation, connectives, and penalties for
//! stutter-like repetition or dangling phrases.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::debug;

const LENGTH_CAP: f64 = 20.0;
const WORD_CAP: f64 = 15.0;
const NAME_BONUS: f64 = 2.0;
const TERMINAL_BONUS: f64 = 10.0;
const CONNECTIVE_BONUS: f64 = 5.0;
const REPETITION_PENALTY: f64 = 10.0;
const INCOMPLETE_PENALTY: f64 = 5.0;

const COMMON_WORDS: &[&str] = &[
    "i", "a", "an", "the", "and", "but", "or", "so", "if", "then", "this", "that", "these", "those", "it", "he",
    "she", "we", "they", "you", "my", "your", "our", "their", "his", "her", "its", "in", "on", "at", "to", "of",
    "for", "with", "from", "by", "as", "is", "are", "was", "were", "be", "not", "no", "yes", "oh", "ok", "okay",
    "well", "now", "here", "there", "what", "when", "where", "why", "how", "who", "which", "let", "do", "does",
    "did", "can", "will", "just", "also", "however", "because", "therefore", "mr", "mrs", "ms", "dr",
];

const CONNECTIVES: &[&str] = &[
    "and", "but", "because", "so", "however", "therefore", "then", "also", "although", "while", "which",
];

/// One recognizer alternative with its derived quality score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptCandidate {
    pub text: String,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Selection {
    /// Chosen text after cleanup
    pub text: String,
    /// Score of the chosen text before cleanup
    pub score: f64,
    pub composite: bool,
    pub candidates: Vec<TranscriptCandidate>,
}

impl Selection {
    fn empty() -> Self {
        Self {
            text: String::new(),
            score: 0.0,
            composite: false,
            candidates: Vec::new(),
        }
    }
}

pub struct TranscriptSelector {
    incomplete_patterns: Vec<Regex>,
    missing_space: Regex,
    missing_sentence_space: Regex,
    space_before_punct: Regex,
}

impl Default for TranscriptSelector {
    fn default() -> Self {
        Self::new()
    }
}

impl TranscriptSelector {
    pub fn new() -> Self {
        let incomplete_patterns = [
            r"(?i)\b(and|but|or|the|a|an|to|of|because|so|with|for)\W*$",
            r"\.\.\.\s*$",
            r"(?i)^\W*(and|but|or)\b",
        ]
        .iter()
        .map(|p| Regex::new(p).expect("incomplete-phrase pattern is valid"))
        .collect();

        Self {
            incomplete_patterns,
            missing_space: Regex::new(r"([,;:])(\p{L})").expect("missing-space pattern is valid"),
            // a word ending a sentence, glued to a capitalized word; leaves "e.g." and domains alone
            missing_sentence_space: Regex::new(r"(\p{Ll}[.!?])(\p{Lu})").expect("sentence-space pattern is valid"),
            space_before_punct: Regex::new(r"\s+([.!?,;:])").expect("punctuation pattern is valid"),
        }
    }

    pub fn score(&self, text: &str) -> f64 {
        let text = text.trim();
        if text.is_empty() {
            return 0.0;
        }

        let words: Vec<&str> = text.split_whitespace().collect();
        let mut score = (text.chars().count() as f64 / 10.0).floor().min(LENGTH_CAP);
        score += (words.len() as f64 / 2.0).floor().min(WORD_CAP);
        score += NAME_BONUS * count_name_like(&words) as f64;

        if ends_with_terminal(text) {
            score += TERMINAL_BONUS;
        }
        if words.iter().any(|w| CONNECTIVES.contains(&normalize(w).as_str())) {
            score += CONNECTIVE_BONUS;
        }
        if has_repeated_phrase(&words) {
            score -= REPETITION_PENALTY;
        }
        if self.incomplete_patterns.iter().any(|p| p.is_match(text)) {
            score -= INCOMPLETE_PENALTY;
        }
        score
    }

    pub fn select(&self, alternatives: &[String]) -> Selection {
        let candidates: Vec<TranscriptCandidate> = alternatives
            .iter()
            .map(|text| text.trim())
            .filter(|text| !text.is_empty())
            .map(|text| TranscriptCandidate {
                text: text.to_string(),
                score: self.score(text),
            })
            .collect();

        let Some(base) = candidates
            .iter()
            .fold(None::<&TranscriptCandidate>, |best, c| match best {
                Some(b) if b.score >= c.score => Some(b),
                _ => Some(c),
            })
        else {
            return Selection::empty();
        };

        let mut chosen_text = base.text.clone();
        let mut chosen_score = base.score;
        let mut composite = false;

        if candidates.len() >= 2 {
            if let Some(longest) = self.composite(&candidates) {
                let longest_score = self.score(&longest);
                if longest_score > chosen_score {
                    debug!("composite transcript adopted ({:.1} > {:.1})", longest_score, chosen_score);
                    chosen_text = longest;
                    chosen_score = longest_score;
                    composite = true;
                }
            }
        }

        Selection {
            text: self.cleanup(&chosen_text),
            score: chosen_score,
            composite,
            candidates,
        }
    }

    /// Longest candidate that does not stutter
    fn composite(&self, candidates: &[TranscriptCandidate]) -> Option<String> {
        candidates
            .iter()
            .filter(|c| !has_repeated_phrase(&c.text.split_whitespace().collect::<Vec<_>>()))
            .max_by_key(|c| c.text.chars().count())
            .map(|c| c.text.clone())
    }

    pub fn cleanup(&self, text: &str) -> String {
        let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
        let spaced = self.space_before_punct.replace_all(&collapsed, "$1");
        let joined = self.missing_space.replace_all(&spaced, "$1 $2");
        let joined = self.missing_sentence_space.replace_all(&joined, "$1 $2");
        let mut cleaned = collapse_doubled_words(&joined);

        if let Some(last) = cleaned.chars().last() {
            if last.is_alphanumeric() {
                cleaned.push('.');
            }
        }
        cleaned
    }
}

/// Drop immediate repeats of a bare word ("the the")
fn collapse_doubled_words(text: &str) -> String {
    let mut kept: Vec<&str> = Vec::new();
    for word in text.split_whitespace() {
        let repeated = kept
            .last()
            .is_some_and(|prev| word.chars().all(char::is_alphabetic) && prev.eq_ignore_ascii_case(word));
        if !repeated {
            kept.push(word);
        }
    }
    kept.join(" ")
}

fn normalize(word: &str) -> String {
    word.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase()
}

fn ends_with_terminal(text: &str) -> bool {
    text.trim_end_matches(['"', '\'', ')'])
        .ends_with(['.', '!', '?', '。', '！', '？'])
}

/// Capitalized tokens that are neither sentence-initial nor common words
fn count_name_like(words: &[&str]) -> usize {
    let mut count = 0;
    for (i, word) in words.iter().enumerate() {
        if i == 0 || ends_with_terminal(words[i - 1]) {
            continue;
        }
        let bare = word.trim_matches(|c: char| !c.is_alphanumeric());
        let starts_upper = bare.chars().next().is_some_and(|c| c.is_uppercase());
        if starts_upper && bare.chars().count() > 1 && !COMMON_WORDS.contains(&bare.to_lowercase().as_str()) {
            count += 1;
        }
    }
    count
}

pub(crate) fn has_repeated_phrase(words: &[&str]) -> bool {
    if words.len() < 8 {
        return false;
    }
    let normalized: Vec<String> = words.iter().map(|w| normalize(w)).collect();
    let mut seen = HashSet::new();
    normalized.windows(4).any(|window| !seen.insert(window.join(" ")))
}
