use tracing::debug;

use super::{Voice, VoiceGender};
use crate::error::{RedubError, Result};
use crate::translate::base_language;

/// Bytes per second above which a chunk is guessed to carry a male voice.
///
/// This is a placeholder heuristic with low accuracy: file density says more
/// about the encoder than the speaker. It only runs when enabled.
const MALE_DENSITY_THRESHOLD: f64 = 24_000.0;

pub fn estimate_gender(size_bytes: u64, duration_secs: f64) -> Option<VoiceGender> {
    if duration_secs <= 0.0 || size_bytes == 0 {
        return None;
    }
    let density = size_bytes as f64 / duration_secs;
    Some(if density >= MALE_DENSITY_THRESHOLD {
        VoiceGender::Male
    } else {
        VoiceGender::Female
    })
}

/// Chooses a synthesis voice for each chunk of one target language
#[derive(Debug, Clone)]
pub struct VoiceSelector {
    voices: Vec<Voice>,
    use_gender: bool,
}

impl VoiceSelector {
    /// Keep only voices for `language`; fails when none remain
    pub fn new(language: &str, voices: Vec<Voice>, use_gender: bool) -> Result<Self> {
        let wanted = base_language(language);
        let voices: Vec<Voice> = voices
            .into_iter()
            .filter(|v| base_language(&v.language) == wanted)
            .collect();
        if voices.is_empty() {
            return Err(RedubError::Synthesis(format!("no voice available for {}", language)));
        }
        Ok(Self { voices, use_gender })
    }

    pub fn choose(&self, chunk_bytes: u64, chunk_duration: f64) -> &Voice {
        let preferred = self
            .use_gender
            .then(|| estimate_gender(chunk_bytes, chunk_duration))
            .flatten()
            .and_then(|gender| self.voices.iter().find(|v| v.gender == gender));

        match preferred {
            Some(voice) => {
                debug!("gender heuristic picked voice {}", voice.id);
                voice
            }
            None => &self.voices[0],
        }
    }
}
