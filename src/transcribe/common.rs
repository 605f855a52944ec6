use serde::{Deserialize, Serialize};

/// Service-agnostic recognition output: every alternative transcript a
/// recognizer offered for one chunk, best-first as the service ranked them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Recognition {
    pub candidates: Vec<String>,
    pub language: String,
    pub speaker_count: u32,
}

impl Recognition {
    pub fn single<S: Into<String>>(text: S, language: &str) -> Self {
        let mut recognition = Self {
            candidates: Vec::new(),
            language: language.to_string(),
            speaker_count: 0,
        };
        recognition.push_candidate(text.into());
        recognition
    }

    /// Add a candidate unless it is blank or already present
    pub fn push_candidate(&mut self, text: String) {
        let text = text.trim().to_string();
        if !text.is_empty() && !self.candidates.contains(&text) {
            self.candidates.push(text);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }
}

/// Transcript document returned by the recognition job service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceTranscript {
    #[serde(default)]
    pub job_name: Option<String>,
    pub results: ServiceResults,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceResults {
    #[serde(default)]
    pub transcripts: Vec<ServiceText>,
    #[serde(default)]
    pub segments: Vec<ServiceSegment>,
    #[serde(default)]
    pub speaker_labels: Option<ServiceSpeakerLabels>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceText {
    pub transcript: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceSegment {
    #[serde(default)]
    pub alternatives: Vec<ServiceText>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceSpeakerLabels {
    #[serde(default)]
    pub speakers: u32,
}

/// Trait for converting service-specific transcript formats to [`Recognition`]
pub trait TranscriptMapper<T> {
    fn to_recognition(service_result: T, language: &str) -> Recognition;
}

pub struct ServiceTranscriptMapper;

impl TranscriptMapper<ServiceTranscript> for ServiceTranscriptMapper {
    /// The primary transcript comes first. Alternative `n` is rebuilt by
    /// joining the n-th alternative of every segment, falling back to the
    /// segment's first alternative where it offers fewer.
    fn to_recognition(service_result: ServiceTranscript, language: &str) -> Recognition {
        let results = service_result.results;
        let mut recognition = Recognition {
            candidates: Vec::new(),
            language: language.to_string(),
            speaker_count: results.speaker_labels.as_ref().map(|l| l.speakers).unwrap_or(0),
        };

        let primary = results
            .transcripts
            .iter()
            .map(|t| t.transcript.trim())
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        recognition.push_candidate(primary);

        let depth = results.segments.iter().map(|s| s.alternatives.len()).max().unwrap_or(0);
        for n in 0..depth {
            let joined = results
                .segments
                .iter()
                .filter_map(|segment| segment.alternatives.get(n).or_else(|| segment.alternatives.first()))
                .map(|alt| alt.transcript.trim())
                .filter(|t| !t.is_empty())
                .collect::<Vec<_>>()
                .join(" ");
            recognition.push_candidate(joined);
        }

        recognition
    }
}
