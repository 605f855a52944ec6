use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use crate::error::{Result, RedubError};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub pipeline: PipelineConfig,
    pub tools: ToolsConfig,
    pub storage: StorageConfig,
    pub recognition: RecognitionConfig,
    pub translation: TranslationConfig,
    pub synthesis: SynthesisConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Nominal chunk length in seconds (minimum 5)
    pub chunk_duration_secs: f64,
    /// Upper bound on per-language runs executing at once
    pub max_concurrent_jobs: usize,
    /// Attempts for collaborator HTTP calls on transport errors
    pub retry_attempts: u32,
    /// Delay between collaborator retries in milliseconds
    pub retry_delay_ms: u64,
    /// Accepted input container extensions
    pub supported_formats: Vec<String>,
    /// Longest accepted source video in seconds
    pub max_duration_secs: f64,
    /// Chunks shorter than this are dropped
    pub min_chunk_duration_secs: f64,
    /// Chunks smaller than this are dropped
    pub min_chunk_bytes: u64,
    /// Root for per-run temporary directories
    pub work_dir: String,
    /// Intermediate language for two-hop translation
    pub pivot_language: String,
    /// Texts longer than this (chars) are translated sentence by sentence
    pub long_text_threshold: usize,
    /// Choose voices using the size/duration gender heuristic.
    /// Low accuracy; off unless explicitly enabled.
    pub gender_voice_selection: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    /// Path to ffmpeg binary
    pub ffmpeg_path: String,
    /// Path to ffprobe binary
    pub ffprobe_path: String,
    /// Path to the whisper CLI (local recognizer only)
    pub whisper_path: String,
    /// Timeout for probes and other quick operations
    pub quick_timeout_secs: u64,
    /// Timeout for full-length audio extraction
    pub extract_timeout_secs: u64,
    /// Timeout for cutting or generating a single chunk
    pub chunk_timeout_secs: u64,
    /// Timeout for each concatenation strategy
    pub concat_timeout_secs: u64,
    /// Escalating timeouts for the mux strategies, in ladder order
    pub mux_timeouts_secs: Vec<u64>,
    /// Timeout for local whisper transcription of one chunk
    pub transcribe_timeout_secs: u64,
    /// Codec for the replaced narration track
    pub audio_codec: String,
    /// Bitrate for the replaced narration track
    pub audio_bitrate: String,
    /// Bitrate for the silent canvas fallback video
    pub video_bitrate: String,
    /// Sample rate of chunks handed to recognition
    pub chunk_sample_rate: u32,
    /// Sample rate of generated silence and re-encoded narration; match the synthesizer
    pub dub_sample_rate: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Remote S3-compatible bucket. Local-only when absent.
    pub remote: Option<RemoteStorageConfig>,
    /// Local filesystem fallback root
    pub local_path: String,
    /// Lifetime of presigned URLs in seconds
    pub url_expiry_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteStorageConfig {
    pub bucket: String,
    pub region: String,
    pub endpoint: Option<String>,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    #[serde(default)]
    pub allow_http: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum RecognizerProvider {
    /// Job-based speech-to-text service reached over HTTP
    Http,
    /// Local whisper command line tool
    WhisperCli,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecognitionConfig {
    pub provider: RecognizerProvider,
    pub endpoint: String,
    pub api_key: Option<String>,
    /// Alternatives requested per transcription job
    pub max_alternatives: u32,
    pub show_speaker_labels: bool,
    pub poll_interval_secs: u64,
    pub max_poll_attempts: u32,
    /// Model name passed to the whisper CLI
    pub whisper_model: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum TranslatorProvider {
    /// Translation service reached over HTTP
    Http,
    /// Local Ollama model prompted for JSON translations
    Ollama,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranslationConfig {
    pub provider: TranslatorProvider,
    pub endpoint: String,
    pub api_key: Option<String>,
    /// Ollama model name
    pub model: String,
    /// Language pairs the Ollama model handles directly, as "src-tgt"
    pub direct_pairs: Vec<String>,
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthesisConfig {
    pub endpoint: String,
    pub api_key: Option<String>,
    /// Audio format requested from the synthesizer
    pub output_format: String,
    pub request_timeout_secs: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            chunk_duration_secs: 180.0,
            max_concurrent_jobs: 2,
            retry_attempts: 3,
            retry_delay_ms: 1000,
            supported_formats: ["mp4", "mov", "mkv", "avi", "webm", "m4v"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            max_duration_secs: 4.0 * 3600.0,
            min_chunk_duration_secs: 0.5,
            min_chunk_bytes: 1024,
            work_dir: ".redub/work".to_string(),
            pivot_language: "en".to_string(),
            long_text_threshold: 500,
            gender_voice_selection: false,
        }
    }
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: "ffmpeg".to_string(),
            ffprobe_path: "ffprobe".to_string(),
            whisper_path: "whisper".to_string(),
            quick_timeout_secs: 30,
            extract_timeout_secs: 120,
            chunk_timeout_secs: 60,
            concat_timeout_secs: 180,
            mux_timeouts_secs: vec![30, 60, 120, 180],
            transcribe_timeout_secs: 180,
            audio_codec: "aac".to_string(),
            audio_bitrate: "192k".to_string(),
            video_bitrate: "1M".to_string(),
            chunk_sample_rate: 16000,
            dub_sample_rate: 24000,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            remote: None,
            local_path: ".redub/storage".to_string(),
            url_expiry_secs: 3600,
        }
    }
}

impl Default for RecognitionConfig {
    fn default() -> Self {
        Self {
            provider: RecognizerProvider::Http,
            endpoint: "http://localhost:8081".to_string(),
            api_key: None,
            max_alternatives: 3,
            show_speaker_labels: true,
            poll_interval_secs: 5,
            max_poll_attempts: 60,
            whisper_model: "base".to_string(),
        }
    }
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            provider: TranslatorProvider::Http,
            endpoint: "http://localhost:8082".to_string(),
            api_key: None,
            model: "llama3.2:3b".to_string(),
            direct_pairs: vec![
                "en-ja".to_string(),
                "ja-en".to_string(),
                "en-es".to_string(),
                "es-en".to_string(),
                "en-fr".to_string(),
                "fr-en".to_string(),
                "en-de".to_string(),
                "de-en".to_string(),
            ],
            request_timeout_secs: 300,
        }
    }
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:8083".to_string(),
            api_key: None,
            output_format: "mp3".to_string(),
            request_timeout_secs: 120,
        }
    }
}

impl ToolsConfig {
    pub fn quick_timeout(&self) -> Duration {
        Duration::from_secs(self.quick_timeout_secs)
    }

    pub fn extract_timeout(&self) -> Duration {
        Duration::from_secs(self.extract_timeout_secs)
    }

    pub fn chunk_timeout(&self) -> Duration {
        Duration::from_secs(self.chunk_timeout_secs)
    }

    pub fn concat_timeout(&self) -> Duration {
        Duration::from_secs(self.concat_timeout_secs)
    }

    /// Timeout for mux strategy `index`; strategies past the configured list reuse the last entry.
    pub fn mux_timeout(&self, index: usize) -> Duration {
        let secs = self
            .mux_timeouts_secs
            .get(index)
            .or(self.mux_timeouts_secs.last())
            .copied()
            .unwrap_or(self.concat_timeout_secs);
        Duration::from_secs(secs)
    }
}

impl PipelineConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn is_supported_format(&self, extension: &str) -> bool {
        let extension = extension.to_lowercase();
        self.supported_formats.iter().any(|f| f.eq_ignore_ascii_case(&extension))
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| RedubError::Config(format!("Failed to read config file: {}", e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| RedubError::Config(format!("Failed to parse config file: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| RedubError::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| RedubError::Config(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.pipeline.chunk_duration_secs < 5.0 {
            return Err(RedubError::Config(format!(
                "chunk_duration_secs must be at least 5, got {}",
                self.pipeline.chunk_duration_secs
            )));
        }
        if self.pipeline.max_concurrent_jobs == 0 {
            return Err(RedubError::Config("max_concurrent_jobs must be positive".to_string()));
        }
        if self.pipeline.supported_formats.is_empty() {
            return Err(RedubError::Config("supported_formats must not be empty".to_string()));
        }
        if self.tools.mux_timeouts_secs.is_empty() {
            return Err(RedubError::Config("mux_timeouts_secs must not be empty".to_string()));
        }
        if self.recognition.max_poll_attempts == 0 {
            return Err(RedubError::Config("max_poll_attempts must be positive".to_string()));
        }
        Ok(())
    }
}
