//! In-process stand-ins for ffmpeg and the speech services.
//!
//! The fake media tool keeps a table of "durations" for every file it writes;
//! recognized text has one word per second of audio and synthesized audio
//! lasts one second per word, so timing survives the whole round trip.

#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use redub::config::Config;
use redub::error::{RedubError, Result};
use redub::job::{JobRepository, JobStatus, Notifier, TranslationJob};
use redub::media::{ConcatStrategy, MediaProcessor, MuxStrategy};
use redub::pipeline::Services;
use redub::storage::{ObjectStoreBackend, StorageBackend, StorageFacade, StorageKey};
use redub::synthesize::{SpeechSynthesizer, Voice, VoiceGender};
use redub::transcribe::{Recognition, RecognitionRequest, SpeechRecognizer};
use redub::translate::{LanguagePair, TextTranslator};

const BYTES_PER_SECOND: f64 = 100.0;

#[derive(Default)]
pub struct FakeMedia {
    pub source_duration: f64,
    pub fail_cuts: bool,
    /// window starts whose cut fails, dropping just that window
    pub failing_cut_starts: Vec<f64>,
    pub fail_extract: bool,
    pub durations: Mutex<HashMap<PathBuf, f64>>,
    pub mux_calls: Mutex<usize>,
}

impl FakeMedia {
    pub fn new(source_duration: f64) -> Self {
        Self {
            source_duration,
            ..Default::default()
        }
    }

    pub fn record(&self, path: &Path, duration: f64) -> Result<()> {
        let size = ((duration * BYTES_PER_SECOND) as usize).max(1);
        std::fs::write(path, vec![0u8; size])?;
        self.durations.lock().unwrap().insert(path.to_path_buf(), duration);
        Ok(())
    }

    /// Recorded duration of the file written under this name, wherever it went
    pub fn duration_of_file(&self, file_name: &str) -> Option<f64> {
        self.durations
            .lock()
            .unwrap()
            .iter()
            .find(|(path, _)| path.file_name().is_some_and(|n| n == file_name))
            .map(|(_, duration)| *duration)
    }

    pub fn duration_of(&self, path: &Path) -> f64 {
        self.durations
            .lock()
            .unwrap()
            .get(path)
            .copied()
            .unwrap_or(self.source_duration)
    }
}

#[async_trait]
impl MediaProcessor for FakeMedia {
    async fn check_availability(&self) -> Result<String> {
        Ok("fake media 1.0".to_string())
    }

    async fn probe_duration(&self, path: &Path) -> Result<f64> {
        Ok(self.duration_of(path))
    }

    async fn extract_audio(&self, _video_path: &Path, audio_path: &Path) -> Result<()> {
        if self.fail_extract {
            return Err(RedubError::LadderExhausted {
                operation: "extract audio".to_string(),
                attempts: 2,
                last_error: "no audio stream".to_string(),
            });
        }
        self.record(audio_path, self.source_duration)
    }

    async fn cut_segment(&self, _audio_path: &Path, start: f64, duration: f64, output_path: &Path) -> Result<()> {
        if self.fail_cuts || self.failing_cut_starts.iter().any(|s| (s - start).abs() < 1e-6) {
            return Err(RedubError::Tool("cut failed".to_string()));
        }
        self.record(output_path, duration)
    }

    async fn reformat_audio(&self, input_path: &Path, output_path: &Path) -> Result<()> {
        self.record(output_path, self.duration_of(input_path))
    }

    async fn generate_silence(&self, duration: f64, output_path: &Path) -> Result<()> {
        self.record(output_path, duration)
    }

    async fn concat_audio(&self, inputs: &[PathBuf], output_path: &Path) -> Result<ConcatStrategy> {
        let total: f64 = inputs.iter().map(|p| self.duration_of(p)).sum();
        self.record(output_path, total)?;
        Ok(ConcatStrategy::ManifestCopy)
    }

    async fn mux(
        &self,
        _video_path: &Path,
        audio_path: &Path,
        output_path: &Path,
        _source_duration: f64,
    ) -> Result<MuxStrategy> {
        *self.mux_calls.lock().unwrap() += 1;
        self.record(output_path, self.duration_of(audio_path))?;
        Ok(MuxStrategy::ExplicitMap)
    }
}

/// One distinct word per second of the chunk
pub struct WordRecognizer {
    pub media: Arc<FakeMedia>,
    /// chunk indexes the service times out on
    pub failing_chunks: Vec<usize>,
}

#[async_trait]
impl SpeechRecognizer for WordRecognizer {
    async fn recognize(&self, request: &RecognitionRequest) -> Result<Recognition> {
        if self.failing_chunks.contains(&request.chunk_index) {
            return Err(RedubError::Recognition(format!("job {} timed out", request.job_name)));
        }
        let seconds = self.media.duration_of(&request.audio_path).round() as usize;
        let text = (0..seconds).map(|i| format!("w{}", i)).collect::<Vec<_>>().join(" ");
        Ok(Recognition::single(text, &request.language))
    }
}

/// Tags every word with the target language and records each hop
pub struct TaggingTranslator {
    pub pairs: Vec<LanguagePair>,
    pub calls: Mutex<Vec<(String, String)>>,
    /// targets the service rejects
    pub refused: Vec<String>,
}

impl TaggingTranslator {
    pub fn new(pairs: &[&str]) -> Self {
        Self {
            pairs: pairs.iter().filter_map(|p| LanguagePair::parse(p)).collect(),
            calls: Mutex::new(Vec::new()),
            refused: Vec::new(),
        }
    }

    pub fn refusing(mut self, target: &str) -> Self {
        self.refused.push(target.to_string());
        self
    }

    pub fn hops(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl TextTranslator for TaggingTranslator {
    async fn translate(&self, text: &str, source: &str, target: &str) -> Result<String> {
        self.calls.lock().unwrap().push((source.to_string(), target.to_string()));
        if self.refused.iter().any(|r| r == target) {
            return Err(RedubError::Translation(format!("{} is not offered", target)));
        }
        Ok(text
            .split_whitespace()
            .map(|word| format!("{}:{}", target, word.rsplit(':').next().unwrap_or(word)))
            .collect::<Vec<_>>()
            .join(" "))
    }

    async fn supported_pairs(&self) -> Result<Vec<LanguagePair>> {
        Ok(self.pairs.clone())
    }
}

/// One second of audio per word; records every request
pub struct WordSynthesizer {
    pub media: Arc<FakeMedia>,
    pub texts: Mutex<Vec<(String, String)>>,
    /// languages without any voice
    pub voiceless: Mutex<Vec<String>>,
}

#[async_trait]
impl SpeechSynthesizer for WordSynthesizer {
    async fn synthesize(&self, text: &str, voice_id: &str, output_path: &Path) -> Result<u64> {
        self.texts.lock().unwrap().push((voice_id.to_string(), text.to_string()));
        let words = text.split_whitespace().count() as f64;
        self.media.record(output_path, words)?;
        Ok(std::fs::metadata(output_path)?.len())
    }

    async fn voices(&self, language: &str) -> Result<Vec<Voice>> {
        if self.voiceless.lock().unwrap().iter().any(|l| l == language) {
            return Ok(Vec::new());
        }
        Ok(vec![Voice {
            id: format!("{}-voice", language),
            language: language.to_string(),
            gender: VoiceGender::Neutral,
            name: Some(format!("{} narrator", language)),
        }])
    }
}

/// Remote backend that is never reachable
pub struct DownBackend;

#[async_trait]
impl StorageBackend for DownBackend {
    fn name(&self) -> &str {
        "remote"
    }

    async fn put(&self, _key: &StorageKey, _data: Bytes) -> Result<()> {
        Err(RedubError::Storage("connection refused".to_string()))
    }

    async fn get(&self, _key: &StorageKey) -> Result<Bytes> {
        Err(RedubError::Storage("connection refused".to_string()))
    }

    async fn exists(&self, _key: &StorageKey) -> Result<bool> {
        Err(RedubError::Storage("connection refused".to_string()))
    }

    async fn delete(&self, _key: &StorageKey) -> Result<()> {
        Err(RedubError::Storage("connection refused".to_string()))
    }

    async fn url(&self, _key: &StorageKey) -> Result<String> {
        Err(RedubError::Storage("connection refused".to_string()))
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    pub failed: Mutex<Vec<Uuid>>,
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn job_failed(&self, job: &TranslationJob) -> Result<()> {
        self.failed.lock().unwrap().push(job.id);
        Ok(())
    }
}

/// In-memory repository keeping every saved snapshot
#[derive(Default)]
pub struct HistoryRepository {
    pub history: Mutex<Vec<TranslationJob>>,
}

impl HistoryRepository {
    pub fn progress_trail(&self, id: Uuid) -> Vec<f64> {
        self.history
            .lock()
            .unwrap()
            .iter()
            .filter(|j| j.id == id)
            .map(|j| j.progress)
            .collect()
    }
}

#[async_trait]
impl JobRepository for HistoryRepository {
    async fn save(&self, job: &TranslationJob) -> Result<()> {
        self.history.lock().unwrap().push(job.clone());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<TranslationJob>> {
        Ok(self.history.lock().unwrap().iter().rev().find(|j| j.id == id).cloned())
    }

    async fn list_by_status(&self, status: JobStatus) -> Result<Vec<TranslationJob>> {
        let history = self.history.lock().unwrap();
        let mut latest: HashMap<Uuid, TranslationJob> = HashMap::new();
        for job in history.iter() {
            latest.insert(job.id, job.clone());
        }
        Ok(latest.into_values().filter(|j| j.status == status).collect())
    }
}

/// History repository whose first save of a finished language result fails
#[derive(Default)]
pub struct FlakyRepository {
    pub inner: HistoryRepository,
    pub tripped: Mutex<bool>,
}

#[async_trait]
impl JobRepository for FlakyRepository {
    async fn save(&self, job: &TranslationJob) -> Result<()> {
        let finished = job.results.iter().any(|r| r.is_terminal());
        {
            let mut tripped = self.tripped.lock().unwrap();
            if finished && !*tripped {
                *tripped = true;
                return Err(RedubError::Repository("db hiccup".to_string()));
            }
        }
        self.inner.save(job).await
    }

    async fn get(&self, id: Uuid) -> Result<Option<TranslationJob>> {
        self.inner.get(id).await
    }

    async fn list_by_status(&self, status: JobStatus) -> Result<Vec<TranslationJob>> {
        self.inner.list_by_status(status).await
    }
}

pub struct Harness {
    pub media: Arc<FakeMedia>,
    pub translator: Arc<TaggingTranslator>,
    pub synthesizer: Arc<WordSynthesizer>,
    pub storage: Arc<StorageFacade>,
    pub services: Arc<Services>,
    pub config: Config,
    pub workspace: tempfile::TempDir,
}

impl Harness {
    pub fn new(media: FakeMedia, translator: TaggingTranslator, primary: Option<Arc<dyn StorageBackend>>) -> Self {
        let workspace = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.pipeline.work_dir = workspace.path().join("work").to_string_lossy().to_string();

        let media = Arc::new(media);
        let translator = Arc::new(translator);
        let synthesizer = Arc::new(WordSynthesizer {
            media: media.clone(),
            texts: Mutex::new(Vec::new()),
            voiceless: Mutex::new(Vec::new()),
        });
        let storage = Arc::new(StorageFacade::new(primary, Arc::new(ObjectStoreBackend::memory())));
        let services = Arc::new(Services {
            media: media.clone(),
            storage: storage.clone(),
            recognizer: Arc::new(WordRecognizer {
                media: media.clone(),
                failing_chunks: Vec::new(),
            }),
            translator: translator.clone(),
            synthesizer: synthesizer.clone(),
        });

        Self {
            media,
            translator,
            synthesizer,
            storage,
            services,
            config,
            workspace,
        }
    }

    /// Swap in a recognizer that fails on the given chunk indexes
    pub fn failing_recognition_on(mut self, chunks: &[usize]) -> Self {
        let recognizer = Arc::new(WordRecognizer {
            media: self.media.clone(),
            failing_chunks: chunks.to_vec(),
        });
        self.services = Arc::new(Services {
            recognizer,
            ..(*self.services).clone()
        });
        self
    }

    /// A non-empty stand-in video file
    pub fn video(&self, name: &str) -> PathBuf {
        let path = self.workspace.path().join(name);
        std::fs::write(&path, b"not really a video").unwrap();
        path
    }

    pub fn work_dir_entries(&self) -> usize {
        std::fs::read_dir(&self.config.pipeline.work_dir)
            .map(|entries| entries.count())
            .unwrap_or(0)
    }
}
