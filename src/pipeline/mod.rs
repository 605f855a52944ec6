// Per-language translation pipeline
//
// - chunk: recognize, translate and synthesize one chunk
// - reassembly: concatenate translated audio and mux it under the picture
// - language: one full run for one target language

pub mod chunk;
pub mod language;
pub mod reassembly;

use async_trait::async_trait;
use std::sync::Arc;

pub use chunk::*;
pub use language::*;
pub use reassembly::*;

use crate::config::Config;
use crate::error::Result;
use crate::media::{MediaProcessor, MediaProcessorFactory, ProcessRunner};
use crate::retry::RetryPolicy;
use crate::storage::{StorageFacade, StorageFactory};
use crate::synthesize::{SpeechSynthesizer, SynthesizerFactory};
use crate::transcribe::{RecognizerFactory, SpeechRecognizer};
use crate::translate::{TextTranslator, TranslatorFactory};

/// Language-local progress checkpoints, in percent
pub mod checkpoints {
    pub const STARTED: f64 = 10.0;
    pub const AUDIO_EXTRACTED: f64 = 40.0;
    pub const CHUNKS_VALIDATED: f64 = 50.0;
    pub const CHUNKS_PROCESSED: f64 = 70.0;
    pub const CONCATENATED: f64 = 80.0;
    pub const MUXED: f64 = 90.0;
    pub const PERSISTED: f64 = 95.0;
    pub const FINISHED: f64 = 100.0;

    /// Progress after `done` of `total` chunks, spread over 50..70
    pub fn chunk_progress(done: usize, total: usize) -> f64 {
        if total == 0 {
            return CHUNKS_PROCESSED;
        }
        CHUNKS_VALIDATED + (CHUNKS_PROCESSED - CHUNKS_VALIDATED) * done.min(total) as f64 / total as f64
    }
}

/// Receives language-local checkpoints as a run advances
#[async_trait]
pub trait ProgressSink: Send + Sync {
    async fn checkpoint(&self, language: &str, percent: f64);
}

/// Discards progress
pub struct NoProgress;

#[async_trait]
impl ProgressSink for NoProgress {
    async fn checkpoint(&self, _language: &str, _percent: f64) {}
}

/// External collaborators shared by every run
#[derive(Clone)]
pub struct Services {
    pub media: Arc<dyn MediaProcessor>,
    pub storage: Arc<StorageFacade>,
    pub recognizer: Arc<dyn SpeechRecognizer>,
    pub translator: Arc<dyn TextTranslator>,
    pub synthesizer: Arc<dyn SpeechSynthesizer>,
}

impl Services {
    pub fn from_config(config: &Config) -> Result<Self> {
        let retry = RetryPolicy::from(&config.pipeline);
        let runner = Arc::new(ProcessRunner::new());
        Ok(Self {
            media: MediaProcessorFactory::create_processor(config.tools.clone()),
            storage: StorageFactory::create(&config.storage)?,
            recognizer: RecognizerFactory::create_recognizer(
                config.recognition.clone(),
                config.tools.clone(),
                runner,
                retry,
            ),
            translator: TranslatorFactory::create_translator(config.translation.clone(), retry),
            synthesizer: SynthesizerFactory::create_synthesizer(config.synthesis.clone(), retry),
        })
    }
}
