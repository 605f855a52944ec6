use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::checkpoints::{self, chunk_progress};
use super::{ChunkContext, ChunkTranslator, ProgressSink, Reassembler, Services};
use crate::chunking::{ChunkFallback, ChunkingEngine};
use crate::config::Config;
use crate::error::Result;
use crate::job::LanguageOutput;
use crate::storage::StorageKey;
use crate::synthesize::VoiceSelector;

/// Gaps shorter than this between surviving chunks are not padded
const GAP_TOLERANCE_SECS: f64 = 0.05;

/// Everything one language run needs to know about its job
#[derive(Debug, Clone)]
pub struct LanguageTask {
    pub job_id: Uuid,
    pub source_language: String,
    pub target_language: String,
    pub video_path: PathBuf,
    pub source_duration: f64,
    pub output_stem: String,
}

/// Runs the whole stage sequence for one target language. Shared across the
/// languages of a job; each run works in its own temporary directory.
pub struct LanguagePipeline {
    services: Arc<Services>,
    config: Arc<Config>,
    chunking: ChunkingEngine,
    chunks: ChunkTranslator,
    reassembler: Reassembler,
}

impl LanguagePipeline {
    pub fn new(services: Arc<Services>, config: Arc<Config>) -> Self {
        let pipeline = &config.pipeline;
        Self {
            chunking: ChunkingEngine::new(
                services.media.clone(),
                pipeline.min_chunk_duration_secs,
                pipeline.min_chunk_bytes,
            ),
            chunks: ChunkTranslator::new(services.clone(), &pipeline.pivot_language, pipeline.long_text_threshold),
            reassembler: Reassembler::new(services.media.clone()),
            services,
            config,
        }
    }

    pub async fn run(&self, task: &LanguageTask, progress: &dyn ProgressSink) -> Result<LanguageOutput> {
        let language = task.target_language.as_str();
        progress.checkpoint(language, checkpoints::STARTED).await;
        info!("[{}] starting {} -> {}", task.job_id, task.source_language, language);

        let work_root = PathBuf::from(&self.config.pipeline.work_dir);
        tokio::fs::create_dir_all(&work_root).await?;
        // removed on drop, whichever way the run ends
        let workspace = tempfile::Builder::new()
            .prefix(&format!("{}-{}-", task.job_id, language))
            .tempdir_in(&work_root)?;
        let dir = workspace.path();

        let audio_path = dir.join("source.wav");
        self.services.media.extract_audio(&task.video_path, &audio_path).await?;
        progress.checkpoint(language, checkpoints::AUDIO_EXTRACTED).await;

        let set = self
            .chunking
            .split(&audio_path, self.config.pipeline.chunk_duration_secs, &dir.join("chunks"))
            .await?;
        progress.checkpoint(language, checkpoints::CHUNKS_VALIDATED).await;

        let voices = VoiceSelector::new(
            language,
            self.services.synthesizer.voices(language).await?,
            self.config.pipeline.gender_voice_selection,
        )?;
        let ctx = ChunkContext {
            job_id: task.job_id,
            source_language: task.source_language.clone(),
            target_language: language.to_string(),
        };

        let format = self.config.synthesis.output_format.as_str();
        let total = set.chunks.len();
        let mut pieces: Vec<PathBuf> = Vec::with_capacity(total);
        let mut failed_chunks = 0;
        let mut cursor = 0.0;

        for (done, chunk) in set.chunks.iter().enumerate() {
            if chunk.start - cursor > GAP_TOLERANCE_SECS {
                let gap = dir.join(format!("gap_{:03}.{}", chunk.index, format));
                self.push_silence(&mut pieces, &gap, chunk.start - cursor).await;
            }

            let output = dir.join(format!("translated_{:03}.{}", chunk.index, format));
            match self.chunks.process(&ctx, &voices, chunk, &output).await {
                Ok(translated) => pieces.push(translated.audio_path),
                Err(e) => {
                    error!("[{}] chunk {} failed, substituting silence: {}", language, chunk.index, e);
                    failed_chunks += 1;
                    let silence = dir.join(format!("silence_{:03}.{}", chunk.index, format));
                    self.push_silence(&mut pieces, &silence, chunk.duration).await;
                }
            }
            cursor = chunk.end;
            progress.checkpoint(language, chunk_progress(done + 1, total)).await;
        }

        if set.fallback == ChunkFallback::None && set.total_duration - cursor > GAP_TOLERANCE_SECS {
            let tail = dir.join(format!("gap_tail.{}", format));
            self.push_silence(&mut pieces, &tail, set.total_duration - cursor).await;
        }

        let concat = self
            .reassembler
            .concat(&pieces, &dir.join(format!("dubbed.{}", format)), task.source_duration)
            .await?;
        progress.checkpoint(language, checkpoints::CONCATENATED).await;

        let video_out = dir.join(format!("{}_{}.mp4", task.output_stem, language));
        let muxed = self
            .reassembler
            .mux(&task.video_path, &concat.path, &video_out, task.source_duration)
            .await?;
        progress.checkpoint(language, checkpoints::MUXED).await;

        let key = StorageKey::output(&task.job_id, &task.output_stem, language);
        let stored = self.services.storage.put_file(&key, &muxed.path).await?;
        progress.checkpoint(language, checkpoints::PERSISTED).await;

        let output = LanguageOutput {
            stored,
            total_chunks: total,
            failed_chunks,
            chunk_fallback: set.fallback,
            mux_strategy: muxed.strategy,
            sync_quality: muxed.sync,
            output_duration: muxed.duration,
        };
        if output.is_degraded() {
            warn!(
                "[{}] finished degraded: {}/{} chunks failed, chunk fallback {:?}, mux {:?}",
                language, failed_chunks, total, set.fallback, muxed.strategy
            );
        } else {
            info!("[{}] finished: {} ({} bytes)", language, output.stored.key, output.stored.size);
        }
        Ok(output)
    }

    /// Silence keeps the timeline intact; if even that fails the piece is skipped
    async fn push_silence(&self, pieces: &mut Vec<PathBuf>, path: &Path, duration: f64) {
        match self.services.media.generate_silence(duration, path).await {
            Ok(()) => pieces.push(path.to_path_buf()),
            Err(e) => warn!("Could not generate {:.1}s of silence: {}", duration, e),
        }
    }
}
