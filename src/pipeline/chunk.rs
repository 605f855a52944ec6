use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::Services;
use crate::chunking::AudioChunk;
use crate::error::{RedubError, Result};
use crate::storage::StorageKey;
use crate::synthesize::VoiceSelector;
use crate::transcribe::{RecognitionRequest, TranscriptSelector};
use crate::translate::{ProperNounGuard, RoutedTranslator, TextTranslator, split_sentences};

/// Identifies the run a chunk belongs to
#[derive(Debug, Clone)]
pub struct ChunkContext {
    pub job_id: Uuid,
    pub source_language: String,
    pub target_language: String,
}

#[derive(Debug, Clone)]
pub struct TranslatedChunk {
    pub index: usize,
    pub source_text: String,
    pub translated_text: String,
    pub voice_id: String,
    pub audio_path: PathBuf,
    pub audio_bytes: u64,
    /// Sentences left untranslated because their translation failed
    pub untranslated_sentences: usize,
}

pub struct ChunkTranslator {
    services: Arc<Services>,
    translator: RoutedTranslator,
    selector: TranscriptSelector,
    guard: ProperNounGuard,
    long_text_threshold: usize,
}

impl ChunkTranslator {
    pub fn new(services: Arc<Services>, pivot_language: &str, long_text_threshold: usize) -> Self {
        let translator = RoutedTranslator::new(services.translator.clone(), pivot_language);
        Self {
            services,
            translator,
            selector: TranscriptSelector::new(),
            guard: ProperNounGuard::new(),
            long_text_threshold,
        }
    }

    /// Recognize, translate and voice one chunk into `output_path`
    pub async fn process(
        &self,
        ctx: &ChunkContext,
        voices: &VoiceSelector,
        chunk: &AudioChunk,
        output_path: &Path,
    ) -> Result<TranslatedChunk> {
        let source_text = self.recognize(ctx, chunk).await?;
        let (translated_text, untranslated_sentences) = self
            .translate_text(&source_text, &ctx.source_language, &ctx.target_language)
            .await?;
        if translated_text.trim().is_empty() {
            return Err(RedubError::Translation(format!("chunk {} translated to nothing", chunk.index)));
        }

        let voice = voices.choose(chunk.size_bytes, chunk.duration);
        self.services
            .synthesizer
            .synthesize(&translated_text, &voice.id, output_path)
            .await?;

        let audio_bytes = tokio::fs::metadata(output_path).await.map(|m| m.len()).unwrap_or(0);
        if audio_bytes == 0 {
            return Err(RedubError::Synthesis(format!("chunk {} produced an empty audio file", chunk.index)));
        }

        info!(
            "Chunk {} done: {} chars -> {} chars, voice {}",
            chunk.index,
            source_text.chars().count(),
            translated_text.chars().count(),
            voice.id
        );
        Ok(TranslatedChunk {
            index: chunk.index,
            source_text,
            translated_text,
            voice_id: voice.id.clone(),
            audio_path: output_path.to_path_buf(),
            audio_bytes,
            untranslated_sentences,
        })
    }

    /// Upload the chunk so a remote recognizer can read it, then pick the best transcript
    async fn recognize(&self, ctx: &ChunkContext, chunk: &AudioChunk) -> Result<String> {
        let extension = chunk.path.extension().and_then(|e| e.to_str()).unwrap_or("wav");
        let key = StorageKey::chunk(&ctx.job_id, &ctx.target_language, chunk.index, extension);

        let media_uri = match self.services.storage.put_file(&key, &chunk.path).await {
            Ok(_) => match self.services.storage.url(&key).await {
                Ok(url) => Some(url),
                Err(e) => {
                    warn!("No URL for chunk {}: {}", chunk.index, e);
                    None
                }
            },
            Err(e) => {
                warn!("Could not upload chunk {}: {}", chunk.index, e);
                None
            }
        };

        let request = RecognitionRequest {
            job_name: format!("{}-{}-{:03}", ctx.job_id, ctx.target_language, chunk.index),
            audio_path: chunk.path.clone(),
            media_uri: media_uri.clone(),
            language: ctx.source_language.clone(),
            chunk_index: chunk.index,
        };
        let recognition = self.services.recognizer.recognize(&request).await;

        if media_uri.is_some() {
            if let Err(e) = self.services.storage.delete(&key).await {
                debug!("Leaving uploaded chunk {} behind: {}", key, e);
            }
        }

        let selection = self.selector.select(&recognition?.candidates);
        if selection.text.is_empty() {
            return Err(RedubError::Recognition(format!("no speech recognized in chunk {}", chunk.index)));
        }
        debug!(
            "Chunk {} transcript chosen from {} candidate(s), score {:.1}",
            chunk.index,
            selection.candidates.len(),
            selection.score
        );
        Ok(selection.text)
    }

    /// Translate with names protected. Long texts go sentence by sentence and
    /// keep the original wording of any sentence that fails.
    pub async fn translate_text(&self, text: &str, source: &str, target: &str) -> Result<(String, usize)> {
        if text.chars().count() <= self.long_text_threshold {
            let translated = self.translate_protected(text, source, target).await?;
            return Ok((translated, 0));
        }

        let sentences = split_sentences(text);
        debug!("Translating {} sentences separately", sentences.len());
        let mut translated = Vec::with_capacity(sentences.len());
        let mut untranslated = 0;
        for sentence in &sentences {
            match self.translate_protected(sentence, source, target).await {
                Ok(t) if !t.trim().is_empty() => translated.push(t),
                Ok(_) => {
                    warn!("Empty translation for a sentence, keeping the original");
                    untranslated += 1;
                    translated.push(sentence.clone());
                }
                Err(e) => {
                    warn!("Sentence translation failed, keeping the original: {}", e);
                    untranslated += 1;
                    translated.push(sentence.clone());
                }
            }
        }

        if untranslated == sentences.len() {
            return Err(RedubError::Translation(format!(
                "none of {} sentences could be translated",
                sentences.len()
            )));
        }
        Ok((translated.join(" "), untranslated))
    }

    async fn translate_protected(&self, text: &str, source: &str, target: &str) -> Result<String> {
        let protected = self.guard.protect(text);
        let translated = self.translator.translate(&protected.text, source, target).await?;
        Ok(self.guard.restore(&translated, &protected.restorations))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunking::ChunkOrigin;
    use crate::media::{ConcatStrategy, MediaProcessor, MuxStrategy};
    use crate::storage::{ObjectStoreBackend, StorageFacade};
    use crate::synthesize::{MockSpeechSynthesizer, Voice, VoiceGender};
    use crate::transcribe::{MockSpeechRecognizer, Recognition};
    use crate::translate::MockTextTranslator;
    use async_trait::async_trait;

    struct NoMedia;

    #[async_trait]
    impl MediaProcessor for NoMedia {
        async fn check_availability(&self) -> Result<String> {
            Ok("none".into())
        }
        async fn probe_duration(&self, _: &Path) -> Result<f64> {
            Ok(0.0)
        }
        async fn extract_audio(&self, _: &Path, _: &Path) -> Result<()> {
            Ok(())
        }
        async fn cut_segment(&self, _: &Path, _: f64, _: f64, _: &Path) -> Result<()> {
            Ok(())
        }
        async fn reformat_audio(&self, _: &Path, _: &Path) -> Result<()> {
            Ok(())
        }
        async fn generate_silence(&self, _: f64, _: &Path) -> Result<()> {
            Ok(())
        }
        async fn concat_audio(&self, _: &[PathBuf], _: &Path) -> Result<ConcatStrategy> {
            Ok(ConcatStrategy::ManifestCopy)
        }
        async fn mux(&self, _: &Path, _: &Path, _: &Path, _: f64) -> Result<MuxStrategy> {
            Ok(MuxStrategy::ExplicitMap)
        }
    }

    fn services(
        recognizer: MockSpeechRecognizer,
        translator: MockTextTranslator,
        synthesizer: MockSpeechSynthesizer,
    ) -> Arc<Services> {
        Arc::new(Services {
            media: Arc::new(NoMedia),
            storage: Arc::new(StorageFacade::new(None, Arc::new(ObjectStoreBackend::memory()))),
            recognizer: Arc::new(recognizer),
            translator: Arc::new(translator),
            synthesizer: Arc::new(synthesizer),
        })
    }

    fn chunk(dir: &Path) -> AudioChunk {
        let path = dir.join("chunk_000.wav");
        std::fs::write(&path, vec![0u8; 2048]).unwrap();
        AudioChunk {
            index: 0,
            start: 0.0,
            end: 180.0,
            duration: 180.0,
            size_bytes: 2048,
            path,
            origin: ChunkOrigin::Segment,
        }
    }

    fn ctx() -> ChunkContext {
        ChunkContext {
            job_id: Uuid::new_v4(),
            source_language: "en".into(),
            target_language: "ja".into(),
        }
    }

    fn voices() -> VoiceSelector {
        let voice = Voice {
            id: "ja-1".into(),
            language: "ja".into(),
            gender: VoiceGender::Female,
            name: None,
        };
        VoiceSelector::new("ja", vec![voice], false).unwrap()
    }

    fn identity_pairs(translator: &mut MockTextTranslator) {
        translator.expect_supported_pairs().returning(|| Ok(vec![]));
    }

    #[tokio::test]
    async fn chunk_flows_through_all_collaborators() {
        let dir = tempfile::tempdir().unwrap();
        let mut recognizer = MockSpeechRecognizer::new();
        recognizer
            .expect_recognize()
            .withf(|req| req.media_uri.as_deref().is_some_and(|u| u.starts_with("memory://")))
            .returning(|_| Ok(Recognition::single("hello Alice", "en")));

        let mut translator = MockTextTranslator::new();
        identity_pairs(&mut translator);
        translator
            .expect_translate()
            .returning(|text, _, _| Ok(text.replace("hello", "こんにちは")));

        let mut synthesizer = MockSpeechSynthesizer::new();
        synthesizer.expect_synthesize().returning(|_, _, path| {
            std::fs::write(path, b"mp3-bytes").unwrap();
            Ok(9)
        });

        let processor = ChunkTranslator::new(services(recognizer, translator, synthesizer), "en", 500);
        let out = dir.path().join("translated_000.mp3");
        let result = processor.process(&ctx(), &voices(), &chunk(dir.path()), &out).await.unwrap();

        assert_eq!(result.source_text, "hello Alice.");
        assert_eq!(result.translated_text, "こんにちは Alice.");
        assert_eq!(result.voice_id, "ja-1");
        assert_eq!(result.audio_bytes, 9);
    }

    #[tokio::test]
    async fn empty_synthesis_fails_the_chunk() {
        let dir = tempfile::tempdir().unwrap();
        let mut recognizer = MockSpeechRecognizer::new();
        recognizer
            .expect_recognize()
            .returning(|_| Ok(Recognition::single("some words", "en")));
        let mut translator = MockTextTranslator::new();
        identity_pairs(&mut translator);
        translator.expect_translate().returning(|t, _, _| Ok(t.to_string()));
        let mut synthesizer = MockSpeechSynthesizer::new();
        synthesizer.expect_synthesize().returning(|_, _, path| {
            std::fs::write(path, b"").unwrap();
            Ok(0)
        });

        let processor = ChunkTranslator::new(services(recognizer, translator, synthesizer), "en", 500);
        let out = dir.path().join("translated_000.mp3");
        let err = processor.process(&ctx(), &voices(), &chunk(dir.path()), &out).await.unwrap_err();
        assert!(matches!(err, RedubError::Synthesis(_)));
    }

    #[tokio::test]
    async fn silent_chunk_is_a_recognition_failure() {
        let dir = tempfile::tempdir().unwrap();
        let mut recognizer = MockSpeechRecognizer::new();
        recognizer.expect_recognize().returning(|_| Ok(Recognition::default()));

        let processor = ChunkTranslator::new(
            services(recognizer, MockTextTranslator::new(), MockSpeechSynthesizer::new()),
            "en",
            500,
        );
        let out = dir.path().join("translated_000.mp3");
        let err = processor.process(&ctx(), &voices(), &chunk(dir.path()), &out).await.unwrap_err();
        assert!(matches!(err, RedubError::Recognition(_)));
    }

    #[tokio::test]
    async fn long_text_keeps_failed_sentences_verbatim() {
        let mut translator = MockTextTranslator::new();
        identity_pairs(&mut translator);
        translator.expect_translate().returning(|text, _, _| {
            if text.contains("broken") {
                Err(RedubError::Translation("service hiccup".into()))
            } else {
                Ok(format!("[{}]", text))
            }
        });

        let processor = ChunkTranslator::new(
            services(MockSpeechRecognizer::new(), translator, MockSpeechSynthesizer::new()),
            "en",
            20,
        );
        let (text, untranslated) = processor
            .translate_text("First sentence here. This one is broken. Last one!", "en", "fr")
            .await
            .unwrap();

        assert_eq!(text, "[First sentence here.] This one is broken. [Last one!]");
        assert_eq!(untranslated, 1);
    }
}
