//! Redub - Fault-tolerant video narration translation
//!
//! Command line entry point: loads configuration, wires the services and runs
//! jobs through the orchestrator with a live progress bar per job.

use anyhow::{Result, bail};
use async_trait::async_trait;
use clap::Parser;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{Level, error, info, warn};
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use redub::batch::discover_videos;
use redub::chunking::ChunkingEngine;
use redub::cli::{Args, Commands, parse_languages};
use redub::config::Config;
use redub::job::{
    JobOrchestrator, JobRepository, JobStatus, JsonFileJobRepository, LogNotifier, ResultStatus, TranslationJob,
};
use redub::media::MediaProcessorFactory;
use redub::pipeline::Services;
use redub::storage::StorageFacade;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    setup_logging(args.verbose)?;

    let config = match &args.config {
        Some(config_path) => Config::from_file(config_path)?,
        None => {
            if Path::new("redub.toml").exists() {
                info!("Found redub.toml in current directory, loading...");
                Config::from_file("redub.toml")?
            } else {
                Config::default()
            }
        }
    };

    if let Commands::InitConfig { output, force } = &args.command {
        if output.exists() && !force {
            bail!("{} already exists (use --force to overwrite)", output.display());
        }
        Config::default().save_to_file(output)?;
        println!("Wrote default configuration to {}", output.display());
        return Ok(());
    }

    let media = MediaProcessorFactory::create_processor(config.tools.clone());
    let version = media.check_availability().await?;
    info!("Using {}", version);

    match args.command {
        Commands::Probe { input } => {
            let duration = media.probe_duration(&input).await?;
            println!("{}: {:.2}s", input.display(), duration);
        }
        Commands::Chunk {
            input,
            output_dir,
            duration,
        } => {
            std::fs::create_dir_all(&output_dir)?;
            let audio = output_dir.join("audio.wav");
            media.extract_audio(&input, &audio).await?;

            let engine = ChunkingEngine::new(
                media.clone(),
                config.pipeline.min_chunk_duration_secs,
                config.pipeline.min_chunk_bytes,
            );
            let chunk_duration = duration.unwrap_or(config.pipeline.chunk_duration_secs);
            let set = engine.split(&audio, chunk_duration, &output_dir.join("chunks")).await?;

            println!("{:<6} {:>10} {:>10} {:>10} {:>10}  Path", "Index", "Start", "End", "Duration", "Bytes");
            for chunk in &set.chunks {
                println!(
                    "{:<6} {:>10.2} {:>10.2} {:>10.2} {:>10}  {}",
                    chunk.index,
                    chunk.start,
                    chunk.end,
                    chunk.duration,
                    chunk.size_bytes,
                    chunk.path.display()
                );
            }
            println!(
                "{} chunks over {:.2}s, {} dropped, fallback {:?}",
                set.chunks.len(),
                set.total_duration,
                set.dropped,
                set.fallback
            );
        }
        Commands::Process {
            input,
            source_lang,
            target_langs,
            output_dir,
        } => {
            let (orchestrator, storage) = build_orchestrator(config)?;
            let targets = parse_languages(&target_langs);
            let job = orchestrator.process(&input, &source_lang, &targets).await?;
            report(&job);
            if let Some(dir) = output_dir {
                download_outputs(&storage, &job, &dir).await?;
            }
            if job.status == JobStatus::Failed {
                bail!("job {} failed", job.id);
            }
        }
        Commands::Batch {
            input_dir,
            source_lang,
            target_langs,
            output_dir,
        } => {
            let items = discover_videos(&input_dir, &config.pipeline)?;
            let (orchestrator, storage) = build_orchestrator(config)?;
            let targets = parse_languages(&target_langs);

            let mut failed = 0;
            for item in &items {
                let outcome = match orchestrator
                    .submit_named(&item.path, &item.name, &source_lang, &targets)
                    .await
                {
                    Ok(job) => orchestrator.run(job.id, &item.path).await,
                    Err(e) => Err(e),
                };
                match outcome {
                    Ok(job) => {
                        report(&job);
                        if job.status == JobStatus::Failed {
                            failed += 1;
                        }
                        if let Some(dir) = &output_dir {
                            let parent = Path::new(&item.name).parent().unwrap_or(Path::new(""));
                            download_outputs(&storage, &job, &dir.join(parent)).await?;
                        }
                    }
                    Err(e) => {
                        failed += 1;
                        warn!("Failed to process {}: {}", item.path.display(), e);
                    }
                }
            }
            info!("Batch finished: {} of {} videos failed", failed, items.len());
        }
        Commands::InitConfig { .. } => {}
    }

    Ok(())
}

fn build_orchestrator(config: Config) -> Result<(JobOrchestrator, Arc<StorageFacade>)> {
    let services = Arc::new(Services::from_config(&config)?);
    let storage = services.storage.clone();
    let jobs_dir = PathBuf::from(&config.storage.local_path).join("jobs");
    let repository = Arc::new(ProgressDisplay::new(Arc::new(JsonFileJobRepository::new(jobs_dir)?)));
    let orchestrator = JobOrchestrator::new(Arc::new(config), services, repository, Arc::new(LogNotifier));
    Ok((orchestrator, storage))
}

fn report(job: &TranslationJob) {
    println!("\nJob {} ({}): {}", job.id, job.original_filename, job.status);
    for result in &job.results {
        match result.status {
            ResultStatus::Completed => println!(
                "  {:<6} {}{} sync={} chunks failed={}/{}",
                result.language,
                result.output_key.as_ref().map(|k| k.as_str()).unwrap_or("-"),
                if result.degraded { " (degraded)" } else { "" },
                result.sync_quality.map(|s| s.to_string()).unwrap_or_default(),
                result.failed_chunks,
                result.total_chunks
            ),
            _ => println!(
                "  {:<6} {}: {}",
                result.language,
                result.status,
                result.error_message.as_deref().unwrap_or("")
            ),
        }
    }
    if let Some(message) = &job.error_message {
        println!("  error: {}", message);
    }
}

async fn download_outputs(storage: &StorageFacade, job: &TranslationJob, dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir)?;
    for result in &job.results {
        let Some(key) = &result.output_key else { continue };
        let file_name = key.as_str().rsplit('/').next().unwrap_or(key.as_str());
        let path = dir.join(file_name);
        match storage.get_to_file(key, &path).await {
            Ok(size) => info!("Saved {} ({} bytes)", path.display(), size),
            Err(e) => error!("Could not download {}: {}", key, e),
        }
    }
    Ok(())
}

/// Repository decorator drawing one progress bar per job from each persisted update
struct ProgressDisplay {
    inner: Arc<dyn JobRepository>,
    bars: MultiProgress,
    active: Mutex<HashMap<Uuid, ProgressBar>>,
}

impl ProgressDisplay {
    fn new(inner: Arc<dyn JobRepository>) -> Self {
        Self {
            inner,
            bars: MultiProgress::new(),
            active: Mutex::new(HashMap::new()),
        }
    }

    fn show(&self, job: &TranslationJob) {
        let Ok(mut active) = self.active.lock() else { return };
        let bar = active.entry(job.id).or_insert_with(|| {
            let pb = self.bars.add(ProgressBar::new(100));
            if let Ok(style) = ProgressStyle::default_bar().template("{msg} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}%") {
                pb.set_style(style.progress_chars("#>-"));
            }
            pb
        });
        bar.set_message(format!("{} {}", job.original_filename, job.status));
        bar.set_position(job.progress.round() as u64);
        if job.status.is_terminal() {
            bar.finish();
            active.remove(&job.id);
        }
    }
}

#[async_trait]
impl JobRepository for ProgressDisplay {
    async fn save(&self, job: &TranslationJob) -> redub::error::Result<()> {
        self.inner.save(job).await?;
        self.show(job);
        Ok(())
    }

    async fn get(&self, id: Uuid) -> redub::error::Result<Option<TranslationJob>> {
        self.inner.get(id).await
    }

    async fn list_by_status(&self, status: JobStatus) -> redub::error::Result<Vec<TranslationJob>> {
        self.inner.list_by_status(status).await
    }
}

/// Setup logging to both console and file
fn setup_logging(verbose: bool) -> Result<()> {
    let log_dir = std::env::current_dir()?.join(".redub").join("log");
    std::fs::create_dir_all(&log_dir)?;

    // Set up file appender with daily rotation
    let file_appender = rolling::daily(&log_dir, "redub.log");
    let (non_blocking_file, guard) = non_blocking(file_appender);
    // Keep the guard alive for the duration of the program
    std::mem::forget(guard);

    let log_level = if verbose { Level::DEBUG } else { Level::INFO };

    let console_layer = fmt::layer().with_target(false).with_thread_ids(true);

    let file_layer = fmt::layer()
        .with_writer(non_blocking_file)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(false);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(log_level.into()))
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    info!("Logging initialized - console: {}, file: {}", log_level, log_dir.join("redub.log").display());

    Ok(())
}
