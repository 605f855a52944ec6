use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Configuration file path (defaults to ./redub.toml when present)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Dub a single video into one or more target languages
    Process {
        /// Input video file
        #[arg(short, long)]
        input: PathBuf,

        /// Language spoken in the video
        #[arg(short, long, default_value = "en")]
        source_lang: String,

        /// Target languages (comma-separated)
        #[arg(short, long, default_value = "ja")]
        target_langs: String,

        /// Copy finished videos from storage into this directory
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
    },

    /// Dub every supported video under a directory
    Batch {
        /// Input directory containing video files
        #[arg(short, long)]
        input_dir: PathBuf,

        /// Language spoken in the videos
        #[arg(short, long, default_value = "en")]
        source_lang: String,

        /// Target languages (comma-separated)
        #[arg(short, long, default_value = "ja")]
        target_langs: String,

        /// Copy finished videos here, mirroring the input layout
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
    },

    /// Print the duration of a media file
    Probe {
        /// Input media file
        #[arg(short, long)]
        input: PathBuf,
    },

    /// Extract and chunk the audio of a video, keeping the chunks
    Chunk {
        /// Input video file
        #[arg(short, long)]
        input: PathBuf,

        /// Directory receiving the audio and its chunks
        #[arg(short, long)]
        output_dir: PathBuf,

        /// Chunk duration in seconds (defaults to the configured value)
        #[arg(short, long)]
        duration: Option<f64>,
    },

    /// Write the default configuration to a file
    InitConfig {
        /// Destination file
        #[arg(short, long, default_value = "redub.toml")]
        output: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

/// Split a comma-separated language list, dropping blanks
pub fn parse_languages(list: &str) -> Vec<String> {
    list.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
