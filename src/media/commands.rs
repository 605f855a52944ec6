use std::path::Path;
use std::time::Duration;

use crate::error::Result;
use super::runner::{ToolInvocation, ToolOutput, ToolRunner};

/// Abstract media processing command representation
#[derive(Debug, Clone)]
pub struct MediaCommand {
    pub binary_path: String,
    pub args: Vec<String>,
    pub description: String,
    pub timeout: Duration,
}

impl MediaCommand {
    /// Create a new media processing command
    pub fn new<S1: Into<String>, S2: Into<String>>(binary_path: S1, description: S2) -> Self {
        Self {
            binary_path: binary_path.into(),
            args: Vec::new(),
            description: description.into(),
            timeout: Duration::from_secs(30),
        }
    }

    /// Add an argument
    pub fn arg<S: Into<String>>(mut self, arg: S) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Add multiple arguments
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(|s| s.into()));
        self
    }

    /// Bound the command's run time
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Add input file
    pub fn input<P: AsRef<Path>>(self, path: P) -> Self {
        self.arg("-i").arg(path.as_ref().to_string_lossy().to_string())
    }

    /// Add output file
    pub fn output<P: AsRef<Path>>(self, path: P) -> Self {
        self.arg(path.as_ref().to_string_lossy().to_string())
    }

    /// Force overwrite output
    pub fn overwrite(self) -> Self {
        self.arg("-y")
    }

    /// Keep ffmpeg quiet apart from errors
    pub fn quiet(self) -> Self {
        self.arg("-hide_banner").arg("-nostdin").arg("-loglevel").arg("error")
    }

    /// Set video codec
    pub fn video_codec<S: Into<String>>(self, codec: S) -> Self {
        self.arg("-c:v").arg(codec)
    }

    /// Set audio codec
    pub fn audio_codec<S: Into<String>>(self, codec: S) -> Self {
        self.arg("-c:a").arg(codec)
    }

    /// Set audio bitrate
    pub fn audio_bitrate<S: Into<String>>(self, bitrate: S) -> Self {
        self.arg("-b:a").arg(bitrate)
    }

    /// Copy video stream
    pub fn copy_video(self) -> Self {
        self.video_codec("copy")
    }

    /// Disable video
    pub fn no_video(self) -> Self {
        self.arg("-vn")
    }

    /// Set audio sample rate
    pub fn audio_sample_rate(self, rate: u32) -> Self {
        self.arg("-ar").arg(rate.to_string())
    }

    /// Set audio channels
    pub fn audio_channels(self, channels: u32) -> Self {
        self.arg("-ac").arg(channels.to_string())
    }

    /// Select a stream
    pub fn map<S: Into<String>>(self, specifier: S) -> Self {
        self.arg("-map").arg(specifier)
    }

    /// Read a lavfi virtual device as input
    pub fn lavfi_input<S: Into<String>>(self, graph: S) -> Self {
        self.arg("-f").arg("lavfi").arg("-i").arg(graph)
    }

    pub fn into_invocation(self) -> ToolInvocation {
        ToolInvocation {
            program: self.binary_path,
            args: self.args,
            description: self.description,
            timeout: self.timeout,
        }
    }

    /// Execute the command, failing on a non-zero exit
    pub async fn execute(self, runner: &dyn ToolRunner) -> Result<ToolOutput> {
        let description = self.description.clone();
        let output = runner.run(&self.into_invocation()).await?;
        output.ensure_success(&description)
    }
}

/// Audio encoder the container at `path` accepts, by extension
pub fn audio_codec_for<'a>(path: &Path, fallback: &'a str) -> &'a str {
    let extension = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    match extension.as_str() {
        "mp3" => "libmp3lame",
        "wav" => "pcm_s16le",
        "flac" => "flac",
        "ogg" => "libvorbis",
        "opus" => "libopus",
        "m4a" | "aac" | "mp4" => "aac",
        _ => fallback,
    }
}

/// Builder for the ffmpeg/ffprobe calls the pipeline needs
#[derive(Debug, Clone)]
pub struct MediaCommandBuilder {
    ffmpeg_path: String,
    ffprobe_path: String,
}

impl MediaCommandBuilder {
    /// Create a new command builder
    pub fn new<S1: Into<String>, S2: Into<String>>(ffmpeg_path: S1, ffprobe_path: S2) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
            ffprobe_path: ffprobe_path.into(),
        }
    }

    fn ffmpeg<S: Into<String>>(&self, description: S) -> MediaCommand {
        MediaCommand::new(&self.ffmpeg_path, description).quiet().overwrite()
    }

    /// Build version check command
    pub fn version_check(&self) -> MediaCommand {
        MediaCommand::new(&self.ffmpeg_path, "Version check").arg("-version")
    }

    /// Container duration in seconds, printed bare on stdout
    pub fn probe_duration<P: AsRef<Path>>(&self, path: P) -> MediaCommand {
        MediaCommand::new(&self.ffprobe_path, "Duration probe")
            .args(["-v", "error", "-show_entries", "format=duration"])
            .args(["-of", "default=noprint_wrappers=1:nokey=1"])
            .output(path)
    }

    /// Audio extraction as recognition-friendly mono PCM
    pub fn extract_audio_pcm<P: AsRef<Path>>(&self, video_path: P, audio_path: P, sample_rate: u32) -> MediaCommand {
        self.ffmpeg("Audio extraction (pcm)")
            .input(video_path)
            .no_video()
            .audio_codec("pcm_s16le")
            .audio_sample_rate(sample_rate)
            .audio_channels(1)
            .output(audio_path)
    }

    /// Audio extraction of the first audio stream only, letting ffmpeg pick the
    /// encoder from the output extension
    pub fn extract_audio_first_stream<P: AsRef<Path>>(&self, video_path: P, audio_path: P, sample_rate: u32) -> MediaCommand {
        self.ffmpeg("Audio extraction (first stream)")
            .input(video_path)
            .map("0:a:0")
            .no_video()
            .audio_sample_rate(sample_rate)
            .audio_channels(1)
            .output(audio_path)
    }

    /// Accurate cut: decode from the start and seek after the input
    pub fn cut_accurate<P: AsRef<Path>>(&self, audio_path: P, output_path: P, start: f64, duration: f64) -> MediaCommand {
        self.ffmpeg("Chunk cut (accurate seek)")
            .input(audio_path)
            .arg("-ss").arg(format!("{:.3}", start))
            .arg("-t").arg(format!("{:.3}", duration))
            .arg("-acodec").arg("copy")
            .output(output_path)
    }

    /// Fast cut: input seek with re-encode
    pub fn cut_reencode<P: AsRef<Path>>(&self, audio_path: P, output_path: P, start: f64, duration: f64, sample_rate: u32) -> MediaCommand {
        self.ffmpeg("Chunk cut (input seek, re-encode)")
            .arg("-ss").arg(format!("{:.3}", start))
            .input(audio_path)
            .arg("-t").arg(format!("{:.3}", duration))
            .audio_codec("pcm_s16le")
            .audio_sample_rate(sample_rate)
            .audio_channels(1)
            .output(output_path)
    }

    /// Whole-file reformat to mono PCM
    pub fn reformat_audio<P: AsRef<Path>>(&self, input_path: P, output_path: P, sample_rate: u32) -> MediaCommand {
        self.ffmpeg("Audio reformat")
            .input(input_path)
            .no_video()
            .audio_codec("pcm_s16le")
            .audio_sample_rate(sample_rate)
            .audio_channels(1)
            .output(output_path)
    }

    /// Silent audio of the given length; encoder follows the output extension
    pub fn silence<P: AsRef<Path>>(&self, output_path: P, duration: f64, sample_rate: u32) -> MediaCommand {
        self.ffmpeg("Silence generation")
            .lavfi_input(format!("anullsrc=r={}:cl=mono", sample_rate))
            .arg("-t").arg(format!("{:.3}", duration))
            .output(output_path)
    }

    /// Container-level concat through a manifest, streams copied
    pub fn concat_manifest_copy<P: AsRef<Path>>(&self, manifest: P, output_path: P) -> MediaCommand {
        self.ffmpeg("Audio concat (manifest, copy)")
            .args(["-f", "concat", "-safe", "0"])
            .input(manifest)
            .arg("-c").arg("copy")
            .output(output_path)
    }

    /// Same manifest, re-encoded to one rate and layout
    pub fn concat_manifest_reencode<P: AsRef<Path>>(
        &self,
        manifest: P,
        output_path: P,
        codec: &str,
        bitrate: &str,
        sample_rate: u32,
    ) -> MediaCommand {
        self.ffmpeg("Audio concat (manifest, re-encode)")
            .args(["-f", "concat", "-safe", "0"])
            .input(manifest)
            .audio_codec(codec)
            .audio_bitrate(bitrate)
            .audio_sample_rate(sample_rate)
            .audio_channels(1)
            .output(output_path)
    }

    /// Filter-graph concat naming every input explicitly. Each input is
    /// resampled first so pieces from different encoders line up.
    pub fn concat_filter<P: AsRef<Path>>(
        &self,
        inputs: &[P],
        output_path: P,
        codec: &str,
        bitrate: &str,
        sample_rate: u32,
    ) -> MediaCommand {
        let mut cmd = self.ffmpeg("Audio concat (filter graph)");
        for input in inputs {
            cmd = cmd.input(input);
        }
        let normalized: String = (0..inputs.len())
            .map(|i| format!("[{i}:a]aresample={sample_rate},aformat=channel_layouts=mono[a{i}];"))
            .collect();
        let labels: String = (0..inputs.len()).map(|i| format!("[a{}]", i)).collect();
        cmd.arg("-filter_complex")
            .arg(format!("{}{}concat=n={}:v=0:a=1[out]", normalized, labels, inputs.len()))
            .map("[out]")
            .audio_codec(codec)
            .audio_bitrate(bitrate)
            .output(output_path)
    }

    /// Mux strategy 1: explicit mapping with timestamp normalization
    pub fn mux_explicit<P: AsRef<Path>>(&self, video: P, audio: P, output: P, codec: &str, bitrate: &str) -> MediaCommand {
        self.ffmpeg("Mux (explicit map, normalized timestamps)")
            .arg("-fflags").arg("+genpts")
            .input(video)
            .input(audio)
            .map("0:v:0")
            .map("1:a:0")
            .copy_video()
            .audio_codec(codec)
            .audio_bitrate(bitrate)
            .arg("-avoid_negative_ts").arg("make_zero")
            .arg("-shortest")
            .output(output)
    }

    /// Mux strategy 2: explicit mapping only
    pub fn mux_simple<P: AsRef<Path>>(&self, video: P, audio: P, output: P, codec: &str, bitrate: &str) -> MediaCommand {
        self.ffmpeg("Mux (simple map)")
            .input(video)
            .input(audio)
            .map("0:v:0")
            .map("1:a:0")
            .copy_video()
            .audio_codec(codec)
            .audio_bitrate(bitrate)
            .output(output)
    }

    /// Mux strategy 3: no mapping, ffmpeg picks streams
    pub fn mux_unmapped<P: AsRef<Path>>(&self, video: P, audio: P, output: P, codec: &str, bitrate: &str) -> MediaCommand {
        self.ffmpeg("Mux (unmapped)")
            .input(video)
            .input(audio)
            .copy_video()
            .audio_codec(codec)
            .audio_bitrate(bitrate)
            .output(output)
    }

    /// Mux strategy 4: black canvas carrying only the new audio
    pub fn mux_silent_canvas<P: AsRef<Path>>(
        &self,
        audio: P,
        output: P,
        duration: f64,
        codec: &str,
        audio_bitrate: &str,
        video_bitrate: &str,
    ) -> MediaCommand {
        self.ffmpeg("Mux (silent canvas)")
            .lavfi_input(format!("color=c=black:s=1280x720:r=25:d={:.3}", duration))
            .input(audio)
            .map("0:v:0")
            .map("1:a:0")
            .video_codec("libx264")
            .arg("-b:v").arg(video_bitrate)
            .arg("-pix_fmt").arg("yuv420p")
            .audio_codec(codec)
            .audio_bitrate(audio_bitrate)
            .arg("-shortest")
            .output(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn builder() -> MediaCommandBuilder {
        MediaCommandBuilder::new("ffmpeg", "ffprobe")
    }

    #[test]
    fn mux_explicit_copies_video_and_maps_streams() {
        let cmd = builder().mux_explicit(
            Path::new("in.mp4"),
            Path::new("dub.mp3"),
            Path::new("out.mp4"),
            "aac",
            "192k",
        );
        let args = cmd.args.join(" ");
        assert!(args.contains("-map 0:v:0 -map 1:a:0"));
        assert!(args.contains("-c:v copy"));
        assert!(args.contains("-c:a aac -b:a 192k"));
        assert!(args.contains("+genpts"));
        assert_eq!(cmd.args.last().map(String::as_str), Some("out.mp4"));
    }

    #[test]
    fn concat_filter_labels_every_input() {
        let inputs = vec![PathBuf::from("a.mp3"), PathBuf::from("b.mp3"), PathBuf::from("c.mp3")];
        let cmd = builder().concat_filter(&inputs, PathBuf::from("out.mp3"), "libmp3lame", "128k", 24000);
        let graph = cmd.args.iter().find(|a| a.contains("concat=n=3")).unwrap();
        assert!(graph.starts_with("[0:a]aresample=24000,aformat=channel_layouts=mono[a0];"));
        assert!(graph.ends_with("[a0][a1][a2]concat=n=3:v=0:a=1[out]"));
        assert_eq!(cmd.args.iter().filter(|a| *a == "-i").count(), 3);
    }

    #[test]
    fn codec_follows_the_container() {
        assert_eq!(audio_codec_for(Path::new("dubbed.mp3"), "aac"), "libmp3lame");
        assert_eq!(audio_codec_for(Path::new("dubbed.WAV"), "aac"), "pcm_s16le");
        assert_eq!(audio_codec_for(Path::new("dubbed.ogg"), "aac"), "libvorbis");
        assert_eq!(audio_codec_for(Path::new("dubbed.m4a"), "libmp3lame"), "aac");
        assert_eq!(audio_codec_for(Path::new("dubbed.xyz"), "aac"), "aac");
        assert_eq!(audio_codec_for(Path::new("dubbed"), "aac"), "aac");
    }

    #[test]
    fn probe_uses_ffprobe() {
        let cmd = builder().probe_duration("movie.mp4").timeout(Duration::from_secs(5));
        let invocation = cmd.into_invocation();
        assert_eq!(invocation.program, "ffprobe");
        assert_eq!(invocation.timeout, Duration::from_secs(5));
        assert_eq!(invocation.args.last().map(String::as_str), Some("movie.mp4"));
    }
}
