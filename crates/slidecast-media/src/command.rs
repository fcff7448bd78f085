//! FFmpeg command builder and runner.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tracing::{debug, warn};

use crate::error::{MediaError, MediaResult};
use crate::graph::InputSource;
use crate::progress::{parse_progress_line, FfmpegProgress};

/// How many trailing diagnostic lines to keep for error reporting.
const STDERR_TAIL_LINES: usize = 12;

/// Builder for multi-input FFmpeg commands.
#[derive(Debug, Clone)]
pub struct FfmpegCommand {
    /// Per-input argument groups, each ending in `-i <source>`
    inputs: Vec<Vec<String>>,
    /// Output file path
    output: PathBuf,
    /// Arguments between the inputs and the output path
    output_args: Vec<String>,
    /// Whether to overwrite the output
    overwrite: bool,
    /// Log level
    log_level: String,
}

impl FfmpegCommand {
    /// Create a new FFmpeg command writing to `output`.
    pub fn new(output: impl AsRef<Path>) -> Self {
        Self {
            inputs: Vec::new(),
            output: output.as_ref().to_path_buf(),
            output_args: Vec::new(),
            overwrite: true,
            log_level: "error".to_string(),
        }
    }

    /// Add one input with its full argument group.
    pub fn input(mut self, source: &InputSource) -> Self {
        self.inputs.push(source.to_input_args());
        self
    }

    /// Add all inputs of a graph, in order.
    pub fn inputs<'a, I>(mut self, sources: I) -> Self
    where
        I: IntoIterator<Item = &'a InputSource>,
    {
        for source in sources {
            self.inputs.push(source.to_input_args());
        }
        self
    }

    /// Add an output argument (after the inputs).
    pub fn output_arg(mut self, arg: impl Into<String>) -> Self {
        self.output_args.push(arg.into());
        self
    }

    /// Add multiple output arguments.
    pub fn output_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.output_args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set the filter graph.
    pub fn filter_complex(self, filter: impl Into<String>) -> Self {
        self.output_arg("-filter_complex").output_arg(filter)
    }

    /// Map a labeled filter output.
    pub fn map_label(self, label: impl AsRef<str>) -> Self {
        self.output_arg("-map")
            .output_arg(format!("[{}]", label.as_ref()))
    }

    /// Map the audio stream of an input by index.
    pub fn map_audio_input(self, index: usize) -> Self {
        self.output_arg("-map").output_arg(format!("{index}:a"))
    }

    /// Cap the output duration.
    pub fn duration(self, seconds: u32) -> Self {
        self.output_arg("-t").output_arg(seconds.to_string())
    }

    /// Set the log level.
    pub fn log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    /// Build the command arguments.
    pub fn build_args(&self) -> Vec<String> {
        let mut args = Vec::new();

        if self.overwrite {
            args.push("-y".to_string());
        }

        args.push("-v".to_string());
        args.push(self.log_level.clone());

        // Progress output to stderr
        args.push("-progress".to_string());
        args.push("pipe:2".to_string());

        for input in &self.inputs {
            args.extend(input.iter().cloned());
        }

        args.extend(self.output_args.clone());

        args.push(self.output.to_string_lossy().to_string());

        args
    }
}

/// Runner for FFmpeg commands with progress tracking and a kill-on-timeout.
pub struct FfmpegRunner {
    /// Timeout in seconds
    timeout_secs: Option<u64>,
}

impl Default for FfmpegRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl FfmpegRunner {
    /// Create a new runner.
    pub fn new() -> Self {
        Self { timeout_secs: None }
    }

    /// Set a timeout; on expiry the process is killed and the run fails.
    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }

    /// Run an FFmpeg command.
    pub async fn run(&self, cmd: &FfmpegCommand) -> MediaResult<()> {
        self.run_with_progress(cmd, |_| {}).await
    }

    /// Run an FFmpeg command with a progress callback.
    pub async fn run_with_progress<F>(
        &self,
        cmd: &FfmpegCommand,
        progress_callback: F,
    ) -> MediaResult<()>
    where
        F: Fn(FfmpegProgress) + Send + 'static,
    {
        which::which("ffmpeg").map_err(|_| MediaError::FfmpegNotFound)?;

        let args = cmd.build_args();
        debug!("Running FFmpeg: ffmpeg {}", args.join(" "));

        let mut child = Command::new("ffmpeg")
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()?;

        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| MediaError::ffmpeg_failed("stderr not captured", None, None))?;
        let mut reader = BufReader::new(stderr).lines();

        // Parse progress blocks off stderr; everything that is not a
        // progress key is diagnostic output worth keeping for errors.
        let progress_handle = tokio::spawn(async move {
            let mut current = FfmpegProgress::default();
            let mut diagnostics: Vec<String> = Vec::new();

            while let Ok(Some(line)) = reader.next_line().await {
                if let Some(progress) = parse_progress_line(&line, &mut current) {
                    progress_callback(progress);
                } else if !line.contains('=') && !line.trim().is_empty() {
                    if diagnostics.len() == STDERR_TAIL_LINES {
                        diagnostics.remove(0);
                    }
                    diagnostics.push(line);
                }
            }

            diagnostics
        });

        let result = self.wait_for_completion(&mut child).await;
        let diagnostics = progress_handle.await.unwrap_or_default();

        match result {
            Ok(status) if status.success() => Ok(()),
            Ok(status) => Err(MediaError::ffmpeg_failed(
                "FFmpeg exited with non-zero status",
                (!diagnostics.is_empty()).then(|| diagnostics.join("\n")),
                status.code(),
            )),
            Err(e) => Err(e),
        }
    }

    /// Wait for the child, killing it when the timeout expires.
    async fn wait_for_completion(
        &self,
        child: &mut Child,
    ) -> MediaResult<std::process::ExitStatus> {
        match self.timeout_secs {
            Some(timeout_secs) => {
                let timeout = tokio::time::timeout(
                    std::time::Duration::from_secs(timeout_secs),
                    child.wait(),
                );
                match timeout.await {
                    Ok(result) => Ok(result?),
                    Err(_) => {
                        warn!(
                            "FFmpeg timed out after {} seconds, killing process",
                            timeout_secs
                        );
                        let _ = child.kill().await;
                        Err(MediaError::Timeout(timeout_secs))
                    }
                }
            }
            None => Ok(child.wait().await?),
        }
    }
}

/// Check if FFmpeg is available.
pub fn check_ffmpeg() -> MediaResult<PathBuf> {
    which::which("ffmpeg").map_err(|_| MediaError::FfmpegNotFound)
}

#[cfg(test)]
mod tests {
    use super::*;
    use slidecast_models::TargetSize;

    #[test]
    fn test_command_builder_arg_order() {
        let cmd = FfmpegCommand::new("out.mp4")
            .input(&InputSource::Still {
                path: "a.jpg".into(),
            })
            .input(&InputSource::Silence)
            .filter_complex("[0:v]scale=2:2[v]")
            .map_label("v")
            .map_audio_input(1)
            .duration(8);

        let args = cmd.build_args();
        assert_eq!(args[0], "-y");
        assert!(args.contains(&"-progress".to_string()));
        assert!(args.contains(&"pipe:2".to_string()));

        // inputs before the filter graph, output path last
        let loop_pos = args.iter().position(|a| a == "-loop").unwrap();
        let filter_pos = args.iter().position(|a| a == "-filter_complex").unwrap();
        assert!(loop_pos < filter_pos);
        assert_eq!(args.last().unwrap(), "out.mp4");

        assert!(args.contains(&"[v]".to_string()));
        assert!(args.contains(&"1:a".to_string()));
        assert!(args.contains(&"-t".to_string()));
    }

    #[test]
    fn test_input_arg_groups() {
        let color = InputSource::ColorBackground {
            color: "0x0f78b4".to_string(),
            size: TargetSize::new(720, 1280),
            duration_secs: 8,
        };
        assert_eq!(
            color.to_input_args(),
            vec!["-f", "lavfi", "-i", "color=c=0x0f78b4:s=720x1280:d=8"]
        );

        let silence = InputSource::Silence;
        let args = silence.to_input_args();
        assert_eq!(args[..2], ["-f", "lavfi"]);
        assert!(args[3].starts_with("anullsrc="));
    }
}
