//! Render executor: sanitize, build the graph, run the encoder.
//!
//! The encoder writes next to the final path and the artifact is renamed
//! into place only on success, so a failed or killed render never leaves a
//! partial file at the destination.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use slidecast_models::{EncodingConfig, RenderSpec};

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};
use crate::graph::build_filter_graph;
use crate::text::{sanitize_drawtext, wrap_text, wrap_width};

/// Scratch path the encoder writes to before the final rename.
fn partial_path(output: &Path) -> PathBuf {
    let mut name = output
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    name.push_str(".partial");
    output.with_file_name(name)
}

/// Render one video and return the artifact path.
///
/// `overlay_text` is raw; it is wrapped to the target width and sanitized
/// here, before it reaches the graph builder. An empty string renders
/// without an overlay. `on_progress` receives percentages already capped
/// below 100; the caller owns the terminal done event.
pub async fn render_video<F>(
    spec: &RenderSpec,
    overlay_text: &str,
    encoding: &EncodingConfig,
    timeout_secs: Option<u64>,
    on_progress: F,
) -> MediaResult<PathBuf>
where
    F: Fn(u8) + Send + 'static,
{
    spec.validate().map_err(MediaError::InvalidSpec)?;

    if spec.output_path.exists() {
        return Err(MediaError::OutputExists(spec.output_path.clone()));
    }
    for image in &spec.images {
        if !image.exists() {
            return Err(MediaError::FileNotFound(image.clone()));
        }
    }
    if let Some(audio) = &spec.audio_path {
        if !audio.exists() {
            return Err(MediaError::FileNotFound(audio.clone()));
        }
    }

    let wrapped = wrap_text(overlay_text, wrap_width(spec.size.width));
    let safe_text = sanitize_drawtext(&wrapped);

    let graph = build_filter_graph(spec, &safe_text)?;
    debug!(
        inputs = graph.inputs.len(),
        chains = graph.chains.len(),
        "built filter graph"
    );

    let partial = partial_path(&spec.output_path);
    let duration = spec.duration_secs;

    let cmd = FfmpegCommand::new(&partial)
        .inputs(&graph.inputs)
        .filter_complex(graph.serialize_filters())
        .map_label(&graph.video_out)
        .map_audio_input(graph.audio_input)
        .output_args(encoding.to_ffmpeg_args())
        .duration(duration);

    let mut runner = FfmpegRunner::new();
    if let Some(secs) = timeout_secs {
        runner = runner.with_timeout(secs);
    }

    let result = runner
        .run_with_progress(&cmd, move |progress| {
            on_progress(progress.render_percent(duration));
        })
        .await;

    match result {
        Ok(()) => {
            tokio::fs::rename(&partial, &spec.output_path).await?;
            info!(output = %spec.output_path.display(), "render complete");
            Ok(spec.output_path.clone())
        }
        Err(e) => {
            // never leave scratch output behind
            let _ = tokio::fs::remove_file(&partial).await;
            Err(e)
        }
    }
}
