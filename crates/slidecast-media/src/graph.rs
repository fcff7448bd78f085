//! Typed filter-graph construction.
//!
//! The builder turns a [`RenderSpec`] into a [`FilterGraph`]: an ordered
//! list of filter chains plus the input enumeration and stream mapping the
//! runner needs. Keeping the graph as data (rather than one big format
//! string) lets the chains be unit-tested without FFmpeg and serialized in
//! a single place.

use std::path::PathBuf;

use slidecast_models::{RenderSpec, TargetSize, FRAME_RATE};

use crate::error::{MediaError, MediaResult};

/// Background color when no images are supplied.
pub const BACKGROUND_COLOR: &str = "0x0f78b4";

/// Fade-in length at the start of the video, in seconds.
pub const FADE_IN_SECS: f64 = 0.6;
/// Fade-out length at the end of the video, in seconds.
pub const FADE_OUT_SECS: f64 = 0.8;

/// Per-frame zoom increment for the Ken Burns effect.
pub const KEN_BURNS_STEP: &str = "0.0009";
/// Zoom ceiling; keeps the crop from eating visible margins.
pub const KEN_BURNS_MAX_ZOOM: &str = "1.06";

/// Minimum seconds a slide stays on screen.
const MIN_SLIDE_SECS: u32 = slidecast_models::spec::MIN_SLIDE_SECS;

/// One media input, in `-i` order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputSource {
    /// A still image, looped so it can be trimmed to its slide duration.
    Still { path: PathBuf },
    /// Synthetic flat-color source filling the whole render.
    ColorBackground {
        color: String,
        size: TargetSize,
        duration_secs: u32,
    },
    /// Background audio track.
    AudioFile { path: PathBuf },
    /// Synthetic silence (stereo, 44100 Hz).
    Silence,
}

impl InputSource {
    /// The `ffmpeg` arguments for this input, including `-i`.
    pub fn to_input_args(&self) -> Vec<String> {
        match self {
            InputSource::Still { path } => vec![
                "-loop".to_string(),
                "1".to_string(),
                "-i".to_string(),
                path.to_string_lossy().to_string(),
            ],
            InputSource::ColorBackground {
                color,
                size,
                duration_secs,
            } => vec![
                "-f".to_string(),
                "lavfi".to_string(),
                "-i".to_string(),
                format!("color=c={color}:s={size}:d={duration_secs}"),
            ],
            InputSource::AudioFile { path } => {
                vec!["-i".to_string(), path.to_string_lossy().to_string()]
            }
            InputSource::Silence => vec![
                "-f".to_string(),
                "lavfi".to_string(),
                "-i".to_string(),
                "anullsrc=channel_layout=stereo:sample_rate=44100".to_string(),
            ],
        }
    }

    pub fn is_video(&self) -> bool {
        matches!(
            self,
            InputSource::Still { .. } | InputSource::ColorBackground { .. }
        )
    }
}

/// A single filter with its parameters, e.g. `scale=w=1080:h=1920`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterSpec {
    pub name: String,
    pub params: Vec<String>,
}

impl FilterSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: Vec::new(),
        }
    }

    /// Add a positional parameter.
    pub fn param(mut self, value: impl Into<String>) -> Self {
        self.params.push(value.into());
        self
    }

    /// Add a `key=value` parameter.
    pub fn named(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push(format!("{}={}", key.into(), value.into()));
        self
    }

    fn serialize(&self) -> String {
        if self.params.is_empty() {
            self.name.clone()
        } else {
            format!("{}={}", self.name, self.params.join(":"))
        }
    }
}

/// One statement of the graph: input labels, a filter pipeline, an output
/// label. Serializes to `[in]filter,filter[out]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterChain {
    pub inputs: Vec<String>,
    pub filters: Vec<FilterSpec>,
    pub output: String,
}

impl FilterChain {
    pub fn new(
        inputs: Vec<String>,
        filters: Vec<FilterSpec>,
        output: impl Into<String>,
    ) -> Self {
        Self {
            inputs,
            filters,
            output: output.into(),
        }
    }

    fn serialize(&self) -> String {
        let inputs: String = self.inputs.iter().map(|l| format!("[{l}]")).collect();
        let filters: Vec<String> = self.filters.iter().map(FilterSpec::serialize).collect();
        format!("{}{}[{}]", inputs, filters.join(","), self.output)
    }

    /// Whether any filter in the chain has the given name.
    pub fn has_filter(&self, name: &str) -> bool {
        self.filters.iter().any(|f| f.name == name)
    }
}

/// The builder's output, consumed exactly once by the runner.
#[derive(Debug, Clone)]
pub struct FilterGraph {
    /// All inputs in `-i` order.
    pub inputs: Vec<InputSource>,
    /// Graph statements in dependency order.
    pub chains: Vec<FilterChain>,
    /// Label of the final video stream (no brackets).
    pub video_out: String,
    /// Input index to map audio from.
    pub audio_input: usize,
    /// Labels entering the join step, one per slide.
    pub slide_labels: Vec<String>,
}

impl FilterGraph {
    /// Serialize all chains into one `-filter_complex` argument.
    pub fn serialize_filters(&self) -> String {
        self.chains
            .iter()
            .map(FilterChain::serialize)
            .collect::<Vec<_>>()
            .join(";")
    }

    /// Find a chain by the name of a filter it contains.
    pub fn chain_with_filter(&self, name: &str) -> Option<&FilterChain> {
        self.chains.iter().find(|c| c.has_filter(name))
    }

    pub fn count_filter(&self, name: &str) -> usize {
        self.chains.iter().filter(|c| c.has_filter(name)).count()
    }
}

/// Seconds each slide stays on screen.
///
/// Clamped to at least [`MIN_SLIDE_SECS`], so renders with many images
/// relative to the duration may undershoot the requested total. That is
/// accepted, not corrected.
pub fn per_slide_secs(duration_secs: u32, image_count: usize) -> u32 {
    (duration_secs / image_count.max(1) as u32).max(MIN_SLIDE_SECS)
}

/// Build the filter graph for one render.
///
/// `overlay_text` must already be wrapped and sanitized; an empty string
/// means no overlay. Construction failures surface here, before any
/// subprocess is spawned.
pub fn build_filter_graph(spec: &RenderSpec, overlay_text: &str) -> MediaResult<FilterGraph> {
    spec.validate().map_err(MediaError::InvalidSpec)?;

    let TargetSize { width, height } = spec.size;
    let duration = spec.duration_secs;

    let mut inputs: Vec<InputSource> = Vec::new();
    let mut chains: Vec<FilterChain> = Vec::new();
    let mut slide_labels: Vec<String> = Vec::new();

    // Input enumeration: images (or the synthetic background) first, the
    // audio input last. Its index feeds the -map directive.
    if spec.images.is_empty() {
        inputs.push(InputSource::ColorBackground {
            color: BACKGROUND_COLOR.to_string(),
            size: spec.size,
            duration_secs: duration,
        });

        chains.push(FilterChain::new(
            vec!["0:v".to_string()],
            vec![
                FilterSpec::new("scale")
                    .param(width.to_string())
                    .param(height.to_string()),
                FilterSpec::new("setsar").param("1"),
                FilterSpec::new("trim").named("duration", duration.to_string()),
                FilterSpec::new("setpts").param("PTS-STARTPTS"),
            ],
            "v0",
        ));
        slide_labels.push("v0".to_string());
    } else {
        let per_slide = per_slide_secs(duration, spec.images.len());

        for (index, image) in spec.images.iter().enumerate() {
            inputs.push(InputSource::Still {
                path: image.clone(),
            });

            let normalized = format!("v{index}");
            // Scale to fit, pad centered, normalize SAR and pixel format so
            // every stream entering concat is identical.
            let mut normalize = vec![
                FilterSpec::new("scale")
                    .named("w", width.to_string())
                    .named("h", height.to_string())
                    .named("force_original_aspect_ratio", "decrease"),
                FilterSpec::new("pad")
                    .param(width.to_string())
                    .param(height.to_string())
                    .param("(ow-iw)/2")
                    .param("(oh-ih)/2"),
                FilterSpec::new("setsar").param("1"),
                FilterSpec::new("format").param("yuv420p"),
            ];

            if spec.ken_burns {
                chains.push(FilterChain::new(
                    vec![format!("{index}:v")],
                    normalize,
                    normalized.clone(),
                ));

                // The looped still repeats its frame, so zoompan restarts
                // its ramp per input frame; trimming afterwards keeps
                // exactly one ramp of per_slide seconds.
                let frames = (per_slide * FRAME_RATE).max(FRAME_RATE);
                let zoomed = format!("kb{index}");
                chains.push(FilterChain::new(
                    vec![normalized],
                    vec![
                        FilterSpec::new("zoompan")
                            .named("z", format!("'min(zoom+{KEN_BURNS_STEP},{KEN_BURNS_MAX_ZOOM})'"))
                            .named("d", frames.to_string())
                            .named("s", spec.size.to_string())
                            .named("fps", FRAME_RATE.to_string()),
                        FilterSpec::new("trim").named("duration", per_slide.to_string()),
                        FilterSpec::new("setpts").param("PTS-STARTPTS"),
                    ],
                    zoomed.clone(),
                ));
                slide_labels.push(zoomed);
            } else {
                normalize.push(FilterSpec::new("trim").named("duration", per_slide.to_string()));
                normalize.push(FilterSpec::new("setpts").param("PTS-STARTPTS"));
                chains.push(FilterChain::new(
                    vec![format!("{index}:v")],
                    normalize,
                    normalized.clone(),
                ));
                slide_labels.push(normalized);
            }
        }
    }

    let audio_input = inputs.len();
    match &spec.audio_path {
        Some(path) => inputs.push(InputSource::AudioFile { path: path.clone() }),
        None => inputs.push(InputSource::Silence),
    }

    // Join: a single stream only needs format normalization; multiple
    // streams are concatenated in slide order, video-only.
    let mut current = "vjoin".to_string();
    if slide_labels.len() == 1 {
        chains.push(FilterChain::new(
            vec![slide_labels[0].clone()],
            vec![FilterSpec::new("format").param("yuv420p")],
            current.clone(),
        ));
    } else {
        chains.push(FilterChain::new(
            slide_labels.clone(),
            vec![FilterSpec::new("concat")
                .named("n", slide_labels.len().to_string())
                .named("v", "1")
                .named("a", "0")],
            current.clone(),
        ));
    }

    if spec.fade {
        // Transitions never exceed half the total duration.
        let half = f64::from(duration) / 2.0;
        let fade_in = FADE_IN_SECS.min(half);
        let fade_out = FADE_OUT_SECS.min(half);
        let fade_out_start = f64::from(duration) - fade_out;

        let faded = "vfade".to_string();
        chains.push(FilterChain::new(
            vec![current],
            vec![
                FilterSpec::new("fade")
                    .named("t", "in")
                    .named("st", "0")
                    .named("d", format!("{fade_in}")),
                FilterSpec::new("fade")
                    .named("t", "out")
                    .named("st", format!("{fade_out_start}"))
                    .named("d", format!("{fade_out}")),
                FilterSpec::new("format").param("yuv420p"),
            ],
            faded.clone(),
        ));
        current = faded;
    }

    if !overlay_text.trim().is_empty() {
        let font_file = spec.font_file_or_default();
        let y_expr = match spec.text_position {
            slidecast_models::TextPosition::Top => "(h*0.12)",
            slidecast_models::TextPosition::Middle => "(h-text_h)/2",
            slidecast_models::TextPosition::Bottom => "(h-text_h-64)",
        };

        let final_label = "vtext".to_string();
        chains.push(FilterChain::new(
            vec![current],
            vec![FilterSpec::new("drawtext")
                .named(
                    "fontfile",
                    format!("'{}'", font_file.to_string_lossy()),
                )
                .named("text", format!("'{overlay_text}'"))
                .named("fontcolor", "white")
                .named("fontsize", spec.font_size.to_string())
                .named("box", "1")
                .named("boxcolor", "black@0.5")
                .named("boxborderw", "10")
                .named("x", "(w-text_w)/2")
                .named("y", y_expr)
                .named("line_spacing", "6")
                .named("enable", format!("'between(t,0,{duration})'"))],
            final_label.clone(),
        ));
        current = final_label;
    }

    Ok(FilterGraph {
        inputs,
        chains,
        video_out: current,
        audio_input,
        slide_labels,
    })
}
