//! Render specifications: what to compose and how.

use std::path::PathBuf;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Minimum render duration in seconds.
pub const MIN_DURATION_SECS: u32 = 4;
/// Maximum render duration in seconds.
pub const MAX_DURATION_SECS: u32 = 120;
/// Minimum time a single slide stays on screen, in seconds.
pub const MIN_SLIDE_SECS: u32 = 2;
/// Default overlay font size in pixels.
pub const DEFAULT_FONT_SIZE: u32 = 40;
/// Default narration length target in words.
pub const DEFAULT_WORD_TARGET: u32 = 80;

/// Fallback font used when the spec names none.
#[cfg(windows)]
pub const FALLBACK_FONT: &str = "C:/Windows/Fonts/arial.ttf";
/// Fallback font used when the spec names none.
#[cfg(not(windows))]
pub const FALLBACK_FONT: &str = "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf";

/// Errors produced by [`RenderSpec::validate`].
#[derive(Debug, Error)]
pub enum SpecError {
    #[error("target size must be non-zero, got {width}x{height}")]
    ZeroSize { width: u32, height: u32 },

    #[error("target size must use even dimensions, got {width}x{height}")]
    OddSize { width: u32, height: u32 },

    #[error("duration must be within {MIN_DURATION_SECS}..={MAX_DURATION_SECS} seconds, got {0}")]
    DurationOutOfRange(u32),

    #[error("output path is empty")]
    EmptyOutputPath,
}

/// Output resolution in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub struct TargetSize {
    pub width: u32,
    pub height: u32,
}

impl TargetSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Check encoder constraints: non-zero and even in both dimensions.
    pub fn validate(&self) -> Result<(), SpecError> {
        if self.width == 0 || self.height == 0 {
            return Err(SpecError::ZeroSize {
                width: self.width,
                height: self.height,
            });
        }
        // yuv420p subsampling requires even dimensions
        if self.width % 2 != 0 || self.height % 2 != 0 {
            return Err(SpecError::OddSize {
                width: self.width,
                height: self.height,
            });
        }
        Ok(())
    }
}

impl std::fmt::Display for TargetSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Named output resolutions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum SizePreset {
    /// Vertical 1080x1920
    Reel,
    /// Vertical 1080x1920 (alias kept for API compatibility)
    Short,
    /// Square 1080x1080
    Square,
    /// Horizontal 1920x1080
    #[default]
    Landscape,
}

impl SizePreset {
    pub fn dimensions(&self) -> TargetSize {
        match self {
            SizePreset::Reel | SizePreset::Short => TargetSize::new(1080, 1920),
            SizePreset::Square => TargetSize::new(1080, 1080),
            SizePreset::Landscape => TargetSize::new(1920, 1080),
        }
    }
}

/// Vertical placement of the overlay text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum TextPosition {
    Top,
    #[default]
    Middle,
    Bottom,
}

impl TextPosition {
    pub fn as_str(&self) -> &'static str {
        match self {
            TextPosition::Top => "top",
            TextPosition::Middle => "middle",
            TextPosition::Bottom => "bottom",
        }
    }
}

/// Everything needed to render one video.
///
/// Immutable once submitted; the worker fills in `script_text` from the
/// script-generation service only when the field is empty.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RenderSpec {
    /// Topic handed to the script-generation service.
    pub prompt: String,

    /// Overlay text; empty means "generate from the prompt, or render
    /// without an overlay when generation is unavailable".
    #[serde(default)]
    pub script_text: Option<String>,

    /// Slide images in display order. Empty means a flat color background.
    #[serde(default)]
    pub images: Vec<PathBuf>,

    /// Background audio track. Absent means synthetic silence.
    #[serde(default)]
    pub audio_path: Option<PathBuf>,

    /// Output resolution.
    pub size: TargetSize,

    /// Total duration in seconds, clamped to
    /// [`MIN_DURATION_SECS`]..=[`MAX_DURATION_SECS`] on construction.
    pub duration_secs: u32,

    /// Slow per-slide zoom.
    #[serde(default)]
    pub ken_burns: bool,

    /// Fade-in at the start and fade-out at the end.
    #[serde(default)]
    pub fade: bool,

    /// Font file for the overlay; [`FALLBACK_FONT`] when absent.
    #[serde(default)]
    pub font_file: Option<PathBuf>,

    /// Overlay font size in pixels.
    #[serde(default = "default_font_size")]
    pub font_size: u32,

    /// Vertical overlay placement.
    #[serde(default)]
    pub text_position: TextPosition,

    /// Target word count for generated narration.
    #[serde(default = "default_word_target")]
    pub word_target: u32,

    /// Destination file; must not exist at render time.
    pub output_path: PathBuf,
}

fn default_font_size() -> u32 {
    DEFAULT_FONT_SIZE
}

fn default_word_target() -> u32 {
    DEFAULT_WORD_TARGET
}

/// Clamp a requested duration into the supported range.
pub fn clamp_duration(secs: u32) -> u32 {
    secs.clamp(MIN_DURATION_SECS, MAX_DURATION_SECS)
}

impl RenderSpec {
    /// Create a spec with defaults for the styling knobs.
    ///
    /// The duration is clamped, not rejected.
    pub fn new(
        prompt: impl Into<String>,
        size: TargetSize,
        duration_secs: u32,
        output_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            prompt: prompt.into(),
            script_text: None,
            images: Vec::new(),
            audio_path: None,
            size,
            duration_secs: clamp_duration(duration_secs),
            ken_burns: false,
            fade: false,
            font_file: None,
            font_size: DEFAULT_FONT_SIZE,
            text_position: TextPosition::default(),
            word_target: DEFAULT_WORD_TARGET,
            output_path: output_path.into(),
        }
    }

    /// Structural checks that must pass before any subprocess is spawned.
    pub fn validate(&self) -> Result<(), SpecError> {
        self.size.validate()?;
        if self.duration_secs < MIN_DURATION_SECS || self.duration_secs > MAX_DURATION_SECS {
            return Err(SpecError::DurationOutOfRange(self.duration_secs));
        }
        if self.output_path.as_os_str().is_empty() {
            return Err(SpecError::EmptyOutputPath);
        }
        Ok(())
    }

    /// The font file to hand to drawtext.
    pub fn font_file_or_default(&self) -> PathBuf {
        self.font_file
            .clone()
            .unwrap_or_else(|| PathBuf::from(FALLBACK_FONT))
    }

    pub fn with_images(mut self, images: Vec<PathBuf>) -> Self {
        self.images = images;
        self
    }

    pub fn with_audio(mut self, audio: impl Into<PathBuf>) -> Self {
        self.audio_path = Some(audio.into());
        self
    }

    pub fn with_script_text(mut self, text: impl Into<String>) -> Self {
        self.script_text = Some(text.into());
        self
    }

    pub fn with_ken_burns(mut self, enabled: bool) -> Self {
        self.ken_burns = enabled;
        self
    }

    pub fn with_fade(mut self, enabled: bool) -> Self {
        self.fade = enabled;
        self
    }

    pub fn with_text_position(mut self, position: TextPosition) -> Self {
        self.text_position = position;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duration_clamping() {
        let spec = RenderSpec::new("topic", SizePreset::Reel.dimensions(), 1, "out.mp4");
        assert_eq!(spec.duration_secs, MIN_DURATION_SECS);

        let spec = RenderSpec::new("topic", SizePreset::Reel.dimensions(), 500, "out.mp4");
        assert_eq!(spec.duration_secs, MAX_DURATION_SECS);

        let spec = RenderSpec::new("topic", SizePreset::Reel.dimensions(), 8, "out.mp4");
        assert_eq!(spec.duration_secs, 8);
    }

    #[test]
    fn test_size_validation() {
        assert!(TargetSize::new(1080, 1920).validate().is_ok());
        assert!(matches!(
            TargetSize::new(0, 1080).validate(),
            Err(SpecError::ZeroSize { .. })
        ));
        assert!(matches!(
            TargetSize::new(1081, 1920).validate(),
            Err(SpecError::OddSize { .. })
        ));
    }

    #[test]
    fn test_spec_validation() {
        let spec = RenderSpec::new("topic", SizePreset::Square.dimensions(), 8, "out.mp4");
        assert!(spec.validate().is_ok());

        let spec = RenderSpec::new("topic", SizePreset::Square.dimensions(), 8, "");
        assert!(matches!(spec.validate(), Err(SpecError::EmptyOutputPath)));
    }

    #[test]
    fn test_preset_dimensions() {
        assert_eq!(SizePreset::Reel.dimensions(), TargetSize::new(1080, 1920));
        assert_eq!(SizePreset::Square.dimensions(), TargetSize::new(1080, 1080));
        assert_eq!(
            SizePreset::Landscape.dimensions(),
            TargetSize::new(1920, 1080)
        );
    }

    #[test]
    fn test_fallback_font() {
        let spec = RenderSpec::new("topic", SizePreset::Reel.dimensions(), 8, "out.mp4");
        assert_eq!(spec.font_file_or_default(), PathBuf::from(FALLBACK_FONT));
    }
}
