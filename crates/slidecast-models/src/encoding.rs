//! Video encoding configuration.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Output frame rate. Also drives zoompan frame counts in the graph
/// builder, so it lives here rather than being hard-coded per filter.
pub const FRAME_RATE: u32 = 25;

/// Default video codec (H.264)
pub const DEFAULT_VIDEO_CODEC: &str = "libx264";
/// Default audio codec
pub const DEFAULT_AUDIO_CODEC: &str = "aac";
/// Default encoding preset
pub const DEFAULT_PRESET: &str = "veryfast";
/// Default psycho-visual tuning
pub const DEFAULT_TUNE: &str = "film";
/// Default pixel format; concat inputs are normalized to the same format
pub const DEFAULT_PIX_FMT: &str = "yuv420p";
/// Default audio bitrate
pub const DEFAULT_AUDIO_BITRATE: &str = "160k";

/// Video encoding configuration.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct EncodingConfig {
    /// Video codec (e.g., "libx264")
    #[serde(default = "default_video_codec")]
    pub codec: String,

    /// Encoding preset (e.g., "veryfast", "medium")
    #[serde(default = "default_preset")]
    pub preset: String,

    /// Psycho-visual tuning
    #[serde(default = "default_tune")]
    pub tune: String,

    /// Pixel format
    #[serde(default = "default_pix_fmt")]
    pub pix_fmt: String,

    /// Audio codec
    #[serde(default = "default_audio_codec")]
    pub audio_codec: String,

    /// Audio bitrate
    #[serde(default = "default_audio_bitrate")]
    pub audio_bitrate: String,

    /// Move the moov atom to the front for streaming playback
    #[serde(default = "default_true")]
    pub faststart: bool,

    /// Additional FFmpeg output arguments
    #[serde(default)]
    pub extra_args: Vec<String>,
}

fn default_video_codec() -> String {
    DEFAULT_VIDEO_CODEC.to_string()
}
fn default_preset() -> String {
    DEFAULT_PRESET.to_string()
}
fn default_tune() -> String {
    DEFAULT_TUNE.to_string()
}
fn default_pix_fmt() -> String {
    DEFAULT_PIX_FMT.to_string()
}
fn default_audio_codec() -> String {
    DEFAULT_AUDIO_CODEC.to_string()
}
fn default_audio_bitrate() -> String {
    DEFAULT_AUDIO_BITRATE.to_string()
}
fn default_true() -> bool {
    true
}

impl Default for EncodingConfig {
    fn default() -> Self {
        Self {
            codec: DEFAULT_VIDEO_CODEC.to_string(),
            preset: DEFAULT_PRESET.to_string(),
            tune: DEFAULT_TUNE.to_string(),
            pix_fmt: DEFAULT_PIX_FMT.to_string(),
            audio_codec: DEFAULT_AUDIO_CODEC.to_string(),
            audio_bitrate: DEFAULT_AUDIO_BITRATE.to_string(),
            faststart: true,
            extra_args: Vec::new(),
        }
    }
}

impl EncodingConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Convert to FFmpeg output arguments.
    pub fn to_ffmpeg_args(&self) -> Vec<String> {
        let mut args = vec![
            "-c:v".to_string(),
            self.codec.clone(),
            "-preset".to_string(),
            self.preset.clone(),
            "-tune".to_string(),
            self.tune.clone(),
            "-pix_fmt".to_string(),
            self.pix_fmt.clone(),
            "-c:a".to_string(),
            self.audio_codec.clone(),
            "-b:a".to_string(),
            self.audio_bitrate.clone(),
            "-r".to_string(),
            FRAME_RATE.to_string(),
        ];

        if self.faststart {
            args.extend_from_slice(&["-movflags".to_string(), "+faststart".to_string()]);
        }

        args.extend(self.extra_args.clone());

        args
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EncodingConfig::default();
        assert_eq!(config.codec, "libx264");
        assert_eq!(config.preset, "veryfast");
        assert_eq!(config.audio_bitrate, "160k");
    }

    #[test]
    fn test_ffmpeg_args() {
        let args = EncodingConfig::default().to_ffmpeg_args();
        assert!(args.contains(&"-c:v".to_string()));
        assert!(args.contains(&"libx264".to_string()));
        assert!(args.contains(&"-tune".to_string()));
        assert!(args.contains(&"film".to_string()));
        assert!(args.contains(&"+faststart".to_string()));
        assert!(args.contains(&FRAME_RATE.to_string()));
    }

    #[test]
    fn test_faststart_can_be_disabled() {
        let config = EncodingConfig {
            faststart: false,
            ..Default::default()
        };
        let args = config.to_ffmpeg_args();
        assert!(!args.contains(&"-movflags".to_string()));
    }
}
