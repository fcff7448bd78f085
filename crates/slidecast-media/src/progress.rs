//! FFmpeg progress parsing and percentage mapping.

use serde::{Deserialize, Serialize};

/// Highest percentage reported while the encoder is still running.
///
/// 100 is reserved for the terminal done event, so progress can never
/// claim completion before the artifact is finalized.
pub const RENDER_PROGRESS_CAP: u8 = 98;

/// Progress information from FFmpeg's `-progress` output.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FfmpegProgress {
    /// Current frame number
    pub frame: u64,
    /// Current FPS
    pub fps: f64,
    /// Output time in milliseconds
    pub out_time_ms: i64,
    /// Output time as string (HH:MM:SS.microseconds)
    pub out_time: String,
    /// Encoding speed (e.g., 1.5 = 1.5x realtime)
    pub speed: f64,
    /// Whether encoding is complete
    pub is_complete: bool,
}

impl FfmpegProgress {
    /// Raw completion percentage given the total duration in milliseconds.
    pub fn percentage(&self, total_duration_ms: i64) -> f64 {
        if total_duration_ms <= 0 {
            return 0.0;
        }
        ((self.out_time_ms as f64 / total_duration_ms as f64) * 100.0).min(100.0)
    }

    /// Percentage as reported to job watchers: rounded and capped at
    /// [`RENDER_PROGRESS_CAP`].
    pub fn render_percent(&self, total_duration_secs: u32) -> u8 {
        let raw = self.percentage(i64::from(total_duration_secs) * 1000);
        (raw.round() as u8).min(RENDER_PROGRESS_CAP)
    }
}

/// Parse one line of `-progress` output, updating `current`.
///
/// Returns a snapshot whenever a `progress=` marker closes a block.
pub(crate) fn parse_progress_line(
    line: &str,
    current: &mut FfmpegProgress,
) -> Option<FfmpegProgress> {
    let line = line.trim();

    if let Some((key, value)) = line.split_once('=') {
        match key {
            "out_time_ms" | "out_time_us" => {
                // both keys carry microseconds in practice
                if let Ok(us) = value.parse::<i64>() {
                    current.out_time_ms = us / 1000;
                }
            }
            "out_time" => {
                current.out_time = value.to_string();
            }
            "frame" => {
                if let Ok(frame) = value.parse() {
                    current.frame = frame;
                }
            }
            "fps" => {
                if let Ok(fps) = value.parse() {
                    current.fps = fps;
                }
            }
            "speed" => {
                if value != "N/A" {
                    if let Some(speed_str) = value.strip_suffix('x') {
                        if let Ok(speed) = speed_str.parse() {
                            current.speed = speed;
                        }
                    }
                }
            }
            "progress" => {
                if value == "end" {
                    current.is_complete = true;
                }
                return Some(current.clone());
            }
            _ => {}
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_parsing() {
        let mut progress = FfmpegProgress::default();

        parse_progress_line("out_time_ms=5000000", &mut progress);
        assert_eq!(progress.out_time_ms, 5000);

        parse_progress_line("speed=1.5x", &mut progress);
        assert!((progress.speed - 1.5).abs() < 0.01);

        assert!(parse_progress_line("frame=42", &mut progress).is_none());
        assert_eq!(progress.frame, 42);

        let snapshot = parse_progress_line("progress=continue", &mut progress);
        assert!(snapshot.is_some());
        assert!(!progress.is_complete);

        let snapshot = parse_progress_line("progress=end", &mut progress);
        assert!(snapshot.is_some());
        assert!(progress.is_complete);
    }

    #[test]
    fn test_percentage() {
        let progress = FfmpegProgress {
            out_time_ms: 5000,
            ..Default::default()
        };
        assert!((progress.percentage(10000) - 50.0).abs() < 0.01);
        assert!((progress.percentage(5000) - 100.0).abs() < 0.01);
        assert_eq!(progress.percentage(0), 0.0);
    }

    #[test]
    fn test_render_percent_is_capped() {
        let halfway = FfmpegProgress {
            out_time_ms: 4000,
            ..Default::default()
        };
        assert_eq!(halfway.render_percent(8), 50);

        let done = FfmpegProgress {
            out_time_ms: 8000,
            ..Default::default()
        };
        assert_eq!(done.render_percent(8), RENDER_PROGRESS_CAP);

        let overshoot = FfmpegProgress {
            out_time_ms: 9500,
            ..Default::default()
        };
        assert_eq!(overshoot.render_percent(8), RENDER_PROGRESS_CAP);
    }
}
