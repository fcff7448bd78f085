//! FFmpeg layer for Slidecast.
//!
//! This crate provides:
//! - Overlay-text sanitization and word wrapping for drawtext
//! - A typed filter-graph IR and the builder that produces it from a
//!   [`slidecast_models::RenderSpec`]
//! - Multi-input FFmpeg command building
//! - Progress parsing from `-progress pipe:2`
//! - The render executor (temp-file output, renamed into place on success)

pub mod command;
pub mod error;
pub mod graph;
pub mod progress;
pub mod render;
pub mod text;

pub use command::{check_ffmpeg, FfmpegCommand, FfmpegRunner};
pub use error::{MediaError, MediaResult};
pub use graph::{build_filter_graph, FilterChain, FilterGraph, FilterSpec, InputSource};
pub use progress::{FfmpegProgress, RENDER_PROGRESS_CAP};
pub use render::render_video;
pub use text::{sanitize_drawtext, wrap_text, wrap_width};
