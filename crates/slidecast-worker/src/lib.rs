//! Render-job pipeline for Slidecast.
//!
//! Wires the queue to the media layer: a submitted job walks
//! `Starting -> GeneratingScript -> Rendering -> Done | Error`, emitting
//! status events to its owning session on every edge. Script-generation
//! failures degrade to an empty overlay instead of failing the render.

pub mod config;
pub mod error;
pub mod fonts;
pub mod logging;
pub mod render_job;
pub mod script;
pub mod service;

pub use config::WorkerConfig;
pub use error::{WorkerError, WorkerResult};
pub use fonts::find_font_file;
pub use logging::JobLogger;
pub use render_job::{FfmpegRenderer, RenderJobRunner, VideoRenderer};
pub use script::{GeminiScript, ScriptGenerator};
pub use service::RenderService;
