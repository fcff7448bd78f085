//! Submit renders from the command line and follow their progress.

use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::{Parser, ValueEnum};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use slidecast_models::{
    JobStatus, RenderSpec, SessionId, SizePreset, TargetSize, TextPosition,
};
use slidecast_worker::{find_font_file, RenderService, WorkerConfig};

/// Most renders one invocation may submit.
const MAX_BATCH: u32 = 30;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum PresetArg {
    Reel,
    Short,
    Square,
    Landscape,
}

impl From<PresetArg> for SizePreset {
    fn from(value: PresetArg) -> Self {
        match value {
            PresetArg::Reel => SizePreset::Reel,
            PresetArg::Short => SizePreset::Short,
            PresetArg::Square => SizePreset::Square,
            PresetArg::Landscape => SizePreset::Landscape,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum PositionArg {
    Top,
    Middle,
    Bottom,
}

impl From<PositionArg> for TextPosition {
    fn from(value: PositionArg) -> Self {
        match value {
            PositionArg::Top => TextPosition::Top,
            PositionArg::Middle => TextPosition::Middle,
            PositionArg::Bottom => TextPosition::Bottom,
        }
    }
}

/// Turn a prompt plus images/audio into short rendered videos.
#[derive(Debug, Parser)]
#[command(name = "slidecast", version, about)]
struct Args {
    /// Topic for the generated narration overlay
    #[arg(long)]
    prompt: String,

    /// Slide images in display order; none means a flat background
    #[arg(long, num_args = 0..)]
    images: Vec<PathBuf>,

    /// Background audio track; silence when omitted
    #[arg(long)]
    audio: Option<PathBuf>,

    /// Output size preset
    #[arg(long, value_enum, default_value = "reel")]
    preset: PresetArg,

    /// Custom width, overrides the preset together with --height
    #[arg(long, requires = "height")]
    width: Option<u32>,

    /// Custom height, overrides the preset together with --width
    #[arg(long, requires = "width")]
    height: Option<u32>,

    /// Video duration in seconds (clamped to 4..=120)
    #[arg(long, default_value_t = 8)]
    duration: u32,

    /// Number of videos to render
    #[arg(long, default_value_t = 1)]
    count: u32,

    /// Slow per-slide zoom
    #[arg(long)]
    ken_burns: bool,

    /// Fade in/out
    #[arg(long)]
    fade: bool,

    /// Overlay text; skips script generation when set
    #[arg(long)]
    script_text: Option<String>,

    /// Font name looked up in the fonts directory
    #[arg(long)]
    font: Option<String>,

    /// Overlay font size in pixels
    #[arg(long, default_value_t = 40)]
    font_size: u32,

    /// Overlay position
    #[arg(long, value_enum, default_value = "middle")]
    position: PositionArg,

    /// Target word count for the generated narration
    #[arg(long, default_value_t = 80)]
    words: u32,
}

fn init_tracing() {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::from_default_env()
        .add_directive("slidecast=info".parse().expect("static directive"));

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer().with_ansi(true).with_target(false))
            .with(env_filter)
            .init();
    }
}

fn build_spec(args: &Args, config: &WorkerConfig) -> RenderSpec {
    let size = match (args.width, args.height) {
        (Some(width), Some(height)) => TargetSize::new(width, height),
        _ => SizePreset::from(args.preset).dimensions(),
    };

    let mut spec = RenderSpec::new(&args.prompt, size, args.duration, "")
        .with_images(args.images.clone())
        .with_ken_burns(args.ken_burns)
        .with_fade(args.fade)
        .with_text_position(args.position.into());

    if let Some(audio) = &args.audio {
        spec = spec.with_audio(audio);
    }
    if let Some(text) = &args.script_text {
        spec = spec.with_script_text(text);
    }

    spec.font_size = args.font_size;
    spec.word_target = args.words;
    spec.font_file = args
        .font
        .as_deref()
        .zip(config.fonts_dir.as_deref())
        .and_then(|(name, dir)| find_font_file(dir, name));

    spec
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let args = Args::parse();
    if args.count == 0 || args.count > MAX_BATCH {
        bail!("--count must be within 1..={MAX_BATCH}");
    }

    let config = WorkerConfig::from_env();
    let service = RenderService::start(config.clone());
    let session = SessionId::new();
    let mut events = service.router().register(&session).await;

    for _ in 0..args.count {
        let spec = build_spec(&args, &config);
        let job_id = service
            .submit_render(&session, spec)
            .await
            .context("failed to submit render")?;
        info!(job_id = %job_id, "submitted");
    }

    let mut remaining = args.count;
    let mut failed = 0u32;
    while remaining > 0 {
        let Some(event) = events.recv().await else {
            bail!("progress channel closed with {remaining} job(s) outstanding");
        };

        match event.status {
            JobStatus::Rendering => {
                info!(job_id = %event.job_id, progress = event.progress, "rendering");
            }
            JobStatus::Done => {
                remaining -= 1;
                info!(
                    job_id = %event.job_id,
                    output = event.output_path.as_deref().unwrap_or(""),
                    "done"
                );
            }
            JobStatus::Error => {
                remaining -= 1;
                failed += 1;
                info!(
                    job_id = %event.job_id,
                    message = event.message.as_deref().unwrap_or(""),
                    "failed"
                );
            }
            _ => {
                info!(job_id = %event.job_id, status = %event.status, "status");
            }
        }
    }

    service.shutdown().await;

    if failed > 0 {
        bail!("{failed} of {} render(s) failed", args.count);
    }
    Ok(())
}
