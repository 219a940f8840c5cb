//! clickmask: cut an object out of a photo from the command line.
//!
//! Encodes the image remotely, decodes masks locally, replays the given
//! clicks through a [`SegmentationSession`] and writes the cut-out as PNG.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use image::imageops::{self, FilterType};
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{info, warn};

use clickmask::config::Config;
use clickmask::decoder::OnnxDecoder;
use clickmask::encoder::HttpEncoder;
use clickmask::{
    ChannelEvents, ClickmaskError, PointLabel, PointPrompt, SegmentationSession, SessionEvent,
    canvas, finalize, mask,
};

/// A click in preview canvas pixels.
#[derive(Debug, Clone, Copy)]
struct Click {
    x: f32,
    y: f32,
    label: PointLabel,
}

/// Accepts `x,y` (foreground), `x,y,fg` or `x,y,bg`.
fn parse_click(s: &str) -> Result<Click, String> {
    let parts: Vec<&str> = s.split(',').map(str::trim).collect();
    let (x, y, label) = match parts.as_slice() {
        [x, y] => (x, y, PointLabel::Foreground),
        [x, y, "fg"] => (x, y, PointLabel::Foreground),
        [x, y, "bg"] => (x, y, PointLabel::Background),
        _ => return Err(format!("expected x,y[,fg|bg], got {s:?}")),
    };
    let x = x.parse().map_err(|e| format!("invalid x in {s:?}: {e}"))?;
    let y = y.parse().map_err(|e| format!("invalid y in {s:?}: {e}"))?;
    Ok(Click { x, y, label })
}

/// Click-to-select background removal.
#[derive(Parser)]
#[command(name = "clickmask")]
#[command(version)]
#[command(about = "Cut an object out of a photo with SAM point prompts")]
struct Args {
    /// Source image (PNG, JPEG or WebP).
    image: PathBuf,

    /// Where to write the cut-out PNG.
    #[arg(short, long)]
    out: PathBuf,

    /// Click in preview canvas pixels; repeatable. Without clicks the
    /// automatic mask is used.
    #[arg(short, long = "point", value_parser = parse_click)]
    points: Vec<Click>,

    /// Path to configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Encoder service base URL (overrides config).
    #[arg(long, env = "CLICKMASK_ENCODER_URL")]
    encoder_url: Option<String>,

    /// Decoder model path or URL (overrides config).
    #[arg(short, long)]
    model: Option<String>,

    /// Edge feather radius in original pixels (overrides config).
    #[arg(long)]
    feather: Option<f32>,

    /// Also write the base64 mask text here.
    #[arg(long)]
    mask_text: Option<PathBuf>,

    /// Also write the checkerboard preview at canvas size here.
    #[arg(long)]
    preview: Option<PathBuf>,

    /// Keep fully transparent borders.
    #[arg(long)]
    no_trim: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("CLICKMASK_LOG")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let mut config = Config::load_or_default(args.config.as_deref())?;
    if let Some(url) = args.encoder_url {
        config.encoder.base_url = url;
    }
    if let Some(model) = args.model {
        config.decoder.model = Some(model);
    }
    if let Some(radius) = args.feather {
        config.output.feather_radius = radius;
    }

    let bytes = std::fs::read(&args.image)?;
    let original = image::load_from_memory(&bytes)?;
    let (cw, ch) = canvas::fit_canvas(
        original.width(),
        original.height(),
        config.canvas.max_dimension,
    );
    info!(
        width = original.width(),
        height = original.height(),
        canvas_width = cw,
        canvas_height = ch,
        scale = canvas::canvas_to_original_scale(original.width(), cw),
        "loaded source image"
    );

    let decoder_config = config.decoder.to_decoder_config()?;
    info!(model = %decoder_config.source.display_name(), "using decoder model");
    let encoder = Arc::new(HttpEncoder::new(config.encoder.to_encoder_config()));
    let decoder = Arc::new(OnnxDecoder::new(decoder_config));
    let (events, mut rx) = ChannelEvents::new();
    let session = SegmentationSession::with_events(encoder, decoder, Arc::new(events));

    session.encode_image(bytes).await;
    wait_until_ready(&session, &mut rx).await?;

    session.auto_segment(cw, ch).await;
    for click in &args.points {
        let point = PointPrompt::from_canvas(click.x, click.y, cw, ch, click.label);
        if session.add_point(point, cw, ch).await.is_none() {
            warn!(x = click.x, y = click.y, "click produced no mask");
        }
    }
    drain_errors(&mut rx);

    let current = session
        .current_mask()
        .ok_or_else(|| ClickmaskError::Inference("no mask was produced".to_string()))?;
    info!(
        score = current.score,
        foreground = mask::foreground_pixel_count(&current.mask),
        points = session.points().len(),
        "mask selected"
    );

    let radius = config.output.feather_radius;
    let softened = finalize::feather_canvas_mask(&current.mask, radius);

    if let Some(path) = &args.preview {
        let source = imageops::resize(&original.to_rgba8(), cw, ch, FilterType::Triangle);
        let preview =
            mask::render_masked_preview(&source, &softened, config.canvas.checker_cell_size);
        std::fs::write(path, finalize::encode_png(&preview)?)?;
    }
    let text = mask::encode_mask_text(&softened);
    if let Some(path) = &args.mask_text {
        std::fs::write(path, &text)?;
    }

    let mut cutout =
        finalize::apply_mask_text(&original, &text, cw, ch, radius)?;
    if config.output.trim && !args.no_trim {
        cutout = finalize::trim_transparent(&cutout);
    }
    std::fs::write(&args.out, finalize::encode_png(&cutout)?)?;
    info!(
        path = %args.out.display(),
        width = cutout.width(),
        height = cutout.height(),
        "cut-out written"
    );

    session.dispose();
    Ok(())
}

/// Wait for both the embedding and the decoder, failing on a terminal error.
async fn wait_until_ready(
    session: &SegmentationSession,
    rx: &mut UnboundedReceiver<SessionEvent>,
) -> Result<(), String> {
    loop {
        if session.encoder_status().is_ready() && session.decoder_status().is_ready() {
            return Ok(());
        }
        match rx.recv().await {
            Some(SessionEvent::Error(e)) if e.is_terminal() => return Err(e.to_string()),
            Some(_) => {}
            None => return Err("session closed before becoming ready".to_string()),
        }
    }
}

fn drain_errors(rx: &mut UnboundedReceiver<SessionEvent>) {
    while let Ok(event) = rx.try_recv() {
        if let SessionEvent::Error(e) = event {
            warn!(kind = ?e.kind, message = %e.message, "decode error");
        }
    }
}
