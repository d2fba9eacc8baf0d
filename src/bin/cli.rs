//! CLI application for replaying recorded landmarks through the try-on engine.
//!
//! Usage:
//!   tryon-fit <recording>                              # Human-readable output
//!   tryon-fit <recording> --head crown.png --json      # JSON output
//!   tryon-fit <recording> --hand ring.png --frames out # Write composited PNGs
//!   tryon-fit <recording> --mesh -o report.json        # Save to file

use clap::Parser;
use image::imageops;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::Level;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use tryon_fit::{
    AnchorRect, Canvas, FrameReport, LandmarkRecording, LoadState, PerspectiveCamera,
    PlacementEngine, Product, ReplayDetector, SlotKind, TrackerKind, TrackingRequest,
    TryOnConfig, TryOnSession,
};

#[derive(Parser, Debug)]
#[command(name = "tryon-fit")]
#[command(author, version, about = "Replay recorded landmarks through the try-on overlay engine", long_about = None)]
struct Args {
    /// Landmark recording (.bin, .bin.bz2 or .json)
    #[arg(required = true)]
    recording: PathBuf,

    /// Headpiece image anchored to the face
    #[arg(long)]
    head: Option<PathBuf>,

    /// Ring image anchored to every hand
    #[arg(long)]
    hand: Option<PathBuf>,

    /// Configuration file (JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Fit a head mesh through a default perspective camera
    #[arg(long)]
    mesh: bool,

    /// Directory for composited PNG frames
    #[arg(long)]
    frames: Option<PathBuf>,

    /// Output as JSON
    #[arg(short, long)]
    json: bool,

    /// Output file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Seconds to wait for each overlay image to load
    #[arg(long, default_value = "10")]
    load_timeout: u64,

    /// Show verbose output
    #[arg(short, long)]
    verbose: bool,
}

/// Output structure for JSON serialization
#[derive(Serialize)]
struct Output {
    recording: String,
    width: u32,
    height: u32,
    frames_total: usize,
    frames_with_face: usize,
    head_overlays: usize,
    hand_overlays: usize,
    head_asset: Option<String>,
    hand_asset: Option<String>,
    frames: Vec<FrameOutput>,
}

#[derive(Serialize)]
struct FrameOutput {
    /// Frame index (1-based)
    index: usize,
    timestamp_ms: f64,
    faces: usize,
    hands: usize,
    head: Option<RectOutput>,
    rings: Vec<RectOutput>,
    mesh: Option<MeshOutput>,
}

#[derive(Serialize)]
struct RectOutput {
    x: f32,
    y: f32,
    width: f32,
    height: f32,
}

impl From<AnchorRect> for RectOutput {
    fn from(rect: AnchorRect) -> Self {
        Self {
            x: rect.x,
            y: rect.y,
            width: rect.width,
            height: rect.height,
        }
    }
}

#[derive(Serialize)]
struct MeshOutput {
    position: [f32; 3],
    yaw_degrees: f32,
    scale: f32,
}

fn main() {
    let args = Args::parse();

    let log_level = if args.verbose { Level::DEBUG } else { Level::WARN };
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(
            EnvFilter::builder()
                .with_default_directive(log_level.into())
                .from_env_lossy(),
        )
        .init();

    if let Err(e) = run(&args) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let config = match &args.config {
        Some(path) => TryOnConfig::load(path)?,
        None => TryOnConfig::default(),
    };

    let recording = Arc::new(LandmarkRecording::load(&args.recording)?);
    let (width, height) = (recording.width, recording.height);

    let engine = PlacementEngine::new(config)?;
    let mut session = TryOnSession::new(engine, Canvas::new(width, height), Canvas::new(width, height));
    session.enable_camera(width, height);

    if args.mesh {
        let mesh = session.engine().default_head_mesh();
        session.engine_mut().set_head_mesh(Some(mesh));
        session.set_scene_camera(Box::new(PerspectiveCamera::default()));
    }

    // Recorded landmarks stand in for both detector models
    if session.request_tracking(TrackerKind::Face) == TrackingRequest::StartLoad {
        session.tracker_loaded(TrackerKind::Face, Box::new(ReplayDetector::faces(recording.clone())));
    }
    if session.request_tracking(TrackerKind::Hand) == TrackingRequest::StartLoad {
        session.tracker_loaded(TrackerKind::Hand, Box::new(ReplayDetector::hands(recording.clone())));
    }

    let mut pending = 0;
    for (kind, path) in [(SlotKind::Head, &args.head), (SlotKind::Hand, &args.hand)] {
        if let Some(path) = path {
            session.try_on(&Product {
                kind,
                name: product_name(path),
                source: Some(path.clone()),
            });
            tracing::info!("{}", session.status());
            pending += 1;
        }
    }

    let timeout = Duration::from_secs(args.load_timeout);
    for _ in 0..pending {
        if !session.await_load(timeout) {
            return Err("Timed out loading overlay images".into());
        }
    }
    for kind in [SlotKind::Head, SlotKind::Hand] {
        if let LoadState::Failed(reason) = session.engine().slot(kind).state() {
            return Err(format!("Failed to load {} image: {}", kind, reason).into());
        }
    }

    if let Some(dir) = &args.frames {
        std::fs::create_dir_all(dir)?;
    }

    let start = recording.frames.first().map_or(0.0, |f| f.timestamp_ms);
    let mut frame_outputs = Vec::with_capacity(recording.len());

    for (i, frame) in recording.frames.iter().enumerate() {
        let report = session.tick(frame.timestamp_ms - start);

        if let Some(dir) = &args.frames {
            let path = dir.join(format!("frame_{:05}.png", i + 1));
            let mut composite = session.face_surface().pixels().clone();
            imageops::overlay(&mut composite, session.hand_surface().pixels(), 0, 0);
            composite.save(&path)?;
        }

        frame_outputs.push(frame_output(i + 1, &report));
    }

    if args.verbose {
        eprintln!("Replayed {} frame(s); {}", frame_outputs.len(), session.status());
    }

    let output = Output {
        recording: args.recording.display().to_string(),
        width,
        height,
        frames_total: frame_outputs.len(),
        frames_with_face: frame_outputs.iter().filter(|f| f.faces > 0).count(),
        head_overlays: frame_outputs.iter().filter(|f| f.head.is_some()).count(),
        hand_overlays: frame_outputs.iter().map(|f| f.rings.len()).sum(),
        head_asset: session
            .engine()
            .slot(SlotKind::Head)
            .current()
            .map(|i| i.name().to_string()),
        hand_asset: session
            .engine()
            .slot(SlotKind::Hand)
            .current()
            .map(|i| i.name().to_string()),
        frames: frame_outputs,
    };

    // Generate output
    let output_str = if args.json {
        serde_json::to_string_pretty(&output)?
    } else {
        format_human_readable(&output)
    };

    // Write output
    if let Some(ref path) = args.output {
        std::fs::write(path, &output_str)?;
        if args.verbose {
            eprintln!("Output written to {:?}", path);
        }
    } else {
        println!("{}", output_str);
    }

    Ok(())
}

fn product_name(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("overlay")
        .to_string()
}

fn frame_output(index: usize, report: &FrameReport) -> FrameOutput {
    FrameOutput {
        index,
        timestamp_ms: report.timestamp_ms,
        faces: report.faces,
        hands: report.hands,
        head: report.head_rect.map(RectOutput::from),
        rings: report.hand_rects.iter().copied().map(RectOutput::from).collect(),
        mesh: report.mesh.map(|t| MeshOutput {
            position: t.position.to_array(),
            yaw_degrees: t.yaw.to_degrees(),
            scale: t.scale,
        }),
    }
}

fn format_human_readable(output: &Output) -> String {
    let mut s = String::new();

    s.push_str(&format!("Recording: {} ({}x{})\n", output.recording, output.width, output.height));
    s.push_str(&format!("Frames: {} ({} with a face)\n", output.frames_total, output.frames_with_face));
    s.push_str(&format!(
        "Head overlay: {}\n",
        output.head_asset.as_deref().unwrap_or("none")
    ));
    s.push_str(&format!(
        "Hand overlay: {}\n",
        output.hand_asset.as_deref().unwrap_or("none")
    ));

    if output.frames.is_empty() {
        s.push_str("\nNo frames recorded.\n");
        return s;
    }

    s.push_str("\nPlacements:\n");
    s.push_str(&format!("  Headpieces drawn: {}\n", output.head_overlays));
    s.push_str(&format!("  Rings drawn:      {}\n", output.hand_overlays));

    for frame in &output.frames {
        s.push_str(&format!(
            "\n--- Frame {} ({:.0} ms) ---\n",
            frame.index, frame.timestamp_ms
        ));
        s.push_str(&format!("Faces: {}, hands: {}\n", frame.faces, frame.hands));

        if let Some(head) = &frame.head {
            s.push_str(&format!(
                "Headpiece: {:.0}x{:.0} at ({:.0}, {:.0})\n",
                head.width, head.height, head.x, head.y
            ));
        }
        for (i, ring) in frame.rings.iter().enumerate() {
            s.push_str(&format!(
                "Ring {}: {:.0}x{:.0} at ({:.0}, {:.0})\n",
                i + 1,
                ring.width,
                ring.height,
                ring.x,
                ring.y
            ));
        }
        if let Some(mesh) = &frame.mesh {
            s.push_str(&format!(
                "Mesh: pos ({:.3}, {:.3}, {:.3}), yaw {:.1}°, scale {:.2}x\n",
                mesh.position[0], mesh.position[1], mesh.position[2], mesh.yaw_degrees, mesh.scale
            ));
        }
    }

    s
}
