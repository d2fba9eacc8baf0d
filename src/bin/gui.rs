//! GUI application for previewing try-on overlays on recorded landmarks.
//!
//! Run with: cargo run --features gui --bin tryon-fit-gui

use eframe::egui;
use image::{imageops, Rgba, RgbaImage};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tryon_fit::{
    Canvas, FrameReport, LandmarkRecording, PerspectiveCamera, PlacementEngine, Product,
    ReplayDetector, SlotKind, Surface, TrackerKind, TrackerState, TrackingRequest, TryOnConfig,
    TryOnSession,
};

const DEFAULT_SIZE: (u32, u32) = (640, 480);
const BACKDROP: Rgba<u8> = Rgba([38, 38, 46, 255]);

fn main() -> eframe::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default().with_inner_size([1024.0, 768.0]),
        ..Default::default()
    };

    eframe::run_native(
        "tryon-fit - Virtual Try-On Preview",
        options,
        Box::new(|cc| Ok(Box::new(TryOnApp::new(cc)))),
    )
}

struct TryOnApp {
    session: TryOnSession<Canvas>,
    display_texture: Option<egui::TextureHandle>,

    // Playback
    recording: Option<Arc<LandmarkRecording>>,
    recording_path: String,
    started: Option<Instant>,
    last_report: FrameReport,

    // Settings
    config_path: String,
    fit_mesh: bool,

    // App-level errors shown under the session status
    message: Option<String>,
}

fn new_session(engine: PlacementEngine) -> TryOnSession<Canvas> {
    let (w, h) = DEFAULT_SIZE;
    TryOnSession::new(engine, Canvas::new(w, h), Canvas::new(w, h))
}

impl TryOnApp {
    fn new(_cc: &eframe::CreationContext<'_>) -> Self {
        Self {
            session: new_session(PlacementEngine::default()),
            display_texture: None,
            recording: None,
            recording_path: "recordings/capture.bin.bz2".to_string(),
            started: None,
            last_report: FrameReport::default(),
            config_path: "tryon.json".to_string(),
            fit_mesh: false,
            message: None,
        }
    }

    fn load_config(&mut self) {
        match TryOnConfig::load(&self.config_path).and_then(PlacementEngine::new) {
            Ok(engine) => {
                // Trackers and assets belong to the old session; start over
                self.session = new_session(engine);
                self.started = None;
                self.display_texture = None;
                self.message = Some(format!("Config loaded from {}", self.config_path));
            }
            Err(e) => {
                self.message = Some(format!("Failed to load config: {}", e));
            }
        }
    }

    fn load_recording(&mut self, path: PathBuf) {
        match LandmarkRecording::load(&path) {
            Ok(recording) => {
                let recording = Arc::new(recording);
                self.session.resize(recording.width, recording.height);
                self.recording_path = path.display().to_string();
                self.message = Some(format!(
                    "Recording: {} frames, {:.1} s",
                    recording.len(),
                    recording.duration_ms() / 1000.0
                ));
                self.recording = Some(recording);
                self.restart();
            }
            Err(e) => {
                self.message = Some(format!("Failed to load recording: {}", e));
            }
        }
    }

    fn video_size(&self) -> (u32, u32) {
        self.recording
            .as_ref()
            .map_or(DEFAULT_SIZE, |r| (r.width, r.height))
    }

    fn toggle_camera(&mut self) {
        if self.session.is_camera_on() {
            self.session.disable_camera();
            self.started = None;
        } else {
            let (w, h) = self.video_size();
            self.session.enable_camera(w, h);
            self.started = Some(Instant::now());
        }
        self.display_texture = None;
    }

    /// Replay detectors stand in for the face and hand models.
    fn install_tracker(&mut self, kind: TrackerKind) {
        match &self.recording {
            Some(recording) => {
                let detector = match kind {
                    TrackerKind::Face => ReplayDetector::faces(recording.clone()),
                    TrackerKind::Hand => ReplayDetector::hands(recording.clone()),
                };
                self.session.tracker_loaded(kind, Box::new(detector));
            }
            None => self.session.tracker_failed(kind, "no recording loaded"),
        }
    }

    fn enable_tracking(&mut self, kind: TrackerKind) {
        if self.session.request_tracking(kind) == TrackingRequest::StartLoad {
            self.install_tracker(kind);
        }
    }

    /// Rewind playback; ready trackers get fresh replay detectors.
    fn restart(&mut self) {
        for kind in [TrackerKind::Face, TrackerKind::Hand] {
            if self.session.tracker_state(kind) == &TrackerState::Ready {
                self.install_tracker(kind);
            }
        }
        if self.session.is_camera_on() {
            self.started = Some(Instant::now());
        }
    }

    fn try_on(&mut self, kind: SlotKind) {
        let Some(path) = rfd::FileDialog::new()
            .add_filter("Images", &["png", "jpg", "jpeg"])
            .pick_file()
        else {
            return;
        };

        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("overlay")
            .to_string();
        let request = self.session.try_on(&Product {
            kind,
            name,
            source: Some(path),
        });
        if request == TrackingRequest::StartLoad {
            self.install_tracker(kind.into());
        }
        if self.started.is_none() {
            self.started = Some(Instant::now());
        }
    }

    fn toggle_mesh(&mut self) {
        if self.fit_mesh {
            let mesh = self.session.engine().default_head_mesh();
            self.session.engine_mut().set_head_mesh(Some(mesh));
            self.session
                .set_scene_camera(Box::new(PerspectiveCamera::default()));
        } else {
            self.session.engine_mut().set_head_mesh(None);
        }
    }

    /// Run one session tick at the playback clock and refresh the texture.
    fn step(&mut self, ctx: &egui::Context) {
        let elapsed_ms = self
            .started
            .map_or(0.0, |t| t.elapsed().as_secs_f64() * 1000.0);
        self.last_report = self.session.tick(elapsed_ms);

        let face = self.session.face_surface();
        let mut rgba = RgbaImage::from_pixel(face.width(), face.height(), BACKDROP);
        imageops::overlay(&mut rgba, face.pixels(), 0, 0);
        imageops::overlay(&mut rgba, self.session.hand_surface().pixels(), 0, 0);

        let (width, height) = rgba.dimensions();
        let size = [width as usize, height as usize];
        let pixels: Vec<egui::Color32> = rgba
            .pixels()
            .map(|p| egui::Color32::from_rgba_unmultiplied(p[0], p[1], p[2], p[3]))
            .collect();

        let color_image = egui::ColorImage { size, pixels };
        match &mut self.display_texture {
            Some(texture) => texture.set(color_image, Default::default()),
            None => {
                self.display_texture =
                    Some(ctx.load_texture("overlay", color_image, Default::default()))
            }
        }
    }
}

impl eframe::App for TryOnApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        egui::TopBottomPanel::top("menu").show(ctx, |ui| {
            egui::menu::bar(ui, |ui| {
                ui.menu_button("File", |ui| {
                    if ui.button("Open Recording...").clicked() {
                        if let Some(path) = rfd::FileDialog::new()
                            .add_filter("Recordings", &["bin", "bz2", "json"])
                            .pick_file()
                        {
                            self.load_recording(path);
                        }
                        ui.close_menu();
                    }
                    if ui.button("Quit").clicked() {
                        ctx.send_viewport_cmd(egui::ViewportCommand::Close);
                    }
                });
            });
        });

        egui::SidePanel::left("controls").min_width(250.0).show(ctx, |ui| {
            ui.heading("Input");
            ui.separator();

            ui.label("Recording:");
            ui.text_edit_singleline(&mut self.recording_path);
            if ui.button("Load Recording").clicked() {
                self.load_recording(PathBuf::from(&self.recording_path));
            }
            ui.add_space(8.0);

            ui.label("Config:");
            ui.text_edit_singleline(&mut self.config_path);
            if ui.button("Load Config").clicked() {
                self.load_config();
            }
            ui.add_space(16.0);

            ui.heading("Camera");
            ui.separator();

            let camera_label = if self.session.is_camera_on() {
                "Disable Camera"
            } else {
                "Enable Camera"
            };
            if ui.button(camera_label).clicked() {
                self.toggle_camera();
            }
            if ui.button("Enable Face Tracker").clicked() {
                self.enable_tracking(TrackerKind::Face);
            }
            if ui.button("Enable Hand Tracker").clicked() {
                self.enable_tracking(TrackerKind::Hand);
            }
            if ui.button("Restart Playback").clicked() {
                self.restart();
            }
            ui.add_space(16.0);

            ui.heading("Try On");
            ui.separator();

            if ui.button("Headpiece...").clicked() {
                self.try_on(SlotKind::Head);
            }
            if ui.button("Ring...").clicked() {
                self.try_on(SlotKind::Hand);
            }
            if ui.checkbox(&mut self.fit_mesh, "Fit head mesh").changed() {
                self.toggle_mesh();
            }
            ui.add_space(16.0);

            ui.heading("Status");
            ui.separator();
            ui.label(self.session.status());
            if let Some(message) = &self.message {
                ui.label(message);
            }
            ui.label(format!("State: {:?}", self.session.state()));

            let report = &self.last_report;
            ui.add_space(8.0);
            ui.label(format!("Faces: {}, hands: {}", report.faces, report.hands));
            if let Some(rect) = report.head_rect {
                ui.label(format!(
                    "  Headpiece: {:.0}x{:.0} at ({:.0}, {:.0})",
                    rect.width, rect.height, rect.x, rect.y
                ));
            }
            for (i, rect) in report.hand_rects.iter().enumerate() {
                ui.label(format!(
                    "  Ring {}: at ({:.0}, {:.0})",
                    i + 1,
                    rect.x,
                    rect.y
                ));
            }
            if let Some(mesh) = report.mesh {
                ui.label(format!(
                    "  Mesh: yaw {:.1}°, scale {:.2}x",
                    mesh.yaw.to_degrees(),
                    mesh.scale
                ));
            }
        });

        // The repaint request drives the frame loop
        self.step(ctx);
        if self.session.is_camera_on() {
            ctx.request_repaint();
        }

        egui::CentralPanel::default().show(ctx, |ui| {
            if let Some(ref texture) = self.display_texture {
                let available_size = ui.available_size();
                let texture_size = texture.size_vec2();

                // Scale to fit; the zoomed view may enlarge
                let max_scale = if self.session.is_zoomed() { 2.0 } else { 1.0 };
                let scale = (available_size.x / texture_size.x)
                    .min(available_size.y / texture_size.y)
                    .min(max_scale);
                let display_size = texture_size * scale;

                ui.centered_and_justified(|ui| {
                    ui.image((texture.id(), display_size));
                });
            } else {
                ui.centered_and_justified(|ui| {
                    ui.heading("Drag and drop a recording or use File > Open");
                });
            }
        });

        // Handle drag and drop
        let dropped: Vec<PathBuf> = ctx.input(|i| {
            i.raw
                .dropped_files
                .iter()
                .filter_map(|f| f.path.clone())
                .collect()
        });
        for path in dropped {
            self.load_recording(path);
        }
    }
}
