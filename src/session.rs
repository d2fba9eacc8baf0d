//! The per-frame loop and the camera / tracker enablement state machine.
//!
//! A host calls [`TryOnSession::tick`] once per rendered frame from its
//! animation callback. Everything inside a tick runs synchronously; only
//! asset loads happen in the background and are picked up at the start of
//! the next tick.
//!
//! ```text
//! Disabled --enable_camera--> CameraOnly --tracker ready--> Tracking
//!     ^                            |                           |
//!     +-------disable_camera-------+---------------------------+
//! ```

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;

use crate::asset::SlotKind;
use crate::camera::CameraModel;
use crate::engine::PlacementEngine;
use crate::loader::AssetLoader;
use crate::mesh_fit::PlacementTransform;
use crate::surface::Surface;
use crate::types::{AnchorRect, LandmarkSet};

/// A landmark detector run once per video frame.
pub trait LandmarkDetector {
    /// Every face or hand found in the frame at `timestamp_ms`, best first.
    fn detect(&mut self, timestamp_ms: f64) -> Vec<LandmarkSet>;
}

/// Which detector model a request refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackerKind {
    Face,
    Hand,
}

impl fmt::Display for TrackerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackerKind::Face => write!(f, "Face"),
            TrackerKind::Hand => write!(f, "Hand"),
        }
    }
}

impl From<SlotKind> for TrackerKind {
    fn from(slot: SlotKind) -> Self {
        match slot {
            SlotKind::Head => TrackerKind::Face,
            SlotKind::Hand => TrackerKind::Hand,
        }
    }
}

/// Lifecycle of a detector model. `Loading` doubles as the latch that keeps
/// repeated button presses from starting a second load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackerState {
    Idle,
    Loading,
    Ready,
    Failed(String),
}

/// Coarse session state derived from the camera and both trackers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disabled,
    CameraOnly,
    Tracking,
}

/// What the host should do after asking for a tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackingRequest {
    /// The camera is off; nothing was started.
    NeedsCamera,
    AlreadyReady,
    AlreadyLoading,
    /// The host must load the detector and report back with
    /// [`TryOnSession::tracker_loaded`] or [`TryOnSession::tracker_failed`].
    StartLoad,
}

/// A product the user wants to try on.
#[derive(Debug, Clone, PartialEq)]
pub struct Product {
    pub kind: SlotKind,
    pub name: String,
    /// Image to load into the product's slot, if it has one.
    pub source: Option<PathBuf>,
}

/// What one tick drew.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FrameReport {
    pub timestamp_ms: f64,
    pub faces: usize,
    pub hands: usize,
    pub head_rect: Option<AnchorRect>,
    pub hand_rects: Vec<AnchorRect>,
    pub mesh: Option<PlacementTransform>,
}

struct Tracker {
    state: TrackerState,
    detector: Option<Box<dyn LandmarkDetector>>,
}

impl Tracker {
    fn idle() -> Self {
        Self {
            state: TrackerState::Idle,
            detector: None,
        }
    }

    fn detector_mut(&mut self) -> Option<&mut (dyn LandmarkDetector + 'static)> {
        match self.state {
            TrackerState::Ready => self.detector.as_deref_mut(),
            _ => None,
        }
    }
}

/// Drives the per-frame loop: detectors in, overlays out on two surfaces.
pub struct TryOnSession<S: Surface> {
    engine: PlacementEngine,
    loader: AssetLoader,
    face_surface: S,
    hand_surface: S,
    face: Tracker,
    hand: Tracker,
    scene_camera: Option<Box<dyn CameraModel>>,
    camera_on: bool,
    zoomed: bool,
    status: String,
}

impl<S: Surface> TryOnSession<S> {
    /// Create a session with the camera off and both trackers idle.
    pub fn new(engine: PlacementEngine, face_surface: S, hand_surface: S) -> Self {
        Self {
            engine,
            loader: AssetLoader::new(),
            face_surface,
            hand_surface,
            face: Tracker::idle(),
            hand: Tracker::idle(),
            scene_camera: None,
            camera_on: false,
            zoomed: false,
            status: String::new(),
        }
    }

    /// `Tracking` once the camera is on and at least one tracker is ready.
    pub fn state(&self) -> SessionState {
        if !self.camera_on {
            SessionState::Disabled
        } else if self.face.state == TrackerState::Ready || self.hand.state == TrackerState::Ready {
            SessionState::Tracking
        } else {
            SessionState::CameraOnly
        }
    }

    /// Get the placement engine.
    pub fn engine(&self) -> &PlacementEngine {
        &self.engine
    }

    /// Get the placement engine for asset and mesh changes.
    pub fn engine_mut(&mut self) -> &mut PlacementEngine {
        &mut self.engine
    }

    /// Get the layer holding the headpiece and face debug points.
    pub fn face_surface(&self) -> &S {
        &self.face_surface
    }

    /// Get the layer holding rings and hand skeletons.
    pub fn hand_surface(&self) -> &S {
        &self.hand_surface
    }

    /// Last user-facing status message.
    pub fn status(&self) -> &str {
        &self.status
    }

    /// Whether a hand try-on asked for the enlarged view.
    pub fn is_zoomed(&self) -> bool {
        self.zoomed
    }

    /// Whether frames are being delivered.
    pub fn is_camera_on(&self) -> bool {
        self.camera_on
    }

    /// Get the lifecycle state of one tracker.
    pub fn tracker_state(&self, kind: TrackerKind) -> &TrackerState {
        &self.tracker(kind).state
    }

    fn tracker(&self, kind: TrackerKind) -> &Tracker {
        match kind {
            TrackerKind::Face => &self.face,
            TrackerKind::Hand => &self.hand,
        }
    }

    fn tracker_mut(&mut self, kind: TrackerKind) -> &mut Tracker {
        match kind {
            TrackerKind::Face => &mut self.face,
            TrackerKind::Hand => &mut self.hand,
        }
    }

    /// Install the 3D scene camera used to fit the head mesh.
    pub fn set_scene_camera(&mut self, mut camera: Box<dyn CameraModel>) {
        camera.set_viewport(
            self.face_surface.width() as f32,
            self.face_surface.height() as f32,
        );
        self.scene_camera = Some(camera);
    }

    /// Start delivering frames at the given display size.
    pub fn enable_camera(&mut self, width: u32, height: u32) {
        self.camera_on = true;
        self.resize(width, height);
        self.status = "Camera enabled".into();
        tracing::info!("Camera enabled at {}x{}", width, height);
    }

    /// Stop the camera, wipe both overlay layers and drop the zoomed view.
    pub fn disable_camera(&mut self) {
        self.camera_on = false;
        self.face_surface.clear();
        self.hand_surface.clear();
        self.zoomed = false;
        self.status = "Camera disabled".into();
        tracing::info!("Camera disabled");
    }

    /// Match both surfaces (and the scene camera) to the displayed video size.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.face_surface.resize(width, height);
        self.hand_surface.resize(width, height);
        if let Some(camera) = self.scene_camera.as_mut() {
            camera.set_viewport(width as f32, height as f32);
        }
    }

    /// Ask for a tracker. Only the first request while the camera is on
    /// returns `StartLoad`; later ones see the `Loading` latch.
    pub fn request_tracking(&mut self, kind: TrackerKind) -> TrackingRequest {
        if !self.camera_on {
            self.status = "Enable camera first".into();
            return TrackingRequest::NeedsCamera;
        }

        let state = self.tracker(kind).state.clone();
        match state {
            TrackerState::Ready => {
                self.status = format!("{kind} tracker enabled");
                TrackingRequest::AlreadyReady
            }
            TrackerState::Loading => TrackingRequest::AlreadyLoading,
            TrackerState::Idle | TrackerState::Failed(_) => {
                self.tracker_mut(kind).state = TrackerState::Loading;
                self.status = format!("Loading {} model...", kind.to_string().to_lowercase());
                tracing::debug!("Loading {} tracker", kind);
                TrackingRequest::StartLoad
            }
        }
    }

    /// Shorthand for `request_tracking(TrackerKind::Face)`.
    pub fn request_face_tracking(&mut self) -> TrackingRequest {
        self.request_tracking(TrackerKind::Face)
    }

    /// Shorthand for `request_tracking(TrackerKind::Hand)`.
    pub fn request_hand_tracking(&mut self) -> TrackingRequest {
        self.request_tracking(TrackerKind::Hand)
    }

    /// Install a loaded detector. It runs from the next tick on.
    pub fn tracker_loaded(&mut self, kind: TrackerKind, detector: Box<dyn LandmarkDetector>) {
        *self.tracker_mut(kind) = Tracker {
            state: TrackerState::Ready,
            detector: Some(detector),
        };
        self.status = format!("{kind} tracker enabled");
        tracing::info!("{} tracker ready", kind);
    }

    /// Record a failed load. The tracker can be requested again, and its
    /// layer is cleared so no overlay from a previous detector lingers.
    pub fn tracker_failed(&mut self, kind: TrackerKind, reason: impl Into<String>) {
        let reason = reason.into();
        tracing::warn!("{} tracker failed to load: {}", kind, reason);
        *self.tracker_mut(kind) = Tracker {
            state: TrackerState::Failed(reason),
            detector: None,
        };
        match kind {
            TrackerKind::Face => self.face_surface.clear(),
            TrackerKind::Hand => self.hand_surface.clear(),
        }
        self.status = format!("{kind} model load failed");
    }

    /// Start loading an image into a slot. The slot keeps drawing its
    /// current image until the load completes.
    pub fn load_asset(&mut self, kind: SlotKind, path: impl Into<PathBuf>) {
        self.engine.slot_mut(kind).begin_load();
        self.loader.request(kind, path);
    }

    /// The loader, for hosts that decode assets themselves. Pair every
    /// request with a `begin_load` on the matching slot.
    pub fn loader(&self) -> &AssetLoader {
        &self.loader
    }

    /// Block until one pending load completes and apply it.
    pub fn await_load(&mut self, timeout: Duration) -> bool {
        match self.loader.wait(timeout) {
            Some(outcome) => {
                self.engine.apply_outcome(outcome);
                true
            }
            None => false,
        }
    }

    /// Enable whatever the product needs and start loading its image.
    ///
    /// When the camera is off it is turned on at the current surface size.
    pub fn try_on(&mut self, product: &Product) -> TrackingRequest {
        if !self.camera_on {
            let (w, h) = (self.face_surface.width(), self.face_surface.height());
            self.enable_camera(w, h);
        }

        let request = self.request_tracking(product.kind.into());

        if let Some(source) = &product.source {
            self.load_asset(product.kind, source.clone());
        }

        self.zoomed = true;
        self.status = match product.kind {
            SlotKind::Head => format!("Face try-on: {}", product.name),
            SlotKind::Hand => format!("Hand try-on: {}", product.name),
        };
        request
    }

    /// Run one frame: apply finished loads, detect, and redraw the overlays.
    pub fn tick(&mut self, timestamp_ms: f64) -> FrameReport {
        for outcome in self.loader.drain() {
            self.engine.apply_outcome(outcome);
        }

        let mut report = FrameReport {
            timestamp_ms,
            ..FrameReport::default()
        };

        if !self.camera_on {
            return report;
        }

        if let Some(detector) = self.face.detector_mut() {
            let faces = detector.detect(timestamp_ms);
            self.face_surface.clear();

            report.faces = faces.len();
            if let Some(face) = faces.first() {
                report.head_rect = self.engine.draw_face(&mut self.face_surface, face);
                if let Some(camera) = self.scene_camera.as_deref() {
                    report.mesh = self.engine.fit_mesh(camera, Some(face));
                }
            }
        }

        if let Some(detector) = self.hand.detector_mut() {
            let hands = detector.detect(timestamp_ms);
            self.hand_surface.clear();

            report.hands = hands.len();
            for hand in &hands {
                if let Some(rect) = self.engine.draw_hand(&mut self.hand_surface, hand) {
                    report.hand_rects.push(rect);
                }
            }
            if !hands.is_empty() {
                self.status = format!("Hands: {}", hands.len());
            }
        }

        report
    }
}
