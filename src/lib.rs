//! # tryon-fit
//!
//! Landmark-driven overlay placement for virtual try-on.
//!
//! This crate provides:
//! - **3D Fitting**: unprojects nose and face-boundary landmarks through a
//!   camera to position, yaw and scale a rigid mesh (eyewear)
//! - **2D Compositing**: anchors headpiece and ring images to face and hand
//!   landmarks on an RGBA surface
//! - **Frame Loop**: a per-frame session with camera and tracker enablement,
//!   background asset loading and recorded-landmark replay
//!
//! Landmarks come from an external detector (MediaPipe Face Mesh with 468
//! points, MediaPipe Hands with 21 points) in normalized image coordinates.
//! Semantic indices are looked up through [`topology`], so another detector
//! only needs its own table.
//!
//! ## Placement Overview
//!
//! 1. The detector reports one landmark set per face or hand
//! 2. 3D path: nose tip and both face boundaries are unprojected at a fixed
//!    depth; the nose gives position, the boundaries give yaw and scale
//! 3. 2D path: face width, face height and the forehead/chin midpoint give a
//!    headpiece rectangle with the asset's aspect ratio; the index fingertip
//!    centers a fixed-size ring
//! 4. Missing landmarks or an unloaded asset skip the draw for that frame
//!
//! ## Quick Start
//!
//! ```rust
//! use tryon_fit::{Canvas, Landmark, LandmarkSet, OverlayImage, PlacementEngine, SlotKind};
//! use image::{Rgba, RgbaImage};
//!
//! let mut engine = PlacementEngine::default();
//! let crown = RgbaImage::from_pixel(200, 100, Rgba([200, 160, 40, 255]));
//! engine.set_asset(SlotKind::Head, OverlayImage::new("crown", crown));
//!
//! // One face from the detector
//! let mut face = LandmarkSet::filled(468, Landmark::new(0.5, 0.5));
//! face[234] = Landmark::new(0.3, 0.5);
//! face[454] = Landmark::new(0.7, 0.5);
//! face[152] = Landmark::new(0.5, 0.9);
//! face[10] = Landmark::new(0.5, 0.1);
//!
//! let mut canvas = Canvas::new(1000, 1000);
//! let rect = engine.draw_face(&mut canvas, &face).unwrap();
//! println!("Headpiece at ({}, {}) size {}x{}", rect.x, rect.y, rect.width, rect.height);
//! ```
//!
//! ## Custom Surfaces
//!
//! Implement the [`Surface`] trait to composite onto your own render target:
//!
//! ```rust
//! use tryon_fit::{AnchorRect, Point, Surface};
//! use image::{Rgba, RgbaImage};
//!
//! struct Recorder { draws: Vec<AnchorRect> }
//!
//! impl Surface for Recorder {
//!     fn width(&self) -> u32 { 640 }
//!     fn height(&self) -> u32 { 480 }
//!     fn resize(&mut self, _width: u32, _height: u32) {}
//!     fn clear(&mut self) { self.draws.clear() }
//!     fn draw_image(&mut self, _image: &RgbaImage, rect: AnchorRect) {
//!         self.draws.push(rect);
//!     }
//!     fn fill_circle(&mut self, _center: Point, _radius: f32, _color: Rgba<u8>) {}
//!     fn stroke_polyline(&mut self, _points: &[Point], _width: u32, _color: Rgba<u8>) {}
//! }
//! ```

mod asset;
mod camera;
mod composite;
pub mod config;
mod engine;
mod error;
mod loader;
mod mesh_fit;
pub mod recording;
mod session;
mod surface;
pub mod topology;
mod types;

pub use asset::{AssetSlot, LoadState, MeshNode, OverlayImage, SlotKind};
pub use camera::{landmark_to_ndc, CameraModel, PerspectiveCamera};
pub use composite::{fit_head_rect, Compositor, HeadAnchor};
pub use config::TryOnConfig;
pub use engine::PlacementEngine;
pub use error::{Error, Result};
pub use loader::{AssetLoader, LoadOutcome};
pub use mesh_fit::{fit_scale, MeshFitter, PlacementTransform};
pub use recording::{LandmarkRecording, RecordedFrame, ReplayDetector};
pub use session::{
    FrameReport, LandmarkDetector, Product, SessionState, TrackerKind, TrackerState,
    TrackingRequest, TryOnSession,
};
pub use surface::{Canvas, Surface};
pub use types::{AnchorRect, Landmark, LandmarkSet, Point};
