//! Overlay assets and the per-slot "current asset" state.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use glam::Vec3;
use image::RgbaImage;
use serde::{Deserialize, Serialize};

use crate::config::HeadCalibration;
use crate::error::{Error, Result};
use crate::mesh_fit::PlacementTransform;

/// Which overlay slot an asset belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SlotKind {
    Head,
    Hand,
}

impl fmt::Display for SlotKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SlotKind::Head => write!(f, "head"),
            SlotKind::Hand => write!(f, "hand"),
        }
    }
}

/// A raster overlay image (headpiece, ring).
#[derive(Debug, Clone)]
pub struct OverlayImage {
    name: String,
    pixels: RgbaImage,
    calibration: Option<HeadCalibration>,
}

impl OverlayImage {
    pub fn new(name: impl Into<String>, pixels: RgbaImage) -> Self {
        Self {
            name: name.into(),
            pixels,
            calibration: None,
        }
    }

    /// Decode an image file into an overlay.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let pixels = image::open(path)?.to_rgba8();
        if pixels.width() == 0 || pixels.height() == 0 {
            return Err(load_error(format!("{} has no pixels", path.display())));
        }
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self::new(name, pixels))
    }

    /// Attach head calibration authored for this particular asset.
    pub fn with_calibration(mut self, calibration: HeadCalibration) -> Self {
        self.calibration = Some(calibration);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }

    pub fn calibration(&self) -> Option<&HeadCalibration> {
        self.calibration.as_ref()
    }

    pub fn natural_width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn natural_height(&self) -> u32 {
        self.pixels.height()
    }

    /// An image without pixel data has not finished decoding and must not be drawn.
    pub fn is_complete(&self) -> bool {
        self.natural_width() > 0 && self.natural_height() > 0
    }

    /// Natural height over natural width.
    pub fn aspect_ratio(&self) -> f32 {
        self.natural_height() as f32 / self.natural_width() as f32
    }
}

/// A rigid 3D overlay mesh node (eyewear).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MeshNode {
    pub position: Vec3,
    /// Euler angles in radians (x = pitch, y = yaw, z = roll).
    pub rotation: Vec3,
    pub scale: Vec3,
    /// Authored inter-temple width of the mesh, in model units.
    pub reference_inner_width: f32,
}

impl MeshNode {
    pub fn new(reference_inner_width: f32) -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Vec3::ZERO,
            scale: Vec3::ONE,
            reference_inner_width,
        }
    }

    pub fn apply(&mut self, transform: &PlacementTransform) {
        self.position = transform.position;
        self.rotation = Vec3::new(0.0, transform.yaw, 0.0);
        self.scale = Vec3::splat(transform.scale);
    }
}

/// Lifecycle of an asynchronous load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadState {
    Idle,
    Loading,
    Ready,
    Failed(String),
}

/// The current image of one overlay slot, plus the state of loads into it.
///
/// The current image is only replaced when a load completes successfully, so
/// the previous image keeps being drawn while a replacement is in flight.
/// Loads are never cancelled; whichever completes last wins.
#[derive(Debug, Clone)]
pub struct AssetSlot {
    current: Option<Arc<OverlayImage>>,
    state: LoadState,
    in_flight: usize,
}

impl Default for AssetSlot {
    fn default() -> Self {
        Self::empty()
    }
}

impl AssetSlot {
    pub fn empty() -> Self {
        Self {
            current: None,
            state: LoadState::Idle,
            in_flight: 0,
        }
    }

    pub fn with_image(image: OverlayImage) -> Self {
        Self {
            current: Some(Arc::new(image)),
            state: LoadState::Ready,
            in_flight: 0,
        }
    }

    pub fn current(&self) -> Option<&OverlayImage> {
        self.current.as_deref()
    }

    pub fn current_arc(&self) -> Option<Arc<OverlayImage>> {
        self.current.clone()
    }

    pub fn state(&self) -> &LoadState {
        &self.state
    }

    /// Install an image right away.
    pub fn replace(&mut self, image: OverlayImage) {
        self.current = Some(Arc::new(image));
        if self.in_flight == 0 {
            self.state = LoadState::Ready;
        }
    }

    pub fn begin_load(&mut self) {
        self.in_flight += 1;
        self.state = LoadState::Loading;
    }

    pub fn finish_load(&mut self, result: Result<OverlayImage>) {
        self.in_flight = self.in_flight.saturating_sub(1);

        let outcome = match result {
            Ok(image) => {
                self.current = Some(Arc::new(image));
                LoadState::Ready
            }
            Err(e) => LoadState::Failed(e.to_string()),
        };

        if self.in_flight == 0 {
            self.state = outcome;
        }
    }
}

/// Shorthand for a failed load result.
pub fn load_error(message: impl Into<String>) -> Error {
    Error::AssetLoad(message.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn solid(name: &str, w: u32, h: u32) -> OverlayImage {
        OverlayImage::new(name, RgbaImage::from_pixel(w, h, Rgba([255, 0, 0, 255])))
    }

    #[test]
    fn completeness_and_aspect() {
        let img = solid("ring", 40, 20);
        assert!(img.is_complete());
        assert!((img.aspect_ratio() - 0.5).abs() < 1e-6);

        let empty = OverlayImage::new("pending", RgbaImage::new(0, 0));
        assert!(!empty.is_complete());
    }

    #[test]
    fn mesh_node_applies_yaw_only() {
        let mut node = MeshNode::new(0.2);
        node.rotation = Vec3::new(0.3, 0.0, 0.4);
        node.apply(&PlacementTransform {
            position: Vec3::new(1.0, 2.0, -3.0),
            yaw: 0.25,
            scale: 1.5,
        });

        assert_eq!(node.position, Vec3::new(1.0, 2.0, -3.0));
        assert_eq!(node.rotation, Vec3::new(0.0, 0.25, 0.0));
        assert_eq!(node.scale, Vec3::splat(1.5));
    }

    #[test]
    fn slot_keeps_previous_image_until_load_completes() {
        let mut slot = AssetSlot::with_image(solid("default", 10, 10));
        slot.begin_load();
        assert_eq!(slot.state(), &LoadState::Loading);
        assert_eq!(slot.current().map(|i| i.name()), Some("default"));

        slot.finish_load(Ok(solid("gold", 20, 10)));
        assert_eq!(slot.state(), &LoadState::Ready);
        assert_eq!(slot.current().map(|i| i.name()), Some("gold"));
    }

    #[test]
    fn failed_load_keeps_current_image() {
        let mut slot = AssetSlot::with_image(solid("default", 10, 10));
        slot.begin_load();
        slot.finish_load(Err(load_error("not found")));

        assert!(matches!(slot.state(), LoadState::Failed(_)));
        assert_eq!(slot.current().map(|i| i.name()), Some("default"));
    }

    #[test]
    fn last_completed_load_wins() {
        let mut slot = AssetSlot::empty();
        slot.begin_load();
        slot.begin_load();

        slot.finish_load(Ok(solid("second", 10, 10)));
        assert_eq!(slot.state(), &LoadState::Loading);

        // The older request completes later and overwrites
        slot.finish_load(Ok(solid("first", 10, 10)));
        assert_eq!(slot.state(), &LoadState::Ready);
        assert_eq!(slot.current().map(|i| i.name()), Some("first"));
    }
}
