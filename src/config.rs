//! Tunable placement constants.
//!
//! Every geometric constant of the fitters lives here and can be overridden
//! from a JSON file. Missing fields fall back to their defaults.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TryOnConfig {
    pub mesh: MeshFitConfig,
    /// Head calibration used for assets that do not carry their own.
    pub head: HeadCalibration,
    pub hand: HandOverlayConfig,
    pub debug: DebugStyle,
}

/// Constants of the 3D unprojection fitter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeshFitConfig {
    /// Synthetic NDC depth the landmarks are unprojected at. Negative means
    /// in front of the camera.
    pub depth: f32,
    /// Fraction of the ear-to-ear distance the mesh's inner width should span.
    pub ear_span_factor: f32,
    pub min_scale: f32,
    pub max_scale: f32,
    /// Authored inter-temple width for meshes that do not specify one.
    pub reference_inner_width: f32,
}

/// Per-asset calibration of the 2D head overlay.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeadCalibration {
    /// Overlay width as a multiple of the face width.
    pub width_margin: f32,
    /// Upward shift of the face center, as a fraction of face height.
    pub center_lift: f32,
    /// Top edge offset above the center, as a multiple of overlay height.
    pub top_bias: f32,
}

/// Fixed pixel size of the hand overlay.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HandOverlayConfig {
    pub width: f32,
    pub height: f32,
}

/// Appearance of the debug landmark drawing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DebugStyle {
    pub show_face_points: bool,
    pub face_point_radius: f32,
    /// RGBA
    pub face_point_color: [u8; 4],
    pub show_hand_skeleton: bool,
    pub hand_line_width: u32,
    pub hand_line_color: [u8; 4],
    pub hand_point_radius: f32,
    pub hand_point_color: [u8; 4],
}

impl Default for MeshFitConfig {
    fn default() -> Self {
        Self {
            depth: -0.6,
            ear_span_factor: 0.9,
            min_scale: 0.5,
            max_scale: 3.0,
            reference_inner_width: 0.20,
        }
    }
}

impl Default for HeadCalibration {
    fn default() -> Self {
        Self {
            width_margin: 1.35,
            center_lift: 0.05,
            top_bias: 1.05,
        }
    }
}

impl Default for HandOverlayConfig {
    fn default() -> Self {
        Self {
            width: 60.0,
            height: 60.0,
        }
    }
}

impl Default for DebugStyle {
    fn default() -> Self {
        Self {
            show_face_points: true,
            face_point_radius: 1.2,
            face_point_color: [232, 233, 244, 102],
            show_hand_skeleton: true,
            hand_line_width: 3,
            hand_line_color: [232, 181, 138, 255],
            hand_point_radius: 3.0,
            hand_point_color: [255, 255, 255, 153],
        }
    }
}

impl TryOnConfig {
    /// Load and validate a configuration file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        tracing::info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        self.mesh.validate()?;
        self.head.validate()?;
        self.debug.validate()?;

        let hand = &self.hand;
        if !(hand.width > 0.0 && hand.height > 0.0) {
            return Err(invalid(format!(
                "hand overlay size must be positive, got {}x{}",
                hand.width, hand.height
            )));
        }

        Ok(())
    }
}

impl MeshFitConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.depth.is_finite() && self.depth < 0.0) {
            return Err(invalid(format!(
                "mesh.depth must be a finite negative value, got {}",
                self.depth
            )));
        }
        if !(self.ear_span_factor.is_finite() && self.ear_span_factor > 0.0) {
            return Err(invalid(format!(
                "mesh.ear_span_factor must be positive, got {}",
                self.ear_span_factor
            )));
        }
        if !(self.min_scale > 0.0 && self.min_scale <= self.max_scale && self.max_scale.is_finite())
        {
            return Err(invalid(format!(
                "mesh scale bounds must satisfy 0 < min <= max, got [{}, {}]",
                self.min_scale, self.max_scale
            )));
        }
        if !(self.reference_inner_width.is_finite() && self.reference_inner_width > 0.0) {
            return Err(invalid(format!(
                "mesh.reference_inner_width must be positive, got {}",
                self.reference_inner_width
            )));
        }
        Ok(())
    }
}

impl HeadCalibration {
    pub fn validate(&self) -> Result<()> {
        if !(self.width_margin.is_finite() && self.width_margin > 0.0) {
            return Err(invalid(format!(
                "head.width_margin must be positive, got {}",
                self.width_margin
            )));
        }
        if !(self.center_lift.is_finite() && self.top_bias.is_finite()) {
            return Err(invalid("head.center_lift and head.top_bias must be finite".into()));
        }
        Ok(())
    }
}

/// Largest debug point radius or line width accepted, in pixels.
pub const MAX_DEBUG_SIZE: f32 = 64.0;

impl DebugStyle {
    pub fn validate(&self) -> Result<()> {
        for (name, radius) in [
            ("debug.face_point_radius", self.face_point_radius),
            ("debug.hand_point_radius", self.hand_point_radius),
        ] {
            if !(radius.is_finite() && radius > 0.0 && radius <= MAX_DEBUG_SIZE) {
                return Err(invalid(format!(
                    "{name} must be in (0, {MAX_DEBUG_SIZE}], got {radius}"
                )));
            }
        }
        if !(1..=MAX_DEBUG_SIZE as u32).contains(&self.hand_line_width) {
            return Err(invalid(format!(
                "debug.hand_line_width must be in [1, {MAX_DEBUG_SIZE}], got {}",
                self.hand_line_width
            )));
        }
        Ok(())
    }
}

fn invalid(message: String) -> Error {
    Error::InvalidConfig(message)
}
