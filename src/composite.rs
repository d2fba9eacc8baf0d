//! 2D anchor compositor for raster overlays.
//!
//! Landmarks are mapped straight to pixel space (no camera model) and turned
//! into anchor rectangles for the headpiece and ring images. Every draw call
//! checks its landmarks and asset first and silently does nothing when either
//! is unavailable.

use image::Rgba;
use serde::{Deserialize, Serialize};

use crate::asset::OverlayImage;
use crate::config::{DebugStyle, HandOverlayConfig, HeadCalibration, TryOnConfig};
use crate::surface::Surface;
use crate::topology::{FaceTopology, HandTopology};
use crate::types::{AnchorRect, LandmarkSet, Point};

/// Intermediate face measurements and the resulting head overlay rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HeadAnchor {
    /// Pixel distance between the two face boundaries.
    pub face_width: f32,
    /// Vertical pixel distance between chin and forehead.
    pub face_height: f32,
    /// Lifted face center the overlay is placed around.
    pub center: Point,
    pub rect: AnchorRect,
}

/// Place a head overlay from pixel-space face measurements.
///
/// `aspect` is the asset's natural height over width; the overlay keeps it.
pub fn fit_head_rect(
    left: Point,
    right: Point,
    chin_y: f32,
    forehead_y: f32,
    aspect: f32,
    calibration: &HeadCalibration,
) -> HeadAnchor {
    let face_width = left.distance(&right);
    let face_height = (chin_y - forehead_y).abs();

    let center = Point::new(
        (left.x + right.x) / 2.0,
        (chin_y + forehead_y) / 2.0 - face_height * calibration.center_lift,
    );

    let width = face_width * calibration.width_margin;
    let height = width * aspect;

    let rect = AnchorRect::new(
        center.x - width / 2.0,
        center.y - height * calibration.top_bias,
        width,
        height,
    );

    HeadAnchor {
        face_width,
        face_height,
        center,
        rect,
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Compositor {
    face: FaceTopology,
    hand: HandTopology,
    head_calibration: HeadCalibration,
    hand_size: HandOverlayConfig,
    style: DebugStyle,
}

impl Compositor {
    pub fn new(config: &TryOnConfig, face: FaceTopology, hand: HandTopology) -> Self {
        Self {
            face,
            hand,
            head_calibration: config.head,
            hand_size: config.hand,
            style: config.debug,
        }
    }

    /// Compute the head overlay placement on a surface of the given size.
    ///
    /// Uses the asset's own calibration when it has one.
    pub fn head_anchor(
        &self,
        landmarks: &LandmarkSet,
        asset: &OverlayImage,
        surface_width: f32,
        surface_height: f32,
    ) -> Option<HeadAnchor> {
        if !asset.is_complete() {
            return None;
        }

        let left = landmarks.get(self.face.left_boundary)?;
        let right = landmarks.get(self.face.right_boundary)?;
        let chin = landmarks.get(self.face.chin)?;
        let forehead = landmarks.first_present(&self.face.forehead)?;

        let calibration = asset.calibration().unwrap_or(&self.head_calibration);

        Some(fit_head_rect(
            left.to_pixel(surface_width, surface_height),
            right.to_pixel(surface_width, surface_height),
            chin.y * surface_height,
            forehead.y * surface_height,
            asset.aspect_ratio(),
            calibration,
        ))
    }

    /// Composite the headpiece for one face. Returns the rectangle drawn.
    pub fn draw_head<S: Surface + ?Sized>(
        &self,
        surface: &mut S,
        landmarks: &LandmarkSet,
        asset: Option<&OverlayImage>,
    ) -> Option<AnchorRect> {
        let asset = asset?;
        let anchor = self.head_anchor(
            landmarks,
            asset,
            surface.width() as f32,
            surface.height() as f32,
        )?;

        surface.draw_image(asset.pixels(), anchor.rect);
        Some(anchor.rect)
    }

    /// Fixed-size rectangle centered on the ring anchor of one hand.
    pub fn hand_anchor(
        &self,
        landmarks: &LandmarkSet,
        surface_width: f32,
        surface_height: f32,
    ) -> Option<AnchorRect> {
        let anchor = landmarks.first_present(&self.hand.ring_anchor)?;
        Some(AnchorRect::centered_on(
            anchor.to_pixel(surface_width, surface_height),
            self.hand_size.width,
            self.hand_size.height,
        ))
    }

    /// Composite the ring for one hand. Returns the rectangle drawn.
    pub fn draw_hand<S: Surface + ?Sized>(
        &self,
        surface: &mut S,
        landmarks: &LandmarkSet,
        asset: Option<&OverlayImage>,
    ) -> Option<AnchorRect> {
        let asset = asset.filter(|a| a.is_complete())?;
        let rect = self.hand_anchor(landmarks, surface.width() as f32, surface.height() as f32)?;

        surface.draw_image(asset.pixels(), rect);
        Some(rect)
    }

    /// Dot every face landmark, when enabled.
    pub fn draw_face_points<S: Surface + ?Sized>(&self, surface: &mut S, landmarks: &LandmarkSet) {
        if !self.style.show_face_points {
            return;
        }

        let (w, h) = (surface.width() as f32, surface.height() as f32);
        let color = Rgba(self.style.face_point_color);
        for lm in landmarks.iter().filter(|lm| lm.is_finite()) {
            surface.fill_circle(lm.to_pixel(w, h), self.style.face_point_radius, color);
        }
    }

    /// Trace the hand landmarks in index order and dot each joint, when enabled.
    pub fn draw_hand_skeleton<S: Surface + ?Sized>(&self, surface: &mut S, landmarks: &LandmarkSet) {
        if !self.style.show_hand_skeleton {
            return;
        }

        let (w, h) = (surface.width() as f32, surface.height() as f32);
        let points: Vec<Point> = landmarks
            .iter()
            .filter(|lm| lm.is_finite())
            .map(|lm| lm.to_pixel(w, h))
            .collect();

        surface.stroke_polyline(
            &points,
            self.style.hand_line_width,
            Rgba(self.style.hand_line_color),
        );

        let joint = Rgba(self.style.hand_point_color);
        for p in &points {
            surface.fill_circle(*p, self.style.hand_point_radius, joint);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::Canvas;
    use crate::topology::{MEDIAPIPE_FACE, MEDIAPIPE_HAND};
    use crate::types::Landmark;
    use image::RgbaImage;

    fn compositor() -> Compositor {
        Compositor::new(&TryOnConfig::default(), MEDIAPIPE_FACE, MEDIAPIPE_HAND)
    }

    fn sprite(w: u32, h: u32) -> OverlayImage {
        OverlayImage::new("sprite", RgbaImage::from_pixel(w, h, Rgba([200, 160, 40, 255])))
    }

    fn reference_face() -> LandmarkSet {
        let mut set = LandmarkSet::filled(468, Landmark::new(0.5, 0.5));
        set[234] = Landmark::new(0.3, 0.5);
        set[454] = Landmark::new(0.7, 0.5);
        set[152] = Landmark::new(0.5, 0.9);
        set[10] = Landmark::new(0.5, 0.1);
        set
    }

    #[test]
    fn head_anchor_reference_measurements() {
        let anchor = compositor()
            .head_anchor(&reference_face(), &sprite(200, 100), 1000.0, 1000.0)
            .unwrap();

        assert!((anchor.face_width - 400.0).abs() < 1e-3);
        assert!((anchor.face_height - 800.0).abs() < 1e-3);
        assert!((anchor.center.x - 500.0).abs() < 1e-3);
        assert!((anchor.center.y - 490.0).abs() < 1e-3);
        assert!((anchor.rect.width - 540.0).abs() < 1e-3);
        assert!((anchor.rect.height - 270.0).abs() < 1e-3);
        assert!((anchor.rect.x - 230.0).abs() < 1e-3);
        assert!((anchor.rect.y - (490.0 - 270.0 * 1.05)).abs() < 1e-3);
    }

    #[test]
    fn head_overlay_keeps_asset_aspect_ratio() {
        let c = compositor();
        for (w, h) in [(100, 100), (300, 120), (64, 200)] {
            let asset = sprite(w, h);
            for spread in [0.05, 0.2, 0.45] {
                let mut face = reference_face();
                face[234] = Landmark::new(0.5 - spread, 0.48);
                face[454] = Landmark::new(0.5 + spread, 0.52);

                let rect = c.head_anchor(&face, &asset, 640.0, 480.0).unwrap().rect;
                assert!((rect.aspect_ratio() - asset.aspect_ratio()).abs() < 1e-4);
            }
        }
    }

    #[test]
    fn forehead_falls_back_through_chain() {
        let c = compositor();
        let asset = sprite(100, 100);

        let mut face = reference_face();
        face[10] = Landmark::new(f32::NAN, f32::NAN);
        face[9] = Landmark::new(0.5, 0.2);
        let anchor = c.head_anchor(&face, &asset, 1000.0, 1000.0).unwrap();
        assert!((anchor.face_height - 700.0).abs() < 1e-3);

        face[9] = Landmark::new(f32::NAN, 0.2);
        face[1] = Landmark::new(0.5, 0.3);
        let anchor = c.head_anchor(&face, &asset, 1000.0, 1000.0).unwrap();
        assert!((anchor.face_height - 600.0).abs() < 1e-3);
    }

    #[test]
    fn asset_calibration_overrides_default() {
        let asset = sprite(100, 100).with_calibration(HeadCalibration {
            width_margin: 1.0,
            center_lift: 0.0,
            top_bias: 0.5,
        });

        let anchor = compositor()
            .head_anchor(&reference_face(), &asset, 1000.0, 1000.0)
            .unwrap();
        assert!((anchor.rect.width - 400.0).abs() < 1e-3);
        assert!((anchor.center.y - 500.0).abs() < 1e-3);
        assert!((anchor.rect.y - 300.0).abs() < 1e-3);
    }

    #[test]
    fn head_is_noop_without_landmarks_or_asset() {
        let c = compositor();
        let mut canvas = Canvas::new(100, 100);
        let asset = sprite(10, 10);

        // Short set: the boundary indices are missing
        let short = LandmarkSet::filled(200, Landmark::new(0.5, 0.5));
        assert!(c.draw_head(&mut canvas, &short, Some(&asset)).is_none());

        let mut no_chin = reference_face();
        no_chin[152] = Landmark::new(0.5, f32::NAN);
        assert!(c.draw_head(&mut canvas, &no_chin, Some(&asset)).is_none());

        assert!(c.draw_head(&mut canvas, &reference_face(), None).is_none());

        let pending = OverlayImage::new("pending", RgbaImage::new(0, 0));
        assert!(c.draw_head(&mut canvas, &reference_face(), Some(&pending)).is_none());

        assert!(canvas.is_blank());
    }

    #[test]
    fn draw_head_paints_surface() {
        let mut canvas = Canvas::new(100, 100);
        let rect = compositor()
            .draw_head(&mut canvas, &reference_face(), Some(&sprite(20, 10)))
            .unwrap();

        let c = rect.center();
        assert_eq!(canvas.pixels().get_pixel(c.x as u32, c.y as u32)[3], 255);
    }

    #[test]
    fn hand_overlay_centered_on_fingertip() {
        let mut hand = LandmarkSet::filled(21, Landmark::new(0.1, 0.1));
        hand[8] = Landmark::new(0.5, 0.5);

        let mut canvas = Canvas::new(800, 600);
        let rect = compositor()
            .draw_hand(&mut canvas, &hand, Some(&sprite(30, 30)))
            .unwrap();

        assert_eq!(rect, AnchorRect::new(370.0, 270.0, 60.0, 60.0));
        assert_eq!(canvas.pixels().get_pixel(400, 300)[3], 255);
        assert_eq!(canvas.pixels().get_pixel(369, 300)[3], 0);
    }

    #[test]
    fn hand_falls_back_to_landmark_nine() {
        let mut hand = LandmarkSet::filled(10, Landmark::new(0.2, 0.2));
        hand[8] = Landmark::new(f32::NAN, 0.5);
        hand[9] = Landmark::new(0.25, 0.5);

        let rect = compositor().hand_anchor(&hand, 800.0, 600.0).unwrap();
        assert_eq!(rect, AnchorRect::new(170.0, 270.0, 60.0, 60.0));
    }

    #[test]
    fn hand_is_noop_without_anchor_or_asset() {
        let c = compositor();
        let mut canvas = Canvas::new(100, 100);

        let hand = LandmarkSet::filled(8, Landmark::new(0.5, 0.5));
        assert!(c.draw_hand(&mut canvas, &hand, Some(&sprite(5, 5))).is_none());

        let full = LandmarkSet::filled(21, Landmark::new(0.5, 0.5));
        assert!(c.draw_hand(&mut canvas, &full, None).is_none());

        let pending = OverlayImage::new("pending", RgbaImage::new(0, 0));
        assert!(c.draw_hand(&mut canvas, &full, Some(&pending)).is_none());

        assert!(canvas.is_blank());
    }

    #[test]
    fn debug_drawing_respects_toggles() {
        let mut config = TryOnConfig::default();
        config.debug.show_face_points = false;
        config.debug.show_hand_skeleton = false;
        let quiet = Compositor::new(&config, MEDIAPIPE_FACE, MEDIAPIPE_HAND);

        let mut canvas = Canvas::new(50, 50);
        let set = LandmarkSet::filled(21, Landmark::new(0.5, 0.5));
        quiet.draw_face_points(&mut canvas, &set);
        quiet.draw_hand_skeleton(&mut canvas, &set);
        assert!(canvas.is_blank());

        compositor().draw_hand_skeleton(&mut canvas, &set);
        assert!(!canvas.is_blank());
    }
}
