//! 3D unprojection fitter for rigid overlay meshes.
//!
//! Three face landmarks (nose tip and both face boundaries) are unprojected at
//! a fixed synthetic depth. The nose gives the mesh origin, the horizontal
//! separation of the boundaries gives yaw, and their distance gives scale.

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::asset::MeshNode;
use crate::camera::{landmark_to_ndc, CameraModel};
use crate::config::MeshFitConfig;
use crate::topology::FaceTopology;
use crate::types::LandmarkSet;

/// Rigid placement of a 3D overlay.
///
/// Only yaw is modeled. All landmarks are unprojected at the same depth, so
/// pitch and roll cannot be recovered; this is a flat-depth approximation,
/// not full 6-DOF head tracking.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlacementTransform {
    pub position: Vec3,
    /// Rotation about the vertical axis, in radians.
    pub yaw: f32,
    /// Uniform scale factor.
    pub scale: f32,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MeshFitter {
    config: MeshFitConfig,
    topology: FaceTopology,
}

impl MeshFitter {
    pub fn new(config: MeshFitConfig, topology: FaceTopology) -> Self {
        Self { config, topology }
    }

    pub fn config(&self) -> &MeshFitConfig {
        &self.config
    }

    /// Compute the placement for a mesh of the given authored inner width.
    ///
    /// Returns `None` when the set is absent, is not a complete face set, or
    /// lacks one of the three anchor landmarks.
    pub fn placement<C: CameraModel + ?Sized>(
        &self,
        landmarks: Option<&LandmarkSet>,
        camera: &C,
        reference_inner_width: f32,
    ) -> Option<PlacementTransform> {
        let lm = landmarks?;
        if lm.len() < self.topology.point_count {
            return None;
        }

        let depth = self.config.depth;
        let to_world = |idx: usize| {
            lm.get(idx)
                .map(|landmark| camera.unproject(landmark_to_ndc(landmark, depth)))
        };

        let nose = to_world(self.topology.nose_tip)?;
        let left = to_world(self.topology.left_boundary)?;
        let right = to_world(self.topology.right_boundary)?;

        let span = right - left;
        let yaw = span.x.atan2(depth.abs());

        let ear_distance = left.distance(right);
        let scale = fit_scale(ear_distance, reference_inner_width, &self.config);

        Some(PlacementTransform {
            position: nose,
            yaw,
            scale,
        })
    }

    /// Fit `node` to the landmarks. Leaves the node untouched and returns
    /// `false` when the placement cannot be computed.
    pub fn fit<C: CameraModel + ?Sized>(
        &self,
        node: &mut MeshNode,
        camera: &C,
        landmarks: Option<&LandmarkSet>,
    ) -> bool {
        match self.placement(landmarks, camera, node.reference_inner_width) {
            Some(transform) => {
                node.apply(&transform);
                true
            }
            None => false,
        }
    }
}

/// Uniform scale for a mesh so its inner width spans the configured fraction
/// of the ear distance, clamped to the configured bounds.
///
/// Never panics: swapped bounds are reordered and a NaN bound collapses the
/// range onto the other bound.
pub fn fit_scale(ear_distance: f32, reference_inner_width: f32, config: &MeshFitConfig) -> f32 {
    let lo = config.min_scale.min(config.max_scale);
    let hi = config.min_scale.max(config.max_scale);

    let raw = ear_distance * config.ear_span_factor / reference_inner_width;
    if raw.is_nan() {
        return lo;
    }
    raw.max(lo).min(hi)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::PerspectiveCamera;
    use crate::topology::MEDIAPIPE_FACE;
    use crate::types::Landmark;

    fn face(nose: (f32, f32), left: (f32, f32), right: (f32, f32)) -> LandmarkSet {
        let mut set = LandmarkSet::filled(468, Landmark::new(0.5, 0.5));
        set[MEDIAPIPE_FACE.nose_tip] = Landmark::new(nose.0, nose.1);
        set[MEDIAPIPE_FACE.left_boundary] = Landmark::new(left.0, left.1);
        set[MEDIAPIPE_FACE.right_boundary] = Landmark::new(right.0, right.1);
        set
    }

    fn fitter() -> MeshFitter {
        MeshFitter::new(MeshFitConfig::default(), MEDIAPIPE_FACE)
    }

    #[test]
    fn missing_landmarks_leave_node_untouched() {
        let camera = PerspectiveCamera::default();
        let fitter = fitter();
        let mut node = MeshNode::new(0.2);
        let before = node;

        assert!(!fitter.fit(&mut node, &camera, None));

        let short = LandmarkSet::filled(467, Landmark::new(0.5, 0.5));
        assert!(!fitter.fit(&mut node, &camera, Some(&short)));

        let mut broken = face((0.5, 0.5), (0.4, 0.5), (0.6, 0.5));
        broken[MEDIAPIPE_FACE.right_boundary] = Landmark::new(f32::NAN, 0.5);
        assert!(!fitter.fit(&mut node, &camera, Some(&broken)));

        assert_eq!(node, before);
    }

    #[test]
    fn frontal_face_yaw_follows_boundary_span() {
        let camera = PerspectiveCamera::default();
        let set = face((0.5, 0.5), (0.4, 0.5), (0.6, 0.5));

        let t = fitter().placement(Some(&set), &camera, 0.2).unwrap();

        let expected_nose = camera.unproject(Vec3::new(0.0, 0.0, -0.6));
        assert!((t.position - expected_nose).length() < 1e-5);
        assert!(t.position.x.abs() < 1e-5);
        // Right boundary lies to the right of the left one, so yaw is positive
        let left = camera.unproject(Vec3::new(-0.2, 0.0, -0.6));
        let right = camera.unproject(Vec3::new(0.2, 0.0, -0.6));
        let expected_yaw = (right.x - left.x).atan2(0.6);
        assert!((t.yaw - expected_yaw).abs() < 1e-5);
    }

    #[test]
    fn scale_follows_ear_distance() {
        let camera = PerspectiveCamera::default();
        let set = face((0.5, 0.5), (0.3, 0.5), (0.7, 0.5));

        let left = camera.unproject(landmark_to_ndc(&Landmark::new(0.3, 0.5), -0.6));
        let right = camera.unproject(landmark_to_ndc(&Landmark::new(0.7, 0.5), -0.6));
        let expected = (left.distance(right) * 0.9 / 0.02).clamp(0.5, 3.0);

        let t = fitter().placement(Some(&set), &camera, 0.02).unwrap();
        assert!((t.scale - expected).abs() < 1e-5);
    }

    #[test]
    fn fit_applies_transform() {
        let camera = PerspectiveCamera::default();
        let set = face((0.55, 0.45), (0.35, 0.5), (0.7, 0.52));
        let mut node = MeshNode::new(0.2);
        node.rotation = Vec3::new(0.1, 0.0, 0.1);

        assert!(fitter().fit(&mut node, &camera, Some(&set)));
        assert_eq!(node.rotation.x, 0.0);
        assert_eq!(node.rotation.z, 0.0);
        assert_eq!(node.scale.x, node.scale.y);
        assert_eq!(node.scale.y, node.scale.z);
    }

    #[test]
    fn scale_with_unchecked_bounds_does_not_panic() {
        let swapped = MeshFitConfig {
            min_scale: 3.0,
            max_scale: 0.5,
            ..MeshFitConfig::default()
        };
        for distance in [0.0, 0.05, 1.0, f32::INFINITY, f32::NAN] {
            let s = fit_scale(distance, 0.2, &swapped);
            assert!((0.5..=3.0).contains(&s), "distance {distance} gave scale {s}");
        }

        let nan_bound = MeshFitConfig {
            max_scale: f32::NAN,
            ..MeshFitConfig::default()
        };
        assert_eq!(fit_scale(1.0, 0.2, &nan_bound), 0.5);

        let camera = PerspectiveCamera::default();
        let set = face((0.5, 0.5), (0.3, 0.5), (0.7, 0.5));
        let t = MeshFitter::new(swapped, MEDIAPIPE_FACE)
            .placement(Some(&set), &camera, 0.2)
            .unwrap();
        assert!((0.5..=3.0).contains(&t.scale));
    }

    #[test]
    fn scale_always_within_bounds() {
        let config = MeshFitConfig::default();
        let mut distance = 1e-6_f32;
        while distance < 1e6 {
            let s = fit_scale(distance, config.reference_inner_width, &config);
            assert!((0.5..=3.0).contains(&s), "distance {distance} gave scale {s}");
            distance *= 1.7;
        }

        assert_eq!(fit_scale(f32::NAN, 0.2, &config), 0.5);
        assert_eq!(fit_scale(f32::INFINITY, 0.2, &config), 3.0);
    }
}
