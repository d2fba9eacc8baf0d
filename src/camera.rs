//! Camera models for the 3D placement path.

use glam::{Mat4, Vec3};
use serde::{Deserialize, Serialize};

use crate::types::Landmark;

/// Anything that can map normalized device coordinates back into world space.
///
/// NDC follows the OpenGL convention: x and y in [-1, 1] with y up, z in
/// [-1, 1] from the near to the far plane.
pub trait CameraModel {
    fn unproject(&self, ndc: Vec3) -> Vec3;

    /// Called when the displayed video is resized.
    fn set_viewport(&mut self, _width: f32, _height: f32) {}
}

/// Convert a normalized image landmark to NDC at the given depth.
///
/// Image y grows downward while device y grows upward, hence the flip.
pub fn landmark_to_ndc(landmark: &Landmark, depth: f32) -> Vec3 {
    Vec3::new(landmark.x * 2.0 - 1.0, -(landmark.y * 2.0 - 1.0), depth)
}

/// A perspective camera placed in the scene by a camera-to-world matrix.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PerspectiveCamera {
    /// Vertical field of view in degrees.
    pub fov_y_degrees: f32,
    /// Width over height.
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
    /// Camera-to-world transform.
    pub world: Mat4,
}

impl Default for PerspectiveCamera {
    fn default() -> Self {
        Self {
            fov_y_degrees: 50.0,
            aspect: 1.0,
            near: 0.1,
            far: 100.0,
            world: Mat4::IDENTITY,
        }
    }
}

impl PerspectiveCamera {
    pub fn new(fov_y_degrees: f32, aspect: f32, near: f32, far: f32) -> Self {
        Self {
            fov_y_degrees,
            aspect,
            near,
            far,
            world: Mat4::IDENTITY,
        }
    }

    /// Place the camera at `position`, looking down its local -z axis.
    pub fn with_position(mut self, position: Vec3) -> Self {
        self.world = Mat4::from_translation(position);
        self
    }

    pub fn projection(&self) -> Mat4 {
        Mat4::perspective_rh_gl(
            self.fov_y_degrees.to_radians(),
            self.aspect,
            self.near,
            self.far,
        )
    }

    /// Map a world-space point to NDC.
    pub fn project(&self, point: Vec3) -> Vec3 {
        (self.projection() * self.world.inverse()).project_point3(point)
    }
}

impl CameraModel for PerspectiveCamera {
    fn unproject(&self, ndc: Vec3) -> Vec3 {
        (self.world * self.projection().inverse()).project_point3(ndc)
    }

    /// Keep the projection in sync with the displayed video size.
    fn set_viewport(&mut self, width: f32, height: f32) {
        if width > 0.0 && height > 0.0 {
            self.aspect = width / height;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn landmark_ndc_flips_vertical_axis() {
        let ndc = landmark_to_ndc(&Landmark::new(0.0, 0.0), -0.6);
        assert_eq!(ndc, Vec3::new(-1.0, 1.0, -0.6));

        let ndc = landmark_to_ndc(&Landmark::new(0.75, 1.0), -0.6);
        assert!((ndc.x - 0.5).abs() < 1e-6);
        assert!((ndc.y + 1.0).abs() < 1e-6);
    }

    #[test]
    fn unproject_then_project_round_trips() {
        let camera = PerspectiveCamera::new(60.0, 16.0 / 9.0, 0.1, 50.0)
            .with_position(Vec3::new(0.5, -0.2, 3.0));

        let ndc = Vec3::new(0.3, -0.4, -0.6);
        let world = camera.unproject(ndc);
        let back = camera.project(world);

        assert!((back - ndc).length() < 1e-4, "got {back:?}");
    }

    #[test]
    fn center_unprojects_onto_view_axis() {
        let camera = PerspectiveCamera::default();
        let p = camera.unproject(Vec3::new(0.0, 0.0, -0.6));

        assert!(p.x.abs() < 1e-5);
        assert!(p.y.abs() < 1e-5);
        // In front of the camera, between the near and far planes
        assert!(p.z < -camera.near + 1e-5 && p.z > -camera.far);
    }

    #[test]
    fn viewport_updates_aspect() {
        let mut camera = PerspectiveCamera::default();
        camera.set_viewport(1280.0, 720.0);
        assert!((camera.aspect - 1280.0 / 720.0).abs() < 1e-6);

        camera.set_viewport(0.0, 720.0);
        assert!((camera.aspect - 1280.0 / 720.0).abs() < 1e-6);
    }
}
