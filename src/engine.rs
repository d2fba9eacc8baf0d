use crate::asset::{AssetSlot, MeshNode, OverlayImage, SlotKind};
use crate::camera::CameraModel;
use crate::composite::Compositor;
use crate::config::TryOnConfig;
use crate::error::Result;
use crate::loader::LoadOutcome;
use crate::mesh_fit::{MeshFitter, PlacementTransform};
use crate::surface::Surface;
use crate::topology::{FaceTopology, HandTopology, MEDIAPIPE_FACE, MEDIAPIPE_HAND};
use crate::types::{AnchorRect, LandmarkSet};

/// Owns the overlay slots and runs the fitters against them.
///
/// Each engine instance carries its own current assets, so several engines
/// (or test fixtures) can coexist.
#[derive(Debug, Clone)]
pub struct PlacementEngine {
    config: TryOnConfig,
    compositor: Compositor,
    mesh_fitter: MeshFitter,
    head: AssetSlot,
    hand: AssetSlot,
    head_mesh: Option<MeshNode>,
}

impl Default for PlacementEngine {
    fn default() -> Self {
        Self::assemble(TryOnConfig::default(), MEDIAPIPE_FACE, MEDIAPIPE_HAND)
    }
}

impl PlacementEngine {
    /// Create an engine for MediaPipe face and hand landmarks.
    ///
    /// Fails with [`crate::Error::InvalidConfig`] when the configuration does not
    /// validate, so nothing on the per-frame path sees bad constants.
    pub fn new(config: TryOnConfig) -> Result<Self> {
        Self::with_topology(config, MEDIAPIPE_FACE, MEDIAPIPE_HAND)
    }

    /// Create an engine for another landmark detector's index layout.
    pub fn with_topology(config: TryOnConfig, face: FaceTopology, hand: HandTopology) -> Result<Self> {
        config.validate()?;
        Ok(Self::assemble(config, face, hand))
    }

    fn assemble(config: TryOnConfig, face: FaceTopology, hand: HandTopology) -> Self {
        Self {
            compositor: Compositor::new(&config, face, hand),
            mesh_fitter: MeshFitter::new(config.mesh, face),
            config,
            head: AssetSlot::empty(),
            hand: AssetSlot::empty(),
            head_mesh: None,
        }
    }

    /// Get the validated configuration the engine was built with.
    pub fn config(&self) -> &TryOnConfig {
        &self.config
    }

    /// Get the 2D compositor.
    pub fn compositor(&self) -> &Compositor {
        &self.compositor
    }

    /// Get the overlay slot of the given kind.
    pub fn slot(&self, kind: SlotKind) -> &AssetSlot {
        match kind {
            SlotKind::Head => &self.head,
            SlotKind::Hand => &self.hand,
        }
    }

    /// Mutable access to an overlay slot, e.g. to mark a load as started.
    pub fn slot_mut(&mut self, kind: SlotKind) -> &mut AssetSlot {
        match kind {
            SlotKind::Head => &mut self.head,
            SlotKind::Hand => &mut self.hand,
        }
    }

    /// Install an already decoded image as the slot's current asset.
    pub fn set_asset(&mut self, kind: SlotKind, image: OverlayImage) {
        self.slot_mut(kind).replace(image);
    }

    /// Apply a finished background load to its slot.
    pub fn apply_outcome(&mut self, outcome: LoadOutcome) {
        match &outcome.result {
            Ok(image) => tracing::info!(
                "Loaded {} asset {} ({}x{})",
                outcome.slot,
                outcome.source,
                image.natural_width(),
                image.natural_height()
            ),
            Err(e) => tracing::warn!(
                "Failed to load {} asset {}: {}",
                outcome.slot,
                outcome.source,
                e
            ),
        }
        self.slot_mut(outcome.slot).finish_load(outcome.result);
    }

    /// Install a 3D head mesh; `None` removes it.
    pub fn set_head_mesh(&mut self, mesh: Option<MeshNode>) {
        self.head_mesh = mesh;
    }

    /// A mesh node calibrated with the configured reference inner width.
    pub fn default_head_mesh(&self) -> MeshNode {
        MeshNode::new(self.config.mesh.reference_inner_width)
    }

    pub fn head_mesh(&self) -> Option<&MeshNode> {
        self.head_mesh.as_ref()
    }

    /// Debug points plus the headpiece for one face.
    pub fn draw_face<S: Surface + ?Sized>(
        &self,
        surface: &mut S,
        landmarks: &LandmarkSet,
    ) -> Option<AnchorRect> {
        self.compositor.draw_face_points(surface, landmarks);
        self.compositor
            .draw_head(surface, landmarks, self.head.current())
    }

    /// Debug skeleton plus the ring for one hand.
    pub fn draw_hand<S: Surface + ?Sized>(
        &self,
        surface: &mut S,
        landmarks: &LandmarkSet,
    ) -> Option<AnchorRect> {
        self.compositor.draw_hand_skeleton(surface, landmarks);
        self.compositor
            .draw_hand(surface, landmarks, self.hand.current())
    }

    /// Fit the installed head mesh. No-op without a mesh or usable landmarks.
    pub fn fit_mesh<C: CameraModel + ?Sized>(
        &mut self,
        camera: &C,
        landmarks: Option<&LandmarkSet>,
    ) -> Option<PlacementTransform> {
        let mesh = self.head_mesh.as_mut()?;
        let transform = self
            .mesh_fitter
            .placement(landmarks, camera, mesh.reference_inner_width)?;
        mesh.apply(&transform);
        Some(transform)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::{load_error, LoadState};
    use crate::camera::PerspectiveCamera;
    use crate::error::Error;
    use crate::surface::Canvas;
    use crate::types::Landmark;
    use image::{Rgba, RgbaImage};

    fn image(name: &str, w: u32, h: u32) -> OverlayImage {
        OverlayImage::new(name, RgbaImage::from_pixel(w, h, Rgba([10, 20, 30, 255])))
    }

    fn face() -> LandmarkSet {
        let mut set = LandmarkSet::filled(468, Landmark::new(0.5, 0.5));
        set[234] = Landmark::new(0.3, 0.5);
        set[454] = Landmark::new(0.7, 0.5);
        set[152] = Landmark::new(0.5, 0.9);
        set[10] = Landmark::new(0.5, 0.1);
        set
    }

    #[test]
    fn rejects_invalid_config() {
        let mut config = TryOnConfig::default();
        config.mesh.min_scale = 3.0;
        config.mesh.max_scale = 0.5;
        assert!(matches!(PlacementEngine::new(config), Err(Error::InvalidConfig(_))));

        let mut config = TryOnConfig::default();
        config.debug.face_point_radius = 1e30;
        assert!(PlacementEngine::new(config).is_err());

        assert!(PlacementEngine::new(TryOnConfig::default()).is_ok());
    }

    #[test]
    fn slots_are_independent() {
        let mut engine = PlacementEngine::default();
        engine.set_asset(SlotKind::Head, image("crown", 20, 10));

        assert_eq!(engine.slot(SlotKind::Head).current().map(|i| i.name()), Some("crown"));
        assert!(engine.slot(SlotKind::Hand).current().is_none());
    }

    #[test]
    fn apply_outcome_updates_slot() {
        let mut engine = PlacementEngine::default();
        engine.slot_mut(SlotKind::Hand).begin_load();
        engine.apply_outcome(LoadOutcome {
            slot: SlotKind::Hand,
            source: "ring.png".into(),
            result: Ok(image("ring", 8, 8)),
        });
        assert_eq!(engine.slot(SlotKind::Hand).state(), &LoadState::Ready);

        engine.slot_mut(SlotKind::Head).begin_load();
        engine.apply_outcome(LoadOutcome {
            slot: SlotKind::Head,
            source: "missing.png".into(),
            result: Err(load_error("missing")),
        });
        assert!(matches!(engine.slot(SlotKind::Head).state(), LoadState::Failed(_)));
    }

    #[test]
    fn draw_face_without_asset_only_draws_points() {
        let engine = PlacementEngine::default();
        let mut canvas = Canvas::new(100, 100);

        assert!(engine.draw_face(&mut canvas, &face()).is_none());
        assert!(!canvas.is_blank());
    }

    #[test]
    fn draw_face_uses_current_head_asset() {
        let mut engine = PlacementEngine::default();
        engine.set_asset(SlotKind::Head, image("crown", 200, 100));
        let mut canvas = Canvas::new(1000, 1000);

        let rect = engine.draw_face(&mut canvas, &face()).unwrap();
        assert!((rect.width - 540.0).abs() < 1e-3);
        assert!((rect.height - 270.0).abs() < 1e-3);
    }

    #[test]
    fn fit_mesh_requires_installed_mesh() {
        let mut engine = PlacementEngine::default();
        let camera = PerspectiveCamera::default();
        assert!(engine.fit_mesh(&camera, Some(&face())).is_none());

        engine.set_head_mesh(Some(engine.default_head_mesh()));
        let transform = engine.fit_mesh(&camera, Some(&face())).unwrap();
        assert_eq!(engine.head_mesh().unwrap().position, transform.position);

        // A bad frame leaves the last applied transform on the node
        let before = *engine.head_mesh().unwrap();
        assert!(engine.fit_mesh(&camera, None).is_none());
        assert_eq!(*engine.head_mesh().unwrap(), before);
    }
}
