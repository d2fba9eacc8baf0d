//! Semantic landmark indices for the supported detector topologies.
//!
//! The placement code never touches raw indices; it asks a topology table for
//! "the nose tip" or "the ring anchor". Supporting a different detector only
//! needs a new table.

use serde::{Deserialize, Serialize};

/// Named landmark indices of a face mesh detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaceTopology {
    /// Number of landmarks a complete face set carries.
    pub point_count: usize,
    pub nose_tip: usize,
    /// Face boundary at the left ear / temple (image left).
    pub left_boundary: usize,
    /// Face boundary at the right ear / temple (image right).
    pub right_boundary: usize,
    pub chin: usize,
    /// Forehead candidates, most preferred first.
    pub forehead: [usize; 3],
}

/// Named landmark indices of a hand detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandTopology {
    pub point_count: usize,
    /// Ring anchor candidates: index fingertip, then middle finger base.
    pub ring_anchor: [usize; 2],
}

/// MediaPipe Face Mesh (468 landmarks).
pub const MEDIAPIPE_FACE: FaceTopology = FaceTopology {
    point_count: 468,
    nose_tip: 1,
    left_boundary: 234,
    right_boundary: 454,
    chin: 152,
    forehead: [10, 9, 1],
};

/// MediaPipe Hands (21 landmarks).
pub const MEDIAPIPE_HAND: HandTopology = HandTopology {
    point_count: 21,
    ring_anchor: [8, 9],
};

impl Default for FaceTopology {
    fn default() -> Self {
        MEDIAPIPE_FACE
    }
}

impl Default for HandTopology {
    fn default() -> Self {
        MEDIAPIPE_HAND
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mediapipe_indices_fit_point_count() {
        let face = MEDIAPIPE_FACE;
        for idx in [face.nose_tip, face.left_boundary, face.right_boundary, face.chin]
            .into_iter()
            .chain(face.forehead)
        {
            assert!(idx < face.point_count);
        }

        for idx in MEDIAPIPE_HAND.ring_anchor {
            assert!(idx < MEDIAPIPE_HAND.point_count);
        }
    }
}
