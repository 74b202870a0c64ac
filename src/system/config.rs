//! Picking configuration.

use crate::buffer::SymmetryPlane;
use crate::compute::BackendPreference;

/// Settings of a [`PickingSystem`](crate::system::PickingSystem).
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PickingConfig {
    /// Which compute backend to use.
    pub backend: BackendPreference,
    /// Exclude elements that only belong to back-facing faces from hit-testing.
    pub cull_backfaces: bool,
    /// Pick radius in pixels, used when the cursor input has none.
    pub hit_radius: f32,
    /// Faces with more vertices are ignored by visibility and hit-testing.
    pub max_face_vertices: u32,
    /// Mirror plane for symmetric editing.
    pub symmetry: Option<SymmetryPlane>,
}

impl Default for PickingConfig {
    fn default() -> Self {
        Self {
            backend: BackendPreference::Auto,
            cull_backfaces: false,
            hit_radius: 8.0,
            max_face_vertices: 64,
            symmetry: None,
        }
    }
}

impl PickingConfig {
    /// Sets the backend preference.
    pub fn with_backend(mut self, backend: BackendPreference) -> Self {
        self.backend = backend;
        self
    }

    /// Enables or disables back-face culling.
    pub fn with_cull_backfaces(mut self, cull_backfaces: bool) -> Self {
        self.cull_backfaces = cull_backfaces;
        self
    }

    /// Sets the default pick radius, in pixels.
    pub fn with_hit_radius(mut self, hit_radius: f32) -> Self {
        self.hit_radius = hit_radius;
        self
    }

    /// Sets the largest pickable face.
    pub fn with_max_face_vertices(mut self, max_face_vertices: u32) -> Self {
        self.max_face_vertices = max_face_vertices;
        self
    }

    /// Sets the symmetry plane.
    pub fn with_symmetry(mut self, symmetry: Option<SymmetryPlane>) -> Self {
        self.symmetry = symmetry;
        self
    }
}
