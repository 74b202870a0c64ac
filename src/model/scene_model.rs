//! CPU-side description of the meshes being edited.

use glamx::Vec3;

/// What a mesh of the scene is used for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum MeshKind {
    /// A regular, drawable and pickable mesh.
    #[default]
    Regular,
    /// A placeholder (e.g. a bone) that owns a mesh range but no geometry.
    Bone,
}

/// One editable polygon mesh.
///
/// Faces are lists of indices into `positions`, wound counter-clockwise when
/// seen from their front side. Aux lines are standalone segments that do not
/// belong to any face.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EditMesh {
    /// Index of the model this mesh belongs to.
    pub model_index: usize,
    /// Whether this mesh contributes geometry.
    pub kind: MeshKind,
    /// Vertex positions, in world space.
    pub positions: Vec<Vec3>,
    /// Polygons, as vertex index lists.
    pub faces: Vec<Vec<u32>>,
    /// Standalone two-point polylines.
    pub aux_lines: Vec<[u32; 2]>,
}

impl EditMesh {
    /// Creates a regular mesh owned by the model `model_index`.
    pub fn new(model_index: usize, positions: Vec<Vec3>, faces: Vec<Vec<u32>>) -> Self {
        Self {
            model_index,
            kind: MeshKind::Regular,
            positions,
            faces,
            aux_lines: Vec::new(),
        }
    }

    /// Creates a bone placeholder owned by the model `model_index`.
    pub fn bone(model_index: usize) -> Self {
        Self {
            model_index,
            kind: MeshKind::Bone,
            ..Default::default()
        }
    }

    /// Sets the aux lines of this mesh.
    pub fn with_aux_lines(mut self, aux_lines: Vec<[u32; 2]>) -> Self {
        self.aux_lines = aux_lines;
        self
    }

    /// Does this mesh contribute vertices, lines and faces?
    #[inline]
    pub fn is_drawable(&self) -> bool {
        self.kind == MeshKind::Regular
    }
}

/// The ordered list of meshes of the active scene.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SceneModel {
    /// All meshes, in insertion order.
    pub meshes: Vec<EditMesh>,
}

impl SceneModel {
    /// Creates a scene from its meshes.
    pub fn new(meshes: Vec<EditMesh>) -> Self {
        Self { meshes }
    }

    /// Number of meshes, drawable or not.
    #[inline]
    pub fn len(&self) -> usize {
        self.meshes.len()
    }

    /// Returns `true` if the scene has no mesh at all.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.meshes.is_empty()
    }
}
