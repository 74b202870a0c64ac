//! Flat element records shared by every mesh of the scene.
//!
//! Layouts must match the structs of `picking.wgsl`.

use bytemuck::{Pod, Zeroable};
use glamx::{Vec3, Vec4};

/// The type used for element indices.
pub type ElementIndex = u32;

/// Sentinel used on the GPU for "no element".
pub const NO_HIT: ElementIndex = u32::MAX;

/// The three element arrays that can be indexed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ElementKind {
    /// Vertex array.
    Vertex,
    /// Line array (face edges and aux lines).
    Line,
    /// Face array.
    Face,
}

/// A vertex position and normal.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    /// World space position.
    pub position: [f32; 3],
    /// Unit normal, zero for vertices used by no face.
    pub normal: [f32; 3],
}

impl Vertex {
    /// A vertex at `position` with no normal yet.
    #[inline]
    pub fn at(position: Vec3) -> Self {
        Self {
            position: position.to_array(),
            normal: [0.0; 3],
        }
    }

    /// The position as a vector.
    #[inline]
    pub fn position(&self) -> Vec3 {
        Vec3::from_array(self.position)
    }
}

/// A segment between two global vertex indices.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct Line {
    /// First end point.
    pub v1: ElementIndex,
    /// Second end point.
    pub v2: ElementIndex,
    /// Global index of the first face using this edge, [`NO_HIT`] for aux lines.
    pub owner_face: ElementIndex,
    /// 1 for aux lines, 0 for face edges.
    pub is_auxiliary: u32,
}

impl Line {
    /// Is this an aux line?
    #[inline]
    pub fn is_aux(&self) -> bool {
        self.is_auxiliary != 0
    }
}

/// A polygon, stored as a triangle fan in the index array.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct Face {
    /// First entry of the fan in the index array.
    pub index_start: u32,
    /// Number of polygon vertices (the fan has `vertex_count - 2` triangles).
    pub vertex_count: u32,
}

impl Face {
    /// Number of index entries used by the fan.
    #[inline]
    pub fn index_count(&self) -> u32 {
        self.vertex_count.saturating_sub(2) * 3
    }

    /// Index-array position of the `k`-th polygon vertex.
    ///
    /// The fan `(0, 1, 2), (0, 2, 3), …` lists the polygon as its first
    /// triangle followed by the last corner of every other triangle.
    #[inline]
    pub fn polygon_slot(&self, k: u32) -> u32 {
        if k < 2 {
            self.index_start + k
        } else {
            self.index_start + 3 * (k - 2) + 2
        }
    }

    /// Is this face usable for visibility and hit-testing?
    #[inline]
    pub fn is_degenerate(&self, max_vertices: u32) -> bool {
        self.vertex_count < 3 || self.vertex_count > max_vertices
    }
}

/// Per-mesh ranges into every element array.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct MeshRange {
    /// First vertex.
    pub vertex_start: u32,
    /// Number of vertices.
    pub vertex_count: u32,
    /// First line.
    pub line_start: u32,
    /// Number of lines.
    pub line_count: u32,
    /// First face.
    pub face_start: u32,
    /// Number of faces.
    pub face_count: u32,
    /// Index of the owning model.
    pub model_index: u32,
}

impl MeshRange {
    /// `(start, count)` of the range of `kind`.
    #[inline]
    pub fn span(&self, kind: ElementKind) -> (u32, u32) {
        match kind {
            ElementKind::Vertex => (self.vertex_start, self.vertex_count),
            ElementKind::Line => (self.line_start, self.line_count),
            ElementKind::Face => (self.face_start, self.face_count),
        }
    }

    /// The global index range of `kind`.
    #[inline]
    pub fn range(&self, kind: ElementKind) -> std::ops::Range<u32> {
        let (start, count) = self.span(kind);
        start..start + count
    }
}

/// Projected vertex: `(screen x, screen y, NDC depth, validity)`.
///
/// `validity` is 0 for points behind the camera.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct ScreenPoint(pub [f32; 4]);

impl ScreenPoint {
    /// Screen coordinate written for points behind the camera.
    pub const OFFSCREEN: f32 = -1.0e9;

    /// The point used for vertices behind the camera.
    pub const INVALID: ScreenPoint = ScreenPoint([Self::OFFSCREEN, Self::OFFSCREEN, 1.0, 0.0]);

    /// A valid projected point.
    #[inline]
    pub fn new(x: f32, y: f32, depth: f32) -> Self {
        ScreenPoint([x, y, depth, 1.0])
    }

    /// Screen x, in pixels.
    #[inline]
    pub fn x(&self) -> f32 {
        self.0[0]
    }

    /// Screen y, in pixels.
    #[inline]
    pub fn y(&self) -> f32 {
        self.0[1]
    }

    /// NDC depth.
    #[inline]
    pub fn depth(&self) -> f32 {
        self.0[2]
    }

    /// Is the point in front of the camera?
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.0[3] != 0.0
    }

    /// All four components.
    #[inline]
    pub fn to_vec4(self) -> Vec4 {
        Vec4::from_array(self.0)
    }
}

/// Compressed adjacency lists: the neighbors of element `i` are
/// `items[offsets[i]..offsets[i + 1]]`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Adjacency {
    /// `len + 1` offsets into `items`.
    pub offsets: Vec<u32>,
    /// Concatenated neighbor lists.
    pub items: Vec<u32>,
}

impl Adjacency {
    /// Builds the lists from `(element, neighbor)` pairs, for `len` elements.
    pub fn from_pairs(len: usize, pairs: &[(u32, u32)]) -> Self {
        let mut offsets = vec![0u32; len + 1];
        for (element, _) in pairs {
            offsets[*element as usize + 1] += 1;
        }
        for i in 0..len {
            offsets[i + 1] += offsets[i];
        }

        let mut cursor = offsets.clone();
        let mut items = vec![0u32; pairs.len()];
        for (element, neighbor) in pairs {
            let slot = &mut cursor[*element as usize];
            items[*slot as usize] = *neighbor;
            *slot += 1;
        }

        Self { offsets, items }
    }

    /// The neighbors of `element`.
    #[inline]
    pub fn neighbors(&self, element: usize) -> &[u32] {
        match (self.offsets.get(element), self.offsets.get(element + 1)) {
            (Some(start), Some(end)) => &self.items[*start as usize..*end as usize],
            _ => &[],
        }
    }
}
