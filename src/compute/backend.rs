//! The contract shared by the software and hardware picking backends.

use crate::buffer::{Adjacency, ElementIndex, Face, Line, ScreenPoint, Vertex};
use crate::error::BackendError;
use crate::model::{SelectMode, Viewport};
use glamx::{Mat4, Vec2};
use std::ops::Range;

/// Which implementation runs the compute passes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BackendKind {
    /// Sequential CPU passes.
    Software,
    /// wgpu compute passes.
    Hardware,
}

/// Which backend the caller would like to use.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BackendPreference {
    /// Hardware if an adapter with compute support is found, software otherwise.
    #[default]
    Auto,
    /// Always software.
    Software,
    /// Hardware, still falling back to software if it is unavailable.
    Hardware,
}

/// The two sets of projected points.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PointSet {
    /// The scene vertices.
    Primary,
    /// Their reflection across the symmetry plane.
    Mirror,
}

/// Camera parameters of a projection pass.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ProjectionParams {
    /// World to clip space.
    pub view_projection: Mat4,
    /// Target rectangle in pixels.
    pub viewport: Viewport,
}

/// Cursor and filtering parameters of a hit-test pass.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HitQuery {
    /// Cursor position, in pixels.
    pub cursor: Vec2,
    /// Pick radius, in pixels.
    pub radius: f32,
    /// Kinds to test. Face edges need `EDGE`, aux lines need `LINE`.
    pub mode: SelectMode,
    /// Exclude culled elements.
    pub cull_backfaces: bool,
    /// Faces with more vertices are skipped.
    pub max_face_vertices: u32,
}

/// Nearest candidate of each kind, as global indices.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct HitResult {
    /// Nearest vertex within the radius.
    pub vertex: Option<ElementIndex>,
    /// Nearest face edge or aux line within the radius.
    pub line: Option<ElementIndex>,
    /// Nearest face containing the cursor.
    pub face: Option<ElementIndex>,
}

/// Read-only view over the element arrays of the scene.
#[derive(Clone, Copy)]
pub struct SceneArrays<'a> {
    /// Scene vertices.
    pub vertices: &'a [Vertex],
    /// Reflected vertices, empty when symmetry is off.
    pub mirror_vertices: &'a [Vertex],
    /// Face edges and aux lines.
    pub lines: &'a [Line],
    /// Faces.
    pub faces: &'a [Face],
    /// Triangle fan indices of the faces.
    pub indices: &'a [u32],
    /// Faces using each vertex.
    pub vertex_faces: &'a Adjacency,
    /// Faces using each line.
    pub line_faces: &'a Adjacency,
}

/// Mutable view over the three flag arrays.
pub struct FlagArraysMut<'a> {
    /// One word per vertex.
    pub vertex: &'a mut [u32],
    /// One word per line.
    pub line: &'a mut [u32],
    /// One word per face.
    pub face: &'a mut [u32],
}

/// Read-only view over the three flag arrays.
#[derive(Clone, Copy)]
pub struct FlagArrays<'a> {
    /// One word per vertex.
    pub vertex: &'a [u32],
    /// One word per line.
    pub line: &'a [u32],
    /// One word per face.
    pub face: &'a [u32],
}

/// CPU-side changes not yet seen by a backend holding its own copies.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PendingUploads {
    /// Array lengths or connectivity changed.
    pub topology: bool,
    /// Vertex positions changed in this range.
    pub positions: Option<Range<usize>>,
    /// Mirror positions changed.
    pub mirror: bool,
    /// Flag words changed.
    pub flags: bool,
}

impl PendingUploads {
    /// Everything must be uploaded again.
    pub fn all() -> Self {
        Self {
            topology: true,
            positions: None,
            mirror: true,
            flags: true,
        }
    }

    /// Adds `range` to the changed positions.
    pub fn add_positions(&mut self, range: Range<usize>) {
        self.positions = Some(match self.positions.take() {
            Some(r) => r.start.min(range.start)..r.end.max(range.end),
            None => range,
        });
    }
}

/// One implementation of the projection, visibility and hit-test passes.
///
/// Both implementations must produce the same results up to floating-point
/// tolerance. Passes run in the order projection, visibility, hit-test; a
/// backend may rely on the projection of the previous call being current.
pub trait ComputeBackend {
    /// Which implementation this is.
    fn kind(&self) -> BackendKind;

    /// Projects the vertices of `set` into `out`, one point per vertex.
    fn project(
        &mut self,
        scene: &SceneArrays<'_>,
        uploads: &mut PendingUploads,
        set: PointSet,
        params: &ProjectionParams,
        out: &mut [ScreenPoint],
    ) -> Result<(), BackendError>;

    /// Recomputes the `CULLED` bit of every face, then of every vertex and line.
    ///
    /// A vertex or line is culled only if every face using it is culled.
    fn update_visibility(
        &mut self,
        scene: &SceneArrays<'_>,
        uploads: &mut PendingUploads,
        screen: &[ScreenPoint],
        flags: FlagArraysMut<'_>,
        max_face_vertices: u32,
    ) -> Result<(), BackendError>;

    /// Finds the nearest vertex, line and face under the cursor.
    fn hit_test(
        &mut self,
        scene: &SceneArrays<'_>,
        uploads: &mut PendingUploads,
        screen: &[ScreenPoint],
        flags: FlagArrays<'_>,
        query: &HitQuery,
    ) -> Result<HitResult, BackendError>;
}
