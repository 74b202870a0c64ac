//! Sequential CPU implementation of the picking passes.

use crate::buffer::{Adjacency, ScreenPoint};
use crate::compute::backend::{
    BackendKind, ComputeBackend, FlagArrays, FlagArraysMut, HitQuery, HitResult, PendingUploads,
    PointSet, ProjectionParams, SceneArrays,
};
use crate::compute::geometry::{self, Candidate};
use crate::error::BackendError;
use crate::flags::ElementFlags;
use crate::model::SelectMode;

/// CPU backend, always available.
#[derive(Default)]
pub struct SoftwareBackend {
    polygon: Vec<ScreenPoint>,
}

impl SoftwareBackend {
    /// Creates a software backend.
    pub fn new() -> Self {
        Self::default()
    }

    fn propagate_culling(adjacency: &Adjacency, face_flags: &[u32], flags: &mut [u32]) {
        for (i, word) in flags.iter_mut().enumerate() {
            let faces = adjacency.neighbors(i);
            let culled = !faces.is_empty()
                && faces.iter().all(|f| {
                    face_flags
                        .get(*f as usize)
                        .is_some_and(|w| ElementFlags::from_word(*w).contains(ElementFlags::CULLED))
                });
            let mut f = ElementFlags::from_word(*word);
            f.set(ElementFlags::CULLED, culled);
            *word = f.bits();
        }
    }

    fn hit_vertices(screen: &[ScreenPoint], flags: &[u32], query: &HitQuery) -> Candidate {
        let mut best = Candidate::NONE;
        for (i, (p, word)) in screen.iter().zip(flags).enumerate() {
            if !p.is_valid() || ElementFlags::from_word(*word).is_pick_excluded(query.cull_backfaces) {
                continue;
            }
            let dist = (glamx::Vec2::new(p.x(), p.y()) - query.cursor).length();
            if dist <= query.radius {
                best.offer(p.depth(), i as u32);
            }
        }
        best
    }

    fn hit_lines(
        scene: &SceneArrays<'_>,
        screen: &[ScreenPoint],
        flags: &[u32],
        query: &HitQuery,
    ) -> Candidate {
        let allow_edges = query.mode.contains(SelectMode::EDGE);
        let allow_aux = query.mode.contains(SelectMode::LINE);
        let mut best = Candidate::NONE;

        for (i, (line, word)) in scene.lines.iter().zip(flags).enumerate() {
            let allowed = if line.is_aux() { allow_aux } else { allow_edges };
            if !allowed || ElementFlags::from_word(*word).is_pick_excluded(query.cull_backfaces) {
                continue;
            }
            let (Some(a), Some(b)) = (screen.get(line.v1 as usize), screen.get(line.v2 as usize))
            else {
                continue;
            };
            if !a.is_valid() || !b.is_valid() {
                continue;
            }

            let (dist, t) = geometry::point_segment_distance(
                query.cursor,
                glamx::Vec2::new(a.x(), a.y()),
                glamx::Vec2::new(b.x(), b.y()),
            );
            if dist <= query.radius {
                best.offer(a.depth() + (b.depth() - a.depth()) * t, i as u32);
            }
        }
        best
    }

    fn hit_faces(
        &mut self,
        scene: &SceneArrays<'_>,
        screen: &[ScreenPoint],
        flags: &[u32],
        query: &HitQuery,
    ) -> Candidate {
        let mut best = Candidate::NONE;

        for (i, (face, word)) in scene.faces.iter().zip(flags).enumerate() {
            if face.is_degenerate(query.max_face_vertices)
                || ElementFlags::from_word(*word).is_pick_excluded(query.cull_backfaces)
                || !geometry::gather_polygon(face, scene.indices, screen, &mut self.polygon)
            {
                continue;
            }
            if geometry::point_in_polygon(query.cursor, &self.polygon) {
                best.offer(geometry::polygon_depth_at(query.cursor, &self.polygon), i as u32);
            }
        }
        best
    }
}

impl ComputeBackend for SoftwareBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Software
    }

    fn project(
        &mut self,
        scene: &SceneArrays<'_>,
        _uploads: &mut PendingUploads,
        set: PointSet,
        params: &ProjectionParams,
        out: &mut [ScreenPoint],
    ) -> Result<(), BackendError> {
        let vertices = match set {
            PointSet::Primary => scene.vertices,
            PointSet::Mirror => scene.mirror_vertices,
        };
        let viewport = params.viewport.to_vec4();

        for (out, vertex) in out.iter_mut().zip(vertices) {
            *out = geometry::project_point(&params.view_projection, viewport, vertex.position());
        }
        Ok(())
    }

    fn update_visibility(
        &mut self,
        scene: &SceneArrays<'_>,
        _uploads: &mut PendingUploads,
        screen: &[ScreenPoint],
        flags: FlagArraysMut<'_>,
        max_face_vertices: u32,
    ) -> Result<(), BackendError> {
        for (face, word) in scene.faces.iter().zip(flags.face.iter_mut()) {
            let culled = !face.is_degenerate(max_face_vertices)
                && geometry::gather_polygon(face, scene.indices, screen, &mut self.polygon)
                && geometry::is_back_facing(&self.polygon);
            let mut f = ElementFlags::from_word(*word);
            f.set(ElementFlags::CULLED, culled);
            *word = f.bits();
        }

        Self::propagate_culling(scene.vertex_faces, &*flags.face, flags.vertex);
        Self::propagate_culling(scene.line_faces, &*flags.face, flags.line);
        Ok(())
    }

    fn hit_test(
        &mut self,
        scene: &SceneArrays<'_>,
        _uploads: &mut PendingUploads,
        screen: &[ScreenPoint],
        flags: FlagArrays<'_>,
        query: &HitQuery,
    ) -> Result<HitResult, BackendError> {
        let mut result = HitResult::default();
        if scene.vertices.is_empty() {
            return Ok(result);
        }

        if query.mode.contains(SelectMode::VERTEX) {
            result.vertex = Self::hit_vertices(screen, flags.vertex, query).hit();
        }
        if query.mode.intersects(SelectMode::EDGE | SelectMode::LINE) {
            result.line = Self::hit_lines(scene, screen, flags.line, query).hit();
        }
        if query.mode.contains(SelectMode::FACE) {
            result.face = self.hit_faces(scene, screen, flags.face, query).hit();
        }
        Ok(result)
    }
}
