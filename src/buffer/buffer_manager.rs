use crate::buffer::{
    Adjacency, ElementIndex, ElementKind, Face, Line, MeshRange, ScreenPoint, SymmetryPlane,
    Vertex, NO_HIT,
};
use crate::compute::{
    BackendKind, ComputeBackend, FlagArrays, FlagArraysMut, HitQuery, HitResult, PendingUploads,
    PointSet, ProjectionParams, SceneArrays, SoftwareBackend,
};
use crate::error::BackendError;
use crate::flags::{ElementFlags, FlagManager};
use crate::model::{EdgeKey, EditMesh, MeshSelection, SceneModel, SelectionState};
use glamx::Vec3;
use std::collections::HashMap;
use std::ops::Range;

// Borrows the element arrays of a `BufferManager` field by field, so that the
// backend and the output arrays can be borrowed mutably at the same time.
macro_rules! scene_arrays {
    ($this: ident) => {
        SceneArrays {
            vertices: &$this.vertices,
            mirror_vertices: &$this.mirror_vertices,
            lines: &$this.lines,
            faces: &$this.faces,
            indices: &$this.indices,
            vertex_faces: &$this.vertex_faces,
            line_faces: &$this.line_faces,
        }
    };
}

/// Owner of the flattened element arrays of every mesh of the scene.
///
/// Each mesh contributes a contiguous range of every array, described by its
/// [`MeshRange`]. Array lengths only change in
/// [`build_from_model`](Self::build_from_model); every other operation
/// mutates the existing storage in place.
///
/// The compute passes run on the configured [`ComputeBackend`]. If it fails,
/// the manager switches to the [`SoftwareBackend`] for good and runs the pass
/// again, so that callers never see an error.
pub struct BufferManager {
    vertices: Vec<Vertex>,
    lines: Vec<Line>,
    faces: Vec<Face>,
    indices: Vec<u32>,
    ranges: Vec<MeshRange>,
    /// Global index of the first aux line of each mesh.
    aux_line_starts: Vec<u32>,
    /// Global line index of every face edge, per mesh.
    edge_lines: Vec<HashMap<EdgeKey, u32>>,
    vertex_faces: Adjacency,
    line_faces: Adjacency,

    vertex_flags: Vec<u32>,
    line_flags: Vec<u32>,
    face_flags: Vec<u32>,
    flag_manager: FlagManager,
    /// Selection the selection bits currently reflect.
    applied_selection: SelectionState,

    screen: Vec<ScreenPoint>,
    symmetry: Option<SymmetryPlane>,
    mirror_vertices: Vec<Vertex>,
    mirror_screen: Vec<ScreenPoint>,

    backend: Box<dyn ComputeBackend>,
    uploads: PendingUploads,
    max_face_vertices: u32,
}

impl BufferManager {
    /// Creates an empty manager running its passes on `backend`.
    pub fn new(backend: Box<dyn ComputeBackend>, max_face_vertices: u32) -> Self {
        Self {
            vertices: Vec::new(),
            lines: Vec::new(),
            faces: Vec::new(),
            indices: Vec::new(),
            ranges: Vec::new(),
            aux_line_starts: Vec::new(),
            edge_lines: Vec::new(),
            vertex_faces: Adjacency::from_pairs(0, &[]),
            line_faces: Adjacency::from_pairs(0, &[]),
            vertex_flags: Vec::new(),
            line_flags: Vec::new(),
            face_flags: Vec::new(),
            flag_manager: FlagManager::new(),
            applied_selection: SelectionState::default(),
            screen: Vec::new(),
            symmetry: None,
            mirror_vertices: Vec::new(),
            mirror_screen: Vec::new(),
            backend,
            uploads: PendingUploads::all(),
            max_face_vertices,
        }
    }

    /// Creates an empty manager on the software backend.
    pub fn software(max_face_vertices: u32) -> Self {
        Self::new(Box::new(SoftwareBackend::new()), max_face_vertices)
    }

    /*
     *
     * Rebuild and partial updates.
     *
     */
    /// Rebuilds every array from `model`.
    ///
    /// `None` clears everything. Hierarchy and selection flags are recomputed
    /// from scratch; hover and hidden bits are reset. Screen positions are
    /// reset to [`ScreenPoint::INVALID`] until the next projection.
    pub fn build_from_model(&mut self, model: Option<&SceneModel>, active_model: Option<usize>) {
        self.vertices.clear();
        self.lines.clear();
        self.faces.clear();
        self.indices.clear();
        self.ranges.clear();
        self.aux_line_starts.clear();
        self.edge_lines.clear();

        let mut vertex_face_pairs = Vec::new();
        let mut line_face_pairs = Vec::new();

        for mesh in model.map(|m| &m.meshes[..]).unwrap_or_default() {
            let range = self.append_mesh(mesh, &mut vertex_face_pairs, &mut line_face_pairs);
            self.ranges.push(range);
        }

        self.vertex_faces = Adjacency::from_pairs(self.vertices.len(), &vertex_face_pairs);
        self.line_faces = Adjacency::from_pairs(self.lines.len(), &line_face_pairs);

        for range in self.ranges.clone() {
            self.recompute_normals(&range);
        }

        self.vertex_flags = vec![0; self.vertices.len()];
        self.line_flags = vec![0; self.lines.len()];
        self.face_flags = vec![0; self.faces.len()];
        self.flag_manager.set_active_model(active_model);
        self.apply_hierarchy();
        self.recompute_selection_bits();

        self.screen = vec![ScreenPoint::INVALID; self.vertices.len()];
        self.refresh_mirror();
        self.uploads = PendingUploads::all();

        log::debug!(
            "rebuilt picking buffers: {} meshes, {} vertices, {} lines, {} faces",
            self.ranges.len(),
            self.vertices.len(),
            self.lines.len(),
            self.faces.len()
        );
    }

    fn append_mesh(
        &mut self,
        mesh: &EditMesh,
        vertex_face_pairs: &mut Vec<(u32, u32)>,
        line_face_pairs: &mut Vec<(u32, u32)>,
    ) -> MeshRange {
        let mut range = MeshRange {
            vertex_start: self.vertices.len() as u32,
            line_start: self.lines.len() as u32,
            face_start: self.faces.len() as u32,
            model_index: mesh.model_index as u32,
            ..Default::default()
        };
        let mut edges = HashMap::new();

        if !mesh.is_drawable() {
            self.aux_line_starts.push(range.line_start);
            self.edge_lines.push(edges);
            return range;
        }

        let vertex_start = range.vertex_start;
        let vertex_count = mesh.positions.len() as u32;
        self.vertices
            .extend(mesh.positions.iter().map(|p| Vertex::at(*p)));

        for polygon in &mesh.faces {
            let face_index = self.faces.len() as u32;
            let foreign = polygon.iter().any(|v| *v >= vertex_count);
            if foreign || distinct_corners(polygon) < 3 {
                if foreign {
                    log::debug!("face {face_index} references a vertex out of its mesh, skipped");
                }
                self.faces.push(Face {
                    index_start: self.indices.len() as u32,
                    vertex_count: 0,
                });
                continue;
            }

            let face = Face {
                index_start: self.indices.len() as u32,
                vertex_count: polygon.len() as u32,
            };
            for k in 1..polygon.len().saturating_sub(1) {
                self.indices.extend([
                    vertex_start + polygon[0],
                    vertex_start + polygon[k],
                    vertex_start + polygon[k + 1],
                ]);
            }
            self.faces.push(face);

            for (k, v) in polygon.iter().enumerate() {
                if !polygon[..k].contains(v) {
                    vertex_face_pairs.push((vertex_start + v, face_index));
                }
            }

            for k in 0..polygon.len() {
                let (a, b) = (polygon[k], polygon[(k + 1) % polygon.len()]);
                if a == b {
                    continue;
                }
                let line = *edges.entry(EdgeKey::new(a, b)).or_insert_with(|| {
                    self.lines.push(Line {
                        v1: vertex_start + a,
                        v2: vertex_start + b,
                        owner_face: face_index,
                        is_auxiliary: 0,
                    });
                    self.lines.len() as u32 - 1
                });
                line_face_pairs.push((line, face_index));
            }
        }

        let aux_start = self.lines.len() as u32;
        for [a, b] in &mesh.aux_lines {
            let valid = *a < vertex_count && *b < vertex_count;
            self.lines.push(Line {
                v1: if valid { vertex_start + a } else { NO_HIT },
                v2: if valid { vertex_start + b } else { NO_HIT },
                owner_face: NO_HIT,
                is_auxiliary: 1,
            });
        }

        range.vertex_count = vertex_count;
        range.line_count = self.lines.len() as u32 - range.line_start;
        range.face_count = self.faces.len() as u32 - range.face_start;
        self.aux_line_starts.push(aux_start);
        self.edge_lines.push(edges);
        range
    }

    /// Overwrites the positions of mesh `mesh_index` with those of `mesh`.
    ///
    /// Returns `false`, leaving everything untouched, if the vertex count of
    /// `mesh` does not match its range (a topology rebuild is needed).
    pub fn update_positions(&mut self, mesh: &EditMesh, mesh_index: usize) -> bool {
        let Some(range) = self.ranges.get(mesh_index).copied() else {
            return false;
        };
        if range.vertex_count == 0 && !mesh.is_drawable() {
            return true;
        }
        if mesh.positions.len() != range.vertex_count as usize || !mesh.is_drawable() {
            log::debug!(
                "mesh {mesh_index} has {} positions for a range of {}",
                mesh.positions.len(),
                range.vertex_count
            );
            return false;
        }

        let slots = range.range(ElementKind::Vertex);
        let slots = slots.start as usize..slots.end as usize;
        for (vertex, position) in self.vertices[slots.clone()].iter_mut().zip(&mesh.positions) {
            vertex.position = position.to_array();
        }
        self.recompute_normals(&range);

        if let Some(plane) = self.symmetry {
            plane.mirror_vertices(&self.vertices, &mut self.mirror_vertices, slots.clone());
            self.uploads.mirror = true;
        }
        self.uploads.add_positions(slots);
        true
    }

    /// Overwrites the positions of every mesh.
    ///
    /// Returns `false` if at least one mesh did not match its range.
    pub fn update_all_positions(&mut self, meshes: &[EditMesh]) -> bool {
        let mut all = meshes.len() == self.ranges.len();
        for (mesh_index, mesh) in meshes.iter().enumerate() {
            all &= self.update_positions(mesh, mesh_index);
        }
        all
    }

    fn recompute_normals(&mut self, range: &MeshRange) {
        let vertices = range.range(ElementKind::Vertex);
        let base = vertices.start as usize;
        let mut normals = vec![Vec3::ZERO; vertices.len()];

        for face in &self.faces[range.face_start as usize..(range.face_start + range.face_count) as usize] {
            let start = face.index_start as usize;
            let fan = &self.indices[start..start + face.index_count() as usize];
            for triangle in fan.chunks_exact(3) {
                let [a, b, c] = [triangle[0], triangle[1], triangle[2]].map(|i| i as usize);
                let (pa, pb, pc) = (
                    self.vertices[a].position(),
                    self.vertices[b].position(),
                    self.vertices[c].position(),
                );
                // Cross product length is twice the triangle area.
                let n = (pb - pa).cross(pc - pa);
                for i in [a, b, c] {
                    normals[i - base] += n;
                }
            }
        }

        for (vertex, normal) in self.vertices[vertices.start as usize..vertices.end as usize]
            .iter_mut()
            .zip(normals)
        {
            vertex.normal = normal.normalize_or_zero().to_array();
        }
    }

    /*
     *
     * Symmetry.
     *
     */
    /// Enables or disables the mirror buffers.
    pub fn set_symmetry(&mut self, symmetry: Option<SymmetryPlane>) {
        if self.symmetry != symmetry {
            self.symmetry = symmetry;
            self.refresh_mirror();
        }
    }

    /// The current symmetry plane.
    pub fn symmetry(&self) -> Option<SymmetryPlane> {
        self.symmetry
    }

    fn refresh_mirror(&mut self) {
        match self.symmetry {
            Some(plane) => {
                plane.mirror_vertices(&self.vertices, &mut self.mirror_vertices, 0..self.vertices.len());
                self.mirror_screen = vec![ScreenPoint::INVALID; self.vertices.len()];
            }
            None => {
                self.mirror_vertices.clear();
                self.mirror_screen.clear();
            }
        }
        self.uploads.mirror = true;
    }

    /*
     *
     * Flags.
     *
     */
    fn apply_hierarchy(&mut self) {
        for (mesh_index, range) in self.ranges.iter().enumerate() {
            let hierarchy = self
                .flag_manager
                .compute_hierarchy_flags(range.model_index as usize, mesh_index);
            FlagManager::apply_hierarchy_flags(&mut self.vertex_flags, range.range(ElementKind::Vertex), hierarchy);
            FlagManager::apply_hierarchy_flags(&mut self.line_flags, range.range(ElementKind::Line), hierarchy);
            FlagManager::apply_hierarchy_flags(&mut self.face_flags, range.range(ElementKind::Face), hierarchy);
        }
        self.uploads.flags = true;
    }

    fn aux_range(&self, mesh_index: usize) -> Range<u32> {
        let end = self.ranges[mesh_index].range(ElementKind::Line).end;
        self.aux_line_starts[mesh_index]..end
    }

    /// Recomputes every selection bit from the applied selection.
    fn recompute_selection_bits(&mut self) {
        let empty = MeshSelection::default();
        for mesh_index in 0..self.ranges.len() {
            let range = self.ranges[mesh_index];
            let aux = self.aux_range(mesh_index);
            let selected = self.applied_selection.mesh(mesh_index).unwrap_or(&empty);

            FlagManager::recompute_selection_flags(
                &mut self.vertex_flags,
                range.range(ElementKind::Vertex),
                &selected.vertices,
                ElementFlags::VERTEX_SELECTED,
            );
            FlagManager::recompute_selection_flags(
                &mut self.face_flags,
                range.range(ElementKind::Face),
                &selected.faces,
                ElementFlags::FACE_SELECTED,
            );
            FlagManager::recompute_selection_flags(
                &mut self.line_flags,
                aux,
                &selected.lines,
                ElementFlags::LINE_SELECTED,
            );

            let lines = range.range(ElementKind::Line);
            for word in &mut self.line_flags[lines.start as usize..lines.end as usize] {
                *word &= !ElementFlags::EDGE_SELECTED.bits();
            }
            for key in &selected.edges {
                if let Some(line) = self.edge_lines[mesh_index].get(key) {
                    self.line_flags[*line as usize] |= ElementFlags::EDGE_SELECTED.bits();
                }
            }
        }
        self.uploads.flags = true;
    }

    /// Makes every hierarchy and selection bit reflect `selection`, recomputing them from scratch.
    pub fn recompute_selection(&mut self, selection: &SelectionState) {
        self.flag_manager.sync_hierarchy(selection);
        self.applied_selection = selection.clone();
        self.apply_hierarchy();
        self.recompute_selection_bits();
    }

    /// Makes every hierarchy and selection bit reflect `selection`.
    ///
    /// Element bits are updated by diff against the previously applied
    /// selection; hierarchy bits are recomputed wholesale only if the active
    /// model, active mesh or selected meshes changed.
    pub fn update_selection(&mut self, selection: &SelectionState) {
        if self.flag_manager.sync_hierarchy(selection) {
            self.apply_hierarchy();
        }

        let empty = MeshSelection::default();
        for mesh_index in 0..self.ranges.len() {
            let old = self.applied_selection.mesh(mesh_index).unwrap_or(&empty);
            let new = selection.mesh(mesh_index).unwrap_or(&empty);
            if old == new {
                continue;
            }

            let range = self.ranges[mesh_index];
            FlagManager::update_vertex_selection_flags(
                &mut self.vertex_flags,
                range.range(ElementKind::Vertex),
                &old.vertices,
                &new.vertices,
            );
            FlagManager::update_selection_flags(
                &mut self.face_flags,
                range.range(ElementKind::Face),
                &old.faces,
                &new.faces,
                ElementFlags::FACE_SELECTED,
            );
            FlagManager::update_edge_selection_flags(
                &mut self.line_flags,
                &self.edge_lines[mesh_index],
                &old.edges,
                &new.edges,
            );
            FlagManager::update_selection_flags(
                &mut self.line_flags,
                self.aux_line_starts[mesh_index]..range.range(ElementKind::Line).end,
                &old.lines,
                &new.lines,
                ElementFlags::LINE_SELECTED,
            );
            self.uploads.flags = true;
        }

        self.applied_selection = selection.clone();
    }

    fn flags_mut(&mut self, kind: ElementKind) -> &mut Vec<u32> {
        match kind {
            ElementKind::Vertex => &mut self.vertex_flags,
            ElementKind::Line => &mut self.line_flags,
            ElementKind::Face => &mut self.face_flags,
        }
    }

    /// Makes `hovered` the only hovered element, of any kind.
    pub fn set_hover(&mut self, hovered: Option<(ElementKind, ElementIndex)>) {
        self.clear_hover();
        if let Some((kind, index)) = hovered {
            FlagManager::set_hover_flag(self.flags_mut(kind), Some(index));
        }
    }

    /// Clears the hover bit of every element.
    pub fn clear_hover(&mut self) {
        FlagManager::clear_all_hover_flags(&mut self.vertex_flags);
        FlagManager::clear_all_hover_flags(&mut self.line_flags);
        FlagManager::clear_all_hover_flags(&mut self.face_flags);
        self.uploads.flags = true;
    }

    /// Hides or shows one element. Returns `false` if `index` is out of bounds.
    pub fn set_hidden(&mut self, kind: ElementKind, index: ElementIndex, hidden: bool) -> bool {
        let found = FlagManager::set_hidden_flag(self.flags_mut(kind), index, hidden);
        self.uploads.flags |= found;
        found
    }

    /// Shows every hidden element.
    pub fn unhide_all(&mut self) {
        FlagManager::clear_all_hidden_flags(&mut self.vertex_flags);
        FlagManager::clear_all_hidden_flags(&mut self.line_flags);
        FlagManager::clear_all_hidden_flags(&mut self.face_flags);
        self.uploads.flags = true;
    }

    /*
     *
     * Compute passes.
     *
     */
    fn fall_back(&mut self, err: BackendError) {
        log::warn!(
            "{:?} picking backend failed, switching to software: {err}",
            self.backend.kind()
        );
        self.backend = Box::new(SoftwareBackend::new());
        self.uploads = PendingUploads::all();
    }

    fn try_reproject(&mut self, params: &ProjectionParams) -> Result<(), BackendError> {
        let scene = scene_arrays!(self);
        self.backend.project(
            &scene,
            &mut self.uploads,
            PointSet::Primary,
            params,
            &mut self.screen,
        )?;
        if self.symmetry.is_some() {
            self.backend.project(
                &scene,
                &mut self.uploads,
                PointSet::Mirror,
                params,
                &mut self.mirror_screen,
            )?;
        }
        Ok(())
    }

    /// Projects every vertex, and every mirror vertex if symmetry is enabled.
    pub fn reproject(&mut self, params: &ProjectionParams) {
        if let Err(err) = self.try_reproject(params) {
            self.fall_back(err);
            if let Err(err) = self.try_reproject(params) {
                log::error!("software projection failed: {err}");
            }
        }
    }

    fn try_update_visibility(&mut self) -> Result<(), BackendError> {
        let scene = scene_arrays!(self);
        let flags = FlagArraysMut {
            vertex: &mut self.vertex_flags,
            line: &mut self.line_flags,
            face: &mut self.face_flags,
        };
        self.backend.update_visibility(
            &scene,
            &mut self.uploads,
            &self.screen,
            flags,
            self.max_face_vertices,
        )
    }

    /// Recomputes the culled bit of every face, then of every vertex and line.
    pub fn update_visibility(&mut self) {
        if let Err(err) = self.try_update_visibility() {
            self.fall_back(err);
            if let Err(err) = self.try_update_visibility() {
                log::error!("software visibility pass failed: {err}");
            }
        }
    }

    fn try_hit_test(&mut self, query: &HitQuery) -> Result<HitResult, BackendError> {
        let scene = scene_arrays!(self);
        let flags = FlagArrays {
            vertex: &self.vertex_flags,
            line: &self.line_flags,
            face: &self.face_flags,
        };
        self.backend
            .hit_test(&scene, &mut self.uploads, &self.screen, flags, query)
    }

    /// Nearest vertex, line and face under the cursor, as global indices.
    pub fn hit_test(&mut self, query: &HitQuery) -> HitResult {
        let query = HitQuery {
            max_face_vertices: self.max_face_vertices,
            ..*query
        };
        match self.try_hit_test(&query) {
            Ok(result) => result,
            Err(err) => {
                self.fall_back(err);
                self.try_hit_test(&query).unwrap_or_else(|err| {
                    log::error!("software hit-test failed: {err}");
                    HitResult::default()
                })
            }
        }
    }

    /// Which backend runs the passes.
    pub fn backend_kind(&self) -> BackendKind {
        self.backend.kind()
    }

    /// Faces with more vertices are skipped by visibility and hit-testing.
    pub fn max_face_vertices(&self) -> u32 {
        self.max_face_vertices
    }

    /*
     *
     * Index translation.
     *
     */
    /// The mesh owning global element `index` and its index within that mesh.
    pub fn global_to_local(&self, kind: ElementKind, index: ElementIndex) -> Option<(usize, u32)> {
        // Ranges are sorted and contiguous, so their ends are non-decreasing.
        let mesh = self.ranges.partition_point(|r| {
            let (start, count) = r.span(kind);
            start + count <= index
        });
        let (start, count) = self.ranges.get(mesh)?.span(kind);
        (index >= start && index < start + count).then(|| (mesh, index - start))
    }

    /// The global index of element `local` of mesh `mesh_index`.
    pub fn local_to_global(&self, kind: ElementKind, mesh_index: usize, local: u32) -> Option<ElementIndex> {
        let (start, count) = self.ranges.get(mesh_index)?.span(kind);
        (local < count).then(|| start + local)
    }

    /// The global line index of edge `key` of mesh `mesh_index`.
    pub fn edge_line(&self, mesh_index: usize, key: EdgeKey) -> Option<ElementIndex> {
        self.edge_lines.get(mesh_index)?.get(&key).copied()
    }

    /// The global line index of aux line `local` of mesh `mesh_index`.
    pub fn aux_line(&self, mesh_index: usize, local: u32) -> Option<ElementIndex> {
        let start = *self.aux_line_starts.get(mesh_index)?;
        let global = start.checked_add(local)?;
        (global < self.aux_range(mesh_index).end).then_some(global)
    }

    /*
     *
     * Read-only accessors.
     *
     */
    /// One range per mesh, in mesh order.
    pub fn mesh_ranges(&self) -> &[MeshRange] {
        &self.ranges
    }

    /// Number of elements of `kind`.
    pub fn element_count(&self, kind: ElementKind) -> usize {
        match kind {
            ElementKind::Vertex => self.vertices.len(),
            ElementKind::Line => self.lines.len(),
            ElementKind::Face => self.faces.len(),
        }
    }

    /// Every vertex of the scene.
    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    /// Every face edge and aux line of the scene.
    pub fn lines(&self) -> &[Line] {
        &self.lines
    }

    /// Every face of the scene.
    pub fn faces(&self) -> &[Face] {
        &self.faces
    }

    /// Triangle fan indices of the faces.
    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    /// The flag words of `kind`.
    pub fn flags(&self, kind: ElementKind) -> &[u32] {
        match kind {
            ElementKind::Vertex => &self.vertex_flags,
            ElementKind::Line => &self.line_flags,
            ElementKind::Face => &self.face_flags,
        }
    }

    /// Projected vertices, as of the last projection.
    pub fn screen_positions(&self) -> &[ScreenPoint] {
        &self.screen
    }

    /// Reflected vertices, empty when symmetry is off.
    pub fn mirror_vertices(&self) -> &[Vertex] {
        &self.mirror_vertices
    }

    /// Projected reflected vertices, empty when symmetry is off.
    pub fn mirror_screen_positions(&self) -> &[ScreenPoint] {
        &self.mirror_screen
    }
}

/// Number of distinct vertex indices of a polygon, capped at 3.
fn distinct_corners(polygon: &[u32]) -> usize {
    let mut seen = [u32::MAX; 3];
    let mut count = 0;
    for v in polygon {
        if !seen[..count].contains(v) {
            seen[count] = *v;
            count += 1;
            if count == 3 {
                break;
            }
        }
    }
    count
}
