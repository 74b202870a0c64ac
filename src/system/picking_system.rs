use crate::buffer::{BufferManager, ElementIndex, ElementKind, MeshRange, ScreenPoint, SymmetryPlane};
use crate::compute::{self, BackendKind, ComputeBackend, HitQuery, HitResult, ProjectionParams};
use crate::model::{CursorInput, SceneModel, SelectMode, SelectionState, ViewCamera};
use crate::system::PickingConfig;
use crate::update::{DirtyLevel, UpdateManager, UpdateStep, UpdateTarget};

/// Everything the editor provides for one frame.
#[derive(Clone, Copy, Debug)]
pub struct FrameInput<'a> {
    /// The meshes of the active scene, if any.
    pub model: Option<&'a SceneModel>,
    /// Current selection and selection mode.
    pub selection: &'a SelectionState,
    /// Current camera.
    pub camera: &'a ViewCamera,
    /// Current cursor.
    pub cursor: &'a CursorInput,
}

/// The element the cursor points at, after mode priority.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct HoveredElement {
    /// Kind of the element.
    pub kind: ElementKind,
    /// Global index of the element.
    pub index: ElementIndex,
}

/// Hit-test results of a frame, as global indices.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameHits {
    /// Nearest vertex under the cursor.
    pub vertex: Option<ElementIndex>,
    /// Nearest face edge or aux line under the cursor.
    pub line: Option<ElementIndex>,
    /// Nearest face under the cursor.
    pub face: Option<ElementIndex>,
    /// The winner: vertex, then line, then face, among the enabled kinds.
    pub hovered: Option<HoveredElement>,
}

impl FrameHits {
    /// Combines per-kind results by mode priority.
    ///
    /// Kinds disabled by `mode` are dropped even if they were hit.
    pub fn resolve(result: HitResult, mode: SelectMode) -> Self {
        let vertex = result.vertex.filter(|_| mode.contains(SelectMode::VERTEX));
        let line = result
            .line
            .filter(|_| mode.intersects(SelectMode::EDGE | SelectMode::LINE));
        let face = result.face.filter(|_| mode.contains(SelectMode::FACE));

        let hovered = vertex
            .map(|index| (ElementKind::Vertex, index))
            .or(line.map(|index| (ElementKind::Line, index)))
            .or(face.map(|index| (ElementKind::Face, index)))
            .map(|(kind, index)| HoveredElement { kind, index });

        Self {
            vertex,
            line,
            face,
            hovered,
        }
    }
}

/// Picking façade: owns the buffers and the scheduler for a whole editing session.
///
/// Editing tools call the `notify_*` methods after every change and the host
/// calls [`process_frame`](Self::process_frame) once per frame. Camera,
/// cursor and selection mode changes are detected by comparing with the
/// inputs of the previous frame.
pub struct PickingSystem {
    config: PickingConfig,
    buffers: BufferManager,
    updates: UpdateManager,
    camera: Option<ViewCamera>,
    cursor: Option<CursorInput>,
    mode: Option<SelectMode>,
    hits: FrameHits,
    last_steps: Vec<UpdateStep>,
}

impl PickingSystem {
    /// Creates a system, probing the backend requested by `config`.
    pub fn new(config: PickingConfig) -> Self {
        Self::with_backend(config, compute::create_backend(config.backend))
    }

    /// Creates a system running its passes on `backend`.
    pub fn with_backend(config: PickingConfig, backend: Box<dyn ComputeBackend>) -> Self {
        log::info!("picking system using the {:?} backend", backend.kind());
        let mut buffers = BufferManager::new(backend, config.max_face_vertices);
        buffers.set_symmetry(config.symmetry);

        let mut updates = UpdateManager::new();
        updates.mark_dirty(DirtyLevel::Topology);

        Self {
            config,
            buffers,
            updates,
            camera: None,
            cursor: None,
            mode: None,
            hits: FrameHits::default(),
            last_steps: Vec::new(),
        }
    }

    /// The configuration this system was created with, with the current symmetry.
    pub fn config(&self) -> &PickingConfig {
        &self.config
    }

    /*
     * Notifications.
     */
    /// Meshes were added or removed, or their element counts changed.
    pub fn notify_topology_changed(&mut self) {
        self.updates.mark_dirty(DirtyLevel::Topology);
    }

    /// Vertex positions changed.
    pub fn notify_transform_changed(&mut self) {
        self.updates.mark_dirty(DirtyLevel::Transform);
    }

    /// The selection or the active model/mesh changed.
    pub fn notify_selection_changed(&mut self) {
        self.updates.mark_dirty(DirtyLevel::Selection);
    }

    /// Opens a batch scope: nothing runs until the outermost scope is closed.
    pub fn begin_batch(&mut self) {
        self.updates.begin_batch();
    }

    /// Closes a batch scope.
    ///
    /// Returns the coalesced level the next [`process_frame`](Self::process_frame)
    /// will run, or [`DirtyLevel::None`] if scopes are still open.
    pub fn end_batch(&mut self) -> DirtyLevel {
        self.updates.end_batch()
    }

    /// Runs `f` inside a batch scope.
    pub fn batch<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> R {
        self.begin_batch();
        let result = f(self);
        let _ = self.end_batch();
        result
    }

    /// Hides or shows one element. Hidden elements are never hit.
    ///
    /// Returns `false` if `index` is out of bounds. Topology rebuilds show
    /// every element again.
    pub fn set_hidden(&mut self, kind: ElementKind, index: ElementIndex, hidden: bool) -> bool {
        let found = self.buffers.set_hidden(kind, index, hidden);
        if found {
            self.updates.mark_dirty(DirtyLevel::Mouse);
        }
        found
    }

    /// Shows every hidden element.
    pub fn unhide_all(&mut self) {
        self.buffers.unhide_all();
        self.updates.mark_dirty(DirtyLevel::Mouse);
    }

    /// Enables, disables or moves the symmetry plane.
    pub fn set_symmetry(&mut self, symmetry: Option<SymmetryPlane>) {
        if self.config.symmetry != symmetry {
            self.config.symmetry = symmetry;
            self.buffers.set_symmetry(symmetry);
            self.updates.mark_dirty(DirtyLevel::Transform);
        }
    }

    /*
     * Frame processing.
     */
    /// Runs the pending work and returns the hits under the cursor.
    ///
    /// Inside a batch scope nothing runs and the hits of the last processed
    /// frame are returned.
    pub fn process_frame(&mut self, input: &FrameInput<'_>) -> FrameHits {
        if self.camera.as_ref() != Some(input.camera) {
            self.camera = Some(*input.camera);
            self.updates.mark_dirty(DirtyLevel::Camera);
        }
        if self.cursor.as_ref() != Some(input.cursor) {
            self.cursor = Some(*input.cursor);
            self.updates.mark_dirty(DirtyLevel::Mouse);
        }
        if self.mode != Some(input.selection.mode) {
            self.mode = Some(input.selection.mode);
            self.updates.mark_dirty(DirtyLevel::Mouse);
        }

        let level = self.updates.process_updates();
        if level == DirtyLevel::None {
            return self.hits;
        }

        let mut target = FrameTarget {
            buffers: &mut self.buffers,
            config: &self.config,
            input,
            hits: &mut self.hits,
        };
        self.last_steps = self.updates.execute_updates(level, &mut target);
        self.hits
    }

    /// The hits of the last processed frame.
    pub fn hits(&self) -> FrameHits {
        self.hits
    }

    /// The steps run by the last processed frame.
    pub fn last_steps(&self) -> &[UpdateStep] {
        &self.last_steps
    }

    /// Which backend currently runs the passes.
    pub fn backend_kind(&self) -> BackendKind {
        self.buffers.backend_kind()
    }

    /*
     * Queries.
     */
    /// The mesh owning global element `index` and its index within that mesh.
    pub fn global_to_local(&self, kind: ElementKind, index: ElementIndex) -> Option<(usize, u32)> {
        self.buffers.global_to_local(kind, index)
    }

    /// The global index of element `local` of mesh `mesh_index`.
    pub fn local_to_global(&self, kind: ElementKind, mesh_index: usize, local: u32) -> Option<ElementIndex> {
        self.buffers.local_to_global(kind, mesh_index, local)
    }

    /// One range per mesh.
    pub fn mesh_ranges(&self) -> &[MeshRange] {
        self.buffers.mesh_ranges()
    }

    /// The flag words of `kind`.
    pub fn flags(&self, kind: ElementKind) -> &[u32] {
        self.buffers.flags(kind)
    }

    /// Projected vertices.
    pub fn screen_positions(&self) -> &[ScreenPoint] {
        self.buffers.screen_positions()
    }

    /// Projected mirror vertices, empty when symmetry is off.
    pub fn mirror_screen_positions(&self) -> &[ScreenPoint] {
        self.buffers.mirror_screen_positions()
    }

    /// Read-only access to every array.
    pub fn buffers(&self) -> &BufferManager {
        &self.buffers
    }
}

/// Runs update steps with the inputs of the frame being processed.
struct FrameTarget<'a, 'b> {
    buffers: &'a mut BufferManager,
    config: &'a PickingConfig,
    input: &'a FrameInput<'b>,
    hits: &'a mut FrameHits,
}

impl FrameTarget<'_, '_> {
    fn rebuild(&mut self) {
        let selection = self.input.selection;
        self.buffers
            .build_from_model(self.input.model, selection.active_model);
        self.buffers.recompute_selection(selection);
    }

    fn hit_test(&mut self) {
        let mode = self.input.selection.mode;
        let cursor = self.input.cursor;
        let result = self.buffers.hit_test(&HitQuery {
            cursor: cursor.position,
            radius: cursor.radius.unwrap_or(self.config.hit_radius),
            mode,
            cull_backfaces: self.config.cull_backfaces,
            max_face_vertices: self.config.max_face_vertices,
        });

        *self.hits = FrameHits::resolve(result, mode);
        self.buffers
            .set_hover(self.hits.hovered.map(|h| (h.kind, h.index)));
    }
}

impl UpdateTarget for FrameTarget<'_, '_> {
    fn run_step(&mut self, step: UpdateStep) {
        match step {
            UpdateStep::Rebuild => self.rebuild(),
            UpdateStep::UpdatePositions => {
                let meshes = self.input.model.map(|m| &m.meshes[..]).unwrap_or_default();
                if !self.buffers.update_all_positions(meshes) {
                    log::debug!("positions do not match the buffers, rebuilding");
                    self.rebuild();
                }
            }
            UpdateStep::SelectionDiff => self.buffers.update_selection(self.input.selection),
            UpdateStep::Reproject => {
                let camera = self.input.camera;
                self.buffers.reproject(&ProjectionParams {
                    view_projection: camera.view_projection(),
                    viewport: camera.viewport,
                });
            }
            UpdateStep::Visibility => self.buffers.update_visibility(),
            UpdateStep::HitTest => self.hit_test(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compute::BackendPreference;
    use crate::model::EditMesh;
    use glamx::{Vec2, Vec3};
    use pretty_assertions::assert_eq;

    fn system() -> PickingSystem {
        PickingSystem::new(PickingConfig::default().with_backend(BackendPreference::Software))
    }

    fn triangle_scene() -> SceneModel {
        SceneModel::new(vec![EditMesh::new(
            0,
            vec![Vec3::ZERO, Vec3::X, Vec3::Y],
            vec![vec![0, 1, 2]],
        )])
    }

    #[test]
    fn resolve_follows_mode_priority() {
        let all = HitResult {
            vertex: Some(1),
            line: Some(2),
            face: Some(3),
        };
        let hovered = |mode| FrameHits::resolve(all, mode).hovered;

        assert_eq!(
            hovered(SelectMode::all()),
            Some(HoveredElement { kind: ElementKind::Vertex, index: 1 })
        );
        assert_eq!(
            hovered(SelectMode::EDGE | SelectMode::FACE),
            Some(HoveredElement { kind: ElementKind::Line, index: 2 })
        );
        assert_eq!(
            hovered(SelectMode::FACE),
            Some(HoveredElement { kind: ElementKind::Face, index: 3 })
        );
        assert_eq!(FrameHits::resolve(all, SelectMode::FACE).vertex, None);
        assert_eq!(hovered(SelectMode::empty()), None);
    }

    #[test]
    fn first_frame_rebuilds_then_only_the_cursor_runs() {
        let mut system = system();
        let model = triangle_scene();
        let selection = SelectionState::new(SelectMode::FACE);
        let camera = ViewCamera::default();
        let cursor = CursorInput::at(Vec2::new(400.0, 300.0));
        let moved = CursorInput::at(Vec2::new(401.0, 300.0));

        let input = FrameInput {
            model: Some(&model),
            selection: &selection,
            camera: &camera,
            cursor: &cursor,
        };
        system.process_frame(&input);
        assert_eq!(system.last_steps()[0], UpdateStep::Rebuild);

        let input = FrameInput {
            cursor: &moved,
            ..input
        };
        system.process_frame(&input);
        assert_eq!(system.last_steps(), &[UpdateStep::HitTest]);

        // Nothing changed: nothing runs.
        system.process_frame(&input);
        assert_eq!(system.last_steps(), &[UpdateStep::HitTest]);
        assert!(!system.updates.is_dirty());
    }

    #[test]
    fn batched_notifications_run_once() {
        let mut system = system();
        let model = triangle_scene();
        let selection = SelectionState::new(SelectMode::VERTEX);
        let camera = ViewCamera::default();
        let cursor = CursorInput::default();
        let input = FrameInput {
            model: Some(&model),
            selection: &selection,
            camera: &camera,
            cursor: &cursor,
        };
        system.process_frame(&input);

        system.batch(|system| {
            system.notify_selection_changed();
            system.notify_transform_changed();
            system.process_frame(&input);
            // Still the steps of the first frame.
            assert_eq!(system.last_steps()[0], UpdateStep::Rebuild);
            system.notify_selection_changed();
        });

        system.process_frame(&input);
        assert_eq!(
            system.last_steps(),
            &[
                UpdateStep::UpdatePositions,
                UpdateStep::SelectionDiff,
                UpdateStep::Reproject,
                UpdateStep::Visibility,
                UpdateStep::HitTest
            ]
        );
    }

    #[test]
    fn hover_flag_follows_the_winner() {
        use crate::flags::ElementFlags;

        let mut system = system();
        let model = triangle_scene();
        let selection = SelectionState::new(SelectMode::FACE);
        let camera = ViewCamera::look_at(
            Vec3::new(0.25, 0.25, 5.0),
            Vec3::new(0.25, 0.25, 0.0),
            Vec3::Y,
            std::f32::consts::FRAC_PI_4,
            Default::default(),
        );
        let cursor = CursorInput::at(Vec2::new(400.0, 300.0));
        let hits = system.process_frame(&FrameInput {
            model: Some(&model),
            selection: &selection,
            camera: &camera,
            cursor: &cursor,
        });

        assert_eq!(hits.face, Some(0));
        let face = ElementFlags::from_word(system.flags(ElementKind::Face)[0]);
        assert!(face.contains(ElementFlags::HOVERED));
        assert!(system
            .flags(ElementKind::Vertex)
            .iter()
            .all(|w| !ElementFlags::from_word(*w).contains(ElementFlags::HOVERED)));
    }
}
