use meshpick::buffer::BufferManager;
use meshpick::compute::{ComputeBackend, HardwareBackend, SoftwareBackend};
use meshpick::prelude::*;
use pretty_assertions::assert_eq;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::f32::consts::FRAC_PI_4;

/// The software backend, plus the hardware one if this machine has a usable adapter.
fn backends() -> Vec<Box<dyn ComputeBackend>> {
    let _ = env_logger::builder().is_test(true).try_init();

    let mut backends: Vec<Box<dyn ComputeBackend>> = vec![Box::new(SoftwareBackend::new())];
    match HardwareBackend::probe() {
        Ok(hardware) => backends.push(Box::new(hardware)),
        Err(err) => log::info!("skipping the hardware backend: {err}"),
    }
    backends
}

fn systems(config: PickingConfig) -> Vec<PickingSystem> {
    backends()
        .into_iter()
        .map(|backend| PickingSystem::with_backend(config, backend))
        .collect()
}

struct Frame {
    model: Option<SceneModel>,
    selection: SelectionState,
    camera: ViewCamera,
    cursor: CursorInput,
}

impl Frame {
    fn new(model: SceneModel, mode: SelectMode, camera: ViewCamera) -> Self {
        Self {
            model: Some(model),
            selection: SelectionState::new(mode),
            camera,
            cursor: CursorInput::default(),
        }
    }

    fn run(&self, system: &mut PickingSystem) -> FrameHits {
        system.process_frame(&FrameInput {
            model: self.model.as_ref(),
            selection: &self.selection,
            camera: &self.camera,
            cursor: &self.cursor,
        })
    }

    fn aim_at(&mut self, position: Vec2) -> &mut Self {
        self.cursor = CursorInput::at(position);
        self
    }
}

fn screen(system: &PickingSystem, vertex: usize) -> Vec2 {
    let p = system.screen_positions()[vertex];
    Vec2::new(p.x(), p.y())
}

fn camera_from(eye: Vec3, target: Vec3) -> ViewCamera {
    ViewCamera::look_at(eye, target, Vec3::Y, FRAC_PI_4, Viewport::new(800.0, 600.0))
}

fn front_camera() -> ViewCamera {
    camera_from(Vec3::new(0.5, 0.5, 5.0), Vec3::new(0.5, 0.5, 0.0))
}

fn quad(model_index: usize, z: f32) -> EditMesh {
    EditMesh::new(
        model_index,
        vec![
            Vec3::new(0.0, 0.0, z),
            Vec3::new(1.0, 0.0, z),
            Vec3::new(1.0, 1.0, z),
            Vec3::new(0.0, 1.0, z),
        ],
        vec![vec![0, 1, 2, 3]],
    )
}

fn has(system: &PickingSystem, kind: ElementKind, index: usize, flag: ElementFlags) -> bool {
    ElementFlags::from_word(system.flags(kind)[index]).contains(flag)
}

#[test]
fn single_triangle_seen_along_z() {
    let triangle = SceneModel::new(vec![EditMesh::new(
        0,
        vec![Vec3::ZERO, Vec3::X, Vec3::Y],
        vec![vec![0, 1, 2]],
    )]);
    let centroid = Vec3::new(1.0 / 3.0, 1.0 / 3.0, 0.0);
    let camera = camera_from(centroid - Vec3::Z * 5.0, centroid);

    for mut system in systems(PickingConfig::default()) {
        let mut frame = Frame::new(triangle.clone(), SelectMode::FACE, camera);
        frame.run(&mut system);

        let projected = (screen(&system, 0) + screen(&system, 1) + screen(&system, 2)) / 3.0;
        let hits = frame.aim_at(projected).run(&mut system);
        assert_eq!(hits.face, Some(0));
        assert_eq!(hits.vertex, None);
        assert_eq!(hits.line, None);
        assert_eq!(
            hits.hovered,
            Some(HoveredElement {
                kind: ElementKind::Face,
                index: 0
            })
        );

        let hits = frame
            .aim_at(projected + Vec2::new(1000.0, 0.0))
            .run(&mut system);
        assert_eq!(hits.face, None);
        assert_eq!(hits.hovered, None);
    }

    // Seen from behind, the triangle is back-facing.
    for mut system in systems(PickingConfig::default().with_cull_backfaces(true)) {
        let mut frame = Frame::new(triangle.clone(), SelectMode::FACE, camera);
        frame.run(&mut system);
        let projected = (screen(&system, 0) + screen(&system, 1) + screen(&system, 2)) / 3.0;
        assert_eq!(frame.aim_at(projected).run(&mut system).face, None);
        assert!(has(&system, ElementKind::Face, 0, ElementFlags::CULLED));
    }
}

#[test]
fn vertex_beats_edge_beats_face() {
    let model = SceneModel::new(vec![quad(0, 0.0)]);

    for mut system in systems(PickingConfig::default()) {
        let mut frame = Frame::new(model.clone(), SelectMode::all(), front_camera());
        frame.run(&mut system);

        let corner = screen(&system, 0);
        let center = (0..4).map(|i| screen(&system, i)).sum::<Vec2>() / 4.0;
        frame.aim_at(corner + (center - corner).normalize() * 3.0);

        let hits = frame.run(&mut system);
        assert_eq!(hits.vertex, Some(0));
        assert!(hits.line.is_some());
        assert_eq!(hits.face, Some(0));
        assert_eq!(hits.hovered.map(|h| h.kind), Some(ElementKind::Vertex));

        frame.selection.mode = SelectMode::EDGE | SelectMode::FACE;
        let hits = frame.run(&mut system);
        assert_eq!(hits.vertex, None);
        assert_eq!(hits.hovered.map(|h| h.kind), Some(ElementKind::Line));

        frame.selection.mode = SelectMode::FACE;
        let hits = frame.run(&mut system);
        assert_eq!(
            hits.hovered,
            Some(HoveredElement {
                kind: ElementKind::Face,
                index: 0
            })
        );

        // Only the winner is hovered.
        assert!(has(&system, ElementKind::Face, 0, ElementFlags::HOVERED));
        assert!(!has(&system, ElementKind::Vertex, 0, ElementFlags::HOVERED));
    }
}

#[test]
fn aux_lines_need_line_mode() {
    let model = SceneModel::new(vec![EditMesh::new(
        0,
        vec![Vec3::ZERO, Vec3::new(1.0, 1.0, 0.0)],
        Vec::new(),
    )
    .with_aux_lines(vec![[0, 1]])]);

    for mut system in systems(PickingConfig::default()) {
        let mut frame = Frame::new(model.clone(), SelectMode::EDGE, front_camera());
        frame.run(&mut system);
        let middle = (screen(&system, 0) + screen(&system, 1)) / 2.0;

        assert_eq!(frame.aim_at(middle).run(&mut system).line, None);
        frame.selection.mode = SelectMode::LINE;
        assert_eq!(frame.run(&mut system).line, Some(0));
    }
}

#[test]
fn nearest_vertex_wins_regardless_of_order() {
    let point = |z: f32| EditMesh::new(0, vec![Vec3::new(0.5, 0.5, z)], Vec::new());
    let camera = front_camera();

    for (meshes, nearest) in [
        (vec![point(0.0), point(2.0)], 1),
        (vec![point(2.0), point(0.0)], 0),
        // Equal depths: the smaller index wins.
        (vec![point(1.0), point(1.0)], 0),
    ] {
        for mut system in systems(PickingConfig::default()) {
            let mut frame = Frame::new(SceneModel::new(meshes.clone()), SelectMode::VERTEX, camera);
            let hits = frame.aim_at(Vec2::new(400.0, 300.0)).run(&mut system);
            assert_eq!(hits.vertex, Some(nearest));
        }
    }
}

#[test]
fn culling_excludes_vertices_of_back_faces_only() {
    // Face 0 is wound clockwise when seen from +Z, face 1 counter-clockwise.
    let model = SceneModel::new(vec![EditMesh::new(
        0,
        vec![
            Vec3::ZERO,
            Vec3::X,
            Vec3::Y,
            Vec3::new(-1.0, 0.0, 0.0),
            Vec3::new(0.0, -1.0, 0.0),
        ],
        vec![vec![0, 2, 1], vec![0, 3, 4]],
    )]);
    let camera = camera_from(Vec3::new(0.0, 0.0, 5.0), Vec3::ZERO);

    for cull in [true, false] {
        for mut system in systems(PickingConfig::default().with_cull_backfaces(cull)) {
            let mut frame = Frame::new(model.clone(), SelectMode::VERTEX, camera);
            frame.run(&mut system);

            assert!(has(&system, ElementKind::Face, 0, ElementFlags::CULLED));
            assert!(!has(&system, ElementKind::Face, 1, ElementFlags::CULLED));
            assert!(has(&system, ElementKind::Vertex, 1, ElementFlags::CULLED));
            // Shared with the front face.
            assert!(!has(&system, ElementKind::Vertex, 0, ElementFlags::CULLED));

            let only_back = screen(&system, 1);
            let shared = screen(&system, 0);
            let expected = if cull { None } else { Some(1) };
            assert_eq!(frame.aim_at(only_back).run(&mut system).vertex, expected);
            assert_eq!(frame.aim_at(shared).run(&mut system).vertex, Some(0));
        }
    }
}

#[test]
fn hidden_faces_are_never_hit() {
    let model = SceneModel::new(vec![quad(0, 0.0), quad(0, 1.0)]);

    for mut system in systems(PickingConfig::default()) {
        let mut frame = Frame::new(model.clone(), SelectMode::FACE, front_camera());
        assert_eq!(frame.aim_at(Vec2::new(400.0, 300.0)).run(&mut system).face, Some(1));

        // A hidden face does not occlude the faces behind it.
        assert!(system.set_hidden(ElementKind::Face, 1, true));
        assert_eq!(frame.run(&mut system).face, Some(0));

        // Every face under the cursor is hidden: no hit, even in face-only mode.
        assert!(system.set_hidden(ElementKind::Face, 0, true));
        let hits = frame.run(&mut system);
        assert_eq!(hits.face, None);
        assert_eq!(hits.hovered, None);

        // Hidden state survives camera moves.
        frame.camera = camera_from(Vec3::new(0.5, 0.5, 6.0), Vec3::new(0.5, 0.5, 0.0));
        assert_eq!(frame.run(&mut system).face, None);

        system.unhide_all();
        assert_eq!(frame.run(&mut system).face, Some(1));

        assert!(!system.set_hidden(ElementKind::Face, 2, true));
    }
}

#[test]
fn empty_scenes_never_hit() {
    for mut system in systems(PickingConfig::default()) {
        let mut frame = Frame::new(SceneModel::default(), SelectMode::all(), front_camera());
        frame.model = None;
        assert_eq!(frame.aim_at(Vec2::new(400.0, 300.0)).run(&mut system), FrameHits::default());

        frame.model = Some(SceneModel::new(vec![EditMesh::bone(0)]));
        system.notify_topology_changed();
        assert_eq!(frame.run(&mut system), FrameHits::default());
        assert_eq!(system.mesh_ranges().len(), 1);
        assert_eq!(system.global_to_local(ElementKind::Vertex, 0), None);
    }
}

#[test]
fn transform_updates_move_the_hits() {
    for mut system in systems(PickingConfig::default()) {
        let mut frame = Frame::new(SceneModel::new(vec![quad(0, 0.0)]), SelectMode::FACE, front_camera());
        assert_eq!(frame.aim_at(Vec2::new(400.0, 300.0)).run(&mut system).face, Some(0));

        if let Some(model) = &mut frame.model {
            for p in &mut model.meshes[0].positions {
                p.x += 10.0;
            }
        }
        system.notify_transform_changed();
        assert_eq!(frame.run(&mut system).face, None);
        assert_eq!(system.last_steps()[0], UpdateStep::UpdatePositions);

        // A vertex count change reported as a transform falls back to a rebuild.
        if let Some(model) = &mut frame.model {
            model.meshes.push(quad(0, 0.0));
        }
        system.notify_transform_changed();
        assert_eq!(frame.run(&mut system).face, Some(1));
    }
}

#[test]
fn selection_flags_follow_the_selection() {
    let model = SceneModel::new(vec![quad(0, 0.0), quad(1, 2.0)]);

    for mut system in systems(PickingConfig::default()) {
        let mut frame = Frame::new(model.clone(), SelectMode::VERTEX, front_camera());
        frame.run(&mut system);

        frame.selection.active_model = Some(1);
        frame.selection.active_mesh = Some(1);
        frame.selection.mesh_mut(1).vertices.extend([0, 2]);
        frame.selection.mesh_mut(0).edges.insert(EdgeKey::new(1, 2));
        frame.selection.mesh_mut(0).faces.insert(0);
        system.notify_selection_changed();
        frame.run(&mut system);

        let selected: Vec<usize> = (0..8)
            .filter(|i| has(&system, ElementKind::Vertex, *i, ElementFlags::VERTEX_SELECTED))
            .collect();
        assert_eq!(selected, vec![4, 6]);
        assert!(has(&system, ElementKind::Line, 1, ElementFlags::EDGE_SELECTED));
        assert!(has(&system, ElementKind::Face, 0, ElementFlags::FACE_SELECTED));
        assert!(has(&system, ElementKind::Vertex, 5, ElementFlags::MESH_ACTIVE));
        assert!(!has(&system, ElementKind::Vertex, 0, ElementFlags::MODEL_ACTIVE));

        frame.selection.mesh_mut(1).vertices.remove(&0);
        system.notify_selection_changed();
        frame.run(&mut system);
        assert!(!has(&system, ElementKind::Vertex, 4, ElementFlags::VERTEX_SELECTED));
        assert!(has(&system, ElementKind::Vertex, 6, ElementFlags::VERTEX_SELECTED));

        // Rebuilding keeps the selection but resets hidden elements.
        assert!(system.set_hidden(ElementKind::Vertex, 6, true));
        system.notify_topology_changed();
        frame.run(&mut system);
        assert!(has(&system, ElementKind::Vertex, 6, ElementFlags::VERTEX_SELECTED));
        assert!(!has(&system, ElementKind::Vertex, 6, ElementFlags::HIDDEN));
    }
}

#[test]
fn rebuilding_twice_gives_the_same_buffers() {
    let model = SceneModel::new(vec![quad(0, 0.0), EditMesh::bone(0), quad(1, 1.0)]);

    for mut system in systems(PickingConfig::default().with_cull_backfaces(true)) {
        let frame = Frame::new(model.clone(), SelectMode::VERTEX, front_camera());
        frame.run(&mut system);
        let snapshot = |system: &PickingSystem| {
            (
                system.buffers().vertices().to_vec(),
                system.buffers().lines().to_vec(),
                system.buffers().faces().to_vec(),
                system.flags(ElementKind::Vertex).to_vec(),
                system.flags(ElementKind::Line).to_vec(),
                system.flags(ElementKind::Face).to_vec(),
                system.screen_positions().to_vec(),
            )
        };
        let first = snapshot(&system);

        system.notify_topology_changed();
        frame.run(&mut system);
        assert_eq!(snapshot(&system), first);
    }
}

#[test]
fn symmetry_projects_the_mirror() {
    let model = SceneModel::new(vec![quad(0, 0.0)]);
    let camera = camera_from(Vec3::new(0.0, 0.0, 5.0), Vec3::ZERO);
    let config = PickingConfig::default().with_symmetry(Some(SymmetryPlane::new(SymmetryAxis::X, 0.0)));

    for mut system in systems(config) {
        let frame = Frame::new(model.clone(), SelectMode::VERTEX, camera);
        frame.run(&mut system);

        let mirror = system.mirror_screen_positions().to_vec();
        assert_eq!(mirror.len(), 4);
        for (p, m) in system.screen_positions().iter().zip(&mirror) {
            assert!(m.is_valid());
            assert!((m.x() - (800.0 - p.x())).abs() < 1.0e-2);
            assert!((m.y() - p.y()).abs() < 1.0e-2);
        }

        system.set_symmetry(None);
        frame.run(&mut system);
        assert!(system.mirror_screen_positions().is_empty());
        assert_eq!(system.last_steps()[0], UpdateStep::UpdatePositions);
    }
}

fn random_model(rng: &mut impl Rng) -> SceneModel {
    let meshes = (0..rng.random_range(1..8))
        .map(|i| {
            if rng.random_ratio(1, 5) {
                return EditMesh::bone(i / 2);
            }
            let n = rng.random_range(3..12u32);
            let positions = (0..n)
                .map(|_| Vec3::new(rng.random(), rng.random(), rng.random()))
                .collect();
            let faces = (0..rng.random_range(0..6))
                .map(|_| (0..rng.random_range(3..6)).map(|_| rng.random_range(0..n)).collect())
                .collect();
            let aux = (0..rng.random_range(0..3))
                .map(|_| [rng.random_range(0..n), rng.random_range(0..n)])
                .collect();
            EditMesh::new(i / 2, positions, faces).with_aux_lines(aux)
        })
        .collect();
    SceneModel::new(meshes)
}

#[test]
fn ranges_tile_the_arrays_and_indices_round_trip() {
    let mut rng = rand::rng();

    for _ in 0..20 {
        let model = random_model(&mut rng);
        let mut buffers = BufferManager::software(64);
        buffers.build_from_model(Some(&model), Some(0));
        assert_eq!(buffers.mesh_ranges().len(), model.len());

        for kind in [ElementKind::Vertex, ElementKind::Line, ElementKind::Face] {
            let mut end = 0;
            for range in buffers.mesh_ranges() {
                let (start, count) = range.span(kind);
                assert_eq!(start, end);
                end = start + count;
            }
            assert_eq!(end as usize, buffers.element_count(kind));

            for global in 0..end {
                let (mesh, local) = buffers.global_to_local(kind, global).unwrap();
                assert_eq!(buffers.local_to_global(kind, mesh, local), Some(global));
            }
            assert_eq!(buffers.global_to_local(kind, end), None);
        }
    }
}

#[test]
fn backends_agree() {
    let mut systems = systems(PickingConfig::default().with_cull_backfaces(true));
    if systems.len() < 2 {
        log::info!("no hardware backend to compare with");
        return;
    }
    let hardware = systems.pop().unwrap();
    let software = systems.pop().unwrap();
    assert_eq!(software.backend_kind(), BackendKind::Software);
    let mut pair = [software, hardware];

    let mut rng = StdRng::seed_from_u64(0x5eed);
    for _ in 0..16 {
        let mut frame = Frame::new(
            random_model(&mut rng),
            SelectMode::all(),
            camera_from(Vec3::new(0.5, 0.5, 3.0), Vec3::new(0.5, 0.5, 0.5)),
        );

        for _ in 0..10 {
            frame.aim_at(Vec2::new(rng.random_range(0.0..800.0), rng.random_range(0.0..600.0)));
            let hits = pair.each_mut().map(|system| frame.run(system));
            assert_eq!(hits[0], hits[1], "cursor at {:?}", frame.cursor.position);

            let [software, hardware] = &pair;
            for (s, h) in software.screen_positions().iter().zip(hardware.screen_positions()) {
                assert!((s.x() - h.x()).abs() < 1.0e-2);
                assert!((s.y() - h.y()).abs() < 1.0e-2);
            }
            for kind in [ElementKind::Vertex, ElementKind::Line, ElementKind::Face] {
                let culled = |system: &PickingSystem| -> Vec<bool> {
                    system
                        .flags(kind)
                        .iter()
                        .map(|w| ElementFlags::from_word(*w).contains(ElementFlags::CULLED))
                        .collect()
                };
                assert_eq!(culled(software), culled(hardware), "{kind:?} culling");
            }
        }
    }
}

#[test]
fn folded_faces_are_never_culled() {
    // Face 0 doubles back over its own edges, face 1 has two distinct corners.
    let model = SceneModel::new(vec![EditMesh::new(
        0,
        vec![
            Vec3::ZERO,
            Vec3::X,
            Vec3::Y,
            Vec3::new(2.0, 2.0, 0.0),
            Vec3::new(3.0, 2.0, 0.0),
        ],
        vec![vec![0, 0, 1, 0, 2], vec![3, 3, 4]],
    )]);
    let from_behind = camera_from(Vec3::new(0.5, 0.5, -5.0), Vec3::new(0.5, 0.5, 0.0));

    for camera in [front_camera(), from_behind] {
        for mut system in systems(PickingConfig::default().with_cull_backfaces(true)) {
            let mut frame = Frame::new(model.clone(), SelectMode::VERTEX, camera);
            frame.run(&mut system);

            for kind in [ElementKind::Vertex, ElementKind::Line, ElementKind::Face] {
                for index in 0..system.flags(kind).len() {
                    assert!(!has(&system, kind, index, ElementFlags::CULLED), "{kind:?} {index}");
                }
            }
            for vertex in [1, 2, 3] {
                let at = screen(&system, vertex);
                assert_eq!(frame.aim_at(at).run(&mut system).vertex, Some(vertex as u32));
            }
        }
    }
}

#[test]
fn oversized_and_two_corner_faces_are_skipped() {
    let model = SceneModel::new(vec![
        quad(0, 0.0),
        EditMesh::new(
            0,
            vec![Vec3::new(0.2, 0.2, 0.5), Vec3::new(0.8, 0.8, 0.5)],
            vec![vec![0, 1]],
        ),
    ]);
    let from_behind = camera_from(Vec3::new(0.5, 0.5, -5.0), Vec3::new(0.5, 0.5, 0.0));
    let config = PickingConfig::default()
        .with_cull_backfaces(true)
        .with_max_face_vertices(3);

    for camera in [front_camera(), from_behind] {
        for mut system in systems(config) {
            let mut frame = Frame::new(model.clone(), SelectMode::FACE, camera);
            let hits = frame.aim_at(Vec2::new(400.0, 300.0)).run(&mut system);
            assert_eq!(hits.face, None);
            assert_eq!(hits.hovered, None);
            assert_eq!(system.flags(ElementKind::Face).len(), 2);
            for face in 0..2 {
                assert!(!has(&system, ElementKind::Face, face, ElementFlags::CULLED));
            }
            assert!(!has(&system, ElementKind::Vertex, 0, ElementFlags::CULLED));
        }
    }
}
