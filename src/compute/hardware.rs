//! wgpu compute implementation of the picking passes.

use crate::buffer::{Face, GpuMirror, Line, ScreenPoint, Vertex, NO_HIT};
use crate::compute::backend::{
    BackendKind, ComputeBackend, FlagArrays, FlagArraysMut, HitQuery, HitResult, PendingUploads,
    PointSet, ProjectionParams, SceneArrays,
};
use crate::compute::geometry::Candidate;
use crate::context::Context;
use crate::error::BackendError;
use crate::model::SelectMode;
use bytemuck::{Pod, Zeroable};

/// Must match `WORKGROUP_SIZE` in picking.wgsl.
const WORKGROUP_SIZE: u32 = 64;

/// Uniforms of every pass.
/// Layout must match picking.wgsl Params struct.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
struct GpuParams {
    view_proj: [[f32; 4]; 4],
    viewport: [f32; 4],
    cursor: [f32; 4],
    counts: [u32; 4],
    options: [u32; 4],
}

/// Layout must match picking.wgsl Candidate struct.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
struct GpuCandidate {
    depth: f32,
    index: u32,
}

struct Pipelines {
    project_vertices: wgpu::ComputePipeline,
    cull_faces: wgpu::ComputePipeline,
    cull_vertices: wgpu::ComputePipeline,
    cull_lines: wgpu::ComputePipeline,
    hit_vertices: wgpu::ComputePipeline,
    hit_lines: wgpu::ComputePipeline,
    hit_faces: wgpu::ComputePipeline,
}

impl Pipelines {
    fn new(ctxt: &Context) -> Self {
        let shader = ctxt.create_shader_module(
            Some("meshpick_picking_shader"),
            include_str!("picking.wgsl"),
        );
        let pipeline = |entry_point: &str| ctxt.create_compute_pipeline(entry_point, &shader, entry_point);

        Self {
            project_vertices: pipeline("project_vertices"),
            cull_faces: pipeline("cull_faces"),
            cull_vertices: pipeline("cull_vertices"),
            cull_lines: pipeline("cull_lines"),
            hit_vertices: pipeline("hit_vertices"),
            hit_lines: pipeline("hit_lines"),
            hit_faces: pipeline("hit_faces"),
        }
    }
}

/// GPU copies of the scene arrays.
struct GpuScene {
    vertices: GpuMirror<Vertex>,
    mirror_vertices: GpuMirror<Vertex>,
    screen: GpuMirror<ScreenPoint>,
    mirror_screen: GpuMirror<ScreenPoint>,
    lines: GpuMirror<Line>,
    faces: GpuMirror<Face>,
    indices: GpuMirror<u32>,
    vertex_flags: GpuMirror<u32>,
    line_flags: GpuMirror<u32>,
    face_flags: GpuMirror<u32>,
    vertex_face_offsets: GpuMirror<u32>,
    vertex_face_items: GpuMirror<u32>,
    line_face_offsets: GpuMirror<u32>,
    line_face_items: GpuMirror<u32>,
    vertex_best: GpuMirror<GpuCandidate>,
    line_best: GpuMirror<GpuCandidate>,
    face_best: GpuMirror<GpuCandidate>,
}

impl GpuScene {
    fn new(ctxt: &Context) -> Self {
        Self {
            vertices: GpuMirror::new(ctxt, "meshpick_vertices"),
            mirror_vertices: GpuMirror::new(ctxt, "meshpick_mirror_vertices"),
            screen: GpuMirror::new(ctxt, "meshpick_screen"),
            mirror_screen: GpuMirror::new(ctxt, "meshpick_mirror_screen"),
            lines: GpuMirror::new(ctxt, "meshpick_lines"),
            faces: GpuMirror::new(ctxt, "meshpick_faces"),
            indices: GpuMirror::new(ctxt, "meshpick_indices"),
            vertex_flags: GpuMirror::new(ctxt, "meshpick_vertex_flags"),
            line_flags: GpuMirror::new(ctxt, "meshpick_line_flags"),
            face_flags: GpuMirror::new(ctxt, "meshpick_face_flags"),
            vertex_face_offsets: GpuMirror::new(ctxt, "meshpick_vertex_face_offsets"),
            vertex_face_items: GpuMirror::new(ctxt, "meshpick_vertex_face_items"),
            line_face_offsets: GpuMirror::new(ctxt, "meshpick_line_face_offsets"),
            line_face_items: GpuMirror::new(ctxt, "meshpick_line_face_items"),
            vertex_best: GpuMirror::new(ctxt, "meshpick_vertex_best"),
            line_best: GpuMirror::new(ctxt, "meshpick_line_best"),
            face_best: GpuMirror::new(ctxt, "meshpick_face_best"),
        }
    }
}

fn entry(binding: u32, buffer: &wgpu::Buffer) -> wgpu::BindGroupEntry<'_> {
    wgpu::BindGroupEntry {
        binding,
        resource: buffer.as_entire_binding(),
    }
}

fn copy_into<T: Copy>(dst: &mut [T], src: Vec<T>) {
    for (dst, src) in dst.iter_mut().zip(src) {
        *dst = src;
    }
}

/// Picking passes dispatched as wgpu compute shaders.
///
/// Every pass is submitted and waited on before returning, so the backend
/// behaves like a blocking call. The CPU arrays stay authoritative: the GPU
/// copies are refreshed from [`PendingUploads`] before each pass and the
/// results are read back into the caller's arrays.
pub struct HardwareBackend {
    ctxt: Context,
    pipelines: Pipelines,
    params: wgpu::Buffer,
    gpu: GpuScene,
    /// Is `gpu.screen` the projection of the current `gpu.vertices`?
    screen_current: bool,
}

impl HardwareBackend {
    /// Creates the pipelines and buffers on `ctxt`.
    pub fn new(ctxt: Context) -> Result<Self, BackendError> {
        if !ctxt.supports_compute() {
            return Err(BackendError::NoComputeSupport(ctxt.adapter.get_info().name));
        }

        let pipelines = Pipelines::new(&ctxt);
        let params = ctxt.create_buffer_simple(
            Some("meshpick_params"),
            std::mem::size_of::<GpuParams>() as u64,
            wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        );
        let gpu = GpuScene::new(&ctxt);

        log::info!(
            "hardware picking backend on {:?}",
            ctxt.adapter.get_info().name
        );

        Ok(Self {
            ctxt,
            pipelines,
            params,
            gpu,
            screen_current: false,
        })
    }

    /// Creates a backend on the shared context, or on a new headless device.
    #[cfg(not(target_arch = "wasm32"))]
    pub fn probe() -> Result<Self, BackendError> {
        let ctxt = match Context::shared() {
            Some(ctxt) => ctxt,
            None => Context::request_headless_blocking()?,
        };
        Self::new(ctxt)
    }

    /// The context the passes run on.
    pub fn context(&self) -> &Context {
        &self.ctxt
    }

    fn sync(&mut self, scene: &SceneArrays<'_>, uploads: &mut PendingUploads) {
        let (ctxt, gpu) = (&self.ctxt, &mut self.gpu);

        if uploads.topology {
            gpu.vertices.upload(ctxt, scene.vertices);
            gpu.lines.upload(ctxt, scene.lines);
            gpu.faces.upload(ctxt, scene.faces);
            gpu.indices.upload(ctxt, scene.indices);
            gpu.vertex_face_offsets.upload(ctxt, &scene.vertex_faces.offsets);
            gpu.vertex_face_items.upload(ctxt, &scene.vertex_faces.items);
            gpu.line_face_offsets.upload(ctxt, &scene.line_faces.offsets);
            gpu.line_face_items.upload(ctxt, &scene.line_faces.items);
            gpu.screen.set_len(ctxt, scene.vertices.len());
            gpu.mirror_screen.set_len(ctxt, scene.mirror_vertices.len());
            uploads.topology = false;
            uploads.positions = None;
            uploads.mirror = true;
            uploads.flags = true;
            self.screen_current = false;
        } else if let Some(range) = uploads.positions.take() {
            gpu.vertices.upload_range(ctxt, scene.vertices, range);
            self.screen_current = false;
        }

        if uploads.mirror {
            gpu.mirror_vertices.upload(ctxt, scene.mirror_vertices);
            gpu.mirror_screen.set_len(ctxt, scene.mirror_vertices.len());
            uploads.mirror = false;
        }
    }

    fn sync_flags(&mut self, flags: FlagArrays<'_>, uploads: &mut PendingUploads) {
        if uploads.flags {
            self.gpu.vertex_flags.upload(&self.ctxt, flags.vertex);
            self.gpu.line_flags.upload(&self.ctxt, flags.line);
            self.gpu.face_flags.upload(&self.ctxt, flags.face);
            uploads.flags = false;
        }
    }

    /// Makes sure `gpu.screen` holds the projection the CPU side is using.
    fn sync_screen(&mut self, screen: &[ScreenPoint]) {
        if !self.screen_current {
            self.gpu.screen.upload(&self.ctxt, screen);
            self.screen_current = true;
        }
    }

    fn write_params(&self, scene: &SceneArrays<'_>, params: GpuParams) {
        let mut params = params;
        params.counts[0] = scene.vertices.len() as u32;
        params.counts[1] = scene.lines.len() as u32;
        params.counts[2] = scene.faces.len() as u32;
        self.ctxt.write_buffer(&self.params, 0, bytemuck::bytes_of(&params));
    }

    fn workgroups(&self, elements: usize) -> Result<u32, BackendError> {
        let workgroups = elements.div_ceil(WORKGROUP_SIZE as usize);
        let limit = self.ctxt.max_workgroups_per_dimension();
        match u32::try_from(workgroups) {
            Ok(w) if w <= limit => Ok(w),
            _ => Err(BackendError::DispatchTooLarge {
                elements,
                workgroups: u32::try_from(workgroups).unwrap_or(u32::MAX),
                limit,
            }),
        }
    }

    fn dispatch(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        pipeline: &wgpu::ComputePipeline,
        label: &str,
        entries: &[wgpu::BindGroupEntry<'_>],
        elements: usize,
    ) -> Result<(), BackendError> {
        let workgroups = self.workgroups(elements)?;
        if workgroups == 0 {
            return Ok(());
        }

        let layout = pipeline.get_bind_group_layout(0);
        let bind_group = self.ctxt.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(label),
            layout: &layout,
            entries,
        });

        let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some(label),
            timestamp_writes: None,
        });
        pass.set_pipeline(pipeline);
        pass.set_bind_group(0, &bind_group, &[]);
        pass.dispatch_workgroups(workgroups, 1, 1);
        Ok(())
    }

    fn reduce(&self, best: &GpuMirror<GpuCandidate>) -> Result<Option<u32>, BackendError> {
        let mut result = Candidate::NONE;
        for candidate in best.read_back(&self.ctxt)? {
            if candidate.index != NO_HIT {
                result.offer(candidate.depth, candidate.index);
            }
        }
        Ok(result.hit())
    }
}

impl ComputeBackend for HardwareBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Hardware
    }

    fn project(
        &mut self,
        scene: &SceneArrays<'_>,
        uploads: &mut PendingUploads,
        set: PointSet,
        params: &ProjectionParams,
        out: &mut [ScreenPoint],
    ) -> Result<(), BackendError> {
        self.sync(scene, uploads);
        self.write_params(
            scene,
            GpuParams {
                view_proj: params.view_projection.to_cols_array_2d(),
                viewport: params.viewport.to_vec4().to_array(),
                ..Zeroable::zeroed()
            },
        );

        let (vertices, screen) = match set {
            PointSet::Primary => (&self.gpu.vertices, &self.gpu.screen),
            PointSet::Mirror => (&self.gpu.mirror_vertices, &self.gpu.mirror_screen),
        };

        let mut encoder = self.ctxt.create_command_encoder(Some("meshpick_project_encoder"));
        self.dispatch(
            &mut encoder,
            &self.pipelines.project_vertices,
            "meshpick_project_vertices",
            &[
                entry(0, &self.params),
                entry(1, vertices.buffer()),
                entry(2, screen.buffer()),
            ],
            vertices.len(),
        )?;
        self.ctxt.submit(std::iter::once(encoder.finish()));

        copy_into(out, screen.read_back(&self.ctxt)?);

        if set == PointSet::Primary {
            self.screen_current = true;
        }
        Ok(())
    }

    fn update_visibility(
        &mut self,
        scene: &SceneArrays<'_>,
        uploads: &mut PendingUploads,
        screen: &[ScreenPoint],
        flags: FlagArraysMut<'_>,
        max_face_vertices: u32,
    ) -> Result<(), BackendError> {
        self.sync(scene, uploads);
        self.sync_screen(screen);
        self.sync_flags(
            FlagArrays {
                vertex: &*flags.vertex,
                line: &*flags.line,
                face: &*flags.face,
            },
            uploads,
        );
        self.write_params(
            scene,
            GpuParams {
                counts: [0, 0, 0, max_face_vertices],
                ..Zeroable::zeroed()
            },
        );

        let gpu = &self.gpu;
        let mut encoder = self.ctxt.create_command_encoder(Some("meshpick_visibility_encoder"));
        self.dispatch(
            &mut encoder,
            &self.pipelines.cull_faces,
            "meshpick_cull_faces",
            &[
                entry(0, &self.params),
                entry(2, gpu.screen.buffer()),
                entry(4, gpu.faces.buffer()),
                entry(5, gpu.indices.buffer()),
                entry(8, gpu.face_flags.buffer()),
            ],
            scene.faces.len(),
        )?;
        self.dispatch(
            &mut encoder,
            &self.pipelines.cull_vertices,
            "meshpick_cull_vertices",
            &[
                entry(0, &self.params),
                entry(6, gpu.vertex_flags.buffer()),
                entry(8, gpu.face_flags.buffer()),
                entry(9, gpu.vertex_face_offsets.buffer()),
                entry(10, gpu.vertex_face_items.buffer()),
            ],
            scene.vertices.len(),
        )?;
        self.dispatch(
            &mut encoder,
            &self.pipelines.cull_lines,
            "meshpick_cull_lines",
            &[
                entry(0, &self.params),
                entry(7, gpu.line_flags.buffer()),
                entry(8, gpu.face_flags.buffer()),
                entry(11, gpu.line_face_offsets.buffer()),
                entry(12, gpu.line_face_items.buffer()),
            ],
            scene.lines.len(),
        )?;
        self.ctxt.submit(std::iter::once(encoder.finish()));

        copy_into(flags.vertex, gpu.vertex_flags.read_back(&self.ctxt)?);
        copy_into(flags.line, gpu.line_flags.read_back(&self.ctxt)?);
        copy_into(flags.face, gpu.face_flags.read_back(&self.ctxt)?);
        Ok(())
    }

    fn hit_test(
        &mut self,
        scene: &SceneArrays<'_>,
        uploads: &mut PendingUploads,
        screen: &[ScreenPoint],
        flags: FlagArrays<'_>,
        query: &HitQuery,
    ) -> Result<HitResult, BackendError> {
        if scene.vertices.is_empty() {
            return Ok(HitResult::default());
        }

        self.sync(scene, uploads);
        self.sync_screen(screen);
        self.sync_flags(flags, uploads);
        self.write_params(
            scene,
            GpuParams {
                cursor: [query.cursor.x, query.cursor.y, query.radius, 0.0],
                counts: [0, 0, 0, query.max_face_vertices],
                options: [
                    query.cull_backfaces as u32,
                    query.mode.contains(SelectMode::EDGE) as u32,
                    query.mode.contains(SelectMode::LINE) as u32,
                    0,
                ],
                ..Zeroable::zeroed()
            },
        );

        let test_vertices = query.mode.contains(SelectMode::VERTEX);
        let test_lines = query.mode.intersects(SelectMode::EDGE | SelectMode::LINE);
        let test_faces = query.mode.contains(SelectMode::FACE);

        let vertex_groups = self.workgroups(scene.vertices.len())? as usize;
        let line_groups = self.workgroups(scene.lines.len())? as usize;
        let face_groups = self.workgroups(scene.faces.len())? as usize;
        self.gpu.vertex_best.set_len(&self.ctxt, vertex_groups);
        self.gpu.line_best.set_len(&self.ctxt, line_groups);
        self.gpu.face_best.set_len(&self.ctxt, face_groups);

        let gpu = &self.gpu;
        let mut encoder = self.ctxt.create_command_encoder(Some("meshpick_hit_test_encoder"));
        if test_vertices {
            self.dispatch(
                &mut encoder,
                &self.pipelines.hit_vertices,
                "meshpick_hit_vertices",
                &[
                    entry(0, &self.params),
                    entry(2, gpu.screen.buffer()),
                    entry(6, gpu.vertex_flags.buffer()),
                    entry(13, gpu.vertex_best.buffer()),
                ],
                scene.vertices.len(),
            )?;
        }
        if test_lines {
            self.dispatch(
                &mut encoder,
                &self.pipelines.hit_lines,
                "meshpick_hit_lines",
                &[
                    entry(0, &self.params),
                    entry(2, gpu.screen.buffer()),
                    entry(3, gpu.lines.buffer()),
                    entry(7, gpu.line_flags.buffer()),
                    entry(13, gpu.line_best.buffer()),
                ],
                scene.lines.len(),
            )?;
        }
        if test_faces {
            self.dispatch(
                &mut encoder,
                &self.pipelines.hit_faces,
                "meshpick_hit_faces",
                &[
                    entry(0, &self.params),
                    entry(2, gpu.screen.buffer()),
                    entry(4, gpu.faces.buffer()),
                    entry(5, gpu.indices.buffer()),
                    entry(8, gpu.face_flags.buffer()),
                    entry(13, gpu.face_best.buffer()),
                ],
                scene.faces.len(),
            )?;
        }
        self.ctxt.submit(std::iter::once(encoder.finish()));

        let mut result = HitResult::default();
        if test_vertices {
            result.vertex = self.reduce(&gpu.vertex_best)?;
        }
        if test_lines {
            result.line = self.reduce(&gpu.line_best)?;
        }
        if test_faces {
            result.face = self.reduce(&gpu.face_best)?;
        }
        Ok(result)
    }
}
