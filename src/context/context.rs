//! wgpu compute context management.
//!
//! The hardware picking backend needs a device and a queue. They either come
//! from the host application (so picking shares the device used for drawing)
//! or are requested headless, without any surface.

use crate::error::BackendError;
use std::cell::RefCell;
use std::sync::Arc;

// Context installed by the host renderer, if any.
thread_local! {
    static SHARED_CONTEXT: RefCell<Option<Context>> = const { RefCell::new(None) };
}

/// The wgpu resources needed to run the picking compute passes.
///
/// This struct is cheap to clone: every resource is behind an `Arc`.
#[derive(Clone)]
pub struct Context {
    /// The wgpu device used for creating GPU resources.
    pub device: Arc<wgpu::Device>,
    /// The wgpu queue used for submitting commands.
    pub queue: Arc<wgpu::Queue>,
    /// The wgpu adapter the device was created from.
    pub adapter: Arc<wgpu::Adapter>,
}

impl Context {
    /// Wraps a device created elsewhere.
    ///
    /// # Arguments
    /// * `adapter` - The adapter `device` was requested from
    /// * `device` - The wgpu device
    /// * `queue` - The queue of `device`
    pub fn new(adapter: wgpu::Adapter, device: wgpu::Device, queue: wgpu::Queue) -> Context {
        Context {
            device: Arc::new(device),
            queue: Arc::new(queue),
            adapter: Arc::new(adapter),
        }
    }

    /// Requests an adapter and a device that are not tied to any surface.
    ///
    /// Fails if no adapter is available or if the adapter cannot run compute shaders.
    pub async fn request_headless() -> Result<Context, BackendError> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await?;

        if !Self::adapter_supports_compute(&adapter) {
            return Err(BackendError::NoComputeSupport(adapter.get_info().name));
        }

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("meshpick device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                ..Default::default()
            })
            .await?;

        Ok(Context::new(adapter, device, queue))
    }

    /// Blocking version of [`request_headless`](Self::request_headless).
    #[cfg(not(target_arch = "wasm32"))]
    pub fn request_headless_blocking() -> Result<Context, BackendError> {
        pollster::block_on(Self::request_headless())
    }

    /// Makes `context` the one returned by [`shared`](Self::shared) on this thread.
    ///
    /// Host renderers call this once they own a device so that picking runs on it.
    pub fn install_shared(context: Context) {
        SHARED_CONTEXT.with(|cell| *cell.borrow_mut() = Some(context));
    }

    /// The context installed with [`install_shared`](Self::install_shared), if any.
    pub fn shared() -> Option<Context> {
        SHARED_CONTEXT.with(|cell| cell.borrow().clone())
    }

    /// Forgets the shared context of this thread.
    pub fn reset_shared() {
        SHARED_CONTEXT.with(|cell| *cell.borrow_mut() = None);
    }

    /// Does the adapter behind this context support compute shaders?
    pub fn supports_compute(&self) -> bool {
        Self::adapter_supports_compute(&self.adapter)
    }

    fn adapter_supports_compute(adapter: &wgpu::Adapter) -> bool {
        adapter
            .get_downlevel_capabilities()
            .flags
            .contains(wgpu::DownlevelFlags::COMPUTE_SHADERS)
    }

    /// Maximum number of workgroups in a single dispatch dimension.
    pub fn max_workgroups_per_dimension(&self) -> u32 {
        self.device.limits().max_compute_workgroups_per_dimension
    }

    /// Creates a new buffer on the GPU with specified parameters.
    ///
    /// # Arguments
    /// * `label` - Debug label for the buffer
    /// * `size` - Size of the buffer in bytes
    /// * `usage` - Buffer usage flags
    pub fn create_buffer_simple(
        &self,
        label: Option<&str>,
        size: u64,
        usage: wgpu::BufferUsages,
    ) -> wgpu::Buffer {
        self.device.create_buffer(&wgpu::BufferDescriptor {
            label,
            size,
            usage,
            mapped_at_creation: false,
        })
    }

    /// Writes data to a buffer.
    ///
    /// # Arguments
    /// * `buffer` - Destination buffer, created with `COPY_DST`
    /// * `offset` - Byte offset into `buffer`
    /// * `data` - Bytes to write
    pub fn write_buffer(&self, buffer: &wgpu::Buffer, offset: u64, data: &[u8]) {
        self.queue.write_buffer(buffer, offset, data);
    }

    /// Creates a new bind group.
    pub fn create_bind_group(&self, desc: &wgpu::BindGroupDescriptor) -> wgpu::BindGroup {
        self.device.create_bind_group(desc)
    }

    /// Creates a new shader module from WGSL source.
    pub fn create_shader_module(&self, label: Option<&str>, source: &str) -> wgpu::ShaderModule {
        self.device
            .create_shader_module(wgpu::ShaderModuleDescriptor {
                label,
                source: wgpu::ShaderSource::Wgsl(source.into()),
            })
    }

    /// Creates a compute pipeline whose bind group layout is derived from the shader.
    ///
    /// # Arguments
    /// * `label` - Debug label for the pipeline
    /// * `module` - Shader module containing the entry point
    /// * `entry_point` - Name of the `@compute` function to run
    pub fn create_compute_pipeline(
        &self,
        label: &str,
        module: &wgpu::ShaderModule,
        entry_point: &str,
    ) -> wgpu::ComputePipeline {
        self.device
            .create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some(label),
                layout: None,
                module,
                entry_point: Some(entry_point),
                compilation_options: Default::default(),
                cache: None,
            })
    }

    /// Creates a new command encoder.
    pub fn create_command_encoder(&self, label: Option<&str>) -> wgpu::CommandEncoder {
        self.device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label })
    }

    /// Submits command buffers to the GPU queue.
    pub fn submit<I: IntoIterator<Item = wgpu::CommandBuffer>>(&self, command_buffers: I) {
        self.queue.submit(command_buffers);
    }

    /// Copies `size` bytes of `source` into CPU memory, blocking until the GPU is done.
    ///
    /// # Arguments
    /// * `source` - Buffer to read, created with `COPY_SRC`
    /// * `size` - Number of bytes to copy from the start of `source`
    pub fn read_buffer(&self, source: &wgpu::Buffer, size: u64) -> Result<Vec<u8>, BackendError> {
        if size == 0 {
            return Ok(Vec::new());
        }

        let staging_buffer = self.create_buffer_simple(
            Some("meshpick_readback_staging_buffer"),
            size,
            wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
        );

        let mut encoder = self.create_command_encoder(Some("meshpick_readback_encoder"));
        encoder.copy_buffer_to_buffer(source, 0, &staging_buffer, 0, size);
        self.submit(std::iter::once(encoder.finish()));

        let buffer_slice = staging_buffer.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        buffer_slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });

        // Wait for the GPU to finish
        let _ = self.device.poll(wgpu::PollType::wait_indefinitely());
        rx.recv().map_err(|_| BackendError::ReadbackCancelled)??;

        let bytes = buffer_slice.get_mapped_range().to_vec();
        staging_buffer.unmap();
        Ok(bytes)
    }
}
