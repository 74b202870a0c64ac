//! Errors raised by the hardware compute backend.
//!
//! None of these ever reach the caller of [`PickingSystem`](crate::system::PickingSystem):
//! the buffer manager reacts to any of them by switching to the software backend.

/// Failure of the hardware (wgpu compute) backend.
#[derive(thiserror::Error, Debug)]
pub enum BackendError {
    /// No adapter could be obtained from the wgpu instance.
    #[error("no suitable adapter: {0}")]
    Adapter(#[from] wgpu::RequestAdapterError),
    /// The adapter refused to create a device.
    #[error("device request failed: {0}")]
    Device(#[from] wgpu::RequestDeviceError),
    /// The adapter cannot run compute shaders (e.g. WebGL2).
    #[error("adapter {0:?} does not support compute shaders")]
    NoComputeSupport(String),
    /// Mapping a readback buffer failed.
    #[error("buffer readback failed: {0}")]
    Readback(#[from] wgpu::BufferAsyncError),
    /// The readback callback was dropped before it reported a result.
    #[error("buffer readback was cancelled")]
    ReadbackCancelled,
    /// The dispatch needs more workgroups than a single dimension allows.
    #[error("{elements} elements need {workgroups} workgroups, the limit is {limit}")]
    DispatchTooLarge {
        /// Number of elements in the pass.
        elements: usize,
        /// Number of workgroups required.
        workgroups: u32,
        /// Device limit on workgroups per dimension.
        limit: u32,
    },
}
