//! GPU storage copy of a CPU-owned element array.

use crate::context::Context;
use crate::error::BackendError;
use bytemuck::{Pod, Zeroable};
use std::marker::PhantomData;
use std::mem;
use std::ops::Range;

/// A storage buffer mirroring a `Vec<T>` that lives on the CPU.
///
/// The CPU array stays authoritative. Uploads either replace the whole content
/// or only a sub-range, and the buffer grows by doubling when the array no
/// longer fits. It never shrinks.
pub struct GpuMirror<T: Pod + Zeroable> {
    buffer: wgpu::Buffer,
    /// Capacity in elements.
    capacity: usize,
    /// Number of elements last uploaded.
    len: usize,
    label: &'static str,
    _marker: PhantomData<T>,
}

impl<T: Pod + Zeroable> GpuMirror<T> {
    /// Smallest capacity allocated, so that bindings are never zero-sized.
    const MIN_CAPACITY: usize = 4;

    /// Creates an empty mirror.
    pub fn new(ctxt: &Context, label: &'static str) -> Self {
        Self::with_capacity(ctxt, label, Self::MIN_CAPACITY)
    }

    /// Creates an empty mirror with room for `capacity` elements.
    pub fn with_capacity(ctxt: &Context, label: &'static str, capacity: usize) -> Self {
        let capacity = capacity.max(Self::MIN_CAPACITY);
        Self {
            buffer: Self::allocate(ctxt, label, capacity),
            capacity,
            len: 0,
            label,
            _marker: PhantomData,
        }
    }

    fn allocate(ctxt: &Context, label: &'static str, capacity: usize) -> wgpu::Buffer {
        ctxt.create_buffer_simple(
            Some(label),
            (capacity * mem::size_of::<T>()) as u64,
            wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::COPY_SRC,
        )
    }

    /// Number of elements last uploaded.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if nothing was uploaded.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The underlying storage buffer.
    #[inline]
    pub fn buffer(&self) -> &wgpu::Buffer {
        &self.buffer
    }

    /// Replaces the whole content by `data`.
    ///
    /// Returns `true` if the buffer was reallocated (bind groups must be recreated).
    pub fn upload(&mut self, ctxt: &Context, data: &[T]) -> bool {
        let reallocated = self.reserve(ctxt, data.len());
        if !data.is_empty() {
            ctxt.write_buffer(&self.buffer, 0, bytemuck::cast_slice(data));
        }
        self.len = data.len();
        reallocated
    }

    /// Uploads only `data[range]`.
    ///
    /// # Arguments
    /// * `ctxt` - Context owning the buffer
    /// * `data` - The whole CPU-side array
    /// * `range` - Elements of `data` that changed since the last upload
    ///
    /// Falls back to a full upload if the length changed since the last upload.
    pub fn upload_range(&mut self, ctxt: &Context, data: &[T], range: Range<usize>) -> bool {
        if data.len() != self.len {
            return self.upload(ctxt, data);
        }

        let range = range.start.min(data.len())..range.end.min(data.len());
        if !range.is_empty() {
            let offset = (range.start * mem::size_of::<T>()) as u64;
            ctxt.write_buffer(&self.buffer, offset, bytemuck::cast_slice(&data[range]));
        }
        false
    }

    /// Sets the number of elements without uploading anything.
    ///
    /// Used for buffers written by the GPU itself. Returns `true` if the buffer was reallocated.
    pub fn set_len(&mut self, ctxt: &Context, len: usize) -> bool {
        let reallocated = self.reserve(ctxt, len);
        self.len = len;
        reallocated
    }

    /// Grows the buffer so that it holds at least `len` elements. Existing content is lost.
    fn reserve(&mut self, ctxt: &Context, len: usize) -> bool {
        if len <= self.capacity {
            return false;
        }

        let mut new_capacity = self.capacity;
        while new_capacity < len {
            new_capacity *= 2;
        }

        self.buffer = Self::allocate(ctxt, self.label, new_capacity);
        self.capacity = new_capacity;
        true
    }

    /// Copies the first `len()` elements back to the CPU, blocking.
    pub fn read_back(&self, ctxt: &Context) -> Result<Vec<T>, BackendError> {
        let bytes = ctxt.read_buffer(&self.buffer, (self.len * mem::size_of::<T>()) as u64)?;
        Ok(bytemuck::pod_collect_to_vec(&bytes))
    }
}
