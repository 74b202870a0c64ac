//! Shared wgpu device and queue.

pub use self::context::Context;

mod context;
