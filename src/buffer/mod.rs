//! Flattened element arrays of the whole scene and their GPU copies.

pub use self::buffer_manager::BufferManager;
pub use self::elements::{
    Adjacency, ElementIndex, ElementKind, Face, Line, MeshRange, ScreenPoint, Vertex, NO_HIT,
};
pub use self::gpu_mirror::GpuMirror;
pub use self::symmetry::{SymmetryAxis, SymmetryPlane};

mod buffer_manager;
mod elements;
mod gpu_mirror;
mod symmetry;
