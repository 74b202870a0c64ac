//! The picking façade driven once per frame by the editor.

pub use self::config::PickingConfig;
pub use self::picking_system::{FrameHits, FrameInput, HoveredElement, PickingSystem};

mod config;
mod picking_system;
