//! Inputs provided by the editing tools: meshes, selection, camera and cursor.

pub use self::scene_model::{EditMesh, MeshKind, SceneModel};
pub use self::selection::{EdgeKey, MeshSelection, SelectMode, SelectionState};
pub use self::view::{CursorInput, ViewCamera, Viewport};

mod scene_model;
mod selection;
mod view;
