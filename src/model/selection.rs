//! Selection state shared with the editing tools.

use std::collections::{HashMap, HashSet};

bitflags! {
    /// Which element kinds can currently be hovered and selected.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
    pub struct SelectMode: u32 {
        /// Vertices.
        const VERTEX = 1 << 0;
        /// Lines derived from face edges.
        const EDGE = 1 << 1;
        /// Faces.
        const FACE = 1 << 2;
        /// Aux lines.
        const LINE = 1 << 3;
    }
}

impl Default for SelectMode {
    fn default() -> Self {
        SelectMode::VERTEX
    }
}

/// Undirected edge between two local vertex indices.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EdgeKey(u32, u32);

impl EdgeKey {
    /// The key of the edge joining `a` and `b`, in either order.
    #[inline]
    pub fn new(a: u32, b: u32) -> Self {
        if a <= b {
            EdgeKey(a, b)
        } else {
            EdgeKey(b, a)
        }
    }

    /// The smaller vertex index.
    #[inline]
    pub fn first(self) -> u32 {
        self.0
    }

    /// The larger vertex index.
    #[inline]
    pub fn second(self) -> u32 {
        self.1
    }
}

/// Selected elements of one mesh, in mesh-local indices.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MeshSelection {
    /// Selected vertices.
    pub vertices: HashSet<u32>,
    /// Selected face edges.
    pub edges: HashSet<EdgeKey>,
    /// Selected faces.
    pub faces: HashSet<u32>,
    /// Selected aux lines, indexed among the aux lines of the mesh.
    pub lines: HashSet<u32>,
}

impl MeshSelection {
    /// Returns `true` if nothing is selected.
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
            && self.edges.is_empty()
            && self.faces.is_empty()
            && self.lines.is_empty()
    }
}

/// Full selection state: hierarchy plus per-mesh element selections.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SelectionState {
    /// Element kinds that can be hovered and selected.
    pub mode: SelectMode,
    /// The model being edited.
    pub active_model: Option<usize>,
    /// The mesh being edited.
    pub active_mesh: Option<usize>,
    /// Meshes selected as a whole.
    pub selected_meshes: HashSet<usize>,
    /// Element selections, keyed by mesh index.
    pub meshes: HashMap<usize, MeshSelection>,
}

impl SelectionState {
    /// Creates an empty selection with the given mode.
    pub fn new(mode: SelectMode) -> Self {
        Self {
            mode,
            ..Default::default()
        }
    }

    /// The element selection of `mesh_index`, if any element of it was ever selected.
    #[inline]
    pub fn mesh(&self, mesh_index: usize) -> Option<&MeshSelection> {
        self.meshes.get(&mesh_index)
    }

    /// The element selection of `mesh_index`, created empty if needed.
    pub fn mesh_mut(&mut self, mesh_index: usize) -> &mut MeshSelection {
        self.meshes.entry(mesh_index).or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edge_key_is_undirected() {
        assert_eq!(EdgeKey::new(3, 1), EdgeKey::new(1, 3));
        assert_eq!(EdgeKey::new(3, 1).first(), 1);
        assert_eq!(EdgeKey::new(3, 1).second(), 3);
    }
}
