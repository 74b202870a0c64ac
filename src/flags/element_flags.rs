//! The per-element flag word.
//!
//! Every vertex, line and face owns one `u32` made of four independent fields.
//! The bit layout is shared with `picking.wgsl`.

bitflags! {
    /// Bit-packed state of one vertex, line or face.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
    #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
    pub struct ElementFlags: u32 {
        // Hierarchy, at most one of these is set.
        /// The owning mesh is selected.
        const MESH_SELECTED = 1 << 0;
        /// The owning mesh belongs to the active model.
        const MODEL_ACTIVE = 1 << 1;
        /// The owning mesh is the active mesh.
        const MESH_ACTIVE = 1 << 2;

        // Element selection, at most one of these is set.
        /// Selected vertex.
        const VERTEX_SELECTED = 1 << 4;
        /// Selected face edge.
        const EDGE_SELECTED = 1 << 5;
        /// Selected aux line.
        const LINE_SELECTED = 1 << 6;
        /// Selected face.
        const FACE_SELECTED = 1 << 7;

        /// Under the cursor.
        const HOVERED = 1 << 8;

        /// Back-facing, or only used by back-facing faces.
        const CULLED = 1 << 12;
        /// Hidden by the user.
        const HIDDEN = 1 << 13;

        /// All hierarchy bits.
        const HIERARCHY_MASK = Self::MESH_SELECTED.bits()
            | Self::MODEL_ACTIVE.bits()
            | Self::MESH_ACTIVE.bits();
        /// All element selection bits.
        const SELECTION_MASK = Self::VERTEX_SELECTED.bits()
            | Self::EDGE_SELECTED.bits()
            | Self::LINE_SELECTED.bits()
            | Self::FACE_SELECTED.bits();
    }
}

impl ElementFlags {
    /// Reads a raw flag word, keeping unknown bits.
    #[inline]
    pub fn from_word(word: u32) -> Self {
        ElementFlags::from_bits_retain(word)
    }

    /// Is this element excluded from hit-testing?
    ///
    /// Culled elements are only excluded when back-face culling is enabled.
    #[inline]
    pub fn is_pick_excluded(self, cull_backfaces: bool) -> bool {
        self.contains(ElementFlags::HIDDEN) || (cull_backfaces && self.contains(ElementFlags::CULLED))
    }

    /// Replaces the bits of `mask` by those of `value`.
    #[inline]
    pub fn with_field(self, mask: ElementFlags, value: ElementFlags) -> Self {
        (self - mask) | (value & mask)
    }
}
