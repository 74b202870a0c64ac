//! Dirty levels and the update steps they imply.

/// What changed since the last frame, from least to most expensive.
///
/// Executing a level also executes the work of every lower level.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DirtyLevel {
    /// Nothing to do.
    #[default]
    None,
    /// The cursor moved.
    Mouse,
    /// The camera or the viewport changed.
    Camera,
    /// The element or mesh selection changed.
    Selection,
    /// Vertex positions changed.
    Transform,
    /// Meshes or element counts changed.
    Topology,
}

bitflags! {
    /// Set of pending dirty levels.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
    #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
    pub struct DirtyLevels: u8 {
        /// See [`DirtyLevel::Mouse`].
        const MOUSE = 1 << 0;
        /// See [`DirtyLevel::Camera`].
        const CAMERA = 1 << 1;
        /// See [`DirtyLevel::Selection`].
        const SELECTION = 1 << 2;
        /// See [`DirtyLevel::Transform`].
        const TRANSFORM = 1 << 3;
        /// See [`DirtyLevel::Topology`].
        const TOPOLOGY = 1 << 4;
    }
}

impl From<DirtyLevel> for DirtyLevels {
    fn from(level: DirtyLevel) -> Self {
        match level {
            DirtyLevel::None => DirtyLevels::empty(),
            DirtyLevel::Mouse => DirtyLevels::MOUSE,
            DirtyLevel::Camera => DirtyLevels::CAMERA,
            DirtyLevel::Selection => DirtyLevels::SELECTION,
            DirtyLevel::Transform => DirtyLevels::TRANSFORM,
            DirtyLevel::Topology => DirtyLevels::TOPOLOGY,
        }
    }
}

impl DirtyLevels {
    /// The highest level of the set.
    pub fn highest(self) -> DirtyLevel {
        if self.contains(DirtyLevels::TOPOLOGY) {
            DirtyLevel::Topology
        } else if self.contains(DirtyLevels::TRANSFORM) {
            DirtyLevel::Transform
        } else if self.contains(DirtyLevels::SELECTION) {
            DirtyLevel::Selection
        } else if self.contains(DirtyLevels::CAMERA) {
            DirtyLevel::Camera
        } else if self.contains(DirtyLevels::MOUSE) {
            DirtyLevel::Mouse
        } else {
            DirtyLevel::None
        }
    }
}

/// One operation run while executing a dirty level.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum UpdateStep {
    /// Rebuild every array, then recompute hierarchy and selection flags.
    Rebuild,
    /// Overwrite vertex positions (and mirror positions).
    UpdatePositions,
    /// Update selection and hierarchy flags by diff.
    SelectionDiff,
    /// Project the vertices (and mirror vertices) to the screen.
    Reproject,
    /// Recompute the culled bits.
    Visibility,
    /// Hit-test the cursor and update the hover flag.
    HitTest,
}

impl DirtyLevel {
    /// The steps executing this level runs, in order.
    pub fn steps(self) -> &'static [UpdateStep] {
        use UpdateStep::*;

        match self {
            DirtyLevel::None => &[],
            DirtyLevel::Mouse => &[HitTest],
            DirtyLevel::Camera => &[Reproject, Visibility, HitTest],
            DirtyLevel::Selection => &[SelectionDiff, Reproject, Visibility, HitTest],
            DirtyLevel::Transform => &[
                UpdatePositions,
                SelectionDiff,
                Reproject,
                Visibility,
                HitTest,
            ],
            DirtyLevel::Topology => &[Rebuild, Reproject, Visibility, HitTest],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn levels_are_ordered_by_cost() {
        assert!(DirtyLevel::Topology > DirtyLevel::Transform);
        assert!(DirtyLevel::Transform > DirtyLevel::Selection);
        assert!(DirtyLevel::Selection > DirtyLevel::Camera);
        assert!(DirtyLevel::Camera > DirtyLevel::Mouse);
        assert!(DirtyLevel::Mouse > DirtyLevel::None);
    }

    #[test]
    fn highest_picks_the_most_expensive_level() {
        assert_eq!(DirtyLevels::empty().highest(), DirtyLevel::None);
        let levels = DirtyLevels::MOUSE | DirtyLevels::SELECTION | DirtyLevels::CAMERA;
        assert_eq!(levels.highest(), DirtyLevel::Selection);
        assert_eq!(DirtyLevels::all().highest(), DirtyLevel::Topology);
    }

    #[test]
    fn every_level_ends_with_the_hit_test() {
        for level in [
            DirtyLevel::Mouse,
            DirtyLevel::Camera,
            DirtyLevel::Selection,
            DirtyLevel::Transform,
            DirtyLevel::Topology,
        ] {
            assert_eq!(level.steps().last(), Some(&UpdateStep::HitTest));
        }
        assert!(DirtyLevel::None.steps().is_empty());
    }
}
