use crate::update::{DirtyLevel, DirtyLevels, UpdateStep};

/// Something able to run the steps of a dirty level.
pub trait UpdateTarget {
    /// Runs one step.
    fn run_step(&mut self, step: UpdateStep);
}

/// Accumulates dirty levels and decides what runs at the next frame.
///
/// Levels cascade: executing a level runs its own step and the steps of
/// every lower level, so only the highest pending level is ever executed.
#[derive(Clone, Debug, Default)]
pub struct UpdateManager {
    pending: DirtyLevels,
    batch_depth: usize,
}

impl UpdateManager {
    /// Creates a manager with nothing pending.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `level` to the pending levels.
    pub fn mark_dirty(&mut self, level: DirtyLevel) {
        self.pending |= DirtyLevels::from(level);
    }

    /// The pending levels.
    pub fn pending(&self) -> DirtyLevels {
        self.pending
    }

    /// Is anything pending?
    pub fn is_dirty(&self) -> bool {
        !self.pending.is_empty()
    }

    /// The level to execute this frame: the highest pending one.
    ///
    /// Returns [`DirtyLevel::None`] inside a batch scope; the pending levels
    /// are kept for the end of the outermost scope.
    pub fn process_updates(&self) -> DirtyLevel {
        if self.in_batch() {
            DirtyLevel::None
        } else {
            self.pending.highest()
        }
    }

    /// Runs every step of `level` on `target`, then clears the pending levels.
    ///
    /// Returns the steps that ran, in order.
    pub fn execute_updates(
        &mut self,
        level: DirtyLevel,
        target: &mut impl UpdateTarget,
    ) -> Vec<UpdateStep> {
        let steps = level.steps();
        if !steps.is_empty() {
            log::debug!("executing {level:?} update: {steps:?}");
        }
        for step in steps {
            target.run_step(*step);
        }
        self.pending = DirtyLevels::empty();
        steps.to_vec()
    }

    /// Opens a batch scope. Scopes nest.
    pub fn begin_batch(&mut self) {
        self.batch_depth += 1;
    }

    /// Closes a batch scope.
    ///
    /// Returns the level to execute now if this closed the outermost scope,
    /// [`DirtyLevel::None`] otherwise.
    pub fn end_batch(&mut self) -> DirtyLevel {
        if self.batch_depth == 0 {
            log::warn!("end_batch called without a matching begin_batch");
            return DirtyLevel::None;
        }
        self.batch_depth -= 1;
        self.process_updates()
    }

    /// Is a batch scope open?
    pub fn in_batch(&self) -> bool {
        self.batch_depth > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[derive(Default)]
    struct Recorder {
        steps: Vec<UpdateStep>,
    }

    impl UpdateTarget for Recorder {
        fn run_step(&mut self, step: UpdateStep) {
            self.steps.push(step);
        }
    }

    #[test]
    fn highest_pending_level_wins() {
        let mut updates = UpdateManager::new();
        assert_eq!(updates.process_updates(), DirtyLevel::None);

        updates.mark_dirty(DirtyLevel::Mouse);
        updates.mark_dirty(DirtyLevel::Transform);
        updates.mark_dirty(DirtyLevel::Camera);
        updates.mark_dirty(DirtyLevel::Transform);
        assert_eq!(updates.process_updates(), DirtyLevel::Transform);
    }

    #[test]
    fn execution_cascades_and_clears() {
        let mut updates = UpdateManager::new();
        let mut target = Recorder::default();
        updates.mark_dirty(DirtyLevel::Topology);
        updates.mark_dirty(DirtyLevel::Selection);

        let level = updates.process_updates();
        let steps = updates.execute_updates(level, &mut target);
        assert_eq!(
            steps,
            vec![
                UpdateStep::Rebuild,
                UpdateStep::Reproject,
                UpdateStep::Visibility,
                UpdateStep::HitTest
            ]
        );
        assert_eq!(target.steps, steps);
        assert!(!updates.is_dirty());
        assert_eq!(updates.process_updates(), DirtyLevel::None);
    }

    #[test]
    fn batches_defer_until_the_outermost_scope_closes() {
        let mut updates = UpdateManager::new();
        updates.begin_batch();
        updates.mark_dirty(DirtyLevel::Transform);
        updates.begin_batch();
        updates.mark_dirty(DirtyLevel::Selection);
        assert_eq!(updates.process_updates(), DirtyLevel::None);

        assert_eq!(updates.end_batch(), DirtyLevel::None);
        assert!(updates.is_dirty());
        assert_eq!(updates.end_batch(), DirtyLevel::Transform);
        assert!(!updates.in_batch());

        // Unbalanced end.
        assert_eq!(updates.end_batch(), DirtyLevel::None);
    }
}
