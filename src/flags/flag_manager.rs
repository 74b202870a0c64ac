//! Computation and incremental update of the per-element flag words.

use crate::flags::ElementFlags;
use crate::model::{EdgeKey, SelectionState};
use std::collections::{HashMap, HashSet};
use std::hash::Hash;
use std::ops::Range;

/// Computes and merges element flags.
///
/// The flag arrays themselves belong to the
/// [`BufferManager`](crate::buffer::BufferManager) and are handed to every
/// operation. The manager only remembers the hierarchy inputs (active model,
/// active mesh, selected meshes) needed by
/// [`compute_hierarchy_flags`](Self::compute_hierarchy_flags).
#[derive(Clone, Debug, Default)]
pub struct FlagManager {
    active_model: Option<usize>,
    active_mesh: Option<usize>,
    selected_meshes: HashSet<usize>,
}

impl FlagManager {
    /// Creates a manager with no active model nor mesh.
    pub fn new() -> Self {
        Self::default()
    }

    /// Copies the hierarchy inputs of `selection`.
    ///
    /// Returns `true` if they changed, in which case hierarchy flags must be recomputed.
    pub fn sync_hierarchy(&mut self, selection: &SelectionState) -> bool {
        let changed = self.active_model != selection.active_model
            || self.active_mesh != selection.active_mesh
            || self.selected_meshes != selection.selected_meshes;
        if changed {
            self.active_model = selection.active_model;
            self.active_mesh = selection.active_mesh;
            self.selected_meshes = selection.selected_meshes.clone();
        }
        changed
    }

    /// Sets the active model, as done when a scene is (re)built.
    pub fn set_active_model(&mut self, active_model: Option<usize>) {
        self.active_model = active_model;
    }

    /// The hierarchy field for the elements of mesh `mesh_index` owned by model `model_index`.
    ///
    /// Mesh states beat the model state, and active beats selected: `MESH_ACTIVE`,
    /// then `MESH_SELECTED`, then `MODEL_ACTIVE`.
    pub fn compute_hierarchy_flags(&self, model_index: usize, mesh_index: usize) -> ElementFlags {
        if self.active_mesh == Some(mesh_index) {
            ElementFlags::MESH_ACTIVE
        } else if self.selected_meshes.contains(&mesh_index) {
            ElementFlags::MESH_SELECTED
        } else if self.active_model == Some(model_index) {
            ElementFlags::MODEL_ACTIVE
        } else {
            ElementFlags::empty()
        }
    }

    /// Overwrites the hierarchy field of every flag in `range`.
    pub fn apply_hierarchy_flags(flags: &mut [u32], range: Range<u32>, hierarchy: ElementFlags) {
        for word in &mut flags[range.start as usize..range.end as usize] {
            *word = ElementFlags::from_word(*word)
                .with_field(ElementFlags::HIERARCHY_MASK, hierarchy)
                .bits();
        }
    }

    /// Recomputes the `bit` selection field of `range` from `selected` alone.
    ///
    /// `selected` holds mesh-local indices; the ones outside of `range` are ignored.
    pub fn recompute_selection_flags(
        flags: &mut [u32],
        range: Range<u32>,
        selected: &HashSet<u32>,
        bit: ElementFlags,
    ) {
        for (local, word) in flags[range.start as usize..range.end as usize]
            .iter_mut()
            .enumerate()
        {
            let mut f = ElementFlags::from_word(*word);
            f.set(bit, selected.contains(&(local as u32)));
            *word = f.bits();
        }
    }

    /// Applies a vertex selection change by visiting only the symmetric difference of `old` and `new`.
    pub fn update_vertex_selection_flags(
        flags: &mut [u32],
        range: Range<u32>,
        old: &HashSet<u32>,
        new: &HashSet<u32>,
    ) {
        Self::update_selection_flags(flags, range, old, new, ElementFlags::VERTEX_SELECTED)
    }

    /// Applies a selection change of the `bit` field by diff.
    ///
    /// Produces the same flags as [`recompute_selection_flags`](Self::recompute_selection_flags)
    /// with `new`, provided the flags were consistent with `old` beforehand.
    pub fn update_selection_flags(
        flags: &mut [u32],
        range: Range<u32>,
        old: &HashSet<u32>,
        new: &HashSet<u32>,
        bit: ElementFlags,
    ) {
        let to_global = |local: &u32| {
            range
                .start
                .checked_add(*local)
                .filter(|global| *global < range.end)
        };
        Self::apply_diff(flags, old, new, to_global, bit);
    }

    /// Applies an edge selection change by diff.
    ///
    /// `edge_lines` maps the edge keys of the mesh to the global index of their line.
    pub fn update_edge_selection_flags(
        flags: &mut [u32],
        edge_lines: &HashMap<EdgeKey, u32>,
        old: &HashSet<EdgeKey>,
        new: &HashSet<EdgeKey>,
    ) {
        let to_global = |key: &EdgeKey| edge_lines.get(key).copied();
        Self::apply_diff(flags, old, new, to_global, ElementFlags::EDGE_SELECTED)
    }

    fn apply_diff<K: Eq + Hash>(
        flags: &mut [u32],
        old: &HashSet<K>,
        new: &HashSet<K>,
        to_global: impl Fn(&K) -> Option<u32>,
        bit: ElementFlags,
    ) {
        for key in old.difference(new) {
            if let Some(word) = to_global(key).and_then(|g| flags.get_mut(g as usize)) {
                *word &= !bit.bits();
            }
        }
        for key in new.difference(old) {
            if let Some(word) = to_global(key).and_then(|g| flags.get_mut(g as usize)) {
                *word |= bit.bits();
            }
        }
    }

    /// Marks `index` as the only hovered element of `flags`.
    ///
    /// Every other hover bit is cleared first, so at most one element is hovered.
    pub fn set_hover_flag(flags: &mut [u32], index: Option<u32>) {
        Self::clear_all_hover_flags(flags);
        if let Some(word) = index.and_then(|i| flags.get_mut(i as usize)) {
            *word |= ElementFlags::HOVERED.bits();
        }
    }

    /// Clears the hover bit of every element of `flags`.
    pub fn clear_all_hover_flags(flags: &mut [u32]) {
        for word in flags {
            *word &= !ElementFlags::HOVERED.bits();
        }
    }

    /// Sets or clears the hidden bit of one element.
    pub fn set_hidden_flag(flags: &mut [u32], index: u32, hidden: bool) -> bool {
        match flags.get_mut(index as usize) {
            Some(word) => {
                let mut f = ElementFlags::from_word(*word);
                f.set(ElementFlags::HIDDEN, hidden);
                if hidden {
                    f.remove(ElementFlags::HOVERED);
                }
                *word = f.bits();
                true
            }
            None => false,
        }
    }

    /// Clears the hidden bit of every element of `flags`.
    pub fn clear_all_hidden_flags(flags: &mut [u32]) {
        for word in flags {
            *word &= !ElementFlags::HIDDEN.bits();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rand::Rng;

    fn random_set(rng: &mut impl Rng, len: u32) -> HashSet<u32> {
        (0..rng.random_range(0..len)).map(|_| rng.random_range(0..len + 3)).collect()
    }

    #[test]
    fn active_mesh_beats_selected_mesh() {
        let mut selection = SelectionState::default();
        selection.active_model = Some(0);
        selection.active_mesh = Some(1);
        selection.selected_meshes.extend([1, 2]);

        let mut manager = FlagManager::new();
        assert!(manager.sync_hierarchy(&selection));
        assert!(!manager.sync_hierarchy(&selection));

        assert_eq!(manager.compute_hierarchy_flags(0, 1), ElementFlags::MESH_ACTIVE);
        assert_eq!(manager.compute_hierarchy_flags(0, 2), ElementFlags::MESH_SELECTED);
        assert_eq!(manager.compute_hierarchy_flags(0, 3), ElementFlags::MODEL_ACTIVE);
        assert_eq!(manager.compute_hierarchy_flags(1, 3), ElementFlags::empty());
    }

    #[test]
    fn diff_update_matches_full_recompute() {
        let mut rng = rand::rng();
        let range = 5..25;

        for _ in 0..200 {
            let old = random_set(&mut rng, 20);
            let new = random_set(&mut rng, 20);
            let noise: Vec<u32> = (0..30)
                .map(|_| rng.random::<u32>() & ElementFlags::HOVERED.bits())
                .collect();

            let mut diffed = noise.clone();
            FlagManager::recompute_selection_flags(
                &mut diffed,
                range.clone(),
                &old,
                ElementFlags::VERTEX_SELECTED,
            );
            FlagManager::update_vertex_selection_flags(&mut diffed, range.clone(), &old, &new);

            let mut full = noise;
            FlagManager::recompute_selection_flags(
                &mut full,
                range.clone(),
                &new,
                ElementFlags::VERTEX_SELECTED,
            );

            assert_eq!(diffed, full);
        }
    }

    #[test]
    fn diff_ignores_indices_outside_the_range() {
        let mut flags = vec![0; 6];
        let new = HashSet::from([0, 1, 2]);
        FlagManager::update_vertex_selection_flags(&mut flags, 4..6, &HashSet::new(), &new);
        assert_eq!(flags, vec![0, 0, 0, 0, 16, 16]);
    }

    #[test]
    fn edge_diff_goes_through_the_lookup() {
        let lookup = HashMap::from([(EdgeKey::new(0, 1), 2), (EdgeKey::new(1, 2), 0)]);
        let mut flags = vec![0; 3];
        let new = HashSet::from([EdgeKey::new(1, 0), EdgeKey::new(5, 6)]);
        FlagManager::update_edge_selection_flags(&mut flags, &lookup, &HashSet::new(), &new);
        assert_eq!(flags, vec![0, 0, ElementFlags::EDGE_SELECTED.bits()]);

        FlagManager::update_edge_selection_flags(&mut flags, &lookup, &new, &HashSet::new());
        assert_eq!(flags, vec![0; 3]);
    }

    #[test]
    fn hover_is_exclusive() {
        let mut flags = vec![0; 4];
        FlagManager::set_hover_flag(&mut flags, Some(1));
        FlagManager::set_hover_flag(&mut flags, Some(3));
        let hovered: Vec<_> = flags
            .iter()
            .map(|w| ElementFlags::from_word(*w).contains(ElementFlags::HOVERED))
            .collect();
        assert_eq!(hovered, vec![false, false, false, true]);

        FlagManager::set_hover_flag(&mut flags, None);
        assert!(flags.iter().all(|w| *w == 0));
    }

    #[test]
    fn hiding_clears_hover() {
        let mut flags = vec![ElementFlags::HOVERED.bits()];
        assert!(FlagManager::set_hidden_flag(&mut flags, 0, true));
        assert_eq!(flags[0], ElementFlags::HIDDEN.bits());
        assert!(!FlagManager::set_hidden_flag(&mut flags, 7, true));
    }
}
