//! Merge-and-prune
//!
//! Produces the tree a commit would persist: the snapshot with every pending
//! write applied. Neither input is modified.

use std::borrow::Cow;

use crate::tree::Tree;

use super::overlay::{Overlay, PendingWrite};

/// Returns `snapshot` with `overlay` applied.
///
/// Puts upsert their leaf. Tombstones remove theirs and prune every
/// ancestor map left empty, up to the first non-empty one.
pub fn merge(snapshot: &Tree, overlay: &Overlay) -> Tree {
    let mut merged = snapshot.clone();
    for (coordinate, write) in overlay.iter() {
        match write {
            PendingWrite::Put(value) => merged.insert(coordinate.components(), value.clone()),
            PendingWrite::Tombstone => {
                merged.remove(coordinate.components());
            }
        }
    }
    merged
}

/// The merged read view, borrowing the snapshot when nothing is pending
pub fn view<'a>(snapshot: &'a Tree, overlay: &Overlay) -> Cow<'a, Tree> {
    if overlay.is_empty() {
        Cow::Borrowed(snapshot)
    } else {
        Cow::Owned(merge(snapshot, overlay))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::Coordinate;
    use serde_json::json;

    fn path(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_merge_leaves_inputs_untouched() {
        let mut snapshot = Tree::new();
        snapshot.insert(&path(&["a", "b"]), json!(1));

        let mut overlay = Overlay::new();
        overlay.put(Coordinate::from(["a", "c"]), json!(2));
        overlay.tombstone(Coordinate::from(["a", "b"]));

        let merged = merge(&snapshot, &overlay);
        assert_eq!(merged.get(&path(&["a", "c"])), Some(&json!(2)));
        assert_eq!(merged.get(&path(&["a", "b"])), None);

        assert_eq!(snapshot.get(&path(&["a", "b"])), Some(&json!(1)));
        assert_eq!(overlay.len(), 2);
    }

    #[test]
    fn test_tombstone_prunes_empty_ancestors() {
        let mut snapshot = Tree::new();
        snapshot.insert(&path(&["a", "b", "c"]), json!(1));
        snapshot.insert(&path(&["z", "y", "x"]), json!(2));

        let mut overlay = Overlay::new();
        overlay.tombstone(Coordinate::from(["a", "b", "c"]));

        let merged = merge(&snapshot, &overlay);
        assert!(merged.node(&path(&["a"])).is_none());
        assert_eq!(merged.len(), 1);
    }

    #[test]
    fn test_pruning_stops_at_non_empty_ancestor() {
        let mut snapshot = Tree::new();
        snapshot.insert(&path(&["a", "b", "c"]), json!(1));
        snapshot.insert(&path(&["a", "x", "y"]), json!(2));

        let mut overlay = Overlay::new();
        overlay.tombstone(Coordinate::from(["a", "b", "c"]));

        let merged = merge(&snapshot, &overlay);
        assert!(merged.node(&path(&["a", "b"])).is_none());
        assert!(merged.node(&path(&["a"])).is_some());
    }

    #[test]
    fn test_view_borrows_when_clean() {
        let snapshot = Tree::new();
        let overlay = Overlay::new();
        assert!(matches!(view(&snapshot, &overlay), Cow::Borrowed(_)));
    }
}
