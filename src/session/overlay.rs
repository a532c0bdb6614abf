//! Pending writes of one session
//!
//! Keyed by full coordinate. A later write to the same coordinate replaces
//! the earlier one, so the map always holds the last write per coordinate.

use std::collections::btree_map;
use std::collections::BTreeMap;

use serde_json::Value;

use crate::tree::Coordinate;

/// One uncommitted change
#[derive(Debug, Clone, PartialEq)]
pub enum PendingWrite {
    /// Replacement value
    Put(Value),
    /// Delete marker
    Tombstone,
}

/// Ordered map from coordinate to pending write
#[derive(Debug, Clone, Default)]
pub struct Overlay {
    writes: BTreeMap<Coordinate, PendingWrite>,
}

impl Overlay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&mut self, coordinate: Coordinate, value: Value) {
        self.writes.insert(coordinate, PendingWrite::Put(value));
    }

    pub fn tombstone(&mut self, coordinate: Coordinate) {
        self.writes.insert(coordinate, PendingWrite::Tombstone);
    }

    pub fn get(&self, coordinate: &Coordinate) -> Option<&PendingWrite> {
        self.writes.get(coordinate)
    }

    pub fn len(&self) -> usize {
        self.writes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }

    pub fn clear(&mut self) {
        self.writes.clear();
    }

    pub fn iter(&self) -> btree_map::Iter<'_, Coordinate, PendingWrite> {
        self.writes.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_last_write_wins() {
        let mut overlay = Overlay::new();
        let c = Coordinate::from(["a", "b"]);

        overlay.put(c.clone(), json!(1));
        overlay.put(c.clone(), json!(2));
        assert_eq!(overlay.get(&c), Some(&PendingWrite::Put(json!(2))));
        assert_eq!(overlay.len(), 1);

        overlay.tombstone(c.clone());
        assert_eq!(overlay.get(&c), Some(&PendingWrite::Tombstone));

        overlay.put(c.clone(), json!(3));
        assert_eq!(overlay.get(&c), Some(&PendingWrite::Put(json!(3))));
    }

    #[test]
    fn test_clear() {
        let mut overlay = Overlay::new();
        overlay.put(Coordinate::from(["x"]), json!(null));
        assert!(!overlay.is_empty());
        overlay.clear();
        assert!(overlay.is_empty());
    }
}
