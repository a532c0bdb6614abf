//! Recursive coordinate tree
//!
//! Interior nodes are maps keyed by coordinate component; nodes at depth
//! `dimensions` are leaves holding a JSON value. Keys are kept in a
//! `BTreeMap` so every traversal is in sorted component order.
//!
//! # Invariants
//!
//! - Branches are never empty (removal prunes upward)
//! - Leaves only appear at depth `dimensions`

use std::collections::BTreeMap;

use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::{Map, Value};

/// A node of the coordinate tree
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Branch(Tree),
    Leaf(Value),
}

impl Node {
    pub fn as_branch(&self) -> Option<&Tree> {
        match self {
            Node::Branch(tree) => Some(tree),
            Node::Leaf(_) => None,
        }
    }

    pub fn as_leaf(&self) -> Option<&Value> {
        match self {
            Node::Leaf(value) => Some(value),
            Node::Branch(_) => None,
        }
    }

    /// Deep copy of this node as a plain JSON value
    pub fn to_value(&self) -> Value {
        match self {
            Node::Branch(tree) => tree.to_value(),
            Node::Leaf(value) => value.clone(),
        }
    }
}

impl Serialize for Node {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Node::Branch(tree) => tree.serialize(serializer),
            Node::Leaf(value) => value.serialize(serializer),
        }
    }
}

/// Structural problem found while building a tree from JSON.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShapeError {
    /// Components leading to the offending node
    pub path: Vec<String>,
    /// JSON type found where a map was required
    pub found: &'static str,
}

impl std::fmt::Display for ShapeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "expected an object at [{}], found {}",
            self.path.join(", "),
            self.found
        )
    }
}

/// Map from coordinate component to child node.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Tree {
    children: BTreeMap<String, Node>,
}

impl Tree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    /// Number of direct children
    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn children(&self) -> &BTreeMap<String, Node> {
        &self.children
    }

    /// Number of leaves in the whole tree
    pub fn leaf_count(&self) -> usize {
        self.children
            .values()
            .map(|node| match node {
                Node::Branch(tree) => tree.leaf_count(),
                Node::Leaf(_) => 1,
            })
            .sum()
    }

    /// Resolves a full coordinate to its leaf value
    pub fn get(&self, coordinate: &[String]) -> Option<&Value> {
        self.node(coordinate)?.as_leaf()
    }

    /// Resolves any prefix to the node it addresses.
    ///
    /// The empty prefix is not a node; use the tree itself for that.
    pub fn node(&self, prefix: &[String]) -> Option<&Node> {
        let (head, rest) = prefix.split_first()?;
        let child = self.children.get(head)?;
        if rest.is_empty() {
            return Some(child);
        }
        child.as_branch()?.node(rest)
    }

    /// Resolves a prefix to the subtree below it (the tree itself for `[]`)
    pub fn subtree(&self, prefix: &[String]) -> Option<&Tree> {
        if prefix.is_empty() {
            return Some(self);
        }
        self.node(prefix)?.as_branch()
    }

    /// Upserts a leaf, creating intermediate branches as needed
    pub fn insert(&mut self, coordinate: &[String], value: Value) {
        let Some((head, rest)) = coordinate.split_first() else {
            return;
        };

        if rest.is_empty() {
            self.children.insert(head.clone(), Node::Leaf(value));
            return;
        }

        let child = self
            .children
            .entry(head.clone())
            .or_insert_with(|| Node::Branch(Tree::new()));
        if let Node::Leaf(_) = child {
            *child = Node::Branch(Tree::new());
        }
        if let Node::Branch(tree) = child {
            tree.insert(rest, value);
        }
    }

    /// Removes a leaf and prunes every ancestor branch left empty.
    ///
    /// Returns the removed value, or `None` if nothing was stored there.
    pub fn remove(&mut self, coordinate: &[String]) -> Option<Value> {
        let (head, rest) = coordinate.split_first()?;

        if rest.is_empty() {
            if !matches!(self.children.get(head), Some(Node::Leaf(_))) {
                return None;
            }
            return match self.children.remove(head) {
                Some(Node::Leaf(value)) => Some(value),
                _ => None,
            };
        }

        let removed = match self.children.get_mut(head)? {
            Node::Branch(tree) => tree.remove(rest)?,
            Node::Leaf(_) => return None,
        };

        if matches!(self.children.get(head), Some(Node::Branch(tree)) if tree.is_empty()) {
            self.children.remove(head);
        }

        Some(removed)
    }

    /// Deep copy of the tree as a JSON object
    pub fn to_value(&self) -> Value {
        Value::Object(
            self.children
                .iter()
                .map(|(key, node)| (key.clone(), node.to_value()))
                .collect(),
        )
    }

    /// Builds a tree from the `data` block of a stored file.
    ///
    /// Every level above `dimensions` must be an object; whatever sits at
    /// depth `dimensions` is a leaf. Empty intermediate maps are dropped.
    pub fn from_value(data: Value, dimensions: usize) -> Result<Tree, ShapeError> {
        let mut path = Vec::new();
        match data {
            Value::Object(map) => Self::build(map, dimensions, &mut path),
            other => Err(ShapeError {
                path,
                found: json_type_name(&other),
            }),
        }
    }

    fn build(
        map: Map<String, Value>,
        remaining: usize,
        path: &mut Vec<String>,
    ) -> Result<Tree, ShapeError> {
        let mut children = BTreeMap::new();

        for (key, value) in map {
            if remaining <= 1 {
                children.insert(key, Node::Leaf(value));
                continue;
            }

            match value {
                Value::Object(inner) => {
                    path.push(key);
                    let subtree = Self::build(inner, remaining - 1, path)?;
                    let key = path.pop().unwrap_or_default();
                    if !subtree.is_empty() {
                        children.insert(key, Node::Branch(subtree));
                    }
                }
                other => {
                    path.push(key);
                    return Err(ShapeError {
                        path: path.clone(),
                        found: json_type_name(&other),
                    });
                }
            }
        }

        Ok(Tree { children })
    }
}

impl Serialize for Tree {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.children.len()))?;
        for (key, node) in &self.children {
            map.serialize_entry(key, node)?;
        }
        map.end()
    }
}

/// Human-readable JSON type name for diagnostics
pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn coord(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_insert_and_get() {
        let mut tree = Tree::new();
        tree.insert(&coord(&["a", "b", "c"]), json!(1));
        tree.insert(&coord(&["a", "b", "d"]), json!({"v": 2}));

        assert_eq!(tree.get(&coord(&["a", "b", "c"])), Some(&json!(1)));
        assert_eq!(tree.get(&coord(&["a", "b", "d"])), Some(&json!({"v": 2})));
        assert_eq!(tree.get(&coord(&["a", "b"])), None);
        assert_eq!(tree.get(&coord(&["a", "x", "c"])), None);
        assert_eq!(tree.leaf_count(), 2);
    }

    #[test]
    fn test_remove_prunes_empty_ancestors() {
        let mut tree = Tree::new();
        tree.insert(&coord(&["a", "b", "c"]), json!(1));
        tree.insert(&coord(&["x", "y", "z"]), json!(2));

        assert_eq!(tree.remove(&coord(&["a", "b", "c"])), Some(json!(1)));
        assert!(tree.node(&coord(&["a"])).is_none());
        assert_eq!(tree.len(), 1);
    }

    #[test]
    fn test_remove_stops_at_non_empty_ancestor() {
        let mut tree = Tree::new();
        tree.insert(&coord(&["e", "2025", "01"]), json!(1));
        tree.insert(&coord(&["e", "2025", "02"]), json!(2));

        tree.remove(&coord(&["e", "2025", "01"]));
        assert_eq!(tree.get(&coord(&["e", "2025", "02"])), Some(&json!(2)));

        tree.remove(&coord(&["e", "2025", "02"]));
        assert!(tree.is_empty());
    }

    #[test]
    fn test_remove_missing_is_none() {
        let mut tree = Tree::new();
        tree.insert(&coord(&["a", "b"]), json!(1));
        assert_eq!(tree.remove(&coord(&["a", "c"])), None);
        assert_eq!(tree.remove(&coord(&["z", "b"])), None);
        assert_eq!(tree.remove(&coord(&["a"])), None);
        assert_eq!(tree.leaf_count(), 1);
    }

    #[test]
    fn test_from_value_leaf_objects_stay_leaves() {
        let data = json!({"k": {"1": {"customer_id": "c1"}}});
        let tree = Tree::from_value(data, 2).unwrap();
        assert_eq!(
            tree.get(&coord(&["k", "1"])),
            Some(&json!({"customer_id": "c1"}))
        );
    }

    #[test]
    fn test_from_value_rejects_scalar_at_interior_level() {
        let data = json!({"a": {"b": 5}});
        let err = Tree::from_value(data, 3).unwrap_err();
        assert_eq!(err.path, coord(&["a", "b"]));
        assert_eq!(err.found, "number");
    }

    #[test]
    fn test_from_value_rejects_non_object_root() {
        let err = Tree::from_value(json!([1, 2]), 2).unwrap_err();
        assert!(err.path.is_empty());
        assert_eq!(err.found, "array");
    }

    #[test]
    fn test_from_value_drops_empty_branches() {
        let data = json!({"a": {}, "b": {"c": 1}});
        let tree = Tree::from_value(data, 2).unwrap();
        assert!(tree.node(&coord(&["a"])).is_none());
        assert_eq!(tree.len(), 1);
    }

    #[test]
    fn test_serialize_matches_to_value() {
        let mut tree = Tree::new();
        tree.insert(&coord(&["b", "1"]), json!([1, 2]));
        tree.insert(&coord(&["a", "2"]), json!(null));

        let serialized = serde_json::to_value(&tree).unwrap();
        assert_eq!(serialized, tree.to_value());
        assert_eq!(serialized, json!({"a": {"2": null}, "b": {"1": [1, 2]}}));
    }

    #[test]
    fn test_subtree_of_root_is_self() {
        let mut tree = Tree::new();
        tree.insert(&coord(&["a", "b"]), json!(1));
        assert_eq!(tree.subtree(&[]), Some(&tree));
        assert!(tree.subtree(&coord(&["a", "b"])).is_none());
        assert_eq!(tree.subtree(&coord(&["a"])).map(Tree::len), Some(1));
    }
}
