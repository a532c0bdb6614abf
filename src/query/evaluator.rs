//! Read-only traversal of a merged tree
//!
//! Results are produced depth-first over sorted component keys, so every
//! query is deterministic.

use serde_json::Value;

use crate::errors::ValidationError;
use crate::observability::{log_event_with_fields, metrics, Event};
use crate::tree::{Coordinate, Node, Tree};

use super::predicate::CompiledPredicate;

/// Runs `list` and `find` over one tree view
pub struct QueryEvaluator<'a> {
    tree: &'a Tree,
    dimensions: usize,
}

impl<'a> QueryEvaluator<'a> {
    pub fn new(tree: &'a Tree, dimensions: usize) -> Self {
        Self { tree, dimensions }
    }

    /// Coordinates under `prefix`.
    ///
    /// Without `depth`, every full coordinate. With `depth`, the distinct
    /// coordinates truncated to `prefix.len() + depth` components. A prefix
    /// with no data yields an empty list.
    pub fn list(
        &self,
        prefix: &Coordinate,
        depth: Option<usize>,
    ) -> Result<Vec<Coordinate>, ValidationError> {
        prefix.validate_prefix(self.dimensions)?;

        let target = match depth {
            Some(depth) => {
                let target = prefix.len().checked_add(depth);
                match target {
                    Some(t) if t <= self.dimensions => t,
                    _ => {
                        return Err(ValidationError::Depth {
                            dimensions: self.dimensions,
                            prefix_len: prefix.len(),
                            depth,
                        })
                    }
                }
            }
            None => self.dimensions,
        };

        let mut out = Vec::new();
        if prefix.len() == target {
            if self.has_data(prefix) {
                out.push(prefix.clone());
            }
        } else if let Some(subtree) = self.tree.subtree(prefix.components()) {
            let mut path = prefix.components().to_vec();
            collect_coordinates(subtree, &mut path, target - prefix.len(), &mut out);
        }

        record_query("list", out.len());
        Ok(out)
    }

    /// Full coordinates under `prefix` whose leaf satisfies `predicate`
    pub fn find(
        &self,
        prefix: &Coordinate,
        predicate: &CompiledPredicate,
    ) -> Result<Vec<(Coordinate, &'a Value)>, ValidationError> {
        prefix.validate_prefix(self.dimensions)?;

        let mut out = Vec::new();
        if prefix.len() == self.dimensions {
            if let Some(value) = self.tree.get(prefix.components()) {
                if predicate.matches(value) {
                    out.push((prefix.clone(), value));
                }
            }
        } else if let Some(subtree) = self.tree.subtree(prefix.components()) {
            let mut path = prefix.components().to_vec();
            collect_matches(subtree, &mut path, predicate, &mut out);
        }

        record_query("find", out.len());
        Ok(out)
    }

    fn has_data(&self, prefix: &Coordinate) -> bool {
        if prefix.is_empty() {
            !self.tree.is_empty()
        } else {
            self.tree.node(prefix.components()).is_some()
        }
    }
}

fn collect_coordinates(
    tree: &Tree,
    path: &mut Vec<String>,
    remaining: usize,
    out: &mut Vec<Coordinate>,
) {
    for (key, node) in tree.children() {
        path.push(key.clone());
        if remaining == 1 {
            out.push(Coordinate::from(path.clone()));
        } else if let Node::Branch(child) = node {
            collect_coordinates(child, path, remaining - 1, out);
        }
        path.pop();
    }
}

fn collect_matches<'a>(
    tree: &'a Tree,
    path: &mut Vec<String>,
    predicate: &CompiledPredicate,
    out: &mut Vec<(Coordinate, &'a Value)>,
) {
    for (key, node) in tree.children() {
        path.push(key.clone());
        match node {
            Node::Branch(child) => collect_matches(child, path, predicate, out),
            Node::Leaf(value) => {
                if predicate.matches(value) {
                    out.push((Coordinate::from(path.clone()), value));
                }
            }
        }
        path.pop();
    }
}

fn record_query(operation: &str, results: usize) {
    metrics().increment_queries_executed();
    let results = results.to_string();
    log_event_with_fields(
        Event::QueryExecuted,
        &[("operation", operation), ("results", results.as_str())],
    );
}
