//! Query evaluator for multidb
//!
//! Read-only `list` and `find` over the merged (snapshot + overlay) view.
//!
//! # Rules
//!
//! - Queries never mutate state
//! - Output order is depth-first over sorted component keys
//! - A prefix with no data yields an empty result; a malformed prefix or
//!   depth is a validation error
//! - Predicate field paths that do not resolve evaluate to false

mod compare;
mod evaluator;
mod predicate;

pub use compare::{compare_values, values_equal};
pub use evaluator::QueryEvaluator;
pub use predicate::{CompareOp, CompiledPredicate, FieldPath, FieldPredicate, PathSegment, Predicate};
