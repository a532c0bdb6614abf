//! Coordinate tree for multidb
//!
//! The in-memory document tree: a recursive map from coordinate component
//! to nested map or leaf value. Snapshots, merged views and the stored
//! `data` block all share this representation.

mod coordinate;
mod node;
mod value;

pub use coordinate::Coordinate;
pub use node::{json_type_name, Node, ShapeError, Tree};
pub use value::{from_leaf, to_leaf, validate_value};

use crate::errors::ValidationError;

/// Largest supported number of dimensions
pub const MAX_DIMENSIONS: usize = 32;

/// Deepest nesting allowed inside a single leaf value.
///
/// `MAX_DIMENSIONS + MAX_VALUE_DEPTH` plus the file envelope stays below
/// serde_json's default recursion limit of 128.
pub const MAX_VALUE_DEPTH: usize = 64;

/// Checks `1 <= dimensions <= MAX_DIMENSIONS`
pub fn validate_dimensions(dimensions: usize) -> Result<(), ValidationError> {
    if dimensions == 0 || dimensions > MAX_DIMENSIONS {
        return Err(ValidationError::Dimensions {
            max: MAX_DIMENSIONS,
            actual: dimensions,
        });
    }
    Ok(())
}
