//! Leaf value well-formedness
//!
//! `serde_json::Value` cannot hold cycles or non-finite numbers, so the
//! remaining constraint is nesting depth: a stored file must parse back
//! under serde_json's recursion limit.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::errors::ValidationError;

use super::MAX_VALUE_DEPTH;

/// Checks that a leaf value nests at most `MAX_VALUE_DEPTH` levels.
///
/// Iterative so that hostile inputs cannot exhaust the stack here.
pub fn validate_value(value: &Value) -> Result<(), ValidationError> {
    let mut stack: Vec<(&Value, usize)> = vec![(value, 1)];

    while let Some((current, depth)) = stack.pop() {
        if depth > MAX_VALUE_DEPTH {
            return Err(ValidationError::ValueTooDeep {
                max: MAX_VALUE_DEPTH,
            });
        }
        match current {
            Value::Array(items) => stack.extend(items.iter().map(|v| (v, depth + 1))),
            Value::Object(map) => stack.extend(map.values().map(|v| (v, depth + 1))),
            _ => {}
        }
    }

    Ok(())
}

/// Converts any serializable value into a validated leaf.
///
/// Fails for types JSON cannot express, e.g. maps with non-string keys.
pub fn to_leaf<T: Serialize + ?Sized>(value: &T) -> Result<Value, ValidationError> {
    let value = serde_json::to_value(value)
        .map_err(|e| ValidationError::Unrepresentable(e.to_string()))?;
    validate_value(&value)?;
    Ok(value)
}

/// Decodes a stored leaf into a caller type
pub fn from_leaf<T: DeserializeOwned>(value: Value) -> Result<T, ValidationError> {
    serde_json::from_value(value).map_err(|e| ValidationError::Decode(e.to_string()))
}
