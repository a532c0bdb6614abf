//! On-disk file format
//!
//! ```text
//! { "meta": { "dimensions": <positive integer> },
//!   "data": <nested object tree keyed by coordinate components, {} when empty> }
//! ```
//!
//! Decoding is all-or-nothing: any structural or type failure yields a
//! corruption error and no partial tree.

use serde::Serialize;
use serde_json::Value;

use crate::tree::{json_type_name, Tree, MAX_DIMENSIONS};

use super::errors::{StorageError, StorageResult};

/// Decoded contents of a storage file
#[derive(Debug, Clone, PartialEq)]
pub struct StoredImage {
    pub dimensions: usize,
    pub tree: Tree,
}

impl StoredImage {
    pub fn empty(dimensions: usize) -> Self {
        Self {
            dimensions,
            tree: Tree::new(),
        }
    }
}

#[derive(Serialize)]
struct MetaBlock {
    dimensions: usize,
}

#[derive(Serialize)]
struct FileImage<'a> {
    meta: MetaBlock,
    data: &'a Tree,
}

/// Serializes `{meta, data}` to bytes
pub fn encode(dimensions: usize, tree: &Tree, pretty: bool) -> StorageResult<Vec<u8>> {
    let image = FileImage {
        meta: MetaBlock { dimensions },
        data: tree,
    };

    let result = if pretty {
        serde_json::to_vec_pretty(&image)
    } else {
        serde_json::to_vec(&image)
    };

    result.map_err(|e| {
        StorageError::io_error(
            "Failed to serialize database image",
            std::io::Error::new(std::io::ErrorKind::InvalidData, e),
        )
    })
}

/// Parses and validates a storage file's bytes
pub fn decode(bytes: &[u8]) -> StorageResult<StoredImage> {
    let root: Value = serde_json::from_slice(bytes)
        .map_err(|e| StorageError::corruption(format!("File is not valid JSON: {}", e)))?;

    let mut root = match root {
        Value::Object(map) => map,
        other => {
            return Err(StorageError::corruption(format!(
                "Top level must be an object, found {}",
                json_type_name(&other)
            )))
        }
    };

    if let Some(extra) = root.keys().find(|k| *k != "meta" && *k != "data") {
        return Err(StorageError::corruption(format!(
            "Unexpected top-level key: {:?}",
            extra
        )));
    }

    let meta = root
        .remove("meta")
        .ok_or_else(|| StorageError::corruption("Missing meta block"))?;
    let data = root
        .remove("data")
        .ok_or_else(|| StorageError::corruption("Missing data block"))?;

    let dimensions = decode_dimensions(&meta)?;

    let tree = Tree::from_value(data, dimensions).map_err(|e| {
        StorageError::corruption("Data block does not match the declared dimensions")
            .with_details(e.to_string())
    })?;

    Ok(StoredImage { dimensions, tree })
}

fn decode_dimensions(meta: &Value) -> StorageResult<usize> {
    let meta = meta.as_object().ok_or_else(|| {
        StorageError::corruption(format!(
            "meta must be an object, found {}",
            json_type_name(meta)
        ))
    })?;

    let raw = meta
        .get("dimensions")
        .ok_or_else(|| StorageError::corruption("meta.dimensions is missing"))?;

    let dimensions = raw
        .as_u64()
        .filter(|d| *d > 0)
        .ok_or_else(|| {
            StorageError::corruption(format!(
                "meta.dimensions must be a positive integer, found {}",
                raw
            ))
        })?;

    if dimensions > MAX_DIMENSIONS as u64 {
        return Err(StorageError::corruption(format!(
            "meta.dimensions {} exceeds the supported maximum of {}",
            dimensions, MAX_DIMENSIONS
        )));
    }

    Ok(dimensions as usize)
}
