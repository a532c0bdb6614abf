//! Storage file subsystem for multidb
//!
//! Durable, atomic persistence of `{dimensions, tree}` to one path.
//!
//! # Design Principles
//!
//! - Whole-file replacement via temp file + fsync + rename
//! - All-or-nothing reads: corruption is reported, never partially loaded
//! - A missing file is a distinct "absent" condition, not corruption
//! - Existing files are never silently overwritten by `create`
//!
//! Readers take no lock: atomic replacement already guarantees they see
//! either the previous or the next complete file.

mod errors;
mod file;
mod format;

pub use errors::{Severity, StorageError, StorageErrorCode, StorageResult};
pub use file::{StagedWrite, StorageFile};
pub use format::{decode, encode, StoredImage};
