//! Crash point injection for testing durability
//!
//! When the `MULTIDB_CRASH_POINT` environment variable names a point that
//! execution reaches, the process terminates immediately via
//! `std::process::abort()`: no cleanup, no unwinding, no destructors.
//!
//! # Usage
//!
//! ```ignore
//! use multidb::crash_point::{maybe_crash, points};
//!
//! maybe_crash(points::STORAGE_BEFORE_RENAME);
//! ```
//!
//! # Testing
//!
//! `tests/crash_safety.rs` re-runs its own test binary as a child with the
//! variable set, then inspects the database file the child left behind.

use std::sync::OnceLock;

/// Environment variable consulted for the active crash point
pub const CRASH_POINT_ENV: &str = "MULTIDB_CRASH_POINT";

/// Cache the crash point name to avoid repeated env var lookups
static CRASH_POINT: OnceLock<Option<String>> = OnceLock::new();

#[inline]
fn get_crash_point() -> Option<&'static str> {
    CRASH_POINT
        .get_or_init(|| std::env::var(CRASH_POINT_ENV).ok())
        .as_deref()
}

/// Returns true if `MULTIDB_CRASH_POINT` equals the given name.
#[inline]
pub fn crash_point_enabled(name: &str) -> bool {
    get_crash_point().map(|p| p == name).unwrap_or(false)
}

/// Abort the process if the named crash point is enabled.
///
/// No-op when `MULTIDB_CRASH_POINT` is unset or names another point.
#[inline]
pub fn maybe_crash(name: &str) {
    if crash_point_enabled(name) {
        eprintln!("[CRASH] Triggering crash at point: {}", name);
        std::process::abort();
    }
}

/// All defined crash point names
pub mod points {
    // Storage file write path, in execution order
    pub const STORAGE_BEFORE_TEMP_WRITE: &str = "storage_before_temp_write";
    pub const STORAGE_AFTER_TEMP_WRITE: &str = "storage_after_temp_write";
    pub const STORAGE_BEFORE_RENAME: &str = "storage_before_rename";
    pub const STORAGE_AFTER_RENAME: &str = "storage_after_rename";

    // Session commit
    pub const COMMIT_BEFORE_WRITE: &str = "commit_before_write";
    pub const COMMIT_AFTER_WRITE: &str = "commit_after_write";

    /// Get all crash point names
    pub fn all() -> &'static [&'static str] {
        &[
            STORAGE_BEFORE_TEMP_WRITE,
            STORAGE_AFTER_TEMP_WRITE,
            STORAGE_BEFORE_RENAME,
            STORAGE_AFTER_RENAME,
            COMMIT_BEFORE_WRITE,
            COMMIT_AFTER_WRITE,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crash_point_disabled_by_default() {
        assert!(!crash_point_enabled("test_point"));
    }

    #[test]
    fn test_all_crash_points_defined() {
        let all = points::all();
        assert_eq!(all.len(), 6);
        assert!(all.contains(&"storage_before_rename"));
        assert!(all.contains(&"commit_after_write"));
    }

    #[test]
    fn test_crash_point_names_are_lowercase_with_underscores() {
        for point in points::all() {
            assert!(
                point.chars().all(|c| c.is_lowercase() || c == '_'),
                "Crash point '{}' should be lowercase with underscores",
                point
            );
        }
    }
}
