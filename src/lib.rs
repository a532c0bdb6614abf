//! multidb - an embedded, single-file, coordinate-addressed JSON document store
//!
//! Documents live at fixed-arity coordinates (`("u1", "2025", "01")`) in one
//! JSON file. Sessions buffer writes in an overlay and commit them with an
//! atomic whole-file replace; a lock file admits one writer at a time.
//!
//! ```ignore
//! use multidb::{AccessMode, MultiDb, Predicate};
//! use serde_json::json;
//!
//! let mut db = MultiDb::create("orders.json", 2)?;
//! db.set(["k", "1"], json!({"customer_id": "c1"}))?;
//! db.set(["k", "2"], json!({"customer_id": "c2"}))?;
//! db.commit()?;
//!
//! let hits = db.find(["k"], &Predicate::eq("customer_id", json!("c2")))?;
//! ```

pub mod cli;
pub mod config;
pub mod crash_point;
pub mod db;
pub mod errors;
pub mod lock;
pub mod observability;
pub mod query;
pub mod session;
pub mod storage;
pub mod tree;

pub use config::DbConfig;
pub use db::{CreateOptions, MultiDb};
pub use errors::{DbError, DbResult, ErrorKind, ValidationError};
pub use query::{CompareOp, FieldPath, Predicate};
pub use session::{AccessMode, Session};
pub use tree::Coordinate;
