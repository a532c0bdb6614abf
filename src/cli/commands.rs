//! CLI command implementations
//!
//! Each command opens its own session and closes it before returning.
//! Mutating commands open read-write, apply one change and commit; the
//! rest open read-only.

use std::io::{self, Write};
use std::path::Path;

use serde_json::{json, Value};

use crate::config::DbConfig;
use crate::db::{CreateOptions, MultiDb};
use crate::errors::DbError;
use crate::lock::{clear_stale_lock, is_locked, read_holder};
use crate::query::Predicate;
use crate::session::AccessMode;
use crate::tree::Coordinate;

use super::args::{Cli, Command};
use super::errors::{CliError, CliResult};
use super::io::{write_error, write_response};

/// Parse arguments, run the command and print its JSON response on stdout.
///
/// Returns whether the command succeeded. A failed command is reported
/// only through its JSON envelope; `Err` means the response itself could
/// not be written.
pub fn run() -> CliResult<bool> {
    let cli = Cli::parse_args();
    run_to(&cli, &mut io::stdout().lock())
}

/// [`run`] for an already parsed command line, writing to `out`
pub fn run_to<W: Write>(cli: &Cli, out: &mut W) -> CliResult<bool> {
    match execute(cli) {
        Ok(data) => write_response(out, data).map(|()| true),
        Err(e) => write_error(out, e.code_str(), e.message()).map(|()| false),
    }
}

/// Runs a parsed command and returns its `data` payload
pub fn execute(cli: &Cli) -> CliResult<Value> {
    let config = match &cli.config {
        Some(path) => DbConfig::load(path)?,
        None => DbConfig::default(),
    };
    config.apply_log_level()?;

    run_command(&cli.command, &config)
}

/// Run the appropriate command
pub fn run_command(cmd: &Command, config: &DbConfig) -> CliResult<Value> {
    match cmd {
        Command::Init {
            db,
            dimensions,
            force,
        } => init(db, *dimensions, *force, config),
        Command::Get { db, coords } => get(db, coords, config),
        Command::Set { db, coords, value } => set(db, coords, value, config),
        Command::Delete { db, coords } => delete(db, coords, config),
        Command::List { db, prefix, depth } => list(db, prefix, *depth, config),
        Command::Find {
            db,
            prefix,
            predicate,
        } => find(db, prefix, predicate, config),
        Command::Info { db } => info(db, config),
        Command::Unlock { db } => unlock(db),
    }
}

pub fn init(db: &Path, dimensions: usize, force: bool, config: &DbConfig) -> CliResult<Value> {
    let options = CreateOptions::default()
        .overwrite(force)
        .config(config.clone());
    let mut session = MultiDb::create_with(db, dimensions, options)?;
    session.close()?;

    Ok(json!({
        "path": db.display().to_string(),
        "dimensions": dimensions,
    }))
}

pub fn get(db: &Path, coords: &str, config: &DbConfig) -> CliResult<Value> {
    let coordinate = parse_coordinate(coords)?;
    let mut session = MultiDb::open_with(db, AccessMode::ReadOnly, config)?;
    let value = session.get(&coordinate)?;
    session.close()?;

    value.ok_or_else(|| DbError::NotFound(coordinate).into())
}

pub fn set(db: &Path, coords: &str, value: &str, config: &DbConfig) -> CliResult<Value> {
    let coordinate = parse_coordinate(coords)?;
    let value: Value = serde_json::from_str(value)
        .map_err(|e| CliError::invalid_argument(format!("value is not valid JSON: {}", e)))?;

    let mut session = MultiDb::open_with(db, AccessMode::ReadWrite, config)?;
    session.set(&coordinate, value)?;
    session.commit()?;
    session.close()?;

    Ok(json!({ "coordinate": coordinate }))
}

pub fn delete(db: &Path, coords: &str, config: &DbConfig) -> CliResult<Value> {
    let coordinate = parse_coordinate(coords)?;

    let mut session = MultiDb::open_with(db, AccessMode::ReadWrite, config)?;
    session.delete(&coordinate)?;
    session.commit()?;
    session.close()?;

    Ok(json!({ "coordinate": coordinate }))
}

pub fn list(db: &Path, prefix: &str, depth: Option<usize>, config: &DbConfig) -> CliResult<Value> {
    let prefix = parse_coordinate(prefix)?;
    let mut session = MultiDb::open_with(db, AccessMode::ReadOnly, config)?;
    let coordinates = session.list(prefix, depth)?;
    session.close()?;

    Ok(json!(coordinates))
}

pub fn find(db: &Path, prefix: &str, predicate: &str, config: &DbConfig) -> CliResult<Value> {
    let prefix = parse_coordinate(prefix)?;
    let predicate: Predicate = serde_json::from_str(predicate)
        .map_err(|e| CliError::invalid_argument(format!("invalid predicate: {}", e)))?;

    let mut session = MultiDb::open_with(db, AccessMode::ReadOnly, config)?;
    let found = session.find(prefix, &predicate)?;
    session.close()?;

    let rows: Vec<Value> = found
        .into_iter()
        .map(|(coordinate, value)| json!({ "coordinate": coordinate, "value": value }))
        .collect();
    Ok(Value::Array(rows))
}

pub fn info(db: &Path, config: &DbConfig) -> CliResult<Value> {
    let mut session = MultiDb::open_with(db, AccessMode::ReadOnly, config)?;
    let dimensions = session.dimensions();
    let leaves = session.list(Coordinate::root(), None)?.len();
    session.close()?;

    let locked = is_locked(db).map_err(DbError::from)?;
    let holder = if locked { read_holder(db) } else { None };
    Ok(json!({
        "path": db.display().to_string(),
        "dimensions": dimensions,
        "leaves": leaves,
        "locked": locked,
        "lock_holder": holder,
    }))
}

pub fn unlock(db: &Path) -> CliResult<Value> {
    let holder = read_holder(db);
    let removed = clear_stale_lock(db).map_err(DbError::from)?;
    Ok(json!({ "removed": removed, "previous_holder": holder }))
}

/// `a,b,c`, `["a","b"]`, or empty for the root prefix
fn parse_coordinate(raw: &str) -> CliResult<Coordinate> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(Coordinate::root());
    }
    if trimmed.starts_with('[') {
        let components: Vec<String> = serde_json::from_str(trimmed).map_err(|e| {
            CliError::invalid_argument(format!(
                "coordinate must be a JSON array of strings: {}",
                e
            ))
        })?;
        return Ok(Coordinate::from(components));
    }
    Ok(Coordinate::new(raw.split(',')))
}
