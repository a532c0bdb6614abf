//! CLI argument definitions using clap
//!
//! Commands:
//! - multidb init <db> --dimensions N [--force]
//! - multidb get <db> <coords>
//! - multidb set <db> <coords> <json>
//! - multidb delete <db> <coords>
//! - multidb list <db> [--prefix a,b] [--depth K]
//! - multidb find <db> [--prefix a,b] --where <predicate-json>
//! - multidb info <db>
//! - multidb unlock <db>
//!
//! Coordinates are comma separated (`u1,2025,01`) or a JSON array of
//! strings (`["a,b","c"]`) when a component contains a comma.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// multidb - an embedded, coordinate-addressed JSON document store
#[derive(Parser, Debug)]
#[command(name = "multidb")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to a JSON configuration file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create a new, empty database file
    Init {
        db: PathBuf,
        /// Number of components in every coordinate
        #[arg(long, short = 'd')]
        dimensions: usize,
        /// Replace an existing file
        #[arg(long)]
        force: bool,
    },

    /// Print the value at a coordinate
    Get { db: PathBuf, coords: String },

    /// Store a JSON value at a coordinate and commit
    Set {
        db: PathBuf,
        coords: String,
        value: String,
    },

    /// Delete the value at a coordinate and commit
    Delete { db: PathBuf, coords: String },

    /// List coordinates under a prefix
    List {
        db: PathBuf,
        #[arg(long, default_value = "")]
        prefix: String,
        /// Group by this many components below the prefix
        #[arg(long)]
        depth: Option<usize>,
    },

    /// Find documents matching a predicate
    Find {
        db: PathBuf,
        #[arg(long, default_value = "")]
        prefix: String,
        /// Predicate as JSON, e.g. {"field":{"path":"status","op":"eq","value":"open"}}
        #[arg(long = "where")]
        predicate: String,
    },

    /// Show dimensions, size and lock state
    Info { db: PathBuf },

    /// Remove a lock file left by a crashed process
    Unlock { db: PathBuf },
}

impl Cli {
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
