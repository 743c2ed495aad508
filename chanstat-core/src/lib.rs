//! # chanstat-core
//!
//! Core library for chanstat - an IRC channel log statistics collector.
//!
//! This library provides:
//! - Log format grammars (irssi, mIRC) turning lines into channel events
//! - Per-run aggregation of nick, word and channel activity
//! - Database storage layer with SQLite, merged incrementally across runs
//! - Configuration management
//! - Logging infrastructure
//!
//! ## Architecture
//!
//! Data flows through three layers:
//! - **Raw:** Channel log files on disk, plain or gzip-compressed (never modified)
//! - **Run:** Aggregates built in memory while one log is read
//! - **Stored:** SQLite tables that each run's aggregates are merged into
//!
//! ## Example
//!
//! ```rust,no_run
//! use chanstat_core::{Config, Database, LogIngest};
//! use std::path::Path;
//!
//! let config = Config::load().expect("failed to load config");
//!
//! let db = Database::open(&Config::database_path()).expect("failed to open database");
//! db.migrate().expect("failed to run migrations");
//!
//! let ingest = LogIngest::new(db, config.parser);
//! let path = Path::new("#chan.20110314.log");
//! let date = chanstat_core::ingest::date_from_filename(path).expect("dated log");
//! ingest.ingest_file(path, date, None).expect("parse failed");
//! ```

// Re-export commonly used items at the crate root
pub use aggregate::Aggregator;
pub use config::{Config, ParserConfig};
pub use db::{Database, StatsSink};
pub use error::{Error, Result};
pub use ingest::{LogFormat, LogIngest, ParseReport};
pub use types::*;

// Public modules
pub mod aggregate;
pub mod config;
pub mod db;
pub mod error;
pub mod ingest;
pub mod logging;
pub mod normalize;
pub mod types;
pub mod url;
