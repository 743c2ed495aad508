//! Ingestion layer for parsing channel log files
//!
//! This module drives one parse run: raw log lines are normalized, turned into
//! events by a format grammar, aggregated, and merged into the database.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌──────────────────┐     ┌─────────────────┐
//! │    Log file     │ ──► │    LogIngest     │ ──► │   StatsSink     │
//! │ (plain or .gz)  │     │                  │     │   (Database)    │
//! └─────────────────┘     └──────────────────┘     └─────────────────┘
//!                               │
//!                               ▼
//!                    ┌──────────────────────┐
//!                    │  LineParser          │
//!                    │  ├─ IrssiParser      │
//!                    │  └─ MircParser       │
//!                    └──────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use chanstat_core::{Config, Database};
//! use chanstat_core::ingest::LogIngest;
//!
//! let config = Config::load()?;
//! let db = Database::open(&Config::database_path())?;
//! db.migrate()?;
//!
//! let ingest = LogIngest::new(db, config.parser);
//! let report = ingest.ingest_file(path, date, None)?;
//! println!("{} messages, next line {}", report.messages, report.next_line);
//! ```

pub mod formats;
pub mod parser;
pub mod reader;

pub use formats::{parser_for, LogFormat};
pub use parser::{EventHandler, LineContext, LineParser};
pub use reader::{parse_log, parse_stream, ParseOutcome};

use crate::aggregate::Aggregator;
use crate::config::ParserConfig;
use crate::db::StatsSink;
use crate::error::Result;
use chrono::NaiveDate;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

static FILENAME_DATE: OnceLock<Regex> = OnceLock::new();

/// Summary of one parse run.
#[derive(Debug, Clone)]
pub struct ParseReport {
    /// Log file that was parsed
    pub path: PathBuf,
    /// Date the log covers
    pub date: NaiveDate,
    /// Line the run started at
    pub first_line: u64,
    /// Line the next run starts at
    pub next_line: u64,
    /// Lines handed to the format parser
    pub lines_parsed: u64,
    /// Chat messages counted
    pub messages: u64,
    /// Distinct nicks touched
    pub nicks: usize,
    /// Distinct dictionary words seen
    pub words: usize,
    /// Events skipped because of invalid nicks
    pub warnings: u64,
}

impl ParseReport {
    /// True when the run did not advance past what was already parsed.
    pub fn is_up_to_date(&self) -> bool {
        self.lines_parsed <= 1 && self.messages == 0 && self.next_line == self.first_line
    }
}

/// Runs parse jobs against a statistics sink.
///
/// The coordinator is responsible for:
/// - Loading the resume cursor and the open streak from the sink
/// - Driving the stream reader with the configured grammar
/// - Flushing the run's aggregates and recording the new cursor
pub struct LogIngest<S: StatsSink> {
    sink: S,
    config: ParserConfig,
}

impl<S: StatsSink> LogIngest<S> {
    pub fn new(sink: S, config: ParserConfig) -> Self {
        Self { sink, config }
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn config(&self) -> &ParserConfig {
        &self.config
    }

    /// Parse one log file covering `date`.
    ///
    /// `first_line` overrides the stored resume cursor; without it the run
    /// continues where the previous run on the same file stopped.
    pub fn ingest_file(
        &self,
        path: &Path,
        date: NaiveDate,
        first_line: Option<u64>,
    ) -> Result<ParseReport> {
        let key = cursor_key(path);
        let first_line = match first_line {
            Some(line) => line,
            None => self.sink.resume_cursor(&key)?.unwrap_or(1),
        }
        .max(1);

        let mut stats = Aggregator::new(&self.config, date);
        stats.restore_streak(self.sink.load_streak()?);

        let mut parser = parser_for(self.config.format);
        let outcome = parse_log(path, first_line, parser.as_mut(), &mut stats)?;

        stats.flush(&self.sink)?;
        self.sink.set_resume_cursor(&key, outcome.next_line)?;

        if stats.warnings() > 0 {
            tracing::warn!(
                path = %path.display(),
                warnings = stats.warnings(),
                "Events skipped due to invalid nicks"
            );
        }

        Ok(ParseReport {
            path: path.to_path_buf(),
            date,
            first_line,
            next_line: outcome.next_line,
            lines_parsed: outcome.lines_parsed,
            messages: stats.messages(),
            nicks: stats.nicks().len(),
            words: stats.words().len(),
            warnings: stats.warnings(),
        })
    }

    /// Stored resume cursor for `path`, if it was parsed before.
    pub fn resume_cursor(&self, path: &Path) -> Result<Option<u64>> {
        self.sink.resume_cursor(&cursor_key(path))
    }
}

/// Key under which the resume cursor of `path` is stored.
///
/// Paths are canonicalized when possible so relative and absolute spellings
/// share one cursor.
pub fn cursor_key(path: &Path) -> String {
    std::fs::canonicalize(path)
        .unwrap_or_else(|_| path.to_path_buf())
        .to_string_lossy()
        .into_owned()
}

/// Extract the log date from a file name such as `#chan.20110314.log` or
/// `chan-2011-03-14.log.gz`.
pub fn date_from_filename(path: &Path) -> Option<NaiveDate> {
    let name = path.file_name()?.to_str()?;
    let re = formats::pattern(
        &FILENAME_DATE,
        r"(?:^|\D)(\d{4})(?:-(\d{2})-(\d{2})|(\d{2})(\d{2}))(?:\D|$)",
    );

    re.captures_iter(name).find_map(|c| {
        let year = c[1].parse().ok()?;
        let month = c.get(2).or_else(|| c.get(4))?.as_str().parse().ok()?;
        let day = c.get(3).or_else(|| c.get(5))?.as_str().parse().ok()?;
        NaiveDate::from_ymd_opt(year, month, day)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_date_from_filename_compact() {
        assert_eq!(
            date_from_filename(Path::new("/logs/#chan.20110314.log")),
            NaiveDate::from_ymd_opt(2011, 3, 14)
        );
    }

    #[test]
    fn test_date_from_filename_dashed() {
        assert_eq!(
            date_from_filename(Path::new("chan-2011-03-14.log.gz")),
            NaiveDate::from_ymd_opt(2011, 3, 14)
        );
    }

    #[test]
    fn test_date_from_filename_invalid() {
        assert!(date_from_filename(Path::new("chan.log")).is_none());
        assert!(date_from_filename(Path::new("chan.20111399.log")).is_none());
        assert!(date_from_filename(Path::new("chan.2011031499.log")).is_none());
    }

    #[test]
    fn test_cursor_key_falls_back_to_given_path() {
        assert_eq!(
            cursor_key(Path::new("/nonexistent/chan.log")),
            "/nonexistent/chan.log"
        );
    }
}
