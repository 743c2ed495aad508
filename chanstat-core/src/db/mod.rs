//! Database layer for chanstat
//!
//! This module provides the storage layer using SQLite with:
//! - Schema migrations
//! - Merge-on-write upserts for run aggregates
//! - Resume cursors for incremental parsing

pub mod repo;
pub mod schema;

pub use repo::Database;

use crate::error::Result;
use crate::types::{ChannelDay, Nick, StreakState, Word};
use chrono::NaiveDate;

/// Destination for the aggregates of a parse run.
///
/// Writes merge into what is already stored: counters are added, timestamps
/// widen the first/last range, and display casing is overwritten.
pub trait StatsSink {
    /// Streak left open by the previous run (empty when none).
    fn load_streak(&self) -> Result<StreakState>;

    fn write_streak(&self, state: &StreakState) -> Result<()>;

    /// Merge one day of channel activity, keyed by date.
    fn write_channel_day(&self, day: &ChannelDay) -> Result<()>;

    /// Merge everything known about `nick` from a run covering `date`.
    fn write_nick(&self, nick: &Nick, date: NaiveDate) -> Result<()>;

    fn write_words(&self, words: &[&Word]) -> Result<()>;

    /// Next unprocessed line of `log`, if it was parsed before.
    fn resume_cursor(&self, log: &str) -> Result<Option<u64>>;

    fn set_resume_cursor(&self, log: &str, next_line: u64) -> Result<()>;
}
