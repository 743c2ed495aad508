//! Parser trait abstraction
//!
//! A log format grammar implements [`LineParser`]: it receives one normalized
//! line at a time and reports what happened through the [`EventHandler`]
//! entry points. The grammar never touches counters itself.
//!
//! ## Design Principles
//!
//! 1. **Typed events**: grammars hand over already-parsed fields
//! 2. **Resilience**: unrecognized lines are ignored, never fatal
//! 3. **Lookback**: the previous normalized line is available for grammars
//!    that need it (multi-line events)

use crate::types::ModeChange;
use chrono::{NaiveDate, NaiveDateTime};

/// Entry points invoked by a [`LineParser`], one per event kind.
///
/// Every entry point validates its nick arguments before mutating anything.
pub trait EventHandler {
    /// `* nick does something`
    fn record_action(&mut self, datetime: NaiveDateTime, nick: &str, line: &str);

    fn record_join(&mut self, datetime: NaiveDateTime, nick: &str);

    fn record_part(&mut self, datetime: NaiveDateTime, nick: &str);

    fn record_quit(&mut self, datetime: NaiveDateTime, nick: &str);

    /// `performing` kicked `undergoing`; `line` is kept as an example.
    fn record_kick(
        &mut self,
        datetime: NaiveDateTime,
        performing: &str,
        undergoing: &str,
        line: &str,
    );

    fn record_mode(
        &mut self,
        datetime: NaiveDateTime,
        performing: &str,
        undergoing: &str,
        mode: ModeChange,
    );

    /// `performing` is now known as `undergoing`.
    fn record_nickchange(&mut self, datetime: NaiveDateTime, performing: &str, undergoing: &str);

    /// An ordinary chat line.
    fn record_normal(&mut self, datetime: NaiveDateTime, nick: &str, line: &str);

    /// `undergoing` is optional: some clients log slaps without a target.
    fn record_slap(&mut self, datetime: NaiveDateTime, performing: &str, undergoing: Option<&str>);

    fn record_topic(&mut self, datetime: NaiveDateTime, nick: &str, topic: &str);
}

/// One normalized line with its position in the log.
#[derive(Debug, Clone, Copy)]
pub struct LineContext<'a> {
    /// Current normalized line
    pub line: &'a str,
    /// Previous normalized line (empty at the start of a run)
    pub prev_line: &'a str,
    /// 1-based line number in the source file
    pub line_number: u64,
    /// Date the log covers; timestamps in lines are times of this day
    pub date: NaiveDate,
}

/// Trait implemented by all log format grammars.
pub trait LineParser {
    /// Name of the format, for diagnostics
    fn name(&self) -> &'static str;

    /// Parse one line and invoke the matching entry points on `events`.
    ///
    /// Lines the grammar does not recognize are silently ignored.
    fn parse_line(&mut self, ctx: &LineContext<'_>, events: &mut dyn EventHandler);
}
