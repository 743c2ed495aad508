//! Log format grammars
//!
//! Each supported client has a module implementing
//! [`LineParser`](super::parser::LineParser).
//!
//! ## Supported Formats
//!
//! | Client | Module | Timestamp |
//! |--------|--------|-----------|
//! | irssi | [`irssi`] | `HH:MM[:SS]` |
//! | mIRC | [`mirc`] | `[HH:MM[:SS]]` |

mod irssi;
mod mirc;

pub use irssi::IrssiParser;
pub use mirc::MircParser;

use super::parser::LineParser;
use crate::error::Error;
use crate::types::ModeChange;
use chrono::{NaiveDate, NaiveDateTime};
use regex::Regex;
use serde::Deserialize;
use std::str::FromStr;
use std::sync::OnceLock;

/// Log formats with a grammar implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Irssi,
    Mirc,
}

impl LogFormat {
    pub const ALL: [LogFormat; 2] = [LogFormat::Irssi, LogFormat::Mirc];

    pub fn as_str(&self) -> &'static str {
        match self {
            LogFormat::Irssi => "irssi",
            LogFormat::Mirc => "mirc",
        }
    }
}

impl std::fmt::Display for LogFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for LogFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "irssi" => Ok(LogFormat::Irssi),
            "mirc" => Ok(LogFormat::Mirc),
            _ => Err(Error::Parse {
                format: s.to_string(),
                message: format!(
                    "unknown log format (expected one of: {})",
                    LogFormat::ALL.map(|f| f.as_str()).join(", ")
                ),
            }),
        }
    }
}

/// Get the parser for a log format.
pub fn parser_for(format: LogFormat) -> Box<dyn LineParser> {
    match format {
        LogFormat::Irssi => Box::new(IrssiParser::new()),
        LogFormat::Mirc => Box::new(MircParser::new()),
    }
}

/// Compile a grammar pattern once.
pub(crate) fn pattern(cell: &'static OnceLock<Regex>, source: &str) -> &'static Regex {
    cell.get_or_init(|| Regex::new(source).expect("grammar pattern is valid"))
}

/// Combine captured `HH`, `MM` and optional `SS` with the log date.
///
/// Returns `None` for out-of-range clock values.
pub(crate) fn timestamp(
    date: NaiveDate,
    hour: &str,
    minute: &str,
    second: Option<&str>,
) -> Option<NaiveDateTime> {
    let hour = hour.parse().ok()?;
    let minute = minute.parse().ok()?;
    let second = match second {
        Some(s) => s.parse().ok()?,
        None => 0,
    };
    date.and_hms_opt(hour, minute, second)
}

/// Pair a mode string such as `+o-v` with its nick arguments.
///
/// Returns `None` unless every mode letter is a tracked one and there is
/// exactly one argument per letter.
pub(crate) fn mode_changes<'a>(modes: &str, nicks: &'a str) -> Option<Vec<(ModeChange, &'a str)>> {
    let nicks: Vec<&str> = nicks.split(' ').collect();
    let mut changes = Vec::with_capacity(nicks.len());
    let mut sign = None;

    for c in modes.chars() {
        match c {
            '+' | '-' => sign = Some(c),
            mode => {
                let change = ModeChange::from_flag(sign?, mode)?;
                let nick = *nicks.get(changes.len())?;
                changes.push((change, nick));
            }
        }
    }

    (changes.len() == nicks.len()).then_some(changes)
}
