//! mIRC log grammar
//!
//! ```text
//! [14:02] <alice> hello there
//! [14:02] * alice waves
//! [14:03] * bob (~bob@example.com) has joined #chan
//! [14:04] * alice sets mode: +o-v bob carol
//! ```

use super::{mode_changes, pattern, timestamp};
use crate::ingest::parser::{EventHandler, LineContext, LineParser};
use chrono::NaiveDateTime;
use regex::Regex;
use std::sync::OnceLock;

static LINE: OnceLock<Regex> = OnceLock::new();
static NORMAL: OnceLock<Regex> = OnceLock::new();
static JOIN: OnceLock<Regex> = OnceLock::new();
static PART: OnceLock<Regex> = OnceLock::new();
static QUIT: OnceLock<Regex> = OnceLock::new();
static KICK: OnceLock<Regex> = OnceLock::new();
static NICKCHANGE: OnceLock<Regex> = OnceLock::new();
static MODE: OnceLock<Regex> = OnceLock::new();
static TOPIC: OnceLock<Regex> = OnceLock::new();
static ACTION: OnceLock<Regex> = OnceLock::new();

/// Status lines mIRC writes with the same `* ` prefix as actions.
const CLIENT_NOTICES: &[&str] = &[
    "* Now talking in ",
    "* Topic is ",
    "* Set by ",
    "* Disconnected",
    "* Attempting to rejoin",
    "* Rejoined channel",
    "* Retrieving ",
    "* Connecting to ",
    "* You were kicked",
];

/// Parser for mIRC's default logging.
#[derive(Debug, Default)]
pub struct MircParser;

impl MircParser {
    pub fn new() -> Self {
        Self
    }

    fn parse_star_line(
        &self,
        datetime: NaiveDateTime,
        body: &str,
        events: &mut dyn EventHandler,
    ) -> bool {
        if CLIENT_NOTICES.iter().any(|notice| body.starts_with(notice)) {
            return false;
        }

        if let Some(c) = pattern(&JOIN, r"^\* (\S+) \([^)]*\) has joined #\S+$").captures(body) {
            events.record_join(datetime, &c[1]);
        } else if let Some(c) =
            pattern(&PART, r"^\* (\S+) \([^)]*\) has left #\S+").captures(body)
        {
            events.record_part(datetime, &c[1]);
        } else if let Some(c) = pattern(&QUIT, r"^\* (\S+) \([^)]*\) Quit").captures(body) {
            events.record_quit(datetime, &c[1]);
        } else if let Some(c) =
            pattern(&KICK, r"^\* (\S+) was kicked by (\S+) \(.*\)$").captures(body)
        {
            events.record_kick(datetime, &c[2], &c[1], &body[2..]);
        } else if let Some(c) =
            pattern(&NICKCHANGE, r"^\* (\S+) is now known as (\S+)$").captures(body)
        {
            events.record_nickchange(datetime, &c[1], &c[2]);
        } else if let Some(c) =
            pattern(&MODE, r"^\* (\S+) sets mode: (\S+)(?: (.*))?$").captures(body)
        {
            let Some(changes) = mode_changes(&c[2], c.get(3).map_or("", |m| m.as_str())) else {
                return false;
            };
            for (mode, nick) in changes {
                events.record_mode(datetime, &c[1], nick, mode);
            }
        } else if let Some(c) =
            pattern(&TOPIC, r"^\* (\S+) changes topic to '(.*)'$").captures(body)
        {
            events.record_topic(datetime, &c[1], &c[2]);
        } else if let Some(c) = pattern(&ACTION, r"^\* ((\S+) (.+))$").captures(body) {
            let nick = &c[2];
            events.record_action(datetime, nick, &c[1]);
            if let Some(target) = c[3].strip_prefix("slaps") {
                if target.is_empty() || target.starts_with(' ') {
                    events.record_slap(datetime, nick, target.split_whitespace().next());
                }
            }
        } else {
            return false;
        }
        true
    }
}

impl LineParser for MircParser {
    fn name(&self) -> &'static str {
        "mirc"
    }

    fn parse_line(&mut self, ctx: &LineContext<'_>, events: &mut dyn EventHandler) {
        let Some(line) =
            pattern(&LINE, r"^\[(\d{2}):(\d{2})(?::(\d{2}))?\] (.+)$").captures(ctx.line)
        else {
            tracing::trace!(line = ctx.line_number, "Unrecognized mirc line");
            return;
        };
        let seconds = line.get(3).map(|m| m.as_str());
        let Some(datetime) = timestamp(ctx.date, &line[1], &line[2], seconds) else {
            tracing::trace!(line = ctx.line_number, "Invalid mirc timestamp");
            return;
        };
        let body = line.get(4).map_or("", |m| m.as_str());

        let recognized = if let Some(c) =
            pattern(&NORMAL, r"^<[~&@%+!]?([^ >]+)>(?: (.*))?$").captures(body)
        {
            events.record_normal(datetime, &c[1], c.get(2).map_or("", |m| m.as_str()));
            true
        } else if body.starts_with("* ") {
            self.parse_star_line(datetime, body, events)
        } else {
            false
        };

        if !recognized {
            tracing::trace!(line = ctx.line_number, "Unrecognized mirc line");
        }
    }
}
