//! irssi log grammar
//!
//! Lines look like:
//!
//! ```text
//! 14:02 <@alice> hello there
//! 14:02  * alice waves
//! 14:03 -!- bob [~bob@example.com] has joined #chan
//! 14:04 -!- mode/#chan [+o-v bob carol] by alice
//! ```
//!
//! Whitespace is already collapsed by the normalizer, so the grammar only
//! ever sees single spaces.

use super::{mode_changes, pattern, timestamp};
use crate::ingest::parser::{EventHandler, LineContext, LineParser};
use regex::{Captures, Regex};
use std::sync::OnceLock;

static LINE: OnceLock<Regex> = OnceLock::new();
static NORMAL: OnceLock<Regex> = OnceLock::new();
static ACTION: OnceLock<Regex> = OnceLock::new();
static JOIN: OnceLock<Regex> = OnceLock::new();
static PART: OnceLock<Regex> = OnceLock::new();
static QUIT: OnceLock<Regex> = OnceLock::new();
static KICK: OnceLock<Regex> = OnceLock::new();
static NICKCHANGE: OnceLock<Regex> = OnceLock::new();
static MODE: OnceLock<Regex> = OnceLock::new();
static TOPIC: OnceLock<Regex> = OnceLock::new();

/// Parser for irssi's default log theme.
#[derive(Debug, Default)]
pub struct IrssiParser;

impl IrssiParser {
    pub fn new() -> Self {
        Self
    }

    fn parse_server_line(
        &self,
        datetime: chrono::NaiveDateTime,
        body: &str,
        events: &mut dyn EventHandler,
    ) -> bool {
        if let Some(c) = pattern(&JOIN, r"^(\S+) \[[^\]]*\] has joined #\S+$").captures(body) {
            events.record_join(datetime, &c[1]);
        } else if let Some(c) = pattern(&PART, r"^(\S+) \[[^\]]*\] has left #\S+").captures(body) {
            events.record_part(datetime, &c[1]);
        } else if let Some(c) = pattern(&QUIT, r"^(\S+) \[[^\]]*\] has quit").captures(body) {
            events.record_quit(datetime, &c[1]);
        } else if let Some(c) =
            pattern(&KICK, r"^(\S+) was kicked from #\S+ by (\S+) \[.*\]$").captures(body)
        {
            events.record_kick(datetime, &c[2], &c[1], body);
        } else if let Some(c) =
            pattern(&NICKCHANGE, r"^(\S+) is now known as (\S+)$").captures(body)
        {
            events.record_nickchange(datetime, &c[1], &c[2]);
        } else if let Some(c) = pattern(
            &MODE,
            r"^mode/#\S+ \[(\S+)(?: ([^\]]*))?\] by (\S+)$",
        )
        .captures(body)
        {
            let Some(changes) = mode_changes(&c[1], c.get(2).map_or("", |m| m.as_str())) else {
                return false;
            };
            for (mode, nick) in changes {
                events.record_mode(datetime, &c[3], nick, mode);
            }
        } else if let Some(c) =
            pattern(&TOPIC, r"^(\S+) changed the topic of #\S+ to:(?: (.*))?$").captures(body)
        {
            events.record_topic(datetime, &c[1], c.get(2).map_or("", |m| m.as_str()));
        } else {
            return false;
        }
        true
    }
}

fn datetime_of(c: &Captures<'_>, ctx: &LineContext<'_>) -> Option<chrono::NaiveDateTime> {
    timestamp(ctx.date, &c[1], &c[2], c.get(3).map(|m| m.as_str()))
}

impl LineParser for IrssiParser {
    fn name(&self) -> &'static str {
        "irssi"
    }

    fn parse_line(&mut self, ctx: &LineContext<'_>, events: &mut dyn EventHandler) {
        let Some(line) = pattern(&LINE, r"^(\d{2}):(\d{2})(?::(\d{2}))? (.+)$").captures(ctx.line)
        else {
            tracing::trace!(line = ctx.line_number, "Unrecognized irssi line");
            return;
        };
        let Some(datetime) = datetime_of(&line, ctx) else {
            tracing::trace!(line = ctx.line_number, "Invalid irssi timestamp");
            return;
        };
        let body = line.get(4).map_or("", |m| m.as_str());

        let recognized = if let Some(c) =
            pattern(&NORMAL, r"^<[ ~&@%+!]?([^ >]+)>(?: (.*))?$").captures(body)
        {
            events.record_normal(datetime, &c[1], c.get(2).map_or("", |m| m.as_str()));
            true
        } else if let Some(c) = pattern(&ACTION, r"^\* ((\S+) (.+))$").captures(body) {
            let nick = &c[2];
            let text = &c[3];
            events.record_action(datetime, nick, &c[1]);
            if let Some(target) = text.strip_prefix("slaps") {
                if target.is_empty() || target.starts_with(' ') {
                    let target = target.split_whitespace().next();
                    events.record_slap(datetime, nick, target);
                }
            }
            true
        } else if let Some(rest) = body.strip_prefix("-!- ") {
            self.parse_server_line(datetime, rest, events)
        } else {
            false
        };

        if !recognized {
            tracing::trace!(line = ctx.line_number, "Unrecognized irssi line");
        }
    }
}
