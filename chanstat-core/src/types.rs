//! Core domain types for chanstat
//!
//! These types hold the per-run aggregates built while reading one channel log
//! and flushed to the database at the end of the run.
//!
//! ## Terminology
//!
//! | Term | Definition |
//! |------|------------|
//! | **Nick** | A channel participant, keyed case-insensitively |
//! | **Word** | A token made only of letters, counted channel-wide |
//! | **Period** | One of night/morning/afternoon/evening, derived from the hour |
//! | **Monologue** | A run of consecutive lines from one nick, credited once broken |
//! | **Skip-quote** | A line containing a URL-like token; never used as a quote |

use crate::url::UrlRecord;
use chrono::{Datelike, NaiveDate, NaiveDateTime, Weekday};
use std::collections::HashMap;

// ============================================
// Time buckets
// ============================================

/// Part of the day a message falls into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Period {
    /// 00:00 - 05:59
    Night,
    /// 06:00 - 11:59
    Morning,
    /// 12:00 - 17:59
    Afternoon,
    /// 18:00 - 23:59
    Evening,
}

impl Period {
    pub const ALL: [Period; 4] = [
        Period::Night,
        Period::Morning,
        Period::Afternoon,
        Period::Evening,
    ];

    /// Map an hour of the day (0-23) to its period.
    pub fn from_hour(hour: u32) -> Self {
        match hour {
            0..=5 => Period::Night,
            6..=11 => Period::Morning,
            12..=17 => Period::Afternoon,
            _ => Period::Evening,
        }
    }

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Period::Night => "night",
            Period::Morning => "morning",
            Period::Afternoon => "afternoon",
            Period::Evening => "evening",
        }
    }
}

impl std::fmt::Display for Period {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Lowercase three-letter weekday name used as a storage key.
pub fn weekday_key(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "mon",
        Weekday::Tue => "tue",
        Weekday::Wed => "wed",
        Weekday::Thu => "thu",
        Weekday::Fri => "fri",
        Weekday::Sat => "sat",
        Weekday::Sun => "sun",
    }
}

// ============================================
// Events
// ============================================

/// Channel mode changes that are counted per nick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModeChange {
    Op,
    Deop,
    Voice,
    Devoice,
}

impl ModeChange {
    /// Build from a sign and mode letter, e.g. `('+', 'o')`.
    ///
    /// Returns `None` for modes that are not tracked.
    pub fn from_flag(sign: char, mode: char) -> Option<Self> {
        match (sign, mode) {
            ('+', 'o') => Some(ModeChange::Op),
            ('-', 'o') => Some(ModeChange::Deop),
            ('+', 'v') => Some(ModeChange::Voice),
            ('-', 'v') => Some(ModeChange::Devoice),
            _ => None,
        }
    }

    pub fn index(self) -> usize {
        self as usize
    }

    /// Column prefix for the performing side (`m_op`, ...).
    pub fn performed_column(self) -> &'static str {
        match self {
            ModeChange::Op => "m_op",
            ModeChange::Deop => "m_deop",
            ModeChange::Voice => "m_voice",
            ModeChange::Devoice => "m_devoice",
        }
    }

    /// Column for the receiving side (`m_opped`, ...).
    pub fn received_column(self) -> &'static str {
        match self {
            ModeChange::Op => "m_opped",
            ModeChange::Deop => "m_deopped",
            ModeChange::Voice => "m_voiced",
            ModeChange::Devoice => "m_devoiced",
        }
    }
}

// ============================================
// Quotes and smileys
// ============================================

/// Category of a captured example line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QuoteKind {
    Generic,
    Uppercased,
    Exclamation,
    Question,
    Action,
}

impl QuoteKind {
    pub fn as_str(self) -> &'static str {
        match self {
            QuoteKind::Generic => "quote",
            QuoteKind::Uppercased => "ex_uppercased",
            QuoteKind::Exclamation => "ex_exclamations",
            QuoteKind::Question => "ex_questions",
            QuoteKind::Action => "ex_actions",
        }
    }
}

/// Latest short and long example for one quote category.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QuoteExamples {
    pub short: Option<String>,
    pub long: Option<String>,
}

impl QuoteExamples {
    /// Store `line`, classifying it as long when it reaches `preflen` bytes.
    pub fn add(&mut self, line: &str, preflen: usize) {
        if line.len() >= preflen {
            self.long = Some(line.to_string());
        } else {
            self.short = Some(line.to_string());
        }
    }

    /// The example worth showing: a long one if we have it.
    pub fn preferred(&self) -> Option<&str> {
        self.long.as_deref().or(self.short.as_deref())
    }
}

pub const SMILEY_COUNT: usize = 19;

/// Smileys counted per nick, matched case-insensitively.
pub const SMILEYS: [&str; SMILEY_COUNT] = [
    "=]", "=)", ";x", ";p", ";]", ";-)", ";)", ";(", ":x", ":p", ":d", ":>", ":]", ":\\", ":/",
    ":-)", ":)", ":(", "\\o/",
];

/// Index into [`SMILEYS`] for an exact case-insensitive match.
pub fn smiley_index(token: &str) -> Option<usize> {
    SMILEYS.iter().position(|s| s.eq_ignore_ascii_case(token))
}

/// Storage key for a smiley (`s_01` .. `s_19`).
pub fn smiley_key(index: usize) -> String {
    format!("s_{:02}", index + 1)
}

// ============================================
// Nick
// ============================================

/// Event counters for a nick.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventCounts {
    pub joins: u64,
    pub parts: u64,
    pub quits: u64,
    pub kicks: u64,
    pub kicked: u64,
    pub actions: u64,
    pub topics: u64,
    pub slaps: u64,
    pub slapped: u64,
    pub nickchanges: u64,
    pub monologues: u64,
    pub top_monologue: u64,
    /// Mode changes performed, indexed by [`ModeChange::index`]
    pub modes_performed: [u64; 4],
    /// Mode changes received, indexed by [`ModeChange::index`]
    pub modes_received: [u64; 4],
}

/// Message counters for a nick.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LineCounts {
    pub total: u64,
    pub characters: u64,
    /// Whitespace-separated tokens, unrelated to the word dictionary
    pub words: u64,
    pub urls: u64,
    pub exclamations: u64,
    pub questions: u64,
    pub uppercased: u64,
    pub hours: [u64; 24],
    pub periods: [u64; 4],
    /// Indexed by weekday (Monday = 0), then period
    pub weekdays: [[u64; 4]; 7],
    pub smileys: [u64; SMILEY_COUNT],
}

/// A URL posted by a nick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NickUrl {
    pub url: UrlRecord,
    pub first_used: NaiveDateTime,
    pub last_used: NaiveDateTime,
    pub total: u64,
}

/// A topic set by a nick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topic {
    pub text: String,
    pub set_at: NaiveDateTime,
}

/// A channel participant.
#[derive(Debug, Clone)]
pub struct Nick {
    /// Lowercase identity key
    pub nick: String,
    /// Most recently observed casing
    pub csnick: String,
    /// False when the nick was only created to credit a carried-over streak
    pub casing_observed: bool,
    pub first_seen: Option<NaiveDateTime>,
    pub last_seen: Option<NaiveDateTime>,
    pub last_talked: Option<NaiveDateTime>,
    /// Talked at least once on the run's log date
    pub active: bool,
    pub events: EventCounts,
    pub lines: LineCounts,
    pub quotes: HashMap<QuoteKind, QuoteExamples>,
    pub ex_kicks: Option<String>,
    pub ex_kicked: Option<String>,
    /// Keyed by canonical URL
    pub urls: HashMap<String, NickUrl>,
    pub topics: Vec<Topic>,
}

impl Nick {
    pub fn new(csnick: &str) -> Self {
        Self {
            nick: csnick.to_ascii_lowercase(),
            csnick: csnick.to_string(),
            casing_observed: true,
            first_seen: None,
            last_seen: None,
            last_talked: None,
            active: false,
            events: EventCounts::default(),
            lines: LineCounts::default(),
            quotes: HashMap::new(),
            ex_kicks: None,
            ex_kicked: None,
            urls: HashMap::new(),
            topics: Vec::new(),
        }
    }

    /// Record confirmed activity at `datetime`.
    pub fn mark_seen(&mut self, datetime: NaiveDateTime) {
        if self.first_seen.map_or(true, |first| datetime < first) {
            self.first_seen = Some(datetime);
        }
        if self.last_seen.map_or(true, |last| datetime > last) {
            self.last_seen = Some(datetime);
        }
    }

    pub fn add_quote(&mut self, kind: QuoteKind, line: &str, preflen: usize) {
        self.quotes.entry(kind).or_default().add(line, preflen);
    }

    pub fn quote(&self, kind: QuoteKind) -> Option<&str> {
        self.quotes.get(&kind).and_then(QuoteExamples::preferred)
    }

    pub fn add_url(&mut self, url: UrlRecord, datetime: NaiveDateTime) {
        self.urls
            .entry(url.url.clone())
            .and_modify(|used| {
                used.total += 1;
                used.first_used = used.first_used.min(datetime);
                used.last_used = used.last_used.max(datetime);
            })
            .or_insert(NickUrl {
                url,
                first_used: datetime,
                last_used: datetime,
                total: 1,
            });
    }

    /// Count one message at `hour` on the log date's `weekday`.
    pub fn add_line_at(&mut self, hour: u32, weekday: Weekday) {
        let period = Period::from_hour(hour).index();
        self.lines.total += 1;
        self.lines.hours[hour as usize % 24] += 1;
        self.lines.periods[period] += 1;
        self.lines.weekdays[weekday.num_days_from_monday() as usize][period] += 1;
    }

    /// Register a finished monologue of `length` lines.
    pub fn add_monologue(&mut self, length: u64) {
        self.events.monologues += 1;
        self.events.top_monologue = self.events.top_monologue.max(length);
    }
}

// ============================================
// Word
// ============================================

/// A dictionary word, counted channel-wide.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Word {
    /// Lowercase key
    pub word: String,
    /// Length in characters, taken from the first sighting
    pub length: usize,
    pub total: u64,
}

// ============================================
// Channel and resume state
// ============================================

/// Channel-wide message counts for one log date.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelDay {
    pub date: NaiveDate,
    pub hours: [u64; 24],
    pub periods: [u64; 4],
    pub total: u64,
}

impl ChannelDay {
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date,
            hours: [0; 24],
            periods: [0; 4],
            total: 0,
        }
    }

    pub fn add_line_at(&mut self, hour: u32) {
        self.hours[hour as usize % 24] += 1;
        self.periods[Period::from_hour(hour).index()] += 1;
        self.total += 1;
    }

    pub fn weekday(&self) -> Weekday {
        self.date.weekday()
    }
}

/// Streak carried between runs so monologues spanning a resume are counted once.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreakState {
    /// Lowercase nick of the current streak (empty when none)
    pub nick: String,
    pub length: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_period_from_hour() {
        assert_eq!(Period::from_hour(0), Period::Night);
        assert_eq!(Period::from_hour(5), Period::Night);
        assert_eq!(Period::from_hour(6), Period::Morning);
        assert_eq!(Period::from_hour(11), Period::Morning);
        assert_eq!(Period::from_hour(12), Period::Afternoon);
        assert_eq!(Period::from_hour(17), Period::Afternoon);
        assert_eq!(Period::from_hour(18), Period::Evening);
        assert_eq!(Period::from_hour(23), Period::Evening);
    }

    #[test]
    fn test_mode_change_from_flag() {
        assert_eq!(ModeChange::from_flag('+', 'o'), Some(ModeChange::Op));
        assert_eq!(ModeChange::from_flag('-', 'v'), Some(ModeChange::Devoice));
        assert_eq!(ModeChange::from_flag('+', 'b'), None);
    }

    #[test]
    fn test_smiley_lookup() {
        assert_eq!(smiley_index(":D"), Some(10));
        assert_eq!(smiley_index("\\O/"), Some(18));
        assert_eq!(smiley_index(":-("), None);
        assert_eq!(smiley_key(0), "s_01");
        assert_eq!(smiley_key(18), "s_19");
    }

    #[test]
    fn test_quote_examples_split() {
        let mut quotes = QuoteExamples::default();
        quotes.add("short", 10);
        assert_eq!(quotes.preferred(), Some("short"));

        quotes.add("this one is long enough", 10);
        quotes.add("tiny", 10);
        assert_eq!(quotes.short.as_deref(), Some("tiny"));
        assert_eq!(quotes.preferred(), Some("this one is long enough"));
    }

    #[test]
    fn test_nick_mark_seen_tracks_range() {
        let mut nick = Nick::new("Alice");
        assert_eq!(nick.nick, "alice");

        let noon = NaiveDate::from_ymd_opt(2011, 3, 14)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap();
        let morning = noon - chrono::Duration::hours(3);

        nick.mark_seen(noon);
        nick.mark_seen(morning);
        assert_eq!(nick.first_seen, Some(morning));
        assert_eq!(nick.last_seen, Some(noon));
    }
}
