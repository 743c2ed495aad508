//! Event aggregation
//!
//! An [`Aggregator`] owns all counters of one parse run. Format parsers report
//! events through its [`EventHandler`] implementation; at the end of the run
//! the aggregates are flushed to a [`StatsSink`].
//!
//! Every entry point validates its nick arguments before mutating anything, so
//! an invalid nick never leaves a half-applied event behind.

mod message;
pub mod registry;
pub mod streak;

pub use registry::{NickRegistry, NickRules, WordRegistry};
pub use streak::{Monologue, StreakTracker};

use crate::config::ParserConfig;
use crate::db::StatsSink;
use crate::error::Result;
use crate::ingest::parser::EventHandler;
use crate::types::{ChannelDay, ModeChange, Nick, QuoteKind, StreakState, Topic, Word};
use crate::url::{UrlExtractor, UrlTools};
use chrono::{NaiveDate, NaiveDateTime};

/// Longest line (in bytes) kept as an example quote.
pub const MAX_QUOTE_LEN: usize = 255;
/// Longest topic (in bytes) that is recorded.
pub const MAX_TOPIC_LEN: usize = 1024;
/// Longest canonical URL (in bytes) that is recorded.
pub const MAX_URL_LEN: usize = 1024;
/// Longest word (in characters) tracked in the dictionary.
pub const MAX_WORD_LEN: usize = 30;

/// Per-run statistics for one channel log date.
pub struct Aggregator {
    config: ParserConfig,
    rules: NickRules,
    date: NaiveDate,
    line_number: u64,
    channel: ChannelDay,
    nicks: NickRegistry,
    words: WordRegistry,
    streak: StreakTracker,
    urls: Box<dyn UrlExtractor>,
    warnings: u64,
}

impl Aggregator {
    pub fn new(config: &ParserConfig, date: NaiveDate) -> Self {
        Self {
            config: config.clone(),
            rules: NickRules::new(config),
            date,
            line_number: 0,
            channel: ChannelDay::new(date),
            nicks: NickRegistry::new(),
            words: WordRegistry::new(),
            streak: StreakTracker::new(config.minstreak),
            urls: Box::new(UrlTools::new()),
            warnings: 0,
        }
    }

    /// Replace the URL extractor used for message tokens.
    pub fn with_url_extractor(mut self, urls: Box<dyn UrlExtractor>) -> Self {
        self.urls = urls;
        self
    }

    /// Continue the streak left open by a previous run.
    pub fn restore_streak(&mut self, state: StreakState) {
        self.streak.restore(state);
    }

    /// Line number attached to diagnostics for the following events.
    pub fn set_line_number(&mut self, line_number: u64) {
        self.line_number = line_number;
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn channel(&self) -> &ChannelDay {
        &self.channel
    }

    pub fn nicks(&self) -> &NickRegistry {
        &self.nicks
    }

    pub fn nick(&self, nick: &str) -> Option<&Nick> {
        self.nicks.get(nick)
    }

    pub fn words(&self) -> &WordRegistry {
        &self.words
    }

    pub fn word(&self, word: &str) -> Option<&Word> {
        self.words.get(word)
    }

    pub fn streak_state(&self) -> &StreakState {
        self.streak.state()
    }

    /// Number of messages counted during this run.
    pub fn messages(&self) -> u64 {
        self.channel.total
    }

    /// Number of events skipped because of an invalid nick.
    pub fn warnings(&self) -> u64 {
        self.warnings
    }

    /// Write the run's aggregates to `sink`.
    ///
    /// The channel day and the streak state are only written when the run
    /// counted at least one message.
    pub fn flush(&self, sink: &dyn StatsSink) -> Result<()> {
        let processed_messages = self.channel.total > 0;

        if processed_messages {
            sink.write_channel_day(&self.channel)?;
        }

        for nick in self.nicks.iter() {
            sink.write_nick(nick, self.date)?;
        }

        let words: Vec<&Word> = self.words.iter().collect();
        if !words.is_empty() {
            sink.write_words(&words)?;
        }

        if processed_messages {
            sink.write_streak(self.streak.state())?;
        }

        tracing::info!(
            date = %self.date,
            messages = self.channel.total,
            nicks = self.nicks.len(),
            words = self.words.len(),
            warnings = self.warnings,
            "Flushed run statistics"
        );

        Ok(())
    }

    fn check_nick(&mut self, event: &'static str, csnick: &str) -> bool {
        if self.rules.is_valid(csnick) {
            return true;
        }
        self.warnings += 1;
        tracing::warn!(
            line = self.line_number,
            event,
            nick = csnick,
            "Invalid nick, event skipped"
        );
        false
    }

    /// Drop a `network~` or `network'` prefix from a slap target.
    fn strip_target_prefix<'a>(&self, undergoing: &'a str) -> &'a str {
        if undergoing.matches(['~', '\'']).count() != 1 {
            return undergoing;
        }
        match undergoing.split_once(['~', '\'']) {
            Some((_, target)) => {
                tracing::debug!(
                    line = self.line_number,
                    from = undergoing,
                    to = target,
                    "Cleaned up slap target"
                );
                target
            }
            None => undergoing,
        }
    }
}

impl EventHandler for Aggregator {
    fn record_action(&mut self, datetime: NaiveDateTime, csnick: &str, line: &str) {
        if !self.check_nick("action", csnick) {
            return;
        }
        let preflen = self.config.quote_preflen;
        let nick = self.nicks.resolve(csnick, Some(datetime));
        nick.events.actions += 1;
        if line.len() <= MAX_QUOTE_LEN {
            nick.add_quote(QuoteKind::Action, line, preflen);
        }
    }

    fn record_join(&mut self, datetime: NaiveDateTime, csnick: &str) {
        if self.check_nick("join", csnick) {
            self.nicks.resolve(csnick, Some(datetime)).events.joins += 1;
        }
    }

    fn record_part(&mut self, datetime: NaiveDateTime, csnick: &str) {
        if self.check_nick("part", csnick) {
            self.nicks.resolve(csnick, Some(datetime)).events.parts += 1;
        }
    }

    fn record_quit(&mut self, datetime: NaiveDateTime, csnick: &str) {
        if self.check_nick("quit", csnick) {
            self.nicks.resolve(csnick, Some(datetime)).events.quits += 1;
        }
    }

    fn record_kick(
        &mut self,
        datetime: NaiveDateTime,
        performing: &str,
        undergoing: &str,
        line: &str,
    ) {
        if !self.check_nick("kick", performing) || !self.check_nick("kick", undergoing) {
            return;
        }
        let example = (line.len() <= MAX_QUOTE_LEN).then(|| line.to_string());

        let kicker = self.nicks.resolve(performing, Some(datetime));
        kicker.events.kicks += 1;
        if example.is_some() {
            kicker.ex_kicks = example.clone();
        }

        let kicked = self.nicks.resolve(undergoing, Some(datetime));
        kicked.events.kicked += 1;
        if example.is_some() {
            kicked.ex_kicked = example;
        }
    }

    fn record_mode(
        &mut self,
        datetime: NaiveDateTime,
        performing: &str,
        undergoing: &str,
        mode: ModeChange,
    ) {
        if !self.check_nick("mode", performing) || !self.check_nick("mode", undergoing) {
            return;
        }
        self.nicks
            .resolve(performing, Some(datetime))
            .events
            .modes_performed[mode.index()] += 1;
        self.nicks
            .resolve(undergoing, Some(datetime))
            .events
            .modes_received[mode.index()] += 1;
    }

    fn record_nickchange(&mut self, datetime: NaiveDateTime, performing: &str, undergoing: &str) {
        if !self.check_nick("nickchange", performing) || !self.check_nick("nickchange", undergoing)
        {
            return;
        }
        self.nicks
            .resolve(performing, Some(datetime))
            .events
            .nickchanges += 1;
        self.nicks.resolve(undergoing, Some(datetime));
    }

    fn record_normal(&mut self, datetime: NaiveDateTime, csnick: &str, line: &str) {
        self.classify_message(datetime, csnick, line);
    }

    fn record_slap(&mut self, datetime: NaiveDateTime, performing: &str, undergoing: Option<&str>) {
        if !self.check_nick("slap", performing) {
            return;
        }
        self.nicks.resolve(performing, Some(datetime)).events.slaps += 1;

        let Some(undergoing) = undergoing else {
            return;
        };
        let target = self.strip_target_prefix(undergoing);
        if self.check_nick("slap", target) {
            self.nicks.resolve(target, None).events.slapped += 1;
        }
    }

    fn record_topic(&mut self, datetime: NaiveDateTime, csnick: &str, topic: &str) {
        if !self.check_nick("topic", csnick) {
            return;
        }
        let line_number = self.line_number;
        let nick = self.nicks.resolve(csnick, Some(datetime));
        nick.events.topics += 1;

        if topic.len() > MAX_TOPIC_LEN {
            tracing::debug!(
                line = line_number,
                length = topic.len(),
                "Topic exceeds length limit"
            );
            return;
        }
        nick.topics.push(Topic {
            text: topic.to_string(),
            set_at: datetime,
        });
    }
}
