//! Message classification
//!
//! Tokenizes ordinary chat lines and feeds smileys, URLs and dictionary words
//! into the run's counters. Lines are also considered for quote capture and
//! tagged with the uppercase/exclamation/question heuristics.

use super::{Aggregator, MAX_QUOTE_LEN, MAX_URL_LEN, MAX_WORD_LEN};
use crate::types::{smiley_index, QuoteKind};
use chrono::{Datelike, NaiveDateTime, Timelike};

/// What a single space-separated token turned out to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TokenClass {
    /// Index into the smiley table
    Smiley(usize),
    Url,
    /// Dictionary word, with its length in characters
    Word(usize),
    Other,
}

pub(crate) fn classify_token(token: &str, wordtracking: bool) -> TokenClass {
    if let Some(index) = smiley_index(token) {
        return TokenClass::Smiley(index);
    }
    if looks_like_url(token) {
        return TokenClass::Url;
    }
    if wordtracking {
        if let Some(length) = word_length(token) {
            return TokenClass::Word(length);
        }
    }
    TokenClass::Other
}

pub(crate) fn looks_like_url(token: &str) -> bool {
    ["www.", "http://", "https://"].iter().any(|prefix| {
        token
            .get(..prefix.len())
            .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
    })
}

fn is_word_char(c: char) -> bool {
    c.is_ascii_alphabetic()
        || matches!(c, '\u{C0}'..='\u{D6}' | '\u{D8}'..='\u{F6}' | '\u{F8}'..='\u{FF}')
}

/// Length in characters when `token` consists only of letters.
pub(crate) fn word_length(token: &str) -> Option<usize> {
    if token.is_empty() || !token.chars().all(is_word_char) {
        return None;
    }
    Some(token.chars().count())
}

/// Shouting heuristic: no lowercase ASCII and at least half the bytes are
/// uppercase ASCII letters.
pub(crate) fn is_uppercased(line: &str) -> bool {
    let len = line.len();
    if len < 2 || line.bytes().any(|b| b.is_ascii_lowercase()) {
        return false;
    }
    let upper = line.bytes().filter(u8::is_ascii_uppercase).count();
    upper * 2 >= len
}

impl Aggregator {
    pub(super) fn classify_message(&mut self, datetime: NaiveDateTime, csnick: &str, line: &str) {
        if !self.check_nick("normal", csnick) {
            return;
        }

        let key = {
            let nick = self.nicks.resolve(csnick, Some(datetime));
            if nick.last_talked.map_or(true, |last| datetime > last) {
                nick.last_talked = Some(datetime);
            }
            nick.active = true;
            nick.lines.characters += line.len() as u64;
            nick.nick.clone()
        };

        if let Some(monologue) = self.streak.observe(&key) {
            tracing::debug!(
                nick = %monologue.nick,
                length = monologue.length,
                "Monologue finished"
            );
            self.nicks.ensure(&monologue.nick).add_monologue(monologue.length);
        }

        let hour = datetime.hour();
        let weekday = self.date.weekday();
        self.channel.add_line_at(hour);

        let preflen = self.config.quote_preflen;
        let wordtracking = self.config.wordtracking;
        let line_number = self.line_number;

        let Some(nick) = self.nicks.get_mut(&key) else {
            return;
        };
        nick.add_line_at(hour, weekday);

        let mut skip_quote = false;
        for token in line.split(' ') {
            nick.lines.words += 1;

            match classify_token(token, wordtracking) {
                TokenClass::Smiley(index) => nick.lines.smileys[index] += 1,
                TokenClass::Url => {
                    skip_quote = true;
                    match self.urls.extract(token) {
                        None => {
                            tracing::debug!(line = line_number, url = token, "Invalid URL");
                        }
                        Some(record) if record.url.len() > MAX_URL_LEN => {
                            tracing::debug!(
                                line = line_number,
                                length = record.url.len(),
                                "URL exceeds length limit"
                            );
                        }
                        Some(record) => {
                            nick.add_url(record, datetime);
                            nick.lines.urls += 1;
                        }
                    }
                }
                TokenClass::Word(length) if length <= MAX_WORD_LEN => {
                    self.words.add(token, length);
                }
                TokenClass::Word(_) | TokenClass::Other => {}
            }
        }

        if skip_quote {
            return;
        }

        let quotable = line.len() <= MAX_QUOTE_LEN;
        if quotable {
            nick.add_quote(QuoteKind::Generic, line, preflen);
        }

        if is_uppercased(line) {
            nick.lines.uppercased += 1;
            if quotable {
                nick.add_quote(QuoteKind::Uppercased, line, preflen);
            }
        }

        if line.ends_with('!') {
            nick.lines.exclamations += 1;
            if quotable {
                nick.add_quote(QuoteKind::Exclamation, line, preflen);
            }
        } else if line.ends_with('?') {
            nick.lines.questions += 1;
            if quotable {
                nick.add_quote(QuoteKind::Question, line, preflen);
            }
        }
    }
}
