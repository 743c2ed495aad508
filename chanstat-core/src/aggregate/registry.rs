//! Nick and word registries
//!
//! Both registries are keyed by the lowercase form of what was observed, so
//! `Alice`, `alice` and `ALICE` resolve to the same entry.

use crate::config::ParserConfig;
use crate::types::{Nick, Word};
use chrono::NaiveDateTime;
use std::collections::HashMap;

/// Nick syntax and length rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NickRules {
    min_len: usize,
    max_len: usize,
}

impl NickRules {
    pub fn new(config: &ParserConfig) -> Self {
        let (min_len, max_len) = config.nick_length_bounds();
        Self { min_len, max_len }
    }

    /// Check a nick against the allowed characters and length bounds.
    ///
    /// `"0"` is what some networks report for a nick that is not known; it is
    /// never accepted.
    pub fn is_valid(&self, csnick: &str) -> bool {
        csnick != "0"
            && (self.min_len..=self.max_len).contains(&csnick.len())
            && csnick.bytes().all(is_nick_byte)
    }
}

impl Default for NickRules {
    fn default() -> Self {
        Self::new(&ParserConfig::default())
    }
}

fn is_nick_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b"[]^{}|\\`_-".contains(&b)
}

/// Case-insensitive dictionary of nicks seen during a run.
#[derive(Debug, Default)]
pub struct NickRegistry {
    nicks: HashMap<String, Nick>,
}

impl NickRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up or create the nick, refreshing its display casing.
    ///
    /// `datetime` marks the nick as seen; pass `None` when the nick is only
    /// referred to (e.g. the target of a slap).
    pub fn resolve(&mut self, csnick: &str, datetime: Option<NaiveDateTime>) -> &mut Nick {
        let nick = self
            .nicks
            .entry(csnick.to_ascii_lowercase())
            .and_modify(|n| {
                if n.csnick != csnick {
                    n.csnick = csnick.to_string();
                }
                n.casing_observed = true;
            })
            .or_insert_with(|| Nick::new(csnick));

        if let Some(datetime) = datetime {
            nick.mark_seen(datetime);
        }

        nick
    }

    /// Make sure an entry exists for a lowercase key without touching its casing.
    pub fn ensure(&mut self, nick: &str) -> &mut Nick {
        self.nicks
            .entry(nick.to_ascii_lowercase())
            .or_insert_with(|| Nick {
                casing_observed: false,
                ..Nick::new(nick)
            })
    }

    pub fn get(&self, nick: &str) -> Option<&Nick> {
        self.nicks.get(&nick.to_ascii_lowercase())
    }

    pub(crate) fn get_mut(&mut self, nick: &str) -> Option<&mut Nick> {
        self.nicks.get_mut(&nick.to_ascii_lowercase())
    }

    pub fn len(&self) -> usize {
        self.nicks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nicks.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Nick> {
        self.nicks.values()
    }
}

/// Channel-wide word frequencies.
#[derive(Debug, Default)]
pub struct WordRegistry {
    words: HashMap<String, Word>,
}

impl WordRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one sighting of `csword`. The length is only recorded the first time.
    pub fn add(&mut self, csword: &str, length: usize) {
        let key = csword.to_lowercase();
        self.words
            .entry(key)
            .or_insert_with_key(|key| Word {
                word: key.clone(),
                length,
                total: 0,
            })
            .total += 1;
    }

    pub fn get(&self, word: &str) -> Option<&Word> {
        self.words.get(&word.to_lowercase())
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Word> {
        self.words.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2011, 3, 14)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_nick_validation_defaults() {
        let rules = NickRules::default();
        assert!(!rules.is_valid(""));
        assert!(!rules.is_valid("0"));
        assert!(!rules.is_valid(&"a".repeat(256)));
        assert!(rules.is_valid(&"a".repeat(255)));
        assert!(rules.is_valid("abc-1[2]"));
        assert!(rules.is_valid("{^_^}|`\\"));
        assert!(rules.is_valid("00"));
        assert!(!rules.is_valid("nick!user"));
        assert!(!rules.is_valid("caf\u{e9}"));
        assert!(!rules.is_valid("two words"));
    }

    #[test]
    fn test_nick_validation_custom_bounds() {
        let rules = NickRules::new(&ParserConfig {
            nick_minlen: 3,
            nick_maxlen: 5,
            ..Default::default()
        });
        assert!(!rules.is_valid("ab"));
        assert!(rules.is_valid("abc"));
        assert!(rules.is_valid("abcde"));
        assert!(!rules.is_valid("abcdef"));
    }

    #[test]
    fn test_resolve_is_case_insensitive() {
        let mut registry = NickRegistry::new();
        registry.resolve("Alice", Some(at(10)));
        registry.resolve("ALICE", None);

        assert_eq!(registry.len(), 1);
        let alice = registry.get("alice").unwrap();
        assert_eq!(alice.csnick, "ALICE");
        assert_eq!(alice.last_seen, Some(at(10)));
    }

    #[test]
    fn test_resolve_without_timestamp_does_not_mark_seen() {
        let mut registry = NickRegistry::new();
        registry.resolve("bob", None);
        let bob = registry.get("Bob").unwrap();
        assert!(bob.first_seen.is_none());
        assert!(bob.last_seen.is_none());
    }

    #[test]
    fn test_ensure_keeps_casing() {
        let mut registry = NickRegistry::new();
        registry.resolve("Carol", Some(at(1)));
        registry.ensure("carol");
        assert_eq!(registry.get("carol").unwrap().csnick, "Carol");
        assert!(registry.get("carol").unwrap().casing_observed);

        let dave = registry.ensure("dave");
        assert!(!dave.casing_observed);
        assert!(dave.first_seen.is_none());
    }

    #[test]
    fn test_word_registry_merges_case() {
        let mut words = WordRegistry::new();
        words.add("Hello", 5);
        words.add("hello", 5);

        assert_eq!(words.len(), 1);
        let word = words.get("HELLO").unwrap();
        assert_eq!(word.word, "hello");
        assert_eq!(word.length, 5);
        assert_eq!(word.total, 2);
    }

    #[test]
    fn test_word_length_set_once() {
        let mut words = WordRegistry::new();
        words.add("na\u{ef}ve", 5);
        words.add("NA\u{cf}VE", 99);
        let word = words.get("na\u{ef}ve").unwrap();
        assert_eq!(word.length, 5);
        assert_eq!(word.total, 2);
    }
}
