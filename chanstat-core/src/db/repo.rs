//! Database repository layer
//!
//! Merges run aggregates into the stored statistics and provides the read
//! queries used by reports and tests.

use super::StatsSink;
use crate::error::{Error, Result};
use crate::types::*;
use chrono::{NaiveDate, NaiveDateTime, Utc, Weekday};
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction};
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

const DATE_FORMAT: &str = "%Y-%m-%d";
const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const WEEKDAYS: [Weekday; 7] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
    Weekday::Sun,
];

fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

fn format_datetime(datetime: Option<NaiveDateTime>) -> Option<String> {
    datetime.map(|dt| dt.format(DATETIME_FORMAT).to_string())
}

fn parse_datetime(value: Option<String>) -> Option<NaiveDateTime> {
    value.and_then(|s| NaiveDateTime::parse_from_str(&s, DATETIME_FORMAT).ok())
}

/// Stored totals for a nick, as read back from the database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NickSummary {
    pub nick: String,
    pub csnick: String,
    pub first_seen: Option<NaiveDateTime>,
    pub last_seen: Option<NaiveDateTime>,
    pub last_talked: Option<NaiveDateTime>,
    pub lines: u64,
    pub characters: u64,
    pub words: u64,
    pub urls: u64,
    pub uppercased: u64,
    pub exclamations: u64,
    pub questions: u64,
    pub joins: u64,
    pub actions: u64,
    pub kicks: u64,
    pub kicked: u64,
    pub slaps: u64,
    pub slapped: u64,
    pub nickchanges: u64,
    pub topics: u64,
    pub monologues: u64,
    pub top_monologue: u64,
    /// Number of dates the nick talked on
    pub activedays: u64,
}

/// Stored usage of one URL by one nick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlUsage {
    pub url: String,
    pub host: String,
    pub first_used: Option<NaiveDateTime>,
    pub last_used: Option<NaiveDateTime>,
    pub total: u64,
}

/// Database handle with a single mutex-guarded connection
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open or create a database at the given path
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA foreign_keys = ON;
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA cache_size = -64000;  -- 64MB cache
            ",
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute("PRAGMA foreign_keys = ON", [])?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Run migrations on this database
    pub fn migrate(&self) -> Result<()> {
        super::schema::run_migrations(&self.connection())
    }

    /// Get the underlying connection (for advanced use)
    pub fn connection(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ============================================
    // Nick writes
    // ============================================

    fn upsert_nick_row(tx: &Transaction<'_>, nick: &Nick) -> Result<()> {
        tx.execute(
            r#"
            INSERT INTO nicks (nick, csnick, first_seen, last_seen, last_talked)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(nick) DO UPDATE SET
                csnick = CASE WHEN ?6 THEN excluded.csnick ELSE csnick END,
                first_seen = MIN(COALESCE(excluded.first_seen, first_seen),
                                 COALESCE(first_seen, excluded.first_seen)),
                last_seen = MAX(COALESCE(excluded.last_seen, last_seen),
                                COALESCE(last_seen, excluded.last_seen)),
                last_talked = MAX(COALESCE(excluded.last_talked, last_talked),
                                  COALESCE(last_talked, excluded.last_talked))
            "#,
            params![
                nick.nick,
                nick.csnick,
                format_datetime(nick.first_seen),
                format_datetime(nick.last_seen),
                format_datetime(nick.last_talked),
                nick.casing_observed,
            ],
        )?;
        Ok(())
    }

    fn upsert_nick_events(tx: &Transaction<'_>, nick: &Nick) -> Result<()> {
        let e = &nick.events;
        let performed = |mode: ModeChange| e.modes_performed[mode.index()] as i64;
        let received = |mode: ModeChange| e.modes_received[mode.index()] as i64;

        tx.execute(
            r#"
            INSERT INTO nick_events (nick, joins, parts, quits, kicks, kicked, actions, topics,
                                     slaps, slapped, nickchanges, monologues, top_monologue,
                                     m_op, m_deop, m_voice, m_devoice,
                                     m_opped, m_deopped, m_voiced, m_devoiced,
                                     ex_kicks, ex_kicked)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13,
                    ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23)
            ON CONFLICT(nick) DO UPDATE SET
                joins = joins + excluded.joins,
                parts = parts + excluded.parts,
                quits = quits + excluded.quits,
                kicks = kicks + excluded.kicks,
                kicked = kicked + excluded.kicked,
                actions = actions + excluded.actions,
                topics = topics + excluded.topics,
                slaps = slaps + excluded.slaps,
                slapped = slapped + excluded.slapped,
                nickchanges = nickchanges + excluded.nickchanges,
                monologues = monologues + excluded.monologues,
                top_monologue = MAX(top_monologue, excluded.top_monologue),
                m_op = m_op + excluded.m_op,
                m_deop = m_deop + excluded.m_deop,
                m_voice = m_voice + excluded.m_voice,
                m_devoice = m_devoice + excluded.m_devoice,
                m_opped = m_opped + excluded.m_opped,
                m_deopped = m_deopped + excluded.m_deopped,
                m_voiced = m_voiced + excluded.m_voiced,
                m_devoiced = m_devoiced + excluded.m_devoiced,
                ex_kicks = COALESCE(excluded.ex_kicks, ex_kicks),
                ex_kicked = COALESCE(excluded.ex_kicked, ex_kicked)
            "#,
            params![
                nick.nick,
                e.joins as i64,
                e.parts as i64,
                e.quits as i64,
                e.kicks as i64,
                e.kicked as i64,
                e.actions as i64,
                e.topics as i64,
                e.slaps as i64,
                e.slapped as i64,
                e.nickchanges as i64,
                e.monologues as i64,
                e.top_monologue as i64,
                performed(ModeChange::Op),
                performed(ModeChange::Deop),
                performed(ModeChange::Voice),
                performed(ModeChange::Devoice),
                received(ModeChange::Op),
                received(ModeChange::Deop),
                received(ModeChange::Voice),
                received(ModeChange::Devoice),
                nick.ex_kicks,
                nick.ex_kicked,
            ],
        )?;
        Ok(())
    }

    fn upsert_nick_lines(tx: &Transaction<'_>, nick: &Nick, date: NaiveDate) -> Result<()> {
        let l = &nick.lines;
        if l.total == 0 && l.characters == 0 {
            return Ok(());
        }

        tx.execute(
            r#"
            INSERT INTO nick_lines (nick, l_total, l_night, l_morning, l_afternoon, l_evening,
                                    characters, words, urls, exclamations, questions, uppercased)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            ON CONFLICT(nick) DO UPDATE SET
                l_total = l_total + excluded.l_total,
                l_night = l_night + excluded.l_night,
                l_morning = l_morning + excluded.l_morning,
                l_afternoon = l_afternoon + excluded.l_afternoon,
                l_evening = l_evening + excluded.l_evening,
                characters = characters + excluded.characters,
                words = words + excluded.words,
                urls = urls + excluded.urls,
                exclamations = exclamations + excluded.exclamations,
                questions = questions + excluded.questions,
                uppercased = uppercased + excluded.uppercased
            "#,
            params![
                nick.nick,
                l.total as i64,
                l.periods[Period::Night.index()] as i64,
                l.periods[Period::Morning.index()] as i64,
                l.periods[Period::Afternoon.index()] as i64,
                l.periods[Period::Evening.index()] as i64,
                l.characters as i64,
                l.words as i64,
                l.urls as i64,
                l.exclamations as i64,
                l.questions as i64,
                l.uppercased as i64,
            ],
        )?;

        let mut stmt = tx.prepare_cached(
            r#"
            INSERT INTO nick_hours (nick, hour, lines) VALUES (?1, ?2, ?3)
            ON CONFLICT(nick, hour) DO UPDATE SET lines = lines + excluded.lines
            "#,
        )?;
        for (hour, lines) in l.hours.iter().enumerate().filter(|(_, n)| **n > 0) {
            stmt.execute(params![nick.nick, hour as i64, *lines as i64])?;
        }

        let mut stmt = tx.prepare_cached(
            r#"
            INSERT INTO nick_weekdays (nick, weekday, period, lines) VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(nick, weekday, period) DO UPDATE SET lines = lines + excluded.lines
            "#,
        )?;
        for (day, periods) in WEEKDAYS.iter().zip(l.weekdays.iter()) {
            for period in Period::ALL {
                let lines = periods[period.index()];
                if lines > 0 {
                    stmt.execute(params![
                        nick.nick,
                        weekday_key(*day),
                        period.as_str(),
                        lines as i64
                    ])?;
                }
            }
        }

        let mut stmt = tx.prepare_cached(
            r#"
            INSERT INTO nick_smileys (nick, smiley, total) VALUES (?1, ?2, ?3)
            ON CONFLICT(nick, smiley) DO UPDATE SET total = total + excluded.total
            "#,
        )?;
        for (index, total) in l.smileys.iter().enumerate().filter(|(_, n)| **n > 0) {
            stmt.execute(params![nick.nick, smiley_key(index), *total as i64])?;
        }

        if nick.active {
            tx.execute(
                r#"
                INSERT INTO nick_activity (nick, date, lines) VALUES (?1, ?2, ?3)
                ON CONFLICT(nick, date) DO UPDATE SET lines = lines + excluded.lines
                "#,
                params![nick.nick, format_date(date), l.total as i64],
            )?;
        }

        Ok(())
    }

    fn upsert_nick_extras(tx: &Transaction<'_>, nick: &Nick) -> Result<()> {
        let mut stmt = tx.prepare_cached(
            r#"
            INSERT INTO nick_quotes (nick, category, short, long) VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(nick, category) DO UPDATE SET
                short = COALESCE(excluded.short, short),
                long = COALESCE(excluded.long, long)
            "#,
        )?;
        for (kind, quotes) in &nick.quotes {
            stmt.execute(params![nick.nick, kind.as_str(), quotes.short, quotes.long])?;
        }

        let mut stmt = tx.prepare_cached(
            r#"
            INSERT INTO nick_urls (nick, url, scheme, host, path, first_used, last_used, total)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            ON CONFLICT(nick, url) DO UPDATE SET
                scheme = excluded.scheme,
                host = excluded.host,
                path = excluded.path,
                first_used = MIN(first_used, excluded.first_used),
                last_used = MAX(last_used, excluded.last_used),
                total = total + excluded.total
            "#,
        )?;
        for used in nick.urls.values() {
            stmt.execute(params![
                nick.nick,
                used.url.url,
                used.url.scheme,
                used.url.host,
                used.url.path,
                format_datetime(Some(used.first_used)),
                format_datetime(Some(used.last_used)),
                used.total as i64,
            ])?;
        }

        let mut stmt = tx.prepare_cached(
            "INSERT OR IGNORE INTO topics (nick, topic, set_at) VALUES (?1, ?2, ?3)",
        )?;
        for topic in &nick.topics {
            stmt.execute(params![
                nick.nick,
                topic.text,
                format_datetime(Some(topic.set_at))
            ])?;
        }

        Ok(())
    }

    // ============================================
    // Reads
    // ============================================

    /// Get the stored channel activity for a date
    pub fn get_channel_day(&self, date: NaiveDate) -> Result<Option<ChannelDay>> {
        let conn = self.connection();
        let key = format_date(date);

        let Some(mut day) = conn
            .query_row(
                r#"
                SELECT l_night, l_morning, l_afternoon, l_evening, l_total
                FROM channel_days WHERE date = ?
                "#,
                [&key],
                |row| {
                    let mut day = ChannelDay::new(date);
                    for period in Period::ALL {
                        day.periods[period.index()] = row.get::<_, i64>(period.index())? as u64;
                    }
                    day.total = row.get::<_, i64>(4)? as u64;
                    Ok(day)
                },
            )
            .optional()?
        else {
            return Ok(None);
        };

        let mut stmt = conn.prepare("SELECT hour, lines FROM channel_hours WHERE date = ?")?;
        let hours = stmt.query_map([&key], |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?))
        })?;
        for hour in hours {
            let (hour, lines) = hour?;
            if let Some(slot) = day.hours.get_mut(hour as usize) {
                *slot = lines as u64;
            }
        }

        Ok(Some(day))
    }

    /// Get the stored totals for a nick
    pub fn get_nick_summary(&self, nick: &str) -> Result<Option<NickSummary>> {
        let conn = self.connection();
        conn.query_row(
            r#"
            SELECT n.nick, n.csnick, n.first_seen, n.last_seen, n.last_talked,
                   COALESCE(l.l_total, 0) AS lines, COALESCE(l.characters, 0) AS characters,
                   COALESCE(l.words, 0) AS words, COALESCE(l.urls, 0) AS urls,
                   COALESCE(l.uppercased, 0) AS uppercased,
                   COALESCE(l.exclamations, 0) AS exclamations,
                   COALESCE(l.questions, 0) AS questions,
                   e.joins, e.actions, e.kicks, e.kicked, e.slaps, e.slapped,
                   e.nickchanges, e.topics, e.monologues, e.top_monologue,
                   (SELECT COUNT(*) FROM nick_activity a WHERE a.nick = n.nick) AS activedays
            FROM nicks n
            LEFT JOIN nick_lines l ON l.nick = n.nick
            LEFT JOIN nick_events e ON e.nick = n.nick
            WHERE n.nick = ?
            "#,
            [nick.to_ascii_lowercase()],
            Self::row_to_nick_summary,
        )
        .optional()
        .map_err(Error::from)
    }

    fn row_to_nick_summary(row: &Row) -> rusqlite::Result<NickSummary> {
        let count = |name: &str| -> rusqlite::Result<u64> {
            Ok(row.get::<_, Option<i64>>(name)?.unwrap_or(0) as u64)
        };

        Ok(NickSummary {
            nick: row.get("nick")?,
            csnick: row.get("csnick")?,
            first_seen: parse_datetime(row.get("first_seen")?),
            last_seen: parse_datetime(row.get("last_seen")?),
            last_talked: parse_datetime(row.get("last_talked")?),
            lines: count("lines")?,
            characters: count("characters")?,
            words: count("words")?,
            urls: count("urls")?,
            uppercased: count("uppercased")?,
            exclamations: count("exclamations")?,
            questions: count("questions")?,
            joins: count("joins")?,
            actions: count("actions")?,
            kicks: count("kicks")?,
            kicked: count("kicked")?,
            slaps: count("slaps")?,
            slapped: count("slapped")?,
            nickchanges: count("nickchanges")?,
            topics: count("topics")?,
            monologues: count("monologues")?,
            top_monologue: count("top_monologue")?,
            activedays: count("activedays")?,
        })
    }

    /// Stored count of a mode change, performed or received
    pub fn get_mode_count(&self, nick: &str, mode: ModeChange, performed: bool) -> Result<u64> {
        let column = if performed {
            mode.performed_column()
        } else {
            mode.received_column()
        };
        let conn = self.connection();
        let count: Option<i64> = conn
            .query_row(
                &format!("SELECT {} FROM nick_events WHERE nick = ?", column),
                [nick.to_ascii_lowercase()],
                |r| r.get(0),
            )
            .optional()?;
        Ok(count.unwrap_or(0) as u64)
    }

    /// Lines per hour for a nick, indexed by hour
    pub fn get_nick_hours(&self, nick: &str) -> Result<[u64; 24]> {
        let conn = self.connection();
        let mut stmt = conn.prepare("SELECT hour, lines FROM nick_hours WHERE nick = ?")?;
        let rows = stmt.query_map([nick.to_ascii_lowercase()], |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?))
        })?;

        let mut hours = [0u64; 24];
        for row in rows {
            let (hour, lines) = row?;
            if let Some(slot) = hours.get_mut(hour as usize) {
                *slot = lines as u64;
            }
        }
        Ok(hours)
    }

    /// Lines on a weekday and period for a nick
    pub fn get_nick_weekday(&self, nick: &str, day: Weekday, period: Period) -> Result<u64> {
        let conn = self.connection();
        let lines: Option<i64> = conn
            .query_row(
                "SELECT lines FROM nick_weekdays WHERE nick = ?1 AND weekday = ?2 AND period = ?3",
                params![nick.to_ascii_lowercase(), weekday_key(day), period.as_str()],
                |r| r.get(0),
            )
            .optional()?;
        Ok(lines.unwrap_or(0) as u64)
    }

    /// Stored count of one smiley for a nick
    pub fn get_smiley_count(&self, nick: &str, index: usize) -> Result<u64> {
        let conn = self.connection();
        let total: Option<i64> = conn
            .query_row(
                "SELECT total FROM nick_smileys WHERE nick = ?1 AND smiley = ?2",
                params![nick.to_ascii_lowercase(), smiley_key(index)],
                |r| r.get(0),
            )
            .optional()?;
        Ok(total.unwrap_or(0) as u64)
    }

    /// Get the stored examples of one quote category
    pub fn get_quote(&self, nick: &str, kind: QuoteKind) -> Result<Option<QuoteExamples>> {
        let conn = self.connection();
        conn.query_row(
            "SELECT short, long FROM nick_quotes WHERE nick = ?1 AND category = ?2",
            params![nick.to_ascii_lowercase(), kind.as_str()],
            |row| {
                Ok(QuoteExamples {
                    short: row.get(0)?,
                    long: row.get(1)?,
                })
            },
        )
        .optional()
        .map_err(Error::from)
    }

    /// Get the URLs a nick posted, most used first
    pub fn get_nick_urls(&self, nick: &str) -> Result<Vec<UrlUsage>> {
        let conn = self.connection();
        let mut stmt = conn.prepare(
            r#"
            SELECT url, host, first_used, last_used, total FROM nick_urls
            WHERE nick = ? ORDER BY total DESC, url ASC
            "#,
        )?;
        let rows = stmt.query_map([nick.to_ascii_lowercase()], |row| {
            Ok(UrlUsage {
                url: row.get(0)?,
                host: row.get(1)?,
                first_used: parse_datetime(row.get(2)?),
                last_used: parse_datetime(row.get(3)?),
                total: row.get::<_, i64>(4)? as u64,
            })
        })?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(Error::from)
    }

    /// Get the topics a nick set, oldest first
    pub fn get_topics(&self, nick: &str) -> Result<Vec<Topic>> {
        let conn = self.connection();
        let mut stmt = conn.prepare(
            "SELECT topic, set_at FROM topics WHERE nick = ? ORDER BY set_at ASC, id ASC",
        )?;
        let rows = stmt.query_map([nick.to_ascii_lowercase()], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, Option<String>>(1)?))
        })?;

        let mut topics = Vec::new();
        for row in rows {
            let (text, set_at) = row?;
            if let Some(set_at) = parse_datetime(set_at) {
                topics.push(Topic { text, set_at });
            }
        }
        Ok(topics)
    }

    /// Get a dictionary word
    pub fn get_word(&self, word: &str) -> Result<Option<Word>> {
        let conn = self.connection();
        conn.query_row(
            "SELECT word, length, total FROM words WHERE word = ?",
            [word.to_lowercase()],
            |row| {
                Ok(Word {
                    word: row.get(0)?,
                    length: row.get::<_, i64>(1)? as usize,
                    total: row.get::<_, i64>(2)? as u64,
                })
            },
        )
        .optional()
        .map_err(Error::from)
    }

    /// Most active nicks by message count
    pub fn top_talkers(&self, limit: usize) -> Result<Vec<(String, u64)>> {
        let conn = self.connection();
        let mut stmt = conn.prepare(
            r#"
            SELECT n.csnick, l.l_total FROM nick_lines l
            JOIN nicks n ON n.nick = l.nick
            WHERE l.l_total > 0
            ORDER BY l.l_total DESC, n.nick ASC
            LIMIT ?
            "#,
        )?;
        let rows = stmt.query_map([limit as i64], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as u64))
        })?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(Error::from)
    }

    /// Number of rows in a table
    pub fn count_rows(&self, table: &str) -> Result<i64> {
        let conn = self.connection();
        let count = conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |r| {
            r.get(0)
        })?;
        Ok(count)
    }
}

impl StatsSink for Database {
    fn load_streak(&self) -> Result<StreakState> {
        let conn = self.connection();
        let state = conn
            .query_row(
                "SELECT nick, length FROM streak_history WHERE id = 1",
                [],
                |row| {
                    Ok(StreakState {
                        nick: row.get(0)?,
                        length: row.get::<_, i64>(1)? as u64,
                    })
                },
            )
            .optional()?;
        Ok(state.unwrap_or_default())
    }

    fn write_streak(&self, state: &StreakState) -> Result<()> {
        let conn = self.connection();
        conn.execute(
            r#"
            INSERT INTO streak_history (id, nick, length) VALUES (1, ?1, ?2)
            ON CONFLICT(id) DO UPDATE SET
                nick = excluded.nick,
                length = excluded.length
            "#,
            params![state.nick, state.length as i64],
        )?;
        Ok(())
    }

    fn write_channel_day(&self, day: &ChannelDay) -> Result<()> {
        let mut conn = self.connection();
        let tx = conn.transaction()?;
        let key = format_date(day.date);

        tx.execute(
            r#"
            INSERT INTO channel_days (date, l_night, l_morning, l_afternoon, l_evening, l_total)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(date) DO UPDATE SET
                l_night = l_night + excluded.l_night,
                l_morning = l_morning + excluded.l_morning,
                l_afternoon = l_afternoon + excluded.l_afternoon,
                l_evening = l_evening + excluded.l_evening,
                l_total = l_total + excluded.l_total
            "#,
            params![
                key,
                day.periods[Period::Night.index()] as i64,
                day.periods[Period::Morning.index()] as i64,
                day.periods[Period::Afternoon.index()] as i64,
                day.periods[Period::Evening.index()] as i64,
                day.total as i64,
            ],
        )?;

        {
            let mut stmt = tx.prepare_cached(
                r#"
                INSERT INTO channel_hours (date, hour, lines) VALUES (?1, ?2, ?3)
                ON CONFLICT(date, hour) DO UPDATE SET lines = lines + excluded.lines
                "#,
            )?;
            for (hour, lines) in day.hours.iter().enumerate().filter(|(_, n)| **n > 0) {
                stmt.execute(params![key, hour as i64, *lines as i64])?;
            }
        }

        tx.commit()?;
        Ok(())
    }

    fn write_nick(&self, nick: &Nick, date: NaiveDate) -> Result<()> {
        let mut conn = self.connection();
        let tx = conn.transaction()?;

        Self::upsert_nick_row(&tx, nick)?;
        Self::upsert_nick_events(&tx, nick)?;
        Self::upsert_nick_lines(&tx, nick, date)?;
        Self::upsert_nick_extras(&tx, nick)?;

        tx.commit()?;
        Ok(())
    }

    fn write_words(&self, words: &[&Word]) -> Result<()> {
        let mut conn = self.connection();
        let tx = conn.transaction()?;

        {
            let mut stmt = tx.prepare_cached(
                r#"
                INSERT INTO words (word, length, total) VALUES (?1, ?2, ?3)
                ON CONFLICT(word) DO UPDATE SET total = total + excluded.total
                "#,
            )?;
            for word in words {
                stmt.execute(params![word.word, word.length as i64, word.total as i64])?;
            }
        }

        tx.commit()?;
        Ok(())
    }

    fn resume_cursor(&self, log: &str) -> Result<Option<u64>> {
        let conn = self.connection();
        let next_line: Option<i64> = conn
            .query_row(
                "SELECT next_line FROM parse_history WHERE logfile = ?",
                [log],
                |r| r.get(0),
            )
            .optional()?;
        Ok(next_line.map(|n| n.max(1) as u64))
    }

    fn set_resume_cursor(&self, log: &str, next_line: u64) -> Result<()> {
        let conn = self.connection();
        conn.execute(
            r#"
            INSERT INTO parse_history (logfile, next_line, last_parsed_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(logfile) DO UPDATE SET
                next_line = excluded.next_line,
                last_parsed_at = excluded.last_parsed_at
            "#,
            params![log, next_line as i64, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::url::UrlRecord;

    fn test_db() -> Database {
        let db = Database::open_in_memory().unwrap();
        db.migrate().unwrap();
        db
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2011, 3, 14).unwrap()
    }

    fn at(hour: u32) -> NaiveDateTime {
        date().and_hms_opt(hour, 0, 0).unwrap()
    }

    fn talker(csnick: &str, hour: u32) -> Nick {
        let mut nick = Nick::new(csnick);
        nick.mark_seen(at(hour));
        nick.last_talked = Some(at(hour));
        nick.active = true;
        nick.add_line_at(hour, Weekday::Mon);
        nick.lines.characters = 10;
        nick.lines.words = 2;
        nick
    }

    #[test]
    fn test_nick_counters_merge() {
        let db = test_db();

        let mut first = talker("Alice", 10);
        first.events.joins = 1;
        first.add_monologue(7);
        db.write_nick(&first, date()).unwrap();

        let mut second = talker("ALICE", 8);
        second.events.joins = 2;
        second.add_monologue(5);
        db.write_nick(&second, date().succ_opt().unwrap()).unwrap();

        let summary = db.get_nick_summary("alice").unwrap().unwrap();
        assert_eq!(summary.csnick, "ALICE");
        assert_eq!(summary.lines, 2);
        assert_eq!(summary.characters, 20);
        assert_eq!(summary.joins, 3);
        assert_eq!(summary.monologues, 2);
        assert_eq!(summary.top_monologue, 7);
        assert_eq!(summary.first_seen, Some(at(8)));
        assert_eq!(summary.last_seen, Some(at(10)));
        assert_eq!(summary.last_talked, Some(at(10)));
        assert_eq!(summary.activedays, 2);

        let hours = db.get_nick_hours("alice").unwrap();
        assert_eq!(hours[8], 1);
        assert_eq!(hours[10], 1);
        assert_eq!(
            db.get_nick_weekday("alice", Weekday::Mon, Period::Morning)
                .unwrap(),
            2
        );
    }

    #[test]
    fn test_unseen_nick_keeps_null_timestamps() {
        let db = test_db();
        let mut bob = Nick::new("bob");
        bob.events.slapped = 1;
        db.write_nick(&bob, date()).unwrap();

        let summary = db.get_nick_summary("bob").unwrap().unwrap();
        assert!(summary.first_seen.is_none());
        assert!(summary.last_seen.is_none());
        assert_eq!(summary.slapped, 1);
        assert_eq!(summary.lines, 0);
        assert_eq!(summary.activedays, 0);

        let mut later = Nick::new("Bob");
        later.mark_seen(at(3));
        db.write_nick(&later, date()).unwrap();
        let summary = db.get_nick_summary("bob").unwrap().unwrap();
        assert_eq!(summary.first_seen, Some(at(3)));
        assert_eq!(summary.last_seen, Some(at(3)));
    }

    #[test]
    fn test_unobserved_casing_is_not_written() {
        let db = test_db();
        db.write_nick(&talker("Frank", 4), date()).unwrap();

        let mut carried = Nick::new("frank");
        carried.casing_observed = false;
        carried.add_monologue(6);
        db.write_nick(&carried, date()).unwrap();

        let summary = db.get_nick_summary("frank").unwrap().unwrap();
        assert_eq!(summary.csnick, "Frank");
        assert_eq!(summary.monologues, 1);
    }

    #[test]
    fn test_quotes_overwrite_per_slot() {
        let db = test_db();

        let mut nick = Nick::new("carol");
        nick.add_quote(QuoteKind::Generic, "this line is definitely long enough", 25);
        db.write_nick(&nick, date()).unwrap();

        let mut nick = Nick::new("carol");
        nick.add_quote(QuoteKind::Generic, "short", 25);
        db.write_nick(&nick, date()).unwrap();

        let quote = db.get_quote("carol", QuoteKind::Generic).unwrap().unwrap();
        assert_eq!(quote.short.as_deref(), Some("short"));
        assert_eq!(
            quote.long.as_deref(),
            Some("this line is definitely long enough")
        );
        assert!(db.get_quote("carol", QuoteKind::Action).unwrap().is_none());
    }

    #[test]
    fn test_urls_and_topics_merge() {
        let db = test_db();
        let record = UrlRecord {
            url: "http://example.com/".to_string(),
            scheme: "http".to_string(),
            host: "example.com".to_string(),
            path: "/".to_string(),
        };

        let mut nick = Nick::new("dave");
        nick.add_url(record.clone(), at(12));
        nick.topics.push(Topic {
            text: "hello".to_string(),
            set_at: at(12),
        });
        db.write_nick(&nick, date()).unwrap();

        let mut nick = Nick::new("dave");
        nick.add_url(record, at(9));
        nick.topics.push(Topic {
            text: "hello".to_string(),
            set_at: at(12),
        });
        db.write_nick(&nick, date()).unwrap();

        let urls = db.get_nick_urls("dave").unwrap();
        assert_eq!(urls.len(), 1);
        assert_eq!(urls[0].total, 2);
        assert_eq!(urls[0].first_used, Some(at(9)));
        assert_eq!(urls[0].last_used, Some(at(12)));

        assert_eq!(db.get_topics("dave").unwrap().len(), 1);
    }

    #[test]
    fn test_mode_counts() {
        let db = test_db();
        let mut nick = Nick::new("op");
        nick.events.modes_performed[ModeChange::Voice.index()] = 3;
        db.write_nick(&nick, date()).unwrap();

        assert_eq!(db.get_mode_count("op", ModeChange::Voice, true).unwrap(), 3);
        assert_eq!(db.get_mode_count("op", ModeChange::Voice, false).unwrap(), 0);
        assert_eq!(db.get_mode_count("nobody", ModeChange::Op, true).unwrap(), 0);
    }

    #[test]
    fn test_channel_day_merge() {
        let db = test_db();
        let mut day = ChannelDay::new(date());
        day.add_line_at(3);
        day.add_line_at(15);
        db.write_channel_day(&day).unwrap();
        db.write_channel_day(&day).unwrap();

        let stored = db.get_channel_day(date()).unwrap().unwrap();
        assert_eq!(stored.total, 4);
        assert_eq!(stored.hours[3], 2);
        assert_eq!(stored.hours[15], 2);
        assert_eq!(stored.periods[Period::Night.index()], 2);
        assert_eq!(stored.periods[Period::Afternoon.index()], 2);

        assert!(db
            .get_channel_day(date().succ_opt().unwrap())
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_word_length_kept_from_first_insert() {
        let db = test_db();
        let first = Word {
            word: "hello".to_string(),
            length: 5,
            total: 2,
        };
        let second = Word {
            word: "hello".to_string(),
            length: 9,
            total: 1,
        };
        db.write_words(&[&first]).unwrap();
        db.write_words(&[&second]).unwrap();

        let word = db.get_word("HELLO").unwrap().unwrap();
        assert_eq!(word.length, 5);
        assert_eq!(word.total, 3);
    }

    #[test]
    fn test_streak_roundtrip() {
        let db = test_db();
        assert_eq!(db.load_streak().unwrap(), StreakState::default());

        db.write_streak(&StreakState {
            nick: "alice".to_string(),
            length: 3,
        })
        .unwrap();
        db.write_streak(&StreakState {
            nick: "bob".to_string(),
            length: 1,
        })
        .unwrap();

        let state = db.load_streak().unwrap();
        assert_eq!(state.nick, "bob");
        assert_eq!(state.length, 1);
        assert_eq!(db.count_rows("streak_history").unwrap(), 1);
    }

    #[test]
    fn test_resume_cursor() {
        let db = test_db();
        assert_eq!(db.resume_cursor("/logs/a.log").unwrap(), None);

        db.set_resume_cursor("/logs/a.log", 42).unwrap();
        db.set_resume_cursor("/logs/b.log", 7).unwrap();
        assert_eq!(db.resume_cursor("/logs/a.log").unwrap(), Some(42));
        assert_eq!(db.resume_cursor("/logs/b.log").unwrap(), Some(7));
    }

    #[test]
    fn test_top_talkers() {
        let db = test_db();
        db.write_nick(&talker("Alice", 1), date()).unwrap();
        db.write_nick(&talker("alice", 2), date()).unwrap();
        db.write_nick(&talker("Bob", 3), date()).unwrap();
        db.write_nick(&Nick::new("lurker"), date()).unwrap();

        let top = db.top_talkers(10).unwrap();
        assert_eq!(top, vec![("alice".to_string(), 2), ("Bob".to_string(), 1)]);
    }

    #[test]
    fn test_smiley_counts() {
        let db = test_db();
        let mut nick = talker("eve", 1);
        nick.lines.smileys[16] = 4;
        db.write_nick(&nick, date()).unwrap();
        db.write_nick(&nick, date()).unwrap();
        assert_eq!(db.get_smiley_count("eve", 16).unwrap(), 8);
        assert_eq!(db.get_smiley_count("eve", 0).unwrap(), 0);
    }
}
