//! Database schema and migrations
//!
//! Uses SQLite with embedded migrations managed via PRAGMA user_version.

use rusqlite::Connection;

/// Current schema version
pub const SCHEMA_VERSION: i32 = 2;

/// SQL migrations, indexed by version number
const MIGRATIONS: &[&str] = &[
    // Version 1: Channel, nick and word aggregates
    r#"
    -- ============================================
    -- Channel activity
    -- ============================================

    CREATE TABLE IF NOT EXISTS channel_days (
        date             TEXT PRIMARY KEY,       -- YYYY-MM-DD
        l_night          INTEGER NOT NULL DEFAULT 0,
        l_morning        INTEGER NOT NULL DEFAULT 0,
        l_afternoon      INTEGER NOT NULL DEFAULT 0,
        l_evening        INTEGER NOT NULL DEFAULT 0,
        l_total          INTEGER NOT NULL DEFAULT 0
    );

    CREATE TABLE IF NOT EXISTS channel_hours (
        date             TEXT NOT NULL REFERENCES channel_days(date),
        hour             INTEGER NOT NULL CHECK (hour BETWEEN 0 AND 23),
        lines            INTEGER NOT NULL DEFAULT 0,
        PRIMARY KEY (date, hour)
    );

    -- ============================================
    -- Nicks
    -- ============================================

    CREATE TABLE IF NOT EXISTS nicks (
        nick             TEXT PRIMARY KEY,       -- lowercase identity
        csnick           TEXT NOT NULL,          -- latest casing
        first_seen       DATETIME,
        last_seen        DATETIME,
        last_talked      DATETIME
    );

    CREATE TABLE IF NOT EXISTS nick_events (
        nick             TEXT PRIMARY KEY REFERENCES nicks(nick),
        joins            INTEGER NOT NULL DEFAULT 0,
        parts            INTEGER NOT NULL DEFAULT 0,
        quits            INTEGER NOT NULL DEFAULT 0,
        kicks            INTEGER NOT NULL DEFAULT 0,
        kicked           INTEGER NOT NULL DEFAULT 0,
        actions          INTEGER NOT NULL DEFAULT 0,
        topics           INTEGER NOT NULL DEFAULT 0,
        slaps            INTEGER NOT NULL DEFAULT 0,
        slapped          INTEGER NOT NULL DEFAULT 0,
        nickchanges      INTEGER NOT NULL DEFAULT 0,
        monologues       INTEGER NOT NULL DEFAULT 0,
        top_monologue    INTEGER NOT NULL DEFAULT 0,
        m_op             INTEGER NOT NULL DEFAULT 0,
        m_deop           INTEGER NOT NULL DEFAULT 0,
        m_voice          INTEGER NOT NULL DEFAULT 0,
        m_devoice        INTEGER NOT NULL DEFAULT 0,
        m_opped          INTEGER NOT NULL DEFAULT 0,
        m_deopped        INTEGER NOT NULL DEFAULT 0,
        m_voiced         INTEGER NOT NULL DEFAULT 0,
        m_devoiced       INTEGER NOT NULL DEFAULT 0,
        ex_kicks         TEXT,
        ex_kicked        TEXT
    );

    CREATE TABLE IF NOT EXISTS nick_lines (
        nick             TEXT PRIMARY KEY REFERENCES nicks(nick),
        l_total          INTEGER NOT NULL DEFAULT 0,
        l_night          INTEGER NOT NULL DEFAULT 0,
        l_morning        INTEGER NOT NULL DEFAULT 0,
        l_afternoon      INTEGER NOT NULL DEFAULT 0,
        l_evening        INTEGER NOT NULL DEFAULT 0,
        characters       INTEGER NOT NULL DEFAULT 0,
        words            INTEGER NOT NULL DEFAULT 0,
        urls             INTEGER NOT NULL DEFAULT 0,
        exclamations     INTEGER NOT NULL DEFAULT 0,
        questions        INTEGER NOT NULL DEFAULT 0,
        uppercased       INTEGER NOT NULL DEFAULT 0
    );

    CREATE TABLE IF NOT EXISTS nick_hours (
        nick             TEXT NOT NULL REFERENCES nicks(nick),
        hour             INTEGER NOT NULL CHECK (hour BETWEEN 0 AND 23),
        lines            INTEGER NOT NULL DEFAULT 0,
        PRIMARY KEY (nick, hour)
    );

    CREATE TABLE IF NOT EXISTS nick_weekdays (
        nick             TEXT NOT NULL REFERENCES nicks(nick),
        weekday          TEXT NOT NULL,          -- mon .. sun
        period           TEXT NOT NULL,          -- night, morning, afternoon, evening
        lines            INTEGER NOT NULL DEFAULT 0,
        PRIMARY KEY (nick, weekday, period)
    );

    CREATE TABLE IF NOT EXISTS nick_smileys (
        nick             TEXT NOT NULL REFERENCES nicks(nick),
        smiley           TEXT NOT NULL,          -- s_01 .. s_19
        total            INTEGER NOT NULL DEFAULT 0,
        PRIMARY KEY (nick, smiley)
    );

    CREATE TABLE IF NOT EXISTS nick_activity (
        nick             TEXT NOT NULL REFERENCES nicks(nick),
        date             TEXT NOT NULL,
        lines            INTEGER NOT NULL DEFAULT 0,
        PRIMARY KEY (nick, date)
    );

    CREATE TABLE IF NOT EXISTS nick_quotes (
        nick             TEXT NOT NULL REFERENCES nicks(nick),
        category         TEXT NOT NULL,          -- quote, ex_uppercased, ...
        short            TEXT,
        long             TEXT,
        PRIMARY KEY (nick, category)
    );

    CREATE TABLE IF NOT EXISTS nick_urls (
        nick             TEXT NOT NULL REFERENCES nicks(nick),
        url              TEXT NOT NULL,
        scheme           TEXT NOT NULL,
        host             TEXT NOT NULL,
        path             TEXT NOT NULL,
        first_used       DATETIME NOT NULL,
        last_used        DATETIME NOT NULL,
        total            INTEGER NOT NULL DEFAULT 0,
        PRIMARY KEY (nick, url)
    );

    CREATE INDEX IF NOT EXISTS idx_nick_urls_host ON nick_urls(host);

    CREATE TABLE IF NOT EXISTS topics (
        id               INTEGER PRIMARY KEY AUTOINCREMENT,
        nick             TEXT NOT NULL REFERENCES nicks(nick),
        topic            TEXT NOT NULL,
        set_at           DATETIME NOT NULL,
        UNIQUE (nick, topic, set_at)
    );

    -- ============================================
    -- Words
    -- ============================================

    CREATE TABLE IF NOT EXISTS words (
        word             TEXT PRIMARY KEY,       -- lowercase
        length           INTEGER NOT NULL,       -- characters, from first sighting
        total            INTEGER NOT NULL DEFAULT 0
    );
    "#,
    // Version 2: Resume state
    r#"
    CREATE TABLE IF NOT EXISTS streak_history (
        id               INTEGER PRIMARY KEY CHECK (id = 1),
        nick             TEXT NOT NULL,
        length           INTEGER NOT NULL
    );

    CREATE TABLE IF NOT EXISTS parse_history (
        logfile          TEXT PRIMARY KEY,
        next_line        INTEGER NOT NULL,
        last_parsed_at   DATETIME NOT NULL
    );
    "#,
];

/// Run all pending migrations
pub fn run_migrations(conn: &Connection) -> crate::error::Result<()> {
    let current_version: i32 = conn
        .query_row("PRAGMA user_version", [], |r| r.get(0))
        .unwrap_or(0);

    tracing::info!(
        current_version,
        target_version = SCHEMA_VERSION,
        "Checking database migrations"
    );

    for (i, migration) in MIGRATIONS.iter().enumerate() {
        let version = (i + 1) as i32;
        if version > current_version {
            tracing::info!(version, "Running migration");
            conn.execute_batch(migration)?;
            conn.execute(&format!("PRAGMA user_version = {}", version), [])?;
        }
    }

    if current_version < SCHEMA_VERSION {
        tracing::info!(
            from = current_version,
            to = SCHEMA_VERSION,
            "Migrations complete"
        );
    }

    Ok(())
}

/// Get the current schema version from the database
pub fn get_schema_version(conn: &Connection) -> crate::error::Result<i32> {
    let version: i32 = conn.query_row("PRAGMA user_version", [], |r| r.get(0))?;
    Ok(version)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrations_idempotent() {
        let conn = Connection::open_in_memory().unwrap();

        // Run migrations twice - should be idempotent
        run_migrations(&conn).unwrap();
        run_migrations(&conn).unwrap();

        let version = get_schema_version(&conn).unwrap();
        assert_eq!(version, SCHEMA_VERSION);
    }

    #[test]
    fn test_tables_created() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();

        let tables = [
            "channel_days",
            "channel_hours",
            "nicks",
            "nick_events",
            "nick_lines",
            "nick_hours",
            "nick_weekdays",
            "nick_smileys",
            "nick_activity",
            "nick_quotes",
            "nick_urls",
            "topics",
            "words",
            "streak_history",
            "parse_history",
        ];

        for table in tables {
            let exists: i32 = conn
                .query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?",
                    [table],
                    |r| r.get(0),
                )
                .unwrap();
            assert_eq!(exists, 1, "Table {} should exist", table);
        }
    }

    #[test]
    fn test_streak_history_single_row() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();

        conn.execute(
            "INSERT INTO streak_history (id, nick, length) VALUES (1, 'a', 1)",
            [],
        )
        .unwrap();
        let second = conn.execute(
            "INSERT INTO streak_history (id, nick, length) VALUES (2, 'b', 1)",
            [],
        );
        assert!(second.is_err());
    }

    #[test]
    fn test_foreign_keys() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute("PRAGMA foreign_keys = ON", []).unwrap();
        run_migrations(&conn).unwrap();

        let fk_tables: Vec<String> = conn
            .prepare("PRAGMA foreign_key_list(nick_urls)")
            .unwrap()
            .query_map([], |row| row.get::<_, String>(2))
            .unwrap()
            .filter_map(|r| r.ok())
            .collect();

        assert!(
            fk_tables.iter().any(|table| table == "nicks"),
            "nick_urls should reference nicks"
        );
    }
}
