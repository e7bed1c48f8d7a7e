//! Database operations for the scheduling core
//!
//! Handles SQLite initialization and schema upgrades, reads and writes of the
//! `srs_*` schedule columns on `cards`, and the append-only `review_logs` table.
//! Functions take a `&Connection` so they can run inside a caller's transaction.

use crate::error::{Result, ReviewError};
use crate::models::{CardState, ReviewLogEntry, ReviewResult, ScheduleState};
use chrono::{DateTime, Utc};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, ValueRef};
use rusqlite::{Connection, OptionalExtension, Row, ToSql, params};
use std::path::Path;

/// SQLite default for timestamp columns. Matches the text rusqlite writes for
/// a `DateTime<Utc>` (`YYYY-MM-DD HH:MM:SS.SSS+00:00`), so defaulted and
/// explicitly written values share one format and sort together.
const NOW_UTC: &str = "strftime('%Y-%m-%d %H:%M:%f+00:00', 'now')";

/// Rows returned by `due_cards` when the caller gives no limit.
pub const DEFAULT_DUE_LIMIT: u32 = 50;

/// Schedule columns and the DDL used to add them to an older `cards` table.
const SRS_COLUMNS: [(&str, &str); 6] = [
    ("srs_type", "TEXT NOT NULL DEFAULT 'new'"),
    ("srs_step", "INTEGER NOT NULL DEFAULT 0"),
    ("srs_ivl", "INTEGER NOT NULL DEFAULT 0"),
    ("srs_ease", "INTEGER NOT NULL DEFAULT 250"),
    ("srs_lapses", "INTEGER NOT NULL DEFAULT 0"),
    ("srs_due", "TEXT"),
];

impl ToSql for CardState {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(self.as_str().into())
    }
}

impl FromSql for CardState {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e: ReviewError| FromSqlError::Other(Box::new(e)))
    }
}

impl ToSql for ReviewResult {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(self.as_str().into())
    }
}

impl FromSql for ReviewResult {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e: ReviewError| FromSqlError::Other(Box::new(e)))
    }
}

/// Opens (creating if needed) the database file and brings its schema up to date.
pub fn open_database(path: &Path, busy_timeout_ms: u64) -> Result<Connection> {
    let conn = Connection::open(path)?;
    configure_connection(&conn, busy_timeout_ms)?;
    conn.execute_batch("PRAGMA journal_mode = WAL;")?;
    init_database(&conn)?;
    Ok(conn)
}

/// Private in-memory database with the full schema.
pub fn open_in_memory() -> Result<Connection> {
    let conn = Connection::open_in_memory()?;
    configure_connection(&conn, 0)?;
    init_database(&conn)?;
    Ok(conn)
}

fn configure_connection(conn: &Connection, busy_timeout_ms: u64) -> Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(std::time::Duration::from_millis(busy_timeout_ms))?;
    Ok(())
}

/// Creates tables for decks, cards and the review log.
///
/// An existing `cards` table without schedule columns gets them added with
/// their defaults, so every pre-existing card starts out `new`.
pub fn init_database(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS decks (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE
        )",
        (),
    )?;

    conn.execute(
        &format!(
            "CREATE TABLE IF NOT EXISTS cards (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                deck_id INTEGER,
                front TEXT NOT NULL,
                back TEXT NOT NULL,
                created_at TEXT DEFAULT ({NOW_UTC}),
                updated_at TEXT DEFAULT ({NOW_UTC}),
                FOREIGN KEY (deck_id) REFERENCES decks(id) ON DELETE SET NULL
            )"
        ),
        (),
    )?;

    upgrade_cards_table(conn)?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS review_logs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            card_id INTEGER NOT NULL,
            created_at TEXT NOT NULL,
            result TEXT NOT NULL,
            duration_ms INTEGER,
            FOREIGN KEY (card_id) REFERENCES cards(id) ON DELETE CASCADE
        )",
        (),
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_review_logs_card
         ON review_logs (card_id, created_at)",
        (),
    )?;

    Ok(())
}

fn upgrade_cards_table(conn: &Connection) -> Result<()> {
    let mut stmt = conn.prepare("PRAGMA table_info(cards)")?;
    let existing = stmt
        .query_map([], |row| row.get::<_, String>(1))?
        .collect::<rusqlite::Result<Vec<String>>>()?;

    for (name, ddl) in SRS_COLUMNS {
        if !existing.iter().any(|c| c == name) {
            tracing::info!(column = name, "adding schedule column to cards");
            conn.execute(&format!("ALTER TABLE cards ADD COLUMN {name} {ddl}"), ())?;
        }
    }
    Ok(())
}

/// Creates a deck and returns its id.
pub fn new_deck(name: &str, conn: &Connection) -> Result<i64> {
    conn.execute("INSERT INTO decks (name) VALUES (?1)", params![name])?;
    Ok(conn.last_insert_rowid())
}

pub fn count_cards(conn: &Connection) -> Result<i64> {
    Ok(conn.query_row("SELECT COUNT(*) FROM cards", [], |row| row.get(0))?)
}

/// Adds a card with a fresh `new` schedule and returns its id.
pub fn add_card(deck_id: Option<i64>, front: &str, back: &str, conn: &Connection) -> Result<i64> {
    conn.execute(
        "INSERT INTO cards (deck_id, front, back) VALUES (?1, ?2, ?3)",
        params![deck_id, front, back],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Fills an empty database with a "Default" deck of three cards.
/// Returns the new deck id, or `None` if the database already had cards.
pub fn seed_sample_deck(conn: &Connection) -> Result<Option<i64>> {
    if count_cards(conn)? > 0 {
        return Ok(None);
    }
    let deck = new_deck("Default", conn)?;
    add_card(Some(deck), "What is the capital of France?", "Paris", conn)?;
    add_card(Some(deck), "2 + 2 = ?", "4", conn)?;
    add_card(Some(deck), "HTTP status for Not Found?", "404", conn)?;
    tracing::info!(deck_id = deck, "sample data created");
    Ok(Some(deck))
}

/// Deletes a card; its schedule goes with the row and its log entries cascade.
/// Returns false if there was no such card.
pub fn delete_card(card_id: i64, conn: &Connection) -> Result<bool> {
    let removed = conn.execute("DELETE FROM cards WHERE id = ?1", params![card_id])?;
    Ok(removed > 0)
}

pub fn card_exists(card_id: i64, conn: &Connection) -> Result<bool> {
    let found = conn
        .query_row("SELECT 1 FROM cards WHERE id = ?1", params![card_id], |_| Ok(()))
        .optional()?;
    Ok(found.is_some())
}

fn schedule_from_row(row: &Row<'_>) -> rusqlite::Result<ScheduleState> {
    Ok(ScheduleState {
        state: row.get("srs_type")?,
        step: row.get("srs_step")?,
        interval: row.get("srs_ivl")?,
        ease: row.get("srs_ease")?,
        lapses: row.get("srs_lapses")?,
        due: row.get("srs_due")?,
    })
}

/// Reads the schedule of a card, or `None` if the card does not exist.
pub fn load_schedule(card_id: i64, conn: &Connection) -> Result<Option<ScheduleState>> {
    let schedule = conn
        .query_row(
            "SELECT srs_type, srs_step, srs_ivl, srs_ease, srs_lapses, srs_due
             FROM cards WHERE id = ?1",
            params![card_id],
            schedule_from_row,
        )
        .optional()?;
    Ok(schedule)
}

/// Overwrites every schedule column of a card in one statement.
pub fn save_schedule(
    card_id: i64,
    schedule: &ScheduleState,
    updated_at: DateTime<Utc>,
    conn: &Connection,
) -> Result<()> {
    let changed = conn.execute(
        "UPDATE cards
         SET srs_type = ?1, srs_step = ?2, srs_ivl = ?3, srs_ease = ?4,
             srs_lapses = ?5, srs_due = ?6, updated_at = ?7
         WHERE id = ?8",
        params![
            schedule.state,
            schedule.step,
            schedule.interval,
            schedule.ease,
            schedule.lapses,
            schedule.due,
            updated_at,
            card_id
        ],
    )?;
    if changed == 0 {
        return Err(ReviewError::NotFound(card_id));
    }
    Ok(())
}

/// Appends one review log row and returns its id.
pub fn insert_review_log(
    card_id: i64,
    result: ReviewResult,
    duration_ms: Option<u64>,
    created_at: DateTime<Utc>,
    conn: &Connection,
) -> Result<i64> {
    conn.execute(
        "INSERT INTO review_logs (card_id, created_at, result, duration_ms)
         VALUES (?1, ?2, ?3, ?4)",
        params![card_id, created_at, result, duration_ms],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Review log of a card, oldest first.
pub fn review_log_for_card(card_id: i64, conn: &Connection) -> Result<Vec<ReviewLogEntry>> {
    let mut stmt = conn.prepare(
        "SELECT id, card_id, created_at, result, duration_ms
         FROM review_logs
         WHERE card_id = ?1
         ORDER BY created_at ASC, id ASC",
    )?;

    let entries = stmt
        .query_map(params![card_id], |row| {
            Ok(ReviewLogEntry {
                id: row.get(0)?,
                card_id: row.get(1)?,
                timestamp: row.get(2)?,
                result: row.get(3)?,
                duration_ms: row.get(4)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(entries)
}

/// Cards eligible for study at `now`, optionally limited to one deck.
///
/// Scheduled cards come first, earliest due first; never-graded cards follow
/// in creation order.
pub fn due_cards(
    deck_id: Option<i64>,
    limit: Option<u32>,
    now: DateTime<Utc>,
    conn: &Connection,
) -> Result<Vec<(i64, ScheduleState)>> {
    let mut stmt = conn.prepare(
        "SELECT id, srs_type, srs_step, srs_ivl, srs_ease, srs_lapses, srs_due
         FROM cards
         WHERE (srs_due IS NULL OR srs_due <= ?1)
           AND (?2 IS NULL OR deck_id = ?2)
         ORDER BY srs_due IS NULL, srs_due ASC, id ASC
         LIMIT ?3",
    )?;

    let cards = stmt
        .query_map(
            params![now, deck_id, limit.unwrap_or(DEFAULT_DUE_LIMIT)],
            |row| Ok((row.get(0)?, schedule_from_row(row)?)),
        )?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(cards)
}
