use rusqlite::Connection;

use crate::error::Result;

/// Initialise the sessions, transcript, and result tables. Safe to call on
/// every startup — uses `IF NOT EXISTS` throughout.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS sessions (
            id            TEXT PRIMARY KEY,
            room          TEXT NOT NULL,
            prior_summary TEXT NOT NULL DEFAULT '',
            created_at    TEXT NOT NULL,
            updated_at    TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_sessions_room ON sessions(room);

        CREATE TABLE IF NOT EXISTS transcript_turns (
            session_id TEXT NOT NULL,
            turn_id    INTEGER NOT NULL,
            speaker_role TEXT NOT NULL,
            speaker_name TEXT NOT NULL,
            text         TEXT NOT NULL,
            timestamp    TEXT NOT NULL,
            confidence   REAL,
            PRIMARY KEY (session_id, turn_id)
        );

        CREATE TABLE IF NOT EXISTS analysis_results (
            session_id  TEXT NOT NULL,
            turn_id     INTEGER NOT NULL,
            kind        TEXT NOT NULL,
            payload     TEXT NOT NULL,
            produced_at TEXT NOT NULL,
            PRIMARY KEY (session_id, turn_id, kind)
        );",
    )?;
    Ok(())
}
