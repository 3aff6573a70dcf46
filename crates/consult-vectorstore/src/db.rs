use rusqlite::{Connection, Result};

/// Initialise vector store tables. Safe to call on every startup (idempotent).
pub fn init_db(conn: &Connection) -> Result<()> {
    create_documents_table(conn)?;
    create_cache_table(conn)?;
    Ok(())
}

fn create_documents_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS documents (
            id          TEXT PRIMARY KEY,
            collection  TEXT NOT NULL,
            text        TEXT NOT NULL,
            metadata    TEXT NOT NULL,
            embedding   BLOB NOT NULL,
            created_at  TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_documents_collection
            ON documents(collection);",
    )
}

fn create_cache_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS cache_entries (
            id              INTEGER PRIMARY KEY AUTOINCREMENT,
            query_text      TEXT NOT NULL,
            query_embedding BLOB NOT NULL,
            category        TEXT NOT NULL,
            doc_ids         TEXT NOT NULL,
            hit_count       INTEGER NOT NULL DEFAULT 0,
            created_at      TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_cache_category
            ON cache_entries(category);",
    )
}
