use rusqlite::Connection;
use tracing::info;

use crate::Result;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |r| r.get(0),
    )?;

    if version < 1 {
        info!("Running migration v1 (initial schema)");
        conn.execute_batch(
            "
            CREATE TABLE users (
                id          TEXT PRIMARY KEY,
                name        TEXT NOT NULL,
                email       TEXT NOT NULL,
                password    TEXT NOT NULL,
                created_at  TEXT NOT NULL
            );

            CREATE UNIQUE INDEX idx_users_email ON users(email);
            CREATE INDEX idx_users_name ON users(name);
            CREATE INDEX idx_users_created ON users(created_at DESC);

            CREATE TABLE tags (
                id          TEXT PRIMARY KEY,
                uid         TEXT NOT NULL,
                name        TEXT NOT NULL,
                color       TEXT NOT NULL,
                created_at  TEXT NOT NULL,
                updated_at  TEXT
            );

            CREATE UNIQUE INDEX idx_tags_owner_name ON tags(uid, name);
            CREATE INDEX idx_tags_name ON tags(name DESC);
            CREATE INDEX idx_tags_created ON tags(created_at DESC);

            CREATE TABLE records (
                id          TEXT PRIMARY KEY,
                uid         TEXT NOT NULL,
                event       TEXT NOT NULL,
                duration    INTEGER NOT NULL DEFAULT 0,
                created_at  TEXT NOT NULL,
                updated_at  TEXT
            );

            CREATE INDEX idx_records_owner_created ON records(uid, created_at DESC);

            -- Tag references are plain values; deletion is guarded by a count.
            CREATE TABLE record_tags (
                record_id   TEXT NOT NULL REFERENCES records(id) ON DELETE CASCADE,
                tag_id      TEXT NOT NULL,
                position    INTEGER NOT NULL,
                PRIMARY KEY (record_id, tag_id)
            );

            CREATE INDEX idx_record_tags_tag ON record_tags(tag_id);

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}
