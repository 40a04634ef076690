use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);"
    )?;

    let version: i64 = conn
        .query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |r| r.get(0))?;

    if version < 1 {
        info!("Running migration v1 (rooms, messages, files)");
        conn.execute_batch(
            "
            CREATE TABLE rooms (
                room_id     TEXT PRIMARY KEY,
                created_at  TEXT NOT NULL
            );

            -- seq gives arrival order; timestamps can tie
            CREATE TABLE messages (
                seq         INTEGER PRIMARY KEY AUTOINCREMENT,
                room_id     TEXT NOT NULL REFERENCES rooms(room_id),
                sender      TEXT NOT NULL,
                content     TEXT NOT NULL,
                time_stamp  TEXT NOT NULL
            );

            CREATE INDEX idx_messages_room
                ON messages(room_id, seq);

            -- metadata and content live apart so metadata reads skip the blob
            CREATE TABLE files (
                id          TEXT PRIMARY KEY,
                file_name   TEXT,
                file_type   TEXT NOT NULL,
                size        INTEGER NOT NULL,
                sha256      TEXT NOT NULL,
                sender      TEXT,
                room_id     TEXT,
                created_at  TEXT NOT NULL
            );

            CREATE TABLE file_data (
                file_id     TEXT PRIMARY KEY REFERENCES files(id) ON DELETE CASCADE,
                data        BLOB NOT NULL
            );

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}
