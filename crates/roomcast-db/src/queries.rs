use crate::Database;
use crate::models::{FileRow, MessageRow, RoomRow, encode_timestamp};
use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row};

use roomcast_types::models::FileMeta;

const FILE_COLUMNS: &str =
    "id, file_name, file_type, size, sha256, sender, room_id, created_at";

impl Database {
    // -- Rooms --

    /// Insert a room. Returns false if a room with this id already exists.
    pub fn create_room(&self, room_id: &str, created_at: &DateTime<Utc>) -> Result<bool> {
        self.with_conn(|conn| {
            let inserted = conn.execute(
                "INSERT OR IGNORE INTO rooms (room_id, created_at) VALUES (?1, ?2)",
                (room_id, encode_timestamp(created_at)),
            )?;
            Ok(inserted == 1)
        })
    }

    pub fn get_room(&self, room_id: &str) -> Result<Option<RoomRow>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    "SELECT room_id, created_at FROM rooms WHERE room_id = ?1",
                    [room_id],
                    |row| {
                        Ok(RoomRow {
                            room_id: row.get(0)?,
                            created_at: row.get(1)?,
                        })
                    },
                )
                .optional()?;
            Ok(row)
        })
    }

    // -- Messages --

    /// Append a message to a room's history in a single statement.
    ///
    /// The room check and the insert happen atomically, so concurrent appends
    /// to one room never overwrite each other. Returns false (and writes
    /// nothing) when the room does not exist.
    pub fn append_message(
        &self,
        room_id: &str,
        sender: &str,
        content: &str,
        time_stamp: &DateTime<Utc>,
    ) -> Result<bool> {
        self.with_conn(|conn| {
            let inserted = conn.execute(
                "INSERT INTO messages (room_id, sender, content, time_stamp)
                 SELECT room_id, ?2, ?3, ?4 FROM rooms WHERE room_id = ?1",
                rusqlite::params![room_id, sender, content, encode_timestamp(time_stamp)],
            )?;
            Ok(inserted == 1)
        })
    }

    /// Fetch a window of a room's history, oldest first.
    ///
    /// `skip_newest` messages are skipped from the end of the history, then up
    /// to `limit` messages before that point are returned.
    pub fn get_messages(&self, room_id: &str, limit: u32, skip_newest: u64) -> Result<Vec<MessageRow>> {
        self.with_conn(|conn| query_messages(conn, room_id, limit, skip_newest))
    }

    pub fn count_messages(&self, room_id: &str) -> Result<u64> {
        self.with_conn(|conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM messages WHERE room_id = ?1",
                [room_id],
                |row| row.get(0),
            )?;
            Ok(count as u64)
        })
    }

    // -- Files --

    /// Store a file's metadata and content together.
    pub fn insert_file(&self, meta: &FileMeta, data: &[u8]) -> Result<()> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            tx.execute(
                &format!("INSERT INTO files ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)", FILE_COLUMNS),
                rusqlite::params![
                    meta.id,
                    meta.file_name,
                    meta.file_type,
                    meta.size as i64,
                    meta.sha256,
                    meta.sender,
                    meta.room_id,
                    encode_timestamp(&meta.created_at),
                ],
            )?;
            tx.execute(
                "INSERT INTO file_data (file_id, data) VALUES (?1, ?2)",
                rusqlite::params![meta.id, data],
            )?;
            tx.commit()?;
            Ok(())
        })
    }

    /// Metadata only; never reads the content table.
    pub fn get_file_meta(&self, id: &str) -> Result<Option<FileRow>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    &format!("SELECT {} FROM files WHERE id = ?1", FILE_COLUMNS),
                    [id],
                    map_file_row,
                )
                .optional()?;
            Ok(row)
        })
    }

    pub fn get_file(&self, id: &str) -> Result<Option<(FileRow, Vec<u8>)>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    "SELECT f.id, f.file_name, f.file_type, f.size, f.sha256, f.sender, f.room_id, f.created_at, d.data
                     FROM files f
                     JOIN file_data d ON d.file_id = f.id
                     WHERE f.id = ?1",
                    [id],
                    |row| Ok((map_file_row(row)?, row.get::<_, Vec<u8>>(8)?)),
                )
                .optional()?;
            Ok(row)
        })
    }
}

fn query_messages(conn: &Connection, room_id: &str, limit: u32, skip_newest: u64) -> Result<Vec<MessageRow>> {
    let mut stmt = conn.prepare(
        "SELECT seq, room_id, sender, content, time_stamp
         FROM messages
         WHERE room_id = ?1
         ORDER BY seq DESC
         LIMIT ?2 OFFSET ?3",
    )?;

    let mut rows = stmt
        .query_map(rusqlite::params![room_id, limit, skip_newest as i64], |row| {
            Ok(MessageRow {
                seq: row.get(0)?,
                room_id: row.get(1)?,
                sender: row.get(2)?,
                content: row.get(3)?,
                time_stamp: row.get(4)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    rows.reverse();
    Ok(rows)
}

fn map_file_row(row: &Row<'_>) -> rusqlite::Result<FileRow> {
    Ok(FileRow {
        id: row.get(0)?,
        file_name: row.get(1)?,
        file_type: row.get(2)?,
        size: row.get(3)?,
        sha256: row.get(4)?,
        sender: row.get(5)?,
        room_id: row.get(6)?,
        created_at: row.get(7)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use roomcast_types::models::{Message, Room};

    fn db_with_room(room_id: &str) -> Database {
        let db = Database::open_in_memory().unwrap();
        assert!(db.create_room(room_id, &Utc::now()).unwrap());
        db
    }

    #[test]
    fn create_room_rejects_duplicates() {
        let db = db_with_room("general");
        assert!(!db.create_room("general", &Utc::now()).unwrap());

        let room: Room = db.get_room("general").unwrap().unwrap().into();
        assert_eq!(room.room_id, "general");
        assert!(db.get_room("ghost").unwrap().is_none());
    }

    #[test]
    fn append_to_missing_room_writes_nothing() {
        let db = db_with_room("general");
        assert!(!db.append_message("ghost", "alice", "hi", &Utc::now()).unwrap());
        assert_eq!(db.count_messages("ghost").unwrap(), 0);
        assert_eq!(db.count_messages("general").unwrap(), 0);
    }

    #[test]
    fn messages_come_back_in_arrival_order() {
        let db = db_with_room("general");
        let ts = Utc::now();
        for i in 0..5 {
            assert!(db.append_message("general", "alice", &format!("m{}", i), &ts).unwrap());
        }

        let all: Vec<Message> = db
            .get_messages("general", 10, 0)
            .unwrap()
            .into_iter()
            .map(Into::into)
            .collect();
        let contents: Vec<&str> = all.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["m0", "m1", "m2", "m3", "m4"]);
        assert_eq!(all[0].time_stamp, ts);
    }

    #[test]
    fn message_window_skips_from_newest() {
        let db = db_with_room("general");
        for i in 0..5 {
            db.append_message("general", "bob", &format!("m{}", i), &Utc::now()).unwrap();
        }

        let window = db.get_messages("general", 2, 1).unwrap();
        let contents: Vec<&str> = window.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["m2", "m3"]);

        assert!(db.get_messages("general", 2, 10).unwrap().is_empty());
    }

    #[test]
    fn file_metadata_and_content_are_stored_apart() {
        let db = Database::open_in_memory().unwrap();
        let meta = FileMeta {
            id: "f1".into(),
            file_name: Some("notes.txt".into()),
            file_type: "text/plain".into(),
            size: 5,
            sha256: "abc".into(),
            sender: Some("alice".into()),
            room_id: Some("general".into()),
            created_at: Utc::now(),
        };
        db.insert_file(&meta, b"hello").unwrap();

        let meta_row = db.get_file_meta("f1").unwrap().unwrap();
        assert_eq!(meta_row.file_name.as_deref(), Some("notes.txt"));
        assert_eq!(meta_row.size, 5);

        let (row, data) = db.get_file("f1").unwrap().unwrap();
        assert_eq!(row.file_type, "text/plain");
        assert_eq!(data, b"hello");

        assert!(db.get_file("missing").unwrap().is_none());
        assert!(db.get_file_meta("missing").unwrap().is_none());
    }

    #[test]
    fn duplicate_file_id_leaves_no_partial_record() {
        let db = Database::open_in_memory().unwrap();
        let meta = FileMeta {
            id: "dup".into(),
            file_name: None,
            file_type: "application/octet-stream".into(),
            size: 0,
            sha256: String::new(),
            sender: None,
            room_id: None,
            created_at: Utc::now(),
        };
        db.insert_file(&meta, b"").unwrap();
        assert!(db.insert_file(&meta, b"other").is_err());

        let (_, data) = db.get_file("dup").unwrap().unwrap();
        assert!(data.is_empty());
    }
}
