//! Database row types. These map directly to SQLite rows.
//! Conversions into the roomcast-types models live here so callers never see
//! the on-disk timestamp encoding.

use chrono::{DateTime, SecondsFormat, Utc};
use tracing::warn;

use roomcast_types::models::{FileBlob, FileMeta, Message, Room};

pub struct RoomRow {
    pub room_id: String,
    pub created_at: String,
}

pub struct MessageRow {
    pub seq: i64,
    pub room_id: String,
    pub sender: String,
    pub content: String,
    pub time_stamp: String,
}

pub struct FileRow {
    pub id: String,
    pub file_name: Option<String>,
    pub file_type: String,
    pub size: i64,
    pub sha256: String,
    pub sender: Option<String>,
    pub room_id: Option<String>,
    pub created_at: String,
}

/// Timestamps are stored as RFC 3339 UTC at full nanosecond precision, so a
/// value read back compares equal to the one written.
pub fn encode_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn decode_timestamp(raw: &str, what: &str) -> DateTime<Utc> {
    raw.parse::<DateTime<Utc>>().unwrap_or_else(|e| {
        warn!("Corrupt timestamp '{}' on {}: {}", raw, what, e);
        DateTime::default()
    })
}

impl From<RoomRow> for Room {
    fn from(row: RoomRow) -> Self {
        let created_at = decode_timestamp(&row.created_at, &format!("room '{}'", row.room_id));
        Room {
            room_id: row.room_id,
            created_at,
        }
    }
}

impl From<MessageRow> for Message {
    fn from(row: MessageRow) -> Self {
        let ts = decode_timestamp(
            &row.time_stamp,
            &format!("message {} in room '{}'", row.seq, row.room_id),
        );
        Message::with_timestamp(row.sender, row.content, ts)
    }
}

impl From<FileRow> for FileMeta {
    fn from(row: FileRow) -> Self {
        let created_at = decode_timestamp(&row.created_at, &format!("file '{}'", row.id));
        FileMeta {
            id: row.id,
            file_name: row.file_name,
            file_type: row.file_type,
            size: row.size.max(0) as u64,
            sha256: row.sha256,
            sender: row.sender,
            room_id: row.room_id,
            created_at,
        }
    }
}

impl FileRow {
    pub fn into_blob(self, data: Vec<u8>) -> FileBlob {
        FileBlob {
            meta: self.into(),
            data,
        }
    }
}
