use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// MIME type recorded when an upload does not declare one.
pub const DEFAULT_FILE_TYPE: &str = "application/octet-stream";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Room {
    pub room_id: String,
    pub created_at: DateTime<Utc>,
}

/// A chat message as stored in a room's history and as broadcast to subscribers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub sender: String,
    pub content: String,
    pub time_stamp: DateTime<Utc>,
}

impl Message {
    /// Build a message stamped with the server clock.
    pub fn new(sender: impl Into<String>, content: impl Into<String>) -> Self {
        Self::with_timestamp(sender, content, Utc::now())
    }

    pub fn with_timestamp(
        sender: impl Into<String>,
        content: impl Into<String>,
        time_stamp: DateTime<Utc>,
    ) -> Self {
        Self {
            sender: sender.into(),
            content: content.into(),
            time_stamp,
        }
    }
}

/// Everything known about a stored file except its bytes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileMeta {
    pub id: String,
    pub file_name: Option<String>,
    pub file_type: String,
    pub size: u64,
    pub sha256: String,
    pub sender: Option<String>,
    pub room_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A stored attachment: metadata plus the full content.
#[derive(Debug, Clone, PartialEq)]
pub struct FileBlob {
    pub meta: FileMeta,
    pub data: Vec<u8>,
}

impl FileBlob {
    pub fn id(&self) -> &str {
        &self.meta.id
    }

    pub fn file_type(&self) -> &str {
        &self.meta.file_type
    }

    pub fn file_name(&self) -> Option<&str> {
        self.meta.file_name.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_serializes_with_camel_case_timestamp() {
        let ts = "2025-10-06T23:44:00Z".parse::<DateTime<Utc>>().unwrap();
        let msg = Message::with_timestamp("alice", "hi", ts);

        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["sender"], "alice");
        assert_eq!(json["content"], "hi");
        assert_eq!(json["timeStamp"], "2025-10-06T23:44:00Z");
    }

    #[test]
    fn message_new_uses_server_clock() {
        let before = Utc::now();
        let msg = Message::new("bob", "hello");
        let after = Utc::now();

        assert!(msg.time_stamp >= before && msg.time_stamp <= after);
    }
}
