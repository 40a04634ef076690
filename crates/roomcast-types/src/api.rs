use serde::{Deserialize, Serialize};

// -- Messages --

/// Payload a client submits on a room's inbound channel.
///
/// `room_id` is the room the message is stored under. It usually matches the
/// room in the channel path, but nothing requires it to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageRequest {
    pub content: String,
    pub sender: String,
    pub room_id: String,
}

#[derive(Debug, Deserialize)]
pub struct MessagePageQuery {
    #[serde(default)]
    pub page: u32,
    #[serde(default = "default_page_size")]
    pub size: u32,
}

fn default_page_size() -> u32 {
    20
}

// -- Rooms --

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CreateRoomRequest {
    pub room_id: String,
}

// -- Files --

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub file_name: Option<String>,
    pub file_id: String,
    pub url: String,
}

impl UploadResponse {
    pub fn new(file_id: String, file_name: Option<String>) -> Self {
        Self {
            url: format!("/api/files/{}", file_id),
            file_name,
            file_id,
        }
    }
}

// -- Health --

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub connections: usize,
}
