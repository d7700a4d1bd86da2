use serde::{Deserialize, Serialize};

/// First frame written on a freshly opened room pipe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinFrame {
    pub room_id: String,
    pub name: String,
    pub client_key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateRoomRequest {
    pub client_key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateRoomResponse {
    pub room_id: String,
}

/// Structured error body returned by the room-creation endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ErrResponse {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub error: String,
}
