use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Protocol message kinds carried in the `type` field of every frame.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum MessageType {
    VideoOffer,
    VideoAnswer,
    DataOffer,
    DataAnswer,
    NewIceCandidate,
    Chat,
    List,
    Join,
    Leave,
    Error,
    /// A type this client does not understand. Kept so that newer servers
    /// never break older clients.
    Unknown(String),
}

impl MessageType {
    pub fn as_str(&self) -> &str {
        match self {
            MessageType::VideoOffer => "video-offer",
            MessageType::VideoAnswer => "video-answer",
            MessageType::DataOffer => "data-offer",
            MessageType::DataAnswer => "data-answer",
            MessageType::NewIceCandidate => "new-ice-candidate",
            MessageType::Chat => "chat",
            MessageType::List => "list",
            MessageType::Join => "join",
            MessageType::Leave => "leave",
            MessageType::Error => "error",
            MessageType::Unknown(raw) => raw,
        }
    }
}

impl From<String> for MessageType {
    fn from(s: String) -> Self {
        match s.as_str() {
            "video-offer" => MessageType::VideoOffer,
            "video-answer" => MessageType::VideoAnswer,
            "data-offer" => MessageType::DataOffer,
            "data-answer" => MessageType::DataAnswer,
            "new-ice-candidate" => MessageType::NewIceCandidate,
            "chat" => MessageType::Chat,
            "list" => MessageType::List,
            "join" => MessageType::Join,
            "leave" => MessageType::Leave,
            "error" => MessageType::Error,
            _ => MessageType::Unknown(s),
        }
    }
}

impl From<MessageType> for String {
    fn from(t: MessageType) -> Self {
        match t {
            MessageType::Unknown(raw) => raw,
            other => other.as_str().to_owned(),
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The wire envelope exchanged with the signaling server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProtocolMessage {
    #[serde(rename = "type")]
    pub kind: MessageType,

    /// Sender identity.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Single intended recipient. Absent for room-scoped messages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,

    #[serde(default)]
    pub payload: Value,
}

impl ProtocolMessage {
    pub fn new(kind: MessageType, payload: Value) -> Self {
        Self {
            kind,
            name: None,
            target: None,
            payload,
        }
    }

    /// Point-to-point message from `name` to `target`.
    pub fn directed(kind: MessageType, name: &str, target: &str, payload: Value) -> Self {
        Self {
            kind,
            name: Some(name.to_owned()),
            target: Some(target.to_owned()),
            payload,
        }
    }

    pub fn is_from(&self, peer: &str) -> bool {
        self.name.as_deref() == Some(peer)
    }

    /// Decode the payload into a typed structure.
    pub fn payload_as<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        T::deserialize(&self.payload)
    }

    /// Payload of `join`/`leave` frames.
    pub fn payload_str(&self) -> Option<&str> {
        self.payload.as_str()
    }

    /// Payload of a `list` frame.
    ///
    /// Accepts both a JSON array of names and a string holding such an
    /// array. Repeated names keep their first position.
    pub fn payload_names(&self) -> Option<Vec<String>> {
        let names: Vec<String> = match &self.payload {
            Value::Array(_) => self.payload_as().ok()?,
            Value::String(encoded) => serde_json::from_str(encoded).ok()?,
            Value::Null => Vec::new(),
            _ => return None,
        };

        let mut unique = Vec::with_capacity(names.len());
        for name in names {
            if !unique.contains(&name) {
                unique.push(name);
            }
        }
        Some(unique)
    }
}
