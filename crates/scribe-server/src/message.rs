//! Wire protocol message types
//!
//! Binary WebSocket frames carrying CBOR maps tagged by `type`.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Identifier a peer announces for itself
pub type PeerId = String;

/// Errors that can occur while encoding or decoding frames
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Failed to encode message: {0}")]
    Encode(#[from] ciborium::ser::Error<std::io::Error>),

    #[error("Failed to decode message: {0}")]
    Decode(#[from] ciborium::de::Error<std::io::Error>),
}

/// Messages sent by editors
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    /// Handshake; must be the first frame on a connection
    #[serde(rename = "join")]
    Join {
        #[serde(rename = "senderId")]
        sender_id: PeerId,
    },

    /// Automerge sync message for the connection's document
    #[serde(rename = "sync")]
    Sync {
        #[serde(rename = "senderId")]
        sender_id: PeerId,
        #[serde(rename = "documentId")]
        document_id: String,
        #[serde(with = "serde_bytes")]
        data: Vec<u8>,
    },
}

/// Messages sent by the server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    /// Handshake response
    #[serde(rename = "peer")]
    Peer {
        #[serde(rename = "senderId")]
        sender_id: PeerId,
        #[serde(rename = "targetId")]
        target_id: PeerId,
    },

    /// Automerge sync message for one editor
    #[serde(rename = "sync")]
    Sync {
        #[serde(rename = "senderId")]
        sender_id: PeerId,
        #[serde(rename = "targetId")]
        target_id: PeerId,
        #[serde(rename = "documentId")]
        document_id: String,
        #[serde(with = "serde_bytes")]
        data: Vec<u8>,
    },

    #[serde(rename = "error")]
    Error { message: String },
}

impl ClientMessage {
    pub fn join(sender_id: &str) -> Self {
        ClientMessage::Join {
            sender_id: sender_id.to_string(),
        }
    }

    pub fn sync(sender_id: &str, document_id: &str, data: Vec<u8>) -> Self {
        ClientMessage::Sync {
            sender_id: sender_id.to_string(),
            document_id: document_id.to_string(),
            data,
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>, ProtocolError> {
        encode(self)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, ProtocolError> {
        Ok(ciborium::from_reader(bytes)?)
    }
}

impl ServerMessage {
    pub fn error(message: impl Into<String>) -> Self {
        ServerMessage::Error {
            message: message.into(),
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>, ProtocolError> {
        encode(self)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, ProtocolError> {
        Ok(ciborium::from_reader(bytes)?)
    }
}

fn encode<T: Serialize>(message: &T) -> Result<Vec<u8>, ProtocolError> {
    let mut bytes = Vec::new();
    ciborium::into_writer(message, &mut bytes)?;
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_message_decoding() {
        let bytes = ClientMessage::join("editor-1").encode().unwrap();

        match ClientMessage::decode(&bytes).unwrap() {
            ClientMessage::Join { sender_id } => assert_eq!(sender_id, "editor-1"),
            other => panic!("Expected Join message, got {:?}", other),
        }
    }

    #[test]
    fn test_sync_data_is_a_byte_string() {
        let bytes = ClientMessage::sync("editor-1", "doc1", vec![1, 2, 3])
            .encode()
            .unwrap();

        let value: ciborium::Value = ciborium::from_reader(bytes.as_slice()).unwrap();
        let map = value.as_map().unwrap();
        let data = map
            .iter()
            .find(|(k, _)| k.as_text() == Some("data"))
            .map(|(_, v)| v)
            .unwrap();
        assert_eq!(data.as_bytes(), Some(&vec![1, 2, 3]));

        let kind = map
            .iter()
            .find(|(k, _)| k.as_text() == Some("type"))
            .and_then(|(_, v)| v.as_text());
        assert_eq!(kind, Some("sync"));
    }

    #[test]
    fn test_server_error_message() {
        let bytes = ServerMessage::error("Unknown document").encode().unwrap();
        assert_eq!(
            ServerMessage::decode(&bytes).unwrap(),
            ServerMessage::Error {
                message: "Unknown document".to_string()
            }
        );
    }

    #[test]
    fn test_decode_garbage_fails() {
        assert!(matches!(
            ClientMessage::decode(&[0xff, 0x00, 0x13]),
            Err(ProtocolError::Decode(_))
        ));
    }
}
