//! Scribe collaboration server
//!
//! A WebSocket host for Scribe documents. Each document is served by a room
//! that relays Automerge sync messages between editors and drives the
//! persistence hooks from `scribe-core`.
//!
//! # Modules
//!
//! - `server`: Listener, handshake checks and per-connection relay
//! - `room`: Per-document tasks owning the live documents
//! - `message`: CBOR wire protocol

pub mod message;
pub mod room;
pub mod server;

pub use message::{ClientMessage, ProtocolError, ServerMessage};
pub use room::{RoomEvent, Rooms};
pub use server::Server;
