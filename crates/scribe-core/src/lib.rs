//! Scribe Core Library
//!
//! This crate provides the persistence coordinator for Scribe, a real-time
//! collaborative document editor. Browser clients edit a shared Automerge
//! document through a collaboration host; this crate decides when that
//! document is seeded from the durable store and when edits are written back.
//!
//! # Architecture
//!
//! - **Automerge**: the live, mergeable document each room edits
//! - **Document store**: an HTTP service holding the last saved text
//!
//! Edits are flushed a debounce window after the last change, and right away
//! when the last editor leaves.
//!
//! # Quick Start
//!
//! ```text
//! let config = Config::load()?;
//! let store = StoreGateway::from_config(&config)?;
//! let coordinator = PersistenceCoordinator::from_config(store, &config);
//!
//! let initial = coordinator.on_load(&id).await;
//! coordinator.on_connect(&id, editor, origin)?;
//! coordinator.on_change(&id, document.clone());
//! coordinator.on_disconnect(&id, &editor, document).await;
//! ```
//!
//! # Modules
//!
//! - `lifecycle`: Hook entry points (main entry point)
//! - `registry`: Per-document session bookkeeping
//! - `scheduler`: Debounced flush timers
//! - `gateway`: Document store client
//! - `extract`: Conversion between live documents and stored text
//! - `document`: Automerge document binding
//! - `origin`: Origin allow-list and CORS headers
//! - `config`: Application configuration

pub mod config;
pub mod document;
pub mod error;
pub mod extract;
pub mod gateway;
pub mod lifecycle;
pub mod models;
pub mod origin;
pub mod registry;
pub mod scheduler;

pub use config::Config;
pub use document::{DocumentError, InitialContent, LiveDocument, ReplicatedDocument, SharedDocument};
pub use error::{ConnectError, StoreError};
pub use extract::ContentExtractor;
pub use gateway::{DocumentStore, MemoryStore, StoreGateway};
pub use lifecycle::PersistenceCoordinator;
pub use models::{DocumentId, DocumentIdError, EditorId, StoredDocument};
pub use origin::{OriginPolicy, RequestDecision};
pub use registry::SessionRegistry;
pub use scheduler::{DebounceScheduler, ScheduleOutcome};
