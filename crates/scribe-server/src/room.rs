//! Document rooms
//!
//! Every open document lives in a room: a task that owns the live Automerge
//! document, relays sync messages between the editors connected to it and
//! calls the persistence hooks. Events for one room are handled strictly one
//! at a time, in arrival order.
//!
//! The document is loaded from the store when the first editor is admitted,
//! so a refused join never reads the store.
//!
//! A room retires once its last editor has left and no further events are
//! queued. Retirement happens under the room-map lock, so an event is either
//! delivered to a live room or starts a fresh one.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use automerge::sync;
use scribe_core::{
    ConnectError, ContentExtractor, DocumentId, DocumentStore, EditorId, LiveDocument,
    PersistenceCoordinator, SharedDocument,
};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

use crate::message::{PeerId, ServerMessage};

/// Events delivered to a room
#[derive(Debug)]
pub enum RoomEvent {
    /// An editor wants to join; the verdict goes back on `reply`
    Join {
        editor_id: EditorId,
        peer_id: PeerId,
        origin: Option<String>,
        outbound: mpsc::UnboundedSender<ServerMessage>,
        reply: oneshot::Sender<Result<(), ConnectError>>,
    },
    /// Encoded Automerge sync message from an editor
    Sync { editor_id: EditorId, data: Vec<u8> },
    /// The editor's connection has closed
    Leave { editor_id: EditorId },
}

/// An editor connected to a room
struct Peer {
    peer_id: PeerId,
    outbound: mpsc::UnboundedSender<ServerMessage>,
    state: sync::State,
}

/// All open rooms, keyed by document
pub struct Rooms<S> {
    rooms: Mutex<HashMap<DocumentId, mpsc::UnboundedSender<RoomEvent>>>,
    coordinator: PersistenceCoordinator<S>,
    server_peer_id: PeerId,
}

impl<S: DocumentStore> Rooms<S> {
    pub fn new(coordinator: PersistenceCoordinator<S>, server_peer_id: impl Into<PeerId>) -> Arc<Self> {
        Arc::new(Self {
            rooms: Mutex::new(HashMap::new()),
            coordinator,
            server_peer_id: server_peer_id.into(),
        })
    }

    pub fn coordinator(&self) -> &PersistenceCoordinator<S> {
        &self.coordinator
    }

    pub fn server_peer_id(&self) -> &str {
        &self.server_peer_id
    }

    fn map(&self) -> MutexGuard<'_, HashMap<DocumentId, mpsc::UnboundedSender<RoomEvent>>> {
        self.rooms.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Number of rooms currently open
    pub fn len(&self) -> usize {
        self.map().len()
    }

    pub fn is_empty(&self) -> bool {
        self.map().is_empty()
    }

    pub fn is_open(&self, document_id: &DocumentId) -> bool {
        self.map().contains_key(document_id)
    }

    /// Deliver an event, opening the room if needed
    pub fn dispatch(self: &Arc<Self>, document_id: &DocumentId, event: RoomEvent) {
        let mut rooms = self.map();

        let event = match rooms.get(document_id) {
            Some(sender) => match sender.send(event) {
                Ok(()) => return,
                // The room task died without retiring; replace it
                Err(mpsc::error::SendError(event)) => {
                    error!("Room for {} stopped unexpectedly", document_id);
                    event
                }
            },
            None => event,
        };

        let (sender, receiver) = mpsc::unbounded_channel();
        if sender.send(event).is_err() {
            return;
        }
        rooms.insert(document_id.clone(), sender);
        drop(rooms);

        debug!("Opening room for {}", document_id);
        tokio::spawn(run_room(Arc::clone(self), document_id.clone(), receiver));
    }

    /// Close the room if nothing is waiting in its queue
    fn try_retire(
        &self,
        document_id: &DocumentId,
        receiver: &mut mpsc::UnboundedReceiver<RoomEvent>,
    ) -> bool {
        let mut rooms = self.map();
        if !receiver.is_empty() {
            return false;
        }
        rooms.remove(document_id);
        receiver.close();
        true
    }
}

async fn run_room<S: DocumentStore>(
    rooms: Arc<Rooms<S>>,
    document_id: DocumentId,
    mut receiver: mpsc::UnboundedReceiver<RoomEvent>,
) {
    let mut room = Room {
        document_id,
        document: None,
        peers: HashMap::new(),
        coordinator: rooms.coordinator().clone(),
        server_peer_id: rooms.server_peer_id().to_string(),
    };

    while let Some(event) = receiver.recv().await {
        room.handle(event).await;

        if room.peers.is_empty() && rooms.try_retire(&room.document_id, &mut receiver) {
            debug!("Closed room for {}", room.document_id);
            break;
        }
    }
}

/// Build the live document, seeded from the store when it has content
async fn open_document<S: DocumentStore>(
    coordinator: &PersistenceCoordinator<S>,
    document_id: &DocumentId,
) -> SharedDocument {
    let initial = match coordinator.on_load(document_id).await {
        Some(initial) => Ok(initial),
        None => ContentExtractor::new().deserialize(""),
    };

    let document = initial.and_then(|initial| LiveDocument::from_initial(&initial));
    match document {
        Ok(document) => document.into_shared(),
        Err(e) => {
            error!("Failed to build document {}: {}", document_id, e);
            LiveDocument::new().into_shared()
        }
    }
}

struct Room<S> {
    document_id: DocumentId,
    document: Option<SharedDocument>,
    peers: HashMap<EditorId, Peer>,
    coordinator: PersistenceCoordinator<S>,
    server_peer_id: PeerId,
}

impl<S: DocumentStore> Room<S> {
    /// The live document, loading it on first use
    async fn document(&mut self) -> SharedDocument {
        if let Some(document) = &self.document {
            return Arc::clone(document);
        }
        let document = open_document(&self.coordinator, &self.document_id).await;
        self.document = Some(Arc::clone(&document));
        document
    }

    async fn handle(&mut self, event: RoomEvent) {
        match event {
            RoomEvent::Join {
                editor_id,
                peer_id,
                origin,
                outbound,
                reply,
            } => self.join(editor_id, peer_id, origin, outbound, reply).await,
            RoomEvent::Sync { editor_id, data } => self.receive(&editor_id, &data).await,
            RoomEvent::Leave { editor_id } => self.leave(&editor_id).await,
        }
    }

    async fn join(
        &mut self,
        editor_id: EditorId,
        peer_id: PeerId,
        origin: Option<String>,
        outbound: mpsc::UnboundedSender<ServerMessage>,
        reply: oneshot::Sender<Result<(), ConnectError>>,
    ) {
        if let Err(e) = self
            .coordinator
            .on_connect(&self.document_id, editor_id.clone(), origin.as_deref())
        {
            let _ = reply.send(Err(e));
            return;
        }
        let document = self.document().await;

        let _ = outbound.send(ServerMessage::Peer {
            sender_id: self.server_peer_id.clone(),
            target_id: peer_id.clone(),
        });
        self.peers.insert(
            editor_id.clone(),
            Peer {
                peer_id,
                outbound,
                state: sync::State::new(),
            },
        );
        let _ = reply.send(Ok(()));

        // Offer the current document straight away
        let mut document = document.lock().await;
        if let Some(peer) = self.peers.get_mut(&editor_id) {
            send_sync(&self.server_peer_id, &self.document_id, &mut document, peer);
        }
    }

    async fn receive(&mut self, editor_id: &EditorId, data: &[u8]) {
        let (Some(peer), Some(shared)) = (self.peers.get_mut(editor_id), self.document.as_ref())
        else {
            debug!("Sync from {} which is not in {}", editor_id, self.document_id);
            return;
        };

        let message = match sync::Message::decode(data) {
            Ok(message) => message,
            Err(e) => {
                warn!("Bad sync message from {}: {}", editor_id, e);
                let _ = peer
                    .outbound
                    .send(ServerMessage::error("Invalid sync message"));
                return;
            }
        };

        let changed = {
            let mut document = shared.lock().await;
            let before = document.heads();
            if let Err(e) = document.receive_sync_message(&mut peer.state, message) {
                warn!("Failed to apply sync message from {}: {}", editor_id, e);
                let _ = peer
                    .outbound
                    .send(ServerMessage::error("Failed to apply sync message"));
                return;
            }
            let changed = document.heads() != before;

            // Answer the sender and pass any new changes on to everyone else
            for peer in self.peers.values_mut() {
                send_sync(&self.server_peer_id, &self.document_id, &mut document, peer);
            }
            changed
        };

        if changed {
            self.coordinator
                .on_change(&self.document_id, Arc::clone(shared));
        }
    }

    async fn leave(&mut self, editor_id: &EditorId) {
        if self.peers.remove(editor_id).is_none() {
            return;
        }
        let Some(document) = self.document.clone() else {
            return;
        };
        info!("{} closed its connection to {}", editor_id, self.document_id);
        self.coordinator
            .on_disconnect(&self.document_id, editor_id, document)
            .await;
    }
}

fn send_sync(
    server_peer_id: &str,
    document_id: &DocumentId,
    document: &mut LiveDocument,
    peer: &mut Peer,
) {
    if let Some(message) = document.generate_sync_message(&mut peer.state) {
        let _ = peer.outbound.send(ServerMessage::Sync {
            sender_id: server_peer_id.to_string(),
            target_id: peer.peer_id.clone(),
            document_id: document_id.to_string(),
            data: message.encode(),
        });
    }
}
