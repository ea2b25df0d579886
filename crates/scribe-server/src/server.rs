//! WebSocket listener
//!
//! Accepts editor connections at `ws://host:port/<documentId>`, checks the
//! origin during the upgrade and bridges each connection to its document's
//! room.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use scribe_core::{Config, DocumentId, DocumentStore, EditorId, PersistenceCoordinator};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::{HeaderName, HeaderValue, StatusCode};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{accept_hdr_async, WebSocketStream};
use tracing::{debug, info, warn};

use crate::message::{ClientMessage, PeerId, ServerMessage};
use crate::room::{RoomEvent, Rooms};

type WsWrite = SplitSink<WebSocketStream<TcpStream>, Message>;
type WsRead = SplitStream<WebSocketStream<TcpStream>>;

/// The collaboration server
pub struct Server<S> {
    rooms: Arc<Rooms<S>>,
    connections: Arc<AtomicUsize>,
    max_connections: usize,
    idle_timeout: Duration,
}

impl<S: DocumentStore> Server<S> {
    pub fn new(coordinator: PersistenceCoordinator<S>, config: &Config) -> Self {
        let server_peer_id = format!("scribe-{}", &uuid::Uuid::new_v4().to_string()[..8]);
        Self {
            rooms: Rooms::new(coordinator, server_peer_id),
            connections: Arc::new(AtomicUsize::new(0)),
            max_connections: config.max_connections,
            idle_timeout: config.idle_timeout(),
        }
    }

    pub fn rooms(&self) -> &Arc<Rooms<S>> {
        &self.rooms
    }

    /// Connections currently open
    pub fn connection_count(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    /// Accept connections until `shutdown` resolves
    ///
    /// Open connections keep running; the caller is expected to flush
    /// through the coordinator afterwards.
    pub async fn serve(&self, listener: TcpListener, shutdown: impl Future<Output = ()>) -> Result<()> {
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok((stream, addr)) => self.spawn_connection(stream, addr),
                    Err(e) => warn!("Failed to accept connection: {}", e),
                },
                _ = &mut shutdown => {
                    info!("Stopped accepting connections");
                    return Ok(());
                }
            }
        }
    }

    fn spawn_connection(&self, stream: TcpStream, addr: SocketAddr) {
        let Some(slot) = ConnectionSlot::acquire(&self.connections, self.max_connections) else {
            warn!(
                "Refusing {}: connection limit of {} reached",
                addr, self.max_connections
            );
            return;
        };

        let rooms = Arc::clone(&self.rooms);
        let idle_timeout = self.idle_timeout;
        tokio::spawn(async move {
            let _slot = slot;
            if let Err(e) = handle_connection(rooms, stream, idle_timeout).await {
                debug!("Connection from {} ended: {:#}", addr, e);
            }
        });
    }
}

/// A counted place under the connection limit, released on drop
struct ConnectionSlot(Arc<AtomicUsize>);

impl ConnectionSlot {
    fn acquire(counter: &Arc<AtomicUsize>, limit: usize) -> Option<Self> {
        let previous = counter.fetch_add(1, Ordering::SeqCst);
        if previous >= limit {
            counter.fetch_sub(1, Ordering::SeqCst);
            return None;
        }
        Some(Self(Arc::clone(counter)))
    }
}

impl Drop for ConnectionSlot {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Validate an upgrade request and attach the CORS headers
///
/// Returns the requested document and the origin the client presented.
pub fn check_handshake<S: DocumentStore>(
    coordinator: &PersistenceCoordinator<S>,
    request: &Request,
    mut response: Response,
) -> std::result::Result<(DocumentId, Option<String>, Response), ErrorResponse> {
    let path = request.uri().path().trim_start_matches('/');
    let document_id = DocumentId::new(path).map_err(|e| {
        warn!("Rejected upgrade for {:?}: {}", path, e);
        reject(StatusCode::BAD_REQUEST, "Invalid document id")
    })?;

    let origin = request
        .headers()
        .get("origin")
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);

    let decision = coordinator.on_request(origin.as_deref(), request.method().as_str());
    if !decision.allowed {
        return Err(reject(StatusCode::FORBIDDEN, "Origin not allowed"));
    }

    for (name, value) in decision.headers {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(&value),
        ) {
            (Ok(name), Ok(value)) => {
                response.headers_mut().insert(name, value);
            }
            _ => debug!("Skipping unencodable header {}", name),
        }
    }

    Ok((document_id, origin, response))
}

fn reject(status: StatusCode, message: &str) -> ErrorResponse {
    let mut response = ErrorResponse::new(Some(message.to_string()));
    *response.status_mut() = status;
    response
}

async fn handle_connection<S: DocumentStore>(
    rooms: Arc<Rooms<S>>,
    stream: TcpStream,
    idle_timeout: Duration,
) -> Result<()> {
    let mut target = None;
    let callback = |request: &Request,
                    response: Response|
     -> std::result::Result<Response, ErrorResponse> {
        let (document_id, origin, response) =
            check_handshake(rooms.coordinator(), request, response)?;
        target = Some((document_id, origin));
        Ok(response)
    };
    let ws = accept_hdr_async(stream, callback)
        .await
        .context("WebSocket handshake failed")?;

    let Some((document_id, origin)) = target else {
        bail!("Handshake completed without a document");
    };
    let (mut write, mut read) = ws.split();

    let peer_id = match wait_for_join(&mut read, idle_timeout).await {
        Ok(peer_id) => peer_id,
        Err(e) => {
            send(&mut write, &ServerMessage::error(e.to_string())).await.ok();
            write.close().await.ok();
            return Err(e);
        }
    };

    let editor_id = EditorId::generate();
    let (outbound, mut outbound_rx) = mpsc::unbounded_channel();
    let (reply, verdict) = oneshot::channel();
    rooms.dispatch(
        &document_id,
        RoomEvent::Join {
            editor_id: editor_id.clone(),
            peer_id: peer_id.clone(),
            origin,
            outbound,
            reply,
        },
    );

    match verdict.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            send(&mut write, &ServerMessage::error(e.to_string())).await.ok();
            write.close().await.ok();
            return Ok(());
        }
        Err(_) => bail!("Room for {} closed during join", document_id),
    }

    debug!("{} ({}) joined {}", editor_id, peer_id, document_id);
    let result = pump(
        &rooms,
        &document_id,
        &editor_id,
        &mut write,
        &mut read,
        &mut outbound_rx,
        idle_timeout,
    )
    .await;

    rooms.dispatch(&document_id, RoomEvent::Leave { editor_id });
    write.close().await.ok();
    result
}

/// Wait for the client's join frame
async fn wait_for_join(read: &mut WsRead, idle_timeout: Duration) -> Result<PeerId> {
    let deadline = Instant::now() + idle_timeout;

    loop {
        let frame = tokio::time::timeout_at(deadline, read.next())
            .await
            .context("Timed out waiting for join")?;

        match frame {
            Some(Ok(Message::Binary(data))) => match ClientMessage::decode(&data)? {
                ClientMessage::Join { sender_id } => return Ok(sender_id),
                ClientMessage::Sync { .. } => bail!("Expected join before sync"),
            },
            Some(Ok(Message::Close(_))) | None => bail!("Connection closed before join"),
            Some(Err(e)) => return Err(e.into()),
            _ => {}
        }
    }
}

/// Relay frames between the socket and the room until either side stops
#[allow(clippy::too_many_arguments)]
async fn pump<S: DocumentStore>(
    rooms: &Arc<Rooms<S>>,
    document_id: &DocumentId,
    editor_id: &EditorId,
    write: &mut WsWrite,
    read: &mut WsRead,
    outbound_rx: &mut mpsc::UnboundedReceiver<ServerMessage>,
    idle_timeout: Duration,
) -> Result<()> {
    let idle = tokio::time::sleep(idle_timeout);
    tokio::pin!(idle);

    loop {
        tokio::select! {
            frame = read.next() => {
                idle.as_mut().reset(Instant::now() + idle_timeout);
                match frame {
                    Some(Ok(Message::Binary(data))) => match ClientMessage::decode(&data) {
                        Ok(ClientMessage::Sync { document_id: target, data, .. }) => {
                            if target != document_id.as_str() {
                                send(write, &ServerMessage::error("Sync for a different document")).await?;
                                continue;
                            }
                            rooms.dispatch(
                                document_id,
                                RoomEvent::Sync { editor_id: editor_id.clone(), data },
                            );
                        }
                        Ok(ClientMessage::Join { .. }) => {
                            debug!("Ignoring repeated join from {}", editor_id);
                        }
                        Err(e) => {
                            warn!("Undecodable frame from {}: {}", editor_id, e);
                            send(write, &ServerMessage::error("Malformed message")).await?;
                        }
                    },
                    Some(Ok(Message::Close(_))) | None => return Ok(()),
                    Some(Err(e)) => return Err(e.into()),
                    _ => {}
                }
            }
            message = outbound_rx.recv() => match message {
                Some(message) => send(write, &message).await?,
                None => return Ok(()),
            },
            _ = &mut idle => {
                info!("Closing idle connection {} on {}", editor_id, document_id);
                return Ok(());
            }
        }
    }
}

async fn send(write: &mut WsWrite, message: &ServerMessage) -> Result<()> {
    write.send(Message::Binary(message.encode()?)).await?;
    Ok(())
}
