//! Per-channel broadcast of accepted messages and lifecycle events.
//!
//! Each connected client holds an unbounded sender for its write loop plus
//! the channel and server subscription sets it has requested. Broadcast
//! serializes one frame per event and best-effort sends it to every
//! interested client; a closed or gone client is skipped, never an error.

use std::collections::{HashMap, HashSet};

use {
    async_trait::async_trait,
    tokio::sync::{RwLock, mpsc},
    tracing::{debug, warn},
};

use {
    switchboard_common::{ChannelId, ServerId},
    switchboard_protocol::{ClientFrame, EventFrame, events},
    switchboard_router::{RealtimeEvent, RealtimeSink},
};

/// A live subscriber connection.
struct ClientHandle {
    /// Channel for sending serialized frames to this client's write loop.
    sender: mpsc::UnboundedSender<String>,
    channels: HashSet<ChannelId>,
    servers: HashSet<ServerId>,
}

impl ClientHandle {
    fn wants(&self, event: &RealtimeEvent) -> bool {
        self.channels.contains(&event.channel_id()) || self.servers.contains(&event.server_id())
    }
}

/// Connection registry implementing the router's real-time seam.
#[derive(Default)]
pub struct FanOut {
    clients: RwLock<HashMap<String, ClientHandle>>,
}

impl FanOut {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, conn_id: String, sender: mpsc::UnboundedSender<String>) {
        debug!(conn_id, "client registered");
        self.clients.write().await.insert(conn_id, ClientHandle {
            sender,
            channels: HashSet::new(),
            servers: HashSet::new(),
        });
    }

    pub async fn unregister(&self, conn_id: &str) {
        debug!(conn_id, "client unregistered");
        self.clients.write().await.remove(conn_id);
    }

    pub async fn client_count(&self) -> usize {
        self.clients.read().await.len()
    }

    /// Apply a subscribe/unsubscribe control frame from a client.
    pub async fn apply(&self, conn_id: &str, frame: ClientFrame) {
        let mut clients = self.clients.write().await;
        let Some(client) = clients.get_mut(conn_id) else {
            return;
        };
        match frame {
            ClientFrame::Subscribe {
                channel_id,
                server_id,
            } => {
                if let Some(channel) = channel_id {
                    client.channels.insert(channel);
                }
                if let Some(server) = server_id {
                    client.servers.insert(server);
                }
            },
            ClientFrame::Unsubscribe {
                channel_id,
                server_id,
            } => {
                if let Some(channel) = channel_id {
                    client.channels.remove(&channel);
                }
                if let Some(server) = server_id {
                    client.servers.remove(&server);
                }
            },
        }
    }

    async fn broadcast(&self, event: &RealtimeEvent) {
        let (name, payload) = match event {
            RealtimeEvent::MessageBroadcast { payload, .. } => {
                (events::MESSAGE_BROADCAST, serde_json::to_value(payload))
            },
            RealtimeEvent::MessageDeleted { payload, .. } => {
                (events::MESSAGE_DELETED, serde_json::to_value(payload))
            },
            RealtimeEvent::ChannelCleared { payload, .. } => {
                (events::CHANNEL_CLEARED, serde_json::to_value(payload))
            },
            RealtimeEvent::ChannelDeleted { payload, .. } => {
                (events::CHANNEL_DELETED, serde_json::to_value(payload))
            },
        };
        let payload = match payload {
            Ok(p) => p,
            Err(e) => {
                warn!("failed to serialize realtime payload: {e}");
                return;
            },
        };
        let json = match serde_json::to_string(&EventFrame::new(name, payload)) {
            Ok(j) => j,
            Err(e) => {
                warn!("failed to serialize event frame: {e}");
                return;
            },
        };

        let clients = self.clients.read().await;
        debug!(event = name, clients = clients.len(), "broadcasting event");
        for (conn_id, client) in clients.iter() {
            if !client.wants(event) {
                continue;
            }
            // Write loop gone: the disconnect cleanup will drop the handle.
            if client.sender.send(json.clone()).is_err() {
                debug!(conn_id, "skipping closed client");
            }
        }
    }
}

#[async_trait]
impl RealtimeSink for FanOut {
    async fn emit(&self, event: RealtimeEvent) {
        self.broadcast(&event).await;
    }
}
