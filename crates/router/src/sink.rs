//! Seam between the router and the real-time transport.
//!
//! The gateway implements [`RealtimeSink`] over its WebSocket connection map;
//! tests plug in a recorder. Delivery is best-effort by contract: the sink
//! must never fail the request that produced the event.

use async_trait::async_trait;

use {
    switchboard_common::{ChannelId, ServerId},
    switchboard_protocol::{ChannelLifecyclePayload, MessageDeletedPayload, MessagePayload},
};

/// A live event destined for subscribers of a channel (and its server).
#[derive(Debug, Clone)]
pub enum RealtimeEvent {
    MessageBroadcast {
        server_id: ServerId,
        payload: MessagePayload,
    },
    MessageDeleted {
        server_id: ServerId,
        payload: MessageDeletedPayload,
    },
    ChannelCleared {
        server_id: ServerId,
        payload: ChannelLifecyclePayload,
    },
    ChannelDeleted {
        server_id: ServerId,
        payload: ChannelLifecyclePayload,
    },
}

impl RealtimeEvent {
    /// The channel whose subscribers should receive this event.
    #[must_use]
    pub fn channel_id(&self) -> ChannelId {
        match self {
            Self::MessageBroadcast { payload, .. } => payload.channel_id,
            Self::MessageDeleted { payload, .. } => payload.channel_id,
            Self::ChannelCleared { payload, .. } | Self::ChannelDeleted { payload, .. } => {
                payload.channel_id
            },
        }
    }

    #[must_use]
    pub fn server_id(&self) -> ServerId {
        match self {
            Self::MessageBroadcast { server_id, .. }
            | Self::MessageDeleted { server_id, .. }
            | Self::ChannelCleared { server_id, .. }
            | Self::ChannelDeleted { server_id, .. } => *server_id,
        }
    }
}

/// Push transport for live subscribers.
#[async_trait]
pub trait RealtimeSink: Send + Sync {
    async fn emit(&self, event: RealtimeEvent);
}

/// Sink that drops every event. For headless deployments and tests.
pub struct NullSink;

#[async_trait]
impl RealtimeSink for NullSink {
    async fn emit(&self, _event: RealtimeEvent) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn events_carry_their_routing_context() {
        let channel_id = ChannelId::generate();
        let server_id = ServerId::generate();
        let event = RealtimeEvent::ChannelCleared {
            server_id,
            payload: ChannelLifecyclePayload { channel_id },
        };
        assert_eq!(event.channel_id(), channel_id);
        assert_eq!(event.server_id(), server_id);

        // NullSink swallows anything without blocking.
        NullSink.emit(event).await;
    }
}
