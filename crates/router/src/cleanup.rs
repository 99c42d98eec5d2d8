//! Destructive operations and their cascades.
//!
//! Ordering is fixed: the durable store mutation always completes before any
//! notification goes out, so a consumer reacting to a cleanup event can
//! assume the store already reflects it. Notification failures after the
//! mutation are logged and swallowed.

use tracing::info;

use {
    switchboard_bus::{AgentUpdate, BusEvent},
    switchboard_common::{ChannelId, EntityId, MessageId, ServerId},
    switchboard_protocol::{ChannelLifecyclePayload, MessageDeletedPayload},
};

use crate::{error::Result, service::MessageService, sink::RealtimeEvent};

impl MessageService {
    /// Delete one message: store delete → bus `message_deleted` → real-time
    /// `messageDeleted`.
    pub async fn delete_message(&self, channel_id: ChannelId, message_id: MessageId) -> Result<()> {
        let channel = self.store.get_channel(channel_id).await?;
        self.store.delete_message(channel_id, message_id).await?;
        info!(%message_id, %channel_id, "message deleted");

        self.bus
            .publish(BusEvent::MessageDeleted {
                channel_id,
                message_id,
            })
            .await;
        self.sink
            .emit(RealtimeEvent::MessageDeleted {
                server_id: channel.server_id,
                payload: MessageDeletedPayload {
                    message_id,
                    channel_id,
                },
            })
            .await;
        Ok(())
    }

    /// Remove every message in a channel, keeping the channel itself.
    pub async fn clear_channel(&self, channel_id: ChannelId) -> Result<u64> {
        let channel = self.store.get_channel(channel_id).await?;
        let removed = self.store.clear_channel_messages(channel_id).await?;
        info!(%channel_id, removed, "channel cleared");

        self.bus
            .publish(BusEvent::ChannelCleared { channel_id })
            .await;
        self.sink
            .emit(RealtimeEvent::ChannelCleared {
                server_id: channel.server_id,
                payload: ChannelLifecyclePayload { channel_id },
            })
            .await;
        Ok(removed)
    }

    /// Remove a channel together with its messages and participants.
    ///
    /// Consumers holding per-message state subscribe to `channel_cleared`,
    /// which covers both the clear and the delete case.
    pub async fn delete_channel(&self, channel_id: ChannelId) -> Result<()> {
        let channel = self.store.get_channel(channel_id).await?;
        self.store.delete_channel(channel_id).await?;
        info!(%channel_id, "channel deleted");

        self.bus
            .publish(BusEvent::ChannelCleared { channel_id })
            .await;
        self.sink
            .emit(RealtimeEvent::ChannelDeleted {
                server_id: channel.server_id,
                payload: ChannelLifecyclePayload { channel_id },
            })
            .await;
        Ok(())
    }

    /// Register an agent on a server and notify bus consumers.
    pub async fn add_agent_to_server(&self, server_id: ServerId, agent_id: EntityId) -> Result<()> {
        let added = self.store.add_server_agent(server_id, agent_id).await?;
        if added {
            self.bus
                .publish(BusEvent::ServerAgentUpdate {
                    server_id,
                    agent_id,
                    action: AgentUpdate::Added,
                })
                .await;
        }
        Ok(())
    }

    pub async fn remove_agent_from_server(
        &self,
        server_id: ServerId,
        agent_id: EntityId,
    ) -> Result<()> {
        let removed = self.store.remove_server_agent(server_id, agent_id).await?;
        if removed {
            self.bus
                .publish(BusEvent::ServerAgentUpdate {
                    server_id,
                    agent_id,
                    action: AgentUpdate::Removed,
                })
                .await;
        }
        Ok(())
    }
}

#[allow(clippy::unwrap_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{
            error::Error,
            ingest::SubmitMessageParams,
            service::test_util::{Harness, harness},
        },
        switchboard_store::StoreError,
    };

    async fn seed_message(h: &Harness) -> (ChannelId, MessageId) {
        let channel_id = ChannelId::generate();
        let message = h
            .service
            .submit_user_message(SubmitMessageParams {
                channel_id: channel_id.to_string(),
                server_id: ServerId::DEFAULT.to_string(),
                author_id: EntityId::generate().to_string(),
                content: "to be managed".into(),
                reply_to_id: None,
                source_type: None,
                raw_message: None,
                metadata: Some(serde_json::json!({"authorDisplayName": "Ada"})),
            })
            .await
            .unwrap();
        (channel_id, message.id)
    }

    async fn drain(h: &Harness) {
        h.bus_events.events.lock().await.clear();
        h.sink.events.lock().await.clear();
    }

    #[tokio::test]
    async fn delete_message_cascades_exactly_once() {
        let h = harness().await;
        let (channel_id, message_id) = seed_message(&h).await;
        drain(&h).await;

        h.service.delete_message(channel_id, message_id).await.unwrap();

        let bus = h.bus_events.events.lock().await;
        assert_eq!(bus.len(), 1);
        assert!(matches!(
            bus[0],
            BusEvent::MessageDeleted { message_id: m, channel_id: c } if m == message_id && c == channel_id
        ));

        let sunk = h.sink.events.lock().await;
        assert_eq!(sunk.len(), 1);
        assert!(matches!(sunk[0], RealtimeEvent::MessageDeleted { .. }));
        drop(bus);
        drop(sunk);

        // Gone from listings.
        assert!(h
            .service
            .store()
            .channel_messages(channel_id, 10, None)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn delete_missing_message_is_not_found_and_silent() {
        let h = harness().await;
        let (channel_id, _) = seed_message(&h).await;
        drain(&h).await;

        let err = h
            .service
            .delete_message(channel_id, MessageId::generate())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Store(StoreError::NotFound { .. })));
        assert!(h.bus_events.events.lock().await.is_empty());
        assert!(h.sink.events.lock().await.is_empty());
    }

    #[tokio::test]
    async fn clear_keeps_channel_and_emits_once() {
        let h = harness().await;
        let (channel_id, _) = seed_message(&h).await;
        drain(&h).await;

        let removed = h.service.clear_channel(channel_id).await.unwrap();
        assert_eq!(removed, 1);
        assert!(h.service.store().get_channel(channel_id).await.is_ok());

        let bus = h.bus_events.events.lock().await;
        assert_eq!(bus.len(), 1);
        assert!(matches!(bus[0], BusEvent::ChannelCleared { channel_id: c } if c == channel_id));

        let sunk = h.sink.events.lock().await;
        assert_eq!(sunk.len(), 1);
        assert!(matches!(sunk[0], RealtimeEvent::ChannelCleared { .. }));
    }

    #[tokio::test]
    async fn delete_channel_removes_everything() {
        let h = harness().await;
        let (channel_id, _) = seed_message(&h).await;
        drain(&h).await;

        h.service.delete_channel(channel_id).await.unwrap();

        assert!(matches!(
            h.service.store().get_channel(channel_id).await.unwrap_err(),
            StoreError::NotFound { .. }
        ));

        let bus = h.bus_events.events.lock().await;
        assert_eq!(bus.len(), 1);
        assert!(matches!(bus[0], BusEvent::ChannelCleared { .. }));

        let sunk = h.sink.events.lock().await;
        assert_eq!(sunk.len(), 1);
        assert!(matches!(sunk[0], RealtimeEvent::ChannelDeleted { .. }));
    }

    #[tokio::test]
    async fn agent_membership_emits_only_on_change() {
        let h = harness().await;
        let agent = EntityId::generate();

        h.service
            .add_agent_to_server(ServerId::DEFAULT, agent)
            .await
            .unwrap();
        // Idempotent repeat: no second event.
        h.service
            .add_agent_to_server(ServerId::DEFAULT, agent)
            .await
            .unwrap();
        h.service
            .remove_agent_from_server(ServerId::DEFAULT, agent)
            .await
            .unwrap();

        let bus = h.bus_events.events.lock().await;
        assert_eq!(bus.len(), 2);
        assert!(matches!(
            bus[0],
            BusEvent::ServerAgentUpdate { action: AgentUpdate::Added, .. }
        ));
        assert!(matches!(
            bus[1],
            BusEvent::ServerAgentUpdate { action: AgentUpdate::Removed, .. }
        ));
    }
}
