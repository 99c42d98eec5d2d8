//! The message routing service: shared state for materialization, ingestion,
//! and cleanup cascades.

use std::sync::Arc;

use tracing::debug;

use {
    switchboard_bus::{BusEvent, MessageBus},
    switchboard_protocol::MessagePayload,
    switchboard_store::{Message, Store},
};

use crate::{
    sink::{RealtimeEvent, RealtimeSink},
    title::TitleGenerator,
};

/// Source-type tags stamped onto canonical messages.
pub mod source {
    /// Submitted from the web GUI.
    pub const GUI: &str = "gui";
    /// An agent replying into a channel it was invoked from.
    pub const AGENT_RESPONSE: &str = "agent_response";
    /// Channel materialized lazily on first message.
    pub const AUTO: &str = "auto";
    /// Created through an explicit API call.
    pub const API: &str = "api";
}

/// Metadata keys with router-level meaning. Everything else in the bag is
/// passed through untouched.
pub mod meta {
    /// Bool: the target channel is a direct message.
    pub const IS_DM: &str = "isDm";
    /// Entity id of the second DM participant.
    pub const TARGET_USER_ID: &str = "targetUserId";
    /// Human-readable name of the message author.
    pub const AUTHOR_DISPLAY_NAME: &str = "authorDisplayName";
    /// Preferred name for an auto-created channel.
    pub const CHANNEL_NAME: &str = "channelName";
    /// Server id supplied by an external adapter, kept for traceability.
    pub const SOURCE_SERVER_ID: &str = "sourceServerId";
}

/// Central coordinator over the store, the internal bus, and the real-time
/// sink. Cheap to clone behind [`Arc`]s.
pub struct MessageService {
    pub(crate) store: Store,
    pub(crate) bus: Arc<MessageBus>,
    pub(crate) sink: Arc<dyn RealtimeSink>,
    pub(crate) title_generator: Option<Arc<dyn TitleGenerator>>,
}

impl MessageService {
    pub fn new(store: Store, bus: Arc<MessageBus>, sink: Arc<dyn RealtimeSink>) -> Self {
        Self {
            store,
            bus,
            sink,
            title_generator: None,
        }
    }

    #[must_use]
    pub fn with_title_generator(mut self, generator: Arc<dyn TitleGenerator>) -> Self {
        self.title_generator = Some(generator);
        self
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Relay an accepted message: optionally onto the bus inbound path, and
    /// always to live subscribers. Runs after the durable write; failures
    /// here are invisible to the submitting client by design.
    pub(crate) async fn relay_message(
        &self,
        message: &Message,
        server_id: switchboard_common::ServerId,
        author_display_name: Option<String>,
        publish_inbound: bool,
    ) {
        if publish_inbound {
            self.bus
                .publish(BusEvent::NewMessage {
                    message: message.clone(),
                    server_id,
                    author_display_name: author_display_name.clone(),
                })
                .await;
        } else {
            debug!(message_id = %message.id, "skipping bus publish for agent reply");
        }

        let payload = MessagePayload {
            id: message.id,
            channel_id: message.channel_id,
            server_id,
            author_id: message.author_id,
            author_display_name,
            content: message.content.clone(),
            reply_to_id: message.reply_to_id,
            source_type: message.source_type.clone(),
            source_id: message.source_id.clone(),
            metadata: message.metadata.clone(),
            created_at: message.created_at,
        };
        self.sink
            .emit(RealtimeEvent::MessageBroadcast { server_id, payload })
            .await;
    }
}

#[allow(clippy::unwrap_used)]
#[cfg(test)]
pub(crate) mod test_util {
    use {async_trait::async_trait, tokio::sync::Mutex};

    use switchboard_bus::BusSubscriber;

    use super::*;

    /// Sink that records every emitted event.
    #[derive(Default)]
    pub struct RecordingSink {
        pub events: Mutex<Vec<RealtimeEvent>>,
    }

    #[async_trait]
    impl RealtimeSink for RecordingSink {
        async fn emit(&self, event: RealtimeEvent) {
            self.events.lock().await.push(event);
        }
    }

    /// Bus subscriber that records every event it sees.
    #[derive(Default)]
    pub struct RecordingSubscriber {
        pub events: Mutex<Vec<BusEvent>>,
    }

    #[async_trait]
    impl BusSubscriber for RecordingSubscriber {
        fn name(&self) -> &str {
            "recorder"
        }

        async fn handle(&self, event: &BusEvent) -> anyhow::Result<()> {
            self.events.lock().await.push(event.clone());
            Ok(())
        }
    }

    pub struct Harness {
        pub service: MessageService,
        pub sink: Arc<RecordingSink>,
        pub bus_events: Arc<RecordingSubscriber>,
    }

    pub async fn harness() -> Harness {
        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        Store::init(&pool).await.unwrap();
        let store = Store::new(pool);

        let bus = Arc::new(MessageBus::new());
        let bus_events = Arc::new(RecordingSubscriber::default());
        bus.subscribe(bus_events.clone()).await;

        let sink = Arc::new(RecordingSink::default());
        let service = MessageService::new(store, bus, sink.clone());
        Harness {
            service,
            sink,
            bus_events,
        }
    }
}
