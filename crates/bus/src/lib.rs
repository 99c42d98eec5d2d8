//! In-process event bus for asynchronous consumers.
//!
//! Agent runtimes and memory indexers subscribe here to react to accepted
//! messages and cleanup events. The bus is an explicitly constructed
//! component injected into its collaborators; there is no process-wide
//! emitter. Dispatch is in registration order and at-most-once per
//! subscriber per process lifetime: nothing is persisted or replayed, and a
//! subscriber attached after an event fired never sees it.

use std::{fmt, sync::Arc};

use {
    anyhow::Result,
    async_trait::async_trait,
    serde::{Deserialize, Serialize},
    tokio::sync::RwLock,
    tracing::{debug, warn},
};

use {
    switchboard_common::{ChannelId, EntityId, MessageId, ServerId},
    switchboard_store::Message,
};

// ── Events ───────────────────────────────────────────────────────────────────

/// Direction of a server-agent membership change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentUpdate {
    Added,
    Removed,
}

/// Events carried on the bus. Every variant describes a fact the store
/// already reflects; consumers may act on it without re-checking.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum BusEvent {
    /// A genuinely new inbound message for downstream processing. Agent
    /// replies are never published here.
    NewMessage {
        message: Message,
        server_id: ServerId,
        author_display_name: Option<String>,
    },
    MessageDeleted {
        channel_id: ChannelId,
        message_id: MessageId,
    },
    /// All messages of a channel were removed (clear or channel delete).
    ChannelCleared { channel_id: ChannelId },
    ServerAgentUpdate {
        server_id: ServerId,
        agent_id: EntityId,
        action: AgentUpdate,
    },
}

impl BusEvent {
    /// Short name for logging.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NewMessage { .. } => "new_message",
            Self::MessageDeleted { .. } => "message_deleted",
            Self::ChannelCleared { .. } => "channel_cleared",
            Self::ServerAgentUpdate { .. } => "server_agent_update",
        }
    }
}

// ── Subscriber trait ─────────────────────────────────────────────────────────

/// A bus consumer. Handler failures are logged and swallowed; they never
/// propagate to the request that published the event.
#[async_trait]
pub trait BusSubscriber: Send + Sync {
    /// A human-readable name for this subscriber.
    fn name(&self) -> &str;

    async fn handle(&self, event: &BusEvent) -> Result<()>;
}

// ── Bus ──────────────────────────────────────────────────────────────────────

/// Registry of subscribers with synchronous, in-order dispatch.
#[derive(Default)]
pub struct MessageBus {
    subscribers: RwLock<Vec<Arc<dyn BusSubscriber>>>,
}

impl fmt::Debug for MessageBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageBus").finish_non_exhaustive()
    }
}

impl MessageBus {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn subscribe(&self, subscriber: Arc<dyn BusSubscriber>) {
        debug!(subscriber = subscriber.name(), "bus subscriber registered");
        self.subscribers.write().await.push(subscriber);
    }

    pub async fn subscriber_names(&self) -> Vec<String> {
        self.subscribers
            .read()
            .await
            .iter()
            .map(|s| s.name().to_string())
            .collect()
    }

    /// Deliver an event to every subscriber, in registration order, awaiting
    /// each handler. A failing handler is logged at warn and skipped.
    pub async fn publish(&self, event: BusEvent) {
        let subscribers = self.subscribers.read().await;
        debug!(
            event = event.kind(),
            subscribers = subscribers.len(),
            "bus publish"
        );
        for subscriber in subscribers.iter() {
            if let Err(e) = subscriber.handle(&event).await {
                warn!(
                    subscriber = subscriber.name(),
                    event = event.kind(),
                    "bus subscriber failed: {e:#}"
                );
            }
        }
    }
}

#[allow(clippy::unwrap_used)]
#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use {super::*, tokio::sync::Mutex};

    struct Recorder {
        name: &'static str,
        seen: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl BusSubscriber for Recorder {
        fn name(&self) -> &str {
            self.name
        }

        async fn handle(&self, event: &BusEvent) -> Result<()> {
            self.seen.lock().await.push(event.kind().to_string());
            Ok(())
        }
    }

    struct Failing {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl BusSubscriber for Failing {
        fn name(&self) -> &str {
            "failing"
        }

        async fn handle(&self, _event: &BusEvent) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            anyhow::bail!("boom")
        }
    }

    fn cleared_event() -> BusEvent {
        BusEvent::ChannelCleared {
            channel_id: ChannelId::generate(),
        }
    }

    #[tokio::test]
    async fn delivers_in_registration_order() {
        let bus = MessageBus::new();
        let a = Arc::new(Recorder {
            name: "a",
            seen: Mutex::new(vec![]),
        });
        let b = Arc::new(Recorder {
            name: "b",
            seen: Mutex::new(vec![]),
        });
        bus.subscribe(a.clone()).await;
        bus.subscribe(b.clone()).await;
        assert_eq!(bus.subscriber_names().await, vec!["a", "b"]);

        bus.publish(cleared_event()).await;
        bus.publish(BusEvent::MessageDeleted {
            channel_id: ChannelId::generate(),
            message_id: MessageId::generate(),
        })
        .await;

        let seen_a = a.seen.lock().await.clone();
        let seen_b = b.seen.lock().await.clone();
        assert_eq!(seen_a, vec!["channel_cleared", "message_deleted"]);
        assert_eq!(seen_a, seen_b);
    }

    #[tokio::test]
    async fn failing_subscriber_does_not_block_others() {
        let bus = MessageBus::new();
        let failing = Arc::new(Failing {
            calls: AtomicUsize::new(0),
        });
        let recorder = Arc::new(Recorder {
            name: "after",
            seen: Mutex::new(vec![]),
        });
        bus.subscribe(failing.clone()).await;
        bus.subscribe(recorder.clone()).await;

        bus.publish(cleared_event()).await;

        assert_eq!(failing.calls.load(Ordering::SeqCst), 1);
        assert_eq!(recorder.seen.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn late_subscriber_misses_earlier_events() {
        let bus = MessageBus::new();
        bus.publish(cleared_event()).await;

        let late = Arc::new(Recorder {
            name: "late",
            seen: Mutex::new(vec![]),
        });
        bus.subscribe(late.clone()).await;
        assert!(late.seen.lock().await.is_empty());
    }

    #[test]
    fn events_serialize_with_snake_case_tags() {
        let json = serde_json::to_value(cleared_event()).unwrap();
        assert_eq!(json["event"], "channel_cleared");
    }
}
