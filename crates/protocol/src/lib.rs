//! Real-time wire protocol definitions.
//!
//! All live traffic is JSON over WebSocket. The server pushes
//! [`EventFrame`]s to subscribed clients; clients steer their channel and
//! server subscriptions with [`ClientFrame`] control messages. Payloads are
//! presentation-oriented: camelCase keys, millisecond timestamps, the
//! author's display name already resolved.

use serde::{Deserialize, Serialize};

use switchboard_common::{ChannelId, EntityId, MessageId, ServerId};

// ── Event names ──────────────────────────────────────────────────────────────

/// Event names pushed over the real-time connection.
pub mod events {
    /// A message was accepted into a channel.
    pub const MESSAGE_BROADCAST: &str = "messageBroadcast";
    /// A single message was deleted.
    pub const MESSAGE_DELETED: &str = "messageDeleted";
    /// All messages in a channel were removed; the channel survives.
    pub const CHANNEL_CLEARED: &str = "channelCleared";
    /// The channel itself was removed.
    pub const CHANNEL_DELETED: &str = "channelDeleted";
}

// ── Frames ───────────────────────────────────────────────────────────────────

/// Server → client push frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventFrame {
    pub r#type: String, // always "event"
    pub event: String,
    pub payload: serde_json::Value,
}

impl EventFrame {
    pub fn new(event: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            r#type: "event".into(),
            event: event.into(),
            payload,
        }
    }
}

/// Client → server subscription control frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClientFrame {
    #[serde(rename_all = "camelCase")]
    Subscribe {
        #[serde(skip_serializing_if = "Option::is_none")]
        channel_id: Option<ChannelId>,
        #[serde(skip_serializing_if = "Option::is_none")]
        server_id: Option<ServerId>,
    },
    #[serde(rename_all = "camelCase")]
    Unsubscribe {
        #[serde(skip_serializing_if = "Option::is_none")]
        channel_id: Option<ChannelId>,
        #[serde(skip_serializing_if = "Option::is_none")]
        server_id: Option<ServerId>,
    },
}

// ── Payloads ─────────────────────────────────────────────────────────────────

/// Broadcast shape of an accepted message.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePayload {
    pub id: MessageId,
    pub channel_id: ChannelId,
    pub server_id: ServerId,
    pub author_id: EntityId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author_display_name: Option<String>,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_to_id: Option<MessageId>,
    pub source_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_id: Option<String>,
    pub metadata: serde_json::Value,
    pub created_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageDeletedPayload {
    pub message_id: MessageId,
    pub channel_id: ChannelId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelLifecyclePayload {
    pub channel_id: ChannelId,
}

#[allow(clippy::unwrap_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_frame_shape() {
        let frame = EventFrame::new(events::CHANNEL_CLEARED, serde_json::json!({"a": 1}));
        let json = serde_json::to_value(&frame).unwrap();
        assert_eq!(json["type"], "event");
        assert_eq!(json["event"], "channelCleared");
        assert_eq!(json["payload"]["a"], 1);
    }

    #[test]
    fn client_frame_parses_subscribe() {
        let channel = ChannelId::generate();
        let raw = format!(r#"{{"type":"subscribe","channelId":"{channel}"}}"#);
        let frame: ClientFrame = serde_json::from_str(&raw).unwrap();
        match frame {
            ClientFrame::Subscribe {
                channel_id,
                server_id,
            } => {
                assert_eq!(channel_id, Some(channel));
                assert!(server_id.is_none());
            },
            other => panic!("unexpected frame: {other:?}"),
        }
    }

    #[test]
    fn message_payload_uses_camel_case() {
        let payload = MessagePayload {
            id: MessageId::generate(),
            channel_id: ChannelId::generate(),
            server_id: ServerId::DEFAULT,
            author_id: EntityId::generate(),
            author_display_name: Some("Ada".into()),
            content: "hi".into(),
            reply_to_id: None,
            source_type: "gui".into(),
            source_id: None,
            metadata: serde_json::json!({}),
            created_at: 1_700_000_000_000,
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["authorDisplayName"], "Ada");
        assert_eq!(json["createdAt"], 1_700_000_000_000_i64);
        assert!(json.get("replyToId").is_none());
    }
}
