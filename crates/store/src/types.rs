//! Persisted domain records.
//!
//! All records serialize with camelCase keys and millisecond timestamps,
//! matching the shapes returned to API and real-time consumers.

use serde::{Deserialize, Serialize};

use switchboard_common::{ChannelId, EntityId, MessageId, ServerId};

use crate::error::{Result, StoreError};

// ── Channel type ─────────────────────────────────────────────────────────────

/// How a channel is addressed: a two-party direct message or a group space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelType {
    Dm,
    Group,
}

impl ChannelType {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Dm => "dm",
            Self::Group => "group",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "dm" => Ok(Self::Dm),
            "group" => Ok(Self::Group),
            other => Err(StoreError::corrupt(
                "channel",
                format!("unknown channel type {other:?}"),
            )),
        }
    }
}

// ── Server ───────────────────────────────────────────────────────────────────

/// A tenant/grouping boundary owning channels.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Server {
    pub id: ServerId,
    pub name: String,
    pub source_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_id: Option<String>,
    pub metadata: serde_json::Value,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Fields for creating a server. The id is assigned by the store.
#[derive(Debug, Clone)]
pub struct NewServer {
    pub name: String,
    pub source_type: String,
    pub source_id: Option<String>,
    pub metadata: serde_json::Value,
}

// ── Channel ──────────────────────────────────────────────────────────────────

/// An addressable conversation space scoped to exactly one server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Channel {
    pub id: ChannelId,
    pub server_id: ServerId,
    pub name: String,
    #[serde(rename = "type")]
    pub channel_type: ChannelType,
    pub source_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    pub metadata: serde_json::Value,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Fields for creating a channel together with its initial participants.
#[derive(Debug, Clone)]
pub struct NewChannel {
    pub id: ChannelId,
    pub server_id: ServerId,
    pub name: String,
    pub channel_type: ChannelType,
    pub source_type: String,
    pub topic: Option<String>,
    pub metadata: serde_json::Value,
    pub participants: Vec<EntityId>,
}

/// Partial update applied to a channel. `None` fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelUpdate {
    pub name: Option<String>,
    pub topic: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

// ── Message ──────────────────────────────────────────────────────────────────

/// The canonical, platform-agnostic message record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: MessageId,
    pub channel_id: ChannelId,
    pub author_id: EntityId,
    pub content: String,
    /// Original platform-native payload, kept opaque.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_message: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_to_id: Option<MessageId>,
    pub source_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_id: Option<String>,
    pub metadata: serde_json::Value,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Fields for persisting a message. The caller supplies id and timestamp so
/// ingestion controls arrival order.
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub id: MessageId,
    pub channel_id: ChannelId,
    pub author_id: EntityId,
    pub content: String,
    pub raw_message: Option<serde_json::Value>,
    pub reply_to_id: Option<MessageId>,
    pub source_type: String,
    pub source_id: Option<String>,
    pub metadata: serde_json::Value,
    pub created_at: i64,
}

// ── Row mapping helpers ──────────────────────────────────────────────────────

pub(crate) fn parse_id<T>(entity: &'static str, raw: &str) -> Result<T>
where
    T: std::str::FromStr<Err = switchboard_common::InvalidId>,
{
    raw.parse()
        .map_err(|e| StoreError::corrupt(entity, format!("{e}")))
}

pub(crate) fn parse_json(raw: &str) -> Result<serde_json::Value> {
    Ok(serde_json::from_str(raw)?)
}
