//! The three ingestion paths.
//!
//! GUI submissions, agent replies, and externally ingested platform messages
//! all run the same core sequence: validate → materialize channel → persist
//! message → relay. They differ in who may auto-create the channel and in
//! whether the accepted message re-enters the bus inbound path:
//!
//! - GUI and external messages are genuinely new input and are published as
//!   `new_message` for downstream agents.
//! - Agent replies only broadcast to live subscribers. Re-publishing them
//!   would feed an agent its own output.

use {
    serde::Deserialize,
    tracing::{info, warn},
};

use {
    switchboard_common::{ChannelId, EntityId, MessageId, ServerId, now_ms},
    switchboard_store::{Message, NewMessage},
};

use crate::{
    error::{Error, Result},
    service::{MessageService, meta, source},
};

// ── Request shapes ───────────────────────────────────────────────────────────

/// GUI submission. The channel may not exist yet; request metadata drives
/// materialization and must carry the author's display name.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitMessageParams {
    pub channel_id: String,
    pub server_id: String,
    pub author_id: String,
    pub content: String,
    #[serde(default)]
    pub reply_to_id: Option<String>,
    #[serde(default)]
    pub source_type: Option<String>,
    #[serde(default)]
    pub raw_message: Option<serde_json::Value>,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

/// Agent reply into a channel the agent was invoked from.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentReplyParams {
    pub channel_id: String,
    pub author_id: String,
    pub content: String,
    #[serde(default)]
    pub reply_to_id: Option<String>,
    #[serde(default)]
    pub raw_message: Option<serde_json::Value>,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

/// Externally ingested platform message, forwarded by an adapter.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalMessageParams {
    pub channel_id: String,
    pub server_id: String,
    pub author_id: String,
    pub content: String,
    pub source_type: String,
    /// Original platform-native message id, for cross-referencing.
    pub source_id: String,
    #[serde(default)]
    pub reply_to_id: Option<String>,
    #[serde(default)]
    pub raw_message: Option<serde_json::Value>,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

// ── Validation helpers ───────────────────────────────────────────────────────

fn validated_content(content: &str) -> Result<String> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return Err(Error::validation("content must not be empty"));
    }
    Ok(trimmed.to_string())
}

fn parse_reply_to(raw: Option<&str>) -> Result<Option<MessageId>> {
    // Syntactic validation only: reply targets may reference messages this
    // system never stored.
    raw.map(str::parse::<MessageId>)
        .transpose()
        .map_err(Into::into)
}

fn display_name(metadata: &serde_json::Value) -> Option<String> {
    metadata
        .get(meta::AUTHOR_DISPLAY_NAME)
        .and_then(serde_json::Value::as_str)
        .map(str::to_string)
}

// ── Ingestion ────────────────────────────────────────────────────────────────

impl MessageService {
    /// GUI submission: validate → materialize (auto-create allowed) →
    /// persist → bus `new_message` + real-time broadcast.
    pub async fn submit_user_message(&self, params: SubmitMessageParams) -> Result<Message> {
        let channel_id: ChannelId = params.channel_id.parse()?;
        let server_id: ServerId = params.server_id.parse()?;
        let author_id: EntityId = params.author_id.parse()?;
        let content = validated_content(&params.content)?;
        let reply_to_id = parse_reply_to(params.reply_to_id.as_deref())?;
        let metadata = params.metadata.unwrap_or_else(|| serde_json::json!({}));

        let author_display_name = display_name(&metadata)
            .ok_or_else(|| Error::validation("metadata.authorDisplayName is required"))?;

        let channel = self
            .ensure_channel(channel_id, server_id, author_id, &metadata)
            .await?;

        let message = self
            .store
            .create_message(NewMessage {
                id: MessageId::generate(),
                channel_id: channel.id,
                author_id,
                content,
                raw_message: params.raw_message,
                reply_to_id,
                source_type: params.source_type.unwrap_or_else(|| source::GUI.into()),
                source_id: None,
                metadata,
                created_at: now_ms(),
            })
            .await?;

        info!(message_id = %message.id, channel_id = %channel.id, "user message accepted");
        self.relay_message(&message, channel.server_id, Some(author_display_name), true)
            .await;
        Ok(message)
    }

    /// Agent reply: the channel must already exist, and the accepted message
    /// is never re-published on the bus inbound path.
    pub async fn submit_agent_reply(&self, params: AgentReplyParams) -> Result<Message> {
        let channel_id: ChannelId = params.channel_id.parse()?;
        let author_id: EntityId = params.author_id.parse()?;
        let content = validated_content(&params.content)?;
        let reply_to_id = parse_reply_to(params.reply_to_id.as_deref())?;
        let metadata = params.metadata.unwrap_or_else(|| serde_json::json!({}));

        let channel = self.store.get_channel(channel_id).await?;

        let message = self
            .store
            .create_message(NewMessage {
                id: MessageId::generate(),
                channel_id: channel.id,
                author_id,
                content,
                raw_message: params.raw_message,
                reply_to_id,
                source_type: source::AGENT_RESPONSE.into(),
                source_id: None,
                metadata: metadata.clone(),
                created_at: now_ms(),
            })
            .await?;

        info!(message_id = %message.id, channel_id = %channel.id, "agent reply accepted");
        self.relay_message(&message, channel.server_id, display_name(&metadata), false)
            .await;
        Ok(message)
    }

    /// External ingestion: adapter-supplied platform message. The adapter's
    /// server id is honored when it resolves locally; otherwise the channel
    /// is materialized under the default server and the original id is kept
    /// in message metadata for traceability.
    pub async fn ingest_external_message(&self, params: ExternalMessageParams) -> Result<Message> {
        let channel_id: ChannelId = params.channel_id.parse()?;
        let server_id: ServerId = params.server_id.parse()?;
        let author_id: EntityId = params.author_id.parse()?;
        let content = validated_content(&params.content)?;
        let reply_to_id = parse_reply_to(params.reply_to_id.as_deref())?;
        if params.source_type.trim().is_empty() {
            return Err(Error::validation("sourceType must not be empty"));
        }
        if params.source_id.trim().is_empty() {
            return Err(Error::validation("sourceId must not be empty"));
        }
        let mut metadata = params.metadata.unwrap_or_else(|| serde_json::json!({}));

        let effective_server = if self.store.server_exists(server_id).await? {
            server_id
        } else {
            warn!(server_id = %server_id, "external server not materialized locally, routing to default");
            if let Some(bag) = metadata.as_object_mut() {
                bag.insert(
                    meta::SOURCE_SERVER_ID.into(),
                    serde_json::Value::String(server_id.to_string()),
                );
            }
            ServerId::DEFAULT
        };

        let channel = self
            .ensure_channel(channel_id, effective_server, author_id, &metadata)
            .await?;

        let message = self
            .store
            .create_message(NewMessage {
                id: MessageId::generate(),
                channel_id: channel.id,
                author_id,
                content,
                raw_message: params.raw_message,
                reply_to_id,
                source_type: params.source_type,
                source_id: Some(params.source_id),
                metadata: metadata.clone(),
                created_at: now_ms(),
            })
            .await?;

        info!(
            message_id = %message.id,
            channel_id = %channel.id,
            source_id = message.source_id.as_deref().unwrap_or(""),
            "external message ingested"
        );
        self.relay_message(&message, channel.server_id, display_name(&metadata), true)
            .await;
        Ok(message)
    }
}
