//! Idempotent channel materialization.
//!
//! "Auto-create on first message" is a lazy-initialization race: two requests
//! can target the same not-yet-existing channel in the same instant. Creation
//! therefore always goes insert-first and treats a uniqueness conflict as
//! "someone else won", falling back to a lookup instead of erroring.

use tracing::warn;

use {
    switchboard_common::{ChannelId, EntityId, ServerId},
    switchboard_store::{Channel, ChannelType, NewChannel, StoreError},
};

use crate::{
    error::{Error, Result},
    service::{MessageService, meta, source},
};

impl MessageService {
    /// Ensure a channel exists, creating it from caller metadata when absent.
    ///
    /// An existing channel is returned unchanged; no metadata is merged. For
    /// a new channel the type is DM only when the metadata explicitly flags
    /// it, and the participant set is the author plus, for DMs, the target
    /// from metadata. A DM without a resolvable target is created with the
    /// author alone, at warn level.
    pub async fn ensure_channel(
        &self,
        channel_id: ChannelId,
        server_id: ServerId,
        author_id: EntityId,
        metadata: &serde_json::Value,
    ) -> Result<Channel> {
        if let Some(existing) = self.store.find_channel(channel_id).await? {
            return Ok(existing);
        }

        if !self.store.server_exists(server_id).await? {
            return Err(StoreError::not_found("server", server_id).into());
        }

        let is_dm = metadata
            .get(meta::IS_DM)
            .and_then(serde_json::Value::as_bool)
            .unwrap_or(false);
        let channel_type = if is_dm {
            ChannelType::Dm
        } else {
            ChannelType::Group
        };

        let mut participants = vec![author_id];
        if is_dm {
            match metadata
                .get(meta::TARGET_USER_ID)
                .and_then(serde_json::Value::as_str)
                .map(str::parse::<EntityId>)
            {
                Some(Ok(target)) if target != author_id => participants.push(target),
                Some(Ok(_)) => {},
                Some(Err(e)) => {
                    warn!(channel_id = %channel_id, "dm target id is malformed, proceeding with author only: {e}");
                },
                None => {
                    warn!(channel_id = %channel_id, "dm channel has no target participant, proceeding with author only");
                },
            }
        }

        let name = metadata
            .get(meta::CHANNEL_NAME)
            .and_then(serde_json::Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| {
                if is_dm {
                    "Direct Message".to_string()
                } else {
                    "New Chat".to_string()
                }
            });

        let created = self
            .store
            .create_channel(NewChannel {
                id: channel_id,
                server_id,
                name,
                channel_type,
                source_type: source::AUTO.into(),
                topic: None,
                metadata: metadata.clone(),
                participants: participants.clone(),
            })
            .await;

        match created {
            Ok(channel) => Ok(channel),
            // A concurrent caller created it first; their row wins.
            Err(e) if e.is_conflict() => {
                if let Some(existing) = self.store.find_channel(channel_id).await? {
                    return Ok(existing);
                }
                // DM pair collision under a different channel id.
                if let [a, b] = participants[..]
                    && let Some(existing) = self.store.find_dm_channel(server_id, a, b).await?
                {
                    return Ok(existing);
                }
                Err(Error::Store(e))
            },
            Err(e) => Err(e.into()),
        }
    }

    /// The DM channel for the unordered pair {a, b} within a server, created
    /// on first use. Argument order never matters; concurrent calls converge
    /// on one channel via conflict-then-lookup.
    pub async fn find_or_create_dm_channel(
        &self,
        a: EntityId,
        b: EntityId,
        server_id: ServerId,
    ) -> Result<Channel> {
        if let Some(existing) = self.store.find_dm_channel(server_id, a, b).await? {
            return Ok(existing);
        }

        let created = self
            .store
            .create_channel(NewChannel {
                id: ChannelId::generate(),
                server_id,
                name: "Direct Message".into(),
                channel_type: ChannelType::Dm,
                source_type: source::AUTO.into(),
                topic: None,
                metadata: serde_json::json!({}),
                participants: vec![a, b],
            })
            .await;

        match created {
            Ok(channel) => Ok(channel),
            Err(e) if e.is_conflict() => self
                .store
                .find_dm_channel(server_id, a, b)
                .await?
                .ok_or(Error::Store(e)),
            Err(e) => Err(e.into()),
        }
    }
}
