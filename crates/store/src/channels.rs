//! Channel CRUD, participants, and DM pair lookup.

use switchboard_common::{ChannelId, EntityId, ServerId, now_ms};

use crate::{
    Store,
    error::{Result, StoreError},
    types::{Channel, ChannelType, ChannelUpdate, NewChannel, parse_id, parse_json},
};

#[derive(sqlx::FromRow)]
struct ChannelRow {
    id: String,
    server_id: String,
    name: String,
    channel_type: String,
    source_type: String,
    topic: Option<String>,
    metadata: String,
    created_at: i64,
    updated_at: i64,
}

impl TryFrom<ChannelRow> for Channel {
    type Error = StoreError;

    fn try_from(r: ChannelRow) -> Result<Self> {
        Ok(Self {
            id: parse_id("channel", &r.id)?,
            server_id: parse_id("channel", &r.server_id)?,
            name: r.name,
            channel_type: ChannelType::parse(&r.channel_type)?,
            source_type: r.source_type,
            topic: r.topic,
            metadata: parse_json(&r.metadata)?,
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}

/// Order-independent key identifying a DM participant pair.
fn dm_pair_key(a: EntityId, b: EntityId) -> String {
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    format!("{lo}|{hi}")
}

impl Store {
    /// Create a channel and its participant rows as a single transaction.
    ///
    /// DM channels with exactly two known participants get a pair key, so a
    /// concurrent create of the same pair surfaces as [`StoreError::Conflict`]
    /// and the caller can fall back to a lookup. A degraded single-participant
    /// DM carries no pair key and is only addressable by id.
    pub async fn create_channel(&self, new: NewChannel) -> Result<Channel> {
        if !self.server_exists(new.server_id).await? {
            return Err(StoreError::not_found("server", new.server_id));
        }

        let pair_key = match (new.channel_type, new.participants.as_slice()) {
            (ChannelType::Dm, [a, b]) => Some(dm_pair_key(*a, *b)),
            _ => None,
        };

        let now = now_ms();
        let metadata = serde_json::to_string(&new.metadata)?;
        let mut tx = self.pool().begin().await?;

        sqlx::query(
            "INSERT INTO channels
             (id, server_id, name, channel_type, source_type, topic, dm_pair_key,
              metadata, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(new.id.to_string())
        .bind(new.server_id.to_string())
        .bind(&new.name)
        .bind(new.channel_type.as_str())
        .bind(&new.source_type)
        .bind(&new.topic)
        .bind(&pair_key)
        .bind(&metadata)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        for participant in &new.participants {
            sqlx::query(
                "INSERT OR IGNORE INTO channel_participants (channel_id, entity_id) VALUES (?, ?)",
            )
            .bind(new.id.to_string())
            .bind(participant.to_string())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        Ok(Channel {
            id: new.id,
            server_id: new.server_id,
            name: new.name,
            channel_type: new.channel_type,
            source_type: new.source_type,
            topic: new.topic,
            metadata: new.metadata,
            created_at: now,
            updated_at: now,
        })
    }

    pub async fn get_channel(&self, id: ChannelId) -> Result<Channel> {
        self.find_channel(id)
            .await?
            .ok_or_else(|| StoreError::not_found("channel", id))
    }

    pub async fn find_channel(&self, id: ChannelId) -> Result<Option<Channel>> {
        let row = sqlx::query_as::<_, ChannelRow>(
            "SELECT id, server_id, name, channel_type, source_type, topic,
                    metadata, created_at, updated_at
             FROM channels WHERE id = ?",
        )
        .bind(id.to_string())
        .fetch_optional(self.pool())
        .await?;
        row.map(TryInto::try_into).transpose()
    }

    pub async fn list_channels(&self, server_id: ServerId) -> Result<Vec<Channel>> {
        let rows = sqlx::query_as::<_, ChannelRow>(
            "SELECT id, server_id, name, channel_type, source_type, topic,
                    metadata, created_at, updated_at
             FROM channels WHERE server_id = ?
             ORDER BY updated_at DESC",
        )
        .bind(server_id.to_string())
        .fetch_all(self.pool())
        .await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    pub async fn update_channel(&self, id: ChannelId, update: ChannelUpdate) -> Result<Channel> {
        let current = self.get_channel(id).await?;
        let name = update.name.unwrap_or(current.name);
        let topic = update.topic.or(current.topic);
        let metadata = update.metadata.unwrap_or(current.metadata);
        let now = now_ms();

        sqlx::query(
            "UPDATE channels SET name = ?, topic = ?, metadata = ?, updated_at = ? WHERE id = ?",
        )
        .bind(&name)
        .bind(&topic)
        .bind(serde_json::to_string(&metadata)?)
        .bind(now)
        .bind(id.to_string())
        .execute(self.pool())
        .await?;

        Ok(Channel {
            name,
            topic,
            metadata,
            updated_at: now,
            ..current
        })
    }

    /// Remove a channel with its participants and messages, atomically.
    pub async fn delete_channel(&self, id: ChannelId) -> Result<()> {
        let mut tx = self.pool().begin().await?;
        let channel = id.to_string();

        let deleted = sqlx::query("DELETE FROM channels WHERE id = ?")
            .bind(&channel)
            .execute(&mut *tx)
            .await?;
        if deleted.rows_affected() == 0 {
            return Err(StoreError::not_found("channel", id));
        }

        sqlx::query("DELETE FROM channel_participants WHERE channel_id = ?")
            .bind(&channel)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM messages WHERE channel_id = ?")
            .bind(&channel)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Existing DM channel for the unordered pair {a, b} within a server.
    pub async fn find_dm_channel(
        &self,
        server_id: ServerId,
        a: EntityId,
        b: EntityId,
    ) -> Result<Option<Channel>> {
        let row = sqlx::query_as::<_, ChannelRow>(
            "SELECT id, server_id, name, channel_type, source_type, topic,
                    metadata, created_at, updated_at
             FROM channels WHERE server_id = ? AND dm_pair_key = ?",
        )
        .bind(server_id.to_string())
        .bind(dm_pair_key(a, b))
        .fetch_optional(self.pool())
        .await?;
        row.map(TryInto::try_into).transpose()
    }

    // ── Participants ─────────────────────────────────────────────────────

    /// Add a participant. Idempotent; returns false when already present.
    pub async fn add_participant(&self, channel_id: ChannelId, entity_id: EntityId) -> Result<bool> {
        let res = sqlx::query(
            "INSERT OR IGNORE INTO channel_participants (channel_id, entity_id) VALUES (?, ?)",
        )
        .bind(channel_id.to_string())
        .bind(entity_id.to_string())
        .execute(self.pool())
        .await?;
        Ok(res.rows_affected() > 0)
    }

    pub async fn remove_participant(
        &self,
        channel_id: ChannelId,
        entity_id: EntityId,
    ) -> Result<bool> {
        let res =
            sqlx::query("DELETE FROM channel_participants WHERE channel_id = ? AND entity_id = ?")
                .bind(channel_id.to_string())
                .bind(entity_id.to_string())
                .execute(self.pool())
                .await?;
        Ok(res.rows_affected() > 0)
    }

    pub async fn list_participants(&self, channel_id: ChannelId) -> Result<Vec<EntityId>> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT entity_id FROM channel_participants WHERE channel_id = ? ORDER BY entity_id",
        )
        .bind(channel_id.to_string())
        .fetch_all(self.pool())
        .await?;
        rows.iter()
            .map(|(raw,)| parse_id("participant", raw))
            .collect()
    }

    /// Channels an entity participates in, most recently active first.
    pub async fn channels_for_entity(&self, entity_id: EntityId) -> Result<Vec<Channel>> {
        let rows = sqlx::query_as::<_, ChannelRow>(
            "SELECT c.id, c.server_id, c.name, c.channel_type, c.source_type, c.topic,
                    c.metadata, c.created_at, c.updated_at
             FROM channels c
             JOIN channel_participants p ON p.channel_id = c.id
             WHERE p.entity_id = ?
             ORDER BY c.updated_at DESC",
        )
        .bind(entity_id.to_string())
        .fetch_all(self.pool())
        .await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }
}
