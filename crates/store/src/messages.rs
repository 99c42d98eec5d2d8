//! Message persistence, listing, and bulk removal.

use switchboard_common::{ChannelId, MessageId};

use crate::{
    Store,
    error::{Result, StoreError},
    types::{Message, NewMessage, parse_id, parse_json},
};

#[derive(sqlx::FromRow)]
struct MessageRow {
    id: String,
    channel_id: String,
    author_id: String,
    content: String,
    raw_message: Option<String>,
    reply_to_id: Option<String>,
    source_type: String,
    source_id: Option<String>,
    metadata: String,
    created_at: i64,
    updated_at: i64,
}

impl TryFrom<MessageRow> for Message {
    type Error = StoreError;

    fn try_from(r: MessageRow) -> Result<Self> {
        Ok(Self {
            id: parse_id("message", &r.id)?,
            channel_id: parse_id("message", &r.channel_id)?,
            author_id: parse_id("message", &r.author_id)?,
            content: r.content,
            raw_message: r.raw_message.as_deref().map(parse_json).transpose()?,
            reply_to_id: r
                .reply_to_id
                .as_deref()
                .map(|raw| parse_id("message", raw))
                .transpose()?,
            source_type: r.source_type,
            source_id: r.source_id,
            metadata: parse_json(&r.metadata)?,
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}

impl Store {
    /// Persist a message. The owning channel must exist (the materializer
    /// guarantees it for ingestion paths).
    pub async fn create_message(&self, new: NewMessage) -> Result<Message> {
        if self.find_channel(new.channel_id).await?.is_none() {
            return Err(StoreError::not_found("channel", new.channel_id));
        }

        let raw = new
            .raw_message
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        sqlx::query(
            "INSERT INTO messages
             (id, channel_id, author_id, content, raw_message, reply_to_id,
              source_type, source_id, metadata, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(new.id.to_string())
        .bind(new.channel_id.to_string())
        .bind(new.author_id.to_string())
        .bind(&new.content)
        .bind(&raw)
        .bind(new.reply_to_id.map(|id| id.to_string()))
        .bind(&new.source_type)
        .bind(&new.source_id)
        .bind(serde_json::to_string(&new.metadata)?)
        .bind(new.created_at)
        .bind(new.created_at)
        .execute(self.pool())
        .await?;

        Ok(Message {
            id: new.id,
            channel_id: new.channel_id,
            author_id: new.author_id,
            content: new.content,
            raw_message: new.raw_message,
            reply_to_id: new.reply_to_id,
            source_type: new.source_type,
            source_id: new.source_id,
            metadata: new.metadata,
            created_at: new.created_at,
            updated_at: new.created_at,
        })
    }

    pub async fn get_message(&self, id: MessageId) -> Result<Message> {
        let row = sqlx::query_as::<_, MessageRow>("SELECT * FROM messages WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(self.pool())
            .await?
            .ok_or_else(|| StoreError::not_found("message", id))?;
        row.try_into()
    }

    /// Messages for a channel in reverse-chronological order.
    ///
    /// `before` is an exclusive millisecond cursor. Rows created within the
    /// same millisecond as the cursor are excluded with it; that precision
    /// limit is accepted rather than worked around.
    pub async fn channel_messages(
        &self,
        channel_id: ChannelId,
        limit: u32,
        before: Option<i64>,
    ) -> Result<Vec<Message>> {
        let rows = match before {
            Some(cursor) => {
                sqlx::query_as::<_, MessageRow>(
                    "SELECT * FROM messages
                     WHERE channel_id = ? AND created_at < ?
                     ORDER BY created_at DESC
                     LIMIT ?",
                )
                .bind(channel_id.to_string())
                .bind(cursor)
                .bind(limit)
                .fetch_all(self.pool())
                .await?
            },
            None => {
                sqlx::query_as::<_, MessageRow>(
                    "SELECT * FROM messages
                     WHERE channel_id = ?
                     ORDER BY created_at DESC
                     LIMIT ?",
                )
                .bind(channel_id.to_string())
                .bind(limit)
                .fetch_all(self.pool())
                .await?
            },
        };
        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// Delete one message, scoped to its channel. NotFound when the id does
    /// not exist in that channel.
    pub async fn delete_message(&self, channel_id: ChannelId, id: MessageId) -> Result<()> {
        let res = sqlx::query("DELETE FROM messages WHERE id = ? AND channel_id = ?")
            .bind(id.to_string())
            .bind(channel_id.to_string())
            .execute(self.pool())
            .await?;
        if res.rows_affected() == 0 {
            return Err(StoreError::not_found("message", id));
        }
        Ok(())
    }

    /// Remove every message in a channel. Returns the number removed. The
    /// channel record itself is left in place.
    pub async fn clear_channel_messages(&self, channel_id: ChannelId) -> Result<u64> {
        if self.find_channel(channel_id).await?.is_none() {
            return Err(StoreError::not_found("channel", channel_id));
        }
        let res = sqlx::query("DELETE FROM messages WHERE channel_id = ?")
            .bind(channel_id.to_string())
            .execute(self.pool())
            .await?;
        Ok(res.rows_affected())
    }
}

#[allow(clippy::unwrap_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{
            test_util::test_store,
            types::{ChannelType, NewChannel},
        },
        switchboard_common::{EntityId, ServerId},
    };

    async fn seed_channel(store: &Store) -> ChannelId {
        let id = ChannelId::generate();
        store
            .create_channel(NewChannel {
                id,
                server_id: ServerId::DEFAULT,
                name: "general".into(),
                channel_type: ChannelType::Group,
                source_type: "api".into(),
                topic: None,
                metadata: serde_json::json!({}),
                participants: vec![],
            })
            .await
            .unwrap();
        id
    }

    fn sample(channel_id: ChannelId, content: &str, created_at: i64) -> NewMessage {
        NewMessage {
            id: MessageId::generate(),
            channel_id,
            author_id: EntityId::generate(),
            content: content.into(),
            raw_message: None,
            reply_to_id: None,
            source_type: "gui".into(),
            source_id: None,
            metadata: serde_json::json!({}),
            created_at,
        }
    }

    #[tokio::test]
    async fn create_and_get_roundtrip() {
        let store = test_store().await;
        let channel = seed_channel(&store).await;

        let mut new = sample(channel, "hello", 1_000);
        new.raw_message = Some(serde_json::json!({"platform": {"nested": true}}));
        new.source_id = Some("ext-42".into());
        let created = store.create_message(new).await.unwrap();

        let got = store.get_message(created.id).await.unwrap();
        assert_eq!(got.content, "hello");
        assert_eq!(got.source_id.as_deref(), Some("ext-42"));
        assert_eq!(got.raw_message.unwrap()["platform"]["nested"], true);
    }

    #[tokio::test]
    async fn create_in_unknown_channel_fails() {
        let store = test_store().await;
        let err = store
            .create_message(sample(ChannelId::generate(), "orphan", 1))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound { entity: "channel", .. }));
    }

    #[tokio::test]
    async fn listing_is_reverse_chronological() {
        let store = test_store().await;
        let channel = seed_channel(&store).await;
        for (i, text) in ["m1", "m2", "m3", "m4"].iter().enumerate() {
            store
                .create_message(sample(channel, text, 1_000 + i as i64))
                .await
                .unwrap();
        }

        let all = store.channel_messages(channel, 50, None).await.unwrap();
        let contents: Vec<&str> = all.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["m4", "m3", "m2", "m1"]);

        let limited = store.channel_messages(channel, 2, None).await.unwrap();
        assert_eq!(limited.len(), 2);
        assert_eq!(limited[0].content, "m4");
    }

    #[tokio::test]
    async fn before_cursor_is_exclusive() {
        let store = test_store().await;
        let channel = seed_channel(&store).await;
        for i in 0..4 {
            store
                .create_message(sample(channel, &format!("m{i}"), 1_000 + i))
                .await
                .unwrap();
        }

        // Cursor at m2's timestamp: strictly earlier rows only.
        let page = store
            .channel_messages(channel, 50, Some(1_002))
            .await
            .unwrap();
        let contents: Vec<&str> = page.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["m1", "m0"]);
    }

    #[tokio::test]
    async fn delete_is_scoped_to_channel() {
        let store = test_store().await;
        let channel = seed_channel(&store).await;
        let other = seed_channel(&store).await;
        let msg = store
            .create_message(sample(channel, "keep me", 1))
            .await
            .unwrap();

        // Wrong channel: nothing deleted.
        let err = store.delete_message(other, msg.id).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
        assert!(store.get_message(msg.id).await.is_ok());

        store.delete_message(channel, msg.id).await.unwrap();
        assert!(store.get_message(msg.id).await.is_err());
    }

    #[tokio::test]
    async fn clear_removes_only_that_channel() {
        let store = test_store().await;
        let channel = seed_channel(&store).await;
        let other = seed_channel(&store).await;
        for i in 0..3 {
            store.create_message(sample(channel, "x", i)).await.unwrap();
        }
        store.create_message(sample(other, "y", 9)).await.unwrap();

        let removed = store.clear_channel_messages(channel).await.unwrap();
        assert_eq!(removed, 3);
        assert!(store.channel_messages(channel, 10, None).await.unwrap().is_empty());
        assert_eq!(store.channel_messages(other, 10, None).await.unwrap().len(), 1);

        // Channel record survives a clear.
        assert!(store.get_channel(channel).await.is_ok());
    }
}
