//! SQLite-backed channel/server store.
//!
//! The single source of truth for servers, channels, participants, messages,
//! and server-agent membership. Every other component reads and writes
//! through [`Store`]; the bus and real-time fan-out relay store-confirmed
//! facts and hold no state of their own.

pub mod error;
mod channels;
mod messages;
mod servers;
pub mod types;

use sqlx::SqlitePool;

pub use {
    error::{Result, StoreError},
    types::{
        Channel, ChannelType, ChannelUpdate, Message, NewChannel, NewMessage, NewServer, Server,
    },
};

use switchboard_common::{ServerId, now_ms};

/// Handle over the SQLite pool. Cheap to clone.
#[derive(Clone)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub(crate) fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Create the schema and seed the default server row.
    ///
    /// Idempotent; call once at startup. In-memory test databases use the
    /// same path.
    pub async fn init(pool: &SqlitePool) -> Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS servers (
                id          TEXT    PRIMARY KEY,
                name        TEXT    NOT NULL,
                source_type TEXT    NOT NULL,
                source_id   TEXT,
                metadata    TEXT    NOT NULL DEFAULT '{}',
                created_at  INTEGER NOT NULL,
                updated_at  INTEGER NOT NULL
            )",
        )
        .execute(pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS channels (
                id           TEXT    PRIMARY KEY,
                server_id    TEXT    NOT NULL,
                name         TEXT    NOT NULL,
                channel_type TEXT    NOT NULL,
                source_type  TEXT    NOT NULL,
                topic        TEXT,
                dm_pair_key  TEXT,
                metadata     TEXT    NOT NULL DEFAULT '{}',
                created_at   INTEGER NOT NULL,
                updated_at   INTEGER NOT NULL
            )",
        )
        .execute(pool)
        .await?;

        // One DM channel per unordered participant pair within a server.
        sqlx::query(
            "CREATE UNIQUE INDEX IF NOT EXISTS idx_channels_dm_pair
             ON channels (server_id, dm_pair_key)
             WHERE dm_pair_key IS NOT NULL",
        )
        .execute(pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_channels_server
             ON channels (server_id)",
        )
        .execute(pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS channel_participants (
                channel_id TEXT NOT NULL,
                entity_id  TEXT NOT NULL,
                PRIMARY KEY (channel_id, entity_id)
            )",
        )
        .execute(pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS messages (
                id          TEXT    PRIMARY KEY,
                channel_id  TEXT    NOT NULL,
                author_id   TEXT    NOT NULL,
                content     TEXT    NOT NULL,
                raw_message TEXT,
                reply_to_id TEXT,
                source_type TEXT    NOT NULL,
                source_id   TEXT,
                metadata    TEXT    NOT NULL DEFAULT '{}',
                created_at  INTEGER NOT NULL,
                updated_at  INTEGER NOT NULL
            )",
        )
        .execute(pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_messages_channel_created
             ON messages (channel_id, created_at DESC)",
        )
        .execute(pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS server_agents (
                server_id TEXT NOT NULL,
                agent_id  TEXT NOT NULL,
                PRIMARY KEY (server_id, agent_id)
            )",
        )
        .execute(pool)
        .await?;

        // The well-known default server must always resolve, even without an
        // explicit create call.
        let now = now_ms();
        sqlx::query(
            "INSERT OR IGNORE INTO servers
             (id, name, source_type, source_id, metadata, created_at, updated_at)
             VALUES (?, 'Default Server', 'system', NULL, '{}', ?, ?)",
        )
        .bind(ServerId::DEFAULT.to_string())
        .bind(now)
        .bind(now)
        .execute(pool)
        .await?;

        tracing::debug!("store schema initialized");
        Ok(())
    }
}

#[allow(clippy::unwrap_used)]
#[cfg(test)]
mod tests {
    use {super::*, switchboard_common::EntityId};

    #[tokio::test]
    async fn file_backed_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("switchboard.db");
        let options = sqlx::sqlite::SqliteConnectOptions::new()
            .filename(&path)
            .create_if_missing(true);

        let agent = EntityId::generate();
        {
            let pool = SqlitePool::connect_with(options.clone()).await.unwrap();
            Store::init(&pool).await.unwrap();
            let store = Store::new(pool.clone());
            store
                .add_server_agent(ServerId::DEFAULT, agent)
                .await
                .unwrap();
            pool.close().await;
        }

        let pool = SqlitePool::connect_with(options).await.unwrap();
        Store::init(&pool).await.unwrap();
        let store = Store::new(pool);
        assert_eq!(
            store.list_server_agents(ServerId::DEFAULT).await.unwrap(),
            vec![agent]
        );
    }
}
