//! Server CRUD and server-agent membership.

use switchboard_common::{EntityId, ServerId, now_ms};

use crate::{
    Store,
    error::{Result, StoreError},
    types::{NewServer, Server, parse_id, parse_json},
};

#[derive(sqlx::FromRow)]
struct ServerRow {
    id: String,
    name: String,
    source_type: String,
    source_id: Option<String>,
    metadata: String,
    created_at: i64,
    updated_at: i64,
}

impl TryFrom<ServerRow> for Server {
    type Error = StoreError;

    fn try_from(r: ServerRow) -> Result<Self> {
        Ok(Self {
            id: parse_id("server", &r.id)?,
            name: r.name,
            source_type: r.source_type,
            source_id: r.source_id,
            metadata: parse_json(&r.metadata)?,
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}

impl Store {
    pub async fn create_server(&self, new: NewServer) -> Result<Server> {
        let id = ServerId::generate();
        let now = now_ms();
        let metadata = serde_json::to_string(&new.metadata)?;
        sqlx::query(
            "INSERT INTO servers
             (id, name, source_type, source_id, metadata, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(id.to_string())
        .bind(&new.name)
        .bind(&new.source_type)
        .bind(&new.source_id)
        .bind(&metadata)
        .bind(now)
        .bind(now)
        .execute(self.pool())
        .await?;

        Ok(Server {
            id,
            name: new.name,
            source_type: new.source_type,
            source_id: new.source_id,
            metadata: new.metadata,
            created_at: now,
            updated_at: now,
        })
    }

    pub async fn get_server(&self, id: ServerId) -> Result<Server> {
        let row = sqlx::query_as::<_, ServerRow>("SELECT * FROM servers WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(self.pool())
            .await?
            .ok_or_else(|| StoreError::not_found("server", id))?;
        row.try_into()
    }

    pub async fn server_exists(&self, id: ServerId) -> Result<bool> {
        let row: Option<(i64,)> = sqlx::query_as("SELECT 1 FROM servers WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(self.pool())
            .await?;
        Ok(row.is_some())
    }

    pub async fn list_servers(&self) -> Result<Vec<Server>> {
        let rows = sqlx::query_as::<_, ServerRow>("SELECT * FROM servers ORDER BY created_at ASC")
            .fetch_all(self.pool())
            .await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    pub async fn update_server(
        &self,
        id: ServerId,
        name: Option<String>,
        metadata: Option<serde_json::Value>,
    ) -> Result<Server> {
        let current = self.get_server(id).await?;
        let name = name.unwrap_or(current.name);
        let metadata = metadata.unwrap_or(current.metadata);
        let now = now_ms();
        sqlx::query("UPDATE servers SET name = ?, metadata = ?, updated_at = ? WHERE id = ?")
            .bind(&name)
            .bind(serde_json::to_string(&metadata)?)
            .bind(now)
            .bind(id.to_string())
            .execute(self.pool())
            .await?;

        Ok(Server {
            name,
            metadata,
            updated_at: now,
            ..current
        })
    }

    /// Remove a server and everything scoped to it: channels, their
    /// participants and messages, and agent membership rows.
    pub async fn delete_server(&self, id: ServerId) -> Result<()> {
        let mut tx = self.pool().begin().await?;
        let server = id.to_string();

        let deleted = sqlx::query("DELETE FROM servers WHERE id = ?")
            .bind(&server)
            .execute(&mut *tx)
            .await?;
        if deleted.rows_affected() == 0 {
            return Err(StoreError::not_found("server", id));
        }

        sqlx::query(
            "DELETE FROM messages WHERE channel_id IN
             (SELECT id FROM channels WHERE server_id = ?)",
        )
        .bind(&server)
        .execute(&mut *tx)
        .await?;
        sqlx::query(
            "DELETE FROM channel_participants WHERE channel_id IN
             (SELECT id FROM channels WHERE server_id = ?)",
        )
        .bind(&server)
        .execute(&mut *tx)
        .await?;
        sqlx::query("DELETE FROM channels WHERE server_id = ?")
            .bind(&server)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM server_agents WHERE server_id = ?")
            .bind(&server)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    // ── Server-agent membership ──────────────────────────────────────────

    /// Register an agent on a server. Returns false if it was already there.
    pub async fn add_server_agent(&self, server_id: ServerId, agent_id: EntityId) -> Result<bool> {
        if !self.server_exists(server_id).await? {
            return Err(StoreError::not_found("server", server_id));
        }
        let res = sqlx::query(
            "INSERT OR IGNORE INTO server_agents (server_id, agent_id) VALUES (?, ?)",
        )
        .bind(server_id.to_string())
        .bind(agent_id.to_string())
        .execute(self.pool())
        .await?;
        Ok(res.rows_affected() > 0)
    }

    pub async fn remove_server_agent(
        &self,
        server_id: ServerId,
        agent_id: EntityId,
    ) -> Result<bool> {
        let res = sqlx::query("DELETE FROM server_agents WHERE server_id = ? AND agent_id = ?")
            .bind(server_id.to_string())
            .bind(agent_id.to_string())
            .execute(self.pool())
            .await?;
        Ok(res.rows_affected() > 0)
    }

    pub async fn list_server_agents(&self, server_id: ServerId) -> Result<Vec<EntityId>> {
        let rows: Vec<(String,)> =
            sqlx::query_as("SELECT agent_id FROM server_agents WHERE server_id = ? ORDER BY agent_id")
                .bind(server_id.to_string())
                .fetch_all(self.pool())
                .await?;
        rows.iter()
            .map(|(raw,)| parse_id("server_agent", raw))
            .collect()
    }

    /// Servers an agent is registered on, oldest first.
    pub async fn list_servers_for_agent(&self, agent_id: EntityId) -> Result<Vec<Server>> {
        let rows = sqlx::query_as::<_, ServerRow>(
            "SELECT s.* FROM servers s
             JOIN server_agents sa ON sa.server_id = s.id
             WHERE sa.agent_id = ?
             ORDER BY s.created_at ASC",
        )
        .bind(agent_id.to_string())
        .fetch_all(self.pool())
        .await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }
}

#[allow(clippy::unwrap_used)]
#[cfg(test)]
mod tests {
    use {super::*, crate::test_util::test_store};

    fn sample_server(name: &str) -> NewServer {
        NewServer {
            name: name.into(),
            source_type: "api".into(),
            source_id: None,
            metadata: serde_json::json!({}),
        }
    }

    #[tokio::test]
    async fn default_server_resolves_without_creation() {
        let store = test_store().await;
        let server = store.get_server(ServerId::DEFAULT).await.unwrap();
        assert_eq!(server.id, ServerId::DEFAULT);
        assert_eq!(server.source_type, "system");
    }

    #[tokio::test]
    async fn create_and_get() {
        let store = test_store().await;
        let created = store.create_server(sample_server("guild-a")).await.unwrap();
        let got = store.get_server(created.id).await.unwrap();
        assert_eq!(got.name, "guild-a");
        assert_eq!(got.created_at, created.created_at);
    }

    #[tokio::test]
    async fn get_missing_is_not_found() {
        let store = test_store().await;
        let err = store.get_server(ServerId::generate()).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound { entity: "server", .. }));
    }

    #[tokio::test]
    async fn update_merges_fields() {
        let store = test_store().await;
        let created = store.create_server(sample_server("before")).await.unwrap();

        let updated = store
            .update_server(created.id, Some("after".into()), None)
            .await
            .unwrap();
        assert_eq!(updated.name, "after");
        assert_eq!(updated.metadata, serde_json::json!({}));

        let updated = store
            .update_server(created.id, None, Some(serde_json::json!({"k": 1})))
            .await
            .unwrap();
        assert_eq!(updated.name, "after");
        assert_eq!(updated.metadata["k"], 1);
    }

    #[tokio::test]
    async fn agent_membership_is_idempotent() {
        let store = test_store().await;
        let agent = EntityId::generate();

        assert!(store
            .add_server_agent(ServerId::DEFAULT, agent)
            .await
            .unwrap());
        assert!(!store
            .add_server_agent(ServerId::DEFAULT, agent)
            .await
            .unwrap());

        let agents = store.list_server_agents(ServerId::DEFAULT).await.unwrap();
        assert_eq!(agents, vec![agent]);

        assert!(store
            .remove_server_agent(ServerId::DEFAULT, agent)
            .await
            .unwrap());
        assert!(!store
            .remove_server_agent(ServerId::DEFAULT, agent)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn add_agent_to_missing_server_fails() {
        let store = test_store().await;
        let err = store
            .add_server_agent(ServerId::generate(), EntityId::generate())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[tokio::test]
    async fn servers_for_agent_lists_memberships() {
        let store = test_store().await;
        let other = store.create_server(sample_server("other")).await.unwrap();
        let agent = EntityId::generate();

        store
            .add_server_agent(ServerId::DEFAULT, agent)
            .await
            .unwrap();
        store.add_server_agent(other.id, agent).await.unwrap();

        let servers = store.list_servers_for_agent(agent).await.unwrap();
        assert_eq!(servers.len(), 2);
        assert_eq!(servers[0].id, ServerId::DEFAULT);
    }

    #[tokio::test]
    async fn delete_server_cascades() {
        let store = test_store().await;
        let server = store.create_server(sample_server("doomed")).await.unwrap();
        store
            .add_server_agent(server.id, EntityId::generate())
            .await
            .unwrap();

        store.delete_server(server.id).await.unwrap();
        assert!(store.get_server(server.id).await.is_err());
        assert!(store.list_server_agents(server.id).await.unwrap().is_empty());
    }
}
