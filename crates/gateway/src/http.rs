//! REST surface over the routing core.
//!
//! Authentication and rate limiting are deliberately absent; deployments put
//! this behind their own middleware. Every handler validates before touching
//! the store and maps the router error taxonomy onto status codes.

use std::str::FromStr;

use {
    axum::{
        Json,
        extract::{Path, Query, State},
        http::StatusCode,
    },
    serde::Deserialize,
};

use {
    switchboard_common::{ChannelId, EntityId, InvalidId, MessageId, ServerId},
    switchboard_router::{
        AgentReplyParams, Error, ExternalMessageParams, SubmitMessageParams, source,
    },
    switchboard_store::{ChannelType, ChannelUpdate, NewChannel, NewServer, StoreError},
};

use crate::server::AppState;

/// Default page size for message listings.
const DEFAULT_LIMIT: u32 = 50;
const MAX_LIMIT: u32 = 200;

// ── Error mapping ────────────────────────────────────────────────────────────

type Reply = (StatusCode, Json<serde_json::Value>);
type Handled = Result<Reply, Reply>;

fn error_response(err: Error) -> Reply {
    let status = match &err {
        Error::Validation { .. } => StatusCode::BAD_REQUEST,
        Error::Store(StoreError::NotFound { .. }) => StatusCode::NOT_FOUND,
        Error::Store(StoreError::Conflict { .. }) => StatusCode::CONFLICT,
        Error::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        Error::NoTitleGenerator => StatusCode::SERVICE_UNAVAILABLE,
        Error::TitleGeneration { .. } => StatusCode::BAD_GATEWAY,
    };
    (
        status,
        Json(serde_json::json!({ "ok": false, "error": err.to_string() })),
    )
}

fn store_error(err: StoreError) -> Reply {
    error_response(err.into())
}

fn ok(payload: serde_json::Value) -> Reply {
    (StatusCode::OK, Json(payload))
}

fn created(payload: serde_json::Value) -> Reply {
    (StatusCode::CREATED, Json(payload))
}

fn path_id<T>(raw: &str) -> Result<T, Reply>
where
    T: FromStr<Err = InvalidId>,
{
    raw.parse().map_err(|e: InvalidId| error_response(Error::validation(e)))
}

fn json_value<T: serde::Serialize>(value: &T) -> Result<serde_json::Value, Reply> {
    serde_json::to_value(value).map_err(|e| error_response(Error::Store(StoreError::Json(e))))
}

// ── Messages ─────────────────────────────────────────────────────────────────

pub async fn submit_message(
    State(state): State<AppState>,
    Json(params): Json<SubmitMessageParams>,
) -> Handled {
    let message = state
        .service
        .submit_user_message(params)
        .await
        .map_err(error_response)?;
    Ok(created(json_value(&message)?))
}

pub async fn complete_message(
    State(state): State<AppState>,
    Json(params): Json<AgentReplyParams>,
) -> Handled {
    let message = state
        .service
        .submit_agent_reply(params)
        .await
        .map_err(error_response)?;
    Ok(created(json_value(&message)?))
}

pub async fn ingest_message(
    State(state): State<AppState>,
    Json(params): Json<ExternalMessageParams>,
) -> Handled {
    let message = state
        .service
        .ingest_external_message(params)
        .await
        .map_err(error_response)?;
    Ok(created(json_value(&message)?))
}

#[derive(Debug, Deserialize, Default)]
pub struct ListQuery {
    pub limit: Option<u32>,
    /// Exclusive millisecond cursor: only messages created strictly earlier.
    pub before: Option<i64>,
}

pub async fn list_messages(
    State(state): State<AppState>,
    Path(channel_id): Path<String>,
    Query(query): Query<ListQuery>,
) -> Handled {
    let channel_id: ChannelId = path_id(&channel_id)?;
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT);
    let messages = state
        .service
        .store()
        .channel_messages(channel_id, limit, query.before)
        .await
        .map_err(store_error)?;
    Ok(ok(json_value(&messages)?))
}

pub async fn delete_message(
    State(state): State<AppState>,
    Path((channel_id, message_id)): Path<(String, String)>,
) -> Handled {
    let channel_id: ChannelId = path_id(&channel_id)?;
    let message_id: MessageId = path_id(&message_id)?;
    state
        .service
        .delete_message(channel_id, message_id)
        .await
        .map_err(error_response)?;
    Ok(ok(serde_json::json!({ "ok": true })))
}

// ── Channels ─────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateChannelParams {
    pub server_id: String,
    pub name: String,
    #[serde(rename = "type", default)]
    pub channel_type: Option<ChannelType>,
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
    #[serde(default)]
    pub participants: Vec<String>,
}

pub async fn create_channel(
    State(state): State<AppState>,
    Json(params): Json<CreateChannelParams>,
) -> Handled {
    let server_id: ServerId = path_id(&params.server_id)?;
    if params.name.trim().is_empty() {
        return Err(error_response(Error::validation("name must not be empty")));
    }
    let mut participants = Vec::with_capacity(params.participants.len());
    for raw in &params.participants {
        participants.push(path_id::<EntityId>(raw)?);
    }
    let channel = state
        .service
        .store()
        .create_channel(NewChannel {
            id: ChannelId::generate(),
            server_id,
            name: params.name,
            channel_type: params.channel_type.unwrap_or(ChannelType::Group),
            source_type: source::API.into(),
            topic: params.topic,
            metadata: params.metadata.unwrap_or_else(|| serde_json::json!({})),
            participants,
        })
        .await
        .map_err(store_error)?;
    Ok(created(json_value(&channel)?))
}

pub async fn get_channel(
    State(state): State<AppState>,
    Path(channel_id): Path<String>,
) -> Handled {
    let channel_id: ChannelId = path_id(&channel_id)?;
    let channel = state
        .service
        .store()
        .get_channel(channel_id)
        .await
        .map_err(store_error)?;
    Ok(ok(json_value(&channel)?))
}

pub async fn update_channel(
    State(state): State<AppState>,
    Path(channel_id): Path<String>,
    Json(update): Json<ChannelUpdate>,
) -> Handled {
    let channel_id: ChannelId = path_id(&channel_id)?;
    let channel = state
        .service
        .store()
        .update_channel(channel_id, update)
        .await
        .map_err(store_error)?;
    Ok(ok(json_value(&channel)?))
}

pub async fn delete_channel(
    State(state): State<AppState>,
    Path(channel_id): Path<String>,
) -> Handled {
    let channel_id: ChannelId = path_id(&channel_id)?;
    state
        .service
        .delete_channel(channel_id)
        .await
        .map_err(error_response)?;
    Ok(ok(serde_json::json!({ "ok": true })))
}

pub async fn clear_channel(
    State(state): State<AppState>,
    Path(channel_id): Path<String>,
) -> Handled {
    let channel_id: ChannelId = path_id(&channel_id)?;
    let removed = state
        .service
        .clear_channel(channel_id)
        .await
        .map_err(error_response)?;
    Ok(ok(serde_json::json!({ "ok": true, "removed": removed })))
}

pub async fn list_participants(
    State(state): State<AppState>,
    Path(channel_id): Path<String>,
) -> Handled {
    let channel_id: ChannelId = path_id(&channel_id)?;
    // 404 for unknown channels rather than an empty list.
    state
        .service
        .store()
        .get_channel(channel_id)
        .await
        .map_err(store_error)?;
    let participants = state
        .service
        .store()
        .list_participants(channel_id)
        .await
        .map_err(store_error)?;
    Ok(ok(json_value(&participants)?))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DmParams {
    pub user_a: String,
    pub user_b: String,
    #[serde(default)]
    pub server_id: Option<String>,
}

pub async fn find_or_create_dm(
    State(state): State<AppState>,
    Json(params): Json<DmParams>,
) -> Handled {
    let a: EntityId = path_id(&params.user_a)?;
    let b: EntityId = path_id(&params.user_b)?;
    let server_id = match &params.server_id {
        Some(raw) => path_id(raw)?,
        None => ServerId::DEFAULT,
    };
    let channel = state
        .service
        .find_or_create_dm_channel(a, b, server_id)
        .await
        .map_err(error_response)?;
    Ok(ok(json_value(&channel)?))
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct TitleParams {
    /// Agent requesting the title; recorded for audit logging only.
    #[serde(default)]
    pub agent_id: Option<String>,
}

pub async fn generate_title(
    State(state): State<AppState>,
    Path(channel_id): Path<String>,
    Json(params): Json<TitleParams>,
) -> Handled {
    let channel_id: ChannelId = path_id(&channel_id)?;
    if let Some(agent) = &params.agent_id {
        let agent: EntityId = path_id(agent)?;
        tracing::debug!(%channel_id, %agent, "title requested");
    }
    let title = state
        .service
        .generate_channel_title(channel_id)
        .await
        .map_err(error_response)?;
    Ok(ok(serde_json::json!({ "ok": true, "title": title })))
}

// ── Servers & membership ─────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateServerParams {
    pub name: String,
    #[serde(default)]
    pub source_type: Option<String>,
    #[serde(default)]
    pub source_id: Option<String>,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

pub async fn create_server(
    State(state): State<AppState>,
    Json(params): Json<CreateServerParams>,
) -> Handled {
    if params.name.trim().is_empty() {
        return Err(error_response(Error::validation("name must not be empty")));
    }
    let server = state
        .service
        .store()
        .create_server(NewServer {
            name: params.name,
            source_type: params.source_type.unwrap_or_else(|| source::API.into()),
            source_id: params.source_id,
            metadata: params.metadata.unwrap_or_else(|| serde_json::json!({})),
        })
        .await
        .map_err(store_error)?;
    Ok(created(json_value(&server)?))
}

pub async fn list_servers(State(state): State<AppState>) -> Handled {
    let servers = state
        .service
        .store()
        .list_servers()
        .await
        .map_err(store_error)?;
    Ok(ok(json_value(&servers)?))
}

pub async fn list_channels(
    State(state): State<AppState>,
    Path(server_id): Path<String>,
) -> Handled {
    let server_id: ServerId = path_id(&server_id)?;
    state
        .service
        .store()
        .get_server(server_id)
        .await
        .map_err(store_error)?;
    let channels = state
        .service
        .store()
        .list_channels(server_id)
        .await
        .map_err(store_error)?;
    Ok(ok(json_value(&channels)?))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddAgentParams {
    pub agent_id: String,
}

pub async fn add_server_agent(
    State(state): State<AppState>,
    Path(server_id): Path<String>,
    Json(params): Json<AddAgentParams>,
) -> Handled {
    let server_id: ServerId = path_id(&server_id)?;
    let agent_id: EntityId = path_id(&params.agent_id)?;
    state
        .service
        .add_agent_to_server(server_id, agent_id)
        .await
        .map_err(error_response)?;
    Ok(created(serde_json::json!({ "ok": true })))
}

pub async fn remove_server_agent(
    State(state): State<AppState>,
    Path((server_id, agent_id)): Path<(String, String)>,
) -> Handled {
    let server_id: ServerId = path_id(&server_id)?;
    let agent_id: EntityId = path_id(&agent_id)?;
    state
        .service
        .remove_agent_from_server(server_id, agent_id)
        .await
        .map_err(error_response)?;
    Ok(ok(serde_json::json!({ "ok": true })))
}

pub async fn list_server_agents(
    State(state): State<AppState>,
    Path(server_id): Path<String>,
) -> Handled {
    let server_id: ServerId = path_id(&server_id)?;
    state
        .service
        .store()
        .get_server(server_id)
        .await
        .map_err(store_error)?;
    let agents = state
        .service
        .store()
        .list_server_agents(server_id)
        .await
        .map_err(store_error)?;
    Ok(ok(json_value(&agents)?))
}

pub async fn list_agent_servers(
    State(state): State<AppState>,
    Path(agent_id): Path<String>,
) -> Handled {
    let agent_id: EntityId = path_id(&agent_id)?;
    let servers = state
        .service
        .store()
        .list_servers_for_agent(agent_id)
        .await
        .map_err(store_error)?;
    Ok(ok(json_value(&servers)?))
}

// ── Health ───────────────────────────────────────────────────────────────────

pub async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "ok": true,
        "clients": state.fanout.client_count().await,
    }))
}
