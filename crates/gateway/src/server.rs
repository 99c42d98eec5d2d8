use std::{net::SocketAddr, sync::Arc};

use axum::{
    Router,
    routing::{get, post},
};

use switchboard_router::MessageService;

use crate::{fanout::FanOut, http, ws};

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<MessageService>,
    pub fanout: Arc<FanOut>,
}

// ── Server startup ───────────────────────────────────────────────────────────

/// Build the gateway router (shared between production startup and tests).
pub fn build_app(service: Arc<MessageService>, fanout: Arc<FanOut>) -> Router {
    let state = AppState { service, fanout };

    Router::new()
        .route("/health", get(http::health))
        .route("/ws", get(ws::ws_upgrade))
        .route("/api/messages/submit", post(http::submit_message))
        .route("/api/messages/complete", post(http::complete_message))
        .route("/api/messages/ingest", post(http::ingest_message))
        .route("/api/channels", post(http::create_channel))
        .route(
            "/api/channels/{id}",
            get(http::get_channel)
                .patch(http::update_channel)
                .delete(http::delete_channel),
        )
        .route(
            "/api/channels/{id}/messages",
            get(http::list_messages).delete(http::clear_channel),
        )
        .route(
            "/api/channels/{id}/messages/{message_id}",
            axum::routing::delete(http::delete_message),
        )
        .route("/api/channels/{id}/participants", get(http::list_participants))
        .route("/api/channels/{id}/title", post(http::generate_title))
        .route("/api/dm-channel", post(http::find_or_create_dm))
        .route(
            "/api/servers",
            get(http::list_servers).post(http::create_server),
        )
        .route("/api/servers/{id}/channels", get(http::list_channels))
        .route(
            "/api/servers/{id}/agents",
            get(http::list_server_agents).post(http::add_server_agent),
        )
        .route(
            "/api/servers/{id}/agents/{agent_id}",
            axum::routing::delete(http::remove_server_agent),
        )
        .route("/api/agents/{id}/servers", get(http::list_agent_servers))
        .with_state(state)
}

/// Bind and serve until the task is cancelled or the listener fails.
pub async fn serve(app: Router, addr: SocketAddr) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "gateway listening");
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
}
