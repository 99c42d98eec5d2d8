use std::{net::SocketAddr, sync::Arc};

use {
    axum::{
        extract::{
            ConnectInfo, State, WebSocketUpgrade,
            ws::{Message, WebSocket},
        },
        response::IntoResponse,
    },
    futures::{SinkExt, stream::StreamExt},
    tokio::sync::mpsc,
    tracing::{debug, info, warn},
};

use switchboard_protocol::ClientFrame;

use crate::{fanout::FanOut, server::AppState};

pub async fn ws_upgrade(
    State(state): State<AppState>,
    ConnectInfo(remote_addr): ConnectInfo<SocketAddr>,
    upgrade: WebSocketUpgrade,
) -> impl IntoResponse {
    upgrade.on_upgrade(move |socket| handle_connection(socket, state.fanout, remote_addr))
}

/// Handle a single WebSocket connection through its full lifecycle:
/// register → subscription loop → cleanup.
async fn handle_connection(socket: WebSocket, fanout: Arc<FanOut>, remote_addr: SocketAddr) {
    let conn_id = uuid::Uuid::new_v4().to_string();
    info!(conn_id = %conn_id, remote_ip = %remote_addr.ip(), "ws: new connection");

    let (mut ws_tx, mut ws_rx) = socket.split();
    let (client_tx, mut client_rx) = mpsc::unbounded_channel::<String>();

    // Write loop: forwards broadcast frames queued by the fan-out registry.
    let write_conn_id = conn_id.clone();
    let write_handle = tokio::spawn(async move {
        while let Some(msg) = client_rx.recv().await {
            if ws_tx.send(Message::Text(msg.into())).await.is_err() {
                debug!(conn_id = %write_conn_id, "ws: write loop closed");
                break;
            }
        }
    });

    fanout.register(conn_id.clone(), client_tx).await;

    // Read loop: the only inbound traffic is subscription management.
    while let Some(frame) = ws_rx.next().await {
        match frame {
            Ok(Message::Text(text)) => match serde_json::from_str::<ClientFrame>(&text) {
                Ok(frame) => fanout.apply(&conn_id, frame).await,
                Err(e) => {
                    warn!(conn_id = %conn_id, error = %e, "ws: unparseable frame ignored");
                },
            },
            Ok(Message::Close(_)) => break,
            Ok(_) => {},
            Err(e) => {
                debug!(conn_id = %conn_id, error = %e, "ws: read error");
                break;
            },
        }
    }

    fanout.unregister(&conn_id).await;
    write_handle.abort();
    info!(conn_id = %conn_id, "ws: connection closed");
}
