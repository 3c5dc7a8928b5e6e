//! WebSocket upgrade handler

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::app::AppState;
use crate::game::ConnectionId;
use crate::util::rate_limit::PlayerRateLimiter;
use crate::ws::protocol::{ClientMsg, ServerMsg};

/// Work handed from the reader loop to the writer task, in order
enum Outbound {
    Reply(ServerMsg),
    Subscribe(broadcast::Receiver<ServerMsg>),
}

/// WebSocket upgrade handler
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    let connection_id = Uuid::new_v4();
    ws.on_upgrade(move |socket| handle_socket(socket, connection_id, state))
}

/// Handle the upgraded WebSocket connection
async fn handle_socket(socket: WebSocket, connection_id: ConnectionId, state: AppState) {
    info!(connection_id = %connection_id, "New WebSocket connection");

    let (ws_sink, ws_stream) = socket.split();
    let (out_tx, out_rx) = mpsc::channel::<Outbound>(64);

    let writer_handle = tokio::spawn(run_writer(connection_id, ws_sink, out_rx));

    run_reader(connection_id, ws_stream, out_tx, &state).await;

    // Cleanup on disconnect
    state.gateway.disconnect(connection_id);
    writer_handle.abort();

    info!(connection_id = %connection_id, "WebSocket connection closed");
}

/// Reader loop: WebSocket -> gateway
async fn run_reader(
    connection_id: ConnectionId,
    mut ws_stream: futures::stream::SplitStream<WebSocket>,
    out_tx: mpsc::Sender<Outbound>,
    state: &AppState,
) {
    let rate_limiter = PlayerRateLimiter::new();

    while let Some(result) = ws_stream.next().await {
        match result {
            Ok(Message::Text(text)) => {
                if !rate_limiter.check_input() {
                    warn!(connection_id = %connection_id, "Rate limited input message");
                    continue;
                }

                let client_msg = match serde_json::from_str::<ClientMsg>(&text) {
                    Ok(msg) => msg,
                    Err(e) => {
                        warn!(connection_id = %connection_id, error = %e, "Failed to parse client message");
                        continue;
                    }
                };

                let dispatch = state.gateway.handle(connection_id, client_msg);
                let outbound = dispatch
                    .replies
                    .into_iter()
                    .map(Outbound::Reply)
                    .chain(dispatch.subscription.map(Outbound::Subscribe));

                for item in outbound {
                    if out_tx.send(item).await.is_err() {
                        debug!(connection_id = %connection_id, "Writer task gone");
                        return;
                    }
                }
            }
            Ok(Message::Binary(_)) => {
                warn!(connection_id = %connection_id, "Received binary message, ignoring");
            }
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {
                debug!(connection_id = %connection_id, "Received ping/pong");
            }
            Ok(Message::Close(_)) => {
                info!(connection_id = %connection_id, "Client initiated close");
                break;
            }
            Err(e) => {
                error!(connection_id = %connection_id, error = %e, "WebSocket error");
                break;
            }
        }
    }
}

/// Writer task: direct replies and the current room feed -> WebSocket
async fn run_writer(
    connection_id: ConnectionId,
    mut ws_sink: futures::stream::SplitSink<WebSocket, Message>,
    mut out_rx: mpsc::Receiver<Outbound>,
) {
    let mut room_rx: Option<broadcast::Receiver<ServerMsg>> = None;

    loop {
        let msg = tokio::select! {
            biased;

            outbound = out_rx.recv() => match outbound {
                Some(Outbound::Reply(msg)) => msg,
                Some(Outbound::Subscribe(rx)) => {
                    room_rx = Some(rx);
                    continue;
                }
                None => break,
            },

            event = recv_room(&mut room_rx) => match event {
                Ok(msg) => msg,
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(connection_id = %connection_id, lagged_count = n, "Client lagged, skipping {} room messages", n);
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!(connection_id = %connection_id, "Room feed closed");
                    room_rx = None;
                    continue;
                }
            },
        };

        if let Err(e) = send_msg(&mut ws_sink, &msg).await {
            debug!(connection_id = %connection_id, error = %e, "WebSocket send failed");
            break;
        }
    }
}

/// Next room message, or never when not in a room
async fn recv_room(
    rx: &mut Option<broadcast::Receiver<ServerMsg>>,
) -> Result<ServerMsg, broadcast::error::RecvError> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

/// Send a message over WebSocket
async fn send_msg(
    sink: &mut futures::stream::SplitSink<WebSocket, Message>,
    msg: &ServerMsg,
) -> Result<(), String> {
    let json = serde_json::to_string(msg).map_err(|e| e.to_string())?;
    sink.send(Message::Text(json))
        .await
        .map_err(|e| e.to_string())
}
