//! WebSocket upgrade handler and session plumbing

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
use crate::game::PlayerInput;
use crate::util::rate_limit::SessionRateLimiter;
use crate::util::time::unix_millis;
use crate::ws::protocol::{ClientMsg, ServerMsg};

/// WebSocket upgrade handler. Sessions are anonymous; the server assigns
/// the player id at connect time.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handle the upgraded WebSocket connection
async fn handle_socket(socket: WebSocket, state: AppState) {
    let player_id = Uuid::new_v4();
    info!(player_id = %player_id, "new WebSocket connection");

    let (mut ws_sink, ws_stream) = socket.split();

    let welcome = ServerMsg::Welcome {
        player_id,
        server_time: unix_millis(),
    };
    if let Err(e) = send_msg(&mut ws_sink, &welcome).await {
        error!(player_id = %player_id, error = %e, "failed to send welcome");
        return;
    }

    let room = state.get_or_create_room();
    let input_tx = room.input_tx.clone();
    let patch_rx = room.patch_tx.subscribe();

    run_session(player_id, ws_sink, ws_stream, input_tx, patch_rx).await;

    info!(player_id = %player_id, "WebSocket connection closed");
}

/// Run the WebSocket session with read/write split
async fn run_session(
    player_id: Uuid,
    mut ws_sink: futures::stream::SplitSink<WebSocket, Message>,
    mut ws_stream: futures::stream::SplitStream<WebSocket>,
    input_tx: mpsc::Sender<PlayerInput>,
    mut patch_rx: broadcast::Receiver<ServerMsg>,
) {
    let rate_limiter = SessionRateLimiter::new();

    // Replies addressed to this session alone; the broadcast channel only
    // ever carries patches.
    let (reply_tx, mut reply_rx) = mpsc::channel::<ServerMsg>(32);

    // Writer task: room broadcasts and per-session replies -> WebSocket
    let writer_player_id = player_id;
    let writer_handle = tokio::spawn(async move {
        loop {
            tokio::select! {
                patch = patch_rx.recv() => match patch {
                    Ok(msg) => {
                        if let Err(e) = send_msg(&mut ws_sink, &msg).await {
                            debug!(player_id = %writer_player_id, error = %e, "WebSocket send failed");
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        // A slow client misses patches, not its connection.
                        warn!(
                            player_id = %writer_player_id,
                            lagged_count = n,
                            "client lagged, skipping {} patches", n
                        );
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        debug!(player_id = %writer_player_id, "patch channel closed");
                        break;
                    }
                },
                reply = reply_rx.recv() => match reply {
                    Some(msg) => {
                        if let Err(e) = send_msg(&mut ws_sink, &msg).await {
                            debug!(player_id = %writer_player_id, error = %e, "WebSocket send failed");
                            break;
                        }
                    }
                    None => break,
                },
            }
        }
    });

    // Reader loop: WebSocket -> room input queue
    while let Some(result) = ws_stream.next().await {
        match result {
            Ok(Message::Text(text)) => {
                if !rate_limiter.check_input() {
                    warn!(player_id = %player_id, "rate limited input message");
                    continue;
                }

                match serde_json::from_str::<ClientMsg>(&text) {
                    Ok(client_msg) => {
                        let input = PlayerInput {
                            player_id,
                            msg: client_msg,
                            reply_tx: reply_tx.clone(),
                        };

                        if input_tx.send(input).await.is_err() {
                            debug!(player_id = %player_id, "input channel closed");
                            break;
                        }
                    }
                    Err(e) => {
                        warn!(player_id = %player_id, error = %e, "failed to parse client message");
                    }
                }
            }
            Ok(Message::Binary(_)) => {
                warn!(player_id = %player_id, "received binary message, ignoring");
            }
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
            Ok(Message::Close(_)) => {
                info!(player_id = %player_id, "client initiated close");
                break;
            }
            Err(e) => {
                error!(player_id = %player_id, error = %e, "WebSocket error");
                break;
            }
        }
    }

    // A dropped connection counts as a leave.
    let _ = input_tx
        .send(PlayerInput {
            player_id,
            msg: ClientMsg::Leave,
            reply_tx,
        })
        .await;

    writer_handle.abort();
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
