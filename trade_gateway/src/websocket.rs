use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
    routing::get,
    Router,
};
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::protocol::{handle_request, ServerMessage, SharedEngine};
use crate::publish;

/// Websocket front-end speaking the same JSON protocol as the control
/// socket, one object per text frame.
#[derive(Clone)]
pub struct WsState {
    pub engine: SharedEngine,
    pub events: broadcast::Sender<String>,
}

pub fn router(state: WsState) -> Router {
    Router::new().route("/ws", get(ws_handler)).with_state(state)
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<WsState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: WsState) {
    let (mut sender, mut receiver) = socket.split();
    let mut event_rx = state.events.subscribe();

    if send_message(&mut sender, &ServerMessage::welcome()).await.is_err() {
        return;
    }
    info!("websocket client connected");

    loop {
        tokio::select! {
            frame = receiver.next() => {
                match frame {
                    Some(Ok(Message::Text(text))) => {
                        let (reply, notification) = handle_request(&state.engine, &text);
                        if send_message(&mut sender, &reply).await.is_err() {
                            break;
                        }
                        if let Some(notification) = notification {
                            publish(&state.events, &notification);
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {} // ping/pong/binary: nothing to do
                    Some(Err(err)) => {
                        warn!(error = %err, "websocket receive error");
                        break;
                    }
                }
            }
            event = event_rx.recv() => {
                match event {
                    Ok(json) => {
                        if sender.send(Message::Text(json)).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "slow websocket client, dropped events");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    }

    info!("websocket client disconnected");
}

async fn send_message(
    sender: &mut SplitSink<WebSocket, Message>,
    message: &ServerMessage,
) -> Result<(), axum::Error> {
    match serde_json::to_string(message) {
        Ok(json) => sender.send(Message::Text(json)).await,
        Err(err) => {
            warn!(error = %err, "failed to serialize websocket message");
            Ok(())
        }
    }
}
