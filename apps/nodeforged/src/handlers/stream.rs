use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use axum::Extension;
use futures_util::{SinkExt, StreamExt};
use tokio::time::{interval, Duration};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::middleware::AuthenticatedNode;
use crate::services::event_bus;
use crate::state::AppState;

const KEEPALIVE_INTERVAL_SECONDS: u64 = 25;

/// GET /events: upgrades to a WebSocket that pushes every published event
/// to the caller as a JSON frame once authenticated.
#[instrument(skip(upgrade, state, caller))]
pub async fn events(
    upgrade: WebSocketUpgrade,
    State(state): State<AppState>,
    Extension(caller): Extension<AuthenticatedNode>,
) -> impl IntoResponse {
    upgrade.on_upgrade(move |socket| serve(socket, state, caller))
}

async fn serve(socket: WebSocket, state: AppState, caller: AuthenticatedNode) {
    let session_id = Uuid::new_v4();
    info!(%session_id, node_id = %caller.node_id, "event stream opened");

    let (mut sink, mut source) = socket.split();
    let mut subscriber = state.events.subscribe();

    let mut send_task = tokio::spawn(async move {
        let mut keepalive = interval(Duration::from_secs(KEEPALIVE_INTERVAL_SECONDS));
        loop {
            tokio::select! {
                _ = keepalive.tick() => {
                    if sink.send(Message::Ping(Vec::new())).await.is_err() {
                        break;
                    }
                }
                event = event_bus::next_event(&mut subscriber) => {
                    let Some(event) = event else {
                        break;
                    };
                    let frame = match serde_json::to_string(&event) {
                        Ok(frame) => frame,
                        Err(error) => {
                            warn!(%error, "failed to encode event frame");
                            continue;
                        }
                    };
                    if sink.send(Message::Text(frame)).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    // Clients of this stream are listen-only; the only inbound frame worth
    // honoring is a close. Anything else is drained so pings still flow.
    let mut receive_task = tokio::spawn(async move {
        while let Some(message) = source.next().await {
            match message {
                Ok(Message::Close(_)) => break,
                Ok(_) => {}
                Err(error) => {
                    warn!(%error, "event stream read error");
                    break;
                }
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => receive_task.abort(),
        _ = &mut receive_task => send_task.abort(),
    }

    debug!(%session_id, "event stream closed");
}
