// =============================================================================
// WebSocket Handler — push-based session updates
// =============================================================================
//
// Clients connect to `/api/v1/ws?token=<token>` and receive:
//   1. The full SessionSnapshot immediately on connect.
//   2. A fresh snapshot whenever the session version has changed, checked
//      every 500 ms.
//
// Inbound Ping frames are answered; any other inbound traffic is ignored.
// The connection also closes once the refresh loop has stopped.
// =============================================================================

use axum::{
    extract::{
        ws::{Message, WebSocket},
        Query, State, WebSocketUpgrade,
    },
    http::StatusCode,
    response::IntoResponse,
};
use futures_util::{Sink, SinkExt, StreamExt};
use serde::Deserialize;
use tokio::time::{interval, Duration};
use tracing::{debug, info, warn};

use crate::api::auth::validate_token;
use crate::api::rest::ApiState;
use crate::market_data::KlineSource;
use crate::session::SessionStore;

const PUSH_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Deserialize)]
pub struct WsQuery {
    token: Option<String>,
}

/// Validates the `?token=` query parameter before upgrading.
pub async fn ws_handler<S: KlineSource>(
    ws: WebSocketUpgrade,
    State(state): State<ApiState<S>>,
    Query(query): Query<WsQuery>,
) -> impl IntoResponse {
    if !validate_token(query.token.as_deref().unwrap_or_default()) {
        warn!("WebSocket connection rejected: invalid token");
        return (StatusCode::FORBIDDEN, "Invalid or missing token").into_response();
    }

    info!("WebSocket connection accepted, upgrading");
    ws.on_upgrade(move |socket| handle_ws_connection(socket, state))
        .into_response()
}

async fn handle_ws_connection<S: KlineSource>(socket: WebSocket, state: ApiState<S>) {
    let (mut sender, mut receiver) = socket.split();
    let store = state.refresher.store();

    let mut sequence: u64 = 0;
    let Ok(mut last_sent_version) = send_snapshot(&mut sender, store, &mut sequence).await else {
        warn!("failed to send initial WebSocket snapshot");
        return;
    };

    let mut push_interval = interval(PUSH_INTERVAL);

    loop {
        tokio::select! {
            _ = state.refresher.stopped() => {
                let _ = sender.send(Message::Close(None)).await;
                break;
            }

            _ = push_interval.tick() => {
                if store.version() == last_sent_version {
                    continue;
                }
                match send_snapshot(&mut sender, store, &mut sequence).await {
                    Ok(version) => last_sent_version = version,
                    Err(e) => {
                        debug!(error = %e, "WebSocket send failed, disconnecting");
                        break;
                    }
                }
            }

            msg = receiver.next() => match msg {
                Some(Ok(Message::Ping(data))) => {
                    if let Err(e) = sender.send(Message::Pong(data)).await {
                        debug!(error = %e, "failed to send Pong, disconnecting");
                        break;
                    }
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!(error = %e, "WebSocket receive error, disconnecting");
                    break;
                }
            },
        }
    }

    info!(sent = sequence, "WebSocket connection closed");
}

/// Serialize and send the current snapshot. Returns the version sent.
async fn send_snapshot<W>(
    sender: &mut W,
    store: &SessionStore,
    sequence: &mut u64,
) -> Result<u64, axum::Error>
where
    W: Sink<Message, Error = axum::Error> + Unpin,
{
    let snapshot = store.build_snapshot();
    *sequence += 1;

    match serde_json::to_string(&snapshot) {
        Ok(json) => {
            sender.send(Message::Text(json.into())).await?;
            debug!(version = snapshot.version, seq = *sequence, "WebSocket snapshot sent");
        }
        Err(e) => warn!(error = %e, "failed to serialize snapshot"),
    }
    Ok(snapshot.version)
}
