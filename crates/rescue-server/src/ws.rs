//! `WebSocket` live channels.
//!
//! Dispatch consoles connect to `GET /ws/dispatch`; responder devices
//! connect to `GET /ws/responder`. A session joins its audience first, then
//! sends a snapshot frame, then forwards events. Every event passes through
//! a [`ResyncFilter`] seeded from the snapshot, so nothing the snapshot
//! already showed is replayed. A session that lags behind the fanout
//! buffer is resynced with a fresh snapshot before it forwards anything
//! else.
//!
//! Clients may send `{"type":"ping"}` (answered with `pong`) and
//! `{"type":"get_initial_data"}` (answered with a fresh snapshot).
//!
//! Socket I/O happens only on the session task. Dropping the session drops
//! its subscription, which ends membership.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use rescue_core::{Audience, CallFilter, DispatchError, Feed, ResyncFilter};
use rescue_types::{ClientMessage, ServerMessage, Snapshot};
use tracing::{debug, warn};

use crate::auth::Actor;
use crate::error::ApiError;
use crate::state::AppState;

/// Upgrade a dispatcher's connection and join the dispatch audience.
///
/// # Route
///
/// `GET /ws/dispatch`
pub async fn ws_dispatch(
    ws: WebSocketUpgrade,
    actor: Actor,
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    actor.dispatcher()?;
    Ok(ws.on_upgrade(|socket| run_session(socket, state, Audience::Dispatch)))
}

/// Upgrade a responder's connection and join their own audience.
///
/// # Route
///
/// `GET /ws/responder`
pub async fn ws_responder(
    ws: WebSocketUpgrade,
    actor: Actor,
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let responder = actor.responder()?;
    state.engine.responder(responder).await?;
    Ok(ws.on_upgrade(move |socket| run_session(socket, state, Audience::Responder(responder))))
}

async fn take_snapshot(state: &AppState, audience: Audience) -> Result<Snapshot, DispatchError> {
    match audience {
        Audience::Dispatch => Ok(state.engine.snapshot(CallFilter::Open).await),
        Audience::Responder(id) => state.engine.responder_snapshot(id).await,
    }
}

/// Serialize and send one frame. Returns `false` once the peer is gone.
async fn deliver(socket: &mut WebSocket, message: &ServerMessage) -> bool {
    let json = match serde_json::to_string(message) {
        Ok(j) => j,
        Err(e) => {
            warn!("Failed to serialize live-channel frame: {e}");
            return true;
        }
    };
    socket.send(Message::Text(json.into())).await.is_ok()
}

/// Send a snapshot frame and fold it into `filter`.
async fn resync(
    socket: &mut WebSocket,
    state: &AppState,
    audience: Audience,
    filter: &mut ResyncFilter,
) -> bool {
    match take_snapshot(state, audience).await {
        Ok(snapshot) => {
            filter.absorb(&snapshot);
            deliver(socket, &ServerMessage::Snapshot { data: snapshot }).await
        }
        Err(e) => {
            warn!(audience = ?audience, error = %e, "snapshot failed");
            let message = ServerMessage::Error {
                message: e.to_string(),
            };
            deliver(socket, &message).await
        }
    }
}

/// Drive one live-channel session until either side goes away.
async fn run_session(mut socket: WebSocket, state: Arc<AppState>, audience: Audience) {
    let mut subscription = match audience {
        Audience::Dispatch => state.engine.hub().subscribe_dispatch(),
        Audience::Responder(id) => state.engine.hub().subscribe_responder(id),
    };
    debug!(audience = ?audience, "live channel connected");

    let mut filter = ResyncFilter::default();
    if !resync(&mut socket, &state, audience, &mut filter).await {
        debug!("live channel closed before snapshot");
        return;
    }

    loop {
        tokio::select! {
            feed = subscription.recv() => {
                let delivered = match feed {
                    None => {
                        debug!("Fanout hub closed, shutting down live channel");
                        return;
                    }
                    Some(Feed::Event(event)) => {
                        if !filter.admit(&event) {
                            continue;
                        }
                        deliver(&mut socket, &ServerMessage::from(event.as_ref())).await
                    }
                    Some(Feed::Lagged(skipped)) => {
                        debug!(audience = ?audience, skipped, "live channel lagged, resyncing");
                        resync(&mut socket, &state, audience, &mut filter).await
                    }
                };
                if !delivered {
                    debug!("live channel disconnected (send failed)");
                    return;
                }
            }
            msg = socket.recv() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        let reply_ok = match serde_json::from_str::<ClientMessage>(text.as_str()) {
                            Ok(ClientMessage::Ping) => deliver(&mut socket, &ServerMessage::Pong).await,
                            Ok(ClientMessage::GetInitialData) => {
                                resync(&mut socket, &state, audience, &mut filter).await
                            }
                            Err(e) => {
                                let message = ServerMessage::Error {
                                    message: format!("unrecognized message: {e}"),
                                };
                                deliver(&mut socket, &message).await
                            }
                        };
                        if !reply_ok {
                            debug!("live channel disconnected (reply failed)");
                            return;
                        }
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if socket.send(Message::Pong(data)).await.is_err() {
                            debug!("live channel disconnected (pong failed)");
                            return;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        debug!(audience = ?audience, "live channel disconnected");
                        return;
                    }
                    Some(Err(e)) => {
                        debug!("live channel error: {e}");
                        return;
                    }
                    Some(Ok(Message::Binary(_) | Message::Pong(_))) => {}
                }
            }
        }
    }
}
