pub mod handlers;
mod host;
mod player;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::IntoResponse,
};
use futures::{
    sink::SinkExt,
    stream::{SplitSink, StreamExt},
};
use serde::Deserialize;
use std::sync::Arc;

use crate::protocol::{ClientMessage, ServerMessage, PROTOCOL_VERSION};
use crate::state::{AppState, SessionFollower};
use handlers::ClientContext;

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    pub session: String,
    pub role: Option<String>,
    pub player_id: Option<String>,
}

/// WebSocket upgrade handler
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<WsQuery>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    tracing::info!(
        "WebSocket connection request: session={}, role={:?}, player_id={:?}",
        params.session,
        params.role,
        params.player_id
    );

    ws.on_upgrade(move |socket| handle_socket(socket, params, state))
}

async fn send(sender: &mut SplitSink<WebSocket, Message>, msg: &ServerMessage) -> bool {
    match serde_json::to_string(msg) {
        Ok(json) => sender.send(Message::Text(json.into())).await.is_ok(),
        Err(e) => {
            tracing::error!("Failed to serialize server message: {}", e);
            true
        }
    }
}

/// Resolve who is connecting; players must already have joined the session
async fn client_context(state: &AppState, params: &WsQuery) -> Result<ClientContext, ServerMessage> {
    match params.role.as_deref() {
        Some("host") => {
            state.get_session(&params.session).await?;
            Ok(ClientContext::host(&params.session))
        }
        _ => {
            let Some(player_id) = params.player_id.as_deref() else {
                return Err(ServerMessage::Error {
                    code: "UNAUTHORIZED".to_string(),
                    msg: "player_id is required to join as a player".to_string(),
                });
            };
            state.get_session(&params.session).await?;
            state.get_player(&params.session, player_id).await?;
            Ok(ClientContext::player(&params.session, player_id))
        }
    }
}

/// Handle individual WebSocket connection
async fn handle_socket(socket: WebSocket, params: WsQuery, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();

    let ctx = match client_context(&state, &params).await {
        Ok(ctx) => ctx,
        Err(msg) => {
            tracing::info!("Refusing WebSocket for session {}: {:?}", params.session, msg);
            let _ = send(&mut sender, &msg).await;
            return;
        }
    };

    tracing::info!(
        "WebSocket connected to {} with role: {:?}",
        ctx.session_id,
        ctx.role
    );

    // Subscribe before the first read so nothing slips between them
    let mut follower =
        SessionFollower::new(state.as_ref().clone(), &ctx.session_id, ctx.role.clone().into())
            .await;

    let snapshot = match follower.prime().await {
        Ok(snapshot) => snapshot,
        Err(e) => {
            let _ = send(&mut sender, &ServerMessage::from(e)).await;
            return;
        }
    };

    let welcome = ServerMessage::Welcome {
        protocol: PROTOCOL_VERSION.to_string(),
        role: ctx.role.clone(),
        player_id: ctx.player_id.clone(),
        snapshot,
        server_now: chrono::Utc::now().to_rfc3339(),
    };
    if !send(&mut sender, &welcome).await {
        tracing::error!("Failed to send welcome message");
        return;
    }

    loop {
        tokio::select! {
            // Session changed (or the poll timer fired); re-read and push
            _ = follower.changed() => {
                match follower.refresh().await {
                    Ok(Some(snapshot)) => {
                        if !send(&mut sender, &ServerMessage::Snapshot { snapshot }).await {
                            break;
                        }
                    }
                    Ok(None) => {}
                    Err(e) if e.is_session_gone() => {
                        let _ = send(&mut sender, &ServerMessage::SessionClosed).await;
                        break;
                    }
                    Err(e) => {
                        // Client keeps its last snapshot; the next wake retries
                        tracing::warn!("Refresh of {} failed: {}", ctx.session_id, e);
                    }
                }
            }

            // Handle client messages
            ws_msg = receiver.next() => {
                match ws_msg {
                    Some(Ok(Message::Text(text))) => {
                        tracing::debug!("Received message: {}", text);

                        match serde_json::from_str::<ClientMessage>(&text) {
                            Ok(client_msg) => {
                                if let Some(response) =
                                    handlers::handle_message(client_msg, &ctx, &state).await
                                {
                                    let closed = matches!(response, ServerMessage::SessionClosed);
                                    if !send(&mut sender, &response).await {
                                        tracing::error!("Failed to send response");
                                        break;
                                    }
                                    if closed {
                                        break;
                                    }
                                }
                            }
                            Err(e) => {
                                tracing::error!("Failed to parse client message: {}", e);
                                let error = ServerMessage::Error {
                                    code: "PARSE_ERROR".to_string(),
                                    msg: format!("Invalid message format: {}", e),
                                };
                                let _ = send(&mut sender, &error).await;
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) => {
                        tracing::info!("WebSocket closed");
                        break;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::error!("WebSocket error: {}", e);
                        break;
                    }
                    None => break,
                }
            }
        }
    }

    tracing::info!(
        "WebSocket connection closed for {} in {}",
        ctx.player_id.as_deref().unwrap_or("host"),
        ctx.session_id
    );
}
