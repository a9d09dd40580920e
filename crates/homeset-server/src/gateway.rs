use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use homeset_types::events::BridgeCommand;

use crate::routes::AppState;

/// Server sends a Ping this often; two missed Pongs drop the bridge.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

const IDENTIFY_TIMEOUT: Duration = Duration::from_secs(10);

pub async fn bridge_upgrade(
    State(state): State<AppState>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_bridge(socket, state))
}

/// Serve one game host connection until either side goes away.
pub async fn handle_bridge(socket: WebSocket, state: AppState) {
    let (sender, mut receiver) = socket.split();

    if let Some(token) = state.bridge_token.as_deref() {
        if !wait_for_identify(&mut receiver, token).await {
            warn!("Bridge client failed to identify, closing");
            return;
        }
    }

    let open = state.bridge_connections.fetch_add(1, Ordering::AcqRel) + 1;
    info!(connections = open, "Bridge connected");

    run_bridge_loop(sender, receiver, state.clone()).await;

    let remaining = state.bridge_connections.fetch_sub(1, Ordering::AcqRel) - 1;
    if remaining == 0 {
        // Without a game host nobody is online any more.
        let dropped = state.bridge.drop_all_players();
        for user in &dropped {
            state.service.on_disconnect(*user).await;
        }
        info!(players = dropped.len(), "Last bridge disconnected, players dropped");
    } else {
        info!(connections = remaining, "Bridge disconnected");
    }
}

async fn run_bridge_loop(
    mut sender: SplitSink<WebSocket, Message>,
    mut receiver: SplitStream<WebSocket>,
    state: AppState,
) {
    let mut events_rx = state.bridge.subscribe();

    let pong_received = Arc::new(AtomicBool::new(true));
    let pong_flag_send = pong_received.clone();
    let pong_flag_recv = pong_received;

    let mut send_task = tokio::spawn(async move {
        let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
        heartbeat.tick().await;
        let mut missed_heartbeats: u8 = 0;

        loop {
            tokio::select! {
                result = events_rx.recv() => {
                    let event = match result {
                        Ok(event) => event,
                        Err(RecvError::Lagged(n)) => {
                            warn!("Bridge receiver lagged by {} events", n);
                            continue;
                        }
                        Err(RecvError::Closed) => break,
                    };

                    let text = match serde_json::to_string(&event) {
                        Ok(text) => text,
                        Err(e) => {
                            warn!(user = %event.user_id(), "Failed to encode bridge event: {}", e);
                            continue;
                        }
                    };
                    if sender.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                _ = heartbeat.tick() => {
                    if pong_flag_send.swap(false, Ordering::Acquire) {
                        missed_heartbeats = 0;
                    } else {
                        missed_heartbeats += 1;
                        if missed_heartbeats >= 2 {
                            warn!("Bridge heartbeat timeout (missed {} pongs), dropping connection", missed_heartbeats);
                            break;
                        }
                    }
                    if sender.send(Message::Ping(Vec::new().into())).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    let recv_state = state.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => match serde_json::from_str::<BridgeCommand>(&text) {
                    Ok(cmd) => handle_command(&recv_state, cmd).await,
                    Err(e) => {
                        warn!("Bad bridge command: {} -- raw: {}", e, log_excerpt(&text));
                    }
                },
                Message::Pong(_) => {
                    pong_flag_recv.store(true, Ordering::Release);
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }
}

const LOG_EXCERPT_CHARS: usize = 200;

/// At most the first 200 characters of `text`, cut on a char boundary.
fn log_excerpt(text: &str) -> &str {
    match text.char_indices().nth(LOG_EXCERPT_CHARS) {
        Some((end, _)) => &text[..end],
        None => text,
    }
}

async fn wait_for_identify(receiver: &mut SplitStream<WebSocket>, expected: &str) -> bool {
    let identified = tokio::time::timeout(IDENTIFY_TIMEOUT, async {
        while let Some(Ok(msg)) = receiver.next().await {
            if let Message::Text(text) = msg {
                if let Ok(BridgeCommand::Identify { token }) =
                    serde_json::from_str::<BridgeCommand>(&text)
                {
                    return token == expected;
                }
            }
        }
        false
    });

    identified.await.unwrap_or(false)
}

/// Apply one game host event to the tracked world state and the service.
pub async fn handle_command(state: &AppState, cmd: BridgeCommand) {
    let bridge = &state.bridge;
    let service = &state.service;

    match cmd {
        BridgeCommand::Identify { .. } => {} // Already handled

        BridgeCommand::PlayerJoin { user_id, location } => {
            debug!(user = %user_id, world = %location.world, "Player joined");
            bridge.player_joined(user_id, location);
        }

        BridgeCommand::PlayerMove { user_id, from, to } => {
            bridge.player_moved(user_id, to.clone());
            service.on_move(user_id, &from, &to).await;
        }

        BridgeCommand::PlayerDamage { user_id, amount } => {
            service.on_damage(user_id, amount).await;
        }

        BridgeCommand::PlayerQuit { user_id } => {
            bridge.player_quit(user_id);
            service.on_disconnect(user_id).await;
            debug!(user = %user_id, online = bridge.online_count(), "Player quit");
        }

        BridgeCommand::WorldLoaded { world } => {
            info!(%world, "World loaded");
            bridge.world_loaded(world);
        }

        BridgeCommand::WorldUnloaded { world } => {
            info!(%world, "World unloaded");
            bridge.world_unloaded(&world);
        }
    }
}
