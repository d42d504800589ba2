use crate::models::SyncState;
use crate::services::{device_tracker, playback};
use crate::AppState;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use chrono::Utc;
use diesel::prelude::*;
use futures::{sink::SinkExt, stream::StreamExt};
use serde::{Deserialize, Serialize};

// Server → Device messages
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    #[serde(rename = "auth_response")]
    AuthResponse {
        success: bool,
        message: String,
        device_id: Option<i32>,
    },
    #[serde(rename = "playback")]
    Playback {
        evaluation: Option<playback::ScheduleEvaluation>,
    },
    #[serde(rename = "playlists_updated")]
    PlaylistsUpdated { timestamp: String },
    #[serde(rename = "heartbeat_ack")]
    HeartbeatAck,
}

// Device → Server messages
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum DeviceMessage {
    #[serde(rename = "authenticate")]
    Authenticate { device_id: i32, secret_key: String },
    #[serde(rename = "heartbeat")]
    Heartbeat {
        sync_state: SyncState,
        current_content_id: Option<i32>,
    },
    #[serde(rename = "request_playback")]
    RequestPlayback,
}

pub async fn ws_handler(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<ServerMessage>();

    // Shared with the receive task so disconnect cleanup sees who this was.
    let session_device = std::sync::Arc::new(std::sync::Mutex::new(None::<i32>));
    let session_device_recv = session_device.clone();

    let state_clone = state.clone();

    // Forward channel messages to the socket.
    let mut send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if let Ok(json) = serde_json::to_string(&msg) {
                if sender.send(Message::Text(json)).await.is_err() {
                    break;
                }
            }
        }
    });

    let mut recv_task = tokio::spawn(async move {
        let mut device_id: Option<i32> = None;
        let mut authenticated = false;

        while let Some(Ok(msg)) = receiver.next().await {
            if let Message::Text(text) = msg {
                if let Ok(device_msg) = serde_json::from_str::<DeviceMessage>(&text) {
                    match device_msg {
                        DeviceMessage::Authenticate {
                            device_id: claimed_id,
                            secret_key,
                        } => {
                            let auth_result =
                                authenticate_device(&state_clone, claimed_id, &secret_key).await;

                            match auth_result {
                                Ok(()) => {
                                    device_id = Some(claimed_id);
                                    authenticated = true;
                                    *session_device_recv.lock().unwrap() = Some(claimed_id);

                                    let _ = tx.send(ServerMessage::AuthResponse {
                                        success: true,
                                        message: "Authenticated successfully".to_string(),
                                        device_id: Some(claimed_id),
                                    });

                                    tracing::info!("Device {} authenticated", claimed_id);

                                    {
                                        let mut devices =
                                            state_clone.connected_devices.write().await;
                                        devices.insert(claimed_id, tx.clone());
                                    }

                                    // Fresh boot: the rotation epoch restarts.
                                    state_clone.rotations.write().await.remove(&claimed_id);
                                }
                                Err(e) => {
                                    let _ = tx.send(ServerMessage::AuthResponse {
                                        success: false,
                                        message: e,
                                        device_id: None,
                                    });
                                }
                            }
                        }
                        DeviceMessage::Heartbeat {
                            sync_state,
                            current_content_id,
                        } => {
                            if !authenticated {
                                tracing::warn!("Dropping heartbeat from unauthenticated socket");
                                continue;
                            }

                            if let Some(id) = device_id {
                                let now = Utc::now().naive_utc();
                                let recorded = {
                                    match state_clone.db.get() {
                                        Ok(mut conn) => device_tracker::record_heartbeat(
                                            &mut conn, id, sync_state, now,
                                        ),
                                        Err(_) => {
                                            tracing::error!("Database connection error");
                                            continue;
                                        }
                                    }
                                };

                                match recorded {
                                    Ok(()) => {
                                        let _ = tx.send(ServerMessage::HeartbeatAck);

                                        tracing::debug!(
                                            "Device {} heartbeat: sync={:?}, content={:?}",
                                            id,
                                            sync_state,
                                            current_content_id
                                        );

                                        send_playback(&state_clone, id, &tx).await;
                                    }
                                    Err(e) => {
                                        tracing::warn!("Rejected heartbeat: {}", e);
                                    }
                                }
                            }
                        }
                        DeviceMessage::RequestPlayback => {
                            if authenticated {
                                if let Some(id) = device_id {
                                    send_playback(&state_clone, id, &tx).await;
                                }
                            }
                        }
                    }
                }
            }
        }
    });

    tokio::select! {
        _ = (&mut send_task) => {
            recv_task.abort();
        }
        _ = (&mut recv_task) => {
            send_task.abort();
        }
    }

    // Clean up: mark device offline and deregister.
    let disconnected = *session_device.lock().unwrap();
    if let Some(id) = disconnected {
        let _ = mark_device_offline(&state, id);
        {
            let mut devices = state.connected_devices.write().await;
            devices.remove(&id);
        }
        tracing::info!("Device {} disconnected", id);
    }
}

async fn send_playback(
    state: &AppState,
    device_id: i32,
    tx: &tokio::sync::mpsc::UnboundedSender<ServerMessage>,
) {
    let now = Utc::now().naive_utc();
    match playback::evaluate(state, device_id, now).await {
        Ok(evaluation) => {
            let _ = tx.send(ServerMessage::Playback { evaluation });
        }
        Err(e) => {
            tracing::error!(
                "Playback evaluation failed for device {}: {}",
                device_id,
                e
            );
        }
    }
}

async fn authenticate_device(
    state: &AppState,
    device_id: i32,
    secret_key: &str,
) -> Result<(), String> {
    use crate::schema::devices::dsl;

    let mut conn = state
        .db
        .get()
        .map_err(|_| "Database connection error".to_string())?;

    let device = dsl::devices
        .filter(dsl::id.eq(device_id))
        .filter(dsl::secret_key.eq(secret_key))
        .select(crate::models::Device::as_select())
        .first(&mut conn)
        .map_err(|_| "Invalid credentials".to_string())?;

    // Connection time is the boot instant, which anchors the rotation epoch.
    let now = Utc::now().naive_utc();
    diesel::update(dsl::devices.filter(dsl::id.eq(device.id)))
        .set((
            dsl::status.eq("online"),
            dsl::last_heartbeat.eq(now),
            dsl::booted_at.eq(now),
        ))
        .execute(&mut conn)
        .map_err(|_| "Failed to update device status".to_string())?;

    Ok(())
}

fn mark_device_offline(state: &AppState, device_id: i32) -> Result<(), String> {
    use crate::schema::devices::dsl;

    let mut conn = state
        .db
        .get()
        .map_err(|_| "Database connection error".to_string())?;

    diesel::update(dsl::devices.filter(dsl::id.eq(device_id)))
        .set(dsl::status.eq("offline"))
        .execute(&mut conn)
        .map_err(|_| "Failed to mark device offline".to_string())?;

    Ok(())
}
