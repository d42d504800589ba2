use crate::models::{ContentItem, Device, Playlist, PlaylistItem};
use crate::services::rotation::{self, Rotation};
use crate::services::schedule_resolver;
use crate::websocket::ServerMessage;
use crate::AppState;
use anyhow::Result;
use chrono::NaiveDateTime;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

/// What a paired device should render next. Derived, never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleEvaluation {
    pub device_id: i32,
    pub playlist_id: i32,
    pub playlist_name: String,
    pub active_content_item: ContentItem,
    pub slot_start_time: NaiveDateTime,
    pub slot_duration_secs: i64,
}

/// Resolves "what should this device display at `now`".
///
/// Loads a snapshot of the device's account playlists, runs the schedule
/// resolver, and advances the device's rotation ring. `Ok(None)` is the idle
/// state: no active playlist, or an active playlist with no items.
///
/// The rotation epoch is the device's boot time; switching to a different
/// active playlist restarts the ring at the activation instant.
pub async fn evaluate(
    state: &AppState,
    device_id: i32,
    now: NaiveDateTime,
) -> Result<Option<ScheduleEvaluation>> {
    use crate::schema::{content_items, devices, playlist_items, playlists};

    let mut conn = state.db.get()?;

    let device: Device = devices::table
        .filter(devices::id.eq(device_id))
        .select(Device::as_select())
        .first(&mut conn)
        .optional()?
        .ok_or_else(|| anyhow::anyhow!("unknown device {}", device_id))?;

    let account_playlists: Vec<Playlist> = playlists::table
        .filter(playlists::account_id.eq(device.account_id))
        .select(Playlist::as_select())
        .load(&mut conn)?;

    let resolution = schedule_resolver::resolve_active_playlist(&account_playlists, now);

    let Some(active) = resolution.active else {
        state.rotations.write().await.remove(&device_id);
        return Ok(None);
    };

    let items: Vec<PlaylistItem> = playlist_items::table
        .filter(playlist_items::playlist_id.eq(active.id))
        .select(PlaylistItem::as_select())
        .load(&mut conn)?;

    let content_ids: Vec<i32> = items.iter().map(|i| i.content_id).collect();
    let content: Vec<ContentItem> = content_items::table
        .filter(content_items::id.eq_any(content_ids))
        .select(ContentItem::as_select())
        .load(&mut conn)?;

    let resolved = rotation::resolve_items(active, &items, &content);

    let slot = {
        let mut rotations = state.rotations.write().await;

        let keep_ring = rotations
            .get(&device_id)
            .map(|r| r.playlist_id() == active.id)
            .unwrap_or(false);

        if keep_ring {
            let rotation = rotations.get_mut(&device_id).unwrap();
            rotation.replace_items(resolved, now);
            rotation.slot_at(now)
        } else {
            let epoch = if rotations.contains_key(&device_id) {
                // A different playlist took over: restart at activation.
                now
            } else {
                device.booted_at.unwrap_or(now)
            };
            let mut rotation = Rotation::new(active.id, resolved, epoch);
            let slot = rotation.slot_at(now);
            rotations.insert(device_id, rotation);
            slot
        }
    };

    let Some(slot) = slot else {
        return Ok(None);
    };

    let item = content
        .into_iter()
        .find(|c| c.id == slot.content_id)
        .ok_or_else(|| anyhow::anyhow!("slot references missing content {}", slot.content_id))?;

    Ok(Some(ScheduleEvaluation {
        device_id,
        playlist_id: active.id,
        playlist_name: active.name.clone(),
        active_content_item: item,
        slot_start_time: slot.started_at,
        slot_duration_secs: slot.duration_secs,
    }))
}

/// Pushes a playlists-updated notice to every connected device of an account.
/// Called after playlist/content mutations so devices re-request playback.
pub async fn notify_account_devices(state: &AppState, account_id: i32) {
    use crate::schema::devices::dsl;

    let device_ids: Vec<i32> = {
        let mut conn = match state.db.get() {
            Ok(c) => c,
            Err(e) => {
                tracing::error!("Failed to load devices for notification: {}", e);
                return;
            }
        };

        match dsl::devices
            .filter(dsl::account_id.eq(account_id))
            .select(dsl::id)
            .load(&mut conn)
        {
            Ok(ids) => ids,
            Err(e) => {
                tracing::error!("Failed to load devices for notification: {}", e);
                return;
            }
        }
    };

    let connected = state.connected_devices.read().await;
    for id in device_ids {
        if let Some(tx) = connected.get(&id) {
            let _ = tx.send(ServerMessage::PlaylistsUpdated {
                timestamp: chrono::Utc::now().to_rfc3339(),
            });
        }
    }
}
