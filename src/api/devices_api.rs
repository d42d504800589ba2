use crate::models::{Device, DeviceStatus};
use crate::services::{device_tracker, pairing, playback};
use crate::AppState;
use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use chrono::NaiveDateTime;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

/// Device as the dashboard sees it: status is classified from heartbeat
/// staleness at read time, not read back verbatim from the row.
#[derive(Serialize)]
pub struct DeviceView {
    pub id: i32,
    pub account_id: i32,
    pub name: String,
    pub status: DeviceStatus,
    pub last_heartbeat: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl DeviceView {
    fn classify(device: Device, now: NaiveDateTime, freshness: chrono::Duration) -> Self {
        let sync_in_flight = device.status == "syncing";
        let status =
            device_tracker::classify(device.last_heartbeat, sync_in_flight, now, freshness);

        DeviceView {
            id: device.id,
            account_id: device.account_id,
            name: device.name,
            status,
            last_heartbeat: device.last_heartbeat,
            created_at: device.created_at,
            updated_at: device.updated_at,
        }
    }
}

pub async fn list_devices(
    State(state): State<AppState>,
) -> Result<Json<Vec<DeviceView>>, StatusCode> {
    use crate::schema::devices::dsl::*;

    let mut conn = state
        .db
        .get()
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    let results: Vec<Device> = devices
        .select(Device::as_select())
        .load(&mut conn)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    let now = chrono::Utc::now().naive_utc();
    let freshness = chrono::Duration::seconds(state.config.devices.freshness_window_secs);

    let views = results
        .into_iter()
        .map(|d| DeviceView::classify(d, now, freshness))
        .collect();

    Ok(Json(views))
}

#[derive(Deserialize)]
pub struct UpdateDeviceRequest {
    pub name: Option<String>,
}

pub async fn update_device(
    State(state): State<AppState>,
    Path(device_id): Path<i32>,
    Json(req): Json<UpdateDeviceRequest>,
) -> Result<Json<Device>, StatusCode> {
    use crate::schema::devices::dsl::*;

    let mut conn = state
        .db
        .get()
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    if let Some(new_name) = &req.name {
        let updated_device = diesel::update(devices.filter(id.eq(device_id)))
            .set((
                name.eq(new_name),
                updated_at.eq(chrono::Utc::now().naive_utc()),
            ))
            .returning(Device::as_select())
            .get_result(&mut conn)
            .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
        Ok(Json(updated_device))
    } else {
        let device = devices
            .filter(id.eq(device_id))
            .select(Device::as_select())
            .first(&mut conn)
            .map_err(|_| StatusCode::NOT_FOUND)?;
        Ok(Json(device))
    }
}

pub async fn delete_device(
    State(state): State<AppState>,
    Path(device_id): Path<i32>,
) -> Result<StatusCode, StatusCode> {
    use crate::schema::devices::dsl::*;

    let mut conn = state
        .db
        .get()
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    diesel::delete(devices.filter(id.eq(device_id)))
        .execute(&mut conn)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    state.rotations.write().await.remove(&device_id);
    state.connected_devices.write().await.remove(&device_id);

    Ok(StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
pub struct LinkDeviceRequest {
    pub account_id: i32,
    pub name: String,
}

#[derive(Serialize)]
pub struct LinkDeviceResponse {
    pub code: String,
    pub expires_at: NaiveDateTime,
}

/// Issues a short-lived pairing code for the dashboard's link-device modal.
/// The physical device redeems it once via /pairing/redeem.
pub async fn link_device(
    State(state): State<AppState>,
    Json(req): Json<LinkDeviceRequest>,
) -> Result<Json<LinkDeviceResponse>, StatusCode> {
    let mut conn = state
        .db
        .get()
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    if req.name.trim().is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }

    let ttl = chrono::Duration::minutes(state.config.pairing.code_ttl_minutes);
    let now = chrono::Utc::now().naive_utc();

    let pairing = pairing::create_pairing_code(&mut conn, req.account_id, &req.name, ttl, now)
        .map_err(|e| {
            tracing::error!("Failed to create pairing code: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?;

    Ok(Json(LinkDeviceResponse {
        code: pairing.code,
        expires_at: pairing.expires_at,
    }))
}

#[derive(Serialize)]
pub struct PlaybackResponse {
    pub evaluation: Option<playback::ScheduleEvaluation>,
}

/// Device-facing poll endpoint: what should this device render right now.
/// Authorized by the per-device secret issued at pairing.
pub async fn get_device_playback(
    State(state): State<AppState>,
    Path(device_id): Path<i32>,
    headers: HeaderMap,
) -> Result<Json<PlaybackResponse>, StatusCode> {
    use crate::schema::devices::dsl::*;

    {
        let mut conn = state
            .db
            .get()
            .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

        let stored_secret: Option<String> = devices
            .filter(id.eq(device_id))
            .select(secret_key)
            .first(&mut conn)
            .optional()
            .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

        let presented = headers
            .get("X-Device-Secret")
            .and_then(|h| h.to_str().ok());

        match (stored_secret, presented) {
            (Some(stored), Some(given)) if stored == given => {}
            _ => return Err(StatusCode::UNAUTHORIZED),
        }
    }

    let now = chrono::Utc::now().naive_utc();
    let evaluation = playback::evaluate(&state, device_id, now).await.map_err(|e| {
        tracing::error!("Playback evaluation failed for device {}: {}", device_id, e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    Ok(Json(PlaybackResponse { evaluation }))
}
