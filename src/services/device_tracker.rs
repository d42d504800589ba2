use crate::models::{DeviceStatus, SyncState};
use crate::AppState;
use chrono::{Duration, NaiveDateTime, Utc};
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use tokio::time::interval;

#[derive(Debug, thiserror::Error)]
pub enum TrackerError {
    #[error("unknown device {0}")]
    UnknownDevice(i32),
    #[error(transparent)]
    Database(#[from] diesel::result::Error),
}

/// Classifies a device from its last heartbeat and its sync signal.
///
/// A device that never reported, or whose heartbeat is older than the
/// freshness window, is offline. Staleness dominates the sync signal: a stale
/// device classifies offline even if its last heartbeat claimed a sync was in
/// flight. Within the window, an in-flight sync classifies as syncing.
pub fn classify(
    last_heartbeat: Option<NaiveDateTime>,
    sync_in_flight: bool,
    now: NaiveDateTime,
    freshness: Duration,
) -> DeviceStatus {
    let Some(seen) = last_heartbeat else {
        return DeviceStatus::Offline;
    };

    if now - seen > freshness {
        return DeviceStatus::Offline;
    }

    if sync_in_flight {
        DeviceStatus::Syncing
    } else {
        DeviceStatus::Online
    }
}

/// Records an inbound heartbeat. Each device's stream is independent; one row
/// is updated per message. An unknown device id mutates nothing.
pub fn record_heartbeat(
    conn: &mut SqliteConnection,
    device_id: i32,
    sync_state: SyncState,
    now: NaiveDateTime,
) -> Result<(), TrackerError> {
    use crate::schema::devices::dsl;

    let status = match sync_state {
        SyncState::Syncing => DeviceStatus::Syncing,
        SyncState::Idle => DeviceStatus::Online,
    };

    let updated = diesel::update(dsl::devices.filter(dsl::id.eq(device_id)))
        .set((
            dsl::status.eq(status.as_str()),
            dsl::last_heartbeat.eq(now),
            dsl::updated_at.eq(now),
        ))
        .execute(conn)?;

    if updated == 0 {
        return Err(TrackerError::UnknownDevice(device_id));
    }

    Ok(())
}

/// Periodic staleness sweep: devices stop being online when their heartbeats
/// stop arriving, even though heartbeats are push-based.
pub async fn run(state: AppState) {
    let mut tick = interval(std::time::Duration::from_secs(
        state.config.devices.sweep_interval_secs,
    ));

    loop {
        tick.tick().await;

        if let Err(e) = sweep_stale(&state) {
            tracing::error!("Device staleness sweep error: {}", e);
        }
    }
}

fn sweep_stale(state: &AppState) -> Result<(), String> {
    use crate::schema::devices::dsl;

    let mut conn = state
        .db
        .get()
        .map_err(|_| "Database connection error".to_string())?;

    let threshold =
        Utc::now().naive_utc() - Duration::seconds(state.config.devices.freshness_window_secs);

    let offline_count = diesel::update(
        dsl::devices
            .filter(dsl::status.eq_any(vec!["online", "syncing"]))
            .filter(dsl::last_heartbeat.lt(threshold)),
    )
    .set(dsl::status.eq(DeviceStatus::Offline.as_str()))
    .execute(&mut conn)
    .map_err(|e| e.to_string())?;

    if offline_count > 0 {
        tracing::warn!("Marked {} unresponsive devices as offline", offline_count);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn dt(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 8, 24)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    fn freshness() -> Duration {
        Duration::seconds(90)
    }

    #[test]
    fn fresh_heartbeat_is_online() {
        let status = classify(Some(dt(12, 0, 0)), false, dt(12, 1, 0), freshness());
        assert_eq!(status, DeviceStatus::Online);
    }

    #[test]
    fn fresh_heartbeat_with_sync_in_flight_is_syncing() {
        let status = classify(Some(dt(12, 0, 0)), true, dt(12, 0, 30), freshness());
        assert_eq!(status, DeviceStatus::Syncing);
    }

    #[test]
    fn never_reported_is_offline() {
        assert_eq!(
            classify(None, false, dt(12, 0, 0), freshness()),
            DeviceStatus::Offline
        );
    }

    #[test]
    fn online_device_goes_offline_once_window_elapses() {
        let seen = dt(12, 0, 0);
        // Exactly at the window edge still counts as online.
        assert_eq!(
            classify(Some(seen), false, dt(12, 1, 30), freshness()),
            DeviceStatus::Online
        );
        assert_eq!(
            classify(Some(seen), false, dt(12, 1, 31), freshness()),
            DeviceStatus::Offline
        );
    }

    #[test]
    fn staleness_dominates_sync_signal() {
        let status = classify(Some(dt(12, 0, 0)), true, dt(12, 10, 0), freshness());
        assert_eq!(status, DeviceStatus::Offline);
    }

    #[test]
    fn unknown_device_heartbeat_is_rejected_without_mutation() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("tracker.db");
        let mut conn =
            SqliteConnection::establish(db_path.to_str().unwrap()).unwrap();
        crate::db::run_migrations(&mut conn).unwrap();

        let err = record_heartbeat(&mut conn, 42, SyncState::Idle, dt(12, 0, 0)).unwrap_err();
        assert!(matches!(err, TrackerError::UnknownDevice(42)));
    }

    #[test]
    fn heartbeat_updates_status_and_timestamp() {
        use crate::schema::{accounts, devices};

        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("tracker.db");
        let mut conn =
            SqliteConnection::establish(db_path.to_str().unwrap()).unwrap();
        crate::db::run_migrations(&mut conn).unwrap();

        diesel::insert_into(accounts::table)
            .values(crate::models::NewAccount {
                name: "default".to_string(),
            })
            .execute(&mut conn)
            .unwrap();

        let device: crate::models::Device = diesel::insert_into(devices::table)
            .values(crate::models::NewDevice {
                account_id: 1,
                name: "lobby screen".to_string(),
                secret_key: "secret".to_string(),
                status: "offline".to_string(),
            })
            .returning(crate::models::Device::as_select())
            .get_result(&mut conn)
            .unwrap();

        let now = dt(12, 0, 0);
        record_heartbeat(&mut conn, device.id, SyncState::Syncing, now).unwrap();

        let reloaded: crate::models::Device = devices::table
            .filter(devices::id.eq(device.id))
            .select(crate::models::Device::as_select())
            .first(&mut conn)
            .unwrap();

        assert_eq!(reloaded.status, "syncing");
        assert_eq!(reloaded.last_heartbeat, Some(now));
    }
}
