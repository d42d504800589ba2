pub mod accounts_api;
pub mod content_api;
pub mod devices_api;
pub mod pairing_api;
pub mod playlists_api;

use crate::AppState;
use axum::{
    routing::{delete, get, post, put},
    Router,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        // Accounts
        .route("/accounts", get(accounts_api::list_accounts))
        .route("/accounts", post(accounts_api::create_account))
        // Playlists
        .route("/playlists", get(playlists_api::list_playlists))
        .route("/playlists", post(playlists_api::create_playlist))
        .route("/playlists/warnings", get(playlists_api::playlist_warnings))
        .route("/playlists/:id", put(playlists_api::update_playlist))
        .route("/playlists/:id", delete(playlists_api::delete_playlist))
        .route(
            "/playlists/:id/items",
            get(playlists_api::get_playlist_items),
        )
        .route(
            "/playlists/:id/items",
            put(playlists_api::set_playlist_items),
        )
        // Content
        .route("/content", get(content_api::list_content))
        .route("/content", post(content_api::create_content))
        .route("/content/:id", put(content_api::update_content))
        .route("/content/:id", delete(content_api::delete_content))
        // Devices
        .route("/devices", get(devices_api::list_devices))
        .route("/devices/link", post(devices_api::link_device))
        .route(
            "/devices/:id",
            delete(devices_api::delete_device).put(devices_api::update_device),
        )
        // Device-facing: poll playback, guarded by the per-device secret.
        .route(
            "/devices/:id/playback",
            get(devices_api::get_device_playback),
        )
        // Pairing: public by design, the code is the credential.
        .route("/pairing/redeem", post(pairing_api::redeem))
}
