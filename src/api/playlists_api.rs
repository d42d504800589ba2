use crate::models::{NewPlaylist, NewPlaylistItem, Playlist, PlaylistItem, UpdatePlaylist};
use crate::services::playback;
use crate::services::schedule_resolver::ScheduleWarning;
use crate::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use diesel::prelude::*;
use serde::Deserialize;

pub async fn list_playlists(
    State(state): State<AppState>,
) -> Result<Json<Vec<Playlist>>, StatusCode> {
    use crate::schema::playlists::dsl::*;

    let mut conn = state
        .db
        .get()
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    let results = playlists
        .select(Playlist::as_select())
        .load(&mut conn)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    Ok(Json(results))
}

pub async fn create_playlist(
    State(state): State<AppState>,
    Json(new_playlist): Json<NewPlaylist>,
) -> Result<Json<Playlist>, StatusCode> {
    use crate::schema::playlists;

    let mut conn = state
        .db
        .get()
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    if new_playlist.default_item_duration_secs <= 0 {
        return Err(StatusCode::BAD_REQUEST);
    }

    let playlist = diesel::insert_into(playlists::table)
        .values(&new_playlist)
        .returning(Playlist::as_select())
        .get_result(&mut conn)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    playback::notify_account_devices(&state, playlist.account_id).await;

    Ok(Json(playlist))
}

pub async fn update_playlist(
    State(state): State<AppState>,
    Path(playlist_id): Path<i32>,
    Json(updates): Json<UpdatePlaylist>,
) -> Result<Json<Playlist>, StatusCode> {
    use crate::schema::playlists::dsl::*;

    let mut conn = state
        .db
        .get()
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    if let Some(secs) = updates.default_item_duration_secs {
        if secs <= 0 {
            return Err(StatusCode::BAD_REQUEST);
        }
    }

    // updated_at is the resolver's tie-break key; every edit bumps it.
    let playlist = diesel::update(playlists.filter(id.eq(playlist_id)))
        .set((&updates, updated_at.eq(chrono::Utc::now().naive_utc())))
        .returning(Playlist::as_select())
        .get_result(&mut conn)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    playback::notify_account_devices(&state, playlist.account_id).await;

    Ok(Json(playlist))
}

pub async fn delete_playlist(
    State(state): State<AppState>,
    Path(playlist_id): Path<i32>,
) -> Result<StatusCode, StatusCode> {
    use crate::schema::playlists::dsl::*;

    let mut conn = state
        .db
        .get()
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    let owner: Option<i32> = playlists
        .filter(id.eq(playlist_id))
        .select(account_id)
        .first(&mut conn)
        .optional()
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    diesel::delete(playlists.filter(id.eq(playlist_id)))
        .execute(&mut conn)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    if let Some(owner) = owner {
        playback::notify_account_devices(&state, owner).await;
    }

    Ok(StatusCode::NO_CONTENT)
}

pub async fn get_playlist_items(
    State(state): State<AppState>,
    Path(query_playlist_id): Path<i32>,
) -> Result<Json<Vec<PlaylistItem>>, StatusCode> {
    use crate::schema::playlist_items::dsl::*;

    let mut conn = state
        .db
        .get()
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    let items = playlist_items
        .filter(playlist_id.eq(query_playlist_id))
        .order(position.asc())
        .select(PlaylistItem::as_select())
        .load(&mut conn)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    Ok(Json(items))
}

#[derive(Deserialize)]
pub struct PlaylistItemSpec {
    pub content_id: i32,
    pub duration_secs: Option<i32>,
}

/// Replaces a playlist's ordered item list in one transaction. Position is
/// the index in the submitted array.
pub async fn set_playlist_items(
    State(state): State<AppState>,
    Path(target_playlist_id): Path<i32>,
    Json(specs): Json<Vec<PlaylistItemSpec>>,
) -> Result<Json<Vec<PlaylistItem>>, StatusCode> {
    use crate::schema::{content_items, playlist_items, playlists};

    let mut conn = state
        .db
        .get()
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    let playlist: Playlist = playlists::table
        .filter(playlists::id.eq(target_playlist_id))
        .select(Playlist::as_select())
        .first(&mut conn)
        .optional()
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
        .ok_or(StatusCode::NOT_FOUND)?;

    // Items may only reference the owning account's content.
    let referenced: Vec<i32> = specs.iter().map(|s| s.content_id).collect();
    let known: i64 = content_items::table
        .filter(content_items::id.eq_any(&referenced))
        .filter(content_items::account_id.eq(playlist.account_id))
        .count()
        .get_result(&mut conn)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    let mut distinct = referenced.clone();
    distinct.sort();
    distinct.dedup();
    if known != distinct.len() as i64 {
        return Err(StatusCode::BAD_REQUEST);
    }

    let items = conn
        .transaction::<Vec<PlaylistItem>, diesel::result::Error, _>(|conn| {
            diesel::delete(
                playlist_items::table.filter(playlist_items::playlist_id.eq(target_playlist_id)),
            )
            .execute(conn)?;

            let mut inserted = Vec::with_capacity(specs.len());
            for (i, spec) in specs.iter().enumerate() {
                let new_item = NewPlaylistItem {
                    playlist_id: target_playlist_id,
                    content_id: spec.content_id,
                    position: i as i32,
                    duration_secs: spec.duration_secs,
                };

                let item = diesel::insert_into(playlist_items::table)
                    .values(&new_item)
                    .returning(PlaylistItem::as_select())
                    .get_result(conn)?;
                inserted.push(item);
            }

            diesel::update(playlists::table.filter(playlists::id.eq(target_playlist_id)))
                .set(playlists::updated_at.eq(chrono::Utc::now().naive_utc()))
                .execute(conn)?;

            Ok(inserted)
        })
        .map_err(|e| {
            tracing::error!("Failed to replace playlist items: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?;

    playback::notify_account_devices(&state, playlist.account_id).await;

    Ok(Json(items))
}

/// Configuration warnings for the dashboard: playlists whose stored recurrence
/// cannot be resolved. These are excluded from scheduling until fixed.
pub async fn playlist_warnings(
    State(state): State<AppState>,
) -> Result<Json<Vec<ScheduleWarning>>, StatusCode> {
    use crate::schema::playlists::dsl::*;

    let mut conn = state
        .db
        .get()
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    let all: Vec<Playlist> = playlists
        .select(Playlist::as_select())
        .load(&mut conn)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    let warnings = all
        .iter()
        .filter_map(|p| {
            p.recurrence().err().map(|e| ScheduleWarning {
                playlist_id: p.id,
                playlist_name: p.name.clone(),
                problem: e.to_string(),
            })
        })
        .collect();

    Ok(Json(warnings))
}
