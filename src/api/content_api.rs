use crate::models::{ContentItem, NewContentItem};
use crate::services::playback;
use crate::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use diesel::prelude::*;

pub async fn list_content(
    State(state): State<AppState>,
) -> Result<Json<Vec<ContentItem>>, StatusCode> {
    use crate::schema::content_items::dsl::*;

    let mut conn = state
        .db
        .get()
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    let results = content_items
        .select(ContentItem::as_select())
        .load(&mut conn)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    Ok(Json(results))
}

pub async fn create_content(
    State(state): State<AppState>,
    Json(new_item): Json<NewContentItem>,
) -> Result<Json<ContentItem>, StatusCode> {
    use crate::schema::content_items;

    let mut conn = state
        .db
        .get()
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    let item = diesel::insert_into(content_items::table)
        .values(&new_item)
        .returning(ContentItem::as_select())
        .get_result(&mut conn)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    Ok(Json(item))
}

pub async fn update_content(
    State(state): State<AppState>,
    Path(item_id): Path<i32>,
    Json(updates): Json<NewContentItem>,
) -> Result<Json<ContentItem>, StatusCode> {
    use crate::schema::content_items::dsl::*;

    let mut conn = state
        .db
        .get()
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    let item = diesel::update(content_items.filter(id.eq(item_id)))
        .set((
            title.eq(updates.title),
            kind.eq(updates.kind),
            byte_size.eq(updates.byte_size),
            storage_path.eq(updates.storage_path),
            duration_secs.eq(updates.duration_secs),
            updated_at.eq(chrono::Utc::now().naive_utc()),
        ))
        .returning(ContentItem::as_select())
        .get_result(&mut conn)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    playback::notify_account_devices(&state, item.account_id).await;

    Ok(Json(item))
}

/// Deletes a content item and every playlist reference to it in one
/// transaction, so playlists never hold dangling item references.
pub async fn delete_content(
    State(state): State<AppState>,
    Path(item_id): Path<i32>,
) -> Result<StatusCode, StatusCode> {
    use crate::schema::{content_items, playlist_items, playlists};

    let mut conn = state
        .db
        .get()
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    let owner: Option<i32> = content_items::table
        .filter(content_items::id.eq(item_id))
        .select(content_items::account_id)
        .first(&mut conn)
        .optional()
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    let Some(owner) = owner else {
        return Err(StatusCode::NOT_FOUND);
    };

    conn.transaction::<_, diesel::result::Error, _>(|conn| {
        // Playlists losing an item count as edited.
        let affected: Vec<i32> = playlist_items::table
            .filter(playlist_items::content_id.eq(item_id))
            .select(playlist_items::playlist_id)
            .distinct()
            .load(conn)?;

        diesel::delete(playlist_items::table.filter(playlist_items::content_id.eq(item_id)))
            .execute(conn)?;

        if !affected.is_empty() {
            diesel::update(playlists::table.filter(playlists::id.eq_any(&affected)))
                .set(playlists::updated_at.eq(chrono::Utc::now().naive_utc()))
                .execute(conn)?;
        }

        diesel::delete(content_items::table.filter(content_items::id.eq(item_id))).execute(conn)?;

        Ok(())
    })
    .map_err(|e| {
        tracing::error!("Failed to delete content item {}: {}", item_id, e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    playback::notify_account_devices(&state, owner).await;

    Ok(StatusCode::NO_CONTENT)
}
