//! Room registry and membership handlers

use super::require_user;
use crate::config::AppState;
use crate::error::{ChatError, Result};
use crate::models::{CreateRoomInput, Room};
use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    Json,
};
use serde::Deserialize;
use tracing::info;

#[derive(Debug, Deserialize)]
pub struct ListRoomsQuery {
    /// `joined`, `available`, or absent for all rooms
    pub filter: Option<String>,
}

/// GET /rooms
pub async fn list_rooms(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<ListRoomsQuery>,
) -> Result<Json<Vec<Room>>> {
    let user = require_user(&state, &headers).await?;

    let rooms = match query.filter.as_deref() {
        None => state.store.list_rooms().await,
        Some("joined") => state.store.list_joined(&user.id).await,
        Some("available") => state.store.list_available(&user.id).await,
        Some(other) => {
            return Err(ChatError::Validation(format!(
                "unknown room filter '{}'",
                other
            )))
        }
    };

    Ok(Json(rooms))
}

/// POST /rooms
pub async fn create_room(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(input): Json<CreateRoomInput>,
) -> Result<Json<Room>> {
    let user = require_user(&state, &headers).await?;
    info!("POST /rooms - {} by {}", input.name, user.id);

    let room = state
        .store
        .create_room(&input.name, &input.topic, &input.description, &user.id)
        .await?;

    Ok(Json(room))
}

/// POST /rooms/{room_id}/join
pub async fn join_room(
    Path(room_id): Path<String>,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Room>> {
    let user = require_user(&state, &headers).await?;
    info!("POST /rooms/{}/join - {}", room_id, user.id);

    let room = state.store.join(&room_id, &user.id).await?;
    Ok(Json(room))
}

/// POST /rooms/{room_id}/leave
pub async fn leave_room(
    Path(room_id): Path<String>,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Room>> {
    let user = require_user(&state, &headers).await?;
    info!("POST /rooms/{}/leave - {}", room_id, user.id);

    let room = state.store.leave(&room_id, &user.id).await?;
    Ok(Json(room))
}
