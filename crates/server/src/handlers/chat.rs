//! Message log handlers

use super::{require_member, require_user};
use crate::config::AppState;
use crate::error::Result;
use crate::models::{FactCheck, Message, SendMessageInput};
use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    Json,
};
use serde::Deserialize;
use tracing::info;

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    /// Cursor: return messages with seq greater than this
    pub after: Option<u64>,
    pub limit: Option<usize>,
}

/// GET /rooms/{room_id}/messages
pub async fn get_messages(
    Path(room_id): Path<String>,
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<Message>>> {
    let user = require_user(&state, &headers).await?;
    require_member(&state, &room_id, &user).await?;

    let limit = query
        .limit
        .map(|l| l.min(state.config.history_limit));
    let messages = state.store.messages(&room_id, query.after, limit).await?;

    Ok(Json(messages))
}

/// POST /rooms/{room_id}/messages
///
/// Appends to the room log, then hands the message to the fact-check
/// pipeline. The response never waits on fact-check evaluation.
pub async fn send_message(
    Path(room_id): Path<String>,
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(input): Json<SendMessageInput>,
) -> Result<Json<Message>> {
    let user = require_user(&state, &headers).await?;
    info!("POST /rooms/{}/messages - {}", room_id, user.id);

    let message = state
        .store
        .append_message(&room_id, &user.id, &user.display_name, &input.content)
        .await?;

    if let Some(ref fact_check) = state.fact_check {
        fact_check.process_message(&message);
    }

    Ok(Json(message))
}

/// GET /rooms/{room_id}/factchecks
pub async fn get_fact_checks(
    Path(room_id): Path<String>,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<FactCheck>>> {
    let user = require_user(&state, &headers).await?;
    require_member(&state, &room_id, &user).await?;

    let fact_checks = state.store.fact_checks(&room_id).await?;
    Ok(Json(fact_checks))
}
