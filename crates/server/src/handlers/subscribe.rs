//! Live room subscription handler
//!
//! SSE stream per room: bounded message backlog first, then live updates
//! from the room's broadcast channel. Messages carry their log position as
//! the SSE event id, so all subscribers observe the same order. Fact-check
//! and membership changes flow on the same stream as typed events.

use super::{require_member, require_user};
use crate::config::AppState;
use crate::error::Result;
use crate::models::Message;
use crate::store::{RoomUpdate, UpdateType};
use axum::{
    extract::{Path, State},
    http::HeaderMap,
    response::sse::{Event, KeepAlive, Sse},
};
use futures::Stream;
use std::convert::Infallible;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

/// GET /rooms/{room_id}/subscribe
pub async fn subscribe(
    Path(room_id): Path<String>,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Sse<impl Stream<Item = std::result::Result<Event, Infallible>>>> {
    let user = require_user(&state, &headers).await?;
    require_member(&state, &room_id, &user).await?;

    info!("GET /rooms/{}/subscribe - {}", room_id, user.id);

    // Subscribe before snapshotting the backlog so no update is dropped;
    // an update landing in between may be delivered twice (at-least-once).
    let channel = state.store.get_channel(&room_id).await;
    let mut rx = channel.tx.subscribe();

    let backlog = state
        .store
        .recent_messages(&room_id, state.config.history_limit)
        .await?;

    let stream = async_stream::stream! {
        for message in &backlog {
            if let Some(event) = message_event(message) {
                yield Ok::<_, Infallible>(event);
            }
        }

        loop {
            match rx.recv().await {
                Ok(update) => {
                    if let Some(event) = update_event(update) {
                        yield Ok::<_, Infallible>(event);
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Subscriber to room {} lagged, skipped {} updates", room_id, skipped);
                }
                Err(RecvError::Closed) => break,
            }
        }
    };

    Ok(Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(30))))
}

fn message_event(message: &Message) -> Option<Event> {
    match serde_json::to_string(message) {
        Ok(data) => Some(
            Event::default()
                .event("message")
                .id(message.seq.to_string())
                .data(data),
        ),
        Err(e) => {
            warn!("Skipping unserializable message {}: {}", message.id, e);
            None
        }
    }
}

fn update_event(update: RoomUpdate) -> Option<Event> {
    let name = match update.update_type {
        UpdateType::Message => "message",
        UpdateType::FactCheck => "fact_check",
        UpdateType::Membership => "membership",
    };

    match serde_json::to_string(&update.data) {
        Ok(data) => {
            let mut event = Event::default().event(name).data(data);
            if let Some(seq) = update.seq {
                event = event.id(seq.to_string());
            }
            Some(event)
        }
        Err(e) => {
            warn!("Skipping unserializable {} update for room {}: {}", name, update.room_id, e);
            None
        }
    }
}
