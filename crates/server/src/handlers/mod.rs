//! HTTP handlers
//!
//! All room and message routes require a bearer session token; routes that
//! read or write a specific room additionally require membership.

pub mod auth;
pub mod chat;
pub mod rooms;
pub mod subscribe;

// Re-export AppState from config
pub use crate::config::AppState;

pub use auth::{login, logout, me, signup};
pub use chat::{get_fact_checks, get_messages, send_message};
pub use rooms::{create_room, join_room, leave_room, list_rooms};
pub use subscribe::subscribe;

use crate::auth::UserInfo;
use crate::error::{ChatError, Result};
use axum::http::{header, HeaderMap};

/// Resolve the `Authorization: Bearer <token>` header to a user
pub(crate) async fn require_user(state: &AppState, headers: &HeaderMap) -> Result<UserInfo> {
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or_else(|| ChatError::Unauthenticated("missing bearer token".into()))?;

    state.auth.validate(token).await
}

/// Membership gate for room reads and writes
pub(crate) async fn require_member(
    state: &AppState,
    room_id: &str,
    user: &UserInfo,
) -> Result<()> {
    if state.store.is_member(room_id, &user.id).await? {
        Ok(())
    } else {
        Err(ChatError::Authorization(format!(
            "join room {} to access its messages",
            room_id
        )))
    }
}
