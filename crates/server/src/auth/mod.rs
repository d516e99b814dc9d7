//! Identity module
//!
//! Email + password accounts with opaque bearer session tokens. The chat
//! core only ever consumes the `(id, display_name)` pair resolved here;
//! everything else about a user stays in this module.

use crate::error::{ChatError, Result};
use bcrypt::{hash, verify, DEFAULT_COST};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use tokio::sync::RwLock;
use tracing::{info, warn};
use uuid::Uuid;

const SESSION_TTL_DAYS: i64 = 7;

/// Public user info (no sensitive data)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserInfo {
    pub id: String,
    pub email: String,
    pub display_name: String,
    pub created_at: DateTime<Utc>,
}

/// Session token for authenticated requests
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub token: String,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    fn is_valid(&self) -> bool {
        self.expires_at > Utc::now()
    }
}

/// Auth manager handles accounts and sessions
pub struct AuthManager {
    pool: SqlitePool,
    /// In-memory session cache
    sessions: RwLock<HashMap<String, Session>>,
}

impl AuthManager {
    /// Open (or create) the user database and initialize the schema
    pub async fn new(db_path: &Path) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", db_path.display()))
            .map_err(anyhow::Error::from)?
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new().connect_with(options).await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                email TEXT UNIQUE NOT NULL,
                display_name TEXT NOT NULL,
                password_hash TEXT NOT NULL,
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS sessions (
                token TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                created_at TEXT NOT NULL,
                expires_at TEXT NOT NULL,
                FOREIGN KEY (user_id) REFERENCES users(id)
            )
            "#,
        )
        .execute(&pool)
        .await?;

        info!("[Auth] Initialized at {:?}", db_path);

        Ok(Self {
            pool,
            sessions: RwLock::new(HashMap::new()),
        })
    }

    /// Register a new user
    pub async fn signup(
        &self,
        email: &str,
        display_name: &str,
        password: &str,
    ) -> Result<UserInfo> {
        let email = email.trim().to_lowercase();
        let display_name = display_name.trim();

        if email.is_empty() || display_name.is_empty() || password.is_empty() {
            return Err(ChatError::Validation(
                "email, display name and password are required".into(),
            ));
        }

        let existing: Option<(String,)> = sqlx::query_as("SELECT id FROM users WHERE email = ?")
            .bind(&email)
            .fetch_optional(&self.pool)
            .await?;

        if existing.is_some() {
            return Err(ChatError::Validation("email already registered".into()));
        }

        let password_hash = hash(password, DEFAULT_COST)?;

        let user = UserInfo {
            id: Uuid::new_v4().to_string(),
            email: email.clone(),
            display_name: display_name.to_string(),
            created_at: Utc::now(),
        };

        sqlx::query(
            "INSERT INTO users (id, email, display_name, password_hash, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&user.id)
        .bind(&user.email)
        .bind(&user.display_name)
        .bind(&password_hash)
        .bind(user.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        info!("[Auth] User registered: {} ({})", user.display_name, user.email);

        Ok(user)
    }

    /// Verify credentials and create a session
    pub async fn login(&self, email: &str, password: &str) -> Result<(UserInfo, Session)> {
        let email = email.trim().to_lowercase();

        let row: Option<(String, String, String, String)> = sqlx::query_as(
            "SELECT id, display_name, password_hash, created_at FROM users WHERE email = ?",
        )
        .bind(&email)
        .fetch_optional(&self.pool)
        .await?;

        let (user_id, display_name, password_hash, created_at) = row.ok_or_else(|| {
            ChatError::Unauthenticated("invalid email or password".into())
        })?;

        if !verify(password, &password_hash)? {
            warn!("[Auth] Failed login attempt for {}", email);
            return Err(ChatError::Unauthenticated("invalid email or password".into()));
        }

        let session = self.create_session(&user_id).await?;

        let user = UserInfo {
            id: user_id,
            email,
            display_name,
            created_at: created_at.parse().unwrap_or_else(|_| Utc::now()),
        };

        info!("[Auth] User logged in: {}", user.display_name);

        Ok((user, session))
    }

    async fn create_session(&self, user_id: &str) -> Result<Session> {
        let session = Session {
            token: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            created_at: Utc::now(),
            expires_at: Utc::now() + chrono::Duration::days(SESSION_TTL_DAYS),
        };

        sqlx::query(
            "INSERT INTO sessions (token, user_id, created_at, expires_at) VALUES (?, ?, ?, ?)",
        )
        .bind(&session.token)
        .bind(&session.user_id)
        .bind(session.created_at.to_rfc3339())
        .bind(session.expires_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        self.sessions
            .write()
            .await
            .insert(session.token.clone(), session.clone());

        Ok(session)
    }

    /// Resolve a bearer token to its user, rejecting expired sessions
    pub async fn validate(&self, token: &str) -> Result<UserInfo> {
        let cached = {
            let sessions = self.sessions.read().await;
            sessions.get(token).cloned()
        };

        let user_id = match cached {
            Some(session) if session.is_valid() => session.user_id,
            Some(_) => {
                // Expired; drop from cache and fall through to rejection
                self.sessions.write().await.remove(token);
                return Err(ChatError::Unauthenticated("session expired".into()));
            }
            None => {
                let row: Option<(String, String)> = sqlx::query_as(
                    "SELECT user_id, expires_at FROM sessions WHERE token = ?",
                )
                .bind(token)
                .fetch_optional(&self.pool)
                .await?;

                let (user_id, expires_at) = row.ok_or_else(|| {
                    ChatError::Unauthenticated("invalid session token".into())
                })?;

                let expires: DateTime<Utc> = expires_at
                    .parse()
                    .map_err(|_| ChatError::Unauthenticated("invalid session token".into()))?;
                if expires <= Utc::now() {
                    return Err(ChatError::Unauthenticated("session expired".into()));
                }
                user_id
            }
        };

        self.get_user(&user_id).await
    }

    /// Invalidate a session token
    pub async fn logout(&self, token: &str) -> Result<()> {
        self.sessions.write().await.remove(token);

        sqlx::query("DELETE FROM sessions WHERE token = ?")
            .bind(token)
            .execute(&self.pool)
            .await?;

        info!("[Auth] Session invalidated");

        Ok(())
    }

    /// Get user by id
    pub async fn get_user(&self, user_id: &str) -> Result<UserInfo> {
        let row: Option<(String, String, String, String)> = sqlx::query_as(
            "SELECT id, email, display_name, created_at FROM users WHERE id = ?",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        let (id, email, display_name, created_at) =
            row.ok_or_else(|| ChatError::NotFound(format!("user {} not found", user_id)))?;

        Ok(UserInfo {
            id,
            email,
            display_name,
            created_at: created_at.parse().unwrap_or_else(|_| Utc::now()),
        })
    }
}
