//! Chat server configuration

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::auth::AuthManager;
use crate::factcheck::FactCheckManager;
use crate::store::JsonChatStore;

/// Configuration for the TalkShelf chat server
#[derive(Clone, Debug)]
pub struct ChatServerConfig {
    /// Storage directory for room JSON files
    pub storage_dir: PathBuf,
    /// SQLite database for users and sessions
    pub users_db_path: PathBuf,
    /// Port to listen on
    pub port: u16,
    /// Max messages returned per history fetch and in the subscribe backlog
    pub history_limit: usize,
    /// Model used for fact-check generation
    pub fact_check_model: String,
    /// Upper bound on a single fact-check call
    pub fact_check_timeout: Duration,
}

impl Default for ChatServerConfig {
    fn default() -> Self {
        Self {
            storage_dir: talkshelf_common::chats_dir(),
            users_db_path: talkshelf_common::users_db_path(),
            port: 3001,
            history_limit: 200,
            fact_check_model: "gemini-2.0-flash".to_string(),
            fact_check_timeout: Duration::from_secs(30),
        }
    }
}

impl ChatServerConfig {
    /// Create config rooted at a custom base directory (used by tests)
    pub fn with_base_dir(base_dir: impl Into<PathBuf>) -> Self {
        let base = base_dir.into();
        Self {
            storage_dir: base.join("chats"),
            users_db_path: base.join("users.sqlite"),
            ..Self::default()
        }
    }

    /// Ensure all directories exist
    pub async fn ensure_dirs(&self) -> anyhow::Result<()> {
        tokio::fs::create_dir_all(&self.storage_dir).await?;
        if let Some(parent) = self.users_db_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        Ok(())
    }
}

/// App state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub config: ChatServerConfig,
    pub store: Arc<JsonChatStore>,
    pub auth: Arc<AuthManager>,
    pub fact_check: Option<Arc<FactCheckManager>>,
}
