//! Centralized directory structure management for TalkShelf
//!
//! Directory layout:
//! ```text
//! talkshelf_data/
//! ├── local/           # SQLite user database
//! └── chats/           # One JSON file per chat room
//! ```

use std::path::PathBuf;
use tracing::info;

/// Get the TALKSHELF_ROOT directory from environment or default
pub fn talkshelf_root() -> PathBuf {
    if let Ok(val) = std::env::var("TALKSHELF_ROOT") {
        return PathBuf::from(val);
    }

    PathBuf::from("talkshelf_data")
}

/// Local data directory (SQLite)
pub fn local_dir() -> PathBuf {
    talkshelf_root().join("local")
}

/// Chat room storage directory
pub fn chats_dir() -> PathBuf {
    talkshelf_root().join("chats")
}

/// User database path
pub fn users_db_path() -> PathBuf {
    local_dir().join("users.sqlite")
}

/// Ensure a single directory exists
pub fn ensure_dir(path: &PathBuf) -> anyhow::Result<()> {
    if !path.exists() {
        std::fs::create_dir_all(path)?;
        info!("Created directory: {:?}", path);
    }
    Ok(())
}

/// Initialize the complete directory structure
/// Call this once at server startup before any other operations
pub fn init_structure() -> anyhow::Result<PathBuf> {
    let root = talkshelf_root();

    ensure_dir(&root)?;
    ensure_dir(&local_dir())?;
    ensure_dir(&chats_dir())?;

    // Canonicalize for absolute path
    let canonical = std::fs::canonicalize(&root).unwrap_or_else(|_| root.clone());

    info!("TalkShelf directory structure initialized at: {:?}", canonical);

    Ok(canonical)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_is_rooted() {
        let root = talkshelf_root();
        assert!(chats_dir().starts_with(&root));
        assert!(local_dir().starts_with(&root));
        assert!(users_db_path().starts_with(local_dir()));
    }
}
