//! Process-level configuration (where data lives, how replies are paced)
//!
//! User-facing settings such as API keys and personas are records in the
//! key-value store, see `persona.rs`.

use std::path::PathBuf;

use crate::splitter::Pacing;

const DATA_DIR_ENV: &str = "CHAT_DIARY_DATA_DIR";
const LOG_DIR_ENV: &str = "CHAT_DIARY_LOG_DIR";
const PACING_ENV: &str = "CHAT_DIARY_PACING";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub data_dir: PathBuf,
    pub db_path: PathBuf,
    pub log_dir: PathBuf,
    pub pacing: Pacing,
}

impl AppConfig {
    /// Build from environment, falling back to the platform data directory
    pub fn from_env() -> Self {
        let data_dir = std::env::var(DATA_DIR_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|_| default_data_dir());
        let pacing = match std::env::var(PACING_ENV).as_deref() {
            Ok("immediate") => Pacing::Immediate,
            _ => Pacing::Natural,
        };
        Self::with_data_dir(data_dir, pacing)
    }

    pub fn with_data_dir(data_dir: PathBuf, pacing: Pacing) -> Self {
        let log_dir = std::env::var(LOG_DIR_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_dir.join("logs"));
        Self {
            db_path: data_dir.join("chat-diary.db"),
            log_dir,
            data_dir,
            pacing,
        }
    }
}

/// `~/.local/share/chat-diary` on Linux
pub fn default_data_dir() -> PathBuf {
    directories::BaseDirs::new().map_or_else(
        || PathBuf::from(".chat-diary"),
        |d| d.data_dir().join("chat-diary"),
    )
}

/// Log directory used when logging is initialised without an explicit config
pub fn default_log_dir() -> PathBuf {
    std::env::var(LOG_DIR_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|_| default_data_dir().join("logs"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths_derive_from_data_dir() {
        let config = AppConfig::with_data_dir(PathBuf::from("/tmp/cd"), Pacing::Immediate);
        assert_eq!(config.db_path, PathBuf::from("/tmp/cd/chat-diary.db"));
        assert_eq!(config.pacing, Pacing::Immediate);
    }
}
