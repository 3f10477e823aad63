//! Structured logging module for ChatDiary
//!
//! Writes daily log files to the configured log directory with categories:
//! - CHAT: Chat session activity (messages, replies, rerolls)
//! - DIARY: Diary generation, polish, comments, saves
//! - PROVIDER: Outbound LLM requests and model listing
//! - STORAGE: Key-value store reads/writes, backups
//! - ERROR: Errors surfaced to the user

use chrono::{Local, Utc};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use once_cell::sync::Lazy;

/// Log categories for structured logging
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogCategory {
    Chat,     // Chat session activity
    Diary,    // Diary generation and editing
    Provider, // LLM provider calls
    Storage,  // Persistence
    Error,    // Errors
}

impl LogCategory {
    fn as_str(&self) -> &'static str {
        match self {
            LogCategory::Chat => "CHAT",
            LogCategory::Diary => "DIARY",
            LogCategory::Provider => "PROVIDER",
            LogCategory::Storage => "STORAGE",
            LogCategory::Error => "ERROR",
        }
    }
}

/// Directory log files are written to; `None` until `init_logging` runs
static LOG_DIR: Lazy<Mutex<Option<PathBuf>>> = Lazy::new(|| Mutex::new(None));

/// Whether log lines are echoed to stderr as well as the file
static ECHO_STDERR: Lazy<Mutex<bool>> = Lazy::new(|| Mutex::new(true));

/// Turn the stderr copy of log lines on or off
pub fn set_echo_stderr(enabled: bool) {
    if let Ok(mut echo) = ECHO_STDERR.lock() {
        *echo = enabled;
    }
}

/// Get the log directory path
fn get_log_dir() -> PathBuf {
    LOG_DIR
        .lock()
        .ok()
        .and_then(|dir| dir.clone())
        .unwrap_or_else(crate::config::default_log_dir)
}

/// Get today's log file path
fn get_log_file_path(log_dir: &Path) -> PathBuf {
    let today = Local::now().format("%Y-%m-%d").to_string();
    log_dir.join(format!("chat-diary-{}.log", today))
}

/// Initialize the logging system - creates log directory if needed
pub fn init_logging(log_dir: &Path) -> std::io::Result<()> {
    if !log_dir.exists() {
        fs::create_dir_all(log_dir)?;
    }

    if let Ok(mut dir) = LOG_DIR.lock() {
        *dir = Some(log_dir.to_path_buf());
    }

    log(LogCategory::Storage, None, "ChatDiary logging initialized");

    Ok(())
}

/// Format one log line; `scope` is usually a diary date or id
fn format_line(category: LogCategory, scope: Option<&str>, message: &str) -> String {
    let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
    let scope_context = scope
        .map(|s| format!("scope={} | ", s))
        .unwrap_or_default();

    format!(
        "[{}] [{}] {}{}\n",
        timestamp,
        category.as_str(),
        scope_context,
        message
    )
}

/// Log a message with category and optional scope
pub fn log(category: LogCategory, scope: Option<&str>, message: &str) {
    let log_line = format_line(category, scope, message);

    if ECHO_STDERR.lock().map(|echo| *echo).unwrap_or(true) {
        eprint!("{}", log_line);
    }

    // File logging only once init_logging has created the directory
    let initialized = LOG_DIR.lock().map(|dir| dir.is_some()).unwrap_or(false);
    if !initialized {
        return;
    }

    let log_path = get_log_file_path(&get_log_dir());
    if let Ok(mut file) = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
    {
        let _ = file.write_all(log_line.as_bytes());
    }
}

/// Log a chat event (message sent, reply generated, reroll)
pub fn log_chat(scope: Option<&str>, message: &str) {
    log(LogCategory::Chat, scope, message);
}

/// Log a diary event (generated, polished, commented, saved)
pub fn log_diary(scope: Option<&str>, message: &str) {
    log(LogCategory::Diary, scope, message);
}

/// Log a provider call
pub fn log_provider(scope: Option<&str>, message: &str) {
    log(LogCategory::Provider, scope, message);
}

/// Log a storage event
pub fn log_storage(scope: Option<&str>, message: &str) {
    log(LogCategory::Storage, scope, message);
}

/// Log an error
pub fn log_error(scope: Option<&str>, message: &str) {
    log(LogCategory::Error, scope, message);
}

/// Clean up old log files (keep last 7 days)
pub fn cleanup_old_logs() -> std::io::Result<usize> {
    cleanup_logs_in(&get_log_dir())
}

/// Whether `name` is one of our daily log files
fn is_log_file(name: &str) -> bool {
    name.starts_with("chat-diary-") && name.ends_with(".log")
}

/// Remove our log files older than 7 days; other files in `log_dir` are left alone
fn cleanup_logs_in(log_dir: &Path) -> std::io::Result<usize> {
    let mut deleted = 0;

    if !log_dir.exists() {
        return Ok(0);
    }

    let cutoff = Utc::now() - chrono::Duration::days(7);

    for entry in fs::read_dir(log_dir)? {
        let entry = entry?;
        let path = entry.path();

        if !entry.file_name().to_str().is_some_and(is_log_file) {
            continue;
        }

        if let Ok(metadata) = entry.metadata() {
            if let Ok(modified) = metadata.modified() {
                let modified_time: chrono::DateTime<Utc> = modified.into();
                if metadata.is_file() && modified_time < cutoff && fs::remove_file(&path).is_ok() {
                    deleted += 1;
                }
            }
        }
    }

    Ok(deleted)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_line_includes_category_and_scope() {
        let line = format_line(LogCategory::Provider, Some("2024-05-01"), "calling chat completions");
        assert!(line.contains("[PROVIDER]"));
        assert!(line.contains("scope=2024-05-01 | calling chat completions"));
        assert!(line.ends_with('\n'));
    }

    fn age(path: &Path, days: u64) {
        let stamp = std::time::SystemTime::now() - std::time::Duration::from_secs(days * 24 * 60 * 60);
        fs::File::options().write(true).open(path).unwrap().set_modified(stamp).unwrap();
    }

    #[test]
    fn test_cleanup_only_removes_old_log_files() {
        let dir = tempfile::tempdir().unwrap();
        let old_log = dir.path().join("chat-diary-2024-05-01.log");
        let fresh_log = dir.path().join("chat-diary-2024-05-20.log");
        let notes = dir.path().join("my-notes.txt");
        for path in [&old_log, &fresh_log, &notes] {
            fs::write(path, "x").unwrap();
        }
        age(&old_log, 10);
        age(&notes, 10);

        assert_eq!(cleanup_logs_in(dir.path()).unwrap(), 1);
        assert!(!old_log.exists());
        assert!(fresh_log.exists());
        assert!(notes.exists());
    }

    #[test]
    fn test_format_line_without_scope() {
        let line = format_line(LogCategory::Error, None, "boom");
        assert!(line.contains("[ERROR] boom"));
    }
}
