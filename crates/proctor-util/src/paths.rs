//! Default paths for proctord components
//!
//! Paths are user-writable by default (no root required):
//! - Socket: `$XDG_RUNTIME_DIR/proctord/proctord.sock` or `/tmp/proctord-$USER/proctord.sock`
//! - Data: `$XDG_DATA_HOME/proctord` or `~/.local/share/proctord`
//! - Logs: `$XDG_STATE_HOME/proctord` or `~/.local/state/proctord`
//! - Config: `$XDG_CONFIG_HOME/proctord/config.toml` or `~/.config/proctord/config.toml`

use std::path::PathBuf;

/// Environment variable for overriding the socket path
pub const PROCTOR_SOCKET_ENV: &str = "PROCTOR_SOCKET";

/// Environment variable for overriding the data directory
pub const PROCTOR_DATA_DIR_ENV: &str = "PROCTOR_DATA_DIR";

/// Socket filename within the socket directory
const SOCKET_FILENAME: &str = "proctord.sock";

/// Application subdirectory name
const APP_DIR: &str = "proctord";

/// Get the default socket path.
///
/// Order of precedence:
/// 1. `$PROCTOR_SOCKET` environment variable (if set)
/// 2. `$XDG_RUNTIME_DIR/proctord/proctord.sock` (if XDG_RUNTIME_DIR is set)
/// 3. `/tmp/proctord-$USER/proctord.sock` (fallback)
pub fn default_socket_path() -> PathBuf {
    if let Ok(path) = std::env::var(PROCTOR_SOCKET_ENV) {
        return PathBuf::from(path);
    }

    socket_path_without_env()
}

/// Get the socket path without checking PROCTOR_SOCKET env var.
pub fn socket_path_without_env() -> PathBuf {
    if let Ok(runtime_dir) = std::env::var("XDG_RUNTIME_DIR") {
        return PathBuf::from(runtime_dir).join(APP_DIR).join(SOCKET_FILENAME);
    }

    let username = std::env::var("USER").unwrap_or_else(|_| "unknown".to_string());
    PathBuf::from(format!("/tmp/{}-{}", APP_DIR, username)).join(SOCKET_FILENAME)
}

/// Get the default data directory (audit database lives here).
pub fn default_data_dir() -> PathBuf {
    if let Ok(path) = std::env::var(PROCTOR_DATA_DIR_ENV) {
        return PathBuf::from(path);
    }

    data_dir_without_env()
}

/// Get the data directory without checking PROCTOR_DATA_DIR env var.
pub fn data_dir_without_env() -> PathBuf {
    if let Ok(data_home) = std::env::var("XDG_DATA_HOME") {
        return PathBuf::from(data_home).join(APP_DIR);
    }

    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home)
            .join(".local")
            .join("share")
            .join(APP_DIR);
    }

    PathBuf::from("/tmp").join(APP_DIR).join("data")
}

/// Get the default log directory (termination CSV/JSONL files).
pub fn default_log_dir() -> PathBuf {
    if let Ok(state_home) = std::env::var("XDG_STATE_HOME") {
        return PathBuf::from(state_home).join(APP_DIR);
    }

    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home)
            .join(".local")
            .join("state")
            .join(APP_DIR);
    }

    PathBuf::from("/tmp").join(APP_DIR).join("logs")
}

/// Get the default configuration file path.
pub fn default_config_path() -> PathBuf {
    if let Ok(config_home) = std::env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(config_home).join(APP_DIR).join("config.toml");
    }

    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home)
            .join(".config")
            .join(APP_DIR)
            .join("config.toml");
    }

    PathBuf::from("/etc").join(APP_DIR).join("config.toml")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn socket_path_contains_proctord() {
        let path = socket_path_without_env();
        assert!(path.to_string_lossy().contains("proctord"));
        assert!(path.to_string_lossy().ends_with(".sock"));
    }

    #[test]
    fn data_dir_contains_proctord() {
        let path = data_dir_without_env();
        assert!(path.to_string_lossy().contains("proctord"));
    }

    #[test]
    fn log_dir_contains_proctord() {
        let path = default_log_dir();
        assert!(path.to_string_lossy().contains("proctord"));
    }

    #[test]
    fn config_path_is_toml() {
        let path = default_config_path();
        assert_eq!(path.file_name().unwrap(), "config.toml");
    }
}
