//! Where `turn-voice` keeps its files.
//!
//! ```text
//! <config_dir>/turn-voice/settings.toml      AppConfig (TOML)
//! <data_local_dir>/turn-voice/logs/          one JSONL turn log per session
//! ```
//!
//! `config_dir` and `data_local_dir` come from the `dirs` crate.  The log
//! directory can be moved with `session.log_dir` or `LOG_DIR`.

use std::path::{Path, PathBuf};

const APP_NAME: &str = "turn-voice";
const SETTINGS_FILE: &str = "settings.toml";
const LOGS_DIR: &str = "logs";

/// Resolved application paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppPaths {
    pub config_dir: PathBuf,
    pub settings_file: PathBuf,
    /// Default turn-log directory.
    pub logs_dir: PathBuf,
}

impl AppPaths {
    /// Resolve against the platform directories.  A platform without one
    /// falls back to the working directory.
    pub fn new() -> Self {
        let cwd = || PathBuf::from(".");
        Self::under(
            &dirs::config_dir().unwrap_or_else(cwd),
            &dirs::data_local_dir().unwrap_or_else(cwd),
        )
    }

    /// Lay the application directories out under explicit roots.
    pub fn under(config_root: &Path, data_root: &Path) -> Self {
        let config_dir = config_root.join(APP_NAME);
        Self {
            settings_file: config_dir.join(SETTINGS_FILE),
            config_dir,
            logs_dir: data_root.join(APP_NAME).join(LOGS_DIR),
        }
    }
}

impl Default for AppPaths {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_under_explicit_roots() {
        let paths = AppPaths::under(Path::new("/cfg"), Path::new("/data"));
        assert_eq!(paths.config_dir, Path::new("/cfg/turn-voice"));
        assert_eq!(paths.settings_file, Path::new("/cfg/turn-voice/settings.toml"));
        assert_eq!(paths.logs_dir, Path::new("/data/turn-voice/logs"));
    }

    #[test]
    fn platform_paths_resolve() {
        let paths = AppPaths::new();
        assert!(paths.settings_file.ends_with("turn-voice/settings.toml"));
        assert!(paths.logs_dir.ends_with("turn-voice/logs"));
    }
}
