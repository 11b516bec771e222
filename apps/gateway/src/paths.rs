//! Process environment: `.env` loading and the directories the gateway uses.

use std::env;
use std::path::PathBuf;

pub const CONFIG_DIR_VAR: &str = "CAPOT_CONFIG_DIR";
pub const LOG_DIR_VAR: &str = "CAPOT_LOG_DIR";
pub const IMAGE_PATH_VAR: &str = "CAPOT_IMAGE_PATH";

const DEFAULT_CONFIG_DIR: &str = "config";
const DEFAULT_LOG_DIR: &str = "logs";

/// Directories and files resolved from the environment at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayPaths {
    pub config_dir: PathBuf,
    pub log_dir: PathBuf,
    /// Still image served by the file-backed camera, if configured.
    pub image_path: Option<PathBuf>,
}

impl GatewayPaths {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Resolves paths through `lookup`; empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let read = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        Self {
            config_dir: read(CONFIG_DIR_VAR)
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_DIR)),
            log_dir: read(LOG_DIR_VAR)
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_DIR)),
            image_path: read(IMAGE_PATH_VAR).map(PathBuf::from),
        }
    }
}

/// Loads `.env` from the working directory, then from next to the executable.
///
/// Returns the file that was loaded. Runs before the logger exists, so the
/// caller logs the outcome.
pub fn load_dotenv() -> Option<PathBuf> {
    if let Ok(path) = dotenvy::dotenv() {
        return Some(path);
    }

    let exe_env = env::current_exe().ok()?.parent()?.join(".env");
    if exe_env.exists() && dotenvy::from_path(&exe_env).is_ok() {
        return Some(exe_env);
    }

    None
}
