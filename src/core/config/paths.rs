use std::env;
use std::fs;
use std::path::PathBuf;

const CONFIG_FILE: &str = "config.yml";
const SECRETS_FILE: &str = "secrets.yaml";
const DB_FILE: &str = "nutrition.db";

/// On-disk layout. Everything lives under one data directory; only the
/// public config file can be moved elsewhere with `NUTRITION_CONFIG_PATH`.
#[derive(Debug, Clone)]
pub struct AppPaths {
    pub data_dir: PathBuf,
    pub log_dir: PathBuf,
    pub db_path: PathBuf,
    pub config_path: PathBuf,
    pub secrets_path: PathBuf,
}

impl AppPaths {
    pub fn new() -> Self {
        let mut paths = Self::in_dir(discover_data_dir());
        if let Some(config_path) = env_path("NUTRITION_CONFIG_PATH") {
            paths.config_path = config_path;
        }
        paths
    }

    /// Lays out every path under `data_dir`, creating the directories.
    pub fn in_dir(data_dir: PathBuf) -> Self {
        let log_dir = data_dir.join("logs");
        for dir in [&data_dir, &log_dir] {
            let _ = fs::create_dir_all(dir);
        }

        AppPaths {
            db_path: data_dir.join(DB_FILE),
            config_path: data_dir.join(CONFIG_FILE),
            secrets_path: data_dir.join(SECRETS_FILE),
            log_dir,
            data_dir,
        }
    }
}

impl Default for AppPaths {
    fn default() -> Self {
        Self::new()
    }
}

fn env_path(key: &str) -> Option<PathBuf> {
    env::var_os(key)
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
}

/// `NUTRITION_DATA_DIR`, else the platform's per-user data directory.
fn discover_data_dir() -> PathBuf {
    if let Some(dir) = env_path("NUTRITION_DATA_DIR") {
        return dir;
    }

    let home = env_path("HOME")
        .or_else(|| env_path("USERPROFILE"))
        .unwrap_or_else(|| PathBuf::from("."));

    if cfg!(target_os = "windows") {
        let base = env_path("LOCALAPPDATA").unwrap_or(home);
        return base.join("NutritionAssistant");
    }

    if cfg!(target_os = "macos") {
        return home
            .join("Library/Application Support")
            .join("NutritionAssistant");
    }

    env_path("XDG_DATA_HOME")
        .unwrap_or_else(|| home.join(".local/share"))
        .join("nutrition-assistant")
}
