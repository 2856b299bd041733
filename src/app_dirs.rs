use directories::ProjectDirs;
use std::path::{Path, PathBuf};

const APP_NAME: &str = "cyclequiz";
const DB_FILE: &str = "progress.db";

/// Centralized application directory resolution
pub struct AppDirs;

impl AppDirs {
    /// `$HOME/.local/state/cyclequiz/progress.db`, or the platform data dir
    pub fn db_path() -> Option<PathBuf> {
        if let Ok(home) = std::env::var("HOME") {
            let state_dir = PathBuf::from(home)
                .join(".local")
                .join("state")
                .join(APP_NAME);
            Some(state_dir.join(DB_FILE))
        } else {
            ProjectDirs::from("", "", APP_NAME)
                .map(|proj_dirs| proj_dirs.data_local_dir().join(DB_FILE))
        }
    }

    /// Database path inside an explicit state directory
    pub fn db_path_in<P: AsRef<Path>>(state_dir: P) -> PathBuf {
        state_dir.as_ref().join(DB_FILE)
    }

    pub fn config_path() -> PathBuf {
        if let Some(pd) = ProjectDirs::from("", "", APP_NAME) {
            pd.config_dir().join("config.json")
        } else {
            PathBuf::from(format!("{APP_NAME}_config.json"))
        }
    }
}
