use std::path::{Path, PathBuf};
use std::sync::LazyLock;

const ALFRD_DIR_NAME: &str = ".alfred";
const PROJECTS_DIR: &str = "projects";
const CREDENTIALS_FILE: &str = "credentials.json";
const LOG_FILE: &str = "alfrd.log";
const CONFIG_FILE: &str = "config.toml";

/// Environment variable that relocates the whole working directory.
pub const ALFRD_DIR_ENV: &str = "ALFRD_DIR";

pub static ALFRD_WORK_DIR: LazyLock<AlfrdWorkDir> = LazyLock::new(AlfrdWorkDir::resolve);

/// Paths of the per-user alfrd directory (`~/.alfred` by default).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlfrdWorkDir {
    pub path: PathBuf,
    pub projects_dir: PathBuf,
    pub credentials_file: PathBuf,
    pub log_file: PathBuf,
    pub config_file: PathBuf,
}

impl AlfrdWorkDir {
    /// Uses `$ALFRD_DIR` when set, otherwise `~/.alfred`. Falls back to the
    /// current directory when no home directory can be determined.
    pub fn resolve() -> Self {
        let root = std::env::var_os(ALFRD_DIR_ENV)
            .map(PathBuf::from)
            .or_else(|| dirs::home_dir().map(|home| home.join(ALFRD_DIR_NAME)))
            .unwrap_or_else(|| PathBuf::from(ALFRD_DIR_NAME));
        Self::from_root(root)
    }

    pub fn from_root<P: AsRef<Path>>(root: P) -> Self {
        let path = root.as_ref().to_path_buf();
        AlfrdWorkDir {
            projects_dir: path.join(PROJECTS_DIR),
            credentials_file: path.join(CREDENTIALS_FILE),
            log_file: path.join(LOG_FILE),
            config_file: path.join(CONFIG_FILE),
            path,
        }
    }
}
