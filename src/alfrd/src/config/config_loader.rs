use anyhow::{Context, Result};
use config::{Config as RConfig, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use alfrd_common::workdir::ALFRD_WORK_DIR;

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct Config {
    pub alfrd_dir: PathBuf,
    pub projects_dir: PathBuf,
    pub credentials_file: PathBuf,
    pub sheets_api_base: String,

    pub live_log_capacity: usize,

    pub primary_colname: String,
    pub comment_col: String,
    pub backup_csv: PathBuf,
    pub min_update_interval_ms: u64,

    pub use_symlink: bool,

    /// Files the values were read from, in load order.
    #[serde(default)]
    pub config_sources: Vec<String>,
}

impl Config {
    pub fn min_update_interval(&self) -> Duration {
        Duration::from_millis(self.min_update_interval_ms)
    }
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Defaults, then `<alfrd_dir>/config.toml` if present, then `ALFRD_*` variables.
    pub fn load_default_config() -> Result<Config> {
        Self::load(&ALFRD_WORK_DIR.config_file, false)
    }

    /// Like [`ConfigLoader::load_default_config`] with an explicit file, which must exist.
    pub fn load_config_file(path: &Path) -> Result<Config> {
        Self::load(path, true)
    }

    fn load(path: &Path, required: bool) -> Result<Config> {
        let defaults = Config::default();
        let mut builder = RConfig::builder();

        builder = builder
            .set_default("alfrd_dir", path_str(&defaults.alfrd_dir))?
            .set_default("projects_dir", path_str(&defaults.projects_dir))?
            .set_default("credentials_file", path_str(&defaults.credentials_file))?
            .set_default("sheets_api_base", defaults.sheets_api_base)?
            .set_default("live_log_capacity", defaults.live_log_capacity as u64)?
            .set_default("primary_colname", defaults.primary_colname)?
            .set_default("comment_col", defaults.comment_col)?
            .set_default("backup_csv", path_str(&defaults.backup_csv))?
            .set_default("min_update_interval_ms", defaults.min_update_interval_ms)?
            .set_default("use_symlink", defaults.use_symlink)?;

        let mut sources = vec![];
        if path.exists() {
            sources.push(path.display().to_string());
        }
        builder = builder
            .add_source(File::from(path).format(FileFormat::Toml).required(required))
            .add_source(Environment::with_prefix("ALFRD").try_parsing(true))
            .set_override("config_sources", sources)?;

        builder
            .build()?
            .try_deserialize()
            .with_context(|| format!("failed to parse config file {}", path.display()))
    }
}

fn path_str(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}
