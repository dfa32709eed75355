use alfrd_common::workdir::ALFRD_WORK_DIR;

use crate::config::Config;
use crate::constants::{
    BACKUP_CSV, COMMENT_COL, LIVE_LOG_CAPACITY, MIN_UPDATE_INTERVAL_MS, PRIMARY_COLNAME,
    SHEETS_API_BASE,
};

impl Default for Config {
    fn default() -> Self {
        Self {
            alfrd_dir: ALFRD_WORK_DIR.path.clone(),
            projects_dir: ALFRD_WORK_DIR.projects_dir.clone(),
            credentials_file: ALFRD_WORK_DIR.credentials_file.clone(),
            sheets_api_base: SHEETS_API_BASE.to_string(),

            live_log_capacity: LIVE_LOG_CAPACITY,

            primary_colname: PRIMARY_COLNAME.to_string(),
            comment_col: COMMENT_COL.to_string(),
            backup_csv: BACKUP_CSV.into(),
            min_update_interval_ms: MIN_UPDATE_INTERVAL_MS,

            use_symlink: true,
            config_sources: vec![],
        }
    }
}
