pub const CONFIG_FILE: &str = "config.yaml";
pub const LOG_FILE: &str = "alfrd.log";

pub const LIVE_LOG_CAPACITY: usize = 1000;

pub const SHEETS_API_BASE: &str = "https://sheets.googleapis.com/v4";
pub const SHEETS_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";
pub const GOOGLE_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
/// Lifetime requested for service-account assertions, in seconds.
pub const TOKEN_LIFETIME_SECS: i64 = 3600;

pub const PRIMARY_COLNAME: &str = "FILE_NAME";
pub const COMMENT_COL: &str = "Comment4";
pub const BACKUP_CSV: &str = "df_sheet.csv";
/// The Sheets API allows 60 write requests per minute and user.
pub const MIN_UPDATE_INTERVAL_MS: u64 = 1000;

pub const PARAM_ENV_PREFIX: &str = "ALFRD_PARAM_";
pub const STEP_ENV: &str = "ALFRD_STEP";
