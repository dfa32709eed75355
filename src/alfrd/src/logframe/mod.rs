//! Row-level pipeline status kept in a local copy of a worksheet and pushed
//! back to it.
//!
//! A row is addressed by the value of the primary key column (e.g. the input
//! file name); the column written to defaults to the working column, the
//! column of the pipeline stage that is running.
mod filter;
mod rules;

pub use filter::Filter;

use std::fmt;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use typed_builder::TypedBuilder;

use crate::config::Config;
use crate::constants::{BACKUP_CSV, COMMENT_COL, MIN_UPDATE_INTERVAL_MS, PRIMARY_COLNAME};
use crate::livelog;
use crate::livelog::Level;
use crate::sheets::{DataFrame, Palette, SheetStore};
use alfrd_common::{error_message, skip_message, warning_message, Colorize};

#[derive(Debug, Clone, TypedBuilder)]
pub struct LogFrameOptions {
    #[builder(default = PRIMARY_COLNAME.to_string(), setter(into))]
    pub primary_colname: String,
    /// Column that receives `failed:<error>` when a push fails.
    #[builder(default = COMMENT_COL.to_string(), setter(into))]
    pub comment_col: String,
    /// Where the frame is dumped when a push fails.
    #[builder(default = PathBuf::from(BACKUP_CSV), setter(into))]
    pub backup_csv: PathBuf,
    #[builder(default = Duration::from_millis(MIN_UPDATE_INTERVAL_MS))]
    pub min_update_interval: Duration,
}

impl Default for LogFrameOptions {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl From<&Config> for LogFrameOptions {
    fn from(config: &Config) -> Self {
        Self::builder()
            .primary_colname(config.primary_colname.clone())
            .comment_col(config.comment_col.clone())
            .backup_csv(config.backup_csv.clone())
            .min_update_interval(config.min_update_interval())
            .build()
    }
}

/// How a write treats cells that already hold a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WriteMode {
    #[default]
    Overwrite,
    /// Writes only when every addressed cell is empty.
    FillEmpty,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Rows (full update) or cells (cell update) written.
    Pushed(usize),
    /// Nothing new since the last push.
    Skipped,
    Failed {
        failed: usize,
        backup: Option<PathBuf>,
    },
}

impl fmt::Display for SyncOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncOutcome::Pushed(n) => write!(f, "pushed {n}"),
            SyncOutcome::Skipped => write!(f, "skipped"),
            SyncOutcome::Failed { failed, .. } => write!(f, "failed ({failed} failures)"),
        }
    }
}

pub struct LogFrame<S: SheetStore> {
    store: S,
    df_sheet0: DataFrame,
    df_sheet: DataFrame,
    pub primary_value: String,
    primary_colname: String,
    pub working_col: String,
    pub working_cols: Vec<String>,
    t0: Instant,
    registered: (usize, usize),
    update_cooldown_count: usize,
    palette: Palette,
    options: LogFrameOptions,
}

impl<S: SheetStore> LogFrame<S> {
    pub fn new(store: S, primary_value: impl Into<String>) -> Self {
        Self::with_options(store, primary_value, LogFrameOptions::default())
    }

    pub fn with_options(store: S, primary_value: impl Into<String>, options: LogFrameOptions) -> Self {
        let df_sheet = store.frame().clone();
        Self {
            df_sheet0: df_sheet.clone(),
            df_sheet,
            store,
            primary_value: primary_value.into(),
            primary_colname: options.primary_colname.clone(),
            working_col: String::new(),
            working_cols: Vec::new(),
            t0: Instant::now(),
            registered: (0, 0),
            update_cooldown_count: 0,
            palette: Palette::default(),
            options,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn df_sheet(&self) -> &DataFrame {
        &self.df_sheet
    }

    /// Contents as of the last successful push.
    pub fn baseline(&self) -> &DataFrame {
        &self.df_sheet0
    }

    pub fn primary_colname(&self) -> &str {
        &self.primary_colname
    }

    /// `(count, failed)` of the last successful push.
    pub fn registered(&self) -> (usize, usize) {
        self.registered
    }

    pub fn palette(&self) -> &Palette {
        &self.palette
    }

    /// Makes `col` the working column, appending it to the stage order if new.
    pub fn set_working_col(&mut self, col: impl Into<String>) {
        let col = col.into();
        if !self.working_cols.contains(&col) {
            self.working_cols.push(col.clone());
        }
        self.working_col = col;
    }

    fn column_or_working(&self, col: Option<&str>) -> String {
        match col {
            Some(col) if !col.is_empty() => col.to_string(),
            _ => self.working_col.clone(),
        }
    }

    /// Rows whose primary key matches `primary_value` and every filter.
    fn addressed_rows(&self, filters: &[Filter]) -> Vec<usize> {
        if self.primary_value.trim().is_empty() {
            warning_message!("No primary value given");
        }
        let Some(primary) = self.df_sheet.column_index(&self.primary_colname) else {
            livelog!(level: Level::Warn, "no primary column {}", self.primary_colname);
            return Vec::new();
        };
        let filter_cols: Vec<_> = filters
            .iter()
            .map(|f| (f, self.df_sheet.column_index(&f.column)))
            .collect();
        let primary_value = self.primary_value.trim();

        (0..self.df_sheet.height())
            .filter(|&row| self.df_sheet.cell(row, primary).map(str::trim) == Some(primary_value))
            .filter(|&row| {
                filter_cols
                    .iter()
                    .all(|(f, col)| f.matches(col.and_then(|col| self.df_sheet.cell(row, col))))
            })
            .collect()
    }

    /// Writes `value` into the working column (or `col`) of the addressed row.
    pub fn put_value(&mut self, value: impl fmt::Display, col: Option<&str>, count: usize) -> usize {
        self.put_value_where(value, col, count, &[], WriteMode::Overwrite)
    }

    /// Like [`LogFrame::put_value`], but leaves cells that already hold a value alone.
    pub fn fill_value(&mut self, value: impl fmt::Display, col: Option<&str>, count: usize) -> usize {
        self.put_value_where(value, col, count, &[], WriteMode::FillEmpty)
    }

    /// Returns `count + 1` when at least one row was written, else `count`.
    pub fn put_value_where(
        &mut self,
        value: impl fmt::Display,
        col: Option<&str>,
        count: usize,
        filters: &[Filter],
        mode: WriteMode,
    ) -> usize {
        let colname = self.column_or_working(col);
        let rows = self.addressed_rows(filters);
        if rows.is_empty() {
            livelog!(level: Level::Warn, "{} not found in {}", self.primary_value, self.primary_colname);
            return count;
        }

        if mode == WriteMode::FillEmpty {
            if let Some(idx) = self.df_sheet.column_index(&colname) {
                let current: Vec<&str> = rows
                    .iter()
                    .filter_map(|&row| self.df_sheet.cell(row, idx))
                    .collect();
                if current.iter().any(|v| !v.trim().is_empty()) {
                    skip_message!("not updating {} {:?}", self.primary_value, current);
                    livelog!("not updating {} {:?}", self.primary_value, current);
                    return count;
                }
            }
        }

        let idx = self.df_sheet.ensure_column(&colname);
        let value = value.to_string();
        for row in rows {
            self.df_sheet.set(row, idx, value.as_str());
        }
        count + 1
    }

    /// Trimmed value of the working column (or `col`) in the addressed row, `""` if none.
    pub fn get_value(&self, col: Option<&str>) -> String {
        self.get_value_where(col, &[])
    }

    pub fn get_value_where(&self, col: Option<&str>, filters: &[Filter]) -> String {
        let colname = self.column_or_working(col);
        let Some(idx) = self.df_sheet.column_index(&colname) else {
            return String::new();
        };
        self.addressed_rows(filters)
            .first()
            .and_then(|&row| self.df_sheet.cell(row, idx))
            .map(|v| v.trim().to_string())
            .unwrap_or_default()
    }

    pub fn isvalue(&self, value: impl fmt::Display, col: Option<&str>) -> bool {
        value.to_string() == self.get_value(col)
    }

    /// Whether the addressed row's value occurs exactly once in its column.
    pub fn isval_unique(&self, col: Option<&str>) -> bool {
        let colname = self.column_or_working(col);
        let value = self.get_value(Some(&colname));
        self.df_sheet
            .column(&colname)
            .map(|cells| cells.filter(|cell| cell.trim() == value).count() == 1)
            .unwrap_or(false)
    }

    /// Stage before the working column, if any.
    pub fn get_previous_working_col(&self) -> Option<&str> {
        if self.working_cols.len() < 2 {
            return None;
        }
        let idx = self.working_cols.iter().position(|c| *c == self.working_col)?;
        idx.checked_sub(1).map(|prev| self.working_cols[prev].as_str())
    }

    /// Pushes the local changes when `(count, failed)` moved since the last
    /// push. Consecutive pushes are spaced by the minimum update interval.
    pub async fn update_sheet(&mut self, count: usize, failed: usize, by_cell: bool) -> SyncOutcome {
        let outcome = if (count, failed) != self.registered {
            let interval = self.options.min_update_interval;
            if self.t0.elapsed() <= interval && self.update_cooldown_count >= 1 {
                tokio::time::sleep(interval).await;
                self.update_cooldown_count = 0;
            }

            let pushed = if by_cell {
                let cells = self.df_sheet.diff(&self.df_sheet0);
                self.store.update_cells(&self.df_sheet, &cells).await
            } else {
                self.store.update(&self.df_sheet).await
            };

            match pushed {
                Ok(written) => {
                    self.update_cooldown_count += 1;
                    self.registered = (count, failed);
                    self.df_sheet0 = self.df_sheet.clone();
                    SyncOutcome::Pushed(written)
                }
                Err(err) => {
                    error_message!("failed to update on google sheet: {}", err.user_message());
                    let err = anyhow::Error::new(err);
                    livelog!(fail: &err, "failed to update on google sheet");
                    let comment_col = self.options.comment_col.clone();
                    let failed = self.put_value(format!("failed:{err}"), Some(&comment_col), failed);
                    let backup = self.write_backup();
                    SyncOutcome::Failed { failed, backup }
                }
            }
        } else {
            skip_message!("no new counts since the last update");
            livelog!(level: Level::Debug, "skipped");
            SyncOutcome::Skipped
        };
        self.t0 = Instant::now();
        outcome
    }

    fn write_backup(&self) -> Option<PathBuf> {
        let path = self.options.backup_csv.clone();
        match self.df_sheet.write_csv(&path) {
            Ok(()) => {
                livelog!("frame saved to {}", path.display());
                Some(path)
            }
            Err(err) => {
                livelog!(fail: &err, "could not write backup");
                None
            }
        }
    }

    pub(crate) fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub(crate) fn sheet_id(&self) -> i64 {
        self.store.sheet_id()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sheets::LocalSheet;
    use tempfile::TempDir;

    fn frame() -> DataFrame {
        let mut df = DataFrame::new(["FILE_NAME", "stage1", "stage2"]);
        df.push_row([" a.fits ", "True", ""]);
        df.push_row(["b.fits", "False", "3m 2s"]);
        df.push_row(["b.fits", "True", ""]);
        df
    }

    fn logframe(primary_value: &str) -> LogFrame<LocalSheet> {
        let options = LogFrameOptions::builder()
            .min_update_interval(Duration::from_millis(50))
            .build();
        let mut lf = LogFrame::with_options(LocalSheet::new(frame()), primary_value, options);
        lf.working_cols = vec!["stage1".to_string(), "stage2".to_string()];
        lf.working_col = "stage2".to_string();
        lf
    }

    #[test]
    fn test_put_and_get_value() {
        let mut lf = logframe("a.fits");
        assert_eq!(lf.put_value("12m 5s", None, 0), 1);
        assert_eq!(lf.get_value(None), "12m 5s");
        assert_eq!(lf.get_value(Some("stage1")), "True");
        assert!(lf.isvalue("True", Some("stage1")));
        assert!(!lf.isvalue("False", Some("stage1")));

        assert_eq!(lf.put_value("done", Some("stage3"), 1), 2);
        assert_eq!(lf.df_sheet().columns().last().unwrap(), "stage3");
        assert_eq!(lf.get_value(Some("stage3")), "done");
    }

    #[test]
    fn test_unmatched_primary_value() {
        let mut lf = logframe("missing.fits");
        assert_eq!(lf.put_value("x", None, 4), 4);
        assert_eq!(lf.get_value(None), "");
        assert_eq!(lf.df_sheet(), &frame());
    }

    #[test]
    fn test_fill_value_keeps_existing() {
        let mut lf = logframe("b.fits");
        assert_eq!(lf.fill_value("9m 9s", None, 0), 0);
        assert_eq!(lf.get_value(None), "3m 2s");

        lf.primary_value = "a.fits".to_string();
        assert_eq!(lf.fill_value("9m 9s", None, 0), 1);
        assert_eq!(lf.get_value(None), "9m 9s");
    }

    #[test]
    fn test_filters_select_rows() {
        let mut lf = logframe("b.fits");
        let pending = [Filter::eq("stage1", "True")];
        assert_eq!(
            lf.put_value_where("1m 1s", None, 0, &pending, WriteMode::Overwrite),
            1
        );
        assert_eq!(lf.df_sheet().cell(1, 2), Some("3m 2s"));
        assert_eq!(lf.df_sheet().cell(2, 2), Some("1m 1s"));
        assert_eq!(lf.get_value_where(None, &pending), "1m 1s");
        assert_eq!(lf.get_value_where(None, &[Filter::ne("stage1", "True")]), "3m 2s");
    }

    #[test]
    fn test_isval_unique() {
        let lf = logframe("b.fits");
        assert!(!lf.isval_unique(Some("FILE_NAME")));
        assert!(lf.isval_unique(Some("stage2")));
        let lf = logframe("a.fits");
        assert!(lf.isval_unique(Some("FILE_NAME")));
        assert!(!lf.isval_unique(Some("stage1")));
    }

    #[test]
    fn test_previous_working_col() {
        let mut lf = logframe("a.fits");
        assert_eq!(lf.get_previous_working_col(), Some("stage1"));
        lf.working_col = "stage1".to_string();
        assert_eq!(lf.get_previous_working_col(), None);
        lf.set_working_col("stage3");
        assert_eq!(lf.working_cols, ["stage1", "stage2", "stage3"]);
        assert_eq!(lf.get_previous_working_col(), Some("stage2"));
        lf.working_cols.truncate(1);
        assert_eq!(lf.get_previous_working_col(), None);
    }

    #[tokio::test]
    async fn test_update_sheet_pushes_changes_once() {
        let mut lf = logframe("a.fits");
        let count = lf.put_value("4m 1s", None, 0);

        assert_eq!(lf.update_sheet(count, 0, true).await, SyncOutcome::Pushed(1));
        assert_eq!(lf.registered(), (1, 0));
        assert_eq!(lf.store().frame(), lf.df_sheet());
        assert_eq!(lf.baseline(), lf.df_sheet());

        assert_eq!(lf.update_sheet(count, 0, true).await, SyncOutcome::Skipped);
        assert_eq!(lf.store().pushes(), 1);
    }

    #[tokio::test]
    async fn test_update_sheet_cooldown() {
        let mut lf = logframe("a.fits");
        let count = lf.put_value("1", None, 0);
        lf.update_sheet(count, 0, false).await;

        let count = lf.put_value("2", None, count);
        let started = Instant::now();
        assert_eq!(lf.update_sheet(count, 0, false).await, SyncOutcome::Pushed(4));
        assert!(started.elapsed() >= Duration::from_millis(50));
        assert_eq!(lf.store().pushes(), 2);
    }

    #[tokio::test]
    async fn test_update_sheet_failure_backs_up() {
        let tmp = TempDir::new().unwrap();
        let backup = tmp.path().join("df_sheet.csv");
        let options = LogFrameOptions::builder()
            .backup_csv(backup.clone())
            .min_update_interval(Duration::ZERO)
            .build();
        let mut sheet = LocalSheet::new(frame());
        sheet.reject_writes(Some(500));
        let mut lf = LogFrame::with_options(sheet, "a.fits", options);
        lf.working_col = "stage2".to_string();

        let count = lf.put_value("4m 1s", None, 0);
        let outcome = lf.update_sheet(count, 0, true).await;

        assert_eq!(
            outcome,
            SyncOutcome::Failed {
                failed: 1,
                backup: Some(backup.clone())
            }
        );
        assert!(lf.get_value(Some("Comment4")).starts_with("failed:"));
        assert_eq!(lf.registered(), (0, 0));
        let csv = std::fs::read_to_string(&backup).unwrap();
        assert!(csv.starts_with(",FILE_NAME,stage1,stage2,Comment4\n"));
    }
}
