//! In-memory ring buffer of formatted log lines.
//!
//! Every component records its progress here through [`livelog!`](crate::livelog!) so a
//! caller can show the recent history of a run (the CLI prints it with `--verbose`).
//! Each line is mirrored into `tracing`, which ends up in the log file.
use crate::constants::LIVE_LOG_CAPACITY;
use std::collections::VecDeque;
use std::fmt;
use std::sync::{LazyLock, Mutex, PoisonError};

pub static LIVE_LOG: LazyLock<Mutex<LiveLog>> =
    LazyLock::new(|| Mutex::new(LiveLog::new(LIVE_LOG_CAPACITY)));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Debug,
    Info,
    Warn,
    Severe,
    Fail,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Level::Debug => "DEBUG",
            Level::Info => "INFO",
            Level::Warn => "WARN",
            Level::Severe => "SEVERE",
            Level::Fail => "FAIL",
        };
        f.write_str(label)
    }
}

#[derive(Debug)]
pub struct LiveLog {
    buffer: VecDeque<String>,
    capacity: usize,
}

impl LiveLog {
    pub fn new(max_logs: usize) -> Self {
        let capacity = max_logs.max(1);
        let mut log = LiveLog {
            buffer: VecDeque::with_capacity(capacity),
            capacity,
        };
        log.push(format!(
            "ALFRD ({}) - Log started",
            env!("CARGO_PKG_VERSION")
        ));
        log
    }

    pub fn log(&mut self, level: Level, service: &str, msg: impl fmt::Display) {
        let timestamp = chrono::Local::now().format("%Y-%m-%dT%H:%M:%S");
        self.push(format!("{timestamp} {level} {service}:: {msg}"));
    }

    /// Records a `FAIL` line followed by the cause chain of `err`.
    pub fn log_failure(&mut self, service: &str, msg: impl fmt::Display, err: &anyhow::Error) {
        self.log(Level::Fail, service, msg);
        for cause in err.chain() {
            let cause = cause.to_string();
            if !cause.is_empty() {
                self.push(format!("    caused by: {cause}"));
            }
        }
    }

    fn push(&mut self, line: String) {
        while self.buffer.len() >= self.capacity {
            self.buffer.pop_front();
        }
        self.buffer.push_back(line);
    }

    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.buffer.iter().map(String::as_str)
    }

    pub fn last(&self) -> Option<&str> {
        self.buffer.back().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Changes the capacity; shrinking drops the oldest lines.
    pub fn set_capacity(&mut self, max_logs: usize) {
        self.capacity = max_logs.max(1);
        while self.buffer.len() > self.capacity {
            self.buffer.pop_front();
        }
    }

    pub fn dump(&self) -> String {
        self.buffer.iter().cloned().collect::<Vec<_>>().join("\n")
    }
}

/// Shortens `alfrd::project::configuration` to `project::configuration`.
pub fn service_name(module_path: &str) -> &str {
    module_path
        .split_once("::")
        .map(|(_, rest)| rest)
        .unwrap_or(module_path)
}

/// Appends a line to [`LIVE_LOG`] and mirrors it to `tracing`.
pub fn record(level: Level, module_path: &str, msg: String) {
    let service = service_name(module_path);
    match level {
        Level::Debug => tracing::debug!(target: "alfrd::livelog", "{service}:: {msg}"),
        Level::Info => tracing::info!(target: "alfrd::livelog", "{service}:: {msg}"),
        Level::Warn => tracing::warn!(target: "alfrd::livelog", "{service}:: {msg}"),
        Level::Severe | Level::Fail => {
            tracing::error!(target: "alfrd::livelog", "{service}:: {msg}")
        }
    }
    LIVE_LOG
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .log(level, service, msg);
}

pub fn record_failure(module_path: &str, msg: String, err: &anyhow::Error) {
    let service = service_name(module_path);
    tracing::error!(target: "alfrd::livelog", "{service}:: {msg}: {err:#}");
    LIVE_LOG
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .log_failure(service, msg, err);
}

pub fn set_capacity(max_logs: usize) {
    LIVE_LOG
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .set_capacity(max_logs);
}

pub fn dump() -> String {
    LIVE_LOG.lock().unwrap_or_else(PoisonError::into_inner).dump()
}

/// Records a line in the live log. The level defaults to `INFO`:
///
/// ```ignore
/// livelog!("found projects : {:?}", projects);
/// livelog!(level: Level::Severe, "project {} not found!", name);
/// livelog!(fail: &err, "FAILED!");
/// ```
#[macro_export]
macro_rules! livelog {
    (level: $level:expr, $($arg:tt)+) => {
        $crate::livelog::record($level, module_path!(), format!($($arg)+))
    };
    (fail: $err:expr, $($arg:tt)+) => {
        $crate::livelog::record_failure(module_path!(), format!($($arg)+), $err)
    };
    ($($arg:tt)+) => {
        $crate::livelog::record($crate::livelog::Level::Info, module_path!(), format!($($arg)+))
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{anyhow, Context};

    #[test]
    fn test_first_line_is_banner() {
        let log = LiveLog::new(10);
        assert_eq!(log.len(), 1);
        let first = log.lines().next().unwrap();
        assert!(first.starts_with("ALFRD ("));
        assert!(first.ends_with(") - Log started"));
    }

    #[test]
    fn test_line_format() {
        let mut log = LiveLog::new(10);
        log.log(Level::Warn, "project::project", "previous project was not cleared.");
        let line = log.last().unwrap();

        // 2024-01-31T12:00:00 WARN project::project:: previous project was not cleared.
        let (timestamp, rest) = line.split_once(' ').unwrap();
        assert_eq!(timestamp.len(), 19);
        assert!(chrono::NaiveDateTime::parse_from_str(timestamp, "%Y-%m-%dT%H:%M:%S").is_ok());
        assert_eq!(rest, "WARN project::project:: previous project was not cleared.");
    }

    #[test]
    fn test_ring_buffer_evicts_oldest() {
        let mut log = LiveLog::new(3);
        for i in 0..5 {
            log.log(Level::Info, "test", i);
        }
        assert_eq!(log.len(), 3);
        let lines: Vec<_> = log.lines().collect();
        assert!(lines[0].ends_with(":: 2"));
        assert!(lines[2].ends_with(":: 4"));
    }

    #[test]
    fn test_set_capacity_shrinks() {
        let mut log = LiveLog::new(10);
        for i in 0..6 {
            log.log(Level::Info, "test", i);
        }
        log.set_capacity(2);
        assert_eq!(log.capacity(), 2);
        assert_eq!(log.len(), 2);
        assert!(log.last().unwrap().ends_with(":: 5"));
    }

    #[test]
    fn test_failure_appends_cause_chain() {
        let mut log = LiveLog::new(10);
        let err = Err::<(), _>(anyhow!("disk full"))
            .context("writing config.yaml")
            .unwrap_err();
        log.log_failure("project::project", "FAILED!", &err);

        let lines: Vec<_> = log.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[1].contains(" FAIL project::project:: FAILED!"));
        assert_eq!(lines[2], "    caused by: writing config.yaml");
        assert_eq!(lines[3], "    caused by: disk full");
    }

    #[test]
    fn test_service_name() {
        assert_eq!(service_name("alfrd::project::configuration"), "project::configuration");
        assert_eq!(service_name("alfrd"), "alfrd");
    }
}
