//! Loggers installed by the `strata` binary: stderr through env_logger, a
//! JSON lines background log of commit runs and a JSON trace file.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub mod background_log;
pub mod multilog;
pub mod trace_file;

/// One line of the background log.
#[derive(Debug, Serialize, Deserialize)]
struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub level: Level,
    pub message: String,
    pub target: String,
    pub module: String,
    pub file: String,
    pub line: u32,
}

#[derive(Debug, Serialize, Deserialize, Copy, Clone, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
enum Level {
    Error = 1,
    Warn = 2,
    Info = 3,
    Debug = 4,
    Trace = 5,
}

impl From<log::Level> for Level {
    fn from(value: log::Level) -> Self {
        match value {
            log::Level::Error => Level::Error,
            log::Level::Warn => Level::Warn,
            log::Level::Info => Level::Info,
            log::Level::Debug => Level::Debug,
            log::Level::Trace => Level::Trace,
        }
    }
}

impl From<&log::Record<'_>> for LogEntry {
    fn from(value: &log::Record) -> Self {
        Self {
            timestamp: Utc::now(),
            level: value.level().into(),
            message: value.args().to_string(),
            target: value.target().to_string(),
            module: value.module_path().unwrap_or_default().to_string(),
            file: value.file().unwrap_or_default().to_string(),
            line: value.line().unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_entry_from_record() {
        let entry = LogEntry::from(
            &log::Record::builder()
                .args(format_args!("Creating partition /dev/sda1"))
                .level(log::Level::Info)
                .target("strata::engine::commit")
                .module_path(Some("strata::engine::commit"))
                .file(Some("src/engine/commit/mod.rs"))
                .line(Some(1))
                .build(),
        );

        assert_eq!(entry.level, Level::Info);
        assert_eq!(entry.message, "Creating partition /dev/sda1");
        assert_eq!(entry.target, "strata::engine::commit");
        assert_eq!(entry.module, "strata::engine::commit");
        assert_eq!(entry.file, "src/engine/commit/mod.rs");
        assert_eq!(entry.line, 1);

        let json = serde_json::to_string(&entry).unwrap();
        assert!(json.contains(r#""level":"info""#));
        let parsed = serde_json::from_str::<LogEntry>(&json).unwrap();
        assert_eq!(parsed.timestamp, entry.timestamp);
    }
}
