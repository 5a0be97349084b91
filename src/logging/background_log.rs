use std::{fs::File, io::Write, path::Path, sync::Mutex};

use log::{LevelFilter, Log, Record};

use osutils::files;

use super::LogEntry;

/// Writes every record as one JSON line to a file, so a commit run can be
/// inspected after the fact. The file is truncated when the logger is created.
pub struct BackgroundLog {
    target: Option<Mutex<File>>,
    max_level: LevelFilter,
}

impl BackgroundLog {
    pub fn new(target: impl AsRef<Path>) -> Self {
        let file = match files::create_file(target.as_ref()) {
            Ok(f) => Some(Mutex::new(f)),
            Err(err) => {
                eprintln!(
                    "Logging setup error: failed to create background log file: {:?}",
                    err
                );
                None
            }
        };

        Self {
            max_level: LevelFilter::Trace,
            target: file,
        }
    }

    pub fn with_max_level(self, max_level: LevelFilter) -> Self {
        Self { max_level, ..self }
    }

    pub fn into_logger(self) -> Box<dyn Log> {
        Box::new(self)
    }

    /// Best effort attempt to write the log entry to the file
    fn write_entry(&self, record: &Record) -> Result<(), Box<dyn std::error::Error + '_>> {
        if let Some(file) = self.target.as_ref() {
            let mut serialized = serde_json::to_string(&LogEntry::from(record))?;
            serialized.push('\n');

            let mut file_lock = file.lock()?;
            file_lock.write_all(serialized.as_bytes())?;
        }

        Ok(())
    }
}

impl Log for BackgroundLog {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        self.target.is_some() && metadata.level() <= self.max_level
    }

    fn log(&self, record: &Record) {
        let _ = self.write_entry(record);
    }

    fn flush(&self) {
        if let Some(Ok(mut file)) = self.target.as_ref().map(|f| f.lock()) {
            let _ = file.flush();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use log::Level;
    use tempfile::tempdir;

    use super::{super::Level as EntryLevel, *};

    #[test]
    fn test_filter() {
        let test_dir = tempdir().unwrap();
        let logger = BackgroundLog::new(test_dir.path().join("commit.log"))
            .with_max_level(LevelFilter::Info)
            .into_logger();

        assert!(logger.enabled(&log::Metadata::builder().level(Level::Info).build()));
        assert!(!logger.enabled(&log::Metadata::builder().level(Level::Debug).build()));
    }

    #[test]
    fn test_disabled_when_file_cannot_be_created() {
        let test_dir = tempdir().unwrap();
        // A directory cannot be opened as the log file
        let log = BackgroundLog::new(test_dir.path());
        assert!(log.target.is_none());
        let logger = log.into_logger();
        assert!(!logger.enabled(&log::Metadata::builder().level(Level::Error).build()));
    }

    #[test]
    fn test_truncates_previous_run() {
        let test_dir = tempdir().unwrap();
        let target = test_dir.path().join("var/log/strata-commit.log");
        files::write_atomic(&target, b"previous run\n").unwrap();

        let logger = BackgroundLog::new(&target).into_logger();
        logger.log(
            &Record::builder()
                .args(format_args!("Deleting partition /dev/sda2"))
                .level(Level::Info)
                .build(),
        );
        logger.flush();

        let content = fs::read_to_string(&target).unwrap();
        assert!(!content.contains("previous run"));
        assert_eq!(content.lines().count(), 1);
    }

    #[test]
    fn test_writes_json_lines() {
        let test_dir = tempdir().unwrap();
        let target = test_dir.path().join("commit.log");
        let logger = BackgroundLog::new(&target).into_logger();

        for message in ["Creating partition /dev/sda1", "Mounting /dev/sda1 at /data"] {
            logger.log(
                &Record::builder()
                    .args(format_args!("{message}"))
                    .level(Level::Info)
                    .target("strata::engine::commit")
                    .module_path(Some("strata::engine::commit"))
                    .file(Some(file!()))
                    .line(Some(42))
                    .build(),
            );
        }
        logger.flush();

        let content = fs::read_to_string(target).unwrap();
        let entries = content
            .lines()
            .map(|line| serde_json::from_str::<LogEntry>(line).unwrap())
            .collect::<Vec<_>>();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].level, EntryLevel::Info);
        assert_eq!(entries[1].message, "Mounting /dev/sda1 at /data");
        assert_eq!(entries[1].target, "strata::engine::commit");
        assert_eq!(entries[1].file, file!());
        assert_eq!(entries[1].line, 42);
    }
}
