use log::{LevelFilter, Log, Metadata, Record};

/// Fans every record out to several loggers. Each logger filters on its own;
/// `max_level` caps what reaches any of them.
pub struct MultiLogger {
    loggers: Vec<Box<dyn Log>>,
    max_level: LevelFilter,
}

impl Default for MultiLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl MultiLogger {
    pub fn new() -> Self {
        Self {
            loggers: Vec::new(),
            max_level: LevelFilter::Trace,
        }
    }

    pub fn with_logger(mut self, logger: Box<dyn Log>) -> Self {
        self.loggers.push(logger);
        self
    }

    pub fn with_max_level(mut self, max_level: LevelFilter) -> Self {
        self.max_level = max_level;
        self
    }

    pub fn add_logger(&mut self, logger: Box<dyn Log>) {
        self.loggers.push(logger);
    }

    pub fn init(self) -> Result<(), log::SetLoggerError> {
        log::set_max_level(self.max_level);
        log::set_boxed_logger(Box::new(self))
    }
}

impl Log for MultiLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.max_level && self.loggers.iter().any(|l| l.enabled(metadata))
    }

    fn log(&self, record: &Record) {
        if record.level() > self.max_level {
            return;
        }

        self.loggers
            .iter()
            .filter(|l| l.enabled(record.metadata()))
            .for_each(|l| l.log(record));
    }

    fn flush(&self) {
        self.loggers.iter().for_each(|l| l.flush());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    use log::Level;

    /// Counts the records it accepts up to `level`.
    struct CountingLogger {
        level: LevelFilter,
        count: Arc<AtomicUsize>,
    }

    impl CountingLogger {
        fn boxed(level: LevelFilter) -> (Box<dyn Log>, Arc<AtomicUsize>) {
            let count = Arc::new(AtomicUsize::new(0));
            let logger = Box::new(Self {
                level,
                count: count.clone(),
            });
            (logger, count)
        }
    }

    impl Log for CountingLogger {
        fn enabled(&self, metadata: &Metadata) -> bool {
            metadata.level() <= self.level
        }

        fn log(&self, _: &Record) {
            self.count.fetch_add(1, Ordering::Relaxed);
        }

        fn flush(&self) {}
    }

    fn record(level: Level) -> Record<'static> {
        Record::builder().level(level).build()
    }

    #[test]
    fn test_enabled() {
        let (off, _) = CountingLogger::boxed(LevelFilter::Off);
        let (info, _) = CountingLogger::boxed(LevelFilter::Info);

        let multi_logger = MultiLogger::new().with_logger(off);
        assert!(
            !multi_logger.enabled(&Metadata::builder().level(Level::Error).build()),
            "No logger accepts anything"
        );

        let multi_logger = multi_logger.with_logger(info);
        assert!(multi_logger.enabled(&Metadata::builder().level(Level::Info).build()));
        assert!(!multi_logger.enabled(&Metadata::builder().level(Level::Debug).build()));
    }

    #[test]
    fn test_each_logger_filters() {
        let (stderr, stderr_count) = CountingLogger::boxed(LevelFilter::Info);
        let (file, file_count) = CountingLogger::boxed(LevelFilter::Trace);

        let multi_logger = MultiLogger::new().with_logger(stderr).with_logger(file);
        multi_logger.log(&record(Level::Info));
        multi_logger.log(&record(Level::Trace));

        assert_eq!(stderr_count.load(Ordering::Relaxed), 1);
        assert_eq!(file_count.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn test_max_level_caps_all_loggers() {
        let (file, file_count) = CountingLogger::boxed(LevelFilter::Trace);

        let mut multi_logger = MultiLogger::new().with_max_level(LevelFilter::Warn);
        multi_logger.add_logger(file);
        multi_logger.log(&record(Level::Info));
        multi_logger.log(&record(Level::Error));

        assert_eq!(file_count.load(Ordering::Relaxed), 1);
    }
}
