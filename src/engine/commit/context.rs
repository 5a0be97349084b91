use std::{
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use osutils::runner::CommandRunner;

use crate::config::{self, EngineConfig};

/// Everything a commit needs from its environment. Built once per commit and
/// handed to every action.
pub struct CommitContext<'a> {
    /// Runs every external command of the commit.
    pub runner: &'a dyn CommandRunner,

    /// Directory the target system is mounted at. Mount points and fstab are
    /// resolved below it.
    pub rootprefix: PathBuf,

    /// Absolute path of the fstab file to update.
    pub fstab_path: PathBuf,

    /// How long to wait for the node of a new device.
    pub udev_timeout: Duration,

    /// Set from another thread to stop the commit before the next action.
    pub cancel: Option<Arc<AtomicBool>>,
}

impl<'a> CommitContext<'a> {
    pub fn new(runner: &'a dyn CommandRunner, config: &EngineConfig) -> Self {
        Self {
            runner,
            rootprefix: config.rootprefix.clone(),
            fstab_path: config.fstab(),
            udev_timeout: config.udev_timeout(),
            cancel: None,
        }
    }

    pub fn with_cancel(self, cancel: Arc<AtomicBool>) -> Self {
        Self {
            cancel: Some(cancel),
            ..self
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::SeqCst))
    }

    /// `path` of the target system as seen from here.
    pub fn in_rootprefix(&self, path: impl AsRef<Path>) -> PathBuf {
        config::in_rootprefix(&self.rootprefix, path)
    }
}

#[cfg(test)]
mod tests {
    use osutils::testutils::recording::RecordingRunner;

    use super::*;

    #[test]
    fn test_context() {
        let runner = RecordingRunner::new();
        let config = EngineConfig {
            rootprefix: PathBuf::from("/mnt/target"),
            ..Default::default()
        };

        let cancel = Arc::new(AtomicBool::new(false));
        let ctx = CommitContext::new(&runner, &config).with_cancel(cancel.clone());
        assert_eq!(ctx.fstab_path, PathBuf::from("/mnt/target/etc/fstab"));
        assert_eq!(ctx.in_rootprefix("/data"), PathBuf::from("/mnt/target/data"));
        assert_eq!(ctx.udev_timeout, Duration::from_secs(120));

        assert!(!ctx.is_cancelled());
        cancel.store(true, Ordering::SeqCst);
        assert!(ctx.is_cancelled());
    }
}
