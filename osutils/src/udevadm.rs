use std::{path::Path, process::Command, time::Duration};

use anyhow::{Context, Error};

use crate::runner::CommandRunner;

pub fn settle(runner: &dyn CommandRunner) -> Result<(), Error> {
    runner
        .run(Command::new("udevadm").arg("settle"))
        .map(|_| ())
        .context("Failed to settle udev")
}

/// Waits until udev has created the node at `path`, or `timeout` elapses.
pub fn wait(runner: &dyn CommandRunner, path: &Path, timeout: Duration) -> Result<(), Error> {
    runner
        .run(
            Command::new("udevadm")
                .arg("wait")
                .arg("--settle")
                .arg(format!("--timeout={}", timeout.as_secs()))
                .arg(path),
        )
        .map(|_| ())
        .with_context(|| format!("Failed to wait for '{}' to appear", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::testutils::recording::RecordingRunner;

    #[test]
    fn test_wait() {
        let runner = RecordingRunner::new();
        settle(&runner).unwrap();
        wait(&runner, Path::new("/dev/md0"), Duration::from_secs(30)).unwrap();
        assert_eq!(
            runner.commands(),
            vec![
                "udevadm settle",
                "udevadm wait --settle --timeout=30 /dev/md0"
            ]
        );
    }
}
