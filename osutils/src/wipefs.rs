use std::{path::Path, process::Command};

use anyhow::{Context, Error};
use log::debug;

use crate::runner::CommandRunner;

/// Erases every filesystem, RAID and partition-table signature on `device`.
pub fn all(runner: &dyn CommandRunner, device: &Path) -> Result<(), Error> {
    debug!("Wiping signatures from '{}'", device.display());
    runner
        .run(Command::new("wipefs").arg("--all").arg(device))
        .map(|_| ())
        .with_context(|| format!("Failed to wipe device '{}'", device.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::testutils::recording::RecordingRunner;

    #[test]
    fn test_all() {
        let runner = RecordingRunner::new();
        all(&runner, Path::new("/dev/sdb")).unwrap();
        assert_eq!(runner.commands(), vec!["wipefs --all /dev/sdb"]);

        runner.fail_on("wipefs");
        let err = all(&runner, Path::new("/dev/sdc")).unwrap_err();
        assert_eq!(err.to_string(), "Failed to wipe device '/dev/sdc'");
    }
}
