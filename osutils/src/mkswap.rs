use std::{path::Path, process::Command};

use anyhow::{Context, Error};

use crate::runner::CommandRunner;

pub fn run(runner: &dyn CommandRunner, device_path: &Path, label: &str, uuid: &str) -> Result<(), Error> {
    let mut cmd = Command::new("mkswap");
    if !label.is_empty() {
        cmd.arg("--label").arg(label);
    }
    if !uuid.is_empty() {
        cmd.arg("--uuid").arg(uuid);
    }
    runner
        .run(cmd.arg(device_path))
        .map(|_| ())
        .context("Failed to execute mkswap")
}

pub fn swapon(runner: &dyn CommandRunner, device_path: &Path) -> Result<(), Error> {
    runner
        .run(Command::new("swapon").arg(device_path))
        .map(|_| ())
        .with_context(|| format!("Failed to enable swap on '{}'", device_path.display()))
}

pub fn swapoff(runner: &dyn CommandRunner, device_path: &Path) -> Result<(), Error> {
    runner
        .run(Command::new("swapoff").arg(device_path))
        .map(|_| ())
        .with_context(|| format!("Failed to disable swap on '{}'", device_path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::testutils::recording::RecordingRunner;

    #[test]
    fn test_swap_commands() {
        let runner = RecordingRunner::new();
        let dev = Path::new("/dev/vda3");
        run(&runner, dev, "swap", "").unwrap();
        swapon(&runner, dev).unwrap();
        swapoff(&runner, dev).unwrap();
        assert_eq!(
            runner.commands(),
            vec![
                "mkswap --label swap /dev/vda3",
                "swapon /dev/vda3",
                "swapoff /dev/vda3"
            ]
        );
    }
}
