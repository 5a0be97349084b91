use std::{path::Path, process::Command};

use anyhow::{Context, Error};
use log::info;

use strata_api::devicegraph::kinds::bcache::CacheMode;

use crate::runner::CommandRunner;

/// Formats `device` as a bcache backing device.
pub fn make_backing(
    runner: &dyn CommandRunner,
    device: &Path,
    cache_mode: CacheMode,
) -> Result<(), Error> {
    info!("Creating bcache backing device on '{}'", device.display());
    let mut cmd = Command::new("make-bcache");
    cmd.arg("--wipe-bcache");
    // make-bcache only knows writeback; other modes are the kernel default
    // or are switched through sysfs once the device is registered.
    if cache_mode == CacheMode::Writeback {
        cmd.arg("--writeback");
    }
    runner
        .run(cmd.arg("-B").arg(device))
        .map(|_| ())
        .with_context(|| format!("Failed to create bcache on '{}'", device.display()))
}

/// Formats `device` as a caching device, creating a new cache set.
pub fn make_cache(runner: &dyn CommandRunner, device: &Path, cset_uuid: &str) -> Result<(), Error> {
    info!("Creating bcache cache set on '{}'", device.display());
    let mut cmd = Command::new("make-bcache");
    cmd.arg("--wipe-bcache");
    if !cset_uuid.is_empty() {
        cmd.arg("--cset-uuid").arg(cset_uuid);
    }
    runner
        .run(cmd.arg("-C").arg(device))
        .map(|_| ())
        .with_context(|| format!("Failed to create bcache cache set on '{}'", device.display()))
}

/// Attaches the cache set `cset_uuid` to the bcache device `bcache`.
pub fn attach(runner: &dyn CommandRunner, bcache: &Path, cset_uuid: &str) -> Result<(), Error> {
    runner
        .run(
            Command::new("bcache")
                .arg("attach")
                .arg(cset_uuid)
                .arg(bcache),
        )
        .map(|_| ())
        .with_context(|| {
            format!(
                "Failed to attach cache set '{cset_uuid}' to '{}'",
                bcache.display()
            )
        })
}

pub fn detach(runner: &dyn CommandRunner, bcache: &Path) -> Result<(), Error> {
    runner
        .run(Command::new("bcache").arg("detach").arg(bcache))
        .map(|_| ())
        .with_context(|| format!("Failed to detach cache set from '{}'", bcache.display()))
}

/// Stops a bcache device or cache set and releases its underlying device.
pub fn unregister(runner: &dyn CommandRunner, device: &Path) -> Result<(), Error> {
    runner
        .run(Command::new("bcache").arg("unregister").arg(device))
        .map(|_| ())
        .with_context(|| format!("Failed to unregister bcache '{}'", device.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::testutils::recording::RecordingRunner;

    #[test]
    fn test_bcache_commands() {
        let runner = RecordingRunner::new();
        make_backing(&runner, Path::new("/dev/sda2"), CacheMode::Writeback).unwrap();
        make_cache(&runner, Path::new("/dev/nvme0n1p1"), "").unwrap();
        attach(&runner, Path::new("/dev/bcache0"), "f00d").unwrap();
        assert_eq!(
            runner.commands(),
            vec![
                "make-bcache --wipe-bcache --writeback -B /dev/sda2",
                "make-bcache --wipe-bcache -C /dev/nvme0n1p1",
                "bcache attach f00d /dev/bcache0",
            ]
        );
    }
}
