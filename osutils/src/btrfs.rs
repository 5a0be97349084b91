use std::{path::Path, process::Command};

use anyhow::{Context, Error};

use crate::runner::CommandRunner;

/// Creates subvolume `path` (relative to the top level) inside the btrfs
/// mounted at `mount_dir`.
pub fn subvolume_create(
    runner: &dyn CommandRunner,
    mount_dir: &Path,
    path: &str,
) -> Result<(), Error> {
    let target = mount_dir.join(path.trim_start_matches('/'));
    runner
        .run(Command::new("btrfs").arg("subvolume").arg("create").arg(&target))
        .map(|_| ())
        .with_context(|| format!("Failed to create btrfs subvolume '{}'", target.display()))
}

pub fn subvolume_delete(
    runner: &dyn CommandRunner,
    mount_dir: &Path,
    path: &str,
) -> Result<(), Error> {
    let target = mount_dir.join(path.trim_start_matches('/'));
    runner
        .run(Command::new("btrfs").arg("subvolume").arg("delete").arg(&target))
        .map(|_| ())
        .with_context(|| format!("Failed to delete btrfs subvolume '{}'", target.display()))
}

/// Disables copy-on-write for files created below `dir` from now on.
pub fn set_nocow(runner: &dyn CommandRunner, dir: &Path) -> Result<(), Error> {
    runner
        .run(Command::new("chattr").arg("+C").arg(dir))
        .map(|_| ())
        .with_context(|| format!("Failed to disable copy-on-write for '{}'", dir.display()))
}

pub fn device_add(runner: &dyn CommandRunner, device: &Path, mount_dir: &Path) -> Result<(), Error> {
    runner
        .run(
            Command::new("btrfs")
                .arg("device")
                .arg("add")
                .arg("--force")
                .arg(device)
                .arg(mount_dir),
        )
        .map(|_| ())
        .with_context(|| {
            format!(
                "Failed to add '{}' to btrfs on '{}'",
                device.display(),
                mount_dir.display()
            )
        })
}

pub fn device_remove(
    runner: &dyn CommandRunner,
    device: &Path,
    mount_dir: &Path,
) -> Result<(), Error> {
    runner
        .run(
            Command::new("btrfs")
                .arg("device")
                .arg("remove")
                .arg(device)
                .arg(mount_dir),
        )
        .map(|_| ())
        .with_context(|| {
            format!(
                "Failed to remove '{}' from btrfs on '{}'",
                device.display(),
                mount_dir.display()
            )
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::testutils::recording::RecordingRunner;

    #[test]
    fn test_btrfs_commands() {
        let runner = RecordingRunner::new();
        let mnt = Path::new("/run/strata/btrfs");
        subvolume_create(&runner, mnt, "@/home").unwrap();
        set_nocow(&runner, &mnt.join("@/home")).unwrap();
        device_add(&runner, Path::new("/dev/sdc"), mnt).unwrap();
        device_remove(&runner, Path::new("/dev/sdb"), mnt).unwrap();
        subvolume_delete(&runner, mnt, "/@/var").unwrap();
        assert_eq!(
            runner.commands(),
            vec![
                "btrfs subvolume create /run/strata/btrfs/@/home",
                "chattr +C /run/strata/btrfs/@/home",
                "btrfs device add --force /dev/sdc /run/strata/btrfs",
                "btrfs device remove /dev/sdb /run/strata/btrfs",
                "btrfs subvolume delete /run/strata/btrfs/@/var",
            ]
        );
    }
}
