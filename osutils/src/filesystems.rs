//! Changes to existing filesystems: label, UUID, tune options and size.

use std::{path::Path, process::Command};

use anyhow::{bail, Context, Error};

use strata_api::{devicegraph::kinds::filesystem::FsType, primitives::bytes::ByteCount};

use crate::{resize2fs, runner::CommandRunner};

pub fn set_label(
    runner: &dyn CommandRunner,
    fs_type: FsType,
    device: &Path,
    label: &str,
) -> Result<(), Error> {
    let mut cmd = match fs_type {
        FsType::Ext2 | FsType::Ext3 | FsType::Ext4 => {
            let mut cmd = Command::new("tune2fs");
            cmd.arg("-L").arg(label).arg(device);
            cmd
        }
        FsType::Xfs => {
            // xfs_admin clears the label when given "--"
            let mut cmd = Command::new("xfs_admin");
            cmd.arg("-L")
                .arg(if label.is_empty() { "--" } else { label })
                .arg(device);
            cmd
        }
        FsType::Btrfs => {
            let mut cmd = Command::new("btrfs");
            cmd.arg("filesystem").arg("label").arg(device).arg(label);
            cmd
        }
        FsType::Vfat => {
            let mut cmd = Command::new("fatlabel");
            cmd.arg(device).arg(label);
            cmd
        }
        FsType::Ntfs => {
            let mut cmd = Command::new("ntfslabel");
            cmd.arg(device).arg(label);
            cmd
        }
        FsType::Swap => {
            let mut cmd = Command::new("swaplabel");
            cmd.arg("-L").arg(label).arg(device);
            cmd
        }
    };

    runner.run(&mut cmd).map(|_| ()).with_context(|| {
        format!("Failed to set label of {fs_type} on '{}'", device.display())
    })
}

pub fn set_uuid(
    runner: &dyn CommandRunner,
    fs_type: FsType,
    device: &Path,
    uuid: &str,
) -> Result<(), Error> {
    let mut cmd = match fs_type {
        FsType::Ext2 | FsType::Ext3 | FsType::Ext4 => {
            let mut cmd = Command::new("tune2fs");
            cmd.arg("-U").arg(uuid);
            cmd
        }
        FsType::Xfs => {
            let mut cmd = Command::new("xfs_admin");
            cmd.arg("-U").arg(uuid);
            cmd
        }
        FsType::Btrfs => {
            let mut cmd = Command::new("btrfstune");
            cmd.arg("-f").arg("-U").arg(uuid);
            cmd
        }
        FsType::Swap => {
            let mut cmd = Command::new("swaplabel");
            cmd.arg("-U").arg(uuid);
            cmd
        }
        FsType::Vfat | FsType::Ntfs => bail!("Cannot set the UUID of a {fs_type} filesystem"),
    };

    runner.run(cmd.arg(device)).map(|_| ()).with_context(|| {
        format!("Failed to set UUID of {fs_type} on '{}'", device.display())
    })
}

/// Applies tune options, e.g. "-c 20 -i 1m", with tune2fs.
pub fn tune(
    runner: &dyn CommandRunner,
    fs_type: FsType,
    device: &Path,
    options: &str,
) -> Result<(), Error> {
    if !fs_type.supports_tune_options() {
        bail!("Cannot tune a {fs_type} filesystem");
    }

    runner
        .run(
            Command::new("tune2fs")
                .args(options.split_whitespace())
                .arg(device),
        )
        .map(|_| ())
        .with_context(|| format!("Failed to tune {fs_type} on '{}'", device.display()))
}

/// Resizes the filesystem on `device` to `size`. xfs and btrfs are resized
/// through their mount point and fail when `mount_path` is `None`. Swap is
/// resized by recreating it, which callers do with `mkswap`.
pub fn resize(
    runner: &dyn CommandRunner,
    fs_type: FsType,
    device: &Path,
    mount_path: Option<&Path>,
    size: ByteCount,
) -> Result<(), Error> {
    let mut cmd = match fs_type {
        FsType::Ext2 | FsType::Ext3 | FsType::Ext4 => {
            return resize2fs::run(runner, device, Some(size), mount_path.is_some());
        }
        FsType::Xfs => {
            let Some(mount_path) = mount_path else {
                bail!("xfs on '{}' must be mounted to be resized", device.display());
            };
            let mut cmd = Command::new("xfs_growfs");
            cmd.arg(mount_path);
            cmd
        }
        FsType::Btrfs => {
            let Some(mount_path) = mount_path else {
                bail!("btrfs on '{}' must be mounted to be resized", device.display());
            };
            let mut cmd = Command::new("btrfs");
            cmd.arg("filesystem")
                .arg("resize")
                .arg(size.bytes().to_string())
                .arg(mount_path);
            cmd
        }
        FsType::Vfat => {
            let mut cmd = Command::new("fatresize");
            cmd.arg("--size").arg(size.bytes().to_string()).arg(device);
            cmd
        }
        FsType::Ntfs => {
            let mut cmd = Command::new("ntfsresize");
            cmd.arg("--force")
                .arg("--size")
                .arg(size.bytes().to_string())
                .arg(device);
            cmd
        }
        FsType::Swap => bail!("Swap on '{}' is resized by recreating it", device.display()),
    };

    runner.run(&mut cmd).map(|_| ()).with_context(|| {
        format!(
            "Failed to resize {fs_type} on '{}' to {}",
            device.display(),
            size.to_human_string()
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::testutils::recording::RecordingRunner;

    #[test]
    fn test_set_label() {
        let runner = RecordingRunner::new();
        let dev = Path::new("/dev/sdb1");
        set_label(&runner, FsType::Ext4, dev, "data").unwrap();
        set_label(&runner, FsType::Xfs, dev, "").unwrap();
        set_label(&runner, FsType::Btrfs, dev, "pool").unwrap();
        set_label(&runner, FsType::Swap, dev, "swap").unwrap();
        assert_eq!(
            runner.commands(),
            vec![
                "tune2fs -L data /dev/sdb1",
                "xfs_admin -L -- /dev/sdb1",
                "btrfs filesystem label /dev/sdb1 pool",
                "swaplabel -L swap /dev/sdb1"
            ]
        );
    }

    #[test]
    fn test_set_uuid() {
        let runner = RecordingRunner::new();
        let dev = Path::new("/dev/sdb1");
        set_uuid(&runner, FsType::Xfs, dev, "abc").unwrap();
        set_uuid(&runner, FsType::Vfat, dev, "abc").unwrap_err();
        assert_eq!(runner.commands(), vec!["xfs_admin -U abc /dev/sdb1"]);
    }

    #[test]
    fn test_tune() {
        let runner = RecordingRunner::new();
        let dev = Path::new("/dev/sdb1");
        tune(&runner, FsType::Ext4, dev, "-c 20 -i 1m").unwrap();
        tune(&runner, FsType::Btrfs, dev, "-c 20").unwrap_err();
        assert_eq!(runner.commands(), vec!["tune2fs -c 20 -i 1m /dev/sdb1"]);
    }

    #[test]
    fn test_resize() {
        let runner = RecordingRunner::new();
        let dev = Path::new("/dev/sdb1");
        let size = ByteCount::from_gib(1);

        resize(&runner, FsType::Xfs, dev, Some(Path::new("/srv")), size).unwrap();
        resize(&runner, FsType::Btrfs, dev, Some(Path::new("/")), size).unwrap();
        resize(&runner, FsType::Ext4, dev, Some(Path::new("/")), size).unwrap();
        assert_eq!(
            runner.commands(),
            vec![
                "xfs_growfs /srv",
                "btrfs filesystem resize 1073741824 /",
                "resize2fs /dev/sdb1 1048576K"
            ]
        );

        resize(&runner, FsType::Xfs, dev, None, size).unwrap_err();
        resize(&runner, FsType::Swap, dev, None, size).unwrap_err();
    }
}
