use std::{path::Path, process::Command};

use anyhow::{bail, Context, Error};
use log::{error, info};

use crate::runner::CommandRunner;

/// Mounts `spec` (a device path, `UUID=...`, `server:/path`...) on
/// `mount_dir`.
pub fn mount(
    runner: &dyn CommandRunner,
    spec: &str,
    mount_dir: &Path,
    fs_type: &str,
    options: &[String],
) -> Result<(), Error> {
    let mut command = Command::new("mount");
    if !options.is_empty() {
        command.arg("-o").arg(options.join(","));
    }
    command.arg("-t").arg(fs_type).arg(spec).arg(mount_dir);

    info!("Mounting {spec} on {}", mount_dir.display());
    runner.run(&mut command).map(|_| ()).with_context(|| {
        format!("Failed to mount {spec} to path {}", mount_dir.display())
    })
}

/// Unmounts `mount_dir`. On failure, the processes still holding files open
/// below it are logged when `lsof` can tell.
pub fn umount(runner: &dyn CommandRunner, mount_dir: &Path, recursive: bool) -> Result<(), Error> {
    let mut cmd = Command::new("umount");
    if recursive {
        cmd.arg("-R");
    }

    if let Err(e) = runner.run(cmd.arg(mount_dir)) {
        if let Ok(open_files) = runner.run(Command::new("lsof").arg("+D").arg(mount_dir)) {
            if !open_files.trim().is_empty() {
                error!("Open files:\n{}", open_files.trim_end());
            }
        }

        return Err(e.context(format!(
            "Failed to unmount directory {}",
            mount_dir.display()
        )));
    }

    Ok(())
}

/// Creates `target_path` as a directory unless it already is one.
pub fn ensure_mount_directory(target_path: &Path) -> Result<(), Error> {
    if target_path.exists() {
        if !target_path.is_dir() {
            bail!("Mount path '{}' is not a directory", target_path.display());
        }
        return Ok(());
    }

    crate::files::create_dirs(target_path)
        .with_context(|| format!("Failed to create mount path '{}'", target_path.display()))
}

#[cfg(test)]
mod test {
    use super::*;

    use std::fs::File;

    use tempfile::TempDir;

    use crate::testutils::recording::RecordingRunner;

    #[test]
    fn test_mount_commands() {
        let runner = RecordingRunner::new();
        mount(
            &runner,
            "UUID=1234",
            Path::new("/mnt/data"),
            "ext4",
            &["noatime".into(), "ro".into()],
        )
        .unwrap();
        mount(&runner, "/dev/sda1", Path::new("/boot"), "vfat", &[]).unwrap();
        umount(&runner, Path::new("/mnt/data"), false).unwrap();

        assert_eq!(
            runner.commands(),
            vec![
                "mount -o noatime,ro -t ext4 UUID=1234 /mnt/data",
                "mount -t vfat /dev/sda1 /boot",
                "umount /mnt/data"
            ]
        );
    }

    #[test]
    fn test_umount_failure_lists_open_files() {
        let runner = RecordingRunner::new();
        runner
            .fail_on("umount")
            .respond("lsof", "bash 42 root cwd DIR /srv\n");
        let err = umount(&runner, Path::new("/srv"), true).unwrap_err();
        assert_eq!(err.to_string(), "Failed to unmount directory /srv");
        assert_eq!(runner.commands(), vec!["umount -R /srv", "lsof +D /srv"]);
    }

    #[test]
    fn test_ensure_mount_directory() {
        let temp_dir = TempDir::new().unwrap();

        ensure_mount_directory(temp_dir.path()).unwrap();

        let nested = temp_dir.path().join("srv/www");
        ensure_mount_directory(&nested).unwrap();
        assert!(nested.is_dir());

        let file = temp_dir.path().join("file");
        File::create(&file).unwrap();
        assert_eq!(
            ensure_mount_directory(&file).unwrap_err().to_string(),
            format!("Mount path '{}' is not a directory", file.display())
        );
    }
}
