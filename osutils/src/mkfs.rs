use std::{path::Path, process::Command};

use anyhow::{ensure, Context, Error};
use log::info;

use strata_api::devicegraph::kinds::filesystem::FsType;

use crate::{mkswap, runner::CommandRunner};

/// Creates a filesystem of type `fs_type` on `devices`. Only btrfs accepts
/// more than one device. Empty `label` and `uuid` leave the choice to the
/// tool; `options` is split on whitespace and passed through.
pub fn run(
    runner: &dyn CommandRunner,
    fs_type: FsType,
    devices: &[&Path],
    label: &str,
    uuid: &str,
    options: &str,
) -> Result<(), Error> {
    ensure!(!devices.is_empty(), "No device given to create {fs_type} on");
    ensure!(
        devices.len() == 1 || fs_type.supports_multiple_devices(),
        "Filesystem type {fs_type} cannot span {} devices",
        devices.len()
    );

    let mut cmd = Command::new(format!("mkfs.{}", program_suffix(fs_type)));
    match fs_type {
        FsType::Ext2 | FsType::Ext3 | FsType::Ext4 => {
            cmd.arg("-F").arg("-q");
            if !label.is_empty() {
                cmd.arg("-L").arg(label);
            }
            if !uuid.is_empty() {
                cmd.arg("-U").arg(uuid);
            }
        }
        FsType::Xfs => {
            cmd.arg("-f").arg("-q");
            if !label.is_empty() {
                cmd.arg("-L").arg(label);
            }
            if !uuid.is_empty() {
                cmd.arg("-m").arg(format!("uuid={uuid}"));
            }
        }
        FsType::Btrfs => {
            cmd.arg("--force");
            if !label.is_empty() {
                cmd.arg("--label").arg(label);
            }
            if !uuid.is_empty() {
                cmd.arg("--uuid").arg(uuid);
            }
        }
        FsType::Vfat => {
            if !label.is_empty() {
                cmd.arg("-n").arg(label);
            }
        }
        FsType::Ntfs => {
            cmd.arg("--fast");
            if !label.is_empty() {
                cmd.arg("--label").arg(label);
            }
        }
        FsType::Swap => return mkswap::run(runner, devices[0], label, uuid),
    }
    cmd.args(options.split_whitespace()).args(devices);

    info!(
        "Creating {fs_type} filesystem on {}",
        devices
            .iter()
            .map(|d| d.display().to_string())
            .collect::<Vec<_>>()
            .join(", ")
    );
    runner
        .run(&mut cmd)
        .map(|_| ())
        .with_context(|| format!("Failed to execute mkfs.{}", program_suffix(fs_type)))
}

fn program_suffix(fs_type: FsType) -> &'static str {
    match fs_type {
        FsType::Vfat => "fat",
        other => other.into(),
    }
}
