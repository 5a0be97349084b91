//! Partition table changes through parted, with sgdisk setting GPT type
//! codes.

use std::{path::Path, process::Command};

use anyhow::{ensure, Context, Error};
use log::info;

use strata_api::{
    devicegraph::kinds::partition::{PartitionId, PartitionType, PtType},
    primitives::region::Region,
};

use crate::runner::CommandRunner;

fn parted(disk: &Path) -> Command {
    let mut cmd = Command::new("parted");
    cmd.arg("--script").arg(disk);
    cmd
}

/// Writes a new, empty partition table of `pt_type` to `disk`.
pub fn create_table(runner: &dyn CommandRunner, disk: &Path, pt_type: PtType) -> Result<(), Error> {
    info!("Creating {pt_type} partition table on '{}'", disk.display());
    runner
        .run(parted(disk).arg("mklabel").arg(pt_type.to_string()))
        .map(|_| ())
        .with_context(|| format!("Failed to create partition table on '{}'", disk.display()))
}

/// Creates partition `number` covering `region` (in sectors of the disk)
/// and sets its type.
pub fn create_partition(
    runner: &dyn CommandRunner,
    disk: &Path,
    pt_type: PtType,
    number: u32,
    partition_type: PartitionType,
    region: &Region,
    id: PartitionId,
) -> Result<(), Error> {
    ensure!(region.length > 0, "Partition {number} on '{}' is empty", disk.display());
    info!(
        "Creating partition {number} on '{}' at sectors {}..{}",
        disk.display(),
        region.start,
        region.end()
    );

    runner
        .run(
            parted(disk)
                .arg("unit")
                .arg("s")
                .arg("mkpart")
                .arg(partition_type.to_string())
                .arg(format!("{}s", region.start))
                .arg(format!("{}s", region.end() - 1)),
        )
        .with_context(|| format!("Failed to create partition {number} on '{}'", disk.display()))?;

    set_id(runner, disk, pt_type, number, id)
}

/// Sets the partition type: a type code on GPT, a flag on msdos.
pub fn set_id(
    runner: &dyn CommandRunner,
    disk: &Path,
    pt_type: PtType,
    number: u32,
    id: PartitionId,
) -> Result<(), Error> {
    let mut cmd = match pt_type {
        PtType::Gpt => {
            let mut cmd = Command::new("sgdisk");
            cmd.arg(format!("--typecode={number}:{}", id.gpt_typecode()))
                .arg(disk);
            cmd
        }
        PtType::Msdos => {
            let flag = match id {
                PartitionId::Linux | PartitionId::BiosBoot => return Ok(()),
                PartitionId::Swap => "swap",
                PartitionId::Lvm => "lvm",
                PartitionId::Raid => "raid",
                PartitionId::Esp => "esp",
            };
            let mut cmd = parted(disk);
            cmd.arg("set").arg(number.to_string()).arg(flag).arg("on");
            cmd
        }
    };

    runner.run(&mut cmd).map(|_| ()).with_context(|| {
        format!(
            "Failed to set type of partition {number} on '{}'",
            disk.display()
        )
    })
}

pub fn delete_partition(runner: &dyn CommandRunner, disk: &Path, number: u32) -> Result<(), Error> {
    info!("Deleting partition {number} on '{}'", disk.display());
    runner
        .run(parted(disk).arg("rm").arg(number.to_string()))
        .map(|_| ())
        .with_context(|| format!("Failed to delete partition {number} on '{}'", disk.display()))
}

/// Moves the end of partition `number` so it covers `region`. The start
/// never moves.
pub fn resize_partition(
    runner: &dyn CommandRunner,
    disk: &Path,
    number: u32,
    region: &Region,
) -> Result<(), Error> {
    info!(
        "Resizing partition {number} on '{}' to end at sector {}",
        disk.display(),
        region.end()
    );
    runner
        .run(
            parted(disk)
                .arg("unit")
                .arg("s")
                .arg("resizepart")
                .arg(number.to_string())
                .arg(format!("{}s", region.end() - 1)),
        )
        .map(|_| ())
        .with_context(|| format!("Failed to resize partition {number} on '{}'", disk.display()))
}
