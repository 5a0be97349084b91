use std::{path::Path, process::Command};

use anyhow::{Context, Error};
use log::info;

use strata_api::{devicegraph::kinds::md::MdLevel, primitives::bytes::{ByteCount, KIB}};

use crate::runner::CommandRunner;

/// Creates the RAID array `raid_path` from `devices`, followed by `spares`.
pub fn create(
    runner: &dyn CommandRunner,
    raid_path: &Path,
    level: MdLevel,
    devices: &[&Path],
    spares: &[&Path],
    metadata: &str,
    chunk_size: Option<ByteCount>,
) -> Result<(), Error> {
    info!("Creating RAID array '{}'", raid_path.display());

    let mut mdadm_command = Command::new("mdadm");
    mdadm_command
        .arg("--create")
        .arg(raid_path)
        .arg("--run")
        .arg(format!("--level={level}"))
        .arg(format!("--metadata={metadata}"))
        .arg(format!("--raid-devices={}", devices.len()));
    if !spares.is_empty() {
        mdadm_command.arg(format!("--spare-devices={}", spares.len()));
    }
    if let Some(chunk_size) = chunk_size {
        mdadm_command.arg(format!("--chunk={}K", chunk_size.bytes() / KIB));
    }
    mdadm_command.args(devices).args(spares);

    runner
        .run(&mut mdadm_command)
        .map(|_| ())
        .context("Failed to run mdadm create")
}

/// Stops the array and erases the RAID superblock from its former members.
pub fn stop(runner: &dyn CommandRunner, raid_path: &Path, members: &[&Path]) -> Result<(), Error> {
    info!("Stopping RAID array: {}", raid_path.display());

    runner
        .run(Command::new("mdadm").arg("--stop").arg(raid_path))
        .with_context(|| format!("Failed to stop RAID array {}", raid_path.display()))?;

    if !members.is_empty() {
        runner
            .run(Command::new("mdadm").arg("--zero-superblock").args(members))
            .context("Failed to run mdadm zero superblock")?;
    }
    Ok(())
}

/// Assembles a previously created array from its members.
pub fn assemble(runner: &dyn CommandRunner, raid_path: &Path, members: &[&Path]) -> Result<(), Error> {
    info!("Assembling RAID array '{}'", raid_path.display());
    runner
        .run(
            Command::new("mdadm")
                .arg("--assemble")
                .arg(raid_path)
                .args(members),
        )
        .map(|_| ())
        .context("Failed to run mdadm assemble")
}

/// Adds a device to a RAID array, as a spare when `spare` is set.
pub fn add(runner: &dyn CommandRunner, raid_path: &Path, device: &Path, spare: bool) -> Result<(), Error> {
    info!(
        "Adding RAID device '{}' to '{}'",
        device.display(),
        raid_path.display()
    );

    runner
        .run(
            Command::new("mdadm")
                .arg(raid_path)
                .arg(if spare { "--add-spare" } else { "--add" })
                .arg(device),
        )
        .map(|_| ())
        .context("Failed to run mdadm add device")
}

/// Marks a device as failed and removes it from the RAID array.
pub fn remove(runner: &dyn CommandRunner, raid_path: &Path, device: &Path) -> Result<(), Error> {
    info!(
        "Removing RAID device: '{}' from '{}'",
        device.display(),
        raid_path.display()
    );

    runner
        .run(
            Command::new("mdadm")
                .arg(raid_path)
                .arg("--fail")
                .arg(device)
                .arg("--remove")
                .arg(device),
        )
        .map(|_| ())
        .context("Failed to run mdadm remove device")
}

/// Grows the array to use all of its members' space.
pub fn grow_to_max(runner: &dyn CommandRunner, raid_path: &Path) -> Result<(), Error> {
    runner
        .run(
            Command::new("mdadm")
                .arg("--grow")
                .arg(raid_path)
                .arg("--size=max"),
        )
        .map(|_| ())
        .context("Failed to run mdadm grow")
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::testutils::recording::RecordingRunner;

    #[test]
    fn test_mdadm_commands() {
        let runner = RecordingRunner::new();
        let md0 = Path::new("/dev/md0");
        let (sda1, sdb1, sdc1) = (
            Path::new("/dev/sda1"),
            Path::new("/dev/sdb1"),
            Path::new("/dev/sdc1"),
        );

        create(
            &runner,
            md0,
            MdLevel::Raid1,
            &[sda1, sdb1],
            &[sdc1],
            "1.0",
            Some(ByteCount::from_mib(1)),
        )
        .unwrap();
        remove(&runner, md0, sdb1).unwrap();
        add(&runner, md0, sdb1, false).unwrap();
        stop(&runner, md0, &[sda1, sdb1, sdc1]).unwrap();

        assert_eq!(
            runner.commands(),
            vec![
                "mdadm --create /dev/md0 --run --level=raid1 --metadata=1.0 --raid-devices=2 \
                 --spare-devices=1 --chunk=1024K /dev/sda1 /dev/sdb1 /dev/sdc1",
                "mdadm /dev/md0 --fail /dev/sdb1 --remove /dev/sdb1",
                "mdadm /dev/md0 --add /dev/sdb1",
                "mdadm --stop /dev/md0",
                "mdadm --zero-superblock /dev/sda1 /dev/sdb1 /dev/sdc1",
            ]
        );
    }
}
