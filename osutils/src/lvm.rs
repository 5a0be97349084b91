use std::{path::Path, process::Command};

use anyhow::{Context, Error};
use log::info;

use strata_api::primitives::bytes::{ByteCount, KIB};

use crate::runner::CommandRunner;

fn run(runner: &dyn CommandRunner, cmd: &mut Command, what: &str) -> Result<(), Error> {
    runner.run(cmd).map(|_| ()).with_context(|| format!("Failed to {what}"))
}

pub fn pvcreate(runner: &dyn CommandRunner, device: &Path) -> Result<(), Error> {
    info!("Creating LVM physical volume on '{}'", device.display());
    run(
        runner,
        Command::new("pvcreate").arg("--force").arg(device),
        &format!("create physical volume on '{}'", device.display()),
    )
}

pub fn pvremove(runner: &dyn CommandRunner, device: &Path) -> Result<(), Error> {
    run(
        runner,
        Command::new("pvremove").arg(device),
        &format!("remove physical volume from '{}'", device.display()),
    )
}

/// Resizes the PV to `size`, or to fill its device when `size` is `None`.
pub fn pvresize(runner: &dyn CommandRunner, device: &Path, size: Option<ByteCount>) -> Result<(), Error> {
    let mut cmd = Command::new("pvresize");
    if let Some(size) = size {
        cmd.arg("--yes")
            .arg(format!("--setphysicalvolumesize={}k", size.bytes() / KIB));
    }
    run(
        runner,
        cmd.arg(device),
        &format!("resize physical volume on '{}'", device.display()),
    )
}

pub fn vgcreate(
    runner: &dyn CommandRunner,
    vg_name: &str,
    extent_size: ByteCount,
    pvs: &[&Path],
) -> Result<(), Error> {
    info!("Creating LVM volume group '{vg_name}'");
    run(
        runner,
        Command::new("vgcreate")
            .arg(format!("--physicalextentsize={}k", extent_size.bytes() / KIB))
            .arg(vg_name)
            .args(pvs),
        &format!("create volume group '{vg_name}'"),
    )
}

pub fn vgremove(runner: &dyn CommandRunner, vg_name: &str) -> Result<(), Error> {
    info!("Removing LVM volume group '{vg_name}'");
    run(
        runner,
        Command::new("vgremove").arg("--force").arg(vg_name),
        &format!("remove volume group '{vg_name}'"),
    )
}

pub fn vgextend(runner: &dyn CommandRunner, vg_name: &str, pv: &Path) -> Result<(), Error> {
    run(
        runner,
        Command::new("vgextend").arg(vg_name).arg(pv),
        &format!("add '{}' to volume group '{vg_name}'", pv.display()),
    )
}

pub fn vgreduce(runner: &dyn CommandRunner, vg_name: &str, pv: &Path) -> Result<(), Error> {
    run(
        runner,
        Command::new("vgreduce").arg(vg_name).arg(pv),
        &format!("remove '{}' from volume group '{vg_name}'", pv.display()),
    )
}

pub fn lvcreate(
    runner: &dyn CommandRunner,
    vg_name: &str,
    lv_name: &str,
    size: ByteCount,
    stripes: u32,
) -> Result<(), Error> {
    info!(
        "Creating LVM logical volume '{vg_name}/{lv_name}' of {}",
        size.to_human_string()
    );
    let mut cmd = Command::new("lvcreate");
    cmd.arg("--yes")
        .arg("--wipesignatures=y")
        .arg(format!("--name={lv_name}"))
        .arg(format!("--size={}k", size.bytes() / KIB));
    if stripes > 1 {
        cmd.arg(format!("--stripes={stripes}"));
    }
    run(
        runner,
        cmd.arg(vg_name),
        &format!("create logical volume '{vg_name}/{lv_name}'"),
    )
}

pub fn lvremove(runner: &dyn CommandRunner, vg_name: &str, lv_name: &str) -> Result<(), Error> {
    run(
        runner,
        Command::new("lvremove")
            .arg("--force")
            .arg(format!("{vg_name}/{lv_name}")),
        &format!("remove logical volume '{vg_name}/{lv_name}'"),
    )
}

/// Sets the size of an LV. The filesystem on it is left alone.
pub fn lvresize(
    runner: &dyn CommandRunner,
    vg_name: &str,
    lv_name: &str,
    size: ByteCount,
) -> Result<(), Error> {
    run(
        runner,
        Command::new("lvresize")
            .arg("--force")
            .arg(format!("--size={}k", size.bytes() / KIB))
            .arg(format!("{vg_name}/{lv_name}")),
        &format!("resize logical volume '{vg_name}/{lv_name}'"),
    )
}

/// Activates or deactivates an LV, making its device node appear or go away.
pub fn lvchange(
    runner: &dyn CommandRunner,
    vg_name: &str,
    lv_name: &str,
    active: bool,
) -> Result<(), Error> {
    run(
        runner,
        Command::new("lvchange")
            .arg(if active { "--activate=y" } else { "--activate=n" })
            .arg(format!("{vg_name}/{lv_name}")),
        &format!("change activation of logical volume '{vg_name}/{lv_name}'"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::testutils::recording::RecordingRunner;

    #[test]
    fn test_lvm_commands() {
        let runner = RecordingRunner::new();
        let sdb1 = Path::new("/dev/sdb1");

        pvcreate(&runner, sdb1).unwrap();
        vgcreate(&runner, "system", ByteCount::from_mib(4), &[sdb1]).unwrap();
        lvcreate(&runner, "system", "root", ByteCount::from_gib(10), 1).unwrap();
        lvresize(&runner, "system", "root", ByteCount::from_gib(12)).unwrap();
        vgextend(&runner, "system", Path::new("/dev/sdc1")).unwrap();

        assert_eq!(
            runner.commands(),
            vec![
                "pvcreate --force /dev/sdb1",
                "vgcreate --physicalextentsize=4096k system /dev/sdb1",
                "lvcreate --yes --wipesignatures=y --name=root --size=10485760k system",
                "lvresize --force --size=12582912k system/root",
                "vgextend system /dev/sdc1",
            ]
        );
    }

    #[test]
    fn test_lvm_failure_context() {
        let runner = RecordingRunner::new();
        runner.fail_on("vgremove");
        let err = vgremove(&runner, "data").unwrap_err();
        assert_eq!(err.to_string(), "Failed to remove volume group 'data'");
    }
}
