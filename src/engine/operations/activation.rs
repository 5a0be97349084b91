//! Activating and deactivating devices that exist on the system right now,
//! without planning or committing: mounting a filesystem, opening an
//! encryption, activating logical volumes or assembling a RAID.

use std::path::Path;

use log::info;

use osutils::{encryption, lvm, mdadm, mkswap, mount};
use strata_api::{
    error::{CapabilityError, CommitError, ReportError, StorageError},
    Device, DeviceKind, Devicegraph, View,
};

use crate::engine::commit::CommitContext;

use super::{blk_name_of, lvm::vg_of, mount as mount_ops, raid::Members};

/// Activates `device` of the probed graph `graph`.
pub(crate) fn activate(
    graph: &Devicegraph,
    device: &Device,
    ctx: &CommitContext,
) -> Result<(), StorageError> {
    set_active(graph, device, ctx, true)
}

/// Deactivates `device` of the probed graph `graph`.
pub(crate) fn deactivate(
    graph: &Devicegraph,
    device: &Device,
    ctx: &CommitContext,
) -> Result<(), StorageError> {
    set_active(graph, device, ctx, false)
}

fn set_active(
    graph: &Devicegraph,
    device: &Device,
    ctx: &CommitContext,
    active: bool,
) -> Result<(), StorageError> {
    let runner = ctx.runner;
    let verb = if active { "Activate" } else { "Deactivate" };
    let failed = || CommitError::ActionFailed {
        action: format!("{verb} {}", graph.displayname(device.sid)),
    };
    info!("{verb} {}", graph.displayname(device.sid));

    match &device.kind {
        DeviceKind::MountPoint(mp) => {
            let mountable = mount_ops::mountable_of(graph, device.sid)?;
            let spec = mount_ops::device_spec(graph, mountable)?;
            let target = ctx.in_rootprefix(&mp.path);

            match (mount_ops::is_swap(mountable), active) {
                (true, true) => mkswap::swapon(runner, Path::new(&spec)).structured(failed()),
                (true, false) => mkswap::swapoff(runner, Path::new(&spec)).structured(failed()),
                (false, true) => {
                    mount::ensure_mount_directory(&target).structured(failed())?;
                    mount::mount(
                        runner,
                        &spec,
                        &target,
                        mount_ops::mount_type(mountable)?,
                        &mount_ops::mount_options(mp, mountable),
                    )
                    .structured(failed())
                }
                (false, false) => mount::umount(runner, &target, false).structured(failed()),
            }
        }
        DeviceKind::Encryption(enc) if active => {
            let blk = blk_name_of(graph, device.sid)?;
            encryption::open(
                runner,
                enc.encryption_type,
                Path::new(&blk),
                &enc.dm_table_name,
                enc.key_file.as_deref().map(Path::new),
            )
            .structured(failed())
        }
        DeviceKind::Encryption(enc) => {
            encryption::close(runner, &enc.dm_table_name).structured(failed())
        }
        DeviceKind::LvmLv(lv) => {
            let vg = vg_of(graph, device.sid)?;
            lvm::lvchange(runner, &vg.vg_name, &lv.lv_name, active).structured(failed())
        }
        DeviceKind::LvmVg(vg) => {
            for child in graph.children(device.sid, View::Classic)? {
                if let DeviceKind::LvmLv(lv) = &graph.find_device(child)?.kind {
                    lvm::lvchange(runner, &vg.vg_name, &lv.lv_name, active)
                        .structured(failed())?;
                }
            }
            Ok(())
        }
        DeviceKind::Md(md) => {
            let members = Members::of(graph, device.sid)?;
            let raid_path = Path::new(&md.name);
            if active {
                mdadm::assemble(runner, raid_path, &members.all()).structured(failed())
            } else {
                mdadm::stop(runner, raid_path, &members.all()).structured(failed())
            }
        }
        _ => Err(StorageError::new(CapabilityError::ActivationUnsupported {
            classname: device.classname(),
            name: graph.displayname(device.sid),
        })),
    }
}
