use std::path::Path;

use log::debug;

use osutils::{
    fstab::{EtcFstab, FstabEntry},
    mkswap, mount,
};
use strata_api::{
    devicegraph::kinds::mount_point::{MountByType, MountPoint},
    error::{InternalError, ReportError, StorageError},
    text::{Tense, Text},
    Device, DeviceKind, Devicegraph, Sid,
};

use crate::engine::{
    actiongraph::{Action, ActionKind, Actiongraph},
    commit::{CommitData, CommitOptions},
};

use super::unsupported;

/// The filesystem, subvolume or NFS share a mount point belongs to.
pub(super) fn mountable_of(graph: &Devicegraph, mount_point: Sid) -> Result<&Device, StorageError> {
    let sid = graph
        .mountable_of(mount_point)
        .structured(InternalError::UnexpectedDeviceKind {
            sid: mount_point,
            expected: "MountPoint of a mountable",
            found: "MountPoint",
        })?;
    graph.find_device(sid)
}

pub(super) fn is_swap(mountable: &Device) -> bool {
    mountable
        .kind
        .as_blk_filesystem()
        .is_some_and(|fs| fs.fs_type.is_swap())
}

/// Mount options, with the subvolume added for btrfs subvolumes.
pub(super) fn mount_options(mp: &MountPoint, mountable: &Device) -> Vec<String> {
    let mut options = mp.mount_options.clone();
    if let DeviceKind::BtrfsSubvolume(subvolume) = &mountable.kind {
        if !options.iter().any(|o| o.starts_with("subvol=")) {
            options.push(format!("subvol={}", subvolume.path));
        }
    }
    options
}

pub(super) fn mount_type(mountable: &Device) -> Result<&'static str, StorageError> {
    mountable
        .kind
        .as_mountable()
        .map(|m| m.mount_type())
        .structured(InternalError::UnexpectedDeviceKind {
            sid: mountable.sid,
            expected: "mountable",
            found: mountable.classname(),
        })
}

/// Device to mount or swap on, ignoring how the fstab refers to it.
pub(super) fn device_spec(graph: &Devicegraph, mountable: &Device) -> Result<String, StorageError> {
    graph
        .mount_spec(mountable.sid, MountByType::Device)
        .structured(InternalError::DeviceNotFound { sid: mountable.sid })
}

pub(super) fn text(
    action: &Action,
    device: &Device,
    ag: &Actiongraph,
    tense: Tense,
) -> Result<Text, StorageError> {
    let DeviceKind::MountPoint(mp) = &device.kind else {
        return Err(unsupported(action, device));
    };
    let graph = action.graph(ag);
    let what = || -> Result<String, StorageError> {
        Ok(graph.displayname(mountable_of(graph, device.sid)?.sid))
    };

    Ok(match action.kind {
        ActionKind::Create => Text::tensed(
            tense,
            "Create mount point {}",
            "Creating mount point {}",
            vec![mp.path.clone()],
        ),
        ActionKind::Delete => Text::tensed(
            tense,
            "Delete mount point {}",
            "Deleting mount point {}",
            vec![mp.path.clone()],
        ),
        ActionKind::Mount => Text::tensed(
            tense,
            "Mount {} at {}",
            "Mounting {} at {}",
            vec![what()?, mp.path.clone()],
        ),
        ActionKind::Unmount => Text::tensed(
            tense,
            "Unmount {} at {}",
            "Unmounting {} at {}",
            vec![what()?, mp.path.clone()],
        ),
        ActionKind::AddToEtcFstab => Text::tensed(
            tense,
            "Add mount point {} of {} to /etc/fstab",
            "Adding mount point {} of {} to /etc/fstab",
            vec![mp.path.clone(), what()?],
        ),
        ActionKind::RemoveFromEtcFstab => Text::tensed(
            tense,
            "Remove mount point {} of {} from /etc/fstab",
            "Removing mount point {} of {} from /etc/fstab",
            vec![mp.path.clone(), what()?],
        ),
        ActionKind::UpdateInEtcFstab => Text::tensed(
            tense,
            "Update mount point {} of {} in /etc/fstab",
            "Updating mount point {} of {} in /etc/fstab",
            vec![mp.path.clone(), what()?],
        ),
        _ => return Err(unsupported(action, device)),
    })
}

pub(super) fn commit(
    action: &Action,
    device: &Device,
    data: &mut CommitData,
    options: &CommitOptions,
) -> Result<(), StorageError> {
    let DeviceKind::MountPoint(mp) = &device.kind else {
        return Err(unsupported(action, device));
    };
    let graph = action.graph(data.ag);
    let runner = data.runner();

    match action.kind {
        ActionKind::Create => {
            let target = data.ctx.in_rootprefix(&mp.path);
            mount::ensure_mount_directory(&target).structured(data.failed())
        }
        ActionKind::Mount => {
            let mountable = mountable_of(graph, device.sid)?;
            let spec = device_spec(graph, mountable)?;
            if is_swap(mountable) {
                return mkswap::swapon(runner, Path::new(&spec)).structured(data.failed());
            }

            let mut mount_options = mount_options(mp, mountable);
            if options.force_rw {
                mount_options.retain(|o| o != "ro");
            }
            let target = data.ctx.in_rootprefix(&mp.path);
            mount::mount(runner, &spec, &target, mount_type(mountable)?, &mount_options)
                .structured(data.failed())
        }
        ActionKind::Unmount => {
            let mountable = mountable_of(graph, device.sid)?;
            if is_swap(mountable) {
                let spec = device_spec(graph, mountable)?;
                return mkswap::swapoff(runner, Path::new(&spec)).structured(data.failed());
            }
            let target = data.ctx.in_rootprefix(&mp.path);
            mount::umount(runner, &target, false).structured(data.failed())
        }
        ActionKind::AddToEtcFstab => {
            let entry = fstab_entry(data, graph, device.sid, mp)?;
            data.update_etc_fstab(|fstab| {
                fstab.add(entry);
                Ok(())
            })
        }
        ActionKind::RemoveFromEtcFstab => {
            let spec = fstab_entry(data, graph, device.sid, mp)?.spec;
            let path = mp.path.clone();
            data.update_etc_fstab(|fstab: &mut EtcFstab| {
                if !fstab.remove(&spec, &path) {
                    debug!("No entry for {spec} on {path} in {}", fstab.path().display());
                }
                Ok(())
            })
        }
        ActionKind::UpdateInEtcFstab => {
            let lhs = data.ag.lhs();
            let old = lhs.find_device(device.sid)?;
            let old_mp = old.kind.as_mount_point().structured(
                InternalError::UnexpectedDeviceKind {
                    sid: device.sid,
                    expected: "MountPoint",
                    found: old.classname(),
                },
            )?;
            let old_entry = fstab_entry(data, lhs, device.sid, old_mp)?;
            let entry = fstab_entry(data, graph, device.sid, mp)?;
            data.update_etc_fstab(|fstab| {
                fstab.update(&old_entry.spec, &old_entry.mount_point, entry)
            })
        }
        // Mount points are directories left in place
        ActionKind::Delete => Ok(()),
        _ => Err(unsupported(action, device)),
    }
}

fn fstab_entry(
    data: &CommitData,
    graph: &Devicegraph,
    mount_point: Sid,
    mp: &MountPoint,
) -> Result<FstabEntry, StorageError> {
    let mountable = mountable_of(graph, mount_point)?;
    let spec = data
        .fstab_spec(graph, mountable.sid, mp.mount_by)
        .structured(InternalError::DeviceNotFound { sid: mountable.sid })?;
    Ok(FstabEntry::new(spec, mp.path.clone(), mount_type(mountable)?)
        .with_options(mount_options(mp, mountable))
        .with_passno(mp.freq, mp.passno))
}

#[cfg(test)]
mod tests {
    use strata_api::{
        devicegraph::kinds::{
            disk::Disk,
            filesystem::{BlkFilesystem, BtrfsSubvolume, FsType},
        },
        primitives::region::Region,
        HolderKind,
    };

    use super::*;

    #[test]
    fn test_subvolume_mount_options() {
        let mut graph = Devicegraph::new();
        let disk = graph
            .create_device(DeviceKind::Disk(Disk {
                name: "/dev/sdb".into(),
                region: Region::new(0, 1 << 21, 512),
                rotational: false,
            }))
            .unwrap();
        let btrfs = graph
            .create_device(DeviceKind::BlkFilesystem(BlkFilesystem::new(FsType::Btrfs)))
            .unwrap();
        graph
            .add_holder(disk, btrfs, HolderKind::FilesystemUser)
            .unwrap();
        let subvolume = graph
            .create_device(DeviceKind::BtrfsSubvolume(BtrfsSubvolume {
                path: "@/home".into(),
                nocow: false,
            }))
            .unwrap();
        graph
            .add_holder(btrfs, subvolume, HolderKind::Subdevice)
            .unwrap();

        let mut mp = MountPoint::new("/home", MountByType::Device);
        mp.mount_options = vec!["compress=zstd".into()];
        let subvolume = graph.find_device(subvolume).unwrap();

        assert_eq!(
            mount_options(&mp, subvolume),
            vec!["compress=zstd", "subvol=@/home"]
        );
        assert_eq!(device_spec(&graph, subvolume).unwrap(), "/dev/sdb");
        assert_eq!(mount_type(subvolume).unwrap(), "btrfs");
        assert!(!is_swap(subvolume));
    }
}
