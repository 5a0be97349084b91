use std::path::{Path, PathBuf};

use log::debug;
use tempfile::TempDir;

use osutils::{btrfs, filesystems, mkfs, mkswap, mount, wipefs};
use strata_api::{
    devicegraph::kinds::{
        filesystem::{BlkFilesystem, FsType},
        mount_point::MountPoint,
    },
    error::{InternalError, ReportError, StorageError},
    text::{Tense, Text},
    Device, DeviceKind, Devicegraph, Sid, View,
};

use crate::engine::{
    actiongraph::{Action, ActionKind, Actiongraph},
    commit::CommitData,
};

use super::{occupied_size, resize_text, unsupported};

/// Nodes of the block devices a filesystem lives on.
pub(super) fn fs_devices(graph: &Devicegraph, fs: Sid) -> Result<Vec<String>, StorageError> {
    Ok(graph
        .parents(fs, View::All)?
        .into_iter()
        .filter_map(|sid| graph.find_device(sid).ok())
        .filter_map(|device| device.kind.as_blk_device().map(|blk| blk.name().to_owned()))
        .collect())
}

fn active_mount_point(graph: &Devicegraph, mountable: Sid) -> Option<&MountPoint> {
    graph
        .mount_point_of(mountable)
        .and_then(|sid| graph.find_device(sid).ok())
        .and_then(|device| device.kind.as_mount_point())
        .filter(|mp| mp.active)
}

/// Where `fs` is mounted for the whole commit, if it is: mounted before and
/// after at the same path with the same options.
fn stays_mounted(data: &CommitData, fs: Sid) -> Option<PathBuf> {
    let old = active_mount_point(data.ag.lhs(), fs)?;
    let new = active_mount_point(data.ag.rhs(), fs)?;
    (old.path == new.path && old.mount_options == new.mount_options)
        .then(|| data.ctx.in_rootprefix(&old.path))
}

/// Runs `f` with `fs` mounted, either where it already is or on a temporary
/// directory. `device` is any of its block devices.
pub(super) fn with_mounted(
    data: &CommitData,
    fs: Sid,
    fs_type: FsType,
    device: &str,
    f: impl FnOnce(&Path) -> Result<(), StorageError>,
) -> Result<(), StorageError> {
    if let Some(path) = stays_mounted(data, fs) {
        return f(&path);
    }

    let runner = data.runner();
    let temp_dir = TempDir::new().structured(data.failed())?;
    debug!(
        "Temporarily mounting {device} on {}",
        temp_dir.path().display()
    );
    mount::mount(runner, device, temp_dir.path(), fs_type.into(), &[])
        .structured(data.failed())?;

    let result = f(temp_dir.path());
    let unmounted = mount::umount(runner, temp_dir.path(), false).structured(data.failed());
    result.and(unmounted)
}

fn describe(graph: &Devicegraph, fs: Sid, blk_fs: &BlkFilesystem) -> Result<String, StorageError> {
    Ok(format!(
        "{} on {}",
        blk_fs.fs_type,
        fs_devices(graph, fs)?.join(", ")
    ))
}

/// The btrfs a subvolume belongs to and one of its devices.
fn btrfs_of(graph: &Devicegraph, subvolume: Sid) -> Result<(Sid, String), StorageError> {
    let btrfs = graph
        .btrfs_of_subvolume(subvolume)
        .structured(InternalError::UnexpectedDeviceKind {
            sid: subvolume,
            expected: "BtrfsSubvolume on a btrfs",
            found: "BtrfsSubvolume",
        })?;
    let device = fs_devices(graph, btrfs)?
        .into_iter()
        .next()
        .structured(InternalError::DeviceNotFound { sid: btrfs })?;
    Ok((btrfs, device))
}

pub(super) fn text(
    action: &Action,
    device: &Device,
    ag: &Actiongraph,
    tense: Tense,
) -> Result<Text, StorageError> {
    let graph = action.graph(ag);

    Ok(match (&device.kind, action.kind) {
        (DeviceKind::BlkFilesystem(fs), ActionKind::Create) => Text::tensed(
            tense,
            "Create {}",
            "Creating {}",
            vec![describe(graph, device.sid, fs)?],
        ),
        (DeviceKind::BlkFilesystem(fs), ActionKind::Delete) => Text::tensed(
            tense,
            "Delete {}",
            "Deleting {}",
            vec![describe(graph, device.sid, fs)?],
        ),
        (DeviceKind::BlkFilesystem(fs), ActionKind::Resize { mode }) => resize_text(
            mode,
            device.sid,
            describe(graph, device.sid, fs)?,
            ag,
            tense,
        )?,
        (DeviceKind::BlkFilesystem(fs), ActionKind::SetLabel) => Text::tensed(
            tense,
            "Set label of {} to {}",
            "Setting label of {} to {}",
            vec![describe(graph, device.sid, fs)?, fs.label.clone()],
        ),
        (DeviceKind::BlkFilesystem(fs), ActionKind::SetUuid) => Text::tensed(
            tense,
            "Set UUID of {} to {}",
            "Setting UUID of {} to {}",
            vec![describe(graph, device.sid, fs)?, fs.uuid.clone()],
        ),
        (DeviceKind::BlkFilesystem(fs), ActionKind::SetTuneOptions) => Text::tensed(
            tense,
            "Set tune options of {} to '{}'",
            "Setting tune options of {} to '{}'",
            vec![describe(graph, device.sid, fs)?, fs.tune_options.clone()],
        ),
        (DeviceKind::BtrfsSubvolume(subvolume), ActionKind::Create) => Text::tensed(
            tense,
            "Create subvolume {} on {}",
            "Creating subvolume {} on {}",
            vec![subvolume.path.clone(), btrfs_of(graph, device.sid)?.1],
        ),
        (DeviceKind::BtrfsSubvolume(subvolume), ActionKind::Delete) => Text::tensed(
            tense,
            "Delete subvolume {} on {}",
            "Deleting subvolume {} on {}",
            vec![subvolume.path.clone(), btrfs_of(graph, device.sid)?.1],
        ),
        (DeviceKind::Nfs(nfs), ActionKind::Create) => Text::tensed(
            tense,
            "Add NFS {}:{}",
            "Adding NFS {}:{}",
            vec![nfs.server.clone(), nfs.path.clone()],
        ),
        (DeviceKind::Nfs(nfs), ActionKind::Delete) => Text::tensed(
            tense,
            "Remove NFS {}:{}",
            "Removing NFS {}:{}",
            vec![nfs.server.clone(), nfs.path.clone()],
        ),
        _ => return Err(unsupported(action, device)),
    })
}

pub(super) fn commit(action: &Action, device: &Device, data: &mut CommitData) -> Result<(), StorageError> {
    match &device.kind {
        DeviceKind::BlkFilesystem(fs) => commit_blk_filesystem(action, device, fs, data),
        DeviceKind::BtrfsSubvolume(subvolume) => {
            let graph = action.graph(data.ag);
            let runner = data.runner();
            let (btrfs, blk) = btrfs_of(graph, device.sid)?;

            match action.kind {
                ActionKind::Create => with_mounted(data, btrfs, FsType::Btrfs, &blk, |dir| {
                    btrfs::subvolume_create(runner, dir, &subvolume.path)
                        .structured(data.failed())?;
                    if subvolume.nocow {
                        btrfs::set_nocow(runner, &dir.join(subvolume.path.trim_start_matches('/')))
                            .structured(data.failed())?;
                    }
                    Ok(())
                }),
                ActionKind::Delete => with_mounted(data, btrfs, FsType::Btrfs, &blk, |dir| {
                    btrfs::subvolume_delete(runner, dir, &subvolume.path).structured(data.failed())
                }),
                _ => Err(unsupported(action, device)),
            }
        }
        _ => Err(unsupported(action, device)),
    }
}

fn commit_blk_filesystem(
    action: &Action,
    device: &Device,
    fs: &BlkFilesystem,
    data: &mut CommitData,
) -> Result<(), StorageError> {
    let graph = action.graph(data.ag);
    let runner = data.runner();
    let devices = fs_devices(graph, device.sid)?;
    let first = devices
        .first()
        .map(PathBuf::from)
        .structured(InternalError::DeviceNotFound { sid: device.sid })?;

    match action.kind {
        ActionKind::Create => {
            // Pick the UUID here so fstab entries written later can use it
            let uuid = if fs.fs_type.supports_uuid() {
                data.uuid_for(device.sid, &fs.uuid)
            } else {
                String::new()
            };
            let paths = devices.iter().map(Path::new).collect::<Vec<_>>();
            mkfs::run(
                runner,
                fs.fs_type,
                &paths,
                &fs.label,
                &uuid,
                &fs.mkfs_options,
            )
            .structured(data.failed())
        }
        ActionKind::Delete => {
            for blk in &devices {
                wipefs::all(runner, Path::new(blk)).structured(data.failed())?;
            }
            Ok(())
        }
        ActionKind::Resize { .. } => {
            if fs.fs_type.is_swap() {
                return mkswap::run(runner, &first, &fs.label, &fs.uuid).structured(data.failed());
            }

            let size = occupied_size(data.ag.rhs(), device.sid)?;
            match fs.fs_type {
                FsType::Xfs | FsType::Btrfs => {
                    with_mounted(data, device.sid, fs.fs_type, &devices[0], |dir| {
                        filesystems::resize(runner, fs.fs_type, &first, Some(dir), size)
                            .structured(data.failed())
                    })
                }
                _ => {
                    let mounted = stays_mounted(data, device.sid);
                    filesystems::resize(runner, fs.fs_type, &first, mounted.as_deref(), size)
                        .structured(data.failed())
                }
            }
        }
        ActionKind::SetLabel => {
            filesystems::set_label(runner, fs.fs_type, &first, &fs.label).structured(data.failed())
        }
        ActionKind::SetUuid => {
            filesystems::set_uuid(runner, fs.fs_type, &first, &fs.uuid).structured(data.failed())
        }
        ActionKind::SetTuneOptions => {
            filesystems::tune(runner, fs.fs_type, &first, &fs.tune_options)
                .structured(data.failed())
        }
        _ => Err(unsupported(action, device)),
    }
}
