//! What each action does to the system and how it is described, per device
//! kind.

use strata_api::{
    error::{InternalError, StorageError},
    primitives::bytes::ByteCount,
    text::{Tense, Text},
    Device, DeviceKind, Devicegraph, Sid,
};

use super::{
    actiongraph::{Action, ActionKind, Actiongraph, Affect, ResizeMode},
    commit::{CommitData, CommitOptions},
};

mod activation;
mod bcache;
mod encryption;
mod filesystem;
mod holders;
mod lvm;
mod mount;
mod partitioning;
mod raid;

pub(crate) use activation::{activate, deactivate};

pub(crate) fn text(action: &Action, ag: &Actiongraph, tense: Tense) -> Result<Text, StorageError> {
    if let Affect::Holder { parent, child } = action.affect {
        return holders::text(action, parent, child, ag, tense);
    }

    let device = action.device(ag)?;
    match &device.kind {
        DeviceKind::PartitionTable(_) | DeviceKind::Partition(_) => {
            partitioning::text(action, device, ag, tense)
        }
        DeviceKind::LvmPv(_) | DeviceKind::LvmVg(_) | DeviceKind::LvmLv(_) => {
            lvm::text(action, device, ag, tense)
        }
        DeviceKind::Md(_) => raid::text(action, device, ag, tense),
        DeviceKind::Bcache(_) | DeviceKind::BcacheCset(_) => {
            bcache::text(action, device, ag, tense)
        }
        DeviceKind::Encryption(_) => encryption::text(action, device, ag, tense),
        DeviceKind::BlkFilesystem(_) | DeviceKind::BtrfsSubvolume(_) | DeviceKind::Nfs(_) => {
            filesystem::text(action, device, ag, tense)
        }
        DeviceKind::MountPoint(_) => mount::text(action, device, ag, tense),
        DeviceKind::Disk(_) | DeviceKind::StrayBlkDevice(_) => generic_text(action, device, tense),
    }
}

pub(crate) fn commit(
    action: &Action,
    data: &mut CommitData,
    options: &CommitOptions,
) -> Result<(), StorageError> {
    if let Affect::Holder { parent, child } = action.affect {
        return holders::commit(action, parent, child, data);
    }

    let device = action.device(data.ag)?;
    match &device.kind {
        DeviceKind::PartitionTable(_) | DeviceKind::Partition(_) => {
            partitioning::commit(action, device, data)
        }
        DeviceKind::LvmPv(_) | DeviceKind::LvmVg(_) | DeviceKind::LvmLv(_) => {
            lvm::commit(action, device, data)
        }
        DeviceKind::Md(_) => raid::commit(action, device, data),
        DeviceKind::Bcache(_) | DeviceKind::BcacheCset(_) => bcache::commit(action, device, data),
        DeviceKind::Encryption(_) => encryption::commit(action, device, data),
        DeviceKind::BlkFilesystem(_) | DeviceKind::BtrfsSubvolume(_) | DeviceKind::Nfs(_) => {
            filesystem::commit(action, device, data)
        }
        DeviceKind::MountPoint(_) => mount::commit(action, device, data, options),
        DeviceKind::Disk(_) | DeviceKind::StrayBlkDevice(_) => Err(unsupported(action, device)),
    }
}

pub(super) fn unsupported(action: &Action, device: &Device) -> StorageError {
    StorageError::new(InternalError::UnsupportedAction {
        action: action.kind.name(),
        classname: device.classname(),
        sid: device.sid,
    })
}

/// Disks are never created or deleted, but their actions still need a text.
fn generic_text(action: &Action, device: &Device, tense: Tense) -> Result<Text, StorageError> {
    let args = vec![device.displayname()];
    Ok(match action.kind {
        ActionKind::Create => Text::tensed(tense, "Create {}", "Creating {}", args),
        ActionKind::Delete => Text::tensed(tense, "Delete {}", "Deleting {}", args),
        _ => return Err(unsupported(action, device)),
    })
}

/// Size the device occupies: its own for block devices, the one of the
/// block device below it otherwise.
pub(super) fn occupied_size(graph: &Devicegraph, sid: Sid) -> Result<ByteCount, StorageError> {
    let device = graph.find_device(sid)?;
    if let Some(blk) = device.kind.as_blk_device() {
        return Ok(blk.size());
    }
    graph
        .blk_device_of(sid)
        .map(|(_, blk)| blk.size())
        .ok_or_else(|| StorageError::internal("Device has no block device to take its size from"))
}

/// "Grow partition /dev/sda1 from 1 GiB to 2 GiB". `what` names the device.
pub(super) fn resize_text(
    mode: ResizeMode,
    sid: Sid,
    what: String,
    ag: &Actiongraph,
    tense: Tense,
) -> Result<Text, StorageError> {
    let args = vec![
        what,
        occupied_size(ag.lhs(), sid)?.to_human_string(),
        occupied_size(ag.rhs(), sid)?.to_human_string(),
    ];
    Ok(match mode {
        ResizeMode::Grow => Text::tensed(tense, "Grow {} from {} to {}", "Growing {} from {} to {}", args),
        ResizeMode::Shrink => Text::tensed(
            tense,
            "Shrink {} from {} to {}",
            "Shrinking {} from {} to {}",
            args,
        ),
    })
}

/// Node of the block device directly below `sid`.
pub(super) fn blk_name_of(graph: &Devicegraph, sid: Sid) -> Result<String, StorageError> {
    graph
        .blk_device_of(sid)
        .map(|(_, blk)| blk.name().to_owned())
        .ok_or_else(|| StorageError::new(InternalError::DeviceNotFound { sid }))
}

/// Size shown next to a block device name, e.g. "500 MiB".
pub(super) fn size_of(device: &Device) -> String {
    device
        .kind
        .as_blk_device()
        .map(|blk| blk.size().to_human_string())
        .unwrap_or_default()
}
