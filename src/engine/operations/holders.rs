//! Actions on holders between devices that both survive the commit: a PV
//! joining or leaving a volume group, a device added to or removed from a
//! btrfs or an MD RAID, a cache set attached to or detached from a bcache.

use std::path::Path;

use osutils::{bcache, btrfs, lvm, mdadm};
use strata_api::{
    devicegraph::kinds::filesystem::FsType,
    error::{ReportError, StorageError},
    text::{Tense, Text},
    Device, DeviceKind, Devicegraph, HolderKind, Sid,
};

use crate::engine::{
    actiongraph::{Action, ActionKind, Actiongraph},
    commit::CommitData,
};

use super::{blk_name_of, filesystem, unsupported};

/// Node of `sid` itself when it is a block device, of the block device
/// below it otherwise.
fn node_of(graph: &Devicegraph, sid: Sid) -> Result<String, StorageError> {
    match graph.find_device(sid)?.kind.as_blk_device() {
        Some(blk) => Ok(blk.name().to_owned()),
        None => blk_name_of(graph, sid),
    }
}

fn endpoints<'a>(
    action: &Action,
    ag: &Actiongraph<'a>,
    parent: Sid,
    child: Sid,
) -> Result<(&'a Devicegraph, &'a Device, Option<&'a HolderKind>), StorageError> {
    let graph = action.graph(ag);
    let child = graph.find_device(child)?;
    Ok((graph, child, graph.find_holder(parent, child.sid)))
}

pub(super) fn text(
    action: &Action,
    parent: Sid,
    child: Sid,
    ag: &Actiongraph,
    tense: Tense,
) -> Result<Text, StorageError> {
    let (graph, child, holder) = endpoints(action, ag, parent, child)?;
    let create = match action.kind {
        ActionKind::Create => true,
        ActionKind::Delete => false,
        _ => return Err(unsupported(action, child)),
    };
    let tensed = |add: (&'static str, &'static str),
                  remove: (&'static str, &'static str),
                  args: Vec<String>| {
        let (simple, continuous) = if create { add } else { remove };
        Text::tensed(tense, simple, continuous, args)
    };

    Ok(match (&child.kind, holder) {
        (DeviceKind::LvmVg(vg), _) => tensed(
            ("Add {} to volume group {}", "Adding {} to volume group {}"),
            (
                "Remove {} from volume group {}",
                "Removing {} from volume group {}",
            ),
            vec![node_of(graph, parent)?, vg.vg_name.clone()],
        ),
        (DeviceKind::BlkFilesystem(_), Some(HolderKind::FilesystemUser)) => tensed(
            ("Add {} to btrfs {}", "Adding {} to btrfs {}"),
            ("Remove {} from btrfs {}", "Removing {} from btrfs {}"),
            vec![node_of(graph, parent)?, graph.displayname(child.sid)],
        ),
        (DeviceKind::Md(md), Some(HolderKind::MdUser { spare: true, .. })) => tensed(
            ("Add {} as spare to {}", "Adding {} as spare to {}"),
            ("Remove spare {} from {}", "Removing spare {} from {}"),
            vec![node_of(graph, parent)?, md.name.clone()],
        ),
        (DeviceKind::Md(md), Some(HolderKind::MdUser { .. })) => tensed(
            ("Add {} to {}", "Adding {} to {}"),
            ("Remove {} from {}", "Removing {} from {}"),
            vec![node_of(graph, parent)?, md.name.clone()],
        ),
        (DeviceKind::Bcache(bcache), _) => tensed(
            (
                "Attach cache set on {} to {}",
                "Attaching cache set on {} to {}",
            ),
            (
                "Detach cache set on {} from {}",
                "Detaching cache set on {} from {}",
            ),
            vec![node_of(graph, parent)?, bcache.name.clone()],
        ),
        _ => return Err(unsupported(action, child)),
    })
}

pub(super) fn commit(
    action: &Action,
    parent: Sid,
    child: Sid,
    data: &mut CommitData,
) -> Result<(), StorageError> {
    let (graph, child, holder) = endpoints(action, data.ag, parent, child)?;
    let runner = data.runner();
    let create = match action.kind {
        ActionKind::Create => true,
        ActionKind::Delete => false,
        _ => return Err(unsupported(action, child)),
    };
    let member = node_of(graph, parent)?;
    let member = Path::new(&member);

    match (&child.kind, holder) {
        (DeviceKind::LvmVg(vg), _) if create => {
            lvm::vgextend(runner, &vg.vg_name, member).structured(data.failed())
        }
        (DeviceKind::LvmVg(vg), _) => {
            lvm::vgreduce(runner, &vg.vg_name, member).structured(data.failed())
        }
        (DeviceKind::BlkFilesystem(_), Some(HolderKind::FilesystemUser)) => {
            // Mount through a device that stays in the filesystem
            let other = filesystem::fs_devices(graph, child.sid)?
                .into_iter()
                .find(|name| Path::new(name) != member)
                .structured(data.failed())?;
            filesystem::with_mounted(data, child.sid, FsType::Btrfs, &other, |dir| {
                if create {
                    btrfs::device_add(runner, member, dir).structured(data.failed())
                } else {
                    btrfs::device_remove(runner, member, dir).structured(data.failed())
                }
            })
        }
        (DeviceKind::Md(md), Some(HolderKind::MdUser { spare, .. })) => {
            let raid_path = Path::new(&md.name);
            if create {
                mdadm::add(runner, raid_path, member, *spare).structured(data.failed())
            } else {
                mdadm::remove(runner, raid_path, member).structured(data.failed())
            }
        }
        (DeviceKind::Bcache(bcache), _) if create => {
            let uuid = match &graph.find_device(parent)?.kind {
                DeviceKind::BcacheCset(cset) => data.uuid_for(parent, &cset.uuid),
                _ => return Err(unsupported(action, child)),
            };
            bcache::attach(runner, Path::new(&bcache.name), &uuid).structured(data.failed())
        }
        (DeviceKind::Bcache(bcache), _) => {
            bcache::detach(runner, Path::new(&bcache.name)).structured(data.failed())
        }
        _ => Err(unsupported(action, child)),
    }
}
