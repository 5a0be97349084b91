//! First pass of building an actiongraph: comparing the two devicegraphs and
//! turning every difference into a chain of actions.

use std::collections::{BTreeMap, BTreeSet};

use log::{debug, trace};
use petgraph::graph::NodeIndex;

use strata_api::{
    devicegraph::kinds::{filesystem::BlkFilesystem, mount_point::MountPoint},
    error::StorageError,
    Device, DeviceKind, Devicegraph, HolderKind, Sid, View,
};

use super::{
    action::{Action, ActionKind, Affect, ResizeMode},
    ActionPetgraph,
};

/// Actions of one synthesis, grouped by what they affect. Chains keep the
/// order the actions of one device must run in.
#[derive(Debug, Default)]
pub(super) struct Synthesis {
    pub graph: ActionPetgraph,
    pub chains: BTreeMap<Sid, Vec<NodeIndex>>,
    pub holders: BTreeMap<(Sid, Sid), Vec<NodeIndex>>,
}

pub(super) fn synthesize(lhs: &Devicegraph, rhs: &Devicegraph) -> Result<Synthesis, StorageError> {
    let mut synthesis = Synthesis::default();

    let sids = lhs
        .sids()
        .into_iter()
        .chain(rhs.sids())
        .collect::<BTreeSet<_>>();

    for sid in sids {
        let chain = match (lhs.find_device(sid).ok(), rhs.find_device(sid).ok()) {
            (Some(old), None) => delete_chain(old),
            (None, Some(new)) => create_chain(new),
            (Some(old), Some(new)) => modify_chain(lhs, rhs, old, new),
            (None, None) => continue,
        };
        if !chain.is_empty() {
            synthesis.add_chain(sid, chain);
        }
    }

    compare_holders(lhs, rhs, &mut synthesis);
    Ok(synthesis)
}

impl Synthesis {
    fn add_chain(&mut self, sid: Sid, mut chain: Vec<Action>) {
        if let Some(first) = chain.first_mut() {
            first.first = true;
        }
        if let Some(last) = chain.last_mut() {
            last.last = true;
        }

        let vertices = self.insert_chain(chain);
        self.chains.insert(sid, vertices);
    }

    fn insert_chain(&mut self, chain: Vec<Action>) -> Vec<NodeIndex> {
        let mut vertices: Vec<NodeIndex> = Vec::with_capacity(chain.len());
        for action in chain {
            trace!("Adding action {action}");
            let vertex = self.graph.add_node(action);
            if let Some(previous) = vertices.last() {
                self.graph.add_edge(*previous, vertex, ());
            }
            vertices.push(vertex);
        }
        vertices
    }
}

fn create_chain(device: &Device) -> Vec<Action> {
    let affect = Affect::Device(device.sid);
    let create = Action::new(ActionKind::Create, affect);

    match &device.kind {
        DeviceKind::MountPoint(mp) => {
            // Swap "mount points" are no directories
            let mut chain = vec![if mp.path.starts_with('/') {
                create
            } else {
                create.nop()
            }];
            if mp.active {
                chain.push(Action::new(ActionKind::Mount, affect));
            }
            if mp.in_etc_fstab {
                chain.push(Action::new(ActionKind::AddToEtcFstab, affect));
            }
            chain
        }
        DeviceKind::BlkFilesystem(fs) if !fs.tune_options.is_empty() => {
            vec![create, Action::new(ActionKind::SetTuneOptions, affect)]
        }
        DeviceKind::Nfs(_) => vec![create.nop()],
        _ => vec![create],
    }
}

fn delete_chain(device: &Device) -> Vec<Action> {
    let affect = Affect::Device(device.sid);
    let delete = Action::new(ActionKind::Delete, affect);

    match &device.kind {
        DeviceKind::MountPoint(mp) => {
            let mut chain = Vec::new();
            if mp.active {
                chain.push(Action::new(ActionKind::Unmount, affect));
            }
            if mp.in_etc_fstab {
                chain.push(Action::new(ActionKind::RemoveFromEtcFstab, affect));
            }
            chain.push(delete.nop());
            chain
        }
        DeviceKind::Disk(_) | DeviceKind::StrayBlkDevice(_) | DeviceKind::Nfs(_) => {
            vec![delete.nop()]
        }
        _ => vec![delete],
    }
}

fn modify_chain(lhs: &Devicegraph, rhs: &Devicegraph, old: &Device, new: &Device) -> Vec<Action> {
    // Mount points also change when only the fstab spec of their mountable does
    if let (DeviceKind::MountPoint(old_mp), DeviceKind::MountPoint(new_mp)) = (&old.kind, &new.kind)
    {
        let spec_changed = lhs
            .mountable_of(old.sid)
            .and_then(|m| lhs.mount_spec(m, old_mp.mount_by))
            != rhs
                .mountable_of(new.sid)
                .and_then(|m| rhs.mount_spec(m, new_mp.mount_by));
        if !old.equal(new) {
            old.log_diff(new);
        }
        return mount_point_chain(old.sid, old_mp, new_mp, spec_changed);
    }

    // Filesystems and PVs keep their attributes when the device below them
    // is resized
    let resize = resize_mode(lhs, rhs, old, new);
    if old.equal(new) && resize.is_none() {
        return Vec::new();
    }
    if !old.equal(new) {
        old.log_diff(new);
    }

    let affect = Affect::Device(old.sid);
    let mut chain = Vec::new();

    if let Some(mode) = resize {
        chain.push(Action::new(ActionKind::Resize { mode }, affect));
    }

    match (&old.kind, &new.kind) {
        (DeviceKind::BlkFilesystem(old_fs), DeviceKind::BlkFilesystem(new_fs)) => {
            chain.extend(filesystem_changes(old_fs, new_fs).map(|kind| Action::new(kind, affect)));
        }
        (DeviceKind::Partition(old_p), DeviceKind::Partition(new_p)) => {
            if old_p.region.start != new_p.region.start || old_p.id != new_p.id {
                debug!(
                    "Ignoring changed start or id of partition {}, partitions are not moved",
                    new_p.name
                );
            }
        }
        _ => {}
    }

    if chain.is_empty() {
        debug!(
            "No action for changed {} (sid {}): {}",
            old.classname(),
            old.sid,
            old.diff(new).join(", ")
        );
    }
    chain
}

fn filesystem_changes(
    old: &BlkFilesystem,
    new: &BlkFilesystem,
) -> impl Iterator<Item = ActionKind> {
    [
        (old.label != new.label, ActionKind::SetLabel),
        (
            old.uuid != new.uuid && !new.uuid.is_empty(),
            ActionKind::SetUuid,
        ),
        (
            old.tune_options != new.tune_options && !new.tune_options.is_empty(),
            ActionKind::SetTuneOptions,
        ),
    ]
    .into_iter()
    .filter_map(|(changed, kind)| changed.then_some(kind))
}

/// Size a device occupies. Filesystems and PVs take the size of the single
/// block device below them.
fn occupied_size(graph: &Devicegraph, device: &Device) -> Option<u64> {
    match &device.kind {
        DeviceKind::Partition(_)
        | DeviceKind::LvmLv(_)
        | DeviceKind::Md(_)
        | DeviceKind::Encryption(_) => device.kind.as_blk_device().map(|b| b.size().bytes()),
        DeviceKind::LvmPv(_) | DeviceKind::BlkFilesystem(_) => {
            let parents = graph.parents(device.sid, View::All).ok()?;
            if parents.len() != 1 {
                return None;
            }
            graph.blk_device_of(device.sid).map(|(_, b)| b.size().bytes())
        }
        _ => None,
    }
}

fn resize_mode(lhs: &Devicegraph, rhs: &Devicegraph, old: &Device, new: &Device) -> Option<ResizeMode> {
    if let (Some(old_blk), Some(new_blk)) = (old.kind.as_blk_device(), new.kind.as_blk_device()) {
        if old_blk.size() != new_blk.size() && occupied_size(lhs, old).is_none() {
            debug!("Ignoring size change of {}, it cannot be resized", new_blk.name());
            return None;
        }
    }

    let (old_size, new_size) = (occupied_size(lhs, old)?, occupied_size(rhs, new)?);
    match new_size.cmp(&old_size) {
        std::cmp::Ordering::Greater => Some(ResizeMode::Grow),
        std::cmp::Ordering::Less => Some(ResizeMode::Shrink),
        std::cmp::Ordering::Equal => None,
    }
}

fn mount_point_chain(sid: Sid, old: &MountPoint, new: &MountPoint, spec_changed: bool) -> Vec<Action> {
    let affect = Affect::Device(sid);
    let moved = old.path != new.path;
    let remount = old.active && new.active && (moved || old.mount_options != new.mount_options);

    let steps = [
        (old.active && (!new.active || remount), ActionKind::Unmount),
        (
            old.in_etc_fstab && (!new.in_etc_fstab || moved),
            ActionKind::RemoveFromEtcFstab,
        ),
        (new.active && (!old.active || remount), ActionKind::Mount),
        (
            old.in_etc_fstab
                && new.in_etc_fstab
                && !moved
                && (old.fstab_entry_differs(new) || spec_changed),
            ActionKind::UpdateInEtcFstab,
        ),
        (
            new.in_etc_fstab && (!old.in_etc_fstab || moved),
            ActionKind::AddToEtcFstab,
        ),
    ];

    steps
        .into_iter()
        .filter_map(|(needed, kind)| needed.then(|| Action::new(kind, affect)))
        .collect()
}

/// Holders added between surviving devices become holder creates, holders
/// removed while their child survives become holder deletes.
fn compare_holders(lhs: &Devicegraph, rhs: &Devicegraph, synthesis: &mut Synthesis) {
    let old = lhs
        .holders()
        .into_iter()
        .map(|h| ((h.parent, h.child), h.kind))
        .collect::<BTreeMap<_, _>>();
    let new = rhs
        .holders()
        .into_iter()
        .map(|h| ((h.parent, h.child), h.kind))
        .collect::<BTreeMap<_, _>>();

    let keys = old.keys().chain(new.keys()).copied().collect::<BTreeSet<_>>();
    for (parent, child) in keys {
        let (old_kind, new_kind): (Option<&HolderKind>, Option<&HolderKind>) =
            (old.get(&(parent, child)), new.get(&(parent, child)));
        if old_kind == new_kind {
            continue;
        }

        let affect = Affect::Holder { parent, child };
        let mut chain = Vec::new();
        if old_kind.is_some() && rhs.device_exists(child) {
            chain.push(Action::new(ActionKind::Delete, affect));
        }
        if new_kind.is_some() && lhs.device_exists(child) {
            chain.push(Action::new(ActionKind::Create, affect));
        }

        if !chain.is_empty() {
            debug!(
                "Holder {parent} -> {child} changed from {} to {}",
                old_kind.map(HolderKind::name).unwrap_or("none"),
                new_kind.map(HolderKind::name).unwrap_or("none"),
            );
            let vertices = synthesis.insert_chain(chain);
            synthesis.holders.insert((parent, child), vertices);
        }
    }
}
