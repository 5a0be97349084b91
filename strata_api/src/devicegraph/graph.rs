use std::collections::{BTreeSet, HashMap, VecDeque};

use log::trace;
use petgraph::{
    stable_graph::{NodeIndex, StableGraph},
    visit::{EdgeRef, IntoEdgeReferences},
    Directed, Direction,
};

use crate::{
    error::{InternalError, ReportError, StorageError},
    features::{UsedFeatures, UsedFeaturesDependencyType},
};

use super::{
    capabilities::BlkDevice,
    device::{Device, DeviceKind, Sid},
    holder::{Holder, HolderKind},
    kinds::mount_point::MountByType,
    view::View,
};

/// The type of the graph used to store devices and holders.
pub type DevicePetgraph = StableGraph<Device, HolderKind, Directed, u32>;

/// One snapshot of the storage topology.
///
/// Vertices are devices, edges are holders pointing from parent to child.
/// Lookups by sid go through an index kept next to the graph, so vertex
/// removal never invalidates them.
#[derive(Debug, Clone)]
pub struct Devicegraph {
    inner: DevicePetgraph,
    index: HashMap<Sid, NodeIndex>,
    next_sid: u32,
}

impl Default for Devicegraph {
    fn default() -> Self {
        Self::new()
    }
}

impl Devicegraph {
    pub fn new() -> Self {
        Self {
            inner: DevicePetgraph::default(),
            index: HashMap::new(),
            next_sid: 1,
        }
    }

    /// Hands out a sid that no device in this graph or any of its copies
    /// has used.
    pub fn allocate_sid(&mut self) -> Sid {
        let sid = Sid(self.next_sid);
        self.next_sid += 1;
        sid
    }

    pub fn add_device(&mut self, device: Device) -> Result<NodeIndex, StorageError> {
        let sid = device.sid;
        if self.index.contains_key(&sid) {
            return Err(StorageError::new(InternalError::DuplicateSid { sid }));
        }

        self.next_sid = self.next_sid.max(sid.0 + 1);
        let idx = self.inner.add_node(device);
        self.index.insert(sid, idx);
        Ok(idx)
    }

    /// Adds a device with a fresh sid.
    pub fn create_device(&mut self, kind: DeviceKind) -> Result<Sid, StorageError> {
        let sid = self.allocate_sid();
        self.add_device(Device::new(sid, kind))?;
        Ok(sid)
    }

    pub fn add_holder(
        &mut self,
        parent: Sid,
        child: Sid,
        kind: HolderKind,
    ) -> Result<(), StorageError> {
        let (Some(&from), Some(&to)) = (self.index.get(&parent), self.index.get(&child)) else {
            return Err(StorageError::new(InternalError::HolderEndpointMissing {
                parent,
                child,
            }));
        };

        self.inner.add_edge(from, to, kind);
        Ok(())
    }

    pub fn remove_holder(&mut self, parent: Sid, child: Sid) -> Result<HolderKind, StorageError> {
        let from = self.node(parent)?;
        let to = self.node(child)?;
        let edge = self
            .inner
            .find_edge(from, to)
            .structured(InternalError::HolderNotFound { parent, child })?;
        self.inner
            .remove_edge(edge)
            .structured(InternalError::HolderNotFound { parent, child })
    }

    /// Removes a device and all holders touching it.
    pub fn remove_device(&mut self, sid: Sid) -> Result<Device, StorageError> {
        let idx = self
            .index
            .remove(&sid)
            .structured(InternalError::DeviceNotFound { sid })?;
        self.inner
            .remove_node(idx)
            .structured(InternalError::DeviceNotFound { sid })
    }

    /// Removes every device reachable from `sid` through holders followed by
    /// `view`. The device itself stays.
    pub fn remove_descendants(&mut self, sid: Sid, view: View) -> Result<(), StorageError> {
        for descendant in self.descendants(sid, view)? {
            trace!("Removing descendant {descendant} of {sid}");
            self.remove_device(descendant)?;
        }
        Ok(())
    }

    pub fn find_device(&self, sid: Sid) -> Result<&Device, StorageError> {
        let idx = self.node(sid)?;
        Ok(&self.inner[idx])
    }

    pub fn find_device_mut(&mut self, sid: Sid) -> Result<&mut Device, StorageError> {
        let idx = self.node(sid)?;
        Ok(&mut self.inner[idx])
    }

    pub fn device_exists(&self, sid: Sid) -> bool {
        self.index.contains_key(&sid)
    }

    pub fn num_devices(&self) -> usize {
        self.inner.node_count()
    }

    pub fn num_holders(&self) -> usize {
        self.inner.edge_count()
    }

    /// All sids, in ascending order.
    pub fn sids(&self) -> Vec<Sid> {
        let mut sids = self.index.keys().copied().collect::<Vec<_>>();
        sids.sort_unstable();
        sids
    }

    /// All devices, ordered by sid.
    pub fn devices(&self) -> impl Iterator<Item = &Device> + '_ {
        self.sids().into_iter().map(move |sid| &self.inner[self.index[&sid]])
    }

    /// All holders, ordered by (parent, child).
    pub fn holders(&self) -> Vec<Holder> {
        let mut holders = self
            .inner
            .edge_references()
            .map(|edge| Holder {
                parent: self.inner[edge.source()].sid,
                child: self.inner[edge.target()].sid,
                kind: edge.weight().clone(),
            })
            .collect::<Vec<_>>();
        holders.sort_by_key(|h| (h.parent, h.child));
        holders
    }

    pub fn find_holder(&self, parent: Sid, child: Sid) -> Option<&HolderKind> {
        let from = *self.index.get(&parent)?;
        let to = *self.index.get(&child)?;
        self.inner
            .find_edge(from, to)
            .and_then(|edge| self.inner.edge_weight(edge))
    }

    pub fn children(&self, sid: Sid, view: View) -> Result<Vec<Sid>, StorageError> {
        self.neighbors(sid, view, Direction::Outgoing)
    }

    pub fn parents(&self, sid: Sid, view: View) -> Result<Vec<Sid>, StorageError> {
        self.neighbors(sid, view, Direction::Incoming)
    }

    /// Children of the parents of `sid`, without `sid` itself.
    pub fn siblings(&self, sid: Sid, view: View) -> Result<Vec<Sid>, StorageError> {
        let mut siblings = BTreeSet::new();
        for parent in self.parents(sid, view)? {
            siblings.extend(self.children(parent, view)?);
        }
        siblings.remove(&sid);
        Ok(siblings.into_iter().collect())
    }

    pub fn ancestors(&self, sid: Sid, view: View) -> Result<Vec<Sid>, StorageError> {
        self.reachable(sid, view, Direction::Incoming)
    }

    pub fn descendants(&self, sid: Sid, view: View) -> Result<Vec<Sid>, StorageError> {
        self.reachable(sid, view, Direction::Outgoing)
    }

    /// Descendants of `sid` without children of their own. A device without
    /// children is its own leaf.
    pub fn leaves(&self, sid: Sid, view: View) -> Result<Vec<Sid>, StorageError> {
        self.ends(sid, view, Direction::Outgoing)
    }

    /// Ancestors of `sid` without parents of their own.
    pub fn roots(&self, sid: Sid, view: View) -> Result<Vec<Sid>, StorageError> {
        self.ends(sid, view, Direction::Incoming)
    }

    /// Checks that sids are unique, that every holder connects two devices
    /// of this graph and that there are no cycles.
    pub fn check(&self) -> Result<(), StorageError> {
        let mut seen = HashMap::new();
        for idx in self.inner.node_indices() {
            let sid = self.inner[idx].sid;
            if seen.insert(sid, idx).is_some() || self.index.get(&sid) != Some(&idx) {
                return Err(StorageError::new(InternalError::DuplicateSid { sid }));
            }
        }

        for edge in self.inner.edge_indices() {
            let Some((from, to)) = self.inner.edge_endpoints(edge) else {
                return Err(StorageError::internal("Holder without endpoints"));
            };
            if !self.inner.contains_node(from) || !self.inner.contains_node(to) {
                return Err(StorageError::new(InternalError::HolderEndpointMissing {
                    parent: self.inner.node_weight(from).map(|d| d.sid).unwrap_or(Sid(0)),
                    child: self.inner.node_weight(to).map(|d| d.sid).unwrap_or(Sid(0)),
                }));
            }
        }

        petgraph::algo::toposort(&self.inner, None).map_err(|cycle| {
            StorageError::new(InternalError::DevicegraphCycle {
                sid: self.inner[cycle.node_id()].sid,
            })
        })?;

        Ok(())
    }

    /// Features needed by the devices of this graph. With
    /// `UsedFeaturesDependencyType::Required` filesystems only count when
    /// they are mounted somewhere.
    pub fn used_features(&self, dependency_type: UsedFeaturesDependencyType) -> UsedFeatures {
        self.devices()
            .filter(|device| match dependency_type {
                UsedFeaturesDependencyType::Suggested => true,
                UsedFeaturesDependencyType::Required => {
                    !device.kind.is_mountable() || self.mount_point_of(device.sid).is_some()
                }
            })
            .fold(UsedFeatures::empty(), |acc, device| {
                acc | device.used_features()
            })
    }

    /// Name for messages, using the surrounding devices where the device
    /// has no name of its own.
    pub fn displayname(&self, sid: Sid) -> String {
        let Ok(device) = self.find_device(sid) else {
            return format!("sid {sid}");
        };

        match &device.kind {
            DeviceKind::BlkFilesystem(fs) => {
                let names = self.blk_device_names(sid);
                if names.is_empty() {
                    fs.fs_type.to_string()
                } else {
                    format!("{} on {}", fs.fs_type, names.join(", "))
                }
            }
            DeviceKind::LvmPv(_) | DeviceKind::PartitionTable(_) => {
                match self.blk_device_names(sid).first() {
                    Some(name) => format!("{} on {name}", device.displayname()),
                    None => device.displayname(),
                }
            }
            _ => device.displayname(),
        }
    }

    /// The block device directly below `sid`, e.g. the partition a
    /// filesystem or an encryption lives on.
    pub fn blk_device_of(&self, sid: Sid) -> Option<(Sid, &dyn BlkDevice)> {
        self.parents(sid, View::All)
            .ok()?
            .into_iter()
            .find_map(|parent| {
                let device = self.find_device(parent).ok()?;
                device.kind.as_blk_device().map(|blk| (parent, blk))
            })
    }

    fn blk_device_names(&self, sid: Sid) -> Vec<String> {
        self.parents(sid, View::All)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|parent| self.find_device(parent).ok())
            .filter_map(|device| device.kind.as_blk_device().map(|b| b.name().to_owned()))
            .collect()
    }

    /// The mount point of a mountable, if it has one.
    pub fn mount_point_of(&self, mountable: Sid) -> Option<Sid> {
        self.children(mountable, View::All)
            .ok()?
            .into_iter()
            .find(|child| {
                self.find_device(*child)
                    .is_ok_and(|d| d.kind.as_mount_point().is_some())
            })
    }

    /// The mountable a mount point belongs to.
    pub fn mountable_of(&self, mount_point: Sid) -> Option<Sid> {
        self.parents(mount_point, View::All)
            .ok()?
            .into_iter()
            .find(|parent| self.find_device(*parent).is_ok_and(|d| d.kind.is_mountable()))
    }

    /// The btrfs filesystem a subvolume belongs to.
    pub fn btrfs_of_subvolume(&self, subvolume: Sid) -> Option<Sid> {
        self.ancestors(subvolume, View::All)
            .ok()?
            .into_iter()
            .find(|sid| {
                self.find_device(*sid)
                    .is_ok_and(|d| d.kind.as_blk_filesystem().is_some())
            })
    }

    /// Device node or fstab spec to use for mounting `mountable`.
    pub fn mount_spec(
        &self,
        mountable: Sid,
        mount_by: MountByType,
    ) -> Option<String> {
        let device = self.find_device(mountable).ok()?;
        match &device.kind {
            DeviceKind::BtrfsSubvolume(_) => {
                let btrfs = self.btrfs_of_subvolume(mountable)?;
                self.mount_spec(btrfs, mount_by)
            }
            kind => {
                let device_name = self.blk_device_of(mountable).map(|(_, b)| b.name().to_owned());
                kind.as_mountable()?
                    .mount_spec(mount_by, device_name.as_deref())
            }
        }
    }

    /// Finds a block device or volume group by its device node.
    pub fn find_by_name(&self, name: &str) -> Option<&Device> {
        self.devices().find(|device| match &device.kind {
            DeviceKind::LvmVg(vg) => format!("/dev/{}", vg.vg_name) == name,
            kind => kind.as_blk_device().is_some_and(|b| b.name() == name),
        })
    }

    pub fn find_mount_point(&self, path: &str) -> Option<&Device> {
        self.devices()
            .find(|device| device.kind.as_mount_point().is_some_and(|mp| mp.path == path))
    }

    fn node(&self, sid: Sid) -> Result<NodeIndex, StorageError> {
        self.index
            .get(&sid)
            .copied()
            .structured(InternalError::DeviceNotFound { sid })
    }

    fn neighbors(
        &self,
        sid: Sid,
        view: View,
        direction: Direction,
    ) -> Result<Vec<Sid>, StorageError> {
        let idx = self.node(sid)?;
        let mut sids = self
            .inner
            .edges_directed(idx, direction)
            .filter(|edge| view.follows(edge.weight()))
            .map(|edge| match direction {
                Direction::Outgoing => self.inner[edge.target()].sid,
                Direction::Incoming => self.inner[edge.source()].sid,
            })
            .collect::<Vec<_>>();
        sids.sort_unstable();
        sids.dedup();
        Ok(sids)
    }

    fn reachable(&self, sid: Sid, view: View, direction: Direction) -> Result<Vec<Sid>, StorageError> {
        let mut seen = BTreeSet::new();
        let mut queue = VecDeque::from([sid]);
        while let Some(current) = queue.pop_front() {
            for next in self.neighbors(current, view, direction)? {
                if seen.insert(next) {
                    queue.push_back(next);
                }
            }
        }
        seen.remove(&sid);
        Ok(seen.into_iter().collect())
    }

    fn ends(&self, sid: Sid, view: View, direction: Direction) -> Result<Vec<Sid>, StorageError> {
        let mut candidates = self.reachable(sid, view, direction)?;
        candidates.push(sid);
        let mut ends = Vec::new();
        for candidate in candidates {
            if self.neighbors(candidate, view, direction)?.is_empty() {
                ends.push(candidate);
            }
        }
        ends.sort_unstable();
        Ok(ends)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use crate::{
        devicegraph::kinds::{
            disk::Disk,
            filesystem::{BlkFilesystem, BtrfsSubvolume, FsType},
            lvm::{LvmLv, LvmPv, LvmVg},
            mount_point::MountPoint,
            partition::{Partition, PartitionId, PartitionTable, PartitionType, PtType},
        },
        error::ErrorKind,
        primitives::region::Region,
    };
    use maplit::btreeset;

    use super::*;

    /// sda (2 TiB) with a GPT and one partition carrying ext4 mounted at /data.
    pub(crate) fn disk_with_ext4() -> (Devicegraph, Sid, Sid, Sid, Sid, Sid) {
        let mut graph = Devicegraph::new();
        let disk = graph
            .create_device(DeviceKind::Disk(Disk {
                name: "/dev/sda".into(),
                region: Region::new(0, 4 * 1024 * 1024 * 1024, 512),
                rotational: false,
            }))
            .unwrap();
        let gpt = graph
            .create_device(DeviceKind::PartitionTable(PartitionTable {
                pt_type: PtType::Gpt,
            }))
            .unwrap();
        graph.add_holder(disk, gpt, HolderKind::User).unwrap();
        let sda1 = graph
            .create_device(DeviceKind::Partition(Partition {
                name: "/dev/sda1".into(),
                number: 1,
                region: Region::new(2048, 1024000, 512),
                partition_type: PartitionType::Primary,
                id: PartitionId::Linux,
            }))
            .unwrap();
        graph.add_holder(gpt, sda1, HolderKind::Subdevice).unwrap();
        let fs = graph
            .create_device(DeviceKind::BlkFilesystem(BlkFilesystem::new(FsType::Ext4)))
            .unwrap();
        graph.add_holder(sda1, fs, HolderKind::FilesystemUser).unwrap();
        let mp = graph
            .create_device(DeviceKind::MountPoint(MountPoint::new(
                "/data",
                MountByType::Device,
            )))
            .unwrap();
        graph.add_holder(fs, mp, HolderKind::User).unwrap();
        (graph, disk, gpt, sda1, fs, mp)
    }

    #[test]
    fn test_add_and_find() {
        let (graph, disk, gpt, sda1, fs, mp) = disk_with_ext4();
        assert_eq!(graph.num_devices(), 5);
        assert_eq!(graph.num_holders(), 4);
        assert_eq!(graph.sids(), vec![disk, gpt, sda1, fs, mp]);
        assert_eq!(graph.find_device(sda1).unwrap().displayname(), "/dev/sda1");
        assert!(graph.device_exists(mp));
        assert!(!graph.device_exists(Sid(999)));

        let err = graph.find_device(Sid(999)).unwrap_err();
        assert!(matches!(
            err.kind(),
            ErrorKind::Internal(InternalError::DeviceNotFound { sid: Sid(999) })
        ));
        graph.check().unwrap();
    }

    #[test]
    fn test_duplicate_sid() {
        let (mut graph, _, _, sda1, _, _) = disk_with_ext4();
        let device = graph.find_device(sda1).unwrap().clone();
        let err = graph.add_device(device).unwrap_err();
        assert!(matches!(
            err.kind(),
            ErrorKind::Internal(InternalError::DuplicateSid { .. })
        ));
    }

    #[test]
    fn test_holder_endpoint_missing() {
        let (mut graph, disk, ..) = disk_with_ext4();
        let err = graph
            .add_holder(disk, Sid(100), HolderKind::User)
            .unwrap_err();
        assert!(matches!(
            err.kind(),
            ErrorKind::Internal(InternalError::HolderEndpointMissing { .. })
        ));
    }

    #[test]
    fn test_traversal() {
        let (graph, disk, gpt, sda1, fs, mp) = disk_with_ext4();
        assert_eq!(graph.children(disk, View::All).unwrap(), vec![gpt]);
        assert_eq!(graph.parents(fs, View::All).unwrap(), vec![sda1]);
        assert_eq!(
            graph.descendants(disk, View::All).unwrap(),
            vec![gpt, sda1, fs, mp]
        );
        assert_eq!(graph.ancestors(mp, View::All).unwrap(), vec![disk, gpt, sda1, fs]);
        assert_eq!(graph.leaves(disk, View::All).unwrap(), vec![mp]);
        assert_eq!(graph.roots(mp, View::All).unwrap(), vec![disk]);
        assert_eq!(graph.leaves(mp, View::All).unwrap(), vec![mp]);
        assert!(graph.siblings(sda1, View::All).unwrap().is_empty());
        assert_eq!(graph.mount_point_of(fs), Some(mp));
        assert_eq!(graph.mountable_of(mp), Some(fs));
        assert_eq!(graph.displayname(fs), "ext4 on /dev/sda1");
        assert_eq!(graph.displayname(gpt), "GPT on /dev/sda");
        assert_eq!(
            graph.mount_spec(fs, MountByType::Device),
            Some("/dev/sda1".into())
        );
        assert_eq!(graph.find_by_name("/dev/sda1").map(|d| d.sid), Some(sda1));
        assert_eq!(graph.find_mount_point("/data").map(|d| d.sid), Some(mp));
    }

    #[test]
    fn test_siblings() {
        let (mut graph, _, gpt, sda1, ..) = disk_with_ext4();
        let sda2 = graph
            .create_device(DeviceKind::Partition(Partition {
                name: "/dev/sda2".into(),
                number: 2,
                region: Region::new(1026048, 1024000, 512),
                partition_type: PartitionType::Primary,
                id: PartitionId::Linux,
            }))
            .unwrap();
        graph.add_holder(gpt, sda2, HolderKind::Subdevice).unwrap();

        assert_eq!(graph.siblings(sda1, View::All).unwrap(), vec![sda2]);
        assert_eq!(graph.siblings(sda2, View::All).unwrap(), vec![sda1]);
        assert_eq!(
            graph
                .children(gpt, View::All)
                .unwrap()
                .into_iter()
                .collect::<BTreeSet<_>>(),
            btreeset! {sda1, sda2}
        );
    }

    #[test]
    fn test_classic_view_skips_snapshots() {
        let mut graph = Devicegraph::new();
        let vg = graph
            .create_device(DeviceKind::LvmVg(LvmVg::new("system")))
            .unwrap();
        let mk_lv = |name: &str| {
            DeviceKind::LvmLv(LvmLv {
                name: LvmLv::lv_path("system", name),
                lv_name: name.into(),
                region: Region::new(0, 2048, 512),
                stripes: 1,
            })
        };
        let origin = graph.create_device(mk_lv("root")).unwrap();
        let snapshot = graph.create_device(mk_lv("root-snap")).unwrap();
        graph.add_holder(vg, origin, HolderKind::Subdevice).unwrap();
        graph.add_holder(vg, snapshot, HolderKind::Subdevice).unwrap();
        graph.add_holder(origin, snapshot, HolderKind::Snapshot).unwrap();

        assert_eq!(graph.children(origin, View::All).unwrap(), vec![snapshot]);
        assert!(graph.children(origin, View::Classic).unwrap().is_empty());
        assert_eq!(graph.parents(snapshot, View::Classic).unwrap(), vec![vg]);
        assert_eq!(graph.siblings(origin, View::Classic).unwrap(), vec![snapshot]);
    }

    #[test]
    fn test_copy_keeps_sids_and_counter() {
        let (graph, ..) = disk_with_ext4();
        let mut copy = graph.clone();
        assert_eq!(copy.sids(), graph.sids());
        for device in graph.devices() {
            assert!(device.equal(copy.find_device(device.sid).unwrap()));
        }

        let new_sid = copy.allocate_sid();
        assert!(!graph.device_exists(new_sid));
        assert!(graph.sids().iter().all(|sid| *sid < new_sid));
    }

    #[test]
    fn test_remove_descendants() {
        let (mut graph, disk, gpt, sda1, fs, mp) = disk_with_ext4();
        graph.remove_descendants(gpt, View::All).unwrap();
        assert_eq!(graph.sids(), vec![disk, gpt]);
        assert!(!graph.device_exists(sda1));
        assert!(!graph.device_exists(fs));
        assert!(!graph.device_exists(mp));
        assert_eq!(graph.num_holders(), 1);
        graph.check().unwrap();
    }

    #[test]
    fn test_check_detects_cycle() {
        let (mut graph, disk, _, _, _, mp) = disk_with_ext4();
        graph.add_holder(mp, disk, HolderKind::User).unwrap();
        let err = graph.check().unwrap_err();
        assert!(matches!(
            err.kind(),
            ErrorKind::Internal(InternalError::DevicegraphCycle { .. })
        ));
    }

    #[test]
    fn test_used_features() {
        let (mut graph, _, _, sda1, _, _) = disk_with_ext4();
        assert_eq!(
            graph.used_features(UsedFeaturesDependencyType::Suggested),
            UsedFeatures::GPT | UsedFeatures::EXT4
        );

        let pv = graph.create_device(DeviceKind::LvmPv(LvmPv::default())).unwrap();
        graph.add_holder(sda1, pv, HolderKind::User).unwrap();
        let subvol = graph
            .create_device(DeviceKind::BtrfsSubvolume(BtrfsSubvolume {
                path: "@".into(),
                nocow: false,
            }))
            .unwrap();
        graph.add_holder(pv, subvol, HolderKind::Subdevice).unwrap();

        assert_eq!(
            graph.used_features(UsedFeaturesDependencyType::Required),
            UsedFeatures::GPT | UsedFeatures::EXT4 | UsedFeatures::LVM
        );
        assert!(graph
            .used_features(UsedFeaturesDependencyType::Suggested)
            .contains(UsedFeatures::BTRFS));
    }
}
