use std::fmt::Display;

use log::debug;
use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use strum_macros::IntoStaticStr;

use crate::features::UsedFeatures;

use super::{
    capabilities::{BlkDevice, Mountable},
    graph::Devicegraph,
    kinds::{
        bcache::{Bcache, BcacheCset},
        disk::{Disk, StrayBlkDevice},
        encryption::Encryption,
        filesystem::{BlkFilesystem, BtrfsSubvolume, Nfs},
        lvm::{LvmLv, LvmPv, LvmVg},
        md::Md,
        mount_point::MountPoint,
        partition::{Partition, PartitionTable},
    },
};

/// Storage id. Identifies one logical device across a devicegraph and all of
/// its copies. Never reused within a graph lineage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Sid(pub u32);

impl Display for Sid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// All device kinds and their attributes. The variant name is the
/// `classname` used when persisting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, IntoStaticStr)]
#[serde(tag = "classname")]
pub enum DeviceKind {
    Disk(Disk),
    PartitionTable(PartitionTable),
    Partition(Partition),
    LvmPv(LvmPv),
    LvmVg(LvmVg),
    LvmLv(LvmLv),
    Md(Md),
    Bcache(Bcache),
    BcacheCset(BcacheCset),
    Encryption(Encryption),
    BlkFilesystem(BlkFilesystem),
    BtrfsSubvolume(BtrfsSubvolume),
    Nfs(Nfs),
    MountPoint(MountPoint),
    StrayBlkDevice(StrayBlkDevice),
}

impl DeviceKind {
    pub fn as_blk_device(&self) -> Option<&dyn BlkDevice> {
        match self {
            Self::Disk(d) => Some(d),
            Self::Partition(p) => Some(p),
            Self::LvmLv(lv) => Some(lv),
            Self::Md(md) => Some(md),
            Self::Bcache(b) => Some(b),
            Self::Encryption(e) => Some(e),
            Self::StrayBlkDevice(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_blk_device_mut(&mut self) -> Option<&mut dyn BlkDevice> {
        match self {
            Self::Disk(d) => Some(d),
            Self::Partition(p) => Some(p),
            Self::LvmLv(lv) => Some(lv),
            Self::Md(md) => Some(md),
            Self::Bcache(b) => Some(b),
            Self::Encryption(e) => Some(e),
            Self::StrayBlkDevice(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_mountable(&self) -> Option<&dyn Mountable> {
        match self {
            Self::BlkFilesystem(fs) => Some(fs),
            Self::BtrfsSubvolume(subvol) => Some(subvol),
            Self::Nfs(nfs) => Some(nfs),
            _ => None,
        }
    }

    pub fn as_blk_filesystem(&self) -> Option<&BlkFilesystem> {
        match self {
            Self::BlkFilesystem(fs) => Some(fs),
            _ => None,
        }
    }

    pub fn as_mount_point(&self) -> Option<&MountPoint> {
        match self {
            Self::MountPoint(mp) => Some(mp),
            _ => None,
        }
    }

    pub fn as_partition(&self) -> Option<&Partition> {
        match self {
            Self::Partition(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_partition_table(&self) -> Option<&PartitionTable> {
        match self {
            Self::PartitionTable(pt) => Some(pt),
            _ => None,
        }
    }

    pub fn as_lvm_vg(&self) -> Option<&LvmVg> {
        match self {
            Self::LvmVg(vg) => Some(vg),
            _ => None,
        }
    }

    pub fn as_encryption(&self) -> Option<&Encryption> {
        match self {
            Self::Encryption(e) => Some(e),
            _ => None,
        }
    }

    pub fn is_mountable(&self) -> bool {
        self.as_mountable().is_some()
    }

    /// Disks and stray block devices only ever come from probing.
    pub fn can_be_created(&self) -> bool {
        !matches!(self, Self::Disk(_) | Self::StrayBlkDevice(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    pub sid: Sid,

    #[serde(flatten)]
    pub kind: DeviceKind,
}

impl Device {
    pub fn new(sid: Sid, kind: DeviceKind) -> Self {
        Self { sid, kind }
    }

    pub fn sid(&self) -> Sid {
        self.sid
    }

    pub fn kind(&self) -> &DeviceKind {
        &self.kind
    }

    pub fn classname(&self) -> &'static str {
        (&self.kind).into()
    }

    pub fn exists_in(&self, devicegraph: &Devicegraph) -> bool {
        devicegraph.device_exists(self.sid)
    }

    /// A short name for messages. Devices without a node of their own
    /// (filesystems, PVs) only get a generic name here; the devicegraph
    /// can give a better one with context.
    pub fn displayname(&self) -> String {
        if let Some(blk) = self.kind.as_blk_device() {
            return blk.name().to_owned();
        }

        match &self.kind {
            DeviceKind::PartitionTable(pt) => pt.pt_type.to_string().to_uppercase(),
            DeviceKind::LvmPv(_) => "physical volume".to_owned(),
            DeviceKind::LvmVg(vg) => format!("/dev/{}", vg.vg_name),
            DeviceKind::BcacheCset(cset) if cset.uuid.is_empty() => "cache set".to_owned(),
            DeviceKind::BcacheCset(cset) => format!("cache set {}", cset.uuid),
            DeviceKind::BlkFilesystem(fs) => fs.fs_type.to_string(),
            DeviceKind::BtrfsSubvolume(subvol) => subvol.path.clone(),
            DeviceKind::Nfs(nfs) => format!("{}:{}", nfs.server, nfs.path),
            DeviceKind::MountPoint(mp) => mp.path.clone(),
            _ => self.classname().to_owned(),
        }
    }

    /// Attribute-level comparison. Two devices are equal when they have the
    /// same sid, kind and attributes.
    pub fn equal(&self, other: &Device) -> bool {
        self == other
    }

    /// Names of the attributes that differ between `self` and `other`.
    pub fn diff(&self, other: &Device) -> Vec<String> {
        let (Ok(Value::Mapping(lhs)), Ok(Value::Mapping(rhs))) =
            (serde_yaml::to_value(self), serde_yaml::to_value(other))
        else {
            return vec!["<unserializable>".to_owned()];
        };

        let mut keys = lhs
            .iter()
            .filter(|(key, value)| rhs.get(*key) != Some(*value))
            .map(|(key, _)| render_value(key))
            .collect::<Vec<_>>();
        keys.extend(
            rhs.keys()
                .filter(|key| !lhs.contains_key(*key))
                .map(render_value),
        );
        keys
    }

    /// Logs every attribute that differs between `self` and `other`.
    pub fn log_diff(&self, other: &Device) {
        let (Ok(Value::Mapping(lhs)), Ok(Value::Mapping(rhs))) =
            (serde_yaml::to_value(self), serde_yaml::to_value(other))
        else {
            return;
        };

        for key in self.diff(other) {
            let key = Value::String(key);
            debug!(
                "{} (sid {}) {}: {} -> {}",
                self.classname(),
                self.sid,
                render_value(&key),
                lhs.get(&key).map(render_value).unwrap_or_default(),
                rhs.get(&key).map(render_value).unwrap_or_default(),
            );
        }
    }

    /// Features needed by this device on its own.
    pub fn used_features(&self) -> UsedFeatures {
        match &self.kind {
            DeviceKind::PartitionTable(pt) => pt.pt_type.used_features(),
            DeviceKind::LvmPv(_) | DeviceKind::LvmVg(_) | DeviceKind::LvmLv(_) => {
                UsedFeatures::LVM
            }
            DeviceKind::Md(_) => UsedFeatures::MDRAID,
            DeviceKind::Bcache(_) | DeviceKind::BcacheCset(_) => UsedFeatures::BCACHE,
            DeviceKind::Encryption(e) => e.encryption_type.used_features(),
            DeviceKind::BlkFilesystem(fs) => fs.fs_type.used_features(),
            DeviceKind::BtrfsSubvolume(_) => UsedFeatures::BTRFS,
            DeviceKind::Nfs(_) => UsedFeatures::NFS,
            DeviceKind::Disk(_)
            | DeviceKind::Partition(_)
            | DeviceKind::MountPoint(_)
            | DeviceKind::StrayBlkDevice(_) => UsedFeatures::empty(),
        }
    }
}

fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => serde_yaml::to_string(other)
            .map(|s| s.trim_end().to_owned())
            .unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        devicegraph::kinds::{
            filesystem::FsType,
            mount_point::MountByType,
            partition::{PartitionId, PartitionType},
        },
        primitives::region::Region,
    };

    use super::*;

    fn partition(sid: u32, size_blocks: u64) -> Device {
        Device::new(
            Sid(sid),
            DeviceKind::Partition(Partition {
                name: "/dev/sda1".into(),
                number: 1,
                region: Region::new(2048, size_blocks, 512),
                partition_type: PartitionType::Primary,
                id: PartitionId::Linux,
            }),
        )
    }

    #[test]
    fn test_classname_and_displayname() {
        let device = partition(7, 1024);
        assert_eq!(device.classname(), "Partition");
        assert_eq!(device.displayname(), "/dev/sda1");

        let device = Device::new(
            Sid(8),
            DeviceKind::MountPoint(MountPoint::new("/data", MountByType::Uuid)),
        );
        assert_eq!(device.classname(), "MountPoint");
        assert_eq!(device.displayname(), "/data");
        assert!(device.kind().as_blk_device().is_none());
    }

    #[test]
    fn test_equal_and_diff() {
        let lhs = partition(7, 1024);
        let rhs = partition(7, 2048);
        assert!(lhs.equal(&lhs.clone()));
        assert!(!lhs.equal(&rhs));
        assert_eq!(lhs.diff(&rhs), vec!["region".to_owned()]);
        assert!(lhs.diff(&lhs.clone()).is_empty());
        lhs.log_diff(&rhs);
    }

    #[test]
    fn test_serialize_with_classname() {
        let mut fs = BlkFilesystem::new(FsType::Ext4);
        fs.label = "data".into();
        let device = Device::new(Sid(3), DeviceKind::BlkFilesystem(fs));

        let yaml = serde_yaml::to_string(&device).unwrap();
        assert!(yaml.contains("classname: BlkFilesystem"));
        assert!(yaml.contains("fs-type: ext4"));

        let parsed: Device = serde_yaml::from_str(&yaml).unwrap();
        assert!(parsed.equal(&device));
    }

    #[test]
    fn test_used_features() {
        let device = Device::new(Sid(1), DeviceKind::LvmPv(LvmPv::default()));
        assert_eq!(device.used_features(), UsedFeatures::LVM);
        assert!(partition(2, 10).used_features().is_empty());
    }
}
