use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, IntoStaticStr};

use crate::{
    devicegraph::capabilities::{Mountable, ResizeInfo},
    features::UsedFeatures,
    primitives::bytes::{ByteCount, GIB, KIB, MIB, TIB},
};

use super::mount_point::MountByType;

/// Filesystem types that live directly on block devices.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    IntoStaticStr,
    EnumIter,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum FsType {
    Ext2,
    Ext3,
    Ext4,
    Xfs,
    Btrfs,
    Vfat,
    Ntfs,
    Swap,
}

impl FsType {
    pub fn supports_shrink(self) -> bool {
        !matches!(self, Self::Xfs | Self::Vfat)
    }

    pub fn supports_grow(self) -> bool {
        true
    }

    pub fn min_size(self) -> ByteCount {
        ByteCount(match self {
            Self::Ext2 | Self::Ext3 => MIB,
            Self::Ext4 => 32 * MIB,
            Self::Xfs => 300 * MIB,
            Self::Btrfs => 256 * MIB,
            Self::Vfat => 64 * KIB,
            Self::Ntfs => MIB,
            Self::Swap => 40 * KIB,
        })
    }

    pub fn max_size(self) -> ByteCount {
        ByteCount(match self {
            Self::Ext2 | Self::Ext3 => 16 * TIB,
            Self::Vfat => 2 * TIB,
            Self::Ntfs => 256 * TIB,
            Self::Swap => 128 * GIB,
            Self::Ext4 | Self::Xfs | Self::Btrfs => u64::MAX,
        })
    }

    pub fn supports_label(self) -> bool {
        true
    }

    pub fn max_labelsize(self) -> usize {
        match self {
            Self::Ext2 | Self::Ext3 | Self::Ext4 => 16,
            Self::Xfs => 12,
            Self::Btrfs => 255,
            Self::Vfat => 11,
            Self::Ntfs => 128,
            Self::Swap => 15,
        }
    }

    pub fn supports_uuid(self) -> bool {
        !matches!(self, Self::Vfat | Self::Ntfs)
    }

    pub fn supports_tune_options(self) -> bool {
        matches!(self, Self::Ext2 | Self::Ext3 | Self::Ext4)
    }

    pub fn is_swap(self) -> bool {
        self == Self::Swap
    }

    /// Whether one filesystem of this type may span several block devices.
    pub fn supports_multiple_devices(self) -> bool {
        self == Self::Btrfs
    }

    pub fn default_mount_by(self) -> MountByType {
        match self {
            Self::Vfat | Self::Ntfs => MountByType::Device,
            _ => MountByType::Uuid,
        }
    }

    /// The fsck pass number written to fstab for a new entry.
    pub fn default_passno(self, is_root: bool) -> u32 {
        match self {
            Self::Ext2 | Self::Ext3 | Self::Ext4 | Self::Vfat if is_root => 1,
            Self::Ext2 | Self::Ext3 | Self::Ext4 | Self::Vfat => 2,
            _ => 0,
        }
    }

    pub fn used_features(self) -> UsedFeatures {
        match self {
            Self::Ext2 => UsedFeatures::EXT2,
            Self::Ext3 => UsedFeatures::EXT3,
            Self::Ext4 => UsedFeatures::EXT4,
            Self::Xfs => UsedFeatures::XFS,
            Self::Btrfs => UsedFeatures::BTRFS,
            Self::Vfat => UsedFeatures::VFAT,
            Self::Ntfs => UsedFeatures::NTFS,
            Self::Swap => UsedFeatures::SWAP,
        }
    }

    pub fn resize_info(self) -> ResizeInfo {
        ResizeInfo {
            resize_ok: true,
            min_size: self.min_size(),
            max_size: self.max_size(),
            supports_grow: self.supports_grow(),
            supports_shrink: self.supports_shrink(),
        }
    }
}

/// A filesystem created on one or more block devices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct BlkFilesystem {
    pub fs_type: FsType,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub label: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub uuid: String,

    /// Extra arguments for the mkfs tool.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub mkfs_options: String,

    /// Arguments for the tune tool, applied after creation.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub tune_options: String,
}

impl BlkFilesystem {
    pub fn new(fs_type: FsType) -> Self {
        Self {
            fs_type,
            label: String::new(),
            uuid: String::new(),
            mkfs_options: String::new(),
            tune_options: String::new(),
        }
    }
}

impl Mountable for BlkFilesystem {
    fn mount_type(&self) -> &'static str {
        self.fs_type.into()
    }

    fn default_mount_by(&self) -> MountByType {
        self.fs_type.default_mount_by()
    }

    fn mount_spec(&self, mount_by: MountByType, device_name: Option<&str>) -> Option<String> {
        match mount_by {
            MountByType::Uuid if !self.uuid.is_empty() => Some(format!("UUID={}", self.uuid)),
            MountByType::Label if !self.label.is_empty() => Some(format!("LABEL={}", self.label)),
            _ => device_name.map(str::to_owned),
        }
    }
}

/// A btrfs subvolume. Its parent is the btrfs filesystem or another subvolume.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct BtrfsSubvolume {
    /// Path inside the filesystem, e.g. `@/home`.
    pub path: String,

    #[serde(default)]
    pub nocow: bool,
}

impl Mountable for BtrfsSubvolume {
    fn mount_type(&self) -> &'static str {
        FsType::Btrfs.into()
    }

    fn default_mount_by(&self) -> MountByType {
        MountByType::Uuid
    }

    fn mount_spec(&self, _mount_by: MountByType, device_name: Option<&str>) -> Option<String> {
        device_name.map(str::to_owned)
    }
}

/// An NFS export. It has no parent devices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Nfs {
    pub server: String,
    pub path: String,
}

impl Mountable for Nfs {
    fn mount_type(&self) -> &'static str {
        "nfs"
    }

    fn default_mount_by(&self) -> MountByType {
        MountByType::Device
    }

    fn mount_spec(&self, _mount_by: MountByType, _device_name: Option<&str>) -> Option<String> {
        Some(format!("{}:{}", self.server, self.path))
    }
}
