//! Capability traits shared by several device kinds. `DeviceKind::as_*`
//! return these as trait objects.

use serde::{Deserialize, Serialize};

use crate::primitives::{bytes::ByteCount, region::Region};

use super::kinds::mount_point::MountByType;

/// A device with a device node and a size.
pub trait BlkDevice {
    /// Device node, e.g. `/dev/sda1`.
    fn name(&self) -> &str;

    fn region(&self) -> Region;

    fn set_region(&mut self, region: Region);

    fn size(&self) -> ByteCount {
        self.region().size()
    }
}

/// Whether and within which bounds a device can be resized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ResizeInfo {
    pub resize_ok: bool,
    pub min_size: ByteCount,
    pub max_size: ByteCount,
    pub supports_grow: bool,
    pub supports_shrink: bool,
}

impl ResizeInfo {
    pub fn unlimited() -> Self {
        Self {
            resize_ok: true,
            min_size: ByteCount(0),
            max_size: ByteCount(u64::MAX),
            supports_grow: true,
            supports_shrink: true,
        }
    }

    pub fn unsupported() -> Self {
        Self {
            resize_ok: false,
            min_size: ByteCount(0),
            max_size: ByteCount(0),
            supports_grow: false,
            supports_shrink: false,
        }
    }

    /// Restricts `self` by the limits of a device stacked on top of it.
    /// `overhead` is the space the upper device loses to its own metadata.
    pub fn combine(self, upper: ResizeInfo, overhead: ByteCount) -> Self {
        Self {
            resize_ok: self.resize_ok && upper.resize_ok,
            min_size: self.min_size.max(upper.min_size + overhead),
            max_size: self.max_size.min(upper.max_size + overhead),
            supports_grow: self.supports_grow && upper.supports_grow,
            supports_shrink: self.supports_shrink && upper.supports_shrink,
        }
    }
}

/// Something that can be mounted: block filesystems, btrfs subvolumes, NFS.
pub trait Mountable {
    /// Filesystem type as passed to `mount -t`.
    fn mount_type(&self) -> &'static str;

    fn default_mount_by(&self) -> MountByType;

    /// The first fstab column. `device_name` is the node of the underlying
    /// block device, if there is one.
    fn mount_spec(&self, mount_by: MountByType, device_name: Option<&str>) -> Option<String>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_combine() {
        let partition = ResizeInfo::unlimited();
        let xfs = ResizeInfo {
            resize_ok: true,
            min_size: ByteCount(300),
            max_size: ByteCount(u64::MAX),
            supports_grow: true,
            supports_shrink: false,
        };

        let combined = partition.combine(xfs, ByteCount(16));
        assert!(combined.resize_ok);
        assert!(combined.supports_grow);
        assert!(!combined.supports_shrink);
        assert_eq!(combined.min_size, ByteCount(316));
        assert_eq!(combined.max_size, ByteCount(u64::MAX));

        assert!(!partition.combine(ResizeInfo::unsupported(), ByteCount(0)).resize_ok);
    }
}
