use serde::{Deserialize, Serialize};

use crate::{
    constants::LVM_DEFAULT_EXTENT_SIZE,
    devicegraph::capabilities::{BlkDevice, ResizeInfo},
    primitives::{bytes::ByteCount, region::Region},
};

/// LVM physical volume. The parent is the block device it lives on, the child
/// the volume group it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub struct LvmPv {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub uuid: String,
}

/// LVM volume group. Its parents are the PVs, its children the LVs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct LvmVg {
    pub vg_name: String,

    #[serde(default = "default_extent_size")]
    pub extent_size: ByteCount,
}

fn default_extent_size() -> ByteCount {
    ByteCount(LVM_DEFAULT_EXTENT_SIZE)
}

impl LvmVg {
    pub fn new(vg_name: impl Into<String>) -> Self {
        Self {
            vg_name: vg_name.into(),
            extent_size: default_extent_size(),
        }
    }

    /// Rounds `size` down to whole extents.
    pub fn align(&self, size: ByteCount) -> ByteCount {
        let extent = self.extent_size.bytes().max(1);
        ByteCount(size.bytes() / extent * extent)
    }
}

/// LVM logical volume.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct LvmLv {
    /// Device node, `/dev/<vg>/<lv>`.
    pub name: String,
    pub lv_name: String,
    pub region: Region,

    #[serde(default = "default_stripes")]
    pub stripes: u32,
}

fn default_stripes() -> u32 {
    1
}

impl LvmLv {
    pub fn lv_path(vg_name: &str, lv_name: &str) -> String {
        format!("/dev/{vg_name}/{lv_name}")
    }

    pub fn resize_info(&self) -> ResizeInfo {
        ResizeInfo {
            min_size: ByteCount(LVM_DEFAULT_EXTENT_SIZE),
            ..ResizeInfo::unlimited()
        }
    }
}

impl BlkDevice for LvmLv {
    fn name(&self) -> &str {
        &self.name
    }

    fn region(&self) -> Region {
        self.region
    }

    fn set_region(&mut self, region: Region) {
        self.region = region;
    }
}

#[cfg(test)]
mod tests {
    use crate::primitives::bytes::MIB;

    use super::*;

    #[test]
    fn test_align() {
        let vg = LvmVg::new("system");
        assert_eq!(vg.align(ByteCount(10 * MIB + 123)), ByteCount(8 * MIB));
        assert_eq!(vg.align(ByteCount::from_gib(1)), ByteCount::from_gib(1));
        assert_eq!(LvmLv::lv_path("system", "root"), "/dev/system/root");
    }
}
