use serde::{Deserialize, Serialize};
use strum_macros::{Display, IntoStaticStr};

use crate::{
    devicegraph::capabilities::{BlkDevice, ResizeInfo},
    features::UsedFeatures,
    primitives::{bytes::ByteCount, region::Region},
};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, IntoStaticStr,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum PtType {
    Gpt,
    Msdos,
}

impl PtType {
    pub fn used_features(self) -> UsedFeatures {
        match self {
            Self::Gpt => UsedFeatures::GPT,
            Self::Msdos => UsedFeatures::MSDOS,
        }
    }

    /// Number of primary partitions the table can hold.
    pub fn max_primary(self) -> u32 {
        match self {
            Self::Gpt => 128,
            Self::Msdos => 4,
        }
    }

    /// Blocks at the start and end of the disk the table itself occupies.
    pub fn overhead_blocks(self) -> (u64, u64) {
        match self {
            Self::Gpt => (34, 33),
            Self::Msdos => (1, 0),
        }
    }
}

/// A partition table on a disk, an MD RAID or any other partitionable device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct PartitionTable {
    pub pt_type: PtType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default, Display)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum PartitionType {
    #[default]
    Primary,
    Extended,
    Logical,
}

/// Partition type code, mapped to a GPT type GUID or an MBR id when written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default, Display)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum PartitionId {
    #[default]
    Linux,
    Swap,
    Lvm,
    Raid,
    Esp,
    BiosBoot,
}

impl PartitionId {
    /// Type code understood by `sgdisk --typecode`.
    pub fn gpt_typecode(self) -> &'static str {
        match self {
            Self::Linux => "8300",
            Self::Swap => "8200",
            Self::Lvm => "8e00",
            Self::Raid => "fd00",
            Self::Esp => "ef00",
            Self::BiosBoot => "ef02",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Partition {
    pub name: String,
    pub number: u32,
    pub region: Region,

    #[serde(default)]
    pub partition_type: PartitionType,

    #[serde(default)]
    pub id: PartitionId,
}

impl Partition {
    /// Partition node name for partition `number` on `parent`. Parents whose
    /// name ends in a digit, like `/dev/nvme0n1` or `/dev/md0`, get a `p`.
    pub fn partition_name(parent: &str, number: u32) -> String {
        if parent.ends_with(|c: char| c.is_ascii_digit()) {
            format!("{parent}p{number}")
        } else {
            format!("{parent}{number}")
        }
    }

    pub fn resize_info(&self) -> ResizeInfo {
        ResizeInfo {
            min_size: ByteCount(u64::from(self.region.block_size)),
            ..ResizeInfo::unlimited()
        }
    }
}

impl BlkDevice for Partition {
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
