use serde::{Deserialize, Serialize};
use strum_macros::{Display, IntoStaticStr};

use crate::{
    devicegraph::capabilities::BlkDevice,
    primitives::{bytes::ByteCount, region::Region},
};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, IntoStaticStr,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum MdLevel {
    Raid0,
    Raid1,
    Raid5,
    Raid6,
    Raid10,
}

impl MdLevel {
    pub fn min_devices(self) -> usize {
        match self {
            Self::Raid0 | Self::Raid1 => 2,
            Self::Raid5 => 3,
            Self::Raid6 | Self::Raid10 => 4,
        }
    }

    /// Usable size of an array built from `count` members of `member_size`.
    pub fn array_size(self, member_size: ByteCount, count: u64) -> ByteCount {
        let usable = match self {
            Self::Raid0 => count,
            Self::Raid1 => 1,
            Self::Raid5 => count.saturating_sub(1),
            Self::Raid6 => count.saturating_sub(2),
            Self::Raid10 => count / 2,
        };
        ByteCount(member_size.bytes().saturating_mul(usable))
    }
}

/// Linux software RAID. Members are attached with `MdUser` holders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Md {
    pub name: String,
    pub level: MdLevel,
    pub region: Region,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk_size: Option<ByteCount>,

    #[serde(default = "default_metadata")]
    pub metadata: String,
}

fn default_metadata() -> String {
    "1.0".to_owned()
}

impl Md {
    pub fn new(name: impl Into<String>, level: MdLevel, region: Region) -> Self {
        Self {
            name: name.into(),
            level,
            region,
            chunk_size: None,
            metadata: default_metadata(),
        }
    }
}

impl BlkDevice for Md {
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
