use serde::{Deserialize, Serialize};

use crate::{devicegraph::capabilities::BlkDevice, primitives::region::Region};

/// A physical disk. Disks are found by probing and never created or deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Disk {
    pub name: String,
    pub region: Region,

    #[serde(default)]
    pub rotational: bool,
}

/// A block device that could not be classified, e.g. a partition of a
/// virtual machine image. Like disks, it is never created or deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct StrayBlkDevice {
    pub name: String,
    pub region: Region,
}

impl BlkDevice for Disk {
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

impl BlkDevice for StrayBlkDevice {
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
