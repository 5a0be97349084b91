use serde::{Deserialize, Serialize};
use strum_macros::Display;

use crate::{devicegraph::capabilities::BlkDevice, primitives::region::Region};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default, Display)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum CacheMode {
    #[default]
    Writethrough,
    Writeback,
    Writearound,
    None,
}

/// A bcache device. Its parent is the backing device; an optional cache set
/// is attached through a second `User` holder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Bcache {
    pub name: String,
    pub region: Region,

    #[serde(default)]
    pub cache_mode: CacheMode,
}

impl BlkDevice for Bcache {
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

/// A bcache cache set, created on a caching block device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub struct BcacheCset {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub uuid: String,
}
