use serde::{Deserialize, Serialize};
use strum_macros::Display;

use crate::{
    constants::{DEV_MAPPER_DIRECTORY, LUKS_HEADER_SIZE_IN_MIB},
    devicegraph::capabilities::BlkDevice,
    features::UsedFeatures,
    primitives::{bytes::ByteCount, region::Region},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default, Display)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum EncryptionType {
    Luks1,
    #[default]
    Luks2,
    Plain,
}

impl EncryptionType {
    /// Space the encryption metadata takes away from the underlying device.
    pub fn overhead(self) -> ByteCount {
        match self {
            Self::Luks1 | Self::Luks2 => ByteCount::from_mib(LUKS_HEADER_SIZE_IN_MIB),
            Self::Plain => ByteCount(0),
        }
    }

    pub fn used_features(self) -> UsedFeatures {
        match self {
            Self::Luks1 | Self::Luks2 => UsedFeatures::LUKS,
            Self::Plain => UsedFeatures::PLAIN_ENCRYPTION,
        }
    }
}

/// A dm-crypt mapping on top of a block device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Encryption {
    /// Device node, `/dev/mapper/<dm_table_name>`.
    pub name: String,
    pub dm_table_name: String,

    #[serde(default)]
    pub encryption_type: EncryptionType,

    pub region: Region,

    /// Key file passed to cryptsetup. Without one, cryptsetup reads the
    /// passphrase from stdin.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_file: Option<String>,
}

impl Encryption {
    pub fn dm_name_to_path(dm_table_name: &str) -> String {
        format!("{DEV_MAPPER_DIRECTORY}/{dm_table_name}")
    }
}

impl BlkDevice for Encryption {
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
