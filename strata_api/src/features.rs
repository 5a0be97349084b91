//! Features (filesystems, volume managers, encryption) a devicegraph or an
//! action graph needs, used to decide which tools must be installed.

use std::fmt::Display;

use serde::{Deserialize, Serialize};

bitflags::bitflags! {
    #[derive(Serialize, Deserialize, Default, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
    pub struct UsedFeatures: u64 {
        const EXT2 = 1;
        const EXT3 = 1 << 1;
        const EXT4 = 1 << 2;
        const XFS = 1 << 3;
        const BTRFS = 1 << 4;
        const VFAT = 1 << 5;
        const NTFS = 1 << 6;
        const SWAP = 1 << 7;
        const NFS = 1 << 8;
        const LVM = 1 << 9;
        const MDRAID = 1 << 10;
        const LUKS = 1 << 11;
        const PLAIN_ENCRYPTION = 1 << 12;
        const BCACHE = 1 << 13;
        const GPT = 1 << 14;
        const MSDOS = 1 << 15;
        const QUOTA = 1 << 16;
    }
}

impl Display for UsedFeatures {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names = self
            .iter_names()
            .map(|(name, _)| name.to_lowercase())
            .collect::<Vec<_>>();
        f.write_str(&names.join(" "))
    }
}

/// Whether to report only the features needed to mount the system, or
/// everything that is present.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum UsedFeaturesDependencyType {
    /// Features of every block layer plus filesystems that have a mount point.
    Required,

    /// Features of every device, mounted or not.
    #[default]
    Suggested,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(UsedFeatures::empty().to_string(), "");
        assert_eq!(
            (UsedFeatures::EXT4 | UsedFeatures::LVM | UsedFeatures::GPT).to_string(),
            "ext4 lvm gpt"
        );
    }
}
