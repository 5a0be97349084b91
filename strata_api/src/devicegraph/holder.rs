use serde::{Deserialize, Serialize};
use strum_macros::IntoStaticStr;

use super::device::Sid;

/// The kind of a parent → child relation between two devices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, IntoStaticStr)]
#[serde(tag = "type", rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum HolderKind {
    /// The child is part of the parent: disk → partition table → partition,
    /// volume group → logical volume, btrfs → subvolume.
    Subdevice,

    /// The child uses the parent: block device → PV, encryption or bcache,
    /// PV → volume group, mountable → mount point.
    User,

    /// A block device used by a filesystem. Multi-device btrfs has several.
    FilesystemUser,

    /// A member of an MD RAID.
    MdUser {
        #[serde(default)]
        sort_key: u32,
        #[serde(default)]
        spare: bool,
        #[serde(default)]
        faulty: bool,
    },

    /// Origin → snapshot.
    Snapshot,
}

impl HolderKind {
    pub fn md_member(sort_key: u32) -> Self {
        Self::MdUser {
            sort_key,
            spare: false,
            faulty: false,
        }
    }

    pub fn name(&self) -> &'static str {
        self.into()
    }
}

/// A holder as it appears in a persisted devicegraph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Holder {
    pub parent: Sid,
    pub child: Sid,

    #[serde(flatten)]
    pub kind: HolderKind,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_holder_serialization() {
        let holder = Holder {
            parent: Sid(1),
            child: Sid(5),
            kind: HolderKind::md_member(2),
        };
        let yaml = serde_yaml::to_string(&holder).unwrap();
        assert!(yaml.contains("type: md-user"));
        assert!(yaml.contains("sort_key: 2"));

        let parsed: Holder = serde_yaml::from_str("parent: 1\nchild: 2\ntype: user").unwrap();
        assert_eq!(parsed.kind, HolderKind::User);
        assert_eq!(parsed.kind.name(), "user");
    }
}
