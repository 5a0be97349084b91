use serde::{Deserialize, Serialize};
use strum_macros::{Display, IntoStaticStr};

use crate::constants::{NONE_MOUNT_POINT, SWAP_MOUNT_POINT};

use super::filesystem::FsType;

/// How the device is referenced in the first fstab column.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, IntoStaticStr,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum MountByType {
    Device,
    Uuid,
    Label,
    PartUuid,
    PartLabel,
}

/// Where and how a mountable is mounted.
///
/// `active` tracks whether it is mounted right now, `in_etc_fstab` whether
/// it has an entry in fstab. The two are independent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct MountPoint {
    pub path: String,

    pub mount_by: MountByType,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mount_options: Vec<String>,

    #[serde(default)]
    pub freq: u32,

    #[serde(default)]
    pub passno: u32,

    #[serde(default = "default_true")]
    pub active: bool,

    #[serde(default = "default_true")]
    pub in_etc_fstab: bool,
}

fn default_true() -> bool {
    true
}

impl MountPoint {
    pub fn new(path: impl Into<String>, mount_by: MountByType) -> Self {
        Self {
            path: path.into(),
            mount_by,
            mount_options: Vec::new(),
            freq: 0,
            passno: 0,
            active: true,
            in_etc_fstab: true,
        }
    }

    /// Whether the fstab entry of `self` differs from that of `other` in a
    /// way that requires rewriting it.
    pub fn fstab_entry_differs(&self, other: &MountPoint) -> bool {
        self.path != other.path
            || self.mount_by != other.mount_by
            || self.mount_options != other.mount_options
            || self.freq != other.freq
            || self.passno != other.passno
    }

    /// Options joined for the fstab column, `defaults` when empty.
    pub fn options_string(&self) -> String {
        if self.mount_options.is_empty() {
            "defaults".to_owned()
        } else {
            self.mount_options.join(",")
        }
    }
}

/// Checks whether `path` can be used as a mount point for a filesystem of
/// type `fs_type`. Swap only accepts `swap` and `none`, everything else needs
/// an absolute path.
pub fn is_valid_path(fs_type: Option<FsType>, path: &str) -> bool {
    match fs_type {
        Some(FsType::Swap) => path == SWAP_MOUNT_POINT || path == NONE_MOUNT_POINT,
        _ => path.starts_with('/'),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_valid_path() {
        assert!(is_valid_path(Some(FsType::Swap), "swap"));
        assert!(is_valid_path(Some(FsType::Swap), "none"));
        assert!(!is_valid_path(Some(FsType::Swap), "/swap"));
        assert!(is_valid_path(Some(FsType::Ext4), "/"));
        assert!(is_valid_path(Some(FsType::Ext4), "/data"));
        assert!(!is_valid_path(Some(FsType::Ext4), "data"));
        assert!(!is_valid_path(Some(FsType::Ext4), ""));
        assert!(is_valid_path(None, "/mnt/nfs"));
    }

    #[test]
    fn test_fstab_entry_differs() {
        let a = MountPoint::new("/data", MountByType::Uuid);

        let mut b = a.clone();
        b.active = false;
        assert!(!a.fstab_entry_differs(&b));

        b.mount_options = vec!["noatime".into()];
        assert!(a.fstab_entry_differs(&b));
        assert_eq!(b.options_string(), "noatime");
        assert_eq!(a.options_string(), "defaults");
    }

    #[test]
    fn test_deserialize_defaults() {
        let mp: MountPoint = serde_yaml::from_str("path: /data\nmount-by: uuid").unwrap();
        assert!(mp.active);
        assert!(mp.in_etc_fstab);
        assert_eq!(mp.passno, 0);
    }
}
