pub mod bcache;
pub mod btrfs;
pub mod e2fsck;
pub mod encryption;
pub mod exe;
pub mod files;
pub mod filesystems;
pub mod fstab;
pub mod lvm;
pub mod mdadm;
pub mod mkfs;
pub mod mkswap;
pub mod mount;
pub mod parted;
pub mod resize2fs;
pub mod runner;
pub mod udevadm;
pub mod wipefs;

#[cfg(any(test, feature = "test-utilities"))]
pub mod testutils;

pub(crate) mod crate_private {
    pub trait Sealed {}
}
