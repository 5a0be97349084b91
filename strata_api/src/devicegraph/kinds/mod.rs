//! Attributes of each device kind.

pub mod bcache;
pub mod disk;
pub mod encryption;
pub mod filesystem;
pub mod lvm;
pub mod md;
pub mod mount_point;
pub mod partition;
