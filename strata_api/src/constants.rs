use const_format::formatcp;

/// Root mount point path.
pub const ROOT_MOUNT_POINT_PATH: &str = "/";

/// None/null mount point.
pub const NONE_MOUNT_POINT: &str = "none";

/// Swap mount point, as written by older tools.
pub const SWAP_MOUNT_POINT: &str = "swap";

/// Directory holding the system configuration files.
pub const ETC_DIRECTORY: &str = "etc";

/// Path of the fstab file relative to the root prefix.
pub const ETC_FSTAB_RELATIVE_PATH: &str = formatcp!("{ETC_DIRECTORY}/fstab");

/// Directory where device mapper nodes appear.
pub const DEV_MAPPER_DIRECTORY: &str = "/dev/mapper";

/// Estimated size of a LUKS2 header, in MiB.
pub const LUKS_HEADER_SIZE_IN_MIB: u64 = 16;

/// Size of the metadata area reserved at the start of an LVM physical volume, in MiB.
pub const LVM_PV_METADATA_SIZE_IN_MIB: u64 = 1;

/// Default extent size of new LVM volume groups.
pub const LVM_DEFAULT_EXTENT_SIZE: u64 = 4 * 1024 * 1024;

/// Default block size of disks and partitions.
pub const DEFAULT_BLOCK_SIZE: u32 = 512;

/// Default location of the agent configuration file.
pub const ENGINE_CONFIG_PATH: &str = "/etc/strata/strata.yaml";

/// Default location of the commit lock file.
pub const COMMIT_LOCK_PATH_DEFAULT: &str = "/run/strata/commit.lock";

/// Default location of the background log.
pub const BACKGROUND_LOG_PATH_DEFAULT: &str = "/var/log/strata-commit.log";

/// Seconds to wait for a device node to appear after its creation.
pub const UDEV_TIMEOUT_SECS_DEFAULT: u64 = 120;
