use std::{path::Path, process::Command};

use anyhow::{Context, Error};

use crate::runner::CommandRunner;

/// Forces a check of the ext* filesystem on the block device, answering
/// yes to every repair.
pub fn run(runner: &dyn CommandRunner, block_device_path: &Path) -> Result<(), Error> {
    runner
        .run(
            Command::new("e2fsck")
                .arg("-f")
                .arg("-y")
                .arg(block_device_path),
        )
        .map(|_| ())
        .context("Failed to execute e2fsck")
}
