use std::{path::Path, process::Command};

use anyhow::{Context, Error};

use strata_api::primitives::bytes::{ByteCount, KIB};

use crate::{e2fsck, runner::CommandRunner};

/// Resizes the ext* filesystem on the block device to `size`, or to fill the
/// device when `size` is `None`. Unmounted filesystems are checked first,
/// since resize2fs refuses to work on them otherwise.
pub fn run(
    runner: &dyn CommandRunner,
    block_device_path: &Path,
    size: Option<ByteCount>,
    mounted: bool,
) -> Result<(), Error> {
    if !mounted {
        e2fsck::run(runner, block_device_path)?;
    }

    let mut cmd = Command::new("resize2fs");
    cmd.arg(block_device_path);
    if let Some(size) = size {
        cmd.arg(format!("{}K", size.bytes() / KIB));
    }
    runner
        .run(&mut cmd)
        .map(|_| ())
        .context("Failed to execute resize2fs")
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::testutils::recording::RecordingRunner;

    #[test]
    fn test_resize2fs() {
        let runner = RecordingRunner::new();
        let dev = Path::new("/dev/sda1");
        run(&runner, dev, Some(ByteCount::from_mib(300)), false).unwrap();
        run(&runner, dev, None, true).unwrap();
        assert_eq!(
            runner.commands(),
            vec![
                "e2fsck -f -y /dev/sda1",
                "resize2fs /dev/sda1 307200K",
                "resize2fs /dev/sda1"
            ]
        );
    }
}
