use std::{path::Path, process::Command};

use anyhow::{Context, Error};
use log::info;

use strata_api::{
    constants::LUKS_HEADER_SIZE_IN_MIB, devicegraph::kinds::encryption::EncryptionType,
    primitives::bytes::{ByteCount, MIB},
};

use crate::runner::CommandRunner;

/// Cipher specification string for the LUKS data segment.
pub const CIPHER: &str = "aes-xts-plain64";

/// Key size in bits, limited by the cipher specification.
pub const KEY_SIZE: &str = "512";

/// cryptsetup counts offsets and sizes in 512-byte sectors.
const SECTOR_SIZE: u64 = 512;

fn cryptsetup(key_file: Option<&Path>) -> Command {
    let mut cmd = Command::new("cryptsetup");
    cmd.arg("--batch-mode");
    if let Some(key_file) = key_file {
        cmd.arg("--key-file").arg(key_file);
    }
    cmd
}

/// Writes a LUKS header to `device_path`. Plain encryption has no header,
/// so nothing is run for it.
pub fn format(
    runner: &dyn CommandRunner,
    encryption_type: EncryptionType,
    device_path: &Path,
    key_file: Option<&Path>,
) -> Result<(), Error> {
    let luks_type = match encryption_type {
        EncryptionType::Luks1 => "luks1",
        EncryptionType::Luks2 => "luks2",
        EncryptionType::Plain => return Ok(()),
    };

    info!("Formatting '{}' as {luks_type}", device_path.display());
    runner
        .run(
            cryptsetup(key_file)
                .arg("luksFormat")
                .arg("--type")
                .arg(luks_type)
                .arg("--cipher")
                .arg(CIPHER)
                .arg("--key-size")
                .arg(KEY_SIZE)
                .arg("--offset")
                .arg((LUKS_HEADER_SIZE_IN_MIB * MIB / SECTOR_SIZE).to_string())
                .arg(device_path),
        )
        .map(|_| ())
        .with_context(|| format!("Failed to encrypt underlying device '{}'", device_path.display()))
}

/// Opens `device_path` as `/dev/mapper/<dm_table_name>`.
pub fn open(
    runner: &dyn CommandRunner,
    encryption_type: EncryptionType,
    device_path: &Path,
    dm_table_name: &str,
    key_file: Option<&Path>,
) -> Result<(), Error> {
    let open_type = match encryption_type {
        EncryptionType::Plain => "plain",
        EncryptionType::Luks1 | EncryptionType::Luks2 => "luks",
    };

    runner
        .run(
            cryptsetup(key_file)
                .arg("open")
                .arg("--type")
                .arg(open_type)
                .arg(device_path)
                .arg(dm_table_name),
        )
        .map(|_| ())
        .with_context(|| {
            format!(
                "Failed to open underlying encrypted device '{}' as '{dm_table_name}'",
                device_path.display()
            )
        })
}

pub fn close(runner: &dyn CommandRunner, dm_table_name: &str) -> Result<(), Error> {
    runner
        .run(Command::new("cryptsetup").arg("close").arg(dm_table_name))
        .map(|_| ())
        .with_context(|| format!("Failed to close encrypted volume '{dm_table_name}'"))
}

/// Resizes the open mapping to `size`, or to fill its underlying device
/// when `size` is `None`.
pub fn resize(
    runner: &dyn CommandRunner,
    dm_table_name: &str,
    key_file: Option<&Path>,
    size: Option<ByteCount>,
) -> Result<(), Error> {
    let mut cmd = cryptsetup(key_file);
    cmd.arg("resize");
    if let Some(size) = size {
        cmd.arg("--size").arg((size.bytes() / SECTOR_SIZE).to_string());
    }
    runner
        .run(cmd.arg(dm_table_name))
        .map(|_| ())
        .with_context(|| format!("Failed to resize encrypted volume '{dm_table_name}'"))
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::testutils::recording::RecordingRunner;

    #[test]
    fn test_luks_lifecycle() {
        let runner = RecordingRunner::new();
        let dev = Path::new("/dev/sda2");
        let key = Some(Path::new("/run/keys/cr_sda2"));

        format(&runner, EncryptionType::Luks2, dev, key).unwrap();
        open(&runner, EncryptionType::Luks2, dev, "cr_sda2", key).unwrap();
        resize(&runner, "cr_sda2", key, None).unwrap();
        resize(&runner, "cr_sda2", key, Some(ByteCount::from_mib(1))).unwrap();
        close(&runner, "cr_sda2").unwrap();

        assert_eq!(
            runner.commands(),
            vec![
                "cryptsetup --batch-mode --key-file /run/keys/cr_sda2 luksFormat --type luks2 \
                 --cipher aes-xts-plain64 --key-size 512 --offset 32768 /dev/sda2",
                "cryptsetup --batch-mode --key-file /run/keys/cr_sda2 open --type luks /dev/sda2 cr_sda2",
                "cryptsetup --batch-mode --key-file /run/keys/cr_sda2 resize cr_sda2",
                "cryptsetup --batch-mode --key-file /run/keys/cr_sda2 resize --size 2048 cr_sda2",
                "cryptsetup close cr_sda2",
            ]
        );
    }

    #[test]
    fn test_plain_has_no_header() {
        let runner = RecordingRunner::new();
        let dev = Path::new("/dev/sdb");
        format(&runner, EncryptionType::Plain, dev, None).unwrap();
        open(&runner, EncryptionType::Plain, dev, "swap", None).unwrap();
        assert_eq!(
            runner.commands(),
            vec!["cryptsetup --batch-mode open --type plain /dev/sdb swap"]
        );
    }
}
