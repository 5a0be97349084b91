use strata_api::{
    error::StorageError,
    text::{Tense, Text},
    Device, DeviceKind,
};

use crate::engine::actiongraph::{ActionKind, Actiongraph};

use super::CompoundAction;

/// What the actions of a group do, as far as the sentence cares.
#[derive(Debug, Default)]
struct Flags {
    delete: bool,
    create: bool,
    encrypt: bool,
    pv: bool,

    /// Displayname of the created filesystem.
    format: Option<String>,

    /// Path of the created mount point.
    mount: Option<String>,
}

impl Flags {
    fn of(group: &CompoundAction, ag: &Actiongraph) -> Result<Self, StorageError> {
        let mut flags = Self::default();

        for action in group.actions() {
            if action.affect.is_holder() {
                continue;
            }
            let target = action.sid() == group.target();
            let device = action.device(ag)?;

            match (action.kind, &device.kind) {
                (ActionKind::Delete, _) if target => flags.delete = true,
                (ActionKind::Create, _) if target => flags.create = true,
                (ActionKind::Create, DeviceKind::Encryption(_)) => flags.encrypt = true,
                (ActionKind::Create, DeviceKind::LvmPv(_)) => flags.pv = true,
                (ActionKind::Create, DeviceKind::BlkFilesystem(fs)) => {
                    flags.format = Some(fs.fs_type.to_string());
                }
                (ActionKind::Create, DeviceKind::MountPoint(mp)) => {
                    flags.mount = Some(mp.path.clone());
                }
                _ => {}
            }
        }
        Ok(flags)
    }
}

/// How sentences name the target, e.g. "partition".
fn noun(device: &Device) -> Option<&'static str> {
    match device.kind {
        DeviceKind::Partition(_) => Some("partition"),
        DeviceKind::LvmLv(_) => Some("logical volume"),
        DeviceKind::Md(_) => Some("RAID"),
        DeviceKind::Disk(_) => Some("disk"),
        _ => None,
    }
}

pub(super) fn sentence(
    group: &CompoundAction,
    ag: &Actiongraph,
    tense: Tense,
) -> Result<Text, StorageError> {
    // The target lives on the side of its first action; a deleted target
    // only exists in the probed graph
    let target = match ag.rhs().find_device(group.target()) {
        Ok(device) => device,
        Err(_) => ag.lhs().find_device(group.target())?,
    };

    let Some((noun, blk)) = noun(target).zip(target.kind.as_blk_device()) else {
        return joined(group, tense);
    };
    let flags = Flags::of(group, ag)?;
    let base = vec![
        noun.to_owned(),
        blk.name().to_owned(),
        blk.size().to_human_string(),
    ];
    let with = |extra: &[&Option<String>]| {
        let mut args = base.clone();
        args.extend(extra.iter().filter_map(|arg| (*arg).clone()));
        args
    };
    let tensed = |simple, continuous, args| Text::tensed(tense, simple, continuous, args);

    Ok(match &flags {
        Flags { delete: true, .. } => {
            tensed("Delete {} {} ({})", "Deleting {} {} ({})", with(&[]))
        }
        Flags {
            pv: true,
            create,
            encrypt,
            ..
        } => match (create, encrypt) {
            (true, true) => tensed(
                "Create encrypted {} {} ({}) as LVM physical volume",
                "Creating encrypted {} {} ({}) as LVM physical volume",
                with(&[])
            ),
            (true, false) => tensed(
                "Create {} {} ({}) as LVM physical volume",
                "Creating {} {} ({}) as LVM physical volume",
                with(&[])
            ),
            (false, true) => tensed(
                "Create encrypted LVM physical volume over {} {} ({})",
                "Creating encrypted LVM physical volume over {} {} ({})",
                with(&[])
            ),
            (false, false) => tensed(
                "Create LVM physical volume over {} {} ({})",
                "Creating LVM physical volume over {} {} ({})",
                with(&[])
            ),
        },
        Flags {
            create,
            encrypt,
            format,
            mount,
            ..
        } => match (create, encrypt, format.is_some(), mount.is_some()) {
            (true, true, true, true) => tensed(
                "Create encrypted {} {} ({}) for {} with {}",
                "Creating encrypted {} {} ({}) for {} with {}",
                with(&[mount, format])
            ),
            (true, true, true, false) => tensed(
                "Create encrypted {} {} ({}) with {}",
                "Creating encrypted {} {} ({}) with {}",
                with(&[format])
            ),
            (true, true, false, _) => tensed(
                "Create encrypted {} {} ({})",
                "Creating encrypted {} {} ({})",
                with(&[])
            ),
            (true, false, true, true) => tensed(
                "Create {} {} ({}) for {} with {}",
                "Creating {} {} ({}) for {} with {}",
                with(&[mount, format])
            ),
            (true, false, true, false) => tensed(
                "Create {} {} ({}) with {}",
                "Creating {} {} ({}) with {}",
                with(&[format])
            ),
            (true, false, false, _) => tensed(
                "Create {} {} ({})",
                "Creating {} {} ({})",
                with(&[])
            ),
            (false, true, true, true) => tensed(
                "Encrypt {} {} ({}) for {} with {}",
                "Encrypting {} {} ({}) for {} with {}",
                with(&[mount, format])
            ),
            (false, true, true, false) => tensed(
                "Encrypt {} {} ({}) with {}",
                "Encrypting {} {} ({}) with {}",
                with(&[format])
            ),
            (false, true, false, _) => tensed(
                "Encrypt {} {} ({})",
                "Encrypting {} {} ({})",
                with(&[])
            ),
            (false, false, true, true) => tensed(
                "Format {} {} ({}) for {} with {}",
                "Formatting {} {} ({}) for {} with {}",
                with(&[mount, format])
            ),
            (false, false, true, false) => tensed(
                "Format {} {} ({}) with {}",
                "Formatting {} {} ({}) with {}",
                with(&[format])
            ),
            (false, false, false, true) => tensed(
                "Mount {} {} ({}) at {}",
                "Mounting {} {} ({}) at {}",
                with(&[mount])
            ),
            (false, false, false, false) => return joined(group, tense),
        },
    })
}

/// The texts of all actions joined with "and".
fn joined(group: &CompoundAction, tense: Tense) -> Result<Text, StorageError> {
    let texts = group
        .texts(tense)?
        .iter()
        .map(Text::render)
        .collect::<Vec<_>>();
    Ok(Text::new(tense, vec!["{}"; texts.len()].join(" and "), texts))
}

#[cfg(test)]
mod tests {
    use strata_api::{
        devicegraph::kinds::{
            encryption::{Encryption, EncryptionType},
            lvm::LvmPv,
        },
        HolderKind,
    };

    use crate::engine::{
        compound::compound_actions,
        test_utils::{self, Fixture},
    };

    use super::*;

    #[test]
    fn test_encrypted_pv_sentence() {
        let fixture = Fixture::disk_with_gpt();
        let mut staging = fixture.probed.clone();
        let partition = test_utils::add_partition(&mut staging, fixture.table, 1, 500);

        let encryption = staging
            .create_device(DeviceKind::Encryption(Encryption {
                name: "/dev/mapper/cr_sda1".into(),
                dm_table_name: "cr_sda1".into(),
                encryption_type: EncryptionType::Luks2,
                region: test_utils::region_mib(0, 484),
                key_file: None,
            }))
            .unwrap();
        staging
            .add_holder(partition, encryption, HolderKind::User)
            .unwrap();
        let pv = staging
            .create_device(DeviceKind::LvmPv(LvmPv::default()))
            .unwrap();
        staging.add_holder(encryption, pv, HolderKind::User).unwrap();

        let ag = Actiongraph::new(&fixture.probed, &staging).unwrap();
        let groups = compound_actions(&ag).unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(
            groups[0].sentence(Tense::Simple).unwrap().render(),
            "Create encrypted partition /dev/sda1 (500 MiB) as LVM physical volume"
        );
    }

    #[test]
    fn test_joined_fallback() {
        let fixture = Fixture::disk_with_gpt();
        let mut probed = fixture.probed.clone();
        let data = test_utils::add_partition_with_fs(&mut probed, fixture.table, "/data");
        let mut staging = probed.clone();
        match &mut staging.find_device_mut(data.filesystem).unwrap().kind {
            DeviceKind::BlkFilesystem(fs) => fs.label = "DATA".into(),
            _ => unreachable!(),
        }
        match &mut staging.find_device_mut(data.mount_point).unwrap().kind {
            DeviceKind::MountPoint(mp) => mp.mount_options = vec!["noatime".into()],
            _ => unreachable!(),
        }

        let ag = Actiongraph::new(&probed, &staging).unwrap();
        let groups = compound_actions(&ag).unwrap();
        assert_eq!(groups.len(), 1);

        let sentence = groups[0].sentence(Tense::Simple).unwrap().render();
        let texts = groups[0]
            .texts(Tense::Simple)
            .unwrap()
            .iter()
            .map(Text::render)
            .collect::<Vec<_>>();
        assert_eq!(sentence, texts.join(" and "));
        assert!(sentence.contains("Set label of ext4 on /dev/sda1 to DATA"));
    }
}
