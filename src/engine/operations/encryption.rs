use std::path::Path;

use osutils::{encryption, wipefs};
use strata_api::{
    error::{ReportError, StorageError},
    text::{Tense, Text},
    Device, DeviceKind,
};

use crate::engine::{
    actiongraph::{Action, ActionKind, Actiongraph, ResizeMode},
    commit::CommitData,
};

use super::{blk_name_of, occupied_size, resize_text, unsupported};

pub(super) fn text(
    action: &Action,
    device: &Device,
    ag: &Actiongraph,
    tense: Tense,
) -> Result<Text, StorageError> {
    let DeviceKind::Encryption(encryption) = &device.kind else {
        return Err(unsupported(action, device));
    };
    let graph = action.graph(ag);

    Ok(match action.kind {
        ActionKind::Create => Text::tensed(
            tense,
            "Create encryption layer device on {}",
            "Creating encryption layer device on {}",
            vec![blk_name_of(graph, device.sid)?],
        ),
        ActionKind::Delete => Text::tensed(
            tense,
            "Delete encryption layer device on {}",
            "Deleting encryption layer device on {}",
            vec![blk_name_of(graph, device.sid)?],
        ),
        ActionKind::Resize { mode } => resize_text(
            mode,
            device.sid,
            format!("encryption layer device {}", encryption.name),
            ag,
            tense,
        )?,
        _ => return Err(unsupported(action, device)),
    })
}

pub(super) fn commit(action: &Action, device: &Device, data: &mut CommitData) -> Result<(), StorageError> {
    let DeviceKind::Encryption(encryption) = &device.kind else {
        return Err(unsupported(action, device));
    };
    let graph = action.graph(data.ag);
    let runner = data.runner();
    let key_file = encryption.key_file.as_deref().map(Path::new);

    match action.kind {
        ActionKind::Create => {
            let blk = blk_name_of(graph, device.sid)?;
            encryption::format(runner, encryption.encryption_type, Path::new(&blk), key_file)
                .structured(data.failed())?;
            encryption::open(
                runner,
                encryption.encryption_type,
                Path::new(&blk),
                &encryption.dm_table_name,
                key_file,
            )
            .structured(data.failed())?;
            data.wait_for_device(Path::new(&encryption.name))
        }
        ActionKind::Delete => {
            let blk = blk_name_of(graph, device.sid)?;
            encryption::close(runner, &encryption.dm_table_name).structured(data.failed())?;
            // The LUKS header would make the device look encrypted on the next probe
            wipefs::all(runner, Path::new(&blk)).structured(data.failed())
        }
        ActionKind::Resize { mode } => {
            let size = match mode {
                ResizeMode::Grow => None,
                ResizeMode::Shrink => Some(occupied_size(data.ag.rhs(), device.sid)?),
            };
            encryption::resize(runner, &encryption.dm_table_name, key_file, size)
                .structured(data.failed())
        }
        _ => Err(unsupported(action, device)),
    }
}
