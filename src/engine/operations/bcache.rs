use std::path::Path;

use osutils::{bcache, wipefs};
use strata_api::{
    devicegraph::kinds::bcache::BcacheCset,
    error::{ReportError, StorageError},
    text::{Tense, Text},
    Device, DeviceKind, Devicegraph, Sid, View,
};

use crate::engine::{
    actiongraph::{Action, ActionKind, Actiongraph},
    commit::CommitData,
};

use super::{blk_name_of, size_of, unsupported};

/// The cache set attached to a bcache, if any.
pub(super) fn cset_of(graph: &Devicegraph, bcache: Sid) -> Result<Option<(Sid, &BcacheCset)>, StorageError> {
    Ok(graph
        .parents(bcache, View::All)?
        .into_iter()
        .find_map(|sid| match &graph.find_device(sid).ok()?.kind {
            DeviceKind::BcacheCset(cset) => Some((sid, cset)),
            _ => None,
        }))
}

pub(super) fn text(
    action: &Action,
    device: &Device,
    ag: &Actiongraph,
    tense: Tense,
) -> Result<Text, StorageError> {
    let graph = action.graph(ag);

    Ok(match (&device.kind, action.kind) {
        (DeviceKind::Bcache(bcache), ActionKind::Create) => Text::tensed(
            tense,
            "Create bcache {} ({}) on {}",
            "Creating bcache {} ({}) on {}",
            vec![
                bcache.name.clone(),
                size_of(device),
                blk_name_of(graph, device.sid)?,
            ],
        ),
        (DeviceKind::Bcache(bcache), ActionKind::Delete) => Text::tensed(
            tense,
            "Delete bcache {} ({})",
            "Deleting bcache {} ({})",
            vec![bcache.name.clone(), size_of(device)],
        ),
        (DeviceKind::BcacheCset(_), ActionKind::Create) => Text::tensed(
            tense,
            "Create bcache cache set on {}",
            "Creating bcache cache set on {}",
            vec![blk_name_of(graph, device.sid)?],
        ),
        (DeviceKind::BcacheCset(_), ActionKind::Delete) => Text::tensed(
            tense,
            "Delete bcache cache set on {}",
            "Deleting bcache cache set on {}",
            vec![blk_name_of(graph, device.sid)?],
        ),
        _ => return Err(unsupported(action, device)),
    })
}

pub(super) fn commit(action: &Action, device: &Device, data: &mut CommitData) -> Result<(), StorageError> {
    let graph = action.graph(data.ag);
    let runner = data.runner();

    match (&device.kind, action.kind) {
        (DeviceKind::Bcache(bcache), ActionKind::Create) => {
            let backing = blk_name_of(graph, device.sid)?;
            bcache::make_backing(runner, Path::new(&backing), bcache.cache_mode)
                .structured(data.failed())?;
            data.wait_for_device(Path::new(&bcache.name))?;

            if let Some((cset_sid, cset)) = cset_of(graph, device.sid)? {
                let uuid = data.uuid_for(cset_sid, &cset.uuid);
                bcache::attach(runner, Path::new(&bcache.name), &uuid).structured(data.failed())?;
            }
            Ok(())
        }
        (DeviceKind::Bcache(bcache), ActionKind::Delete) => {
            let backing = blk_name_of(graph, device.sid)?;
            bcache::unregister(runner, Path::new(&bcache.name)).structured(data.failed())?;
            wipefs::all(runner, Path::new(&backing)).structured(data.failed())
        }
        (DeviceKind::BcacheCset(cset), ActionKind::Create) => {
            let caching = blk_name_of(graph, device.sid)?;
            let uuid = data.uuid_for(device.sid, &cset.uuid);
            bcache::make_cache(runner, Path::new(&caching), &uuid).structured(data.failed())
        }
        (DeviceKind::BcacheCset(_), ActionKind::Delete) => {
            let caching = blk_name_of(graph, device.sid)?;
            bcache::unregister(runner, Path::new(&caching)).structured(data.failed())?;
            wipefs::all(runner, Path::new(&caching)).structured(data.failed())
        }
        _ => Err(unsupported(action, device)),
    }
}
