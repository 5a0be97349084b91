use std::path::Path;

use osutils::mdadm;
use strata_api::{
    error::{ReportError, StorageError},
    text::{Tense, Text},
    Device, DeviceKind, Devicegraph, HolderKind, Sid, View,
};

use crate::engine::{
    actiongraph::{Action, ActionKind, Actiongraph, ResizeMode},
    commit::CommitData,
};

use super::{resize_text, size_of, unsupported};

/// Members of an MD RAID, active devices in sort-key order and spares.
/// Faulty members are left out.
pub(super) struct Members {
    pub devices: Vec<String>,
    pub spares: Vec<String>,
}

impl Members {
    pub fn of(graph: &Devicegraph, md: Sid) -> Result<Self, StorageError> {
        let mut devices = Vec::new();
        let mut spares = Vec::new();

        for parent in graph.parents(md, View::All)? {
            let Some(HolderKind::MdUser {
                sort_key,
                spare,
                faulty,
            }) = graph.find_holder(parent, md)
            else {
                continue;
            };
            if *faulty {
                continue;
            }
            let Some(blk) = graph.find_device(parent)?.kind.as_blk_device() else {
                continue;
            };

            let member = (*sort_key, blk.name().to_owned());
            if *spare {
                spares.push(member);
            } else {
                devices.push(member);
            }
        }

        devices.sort();
        spares.sort();
        Ok(Self {
            devices: devices.into_iter().map(|(_, name)| name).collect(),
            spares: spares.into_iter().map(|(_, name)| name).collect(),
        })
    }

    pub fn all(&self) -> Vec<&Path> {
        self.devices
            .iter()
            .chain(&self.spares)
            .map(Path::new)
            .collect()
    }
}

pub(super) fn text(
    action: &Action,
    device: &Device,
    ag: &Actiongraph,
    tense: Tense,
) -> Result<Text, StorageError> {
    let DeviceKind::Md(md) = &device.kind else {
        return Err(unsupported(action, device));
    };

    Ok(match action.kind {
        ActionKind::Create => {
            let members = Members::of(action.graph(ag), device.sid)?;
            Text::tensed(
                tense,
                "Create {} {} ({}) from {}",
                "Creating {} {} ({}) from {}",
                vec![
                    md.level.to_string().to_uppercase(),
                    md.name.clone(),
                    size_of(device),
                    members.devices.join(", "),
                ],
            )
        }
        ActionKind::Delete => Text::tensed(
            tense,
            "Delete {} {} ({})",
            "Deleting {} {} ({})",
            vec![
                md.level.to_string().to_uppercase(),
                md.name.clone(),
                size_of(device),
            ],
        ),
        ActionKind::Resize { mode } => resize_text(
            mode,
            device.sid,
            format!("{} {}", md.level.to_string().to_uppercase(), md.name),
            ag,
            tense,
        )?,
        _ => return Err(unsupported(action, device)),
    })
}

pub(super) fn commit(action: &Action, device: &Device, data: &mut CommitData) -> Result<(), StorageError> {
    let DeviceKind::Md(md) = &device.kind else {
        return Err(unsupported(action, device));
    };
    let graph = action.graph(data.ag);
    let runner = data.runner();
    let raid_path = Path::new(&md.name);

    match action.kind {
        ActionKind::Create => {
            let members = Members::of(graph, device.sid)?;
            let devices = members.devices.iter().map(Path::new).collect::<Vec<_>>();
            let spares = members.spares.iter().map(Path::new).collect::<Vec<_>>();
            mdadm::create(
                runner,
                raid_path,
                md.level,
                &devices,
                &spares,
                &md.metadata,
                md.chunk_size,
            )
            .structured(data.failed())?;
            data.wait_for_device(raid_path)
        }
        ActionKind::Delete => {
            let members = Members::of(graph, device.sid)?;
            mdadm::stop(runner, raid_path, &members.all()).structured(data.failed())
        }
        ActionKind::Resize {
            mode: ResizeMode::Grow,
        } => mdadm::grow_to_max(runner, raid_path).structured(data.failed()),
        _ => Err(unsupported(action, device)),
    }
}
