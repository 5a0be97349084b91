use std::path::Path;

use osutils::{parted, wipefs};
use strata_api::{
    devicegraph::kinds::partition::PtType,
    error::{InternalError, ReportError, StorageError},
    text::{Tense, Text},
    Device, DeviceKind, Devicegraph, Sid, View,
};

use crate::engine::{
    actiongraph::{Action, ActionKind, Actiongraph},
    commit::CommitData,
};

use super::{blk_name_of, resize_text, size_of, unsupported};

/// Type and disk of the partition table holding `partition`.
fn table_of(graph: &Devicegraph, partition: Sid) -> Result<(PtType, String), StorageError> {
    let table = graph
        .parents(partition, View::All)?
        .into_iter()
        .find_map(|sid| {
            let device = graph.find_device(sid).ok()?;
            device.kind.as_partition_table().map(|pt| (sid, pt.pt_type))
        });

    let (table, pt_type) = table.structured(InternalError::UnexpectedDeviceKind {
        sid: partition,
        expected: "Partition on a partition table",
        found: "Partition",
    })?;
    Ok((pt_type, blk_name_of(graph, table)?))
}

pub(super) fn text(
    action: &Action,
    device: &Device,
    ag: &Actiongraph,
    tense: Tense,
) -> Result<Text, StorageError> {
    let graph = action.graph(ag);

    Ok(match (&device.kind, action.kind) {
        (DeviceKind::PartitionTable(pt), ActionKind::Create) => Text::tensed(
            tense,
            "Create {} partition table on {}",
            "Creating {} partition table on {}",
            vec![
                pt.pt_type.to_string().to_uppercase(),
                blk_name_of(graph, device.sid)?,
            ],
        ),
        (DeviceKind::PartitionTable(pt), ActionKind::Delete) => Text::tensed(
            tense,
            "Delete {} partition table on {}",
            "Deleting {} partition table on {}",
            vec![
                pt.pt_type.to_string().to_uppercase(),
                blk_name_of(graph, device.sid)?,
            ],
        ),
        (DeviceKind::Partition(partition), ActionKind::Create) => Text::tensed(
            tense,
            "Create partition {} ({})",
            "Creating partition {} ({})",
            vec![partition.name.clone(), size_of(device)],
        ),
        (DeviceKind::Partition(partition), ActionKind::Delete) => Text::tensed(
            tense,
            "Delete partition {} ({})",
            "Deleting partition {} ({})",
            vec![partition.name.clone(), size_of(device)],
        ),
        (DeviceKind::Partition(partition), ActionKind::Resize { mode }) => resize_text(
            mode,
            device.sid,
            format!("partition {}", partition.name),
            ag,
            tense,
        )?,
        _ => return Err(unsupported(action, device)),
    })
}

pub(super) fn commit(action: &Action, device: &Device, data: &mut CommitData) -> Result<(), StorageError> {
    let graph = action.graph(data.ag);
    let runner = data.runner();

    match (&device.kind, action.kind) {
        (DeviceKind::PartitionTable(pt), ActionKind::Create) => {
            let disk = blk_name_of(graph, device.sid)?;
            parted::create_table(runner, Path::new(&disk), pt.pt_type).structured(data.failed())
        }
        (DeviceKind::PartitionTable(_), ActionKind::Delete) => {
            let disk = blk_name_of(graph, device.sid)?;
            wipefs::all(runner, Path::new(&disk)).structured(data.failed())
        }
        (DeviceKind::Partition(partition), ActionKind::Create) => {
            let (pt_type, disk) = table_of(graph, device.sid)?;
            parted::create_partition(
                runner,
                Path::new(&disk),
                pt_type,
                partition.number,
                partition.partition_type,
                &partition.region,
                partition.id,
            )
            .structured(data.failed())?;

            let node = Path::new(&partition.name);
            data.wait_for_device(node)?;
            // Old signatures at the same offset would show up again
            wipefs::all(runner, node).structured(data.failed())
        }
        (DeviceKind::Partition(partition), ActionKind::Delete) => {
            let (_, disk) = table_of(graph, device.sid)?;
            wipefs::all(runner, Path::new(&partition.name)).structured(data.failed())?;
            parted::delete_partition(runner, Path::new(&disk), partition.number)
                .structured(data.failed())
        }
        (DeviceKind::Partition(partition), ActionKind::Resize { .. }) => {
            let rhs = data.ag.rhs();
            let (_, disk) = table_of(rhs, device.sid)?;
            let region = rhs
                .find_device(device.sid)?
                .kind
                .as_partition()
                .map(|p| p.region)
                .structured(InternalError::UnexpectedDeviceKind {
                    sid: device.sid,
                    expected: "Partition",
                    found: device.classname(),
                })?;
            parted::resize_partition(runner, Path::new(&disk), partition.number, &region)
                .structured(data.failed())
        }
        _ => Err(unsupported(action, device)),
    }
}
