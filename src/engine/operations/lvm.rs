use std::path::Path;

use osutils::lvm;
use strata_api::{
    devicegraph::kinds::lvm::LvmVg,
    error::{InternalError, ReportError, StorageError},
    text::{Tense, Text},
    Device, DeviceKind, Devicegraph, Sid, View,
};

use crate::engine::{
    actiongraph::{Action, ActionKind, Actiongraph, ResizeMode},
    commit::CommitData,
};

use super::{blk_name_of, occupied_size, resize_text, size_of, unsupported};

/// The volume group a logical volume belongs to.
pub(super) fn vg_of(graph: &Devicegraph, lv: Sid) -> Result<&LvmVg, StorageError> {
    graph
        .parents(lv, View::All)?
        .into_iter()
        .find_map(|sid| graph.find_device(sid).ok()?.kind.as_lvm_vg())
        .structured(InternalError::UnexpectedDeviceKind {
            sid: lv,
            expected: "LvmLv in a volume group",
            found: "LvmLv",
        })
}

/// Nodes of the block devices below the PVs of `vg`.
fn pv_devices(graph: &Devicegraph, vg: Sid) -> Result<Vec<String>, StorageError> {
    graph
        .parents(vg, View::All)?
        .into_iter()
        .map(|pv| blk_name_of(graph, pv))
        .collect()
}

pub(super) fn text(
    action: &Action,
    device: &Device,
    ag: &Actiongraph,
    tense: Tense,
) -> Result<Text, StorageError> {
    let graph = action.graph(ag);

    Ok(match (&device.kind, action.kind) {
        (DeviceKind::LvmPv(_), ActionKind::Create) => Text::tensed(
            tense,
            "Create LVM physical volume on {}",
            "Creating LVM physical volume on {}",
            vec![blk_name_of(graph, device.sid)?],
        ),
        (DeviceKind::LvmPv(_), ActionKind::Delete) => Text::tensed(
            tense,
            "Delete LVM physical volume on {}",
            "Deleting LVM physical volume on {}",
            vec![blk_name_of(graph, device.sid)?],
        ),
        (DeviceKind::LvmPv(_), ActionKind::Resize { mode }) => resize_text(
            mode,
            device.sid,
            format!("physical volume on {}", blk_name_of(graph, device.sid)?),
            ag,
            tense,
        )?,
        (DeviceKind::LvmVg(vg), ActionKind::Create) => Text::tensed(
            tense,
            "Create volume group {} from {}",
            "Creating volume group {} from {}",
            vec![
                vg.vg_name.clone(),
                pv_devices(graph, device.sid)?.join(", "),
            ],
        ),
        (DeviceKind::LvmVg(vg), ActionKind::Delete) => Text::tensed(
            tense,
            "Delete volume group {}",
            "Deleting volume group {}",
            vec![vg.vg_name.clone()],
        ),
        (DeviceKind::LvmLv(lv), ActionKind::Create) => Text::tensed(
            tense,
            "Create logical volume {} ({})",
            "Creating logical volume {} ({})",
            vec![lv.name.clone(), size_of(device)],
        ),
        (DeviceKind::LvmLv(lv), ActionKind::Delete) => Text::tensed(
            tense,
            "Delete logical volume {} ({})",
            "Deleting logical volume {} ({})",
            vec![lv.name.clone(), size_of(device)],
        ),
        (DeviceKind::LvmLv(lv), ActionKind::Resize { mode }) => resize_text(
            mode,
            device.sid,
            format!("logical volume {}", lv.name),
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
        (DeviceKind::LvmPv(_), ActionKind::Create) => {
            let blk = blk_name_of(graph, device.sid)?;
            lvm::pvcreate(runner, Path::new(&blk)).structured(data.failed())
        }
        (DeviceKind::LvmPv(_), ActionKind::Delete) => {
            let blk = blk_name_of(graph, device.sid)?;
            lvm::pvremove(runner, Path::new(&blk)).structured(data.failed())
        }
        (DeviceKind::LvmPv(_), ActionKind::Resize { mode }) => {
            let blk = blk_name_of(graph, device.sid)?;
            // Growing takes all the space, shrinking needs the target size
            let size = match mode {
                ResizeMode::Grow => None,
                ResizeMode::Shrink => Some(occupied_size(data.ag.rhs(), device.sid)?),
            };
            lvm::pvresize(runner, Path::new(&blk), size).structured(data.failed())
        }
        (DeviceKind::LvmVg(vg), ActionKind::Create) => {
            let pvs = pv_devices(graph, device.sid)?;
            let pvs = pvs.iter().map(Path::new).collect::<Vec<_>>();
            lvm::vgcreate(runner, &vg.vg_name, vg.extent_size, &pvs).structured(data.failed())
        }
        (DeviceKind::LvmVg(vg), ActionKind::Delete) => {
            lvm::vgremove(runner, &vg.vg_name).structured(data.failed())
        }
        (DeviceKind::LvmLv(lv), ActionKind::Create) => {
            let vg = vg_of(graph, device.sid)?;
            lvm::lvcreate(
                runner,
                &vg.vg_name,
                &lv.lv_name,
                lv.region.size(),
                lv.stripes,
            )
            .structured(data.failed())?;
            data.wait_for_device(Path::new(&lv.name))
        }
        (DeviceKind::LvmLv(lv), ActionKind::Delete) => {
            let vg = vg_of(graph, device.sid)?;
            lvm::lvremove(runner, &vg.vg_name, &lv.lv_name).structured(data.failed())
        }
        (DeviceKind::LvmLv(lv), ActionKind::Resize { .. }) => {
            let rhs = data.ag.rhs();
            let vg = vg_of(rhs, device.sid)?;
            lvm::lvresize(
                runner,
                &vg.vg_name,
                &lv.lv_name,
                occupied_size(rhs, device.sid)?,
            )
            .structured(data.failed())
        }
        _ => Err(unsupported(action, device)),
    }
}
