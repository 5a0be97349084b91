//! Groups the actions of an actiongraph by the device a user would think of
//! them as acting on, e.g. creating a partition, encrypting it, formatting it
//! and mounting it all target the partition.

use log::{debug, trace};
use petgraph::graph::NodeIndex;

use strata_api::{
    error::StorageError,
    text::{Tense, Text},
    DeviceKind, Devicegraph, Sid, View,
};

use super::actiongraph::{Action, Actiongraph};

mod formatter;

/// The actions of one target device, in commit order.
#[derive(Debug)]
pub struct CompoundAction<'a> {
    ag: &'a Actiongraph<'a>,
    target: Sid,
    vertices: Vec<NodeIndex>,
}

impl<'a> CompoundAction<'a> {
    pub fn target(&self) -> Sid {
        self.target
    }

    pub fn vertices(&self) -> &[NodeIndex] {
        &self.vertices
    }

    pub fn actions(&self) -> impl Iterator<Item = &'a Action> + '_ {
        self.vertices.iter().map(|v| self.ag.action(*v))
    }

    /// Texts of the single actions.
    pub fn texts(&self, tense: Tense) -> Result<Vec<Text>, StorageError> {
        self.actions()
            .map(|action| action.text(self.ag, tense))
            .collect()
    }

    /// One sentence for the whole group, e.g. "Create partition /dev/sda1
    /// (500 MiB) for /data with ext4".
    pub fn sentence(&self, tense: Tense) -> Result<Text, StorageError> {
        formatter::sentence(self, self.ag, tense)
    }

    /// Whether every action of the group only informs.
    pub fn is_nop(&self) -> bool {
        self.actions().all(|action| action.nop)
    }
}

/// Groups the actions of `ag` by target device. Groups are ordered by the
/// first of their actions in commit order.
#[tracing::instrument(skip_all)]
pub fn compound_actions<'a>(ag: &'a Actiongraph<'a>) -> Result<Vec<CompoundAction<'a>>, StorageError> {
    let mut groups: Vec<CompoundAction> = Vec::new();

    for vertex in ag.commit_order() {
        let action = ag.action(*vertex);
        let target = target_device(action.graph(ag), action.sid())?;
        trace!("Action '{action}' targets device {target}");

        match groups.iter_mut().find(|group| group.target == target) {
            Some(group) => group.vertices.push(*vertex),
            None => groups.push(CompoundAction {
                ag,
                target,
                vertices: vec![*vertex],
            }),
        }
    }

    debug!(
        "Grouped {} actions into {} compound actions",
        ag.num_actions(),
        groups.len()
    );
    Ok(groups)
}

/// Walks up from `sid` to the device its actions are reported under.
pub(crate) fn target_device(graph: &Devicegraph, sid: Sid) -> Result<Sid, StorageError> {
    let device = graph.find_device(sid)?;
    let up = match &device.kind {
        DeviceKind::PartitionTable(_) | DeviceKind::Encryption(_) | DeviceKind::LvmPv(_) => {
            graph.blk_device_of(sid).map(|(parent, _)| parent)
        }
        DeviceKind::BlkFilesystem(_) => {
            let blk_parents = graph
                .parents(sid, View::All)?
                .into_iter()
                .filter(|parent| {
                    graph
                        .find_device(*parent)
                        .is_ok_and(|d| d.kind.as_blk_device().is_some())
                })
                .collect::<Vec<_>>();
            // A filesystem spanning devices is a target of its own
            match blk_parents.as_slice() {
                [single] => Some(*single),
                _ => None,
            }
        }
        DeviceKind::MountPoint(_) => graph.mountable_of(sid),
        _ => None,
    };

    match up {
        Some(parent) => target_device(graph, parent),
        None => Ok(sid),
    }
}

#[cfg(test)]
mod tests {
    use crate::engine::test_utils::{self, Fixture};

    use super::*;

    #[test]
    fn test_target_device() {
        let fixture = Fixture::disk_with_gpt();
        let mut staging = fixture.probed.clone();
        let data = test_utils::add_partition_with_fs(&mut staging, fixture.table, "/data");

        assert_eq!(target_device(&staging, data.mount_point).unwrap(), data.partition);
        assert_eq!(target_device(&staging, data.filesystem).unwrap(), data.partition);
        assert_eq!(target_device(&staging, fixture.table).unwrap(), fixture.disk);
        assert_eq!(target_device(&staging, data.partition).unwrap(), data.partition);
    }

    #[test]
    fn test_group_new_partition() {
        let fixture = Fixture::disk_with_gpt();
        let mut staging = fixture.probed.clone();
        let data = test_utils::add_partition_with_fs(&mut staging, fixture.table, "/data");

        let ag = Actiongraph::new(&fixture.probed, &staging).unwrap();
        let groups = compound_actions(&ag).unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].target(), data.partition);
        assert_eq!(groups[0].vertices().len(), ag.num_actions());
        assert_eq!(
            groups[0].sentence(Tense::Simple).unwrap().render(),
            "Create partition /dev/sda1 (500 MiB) for /data with ext4"
        );
        assert_eq!(
            groups[0].sentence(Tense::Continuous).unwrap().render(),
            "Creating partition /dev/sda1 (500 MiB) for /data with ext4"
        );

        // Grouping again gives the same result
        let again = compound_actions(&ag).unwrap();
        assert_eq!(again.len(), groups.len());
        assert_eq!(again[0].vertices(), groups[0].vertices());
    }

    #[test]
    fn test_group_delete_partition() {
        let fixture = Fixture::disk_with_gpt();
        let mut probed = fixture.probed.clone();
        let data = test_utils::add_partition_with_fs(&mut probed, fixture.table, "/data");
        let mut staging = probed.clone();
        staging.remove_device(data.mount_point).unwrap();
        staging.remove_device(data.filesystem).unwrap();
        staging.remove_device(data.partition).unwrap();

        let ag = Actiongraph::new(&probed, &staging).unwrap();
        let groups = compound_actions(&ag).unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(
            groups[0].sentence(Tense::Simple).unwrap().render(),
            "Delete partition /dev/sda1 (500 MiB)"
        );
    }
}
