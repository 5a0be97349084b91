//! Devicegraphs shared by the engine tests.

use strata_api::{
    constants::DEFAULT_BLOCK_SIZE,
    devicegraph::kinds::{
        disk::Disk,
        filesystem::FsType,
        partition::{Partition, PartitionId, PartitionType, PtType},
    },
    primitives::{bytes::ByteCount, region::Region},
    DeviceKind, Devicegraph, HolderKind, Sid,
};

pub(crate) const DISK_NAME: &str = "/dev/sda";

/// A probed graph with an empty 2 TiB disk carrying a GPT.
pub(crate) struct Fixture {
    pub probed: Devicegraph,
    pub disk: Sid,
    pub table: Sid,
}

impl Fixture {
    pub fn disk_with_gpt() -> Self {
        let mut probed = Devicegraph::new();
        let disk = probed
            .create_device(DeviceKind::Disk(Disk {
                name: DISK_NAME.into(),
                region: Region::from_bytes(ByteCount(0), ByteCount::from_tib(2), DEFAULT_BLOCK_SIZE),
                rotational: false,
            }))
            .unwrap();
        let table = probed.create_partition_table(disk, PtType::Gpt).unwrap();
        Self {
            probed,
            disk,
            table,
        }
    }
}

pub(crate) fn region_mib(start_mib: u64, size_mib: u64) -> Region {
    Region::from_bytes(
        ByteCount::from_mib(start_mib),
        ByteCount::from_mib(size_mib),
        DEFAULT_BLOCK_SIZE,
    )
}

/// Adds partition `number` of `size_mib` to `table`. Partition n starts at
/// n GiB so partitions never overlap.
pub(crate) fn add_partition(graph: &mut Devicegraph, table: Sid, number: u32, size_mib: u64) -> Sid {
    let partition = graph
        .create_device(DeviceKind::Partition(Partition {
            name: Partition::partition_name(DISK_NAME, number),
            number,
            region: region_mib(u64::from(number) * 1024, size_mib),
            partition_type: PartitionType::Primary,
            id: PartitionId::Linux,
        }))
        .unwrap();
    graph
        .add_holder(table, partition, HolderKind::Subdevice)
        .unwrap();
    partition
}

pub(crate) fn add_filesystem(graph: &mut Devicegraph, blk: Sid, fs_type: FsType) -> Sid {
    graph.create_blk_filesystem(blk, fs_type).unwrap()
}

pub(crate) fn add_mount_point(graph: &mut Devicegraph, mountable: Sid, path: &str) -> Sid {
    graph.create_mount_point(mountable, path).unwrap()
}

pub(crate) struct PartitionWithFs {
    pub partition: Sid,
    pub filesystem: Sid,
    pub mount_point: Sid,
}

/// Partition 1 of 500 MiB with ext4 mounted at `path`.
pub(crate) fn add_partition_with_fs(graph: &mut Devicegraph, table: Sid, path: &str) -> PartitionWithFs {
    let partition = add_partition(graph, table, 1, 500);
    let filesystem = add_filesystem(graph, partition, FsType::Ext4);
    let mount_point = add_mount_point(graph, filesystem, path);
    PartitionWithFs {
        partition,
        filesystem,
        mount_point,
    }
}
