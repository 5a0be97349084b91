//! Mutations of a staging devicegraph.
//!
//! Every mutation checks what the affected devices can do before touching the
//! graph and fails with a `CapabilityError` otherwise, so an invalid target
//! state never reaches planning.

use log::debug;

use crate::{
    constants::{DEFAULT_BLOCK_SIZE, LVM_PV_METADATA_SIZE_IN_MIB, ROOT_MOUNT_POINT_PATH},
    error::{CapabilityError, InternalError, ReportError, StorageError, StorageResultExt},
    primitives::{bytes::ByteCount, region::Region},
};

use super::{
    capabilities::{BlkDevice, ResizeInfo},
    device::{DeviceKind, Sid},
    graph::Devicegraph,
    holder::HolderKind,
    kinds::{
        bcache::{Bcache, BcacheCset, CacheMode},
        encryption::{Encryption, EncryptionType},
        filesystem::{BlkFilesystem, BtrfsSubvolume, FsType, Nfs},
        lvm::{LvmLv, LvmPv, LvmVg},
        md::{Md, MdLevel},
        mount_point::{is_valid_path, MountByType, MountPoint},
        partition::{Partition, PartitionId, PartitionTable, PartitionType, PtType},
    },
    view::View,
};

impl Devicegraph {
    fn blk(&self, sid: Sid) -> Result<&dyn BlkDevice, StorageError> {
        let device = self.find_device(sid)?;
        device
            .kind
            .as_blk_device()
            .structured(CapabilityError::NotABlockDevice {
                classname: device.classname(),
                sid,
            })
    }

    /// Fails if `blk` already has a child; block devices hold at most one
    /// user.
    fn ensure_unused(&self, blk: Sid, what: &'static str) -> Result<(), StorageError> {
        if self.children(blk, View::Classic)?.is_empty() {
            Ok(())
        } else {
            Err(StorageError::new(CapabilityError::ChildAlreadyPresent {
                name: self.displayname(blk),
                what,
            }))
        }
    }

    fn blk_filesystem(&self, sid: Sid) -> Result<&BlkFilesystem, StorageError> {
        let device = self.find_device(sid)?;
        device
            .kind
            .as_blk_filesystem()
            .structured(InternalError::UnexpectedDeviceKind {
                sid,
                expected: "BlkFilesystem",
                found: device.classname(),
            })
    }

    fn blk_filesystem_mut(&mut self, sid: Sid) -> Result<&mut BlkFilesystem, StorageError> {
        let device = self.find_device_mut(sid)?;
        let found = device.classname();
        match &mut device.kind {
            DeviceKind::BlkFilesystem(fs) => Ok(fs),
            _ => Err(StorageError::new(InternalError::UnexpectedDeviceKind {
                sid,
                expected: "BlkFilesystem",
                found,
            })),
        }
    }

    fn mount_point_mut(&mut self, sid: Sid) -> Result<&mut MountPoint, StorageError> {
        let device = self.find_device_mut(sid)?;
        let found = device.classname();
        match &mut device.kind {
            DeviceKind::MountPoint(mp) => Ok(mp),
            _ => Err(StorageError::new(InternalError::UnexpectedDeviceKind {
                sid,
                expected: "MountPoint",
                found,
            })),
        }
    }

    /// Creates a partition table on a disk or MD RAID.
    pub fn create_partition_table(&mut self, blk: Sid, pt_type: PtType) -> Result<Sid, StorageError> {
        let device = self.find_device(blk)?;
        if !matches!(device.kind, DeviceKind::Disk(_) | DeviceKind::Md(_)) {
            return Err(StorageError::new(CapabilityError::NotABlockDevice {
                classname: device.classname(),
                sid: blk,
            }))
            .message("Only disks and MD RAIDs can be partitioned");
        }
        self.ensure_unused(blk, "partition table")?;

        let pt = self.create_device(DeviceKind::PartitionTable(PartitionTable { pt_type }))?;
        self.add_holder(blk, pt, HolderKind::User)?;
        debug!("Created {pt_type} partition table {pt} on {}", self.displayname(blk));
        Ok(pt)
    }

    /// Creates a partition in `region` of the partition table `pt`, using
    /// the lowest free partition number.
    pub fn create_partition(
        &mut self,
        pt: Sid,
        region: Region,
        id: PartitionId,
    ) -> Result<Sid, StorageError> {
        let pt_type = self
            .find_device(pt)?
            .kind
            .as_partition_table()
            .structured(InternalError::UnexpectedDeviceKind {
                sid: pt,
                expected: "PartitionTable",
                found: self.find_device(pt)?.classname(),
            })?
            .pt_type;
        let (parent, parent_blk) = self
            .blk_device_of(pt)
            .structured(InternalError::Internal("Partition table without a device"))?;
        let parent_name = parent_blk.name().to_owned();

        self.check_partition_region(pt, parent, None, region)?;

        let used = self
            .children(pt, View::Classic)?
            .into_iter()
            .filter_map(|sid| self.find_device(sid).ok()?.kind.as_partition().map(|p| p.number))
            .collect::<Vec<_>>();
        let number = (1..=pt_type.max_primary())
            .find(|n| !used.contains(n))
            .structured(CapabilityError::NoFreePartitionSlot {
                name: parent_name.clone(),
            })?;

        let partition = self.create_device(DeviceKind::Partition(Partition {
            name: Partition::partition_name(&parent_name, number),
            number,
            region,
            partition_type: PartitionType::Primary,
            id,
        }))?;
        self.add_holder(pt, partition, HolderKind::Subdevice)?;
        debug!(
            "Created partition {} ({})",
            Partition::partition_name(&parent_name, number),
            region.size().to_human_string()
        );
        Ok(partition)
    }

    fn check_partition_region(
        &self,
        pt: Sid,
        parent: Sid,
        partition: Option<Sid>,
        region: Region,
    ) -> Result<(), StorageError> {
        let pt_type = self
            .find_device(pt)?
            .kind
            .as_partition_table()
            .map(|pt| pt.pt_type)
            .structured(InternalError::Internal("Partition without a partition table"))?;
        let parent_blk = self.blk(parent)?;
        let (head, tail) = pt_type.overhead_blocks();
        let usable = Region::new(
            head,
            parent_blk.region().length.saturating_sub(head + tail),
            parent_blk.region().block_size,
        );

        let out_of_bounds = || {
            StorageError::new(CapabilityError::RegionOutOfBounds {
                name: parent_blk.name().to_owned(),
                start: region.start,
                length: region.length,
            })
        };

        if !usable.contains(&region) {
            return Err(out_of_bounds());
        }

        for sibling in self.children(pt, View::Classic)? {
            if Some(sibling) == partition {
                continue;
            }
            if let Some(other) = self.find_device(sibling)?.kind.as_partition() {
                if other.region.overlaps(&region) {
                    return Err(out_of_bounds());
                }
            }
        }
        Ok(())
    }

    /// Deletes a device and everything on top of it.
    pub fn delete_device(&mut self, sid: Sid) -> Result<(), StorageError> {
        let device = self.find_device(sid)?;
        if !device.kind.can_be_created() {
            return Err(StorageError::new(CapabilityError::DeleteUnsupported {
                name: device.displayname(),
            }));
        }
        self.remove_descendants(sid, View::All)?;
        self.remove_device(sid)?;
        Ok(())
    }

    pub fn create_blk_filesystem(&mut self, blk: Sid, fs_type: FsType) -> Result<Sid, StorageError> {
        let size = self.blk(blk)?.size();
        self.ensure_unused(blk, "filesystem")?;
        if size < fs_type.min_size() {
            return Err(StorageError::new(CapabilityError::SizeBelowMinimum {
                name: self.displayname(blk),
                size: size.to_human_string(),
                min: fs_type.min_size().to_human_string(),
            }));
        }

        let fs = self.create_device(DeviceKind::BlkFilesystem(BlkFilesystem::new(fs_type)))?;
        self.add_holder(blk, fs, HolderKind::FilesystemUser)?;
        Ok(fs)
    }

    /// Adds another block device to a filesystem that can span several.
    pub fn add_filesystem_device(&mut self, fs: Sid, blk: Sid) -> Result<(), StorageError> {
        let fs_type = self.blk_filesystem(fs)?.fs_type;
        if !fs_type.supports_multiple_devices() {
            return Err(StorageError::new(CapabilityError::MultipleDevicesUnsupported {
                what: self.displayname(fs),
            }));
        }
        self.blk(blk)?;
        self.ensure_unused(blk, "filesystem")?;
        self.add_holder(blk, fs, HolderKind::FilesystemUser)
    }

    /// Removes a block device from a multi-device filesystem.
    pub fn remove_filesystem_device(&mut self, fs: Sid, blk: Sid) -> Result<(), StorageError> {
        if self.parents(fs, View::All)?.len() < 2 {
            return Err(StorageError::new(CapabilityError::DeleteUnsupported {
                name: self.displayname(blk),
            }))
            .message("The last device of a filesystem cannot be removed");
        }
        self.remove_holder(blk, fs).map(|_| ())
    }

    pub fn create_encryption(
        &mut self,
        blk: Sid,
        dm_table_name: &str,
        encryption_type: EncryptionType,
    ) -> Result<Sid, StorageError> {
        let parent_region = self.blk(blk)?.region();
        self.ensure_unused(blk, "encryption")?;

        let region = parent_region.with_size(parent_region.size() - encryption_type.overhead());
        let encryption = self.create_device(DeviceKind::Encryption(Encryption {
            name: Encryption::dm_name_to_path(dm_table_name),
            dm_table_name: dm_table_name.to_owned(),
            encryption_type,
            region,
            key_file: None,
        }))?;
        self.add_holder(blk, encryption, HolderKind::User)?;
        Ok(encryption)
    }

    pub fn create_bcache(&mut self, backing: Sid, name: &str) -> Result<Sid, StorageError> {
        let region = self.blk(backing)?.region();
        self.ensure_unused(backing, "bcache")?;

        let bcache = self.create_device(DeviceKind::Bcache(Bcache {
            name: name.to_owned(),
            region,
            cache_mode: CacheMode::default(),
        }))?;
        self.add_holder(backing, bcache, HolderKind::User)?;
        Ok(bcache)
    }

    pub fn create_bcache_cset(&mut self, caching: Sid) -> Result<Sid, StorageError> {
        self.blk(caching)?;
        self.ensure_unused(caching, "bcache cache set")?;

        let cset = self.create_device(DeviceKind::BcacheCset(BcacheCset::default()))?;
        self.add_holder(caching, cset, HolderKind::User)?;
        Ok(cset)
    }

    pub fn attach_bcache_cset(&mut self, bcache: Sid, cset: Sid) -> Result<(), StorageError> {
        self.blk(bcache)?;
        self.add_holder(cset, bcache, HolderKind::User)
    }

    pub fn create_lvm_pv(&mut self, blk: Sid) -> Result<Sid, StorageError> {
        self.blk(blk)?;
        self.ensure_unused(blk, "physical volume")?;

        let pv = self.create_device(DeviceKind::LvmPv(LvmPv::default()))?;
        self.add_holder(blk, pv, HolderKind::User)?;
        Ok(pv)
    }

    /// Creates a volume group from the given physical volumes.
    pub fn create_lvm_vg(&mut self, vg_name: &str, pvs: &[Sid]) -> Result<Sid, StorageError> {
        let vg = self.create_device(DeviceKind::LvmVg(LvmVg::new(vg_name)))?;
        for pv in pvs {
            self.add_lvm_pv(vg, *pv)?;
        }
        Ok(vg)
    }

    pub fn add_lvm_pv(&mut self, vg: Sid, pv: Sid) -> Result<(), StorageError> {
        let device = self.find_device(pv)?;
        if !matches!(device.kind, DeviceKind::LvmPv(_)) {
            return Err(StorageError::new(InternalError::UnexpectedDeviceKind {
                sid: pv,
                expected: "LvmPv",
                found: device.classname(),
            }));
        }
        self.ensure_unused(pv, "volume group")?;
        self.add_holder(pv, vg, HolderKind::User)
    }

    pub fn remove_lvm_pv(&mut self, vg: Sid, pv: Sid) -> Result<(), StorageError> {
        let size = self.vg_size_without(vg, Some(pv))?;
        let used = self.vg_used(vg)?;
        if used > size {
            return Err(StorageError::new(CapabilityError::VgTooSmall {
                vg_name: self.displayname(vg),
                free: size.to_human_string(),
                requested: used.to_human_string(),
            }))
            .message("Logical volumes do not fit without the physical volume");
        }
        self.remove_holder(pv, vg).map(|_| ())
    }

    /// Usable size of a volume group: its PVs minus metadata, in whole extents.
    pub fn vg_size(&self, vg: Sid) -> Result<ByteCount, StorageError> {
        self.vg_size_without(vg, None)
    }

    fn vg_size_without(&self, vg: Sid, excluded: Option<Sid>) -> Result<ByteCount, StorageError> {
        let vg_device = self.find_device(vg)?;
        let lvm_vg = vg_device
            .kind
            .as_lvm_vg()
            .structured(InternalError::UnexpectedDeviceKind {
                sid: vg,
                expected: "LvmVg",
                found: vg_device.classname(),
            })?;

        let mut total = ByteCount(0);
        for pv in self.parents(vg, View::Classic)? {
            if Some(pv) == excluded {
                continue;
            }
            if let Some((_, blk)) = self.blk_device_of(pv) {
                total = total
                    + lvm_vg.align(blk.size() - ByteCount::from_mib(LVM_PV_METADATA_SIZE_IN_MIB));
            }
        }
        Ok(total)
    }

    fn vg_used(&self, vg: Sid) -> Result<ByteCount, StorageError> {
        let mut used = ByteCount(0);
        for lv in self.children(vg, View::Classic)? {
            if let DeviceKind::LvmLv(lv) = &self.find_device(lv)?.kind {
                used = used + lv.size();
            }
        }
        Ok(used)
    }

    pub fn create_lvm_lv(
        &mut self,
        vg: Sid,
        lv_name: &str,
        size: ByteCount,
    ) -> Result<Sid, StorageError> {
        let (vg_name, aligned) = {
            let vg_device = self.find_device(vg)?;
            let lvm_vg = vg_device
                .kind
                .as_lvm_vg()
                .structured(InternalError::UnexpectedDeviceKind {
                    sid: vg,
                    expected: "LvmVg",
                    found: vg_device.classname(),
                })?;
            (lvm_vg.vg_name.clone(), lvm_vg.align(size))
        };

        let free = self.vg_size(vg)? - self.vg_used(vg)?;
        if aligned > free {
            return Err(StorageError::new(CapabilityError::VgTooSmall {
                vg_name,
                free: free.to_human_string(),
                requested: aligned.to_human_string(),
            }));
        }

        let lv = self.create_device(DeviceKind::LvmLv(LvmLv {
            name: LvmLv::lv_path(&vg_name, lv_name),
            lv_name: lv_name.to_owned(),
            region: Region::from_bytes(ByteCount(0), aligned, DEFAULT_BLOCK_SIZE),
            stripes: 1,
        }))?;
        self.add_holder(vg, lv, HolderKind::Subdevice)?;
        Ok(lv)
    }

    /// Creates an MD RAID. Members are ordered as given.
    pub fn create_md(
        &mut self,
        name: &str,
        level: MdLevel,
        members: &[Sid],
    ) -> Result<Sid, StorageError> {
        if members.len() < level.min_devices() {
            return Err(StorageError::new(CapabilityError::TooFewMdDevices {
                level: level.to_string(),
                min: level.min_devices(),
                count: members.len(),
            }));
        }

        let mut member_size = ByteCount(u64::MAX);
        let mut block_size = DEFAULT_BLOCK_SIZE;
        for member in members {
            let blk = self.blk(*member)?;
            member_size = member_size.min(blk.size());
            block_size = blk.region().block_size;
            self.ensure_unused(*member, "MD RAID")?;
        }

        let size = level.array_size(member_size, members.len() as u64);
        let md = self.create_device(DeviceKind::Md(Md::new(
            name,
            level,
            Region::from_bytes(ByteCount(0), size, block_size),
        )))?;
        for (sort_key, member) in members.iter().enumerate() {
            self.add_holder(*member, md, HolderKind::md_member(sort_key as u32))?;
        }
        Ok(md)
    }

    pub fn add_md_device(&mut self, md: Sid, blk: Sid, spare: bool) -> Result<(), StorageError> {
        self.blk(blk)?;
        self.ensure_unused(blk, "MD RAID")?;
        // Keys of removed members are not reused
        let sort_key = self
            .parents(md, View::All)?
            .into_iter()
            .filter_map(|member| match self.find_holder(member, md) {
                Some(HolderKind::MdUser { sort_key, .. }) => Some(*sort_key + 1),
                _ => None,
            })
            .max()
            .unwrap_or(0);
        self.add_holder(
            blk,
            md,
            HolderKind::MdUser {
                sort_key,
                spare,
                faulty: false,
            },
        )
    }

    pub fn remove_md_device(&mut self, md: Sid, blk: Sid) -> Result<(), StorageError> {
        self.remove_holder(blk, md).map(|_| ())
    }

    pub fn create_btrfs_subvolume(&mut self, parent: Sid, path: &str) -> Result<Sid, StorageError> {
        let device = self.find_device(parent)?;
        let ok = match &device.kind {
            DeviceKind::BlkFilesystem(fs) => fs.fs_type == FsType::Btrfs,
            DeviceKind::BtrfsSubvolume(_) => true,
            _ => false,
        };
        if !ok {
            return Err(StorageError::new(InternalError::UnexpectedDeviceKind {
                sid: parent,
                expected: "btrfs",
                found: device.classname(),
            }));
        }

        let subvolume = self.create_device(DeviceKind::BtrfsSubvolume(BtrfsSubvolume {
            path: path.to_owned(),
            nocow: false,
        }))?;
        self.add_holder(parent, subvolume, HolderKind::Subdevice)?;
        Ok(subvolume)
    }

    pub fn create_nfs(&mut self, server: &str, path: &str) -> Result<Sid, StorageError> {
        self.create_device(DeviceKind::Nfs(Nfs {
            server: server.to_owned(),
            path: path.to_owned(),
        }))
    }

    /// Creates a mount point for a mountable. The path must suit the
    /// filesystem: `swap` or `none` for swap, an absolute path otherwise.
    pub fn create_mount_point(&mut self, mountable: Sid, path: &str) -> Result<Sid, StorageError> {
        let device = self.find_device(mountable)?;
        let m = device
            .kind
            .as_mountable()
            .structured(CapabilityError::NotMountable {
                classname: device.classname(),
                sid: mountable,
            })?;
        let fs_type = device.kind.as_blk_filesystem().map(|fs| fs.fs_type);
        if !is_valid_path(fs_type, path) {
            return Err(StorageError::new(CapabilityError::InvalidMountPath {
                path: path.to_owned(),
                fs_type: m.mount_type().to_owned(),
            }));
        }
        if self.mount_point_of(mountable).is_some() {
            return Err(StorageError::new(CapabilityError::ChildAlreadyPresent {
                name: self.displayname(mountable),
                what: "mount point",
            }));
        }

        let mut mount_point = MountPoint::new(path, m.default_mount_by());
        mount_point.passno = fs_type
            .map(|t| t.default_passno(path == ROOT_MOUNT_POINT_PATH))
            .unwrap_or(0);

        let mp = self.create_device(DeviceKind::MountPoint(mount_point))?;
        self.add_holder(mountable, mp, HolderKind::User)?;
        Ok(mp)
    }

    pub fn set_mount_by(&mut self, mp: Sid, mount_by: MountByType) -> Result<(), StorageError> {
        self.mount_point_mut(mp)?.mount_by = mount_by;
        Ok(())
    }

    pub fn set_mount_options(&mut self, mp: Sid, options: Vec<String>) -> Result<(), StorageError> {
        self.mount_point_mut(mp)?.mount_options = options;
        Ok(())
    }

    pub fn set_mount_active(&mut self, mp: Sid, active: bool) -> Result<(), StorageError> {
        self.mount_point_mut(mp)?.active = active;
        Ok(())
    }

    pub fn set_in_etc_fstab(&mut self, mp: Sid, in_etc_fstab: bool) -> Result<(), StorageError> {
        self.mount_point_mut(mp)?.in_etc_fstab = in_etc_fstab;
        Ok(())
    }

    pub fn set_label(&mut self, fs: Sid, label: &str) -> Result<(), StorageError> {
        let fs_type = self.blk_filesystem(fs)?.fs_type;
        if !fs_type.supports_label() {
            return Err(StorageError::new(CapabilityError::LabelUnsupported {
                what: self.displayname(fs),
            }));
        }
        if label.chars().count() > fs_type.max_labelsize() {
            return Err(StorageError::new(CapabilityError::LabelTooLong {
                what: fs_type.to_string(),
                label: label.to_owned(),
                max: fs_type.max_labelsize(),
            }));
        }
        self.blk_filesystem_mut(fs)?.label = label.to_owned();
        Ok(())
    }

    pub fn set_uuid(&mut self, fs: Sid, uuid: &str) -> Result<(), StorageError> {
        let fs_type = self.blk_filesystem(fs)?.fs_type;
        if !fs_type.supports_uuid() {
            return Err(StorageError::new(CapabilityError::UuidUnsupported {
                what: self.displayname(fs),
            }));
        }
        let parsed = uuid::Uuid::parse_str(uuid).structured(CapabilityError::InvalidUuid {
            uuid: uuid.to_owned(),
        })?;
        self.blk_filesystem_mut(fs)?.uuid = parsed.hyphenated().to_string();
        Ok(())
    }

    pub fn set_tune_options(&mut self, fs: Sid, options: &str) -> Result<(), StorageError> {
        let fs_type = self.blk_filesystem(fs)?.fs_type;
        if !fs_type.supports_tune_options() {
            return Err(StorageError::new(CapabilityError::TuneOptionsUnsupported {
                what: self.displayname(fs),
            }));
        }
        self.blk_filesystem_mut(fs)?.tune_options = options.to_owned();
        Ok(())
    }

    /// The devices resized together with `sid`: the device itself and the
    /// chain of encryptions, PVs and filesystems stacked on it.
    fn resize_stack(&self, sid: Sid) -> Result<Vec<Sid>, StorageError> {
        let mut stack = vec![sid];
        let mut current = sid;
        loop {
            let children = self.children(current, View::Classic)?;
            let [child] = children.as_slice() else {
                break;
            };
            match self.find_device(*child)?.kind {
                DeviceKind::Encryption(_) | DeviceKind::LvmPv(_) | DeviceKind::BlkFilesystem(_) => {
                    stack.push(*child);
                    current = *child;
                }
                _ => break,
            }
        }
        Ok(stack)
    }

    /// Resize limits of a single device, without what is stacked on it.
    fn own_resize_info(&self, sid: Sid) -> Result<(ResizeInfo, ByteCount), StorageError> {
        let device = self.find_device(sid)?;
        Ok(match &device.kind {
            DeviceKind::Partition(p) => (p.resize_info(), ByteCount(0)),
            DeviceKind::LvmLv(lv) => (lv.resize_info(), ByteCount(0)),
            DeviceKind::Encryption(e) => (ResizeInfo::unlimited(), e.encryption_type.overhead()),
            DeviceKind::LvmPv(_) => (
                ResizeInfo::unlimited(),
                ByteCount::from_mib(LVM_PV_METADATA_SIZE_IN_MIB),
            ),
            DeviceKind::BlkFilesystem(fs) => (fs.fs_type.resize_info(), ByteCount(0)),
            _ => (ResizeInfo::unsupported(), ByteCount(0)),
        })
    }

    /// Combined resize limits of `sid` and everything stacked on it.
    pub fn resize_info(&self, sid: Sid) -> Result<ResizeInfo, StorageError> {
        let mut stack = self.resize_stack(sid)?.into_iter();
        let Some(first) = stack.next() else {
            return Ok(ResizeInfo::unsupported());
        };
        let (mut info, mut overhead) = self.own_resize_info(first)?;
        for upper in stack {
            let (upper_info, upper_overhead) = self.own_resize_info(upper)?;
            info = info.combine(upper_info, overhead);
            overhead = overhead + upper_overhead;
        }
        Ok(info)
    }

    /// Resizes a partition or logical volume. Encryptions on top follow
    /// the new size; filesystems are resized when the plan is committed.
    pub fn resize(&mut self, sid: Sid, new_size: ByteCount) -> Result<(), StorageError> {
        let old_size = self.blk(sid)?.size();
        if new_size == old_size {
            return Ok(());
        }

        let stack = self.resize_stack(sid)?;
        let mut overhead = ByteCount(0);
        for layer in &stack {
            let (info, layer_overhead) = self.own_resize_info(*layer)?;
            let layer_size = new_size - overhead;
            let what = self.displayname(*layer);
            let name = self.displayname(sid);

            if !info.resize_ok {
                return Err(StorageError::new(CapabilityError::ResizeUnsupported {
                    classname: self.find_device(*layer)?.classname(),
                    name: what,
                }));
            }
            if new_size < old_size && !info.supports_shrink {
                return Err(StorageError::new(CapabilityError::ShrinkUnsupported { what, name }));
            }
            if new_size > old_size && !info.supports_grow {
                return Err(StorageError::new(CapabilityError::GrowUnsupported { what, name }));
            }
            if layer_size < info.min_size {
                return Err(StorageError::new(CapabilityError::SizeBelowMinimum {
                    name: what,
                    size: layer_size.to_human_string(),
                    min: info.min_size.to_human_string(),
                }));
            }
            if layer_size > info.max_size {
                return Err(StorageError::new(CapabilityError::SizeAboveMaximum {
                    name: what,
                    size: layer_size.to_human_string(),
                    max: info.max_size.to_human_string(),
                }));
            }
            overhead = overhead + layer_overhead;
        }

        let region = self.blk(sid)?.region().with_size(new_size);
        match &self.find_device(sid)?.kind {
            DeviceKind::Partition(_) => {
                let pt = self
                    .parents(sid, View::Classic)?
                    .into_iter()
                    .next()
                    .structured(InternalError::Internal("Partition without a partition table"))?;
                let (parent, _) = self
                    .blk_device_of(pt)
                    .structured(InternalError::Internal("Partition table without a device"))?;
                self.check_partition_region(pt, parent, Some(sid), region)?;
            }
            DeviceKind::LvmLv(_) if new_size > old_size => {
                let vg = self
                    .parents(sid, View::Classic)?
                    .into_iter()
                    .next()
                    .structured(InternalError::Internal("Logical volume without a volume group"))?;
                let free = self.vg_size(vg)? - self.vg_used(vg)?;
                if new_size - old_size > free {
                    return Err(StorageError::new(CapabilityError::VgTooSmall {
                        vg_name: self.displayname(vg),
                        free: free.to_human_string(),
                        requested: (new_size - old_size).to_human_string(),
                    }));
                }
            }
            _ => {}
        }

        debug!(
            "Resizing {} from {} to {}",
            self.displayname(sid),
            old_size.to_human_string(),
            new_size.to_human_string()
        );

        let mut size = new_size;
        for layer in stack {
            let (_, layer_overhead) = self.own_resize_info(layer)?;
            if let Some(blk) = self.find_device_mut(layer)?.kind.as_blk_device_mut() {
                let region = blk.region().with_size(size);
                blk.set_region(region);
            }
            size = size - layer_overhead;
        }
        Ok(())
    }
}
