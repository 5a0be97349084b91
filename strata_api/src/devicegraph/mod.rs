//! # Devicegraph
//!
//! A devicegraph is one snapshot of the storage topology of a machine: the
//! devices (disks, partitions, volume groups, filesystems, mount points...)
//! and the holders connecting them.
//!
//! Two devicegraphs take part in every plan:
//!
//! 1. The *probed* graph describes the system as it is. It is produced by
//!    probing and never changed afterwards.
//! 2. The *staging* graph starts as a copy of the probed one and is changed
//!    through the mutations in `builder.rs` until it describes the desired
//!    state.
//!
//! Devices are matched between the two graphs by their sid, which copies
//! keep.
//!
//! ## Layout
//!
//! ```text
//! strata_api/src/devicegraph
//! ├── builder.rs -------> # Staging mutations and their capability checks.
//! ├── capabilities.rs --> # Traits shared by several device kinds.
//! ├── device.rs --------> # Sid, Device & DeviceKind.
//! ├── graph.rs ---------> # Devicegraph storage and traversal.
//! ├── holder.rs --------> # Holder kinds.
//! ├── kinds ------------> # Attributes of each device kind.
//! ├── mod.rs -----------> # This file.
//! ├── persistence.rs ---> # YAML save/load.
//! └── view.rs ----------> # Traversal views.
//! ```

pub mod builder;
pub mod capabilities;
pub mod device;
pub mod graph;
pub mod holder;
pub mod kinds;
pub mod persistence;
pub mod view;
