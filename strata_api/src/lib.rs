pub mod constants;
pub mod devicegraph;
pub mod error;
pub mod features;
pub mod primitives;
pub mod text;

pub use devicegraph::{
    device::{Device, DeviceKind, Sid},
    graph::Devicegraph,
    holder::HolderKind,
    view::View,
};
