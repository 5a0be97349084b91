use std::fmt::{self, Display};

use serde::Serialize;
use strum_macros::{Display as StrumDisplay, IntoStaticStr};

use strata_api::{
    error::{InternalError, StorageError},
    features::UsedFeatures,
    text::{Tense, Text},
    Device, Devicegraph, Sid,
};

use crate::engine::operations;

use super::Actiongraph;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, StrumDisplay, IntoStaticStr)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum ResizeMode {
    Grow,
    Shrink,
}

/// Which devicegraph of an actiongraph an action reads its device from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, StrumDisplay)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum Side {
    /// The probed graph, the system before the commit.
    Lhs,

    /// The staging graph, the system after the commit.
    Rhs,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, PartialOrd, Ord)]
#[serde(rename_all = "kebab-case")]
pub enum Affect {
    Device(Sid),
    Holder { parent: Sid, child: Sid },
}

impl Affect {
    /// The device the action is about. Holder actions are about their child.
    pub fn sid(&self) -> Sid {
        match self {
            Self::Device(sid) => *sid,
            Self::Holder { child, .. } => *child,
        }
    }

    pub fn is_holder(&self) -> bool {
        matches!(self, Self::Holder { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, IntoStaticStr)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum ActionKind {
    Create,
    Delete,
    Resize { mode: ResizeMode },
    SetLabel,
    SetUuid,
    SetTuneOptions,
    Mount,
    Unmount,
    AddToEtcFstab,
    RemoveFromEtcFstab,
    UpdateInEtcFstab,
}

impl ActionKind {
    pub fn name(&self) -> &'static str {
        self.into()
    }

    pub fn side(&self) -> Side {
        match self {
            Self::Delete | Self::Unmount | Self::RemoveFromEtcFstab => Side::Lhs,
            Self::Resize {
                mode: ResizeMode::Shrink,
            } => Side::Lhs,
            Self::Create
            | Self::Resize {
                mode: ResizeMode::Grow,
            }
            | Self::SetLabel
            | Self::SetUuid
            | Self::SetTuneOptions
            | Self::Mount
            | Self::AddToEtcFstab
            | Self::UpdateInEtcFstab => Side::Rhs,
        }
    }
}

/// One step of a plan. Built during synthesis and never changed afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Action {
    pub kind: ActionKind,
    pub affect: Affect,

    /// First action of the chain of its device.
    pub first: bool,

    /// Last action of the chain of its device.
    pub last: bool,

    /// Only informs, nothing is run for it.
    pub nop: bool,
}

impl Action {
    pub fn new(kind: ActionKind, affect: Affect) -> Self {
        Self {
            kind,
            affect,
            first: false,
            last: false,
            nop: false,
        }
    }

    pub fn nop(mut self) -> Self {
        self.nop = true;
        self
    }

    pub fn sid(&self) -> Sid {
        self.affect.sid()
    }

    pub fn side(&self) -> Side {
        self.kind.side()
    }

    pub fn is_create(&self) -> bool {
        self.kind == ActionKind::Create
    }

    pub fn is_delete(&self) -> bool {
        self.kind == ActionKind::Delete
    }

    pub fn is_resize(&self) -> bool {
        matches!(self.kind, ActionKind::Resize { .. })
    }

    /// Create of a device, not of a holder.
    pub fn creates_device(&self) -> bool {
        self.is_create() && !self.affect.is_holder()
    }

    /// Delete of a device, not of a holder.
    pub fn deletes_device(&self) -> bool {
        self.is_delete() && !self.affect.is_holder()
    }

    pub fn graph<'a>(&self, ag: &Actiongraph<'a>) -> &'a Devicegraph {
        ag.graph(self.side())
    }

    /// The device this action works on, looked up on its side.
    pub fn device<'a>(&self, ag: &Actiongraph<'a>) -> Result<&'a Device, StorageError> {
        self.graph(ag).find_device(self.sid()).map_err(|_| {
            StorageError::new(InternalError::ActionDeviceMissing {
                sid: self.sid(),
                side: self.side().to_string(),
            })
        })
    }

    /// Message describing this action, e.g. "Create partition /dev/sda1 (500 MiB)".
    pub fn text(&self, ag: &Actiongraph, tense: Tense) -> Result<Text, StorageError> {
        operations::text(self, ag, tense)
    }

    pub fn used_features(&self, ag: &Actiongraph) -> UsedFeatures {
        if self.nop {
            return UsedFeatures::empty();
        }

        let graph = self.graph(ag);
        let sid = match self.kind {
            // Mounting needs the tools of the filesystem, not of the mount point
            ActionKind::Mount
            | ActionKind::Unmount
            | ActionKind::AddToEtcFstab
            | ActionKind::RemoveFromEtcFstab
            | ActionKind::UpdateInEtcFstab => graph.mountable_of(self.sid()),
            _ => Some(self.sid()),
        };

        sid.and_then(|sid| graph.find_device(sid).ok())
            .map(|device| device.used_features())
            .unwrap_or_default()
    }
}

impl Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            ActionKind::Resize { mode } => write!(f, "resize-{mode}")?,
            kind => f.write_str(kind.name())?,
        }
        match self.affect {
            Affect::Device(sid) => write!(f, " {sid}")?,
            Affect::Holder { parent, child } => write!(f, " {parent}->{child}")?,
        }
        if self.nop {
            f.write_str(" (nop)")?;
        }
        Ok(())
    }
}
