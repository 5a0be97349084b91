use std::{fs, path::Path};

use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::{InvalidInputError, ReportError, StorageError, StorageResultExt};

use super::{device::Device, graph::Devicegraph, holder::Holder};

/// On-disk form of a devicegraph.
#[derive(Debug, Serialize, Deserialize)]
struct DevicegraphDocument {
    devices: Vec<Device>,

    #[serde(default)]
    holders: Vec<Holder>,
}

impl Devicegraph {
    pub fn to_yaml(&self) -> Result<String, StorageError> {
        let document = DevicegraphDocument {
            devices: self.devices().cloned().collect(),
            holders: self.holders(),
        };
        serde_yaml::to_string(&document).structured(InvalidInputError::ParseDevicegraph)
    }

    /// Parses a devicegraph and checks it. Sids are taken over unchanged.
    pub fn from_yaml(yaml: &str) -> Result<Self, StorageError> {
        let document: DevicegraphDocument =
            serde_yaml::from_str(yaml).structured(InvalidInputError::ParseDevicegraph)?;

        let mut graph = Devicegraph::new();
        for device in document.devices {
            graph
                .add_device(device)
                .message("Failed to add device to devicegraph")?;
        }
        for holder in document.holders {
            graph
                .add_holder(holder.parent, holder.child, holder.kind)
                .message("Failed to add holder to devicegraph")?;
        }
        graph.check().message("Loaded devicegraph is inconsistent")?;
        Ok(graph)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), StorageError> {
        let path = path.as_ref();
        let yaml = self.to_yaml()?;
        fs::write(path, yaml).structured(InvalidInputError::SaveDevicegraph {
            path: path.display().to_string(),
        })?;
        debug!("Saved devicegraph with {} devices to '{}'", self.num_devices(), path.display());
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref();
        let yaml = fs::read_to_string(path).structured(InvalidInputError::LoadDevicegraph {
            path: path.display().to_string(),
        })?;
        let graph = Self::from_yaml(&yaml).message(format!(
            "Failed to parse devicegraph '{}'",
            path.display()
        ))?;
        debug!("Loaded devicegraph with {} devices from '{}'", graph.num_devices(), path.display());
        Ok(graph)
    }
}
