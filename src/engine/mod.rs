//! The planning and commit engine. `Storage` holds the probed devicegraph
//! and a staging devicegraph that is edited towards the wanted state; the
//! actiongraph between the two is what a commit runs.

use std::sync::{atomic::AtomicBool, Arc};

use log::debug;

use osutils::runner::CommandRunner;
use strata_api::{
    error::{InvalidInputError, StorageError, StorageResultExt},
    features::{UsedFeatures, UsedFeaturesDependencyType},
    Device, Devicegraph, Sid,
};

use crate::{config::EngineConfig, lock::CommitLock};

pub mod actiongraph;
pub mod commit;
pub mod compound;
mod operations;

#[cfg(test)]
pub(crate) mod test_utils;

use actiongraph::Actiongraph;
use commit::{CommitCallbacks, CommitContext, CommitOptions, CommitReport};

pub struct Storage {
    config: EngineConfig,
    probed: Devicegraph,
    staging: Devicegraph,
}

impl Storage {
    /// Starts with a staging graph equal to `probed`.
    pub fn new(config: EngineConfig, probed: Devicegraph) -> Self {
        let staging = probed.clone();
        Self {
            config,
            probed,
            staging,
        }
    }

    /// Uses a staging graph prepared elsewhere. Both graphs are checked.
    pub fn with_staging(
        config: EngineConfig,
        probed: Devicegraph,
        staging: Devicegraph,
    ) -> Result<Self, StorageError> {
        probed.check().message("Probed devicegraph is inconsistent")?;
        staging
            .check()
            .message("Staging devicegraph is inconsistent")?;
        Ok(Self {
            config,
            probed,
            staging,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn probed(&self) -> &Devicegraph {
        &self.probed
    }

    pub fn staging(&self) -> &Devicegraph {
        &self.staging
    }

    pub fn staging_mut(&mut self) -> &mut Devicegraph {
        &mut self.staging
    }

    /// Drops every change made to the staging graph.
    pub fn reset_staging(&mut self) {
        self.staging = self.probed.clone();
    }

    pub fn calculate_actiongraph(&self) -> Result<Actiongraph<'_>, StorageError> {
        Actiongraph::new(&self.probed, &self.staging)
    }

    /// Features the staging graph needs.
    pub fn used_features(&self, dependency_type: UsedFeaturesDependencyType) -> UsedFeatures {
        self.staging.used_features(dependency_type)
    }

    /// Commits the difference between the probed and the staging graph.
    ///
    /// Holds the commit lock while running. When every action succeeded the
    /// staging graph becomes the new probed graph.
    #[tracing::instrument(skip_all)]
    pub fn commit(
        &mut self,
        runner: &dyn CommandRunner,
        options: &CommitOptions,
        callbacks: &dyn CommitCallbacks,
        cancel: Option<Arc<AtomicBool>>,
    ) -> Result<CommitReport, StorageError> {
        let _lock = CommitLock::acquire(&self.config.lock_path)?;
        self.staging
            .check()
            .message("Staging devicegraph is inconsistent")?;

        let report = {
            let ag = self.calculate_actiongraph()?;
            let mut ctx = CommitContext::new(runner, &self.config);
            if let Some(cancel) = cancel {
                ctx = ctx.with_cancel(cancel);
            }
            commit::commit(&ag, &ctx, options, callbacks)?
        };

        if report.is_success() {
            debug!("Adopting staging devicegraph as probed devicegraph");
            self.probed = self.staging.clone();
        }
        Ok(report)
    }

    /// Activates a device of the probed graph right away, e.g. mounts a
    /// mount point or opens an encryption.
    pub fn immediate_activate(&self, sid: Sid, runner: &dyn CommandRunner) -> Result<(), StorageError> {
        let device = self.probed_device(sid)?;
        let ctx = CommitContext::new(runner, &self.config);
        operations::activate(&self.probed, device, &ctx)
    }

    /// Deactivates a device of the probed graph right away.
    pub fn immediate_deactivate(&self, sid: Sid, runner: &dyn CommandRunner) -> Result<(), StorageError> {
        let device = self.probed_device(sid)?;
        let ctx = CommitContext::new(runner, &self.config);
        operations::deactivate(&self.probed, device, &ctx)
    }

    fn probed_device(&self, sid: Sid) -> Result<&Device, StorageError> {
        if !self.probed.device_exists(sid) {
            return Err(StorageError::new(InvalidInputError::DeviceNotProbed { sid }));
        }
        self.probed.find_device(sid)
    }
}
