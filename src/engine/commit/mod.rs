//! Executes an actiongraph against the system, one action at a time in
//! commit order.

use std::{collections::HashMap, path::Path};

use log::{debug, error, info, warn};
use serde::Serialize;

use osutils::{fstab::EtcFstab, runner::CommandRunner, udevadm};
use strata_api::{
    devicegraph::kinds::mount_point::MountByType,
    error::{CommitError, ReportError, ResourceMissingError, StorageError},
    text::Tense,
    DeviceKind, Devicegraph, Sid,
};

use super::{
    actiongraph::{Action, Actiongraph},
    operations,
};

mod context;

pub use context::CommitContext;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommitOptions {
    /// Mount filesystems read-write even when their mount options say `ro`.
    pub force_rw: bool,
}

/// Hooks into a running commit. All methods do nothing by default; `error`
/// stops the commit unless it returns `true`.
pub trait CommitCallbacks {
    /// A progress message, the continuous text of the action about to run.
    fn message(&self, _message: &str) {}

    fn pre(&self, _action: &Action) {}

    fn post(&self, _action: &Action) {}

    /// Called when an action failed. Returns whether to go on with the next
    /// action.
    fn error(&self, _message: &str, _error: &StorageError) -> bool {
        false
    }
}

pub struct NoCallbacks;

impl CommitCallbacks for NoCallbacks {}

/// State shared by the actions of one commit.
pub struct CommitData<'a> {
    pub ag: &'a Actiongraph<'a>,
    pub ctx: &'a CommitContext<'a>,

    /// Loaded on first use, written after every change.
    fstab: Option<EtcFstab>,

    /// UUIDs chosen during the commit for devices the staging graph left
    /// without one, so later actions can refer to them.
    generated_uuids: HashMap<Sid, String>,

    /// Text of the action being committed.
    current: String,
}

impl<'a> CommitData<'a> {
    pub fn new(ag: &'a Actiongraph<'a>, ctx: &'a CommitContext<'a>) -> Self {
        Self {
            ag,
            ctx,
            fstab: None,
            generated_uuids: HashMap::new(),
            current: String::new(),
        }
    }

    pub fn runner(&self) -> &'a dyn CommandRunner {
        self.ctx.runner
    }

    /// The error kind for a failure of the current action.
    pub fn failed(&self) -> CommitError {
        CommitError::ActionFailed {
            action: self.current.clone(),
        }
    }

    /// `uuid` if set, otherwise a UUID generated once for `sid`.
    pub fn uuid_for(&mut self, sid: Sid, uuid: &str) -> String {
        if !uuid.is_empty() {
            return uuid.to_owned();
        }
        self.generated_uuids
            .entry(sid)
            .or_insert_with(|| {
                let uuid = uuid::Uuid::new_v4().to_string();
                debug!("Generated UUID {uuid} for device {sid}");
                uuid
            })
            .clone()
    }

    /// First fstab column for `mountable`, using UUIDs generated during this
    /// commit where the graph has none.
    pub fn fstab_spec(
        &self,
        graph: &Devicegraph,
        mountable: Sid,
        mount_by: MountByType,
    ) -> Option<String> {
        if mount_by == MountByType::Uuid {
            if let Ok(DeviceKind::BlkFilesystem(fs)) = graph.find_device(mountable).map(|d| &d.kind)
            {
                if fs.uuid.is_empty() {
                    if let Some(uuid) = self.generated_uuids.get(&mountable) {
                        return Some(format!("UUID={uuid}"));
                    }
                }
            }
        }
        graph.mount_spec(mountable, mount_by)
    }

    /// Applies `change` to the fstab and writes it back.
    pub fn update_etc_fstab(
        &mut self,
        change: impl FnOnce(&mut EtcFstab) -> Result<(), anyhow::Error>,
    ) -> Result<(), StorageError> {
        let path = self.ctx.fstab_path.clone();
        let fstab_error = || CommitError::EtcFstab {
            path: path.display().to_string(),
        };

        if self.fstab.is_none() {
            self.fstab = Some(EtcFstab::load(&path).structured(fstab_error())?);
        }
        let fstab = self.fstab.as_mut().structured(fstab_error())?;

        change(fstab).structured(fstab_error())?;
        fstab.write().structured(fstab_error())
    }

    /// Waits for udev to create the node of a new device.
    pub fn wait_for_device(&self, path: &Path) -> Result<(), StorageError> {
        udevadm::wait(self.runner(), path, self.ctx.udev_timeout).structured(
            ResourceMissingError::DeviceNodeMissing {
                path: path.display().to_string(),
            },
        )
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct CommitFailure {
    /// Position of the failed action in commit order.
    pub index: usize,
    pub text: String,
    pub error: StorageError,
}

/// What a commit did. Actions are referred to by their position in
/// `planned`, which lists every action text in commit order.
#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct CommitReport {
    pub planned: Vec<String>,
    pub committed: Vec<usize>,
    pub failures: Vec<CommitFailure>,

    /// Actions never attempted because the commit stopped early.
    pub skipped: Vec<usize>,
}

impl CommitReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    /// The first failure, the one that stopped the commit unless callbacks
    /// asked to go on.
    pub fn failure(&self) -> Option<&CommitFailure> {
        self.failures.first()
    }

    /// Turns the report into the error of its first failure.
    pub fn into_result(self) -> Result<Self, StorageError> {
        if self.failures.is_empty() {
            return Ok(self);
        }
        let mut failures = self.failures;
        Err(failures.swap_remove(0).error)
    }
}

/// Commits every action of `ag`. Internal errors, found before anything is
/// run, are returned as `Err`; failing actions end up in the report.
#[tracing::instrument(skip_all, fields(actions = ag.num_actions()))]
pub fn commit(
    ag: &Actiongraph,
    ctx: &CommitContext,
    options: &CommitOptions,
    callbacks: &dyn CommitCallbacks,
) -> Result<CommitReport, StorageError> {
    let planned = ag
        .texts(Tense::Simple)?
        .iter()
        .map(|text| text.render())
        .collect::<Vec<_>>();
    let messages = ag
        .texts(Tense::Continuous)?
        .iter()
        .map(|text| text.render())
        .collect::<Vec<_>>();

    info!("Committing {} actions", planned.len());
    let mut report = CommitReport {
        planned,
        ..Default::default()
    };
    let mut data = CommitData::new(ag, ctx);

    for (index, vertex) in ag.commit_order().iter().enumerate() {
        let action = ag.action(*vertex);
        let text = report.planned[index].clone();

        if ctx.is_cancelled() {
            warn!("Commit cancelled before '{text}'");
            report.failures.push(CommitFailure {
                index,
                text: text.clone(),
                error: StorageError::new(CommitError::Cancelled {
                    action: text.clone(),
                }),
            });
            report.skipped.extend(index + 1..ag.num_actions());
            break;
        }

        callbacks.message(&messages[index]);
        callbacks.pre(action);

        if action.nop {
            debug!("{} (nothing to do)", messages[index]);
        } else {
            info!("{}", messages[index]);
            data.current = text.clone();
            if let Err(err) = operations::commit(action, &mut data, options) {
                error!("Failed to commit '{text}': {err:?}");
                let go_on = callbacks.error(&text, &err);
                report.failures.push(CommitFailure {
                    index,
                    text: text.clone(),
                    error: err,
                });
                if go_on {
                    warn!("Continuing after failed action '{text}'");
                    continue;
                }
                report.skipped.extend(index + 1..ag.num_actions());
                break;
            }
        }

        report.committed.push(index);
        callbacks.post(action);
    }

    if report.is_success() {
        info!("Commit finished, {} actions committed", report.committed.len());
    } else {
        error!(
            "Commit failed, {} of {} actions committed",
            report.committed.len(),
            report.planned.len()
        );
    }
    Ok(report)
}
