use std::fmt::{Debug, Write};
use std::{borrow::Cow, panic::Location};

use serde::{ser::SerializeStruct, Deserialize, Serialize};
use strum_macros::IntoStaticStr;

use crate::devicegraph::device::Sid;

/// The planning engine hit an inconsistency. These are bugs in the diff
/// algorithm or violated graph invariants, never user errors.
#[derive(Debug, Eq, thiserror::Error, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub enum InternalError {
    #[error("Internal error: {0}")]
    Internal(&'static str),
    #[error("Action graph is not a DAG, cycle through action on device {sid}")]
    ActiongraphCycle { sid: Sid },
    #[error("Device with sid {sid} not found")]
    DeviceNotFound { sid: Sid },
    #[error("Device with sid {sid} already exists in the devicegraph")]
    DuplicateSid { sid: Sid },
    #[error("Holder {parent} -> {child} not found")]
    HolderNotFound { parent: Sid, child: Sid },
    #[error("Holder {parent} -> {child} references a device missing from the devicegraph")]
    HolderEndpointMissing { parent: Sid, child: Sid },
    #[error("Devicegraph contains a cycle through device {sid}")]
    DevicegraphCycle { sid: Sid },
    #[error("Action on device {sid} cannot resolve its device on the {side} side")]
    ActionDeviceMissing { sid: Sid, side: String },
    #[error("No create action found for new parent {sid}")]
    NoParentCreateAction { sid: Sid },
    #[error("Action '{action}' is not supported for {classname} (sid {sid})")]
    UnsupportedAction {
        action: &'static str,
        classname: &'static str,
        sid: Sid,
    },
    #[error("Device {sid} is a {found}, expected {expected}")]
    UnexpectedDeviceKind {
        sid: Sid,
        expected: &'static str,
        found: &'static str,
    },
}

/// A requested operation is not supported by the device, rejected while the
/// staging devicegraph is being built.
#[derive(Debug, Eq, thiserror::Error, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub enum CapabilityError {
    #[error("{classname} {name} cannot be resized")]
    ResizeUnsupported { classname: &'static str, name: String },
    #[error("{what} on {name} cannot be shrunk")]
    ShrinkUnsupported { what: String, name: String },
    #[error("{what} on {name} cannot be grown")]
    GrowUnsupported { what: String, name: String },
    #[error("Size {size} of {name} is below the minimum of {min}")]
    SizeBelowMinimum { name: String, size: String, min: String },
    #[error("Size {size} of {name} is above the maximum of {max}")]
    SizeAboveMaximum { name: String, size: String, max: String },
    #[error("{what} does not support labels")]
    LabelUnsupported { what: String },
    #[error("Label '{label}' is longer than the {max} characters allowed for {what}")]
    LabelTooLong { what: String, label: String, max: usize },
    #[error("{what} does not support setting the UUID")]
    UuidUnsupported { what: String },
    #[error("'{uuid}' is not a valid UUID")]
    InvalidUuid { uuid: String },
    #[error("{what} does not support tune options")]
    TuneOptionsUnsupported { what: String },
    #[error("'{path}' is not a valid mount point path for {fs_type}")]
    InvalidMountPath { path: String, fs_type: String },
    #[error("{classname} (sid {sid}) is not a block device")]
    NotABlockDevice { classname: &'static str, sid: Sid },
    #[error("{classname} (sid {sid}) is not mountable")]
    NotMountable { classname: &'static str, sid: Sid },
    #[error("{name} already holds a {what}")]
    ChildAlreadyPresent { name: String, what: &'static str },
    #[error("{name} has no partition table")]
    NoPartitionTable { name: String },
    #[error("Partition region {start}+{length} does not fit on {name}")]
    RegionOutOfBounds { name: String, start: u64, length: u64 },
    #[error("Partition table on {name} has no free slot left")]
    NoFreePartitionSlot { name: String },
    #[error("Volume group {vg_name} has {free} free, {requested} requested")]
    VgTooSmall {
        vg_name: String,
        free: String,
        requested: String,
    },
    #[error("{level} needs at least {min} devices, got {count}")]
    TooFewMdDevices {
        level: String,
        min: usize,
        count: usize,
    },
    #[error("{what} cannot span several devices")]
    MultipleDevicesUnsupported { what: String },
    #[error("{name} cannot be deleted")]
    DeleteUnsupported { name: String },
    #[error("{classname} {name} cannot be activated or deactivated")]
    ActivationUnsupported { classname: &'static str, name: String },
}

/// User provided input was invalid.
#[derive(Debug, Eq, thiserror::Error, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub enum InvalidInputError {
    #[error("Failed to load devicegraph from '{path}'")]
    LoadDevicegraph { path: String },
    #[error("Failed to parse devicegraph")]
    ParseDevicegraph,
    #[error("Failed to save devicegraph to '{path}'")]
    SaveDevicegraph { path: String },
    #[error("Failed to load engine configuration from '{path}'")]
    LoadConfig { path: String },
    #[error("Failed to parse engine configuration")]
    ParseConfig,
    #[error("Device with sid {sid} does not exist on the probed system")]
    DeviceNotProbed { sid: Sid },
}

/// Executing the action graph failed.
#[derive(Debug, Eq, thiserror::Error, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub enum CommitError {
    #[error("Action '{action}' failed")]
    ActionFailed { action: String },
    #[error("Commit was cancelled before '{action}'")]
    Cancelled { action: String },
    #[error("Another commit holds the lock '{path}'")]
    LockHeld { path: String },
    #[error("Failed to acquire commit lock '{path}'")]
    Lock { path: String },
    #[error("Failed to update '{path}'")]
    EtcFstab { path: String },
    #[error("Failed to write actiongraph to '{path}'")]
    WriteGraphviz { path: String },
}

/// A resource that an action produces did not show up.
#[derive(Debug, Eq, thiserror::Error, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub enum ResourceMissingError {
    #[error("Device node '{path}' did not appear")]
    DeviceNodeMissing { path: String },
}

/// Each variant of `ErrorKind` corresponds to a different category of error.
/// The categories decide what a caller may do about the failure.
#[derive(Debug, Eq, thiserror::Error, IntoStaticStr, PartialEq)]
#[strum(serialize_all = "kebab-case")]
pub enum ErrorKind {
    /// An invariant was violated while planning. Not recoverable.
    #[error(transparent)]
    Internal(#[from] InternalError),

    /// The staging devicegraph asks for something the device cannot do.
    #[error(transparent)]
    Capability(#[from] CapabilityError),

    /// Invalid user input.
    #[error(transparent)]
    InvalidInput(#[from] InvalidInputError),

    /// An action failed while being committed.
    #[error(transparent)]
    Commit(#[from] CommitError),

    /// A device did not become ready after it was created.
    #[error(transparent)]
    ResourceMissing(#[from] ResourceMissingError),
}

#[derive(Debug)]
struct StorageErrorInner {
    kind: ErrorKind,
    location: &'static Location<'static>,
    source: Option<anyhow::Error>,
    context: Vec<(Cow<'static, str>, &'static Location<'static>)>,
}

pub struct StorageError(Box<StorageErrorInner>);
impl StorageError {
    #[track_caller]
    pub fn new(kind: impl Into<ErrorKind>) -> Self {
        StorageError(Box::new(StorageErrorInner {
            kind: kind.into(),
            location: Location::caller(),
            source: None,
            context: Vec::new(),
        }))
    }

    #[track_caller]
    pub fn internal(msg: &'static str) -> Self {
        Self::new(InternalError::Internal(msg))
    }

    pub fn unstructured(self, context: impl Into<Cow<'static, str>>) -> anyhow::Error {
        match self.0.source {
            Some(source) => source.context(self.0.kind).context(context.into()),
            None => anyhow::Error::from(self.0.kind).context(context.into()),
        }
    }

    /// Returns a reference to the inner ErrorKind.
    pub fn kind(&self) -> &ErrorKind {
        &self.0.kind
    }

    /// Returns whether this error signals a bug in the planning engine.
    pub fn is_internal(&self) -> bool {
        matches!(self.0.kind, ErrorKind::Internal(_))
    }

    /// Returns the underlying cause, e.g. the output of a failed external tool.
    pub fn cause(&self) -> Option<&anyhow::Error> {
        self.0.source.as_ref()
    }
}

pub trait ReportError<T, K> {
    /// Convert this error into a structured StorageError.
    fn structured(self, kind: K) -> Result<T, StorageError>;
}

impl<T, K> ReportError<T, K> for Option<T>
where
    K: Into<ErrorKind>,
{
    #[track_caller]
    fn structured(self, kind: K) -> Result<T, StorageError> {
        match self {
            Some(t) => Ok(t),
            None => Err(StorageError(Box::new(StorageErrorInner {
                kind: kind.into(),
                location: Location::caller(),
                source: None,
                context: Vec::new(),
            }))),
        }
    }
}

impl<T, E, K> ReportError<T, K> for Result<T, E>
where
    E: Into<anyhow::Error>,
    K: Into<ErrorKind>,
{
    #[track_caller]
    fn structured(self, kind: K) -> Result<T, StorageError> {
        match self {
            Ok(o) => Ok(o),
            Err(e) => Err(StorageError(Box::new(StorageErrorInner {
                kind: kind.into(),
                location: Location::caller(),
                source: Some(e.into()),
                context: Vec::new(),
            }))),
        }
    }
}

pub trait StorageResultExt<T> {
    /// Attach a context message to the error.
    fn message(self, context: impl Into<Cow<'static, str>>) -> Result<T, StorageError>;

    /// Convert the error into an unstructured error.
    fn unstructured(self, context: impl Into<Cow<'static, str>>) -> Result<T, anyhow::Error>;
}

impl<T> StorageResultExt<T> for Result<T, StorageError> {
    #[track_caller]
    fn message(mut self, context: impl Into<Cow<'static, str>>) -> Result<T, StorageError> {
        if let Err(ref mut e) = self {
            e.0.context.push((context.into(), Location::caller()));
        }
        self
    }

    fn unstructured(self, context: impl Into<Cow<'static, str>>) -> Result<T, anyhow::Error> {
        self.map_err(|e| e.unstructured(context))
    }
}

impl Serialize for StorageError {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("storage-error", 5)?;
        state.serialize_field("message", &self.0.kind.to_string())?;
        match self.0.kind {
            ErrorKind::Internal(ref e) => state.serialize_field("error", e)?,
            ErrorKind::Capability(ref e) => state.serialize_field("error", e)?,
            ErrorKind::InvalidInput(ref e) => state.serialize_field("error", e)?,
            ErrorKind::Commit(ref e) => state.serialize_field("error", e)?,
            ErrorKind::ResourceMissing(ref e) => state.serialize_field("error", e)?,
        }
        state.serialize_field("category", <&str>::from(&self.0.kind))?;
        state.serialize_field(
            "location",
            &format!("{}:{}", self.0.location.file(), self.0.location.line()),
        )?;
        match self.0.source {
            Some(ref e) => state.serialize_field("cause", &Some(format!("{:?}", e)))?,
            None => state.serialize_field("cause", &None::<String>)?,
        }
        state.end()
    }
}

impl Debug for StorageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} at {}:{}",
            self.0.kind,
            self.0.location.file(),
            self.0.location.line()
        )?;

        if !self.0.context.is_empty() {
            writeln!(f, "\n\nContext:")?;
            for (i, (context, location)) in self.0.context.iter().enumerate() {
                for (j, line) in context.split('\n').enumerate() {
                    if j == 0 {
                        write!(f, "{: >5}: ", i)?;
                    } else {
                        f.write_str("\n       ")?;
                    }
                    f.write_str(line)?;
                }
                writeln!(f, " at {}:{}", location.file(), location.line())?;
            }
        }

        if let Some(ref source) = self.0.source {
            writeln!(f, "\n\nCaused by:")?;
            let mut index = 0;
            let mut source: Option<&dyn std::error::Error> = Some(source.as_ref());
            while let Some(e) = source {
                for (i, line) in e.to_string().split('\n').enumerate() {
                    if i == 0 {
                        write!(f, "{: >5}: ", index)?;
                    } else {
                        f.write_str("\n       ")?;
                    }
                    f.write_str(line)?;
                }
                f.write_char('\n')?;
                source = e.source();
                index += 1;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use anyhow::Context;
    use serde_yaml::Value;

    use super::*;

    #[test]
    fn test_error_serialize() {
        let e = StorageError(Box::new(StorageErrorInner {
            kind: ErrorKind::InvalidInput(InvalidInputError::ParseDevicegraph),
            location: Location::caller(),
            source: Some(
                std::fs::read("/non-existant-file")
                    .context("failed to read file")
                    .unwrap_err(),
            ),
            context: Vec::new(),
        }));
        match serde_yaml::to_value(e).unwrap() {
            Value::Mapping(m) => {
                assert_eq!(m.len(), 5);
                assert_eq!(m["error"], Value::String("parse-devicegraph".into()));
                assert_eq!(m["category"], Value::String("invalid-input".into()));
                assert!(matches!(m["cause"], Value::String(_)));
                assert_eq!(
                    m["message"],
                    Value::String("Failed to parse devicegraph".into())
                );
                match m["location"] {
                    Value::String(ref s) => assert!(s.contains("error.rs:")),
                    _ => panic!("location isn't string"),
                }
            }
            _ => panic!("value isn't mapping"),
        }
    }

    #[test]
    fn test_error_debug() {
        let error = Err::<(), _>(anyhow::anyhow!("z"))
            .context("x\ny")
            .structured(InternalError::Internal("w"))
            .unwrap_err();
        assert_eq!(
            format!("{:?}", error),
            format!(
                "Internal error: w at {}:{}\n\nCaused by:\n    0: x\n       y\n    1: z\n",
                error.0.location.file(),
                error.0.location.line(),
            ),
        );
    }

    #[test]
    fn test_error_categories() {
        let error = StorageError::new(InternalError::DeviceNotFound { sid: Sid(42) });
        assert!(error.is_internal());
        assert_eq!(<&str>::from(error.kind()), "internal");
        assert_eq!(error.kind().to_string(), "Device with sid 42 not found");

        let error = StorageError::new(CapabilityError::LabelUnsupported {
            what: "swap".into(),
        });
        assert!(!error.is_internal());
        assert_eq!(<&str>::from(error.kind()), "capability");
    }

    #[test]
    fn test_message_context() {
        let error = Err::<(), _>(StorageError::new(CommitError::Cancelled {
            action: "Create partition /dev/sda1".into(),
        }))
        .message("Commit stopped")
        .unwrap_err();
        let debug = format!("{error:?}");
        assert!(debug.starts_with("Commit was cancelled before 'Create partition /dev/sda1'"));
        assert!(debug.contains("Context:\n    0: Commit stopped at"));
    }
}
