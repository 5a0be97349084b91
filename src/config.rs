use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use log::debug;
use serde::{Deserialize, Serialize};

use osutils::files;
use strata_api::{
    constants::{
        BACKGROUND_LOG_PATH_DEFAULT, COMMIT_LOCK_PATH_DEFAULT, ETC_FSTAB_RELATIVE_PATH,
        UDEV_TIMEOUT_SECS_DEFAULT,
    },
    error::{InvalidInputError, ReportError, StorageError},
};

/// Settings of the engine, read from `/etc/strata/strata.yaml` unless a
/// different file is given on the command line. Every field is optional.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Directory the target system is mounted at. Mount points and the
    /// fstab are resolved below it. Default is `/`.
    pub rootprefix: PathBuf,

    /// File locked for the duration of a commit.
    pub lock_path: PathBuf,

    /// Where to write the JSON background log of commit runs.
    pub background_log_path: Option<PathBuf>,

    /// Where to write tracing spans as JSON. Tracing is off when unset.
    pub trace_path: Option<PathBuf>,

    /// How long to wait for the device node of a new block device.
    pub udev_timeout_secs: u64,

    /// Location of the fstab, relative to `rootprefix`.
    pub fstab_path: PathBuf,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            rootprefix: PathBuf::from("/"),
            lock_path: PathBuf::from(COMMIT_LOCK_PATH_DEFAULT),
            background_log_path: Some(PathBuf::from(BACKGROUND_LOG_PATH_DEFAULT)),
            trace_path: None,
            udev_timeout_secs: UDEV_TIMEOUT_SECS_DEFAULT,
            fstab_path: PathBuf::from(ETC_FSTAB_RELATIVE_PATH),
        }
    }
}

impl EngineConfig {
    /// Reads the configuration at `path`. A missing file gives the defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref();
        let contents = files::read_optional(path).structured(InvalidInputError::LoadConfig {
            path: path.display().to_string(),
        })?;

        let Some(contents) = contents else {
            debug!("No configuration at '{}', using defaults", path.display());
            return Ok(Self::default());
        };

        serde_yaml::from_str(&contents).structured(InvalidInputError::ParseConfig)
    }

    /// Resolves an absolute path of the target system below `rootprefix`.
    pub fn in_rootprefix(&self, path: impl AsRef<Path>) -> PathBuf {
        in_rootprefix(&self.rootprefix, path)
    }

    pub fn fstab(&self) -> PathBuf {
        self.in_rootprefix(&self.fstab_path)
    }

    pub fn udev_timeout(&self) -> Duration {
        Duration::from_secs(self.udev_timeout_secs)
    }
}

/// Joins `path` to `rootprefix`, ignoring a leading `/` of `path`.
pub fn in_rootprefix(rootprefix: &Path, path: impl AsRef<Path>) -> PathBuf {
    let path = path.as_ref();
    rootprefix.join(path.strip_prefix("/").unwrap_or(path))
}

#[cfg(test)]
mod tests {
    use indoc::indoc;

    use strata_api::error::ErrorKind;

    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.fstab(), PathBuf::from("/etc/fstab"));
        assert_eq!(config.udev_timeout(), Duration::from_secs(120));
        assert_eq!(config.in_rootprefix("/data"), PathBuf::from("/data"));
    }

    #[test]
    fn test_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("strata.yaml");
        files::write_atomic(
            &path,
            indoc! {"
                rootprefix: /mnt
                udev-timeout-secs: 5
                trace-path: /tmp/strata-trace.json
            "}
            .as_bytes(),
        )
        .unwrap();

        let config = EngineConfig::load(&path).unwrap();
        assert_eq!(config.rootprefix, PathBuf::from("/mnt"));
        assert_eq!(config.udev_timeout_secs, 5);
        assert_eq!(config.trace_path, Some(PathBuf::from("/tmp/strata-trace.json")));
        assert_eq!(config.lock_path, PathBuf::from(COMMIT_LOCK_PATH_DEFAULT));
        assert_eq!(config.fstab(), PathBuf::from("/mnt/etc/fstab"));
        assert_eq!(config.in_rootprefix("/home"), PathBuf::from("/mnt/home"));
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = EngineConfig::load(dir.path().join("missing.yaml")).unwrap();
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn test_load_rejects_unknown_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("strata.yaml");
        files::write_atomic(&path, b"listen-port: 50051\n").unwrap();

        let err = EngineConfig::load(&path).unwrap_err();
        assert!(matches!(
            err.kind(),
            ErrorKind::InvalidInput(InvalidInputError::ParseConfig)
        ));
    }
}
