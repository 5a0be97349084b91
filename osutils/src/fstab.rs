use std::{
    fmt::{self, Display},
    path::{Path, PathBuf},
};

use anyhow::{bail, Context, Error};
use log::debug;

use crate::files;

/// An /etc/fstab file. Lines that are not entries (comments, blank lines)
/// are kept in place when the file is written back.
#[derive(Debug)]
pub struct EtcFstab {
    path: PathBuf,
    lines: Vec<FstabLine>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum FstabLine {
    Entry(FstabEntry),
    Other(String),
}

/// A single entry of an fstab file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FstabEntry {
    pub spec: String,
    pub mount_point: String,
    pub fs_type: String,
    pub options: Vec<String>,
    pub freq: u32,
    pub passno: u32,
}

impl FstabEntry {
    pub fn new(
        spec: impl Into<String>,
        mount_point: impl Into<String>,
        fs_type: impl Into<String>,
    ) -> Self {
        Self {
            spec: spec.into(),
            mount_point: mount_point.into(),
            fs_type: fs_type.into(),
            options: Vec::new(),
            freq: 0,
            passno: 0,
        }
    }

    pub fn with_options(mut self, options: Vec<String>) -> Self {
        self.options = options;
        self
    }

    pub fn with_passno(mut self, freq: u32, passno: u32) -> Self {
        self.freq = freq;
        self.passno = passno;
        self
    }

    fn parse(line: &str) -> Option<Self> {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 3 || fields[0].starts_with('#') {
            return None;
        }

        Some(Self {
            spec: fields[0].into(),
            mount_point: fields[1].into(),
            fs_type: fields[2].into(),
            options: match fields.get(3) {
                Some(&"defaults") | None => Vec::new(),
                Some(options) => options.split(',').map(String::from).collect(),
            },
            freq: fields.get(4).and_then(|f| f.parse().ok()).unwrap_or(0),
            passno: fields.get(5).and_then(|f| f.parse().ok()).unwrap_or(0),
        })
    }
}

impl Display for FstabEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // If the options are empty, use "defaults" as the default
        let options = if self.options.is_empty() {
            "defaults".into()
        } else {
            self.options.join(",")
        };

        write!(
            f,
            "{} {} {} {} {} {}",
            self.spec, self.mount_point, self.fs_type, options, self.freq, self.passno
        )
    }
}

impl EtcFstab {
    /// Reads the fstab at `path`. A missing file gives an empty table that
    /// will be created on `write`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref().to_path_buf();
        let contents = files::read_optional(&path)
            .with_context(|| format!("Failed to read '{}'", path.display()))?
            .unwrap_or_default();

        let lines = contents
            .lines()
            .map(|line| match FstabEntry::parse(line) {
                Some(entry) => FstabLine::Entry(entry),
                None => FstabLine::Other(line.to_string()),
            })
            .collect();
        Ok(Self { path, lines })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn entries(&self) -> impl Iterator<Item = &FstabEntry> {
        self.lines.iter().filter_map(|line| match line {
            FstabLine::Entry(entry) => Some(entry),
            FstabLine::Other(_) => None,
        })
    }

    pub fn find(&self, mount_point: &str) -> Option<&FstabEntry> {
        self.entries().find(|e| e.mount_point == mount_point)
    }

    fn position(&self, mount_point: &str) -> Option<usize> {
        self.lines.iter().position(|line| {
            matches!(line, FstabLine::Entry(e) if e.mount_point == mount_point)
        })
    }

    /// Adds `entry`. An existing entry for the same mount point is replaced,
    /// except for swap entries, where several may share "none"/"swap".
    pub fn add(&mut self, entry: FstabEntry) {
        debug!("Adding '{entry}' to '{}'", self.path.display());
        if entry.fs_type != "swap" {
            if let Some(index) = self.position(&entry.mount_point) {
                self.lines[index] = FstabLine::Entry(entry);
                return;
            }
        }
        self.lines.push(FstabLine::Entry(entry));
    }

    /// Removes the entry for `spec` mounted at `mount_point`. Returns whether
    /// an entry was removed.
    pub fn remove(&mut self, spec: &str, mount_point: &str) -> bool {
        let before = self.lines.len();
        self.lines.retain(|line| {
            !matches!(line, FstabLine::Entry(e) if e.mount_point == mount_point && e.spec == spec)
        });
        let removed = self.lines.len() != before;
        if removed {
            debug!("Removed '{spec}' on '{mount_point}' from '{}'", self.path.display());
        }
        removed
    }

    /// Replaces the entry for `old_spec` mounted at `old_mount_point` with
    /// `entry`, keeping its position in the file.
    pub fn update(&mut self, old_spec: &str, old_mount_point: &str, entry: FstabEntry) -> Result<(), Error> {
        let Some(index) = self.lines.iter().position(|line| {
            matches!(line, FstabLine::Entry(e) if e.mount_point == old_mount_point && e.spec == old_spec)
        }) else {
            bail!(
                "No entry for '{old_spec}' on '{old_mount_point}' in '{}'",
                self.path.display()
            );
        };
        debug!("Updating '{old_mount_point}' in '{}' to '{entry}'", self.path.display());
        self.lines[index] = FstabLine::Entry(entry);
        Ok(())
    }

    pub fn render(&self) -> String {
        self.lines
            .iter()
            .map(|line| match line {
                FstabLine::Entry(entry) => format!("{entry}\n"),
                FstabLine::Other(text) => format!("{text}\n"),
            })
            .collect()
    }

    pub fn write(&self) -> Result<(), Error> {
        files::write_atomic(&self.path, self.render().as_bytes())
            .with_context(|| format!("Failed to write new {}", self.path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use indoc::indoc;

    const FSTAB: &str = indoc! {"
        # /etc/fstab: static file system information.
        UUID=1111 / ext4 defaults 0 1

        /dev/sda2 none swap defaults 0 0
        UUID=2222 /home xfs noatime,nodev 0 2
    "};

    fn fstab_in_tempdir(contents: Option<&str>) -> (tempfile::TempDir, EtcFstab) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("etc/fstab");
        if let Some(contents) = contents {
            files::write_atomic(&path, contents.as_bytes()).unwrap();
        }
        let fstab = EtcFstab::load(&path).unwrap();
        (dir, fstab)
    }

    #[test]
    fn test_parse_and_render_keep_comments() {
        let (_dir, fstab) = fstab_in_tempdir(Some(FSTAB));
        assert_eq!(fstab.entries().count(), 3);
        assert_eq!(
            fstab.find("/home"),
            Some(
                &FstabEntry::new("UUID=2222", "/home", "xfs")
                    .with_options(vec!["noatime".into(), "nodev".into()])
                    .with_passno(0, 2)
            )
        );
        assert_eq!(fstab.render(), FSTAB);
    }

    #[test]
    fn test_add_remove_update() {
        let (_dir, mut fstab) = fstab_in_tempdir(Some(FSTAB));

        fstab.add(FstabEntry::new("/dev/sdb1", "/data", "ext4").with_passno(0, 2));
        assert!(fstab.remove("/dev/sda2", "none"));
        assert!(!fstab.remove("/dev/sda2", "none"));
        fstab
            .update(
                "UUID=2222",
                "/home",
                FstabEntry::new("UUID=2222", "/home", "xfs").with_passno(0, 2),
            )
            .unwrap();
        fstab
            .update("UUID=9999", "/srv", FstabEntry::new("x", "/srv", "ext4"))
            .unwrap_err();

        assert_eq!(
            fstab.render(),
            indoc! {"
                # /etc/fstab: static file system information.
                UUID=1111 / ext4 defaults 0 1

                UUID=2222 /home xfs defaults 0 2
                /dev/sdb1 /data ext4 defaults 0 2
            "}
        );
    }

    #[test]
    fn test_add_replaces_same_mount_point() {
        let (_dir, mut fstab) = fstab_in_tempdir(Some(FSTAB));
        fstab.add(FstabEntry::new("UUID=3333", "/", "btrfs").with_passno(0, 1));
        assert_eq!(fstab.entries().count(), 3);
        assert_eq!(fstab.find("/").unwrap().spec, "UUID=3333");

        fstab.add(FstabEntry::new("/dev/sdc1", "none", "swap"));
        assert_eq!(fstab.entries().filter(|e| e.fs_type == "swap").count(), 2);
    }

    #[test]
    fn test_write_creates_missing_file() {
        let (_dir, mut fstab) = fstab_in_tempdir(None);
        assert_eq!(fstab.entries().count(), 0);
        fstab.add(FstabEntry::new("/dev/sda1", "/", "ext4").with_passno(0, 1));
        fstab.write().unwrap();

        let reloaded = EtcFstab::load(fstab.path()).unwrap();
        assert_eq!(reloaded.render(), "/dev/sda1 / ext4 defaults 0 1\n");
    }
}
