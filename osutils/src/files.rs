use std::{
    fs::{self, File},
    io::{ErrorKind, Write},
    path::Path,
};

use anyhow::{Context, Error};

/// Creates a file and all parent directories if they don't exist. An
/// existing file is truncated.
pub fn create_file(path: impl AsRef<Path>) -> Result<File, Error> {
    if let Some(parent) = path.as_ref().parent() {
        create_dirs(parent)?;
    }

    File::create(path.as_ref())
        .with_context(|| format!("Could not create file: {}", path.as_ref().display()))
}

/// Creates all directories in a path if they don't exist
pub fn create_dirs(path: impl AsRef<Path>) -> Result<(), Error> {
    fs::create_dir_all(path.as_ref())
        .with_context(|| format!("Could not create path: {}", path.as_ref().display()))
}

/// Reads a file into a string. A missing file reads as `None`.
pub fn read_optional(path: impl AsRef<Path>) -> Result<Option<String>, Error> {
    match fs::read_to_string(path.as_ref()) {
        Ok(contents) => Ok(Some(contents)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e).with_context(|| {
            format!("Could not read file contents: {}", path.as_ref().display())
        }),
    }
}

/// Replaces the contents of `path` atomically: the new contents are written
/// to a temporary file next to it, which is then renamed over it. Parent
/// directories are created as needed.
pub fn write_atomic(path: impl AsRef<Path>, contents: &[u8]) -> Result<(), Error> {
    let path = path.as_ref();
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    create_dirs(parent)?;

    let mut file = tempfile::NamedTempFile::new_in(parent)
        .with_context(|| format!("Could not create temporary file in {}", parent.display()))?;
    file.write_all(contents)
        .with_context(|| format!("Could not write to file: {}", path.display()))?;
    file.persist(path)
        .with_context(|| format!("Could not replace file: {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_atomic_creates_parents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("etc/fstab");

        assert_eq!(read_optional(&path).unwrap(), None);
        write_atomic(&path, b"first\n").unwrap();
        write_atomic(&path, b"second\n").unwrap();
        assert_eq!(read_optional(&path).unwrap().as_deref(), Some("second\n"));
        assert_eq!(fs::read_dir(path.parent().unwrap()).unwrap().count(), 1);
    }

    #[test]
    fn test_create_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log/strata.log");
        write_atomic(&path, b"old contents").unwrap();

        let mut file = create_file(&path).unwrap();
        file.write_all(b"new").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "new");
        create_file(dir.path()).unwrap_err();
    }

    #[test]
    fn test_read_optional_fails_on_directory() {
        let dir = tempfile::tempdir().unwrap();
        read_optional(dir.path()).unwrap_err();
    }
}
