//! Small filesystem helpers shared by the store modules.

use std::io::{self, Write};
use std::path::Path;

use tempfile::NamedTempFile;

/// Write `contents` to `path` atomically: stage into a temporary file in
/// the same directory, sync, then rename over the destination. A failed
/// write never truncates an existing file.
pub(crate) fn write_atomic(path: &Path, contents: &[u8]) -> io::Result<()> {
    let parent = path
        .parent()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "path has no parent"))?;
    let mut temp = NamedTempFile::new_in(parent)?;
    temp.write_all(contents)?;
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn tmp() -> TempDir {
        match TempDir::new() {
            Ok(dir) => dir,
            Err(err) => panic!("tempdir: {err}"),
        }
    }

    #[test]
    fn test_write_atomic_creates_and_replaces() {
        let dir = tmp();
        let target = dir.path().join("data.json");

        assert!(write_atomic(&target, b"first").is_ok());
        assert_eq!(fs::read(&target).ok().as_deref(), Some(b"first".as_slice()));

        assert!(write_atomic(&target, b"second").is_ok());
        assert_eq!(fs::read(&target).ok().as_deref(), Some(b"second".as_slice()));
    }
}
