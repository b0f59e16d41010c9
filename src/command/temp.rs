use std::io;
use std::path::{Path, PathBuf};
use tempfile::{TempDir, TempPath};

pub(crate) const TEMP_PREFIX: &str = "toolrun-";

enum TempResource {
    File(TempPath),
    Dir(TempDir),
}

impl TempResource {
    fn path(&self) -> &Path {
        match self {
            TempResource::File(path) => &**path,
            TempResource::Dir(dir) => dir.path(),
        }
    }

    fn close(self) -> io::Result<()> {
        match self {
            TempResource::File(path) => path.close(),
            TempResource::Dir(dir) => dir.close(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanupFailure {
    pub path: PathBuf,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanupReport {
    pub removed: Vec<PathBuf>,
    pub failures: Vec<CleanupFailure>,
}

impl CleanupReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Owns every temp file and directory it hands out. Each one is removed
/// exactly once, by `close` or on drop.
#[derive(Default)]
pub struct TempArena {
    root: Option<PathBuf>,
    resources: Vec<TempResource>,
    closed: bool,
}

impl TempArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
            resources: Vec::new(),
            closed: false,
        }
    }

    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn create_file(&mut self, tag: &str, extension: Option<&str>) -> io::Result<PathBuf> {
        self.ensure_open()?;
        let prefix = format!("{TEMP_PREFIX}{tag}-");
        let suffix = extension
            .map(|ext| ext.trim().trim_start_matches('.'))
            .filter(|ext| !ext.is_empty())
            .map(|ext| format!(".{ext}"))
            .unwrap_or_default();
        let mut builder = tempfile::Builder::new();
        builder.prefix(&prefix).suffix(&suffix);
        let file = match &self.root {
            Some(root) => builder.tempfile_in(root)?,
            None => builder.tempfile()?,
        };
        let path = file.into_temp_path();
        let owned = path.to_path_buf();
        self.resources.push(TempResource::File(path));
        Ok(owned)
    }

    pub fn create_dir(&mut self, tag: &str, prefix: Option<&str>) -> io::Result<PathBuf> {
        self.ensure_open()?;
        let prefix = match prefix.map(str::trim).filter(|p| !p.is_empty()) {
            Some(custom) => format!("{custom}-"),
            None => format!("{TEMP_PREFIX}{tag}-"),
        };
        let mut builder = tempfile::Builder::new();
        builder.prefix(&prefix);
        let dir = match &self.root {
            Some(root) => builder.tempdir_in(root)?,
            None => builder.tempdir()?,
        };
        let owned = dir.path().to_path_buf();
        self.resources.push(TempResource::Dir(dir));
        Ok(owned)
    }

    pub fn paths(&self) -> Vec<PathBuf> {
        self.resources
            .iter()
            .map(|resource| resource.path().to_path_buf())
            .collect()
    }

    /// Attempts every removal even after a failure. Calling again is a no-op.
    pub fn close(&mut self) -> CleanupReport {
        self.closed = true;
        let mut report = CleanupReport::default();
        for resource in self.resources.drain(..) {
            let path = resource.path().to_path_buf();
            match resource.close() {
                Ok(()) => report.removed.push(path),
                Err(err) => report.failures.push(CleanupFailure {
                    path,
                    reason: err.to_string(),
                }),
            }
        }
        report
    }

    fn ensure_open(&self) -> io::Result<()> {
        if self.closed {
            return Err(io::Error::other("temp arena is already closed"));
        }
        Ok(())
    }
}

impl Drop for TempArena {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

impl std::fmt::Debug for TempArena {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TempArena")
            .field("root", &self.root)
            .field("resources", &self.paths())
            .field("closed", &self.closed)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn files_and_dirs_are_created_under_root_with_prefixes() {
        let root = tempdir().expect("tempdir");
        let mut arena = TempArena::with_root(root.path());

        let file = arena.create_file("out", Some(".pdb")).expect("file");
        let dir = arena.create_dir("outdir", Some("models")).expect("dir");

        assert!(file.is_file());
        assert!(dir.is_dir());
        assert_eq!(file.parent(), Some(root.path()));
        let file_name = file.file_name().expect("name").to_string_lossy().to_string();
        assert!(file_name.starts_with("toolrun-out-"));
        assert!(file_name.ends_with(".pdb"));
        let dir_name = dir.file_name().expect("name").to_string_lossy().to_string();
        assert!(dir_name.starts_with("models-"));
    }

    #[test]
    fn close_removes_everything_and_is_idempotent() {
        let root = tempdir().expect("tempdir");
        let mut arena = TempArena::with_root(root.path());
        let a = arena.create_file("a", None).expect("a");
        let b = arena.create_dir("b", None).expect("b");
        fs::write(b.join("inner.txt"), "x").expect("inner");

        let report = arena.close();
        assert!(report.is_clean());
        assert_eq!(report.removed, vec![a.clone(), b.clone()]);
        assert!(!a.exists());
        assert!(!b.exists());

        let again = arena.close();
        assert!(again.removed.is_empty());
        assert!(again.failures.is_empty());
        assert!(arena.create_file("c", None).is_err());
    }

    #[test]
    fn a_failed_removal_does_not_stop_the_rest() {
        let root = tempdir().expect("tempdir");
        let mut arena = TempArena::with_root(root.path());
        let first = arena.create_file("first", None).expect("first");
        let gone = arena.create_file("gone", None).expect("gone");
        let last = arena.create_dir("last", None).expect("last");
        fs::remove_file(&gone).expect("remove out from under the arena");

        let report = arena.close();
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].path, gone);
        assert!(!first.exists());
        assert!(!last.exists());
    }

    #[test]
    fn drop_cleans_up() {
        let root = tempdir().expect("tempdir");
        let path = {
            let mut arena = TempArena::with_root(root.path());
            arena.create_file("dropped", None).expect("file")
        };
        assert!(!path.exists());
    }
}
