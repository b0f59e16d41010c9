use crate::shared::InvocationError;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Executable {
    path: PathBuf,
}

impl Executable {
    /// Accepts only an existing regular file with an executable bit set.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, InvocationError> {
        let path = path.as_ref();
        let metadata = fs::metadata(path).map_err(|err| {
            InvocationError::InvalidConfiguration(format!(
                "executable {} is not accessible: {err}",
                path.display()
            ))
        })?;
        if !metadata.is_file() {
            return Err(InvocationError::InvalidConfiguration(format!(
                "executable {} is not a regular file",
                path.display()
            )));
        }
        if !is_executable(&metadata) {
            return Err(InvocationError::InvalidConfiguration(format!(
                "executable {} is not executable",
                path.display()
            )));
        }
        Ok(Self {
            path: path.to_path_buf(),
        })
    }

    /// Bare program names are looked up on `PATH`; anything with a separator is
    /// treated as a path.
    pub fn resolve(program: &str) -> Result<Self, InvocationError> {
        let program = program.trim();
        if program.is_empty() {
            return Err(InvocationError::InvalidConfiguration(
                "executable must be non-empty".to_string(),
            ));
        }
        if Path::new(program).components().count() > 1 {
            return Self::from_path(program);
        }
        let found = which::which(program).map_err(|err| {
            InvocationError::InvalidConfiguration(format!(
                "executable `{program}` not found on PATH: {err}"
            ))
        })?;
        Self::from_path(found)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(unix)]
fn is_executable(metadata: &fs::Metadata) -> bool {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode() & 0o111 != 0
}

#[cfg(not(unix))]
fn is_executable(_metadata: &fs::Metadata) -> bool {
    true
}
