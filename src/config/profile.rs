use super::{ConfigError, ParameterSpec};
use crate::command::{CommandLine, Executable};
use crate::invocation::ProcessInvocation;
use crate::param::ParameterSet;
use crate::sentinel::Sentinel;
use crate::shared::InvocationError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_POLL_INTERVAL_MS: u64 = 50;

fn default_poll_interval_ms() -> u64 {
    DEFAULT_POLL_INTERVAL_MS
}

/// How one external tool is launched and which options it exposes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ToolProfile {
    pub executable: String,
    #[serde(default)]
    pub working_directory: Option<PathBuf>,
    #[serde(default)]
    pub environment: BTreeMap<String, String>,
    #[serde(default)]
    pub temp_root: Option<PathBuf>,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default)]
    pub log_path: Option<PathBuf>,
    #[serde(default)]
    pub parameters: Vec<ParameterSpec>,
}

impl ToolProfile {
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml_str(&raw, &path.display().to_string())
    }

    pub fn from_yaml_str(raw: &str, origin: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(raw).map_err(|source| ConfigError::Parse {
            path: origin.to_string(),
            source,
        })
    }

    /// Checks everything that does not touch the filesystem.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.executable.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "executable must be non-empty".to_string(),
            ));
        }
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "poll_interval_ms must be greater than zero".to_string(),
            ));
        }
        if let Some(key) = self.environment.keys().find(|key| !is_env_name(key)) {
            return Err(ConfigError::Invalid(format!(
                "environment variable name `{key}` is invalid"
            )));
        }
        let mut seen = BTreeSet::new();
        for spec in &self.parameters {
            if !seen.insert(spec.key.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate parameter key `{}`",
                    spec.key
                )));
            }
            spec.build()?;
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn parameters(&self) -> Result<ParameterSet, ConfigError> {
        let mut set = ParameterSet::new();
        for spec in &self.parameters {
            set.insert(spec.key.clone(), spec.build()?)
                .map_err(|err| ConfigError::Invalid(err.to_string()))?;
        }
        Ok(set)
    }

    pub fn command_line(&self) -> Result<CommandLine, InvocationError> {
        let executable = Executable::resolve(&self.executable)?;
        let command_line = CommandLine::with_executable(executable);
        Ok(match &self.temp_root {
            Some(root) => command_line.with_temp_root(root),
            None => command_line,
        })
    }

    pub fn invocation<'s>(
        &self,
        command_line: CommandLine,
        sentinel: impl Sentinel + 's,
    ) -> ProcessInvocation<'s> {
        let mut invocation = ProcessInvocation::new(command_line)
            .with_sentinel(sentinel)
            .with_envs(self.environment.clone())
            .with_poll_interval(self.poll_interval());
        if let Some(dir) = &self.working_directory {
            invocation = invocation.with_working_directory(dir);
        }
        if let Some(path) = &self.log_path {
            invocation = invocation.with_log_path(path);
        }
        invocation
    }
}

fn is_env_name(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with(|ch: char| ch.is_ascii_digit())
        && name
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || ch == '_')
}

pub fn load_tool_profile(path: &Path) -> Result<ToolProfile, ConfigError> {
    let profile = ToolProfile::from_path(path)?;
    profile.validate()?;
    Ok(profile)
}
