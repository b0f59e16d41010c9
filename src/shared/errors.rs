use crate::config::ConfigError;
use crate::invocation::InvocationLog;
use crate::param::ParamError;
use std::path::Path;

/// Coarse classification integrations branch on: re-prompt for parameters,
/// re-prompt for inputs, or report a tool failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    Input,
    Execution,
    Io,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureCause {
    NonZeroExit(i32),
    Signalled,
    Cancelled,
    Spawn(String),
}

impl std::fmt::Display for FailureCause {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureCause::NonZeroExit(code) => write!(f, "exit code {code}"),
            FailureCause::Signalled => write!(f, "terminated by signal"),
            FailureCause::Cancelled => write!(f, "cancelled"),
            FailureCause::Spawn(reason) => write!(f, "spawn failed: {reason}"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum InvocationError {
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
    #[error("invalid option key `{key}`: {reason}")]
    InvalidOption { key: String, reason: String },
    #[error("invalid value `{value}` for `{key}`: {reason}")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },
    #[error("invalid input file {path}: {reason}")]
    InvalidInput { path: String, reason: String },
    #[error("no output registered under key `{0}`")]
    NotFound(String),
    #[error("output key `{0}` is already registered")]
    DuplicateKey(String),
    #[error("invocation has already been executed")]
    AlreadyExecuted,
    #[error("execution of {program} failed: {cause}")]
    ExecutionFailed {
        program: String,
        cause: FailureCause,
        stderr: String,
        log: Box<InvocationLog>,
    },
    #[error("result extraction failed: {0}")]
    Extraction(String),
    #[error("io error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Parameter(#[from] ParamError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl InvocationError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            InvocationError::InvalidConfiguration(_)
            | InvocationError::InvalidOption { .. }
            | InvocationError::InvalidValue { .. }
            | InvocationError::DuplicateKey(_)
            | InvocationError::AlreadyExecuted
            | InvocationError::Parameter(_)
            | InvocationError::Config(_) => ErrorKind::Configuration,
            InvocationError::InvalidInput { .. } | InvocationError::NotFound(_) => {
                ErrorKind::Input
            }
            InvocationError::ExecutionFailed { .. } | InvocationError::Extraction(_) => {
                ErrorKind::Execution
            }
            InvocationError::Io { .. } => ErrorKind::Io,
        }
    }

    pub fn failure_cause(&self) -> Option<&FailureCause> {
        match self {
            InvocationError::ExecutionFailed { cause, .. } => Some(cause),
            _ => None,
        }
    }

    pub fn exit_code(&self) -> Option<i32> {
        match self.failure_cause() {
            Some(FailureCause::NonZeroExit(code)) => Some(*code),
            _ => None,
        }
    }
}

pub fn io_error(path: &Path, source: std::io::Error) -> InvocationError {
    InvocationError::Io {
        path: path.display().to_string(),
        source,
    }
}
