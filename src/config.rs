pub mod parameter_spec;
pub mod profile;

pub use parameter_spec::{ParameterKind, ParameterSpec};
pub use profile::{load_tool_profile, ToolProfile, DEFAULT_POLL_INTERVAL_MS};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid yaml in {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("tool profile validation failed: {0}")]
    Invalid(String),
}
