pub mod parameter;
pub mod set;
pub mod validator;

pub use parameter::{ChoiceParameter, Parameter, PathParameter};
pub use set::{ParamValue, ParameterSet, ToolParameter};
pub use validator::{Ordered, Validator};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParamError {
    #[error("invalid value for parameter `{label}`: {reason}")]
    InvalidValue { label: String, reason: String },
    #[error("invalid configuration for parameter `{label}`: {reason}")]
    InvalidConfiguration { label: String, reason: String },
    #[error("unknown parameter `{0}`")]
    UnknownParameter(String),
}
