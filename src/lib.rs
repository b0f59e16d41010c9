pub mod command;
pub mod config;
pub mod invocation;
pub mod param;
pub mod sentinel;
pub mod shared;

pub use command::{CleanupReport, CommandLine, ContentWriter, Executable, InputSource};
pub use config::{load_tool_profile, ConfigError, ToolProfile};
pub use invocation::{InvocationLog, InvocationState, ProcessInvocation, ProcessOutput};
pub use param::{
    ChoiceParameter, ParamError, ParamValue, Parameter, ParameterSet, PathParameter, ToolParameter,
};
pub use sentinel::{AlwaysHappy, CancellationFlag, Deadline, Sentinel};
pub use shared::{ErrorKind, FailureCause, InvocationError};
