pub mod errors;
pub mod logging;
pub mod tokens;

pub use errors::{io_error, ErrorKind, FailureCause, InvocationError};
pub use tokens::{validate_option_key, validate_option_value, OptionKey, OptionValue};
