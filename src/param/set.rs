use super::{ChoiceParameter, ParamError, Parameter, PathParameter};
use crate::command::{CommandLine, InputSource};
use crate::shared::{InvocationError, OptionKey};
use std::path::PathBuf;

/// Largest magnitude below which every integer converts to `f64` exactly.
const MAX_EXACT_DOUBLE_INT: u64 = 1 << 53;

#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    Double(f64),
    Text(String),
    Path(PathBuf),
}

impl ParamValue {
    fn type_name(&self) -> &'static str {
        match self {
            ParamValue::Bool(_) => "boolean",
            ParamValue::Int(_) => "integer",
            ParamValue::Double(_) => "double",
            ParamValue::Text(_) => "string",
            ParamValue::Path(_) => "path",
        }
    }
}

/// The closed set of option kinds a tool integration can expose.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolParameter {
    Flag(Parameter<bool>),
    Int(Parameter<i64>),
    Double(Parameter<f64>),
    Text(Parameter<String>),
    Choice(ChoiceParameter),
    Path(PathParameter),
}

impl ToolParameter {
    pub fn label(&self) -> &str {
        match self {
            ToolParameter::Flag(p) => p.label(),
            ToolParameter::Int(p) => p.label(),
            ToolParameter::Double(p) => p.label(),
            ToolParameter::Text(p) => p.label(),
            ToolParameter::Choice(p) => p.label(),
            ToolParameter::Path(p) => p.label(),
        }
    }

    pub fn current(&self) -> ParamValue {
        match self {
            ToolParameter::Flag(p) => ParamValue::Bool(*p.get()),
            ToolParameter::Int(p) => ParamValue::Int(*p.get()),
            ToolParameter::Double(p) => ParamValue::Double(*p.get()),
            ToolParameter::Text(p) => ParamValue::Text(p.get().clone()),
            ToolParameter::Choice(p) => ParamValue::Text(p.get().to_string()),
            ToolParameter::Path(p) => ParamValue::Path(p.get().to_path_buf()),
        }
    }

    pub fn set(&mut self, value: ParamValue) -> Result<(), ParamError> {
        match (self, value) {
            (ToolParameter::Flag(p), ParamValue::Bool(v)) => p.set(v),
            (ToolParameter::Int(p), ParamValue::Int(v)) => p.set(v),
            (ToolParameter::Double(p), ParamValue::Double(v)) => p.set(v),
            (ToolParameter::Double(p), ParamValue::Int(v)) => {
                if v.unsigned_abs() > MAX_EXACT_DOUBLE_INT {
                    return Err(ParamError::InvalidValue {
                        label: p.label().to_string(),
                        reason: format!("{v} cannot be represented exactly as a double"),
                    });
                }
                p.set(v as f64)
            }
            (ToolParameter::Text(p), ParamValue::Text(v)) => p.set(v),
            (ToolParameter::Choice(p), ParamValue::Text(v)) => p.set(v),
            (ToolParameter::Path(p), ParamValue::Path(v)) => p.set(v),
            (ToolParameter::Path(p), ParamValue::Text(v)) => p.set(v),
            (param, value) => Err(ParamError::InvalidValue {
                label: param.label().to_string(),
                reason: format!(
                    "expected {} value, got {}",
                    param.expected_type(),
                    value.type_name()
                ),
            }),
        }
    }

    /// Parses `raw` according to the parameter's kind, then validates it.
    pub fn set_from_str(&mut self, raw: &str) -> Result<(), ParamError> {
        let raw = raw.trim();
        let label = self.label().to_string();
        let invalid = |reason: String| ParamError::InvalidValue {
            label: label.clone(),
            reason,
        };
        let value = match &*self {
            ToolParameter::Flag(_) => match raw.to_ascii_lowercase().as_str() {
                "true" | "yes" | "on" | "1" => ParamValue::Bool(true),
                "false" | "no" | "off" | "0" => ParamValue::Bool(false),
                other => return Err(invalid(format!("`{other}` is not a boolean"))),
            },
            ToolParameter::Int(_) => raw
                .parse::<i64>()
                .map(ParamValue::Int)
                .map_err(|err| invalid(format!("`{raw}` is not an integer: {err}")))?,
            ToolParameter::Double(_) => raw
                .parse::<f64>()
                .map(ParamValue::Double)
                .map_err(|err| invalid(format!("`{raw}` is not a number: {err}")))?,
            ToolParameter::Text(_) | ToolParameter::Choice(_) => ParamValue::Text(raw.to_string()),
            ToolParameter::Path(_) => ParamValue::Path(PathBuf::from(raw)),
        };
        self.set(value)
    }

    fn expected_type(&self) -> &'static str {
        match self {
            ToolParameter::Flag(_) => "boolean",
            ToolParameter::Int(_) => "integer",
            ToolParameter::Double(_) => "double",
            ToolParameter::Text(_) | ToolParameter::Choice(_) => "string",
            ToolParameter::Path(_) => "path",
        }
    }

    /// Transfers the current value: booleans become conditional flags, paths
    /// become copied input files, everything else a key/value option.
    pub fn apply_to(
        &self,
        key: &OptionKey,
        command_line: &mut CommandLine,
    ) -> Result<(), InvocationError> {
        match self {
            ToolParameter::Flag(p) => {
                command_line.add_flag_if(key.as_str(), *p.get())?;
            }
            ToolParameter::Int(p) => {
                command_line.add_option(key.as_str(), p.get())?;
            }
            ToolParameter::Double(p) => {
                command_line.add_option(key.as_str(), p.get())?;
            }
            ToolParameter::Text(p) => {
                command_line.add_option(key.as_str(), p.get())?;
            }
            ToolParameter::Choice(p) => {
                command_line.add_option(key.as_str(), p.get())?;
            }
            ToolParameter::Path(p) => {
                command_line.add_input_file(key.as_str(), InputSource::Copy(p.get()))?;
            }
        }
        Ok(())
    }
}

/// Key-unique parameters kept in insertion order, which is also render order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParameterSet {
    entries: Vec<(OptionKey, ToolParameter)>,
}

impl ParameterSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: OptionKey, parameter: ToolParameter) -> Result<(), ParamError> {
        if self.get(key.as_str()).is_some() {
            return Err(ParamError::InvalidConfiguration {
                label: parameter.label().to_string(),
                reason: format!("duplicate parameter key `{key}`"),
            });
        }
        self.entries.push((key, parameter));
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&ToolParameter> {
        self.entries
            .iter()
            .find(|(k, _)| k.as_str() == key)
            .map(|(_, param)| param)
    }

    fn get_mut(&mut self, key: &str) -> Result<&mut ToolParameter, ParamError> {
        self.entries
            .iter_mut()
            .find(|(k, _)| k.as_str() == key)
            .map(|(_, param)| param)
            .ok_or_else(|| ParamError::UnknownParameter(key.to_string()))
    }

    pub fn set(&mut self, key: &str, value: ParamValue) -> Result<(), ParamError> {
        self.get_mut(key)?.set(value)
    }

    pub fn set_from_str(&mut self, key: &str, raw: &str) -> Result<(), ParamError> {
        self.get_mut(key)?.set_from_str(raw)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&OptionKey, &ToolParameter)> {
        self.entries.iter().map(|(key, param)| (key, param))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn apply_to(&self, command_line: &mut CommandLine) -> Result<(), InvocationError> {
        for (key, param) in &self.entries {
            param.apply_to(key, command_line)?;
        }
        Ok(())
    }
}
