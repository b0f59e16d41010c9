use super::ConfigError;
use crate::param::{ChoiceParameter, Parameter, PathParameter, ToolParameter};
use crate::shared::OptionKey;
use serde::{Deserialize, Serialize};
use serde_yaml::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterKind {
    #[serde(alias = "bool", alias = "boolean")]
    Flag,
    #[serde(alias = "integer")]
    Int,
    #[serde(alias = "float")]
    Double,
    #[serde(alias = "string")]
    Text,
    Choice,
    Path,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ParameterSpec {
    pub key: OptionKey,
    #[serde(rename = "type")]
    pub kind: ParameterKind,
    #[serde(default)]
    pub label: Option<String>,
    pub default: Value,
    #[serde(default)]
    pub lower: Option<Value>,
    #[serde(default)]
    pub upper: Option<Value>,
    #[serde(default)]
    pub options: Vec<String>,
    #[serde(default)]
    pub extensions: Vec<String>,
}

impl ParameterSpec {
    pub fn label(&self) -> &str {
        self.label.as_deref().unwrap_or(self.key.as_str())
    }

    pub fn build(&self) -> Result<ToolParameter, ConfigError> {
        let label = self.label();
        let invalid =
            |reason: String| ConfigError::Invalid(format!("parameter `{}`: {reason}", self.key));
        let param = match self.kind {
            ParameterKind::Flag => {
                self.reject_bounds()?;
                let value = self
                    .default
                    .as_bool()
                    .ok_or_else(|| invalid("default must be a boolean".to_string()))?;
                ToolParameter::Flag(Parameter::new(label, value))
            }
            ParameterKind::Int => {
                let value = self
                    .default
                    .as_i64()
                    .ok_or_else(|| invalid("default must be an integer".to_string()))?;
                let bounds = self.bounds(Value::as_i64, "an integer")?;
                match bounds {
                    Some((lower, upper)) => ToolParameter::Int(
                        Parameter::bounded(label, value, lower, upper)
                            .map_err(|err| invalid(err.to_string()))?,
                    ),
                    None => ToolParameter::Int(Parameter::new(label, value)),
                }
            }
            ParameterKind::Double => {
                let value = self
                    .default
                    .as_f64()
                    .ok_or_else(|| invalid("default must be a number".to_string()))?;
                let bounds = self.bounds(Value::as_f64, "a number")?;
                match bounds {
                    Some((lower, upper)) => ToolParameter::Double(
                        Parameter::bounded(label, value, lower, upper)
                            .map_err(|err| invalid(err.to_string()))?,
                    ),
                    None => ToolParameter::Double(Parameter::new(label, value)),
                }
            }
            ParameterKind::Text => {
                self.reject_bounds()?;
                let value = self.default_string()?;
                ToolParameter::Text(Parameter::new(label, value))
            }
            ParameterKind::Choice => {
                self.reject_bounds()?;
                let value = self.default_string()?;
                ToolParameter::Choice(
                    ChoiceParameter::new(label, value, &self.options)
                        .map_err(|err| invalid(err.to_string()))?,
                )
            }
            ParameterKind::Path => {
                self.reject_bounds()?;
                let value = self.default_string()?;
                ToolParameter::Path(
                    PathParameter::new(label, value, &self.extensions)
                        .map_err(|err| invalid(err.to_string()))?,
                )
            }
        };
        Ok(param)
    }

    fn bounds<T>(
        &self,
        convert: fn(&Value) -> Option<T>,
        kind: &str,
    ) -> Result<Option<(T, T)>, ConfigError> {
        match (&self.lower, &self.upper) {
            (None, None) => Ok(None),
            (Some(lower), Some(upper)) => {
                let lower = convert(lower).ok_or_else(|| {
                    ConfigError::Invalid(format!("parameter `{}`: lower must be {kind}", self.key))
                })?;
                let upper = convert(upper).ok_or_else(|| {
                    ConfigError::Invalid(format!("parameter `{}`: upper must be {kind}", self.key))
                })?;
                Ok(Some((lower, upper)))
            }
            _ => Err(ConfigError::Invalid(format!(
                "parameter `{}`: bounds require both lower and upper",
                self.key
            ))),
        }
    }

    fn reject_bounds(&self) -> Result<(), ConfigError> {
        if self.lower.is_some() || self.upper.is_some() {
            return Err(ConfigError::Invalid(format!(
                "parameter `{}`: lower/upper only apply to int and double parameters",
                self.key
            )));
        }
        Ok(())
    }

    fn default_string(&self) -> Result<String, ConfigError> {
        match &self.default {
            Value::String(value) => Ok(value.clone()),
            Value::Number(value) => Ok(value.to_string()),
            _ => Err(ConfigError::Invalid(format!(
                "parameter `{}`: default must be a string",
                self.key
            ))),
        }
    }
}
