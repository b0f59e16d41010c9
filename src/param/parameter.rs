use super::{Ordered, ParamError, Validator};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// A labelled value cell whose value always satisfies its validator.
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter<T> {
    label: String,
    value: T,
    validator: Option<Validator<T>>,
}

impl<T: Ordered> Parameter<T> {
    pub fn new(label: &str, value: T) -> Self {
        Self {
            label: label.to_string(),
            value,
            validator: None,
        }
    }

    pub fn with_validator(
        label: &str,
        value: T,
        validator: Validator<T>,
    ) -> Result<Self, ParamError> {
        validator
            .check(&value)
            .map_err(|reason| ParamError::InvalidConfiguration {
                label: label.to_string(),
                reason: format!("default {reason}"),
            })?;
        Ok(Self {
            label: label.to_string(),
            value,
            validator: Some(validator),
        })
    }

    pub fn bounded(label: &str, value: T, lower: T, upper: T) -> Result<Self, ParamError> {
        let validator =
            Validator::range(lower, upper).map_err(|reason| ParamError::InvalidConfiguration {
                label: label.to_string(),
                reason,
            })?;
        Self::with_validator(label, value, validator)
    }

    pub fn choice<I>(label: &str, value: T, options: I) -> Result<Self, ParamError>
    where
        I: IntoIterator<Item = T>,
    {
        let validator =
            Validator::one_of(options).map_err(|reason| ParamError::InvalidConfiguration {
                label: label.to_string(),
                reason,
            })?;
        Self::with_validator(label, value, validator)
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn get(&self) -> &T {
        &self.value
    }

    pub fn validator(&self) -> Option<&Validator<T>> {
        self.validator.as_ref()
    }

    pub fn validate(&self, candidate: &T) -> Result<(), ParamError> {
        let Some(validator) = &self.validator else {
            return Ok(());
        };
        validator
            .check(candidate)
            .map_err(|reason| ParamError::InvalidValue {
                label: self.label.clone(),
                reason,
            })
    }

    /// Replaces the value only if `value` validates; otherwise the old value stays.
    pub fn set(&mut self, value: T) -> Result<(), ParamError> {
        self.validate(&value)?;
        self.value = value;
        Ok(())
    }
}

/// A string drawn from a fixed, non-empty option set. The only constructor
/// requires the options, so a choice can never be left unconstrained.
#[derive(Debug, Clone, PartialEq)]
pub struct ChoiceParameter {
    inner: Parameter<String>,
}

impl ChoiceParameter {
    pub fn new<I, S>(
        label: &str,
        value: impl Into<String>,
        options: I,
    ) -> Result<Self, ParamError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let inner = Parameter::choice(label, value.into(), options.into_iter().map(Into::into))?;
        Ok(Self { inner })
    }

    pub fn label(&self) -> &str {
        self.inner.label()
    }

    pub fn get(&self) -> &str {
        self.inner.get()
    }

    pub fn options(&self) -> &[String] {
        self.inner
            .validator()
            .and_then(Validator::options)
            .unwrap_or(&[])
    }

    pub fn set(&mut self, value: impl Into<String>) -> Result<(), ParamError> {
        self.inner.set(value.into())
    }
}

/// A filesystem path restricted to a set of extensions. An empty set accepts any path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathParameter {
    label: String,
    value: PathBuf,
    extensions: BTreeSet<String>,
}

impl PathParameter {
    pub fn new<I, S>(
        label: &str,
        value: impl Into<PathBuf>,
        extensions: I,
    ) -> Result<Self, ParamError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let extensions = extensions
            .into_iter()
            .map(|ext| normalize_extension(ext.as_ref()))
            .filter(|ext| !ext.is_empty())
            .collect();
        let param = Self {
            label: label.to_string(),
            value: value.into(),
            extensions,
        };
        param
            .check(&param.value)
            .map_err(|reason| ParamError::InvalidConfiguration {
                label: label.to_string(),
                reason: format!("default {reason}"),
            })?;
        Ok(param)
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn get(&self) -> &Path {
        &self.value
    }

    pub fn extensions(&self) -> &BTreeSet<String> {
        &self.extensions
    }

    pub fn accepts(&self, path: &Path) -> bool {
        self.check(path).is_ok()
    }

    pub fn set(&mut self, value: impl Into<PathBuf>) -> Result<(), ParamError> {
        let value = value.into();
        self.check(&value)
            .map_err(|reason| ParamError::InvalidValue {
                label: self.label.clone(),
                reason,
            })?;
        self.value = value;
        Ok(())
    }

    fn check(&self, path: &Path) -> Result<(), String> {
        if path.as_os_str().is_empty() {
            return Err("path must be non-empty".to_string());
        }
        if self.extensions.is_empty() {
            return Ok(());
        }
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().to_ascii_lowercase())
            .unwrap_or_default();
        let matched = self
            .extensions
            .iter()
            .any(|ext| name.len() > ext.len() + 1 && name.ends_with(&format!(".{ext}")));
        if matched {
            return Ok(());
        }
        Err(format!(
            "{} does not have one of the extensions {:?}",
            path.display(),
            self.extensions
        ))
    }
}

fn normalize_extension(raw: &str) -> String {
    raw.trim().trim_start_matches('.').to_ascii_lowercase()
}
