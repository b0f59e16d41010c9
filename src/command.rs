pub mod executable;
pub mod input;
pub mod temp;

pub use executable::Executable;
pub use input::{ContentWriter, InputSource, WriteWith};
pub use temp::{CleanupFailure, CleanupReport, TempArena};

use crate::shared::{io_error, InvocationError, OptionKey, OptionValue};
use std::ffi::OsString;
use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Argument {
    Flag(OptionKey),
    KeyValue(OptionKey, OptionValue),
}

/// `key` is `None` for positional file arguments registered under `""`.
#[derive(Debug, Clone, PartialEq, Eq)]
struct FileArgument {
    key: Option<OptionKey>,
    path: PathBuf,
}

impl FileArgument {
    fn matches(&self, key: &str) -> bool {
        match &self.key {
            Some(own) => own.as_str() == key,
            None => key.is_empty(),
        }
    }
}

/// Builds the argument vector for one tool run and owns the temp files
/// backing its file arguments.
///
/// Rendering order is: executable, flags and options in call order, input
/// files in call order, output files in call order.
#[derive(Debug)]
pub struct CommandLine {
    executable: Executable,
    arguments: Vec<Argument>,
    inputs: Vec<FileArgument>,
    outputs: Vec<FileArgument>,
    arena: TempArena,
}

impl CommandLine {
    pub fn new(executable: impl AsRef<Path>) -> Result<Self, InvocationError> {
        Ok(Self::with_executable(Executable::from_path(executable)?))
    }

    pub fn with_executable(executable: Executable) -> Self {
        Self {
            executable,
            arguments: Vec::new(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            arena: TempArena::new(),
        }
    }

    /// Must be called before any file argument is added.
    pub fn with_temp_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.arena = TempArena::with_root(root);
        self
    }

    pub fn executable(&self) -> &Executable {
        &self.executable
    }

    pub fn add_flag(&mut self, key: &str) -> Result<&mut Self, InvocationError> {
        let key = parse_key(key)?;
        self.arguments.push(Argument::Flag(key));
        Ok(self)
    }

    /// The key is validated even when `present` is false.
    pub fn add_flag_if(&mut self, key: &str, present: bool) -> Result<&mut Self, InvocationError> {
        let key = parse_key(key)?;
        if present {
            self.arguments.push(Argument::Flag(key));
        }
        Ok(self)
    }

    pub fn add_option<V: ToString>(
        &mut self,
        key: &str,
        value: V,
    ) -> Result<&mut Self, InvocationError> {
        let parsed_key = parse_key(key)?;
        let raw = value.to_string();
        let value = OptionValue::parse(&raw).map_err(|reason| InvocationError::InvalidValue {
            key: key.to_string(),
            value: raw.clone(),
            reason,
        })?;
        self.arguments.push(Argument::KeyValue(parsed_key, value));
        Ok(self)
    }

    pub fn add_input_file(
        &mut self,
        key: &str,
        source: InputSource<'_>,
    ) -> Result<&mut Self, InvocationError> {
        reject_separator(key, source.extension(), "file extension")?;
        let key = parse_file_key(key)?;
        self.ensure_open()?;
        if let InputSource::Copy(original) = &source {
            check_input_source(original)?;
        }

        let tag = file_tag(&key, "in");
        let path = self
            .arena
            .create_file(&tag, source.extension())
            .map_err(|err| io_error(&self.temp_location(), err))?;
        populate_input(&path, &source)?;
        self.inputs.push(FileArgument { key, path });
        Ok(self)
    }

    pub fn add_input_copy(
        &mut self,
        key: &str,
        original: impl AsRef<Path>,
    ) -> Result<&mut Self, InvocationError> {
        self.add_input_file(key, InputSource::Copy(original.as_ref()))
    }

    pub fn add_input_content(
        &mut self,
        key: &str,
        writer: &dyn ContentWriter,
        extension: Option<&str>,
    ) -> Result<&mut Self, InvocationError> {
        self.add_input_file(key, InputSource::Content { writer, extension })
    }

    pub fn add_output_file(
        &mut self,
        key: &str,
        extension: Option<&str>,
    ) -> Result<&mut Self, InvocationError> {
        reject_separator(key, extension, "file extension")?;
        let key = self.parse_output_key(key)?;
        let tag = file_tag(&key, "out");
        let path = self
            .arena
            .create_file(&tag, extension)
            .map_err(|err| io_error(&self.temp_location(), err))?;
        self.outputs.push(FileArgument { key, path });
        Ok(self)
    }

    pub fn add_output_directory(
        &mut self,
        key: &str,
        prefix: Option<&str>,
    ) -> Result<&mut Self, InvocationError> {
        reject_separator(key, prefix, "directory prefix")?;
        let key = self.parse_output_key(key)?;
        let tag = file_tag(&key, "outdir");
        let path = self
            .arena
            .create_dir(&tag, prefix)
            .map_err(|err| io_error(&self.temp_location(), err))?;
        self.outputs.push(FileArgument { key, path });
        Ok(self)
    }

    /// Looks up an output file or directory; `""` names the positional output.
    pub fn get_file(&self, key: &str) -> Result<&Path, InvocationError> {
        self.outputs
            .iter()
            .find(|output| output.matches(key))
            .map(|output| output.path.as_path())
            .ok_or_else(|| InvocationError::NotFound(key.to_string()))
    }

    /// First input registered under `key`.
    pub fn input_file(&self, key: &str) -> Option<&Path> {
        self.inputs
            .iter()
            .find(|input| input.matches(key))
            .map(|input| input.path.as_path())
    }

    pub fn managed_paths(&self) -> Vec<PathBuf> {
        self.arena.paths()
    }

    pub fn render(&self) -> Vec<OsString> {
        let mut tokens = vec![self.executable.path().as_os_str().to_os_string()];
        tokens.extend(self.args());
        tokens
    }

    /// Everything after the executable.
    pub fn args(&self) -> Vec<OsString> {
        let mut tokens = Vec::new();
        for argument in &self.arguments {
            match argument {
                Argument::Flag(key) => tokens.push(OsString::from(key.as_str())),
                Argument::KeyValue(key, value) => {
                    tokens.push(OsString::from(key.as_str()));
                    tokens.push(OsString::from(value.as_str()));
                }
            }
        }
        for file in self.inputs.iter().chain(&self.outputs) {
            if let Some(key) = &file.key {
                tokens.push(OsString::from(key.as_str()));
            }
            tokens.push(file.path.as_os_str().to_os_string());
        }
        tokens
    }

    /// Single-space join of `render()`, for logs.
    pub fn command_form(&self) -> String {
        self.render()
            .iter()
            .map(|token| token.to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn is_closed(&self) -> bool {
        self.arena.is_closed()
    }

    /// Removes every temp file and directory this command line created.
    /// Failures are reported, never raised; later paths are still attempted.
    pub fn close(&mut self) -> CleanupReport {
        self.arena.close()
    }

    fn parse_output_key(&self, key: &str) -> Result<Option<OptionKey>, InvocationError> {
        let parsed = parse_file_key(key)?;
        self.ensure_open()?;
        if self.outputs.iter().any(|output| output.key == parsed) {
            return Err(InvocationError::DuplicateKey(key.to_string()));
        }
        Ok(parsed)
    }

    fn ensure_open(&self) -> Result<(), InvocationError> {
        if self.arena.is_closed() {
            return Err(InvocationError::InvalidConfiguration(
                "command line is already closed".to_string(),
            ));
        }
        Ok(())
    }

    fn temp_location(&self) -> PathBuf {
        self.arena
            .root()
            .map(Path::to_path_buf)
            .unwrap_or_else(std::env::temp_dir)
    }
}

fn parse_key(key: &str) -> Result<OptionKey, InvocationError> {
    OptionKey::parse(key).map_err(|reason| InvocationError::InvalidOption {
        key: key.to_string(),
        reason,
    })
}

fn parse_file_key(key: &str) -> Result<Option<OptionKey>, InvocationError> {
    if key.is_empty() {
        return Ok(None);
    }
    parse_key(key).map(Some)
}

fn file_tag(key: &Option<OptionKey>, fallback: &str) -> String {
    key.as_ref()
        .map(|key| key.as_str().trim_start_matches('-').to_string())
        .unwrap_or_else(|| fallback.to_string())
}

/// Temp names are built from these parts, so a separator would leave the temp root.
fn reject_separator(key: &str, part: Option<&str>, what: &str) -> Result<(), InvocationError> {
    match part {
        Some(value) if value.contains(['/', std::path::MAIN_SEPARATOR]) => {
            Err(InvocationError::InvalidValue {
                key: key.to_string(),
                value: value.to_string(),
                reason: format!("{what} must not contain a path separator"),
            })
        }
        _ => Ok(()),
    }
}

fn check_input_source(original: &Path) -> Result<(), InvocationError> {
    let metadata = fs::metadata(original).map_err(|err| InvocationError::InvalidInput {
        path: original.display().to_string(),
        reason: format!("not accessible: {err}"),
    })?;
    if !metadata.is_file() {
        return Err(InvocationError::InvalidInput {
            path: original.display().to_string(),
            reason: "not a regular file".to_string(),
        });
    }
    Ok(())
}

fn populate_input(path: &Path, source: &InputSource<'_>) -> Result<(), InvocationError> {
    match source {
        InputSource::Copy(original) => {
            fs::copy(original, path).map_err(|err| io_error(original, err))?;
        }
        InputSource::Text { content, .. } => {
            fs::write(path, content).map_err(|err| io_error(path, err))?;
        }
        InputSource::Content { writer, .. } => {
            let file = fs::File::create(path).map_err(|err| io_error(path, err))?;
            let mut sink = BufWriter::new(file);
            writer
                .write_content(&mut sink)
                .map_err(|err| io_error(path, err))?;
            sink.flush().map_err(|err| io_error(path, err))?;
        }
    }
    Ok(())
}
