use crate::command::{CleanupReport, CommandLine};
use crate::sentinel::{AlwaysHappy, Sentinel};
use crate::shared::logging::append_invocation_event;
use crate::shared::{io_error, FailureCause, InvocationError};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvocationState {
    Built,
    Running,
    Cancelled,
    Completed,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InvocationLog {
    pub program: String,
    pub command_form: String,
    pub working_directory: Option<PathBuf>,
    pub exit_code: Option<i32>,
    pub cancelled: bool,
    pub duration_ms: u64,
}

/// What the result extractor sees once the process exited with status 0.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub duration: Duration,
}

/// One external-process run over a `CommandLine`, polled against a `Sentinel`.
///
/// Single use: a second `execute` fails with `AlreadyExecuted`. Temp files are
/// removed by `close`, or when the invocation is dropped.
pub struct ProcessInvocation<'s> {
    command_line: CommandLine,
    sentinel: Box<dyn Sentinel + 's>,
    working_directory: Option<PathBuf>,
    env_overrides: BTreeMap<String, String>,
    poll_interval: Duration,
    log_path: Option<PathBuf>,
    state: InvocationState,
}

impl<'s> ProcessInvocation<'s> {
    pub fn new(command_line: CommandLine) -> Self {
        Self {
            command_line,
            sentinel: Box::new(AlwaysHappy),
            working_directory: None,
            env_overrides: BTreeMap::new(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            log_path: None,
            state: InvocationState::Built,
        }
    }

    pub fn with_sentinel(mut self, sentinel: impl Sentinel + 's) -> Self {
        self.sentinel = Box::new(sentinel);
        self
    }

    pub fn with_working_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_directory = Some(dir.into());
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env_overrides.insert(key.into(), value.into());
        self
    }

    pub fn with_envs(mut self, vars: BTreeMap<String, String>) -> Self {
        self.env_overrides.extend(vars);
        self
    }

    /// Zero is bumped to one millisecond.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval.max(Duration::from_millis(1));
        self
    }

    pub fn with_log_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_path = Some(path.into());
        self
    }

    pub fn state(&self) -> InvocationState {
        self.state
    }

    pub fn command_line(&self) -> &CommandLine {
        &self.command_line
    }

    pub fn command_line_mut(&mut self) -> &mut CommandLine {
        &mut self.command_line
    }

    /// Spawns the process, polls the sentinel until exit, and hands the
    /// finished command line to `extract` only on exit status 0.
    pub fn execute<T, F>(&mut self, extract: F) -> Result<T, InvocationError>
    where
        F: FnOnce(&CommandLine, &ProcessOutput) -> Result<T, InvocationError>,
    {
        if self.state != InvocationState::Built {
            return Err(InvocationError::AlreadyExecuted);
        }
        if self.command_line.is_closed() {
            return Err(InvocationError::InvalidConfiguration(
                "command line is already closed".to_string(),
            ));
        }

        let program = self.command_line.executable().path().to_path_buf();
        let mut base_log = InvocationLog {
            program: program.display().to_string(),
            command_form: self.command_line.command_form(),
            working_directory: self.working_directory.clone(),
            exit_code: None,
            cancelled: false,
            duration_ms: 0,
        };

        let mut command = Command::new(&program);
        command
            .args(self.command_line.args())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = &self.working_directory {
            command.current_dir(dir);
        }
        for (k, v) in &self.env_overrides {
            command.env(k, v);
        }

        let start = Instant::now();
        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(err) => {
                self.state = InvocationState::Failed;
                let reason = Value::from(err.to_string());
                self.record("invocation.failed", &base_log, &[("reason", reason)]);
                return Err(InvocationError::ExecutionFailed {
                    program: base_log.program.clone(),
                    cause: FailureCause::Spawn(err.to_string()),
                    stderr: String::new(),
                    log: Box::new(base_log),
                });
            }
        };
        self.state = InvocationState::Running;
        let pid = Value::from(child.id());
        self.record("invocation.started", &base_log, &[("pid", pid)]);

        let stdout_reader = spawn_reader(child.stdout.take());
        let stderr_reader = spawn_reader(child.stderr.take());

        let waited = self.wait_with_sentinel(&mut child);
        base_log.duration_ms = start.elapsed().as_millis() as u64;

        let (status, cancelled) = match waited {
            Ok(result) => result,
            Err(err) => {
                self.state = InvocationState::Failed;
                let reason = Value::from(err.to_string());
                self.record("invocation.failed", &base_log, &[("reason", reason)]);
                return Err(io_error(&program, err));
            }
        };
        base_log.exit_code = status.code();
        base_log.cancelled = cancelled;

        // Grandchildren of a killed tool may still hold the pipes open, so the
        // readers are left to finish on their own.
        if cancelled {
            self.state = InvocationState::Cancelled;
            self.record("invocation.cancelled", &base_log, &[]);
            return Err(InvocationError::ExecutionFailed {
                program: base_log.program.clone(),
                cause: FailureCause::Cancelled,
                stderr: String::new(),
                log: Box::new(base_log),
            });
        }

        let stdout = stdout_reader.join().unwrap_or_default();
        let stderr = stderr_reader.join().unwrap_or_default();

        if !status.success() {
            self.state = InvocationState::Failed;
            let captured = Value::from(stderr.clone());
            self.record("invocation.failed", &base_log, &[("stderr", captured)]);
            let cause = match status.code() {
                Some(code) => FailureCause::NonZeroExit(code),
                None => FailureCause::Signalled,
            };
            return Err(InvocationError::ExecutionFailed {
                program: base_log.program.clone(),
                cause,
                stderr,
                log: Box::new(base_log),
            });
        }

        self.state = InvocationState::Completed;
        self.record("invocation.completed", &base_log, &[]);
        let output = ProcessOutput {
            exit_code: status.code().unwrap_or(0),
            stdout,
            stderr,
            duration: start.elapsed(),
        };
        extract(&self.command_line, &output)
    }

    /// Forwards to the command line; safe in any state, and more than once.
    pub fn close(&mut self) -> CleanupReport {
        let report = self.command_line.close();
        if let Some(path) = &self.log_path {
            for failure in &report.failures {
                let _ = append_invocation_event(
                    path,
                    "command_line.cleanup_failed",
                    &[
                        ("path", Value::from(failure.path.display().to_string())),
                        ("reason", Value::from(failure.reason.clone())),
                    ],
                );
            }
        }
        report
    }

    /// Checks the sentinel before every poll interval; the first unhappy answer
    /// kills the child, which is then reaped like a normal exit.
    fn wait_with_sentinel(&self, child: &mut Child) -> std::io::Result<(ExitStatus, bool)> {
        loop {
            match child.try_wait() {
                Ok(Some(status)) => return Ok((status, false)),
                Ok(None) => {
                    if !self.sentinel.is_happy() {
                        let _ = child.kill();
                        let status = child.wait()?;
                        return Ok((status, true));
                    }
                    thread::sleep(self.poll_interval);
                }
                Err(err) => {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(err);
                }
            }
        }
    }

    fn record(&self, event: &str, log: &InvocationLog, extra: &[(&str, Value)]) {
        let Some(path) = &self.log_path else {
            return;
        };
        let Ok(Value::Object(map)) = serde_json::to_value(log) else {
            return;
        };
        let mut fields: Vec<(&str, Value)> = map
            .iter()
            .map(|(key, value)| (key.as_str(), value.clone()))
            .collect();
        fields.extend(extra.iter().cloned());
        let _ = append_invocation_event(path, event, &fields);
    }

    pub fn log_path(&self) -> Option<&Path> {
        self.log_path.as_deref()
    }
}

fn spawn_reader<R>(stream: Option<R>) -> JoinHandle<String>
where
    R: Read + Send + 'static,
{
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(stream) = stream {
            let mut reader = BufReader::new(stream);
            let _ = reader.read_to_end(&mut buf);
        }
        String::from_utf8_lossy(&buf).into_owned()
    })
}
