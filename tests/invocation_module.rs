use serde_json::Value;
use std::cell::Cell;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};
use tempfile::tempdir;
use toolrun::command::InputSource;
use toolrun::{
    CancellationFlag, CommandLine, Deadline, ErrorKind, FailureCause, InvocationError,
    InvocationState, ProcessInvocation,
};

fn write_script(path: &Path, body: &str) {
    fs::write(path, body).expect("write script");
    let mut perms = fs::metadata(path).expect("metadata").permissions();
    perms.set_mode(0o755);
    fs::set_permissions(path, perms).expect("chmod");
}

fn scripted_command_line(dir: &Path, name: &str, body: &str) -> CommandLine {
    let bin = dir.join(name);
    write_script(&bin, body);
    let scratch = dir.join("scratch");
    fs::create_dir_all(&scratch).expect("scratch");
    CommandLine::new(&bin)
        .expect("command line")
        .with_temp_root(scratch)
}

#[test]
fn successful_run_invokes_extractor_once_with_outputs() {
    let dir = tempdir().expect("tempdir");
    let mut cmd = scripted_command_line(
        dir.path(),
        "copy-tool",
        "#!/bin/sh\n# usage: copy-tool -in IN -out OUT\ntr a-z A-Z < \"$2\" > \"$4\"\necho done\n",
    );
    cmd.add_input_file("-in", InputSource::text("acgt\n"))
        .expect("input");
    cmd.add_output_file("-out", Some("txt")).expect("output");

    let calls = Cell::new(0);
    let mut invocation = ProcessInvocation::new(cmd);
    let result = invocation
        .execute(|cmd, output| {
            calls.set(calls.get() + 1);
            assert_eq!(output.exit_code, 0);
            assert_eq!(output.stdout.trim(), "done");
            let out = cmd.get_file("-out")?;
            fs::read_to_string(out).map_err(|err| InvocationError::Extraction(err.to_string()))
        })
        .expect("run");

    assert_eq!(result, "ACGT\n");
    assert_eq!(calls.get(), 1);
    assert_eq!(invocation.state(), InvocationState::Completed);

    let managed = invocation.command_line().managed_paths();
    let report = invocation.close();
    assert!(report.is_clean());
    for path in managed {
        assert!(!path.exists());
    }
}

#[test]
fn non_zero_exit_skips_extractor_and_reports_exit_code() {
    let dir = tempdir().expect("tempdir");
    let cmd = scripted_command_line(dir.path(), "fail", "#!/bin/sh\necho 'boom' 1>&2\nexit 1\n");

    let calls = Cell::new(0);
    let mut invocation = ProcessInvocation::new(cmd);
    let err = invocation
        .execute(|_, _| {
            calls.set(calls.get() + 1);
            Ok(())
        })
        .expect_err("expected failure");

    assert_eq!(calls.get(), 0);
    assert_eq!(invocation.state(), InvocationState::Failed);
    assert_eq!(err.kind(), ErrorKind::Execution);
    assert_eq!(err.exit_code(), Some(1));
    match err {
        InvocationError::ExecutionFailed {
            cause, stderr, log, ..
        } => {
            assert_eq!(cause, FailureCause::NonZeroExit(1));
            assert_eq!(stderr.trim(), "boom");
            assert_eq!(log.exit_code, Some(1));
            assert!(!log.cancelled);
            assert!(log.command_form.contains("fail"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn unhappy_sentinel_kills_the_process() {
    let dir = tempdir().expect("tempdir");
    let mut cmd = scripted_command_line(
        dir.path(),
        "sleeper",
        "#!/bin/sh\necho $$ > \"$1\"\nexec sleep 30\n",
    );
    cmd.add_output_file("", Some("pid")).expect("pid file");

    let started = Instant::now();
    let mut invocation = ProcessInvocation::new(cmd)
        .with_sentinel(Deadline::after(Duration::from_millis(300)))
        .with_poll_interval(Duration::from_millis(10));
    let err = invocation
        .execute(|_, _| Ok(()))
        .expect_err("expected cancellation");

    assert!(started.elapsed() < Duration::from_secs(10));
    assert_eq!(invocation.state(), InvocationState::Cancelled);
    match &err {
        InvocationError::ExecutionFailed { cause, log, .. } => {
            assert_eq!(*cause, FailureCause::Cancelled);
            assert!(log.cancelled);
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(err.exit_code(), None);

    let pid_file = invocation.command_line().get_file("").expect("pid file");
    let pid = fs::read_to_string(pid_file).expect("read pid");
    let pid = pid.trim();
    assert!(!pid.is_empty());
    assert!(
        !Path::new(&format!("/proc/{pid}")).exists(),
        "process {pid} should be gone"
    );
}

#[test]
fn cancellation_flag_from_another_thread_stops_the_run() {
    let dir = tempdir().expect("tempdir");
    let cmd = scripted_command_line(dir.path(), "long", "#!/bin/sh\nexec sleep 30\n");

    let flag = CancellationFlag::new();
    let remote = flag.clone();
    let canceller = thread::spawn(move || {
        thread::sleep(Duration::from_millis(150));
        remote.cancel();
    });

    let started = Instant::now();
    let mut invocation = ProcessInvocation::new(cmd).with_sentinel(flag);
    let err = invocation.execute(|_, _| Ok(())).expect_err("cancelled");
    canceller.join().expect("join canceller");

    assert!(started.elapsed() < Duration::from_secs(10));
    assert_eq!(err.failure_cause(), Some(&FailureCause::Cancelled));
}

#[test]
fn sentinel_is_polled_while_running() {
    let dir = tempdir().expect("tempdir");
    let cmd = scripted_command_line(dir.path(), "short", "#!/bin/sh\nsleep 0.3\n");

    let polls = Cell::new(0_u32);
    let sentinel = || {
        polls.set(polls.get() + 1);
        true
    };
    let mut invocation = ProcessInvocation::new(cmd)
        .with_sentinel(sentinel)
        .with_poll_interval(Duration::from_millis(10));
    invocation.execute(|_, _| Ok(())).expect("run");

    assert!(polls.get() >= 2, "polled {} times", polls.get());
}

#[test]
fn invocation_is_single_use() {
    let dir = tempdir().expect("tempdir");
    let cmd = scripted_command_line(dir.path(), "ok", "#!/bin/sh\nexit 0\n");
    let mut invocation = ProcessInvocation::new(cmd);
    invocation.execute(|_, _| Ok(())).expect("first run");

    let err = invocation.execute(|_, _| Ok(())).expect_err("second run");
    assert!(matches!(err, InvocationError::AlreadyExecuted));
}

#[test]
fn environment_and_working_directory_are_passed_through() {
    let dir = tempdir().expect("tempdir");
    let workdir = dir.path().join("work");
    fs::create_dir_all(&workdir).expect("workdir");
    let cmd = scripted_command_line(
        dir.path(),
        "env-tool",
        "#!/bin/sh\necho \"$TOOL_MODE\"\npwd\n",
    );

    let mut invocation = ProcessInvocation::new(cmd)
        .with_env("TOOL_MODE", "fast")
        .with_working_directory(&workdir);
    let stdout = invocation
        .execute(|_, output| Ok(output.stdout.clone()))
        .expect("run");

    let mut lines = stdout.lines();
    assert_eq!(lines.next(), Some("fast"));
    let reported = lines.next().expect("pwd line");
    assert_eq!(
        fs::canonicalize(reported).expect("canonical reported"),
        fs::canonicalize(&workdir).expect("canonical workdir")
    );
}

#[test]
fn spawn_failure_is_execution_failed() {
    let dir = tempdir().expect("tempdir");
    let bin = dir.path().join("vanishing");
    write_script(&bin, "#!/bin/sh\nexit 0\n");
    let cmd = CommandLine::new(&bin).expect("command line");
    fs::remove_file(&bin).expect("remove executable");

    let mut invocation = ProcessInvocation::new(cmd);
    let err = invocation.execute(|_, _| Ok(())).expect_err("spawn failure");
    assert_eq!(err.kind(), ErrorKind::Execution);
    assert!(matches!(err.failure_cause(), Some(FailureCause::Spawn(_))));
    assert_eq!(invocation.state(), InvocationState::Failed);
}

#[test]
fn extractor_errors_propagate_and_close_still_cleans_up() {
    let dir = tempdir().expect("tempdir");
    let mut cmd = scripted_command_line(dir.path(), "ok", "#!/bin/sh\nexit 0\n");
    cmd.add_output_file("-o", None).expect("output");
    let out = cmd.get_file("-o").expect("o").to_path_buf();

    let mut invocation = ProcessInvocation::new(cmd);
    let err = invocation
        .execute(|_, _| -> Result<(), InvocationError> {
            Err(InvocationError::Extraction("no hits".to_string()))
        })
        .expect_err("extractor failure");
    assert!(matches!(err, InvocationError::Extraction(_)));
    assert_eq!(invocation.state(), InvocationState::Completed);

    invocation.close();
    assert!(!out.exists());
}

#[test]
fn close_without_execute_removes_temp_files() {
    let dir = tempdir().expect("tempdir");
    let mut cmd = scripted_command_line(dir.path(), "ok", "#!/bin/sh\nexit 0\n");
    cmd.add_input_file("-i", InputSource::text("x")).expect("input");
    let input = cmd.input_file("-i").expect("input").to_path_buf();

    let mut invocation = ProcessInvocation::new(cmd);
    assert_eq!(invocation.state(), InvocationState::Built);
    let report = invocation.close();
    assert_eq!(report.removed, vec![input.clone()]);
    assert!(!input.exists());
}

#[test]
fn execute_after_close_is_a_configuration_error_and_never_spawns() {
    let dir = tempdir().expect("tempdir");
    let marker = dir.path().join("ran");
    let body = format!("#!/bin/sh\ntouch {}\ncat \"$2\"\n", marker.display());
    let mut cmd = scripted_command_line(dir.path(), "reader", &body);
    cmd.add_input_file("-i", InputSource::text("x")).expect("input");

    let mut invocation = ProcessInvocation::new(cmd);
    invocation.close();
    let called = Cell::new(false);
    let err = invocation
        .execute(|_, _| {
            called.set(true);
            Ok(())
        })
        .expect_err("closed command line");

    match &err {
        InvocationError::InvalidConfiguration(message) => {
            assert!(message.contains("already closed"))
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(err.kind(), ErrorKind::Configuration);
    assert!(!called.get());
    assert!(!marker.exists());
    assert_eq!(invocation.state(), InvocationState::Built);
}

#[test]
fn invocation_events_are_logged_as_json_lines() {
    let dir = tempdir().expect("tempdir");
    let log_path = dir.path().join("logs/invocations.jsonl");
    let ok = scripted_command_line(dir.path(), "ok", "#!/bin/sh\nexit 0\n");
    let fail = scripted_command_line(dir.path(), "bad", "#!/bin/sh\nexit 4\n");

    let mut first = ProcessInvocation::new(ok).with_log_path(&log_path);
    first.execute(|_, _| Ok(())).expect("ok run");
    let mut second = ProcessInvocation::new(fail).with_log_path(&log_path);
    let _ = second.execute(|_, _| Ok(()));

    let raw = fs::read_to_string(&log_path).expect("read log");
    let events: Vec<Value> = raw
        .lines()
        .map(|line| serde_json::from_str(line).expect("json line"))
        .collect();
    let names: Vec<&str> = events
        .iter()
        .map(|event| event["event"].as_str().expect("event name"))
        .collect();
    assert_eq!(
        names,
        vec![
            "invocation.started",
            "invocation.completed",
            "invocation.started",
            "invocation.failed",
        ]
    );
    assert_eq!(events[1]["exit_code"], 0);
    assert_eq!(events[3]["exit_code"], 4);
    assert!(events[0]["pid"].as_u64().is_some());
}
