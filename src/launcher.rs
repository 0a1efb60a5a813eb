//! Hands control to the external model server.
//!
//! A launch is single-shot: the scratch directory is created, the command
//! line is built, and the server either replaces this process or runs as a
//! waited-on child. Failures are fatal and never retried.

use chrono::Utc;
use std::path::Path;
use std::process::{Command, ExitStatus};
use tracing::warn;

use crate::config::{LaunchConfig, LaunchMode};
use crate::error::LaunchError;
use crate::events::{LaunchEvent, LaunchObserver};
use crate::invocation::{
    Invocation, build_invocation, create_scratch_dir, optional_flags, scratch_dir,
};

/// Creates the scratch directory and builds the invocation, reporting each step.
///
/// The scratch directory is kept for the server's lifetime.
pub fn prepare(
    config: &LaunchConfig,
    observer: &impl LaunchObserver,
) -> Result<Invocation, LaunchError> {
    report_start(config, observer);
    let ssl_dir = create_scratch_dir(&config.ssl_root)?;
    Ok(resolve(config, &ssl_dir, observer))
}

/// Builds the invocation a launch would use without leaving anything behind.
///
/// The scratch directory exists only while the invocation is built.
pub fn dry_run(
    config: &LaunchConfig,
    observer: &impl LaunchObserver,
) -> Result<Invocation, LaunchError> {
    report_start(config, observer);
    let ssl_dir = scratch_dir(&config.ssl_root)?;
    Ok(resolve(config, ssl_dir.path(), observer))
}

fn report_start(config: &LaunchConfig, observer: &impl LaunchObserver) {
    observer.on_event(&LaunchEvent::Starting {
        started_at: Utc::now(),
        launcher_version: env!("CARGO_PKG_VERSION").to_string(),
        interpreter: config.interpreter.clone(),
        working_dir: std::env::current_dir().ok(),
    });
}

fn resolve(config: &LaunchConfig, ssl_dir: &Path, observer: &impl LaunchObserver) -> Invocation {
    observer.on_event(&LaunchEvent::ScratchDirCreated {
        path: ssl_dir.to_path_buf(),
    });
    observer.on_event(&LaunchEvent::Resolved {
        flags: optional_flags(config),
        hf_token_present: config.hf_token.is_some(),
    });

    build_invocation(config, ssl_dir)
}

/// Runs the full launch. In replace mode this only returns on failure.
pub fn launch(config: &LaunchConfig, observer: &impl LaunchObserver) -> Result<i32, LaunchError> {
    let invocation = prepare(config, observer)?;
    hand_off(&invocation, config.mode, observer)
}

pub fn hand_off(
    invocation: &Invocation,
    mode: LaunchMode,
    observer: &impl LaunchObserver,
) -> Result<i32, LaunchError> {
    observer.on_event(&LaunchEvent::Handoff {
        mode,
        argv: invocation.argv(),
    });

    match mode {
        LaunchMode::Replace => replace_process(invocation, observer),
        LaunchMode::Supervise => run_supervised(invocation, observer),
    }
}

fn command(invocation: &Invocation) -> Command {
    let mut cmd = Command::new(&invocation.program);
    cmd.args(&invocation.args).envs(&invocation.env);
    cmd
}

#[cfg(unix)]
fn replace_process(
    invocation: &Invocation,
    _observer: &impl LaunchObserver,
) -> Result<i32, LaunchError> {
    use std::os::unix::process::CommandExt;

    let source = command(invocation).exec();
    Err(LaunchError::Exec {
        program: invocation.program.clone(),
        source,
    })
}

#[cfg(not(unix))]
fn replace_process(
    invocation: &Invocation,
    observer: &impl LaunchObserver,
) -> Result<i32, LaunchError> {
    warn!("Process replacement is unavailable on this platform, supervising instead");
    run_supervised(invocation, observer)
}

/// Spawns the server, waits for it, and returns the code to exit with.
pub fn run_supervised(
    invocation: &Invocation,
    observer: &impl LaunchObserver,
) -> Result<i32, LaunchError> {
    let status = command(invocation)
        .status()
        .map_err(|source| LaunchError::Spawn {
            program: invocation.program.clone(),
            source,
        })?;

    let code = exit_code_of(status);
    if code != 0 {
        warn!("Server exited with status {}", status);
    }
    observer.on_event(&LaunchEvent::ChildExited { code });
    Ok(code)
}

fn exit_code_of(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }

    1
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::events::MemoryObserver;
    use std::collections::{BTreeMap, HashMap};
    use std::io;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct LogBuffer(Arc<Mutex<Vec<u8>>>);

    impl io::Write for LogBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl LogBuffer {
        fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    fn shell(script: &str, env: &[(&str, &str)]) -> Invocation {
        Invocation {
            program: "sh".to_string(),
            args: vec!["-c".to_string(), script.to_string()],
            env: env
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<BTreeMap<_, _>>(),
        }
    }

    #[test]
    fn supervised_child_exit_code_is_forwarded() {
        let observer = MemoryObserver::new();
        let code = run_supervised(&shell("exit 3", &[]), &observer).unwrap();
        assert_eq!(code, 3);
        assert_eq!(observer.events(), vec![LaunchEvent::ChildExited { code: 3 }]);
    }

    #[test]
    fn child_env_receives_the_token() {
        let observer = MemoryObserver::new();
        let invocation = shell(r#"test "$HF_TOKEN" = "hf_xyz""#, &[("HF_TOKEN", "hf_xyz")]);
        assert_eq!(run_supervised(&invocation, &observer).unwrap(), 0);
    }

    #[test]
    fn signalled_child_maps_to_128_plus_signal() {
        let observer = MemoryObserver::new();
        let code = run_supervised(&shell("kill -9 $$", &[]), &observer).unwrap();
        assert_eq!(code, 128 + 9);
    }

    #[test]
    fn missing_binary_is_a_spawn_error() {
        let invocation = Invocation {
            program: "/nonexistent/personaplex-python".to_string(),
            args: Vec::new(),
            env: BTreeMap::new(),
        };
        let err = run_supervised(&invocation, &MemoryObserver::new()).unwrap_err();
        assert!(matches!(err, LaunchError::Spawn { .. }));
        assert_eq!(err.exit_code(), 127);
    }

    #[test]
    fn failed_exec_returns_instead_of_replacing() {
        let invocation = Invocation {
            program: "/nonexistent/personaplex-python".to_string(),
            args: Vec::new(),
            env: BTreeMap::new(),
        };
        let err = hand_off(&invocation, LaunchMode::Replace, &MemoryObserver::new()).unwrap_err();
        assert!(matches!(err, LaunchError::Exec { .. }));
        assert_eq!(err.exit_code(), 127);
    }

    #[test]
    fn failed_exec_is_left_to_the_caller_to_report() {
        let invocation = Invocation {
            program: "/nonexistent/personaplex-python".to_string(),
            args: Vec::new(),
            env: BTreeMap::new(),
        };
        let logs = LogBuffer::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .with_max_level(tracing::Level::TRACE)
            .with_writer(move || writer.clone())
            .finish();

        let result = tracing::subscriber::with_default(subscriber, || {
            hand_off(&invocation, LaunchMode::Replace, &MemoryObserver::new())
        });

        assert!(result.is_err());
        let output = logs.contents();
        assert!(!output.contains("ERROR"), "unexpected error log: {output}");
        assert!(!output.contains("personaplex-python"), "unexpected log: {output}");
    }

    #[test]
    fn supervised_launch_runs_end_to_end() {
        let root = tempfile::tempdir().unwrap();
        let mut vars: HashMap<&str, &str> = HashMap::new();
        vars.insert("SUPERVISE", "true");
        vars.insert("PYTHON_BIN", "true");
        let mut config = LaunchConfig::from_env(&vars);
        config.ssl_root = root.path().to_path_buf();

        let observer = MemoryObserver::new();
        let code = launch(&config, &observer).unwrap();
        assert_eq!(code, 0);

        let events = observer.events();
        let kinds: Vec<&str> = events
            .iter()
            .map(|e| match e {
                LaunchEvent::Starting { .. } => "starting",
                LaunchEvent::ScratchDirCreated { .. } => "scratch",
                LaunchEvent::Resolved { .. } => "resolved",
                LaunchEvent::Handoff { .. } => "handoff",
                LaunchEvent::ChildExited { .. } => "exited",
            })
            .collect();
        assert_eq!(kinds, vec!["starting", "scratch", "resolved", "handoff", "exited"]);

        match &events[1] {
            LaunchEvent::ScratchDirCreated { path } => assert!(path.is_dir()),
            other => panic!("unexpected event {other:?}"),
        }
    }
}
