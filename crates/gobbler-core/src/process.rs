//! Child process gobbling.
//!
//! A child whose stdout or stderr pipe fills up blocks until someone reads
//! it. [`GobbledProcess`] spawns a child with both streams piped and drains
//! each on its own thread, so the child never stalls while listeners see
//! its output as it is produced:
//!
//! - `gobble-stdout` runs a [`Gobbler`] over stdout
//! - `gobble-stderr` runs a [`Gobbler`] over stderr
//!
//! Each stream gets its own listener set; the two sessions share nothing.

use std::fmt;
use std::io::{self, Read, Write};
use std::process::{Child, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};

use serde::Serialize;

use crate::decode::Charset;
use crate::error::{GobbleError, ProcessError};
use crate::gobbler::{GobbleSummary, Gobbler};
use crate::listener::Listeners;
use crate::shell::build_command;

/// Which output stream of a child process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamKind {
    Stdout,
    Stderr,
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamKind::Stdout => f.write_str("stdout"),
            StreamKind::Stderr => f.write_str("stderr"),
        }
    }
}

/// A line read from one of the child's streams.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StreamLine {
    pub stream: StreamKind,
    pub line: String,
}

/// How the child process terminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProcessExit {
    /// Exit code, absent when the process was killed by a signal.
    pub code: Option<i32>,
    pub signal: Option<i32>,
}

impl ProcessExit {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

impl From<ExitStatus> for ProcessExit {
    fn from(status: ExitStatus) -> Self {
        #[cfg(unix)]
        let signal = {
            use std::os::unix::process::ExitStatusExt;
            status.signal()
        };
        #[cfg(not(unix))]
        let signal = None;

        Self {
            code: status.code(),
            signal,
        }
    }
}

/// Result of a process that ran to completion and was fully drained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessOutcome {
    pub exit: ProcessExit,
    pub stdout: GobbleSummary,
    pub stderr: GobbleSummary,
}

/// Configuration for spawning a gobbled process.
#[derive(Debug, Clone)]
pub struct ProcessConfig {
    /// Program to run
    pub program: String,
    pub args: Vec<String>,
    pub working_dir: Option<String>,
    /// Shell prefix (e.g. "/bin/sh -c"); the program runs directly when unset
    pub shell_prefix: Option<String>,
    /// Charset used to decode both output streams
    pub charset: Charset,
    /// Data written to stdin before it is closed; stdin is null when unset
    pub stdin: Option<String>,
}

impl ProcessConfig {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            working_dir: None,
            shell_prefix: None,
            charset: Charset::default(),
            stdin: None,
        }
    }

    pub fn working_dir(mut self, dir: impl Into<String>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Run the program through a shell prefix. An empty prefix selects the
    /// default shell.
    pub fn shell_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.shell_prefix = Some(prefix.into());
        self
    }

    pub fn charset(mut self, charset: Charset) -> Self {
        self.charset = charset;
        self
    }

    /// Feed `data` to the child's stdin, then close it.
    pub fn stdin(mut self, data: impl Into<String>) -> Self {
        self.stdin = Some(data.into());
        self
    }
}

/// Handle to a gobbler thread.
pub type GobbleHandle = JoinHandle<Result<GobbleSummary, GobbleError>>;

/// Gobble `reader` on a new thread named after `stream`.
pub fn gobble_in_thread<R>(
    stream: StreamKind,
    reader: R,
    charset: Charset,
    listeners: Listeners<'static>,
) -> io::Result<GobbleHandle>
where
    R: Read + Send + 'static,
{
    thread::Builder::new()
        .name(format!("gobble-{stream}"))
        .spawn(move || Gobbler::new(reader, charset).listeners(listeners).gobble())
}

/// A running child process whose output is being gobbled.
pub struct GobbledProcess {
    child: Child,
    stdout: GobbleHandle,
    stderr: GobbleHandle,
}

impl GobbledProcess {
    /// Spawn the configured process and start gobbling its output.
    ///
    /// `listeners_for` is called once per stream to build that stream's
    /// listener set.
    pub fn spawn<F>(config: ProcessConfig, mut listeners_for: F) -> Result<Self, ProcessError>
    where
        F: FnMut(StreamKind) -> Listeners<'static>,
    {
        let mut cmd = build_command(
            &config.program,
            &config.args,
            config.working_dir.as_deref(),
            config.shell_prefix.as_deref(),
        )?;

        if config.stdin.is_some() {
            cmd.stdin(Stdio::piped());
        } else {
            cmd.stdin(Stdio::null());
        }
        cmd.stdout(Stdio::piped()).stderr(Stdio::piped());

        let mut child = cmd.spawn().map_err(ProcessError::Spawn)?;
        log::trace!("Spawned {} (pid {})", config.program, child.id());

        let stdout = match child.stdout.take() {
            Some(pipe) => pipe,
            None => return Err(abandon(child, ProcessError::MissingPipe(StreamKind::Stdout))),
        };
        let stderr = match child.stderr.take() {
            Some(pipe) => pipe,
            None => return Err(abandon(child, ProcessError::MissingPipe(StreamKind::Stderr))),
        };

        // Gobblers start before stdin is written so a chatty child cannot
        // fill its output pipes while we block on its input
        let stdout = match gobble_in_thread(
            StreamKind::Stdout,
            stdout,
            config.charset,
            listeners_for(StreamKind::Stdout),
        ) {
            Ok(handle) => handle,
            Err(source) => {
                return Err(abandon(
                    child,
                    ProcessError::Thread {
                        stream: StreamKind::Stdout,
                        source,
                    },
                ))
            }
        };
        let stderr = match gobble_in_thread(
            StreamKind::Stderr,
            stderr,
            config.charset,
            listeners_for(StreamKind::Stderr),
        ) {
            Ok(handle) => handle,
            Err(source) => {
                return Err(abandon(
                    child,
                    ProcessError::Thread {
                        stream: StreamKind::Stderr,
                        source,
                    },
                ))
            }
        };

        let mut process = Self {
            child,
            stdout,
            stderr,
        };

        if let Some(data) = config.stdin {
            if let Err(e) = process.write_stdin(&data) {
                let _ = process.kill();
                let _ = process.wait();
                return Err(e);
            }
        }
        Ok(process)
    }

    fn write_stdin(&mut self, data: &str) -> Result<(), ProcessError> {
        // Dropping the handle closes the pipe
        let Some(mut stdin) = self.child.stdin.take() else {
            return Ok(());
        };
        match stdin.write_all(data.as_bytes()).and_then(|()| stdin.flush()) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::BrokenPipe => {
                log::debug!("Child closed stdin early");
                Ok(())
            }
            Err(e) => Err(ProcessError::Stdin(e)),
        }
    }

    pub fn id(&self) -> u32 {
        self.child.id()
    }

    /// Kill the child. Its gobblers see the end of their streams and finish.
    pub fn kill(&mut self) -> io::Result<()> {
        log::trace!("Killing pid {}", self.child.id());
        self.child.kill()
    }

    /// Wait for the child to exit and both gobblers to finish.
    ///
    /// Both gobblers are always joined. If both failed, the stdout failure
    /// is reported.
    pub fn wait(mut self) -> Result<ProcessOutcome, ProcessError> {
        let status = self.child.wait().map_err(ProcessError::Wait);
        let stdout = join(StreamKind::Stdout, self.stdout);
        let stderr = join(StreamKind::Stderr, self.stderr);

        let exit = ProcessExit::from(status?);
        log::trace!("Process exited: {:?}", exit);
        Ok(ProcessOutcome {
            exit,
            stdout: stdout?,
            stderr: stderr?,
        })
    }
}

/// Spawn a process, gobble its output and wait for it.
pub fn run<F>(config: ProcessConfig, listeners_for: F) -> Result<ProcessOutcome, ProcessError>
where
    F: FnMut(StreamKind) -> Listeners<'static>,
{
    GobbledProcess::spawn(config, listeners_for)?.wait()
}

fn join(stream: StreamKind, handle: GobbleHandle) -> Result<GobbleSummary, ProcessError> {
    match handle.join() {
        Ok(result) => result.map_err(|source| ProcessError::Gobble { stream, source }),
        Err(_) => Err(ProcessError::Panicked(stream)),
    }
}

/// Kill and reap a child that cannot be gobbled.
fn abandon(mut child: Child, err: ProcessError) -> ProcessError {
    let _ = child.kill();
    let _ = child.wait();
    err
}

// ============================================================================
// TESTS
// ============================================================================
