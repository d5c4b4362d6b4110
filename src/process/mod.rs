//! External command execution.
//!
//! Commands are described by a [`CommandSpec`] (program plus argument
//! vector, never a shell string) and executed by a [`ProcessRunner`] in one
//! of two [`OutputMode`]s. The production runner is [`SystemRunner`].

pub mod system;

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;

pub use system::SystemRunner;

/// How the child's standard output is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Child stdout streams to the agent's stdout.
    Inherit,
    /// Child stdout is collected into [`ProcessOutput::stdout`].
    Capture,
}

/// A command to execute: program, argument vector, optional time limit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    /// Executable name or path.
    pub program: String,
    /// Arguments, passed verbatim.
    pub args: Vec<String>,
    /// Kill the child if it runs longer than this.
    pub timeout: Option<Duration>,
}

impl CommandSpec {
    /// Creates a command with no arguments and no timeout.
    #[must_use]
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            timeout: None,
        }
    }

    /// Appends one argument.
    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Appends several arguments.
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Sets or clears the time limit.
    #[must_use]
    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Result of a command that exited with status zero.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    /// Collected stdout; empty in [`OutputMode::Inherit`].
    pub stdout: Vec<u8>,
}

/// Failure to run a command to a successful exit.
#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    /// The program could not be launched.
    #[error("cannot launch {program}: {source}")]
    Spawn {
        /// Program that failed to start.
        program: String,
        /// Underlying OS error.
        #[source]
        source: std::io::Error,
    },

    /// The program ran and exited unsuccessfully.
    #[error("{program} exited with {}{}", fmt_code(.code), fmt_tail(.stderr_tail))]
    NonZeroExit {
        /// Program that failed.
        program: String,
        /// Exit code, `None` if terminated by a signal.
        code: Option<i32>,
        /// Last lines written to stderr.
        stderr_tail: String,
    },

    /// The program outlived its time limit and was killed.
    #[error("{program} exceeded its {timeout:?} time limit")]
    TimeoutExceeded {
        /// Program that was killed.
        program: String,
        /// Limit that was exceeded.
        timeout: Duration,
    },

    /// Waiting on the child or reading its output failed.
    #[error("i/o error while running {program}: {source}")]
    Io {
        /// Program being run.
        program: String,
        /// Underlying OS error.
        #[source]
        source: std::io::Error,
    },
}

impl ProcessError {
    /// Exit code of a [`ProcessError::NonZeroExit`], if any.
    #[must_use]
    pub const fn exit_code(&self) -> Option<i32> {
        match self {
            Self::NonZeroExit { code, .. } => *code,
            _ => None,
        }
    }
}

fn fmt_code(code: &Option<i32>) -> String {
    code.map_or_else(|| "signal".to_string(), |c| format!("status {c}"))
}

fn fmt_tail(tail: &str) -> String {
    if tail.is_empty() {
        String::new()
    } else {
        format!(": {tail}")
    }
}

/// Executes external commands.
#[async_trait]
pub trait ProcessRunner: Send + Sync + fmt::Debug {
    /// Runs `spec` to completion.
    ///
    /// # Errors
    ///
    /// Returns [`ProcessError::Spawn`] if the program cannot start,
    /// [`ProcessError::NonZeroExit`] on a non-zero exit,
    /// [`ProcessError::TimeoutExceeded`] if the time limit elapses, and
    /// [`ProcessError::Io`] if the child's output cannot be read.
    async fn run(&self, spec: &CommandSpec, mode: OutputMode)
    -> Result<ProcessOutput, ProcessError>;
}
