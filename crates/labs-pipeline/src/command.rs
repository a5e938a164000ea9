//! External commands run as task actions.

use std::fmt;
use std::path::PathBuf;

use async_trait::async_trait;
use tokio::process::Command;

use crate::scheduler::{FailurePolicy, TaskContext};
use crate::task::{Action, TaskError};

/// A program and its arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    program: String,
    args: Vec<String>,
    current_dir: Option<PathBuf>,
}

impl CommandSpec {
    /// Create a command running `program` with no arguments.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            current_dir: None,
        }
    }

    /// Build from an argv list such as `["bundle", "exec", "middleman"]`.
    ///
    /// Returns `None` for an empty list.
    pub fn from_argv<S: AsRef<str>>(argv: &[S]) -> Option<Self> {
        let (program, args) = argv.split_first()?;
        Some(Self::new(program.as_ref()).args(args.iter().map(|a| a.as_ref())))
    }

    /// Append one argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Run the command from `dir` instead of the current directory.
    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    /// Program name as passed to the OS.
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Arguments, without the program.
    pub fn get_args(&self) -> &[String] {
        &self.args
    }

    fn to_command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command.args(&self.args);
        if let Some(dir) = &self.current_dir {
            command.current_dir(dir);
        }
        command
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// Spawns a command with inherited stdio and waits for it to exit.
///
/// A non-zero exit is an error under [`FailurePolicy::FailFast`] and a
/// recorded failure under [`FailurePolicy::Continue`]. Failing to start the
/// program at all is always an error.
#[derive(Debug, Clone)]
pub struct SpawnAction {
    command: CommandSpec,
}

impl SpawnAction {
    /// Create an action that runs `command` to completion.
    pub fn new(command: CommandSpec) -> Self {
        Self { command }
    }

    /// The command this action runs.
    pub fn command(&self) -> &CommandSpec {
        &self.command
    }
}

#[async_trait]
impl Action for SpawnAction {
    async fn run(&self, ctx: &TaskContext) -> Result<(), TaskError> {
        tracing::debug!("Spawning `{}`", self.command);

        let status = self
            .command
            .to_command()
            .status()
            .await
            .map_err(|e| TaskError::SpawnError {
                program: self.command.program.clone(),
                message: e.to_string(),
            })?;

        if status.success() {
            return Ok(());
        }

        match ctx.policy() {
            FailurePolicy::FailFast => Err(TaskError::ProcessFailed {
                program: self.command.program.clone(),
                code: status.code(),
            }),
            FailurePolicy::Continue => {
                ctx.record_failure(&self.command.program, status.code());
                Ok(())
            }
        }
    }
}
