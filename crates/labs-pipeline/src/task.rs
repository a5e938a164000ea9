//! The unit of work a task performs.

use std::sync::Arc;

use async_trait::async_trait;

use crate::graph::GraphError;
use crate::scheduler::TaskContext;
use crate::svg::SvgError;

/// Errors that abort a run.
#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    #[error("Failed to spawn '{program}': {message}")]
    SpawnError { program: String, message: String },

    #[error("'{program}' {}", describe_exit(.code))]
    ProcessFailed { program: String, code: Option<i32> },

    #[error(transparent)]
    Svg(#[from] SvgError),

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error("Service failed: {0}")]
    ServiceError(String),

    #[error("Task panicked: {0}")]
    Panicked(String),
}

impl TaskError {
    /// Exit code the CLI should report for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ProcessFailed { code: Some(code), .. } => *code,
            _ => 1,
        }
    }
}

fn describe_exit(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exited with code {}", code),
        None => "was terminated by a signal".to_string(),
    }
}

/// Work performed when a task runs.
#[async_trait]
pub trait Action: Send + Sync {
    /// Run the action to completion.
    ///
    /// Long-lived work is handed to [`TaskContext::spawn_service`] so the
    /// task itself can complete and release its dependents.
    async fn run(&self, ctx: &TaskContext) -> Result<(), TaskError>;
}

/// Runs actions one after another, stopping at the first error.
pub struct Sequence {
    steps: Vec<Arc<dyn Action>>,
}

impl Sequence {
    /// Create an empty sequence.
    pub fn new() -> Self {
        Self { steps: Vec::new() }
    }

    /// Append an action to run after the current ones.
    pub fn then(mut self, action: impl Action + 'static) -> Self {
        self.steps.push(Arc::new(action));
        self
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

impl Default for Sequence {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Action for Sequence {
    async fn run(&self, ctx: &TaskContext) -> Result<(), TaskError> {
        for step in &self.steps {
            step.run(ctx).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reports_process_exit_code() {
        let err = TaskError::ProcessFailed {
            program: "bundle".to_string(),
            code: Some(3),
        };

        assert_eq!(err.exit_code(), 3);
        assert_eq!(err.to_string(), "'bundle' exited with code 3");
    }

    #[test]
    fn signals_map_to_generic_failure() {
        let err = TaskError::ProcessFailed {
            program: "bower".to_string(),
            code: None,
        };

        assert_eq!(err.exit_code(), 1);
        assert!(err.to_string().contains("signal"));
    }
}
