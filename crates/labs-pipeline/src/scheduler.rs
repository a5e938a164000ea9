//! Dependency-ordered task execution.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use serde::Deserialize;
use tokio::sync::{broadcast, Mutex as AsyncMutex};
use tokio::task::JoinSet;

use crate::graph::TaskGraph;
use crate::task::{Action, TaskError};

/// What to do when a spawned process exits unsuccessfully.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Abort the run once the current level settles.
    #[default]
    #[serde(rename = "fail")]
    FailFast,

    /// Log the failure, record it in the report and keep going.
    Continue,
}

/// A process failure tolerated under [`FailurePolicy::Continue`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessFailure {
    pub task: String,
    pub program: String,
    pub code: Option<i32>,
}

/// Lifecycle notifications for observers of a scheduler.
#[derive(Debug, Clone)]
pub struct TaskEvent {
    pub task: String,
    pub kind: TaskEventKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskEventKind {
    Started,
    Finished { elapsed: Duration },
    Failed { error: String },
}

/// Summary of a completed run.
#[derive(Debug, Clone)]
pub struct RunReport {
    /// Tasks that ran, in plan order
    pub tasks: Vec<String>,

    /// Process failures tolerated along the way
    pub failures: Vec<ProcessFailure>,

    pub elapsed: Duration,
}

impl RunReport {
    /// True when no process failure was tolerated.
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    /// Exit code of the last tolerated failure, or 0.
    pub fn exit_code(&self) -> i32 {
        self.failures
            .last()
            .map(|f| f.code.unwrap_or(1))
            .unwrap_or(0)
    }
}

#[derive(Debug, Default)]
struct RunState {
    failures: Mutex<Vec<ProcessFailure>>,
}

type ServiceSet = JoinSet<(String, Result<(), TaskError>)>;

/// Runs tasks from a validated [`TaskGraph`].
///
/// A task never runs concurrently with itself: overlapping runs that share
/// a task (a watch rebuild during the initial build, say) take turns.
pub struct Scheduler {
    graph: TaskGraph,
    policy: FailurePolicy,
    events: broadcast::Sender<TaskEvent>,
    services: Mutex<ServiceSet>,
    running: HashMap<String, Arc<AsyncMutex<()>>>,
}

impl Scheduler {
    /// Create a scheduler over `graph`.
    pub fn new(graph: TaskGraph, policy: FailurePolicy) -> Arc<Self> {
        let (events, _) = broadcast::channel(256);
        let running = graph
            .tasks()
            .map(|t| (t.name().to_string(), Arc::new(AsyncMutex::new(()))))
            .collect();

        Arc::new(Self {
            graph,
            policy,
            events,
            services: Mutex::new(JoinSet::new()),
            running,
        })
    }

    /// The graph this scheduler runs.
    pub fn graph(&self) -> &TaskGraph {
        &self.graph
    }

    /// Failure policy handed to every task.
    pub fn policy(&self) -> FailurePolicy {
        self.policy
    }

    /// Subscribe to task lifecycle events.
    pub fn subscribe(&self) -> broadcast::Receiver<TaskEvent> {
        self.events.subscribe()
    }

    /// Run `targets` and their dependencies.
    ///
    /// Tasks of one level run concurrently; a level only starts once every
    /// task of the previous level has completed. On error the tasks already
    /// running are allowed to finish and no further level starts.
    pub async fn run<S>(self: &Arc<Self>, targets: &[S]) -> Result<RunReport, TaskError>
    where
        S: AsRef<str> + Sync,
    {
        let start = Instant::now();
        let plan = self.graph.plan(targets)?;
        let state = Arc::new(RunState::default());

        for level in plan.levels() {
            let mut running = JoinSet::new();

            for name in level {
                let action = self.graph.get(name).and_then(|t| t.action_handle());
                let ctx = TaskContext {
                    task: name.clone(),
                    scheduler: Arc::clone(self),
                    state: Arc::clone(&state),
                };
                let scheduler = Arc::clone(self);
                running.spawn(async move { scheduler.run_task(ctx, action).await });
            }

            let mut first_error = None;
            while let Some(joined) = running.join_next().await {
                let result = joined.unwrap_or_else(|e| Err(TaskError::Panicked(e.to_string())));
                if let Err(e) = result {
                    first_error.get_or_insert(e);
                }
            }

            if let Some(e) = first_error {
                return Err(e);
            }
        }

        let failures = std::mem::take(
            &mut *state
                .failures
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        );

        Ok(RunReport {
            tasks: plan.tasks().map(str::to_string).collect(),
            failures,
            elapsed: start.elapsed(),
        })
    }

    async fn run_task(
        &self,
        ctx: TaskContext,
        action: Option<Arc<dyn Action>>,
    ) -> Result<(), TaskError> {
        let _running = match self.running.get(&ctx.task) {
            Some(lock) => Some(match Arc::clone(lock).try_lock_owned() {
                Ok(guard) => guard,
                Err(_) => {
                    tracing::debug!("'{}' is already running; waiting for it", ctx.task);
                    Arc::clone(lock).lock_owned().await
                }
            }),
            None => None,
        };

        tracing::info!("Starting '{}'...", ctx.task);
        self.emit(&ctx.task, TaskEventKind::Started);

        let start = Instant::now();
        let result = match action {
            Some(action) => action.run(&ctx).await,
            None => Ok(()),
        };
        let elapsed = start.elapsed();

        match &result {
            Ok(()) => {
                tracing::info!("Finished '{}' after {} ms", ctx.task, elapsed.as_millis());
                self.emit(&ctx.task, TaskEventKind::Finished { elapsed });
            }
            Err(e) => {
                tracing::error!("'{}' errored after {} ms: {}", ctx.task, elapsed.as_millis(), e);
                self.emit(
                    &ctx.task,
                    TaskEventKind::Failed {
                        error: e.to_string(),
                    },
                );
            }
        }

        result
    }

    fn emit(&self, task: &str, kind: TaskEventKind) {
        // No subscribers is fine
        let _ = self.events.send(TaskEvent {
            task: task.to_string(),
            kind,
        });
    }

    /// Number of background services still registered.
    pub fn service_count(&self) -> usize {
        self.lock_services().len()
    }

    /// Wait for every background service to stop.
    ///
    /// Returns the first service error; the remaining services are aborted.
    pub async fn wait_services(&self) -> Result<(), TaskError> {
        let mut services = std::mem::take(&mut *self.lock_services());

        while let Some(joined) = services.join_next().await {
            match joined {
                Ok((name, Ok(()))) => tracing::debug!("Service '{}' stopped", name),
                Ok((name, Err(e))) => {
                    tracing::error!("Service '{}' failed: {}", name, e);
                    return Err(e);
                }
                Err(e) => return Err(TaskError::Panicked(e.to_string())),
            }
        }

        Ok(())
    }

    fn lock_services(&self) -> std::sync::MutexGuard<'_, ServiceSet> {
        self.services.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Handle given to an [`Action`] while its task runs.
#[derive(Clone)]
pub struct TaskContext {
    task: String,
    scheduler: Arc<Scheduler>,
    state: Arc<RunState>,
}

impl TaskContext {
    /// Name of the running task.
    pub fn task(&self) -> &str {
        &self.task
    }

    /// Failure policy of the owning scheduler.
    pub fn policy(&self) -> FailurePolicy {
        self.scheduler.policy
    }

    /// The scheduler running this task, for actions that start more runs.
    pub fn scheduler(&self) -> &Arc<Scheduler> {
        &self.scheduler
    }

    /// Record a process failure that the current policy tolerates.
    pub fn record_failure(&self, program: &str, code: Option<i32>) {
        tracing::warn!(
            "'{}' failed in task '{}' (exit code {:?}); continuing",
            program,
            self.task,
            code
        );

        self.state
            .failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(ProcessFailure {
                task: self.task.clone(),
                program: program.to_string(),
                code,
            });
    }

    /// Keep `service` running in the background after this task completes.
    pub fn spawn_service<F>(&self, service: F)
    where
        F: Future<Output = Result<(), TaskError>> + Send + 'static,
    {
        let name = self.task.clone();
        tracing::debug!("Registering service '{}'", name);
        self.scheduler
            .lock_services()
            .spawn(async move { (name, service.await) });
    }
}
