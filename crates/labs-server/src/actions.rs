//! Task actions backed by the development server.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use labs_pipeline::{Action, RebuildQueue, TaskContext, TaskError};

use crate::hub::ReloadHub;
use crate::server::{DevServer, DevServerConfig, ServerError};
use crate::watcher::FileWatcher;

/// Show a banner in every connected browser.
pub struct NotifyAction {
    hub: ReloadHub,
    message: String,
}

impl NotifyAction {
    /// Create an action showing `message`.
    pub fn new(hub: ReloadHub, message: impl Into<String>) -> Self {
        Self {
            hub,
            message: message.into(),
        }
    }
}

#[async_trait]
impl Action for NotifyAction {
    async fn run(&self, _ctx: &TaskContext) -> Result<(), TaskError> {
        self.hub.notify(self.message.clone());
        Ok(())
    }
}

/// Reload every connected browser.
pub struct ReloadAction {
    hub: ReloadHub,
}

impl ReloadAction {
    /// Create an action reloading every browser on `hub`.
    pub fn new(hub: ReloadHub) -> Self {
        Self { hub }
    }
}

#[async_trait]
impl Action for ReloadAction {
    async fn run(&self, _ctx: &TaskContext) -> Result<(), TaskError> {
        tracing::debug!("Reloading {} browser(s)", self.hub.subscriber_count());
        self.hub.reload();
        Ok(())
    }
}

/// Bind the development server and keep it running as a service.
pub struct ServeAction {
    config: DevServerConfig,
    hub: ReloadHub,
}

impl ServeAction {
    /// Create an action serving with `config`.
    pub fn new(config: DevServerConfig, hub: ReloadHub) -> Self {
        Self { config, hub }
    }
}

#[async_trait]
impl Action for ServeAction {
    async fn run(&self, ctx: &TaskContext) -> Result<(), TaskError> {
        let server = DevServer::new(self.config.clone(), self.hub.clone())
            .bind()
            .await
            .map_err(|e| TaskError::ServiceError(e.to_string()))?;

        ctx.spawn_service(async move {
            server
                .serve()
                .await
                .map_err(|e| TaskError::ServiceError(e.to_string()))
        });

        Ok(())
    }
}

/// Watch source paths and rerun `target` on every change.
///
/// Rebuilds go through a [`RebuildQueue`], so a burst of changes triggers
/// one rebuild and rebuilds never overlap.
pub struct WatchAction {
    paths: Vec<PathBuf>,
    target: String,
    debounce: Duration,
}

impl WatchAction {
    /// Create an action watching `paths` and rerunning `target`.
    pub fn new(paths: Vec<PathBuf>, target: impl Into<String>, debounce: Duration) -> Self {
        Self {
            paths,
            target: target.into(),
            debounce,
        }
    }
}

#[async_trait]
impl Action for WatchAction {
    async fn run(&self, ctx: &TaskContext) -> Result<(), TaskError> {
        let (watcher, mut rx) = FileWatcher::new(&self.paths).map_err(|e| {
            TaskError::ServiceError(ServerError::WatchError(e.to_string()).to_string())
        })?;

        let scheduler = Arc::clone(ctx.scheduler());
        let target = self.target.clone();
        let debounce = self.debounce;

        ctx.spawn_service(async move {
            let _watcher = watcher;

            let queue = RebuildQueue::spawn(debounce, move || {
                let scheduler = Arc::clone(&scheduler);
                let targets = [target.clone()];
                async move {
                    match scheduler.run(&targets).await {
                        Ok(report) if report.is_success() => {}
                        Ok(report) => tracing::warn!(
                            "Rebuild finished with {} failed command(s)",
                            report.failures.len()
                        ),
                        Err(e) => tracing::error!("Rebuild failed: {}", e),
                    }
                }
            });

            while let Some(event) = rx.recv().await {
                tracing::info!("Changed: {}", event.path().display());
                queue.request();
            }

            Ok(())
        });

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hub::ReloadMessage;
    use labs_pipeline::{FailurePolicy, Scheduler, Sequence, TaskGraph, TaskSpec};
    use std::fs;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use tempfile::tempdir;

    #[tokio::test]
    async fn reload_task_notifies_then_reloads() {
        let hub = ReloadHub::new();
        let mut rx = hub.subscribe();

        let graph = TaskGraph::new(vec![TaskSpec::new("browser-reload").action(
            Sequence::new()
                .then(NotifyAction::new(hub.clone(), "Reloading..."))
                .then(ReloadAction::new(hub.clone())),
        )])
        .unwrap();

        Scheduler::new(graph, FailurePolicy::FailFast)
            .run(&["browser-reload"])
            .await
            .unwrap();

        assert_eq!(
            rx.try_recv().unwrap(),
            ReloadMessage::Notify {
                message: "Reloading...".to_string()
            }
        );
        assert_eq!(rx.try_recv().unwrap(), ReloadMessage::Reload);
    }

    #[tokio::test]
    async fn serve_registers_a_service() {
        let temp = tempdir().unwrap();
        let config = DevServerConfig {
            root: temp.path().to_path_buf(),
            port: 0,
            open: false,
            ..Default::default()
        };

        let graph = TaskGraph::new(vec![
            TaskSpec::new("browser-sync").action(ServeAction::new(config, ReloadHub::new()))
        ])
        .unwrap();
        let scheduler = Scheduler::new(graph, FailurePolicy::FailFast);

        scheduler.run(&["browser-sync"]).await.unwrap();
        assert_eq!(scheduler.service_count(), 1);
    }

    struct Count(Arc<AtomicUsize>);

    #[async_trait]
    impl Action for Count {
        async fn run(&self, _ctx: &TaskContext) -> Result<(), TaskError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn changes_trigger_one_rebuild() {
        let temp = tempdir().unwrap();
        let builds = Arc::new(AtomicUsize::new(0));

        let graph = TaskGraph::new(vec![
            TaskSpec::new("middleman-build").action(Count(Arc::clone(&builds))),
            TaskSpec::new("browser-reload").depends_on(["middleman-build"]),
            TaskSpec::new("watch").action(WatchAction::new(
                vec![temp.path().to_path_buf()],
                "browser-reload",
                Duration::from_millis(300),
            )),
        ])
        .unwrap();
        let scheduler = Scheduler::new(graph, FailurePolicy::FailFast);

        scheduler.run(&["watch"]).await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        for i in 0..3 {
            fs::write(temp.path().join(format!("post-{}.md", i)), "# Post").unwrap();
        }

        tokio::time::sleep(Duration::from_millis(1000)).await;
        assert_eq!(builds.load(Ordering::SeqCst), 1);
    }

    /// A slow build that notes whether another copy was running.
    struct SlowBuild {
        active: Arc<AtomicUsize>,
        overlapped: Arc<AtomicBool>,
        runs: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Action for SlowBuild {
        async fn run(&self, _ctx: &TaskContext) -> Result<(), TaskError> {
            if self.active.fetch_add(1, Ordering::SeqCst) > 0 {
                self.overlapped.store(true, Ordering::SeqCst);
            }
            tokio::time::sleep(Duration::from_millis(400)).await;
            self.active.fetch_sub(1, Ordering::SeqCst);
            self.runs.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn edit_during_initial_build_waits_for_it() {
        let temp = tempdir().unwrap();
        let runs = Arc::new(AtomicUsize::new(0));
        let overlapped = Arc::new(AtomicBool::new(false));

        let graph = TaskGraph::new(vec![
            TaskSpec::new("middleman-build").action(SlowBuild {
                active: Arc::new(AtomicUsize::new(0)),
                overlapped: Arc::clone(&overlapped),
                runs: Arc::clone(&runs),
            }),
            TaskSpec::new("browser-reload").depends_on(["middleman-build"]),
            TaskSpec::new("browser-sync").depends_on(["middleman-build"]),
            TaskSpec::new("watch").action(WatchAction::new(
                vec![temp.path().to_path_buf()],
                "browser-reload",
                Duration::from_millis(50),
            )),
            TaskSpec::new("serve").depends_on(["browser-sync", "watch"]),
        ])
        .unwrap();
        let scheduler = Scheduler::new(graph, FailurePolicy::FailFast);

        let source = temp.path().to_path_buf();
        let edit = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(150)).await;
            fs::write(source.join("index.html.erb"), "<h1>Edited</h1>").unwrap();
        });

        scheduler.run(&["serve"]).await.unwrap();
        edit.await.unwrap();
        tokio::time::sleep(Duration::from_millis(1000)).await;

        assert_eq!(runs.load(Ordering::SeqCst), 2);
        assert!(!overlapped.load(Ordering::SeqCst));
    }
}
