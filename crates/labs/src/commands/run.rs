//! Run tasks from the site's task graph.

use std::path::Path;
use std::process::ExitCode;

use anyhow::{bail, Result};
use labs_pipeline::{FailurePolicy, Scheduler};
use labs_server::ReloadHub;

use crate::config::load_config;
use crate::tasks::site_tasks;

/// Run the run command.
pub async fn run(config_path: &Path, targets: &[String], keep_going: bool) -> Result<ExitCode> {
    let config = load_config(config_path)?;

    if targets.iter().any(|t| t == "deploy") && !config.deploy.is_configured() {
        bail!(
            "Nothing to deploy to. Set host and remote_dir under [deploy] in {}.",
            config_path.display()
        );
    }

    let policy = if keep_going {
        FailurePolicy::Continue
    } else {
        config.tasks.on_failure
    };

    let hub = ReloadHub::new();
    let scheduler = Scheduler::new(site_tasks(&config, &hub)?, policy);

    let report = match scheduler.run(targets).await {
        Ok(report) => report,
        Err(e) => {
            tracing::error!("{}", e);
            return Ok(exit_code(e.exit_code()));
        }
    };

    for failure in &report.failures {
        tracing::warn!(
            "'{}' kept going after {} failed",
            failure.task,
            failure.program
        );
    }

    if scheduler.service_count() > 0 {
        tracing::info!("Press Ctrl+C to stop");

        tokio::select! {
            result = scheduler.wait_services() => {
                if let Err(e) = result {
                    tracing::error!("{}", e);
                    return Ok(exit_code(e.exit_code()));
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Shutting down");
            }
        }
    }

    Ok(exit_code(report.exit_code()))
}

/// Map a process exit status onto the CLI's own.
fn exit_code(code: i32) -> ExitCode {
    match u8::try_from(code) {
        Ok(code) => ExitCode::from(code),
        Err(_) => ExitCode::FAILURE,
    }
}
