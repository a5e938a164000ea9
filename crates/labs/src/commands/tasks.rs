//! List the tasks `labs run` accepts.

use std::path::Path;

use anyhow::Result;
use labs_server::ReloadHub;

use crate::config::load_config;
use crate::tasks::site_tasks;

/// Run the tasks command.
pub fn run(config_path: &Path) -> Result<()> {
    let config = load_config(config_path)?;
    let graph = site_tasks(&config, &ReloadHub::new())?;

    let width = graph.tasks().map(|t| t.name().len()).max().unwrap_or(0);

    for task in graph.tasks() {
        let deps = if task.deps().is_empty() {
            String::new()
        } else {
            format!(" [{}]", task.deps().join(", "))
        };
        println!(
            "  {:width$}  {}{}",
            task.name(),
            task.description(),
            deps,
            width = width
        );
    }

    Ok(())
}
