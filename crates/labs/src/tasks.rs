//! The site's task graph.

use anyhow::{anyhow, Result};
use labs_pipeline::{CommandSpec, MinifySvgAction, Sequence, SpawnAction, TaskGraph, TaskSpec};
use labs_server::{
    DevServerConfig, NotifyAction, ReloadAction, ReloadHub, ServeAction, WatchAction,
};

use crate::config::{Config, DeployConfig};

const BUILD_MESSAGE: &str = "Building Middleman...";
const RELOAD_MESSAGE: &str = "Reloading...";

fn spawn(name: &str, argv: &[String]) -> Result<SpawnAction> {
    CommandSpec::from_argv(argv)
        .map(SpawnAction::new)
        .ok_or_else(|| anyhow!("Command for '{}' is empty in [commands]", name))
}

/// `rsync` invocation mirroring the site's old Fabric deploy.
pub fn deploy_command(deploy: &DeployConfig) -> CommandSpec {
    CommandSpec::new("rsync")
        .args(["-pthrvz", "--delete"])
        .args(deploy.exclude.iter().map(|pattern| format!("--exclude={}", pattern)))
        .arg(deploy.local_dir.clone())
        .arg(deploy.destination())
}

/// Declare and validate every task the CLI can run.
pub fn site_tasks(config: &Config, hub: &ReloadHub) -> Result<TaskGraph> {
    let commands = &config.commands;

    let mut tasks = vec![
        TaskSpec::new("install-bundle")
            .describe("Install Ruby gems")
            .action(spawn("install-bundle", &commands.install_bundle)?),
        TaskSpec::new("install-bower")
            .describe("Install front-end packages")
            .action(spawn("install-bower", &commands.install_bower)?),
        TaskSpec::new("install")
            .describe("Install all dependencies")
            .depends_on(["install-bundle", "install-bower"]),
        TaskSpec::new("middleman")
            .describe("Run the Middleman development server")
            .action(spawn("middleman", &commands.middleman)?),
        TaskSpec::new("middleman-build")
            .describe("Build the site and minify its SVGs")
            .action(
                Sequence::new()
                    .then(NotifyAction::new(hub.clone(), BUILD_MESSAGE))
                    .then(spawn("middleman-build", &commands.middleman_build)?)
                    .then(MinifySvgAction::new(&config.site.images)),
            ),
        TaskSpec::new("minify-svg")
            .describe("Minify built SVGs in place")
            .action(MinifySvgAction::new(&config.site.images)),
        TaskSpec::new("browser-reload")
            .describe("Rebuild, then reload connected browsers")
            .depends_on(["middleman-build"])
            .action(
                Sequence::new()
                    .then(NotifyAction::new(hub.clone(), RELOAD_MESSAGE))
                    .then(ReloadAction::new(hub.clone())),
            ),
        TaskSpec::new("browser-sync")
            .describe("Build, then serve the site with live reload")
            .depends_on(["middleman-build"])
            .action(ServeAction::new(
                DevServerConfig {
                    root: config.site.build.clone(),
                    host: config.server.host.clone(),
                    port: config.server.port,
                    open: config.server.open,
                },
                hub.clone(),
            )),
        TaskSpec::new("watch")
            .describe("Rebuild and reload on source changes")
            .action(WatchAction::new(
                vec![config.site.source.clone()],
                "browser-reload",
                config.watch.debounce(),
            )),
        TaskSpec::new("serve")
            .describe("Serve with live reload and watch for changes")
            .depends_on(["browser-sync", "watch"]),
        TaskSpec::new("build")
            .describe("Build the site")
            .depends_on(["middleman-build"]),
    ];

    if config.deploy.is_configured() {
        tasks.push(
            TaskSpec::new("deploy")
                .describe("Upload the built site with rsync")
                .action(SpawnAction::new(deploy_command(&config.deploy))),
        );
    }

    Ok(TaskGraph::new(tasks)?)
}
