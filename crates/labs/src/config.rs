//! Configuration file structure (labs.toml).

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use labs_pipeline::FailurePolicy;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub site: SiteConfig,
    pub server: ServerConfig,
    pub watch: WatchConfig,
    pub tasks: TasksConfig,
    pub commands: CommandsConfig,
    pub deploy: DeployConfig,
    pub comments: CommentsConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    /// Generator sources, watched for changes
    pub source: PathBuf,
    /// Generator output, served in development
    pub build: PathBuf,
    /// SVGs minified after every build
    pub images: PathBuf,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            source: PathBuf::from("source"),
            build: PathBuf::from("build"),
            images: PathBuf::from("build/assets/images"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub open: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 4060,
            open: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    pub debounce_ms: u64,
}

impl WatchConfig {
    /// Quiet period before a rebuild starts.
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self { debounce_ms: 200 }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct TasksConfig {
    pub on_failure: FailurePolicy,
}

/// External commands, as argv lists.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CommandsConfig {
    pub middleman: Vec<String>,
    pub middleman_build: Vec<String>,
    pub install_bundle: Vec<String>,
    pub install_bower: Vec<String>,
}

fn argv(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|s| s.to_string()).collect()
}

impl Default for CommandsConfig {
    fn default() -> Self {
        Self {
            middleman: argv(&["bundle", "exec", "middleman"]),
            middleman_build: argv(&["bundle", "exec", "middleman", "build"]),
            install_bundle: argv(&["bundle", "install"]),
            install_bower: argv(&["bower", "install"]),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DeployConfig {
    pub user: String,
    pub host: String,
    pub remote_dir: String,
    pub local_dir: String,
    pub exclude: Vec<String>,
}

impl DeployConfig {
    /// Whether a deploy destination has been set.
    pub fn is_configured(&self) -> bool {
        !self.host.is_empty() && !self.remote_dir.is_empty()
    }

    /// `user@host:dir`, or `host:dir` without a user.
    pub fn destination(&self) -> String {
        if self.user.is_empty() {
            format!("{}:{}", self.host, self.remote_dir)
        } else {
            format!("{}@{}:{}", self.user, self.host, self.remote_dir)
        }
    }
}

impl Default for DeployConfig {
    fn default() -> Self {
        Self {
            user: "root".to_string(),
            host: String::new(),
            remote_dir: String::new(),
            local_dir: "build/".to_string(),
            exclude: argv(&[
                ".git",
                ".git*",
                ".sass-cache",
                "fabfile.py*",
                ".DS_Store",
                "Users/",
            ]),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct CommentsConfig {
    /// Disqus forum shortname
    pub shortname: String,
}

/// Load configuration from `path` if it exists.
/// Returns an error if the config file exists but is malformed.
pub fn load_config(path: &Path) -> Result<Config> {
    if !path.exists() {
        tracing::debug!("No {} found; using defaults", path.display());
        return Ok(Config::default());
    }

    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let config: Config = toml::from_str(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))?;

    tracing::info!("Loaded config from {}", path.display());
    Ok(config)
}
