//! Write a default configuration file.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

/// Run the init command.
pub fn run(config_path: &Path, yes: bool) -> Result<()> {
    if config_path.exists() && !yes {
        tracing::warn!(
            "{} already exists. Use --yes to overwrite.",
            config_path.display()
        );
        return Ok(());
    }

    fs::write(config_path, DEFAULT_CONFIG)
        .with_context(|| format!("Failed to write {}", config_path.display()))?;
    tracing::info!("Created {}", config_path.display());
    tracing::info!("Run 'labs run serve' to start the development server.");

    Ok(())
}

const DEFAULT_CONFIG: &str = r#"# Labs configuration

[site]
# Middleman sources, watched for changes
source = "source"

# Middleman output, served in development
build = "build"

# SVGs minified after every build
images = "build/assets/images"

[server]
host = "127.0.0.1"
port = 4060
open = true

[watch]
# Quiet period before a rebuild starts
debounce_ms = 200

[tasks]
# "fail" stops at the first failing command, "continue" keeps going
on_failure = "fail"

[commands]
middleman = ["bundle", "exec", "middleman"]
middleman_build = ["bundle", "exec", "middleman", "build"]
install_bundle = ["bundle", "install"]
install_bower = ["bower", "install"]

[deploy]
# The deploy task is available once host and remote_dir are set
user = "root"
host = ""
remote_dir = ""
local_dir = "build/"
exclude = [".git", ".git*", ".sass-cache", "fabfile.py*", ".DS_Store", "Users/"]

[comments]
# Disqus forum shortname
shortname = ""
"#;
