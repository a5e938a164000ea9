//! Print the comment embed for a page.

use std::path::Path;

use anyhow::{bail, Result};
use labs_site::{CommentThread, PageIdentity};

use crate::config::load_config;

/// Run the comments command.
pub fn run(config_path: &Path, url: &str, shortname: Option<String>) -> Result<()> {
    let shortname = match shortname {
        Some(shortname) => shortname,
        None => load_config(config_path)?.comments.shortname,
    };

    if shortname.is_empty() {
        bail!(
            "No Disqus shortname. Pass --shortname or set it under [comments] in {}.",
            config_path.display()
        );
    }

    let thread = CommentThread::new(&shortname, PageIdentity::from_url(url)?)?;
    tracing::debug!("Thread identifier: {}", thread.identity());
    println!("{}", thread.embed_snippet()?);

    Ok(())
}
