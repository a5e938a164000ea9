//! Print a Gravatar URL.

use anyhow::Result;
use labs_site::Gravatar;

/// Run the gravatar command.
pub fn run(email: &str, size: u32) -> Result<()> {
    let gravatar = Gravatar::new(email)?;
    println!("{}", gravatar.url(size)?);
    Ok(())
}
