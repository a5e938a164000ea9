//! CLI commands.

pub mod comments;
pub mod gravatar;
pub mod init;
pub mod run;
pub mod tasks;
