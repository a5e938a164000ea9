//! Errors raised by the page helpers.

/// Errors that can occur while building page fragments.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SiteError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid page URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Failed to render template: {0}")]
    TemplateError(String),
}
