//! Page helpers for the labs site.
//!
//! Avatar URLs for authors, canonical page identities for comment threads,
//! and the responsive about-panel toggle that drives the index page.

pub mod comments;
pub mod error;
pub mod gravatar;
pub mod toggle;

pub use comments::{CommentThread, PageIdentity};
pub use error::SiteError;
pub use gravatar::{gravatar_url, gravatar_url_default, Gravatar, DEFAULT_SIZE};
pub use toggle::{AboutToggle, Page, PanelState, ToggleConfig, ToggleOutcome, Viewport};
