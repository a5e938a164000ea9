//! Live-reload development server for the labs site.
//!
//! Serves the generated site, pushes reload and notification messages to
//! connected browsers over a WebSocket, and watches the source tree for
//! changes.

pub mod actions;
pub mod hub;
pub mod server;
pub mod watcher;

pub use actions::{NotifyAction, ReloadAction, ServeAction, WatchAction};
pub use hub::{ReloadHub, ReloadMessage};
pub use server::{BoundServer, DevServer, DevServerConfig, ServerError};
pub use watcher::{FileWatcher, WatchEvent};
