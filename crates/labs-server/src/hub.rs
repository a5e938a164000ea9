//! WebSocket-based live reload.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Path of the reload WebSocket.
pub const RELOAD_SOCKET_PATH: &str = "/__labs/reload";

/// Path of the client script injected into served pages.
pub const RELOAD_SCRIPT_PATH: &str = "/__labs/reload.js";

/// Messages pushed to connected browsers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReloadMessage {
    /// Full page reload
    Reload,

    /// Show a transient banner, e.g. while the site is rebuilding
    Notify { message: String },

    /// Connection established
    Connected,
}

/// Hub for broadcasting reload messages to all connected clients.
#[derive(Debug, Clone)]
pub struct ReloadHub {
    sender: broadcast::Sender<ReloadMessage>,
}

impl ReloadHub {
    /// Create a new reload hub.
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(100);
        Self { sender }
    }

    /// Send a message to all connected clients.
    pub fn send(&self, msg: ReloadMessage) {
        // Ignore send errors (no receivers)
        let _ = self.sender.send(msg);
    }

    /// Show `message` in every connected browser.
    pub fn notify(&self, message: impl Into<String>) {
        self.send(ReloadMessage::Notify {
            message: message.into(),
        });
    }

    /// Reload every connected browser.
    pub fn reload(&self) {
        self.send(ReloadMessage::Reload);
    }

    /// Subscribe to reload messages.
    pub fn subscribe(&self) -> broadcast::Receiver<ReloadMessage> {
        self.sender.subscribe()
    }

    /// Number of connected clients.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for ReloadHub {
    fn default() -> Self {
        Self::new()
    }
}

/// The client-side reload script.
///
/// Connects back to the serving host, so it works behind any port.
pub fn reload_client_script() -> String {
    format!(
        r#"
(function() {{
  'use strict';

  var scheme = location.protocol === 'https:' ? 'wss://' : 'ws://';
  var ws = new WebSocket(scheme + location.host + '{}');
  var banner = null;
  var bannerTimer = null;

  function notify(message) {{
    if (!banner) {{
      banner = document.createElement('div');
      banner.style.cssText = 'position:fixed;top:0;right:0;z-index:9999;' +
        'padding:12px 16px;background:#1b2032;color:#fff;' +
        'font:14px/1.4 sans-serif;border-bottom-left-radius:5px;';
      document.body.appendChild(banner);
    }}
    banner.textContent = message;
    banner.style.display = 'block';
    clearTimeout(bannerTimer);
    bannerTimer = setTimeout(function() {{ banner.style.display = 'none'; }}, 2000);
  }}

  ws.onmessage = function(event) {{
    var msg = JSON.parse(event.data);

    switch (msg.type) {{
      case 'reload':
        location.reload();
        break;
      case 'notify':
        notify(msg.message);
        break;
      case 'connected':
        console.log('[labs] Live reload connected');
        break;
    }}
  }};

  ws.onclose = function() {{
    console.log('[labs] Live reload disconnected');
  }};
}})();
"#,
        RELOAD_SOCKET_PATH
    )
}
