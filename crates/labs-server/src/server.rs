//! Development server for the generated site.

use std::net::SocketAddr;
use std::path::PathBuf;

use axum::{
    body::Body,
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    http::{header, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast::error::RecvError;
use tower_http::services::ServeDir;

use crate::hub::{reload_client_script, ReloadHub, ReloadMessage, RELOAD_SCRIPT_PATH, RELOAD_SOCKET_PATH};

/// Pages larger than this are served without the reload script.
const MAX_INJECT_BYTES: usize = 16 * 1024 * 1024;

/// Configuration for the development server.
#[derive(Debug, Clone)]
pub struct DevServerConfig {
    /// Directory the site generator writes to
    pub root: PathBuf,

    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Open browser on start
    pub open: bool,
}

impl Default for DevServerConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("build"),
            host: "127.0.0.1".to_string(),
            port: 4060,
            open: true,
        }
    }
}

/// Errors that can occur with the server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Invalid listen address: {0}")]
    InvalidAddress(String),

    #[error("Failed to bind to {0}: {1}")]
    BindError(String, String),

    #[error("Server error: {0}")]
    ServeError(String),

    #[error("File watch error: {0}")]
    WatchError(String),
}

/// Development server.
pub struct DevServer {
    config: DevServerConfig,
    hub: ReloadHub,
}

impl DevServer {
    /// Create a new development server.
    pub fn new(config: DevServerConfig, hub: ReloadHub) -> Self {
        Self { config, hub }
    }

    /// Bind the listening socket.
    ///
    /// Binding is separate from serving so a taken port is reported while
    /// the task that starts the server is still running.
    pub async fn bind(self) -> Result<BoundServer, ServerError> {
        let addr: SocketAddr = format!("{}:{}", self.config.host, self.config.port)
            .parse()
            .map_err(|_| {
                ServerError::InvalidAddress(format!("{}:{}", self.config.host, self.config.port))
            })?;

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::BindError(addr.to_string(), e.to_string()))?;

        let local_addr = listener
            .local_addr()
            .map_err(|e| ServerError::BindError(addr.to_string(), e.to_string()))?;

        if !self.config.root.exists() {
            tracing::warn!(
                "{} does not exist yet; pages will 404 until the site is built",
                self.config.root.display()
            );
        }

        Ok(BoundServer {
            listener,
            local_addr,
            app: router(self.config.root.clone(), self.hub),
            open: self.config.open,
        })
    }
}

/// A server whose socket is bound but not yet accepting.
pub struct BoundServer {
    listener: TcpListener,
    local_addr: SocketAddr,
    app: Router,
    open: bool,
}

impl BoundServer {
    /// Address actually bound, useful with port 0.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// URL of the served site.
    pub fn url(&self) -> String {
        format!("http://{}", self.local_addr)
    }

    /// Accept connections until the process exits.
    pub async fn serve(self) -> Result<(), ServerError> {
        let url = self.url();
        tracing::info!("Serving site at {}", url);

        if self.open {
            let _ = open::that(&url);
        }

        axum::serve(self.listener, self.app)
            .await
            .map_err(|e| ServerError::ServeError(e.to_string()))
    }
}

fn router(root: PathBuf, hub: ReloadHub) -> Router {
    Router::new()
        .route(RELOAD_SOCKET_PATH, get(ws_handler))
        .route(RELOAD_SCRIPT_PATH, get(script_handler))
        .fallback_service(ServeDir::new(root))
        .layer(middleware::map_response(inject_into_html))
        .with_state(hub)
}

/// Handler for the reload WebSocket endpoint.
async fn ws_handler(ws: WebSocketUpgrade, State(hub): State<ReloadHub>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_ws(socket, hub))
}

/// Forward hub messages to one browser until it disconnects.
async fn handle_ws(mut socket: WebSocket, hub: ReloadHub) {
    let mut rx = hub.subscribe();

    if send_message(&mut socket, &ReloadMessage::Connected).await.is_err() {
        return;
    }

    loop {
        match rx.recv().await {
            Ok(msg) => {
                if send_message(&mut socket, &msg).await.is_err() {
                    break;
                }
            }
            Err(RecvError::Lagged(skipped)) => {
                tracing::debug!("Reload client lagged by {} messages", skipped);
            }
            Err(RecvError::Closed) => break,
        }
    }
}

async fn send_message(socket: &mut WebSocket, msg: &ReloadMessage) -> Result<(), ()> {
    let json = serde_json::to_string(msg).map_err(|_| ())?;
    socket.send(Message::Text(json.into())).await.map_err(|_| ())
}

/// Handler for the reload client script.
async fn script_handler() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "application/javascript")],
        reload_client_script(),
    )
}

/// Add the reload script to every successful HTML response.
async fn inject_into_html(response: Response) -> Response {
    let is_html = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("text/html"));

    if response.status() != StatusCode::OK || !is_html {
        return response;
    }

    let (mut parts, body) = response.into_parts();
    let bytes = match axum::body::to_bytes(body, MAX_INJECT_BYTES).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!("Failed to buffer page for reload injection: {}", e);
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let html = inject_script_tag(&String::from_utf8_lossy(&bytes));
    parts.headers.remove(header::CONTENT_LENGTH);

    Response::from_parts(parts, Body::from(html))
}

/// Insert the reload `<script>` before the last `</body>`, or append it.
pub fn inject_script_tag(html: &str) -> String {
    let tag = format!(r#"<script src="{}" async></script>"#, RELOAD_SCRIPT_PATH);

    match html.to_ascii_lowercase().rfind("</body>") {
        Some(pos) => {
            let mut out = String::with_capacity(html.len() + tag.len());
            out.push_str(&html[..pos]);
            out.push_str(&tag);
            out.push_str(&html[pos..]);
            out
        }
        None => format!("{}{}", html, tag),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;

    #[test]
    fn default_config_matches_site_port() {
        let config = DevServerConfig::default();
        assert_eq!(config.port, 4060);
        assert_eq!(config.root, PathBuf::from("build"));
    }

    #[test]
    fn injects_before_closing_body() {
        let html = inject_script_tag("<html><BODY><p>Hi</p></BODY></html>");

        assert_eq!(
            html,
            r#"<html><BODY><p>Hi</p><script src="/__labs/reload.js" async></script></BODY></html>"#
        );
    }

    #[test]
    fn appends_when_body_is_missing() {
        let html = inject_script_tag("<p>fragment</p>");
        assert!(html.ends_with(r#"<script src="/__labs/reload.js" async></script>"#));
    }

    async fn get(addr: SocketAddr, path: &str) -> String {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        let request = format!(
            "GET {} HTTP/1.1\r\nHost: {}\r\nConnection: close\r\n\r\n",
            path, addr
        );
        stream.write_all(request.as_bytes()).await.unwrap();

        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();
        response
    }

    #[tokio::test]
    async fn serves_site_with_reload_script() {
        let temp = tempdir().unwrap();
        fs::write(
            temp.path().join("index.html"),
            "<html><body><h1>Labs</h1></body></html>",
        )
        .unwrap();
        fs::write(temp.path().join("logo.svg"), "<svg/>").unwrap();

        let config = DevServerConfig {
            root: temp.path().to_path_buf(),
            port: 0,
            open: false,
            ..Default::default()
        };
        let server = DevServer::new(config, ReloadHub::new()).bind().await.unwrap();
        let addr = server.local_addr();
        assert_ne!(addr.port(), 0);
        tokio::spawn(server.serve());

        let page = get(addr, "/").await;
        assert!(page.starts_with("HTTP/1.1 200"));
        assert!(page.contains("<h1>Labs</h1><script src=\"/__labs/reload.js\" async></script></body>"));

        let svg = get(addr, "/logo.svg").await;
        assert!(svg.ends_with("<svg/>"));

        let script = get(addr, "/__labs/reload.js").await;
        assert!(script.contains("application/javascript"));
    }

    #[tokio::test]
    async fn reports_taken_port() {
        let first = DevServer::new(
            DevServerConfig {
                port: 0,
                open: false,
                ..Default::default()
            },
            ReloadHub::new(),
        )
        .bind()
        .await
        .unwrap();

        let second = DevServer::new(
            DevServerConfig {
                port: first.local_addr().port(),
                open: false,
                ..Default::default()
            },
            ReloadHub::new(),
        )
        .bind()
        .await;

        assert!(matches!(second, Err(ServerError::BindError(..))));
    }
}
