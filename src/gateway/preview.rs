//! Dev-server preview detection for the dashboard's embedded browser pane.

use crate::config::{PreviewConfig, PreviewMode};
use std::time::Duration;
use tokio::net::TcpStream;

/// Connect window per probed port.
const PROBE_TIMEOUT: Duration = Duration::from_millis(300);

/// Resolve the URL of a locally running dev server, if any.
///
/// Fixed mode with a non-empty URL reports it without probing; otherwise
/// the configured ports are tried on localhost in order and the first one
/// with a listener wins.
pub async fn detect_dev_url(preview: &PreviewConfig) -> Option<String> {
    if preview.mode == PreviewMode::Fixed {
        if let Some(url) = preview.url.as_deref() {
            if !url.is_empty() {
                return Some(url.to_string());
            }
        }
    }
    for &port in &preview.ports {
        if port_open(port).await {
            return Some(format!("http://127.0.0.1:{port}"));
        }
    }
    None
}

async fn port_open(port: u16) -> bool {
    matches!(
        tokio::time::timeout(PROBE_TIMEOUT, TcpStream::connect(("127.0.0.1", port))).await,
        Ok(Ok(_))
    )
}
