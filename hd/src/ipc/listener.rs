//! IPC listener helpers for the daemon side

use std::path::{Path, PathBuf};

use eyre::{Context, Result};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tracing::{debug, warn};

use super::messages::{DaemonMessage, DaemonResponse};

/// Create and bind a Unix Domain Socket listener
///
/// Creates the parent directory and removes a stale socket from a previous run.
pub fn create_listener_at(socket_path: &Path) -> Result<(UnixListener, PathBuf)> {
    debug!(?socket_path, "create_listener_at: creating IPC socket");

    if let Some(parent) = socket_path.parent() {
        std::fs::create_dir_all(parent).context("Failed to create socket directory")?;
    }

    if socket_path.exists() {
        debug!(?socket_path, "create_listener_at: removing stale socket");
        std::fs::remove_file(socket_path).context("Failed to remove stale socket")?;
    }

    let listener = UnixListener::bind(socket_path).context("Failed to bind IPC socket")?;
    debug!(?socket_path, "create_listener_at: socket bound successfully");

    Ok((listener, socket_path.to_path_buf()))
}

/// Remove the socket file on shutdown
pub fn cleanup_socket(socket_path: &Path) {
    if socket_path.exists() {
        debug!(?socket_path, "cleanup_socket: removing socket file");
        if let Err(e) = std::fs::remove_file(socket_path) {
            warn!(?socket_path, error = %e, "Failed to remove socket file");
        }
    }
}

/// Read one request line, rejecting lines longer than `max_size` bytes
pub async fn read_message(stream: &mut UnixStream, max_size: usize) -> Result<DaemonMessage> {
    let mut reader = BufReader::new(stream).take(max_size as u64 + 1);
    let mut buf = Vec::new();

    let bytes_read = reader
        .read_until(b'\n', &mut buf)
        .await
        .context("Failed to read IPC message")?;

    if bytes_read > max_size {
        return Err(eyre::eyre!("Message too large: more than {} bytes", max_size));
    }

    let line = String::from_utf8(buf).context("IPC message is not valid UTF-8")?;
    if line.trim().is_empty() {
        return Err(eyre::eyre!("Empty message received"));
    }

    let msg: DaemonMessage = serde_json::from_str(line.trim()).context("Failed to parse IPC message")?;
    debug!(?msg, "read_message: parsed message");

    Ok(msg)
}

/// Send a response on the stream
pub async fn send_response(stream: &mut UnixStream, response: &DaemonResponse) -> Result<()> {
    let response_json = serde_json::to_string(response).context("Failed to serialize response")?;
    stream
        .write_all(response_json.as_bytes())
        .await
        .context("Failed to write response")?;
    stream.write_all(b"\n").await.context("Failed to write newline")?;
    stream.flush().await.context("Failed to flush response")?;
    debug!(?response, "send_response: sent response");
    Ok(())
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[tokio::test]
    async fn test_create_listener_creates_parent_dir() {
        let temp = TempDir::new().unwrap();
        let socket_path = temp.path().join("subdir").join("daemon.sock");

        let (_, path) = create_listener_at(&socket_path).unwrap();
        assert_eq!(path, socket_path);
        assert!(socket_path.exists());
    }

    #[tokio::test]
    async fn test_create_listener_removes_stale_socket() {
        let temp = TempDir::new().unwrap();
        let socket_path = temp.path().join("daemon.sock");
        std::fs::write(&socket_path, "stale").unwrap();

        assert!(create_listener_at(&socket_path).is_ok());
    }

    #[test]
    fn test_cleanup_socket_removes_file() {
        let temp = TempDir::new().unwrap();
        let socket_path = temp.path().join("daemon.sock");
        std::fs::write(&socket_path, "test").unwrap();

        cleanup_socket(&socket_path);
        assert!(!socket_path.exists());

        // Missing file is not an error
        cleanup_socket(&socket_path);
    }

    #[tokio::test]
    async fn test_read_message_rejects_oversized_line() {
        let temp = TempDir::new().unwrap();
        let socket_path = temp.path().join("test.sock");
        let (listener, _) = create_listener_at(&socket_path).unwrap();

        let writer = tokio::spawn(async move {
            let mut stream = UnixStream::connect(&socket_path).await.unwrap();
            let big = format!("{{\"type\":\"HomeExists\",\"home\":\"{}\"}}\n", "a".repeat(512));
            stream.write_all(big.as_bytes()).await.unwrap();
        });

        let (mut stream, _) = listener.accept().await.unwrap();
        let err = read_message(&mut stream, 64).await.unwrap_err();
        assert!(err.to_string().contains("too large"));
        writer.await.unwrap();
    }

    #[tokio::test]
    async fn test_read_message_reports_size_when_cut_mid_character() {
        let temp = TempDir::new().unwrap();
        let socket_path = temp.path().join("test.sock");
        let (listener, _) = create_listener_at(&socket_path).unwrap();

        let writer = tokio::spawn(async move {
            let mut stream = UnixStream::connect(&socket_path).await.unwrap();
            // 1 ASCII byte then 2-byte characters, so the limit splits one in half
            let big = format!("{{{}\n", "é".repeat(100));
            stream.write_all(big.as_bytes()).await.unwrap();
        });

        let (mut stream, _) = listener.accept().await.unwrap();
        let err = read_message(&mut stream, 63).await.unwrap_err();
        assert!(err.to_string().contains("too large"));
        writer.await.unwrap();
    }

    #[tokio::test]
    async fn test_read_message_parses_request() {
        let temp = TempDir::new().unwrap();
        let socket_path = temp.path().join("test.sock");
        let (listener, _) = create_listener_at(&socket_path).unwrap();

        let writer = tokio::spawn(async move {
            let mut stream = UnixStream::connect(&socket_path).await.unwrap();
            stream.write_all(b"{\"type\":\"HomeCount\"}\n").await.unwrap();
        });

        let (mut stream, _) = listener.accept().await.unwrap();
        let msg = read_message(&mut stream, 1024).await.unwrap();
        assert_eq!(msg, DaemonMessage::HomeCount);
        writer.await.unwrap();
    }
}
