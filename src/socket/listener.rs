//! Unix socket listener.

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{Notify, OwnedSemaphorePermit, Semaphore};
use tracing::{debug, error, info, warn};

use crate::commands::Dispatcher;
use crate::config::Settings;
use crate::error::{AgentError, ProtocolErrorKind};

use super::handle_connection;

/// Request and connection counters shared by all connection tasks.
#[derive(Debug, Default)]
pub struct ConnectionMetrics {
    requests_total: AtomicU64,
    requests_failed: AtomicU64,
    active_connections: AtomicUsize,
}

impl ConnectionMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one answered request. A response without a result code counts
    /// as a success.
    pub fn record_request(&self, success: bool) {
        self.requests_total.fetch_add(1, Ordering::Relaxed);
        if !success {
            self.requests_failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn total_requests(&self) -> u64 {
        self.requests_total.load(Ordering::Relaxed)
    }

    pub fn failed_requests(&self) -> u64 {
        self.requests_failed.load(Ordering::Relaxed)
    }

    pub fn active(&self) -> usize {
        self.active_connections.load(Ordering::Relaxed)
    }
}

/// Counts a connection as active for as long as it lives, including when
/// its task unwinds.
struct ActiveConnection(Arc<ConnectionMetrics>);

impl ActiveConnection {
    fn enter(metrics: Arc<ConnectionMetrics>) -> Self {
        metrics.active_connections.fetch_add(1, Ordering::Relaxed);
        Self(metrics)
    }
}

impl Drop for ActiveConnection {
    fn drop(&mut self) {
        self.0.active_connections.fetch_sub(1, Ordering::Relaxed);
    }
}

fn socket_error(message: String) -> AgentError {
    AgentError::Socket { message }
}

/// Clear a stale socket file and make sure the parent directory exists.
/// A symlink at `path` is never followed or removed.
fn prepare_socket_path(path: &Path) -> Result<(), AgentError> {
    if let Ok(metadata) = fs::symlink_metadata(path) {
        if metadata.file_type().is_symlink() {
            return Err(socket_error(format!(
                "Socket path {} is a symlink, refusing to remove",
                path.display()
            )));
        }
        fs::remove_file(path).map_err(|e| {
            socket_error(format!(
                "Failed to remove stale socket {}: {}",
                path.display(),
                e
            ))
        })?;
        debug!(path = %path.display(), "Removed stale socket");
    }

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| {
            socket_error(format!(
                "Failed to create socket directory {}: {}",
                parent.display(),
                e
            ))
        })?;
    }

    Ok(())
}

/// Apply an octal mode string such as `"0660"` to the socket file.
fn apply_permissions(path: &Path, mode: &str) -> Result<(), AgentError> {
    let mode = u32::from_str_radix(mode, 8)
        .map_err(|e| socket_error(format!("Invalid socket permissions '{}': {}", mode, e)))?;

    fs::set_permissions(path, fs::Permissions::from_mode(mode)).map_err(|e| {
        socket_error(format!(
            "Failed to set permissions on {}: {}",
            path.display(),
            e
        ))
    })
}

/// Accepts connections and serves each on its own task.
pub struct SocketListener {
    listener: UnixListener,
    settings: Arc<Settings>,
    dispatcher: Dispatcher,
    metrics: Arc<ConnectionMetrics>,
    slots: Arc<Semaphore>,
}

impl SocketListener {
    /// Bind the configured socket path and serve `dispatcher` on it.
    pub async fn bind(settings: Arc<Settings>, dispatcher: Dispatcher) -> Result<Self, AgentError> {
        let path = &settings.socket.path;
        prepare_socket_path(path)?;

        let listener = UnixListener::bind(path)
            .map_err(|e| socket_error(format!("Failed to bind {}: {}", path.display(), e)))?;
        apply_permissions(path, &settings.socket.permissions)?;

        info!(
            path = %path.display(),
            max_connections = settings.limits.max_concurrent_connections,
            commands = dispatcher.registry().len(),
            "Socket listener bound"
        );

        Ok(Self {
            listener,
            slots: Arc::new(Semaphore::new(settings.limits.max_concurrent_connections)),
            settings,
            dispatcher,
            metrics: Arc::new(ConnectionMetrics::new()),
        })
    }

    /// Accept connections until `shutdown` is notified.
    ///
    /// Connections already being served are left running; see
    /// [`wait_for_drain`](Self::wait_for_drain).
    pub async fn run(&self, shutdown: Arc<Notify>) -> Result<(), AgentError> {
        info!("Socket listener running");

        loop {
            tokio::select! {
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, _addr)) => self.serve(stream),
                    Err(e) => warn!(error = %e, "Failed to accept connection"),
                },
                _ = shutdown.notified() => {
                    info!("Listener stopping");
                    return Ok(());
                }
            }
        }
    }

    /// Serve `stream` on a new task, or drop it when every slot is taken.
    fn serve(&self, stream: UnixStream) {
        let permit: OwnedSemaphorePermit = match Arc::clone(&self.slots).try_acquire_owned() {
            Ok(permit) => permit,
            Err(_) => {
                warn!(
                    max = self.settings.limits.max_concurrent_connections,
                    "Connection limit reached, rejecting connection"
                );
                return;
            }
        };

        let active = ActiveConnection::enter(Arc::clone(&self.metrics));
        debug!(active = self.metrics.active(), "Connection accepted");

        let settings = Arc::clone(&self.settings);
        let dispatcher = self.dispatcher.clone();
        let metrics = Arc::clone(&self.metrics);

        tokio::spawn(async move {
            let _permit = permit;
            let _active = active;
            match handle_connection(stream, settings, dispatcher, metrics).await {
                Ok(())
                | Err(AgentError::Protocol {
                    kind: ProtocolErrorKind::ConnectionClosed,
                }) => debug!("Connection closed"),
                Err(e) => error!(error = %e, "Connection handler error"),
            }
        });
    }

    /// Wait until no connection is active.
    pub async fn wait_for_drain(&self) {
        while self.metrics.active() > 0 {
            debug!(active = self.metrics.active(), "Waiting for connections to drain");
            tokio::time::sleep(Duration::from_millis(100)).await;
        }

        info!(
            requests = self.metrics.total_requests(),
            failed = self.metrics.failed_requests(),
            "All connections drained"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::symlink;

    use tempfile::TempDir;

    #[test]
    fn test_metrics_counting() {
        let metrics = ConnectionMetrics::new();
        metrics.record_request(true);
        metrics.record_request(false);
        assert_eq!(metrics.total_requests(), 2);
        assert_eq!(metrics.failed_requests(), 1);
    }

    #[test]
    fn test_active_connection_guard() {
        let metrics = Arc::new(ConnectionMetrics::new());
        {
            let _a = ActiveConnection::enter(Arc::clone(&metrics));
            let _b = ActiveConnection::enter(Arc::clone(&metrics));
            assert_eq!(metrics.active(), 2);
        }
        assert_eq!(metrics.active(), 0);
    }

    #[test]
    fn test_prepare_removes_stale_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("run").join("agent.sock");
        prepare_socket_path(&path).unwrap();
        assert!(path.parent().unwrap().is_dir());

        fs::write(&path, b"stale").unwrap();
        prepare_socket_path(&path).unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn test_prepare_refuses_symlink() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("target");
        fs::write(&target, b"keep").unwrap();
        let path = dir.path().join("agent.sock");
        symlink(&target, &path).unwrap();

        assert!(matches!(
            prepare_socket_path(&path),
            Err(AgentError::Socket { .. })
        ));
        assert!(target.exists());
    }

    #[test]
    fn test_invalid_permissions() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("file");
        fs::write(&path, b"").unwrap();

        assert!(apply_permissions(&path, "0600").is_ok());
        assert_eq!(
            fs::metadata(&path).unwrap().permissions().mode() & 0o777,
            0o600
        );
        assert!(matches!(
            apply_permissions(&path, "rw-rw----"),
            Err(AgentError::Socket { .. })
        ));
    }
}
