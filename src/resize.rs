//! Resize propagation: keeps the remote pty size in step with the local
//! terminal for the lifetime of an interactive session.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::terminal::{Geometry, LocalTerminal};

/// Poll period on platforms without a window-change signal.
#[cfg(not(unix))]
const GEOMETRY_POLL_INTERVAL: std::time::Duration = std::time::Duration::from_millis(500);

/// Spawn the resize task.
///
/// `changes` carries OS-level "size may have changed" notifications and
/// `refresh` the manual-refresh keystroke signal from the input relay. A
/// notification only produces a window change when the size differs from the
/// last one sent; a manual refresh always resends. The task stops when the
/// pump drops its end of `resize_tx`.
pub(crate) fn spawn_resize_propagator<T: LocalTerminal>(
    terminal: Arc<T>,
    initial: Geometry,
    mut changes: mpsc::Receiver<()>,
    mut refresh: mpsc::Receiver<()>,
    resize_tx: mpsc::Sender<Geometry>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut last_sent = initial;
        let mut changes_open = true;
        let mut refresh_open = true;
        loop {
            let forced = tokio::select! {
                _ = resize_tx.closed() => break,
                notified = changes.recv(), if changes_open => {
                    if notified.is_none() {
                        changes_open = false;
                        continue;
                    }
                    false
                }
                requested = refresh.recv(), if refresh_open => {
                    if requested.is_none() {
                        refresh_open = false;
                        continue;
                    }
                    true
                }
            };

            let geometry = match terminal.size() {
                Ok(geometry) => geometry,
                Err(e) => {
                    debug!(error = %e, "terminal size query failed; skipping resize");
                    continue;
                }
            };
            if !forced && geometry == last_sent {
                continue;
            }
            if resize_tx.send(geometry).await.is_err() {
                break;
            }
            last_sent = geometry;
        }
    })
}

/// Subscribe to local terminal size-change notifications.
///
/// Unix delivers `SIGWINCH`; elsewhere the terminal is polled and the
/// propagator filters out unchanged sizes. Notifications coalesce: at most
/// one is ever pending.
pub fn watch_geometry_changes() -> mpsc::Receiver<()> {
    let (tx, rx) = mpsc::channel(1);
    spawn_notifier(tx);
    rx
}

#[cfg(unix)]
fn spawn_notifier(tx: mpsc::Sender<()>) {
    use tokio::signal::unix::{signal, SignalKind};

    let mut winch = match signal(SignalKind::window_change()) {
        Ok(stream) => stream,
        Err(e) => {
            debug!(error = %e, "cannot watch SIGWINCH; resize propagation disabled");
            return;
        }
    };
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = tx.closed() => break,
                received = winch.recv() => {
                    if received.is_none() || notify(&tx) {
                        break;
                    }
                }
            }
        }
    });
}

#[cfg(not(unix))]
fn spawn_notifier(tx: mpsc::Sender<()>) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(GEOMETRY_POLL_INTERVAL);
        loop {
            tokio::select! {
                _ = tx.closed() => break,
                _ = ticker.tick() => {
                    if notify(&tx) {
                        break;
                    }
                }
            }
        }
    });
}

/// Queue one notification; true once the receiver is gone.
fn notify(tx: &mpsc::Sender<()>) -> bool {
    matches!(
        tx.try_send(()),
        Err(mpsc::error::TrySendError::Closed(()))
    )
}
