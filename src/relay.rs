//! I/O relay between local standard streams and a remote session channel.
//!
//! Interactive sessions run three concurrent flows:
//! - the primary pump (this module) owns the channel: it writes remote output
//!   to local stdout/stderr, drains the input pipe into the channel and applies
//!   window changes handed over by the resize task;
//! - the input-relay task reads local keystrokes, forwards every byte into the
//!   input pipe and signals the resize task when the refresh marker is seen;
//! - the resize task (see [`crate::resize`]).
//!
//! The input pipe has exactly one writer, so nothing here needs a lock.

use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::SessionError;
use crate::resize::{spawn_resize_propagator, watch_geometry_changes};
use crate::terminal::{Geometry, LocalTerminal};
use crate::transport::{ChannelEvent, SessionChannel};

/// Keystroke chunks buffered between the input task and the pump.
const INPUT_PIPE_DEPTH: usize = 64;
const INPUT_CHUNK_BYTES: usize = 1024;

/// Local process streams handed to a session.
pub struct LocalStreams {
    pub stdin: Box<dyn AsyncRead + Send + Unpin>,
    pub stdout: Box<dyn AsyncWrite + Send + Unpin>,
    pub stderr: Box<dyn AsyncWrite + Send + Unpin>,
    /// Fires whenever the local terminal may have changed size.
    pub geometry_changes: mpsc::Receiver<()>,
}

impl LocalStreams {
    /// The process's own stdio plus OS geometry-change notifications.
    pub fn process() -> Self {
        Self {
            stdin: Box::new(tokio::io::stdin()),
            stdout: Box::new(tokio::io::stdout()),
            stderr: Box::new(tokio::io::stderr()),
            geometry_changes: watch_geometry_changes(),
        }
    }
}

/// Remote → local writer. Each chunk is flushed as soon as it is written.
pub(crate) struct RemoteOutput {
    stdout: Box<dyn AsyncWrite + Send + Unpin>,
    stderr: Box<dyn AsyncWrite + Send + Unpin>,
}

impl RemoteOutput {
    pub(crate) fn new(
        stdout: Box<dyn AsyncWrite + Send + Unpin>,
        stderr: Box<dyn AsyncWrite + Send + Unpin>,
    ) -> Self {
        Self { stdout, stderr }
    }

    pub(crate) async fn stdout(&mut self, data: &[u8]) -> std::io::Result<()> {
        self.stdout.write_all(data).await?;
        self.stdout.flush().await
    }

    pub(crate) async fn stderr(&mut self, data: &[u8]) -> std::io::Result<()> {
        self.stderr.write_all(data).await?;
        self.stderr.flush().await
    }
}

/// Detects a marker byte sequence in a chunked stream, including matches
/// that straddle chunk boundaries.
#[derive(Debug, Clone)]
pub struct RefreshScanner {
    marker: Vec<u8>,
    /// Last `marker.len() - 1` bytes seen.
    tail: Vec<u8>,
}

impl RefreshScanner {
    /// An empty marker never matches.
    pub fn new(marker: Vec<u8>) -> Self {
        Self {
            marker,
            tail: Vec::new(),
        }
    }

    /// Feed the next chunk; true when the marker ends inside it.
    pub fn scan(&mut self, chunk: &[u8]) -> bool {
        if self.marker.is_empty() {
            return false;
        }
        let mut window = std::mem::take(&mut self.tail);
        window.extend_from_slice(chunk);
        let found = window
            .windows(self.marker.len())
            .any(|candidate| candidate == self.marker.as_slice());
        let keep = self.marker.len() - 1;
        let start = window.len().saturating_sub(keep);
        self.tail = window.split_off(start);
        found
    }
}

/// Spawn the input-relay task.
///
/// Every byte read from `stdin` goes into `input_tx` unchanged; on a refresh
/// marker the resize task is poked first. Dropping `input_tx` at local EOF
/// tells the pump to send channel EOF.
pub(crate) fn spawn_input_relay<R>(
    mut stdin: R,
    input_tx: mpsc::Sender<Vec<u8>>,
    refresh_tx: mpsc::Sender<()>,
    mut scanner: RefreshScanner,
) -> JoinHandle<()>
where
    R: AsyncRead + Send + Unpin + 'static,
{
    tokio::spawn(async move {
        let mut buf = [0u8; INPUT_CHUNK_BYTES];
        loop {
            let n = match stdin.read(&mut buf).await {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) => {
                    debug!(error = %e, "local input read failed");
                    break;
                }
            };
            let chunk = &buf[..n];
            if scanner.scan(chunk) {
                // A pending refresh already covers this one.
                let _ = refresh_tx.try_send(());
            }
            if input_tx.send(chunk.to_vec()).await.is_err() {
                break;
            }
        }
    })
}

/// Run an interactive shell on a channel whose pty is already negotiated.
///
/// Returns once the remote side closes the channel.
pub(crate) async fn run_interactive<C, T>(
    channel: &mut C,
    streams: LocalStreams,
    terminal: Arc<T>,
    geometry: Geometry,
    refresh_marker: &[u8],
) -> Result<(), SessionError>
where
    C: SessionChannel,
    T: LocalTerminal,
{
    let LocalStreams {
        stdin,
        stdout,
        stderr,
        geometry_changes,
    } = streams;
    let mut output = RemoteOutput::new(stdout, stderr);

    let (input_tx, input_rx) = mpsc::channel::<Vec<u8>>(INPUT_PIPE_DEPTH);
    let (refresh_tx, refresh_rx) = mpsc::channel::<()>(1);
    let (resize_tx, resize_rx) = mpsc::channel::<Geometry>(4);

    channel
        .request_shell()
        .await
        .map_err(SessionError::ShellStart)?;

    let input_task = spawn_input_relay(
        stdin,
        input_tx,
        refresh_tx,
        RefreshScanner::new(refresh_marker.to_vec()),
    );
    let resize_task =
        spawn_resize_propagator(terminal, geometry, geometry_changes, refresh_rx, resize_tx);

    let result = pump(channel, &mut output, input_rx, resize_rx).await;

    input_task.abort();
    resize_task.abort();
    result
}

async fn pump<C: SessionChannel>(
    channel: &mut C,
    output: &mut RemoteOutput,
    mut input_rx: mpsc::Receiver<Vec<u8>>,
    mut resize_rx: mpsc::Receiver<Geometry>,
) -> Result<(), SessionError> {
    let mut input_open = true;
    loop {
        tokio::select! {
            event = channel.next_event() => match event {
                Some(ChannelEvent::Stdout(data)) => output.stdout(&data).await?,
                Some(ChannelEvent::Stderr(data)) => output.stderr(&data).await?,
                Some(ChannelEvent::Closed) | None => break,
                Some(other) => debug!(event = ?other, "remote shell event"),
            },
            chunk = input_rx.recv(), if input_open => match chunk {
                Some(bytes) => channel
                    .send_data(&bytes)
                    .await
                    .map_err(SessionError::Channel)?,
                None => {
                    input_open = false;
                    if let Err(e) = channel.send_eof().await {
                        debug!(error = %e, "sending eof failed");
                    }
                }
            },
            Some(geometry) = resize_rx.recv() => {
                match channel.window_change(geometry).await {
                    Ok(()) => debug!(cols = geometry.cols, rows = geometry.rows, "window change sent"),
                    Err(e) => warn!(error = %e, "window change failed"),
                }
            }
        }
    }
    Ok(())
}
