//! Shared test fixtures for config, terminal, relay and session test modules.
//!
//! The fakes here stand in for the local terminal and the ssh transport so
//! session behavior can be driven deterministically without a server.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::io::AsyncWrite;

use crate::config::SessionConfig;
use crate::error::{SessionError, TransportError};
use crate::terminal::{Geometry, LocalTerminal};
use crate::transport::{ChannelEvent, Connection, Connector, PtyRequest, SessionChannel, TerminalModes};

static TEST_DIR_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Temporary directory fixture with best-effort cleanup.
#[derive(Debug)]
pub struct TestTempDir {
    path: PathBuf,
}

impl TestTempDir {
    /// Create a unique temporary directory with a readable prefix.
    pub fn new(prefix: &str) -> Self {
        let suffix = TEST_DIR_COUNTER.fetch_add(1, Ordering::Relaxed);
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis();
        let dir = std::env::temp_dir().join(format!("ssh-client-{prefix}-{millis}-{suffix}"));
        fs::create_dir_all(&dir).expect("failed to create temporary fixture directory");
        Self { path: dir }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn child(&self, relative: &str) -> PathBuf {
        self.path.join(relative)
    }

    /// Write UTF-8 text to a child path, creating parent directories as needed.
    pub fn write_text(&self, relative: &str, content: &str) -> PathBuf {
        let path = self.child(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("failed to create parent directories for fixture");
        }
        fs::write(&path, content).expect("failed to write fixture file");
        path
    }
}

impl Drop for TestTempDir {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.path);
    }
}

// ---------------------------------------------------------------------------
// Local terminal
// ---------------------------------------------------------------------------

/// Scriptable [`LocalTerminal`] that counts raw-mode transitions.
#[derive(Debug, Default)]
pub struct FakeTerminal {
    size: Mutex<Option<Geometry>>,
    no_tty: bool,
    fail_raw_mode: bool,
    raw_enables: AtomicUsize,
    raw_restores: AtomicUsize,
    size_queries: AtomicUsize,
    raw: AtomicBool,
}

impl FakeTerminal {
    /// `None` makes every size query fail.
    pub fn new(size: Option<Geometry>) -> Self {
        Self {
            size: Mutex::new(size),
            ..Self::default()
        }
    }

    pub fn without_tty(mut self) -> Self {
        self.no_tty = true;
        self
    }

    pub fn failing_raw_mode(mut self) -> Self {
        self.fail_raw_mode = true;
        self
    }

    pub fn set_size(&self, size: Option<Geometry>) {
        *self.size.lock().unwrap() = size;
    }

    pub fn raw_enables(&self) -> usize {
        self.raw_enables.load(Ordering::SeqCst)
    }

    pub fn raw_restores(&self) -> usize {
        self.raw_restores.load(Ordering::SeqCst)
    }

    pub fn size_queries(&self) -> usize {
        self.size_queries.load(Ordering::SeqCst)
    }

    pub fn is_raw(&self) -> bool {
        self.raw.load(Ordering::SeqCst)
    }
}

impl LocalTerminal for FakeTerminal {
    fn open(&self) -> io::Result<()> {
        if self.no_tty {
            return Err(io::Error::new(io::ErrorKind::Unsupported, "not a terminal"));
        }
        Ok(())
    }

    fn size(&self) -> io::Result<Geometry> {
        self.size_queries.fetch_add(1, Ordering::SeqCst);
        self.size
            .lock()
            .unwrap()
            .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "size unavailable"))
    }

    fn enable_raw_mode(&self) -> io::Result<()> {
        if self.fail_raw_mode {
            return Err(io::Error::new(io::ErrorKind::Other, "raw mode refused"));
        }
        self.raw_enables.fetch_add(1, Ordering::SeqCst);
        self.raw.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn disable_raw_mode(&self) -> io::Result<()> {
        self.raw_restores.fetch_add(1, Ordering::SeqCst);
        self.raw.store(false, Ordering::SeqCst);
        Ok(())
    }
}

/// In-memory `AsyncWrite` sink whose contents stay readable after the writer
/// is handed off.
#[derive(Debug, Clone, Default)]
pub struct SharedBuffer {
    inner: Arc<Mutex<Vec<u8>>>,
}

impl SharedBuffer {
    pub fn contents(&self) -> Vec<u8> {
        self.inner.lock().unwrap().clone()
    }
}

impl AsyncWrite for SharedBuffer {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        self.inner.lock().unwrap().extend_from_slice(buf);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

// ---------------------------------------------------------------------------
// Transport
// ---------------------------------------------------------------------------

/// One observable transport operation. Channels are numbered in open order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Connect(String),
    OpenChannel(usize),
    RequestPty {
        channel: usize,
        term: String,
        geometry: Geometry,
        modes: TerminalModes,
    },
    Exec(usize, String),
    Shell(usize),
    Data(usize, Vec<u8>),
    Eof(usize),
    WindowChange(usize, Geometry),
    CloseChannel(usize),
    CloseConnection,
}

/// Shared, append-only record of [`Call`]s.
#[derive(Debug, Clone, Default)]
pub struct CallLog {
    calls: Arc<Mutex<Vec<Call>>>,
}

impl CallLog {
    fn push(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    pub fn snapshot(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }
}

/// Behavior of one fake channel.
///
/// Scripted `events` are delivered in order. Once they run out the channel
/// reports `Closed`, unless `hold_until_eof` is set: then it stays silent
/// until local EOF has been sent and at least `min_window_changes` window
/// changes were received.
#[derive(Debug, Clone, Default)]
pub struct ChannelScript {
    pub refuse_pty: bool,
    pub refuse_shell: bool,
    pub refuse_exec: bool,
    pub events: Vec<ChannelEvent>,
    pub hold_until_eof: bool,
    pub min_window_changes: usize,
}

/// [`Connector`] handing out one [`ChannelScript`] per opened channel.
#[derive(Debug, Default)]
pub struct FakeConnector {
    scripts: Mutex<Option<VecDeque<ChannelScript>>>,
    refuse_connect: bool,
    fail_open_at: Option<usize>,
    log: CallLog,
}

impl FakeConnector {
    pub fn new(scripts: Vec<ChannelScript>) -> Self {
        Self {
            scripts: Mutex::new(Some(scripts.into())),
            ..Self::default()
        }
    }

    pub fn refusing_connections(mut self) -> Self {
        self.refuse_connect = true;
        self
    }

    /// Fail the channel open with this index.
    pub fn failing_channel_open(mut self, index: usize) -> Self {
        self.fail_open_at = Some(index);
        self
    }

    pub fn calls(&self) -> CallLog {
        self.log.clone()
    }
}

#[async_trait]
impl Connector for FakeConnector {
    type Connection = FakeConnection;

    async fn connect(&self, config: &SessionConfig) -> Result<FakeConnection, SessionError> {
        let target = config.target();
        self.log.push(Call::Connect(target.clone()));
        if self.refuse_connect {
            return Err(SessionError::Connection {
                target,
                source: TransportError::Io(io::Error::new(
                    io::ErrorKind::ConnectionRefused,
                    "connection refused",
                )),
            });
        }
        let scripts = self.scripts.lock().unwrap().take().unwrap_or_default();
        Ok(FakeConnection {
            scripts,
            opened: 0,
            fail_open_at: self.fail_open_at,
            log: self.log.clone(),
        })
    }
}

#[derive(Debug)]
pub struct FakeConnection {
    scripts: VecDeque<ChannelScript>,
    opened: usize,
    fail_open_at: Option<usize>,
    log: CallLog,
}

#[async_trait]
impl Connection for FakeConnection {
    type Channel = FakeChannel;

    async fn open_channel(&mut self) -> Result<FakeChannel, TransportError> {
        let id = self.opened;
        self.opened += 1;
        if self.fail_open_at == Some(id) {
            return Err(TransportError::Rejected("session open".into()));
        }
        let script = self.scripts.pop_front().unwrap_or_default();
        self.log.push(Call::OpenChannel(id));
        Ok(FakeChannel {
            id,
            events: script.events.clone().into(),
            script,
            eof_sent: false,
            window_changes: 0,
            log: self.log.clone(),
        })
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.log.push(Call::CloseConnection);
        Ok(())
    }
}

#[derive(Debug)]
pub struct FakeChannel {
    id: usize,
    script: ChannelScript,
    events: VecDeque<ChannelEvent>,
    eof_sent: bool,
    window_changes: usize,
    log: CallLog,
}

impl FakeChannel {
    fn verdict(refused: bool, what: &str) -> Result<(), TransportError> {
        if refused {
            Err(TransportError::Rejected(what.into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl SessionChannel for FakeChannel {
    async fn request_pty(&mut self, request: &PtyRequest) -> Result<(), TransportError> {
        self.log.push(Call::RequestPty {
            channel: self.id,
            term: request.term.clone(),
            geometry: request.geometry,
            modes: request.modes,
        });
        Self::verdict(self.script.refuse_pty, "pty")
    }

    async fn exec(&mut self, command: &str) -> Result<(), TransportError> {
        self.log.push(Call::Exec(self.id, command.to_string()));
        Self::verdict(self.script.refuse_exec, "exec")
    }

    async fn request_shell(&mut self) -> Result<(), TransportError> {
        self.log.push(Call::Shell(self.id));
        Self::verdict(self.script.refuse_shell, "shell")
    }

    async fn send_data(&mut self, data: &[u8]) -> Result<(), TransportError> {
        self.log.push(Call::Data(self.id, data.to_vec()));
        Ok(())
    }

    async fn send_eof(&mut self) -> Result<(), TransportError> {
        self.log.push(Call::Eof(self.id));
        self.eof_sent = true;
        Ok(())
    }

    async fn window_change(&mut self, geometry: Geometry) -> Result<(), TransportError> {
        self.log.push(Call::WindowChange(self.id, geometry));
        self.window_changes += 1;
        Ok(())
    }

    async fn next_event(&mut self) -> Option<ChannelEvent> {
        if let Some(event) = self.events.pop_front() {
            return Some(event);
        }
        if self.script.hold_until_eof
            && (!self.eof_sent || self.window_changes < self.script.min_window_changes)
        {
            // State only changes through the other methods, which the pump
            // calls after dropping this future.
            std::future::pending::<()>().await;
        }
        Some(ChannelEvent::Closed)
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.log.push(Call::CloseChannel(self.id));
        Ok(())
    }
}
