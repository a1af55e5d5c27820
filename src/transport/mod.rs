//! Transport seam between the session core and the ssh implementation.
//!
//! The session negotiator only talks to these traits. [`ssh`] provides the
//! production implementation; tests drive the core through scripted fakes.

use std::fmt;

use async_trait::async_trait;

use crate::config::SessionConfig;
use crate::error::{SessionError, TransportError};
use crate::terminal::Geometry;

pub mod ssh;

pub use ssh::RusshConnector;

/// Terminal modes sent with a pty request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TerminalModes {
    pub echo: bool,
    pub input_baud: u32,
    pub output_baud: u32,
}

impl TerminalModes {
    /// Echo on, both speeds set to `baud`.
    pub fn echo_with_baud(baud: u32) -> Self {
        Self {
            echo: true,
            input_baud: baud,
            output_baud: baud,
        }
    }
}

/// One remote pty request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PtyRequest {
    pub term: String,
    /// `(0, 0)` lets the remote side pick its default size.
    pub geometry: Geometry,
    pub modes: TerminalModes,
}

/// Signal named in an `exit-signal` channel request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteSignal {
    Abrt,
    Alrm,
    Fpe,
    Hup,
    Ill,
    Int,
    Kill,
    Pipe,
    Quit,
    Segv,
    Term,
    Usr1,
    Usr2,
    /// Any name outside the standard set.
    Other(String),
}

impl RemoteSignal {
    /// Parse a protocol signal name (`"KILL"`, no `SIG` prefix).
    pub fn from_name(name: &str) -> Self {
        match name {
            "ABRT" => Self::Abrt,
            "ALRM" => Self::Alrm,
            "FPE" => Self::Fpe,
            "HUP" => Self::Hup,
            "ILL" => Self::Ill,
            "INT" => Self::Int,
            "KILL" => Self::Kill,
            "PIPE" => Self::Pipe,
            "QUIT" => Self::Quit,
            "SEGV" => Self::Segv,
            "TERM" => Self::Term,
            "USR1" => Self::Usr1,
            "USR2" => Self::Usr2,
            other => Self::Other(other.to_string()),
        }
    }

    /// POSIX signal number; `None` for non-standard names.
    pub fn number(&self) -> Option<u8> {
        match self {
            Self::Hup => Some(1),
            Self::Int => Some(2),
            Self::Quit => Some(3),
            Self::Ill => Some(4),
            Self::Abrt => Some(6),
            Self::Fpe => Some(8),
            Self::Kill => Some(9),
            Self::Usr1 => Some(10),
            Self::Segv => Some(11),
            Self::Usr2 => Some(12),
            Self::Pipe => Some(13),
            Self::Alrm => Some(14),
            Self::Term => Some(15),
            Self::Other(_) => None,
        }
    }
}

impl fmt::Display for RemoteSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Abrt => "ABRT",
            Self::Alrm => "ALRM",
            Self::Fpe => "FPE",
            Self::Hup => "HUP",
            Self::Ill => "ILL",
            Self::Int => "INT",
            Self::Kill => "KILL",
            Self::Pipe => "PIPE",
            Self::Quit => "QUIT",
            Self::Segv => "SEGV",
            Self::Term => "TERM",
            Self::Usr1 => "USR1",
            Self::Usr2 => "USR2",
            Self::Other(name) => name.as_str(),
        };
        write!(f, "SIG{name}")
    }
}

/// Something the remote side sent on a session channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    Stdout(Vec<u8>),
    Stderr(Vec<u8>),
    ExitStatus(u32),
    /// Remote process was terminated by a signal.
    ExitSignal(RemoteSignal),
    /// Remote will send no more data.
    Eof,
    Closed,
}

/// Establishes authenticated connections.
#[async_trait]
pub trait Connector: Send + Sync {
    type Connection: Connection;

    /// Dial, handshake and authenticate within `config.connect_timeout`.
    ///
    /// Every failure is reported as [`SessionError::Connection`] naming the
    /// target.
    async fn connect(&self, config: &SessionConfig) -> Result<Self::Connection, SessionError>;
}

/// An authenticated connection to one host.
#[async_trait]
pub trait Connection: Send {
    type Channel: SessionChannel;

    async fn open_channel(&mut self) -> Result<Self::Channel, TransportError>;

    /// Disconnect. Called exactly once by the negotiator.
    async fn close(&mut self) -> Result<(), TransportError>;
}

/// One session channel on a [`Connection`].
#[async_trait]
pub trait SessionChannel: Send {
    /// Request a remote pty and wait for the server's verdict.
    async fn request_pty(&mut self, request: &PtyRequest) -> Result<(), TransportError>;

    /// Start `command` and wait for the server to accept it.
    async fn exec(&mut self, command: &str) -> Result<(), TransportError>;

    /// Start the login shell and wait for the server to accept it.
    async fn request_shell(&mut self) -> Result<(), TransportError>;

    async fn send_data(&mut self, data: &[u8]) -> Result<(), TransportError>;

    async fn send_eof(&mut self) -> Result<(), TransportError>;

    /// Tell the remote pty the local size changed. No reply is awaited.
    async fn window_change(&mut self, geometry: Geometry) -> Result<(), TransportError>;

    /// Next remote event; `None` once the channel is gone.
    async fn next_event(&mut self) -> Option<ChannelEvent>;

    async fn close(&mut self) -> Result<(), TransportError>;
}
