//! Classified error types for configuration, transport and session setup.

use std::fmt;

// ---------------------------------------------------------------------------
// ConfigError
// ---------------------------------------------------------------------------

/// Errors raised while resolving configuration, before any connection attempt.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Toml(toml::de::Error),
    /// `--b64cmd` was present but not valid base64 / UTF-8.
    EncodedCommand(String),
    /// The private key file could not be read or parsed.
    KeyFile { path: String, reason: String },
    Invalid(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "io: {e}"),
            Self::Toml(e) => write!(f, "toml: {e}"),
            Self::EncodedCommand(msg) => write!(f, "b64cmd decode: {msg}"),
            Self::KeyFile { path, reason } => write!(f, "private key `{path}`: {reason}"),
            Self::Invalid(msg) => write!(f, "invalid config: {msg}"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(e: toml::de::Error) -> Self {
        Self::Toml(e)
    }
}

// ---------------------------------------------------------------------------
// TransportError
// ---------------------------------------------------------------------------

/// Failures reported by the transport library underneath a session.
#[derive(Debug)]
pub enum TransportError {
    Io(std::io::Error),
    /// Protocol-level failure from the ssh implementation.
    Protocol(String),
    /// The server answered a request with failure.
    Rejected(String),
    /// The channel closed before the server answered.
    ChannelClosed,
    Timeout,
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "io: {e}"),
            Self::Protocol(msg) => write!(f, "protocol: {msg}"),
            Self::Rejected(what) => write!(f, "{what} request rejected by server"),
            Self::ChannelClosed => write!(f, "channel closed"),
            Self::Timeout => write!(f, "timed out"),
        }
    }
}

impl std::error::Error for TransportError {}

impl From<std::io::Error> for TransportError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<russh::Error> for TransportError {
    fn from(e: russh::Error) -> Self {
        Self::Protocol(e.to_string())
    }
}

// ---------------------------------------------------------------------------
// SessionError
// ---------------------------------------------------------------------------

/// Fatal outcome of a session run. A remote non-zero exit is not one of these;
/// see [`crate::exit::SessionOutcome::RemoteExit`].
#[derive(Debug)]
pub enum SessionError {
    Config(ConfigError),
    /// Dial, handshake or authentication against `target` failed.
    Connection {
        target: String,
        source: TransportError,
    },
    SessionOpen(TransportError),
    /// Both the primary and the fallback pty request failed.
    PtyNegotiation {
        primary: TransportError,
        fallback: TransportError,
    },
    TerminalUnavailable(String),
    ShellStart(TransportError),
    /// Running the non-interactive command failed for a reason other than
    /// a remote exit status.
    Exec(TransportError),
    /// Channel I/O failed mid-session.
    Channel(TransportError),
    /// The channel closed without reporting an exit status or signal.
    ExitStatusMissing,
    Io(std::io::Error),
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(e) => write!(f, "config: {e}"),
            Self::Connection { target, source } => write!(f, "connect {target}: {source}"),
            Self::SessionOpen(e) => write!(f, "open session: {e}"),
            Self::PtyNegotiation { primary, fallback } => {
                write!(f, "request pty: {primary}; fallback: {fallback}")
            }
            Self::TerminalUnavailable(msg) => write!(f, "terminal unavailable: {msg}"),
            Self::ShellStart(e) => write!(f, "start shell: {e}"),
            Self::Exec(e) => write!(f, "run command: {e}"),
            Self::Channel(e) => write!(f, "channel: {e}"),
            Self::ExitStatusMissing => {
                write!(f, "remote command exited without exit status or exit signal")
            }
            Self::Io(e) => write!(f, "io: {e}"),
        }
    }
}

impl std::error::Error for SessionError {}

impl From<ConfigError> for SessionError {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

impl From<std::io::Error> for SessionError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}
