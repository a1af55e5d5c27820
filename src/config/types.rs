//! Configuration data model.
//!
//! `Settings` is what the TOML file and environment produce. `SessionConfig`
//! is the immutable, fully-resolved input of one session run.

use serde::Deserialize;
use std::time::Duration;

use super::defaults::{
    DEFAULT_BAUD, DEFAULT_CONNECT_TIMEOUT_SECS, DEFAULT_FALLBACK_TERM, DEFAULT_PORT,
    DEFAULT_REFRESH_KEY, DEFAULT_TERM,
};
use crate::auth::AuthMethod;
use crate::command::RemoteCommand;

/// File/env settings before CLI flags are applied.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub connection: ConnectionSettings,
    pub terminal: TerminalSettings,
}

/// `[connection]` table.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct ConnectionSettings {
    /// Login name used when `-l` is not given.
    pub user: Option<String>,
    pub port: u16,
    pub connect_timeout_secs: u64,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            user: None,
            port: DEFAULT_PORT,
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
        }
    }
}

/// `[terminal]` table.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct TerminalSettings {
    pub term: String,
    pub fallback_term: String,
    pub baud: u32,
    /// Manual geometry refresh keystroke; caret notation, `\xNN` escapes or
    /// literal text. Empty disables it.
    pub refresh_key: String,
}

impl Default for TerminalSettings {
    fn default() -> Self {
        Self {
            term: DEFAULT_TERM.to_string(),
            fallback_term: DEFAULT_FALLBACK_TERM.to_string(),
            baud: DEFAULT_BAUD,
            refresh_key: DEFAULT_REFRESH_KEY.to_string(),
        }
    }
}

/// Remote pty parameters for interactive sessions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PtySettings {
    pub term: String,
    pub fallback_term: String,
    pub baud: u32,
}

impl Default for PtySettings {
    fn default() -> Self {
        let terminal = TerminalSettings::default();
        Self {
            term: terminal.term,
            fallback_term: terminal.fallback_term,
            baud: terminal.baud,
        }
    }
}

/// Parsed command-line values handed to [`SessionConfig::resolve`].
#[derive(Debug, Clone, Default)]
pub struct Invocation {
    pub host: String,
    /// Positional arguments after the host.
    pub trailing: Vec<String>,
    pub b64cmd: Option<String>,
    pub login: Option<String>,
    pub port: Option<u16>,
    pub identity: Option<String>,
    pub password: Option<String>,
    pub ask_pass: bool,
}

/// Everything one session run needs, resolved up front.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub auth: AuthMethod,
    pub command: RemoteCommand,
    pub connect_timeout: Duration,
    pub pty: PtySettings,
    /// Byte sequence that triggers a manual window-change; empty disables.
    pub refresh_marker: Vec<u8>,
}

impl SessionConfig {
    /// `host:port` label used for dialing and error messages.
    pub fn target(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
