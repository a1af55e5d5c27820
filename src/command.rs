//! Remote command resolution from `--b64cmd` and trailing positional args.
//!
//! The base64 form exists so launchers on Windows can pass commands through
//! `cmd.exe`/PowerShell without quoting damage; it always wins over
//! positional arguments.

use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine;

use crate::error::ConfigError;

/// What the session should run on the remote host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteCommand {
    /// No command: attach an interactive shell.
    Shell,
    /// Run this command non-interactively.
    Exec(String),
}

impl RemoteCommand {
    pub fn is_interactive(&self) -> bool {
        matches!(self, Self::Shell)
    }
}

/// Resolve the remote command.
///
/// A non-empty `encoded` value is decoded and used as-is; a decode failure is
/// fatal. Otherwise `trailing` arguments are joined with single spaces. No
/// command at all (or one that decodes to the empty string) means a shell.
pub fn resolve_remote_command(
    encoded: Option<&str>,
    trailing: &[String],
) -> Result<RemoteCommand, ConfigError> {
    let command = match encoded.filter(|value| !value.is_empty()) {
        Some(value) => decode_command(value)?,
        None => trailing.join(" "),
    };
    if command.is_empty() {
        Ok(RemoteCommand::Shell)
    } else {
        Ok(RemoteCommand::Exec(command))
    }
}

fn decode_command(value: &str) -> Result<String, ConfigError> {
    let bytes = B64
        .decode(value.trim())
        .map_err(|e| ConfigError::EncodedCommand(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| ConfigError::EncodedCommand(e.to_string()))
}
