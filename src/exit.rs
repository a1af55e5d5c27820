//! Exit coordination: waiting for a remote command to finish and mapping the
//! result onto this process's exit status.
//!
//! Nothing here calls `std::process::exit`. Outcomes travel back up as values
//! so every scoped release (channel, connection, raw mode) runs first; the
//! binary exits exactly once, last.

use tracing::debug;

use crate::error::SessionError;
use crate::relay::RemoteOutput;
use crate::transport::{ChannelEvent, RemoteSignal, SessionChannel};

/// Exit status for every fatal [`SessionError`].
pub const FAILURE_EXIT_CODE: i32 = 1;

/// Shell convention: a process killed by signal `n` exits `128 + n`.
/// Signals without a known number map to the base alone.
const SIGNALED_EXIT_BASE: u8 = 128;

/// How a session ended when it did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOutcome {
    /// Command exited 0, or the interactive shell ended.
    Completed,
    /// Non-interactive command exited non-zero; mirror this status.
    RemoteExit(u8),
}

impl SessionOutcome {
    /// Map a remote exit status; values above 255 clamp to 255.
    pub fn from_exit_status(status: u32) -> Self {
        match status {
            0 => Self::Completed,
            n => Self::RemoteExit(u8::try_from(n).unwrap_or(u8::MAX)),
        }
    }

    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Completed => 0,
            Self::RemoteExit(code) => i32::from(*code),
        }
    }
}

/// Local exit status for the result of a whole run.
pub fn exit_code_for(result: &Result<SessionOutcome, SessionError>) -> i32 {
    match result {
        Ok(outcome) => outcome.exit_code(),
        Err(_) => FAILURE_EXIT_CODE,
    }
}

/// Exit information collected while a command runs.
#[derive(Debug, Default)]
pub(crate) struct ExitTracker {
    status: Option<u32>,
    signal: Option<RemoteSignal>,
}

impl ExitTracker {
    pub(crate) fn observe(&mut self, event: &ChannelEvent) {
        match event {
            ChannelEvent::ExitStatus(status) => self.status = Some(*status),
            ChannelEvent::ExitSignal(signal) => self.signal = Some(signal.clone()),
            _ => {}
        }
    }

    pub(crate) fn outcome(self) -> Result<SessionOutcome, SessionError> {
        if let Some(status) = self.status {
            return Ok(SessionOutcome::from_exit_status(status));
        }
        if let Some(signal) = self.signal {
            debug!(%signal, "remote command killed by signal");
            let code = SIGNALED_EXIT_BASE + signal.number().unwrap_or(0);
            return Ok(SessionOutcome::RemoteExit(code));
        }
        Err(SessionError::ExitStatusMissing)
    }
}

/// Relay a running command's output until the channel closes, then report
/// how it exited.
pub(crate) async fn wait_for_command<C: SessionChannel>(
    channel: &mut C,
    output: &mut RemoteOutput,
) -> Result<SessionOutcome, SessionError> {
    let mut tracker = ExitTracker::default();
    while let Some(event) = channel.next_event().await {
        match event {
            ChannelEvent::Stdout(data) => output.stdout(&data).await?,
            ChannelEvent::Stderr(data) => output.stderr(&data).await?,
            ChannelEvent::Closed => break,
            other => tracker.observe(&other),
        }
    }
    tracker.outcome()
}
