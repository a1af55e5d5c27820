//! Session negotiation: connect, open a channel, then either run one command
//! or attach an interactive shell.
//!
//! Cleanup order is fixed on every path: channel first, then the connection,
//! then raw-mode restoration last so a final error message lands on a usable
//! terminal.

use std::sync::Arc;

use tracing::debug;

use crate::command::RemoteCommand;
use crate::config::SessionConfig;
use crate::error::SessionError;
use crate::exit::{wait_for_command, SessionOutcome};
use crate::relay::{run_interactive, LocalStreams, RemoteOutput};
use crate::terminal::{query_geometry, LocalTerminal, RawModeGuard};
use crate::transport::{Connection, Connector, SessionChannel};

mod pty;

/// Drives one session from connect to exit status.
pub struct SessionNegotiator<'a, C: Connector, T: LocalTerminal> {
    config: &'a SessionConfig,
    connector: C,
    terminal: Arc<T>,
}

impl<'a, C: Connector, T: LocalTerminal> SessionNegotiator<'a, C, T> {
    pub fn new(config: &'a SessionConfig, connector: C, terminal: Arc<T>) -> Self {
        Self {
            config,
            connector,
            terminal,
        }
    }

    /// Run the session to completion.
    ///
    /// A remote non-zero exit comes back as [`SessionOutcome::RemoteExit`];
    /// every `Err` is fatal.
    pub async fn run(&self, streams: LocalStreams) -> Result<SessionOutcome, SessionError> {
        let mut connection = self.connector.connect(self.config).await?;
        debug!(peer = %self.config.target(), "connected");

        let mut raw_mode = None;
        let result = self
            .run_on_connection(&mut connection, streams, &mut raw_mode)
            .await;

        if let Err(e) = connection.close().await {
            debug!(error = %e, "disconnect failed");
        }
        if let Some(mut guard) = raw_mode {
            if let Err(e) = guard.restore() {
                debug!(error = %e, "restoring terminal mode failed");
            }
        }
        result
    }

    async fn run_on_connection(
        &self,
        connection: &mut C::Connection,
        streams: LocalStreams,
        raw_mode: &mut Option<RawModeGuard<T>>,
    ) -> Result<SessionOutcome, SessionError> {
        let mut channel = connection
            .open_channel()
            .await
            .map_err(SessionError::SessionOpen)?;

        let result = match &self.config.command {
            RemoteCommand::Exec(command) => run_command(&mut channel, command, streams).await,
            RemoteCommand::Shell => {
                self.run_shell(connection, &mut channel, streams, raw_mode)
                    .await
            }
        };

        match channel.close().await {
            Ok(()) => debug!("channel closed"),
            Err(e) => debug!(error = %e, "closing channel failed"),
        }
        result
    }

    async fn run_shell(
        &self,
        connection: &mut C::Connection,
        channel: &mut <C::Connection as Connection>::Channel,
        streams: LocalStreams,
        raw_mode: &mut Option<RawModeGuard<T>>,
    ) -> Result<SessionOutcome, SessionError> {
        self.terminal
            .open()
            .map_err(|e| SessionError::TerminalUnavailable(e.to_string()))?;
        let geometry = query_geometry(&*self.terminal);
        *raw_mode = Some(RawModeGuard::acquire(Arc::clone(&self.terminal))?);

        let term = pty::negotiate_pty(connection, channel, &self.config.pty, geometry).await?;
        debug!(%term, cols = geometry.cols, rows = geometry.rows, "pty negotiated");

        run_interactive(
            channel,
            streams,
            Arc::clone(&self.terminal),
            geometry,
            &self.config.refresh_marker,
        )
        .await?;
        Ok(SessionOutcome::Completed)
    }
}

/// Non-interactive path: local stdout/stderr are attached, local stdin is not.
async fn run_command<Ch: SessionChannel>(
    channel: &mut Ch,
    command: &str,
    streams: LocalStreams,
) -> Result<SessionOutcome, SessionError> {
    let mut output = RemoteOutput::new(streams.stdout, streams.stderr);
    channel.exec(command).await.map_err(SessionError::Exec)?;
    // Remote readers of stdin see end-of-input right away.
    if let Err(e) = channel.send_eof().await {
        debug!(error = %e, "sending eof failed");
    }
    wait_for_command(channel, &mut output).await
}
