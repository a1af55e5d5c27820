//! Remote pty negotiation with a single fallback on a fresh channel.
//!
//! Many servers refuse a second pty request on a channel whose first request
//! failed, so the fallback never retries in place: the refused channel is
//! closed and replaced before the conservative terminal type is requested.

use tracing::debug;

use crate::config::PtySettings;
use crate::error::SessionError;
use crate::terminal::Geometry;
use crate::transport::{Connection, PtyRequest, SessionChannel, TerminalModes};

/// Request a pty on `channel`, replacing it with a fresh channel for the
/// fallback attempt if needed. Returns the terminal type that was accepted.
///
/// At most two requests are made.
pub(crate) async fn negotiate_pty<C: Connection>(
    connection: &mut C,
    channel: &mut C::Channel,
    settings: &PtySettings,
    geometry: Geometry,
) -> Result<String, SessionError> {
    let primary = PtyRequest {
        term: settings.term.clone(),
        geometry,
        modes: TerminalModes::echo_with_baud(settings.baud),
    };
    let primary_error = match channel.request_pty(&primary).await {
        Ok(()) => return Ok(primary.term),
        Err(e) => e,
    };
    debug!(
        term = %primary.term,
        error = %primary_error,
        fallback = %settings.fallback_term,
        "pty request refused; retrying on a fresh channel"
    );

    if let Err(e) = channel.close().await {
        debug!(error = %e, "closing refused channel failed");
    }
    *channel = connection
        .open_channel()
        .await
        .map_err(SessionError::SessionOpen)?;

    let fallback = PtyRequest {
        term: settings.fallback_term.clone(),
        ..primary
    };
    match channel.request_pty(&fallback).await {
        Ok(()) => Ok(fallback.term),
        Err(fallback_error) => Err(SessionError::PtyNegotiation {
            primary: primary_error,
            fallback: fallback_error,
        }),
    }
}
