//! russh-backed transport.
//!
//! Host keys are accepted without verification; the fingerprint is logged at
//! debug level so it can be checked out of band.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use russh::client::{self, Handle, Msg};
use russh::{Channel, ChannelMsg, Disconnect, Pty, Sig};
use russh_keys::key::PublicKey;
use tokio::time::timeout;
use tracing::debug;

use super::{ChannelEvent, Connection, Connector, PtyRequest, RemoteSignal, SessionChannel};
use crate::auth::AuthMethod;
use crate::config::SessionConfig;
use crate::error::{SessionError, TransportError};
use crate::terminal::Geometry;

/// Production [`Connector`] over TCP.
#[derive(Debug, Clone, Copy, Default)]
pub struct RusshConnector;

#[async_trait]
impl Connector for RusshConnector {
    type Connection = RusshConnection;

    async fn connect(&self, config: &SessionConfig) -> Result<RusshConnection, SessionError> {
        let target = config.target();
        debug!(%target, user = %config.user, auth = config.auth.kind(), "connecting");
        let outcome = match timeout(config.connect_timeout, establish(config)).await {
            Ok(result) => result,
            Err(_) => Err(TransportError::Timeout),
        };
        match outcome {
            Ok(handle) => Ok(RusshConnection { handle }),
            Err(source) => Err(SessionError::Connection { target, source }),
        }
    }
}

async fn establish(config: &SessionConfig) -> Result<Handle<HostKeyLogger>, TransportError> {
    let handler = HostKeyLogger {
        target: config.target(),
    };
    let mut handle = client::connect(
        Arc::new(client::Config::default()),
        (config.host.as_str(), config.port),
        handler,
    )
    .await?;

    let accepted = match &config.auth {
        AuthMethod::Password(password) => {
            handle
                .authenticate_password(config.user.clone(), password.clone())
                .await?
        }
        AuthMethod::PublicKey(key) => {
            handle
                .authenticate_publickey(config.user.clone(), Arc::clone(key))
                .await?
        }
    };
    if !accepted {
        return Err(TransportError::Rejected("authentication".into()));
    }
    Ok(handle)
}

struct HostKeyLogger {
    target: String,
}

#[async_trait]
impl client::Handler for HostKeyLogger {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &PublicKey,
    ) -> Result<bool, Self::Error> {
        debug!(
            host = %self.target,
            fingerprint = %server_public_key.fingerprint(),
            "accepting server host key"
        );
        Ok(true)
    }
}

/// Authenticated russh client handle.
pub struct RusshConnection {
    handle: Handle<HostKeyLogger>,
}

#[async_trait]
impl Connection for RusshConnection {
    type Channel = RusshChannel;

    async fn open_channel(&mut self) -> Result<RusshChannel, TransportError> {
        let channel = self.handle.channel_open_session().await?;
        Ok(RusshChannel {
            events: EventQueue::new(channel),
        })
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.handle
            .disconnect(Disconnect::ByApplication, "", "English")
            .await?;
        Ok(())
    }
}

/// Source of raw channel messages; the russh channel in production.
#[async_trait]
trait MessageSource: Send {
    async fn recv(&mut self) -> Option<ChannelMsg>;
}

#[async_trait]
impl MessageSource for Channel<Msg> {
    async fn recv(&mut self) -> Option<ChannelMsg> {
        self.wait().await
    }
}

/// Channel messages plus events that arrived while a request reply was
/// awaited. Buffered events are replayed first, in arrival order.
struct EventQueue<S> {
    source: S,
    pending: VecDeque<ChannelEvent>,
}

impl<S: MessageSource> EventQueue<S> {
    fn new(source: S) -> Self {
        Self {
            source,
            pending: VecDeque::new(),
        }
    }

    /// Wait for the success/failure answer to a want-reply request.
    async fn await_reply(&mut self, what: &str) -> Result<(), TransportError> {
        loop {
            match self.source.recv().await {
                Some(ChannelMsg::Success) => return Ok(()),
                Some(ChannelMsg::Failure) => return Err(TransportError::Rejected(what.into())),
                Some(other) => {
                    if let Some(event) = translate(other) {
                        let closed = event == ChannelEvent::Closed;
                        self.pending.push_back(event);
                        if closed {
                            return Err(TransportError::ChannelClosed);
                        }
                    }
                }
                None => return Err(TransportError::ChannelClosed),
            }
        }
    }

    async fn next_event(&mut self) -> Option<ChannelEvent> {
        if let Some(event) = self.pending.pop_front() {
            return Some(event);
        }
        loop {
            if let Some(event) = translate(self.source.recv().await?) {
                return Some(event);
            }
        }
    }
}

/// One russh session channel.
pub struct RusshChannel {
    events: EventQueue<Channel<Msg>>,
}

impl RusshChannel {
    fn channel(&self) -> &Channel<Msg> {
        &self.events.source
    }
}

#[async_trait]
impl SessionChannel for RusshChannel {
    async fn request_pty(&mut self, request: &PtyRequest) -> Result<(), TransportError> {
        let modes = [
            (Pty::ECHO, u32::from(request.modes.echo)),
            (Pty::TTY_OP_ISPEED, request.modes.input_baud),
            (Pty::TTY_OP_OSPEED, request.modes.output_baud),
        ];
        self.channel()
            .request_pty(
                true,
                &request.term,
                u32::from(request.geometry.cols),
                u32::from(request.geometry.rows),
                0,
                0,
                &modes,
            )
            .await?;
        self.events.await_reply("pty").await
    }

    async fn exec(&mut self, command: &str) -> Result<(), TransportError> {
        self.channel().exec(true, command).await?;
        self.events.await_reply("exec").await
    }

    async fn request_shell(&mut self) -> Result<(), TransportError> {
        self.channel().request_shell(true).await?;
        self.events.await_reply("shell").await
    }

    async fn send_data(&mut self, data: &[u8]) -> Result<(), TransportError> {
        self.channel().data(data).await?;
        Ok(())
    }

    async fn send_eof(&mut self) -> Result<(), TransportError> {
        self.channel().eof().await?;
        Ok(())
    }

    async fn window_change(&mut self, geometry: Geometry) -> Result<(), TransportError> {
        self.channel()
            .window_change(u32::from(geometry.cols), u32::from(geometry.rows), 0, 0)
            .await?;
        Ok(())
    }

    async fn next_event(&mut self) -> Option<ChannelEvent> {
        self.events.next_event().await
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.channel().close().await?;
        Ok(())
    }
}

fn translate(msg: ChannelMsg) -> Option<ChannelEvent> {
    match msg {
        ChannelMsg::Data { data } => Some(ChannelEvent::Stdout(data.to_vec())),
        // ext 1 is SSH_EXTENDED_DATA_STDERR, the only type defined.
        ChannelMsg::ExtendedData { data, .. } => Some(ChannelEvent::Stderr(data.to_vec())),
        ChannelMsg::ExitStatus { exit_status } => Some(ChannelEvent::ExitStatus(exit_status)),
        ChannelMsg::ExitSignal { signal_name, .. } => {
            Some(ChannelEvent::ExitSignal(remote_signal(signal_name)))
        }
        ChannelMsg::Eof => Some(ChannelEvent::Eof),
        ChannelMsg::Close => Some(ChannelEvent::Closed),
        _ => None,
    }
}

fn remote_signal(sig: Sig) -> RemoteSignal {
    match sig {
        Sig::ABRT => RemoteSignal::Abrt,
        Sig::ALRM => RemoteSignal::Alrm,
        Sig::FPE => RemoteSignal::Fpe,
        Sig::HUP => RemoteSignal::Hup,
        Sig::ILL => RemoteSignal::Ill,
        Sig::INT => RemoteSignal::Int,
        Sig::KILL => RemoteSignal::Kill,
        Sig::PIPE => RemoteSignal::Pipe,
        Sig::QUIT => RemoteSignal::Quit,
        Sig::SEGV => RemoteSignal::Segv,
        Sig::TERM => RemoteSignal::Term,
        Sig::USR1 => RemoteSignal::Usr1,
        // russh has no USR2 variant; it arrives as a custom name.
        Sig::Custom(name) => RemoteSignal::from_name(&name),
    }
}
