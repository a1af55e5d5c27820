//! ssh-client: run one remote command, or an interactive shell, over SSH.
//!
//! The crate resolves a [`config::SessionConfig`] from flags, environment and
//! an optional TOML file, then drives a session through
//! [`session::SessionNegotiator`]. Interactive sessions negotiate a remote pty
//! (with one fallback), relay local stdio, keep the remote window size in step
//! with the local terminal and restore the terminal mode on every exit path.
//!
//! # Quick start
//!
//! ```no_run
//! use ssh_client::config::{load_settings, Invocation, SessionConfig};
//! use ssh_client::exit::exit_code_for;
//! use ssh_client::relay::LocalStreams;
//! use ssh_client::session::SessionNegotiator;
//! use ssh_client::terminal::CrosstermTerminal;
//! use ssh_client::transport::RusshConnector;
//! use std::sync::Arc;
//!
//! # async fn example() {
//! let settings = load_settings(None).unwrap();
//! let invocation = Invocation {
//!     host: "example.com".into(),
//!     trailing: vec!["uname".into(), "-a".into()],
//!     ..Invocation::default()
//! };
//! let config = SessionConfig::resolve(invocation, &settings).unwrap();
//! let negotiator = SessionNegotiator::new(&config, RusshConnector, Arc::new(CrosstermTerminal));
//! let result = negotiator.run(LocalStreams::process()).await;
//! std::process::exit(exit_code_for(&result));
//! # }
//! ```

pub mod auth;
pub mod build_info;
pub mod command;
pub mod config;
pub mod error;
pub mod exit;
pub mod relay;
pub mod resize;
pub mod session;
pub mod terminal;
#[cfg(test)]
pub mod testsupport;
pub mod transport;
