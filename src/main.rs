//! CLI entry point for ssh-client.

mod cli;

use ssh_client::build_info::build_summary;
use ssh_client::config::{load_settings, SessionConfig};
use ssh_client::exit::{exit_code_for, FAILURE_EXIT_CODE};
use ssh_client::relay::LocalStreams;
use ssh_client::session::SessionNegotiator;
use ssh_client::terminal::CrosstermTerminal;
use ssh_client::transport::RusshConnector;
use std::sync::Arc;
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// Log filter variable; logging is off unless it is set.
const LOG_ENV: &str = "SSH_CLIENT_LOG";

#[tokio::main]
async fn main() {
    init_logging();
    let args = cli::Args::parse_normalized();
    let (invocation, config_path) = args.into_invocation();
    debug!(build = %build_summary(), "starting");

    let config = match load_settings(config_path.as_deref())
        .and_then(|settings| SessionConfig::resolve(invocation, &settings))
    {
        Ok(config) => config,
        Err(e) => {
            println!("{e}");
            std::process::exit(FAILURE_EXIT_CODE);
        }
    };

    let negotiator = SessionNegotiator::new(&config, RusshConnector, Arc::new(CrosstermTerminal));
    let result = negotiator.run(LocalStreams::process()).await;
    if let Err(e) = &result {
        println!("{e}");
    }
    // Exiting here skips the runtime's wait on the blocking stdin reader.
    std::process::exit(exit_code_for(&result));
}

/// Diagnostics go to stderr so remote output on stdout stays clean.
fn init_logging() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("off"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
