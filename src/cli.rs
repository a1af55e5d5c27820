//! CLI argument parsing via clap.

use clap::Parser;
use ssh_client::build_info::{HELP_BUILD_METADATA, VERSION_TEXT};
use ssh_client::config::Invocation;

/// Single-dash long flags accepted for compatibility with older callers.
const LEGACY_FLAGS: &[(&str, &str)] = &[("-passwd", "--passwd"), ("-b64cmd", "--b64cmd")];

/// Run a command on a remote host over SSH, or open an interactive shell
/// when no command is given.
#[derive(Debug, Parser)]
#[command(
    name = "ssh-client",
    version = VERSION_TEXT,
    after_help = HELP_BUILD_METADATA
)]
pub struct Args {
    /// Remote host name or address.
    pub host: String,

    /// Command to run remotely; its words are joined with single spaces.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub command: Vec<String>,

    /// Remote login name (default: config, then $USER).
    #[arg(short = 'l', long = "login")]
    pub login: Option<String>,

    /// Remote port (default: 22).
    #[arg(short = 'p', long = "port")]
    pub port: Option<u16>,

    /// Private key file used instead of password authentication.
    #[arg(short = 'i', long = "identity")]
    pub identity: Option<String>,

    /// Password for password authentication.
    #[arg(long = "passwd")]
    pub passwd: Option<String>,

    /// Base64-encoded remote command; takes precedence over positional words.
    #[arg(long = "b64cmd")]
    pub b64cmd: Option<String>,

    /// Prompt for the password on the terminal when none is given.
    #[arg(long = "ask-pass")]
    pub ask_pass: bool,

    /// Path to config file (default: ~/.config/ssh-client/config.toml).
    #[arg(short = 'c', long = "config")]
    pub config: Option<String>,
}

impl Args {
    /// Parse process arguments after legacy flag normalization.
    pub fn parse_normalized() -> Self {
        Self::parse_from(normalize_legacy_flags(std::env::args()))
    }

    /// Split into session inputs and the config file override.
    pub fn into_invocation(self) -> (Invocation, Option<String>) {
        let invocation = Invocation {
            host: self.host,
            trailing: self.command,
            b64cmd: self.b64cmd,
            login: self.login,
            port: self.port,
            identity: self.identity,
            password: self.passwd,
            ask_pass: self.ask_pass,
        };
        (invocation, self.config)
    }
}

/// Rewrite `-passwd`/`-b64cmd` (also in `-flag=value` form) to their
/// double-dash spelling. Everything after the first positional argument is
/// left alone so remote commands pass through verbatim.
pub fn normalize_legacy_flags<I>(args: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut out = Vec::new();
    let mut args = args.into_iter();
    if let Some(program) = args.next() {
        out.push(program);
    }
    let mut expects_value = false;
    let mut positional_seen = false;
    for arg in args {
        if positional_seen {
            out.push(arg);
            continue;
        }
        if expects_value {
            expects_value = false;
            out.push(arg);
            continue;
        }
        let rewritten = rewrite_legacy(&arg).unwrap_or(arg);
        if rewritten == "--" {
            positional_seen = true;
        } else if rewritten.starts_with('-') {
            expects_value = takes_value(&rewritten);
        } else {
            positional_seen = true;
        }
        out.push(rewritten);
    }
    out
}

fn rewrite_legacy(arg: &str) -> Option<String> {
    LEGACY_FLAGS.iter().find_map(|(legacy, modern)| {
        if arg == *legacy {
            return Some((*modern).to_string());
        }
        arg.strip_prefix(legacy)
            .and_then(|rest| rest.strip_prefix('='))
            .map(|value| format!("{modern}={value}"))
    })
}

/// Flags whose value is the next argument when not given with `=`.
fn takes_value(flag: &str) -> bool {
    matches!(
        flag,
        "-l" | "--login" | "-p" | "--port" | "-i" | "--identity" | "--passwd" | "--b64cmd"
            | "-c" | "--config"
    )
}
