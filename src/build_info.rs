//! Compile-time build metadata exposed on the command line.

/// Semver package version from `Cargo.toml`.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// VCS commit hash captured at build time.
pub const GIT_COMMIT: &str = env!("SSH_CLIENT_BUILD_GIT_HASH");

/// Build timestamp captured at compile time.
pub const BUILD_TIMESTAMP: &str = env!("SSH_CLIENT_BUILD_TIMESTAMP");

/// Text printed by `ssh-client --version` (clap prefixes the binary name).
pub const VERSION_TEXT: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    "\ncommit: ",
    env!("SSH_CLIENT_BUILD_GIT_HASH"),
    "\nbuilt: ",
    env!("SSH_CLIENT_BUILD_TIMESTAMP")
);

/// Help trailer block that surfaces build metadata in `ssh-client --help`.
pub const HELP_BUILD_METADATA: &str = concat!(
    "Build metadata:\n  commit: ",
    env!("SSH_CLIENT_BUILD_GIT_HASH"),
    "\n  built: ",
    env!("SSH_CLIENT_BUILD_TIMESTAMP")
);

/// One-line build summary for debug logs.
pub fn build_summary() -> String {
    format!("v{VERSION} ({GIT_COMMIT}, built {BUILD_TIMESTAMP})")
}
