//! Default configuration constants.

/// Default ssh port.
pub(super) const DEFAULT_PORT: u16 = 22;
/// Bound on dial + handshake + authentication.
pub(super) const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 5;
/// Terminal type requested first for interactive sessions.
pub(super) const DEFAULT_TERM: &str = "xterm-256color";
/// Conservative terminal type used on a fresh channel when the first
/// pty request is refused.
pub(super) const DEFAULT_FALLBACK_TERM: &str = "xterm";
/// Input and output speed reported in the pty terminal modes.
pub(super) const DEFAULT_BAUD: u32 = 115_200;
/// Keystroke that forces a window-change resend (Ctrl-L).
pub(super) const DEFAULT_REFRESH_KEY: &str = "^L";
/// Directory name under the config root.
pub(super) const CONFIG_DIR_NAME: &str = "ssh-client";
/// File name inside [`CONFIG_DIR_NAME`].
pub(super) const CONFIG_FILE_NAME: &str = "config.toml";
