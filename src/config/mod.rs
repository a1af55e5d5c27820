//! Configuration loading from TOML files, environment variables and CLI flags.
//!
//! Precedence (highest wins):
//! 1. CLI flags (`-l`, `-p`, `-i`, ...)
//! 2. Environment variables (`SSH_CLIENT_USER`, `SSH_CLIENT_PORT`,
//!    `SSH_CLIENT_CONNECT_TIMEOUT_SECS`, `SSH_CLIENT_TERM`)
//! 3. TOML file given via `--config`, else
//!    `$XDG_CONFIG_HOME/ssh-client/config.toml` (or `~/.config/ssh-client/config.toml`)
//! 4. Built-in defaults
//!
//! The result of resolution is a [`SessionConfig`], built once and passed by
//! reference into the session; nothing downstream reads process arguments.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::debug;

use crate::auth::{resolve_auth, CredentialRequest};
use crate::command::resolve_remote_command;
use crate::error::ConfigError;

mod defaults;
mod env;
mod sources;
mod types;

pub use sources::config_root_dir;
pub use types::{
    ConnectionSettings, Invocation, PtySettings, SessionConfig, Settings, TerminalSettings,
};

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Load file + environment settings.
///
/// `path_override` is an explicit config file path (from `--config`).
pub fn load_settings(path_override: Option<&str>) -> Result<Settings, ConfigError> {
    load_settings_from_sources(
        path_override,
        |path| std::fs::read_to_string(path),
        |name| std::env::var(name).ok(),
        config_root_dir,
    )
}

fn load_settings_from_sources<FRead, FEnv, FRoot>(
    path_override: Option<&str>,
    read_file: FRead,
    env_lookup: FEnv,
    config_root: FRoot,
) -> Result<Settings, ConfigError>
where
    FRead: Fn(&Path) -> Result<String, std::io::Error>,
    FEnv: Fn(&str) -> Option<String>,
    FRoot: Fn() -> Option<PathBuf>,
{
    let (text, source) = sources::read_config_text(path_override, &read_file, &config_root)?;
    debug!(?source, "loaded config source");
    let mut settings: Settings = toml::from_str(&text)?;
    env::apply_env_overrides(&mut settings, &env_lookup)?;
    validate_settings(&settings)?;
    Ok(settings)
}

fn validate_settings(settings: &Settings) -> Result<(), ConfigError> {
    if settings.connection.port == 0 {
        return Err(ConfigError::Invalid(
            "connection.port must be between 1 and 65535".into(),
        ));
    }
    if settings.connection.connect_timeout_secs == 0 {
        return Err(ConfigError::Invalid(
            "connection.connect_timeout_secs must be at least 1".into(),
        ));
    }
    if settings.terminal.term.trim().is_empty() || settings.terminal.fallback_term.trim().is_empty()
    {
        return Err(ConfigError::Invalid(
            "terminal.term and terminal.fallback_term must not be empty".into(),
        ));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Session resolution
// ---------------------------------------------------------------------------

impl SessionConfig {
    /// Resolve CLI values against settings, using the process environment and
    /// terminal prompts for anything left unspecified.
    pub fn resolve(invocation: Invocation, settings: &Settings) -> Result<Self, ConfigError> {
        Self::resolve_with(
            invocation,
            settings,
            |name| std::env::var(name).ok(),
            |prompt| rpassword::prompt_password(prompt),
        )
    }

    /// Resolution with injected environment and secret prompt.
    ///
    /// Every check here runs before any network activity: a bad encoded
    /// command or an unusable key file fails the invocation outright.
    pub fn resolve_with<FEnv, FPrompt>(
        invocation: Invocation,
        settings: &Settings,
        env_lookup: FEnv,
        prompt: FPrompt,
    ) -> Result<Self, ConfigError>
    where
        FEnv: Fn(&str) -> Option<String>,
        FPrompt: Fn(&str) -> std::io::Result<String>,
    {
        let host = invocation.host.trim().to_string();
        if host.is_empty() {
            return Err(ConfigError::Invalid("target host must not be empty".into()));
        }

        let command =
            resolve_remote_command(invocation.b64cmd.as_deref(), &invocation.trailing)?;

        let port = invocation.port.unwrap_or(settings.connection.port);
        if port == 0 {
            return Err(ConfigError::Invalid("port must be between 1 and 65535".into()));
        }

        let user = invocation
            .login
            .filter(|login| !login.trim().is_empty())
            .or_else(|| settings.connection.user.clone())
            .or_else(|| env::os_user(&env_lookup))
            .unwrap_or_default();

        let auth = resolve_auth(
            CredentialRequest {
                identity: invocation.identity.as_deref(),
                password: invocation.password.as_deref(),
                ask_pass: invocation.ask_pass,
                user: &user,
                host: &host,
            },
            &prompt,
        )?;

        let refresh_marker = parse_key_sequence(&settings.terminal.refresh_key)?;

        Ok(Self {
            host,
            port,
            user,
            auth,
            command,
            connect_timeout: Duration::from_secs(settings.connection.connect_timeout_secs),
            pty: PtySettings {
                term: settings.terminal.term.clone(),
                fallback_term: settings.terminal.fallback_term.clone(),
                baud: settings.terminal.baud,
            },
            refresh_marker,
        })
    }
}

/// Parse a keystroke description into raw bytes.
///
/// Supports caret notation (`^L`, `^[`, `^?`), `\xNN`, `\e`, `\\` and `\^`
/// escapes; everything else is taken literally.
pub fn parse_key_sequence(raw: &str) -> Result<Vec<u8>, ConfigError> {
    let mut out = Vec::new();
    let mut chars = raw.chars().peekable();
    while let Some(ch) = chars.next() {
        match ch {
            '^' => {
                let next = chars.next().ok_or_else(|| {
                    ConfigError::Invalid(format!("key sequence `{raw}` ends with `^`"))
                })?;
                out.push(caret_byte(next).ok_or_else(|| {
                    ConfigError::Invalid(format!("invalid caret key `^{next}` in `{raw}`"))
                })?);
            }
            '\\' => match chars.next() {
                Some('x') => {
                    let hex: String = chars.by_ref().take(2).collect();
                    let byte = u8::from_str_radix(&hex, 16).map_err(|_| {
                        ConfigError::Invalid(format!("invalid `\\x{hex}` escape in `{raw}`"))
                    })?;
                    out.push(byte);
                }
                Some('e') => out.push(0x1b),
                Some('\\') => out.push(b'\\'),
                Some('^') => out.push(b'^'),
                other => {
                    return Err(ConfigError::Invalid(format!(
                        "unsupported escape `\\{}` in `{raw}`",
                        other.map(String::from).unwrap_or_default()
                    )))
                }
            },
            _ => {
                let mut buf = [0u8; 4];
                out.extend_from_slice(ch.encode_utf8(&mut buf).as_bytes());
            }
        }
    }
    Ok(out)
}

fn caret_byte(ch: char) -> Option<u8> {
    match ch.to_ascii_uppercase() {
        '?' => Some(0x7f),
        c @ '@'..='_' => Some(c as u8 - b'@'),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::AuthMethod;
    use crate::command::RemoteCommand;
    use crate::testsupport::TestTempDir;
    use std::collections::HashMap;

    fn load_for_test(
        path_override: Option<&str>,
        files: &[(&str, &str)],
        env: &[(&str, &str)],
        root: Option<&str>,
    ) -> Result<Settings, ConfigError> {
        let files: HashMap<PathBuf, String> = files
            .iter()
            .map(|(path, text)| (PathBuf::from(path), text.to_string()))
            .collect();
        let env: HashMap<String, String> = env
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let root = root.map(PathBuf::from);
        load_settings_from_sources(
            path_override,
            |path| {
                files.get(path).cloned().ok_or_else(|| {
                    std::io::Error::new(std::io::ErrorKind::NotFound, "missing fixture")
                })
            },
            |name| env.get(name).cloned(),
            || root.clone(),
        )
    }

    fn invocation(host: &str) -> Invocation {
        Invocation {
            host: host.into(),
            password: Some("secret".into()),
            ..Invocation::default()
        }
    }

    fn no_prompt(_: &str) -> std::io::Result<String> {
        panic!("prompt should not be used")
    }

    #[test]
    fn defaults_are_sensible() {
        let settings = load_for_test(None, &[], &[], None).unwrap();
        assert_eq!(settings.connection.port, 22);
        assert_eq!(settings.connection.connect_timeout_secs, 5);
        assert_eq!(settings.terminal.term, "xterm-256color");
        assert_eq!(settings.terminal.fallback_term, "xterm");
        assert_eq!(settings.terminal.baud, 115_200);
        assert_eq!(settings.terminal.refresh_key, "^L");
    }

    #[test]
    fn global_file_is_read_from_config_root() {
        let settings = load_for_test(
            None,
            &[(
                "/cfg/ssh-client/config.toml",
                "[connection]\nuser = \"deploy\"\nport = 2222\n",
            )],
            &[],
            Some("/cfg"),
        )
        .unwrap();
        assert_eq!(settings.connection.user.as_deref(), Some("deploy"));
        assert_eq!(settings.connection.port, 2222);
        assert_eq!(settings.terminal.term, "xterm-256color");
    }

    #[test]
    fn explicit_path_wins_and_must_exist() {
        let settings = load_for_test(
            Some("/work/alt.toml"),
            &[
                ("/work/alt.toml", "[terminal]\nterm = \"screen\"\n"),
                ("/cfg/ssh-client/config.toml", "[terminal]\nterm = \"vt100\"\n"),
            ],
            &[],
            Some("/cfg"),
        )
        .unwrap();
        assert_eq!(settings.terminal.term, "screen");

        let err = load_for_test(Some("/work/missing.toml"), &[], &[], None).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)), "got: {err:?}");
    }

    #[test]
    fn env_overrides_file_values() {
        let settings = load_for_test(
            None,
            &[("/cfg/ssh-client/config.toml", "[connection]\nport = 2222\n")],
            &[
                ("SSH_CLIENT_PORT", "2200"),
                ("SSH_CLIENT_USER", "ops"),
                ("SSH_CLIENT_CONNECT_TIMEOUT_SECS", "0"),
                ("SSH_CLIENT_TERM", "tmux-256color"),
            ],
            Some("/cfg"),
        )
        .unwrap();
        assert_eq!(settings.connection.port, 2200);
        assert_eq!(settings.connection.user.as_deref(), Some("ops"));
        assert_eq!(settings.connection.connect_timeout_secs, 1);
        assert_eq!(settings.terminal.term, "tmux-256color");
    }

    #[test]
    fn bad_env_port_is_rejected() {
        let err = load_for_test(None, &[], &[("SSH_CLIENT_PORT", "ssh")], None).unwrap_err();
        assert!(err.to_string().contains("SSH_CLIENT_PORT"), "got: {err}");
    }

    #[test]
    fn zero_port_in_file_is_rejected() {
        let err = load_for_test(
            None,
            &[("/cfg/ssh-client/config.toml", "[connection]\nport = 0\n")],
            &[],
            Some("/cfg"),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = load_for_test(
            None,
            &[("/cfg/ssh-client/config.toml", "[connection]\nhostname = \"x\"\n")],
            &[],
            Some("/cfg"),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Toml(_)));
    }

    #[test]
    fn resolve_prefers_cli_values() {
        let mut settings = Settings::default();
        settings.connection.user = Some("file-user".into());
        let inv = Invocation {
            login: Some("cli-user".into()),
            port: Some(2022),
            trailing: vec!["ls".into(), "-la".into()],
            ..invocation("h")
        };
        let config = SessionConfig::resolve_with(inv, &settings, |_| None, no_prompt).unwrap();
        assert_eq!(config.user, "cli-user");
        assert_eq!(config.target(), "h:2022");
        assert_eq!(config.command, RemoteCommand::Exec("ls -la".into()));
        assert_eq!(config.connect_timeout, Duration::from_secs(5));
        assert_eq!(config.refresh_marker, vec![0x0c]);
        assert!(matches!(config.auth, AuthMethod::Password(ref p) if p == "secret"));
    }

    #[test]
    fn resolve_falls_back_to_os_user() {
        let config = SessionConfig::resolve_with(
            invocation("h"),
            &Settings::default(),
            |name| (name == "USER").then(|| "alice".to_string()),
            no_prompt,
        )
        .unwrap();
        assert_eq!(config.user, "alice");
        assert_eq!(config.port, 22);
        assert_eq!(config.command, RemoteCommand::Shell);
    }

    #[test]
    fn resolve_rejects_empty_host() {
        let err = SessionConfig::resolve_with(
            invocation("  "),
            &Settings::default(),
            |_| None,
            no_prompt,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn bad_encoded_command_fails_before_key_loading() {
        let dir = TestTempDir::new("bad-b64");
        let inv = Invocation {
            b64cmd: Some("%%%".into()),
            identity: Some(dir.child("missing_key").display().to_string()),
            ..invocation("h")
        };
        let err = SessionConfig::resolve_with(inv, &Settings::default(), |_| None, no_prompt)
            .unwrap_err();
        assert!(matches!(err, ConfigError::EncodedCommand(_)), "got: {err:?}");
    }

    #[test]
    fn unreadable_key_file_is_a_config_error() {
        let dir = TestTempDir::new("no-key");
        let path = dir.child("id_ed25519").display().to_string();
        let inv = Invocation {
            identity: Some(path.clone()),
            ..invocation("h")
        };
        let err = SessionConfig::resolve_with(inv, &Settings::default(), |_| None, no_prompt)
            .unwrap_err();
        match err {
            ConfigError::KeyFile { path: reported, .. } => assert_eq!(reported, path),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn unparseable_key_file_is_a_config_error() {
        let dir = TestTempDir::new("junk-key");
        let path = dir.write_text("id_rsa", "this is not a private key\n");
        let inv = Invocation {
            identity: Some(path.display().to_string()),
            ..invocation("h")
        };
        let err = SessionConfig::resolve_with(inv, &Settings::default(), |_| None, no_prompt)
            .unwrap_err();
        assert!(matches!(err, ConfigError::KeyFile { .. }), "got: {err:?}");
    }

    #[test]
    fn key_sequences_parse() {
        assert_eq!(parse_key_sequence("^L").unwrap(), vec![0x0c]);
        assert_eq!(parse_key_sequence("^l").unwrap(), vec![0x0c]);
        assert_eq!(parse_key_sequence("^[").unwrap(), vec![0x1b]);
        assert_eq!(parse_key_sequence("^?").unwrap(), vec![0x7f]);
        assert_eq!(parse_key_sequence("\\e[R").unwrap(), b"\x1b[R".to_vec());
        assert_eq!(parse_key_sequence("\\x1dr").unwrap(), vec![0x1d, b'r']);
        assert_eq!(parse_key_sequence("\\^x").unwrap(), b"^x".to_vec());
        assert!(parse_key_sequence("").unwrap().is_empty());
    }

    #[test]
    fn malformed_key_sequences_are_rejected() {
        assert!(parse_key_sequence("^").is_err());
        assert!(parse_key_sequence("^1").is_err());
        assert!(parse_key_sequence("\\xZZ").is_err());
        assert!(parse_key_sequence("\\q").is_err());
    }
}
