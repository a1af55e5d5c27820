//! Credential resolution: private key loading and password sourcing.
//!
//! A non-empty key path always selects public-key auth, and a key that cannot
//! be loaded aborts the run; there is no silent fallback to password auth.

use std::fmt;
use std::io::IsTerminal;
use std::sync::Arc;

use russh_keys::key::KeyPair;

use crate::error::ConfigError;

/// How the session authenticates.
#[derive(Clone)]
pub enum AuthMethod {
    /// Password auth; the password may be empty.
    Password(String),
    PublicKey(Arc<KeyPair>),
}

impl fmt::Debug for AuthMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Password(_) => f.write_str("Password(<redacted>)"),
            Self::PublicKey(_) => f.write_str("PublicKey(<redacted>)"),
        }
    }
}

impl AuthMethod {
    /// Short label for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Password(_) => "password",
            Self::PublicKey(_) => "publickey",
        }
    }
}

/// Credential inputs collected from the command line.
#[derive(Debug, Clone, Copy)]
pub struct CredentialRequest<'a> {
    pub identity: Option<&'a str>,
    pub password: Option<&'a str>,
    /// Prompt for the password when none was supplied.
    pub ask_pass: bool,
    pub user: &'a str,
    pub host: &'a str,
}

/// Pick the auth method. `prompt` reads a secret from the terminal.
pub fn resolve_auth<FPrompt>(
    request: CredentialRequest<'_>,
    prompt: &FPrompt,
) -> Result<AuthMethod, ConfigError>
where
    FPrompt: Fn(&str) -> std::io::Result<String>,
{
    if let Some(path) = request.identity.map(str::trim).filter(|p| !p.is_empty()) {
        let key = load_private_key(path, prompt)?;
        return Ok(AuthMethod::PublicKey(Arc::new(key)));
    }

    match request.password {
        Some(password) if !password.is_empty() => Ok(AuthMethod::Password(password.to_string())),
        _ if request.ask_pass => {
            let label = format!("{}@{}'s password: ", request.user, request.host);
            Ok(AuthMethod::Password(prompt(&label)?))
        }
        _ => Ok(AuthMethod::Password(String::new())),
    }
}

fn load_private_key<FPrompt>(path: &str, prompt: &FPrompt) -> Result<KeyPair, ConfigError>
where
    FPrompt: Fn(&str) -> std::io::Result<String>,
{
    let key_error = |reason: String| ConfigError::KeyFile {
        path: path.to_string(),
        reason,
    };

    match russh_keys::load_secret_key(path, None) {
        Ok(key) => Ok(key),
        Err(russh_keys::Error::KeyIsEncrypted) => {
            if !std::io::stdin().is_terminal() {
                return Err(key_error(
                    "key is encrypted and no terminal is available for the passphrase".into(),
                ));
            }
            let passphrase = prompt(&format!("Enter passphrase for key '{path}': "))
                .map_err(|e| key_error(format!("reading passphrase: {e}")))?;
            russh_keys::load_secret_key(path, Some(&passphrase))
                .map_err(|e| key_error(e.to_string()))
        }
        Err(e) => Err(key_error(e.to_string())),
    }
}
