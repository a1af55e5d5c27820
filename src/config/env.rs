//! Environment overrides applied on top of the config file.

use crate::error::ConfigError;

use super::Settings;

pub(super) const ENV_USER: &str = "SSH_CLIENT_USER";
pub(super) const ENV_PORT: &str = "SSH_CLIENT_PORT";
pub(super) const ENV_CONNECT_TIMEOUT: &str = "SSH_CLIENT_CONNECT_TIMEOUT_SECS";
pub(super) const ENV_TERM: &str = "SSH_CLIENT_TERM";

pub(super) fn apply_env_overrides<FEnv>(
    settings: &mut Settings,
    env_lookup: &FEnv,
) -> Result<(), ConfigError>
where
    FEnv: Fn(&str) -> Option<String>,
{
    if let Some(user) = non_empty(env_lookup, ENV_USER) {
        settings.connection.user = Some(user);
    }
    if let Some(port) = non_empty(env_lookup, ENV_PORT) {
        settings.connection.port = port.parse::<u16>().map_err(|_| {
            ConfigError::Invalid(format!(
                "invalid {ENV_PORT} value `{port}`: expected a port number"
            ))
        })?;
    }
    if let Some(timeout) = non_empty(env_lookup, ENV_CONNECT_TIMEOUT) {
        let parsed = timeout.parse::<u64>().map_err(|_| {
            ConfigError::Invalid(format!(
                "invalid {ENV_CONNECT_TIMEOUT} value `{timeout}`: expected positive integer seconds"
            ))
        })?;
        // Zero clamps up to one second.
        settings.connection.connect_timeout_secs = parsed.max(1);
    }
    if let Some(term) = non_empty(env_lookup, ENV_TERM) {
        settings.terminal.term = term;
    }
    Ok(())
}

/// Login name from the usual OS variables.
pub(super) fn os_user<FEnv>(env_lookup: &FEnv) -> Option<String>
where
    FEnv: Fn(&str) -> Option<String>,
{
    non_empty(env_lookup, "USER").or_else(|| non_empty(env_lookup, "USERNAME"))
}

fn non_empty<FEnv>(env_lookup: &FEnv, name: &str) -> Option<String>
where
    FEnv: Fn(&str) -> Option<String>,
{
    env_lookup(name)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
