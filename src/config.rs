use log::debug;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};

pub const DEFAULT_BASE_URL: &str = "https://api.netatmo.net";
pub const DEFAULT_SCOPE: &str =
    "read_station read_thermostat write_thermostat read_camera read_homecoach";

const CONFIG_FILE_NAME: &str = ".netatmo.yml";
const DEFAULT_EVENT_CAPACITY: usize = 64;

/// Application credentials, as registered on the Netatmo developer portal,
/// plus the account they act on behalf of.
///
/// A pre-issued `access_token` bypasses the password grant entirely.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Credentials {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub client_secret: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

impl Credentials {
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            access_token: None,
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            username: username.into(),
            password: password.into(),
            scope: None,
        }
    }

    pub fn with_access_token(access_token: impl Into<String>) -> Self {
        Self {
            access_token: Some(access_token.into()),
            ..Default::default()
        }
    }

    pub fn scope(&self) -> &str {
        match self.scope.as_deref() {
            Some(scope) if !scope.is_empty() => scope,
            _ => DEFAULT_SCOPE,
        }
    }

    /// Returns the pre-issued access token, if one was supplied.
    pub fn preissued_token(&self) -> Option<&str> {
        self.access_token.as_deref().filter(|token| !token.is_empty())
    }

    /// Checks that the password grant has everything it needs.
    ///
    /// A pre-issued access token satisfies validation on its own.
    pub fn validate(&self) -> Result<()> {
        if self.preissued_token().is_some() {
            return Ok(());
        }

        let required = [
            ("client_id", &self.client_id),
            ("client_secret", &self.client_secret),
            ("username", &self.username),
            ("password", &self.password),
        ];

        for (name, value) in required {
            if value.is_empty() {
                return Err(Error::Config(format!("Authenticate '{}' not set.", name)));
            }
        }

        Ok(())
    }
}

/// What to do when the scheduled token refresh fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RefreshFailurePolicy {
    /// Emit a warning and keep using the current token.
    #[default]
    Warn,
    /// Emit an error and drop the token, so later calls wait for a new `authenticate()`.
    Invalidate,
}

#[derive(Debug, Clone)]
pub struct ClientOptions {
    pub base_url: String,
    /// How long a call issued before authentication may wait. `None` waits forever.
    pub deferred_call_timeout: Option<Duration>,
    pub refresh_failure: RefreshFailurePolicy,
    pub event_capacity: usize,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            deferred_call_timeout: None,
            refresh_failure: RefreshFailurePolicy::default(),
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

/// Get the path to the configuration file (~/.netatmo.yml)
pub fn get_config_path() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| Error::Config("Failed to determine home directory".to_string()))?;
    Ok(home.join(CONFIG_FILE_NAME))
}

/// Load credentials from ~/.netatmo.yml
pub fn load_credentials() -> Result<Credentials> {
    load_credentials_from(&get_config_path()?)
}

pub fn load_credentials_from(path: &Path) -> Result<Credentials> {
    if !path.exists() {
        return Err(Error::Config(format!(
            "Configuration file not found: {}",
            path.display()
        )));
    }

    let content = fs::read_to_string(path)?;
    let credentials: Credentials = serde_yaml::from_str(&content)?;

    debug!("Loaded credentials from {}", path.display());
    Ok(credentials)
}
