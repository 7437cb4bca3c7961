//! Runtime settings.
//!
//! Settings are layered: built-in defaults, then an optional YAML file, then
//! whatever the command line or the environment provides (see [`crate::cli`]).
//!
//! ```yaml
//! # ~/.config/extranet_query.yaml
//! username: jdoe
//! password: hunter2
//! lang: fra
//! timeout_secs: 20
//! ```

use crate::error::{Error, Result};
use crate::models::Lang;
use serde::Deserialize;
use std::fmt;
use std::path::Path;
use std::time::Duration;
use tracing::{info, instrument};

/// Root of the Derytelecom customer extranet.
pub const DEFAULT_BASE_URL: &str = "https://extranet.derytelecom.ca/";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

#[derive(Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Root URL of the extranet; `index.php` and the login form action are resolved against it.
    pub base_url: String,
    /// Language of the pages fetched without an explicit language.
    pub lang: Lang,
    pub timeout_secs: u64,
    pub user_agent: String,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            lang: Lang::default(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            username: None,
            password: None,
        }
    }
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("base_url", &self.base_url)
            .field("lang", &self.lang)
            .field("timeout_secs", &self.timeout_secs)
            .field("user_agent", &self.user_agent)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .finish()
    }
}

impl Settings {
    /// Load settings from a YAML file, or the defaults when no file is given.
    ///
    /// # Arguments
    ///
    /// * `path` - Optional YAML file; unknown keys are rejected
    ///
    /// # Returns
    ///
    /// The settings, or [`Error::Config`] naming the file when it cannot be
    /// read or parsed.
    #[instrument(level = "debug")]
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let raw = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {e}", path.display())))?;
        let settings = Self::from_yaml(&raw)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;
        info!(path = %path.display(), "Loaded configuration");
        Ok(settings)
    }

    pub fn from_yaml(raw: &str) -> std::result::Result<Self, serde_yaml::Error> {
        // An empty file deserializes to unit, not to an empty map
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(raw)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Username and password, or a configuration error naming what is missing.
    pub fn credentials(&self) -> Result<(&str, &str)> {
        match (self.username.as_deref(), self.password.as_deref()) {
            (Some(username), Some(password)) => Ok((username, password)),
            (None, _) => Err(Error::Config("no username given".into())),
            (_, None) => Err(Error::Config("no password given".into())),
        }
    }
}
