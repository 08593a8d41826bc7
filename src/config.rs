use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{Error, Result};

pub const DEFAULT_ADMIN_PASSWORD: &str = "admin123";
pub const DEFAULT_CATALOG_PATH: &str = "catalog.yml";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Shared secret for moderation commands.
    pub admin_password: String,
    /// YAML file holding progressions, blocked IPs and feedback.
    pub catalog_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            admin_password: DEFAULT_ADMIN_PASSWORD.to_string(),
            catalog_path: PathBuf::from(DEFAULT_CATALOG_PATH),
        }
    }
}

impl Config {
    /// Read the YAML config file if one is given, then apply `ADMIN_PASSWORD`
    /// and `CHORD_CATALOG` from the environment.
    pub fn load(path: Option<&Path>) -> Result<Config> {
        Config::load_with(path, |key| std::env::var(key).ok())
    }

    /// Like [`Config::load`], reading overrides through `lookup`.
    pub fn load_with<F>(path: Option<&Path>, lookup: F) -> Result<Config>
    where
        F: Fn(&str) -> Option<String>,
    {
        let config = match path {
            Some(path) => {
                let content = std::fs::read_to_string(path).map_err(|e| {
                    Error::Config(format!("cannot read '{}': {e}", path.display()))
                })?;
                debug!("Loaded config from {}", path.display());
                serde_yaml::from_str(&content)?
            }
            None => Config::default(),
        };
        config.with_overrides(lookup)
    }

    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Config>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(password) = lookup("ADMIN_PASSWORD") {
            self.admin_password = password;
        }
        if let Some(catalog) = lookup("CHORD_CATALOG") {
            self.catalog_path = PathBuf::from(catalog);
        }

        if self.admin_password.is_empty() {
            return Err(Error::Config("admin password must not be empty".to_string()));
        }
        if self.admin_password == DEFAULT_ADMIN_PASSWORD {
            warn!("Using the built-in admin password; set ADMIN_PASSWORD");
        }
        Ok(self)
    }

    pub fn verify_admin(&self, password: &str) -> Result<()> {
        if password != self.admin_password {
            return Err(Error::Unauthorized);
        }
        Ok(())
    }
}
