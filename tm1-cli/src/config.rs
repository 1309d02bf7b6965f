//! Connection configuration loading.
//!
//! Settings come from a YAML file (`--config` or the default location),
//! then command-line overrides, then the `TM1_PASSWORD` environment variable.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tm1_rest::Tm1Config;
use tracing::debug;

use crate::Cli;

/// Environment variable holding the password.
pub const PASSWORD_ENV: &str = "TM1_PASSWORD";

/// Command-line values that take precedence over the file.
#[derive(Debug, Default)]
pub struct Overrides {
    pub address: Option<String>,
    pub port: Option<u16>,
    pub user: Option<String>,
    pub password: Option<String>,
}

impl Overrides {
    /// Collects overrides from the command line and the environment.
    pub fn from_cli(cli: &Cli) -> Self {
        Self {
            address: cli.address.clone(),
            port: cli.port,
            user: cli.user.clone(),
            password: std::env::var(PASSWORD_ENV).ok().filter(|p| !p.is_empty()),
        }
    }

    fn apply(self, config: &mut Tm1Config) {
        if let Some(address) = self.address {
            config.address = Some(address);
        }
        if let Some(port) = self.port {
            config.port = Some(port);
        }
        if let Some(user) = self.user {
            config.user = Some(user);
        }
        if let Some(password) = self.password {
            config.password = Some(password);
        }
    }
}

/// `~/.config/tm1/config.yaml` on Linux, the platform equivalent elsewhere.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("tm1").join("config.yaml"))
}

/// Parses a YAML configuration document.
pub fn parse_config(yaml: &str) -> Result<Tm1Config> {
    if yaml.trim().is_empty() {
        return Ok(Tm1Config::default());
    }
    serde_yaml::from_str(yaml).context("Invalid configuration file")
}

/// Loads the configuration and applies overrides.
///
/// An explicit `path` must exist. A missing default file yields the default
/// configuration.
pub fn load_config(path: Option<&Path>, overrides: Overrides) -> Result<Tm1Config> {
    let mut config = match path {
        Some(path) => read_config(path)?,
        None => match default_config_path() {
            Some(path) if path.exists() => read_config(&path)?,
            _ => {
                debug!("No configuration file, using defaults");
                Tm1Config::default()
            }
        },
    };

    overrides.apply(&mut config);
    Ok(config)
}

fn read_config(path: &Path) -> Result<Tm1Config> {
    debug!(path = %path.display(), "Reading configuration");
    let yaml = std::fs::read_to_string(path)
        .with_context(|| format!("Cannot read {}", path.display()))?;
    parse_config(&yaml).with_context(|| format!("In {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tm1_rest::TopologyKind;

    fn write_config(yaml: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(yaml.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_from_file() {
        let file = write_config(
            "address: tm1.local\nport: 8010\nssl: false\nuser: admin\npassword: apple\n",
        );

        let config = load_config(Some(file.path()), Overrides::default()).unwrap();
        assert_eq!(config.address.as_deref(), Some("tm1.local"));
        assert_eq!(config.port, Some(8010));
        assert!(!config.ssl);
        assert_eq!(config.timeout_secs, 60);
        assert_eq!(
            config.base_url().unwrap().as_str(),
            "http://tm1.local:8010/api/v1/"
        );
    }

    #[test]
    fn test_overrides_win() {
        let file = write_config("address: tm1.local\nport: 8010\nuser: admin\n");
        let overrides = Overrides {
            address: Some("other.local".into()),
            port: Some(9000),
            user: None,
            password: Some("secret".into()),
        };

        let config = load_config(Some(file.path()), overrides).unwrap();
        assert_eq!(config.address.as_deref(), Some("other.local"));
        assert_eq!(config.port, Some(9000));
        assert_eq!(config.user.as_deref(), Some("admin"));
        assert_eq!(config.password.as_deref(), Some("secret"));
    }

    #[test]
    fn test_named_instance_from_yaml() {
        let file = write_config(
            "address: pa.local\nport: 443\ninstance: tm1\ndatabase: Planning Sample\napplication_client_id: id\napplication_client_secret: s\nuser: admin\n",
        );
        let config = load_config(Some(file.path()), Overrides::default()).unwrap();
        assert_eq!(
            config.topology().unwrap().kind().unwrap(),
            TopologyKind::NamedInstance
        );
    }

    #[test]
    fn test_missing_explicit_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.yaml");
        assert!(load_config(Some(&missing), Overrides::default()).is_err());
    }

    #[test]
    fn test_invalid_yaml_fails() {
        let file = write_config("port: [not a number\n");
        assert!(load_config(Some(file.path()), Overrides::default()).is_err());
    }

    #[test]
    fn test_empty_file_is_default() {
        let config = parse_config("  \n").unwrap();
        assert!(config.ssl);
        assert!(config.address.is_none());
    }
}
