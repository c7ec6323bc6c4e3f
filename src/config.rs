use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Default eLandings test endpoint. Production deployments override this
/// in the config file.
const DEFAULT_ENDPOINT: &str = "https://elandingst.alaska.gov/elandings/ReportManagementService";

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub mirror: MirrorConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServiceConfig {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// eLandings user id. Falls back to `ELANDINGS_USER`.
    #[serde(default)]
    pub user: Option<String>,
    /// eLandings password. Falls back to `ELANDINGS_PASSWORD`.
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default = "default_schema_version")]
    pub schema_version: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            user: None,
            password: None,
            schema_version: default_schema_version(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}
fn default_schema_version() -> String {
    "1.0".to_string()
}
fn default_timeout_secs() -> u64 {
    60
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    /// Directory holding one JSON file per landing report plus the
    /// `.sync_state.json` state file.
    #[serde(default = "default_reports_dir")]
    pub reports_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            reports_dir: default_reports_dir(),
        }
    }
}

fn default_reports_dir() -> PathBuf {
    PathBuf::from("data/landing_reports")
}

#[derive(Debug, Deserialize, Clone)]
pub struct MirrorConfig {
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,
}

impl Default for MirrorConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("data/landings.sqlite")
}

/// Resolved caller identity for the SOAP service.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub user: String,
    pub password: String,
}

impl ServiceConfig {
    /// Resolve credentials from the config file or environment.
    pub fn credentials(&self) -> Result<Credentials> {
        let user = match &self.user {
            Some(u) => u.clone(),
            None => std::env::var("ELANDINGS_USER")
                .context("ELANDINGS_USER environment variable not set and no service.user in config")?,
        };
        let password = match &self.password {
            Some(p) => p.clone(),
            None => std::env::var("ELANDINGS_PASSWORD").context(
                "ELANDINGS_PASSWORD environment variable not set and no service.password in config",
            )?,
        };
        Ok(Credentials { user, password })
    }
}

/// Load configuration from a TOML file.
///
/// A missing file is not an error: every setting has a usable default and
/// credentials can come from the environment, so the CLI works without a
/// config file at all.
pub fn load_config(path: &Path) -> Result<Config> {
    if !path.exists() {
        return Ok(Config::default());
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    if config.service.endpoint.trim().is_empty() {
        anyhow::bail!("service.endpoint must not be empty");
    }
    if config.service.schema_version.trim().is_empty() {
        anyhow::bail!("service.schema_version must not be empty");
    }
    if config.service.timeout_secs == 0 {
        anyhow::bail!("service.timeout_secs must be > 0");
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn missing_file_yields_defaults() {
        let config = load_config(Path::new("/nonexistent/landings.toml")).unwrap();
        assert_eq!(config.service.endpoint, DEFAULT_ENDPOINT);
        assert_eq!(config.service.schema_version, "1.0");
        assert_eq!(config.service.timeout_secs, 60);
        assert_eq!(
            config.storage.reports_dir,
            PathBuf::from("data/landing_reports")
        );
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[service]
user = "F12345"
password = "hunter2"

[storage]
reports_dir = "/tmp/reports"
"#
        )
        .unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.service.user.as_deref(), Some("F12345"));
        assert_eq!(config.service.endpoint, DEFAULT_ENDPOINT);
        assert_eq!(config.storage.reports_dir, PathBuf::from("/tmp/reports"));
        assert_eq!(config.mirror.db_path, PathBuf::from("data/landings.sqlite"));

        let creds = config.service.credentials().unwrap();
        assert_eq!(creds.user, "F12345");
        assert_eq!(creds.password, "hunter2");
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[service]\ntimeout_secs = 0").unwrap();
        assert!(load_config(file.path()).is_err());
    }
}
