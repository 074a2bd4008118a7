//! Endpoint configuration loaded from the JSON `.env` file.
//!
//! The file carries a `source` and a `destination` object, each with the
//! camelCase keys the original deployment scripts already write:
//! `host`, `port`, `name`, `username`, `password`, `sslEnabled`.

use anyhow::Context;
use serde::Deserialize;
use std::fmt;
use std::path::Path;

/// One PostgreSQL endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
    /// Database name (`name` on the wire).
    #[serde(rename = "name")]
    pub db_name: String,
    pub username: String,
    pub password: String,
    pub ssl_enabled: bool,
}

impl Endpoint {
    /// Key-value connection string for the tokio-postgres driver.
    pub fn connection_string(&self) -> String {
        format!(
            "host={} port={} dbname={} user={} password={}",
            self.host, self.port, self.db_name, self.username, self.password
        )
    }
}

// Loggable endpoint summary. Never includes the password.
impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}@{}:{}/{}",
            self.username, self.host, self.port, self.db_name
        )
    }
}

/// Source and destination endpoints for one run.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub source: Endpoint,
    pub destination: Endpoint,
}

impl Config {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let config: Config = serde_json::from_str(&contents)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = r#"{
        "source": {
            "host": "db.internal",
            "port": 5432,
            "name": "app_production",
            "username": "reader",
            "password": "hunter2",
            "sslEnabled": true
        },
        "destination": {
            "host": "localhost",
            "port": 5433,
            "name": "app_development",
            "username": "postgres",
            "password": "postgres",
            "sslEnabled": false
        }
    }"#;

    #[test]
    fn test_load_json_config() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{SAMPLE}").unwrap();

        let config = Config::from_file(file.path()).expect("failed to parse config");

        assert_eq!(config.source.host, "db.internal");
        assert_eq!(config.source.port, 5432);
        assert_eq!(config.source.db_name, "app_production");
        assert!(config.source.ssl_enabled);
        assert_eq!(config.destination.port, 5433);
        assert!(!config.destination.ssl_enabled);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let err = Config::from_file(Path::new("/nonexistent/.env")).unwrap_err();
        assert!(err.to_string().contains("failed to read config file"));
    }

    #[test]
    fn test_display_never_leaks_password() {
        let config: Config = serde_json::from_str(SAMPLE).unwrap();
        let shown = config.source.to_string();
        assert_eq!(shown, "reader@db.internal:5432/app_production");
        assert!(!shown.contains("hunter2"));
    }
}
