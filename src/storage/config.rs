//! External store configuration
//!
//! Read from the environment (optionally seeded from a dotenv file by the
//! binary):
//! - DB_HOST: database host (default `localhost`)
//! - DB_PORT: database port (default `5432`)
//! - DB_NAME: database name (default `urban_mobility`)
//! - DB_USER: user name (default `postgres`)
//! - DB_PASSWORD: password (default `postgres`)
//! - DB_DIR: directory holding the database file (default `.`)
//!
//! The relational backend is an embedded SQLite file named after `DB_NAME`,
//! so only local hosts are reachable. Nothing here fails hard: invalid
//! values are reported by [`DbConfig::database_path`] and the persistence
//! layer degrades to memory mode.

use eyre::{Result, bail, eyre};
use std::fmt;
use std::path::PathBuf;

const LOCAL_HOSTS: &[&str] = &["localhost", "127.0.0.1", "::1"];

#[derive(Clone, PartialEq, Eq)]
pub struct DbConfig {
    pub host: String,
    pub port: String,
    pub name: String,
    pub user: String,
    pub password: String,
    pub dir: PathBuf,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: "5432".to_string(),
            name: "urban_mobility".to_string(),
            user: "postgres".to_string(),
            password: "postgres".to_string(),
            dir: PathBuf::from("."),
        }
    }
}

impl DbConfig {
    /// Load configuration from process environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup, falling back to defaults
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let var = |key: &str, default: String| lookup(key).unwrap_or(default);

        Self {
            host: var("DB_HOST", defaults.host),
            port: var("DB_PORT", defaults.port),
            name: var("DB_NAME", defaults.name),
            user: var("DB_USER", defaults.user),
            password: var("DB_PASSWORD", defaults.password),
            dir: lookup("DB_DIR").map(PathBuf::from).unwrap_or(defaults.dir),
        }
    }

    /// Configuration for a database file `name` inside `dir`
    pub fn local(dir: impl Into<PathBuf>, name: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn port(&self) -> Result<u16> {
        self.port
            .trim()
            .parse()
            .map_err(|_| eyre!("Invalid DB_PORT: '{}'", self.port))
    }

    pub fn is_local_host(&self) -> bool {
        LOCAL_HOSTS.contains(&self.host.trim())
    }

    /// Validate the configuration and resolve the database file
    ///
    /// # Errors
    /// Invalid port, remote host, or a database name that is empty or
    /// contains path separators.
    pub fn database_path(&self) -> Result<PathBuf> {
        self.port()?;

        if !self.is_local_host() {
            bail!("Host '{}' is not reachable by the embedded backend", self.host);
        }

        let name = self.name.trim();
        if name.is_empty() {
            bail!("DB_NAME is empty");
        }
        if name.contains(['/', '\\']) {
            bail!("Invalid DB_NAME: '{}'", name);
        }

        Ok(self.dir.join(format!("{}.db", name)))
    }
}

impl fmt::Display for DbConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}:{}/{}", self.user, self.host, self.port, self.name)
    }
}

impl fmt::Debug for DbConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DbConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("name", &self.name)
            .field("user", &self.user)
            .field("password", &"***")
            .field("dir", &self.dir)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = DbConfig::from_lookup(|_| None);
        assert_eq!(config, DbConfig::default());
        assert_eq!(config.port().unwrap(), 5432);
        assert_eq!(
            config.database_path().unwrap(),
            PathBuf::from(".").join("urban_mobility.db")
        );
    }

    #[test]
    fn test_lookup_overrides() {
        let vars: HashMap<&str, &str> = [
            ("DB_HOST", "127.0.0.1"),
            ("DB_PORT", "6543"),
            ("DB_NAME", "mobility_test"),
            ("DB_DIR", "/tmp/data"),
        ]
        .into_iter()
        .collect();
        let config = DbConfig::from_lookup(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(config.port().unwrap(), 6543);
        assert_eq!(config.user, "postgres");
        assert_eq!(
            config.database_path().unwrap(),
            PathBuf::from("/tmp/data/mobility_test.db")
        );
    }

    #[test]
    fn test_invalid_values_are_reported() {
        let bad_port = DbConfig {
            port: "fifty".to_string(),
            ..DbConfig::default()
        };
        assert!(bad_port.database_path().is_err());

        let remote = DbConfig {
            host: "db.example.com".to_string(),
            ..DbConfig::default()
        };
        assert!(remote.database_path().is_err());

        assert!(DbConfig::local(".", "").database_path().is_err());
        assert!(DbConfig::local(".", "../escape").database_path().is_err());
    }

    #[test]
    fn test_password_is_not_printed() {
        let config = DbConfig {
            password: "hunter2".to_string(),
            ..DbConfig::default()
        };
        assert!(!format!("{:?}", config).contains("hunter2"));
        assert!(!config.to_string().contains("hunter2"));
    }

    #[test]
    #[serial]
    fn test_from_env() {
        // SAFETY: serialized with every other test touching the environment
        unsafe {
            std::env::set_var("DB_NAME", "from_env_db");
            std::env::remove_var("DB_PORT");
        }

        let config = DbConfig::from_env();

        unsafe {
            std::env::remove_var("DB_NAME");
        }

        assert_eq!(config.name, "from_env_db");
        assert_eq!(config.port, "5432");
    }
}
